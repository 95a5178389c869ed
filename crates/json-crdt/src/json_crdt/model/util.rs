//! Utility functions for the JSON CRDT model.

use rand::Rng;

use crate::json_crdt_patch::enums::SESSION;

/// Generates a random session ID up to 53 bits in size.
///
/// Ids below `SESSION::MIN_USER` are reserved, so the result lies in
/// `[SESSION::MIN_USER, SESSION::MAX]`.
pub fn random_session_id() -> u64 {
    rand::thread_rng().gen_range(SESSION::MIN_USER..=SESSION::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_session_id_in_range() {
        for _ in 0..100 {
            let id = random_session_id();
            assert!(id >= SESSION::MIN_USER, "id {id} should be >= {}", SESSION::MIN_USER);
            assert!(id <= SESSION::MAX, "id {id} should be <= {}", SESSION::MAX);
        }
    }
}
