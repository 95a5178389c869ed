//! Errors raised by the document model and its editing API.

use thiserror::Error;

/// Errors surfaced to callers of path-based accessors and the editing API.
///
/// Operations whose dependencies cannot be resolved are not errors; the
/// model drops them (see [`Model::apply_operation`](super::Model::apply_operation)).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelError {
    #[error("NOT_STR")]
    NotStr,
    #[error("NOT_ARR")]
    NotArr,
    #[error("NOT_BIN")]
    NotBin,
    #[error("NOT_OBJ")]
    NotObj,
    #[error("NOT_VAL")]
    NotVal,
    /// The path walks through a key or node that does not exist.
    #[error("NOT_FOUND")]
    NotFound,
    #[error("OUT_OF_BOUNDS")]
    OutOfBounds,
    #[error("UNKNOWN_NODE")]
    UnknownNode(u8),
    /// Zero-length insert.
    #[error("EMPTY_WRITE")]
    EmptyWrite,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_uses_condition_codes() {
        assert_eq!(ModelError::OutOfBounds.to_string(), "OUT_OF_BOUNDS");
        assert_eq!(ModelError::UnknownNode(7).to_string(), "UNKNOWN_NODE");
        assert_eq!(ModelError::NotStr.to_string(), "NOT_STR");
    }
}
