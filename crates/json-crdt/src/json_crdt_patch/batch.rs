//! [`Batch`]: a sequence of patches from the same session.

use crate::json_crdt_patch::clock::print_ts;
use crate::json_crdt_patch::clock::Ts;
use crate::json_crdt_patch::patch::{Patch, PatchError};

/// A causally closed run of patches from one session, rebased as a unit.
///
/// Later patches may reference ids created by earlier ones, so all of them
/// are shifted by the same delta around one transform horizon.
#[derive(Debug, Clone, Default)]
pub struct Batch {
    pub patches: Vec<Patch>,
}

impl Batch {
    pub fn new(patches: Vec<Patch>) -> Self {
        Self { patches }
    }

    /// Returns the ID of the first patch, if any.
    pub fn get_id(&self) -> Option<Ts> {
        self.patches.first().and_then(|p| p.get_id())
    }

    /// Total clock span of all patches.
    pub fn span(&self) -> u64 {
        self.patches.iter().map(Patch::span).sum()
    }

    /// Rebases all patches so the batch starts at `server_time`.
    ///
    /// The horizon is the start of the first patch; every id of the batch's
    /// session at or after it moves by `server_time - horizon`.
    pub fn rebase(&self, server_time: u64) -> Result<Batch, PatchError> {
        let id = self.get_id().ok_or(PatchError::EmptyPatch)?;
        let horizon = id.time;
        let patches = self
            .patches
            .iter()
            .map(|patch| patch.rebase(server_time, Some(horizon)))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Batch { patches })
    }
}

impl std::fmt::Display for Batch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let id_str = match self.get_id() {
            Some(id) => print_ts(id),
            None => "(nil)".to_owned(),
        };
        write!(f, "Batch {}", id_str)?;
        let len = self.patches.len();
        for (i, patch) in self.patches.iter().enumerate() {
            let connector = if i == len - 1 { "└─" } else { "├─" };
            write!(f, "\n{} {}", connector, patch)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::json_crdt_patch::clock::ts;
    use crate::json_crdt_patch::operations::Op;

    #[test]
    fn batch_rebase_keeps_relative_offsets() {
        let p1 = Patch::from_ops(vec![Op::NewObj { id: ts(1, 10) }]);
        let p2 = Patch::from_ops(vec![
            Op::NewStr { id: ts(1, 13) },
            Op::InsObj {
                id: ts(1, 14),
                obj: ts(1, 10),
                data: vec![("s".into(), ts(1, 13))],
            },
        ]);

        let batch = Batch::new(vec![p1, p2]);
        let rebased = batch.rebase(20).unwrap();
        assert_eq!(rebased.patches[0].get_id(), Some(ts(1, 20)));
        assert_eq!(rebased.patches[1].get_id(), Some(ts(1, 23)));
        assert_eq!(
            rebased.patches[1].ops[1],
            Op::InsObj {
                id: ts(1, 24),
                obj: ts(1, 20),
                data: vec![("s".into(), ts(1, 23))],
            }
        );
        assert_eq!(rebased.span(), 3);
    }

    #[test]
    fn empty_batch_cannot_be_rebased() {
        assert_eq!(
            Batch::default().rebase(5).unwrap_err(),
            PatchError::EmptyPatch
        );
    }
}
