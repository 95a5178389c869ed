//! Patch compaction utilities.

use crate::json_crdt_patch::clock::{equal, ts};
use crate::json_crdt_patch::operations::Op;
use crate::json_crdt_patch::patch::{Patch, PatchError};

/// Combines a run of patches from one session into a single patch.
///
/// Patches must be ordered by logical time without overlaps. Where the next
/// patch does not start right after the previous one ends, a `Nop` covering
/// the gap keeps the combined patch contiguous. Empty patches are skipped.
pub fn combine(patches: Vec<Patch>) -> Result<Patch, PatchError> {
    let mut iter = patches.into_iter();
    let mut first = iter.next().unwrap_or_default();

    for current in iter {
        let (Some(fid), Some(cid)) = (first.get_id(), current.get_id()) else {
            if first.get_id().is_none() {
                first.ops.extend(current.ops);
            }
            continue;
        };
        if fid.sid != cid.sid {
            return Err(PatchError::SidMismatch);
        }
        let next_tick = first.next_time();
        if cid.time < next_tick {
            return Err(PatchError::TimestampConflict);
        }
        let gap = cid.time - next_tick;
        if gap > 0 {
            first.ops.push(Op::Nop {
                id: ts(fid.sid, next_tick),
                len: gap,
            });
        }
        first.ops.extend(current.ops);
    }
    Ok(first)
}

/// Merges consecutive string inserts that append to one another.
///
/// Two `InsStr` ops merge when they target the same string, the second
/// starts right where the first ends, and the second is anchored on the
/// first's last character.
pub fn compact(patch: &mut Patch) {
    if patch.ops.len() < 2 {
        return;
    }
    let ops = std::mem::take(&mut patch.ops);
    let mut new_ops: Vec<Op> = Vec::with_capacity(ops.len());

    for op in ops {
        if let Some(Op::InsStr {
            id: lid,
            obj: lobj,
            data: ldata,
            ..
        }) = new_ops.last_mut()
        {
            if let Op::InsStr {
                id: cid,
                obj: cobj,
                after: cafter,
                data: cdata,
            } = &op
            {
                let last_next_tick = lid.time + ldata.chars().count() as u64;
                let is_time_consecutive = lid.sid == cid.sid && last_next_tick == cid.time;
                let is_same_string = equal(*lobj, *cobj);
                let is_append = equal(*cafter, ts(lid.sid, last_next_tick - 1));
                if is_time_consecutive && is_same_string && is_append {
                    ldata.push_str(cdata);
                    continue;
                }
            }
        }
        new_ops.push(op);
    }
    patch.ops = new_ops;
}
