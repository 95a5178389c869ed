//! [`Patch`]: an ordered batch of operations from one editing round.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::json_crdt_patch::clock::{print_ts, ts, Ts};
use crate::json_crdt_patch::operations::{ConValue, Op};

/// Errors raised by patch-level transformations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PatchError {
    #[error("EMPTY_PATCH")]
    EmptyPatch,
    #[error("SID_MISMATCH")]
    SidMismatch,
    #[error("TIMESTAMP_CONFLICT")]
    TimestampConflict,
    #[error("unknown patch opcode: {0}")]
    UnknownOpcode(u8),
    #[error("UNKNOWN_NODE")]
    UnknownNode(u8),
}

/// A JSON CRDT Patch: an ordered list of operations with optional metadata.
///
/// All operations share the session of the first one, and span-bearing
/// operations occupy contiguous timestamps. Normally created via
/// [`PatchBuilder`](super::patch_builder::PatchBuilder).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Patch {
    pub ops: Vec<Op>,

    /// Arbitrary metadata, not interpreted by the CRDT.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Value>,
}

impl Patch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_ops(ops: Vec<Op>) -> Self {
        Self { ops, meta: None }
    }

    /// Returns the ID of the first operation, if any.
    pub fn get_id(&self) -> Option<Ts> {
        self.ops.first().map(|op| op.id())
    }

    /// Returns the total logical clock span consumed by all operations.
    pub fn span(&self) -> u64 {
        self.ops.iter().map(|op| op.span()).sum()
    }

    /// Returns the logical time expected for the next operation, or 0 if the
    /// patch is empty.
    pub fn next_time(&self) -> u64 {
        match self.ops.last() {
            None => 0,
            Some(op) => op.id().time + op.span(),
        }
    }

    /// Creates a new patch where every timestamp is transformed by `f`.
    pub fn rewrite_time<F>(&self, f: &F) -> Patch
    where
        F: Fn(Ts) -> Ts,
    {
        Patch {
            ops: self.ops.iter().map(|op| rewrite_op(op, f)).collect(),
            meta: self.meta.clone(),
        }
    }

    /// Returns a copy shifted so it can be replayed as if authored at `new_time`.
    ///
    /// Timestamps of the patch's own session at or after `horizon` (defaults
    /// to the patch start) move by `new_time - horizon`. Everything below the
    /// horizon, and every other session, is left alone: those ids reference
    /// history the patch was built on.
    pub fn rebase(&self, new_time: u64, horizon: Option<u64>) -> Result<Patch, PatchError> {
        let id = self.get_id().ok_or(PatchError::EmptyPatch)?;
        let sid = id.sid;
        let horizon = horizon.unwrap_or(id.time);
        if new_time == horizon {
            return Ok(self.clone());
        }
        let delta = new_time as i128 - horizon as i128;
        Ok(self.rewrite_time(&|stamp: Ts| -> Ts {
            if stamp.sid != sid || stamp.time < horizon {
                return stamp;
            }
            ts(sid, (stamp.time as i128 + delta) as u64)
        }))
    }
}

impl std::fmt::Display for Patch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let id_str = match self.get_id() {
            Some(id) => print_ts(id),
            None => "(nil)".to_owned(),
        };
        write!(f, "Patch {}!{}", id_str, self.span())?;
        for op in &self.ops {
            write!(f, "\n  {}", op)?;
        }
        Ok(())
    }
}

fn rewrite_con<F>(val: &ConValue, f: &F) -> ConValue
where
    F: Fn(Ts) -> Ts,
{
    match val {
        ConValue::Ref(r) => ConValue::Ref(f(*r)),
        ConValue::Val(v) => ConValue::Val(v.clone()),
    }
}

/// Applies the timestamp transform function to a single operation.
fn rewrite_op<F>(op: &Op, f: &F) -> Op
where
    F: Fn(Ts) -> Ts,
{
    match op {
        Op::NewCon { id, val } => Op::NewCon {
            id: f(*id),
            val: val.clone(),
        },
        Op::NewVal { id } => Op::NewVal { id: f(*id) },
        Op::NewObj { id } => Op::NewObj { id: f(*id) },
        Op::NewStr { id } => Op::NewStr { id: f(*id) },
        Op::NewBin { id } => Op::NewBin { id: f(*id) },
        Op::NewArr { id } => Op::NewArr { id: f(*id) },
        Op::SetRoot { id, val } => Op::SetRoot {
            id: f(*id),
            val: f(*val),
        },
        Op::SetVal { id, obj, val } => Op::SetVal {
            id: f(*id),
            obj: f(*obj),
            val: rewrite_con(val, f),
        },
        Op::InsObj { id, obj, data } => Op::InsObj {
            id: f(*id),
            obj: f(*obj),
            data: data.iter().map(|(k, v)| (k.clone(), f(*v))).collect(),
        },
        Op::InsStr {
            id,
            obj,
            after,
            data,
        } => Op::InsStr {
            id: f(*id),
            obj: f(*obj),
            after: f(*after),
            data: data.clone(),
        },
        Op::InsBin {
            id,
            obj,
            after,
            data,
        } => Op::InsBin {
            id: f(*id),
            obj: f(*obj),
            after: f(*after),
            data: data.clone(),
        },
        Op::InsArr {
            id,
            obj,
            after,
            data,
        } => Op::InsArr {
            id: f(*id),
            obj: f(*obj),
            after: f(*after),
            data: data.iter().map(|v| f(*v)).collect(),
        },
        Op::Del { id, obj, after, len } => Op::Del {
            id: f(*id),
            obj: f(*obj),
            after: f(*after),
            len: *len,
        },
        Op::Nop { id, len } => Op::Nop {
            id: f(*id),
            len: *len,
        },
    }
}
