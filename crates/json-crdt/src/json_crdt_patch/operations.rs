//! JSON CRDT Patch operations as a single Rust enum.
//!
//! Operations never carry positional indices: sequence edits name the
//! element they follow (`after`) by timestamp, so replaying them does not
//! depend on concurrently changing indices.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::json_crdt_patch::clock::{print_ts, Ts};
use crate::json_crdt_patch::enums::JsonCrdtPatchOpcode;

// ── ConValue ───────────────────────────────────────────────────────────────

/// The payload of an LWW register write.
///
/// - `Ref` points at another node (or one of the reserved literal ids).
/// - `Val` stores a JSON literal inline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ConValue {
    Ref(Ts),
    Val(Value),
}

// ── Operation ──────────────────────────────────────────────────────────────

/// A single JSON CRDT Patch operation.
///
/// Each variant carries an `id` identifying the operation in the global
/// logical clock space. Inserts and `Nop` occupy `span()` consecutive
/// timestamps starting at `id`; everything else occupies one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Op {
    // ── Creation operations ──────────────────────────────────────────────
    /// Create an immutable constant node.
    NewCon { id: Ts, val: Value },
    /// Create an empty LWW register.
    NewVal { id: Ts },
    /// Create an empty LWW map.
    NewObj { id: Ts },
    /// Create an empty RGA string.
    NewStr { id: Ts },
    /// Create an empty RGA byte buffer.
    NewBin { id: Ts },
    /// Create an empty RGA array.
    NewArr { id: Ts },

    // ── Mutation operations ──────────────────────────────────────────────
    /// Point the document root at `val`.
    SetRoot { id: Ts, val: Ts },
    /// Write a register.
    SetVal { id: Ts, obj: Ts, val: ConValue },
    /// Write key → value pairs of a map. Every key is written with `id`.
    InsObj {
        id: Ts,
        obj: Ts,
        data: Vec<(String, Ts)>,
    },
    /// Insert text after element `after` of a string.
    InsStr {
        id: Ts,
        obj: Ts,
        after: Ts,
        data: String,
    },
    /// Insert bytes after element `after` of a byte buffer.
    InsBin {
        id: Ts,
        obj: Ts,
        after: Ts,
        data: Vec<u8>,
    },
    /// Insert node references after element `after` of an array.
    InsArr {
        id: Ts,
        obj: Ts,
        after: Ts,
        data: Vec<Ts>,
    },
    /// Delete `len` elements of a sequence, starting at element `after`.
    Del {
        id: Ts,
        obj: Ts,
        after: Ts,
        len: u64,
    },
    /// Consume `len` clock cycles without doing anything.
    Nop { id: Ts, len: u64 },
}

impl Op {
    /// Returns the ID (first timestamp) of this operation.
    pub fn id(&self) -> Ts {
        match self {
            Op::NewCon { id, .. }
            | Op::NewVal { id }
            | Op::NewObj { id }
            | Op::NewStr { id }
            | Op::NewBin { id }
            | Op::NewArr { id }
            | Op::SetRoot { id, .. }
            | Op::SetVal { id, .. }
            | Op::InsObj { id, .. }
            | Op::InsStr { id, .. }
            | Op::InsBin { id, .. }
            | Op::InsArr { id, .. }
            | Op::Del { id, .. }
            | Op::Nop { id, .. } => *id,
        }
    }

    /// Number of logical clock cycles consumed by this operation.
    pub fn span(&self) -> u64 {
        match self {
            Op::InsStr { data, .. } => data.chars().count() as u64,
            Op::InsBin { data, .. } => data.len() as u64,
            Op::InsArr { data, .. } => data.len() as u64,
            Op::Nop { len, .. } => *len,
            _ => 1,
        }
    }

    /// The node this operation mutates, if it mutates one.
    pub fn target(&self) -> Option<Ts> {
        match self {
            Op::SetVal { obj, .. }
            | Op::InsObj { obj, .. }
            | Op::InsStr { obj, .. }
            | Op::InsBin { obj, .. }
            | Op::InsArr { obj, .. }
            | Op::Del { obj, .. } => Some(*obj),
            _ => None,
        }
    }

    pub fn opcode(&self) -> JsonCrdtPatchOpcode {
        match self {
            Op::NewCon { .. } => JsonCrdtPatchOpcode::NewCon,
            Op::NewVal { .. } => JsonCrdtPatchOpcode::NewVal,
            Op::NewObj { .. } => JsonCrdtPatchOpcode::NewObj,
            Op::NewStr { .. } => JsonCrdtPatchOpcode::NewStr,
            Op::NewBin { .. } => JsonCrdtPatchOpcode::NewBin,
            Op::NewArr { .. } => JsonCrdtPatchOpcode::NewArr,
            Op::SetRoot { .. } => JsonCrdtPatchOpcode::SetRoot,
            Op::SetVal { .. } => JsonCrdtPatchOpcode::SetVal,
            Op::InsObj { .. } => JsonCrdtPatchOpcode::InsObj,
            Op::InsStr { .. } => JsonCrdtPatchOpcode::InsStr,
            Op::InsBin { .. } => JsonCrdtPatchOpcode::InsBin,
            Op::InsArr { .. } => JsonCrdtPatchOpcode::InsArr,
            Op::Del { .. } => JsonCrdtPatchOpcode::Del,
            Op::Nop { .. } => JsonCrdtPatchOpcode::Nop,
        }
    }

    /// Short mnemonic name of this operation.
    pub fn name(&self) -> &'static str {
        match self {
            Op::NewCon { .. } => "new_con",
            Op::NewVal { .. } => "new_val",
            Op::NewObj { .. } => "new_obj",
            Op::NewStr { .. } => "new_str",
            Op::NewBin { .. } => "new_bin",
            Op::NewArr { .. } => "new_arr",
            Op::SetRoot { .. } => "set_root",
            Op::SetVal { .. } => "set_val",
            Op::InsObj { .. } => "ins_obj",
            Op::InsStr { .. } => "ins_str",
            Op::InsBin { .. } => "ins_bin",
            Op::InsArr { .. } => "ins_arr",
            Op::Del { .. } => "del",
            Op::Nop { .. } => "nop",
        }
    }
}

impl std::fmt::Display for Op {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let id = self.id();
        let span = self.span();
        let base = if span > 1 {
            format!("{} {}!{}", self.name(), print_ts(id), span)
        } else {
            format!("{} {}", self.name(), print_ts(id))
        };
        match self {
            Op::NewCon { val, .. } => write!(f, "{} {{ {} }}", base, val),
            Op::SetRoot { val, .. } => write!(f, "{}, val = {}", base, print_ts(*val)),
            Op::SetVal { obj, val, .. } => {
                let val = match val {
                    ConValue::Ref(r) => print_ts(*r),
                    ConValue::Val(v) => v.to_string(),
                };
                write!(f, "{}, obj = {}, val = {}", base, print_ts(*obj), val)
            }
            Op::InsObj { obj, data, .. } => {
                let pairs: Vec<_> = data
                    .iter()
                    .map(|(k, v)| format!("{:?}: {}", k, print_ts(*v)))
                    .collect();
                write!(f, "{}, obj = {} {{ {} }}", base, print_ts(*obj), pairs.join(", "))
            }
            Op::InsStr {
                obj, after, data, ..
            } => write!(
                f,
                "{}, obj = {} {{ {} ← {:?} }}",
                base,
                print_ts(*obj),
                print_ts(*after),
                data
            ),
            Op::InsBin {
                obj, after, data, ..
            } => write!(
                f,
                "{}, obj = {} {{ {} ← {:?} }}",
                base,
                print_ts(*obj),
                print_ts(*after),
                data
            ),
            Op::InsArr {
                obj, after, data, ..
            } => {
                let items: Vec<_> = data.iter().map(|v| print_ts(*v)).collect();
                write!(
                    f,
                    "{}, obj = {} {{ {} ← [{}] }}",
                    base,
                    print_ts(*obj),
                    print_ts(*after),
                    items.join(", ")
                )
            }
            Op::Del { obj, after, len, .. } => write!(
                f,
                "{}, obj = {} {{ {}!{} }}",
                base,
                print_ts(*obj),
                print_ts(*after),
                len
            ),
            _ => write!(f, "{}", base),
        }
    }
}
