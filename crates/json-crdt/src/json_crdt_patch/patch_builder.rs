//! [`PatchBuilder`]: fluent builder for constructing [`Patch`]es.
//!
//! The builder works purely in timestamps. Turning a position inside a
//! sequence into the `after` timestamp is the job of the caller (see
//! `ModelApi`), which queries the target node before emitting.

use serde_json::Value;

use crate::json_crdt_patch::clock::{ts, Clock, Ts, Tss};
use crate::json_crdt_patch::constants::{FALSE_ID, NULL_ID, TRUE_ID};
use crate::json_crdt_patch::operations::{ConValue, Op};
use crate::json_crdt_patch::patch::Patch;

/// Utility for constructing a [`Patch`] operation by operation.
#[derive(Debug, Clone)]
pub struct PatchBuilder {
    pub clock: Clock,
    pub patch: Patch,
}

impl PatchBuilder {
    /// Creates a new builder with a logical vector clock.
    pub fn new(sid: u64, time: u64) -> Self {
        Self::from_clock(Clock::logical(sid, time))
    }

    pub fn from_clock(clock: Clock) -> Self {
        Self {
            clock,
            patch: Patch::new(),
        }
    }

    /// Returns the time of the next operation's timestamp.
    pub fn next_time(&self) -> u64 {
        match self.patch.next_time() {
            0 => self.clock.time(),
            t => t,
        }
    }

    /// Returns the accumulated patch and resets the builder.
    pub fn flush(&mut self) -> Patch {
        std::mem::take(&mut self.patch)
    }

    // ── Padding ────────────────────────────────────────────────────────────

    /// Adds a `Nop` if the clock has drifted ahead of the patch's last op, so
    /// the patch stays contiguous in time.
    pub fn pad(&mut self) {
        let next_time = self.patch.next_time();
        if next_time == 0 {
            return;
        }
        let drift = self.clock.time().saturating_sub(next_time);
        if drift > 0 {
            let id = ts(self.clock.sid(), next_time);
            self.patch.ops.push(Op::Nop { id, len: drift });
        }
    }

    fn push(&mut self, op: Op) -> Ts {
        let id = op.id();
        self.patch.ops.push(op);
        id
    }

    // ── Creation operations ────────────────────────────────────────────────

    /// Create an immutable constant.
    pub fn con(&mut self, val: Value) -> Ts {
        self.pad();
        let id = self.clock.tick(1);
        self.push(Op::NewCon { id, val })
    }

    /// Create an empty LWW register.
    pub fn val(&mut self) -> Ts {
        self.pad();
        let id = self.clock.tick(1);
        self.push(Op::NewVal { id })
    }

    /// Create an empty LWW map.
    pub fn obj(&mut self) -> Ts {
        self.pad();
        let id = self.clock.tick(1);
        self.push(Op::NewObj { id })
    }

    /// Create an empty RGA string.
    pub fn str_node(&mut self) -> Ts {
        self.pad();
        let id = self.clock.tick(1);
        self.push(Op::NewStr { id })
    }

    /// Create an empty RGA byte buffer.
    pub fn bin(&mut self) -> Ts {
        self.pad();
        let id = self.clock.tick(1);
        self.push(Op::NewBin { id })
    }

    /// Create an empty RGA array.
    pub fn arr(&mut self) -> Ts {
        self.pad();
        let id = self.clock.tick(1);
        self.push(Op::NewArr { id })
    }

    // ── Mutation operations ────────────────────────────────────────────────

    /// Point the document root at `val`.
    pub fn root(&mut self, val: Ts) -> Ts {
        self.pad();
        let id = self.clock.tick(1);
        self.push(Op::SetRoot { id, val })
    }

    /// Write a register.
    pub fn set_val(&mut self, obj: Ts, val: ConValue) -> Ts {
        self.pad();
        let id = self.clock.tick(1);
        self.push(Op::SetVal { id, obj, val })
    }

    /// Write key → value pairs of a map. Emits nothing for an empty list.
    pub fn set_keys(&mut self, obj: Ts, data: Vec<(String, Ts)>) -> Option<Ts> {
        if data.is_empty() {
            return None;
        }
        self.pad();
        let id = self.clock.tick(1);
        Some(self.push(Op::InsObj { id, obj, data }))
    }

    /// Insert text after element `after` of a string.
    ///
    /// Inserts take no clock cycles when empty, so an empty payload emits
    /// nothing and returns `None`. The same holds for `ins_bin`/`ins_arr`.
    pub fn ins_str(&mut self, obj: Ts, after: Ts, data: String) -> Option<Ts> {
        if data.is_empty() {
            return None;
        }
        self.pad();
        let id = self.clock.tick(data.chars().count() as u64);
        Some(self.push(Op::InsStr {
            id,
            obj,
            after,
            data,
        }))
    }

    /// Insert bytes after element `after` of a byte buffer.
    pub fn ins_bin(&mut self, obj: Ts, after: Ts, data: Vec<u8>) -> Option<Ts> {
        if data.is_empty() {
            return None;
        }
        self.pad();
        let id = self.clock.tick(data.len() as u64);
        Some(self.push(Op::InsBin {
            id,
            obj,
            after,
            data,
        }))
    }

    /// Insert node references after element `after` of an array.
    pub fn ins_arr(&mut self, obj: Ts, after: Ts, data: Vec<Ts>) -> Option<Ts> {
        if data.is_empty() {
            return None;
        }
        self.pad();
        let id = self.clock.tick(data.len() as u64);
        Some(self.push(Op::InsArr {
            id,
            obj,
            after,
            data,
        }))
    }

    /// Delete `len` elements of a sequence, starting at element `after`.
    pub fn del(&mut self, obj: Ts, after: Ts, len: u64) -> Ts {
        self.pad();
        let id = self.clock.tick(1);
        self.push(Op::Del { id, obj, after, len })
    }

    /// One `del` per contiguous span, as returned by `find_id_spans`.
    pub fn del_spans(&mut self, obj: Ts, spans: &[Tss]) {
        for span in spans {
            self.del(obj, span.ts(), span.span);
        }
    }

    /// Consume `span` clock cycles.
    pub fn nop(&mut self, span: u64) -> Ts {
        self.pad();
        let id = self.clock.tick(span);
        self.push(Op::Nop { id, len: span })
    }

    // ── JSON helpers ───────────────────────────────────────────────────────

    /// Recursively build nodes for a JSON value and return the id of the
    /// outermost one.
    ///
    /// `null`, `true` and `false` map to the reserved literal ids and emit
    /// nothing. Numbers become constants, strings become RGA strings.
    pub fn json(&mut self, value: &Value) -> Ts {
        match value {
            Value::Null => NULL_ID,
            Value::Bool(true) => TRUE_ID,
            Value::Bool(false) => FALSE_ID,
            Value::Number(_) => self.con(value.clone()),
            Value::String(s) => {
                let str_id = self.str_node();
                self.ins_str(str_id, str_id, s.clone());
                str_id
            }
            Value::Array(items) => {
                let arr_id = self.arr();
                let ids: Vec<Ts> = items.iter().map(|item| self.json(item)).collect();
                self.ins_arr(arr_id, arr_id, ids);
                arr_id
            }
            Value::Object(map) => {
                let obj_id = self.obj();
                let pairs: Vec<(String, Ts)> = map
                    .iter()
                    .map(|(k, v)| (k.clone(), self.json(v)))
                    .collect();
                self.set_keys(obj_id, pairs);
                obj_id
            }
        }
    }
}
