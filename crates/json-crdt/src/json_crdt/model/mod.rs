//! JSON CRDT document model.
//!
//! # Overview
//!
//! A [`Model`] is the in-memory representation of a JSON CRDT document.
//! It contains a node index (all known CRDT nodes keyed by their timestamp ID),
//! the root register, and the clock that tracks which operations have been
//! seen.
//!
//! Operations are applied via [`Model::apply_patch`] or
//! [`Model::apply_operation`]. Both are idempotent. Local edits go through
//! [`Model::api`]. The resulting JSON view can be obtained with
//! [`Model::view`].

pub mod api;
pub mod find;
pub mod util;

pub use api::ModelApi;
pub use find::PathStep;

use serde_json::Value;
use tracing::{debug, trace};

use crate::json_crdt::nodes::{
    new_index, ArrNode, BinNode, ConNode, CrdtNode, NodeIndex, ObjNode, RootNode, StrNode,
    ValNode,
};
use crate::json_crdt_patch::clock::{Clock, Ts, Tss};
use crate::json_crdt_patch::compaction::combine;
use crate::json_crdt_patch::enums::SESSION;
use crate::json_crdt_patch::operations::{ConValue, Op};
use crate::json_crdt_patch::patch::{Patch, PatchError};
use util::random_session_id;

/// In-memory JSON CRDT document model.
///
/// Owns its node index and clock outright; clones share nothing.
#[derive(Debug, Clone)]
pub struct Model {
    /// Document root: a LWW register pointing at the top-level JSON value.
    pub root: RootNode,
    /// All CRDT nodes keyed by their timestamp ID, literal constants included.
    pub index: NodeIndex,
    pub clock: Clock,
    /// Mutation counter, bumped once per applied patch or API edit.
    pub tick: u64,
    /// Edits applied through [`ModelApi`] and not handed out by a commit.
    pub patches: Vec<Patch>,
}

impl Model {
    /// Create a new empty model with a logical clock for session `sid`.
    ///
    /// The clock starts at time `1`.
    pub fn new(sid: u64) -> Self {
        Self::from_clock(Clock::logical(sid, 1))
    }

    /// Create a model with a randomly-generated session ID.
    pub fn create() -> Self {
        Self::new(random_session_id())
    }

    /// Create a model with a server clock at the given time.
    pub fn new_server(time: u64) -> Self {
        Self::from_clock(Clock::server(time))
    }

    pub fn from_clock(clock: Clock) -> Self {
        Self {
            root: RootNode::new(),
            index: new_index(),
            clock,
            tick: 0,
            patches: Vec::new(),
        }
    }

    /// Return the JSON view of the current document state. An empty document
    /// views as `null`.
    pub fn view(&self) -> Value {
        self.root.view(&self.index).unwrap_or(Value::Null)
    }

    pub fn node(&self, id: Ts) -> Option<&CrdtNode> {
        self.index.get(&id)
    }

    /// Editing API bound to this model.
    pub fn api(&mut self) -> ModelApi<'_> {
        ModelApi::new(self)
    }

    // ── Forking ───────────────────────────────────────────────────────────

    /// Independent copy editing under a fresh random session.
    pub fn fork(&self) -> Model {
        let mut sid = random_session_id();
        while sid == self.clock.sid() {
            sid = random_session_id();
        }
        self.fork_with_sid(sid)
    }

    /// Independent copy editing under session `sid`. Uncommitted history is
    /// not carried over.
    pub fn fork_with_sid(&self, sid: u64) -> Model {
        Model {
            root: self.root.clone(),
            index: self.index.clone(),
            clock: self.clock.fork(sid),
            tick: self.tick,
            patches: Vec::new(),
        }
    }

    /// Coalesces every uncommitted API edit into one patch, with `Nop`
    /// fillers over gaps, and empties the buffer.
    pub fn flush_patch(&mut self) -> Result<Patch, PatchError> {
        combine(std::mem::take(&mut self.patches))
    }

    // ── Application ───────────────────────────────────────────────────────

    /// Apply all operations in `patch` to this model.
    pub fn apply_patch(&mut self, patch: &Patch) {
        let Some(id) = patch.get_id() else {
            return;
        };
        debug!(patch = %id, ops = patch.ops.len(), "applying patch");
        for op in &patch.ops {
            self.apply_operation(op);
        }
        self.tick += 1;
    }

    /// Apply a single operation.
    ///
    /// Re-applying an operation changes nothing. Operations that target an
    /// unknown node, a node of the wrong type, or an unknown sequence element
    /// are dropped.
    pub fn apply_operation(&mut self, op: &Op) {
        self.clock.observe(op.id(), op.span());

        match op {
            // ── Creation operations ────────────────────────────────────────
            Op::NewCon { id, val } => {
                self.index
                    .entry(*id)
                    .or_insert_with(|| CrdtNode::Con(ConNode::new(*id, val.clone())));
            }
            Op::NewVal { id } => {
                self.index
                    .entry(*id)
                    .or_insert_with(|| CrdtNode::Val(ValNode::new(*id)));
            }
            Op::NewObj { id } => {
                self.index
                    .entry(*id)
                    .or_insert_with(|| CrdtNode::Obj(ObjNode::new(*id)));
            }
            Op::NewStr { id } => {
                self.index
                    .entry(*id)
                    .or_insert_with(|| CrdtNode::Str(StrNode::new(*id)));
            }
            Op::NewBin { id } => {
                self.index
                    .entry(*id)
                    .or_insert_with(|| CrdtNode::Bin(BinNode::new(*id)));
            }
            Op::NewArr { id } => {
                self.index
                    .entry(*id)
                    .or_insert_with(|| CrdtNode::Arr(ArrNode::new(*id)));
            }

            // ── Mutation operations ────────────────────────────────────────
            Op::SetRoot { id, val } => {
                self.root.set(*id, *val);
            }

            Op::SetVal { id, obj, val } => match self.index.get_mut(obj) {
                Some(CrdtNode::Val(node)) => {
                    if let ConValue::Ref(child) = val {
                        if !is_child(node.id, *child) {
                            trace!(op = %id, "dropping set_val with older value");
                            return;
                        }
                    }
                    node.set(*id, val.clone());
                }
                _ => trace!(op = %id, obj = %obj, "set_val target is not a register"),
            },

            Op::InsObj { id, obj, data } => match self.index.get_mut(obj) {
                Some(CrdtNode::Obj(node)) => {
                    for (key, value) in data {
                        if is_child(node.id, *value) {
                            node.put(key, *id, *value);
                        }
                    }
                }
                _ => trace!(op = %id, obj = %obj, "ins_obj target is not an object"),
            },

            Op::InsStr {
                id,
                obj,
                after,
                data,
            } => match self.index.get_mut(obj) {
                Some(CrdtNode::Str(node)) => {
                    node.ins(*after, *id, data.clone());
                }
                _ => trace!(op = %id, obj = %obj, "ins_str target is not a string"),
            },

            Op::InsBin {
                id,
                obj,
                after,
                data,
            } => match self.index.get_mut(obj) {
                Some(CrdtNode::Bin(node)) => {
                    node.ins(*after, *id, data.clone());
                }
                _ => trace!(op = %id, obj = %obj, "ins_bin target is not a binary"),
            },

            Op::InsArr {
                id,
                obj,
                after,
                data,
            } => match self.index.get_mut(obj) {
                Some(CrdtNode::Arr(node)) => {
                    if !data.iter().all(|child| is_child(node.id, *child)) {
                        trace!(op = %id, "dropping ins_arr with older elements");
                        return;
                    }
                    node.ins(*after, *id, data.clone());
                }
                _ => trace!(op = %id, obj = %obj, "ins_arr target is not an array"),
            },

            Op::Del { id, obj, after, len } => {
                let span = [Tss::new(after.sid, after.time, *len)];
                match self.index.get_mut(obj) {
                    Some(CrdtNode::Str(node)) => node.delete(&span),
                    Some(CrdtNode::Bin(node)) => node.delete(&span),
                    Some(CrdtNode::Arr(node)) => node.delete(&span),
                    _ => trace!(op = %id, obj = %obj, "del target is not a sequence"),
                }
            }

            Op::Nop { .. } => {}
        }
    }
}

/// A container only accepts values created after itself, or the literal
/// constants. This keeps the node graph acyclic.
fn is_child(container: Ts, child: Ts) -> bool {
    child.sid == SESSION::SYSTEM || child.time > container.time
}
