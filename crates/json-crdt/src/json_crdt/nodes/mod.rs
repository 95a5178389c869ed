//! JSON CRDT node types.
//!
//! # Node Types
//!
//! | Rust type   | Semantics                          |
//! |-------------|------------------------------------|
//! | `ConNode`   | Immutable constant value           |
//! | `ValNode`   | Last-write-wins single register    |
//! | `ObjNode`   | LWW key→value map                  |
//! | `StrNode`   | RGA string                         |
//! | `BinNode`   | RGA binary blob                    |
//! | `ArrNode`   | RGA array of node references       |
//! | `RootNode`  | Document root (LWW register)       |
//!
//! Nodes never hold references to each other. Anything that resolves a child
//! id takes the owning [`NodeIndex`] as a parameter.

pub mod rga;

use std::collections::HashMap;

use indexmap::IndexMap;
use serde_json::Value;

use crate::json_crdt::constants::{literals, ORIGIN, UNDEFINED_ID};
use crate::json_crdt_patch::clock::{Ts, Tss};
use crate::json_crdt_patch::enums::JsonCrdtDataType;
use crate::json_crdt_patch::operations::ConValue;
use rga::Rga;

/// Map from timestamp ID to CRDT node.
pub type NodeIndex = HashMap<Ts, CrdtNode>;

/// An index holding only the literal constants `null`, `true`, `false` and
/// `undefined`.
pub fn new_index() -> NodeIndex {
    literals()
        .into_iter()
        .map(|(id, val)| (id, CrdtNode::Con(ConNode { id, val })))
        .collect()
}

/// View of the node `id`. `None` when the id is unknown or resolves to
/// `undefined`.
pub fn view_of(index: &NodeIndex, id: Ts) -> Option<Value> {
    index.get(&id).and_then(|node| node.view(index))
}

// ── ConNode ───────────────────────────────────────────────────────────────

/// Immutable constant node.
#[derive(Debug, Clone, PartialEq)]
pub struct ConNode {
    pub id: Ts,
    /// `None` is `undefined`.
    pub val: Option<Value>,
}

impl ConNode {
    pub fn new(id: Ts, val: Value) -> Self {
        Self { id, val: Some(val) }
    }

    pub fn view(&self) -> Option<Value> {
        self.val.clone()
    }
}

// ── ValNode ───────────────────────────────────────────────────────────────

/// Last-write-wins register.
#[derive(Debug, Clone, PartialEq)]
pub struct ValNode {
    pub id: Ts,
    /// Id of the operation that wrote the current value.
    pub write_id: Ts,
    pub val: ConValue,
}

impl ValNode {
    /// An empty register, holding `undefined`.
    pub fn new(id: Ts) -> Self {
        Self {
            id,
            write_id: ORIGIN,
            val: ConValue::Ref(UNDEFINED_ID),
        }
    }

    /// Stores `val` if `write_id` is strictly newer than the current write.
    pub fn set(&mut self, write_id: Ts, val: ConValue) -> bool {
        if write_id > self.write_id {
            self.write_id = write_id;
            self.val = val;
            true
        } else {
            false
        }
    }

    /// The id of the referenced node, if the register holds a reference.
    pub fn child(&self) -> Option<Ts> {
        match &self.val {
            ConValue::Ref(id) => Some(*id),
            ConValue::Val(_) => None,
        }
    }

    pub fn view(&self, index: &NodeIndex) -> Option<Value> {
        match &self.val {
            ConValue::Ref(id) => view_of(index, *id),
            ConValue::Val(v) => Some(v.clone()),
        }
    }
}

// ── ObjNode ───────────────────────────────────────────────────────────────

/// One key slot of an [`ObjNode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObjEntry {
    /// Id of the operation that wrote this key.
    pub write_id: Ts,
    /// Id of the value node. `UNDEFINED_ID` marks a deleted key.
    pub value: Ts,
}

/// Last-write-wins map from string keys to node ids.
///
/// Keys keep the order in which they were first written.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjNode {
    pub id: Ts,
    pub keys: IndexMap<String, ObjEntry>,
}

impl ObjNode {
    pub fn new(id: Ts) -> Self {
        Self {
            id,
            keys: IndexMap::new(),
        }
    }

    /// Writes `key` if `write_id` is strictly newer than the key's current
    /// write. Returns whether the slot changed.
    pub fn put(&mut self, key: &str, write_id: Ts, value: Ts) -> bool {
        match self.keys.get_mut(key) {
            Some(entry) if write_id <= entry.write_id => false,
            Some(entry) => {
                *entry = ObjEntry { write_id, value };
                true
            }
            None => {
                self.keys.insert(key.to_owned(), ObjEntry { write_id, value });
                true
            }
        }
    }

    /// Id of the value under `key`, or `None` if the key is absent.
    pub fn get(&self, key: &str) -> Option<Ts> {
        self.keys
            .get(key)
            .map(|e| e.value)
            .filter(|v| *v != UNDEFINED_ID)
    }

    /// Builds a JSON object; keys whose value views as `undefined` are left
    /// out.
    pub fn view(&self, index: &NodeIndex) -> Value {
        let mut map = serde_json::Map::new();
        for (key, entry) in &self.keys {
            if let Some(val) = view_of(index, entry.value) {
                map.insert(key.clone(), val);
            }
        }
        Value::Object(map)
    }
}

// ── StrNode ───────────────────────────────────────────────────────────────

/// RGA string node.
#[derive(Debug, Clone)]
pub struct StrNode {
    pub id: Ts,
    pub rga: Rga<String>,
}

impl StrNode {
    pub fn new(id: Ts) -> Self {
        Self {
            id,
            rga: Rga::new(id),
        }
    }

    pub fn ins(&mut self, after: Ts, id: Ts, data: String) -> bool {
        self.rga.insert(after, id, data)
    }

    pub fn delete(&mut self, spans: &[Tss]) {
        self.rga.delete(spans);
    }

    pub fn view_str(&self) -> String {
        self.rga.view()
    }

    pub fn view(&self) -> Value {
        Value::String(self.view_str())
    }

    /// Number of live characters.
    pub fn size(&self) -> usize {
        self.rga.length()
    }
}

// ── BinNode ───────────────────────────────────────────────────────────────

/// RGA binary node.
#[derive(Debug, Clone)]
pub struct BinNode {
    pub id: Ts,
    pub rga: Rga<Vec<u8>>,
}

impl BinNode {
    pub fn new(id: Ts) -> Self {
        Self {
            id,
            rga: Rga::new(id),
        }
    }

    pub fn ins(&mut self, after: Ts, id: Ts, data: Vec<u8>) -> bool {
        self.rga.insert(after, id, data)
    }

    pub fn delete(&mut self, spans: &[Tss]) {
        self.rga.delete(spans);
    }

    pub fn view_bytes(&self) -> Vec<u8> {
        self.rga.view()
    }

    /// View as a JSON array of byte values.
    pub fn view(&self) -> Value {
        Value::Array(
            self.view_bytes()
                .into_iter()
                .map(|b| Value::Number(b.into()))
                .collect(),
        )
    }

    pub fn size(&self) -> usize {
        self.rga.length()
    }
}

// ── ArrNode ───────────────────────────────────────────────────────────────

/// RGA array of node-ID references.
#[derive(Debug, Clone)]
pub struct ArrNode {
    pub id: Ts,
    pub rga: Rga<Vec<Ts>>,
}

impl ArrNode {
    pub fn new(id: Ts) -> Self {
        Self {
            id,
            rga: Rga::new(id),
        }
    }

    /// Insert node IDs after `after`.
    pub fn ins(&mut self, after: Ts, id: Ts, data: Vec<Ts>) -> bool {
        self.rga.insert(after, id, data)
    }

    pub fn delete(&mut self, spans: &[Tss]) {
        self.rga.delete(spans);
    }

    /// Id of the node stored at live position `index`.
    pub fn get(&self, index: usize) -> Option<Ts> {
        self.rga.find_value(index).ok()
    }

    pub fn size(&self) -> usize {
        self.rga.length()
    }

    /// Elements that view as `undefined` (or are unknown) become `null`.
    pub fn view(&self, index: &NodeIndex) -> Value {
        let items = self
            .rga
            .iter_live()
            .filter_map(|chunk| chunk.data.as_ref())
            .flatten()
            .map(|id| view_of(index, *id).unwrap_or(Value::Null))
            .collect();
        Value::Array(items)
    }
}

// ── RootNode ──────────────────────────────────────────────────────────────

/// Document root: a LWW register pointing to the root JSON node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RootNode {
    pub write_id: Ts,
    pub val: Ts,
}

impl RootNode {
    pub fn new() -> Self {
        Self {
            write_id: ORIGIN,
            val: UNDEFINED_ID,
        }
    }

    pub fn set(&mut self, write_id: Ts, val: Ts) -> bool {
        if write_id > self.write_id {
            self.write_id = write_id;
            self.val = val;
            true
        } else {
            false
        }
    }

    pub fn view(&self, index: &NodeIndex) -> Option<Value> {
        view_of(index, self.val)
    }
}

impl Default for RootNode {
    fn default() -> Self {
        Self::new()
    }
}

// ── CrdtNode enum ─────────────────────────────────────────────────────────

/// All possible CRDT node types.
#[derive(Debug, Clone)]
pub enum CrdtNode {
    Con(ConNode),
    Val(ValNode),
    Obj(ObjNode),
    Str(StrNode),
    Bin(BinNode),
    Arr(ArrNode),
}

impl CrdtNode {
    pub fn id(&self) -> Ts {
        match self {
            Self::Con(n) => n.id,
            Self::Val(n) => n.id,
            Self::Obj(n) => n.id,
            Self::Str(n) => n.id,
            Self::Bin(n) => n.id,
            Self::Arr(n) => n.id,
        }
    }

    /// JSON view of the node, `None` for `undefined`.
    pub fn view(&self, index: &NodeIndex) -> Option<Value> {
        match self {
            Self::Con(n) => n.view(),
            Self::Val(n) => n.view(index),
            Self::Obj(n) => Some(n.view(index)),
            Self::Str(n) => Some(n.view()),
            Self::Bin(n) => Some(n.view()),
            Self::Arr(n) => Some(n.view(index)),
        }
    }

    pub fn data_type(&self) -> JsonCrdtDataType {
        match self {
            Self::Con(_) => JsonCrdtDataType::Con,
            Self::Val(_) => JsonCrdtDataType::Val,
            Self::Obj(_) => JsonCrdtDataType::Obj,
            Self::Str(_) => JsonCrdtDataType::Str,
            Self::Bin(_) => JsonCrdtDataType::Bin,
            Self::Arr(_) => JsonCrdtDataType::Arr,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Con(_) => "con",
            Self::Val(_) => "val",
            Self::Obj(_) => "obj",
            Self::Str(_) => "str",
            Self::Bin(_) => "bin",
            Self::Arr(_) => "arr",
        }
    }
}
