//! Ergonomic editing API for JSON CRDT documents.
//!
//! # Overview
//!
//! [`ModelApi`] wraps a [`Model`] and a [`PatchBuilder`]. Every editing call
//! resolves its path and positions against the current document, emits
//! operations through the builder and applies them to the model right away.
//! [`ModelApi::commit`] hands out the accumulated patch for shipping to other
//! replicas. Until then every applied edit is also parked on
//! [`Model::patches`], so edits that are never committed are still handed out
//! later by [`Model::flush_patch`].
//!
//! Positions are turned into timestamps before anything is emitted: an
//! insert at `index` is anchored on the element at `index - 1`, or on the
//! node itself when `index == 0`.

use serde_json::Value;
use tracing::debug;

use crate::json_crdt::constants::UNDEFINED_ID;
use crate::json_crdt::error::ModelError;
use crate::json_crdt::model::{Model, PathStep};
use crate::json_crdt::nodes::rga::{ChunkData, Rga};
use crate::json_crdt_patch::clock::Ts;
use crate::json_crdt_patch::operations::ConValue;
use crate::json_crdt_patch::patch::Patch;
use crate::json_crdt_patch::patch_builder::PatchBuilder;

/// Coordinates editing operations on a JSON CRDT document.
pub struct ModelApi<'a> {
    /// The document model being edited.
    pub model: &'a mut Model,
    /// Builder that accumulates the operations of the current patch.
    pub builder: PatchBuilder,
    /// Number of builder operations already applied to the model.
    applied: usize,
    /// Number of patches this api parked on the model since the last flush.
    parked: usize,
}

impl<'a> ModelApi<'a> {
    /// Create a new `ModelApi` for `model`.
    ///
    /// The builder starts from a copy of the model's clock, so all newly
    /// allocated timestamps are ahead of any operation the model has seen.
    pub fn new(model: &'a mut Model) -> Self {
        let builder = PatchBuilder::from_clock(model.clock.clone());
        Self {
            model,
            builder,
            applied: 0,
            parked: 0,
        }
    }

    /// Apply the builder's not yet applied operations to the model and park
    /// them there until they are flushed.
    fn apply(&mut self) {
        let pending = &self.builder.patch.ops[self.applied..];
        if pending.is_empty() {
            return;
        }
        for op in pending {
            self.model.apply_operation(op);
        }
        self.model.patches.push(Patch::from_ops(pending.to_vec()));
        self.parked += 1;
        self.applied = self.builder.patch.ops.len();
        self.model.tick += 1;
    }

    /// Hands out the accumulated patch for shipping. The model keeps no copy.
    /// Returns an empty patch if nothing was edited.
    pub fn commit(&mut self) -> Patch {
        let patch = self.flush();
        if let Some(id) = patch.get_id() {
            debug!(patch = %id, ops = patch.ops.len(), "committing local patch");
        }
        patch
    }

    /// Takes the accumulated patch and unparks its pieces from the model.
    ///
    /// Operations pushed onto `builder` directly are applied first.
    pub fn flush(&mut self) -> Patch {
        self.apply();
        let kept = self.model.patches.len().saturating_sub(self.parked);
        self.model.patches.truncate(kept);
        self.parked = 0;
        self.applied = 0;
        self.builder.flush()
    }

    // ── Root ──────────────────────────────────────────────────────────────

    /// Build `json` as new nodes and point the document root at them.
    pub fn root(&mut self, json: &Value) -> Ts {
        let id = self.builder.json(json);
        self.builder.root(id);
        self.apply();
        id
    }

    // ── Val editing ───────────────────────────────────────────────────────

    /// Write the register at `path`.
    ///
    /// Scalars are stored inline, arrays and objects are built as new nodes
    /// and referenced.
    pub fn val_set(&mut self, path: &[PathStep], json: &Value) -> Result<(), ModelError> {
        let val_id = self.model.find_val(path)?.id;
        let val = match json {
            Value::Array(_) | Value::Object(_) => ConValue::Ref(self.builder.json(json)),
            scalar => ConValue::Val(scalar.clone()),
        };
        self.builder.set_val(val_id, val);
        self.apply();
        Ok(())
    }

    // ── Obj editing ───────────────────────────────────────────────────────

    /// Set one or more key→value pairs on the object at `path`.
    pub fn obj_set(
        &mut self,
        path: &[PathStep],
        entries: &[(&str, Value)],
    ) -> Result<(), ModelError> {
        let obj_id = self.model.find_obj(path)?.id;
        if entries.is_empty() {
            return Ok(());
        }
        let pairs: Vec<(String, Ts)> = entries
            .iter()
            .map(|(key, value)| ((*key).to_owned(), self.builder.json(value)))
            .collect();
        self.builder.set_keys(obj_id, pairs);
        self.apply();
        Ok(())
    }

    /// Delete keys from the object at `path` by writing `undefined` to them.
    pub fn obj_del(&mut self, path: &[PathStep], keys: &[&str]) -> Result<(), ModelError> {
        let obj_id = self.model.find_obj(path)?.id;
        if keys.is_empty() {
            return Ok(());
        }
        let pairs = keys
            .iter()
            .map(|key| ((*key).to_owned(), UNDEFINED_ID))
            .collect();
        self.builder.set_keys(obj_id, pairs);
        self.apply();
        Ok(())
    }

    // ── Str editing ───────────────────────────────────────────────────────

    /// Insert `text` at character position `index` of the string at `path`.
    ///
    /// `index == 0` inserts before the first character; `index == length`
    /// appends to the end.
    pub fn str_ins(
        &mut self,
        path: &[PathStep],
        index: usize,
        text: &str,
    ) -> Result<(), ModelError> {
        if text.is_empty() {
            return Err(ModelError::EmptyWrite);
        }
        let node = self.model.find_str(path)?;
        let (str_id, after) = (node.id, anchor(node.id, &node.rga, index)?);
        self.builder.ins_str(str_id, after, text.to_owned());
        self.apply();
        Ok(())
    }

    /// Delete `length` characters starting at position `index`.
    pub fn str_del(
        &mut self,
        path: &[PathStep],
        index: usize,
        length: usize,
    ) -> Result<(), ModelError> {
        let node = self.model.find_str(path)?;
        let str_id = node.id;
        let spans = node.rga.find_id_spans(index, length)?;
        self.builder.del_spans(str_id, &spans);
        self.apply();
        Ok(())
    }

    // ── Bin editing ───────────────────────────────────────────────────────

    pub fn bin_ins(
        &mut self,
        path: &[PathStep],
        index: usize,
        data: &[u8],
    ) -> Result<(), ModelError> {
        if data.is_empty() {
            return Err(ModelError::EmptyWrite);
        }
        let node = self.model.find_bin(path)?;
        let (bin_id, after) = (node.id, anchor(node.id, &node.rga, index)?);
        self.builder.ins_bin(bin_id, after, data.to_vec());
        self.apply();
        Ok(())
    }

    pub fn bin_del(
        &mut self,
        path: &[PathStep],
        index: usize,
        length: usize,
    ) -> Result<(), ModelError> {
        let node = self.model.find_bin(path)?;
        let bin_id = node.id;
        let spans = node.rga.find_id_spans(index, length)?;
        self.builder.del_spans(bin_id, &spans);
        self.apply();
        Ok(())
    }

    // ── Arr editing ───────────────────────────────────────────────────────

    /// Insert `values` at position `index` of the array at `path`. Each value
    /// is built as new nodes.
    pub fn arr_ins(
        &mut self,
        path: &[PathStep],
        index: usize,
        values: &[Value],
    ) -> Result<(), ModelError> {
        if values.is_empty() {
            return Err(ModelError::EmptyWrite);
        }
        let node = self.model.find_arr(path)?;
        let (arr_id, after) = (node.id, anchor(node.id, &node.rga, index)?);
        let ids: Vec<Ts> = values.iter().map(|v| self.builder.json(v)).collect();
        self.builder.ins_arr(arr_id, after, ids);
        self.apply();
        Ok(())
    }

    pub fn arr_del(
        &mut self,
        path: &[PathStep],
        index: usize,
        length: usize,
    ) -> Result<(), ModelError> {
        let node = self.model.find_arr(path)?;
        let arr_id = node.id;
        let spans = node.rga.find_id_spans(index, length)?;
        self.builder.del_spans(arr_id, &spans);
        self.apply();
        Ok(())
    }
}

/// The element an insert at `index` goes after.
fn anchor<T: ChunkData>(node_id: Ts, rga: &Rga<T>, index: usize) -> Result<Ts, ModelError> {
    if index == 0 {
        Ok(node_id)
    } else {
        rga.find_id(index - 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const SID: u64 = 200_000;

    #[test]
    fn str_editing() {
        let mut model = Model::new(SID);
        let mut api = model.api();
        api.root(&json!("hello"));
        api.str_ins(&[], 5, " world").unwrap();
        api.str_ins(&[], 0, ">").unwrap();
        api.str_del(&[], 1, 1).unwrap();
        assert_eq!(api.model.view(), json!(">ello world"));
        assert_eq!(api.str_ins(&[], 99, "x"), Err(ModelError::OutOfBounds));
        assert_eq!(api.str_ins(&[], 0, ""), Err(ModelError::EmptyWrite));
        assert_eq!(api.str_del(&[], 10, 5), Err(ModelError::OutOfBounds));
    }

    #[test]
    fn bin_editing() {
        let mut model = Model::new(SID);
        let mut api = model.api();
        let bin = api.builder.bin();
        api.builder.root(bin);
        api.apply();
        api.bin_ins(&[], 0, &[1, 2, 3]).unwrap();
        api.bin_ins(&[], 1, &[9]).unwrap();
        api.bin_del(&[], 2, 2).unwrap();
        assert_eq!(model.view(), json!([1, 9]));
    }

    #[test]
    fn arr_editing() {
        let mut model = Model::new(SID);
        let mut api = model.api();
        api.root(&json!([1, 2]));
        api.arr_ins(&[], 1, &[json!("x"), json!({"k": null})]).unwrap();
        assert_eq!(api.model.view(), json!([1, "x", {"k": null}, 2]));
        api.arr_del(&[], 0, 2).unwrap();
        assert_eq!(api.model.view(), json!([{"k": null}, 2]));
        api.str_ins(&[PathStep::Index(0)], 0, "?").unwrap_err();
        assert_eq!(
            api.arr_ins(&[], 5, &[json!(1)]),
            Err(ModelError::OutOfBounds)
        );
    }

    #[test]
    fn obj_editing() {
        let mut model = Model::new(SID);
        let mut api = model.api();
        api.root(&json!({"a": 1}));
        api.obj_set(&[], &[("b", json!([true])), ("a", json!(2))]).unwrap();
        assert_eq!(api.model.view(), json!({"a": 2, "b": [true]}));
        api.obj_del(&[], &["a"]).unwrap();
        assert_eq!(api.model.view(), json!({"b": [true]}));
        assert_eq!(
            api.obj_set(&["b".into()], &[("x", json!(1))]),
            Err(ModelError::NotObj)
        );
    }

    #[test]
    fn val_editing() {
        let mut model = Model::new(SID);
        let mut api = model.api();
        let val = api.builder.val();
        api.builder.root(val);
        api.apply();
        api.val_set(&[], &json!(3)).unwrap();
        assert_eq!(api.model.view(), json!(3));
        api.val_set(&[], &json!({"deep": "x"})).unwrap();
        assert_eq!(api.model.view(), json!({"deep": "x"}));
        api.str_ins(&["deep".into()], 1, "y").unwrap();
        assert_eq!(api.model.view(), json!({"deep": "xy"}));
    }

    #[test]
    fn commit_yields_replayable_patch() {
        let mut model = Model::new(SID);
        let mut api = model.api();
        api.root(&json!({"list": [], "text": ""}));
        api.arr_ins(&["list".into()], 0, &[json!(1)]).unwrap();
        api.str_ins(&["text".into()], 0, "hi").unwrap();
        let patch = api.commit();
        assert!(api.commit().ops.is_empty());

        let mut replica = Model::new(SID + 1);
        replica.apply_patch(&patch);
        assert_eq!(replica.view(), model.view());
    }

    #[test]
    fn shipped_commits_are_not_buffered() {
        let mut model = Model::new(SID);
        model.api().root(&json!(""));
        model.patches.clear();
        for n in 0..50 {
            let mut api = model.api();
            api.str_ins(&[], n, "x").unwrap();
            assert!(!api.commit().ops.is_empty());
        }
        assert!(model.patches.is_empty());
        assert_eq!(model.find_str(&[]).unwrap().size(), 50);
    }

    #[test]
    fn dropped_api_parks_uncommitted_edits() {
        let mut model = Model::new(SID);
        model.api().root(&json!({"a": 1}));
        {
            let mut api = model.api();
            api.obj_set(&[], &[("b", json!(2))]).unwrap();
            api.commit();
            api.obj_set(&[], &[("c", json!(3))]).unwrap();
        }
        assert_eq!(model.patches.len(), 2);

        let mut replica = Model::new(SID + 1);
        replica.apply_patch(&model.flush_patch().unwrap());
        assert_eq!(replica.view(), json!({"a": 1, "c": 3}));
        assert!(model.patches.is_empty());
    }

    #[test]
    fn edits_after_commit_continue_the_clock() {
        let mut model = Model::new(SID);
        let mut api = model.api();
        api.root(&json!("a"));
        let p1 = api.commit();
        api.str_ins(&[], 1, "b").unwrap();
        let p2 = api.commit();
        assert_eq!(p2.get_id().map(|id| id.time), Some(p1.next_time()));
    }
}
