#![allow(dead_code)]

use json_crdt::json_crdt::Model;
use json_crdt::json_crdt_patch::patch::Patch;
use serde_json::json;

pub const ALICE: u64 = 100_001;
pub const BOB: u64 = 100_002;
pub const CAROL: u64 = 100_003;

/// A single text edit. Positions are reduced modulo the current length, so
/// any generated edit applies to any document.
#[derive(Debug, Clone)]
pub enum Edit {
    Ins(usize, String),
    Del(usize, usize),
}

/// A model of session `sid` whose root is the string `text`, and the patch
/// that created it.
pub fn text_doc(sid: u64, text: &str) -> (Model, Patch) {
    let mut model = Model::new(sid);
    let mut api = model.api();
    api.root(&json!(text));
    let patch = api.commit();
    (model, patch)
}

/// Applies `edits` to the root string of `model`, one patch per edit.
pub fn apply_edits(model: &mut Model, edits: &[Edit]) -> Vec<Patch> {
    let mut patches = Vec::new();
    for edit in edits {
        let len = model.find_str(&[]).expect("root is a string").size();
        let mut api = model.api();
        match edit {
            Edit::Ins(pos, text) => {
                api.str_ins(&[], pos % (len + 1), text).expect("insert in bounds");
            }
            Edit::Del(pos, n) => {
                if len == 0 {
                    continue;
                }
                let pos = pos % len;
                api.str_del(&[], pos, (*n).min(len - pos)).expect("delete in bounds");
            }
        }
        patches.push(api.commit());
    }
    patches
}

pub fn apply_all(model: &mut Model, patches: &[Patch]) {
    for patch in patches {
        model.apply_patch(patch);
    }
}

pub fn root_text(model: &Model) -> String {
    model.find_str(&[]).expect("root is a string").view_str()
}
