//! Patch history log for a JSON CRDT document.
//!
//! # Overview
//!
//! A [`PatchLog`] stores the history of patches applied to a JSON CRDT
//! model. It consists of:
//!
//! - A `start` factory that produces a fresh copy of the baseline [`Model`].
//! - A [`BTreeMap`] of patches sorted by their id (time first, then session).
//! - An `end` [`Model`]: the baseline with all patches applied.
//!
//! The log supports replaying to any point in history via
//! [`PatchLog::replay_to_end`] and [`PatchLog::replay_to`], advancing the
//! baseline via [`PatchLog::advance_to`], and rebasing concurrent batches via
//! [`PatchLog::rebase_batch`].

use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::Arc;

use tracing::debug;

use crate::json_crdt::model::Model;
use crate::json_crdt_patch::batch::Batch;
use crate::json_crdt_patch::clock::{Clock, Ts};
use crate::json_crdt_patch::patch::{Patch, PatchError};

type StartFn = Arc<dyn Fn() -> Model + Send + Sync>;

/// History log for a JSON CRDT model.
pub struct PatchLog {
    /// Produces a fresh copy of the baseline model on every call.
    start_fn: StartFn,

    /// Ordered patch history keyed by patch id.
    pub patches: BTreeMap<Ts, Patch>,

    /// Current end state: the baseline with all patches applied.
    pub end: Model,
}

impl PatchLog {
    // ──────────────────────────────────────────────────────────────────────
    // Constructors
    // ──────────────────────────────────────────────────────────────────────

    /// Creates a log from a newly created model.
    ///
    /// The baseline is an empty model of the same session. Edits made through
    /// the model's API and never handed out by a commit become the first
    /// entry, so `end` and `replay_to_end()` agree.
    pub fn from_new_model(mut model: Model) -> Result<Self, PatchError> {
        let clock = if model.clock.is_server() {
            Clock::server(1)
        } else {
            Clock::logical(model.clock.sid(), 1)
        };
        let start_fn: StartFn = Arc::new(move || Model::from_clock(clock.clone()));
        let pending = model.flush_patch()?;
        let mut log = Self {
            start_fn,
            patches: BTreeMap::new(),
            end: model,
        };
        log.record(pending);
        Ok(log)
    }

    /// Creates a log that freezes `model` as its baseline.
    ///
    /// `end` starts as an independent copy of the same state.
    pub fn from_model(model: &Model) -> Self {
        let mut frozen = model.clone();
        frozen.patches.clear();
        let end = frozen.clone();
        let frozen = Arc::new(frozen);
        Self {
            start_fn: Arc::new(move || Model::clone(&frozen)),
            patches: BTreeMap::new(),
            end,
        }
    }

    // ──────────────────────────────────────────────────────────────────────
    // Core accessors
    // ──────────────────────────────────────────────────────────────────────

    /// Returns a fresh copy of the baseline model.
    pub fn start(&self) -> Model {
        (self.start_fn)()
    }

    // ──────────────────────────────────────────────────────────────────────
    // Patch ingestion
    // ──────────────────────────────────────────────────────────────────────

    /// Applies `patch` to `end` and records it in the history.
    pub fn push(&mut self, patch: Patch) {
        self.end.apply_patch(&patch);
        self.record(patch);
    }

    /// Records a patch in the history without applying it to `end`.
    ///
    /// Useful when the patch has already been applied to `end` externally.
    /// Empty patches are ignored.
    pub fn record(&mut self, patch: Patch) {
        if let Some(id) = patch.get_id() {
            debug!(patch = %id, ops = patch.ops.len(), "recording patch");
            self.patches.insert(id, patch);
        }
    }

    // ──────────────────────────────────────────────────────────────────────
    // Replay
    // ──────────────────────────────────────────────────────────────────────

    /// Replays all patches in the log onto a fresh `start()` model.
    pub fn replay_to_end(&self) -> Model {
        let mut model = self.start();
        for patch in self.patches.values() {
            model.apply_patch(patch);
        }
        debug!(patches = self.patches.len(), "replayed log to end");
        model
    }

    /// Replays patches from `start()` up to `ts`, including the patch with
    /// id `ts` when `inclusive` is set.
    pub fn replay_to(&self, ts: Ts, inclusive: bool) -> Model {
        let mut model = self.start();
        let upper = if inclusive {
            Bound::Included(ts)
        } else {
            Bound::Excluded(ts)
        };
        for patch in self.patches.range((Bound::Unbounded, upper)).map(|(_, p)| p) {
            model.apply_patch(patch);
        }
        debug!(to = %ts, inclusive, "replayed log");
        model
    }

    // ──────────────────────────────────────────────────────────────────────
    // Advance baseline
    // ──────────────────────────────────────────────────────────────────────

    /// Bakes every patch with id `<= ts` into the baseline and drops it from
    /// the history. `end` is unaffected.
    pub fn advance_to(&mut self, ts: Ts) {
        let mut later = self.patches.split_off(&ts);
        let at = later.remove(&ts);
        let baked = std::mem::replace(&mut self.patches, later);

        let mut base = self.start();
        for patch in baked.values().chain(at.iter()) {
            base.apply_patch(patch);
        }
        let count = baked.len() + usize::from(at.is_some());
        debug!(to = %ts, baked = count, "advanced log baseline");
        self.start_fn = Arc::new(move || base.clone());
    }

    // ──────────────────────────────────────────────────────────────────────
    // Batch rebase
    // ──────────────────────────────────────────────────────────────────────

    /// The latest patch authored by session `sid`.
    pub fn find_max(&self, sid: u64) -> Option<&Patch> {
        self.patches
            .iter()
            .rev()
            .find(|(id, _)| id.sid == sid)
            .map(|(_, patch)| patch)
    }

    /// Rebases `batch` to start right after the latest patch in the log, or
    /// after the latest patch of session `sid` when given.
    ///
    /// With nothing to rebase onto, the batch is returned unchanged.
    pub fn rebase_batch(&self, batch: &Batch, sid: Option<u64>) -> Result<Batch, PatchError> {
        let reference = match sid {
            Some(sid) => self.find_max(sid),
            None => self.patches.values().next_back(),
        };
        let Some(next_time) = reference.map(Patch::next_time) else {
            return Ok(batch.clone());
        };
        if batch.patches.is_empty() {
            return Ok(batch.clone());
        }
        batch.rebase(next_time)
    }

    // ──────────────────────────────────────────────────────────────────────
    // Clone
    // ──────────────────────────────────────────────────────────────────────

    /// Returns an independent copy of this log. The baseline factory is
    /// shared; it only ever hands out fresh models.
    pub fn clone_log(&self) -> PatchLog {
        PatchLog {
            start_fn: Arc::clone(&self.start_fn),
            patches: self.patches.clone(),
            end: self.end.clone(),
        }
    }
}

impl std::fmt::Debug for PatchLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PatchLog")
            .field("patches", &self.patches.len())
            .field("end", &self.end.clock)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::json_crdt_patch::clock::ts;
    use serde_json::json;

    const SID: u64 = 300_000;

    /// A log with three patches: create `{"n": []}`, then push 1, then 2.
    fn log_with_history() -> (PatchLog, Vec<Ts>) {
        let mut model = Model::new(SID);
        let mut api = model.api();
        api.root(&json!({"n": []}));
        let first = api.commit();
        let mut log = PatchLog::from_new_model(Model::new(SID)).unwrap();
        let mut ids = Vec::new();
        ids.extend(first.get_id());
        log.push(first);
        for n in 1..=2 {
            let mut api = model.api();
            api.arr_ins(&["n".into()], n - 1, &[json!(n)]).unwrap();
            let patch = api.commit();
            ids.extend(patch.get_id());
            log.push(patch);
        }
        (log, ids)
    }

    #[test]
    fn from_new_model_captures_uncommitted_edits() {
        let mut model = Model::new(SID);
        model.api().root(&json!({"a": 1}));
        let log = PatchLog::from_new_model(model).unwrap();
        assert_eq!(log.patches.len(), 1);
        assert!(log.end.patches.is_empty());
        assert_eq!(log.start().view(), json!(null));
        assert_eq!(log.end.view(), json!({"a": 1}));
        assert_eq!(log.replay_to_end().view(), log.end.view());
    }

    #[test]
    fn from_new_model_skips_shipped_commits() {
        let mut model = Model::new(SID);
        model.api().root(&json!({"a": "b"}));
        let mut api = model.api();
        api.obj_set(&[], &[("c", json!(1))]).unwrap();
        let shipped = api.commit();
        model.api().obj_set(&[], &[("d", json!(2))]).unwrap();

        let mut log = PatchLog::from_new_model(model).unwrap();
        assert_eq!(log.patches.len(), 1);
        assert_eq!(log.replay_to_end().view(), json!({"a": "b", "d": 2}));
        log.push(shipped);
        assert_eq!(log.end.view(), json!({"a": "b", "c": 1, "d": 2}));
        assert_eq!(log.replay_to_end().view(), log.end.view());
    }

    #[test]
    fn from_new_model_keeps_server_clock() {
        let mut server = Model::new_server(1);
        server.api().root(&json!([1]));
        let log = PatchLog::from_new_model(server).unwrap();
        assert!(log.start().clock.is_server());
        assert_eq!(log.replay_to_end().view(), json!([1]));
    }

    #[test]
    fn replay_to_end_reproduces_end() {
        let (log, _) = log_with_history();
        assert_eq!(log.end.view(), json!({"n": [1, 2]}));
        assert_eq!(log.replay_to_end().view(), log.end.view());
    }

    #[test]
    fn replay_to_stops_at_patch() {
        let (log, ids) = log_with_history();
        assert_eq!(log.replay_to(ids[1], true).view(), json!({"n": [1]}));
        assert_eq!(log.replay_to(ids[1], false).view(), json!({"n": []}));
        assert_eq!(log.replay_to(ts(SID, 0), true).view(), json!(null));
    }

    #[test]
    fn advance_to_moves_history_into_baseline() {
        let (mut log, ids) = log_with_history();
        log.advance_to(ids[1]);
        assert_eq!(log.patches.len(), 1);
        assert_eq!(log.start().view(), json!({"n": [1]}));
        assert_eq!(log.replay_to_end().view(), json!({"n": [1, 2]}));
    }

    #[test]
    fn from_model_freezes_baseline() {
        let mut model = Model::new(SID);
        model.api().root(&json!([true]));
        let mut log = PatchLog::from_model(&model);
        let mut api = model.api();
        api.arr_ins(&[], 1, &[json!(false)]).unwrap();
        log.push(api.commit());
        assert_eq!(log.start().view(), json!([true]));
        assert_eq!(log.end.view(), json!([true, false]));
        assert_eq!(log.replay_to_end().view(), log.end.view());
    }

    #[test]
    fn find_max_and_rebase_batch() {
        let (log, ids) = log_with_history();
        assert_eq!(log.find_max(SID).and_then(Patch::get_id), Some(ids[2]));
        assert!(log.find_max(1).is_none());

        let last = log.find_max(SID).map(Patch::next_time).unwrap();
        let mut other = log.end.fork_with_sid(SID + 1);
        let mut api = other.api();
        api.arr_ins(&["n".into()], 0, &[json!(0)]).unwrap();
        api.commit();
        api.arr_ins(&["n".into()], 0, &[json!(-1)]).unwrap();
        let batch = Batch::new(vec![api.commit()]);
        let start = batch.get_id().unwrap().time;

        let rebased = log.rebase_batch(&batch, Some(SID)).unwrap();
        assert!(start > last);
        assert_eq!(rebased.get_id().map(|id| id.time), Some(last));
        let untouched = log.rebase_batch(&batch, Some(77)).unwrap();
        assert_eq!(untouched.get_id().map(|id| id.time), Some(start));
    }

    #[test]
    fn clone_log_is_independent() {
        let (log, _) = log_with_history();
        let mut copy = log.clone_log();
        let mut editor = copy.end.fork_with_sid(SID + 2);
        let mut api = editor.api();
        api.obj_set(&[], &[("y", json!(2))]).unwrap();
        copy.push(api.commit());
        assert_eq!(copy.patches.len(), log.patches.len() + 1);
        assert_eq!(log.end.view(), json!({"n": [1, 2]}));
        assert_eq!(copy.end.view(), json!({"n": [1, 2], "y": 2}));
    }
}
