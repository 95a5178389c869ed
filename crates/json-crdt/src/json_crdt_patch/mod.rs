//! JSON CRDT Patch protocol.
//!
//! The layer every replica speaks. Defines:
//! - Clock types (`Ts`, `Tss`, `ClockVector`, `ServerClockVector`, `Clock`)
//! - CRDT operations (`Op` enum)
//! - `Patch`: an ordered sequence of operations, plus rebase
//! - `PatchBuilder`: fluent builder for constructing patches
//! - `Batch`: a sequence of patches from the same session
//! - `combine` / `compact`: patch compaction

pub mod batch;
pub mod clock;
pub mod compaction;
pub mod constants;
pub mod enums;
pub mod operations;
pub mod patch;
pub mod patch_builder;

// ── Re-exports ─────────────────────────────────────────────────────────────

pub use batch::Batch;
pub use clock::{compare, contains, contains_id, equal, interval, print_ts, tick, ts, tss};
pub use clock::{Clock, ClockVector, ServerClockVector, Ts, Tss};
pub use compaction::{combine, compact};
pub use constants::{FALSE_ID, NULL_ID, ORIGIN, TRUE_ID, UNDEFINED_ID};
pub use enums::{JsonCrdtDataType, JsonCrdtPatchOpcode, SESSION, SYSTEM_SESSION_TIME};
pub use operations::{ConValue, Op};
pub use patch::{Patch, PatchError};
pub use patch_builder::PatchBuilder;
