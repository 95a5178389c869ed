//! JSON CRDT document model and node types.
//!
//! This module provides:
//! - The in-memory CRDT document model ([`model::Model`]) and its editing
//!   API ([`model::ModelApi`])
//! - All JSON CRDT node types ([`nodes`]), including the RGA sequence
//! - The reserved literal ids ([`constants`])
//! - Patch history with replay and rebase ([`log::PatchLog`])

pub mod constants;
pub mod error;
pub mod log;
pub mod model;
pub mod nodes;

pub use constants::{ORIGIN, UNDEFINED_ID};
pub use error::ModelError;
pub use log::PatchLog;
pub use model::{Model, ModelApi, PathStep};
pub use nodes::{CrdtNode, NodeIndex};
