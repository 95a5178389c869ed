//! json-crdt: a JSON document CRDT.
//!
//! Replicas edit a shared JSON document concurrently and exchange patches.
//! Every replica that has applied the same set of patches, in any order and
//! any number of times, shows the same view.
//!
//! - [`json_crdt_patch`]: logical clocks, operations, patches, the patch
//!   builder, batches and rebase.
//! - [`json_crdt`]: the document model, its node types (`con`, `val`, `obj`,
//!   `str`, `bin`, `arr`), path-based editing and the patch log.
//!
//! ```
//! use json_crdt::json_crdt::Model;
//! use serde_json::json;
//!
//! let mut alice = Model::new(100_000);
//! let mut api = alice.api();
//! api.root(&json!({"title": "draft"}));
//! let patch = api.commit();
//!
//! let mut bob = Model::new(100_001);
//! bob.apply_patch(&patch);
//! assert_eq!(bob.view(), json!({"title": "draft"}));
//! ```

pub mod json_crdt;
pub mod json_crdt_patch;
