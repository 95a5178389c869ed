//! Reserved timestamps of the JSON CRDT Patch protocol.
//!
//! The system session owns the origin and the four literal constants. Every
//! model index contains a constant node for each literal, so operations can
//! reference `null`, `true`, `false` and `undefined` without creating nodes.

pub use crate::json_crdt_patch::enums::{SESSION, SYSTEM_SESSION_TIME};

use crate::json_crdt_patch::clock::Ts;

/// The origin timestamp, the bottom of the timestamp order.
///
/// Addresses the document root register in `SetVal`-style operations and is
/// the initial write id of every LWW slot.
pub const ORIGIN: Ts = Ts::new(SESSION::SYSTEM, SYSTEM_SESSION_TIME::ORIGIN);

/// The `null` literal.
pub const NULL_ID: Ts = Ts::new(SESSION::SYSTEM, SYSTEM_SESSION_TIME::NULL);

/// The `true` literal.
pub const TRUE_ID: Ts = Ts::new(SESSION::SYSTEM, SYSTEM_SESSION_TIME::TRUE);

/// The `false` literal.
pub const FALSE_ID: Ts = Ts::new(SESSION::SYSTEM, SYSTEM_SESSION_TIME::FALSE);

/// The `undefined` literal. An object key pointing here is absent.
pub const UNDEFINED_ID: Ts = Ts::new(SESSION::SYSTEM, SYSTEM_SESSION_TIME::UNDEFINED);
