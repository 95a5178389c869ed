//! JSON CRDT model constants.

use serde_json::Value;

use crate::json_crdt_patch::clock::Ts;

pub use crate::json_crdt_patch::constants::{FALSE_ID, NULL_ID, ORIGIN, TRUE_ID, UNDEFINED_ID};

/// The literal constant nodes present in every node index. `undefined` has
/// no JSON value.
pub fn literals() -> [(Ts, Option<Value>); 4] {
    [
        (NULL_ID, Some(Value::Null)),
        (TRUE_ID, Some(Value::Bool(true))),
        (FALSE_ID, Some(Value::Bool(false))),
        (UNDEFINED_ID, None),
    ]
}
