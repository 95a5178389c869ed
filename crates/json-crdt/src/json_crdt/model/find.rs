//! Path resolution from the document root.
//!
//! A path is a list of object keys and array indices. Registers met along
//! the way are looked through, so `["a", 0]` works whether `a` holds an
//! array directly or a `val` register pointing at one.

use crate::json_crdt::constants::UNDEFINED_ID;
use crate::json_crdt::error::ModelError;
use crate::json_crdt::nodes::{ArrNode, BinNode, CrdtNode, NodeIndex, ObjNode, StrNode, ValNode};
use crate::json_crdt_patch::clock::Ts;

use super::Model;

/// One step of a path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathStep {
    Key(String),
    Index(usize),
}

impl From<&str> for PathStep {
    fn from(key: &str) -> Self {
        PathStep::Key(key.to_owned())
    }
}

impl From<String> for PathStep {
    fn from(key: String) -> Self {
        PathStep::Key(key)
    }
}

impl From<usize> for PathStep {
    fn from(index: usize) -> Self {
        PathStep::Index(index)
    }
}

/// Follows `val` registers holding references until a non-register node,
/// an inline literal or an unknown id is reached.
fn deref(index: &NodeIndex, mut id: Ts) -> Ts {
    while let Some(CrdtNode::Val(val)) = index.get(&id) {
        match val.child() {
            Some(child) => id = child,
            None => break,
        }
    }
    id
}

impl Model {
    /// Resolves `path` to a node id.
    ///
    /// `Ok(None)` means the last step leads nowhere: an absent key or an
    /// `undefined` value. Anything absent earlier on the path is
    /// [`ModelError::NotFound`].
    pub fn find_id(&self, path: &[PathStep]) -> Result<Option<Ts>, ModelError> {
        let mut current = self.root.val;
        for step in path {
            let id = deref(&self.index, current);
            if id == UNDEFINED_ID {
                return Err(ModelError::NotFound);
            }
            let node = self.index.get(&id).ok_or(ModelError::NotFound)?;
            current = match (step, node) {
                (PathStep::Key(key), CrdtNode::Obj(obj)) => obj.get(key).unwrap_or(UNDEFINED_ID),
                (PathStep::Key(_), _) => return Err(ModelError::NotObj),
                (PathStep::Index(i), CrdtNode::Arr(arr)) => arr.rga.find_value(*i)?,
                (PathStep::Index(_), _) => return Err(ModelError::NotArr),
            };
        }
        if current == UNDEFINED_ID || !self.index.contains_key(&current) {
            return Ok(None);
        }
        Ok(Some(current))
    }

    /// Resolves `path` to a node, or `None` when the target is absent.
    pub fn find(&self, path: &[PathStep]) -> Result<Option<&CrdtNode>, ModelError> {
        Ok(self.find_id(path)?.and_then(|id| self.index.get(&id)))
    }

    /// Like [`find`](Self::find), but looks through registers at the target.
    fn find_deref(&self, path: &[PathStep]) -> Result<&CrdtNode, ModelError> {
        let id = self.find_id(path)?.ok_or(ModelError::NotFound)?;
        self.index
            .get(&deref(&self.index, id))
            .ok_or(ModelError::NotFound)
    }

    pub fn find_str(&self, path: &[PathStep]) -> Result<&StrNode, ModelError> {
        match self.find_deref(path)? {
            CrdtNode::Str(node) => Ok(node),
            _ => Err(ModelError::NotStr),
        }
    }

    pub fn find_bin(&self, path: &[PathStep]) -> Result<&BinNode, ModelError> {
        match self.find_deref(path)? {
            CrdtNode::Bin(node) => Ok(node),
            _ => Err(ModelError::NotBin),
        }
    }

    pub fn find_arr(&self, path: &[PathStep]) -> Result<&ArrNode, ModelError> {
        match self.find_deref(path)? {
            CrdtNode::Arr(node) => Ok(node),
            _ => Err(ModelError::NotArr),
        }
    }

    pub fn find_obj(&self, path: &[PathStep]) -> Result<&ObjNode, ModelError> {
        match self.find_deref(path)? {
            CrdtNode::Obj(node) => Ok(node),
            _ => Err(ModelError::NotObj),
        }
    }

    /// The register at `path` itself; registers are not looked through.
    pub fn find_val(&self, path: &[PathStep]) -> Result<&ValNode, ModelError> {
        match self.find(path)?.ok_or(ModelError::NotFound)? {
            CrdtNode::Val(node) => Ok(node),
            _ => Err(ModelError::NotVal),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc() -> Model {
        let mut model = Model::new(100_000);
        let mut api = model.api();
        api.root(&json!({"a": [1, "x", {"b": true}], "s": "str"}));
        api.commit();
        model
    }

    #[test]
    fn finds_nested_nodes() {
        let model = doc();
        let node = model.find(&["a".into(), PathStep::Index(2), "b".into()]).unwrap();
        assert_eq!(node.map(|n| n.name()), Some("con"));
        assert_eq!(model.find_str(&["s".into()]).unwrap().view_str(), "str");
        assert_eq!(model.find_arr(&["a".into()]).unwrap().size(), 3);
    }

    #[test]
    fn empty_path_is_root() {
        let model = doc();
        assert!(model.find_obj(&[]).is_ok());
        assert!(Model::new(100_000).find(&[]).unwrap().is_none());
    }

    #[test]
    fn absent_key_at_end_is_none() {
        let model = doc();
        assert_eq!(model.find_id(&["nope".into()]), Ok(None));
        assert_eq!(
            model.find_id(&["nope".into(), "deeper".into()]),
            Err(ModelError::NotFound)
        );
    }

    #[test]
    fn type_mismatch_errors() {
        let model = doc();
        assert_eq!(model.find_id(&[PathStep::Index(0)]), Err(ModelError::NotArr));
        assert_eq!(
            model.find_id(&["a".into(), "k".into()]),
            Err(ModelError::NotObj)
        );
        assert_eq!(
            model.find_id(&["a".into(), PathStep::Index(9)]),
            Err(ModelError::OutOfBounds)
        );
        assert_eq!(model.find_str(&["a".into()]).err(), Some(ModelError::NotStr));
        assert_eq!(model.find_val(&["a".into()]).err(), Some(ModelError::NotVal));
        assert_eq!(model.find_bin(&["s".into()]).err(), Some(ModelError::NotBin));
    }
}
