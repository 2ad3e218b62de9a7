//! Primitive edit operations and the replayable [`Patch`] that carries them.
//!
//! Every structural mutation of a flow document is expressed as an ordered
//! list of primitive operations: node insert/remove, edge insert/remove/move,
//! and node-field insert/replace/remove. The same list is applied locally,
//! broadcast over the collaboration transport, and replayed by every
//! connected editor — so each operation carries enough context (removed
//! values, indices) to be applied *and* inverted deterministically by any
//! implementation.
//!
//! The op generator in [`super::mutate`] is the only producer; this module
//! owns application, inversion, composition, and the human-readable change
//! summaries shown in the editor's activity feed.
//!
//! # Examples
//!
//! ```rust
//! use waymark::flow::Flow;
//! use waymark::flow::mutate::{self, NewNode, Placement};
//! use waymark::types::NodeType;
//!
//! let flow = Flow::new();
//! let (next, patch) = mutate::add(
//!     &flow,
//!     NewNode::new(NodeType::Question).with_id("q1"),
//!     &Placement::default(),
//! ).unwrap();
//!
//! // Replaying the patch against the original snapshot converges.
//! assert_eq!(patch.apply(&flow).unwrap(), next);
//! // The inverse patch restores the original document.
//! assert_eq!(patch.invert().apply(&next).unwrap(), flow);
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{Flow, Node};
use crate::error::GraphError;
use crate::types::NodeId;

/// One primitive edit operation against a flow document.
///
/// Edge indices refer to the edge list as it stands when the operation is
/// applied, in patch order. Remove variants carry the removed value so the
/// operation can be inverted without consulting the document.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum Op {
    /// Insert (or overwrite) a node record.
    InsertNode { id: NodeId, node: Node },
    /// Remove a node record; `node` is the removed value.
    RemoveNode { id: NodeId, node: Node },
    /// Insert `child` into `id`'s edge list at `index`.
    InsertEdge {
        id: NodeId,
        index: usize,
        child: NodeId,
    },
    /// Remove the edge at `index` of `id`'s edge list; `child` is the
    /// removed target.
    RemoveEdge {
        id: NodeId,
        index: usize,
        child: NodeId,
    },
    /// Move the edge at `from` to position `to` (position in the list after
    /// the removal).
    MoveEdge { id: NodeId, from: usize, to: usize },
    /// Insert a data field that was previously absent.
    InsertField {
        id: NodeId,
        key: String,
        value: Value,
    },
    /// Replace a data field's value.
    ReplaceField {
        id: NodeId,
        key: String,
        old: Value,
        new: Value,
    },
    /// Remove a data field; `old` is the removed value.
    RemoveField { id: NodeId, key: String, old: Value },
}

impl Op {
    /// The inverse operation.
    #[must_use]
    pub fn invert(&self) -> Op {
        match self.clone() {
            Op::InsertNode { id, node } => Op::RemoveNode { id, node },
            Op::RemoveNode { id, node } => Op::InsertNode { id, node },
            Op::InsertEdge { id, index, child } => Op::RemoveEdge { id, index, child },
            Op::RemoveEdge { id, index, child } => Op::InsertEdge { id, index, child },
            Op::MoveEdge { id, from, to } => Op::MoveEdge {
                id,
                from: to,
                to: from,
            },
            Op::InsertField { id, key, value } => Op::RemoveField { id, key, old: value },
            Op::ReplaceField { id, key, old, new } => Op::ReplaceField {
                id,
                key,
                old: new,
                new: old,
            },
            Op::RemoveField { id, key, old } => Op::InsertField { id, key, value: old },
        }
    }

    /// Id of the node this operation touches.
    #[must_use]
    pub fn target(&self) -> &NodeId {
        match self {
            Op::InsertNode { id, .. }
            | Op::RemoveNode { id, .. }
            | Op::InsertEdge { id, .. }
            | Op::RemoveEdge { id, .. }
            | Op::MoveEdge { id, .. }
            | Op::InsertField { id, .. }
            | Op::ReplaceField { id, .. }
            | Op::RemoveField { id, .. } => id,
        }
    }
}

/// An ordered, replayable list of primitive operations.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Patch {
    ops: Vec<Op>,
}

impl Patch {
    #[must_use]
    pub fn new(ops: Vec<Op>) -> Self {
        Self { ops }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Op> {
        self.ops.iter()
    }

    /// Appends another patch, producing the composition `self ∘ other`
    /// (this patch first, then `other`).
    #[must_use]
    pub fn compose(mut self, other: Patch) -> Patch {
        self.ops.extend(other.ops);
        self
    }

    /// The patch that undoes this one.
    #[must_use]
    pub fn invert(&self) -> Patch {
        Patch {
            ops: self.ops.iter().rev().map(Op::invert).collect(),
        }
    }

    /// Applies the patch to a snapshot, returning the resulting document.
    ///
    /// Fails without partial effect on the returned value if any operation no
    /// longer fits the document (a stale index, a missing node) — the caller
    /// keeps its snapshot and should regenerate the edit.
    pub fn apply(&self, flow: &Flow) -> Result<Flow, GraphError> {
        let mut next = flow.clone();
        self.apply_in_place(&mut next)?;
        Ok(next)
    }

    pub(crate) fn apply_in_place(&self, flow: &mut Flow) -> Result<(), GraphError> {
        for op in &self.ops {
            apply_op(flow, op)?;
        }
        Ok(())
    }

    /// Renders a human-readable change summary for the editor activity feed.
    ///
    /// `flow` is the snapshot the patch was generated against; it is used to
    /// name the touched nodes.
    #[must_use]
    pub fn describe(&self, flow: &Flow) -> Vec<String> {
        self.ops.iter().map(|op| describe_op(flow, op)).collect()
    }
}

impl From<Vec<Op>> for Patch {
    fn from(ops: Vec<Op>) -> Self {
        Patch { ops }
    }
}

impl IntoIterator for Patch {
    type Item = Op;
    type IntoIter = std::vec::IntoIter<Op>;
    fn into_iter(self) -> Self::IntoIter {
        self.ops.into_iter()
    }
}

pub(crate) fn apply_op(flow: &mut Flow, op: &Op) -> Result<(), GraphError> {
    match op {
        Op::InsertNode { id, node } => {
            flow.nodes.insert(id.clone(), node.clone());
        }
        Op::RemoveNode { id, .. } => {
            flow.nodes
                .remove(id)
                .ok_or_else(|| GraphError::NodeNotFound { id: id.clone() })?;
        }
        Op::InsertEdge { id, index, child } => {
            let node = flow
                .nodes
                .get_mut(id)
                .ok_or_else(|| GraphError::ParentNotFound { id: id.clone() })?;
            if *index > node.edges.len() {
                return Err(GraphError::StaleOp {
                    id: id.clone(),
                    index: *index,
                });
            }
            node.edges.insert(*index, child.clone());
        }
        Op::RemoveEdge { id, index, child } => {
            let node = flow
                .nodes
                .get_mut(id)
                .ok_or_else(|| GraphError::ParentNotFound { id: id.clone() })?;
            if node.edges.get(*index) != Some(child) {
                return Err(GraphError::StaleOp {
                    id: id.clone(),
                    index: *index,
                });
            }
            node.edges.remove(*index);
        }
        Op::MoveEdge { id, from, to } => {
            let node = flow
                .nodes
                .get_mut(id)
                .ok_or_else(|| GraphError::ParentNotFound { id: id.clone() })?;
            if *from >= node.edges.len() {
                return Err(GraphError::StaleOp {
                    id: id.clone(),
                    index: *from,
                });
            }
            let child = node.edges.remove(*from);
            if *to > node.edges.len() {
                return Err(GraphError::StaleOp {
                    id: id.clone(),
                    index: *to,
                });
            }
            node.edges.insert(*to, child);
        }
        Op::InsertField { id, key, value } | Op::ReplaceField { id, key, new: value, .. } => {
            patch_field(flow, id, key, Some(value.clone()))?;
        }
        Op::RemoveField { id, key, .. } => {
            patch_field(flow, id, key, None)?;
        }
    }
    Ok(())
}

fn patch_field(
    flow: &mut Flow,
    id: &NodeId,
    key: &str,
    value: Option<Value>,
) -> Result<(), GraphError> {
    let node = flow
        .nodes
        .get_mut(id)
        .ok_or_else(|| GraphError::NodeNotFound { id: id.clone() })?;
    let mut map = node.data.to_map();
    match value {
        Some(v) => {
            map.insert(key.to_string(), v);
        }
        None => {
            map.remove(key);
        }
    }
    node.data = super::NodeData::from_map(map).map_err(|e| GraphError::InvalidField {
        id: id.clone(),
        key: key.to_string(),
        message: e.to_string(),
    })?;
    Ok(())
}

// Change summaries only spell out short, identifying props.
const NAMED_PROPS: [&str; 4] = ["text", "fn", "val", "title"];

fn node_label(node: &Node) -> String {
    let data = &node.data;
    data.text
        .clone()
        .or_else(|| data.fn_key.clone())
        .or_else(|| data.val.clone())
        .or_else(|| data.flow_id.clone())
        .unwrap_or_else(|| "node".to_string())
}

fn kind_name(flow: &Flow, id: &str) -> String {
    flow.resolve(id)
        .and_then(|n| n.kind)
        .map(|k| k.to_string())
        .unwrap_or_else(|| "node".to_string())
}

fn describe_op(flow: &Flow, op: &Op) -> String {
    match op {
        Op::InsertNode { node, .. } => {
            let kind = node
                .kind
                .map(|k| k.to_string())
                .unwrap_or_else(|| "node".to_string());
            format!("Added {kind} \"{}\"", node_label(node))
        }
        Op::RemoveNode { node, .. } => {
            let kind = node
                .kind
                .map(|k| k.to_string())
                .unwrap_or_else(|| "node".to_string());
            format!("Removed {kind} \"{}\"", node_label(node))
        }
        Op::InsertEdge { id, child, .. } => {
            if id == super::ROOT_NODE_ID {
                format!("Added {} to the main graph", kind_name(flow, child))
            } else {
                format!("Added {} to a branch", kind_name(flow, child))
            }
        }
        Op::RemoveEdge { id, child, .. } => {
            if id == super::ROOT_NODE_ID {
                format!("Removed {} from the main graph", kind_name(flow, child))
            } else {
                format!("Removed {} from a branch", kind_name(flow, child))
            }
        }
        Op::MoveEdge { id, .. } => {
            if id == super::ROOT_NODE_ID {
                "Re-ordered the main graph".to_string()
            } else {
                format!("Re-ordered edges of {}", kind_name(flow, id))
            }
        }
        Op::InsertField { id, key, value } => {
            if NAMED_PROPS.contains(&key.as_str()) {
                format!("Added {} {key} \"{}\"", kind_name(flow, id), terse(value))
            } else {
                format!("Added {} {key}", kind_name(flow, id))
            }
        }
        Op::ReplaceField { id, key, old, new } => {
            if NAMED_PROPS.contains(&key.as_str()) {
                format!(
                    "Updated {} {key} from \"{}\" to \"{}\"",
                    kind_name(flow, id),
                    terse(old),
                    terse(new)
                )
            } else {
                format!("Updated {} {key}", kind_name(flow, id))
            }
        }
        Op::RemoveField { id, key, old } => {
            if NAMED_PROPS.contains(&key.as_str()) {
                format!("Removed {} {key} \"{}\"", kind_name(flow, id), terse(old))
            } else {
                format!("Removed {} {key}", kind_name(flow, id))
            }
        }
    }
}

fn terse(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flow::{NodeData, ROOT_NODE_ID};
    use crate::types::NodeType;

    #[test]
    fn stale_edge_op_is_rejected_without_partial_effect() {
        let mut flow = Flow::new();
        flow.insert("a", Node::new(NodeType::Content));
        flow.root_mut().edges = vec!["a".into()];

        let patch = Patch::new(vec![Op::RemoveEdge {
            id: ROOT_NODE_ID.into(),
            index: 3,
            child: "a".into(),
        }]);
        assert!(matches!(
            patch.apply(&flow),
            Err(GraphError::StaleOp { .. })
        ));
    }

    #[test]
    fn field_ops_round_trip_through_typed_data() {
        let mut flow = Flow::new();
        flow.insert(
            "q",
            Node::new(NodeType::Question).with_data(NodeData::new().fn_key("food")),
        );

        let patch = Patch::new(vec![Op::ReplaceField {
            id: "q".into(),
            key: "fn".into(),
            old: Value::String("food".into()),
            new: Value::String("drink".into()),
        }]);
        let next = patch.apply(&flow).unwrap();
        assert_eq!(next.get("q").unwrap().data.fn_key.as_deref(), Some("drink"));

        let restored = patch.invert().apply(&next).unwrap();
        assert_eq!(restored, flow);
    }

    #[test]
    fn move_edge_inverts() {
        let mut flow = Flow::new();
        for id in ["a", "b", "c"] {
            flow.insert(id, Node::new(NodeType::Content));
        }
        flow.root_mut().edges = vec!["a".into(), "b".into(), "c".into()];

        let patch = Patch::new(vec![Op::MoveEdge {
            id: ROOT_NODE_ID.into(),
            from: 0,
            to: 2,
        }]);
        let next = patch.apply(&flow).unwrap();
        assert_eq!(next.root().edges, vec!["b", "c", "a"]);
        assert_eq!(patch.invert().apply(&next).unwrap(), flow);
    }
}
