//! The flow graph document and its structural invariants.
//!
//! A flow is stored as an *arena* of nodes keyed by stable id plus, per node,
//! an ordered edge list of child ids — never as owned tree pointers. Edge
//! order is semantically significant: it is the basis for traversal order and
//! for every tie-breaking rule in the interpreter.
//!
//! An id may be the edge target of more than one parent. Such a node is a
//! **clone**: a genuinely shared subtree, not an error, and structural edits
//! must never silently duplicate it (see [`mutate::make_unique`] for the
//! explicit copy operation).
//!
//! # Examples
//!
//! ```rust
//! use waymark::flow::{Flow, Node, NodeData, ROOT_NODE_ID};
//! use waymark::types::NodeType;
//!
//! let mut flow = Flow::new();
//! flow.insert("q", Node::new(NodeType::Question).with_edges(["a1", "a2"]));
//! flow.insert("a1", Node::new(NodeType::Answer).with_data(NodeData::new().val("yes")));
//! flow.insert("a2", Node::new(NodeType::Answer).with_data(NodeData::new().val("no")));
//! flow.root_mut().edges.push("q".into());
//!
//! assert_eq!(flow.dfs_order(), vec!["q", "a1", "a2"]);
//! assert!(flow.validate().is_ok());
//! ```

pub mod mutate;
pub mod ops;

use rand::RngExt;
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::GraphError;
use crate::types::{NodeId, NodeType, SetOperation};

/// The reserved id of the document root.
pub const ROOT_NODE_ID: &str = "_root";

const ID_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const ID_LENGTH: usize = 10;

/// Allocates a fresh 10-character alphanumeric node id.
#[must_use]
pub fn new_node_id() -> NodeId {
    let mut rng = rand::rng();
    (0..ID_LENGTH)
        .map(|_| ID_ALPHABET[rng.random_range(0..ID_ALPHABET.len())] as char)
        .collect()
}

/// The typed slice of node data the engine reads, plus an open extension map
/// for renderer-only fields it passes through untouched.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeData {
    /// Dot-delimited hierarchical passport key this node reads or writes.
    #[serde(rename = "fn", default, skip_serializing_if = "Option::is_none")]
    pub fn_key: Option<String>,

    /// Value this node contributes to the passport when selected.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub val: Option<String>,

    /// Display text. The engine only uses it for change summaries.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    /// Categorical outcome value(s) this option carries. Accepts either a
    /// single legacy value or an array on the wire; always an array here.
    #[serde(
        rename = "flag",
        default,
        skip_serializing_if = "Vec::is_empty",
        deserialize_with = "one_or_many"
    )]
    pub flags: Vec<String>,

    /// Editor-facing labels; opaque to the engine.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,

    /// How a value-setting node combines its value with the passport.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation: Option<SetOperation>,

    /// Suppresses every auto-answer path; the node is always put to the user.
    #[serde(
        rename = "neverAutoAnswer",
        default,
        skip_serializing_if = "std::ops::Not::not"
    )]
    pub never_auto_answer: bool,

    /// Automates the blank option even when other options are unseen.
    #[serde(
        rename = "alwaysAutoAnswerBlank",
        default,
        skip_serializing_if = "std::ops::Not::not"
    )]
    pub always_auto_answer_blank: bool,

    /// Flag category a Filter routes on; defaults to the table's first.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,

    /// Referenced flow id for external portals.
    #[serde(rename = "flowId", default, skip_serializing_if = "Option::is_none")]
    pub flow_id: Option<String>,

    /// Renderer-only fields the engine does not interpret.
    #[serde(flatten)]
    pub extra: FxHashMap<String, Value>,
}

fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }
    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(v) => vec![v],
        OneOrMany::Many(vs) => vs,
    })
}

impl NodeData {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the passport key this node reads or writes.
    #[must_use]
    pub fn fn_key(mut self, key: impl Into<String>) -> Self {
        self.fn_key = Some(key.into());
        self
    }

    /// Sets the value contributed when this node is selected.
    #[must_use]
    pub fn val(mut self, val: impl Into<String>) -> Self {
        self.val = Some(val.into());
        self
    }

    /// Sets display text.
    #[must_use]
    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// Adds a categorical outcome flag.
    #[must_use]
    pub fn flag(mut self, flag: impl Into<String>) -> Self {
        self.flags.push(flag.into());
        self
    }

    /// Sets the value-setting operation.
    #[must_use]
    pub fn operation(mut self, op: SetOperation) -> Self {
        self.operation = Some(op);
        self
    }

    /// Marks the node as never auto-answerable.
    #[must_use]
    pub fn never_auto_answer(mut self) -> Self {
        self.never_auto_answer = true;
        self
    }

    /// Converts to a flat JSON object for field-level diffing.
    pub(crate) fn to_map(&self) -> serde_json::Map<String, Value> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => serde_json::Map::new(),
        }
    }

    /// Rebuilds typed data from a flat JSON object.
    pub(crate) fn from_map(map: serde_json::Map<String, Value>) -> Result<Self, serde_json::Error> {
        serde_json::from_value(Value::Object(map))
    }
}

/// One node of the flow document.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Node type; `None` only for the root record.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<NodeType>,

    /// Type-specific attributes.
    #[serde(default, skip_serializing_if = "node_data_is_empty")]
    pub data: NodeData,

    /// Ordered child ids. Order is semantically significant.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub edges: Vec<NodeId>,
}

fn node_data_is_empty(data: &NodeData) -> bool {
    *data == NodeData::default()
}

impl Node {
    /// Creates a node of the given type with empty data and edges.
    #[must_use]
    pub fn new(kind: NodeType) -> Self {
        Self {
            kind: Some(kind),
            ..Default::default()
        }
    }

    /// Attaches data.
    #[must_use]
    pub fn with_data(mut self, data: NodeData) -> Self {
        self.data = data;
        self
    }

    /// Attaches an ordered edge list.
    #[must_use]
    pub fn with_edges<I, S>(mut self, edges: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<NodeId>,
    {
        self.edges = edges.into_iter().map(Into::into).collect();
        self
    }

    /// Returns `true` if this node is of the given type.
    #[must_use]
    pub fn is(&self, kind: NodeType) -> bool {
        self.kind == Some(kind)
    }
}

/// A flow graph document: the node arena plus any referenced external flows.
///
/// External flows are separate published documents substituted transparently
/// at traversal time wherever an [`NodeType::ExternalPortal`] node references
/// them by `flow_id`. Node ids are globally unique across a document and its
/// externals.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Flow {
    #[serde(flatten)]
    pub(crate) nodes: FxHashMap<NodeId, Node>,

    /// Referenced external flows, keyed by flow id. Not part of the wire
    /// representation of this document; attached by the loader.
    #[serde(skip)]
    pub(crate) externals: FxHashMap<String, Flow>,
}

impl Flow {
    /// Creates an empty flow containing only the root record.
    #[must_use]
    pub fn new() -> Self {
        let mut nodes = FxHashMap::default();
        nodes.insert(ROOT_NODE_ID.to_string(), Node::default());
        Self {
            nodes,
            externals: FxHashMap::default(),
        }
    }

    /// Inserts or replaces a node.
    pub fn insert(&mut self, id: impl Into<NodeId>, node: Node) {
        self.nodes.insert(id.into(), node);
    }

    /// Attaches an external flow under the given flow id.
    pub fn attach_external(&mut self, flow_id: impl Into<String>, flow: Flow) {
        self.externals.insert(flow_id.into(), flow);
    }

    /// Looks up a node in this document only (externals excluded).
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Node> {
        self.nodes.get(id)
    }

    /// Looks up a node in this document or, failing that, in any attached
    /// external flow (recursively).
    #[must_use]
    pub fn resolve(&self, id: &str) -> Option<&Node> {
        self.nodes
            .get(id)
            .or_else(|| self.externals.values().find_map(|f| f.resolve(id)))
    }

    /// Returns `true` if the id resolves in this document or its externals.
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.resolve(id).is_some()
    }

    /// Looks up an attached external flow by flow id, recursively.
    #[must_use]
    pub fn external(&self, flow_id: &str) -> Option<&Flow> {
        self.externals
            .get(flow_id)
            .or_else(|| self.externals.values().find_map(|f| f.external(flow_id)))
    }

    /// The root record.
    #[must_use]
    pub fn root(&self) -> &Node {
        self.nodes.get(ROOT_NODE_ID).expect("root record present")
    }

    /// Mutable root record, created on demand.
    pub fn root_mut(&mut self) -> &mut Node {
        self.nodes.entry(ROOT_NODE_ID.to_string()).or_default()
    }

    /// Number of node records, root included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Iterates node records in arbitrary order.
    pub fn iter(&self) -> impl Iterator<Item = (&NodeId, &Node)> {
        self.nodes.iter()
    }

    /// Ids of every parent holding an edge to `id`, in arbitrary order.
    #[must_use]
    pub fn parents_of(&self, id: &str) -> Vec<&NodeId> {
        self.nodes
            .iter()
            .filter(|(_, node)| node.edges.iter().any(|e| e == id))
            .map(|(pid, _)| pid)
            .collect()
    }

    /// Number of edges pointing at `id` across the whole document.
    #[must_use]
    pub fn edge_count_to(&self, id: &str) -> usize {
        self.nodes
            .values()
            .map(|node| node.edges.iter().filter(|e| *e == id).count())
            .sum()
    }

    /// Returns `true` if `id` is referenced by more than one parent.
    #[must_use]
    pub fn is_clone(&self, id: &str) -> bool {
        let mut count = 0;
        for node in self.nodes.values() {
            count += node.edges.iter().filter(|e| *e == id).count();
            if count > 1 {
                return true;
            }
        }
        false
    }

    /// Pre-order depth-first traversal from the root, edges left-to-right.
    ///
    /// External portals are substituted by the referenced flow's root edges.
    /// A clone appears only at its first position. The root id itself is not
    /// included.
    #[must_use]
    pub fn dfs_order(&self) -> Vec<NodeId> {
        let mut visited: FxHashSet<&str> = FxHashSet::default();
        let mut order: Vec<NodeId> = Vec::new();
        let mut stack: Vec<&str> = vec![ROOT_NODE_ID];

        while let Some(id) = stack.pop() {
            if !visited.insert(id) {
                continue;
            }
            if id != ROOT_NODE_ID {
                order.push(id.to_string());
            }
            let Some(node) = self.resolve(id) else {
                continue;
            };
            let children: &[NodeId] = if node.is(NodeType::ExternalPortal) {
                match node
                    .data
                    .flow_id
                    .as_deref()
                    .and_then(|fid| self.external(fid))
                    .and_then(|external| external.get(ROOT_NODE_ID))
                {
                    Some(external_root) => &external_root.edges,
                    None => &node.edges,
                }
            } else {
                &node.edges
            };
            // Last-in first-out stack: push right-to-left so the left-most
            // edge is visited first.
            for child in children.iter().rev() {
                if !visited.contains(child.as_str()) {
                    stack.push(child.as_str());
                }
            }
        }
        order
    }

    /// Sorts a set of ids by their position in [`dfs_order`](Self::dfs_order).
    ///
    /// Ids that do not appear in the traversal (disconnected or stale) sort
    /// to the end, preserving their given relative order.
    #[must_use]
    pub fn sort_ids_depth_first<I, S>(&self, ids: I) -> Vec<NodeId>
    where
        I: IntoIterator<Item = S>,
        S: Into<NodeId>,
    {
        let order = self.dfs_order();
        let position: FxHashMap<&str, usize> = order
            .iter()
            .enumerate()
            .map(|(i, id)| (id.as_str(), i))
            .collect();
        let mut ids: Vec<NodeId> = ids.into_iter().map(Into::into).collect();
        ids.sort_by_key(|id| position.get(id.as_str()).copied().unwrap_or(usize::MAX));
        ids
    }

    /// Returns `true` if the edge lists of this document contain a cycle.
    #[must_use]
    pub fn is_cyclic(&self) -> bool {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            Visiting,
            Done,
        }
        let mut marks: FxHashMap<&str, Mark> = FxHashMap::default();

        fn visit<'a>(
            id: &'a str,
            flow: &'a Flow,
            marks: &mut FxHashMap<&'a str, Mark>,
        ) -> bool {
            match marks.get(id) {
                Some(Mark::Visiting) => return true,
                Some(Mark::Done) => return false,
                None => {}
            }
            marks.insert(id, Mark::Visiting);
            if let Some(node) = flow.nodes.get(id) {
                for child in &node.edges {
                    if visit(child.as_str(), flow, marks) {
                        return true;
                    }
                }
            }
            marks.insert(id, Mark::Done);
            false
        }

        let ids: Vec<&str> = self.nodes.keys().map(String::as_str).collect();
        ids.into_iter().any(|id| visit(id, self, &mut marks))
    }

    /// Checks the document's structural invariants: root present, every edge
    /// target resolvable, no cycles.
    pub fn validate(&self) -> Result<(), GraphError> {
        if !self.nodes.contains_key(ROOT_NODE_ID) {
            return Err(GraphError::NodeNotFound {
                id: ROOT_NODE_ID.to_string(),
            });
        }
        for node in self.nodes.values() {
            for child in &node.edges {
                if !self.contains(child) {
                    return Err(GraphError::NodeNotFound { id: child.clone() });
                }
            }
        }
        if self.is_cyclic() {
            return Err(GraphError::WouldCycle {
                parent: ROOT_NODE_ID.to_string(),
                id: ROOT_NODE_ID.to_string(),
            });
        }
        Ok(())
    }
}

impl<K: Into<NodeId>> FromIterator<(K, Node)> for Flow {
    fn from_iter<T: IntoIterator<Item = (K, Node)>>(iter: T) -> Self {
        let mut flow = Flow::new();
        for (id, node) in iter {
            flow.insert(id, node);
        }
        flow
    }
}
