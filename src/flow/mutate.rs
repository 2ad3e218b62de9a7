//! The op generator: high-level structural intents compiled to [`Patch`]es.
//!
//! Every function here is pure: it takes the current snapshot by reference
//! and returns the mutated document *together with* the minimal operation
//! list that produces it. Nothing is applied in place; the caller hands the
//! patch to the collaboration transport, which applies and broadcasts it.
//!
//! Legality is checked against the local snapshot immediately before ops are
//! emitted — never earlier — because a concurrent editor may have moved the
//! document underneath the intent. A rejected edit returns an error and no
//! partial operation list.
//!
//! Clone semantics run through everything: an id referenced by several
//! parents is one shared subtree. [`remove`] detaches a single edge and only
//! reaps the record when the last reference is gone; [`add`] re-using an
//! existing id produces a clone edge instead of a duplicate record; and
//! [`make_unique`] is the explicit "stop sharing" operation.

use serde_json::Value;

use super::ops::{apply_op, Op, Patch};
use super::{new_node_id, Flow, Node, NodeData, ROOT_NODE_ID};
use crate::error::GraphError;
use crate::types::{NodeId, NodeType};
use crate::utils::json_ext::{is_something, sanitize};

/// A node to be created, with any inline child options.
///
/// Supplying an `id` that already exists in the document turns the insert
/// into a clone edge: the existing record is shared, not duplicated.
#[derive(Clone, Debug)]
pub struct NewNode {
    pub id: Option<NodeId>,
    pub kind: NodeType,
    pub data: NodeData,
    pub children: Vec<NewNode>,
}

impl NewNode {
    #[must_use]
    pub fn new(kind: NodeType) -> Self {
        Self {
            id: None,
            kind,
            data: NodeData::default(),
            children: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_id(mut self, id: impl Into<NodeId>) -> Self {
        self.id = Some(id.into());
        self
    }

    #[must_use]
    pub fn with_data(mut self, data: NodeData) -> Self {
        self.data = data;
        self
    }

    #[must_use]
    pub fn with_child(mut self, child: NewNode) -> Self {
        self.children.push(child);
        self
    }

    #[must_use]
    pub fn with_children(mut self, children: Vec<NewNode>) -> Self {
        self.children = children;
        self
    }
}

/// Where a node lands: under which parent, and before which sibling.
///
/// With no `before`, the node is appended to the end of the parent's edges.
#[derive(Clone, Debug)]
pub struct Placement {
    pub parent: NodeId,
    pub before: Option<NodeId>,
}

impl Default for Placement {
    fn default() -> Self {
        Self {
            parent: ROOT_NODE_ID.to_string(),
            before: None,
        }
    }
}

impl Placement {
    #[must_use]
    pub fn under(parent: impl Into<NodeId>) -> Self {
        Self {
            parent: parent.into(),
            before: None,
        }
    }

    #[must_use]
    pub fn before(mut self, sibling: impl Into<NodeId>) -> Self {
        self.before = Some(sibling.into());
        self
    }
}

/// Validates that connecting `parent -> candidate` is legal on this snapshot.
///
/// Rejects unknown ids, self-reference, duplicate edges, and any connection
/// that would close a cycle (which includes reparenting a node under its own
/// descendant). Generators call this immediately before emitting ops.
pub fn is_valid_op(flow: &Flow, parent: &str, candidate: &str) -> Result<(), GraphError> {
    if flow.get(parent).is_none() {
        return Err(GraphError::ParentNotFound { id: parent.into() });
    }
    let Some(_) = flow.get(candidate) else {
        return Err(GraphError::NodeNotFound {
            id: candidate.into(),
        });
    };
    if parent == candidate {
        return Err(GraphError::WouldCycle {
            parent: parent.into(),
            id: candidate.into(),
        });
    }
    if flow
        .get(parent)
        .is_some_and(|p| p.edges.iter().any(|e| e == candidate))
    {
        return Err(GraphError::DuplicateEdge {
            parent: parent.into(),
            id: candidate.into(),
        });
    }
    if reaches(flow, candidate, parent) {
        return Err(GraphError::WouldCycle {
            parent: parent.into(),
            id: candidate.into(),
        });
    }
    Ok(())
}

/// Is `to` reachable from `from` along edge lists?
fn reaches(flow: &Flow, from: &str, to: &str) -> bool {
    let mut stack = vec![from];
    let mut seen = rustc_hash::FxHashSet::default();
    while let Some(id) = stack.pop() {
        if id == to {
            return true;
        }
        if !seen.insert(id) {
            continue;
        }
        if let Some(node) = flow.get(id) {
            stack.extend(node.edges.iter().map(String::as_str));
        }
    }
    false
}

// Sections belong on the main graph: the root itself, or the first level of
// a root-level internal portal.
fn section_position_ok(flow: &Flow, parent: &str) -> bool {
    parent == ROOT_NODE_ID
        || (flow.get(parent).is_some_and(|p| p.is(NodeType::InternalPortal))
            && flow
                .get(ROOT_NODE_ID)
                .is_some_and(|root| root.edges.iter().any(|e| e == parent)))
}

/// Records primitive ops as it applies them to a working copy, so the
/// returned patch is exactly the mutation that happened.
struct Draft<'a> {
    flow: &'a mut Flow,
    ops: Vec<Op>,
}

impl<'a> Draft<'a> {
    fn new(flow: &'a mut Flow) -> Self {
        Self {
            flow,
            ops: Vec::new(),
        }
    }

    fn push(&mut self, op: Op) -> Result<(), GraphError> {
        apply_op(self.flow, &op)?;
        self.ops.push(op);
        Ok(())
    }

    fn insert_node(&mut self, id: &str, node: Node) -> Result<(), GraphError> {
        self.push(Op::InsertNode {
            id: id.to_string(),
            node,
        })
    }

    fn remove_node(&mut self, id: &str) -> Result<(), GraphError> {
        let node = self
            .flow
            .get(id)
            .cloned()
            .ok_or_else(|| GraphError::NodeNotFound { id: id.into() })?;
        self.push(Op::RemoveNode {
            id: id.to_string(),
            node,
        })
    }

    fn insert_edge(&mut self, parent: &str, index: usize, child: &str) -> Result<(), GraphError> {
        self.push(Op::InsertEdge {
            id: parent.to_string(),
            index,
            child: child.to_string(),
        })
    }

    fn remove_edge(&mut self, parent: &str, index: usize) -> Result<(), GraphError> {
        let child = self
            .flow
            .get(parent)
            .and_then(|p| p.edges.get(index))
            .cloned()
            .ok_or_else(|| GraphError::StaleOp {
                id: parent.into(),
                index,
            })?;
        self.push(Op::RemoveEdge {
            id: parent.to_string(),
            index,
            child,
        })
    }

    fn move_edge(&mut self, parent: &str, from: usize, to: usize) -> Result<(), GraphError> {
        if from == to {
            return Ok(());
        }
        self.push(Op::MoveEdge {
            id: parent.to_string(),
            from,
            to,
        })
    }

    fn set_field(&mut self, id: &str, key: &str, new: Value) -> Result<(), GraphError> {
        let old = self
            .flow
            .get(id)
            .map(|n| n.data.to_map())
            .and_then(|m| m.get(key).cloned());
        let op = match old {
            Some(old) if old == new => return Ok(()),
            Some(old) => Op::ReplaceField {
                id: id.to_string(),
                key: key.to_string(),
                old,
                new,
            },
            None => Op::InsertField {
                id: id.to_string(),
                key: key.to_string(),
                value: new,
            },
        };
        self.push(op)
    }

    fn remove_field(&mut self, id: &str, key: &str) -> Result<(), GraphError> {
        let Some(old) = self
            .flow
            .get(id)
            .map(|n| n.data.to_map())
            .and_then(|m| m.get(key).cloned())
        else {
            return Ok(());
        };
        self.push(Op::RemoveField {
            id: id.to_string(),
            key: key.to_string(),
            old,
        })
    }

    fn finish(self) -> Patch {
        Patch::new(self.ops)
    }
}

fn sanitize_data(data: &NodeData) -> Result<NodeData, GraphError> {
    let cleaned = sanitize(Value::Object(data.to_map()));
    match cleaned {
        Value::Object(map) => NodeData::from_map(map).map_err(|e| GraphError::InvalidField {
            id: String::new(),
            key: String::new(),
            message: e.to_string(),
        }),
        _ => Ok(NodeData::default()),
    }
}

fn insert_position(flow: &Flow, parent: &str, before: Option<&str>) -> Result<usize, GraphError> {
    let edges = &flow
        .get(parent)
        .ok_or_else(|| GraphError::ParentNotFound { id: parent.into() })?
        .edges;
    match before {
        None => Ok(edges.len()),
        Some(sibling) => edges
            .iter()
            .position(|e| e == sibling)
            .ok_or_else(|| GraphError::BeforeNotFound {
                id: sibling.into(),
                parent: parent.into(),
            }),
    }
}

fn add_inner(
    draft: &mut Draft<'_>,
    spec: NewNode,
    parent: &str,
    before: Option<&str>,
) -> Result<NodeId, GraphError> {
    if draft.flow.get(parent).is_none() {
        return Err(GraphError::ParentNotFound { id: parent.into() });
    }

    // Re-using an existing id shares the record: a clone edge, not a copy.
    if let Some(id) = spec.id.as_deref() {
        if draft.flow.get(id).is_some() {
            is_valid_op(draft.flow, parent, id)?;
            let index = insert_position(draft.flow, parent, before)?;
            draft.insert_edge(parent, index, id)?;
            return Ok(id.to_string());
        }
    }

    if spec.kind == NodeType::Section && !section_position_ok(draft.flow, parent) {
        return Err(GraphError::InvalidSectionPosition {
            parent: parent.into(),
        });
    }

    let id = spec.id.unwrap_or_else(new_node_id);
    let data = sanitize_data(&spec.data)?;
    draft.insert_node(&id, Node::new(spec.kind).with_data(data))?;

    let index = insert_position(draft.flow, parent, before)?;
    draft.insert_edge(parent, index, &id)?;

    for child in spec.children {
        add_inner(draft, child, &id, None)?;
    }
    Ok(id)
}

/// Inserts a new node (and its inline children) under `place.parent`,
/// immediately before `place.before` or at the end of the edge list.
///
/// Returns the resulting document and the patch that produces it.
pub fn add(flow: &Flow, spec: NewNode, place: &Placement) -> Result<(Flow, Patch), GraphError> {
    let mut next = flow.clone();
    let mut draft = Draft::new(&mut next);
    add_inner(&mut draft, spec, &place.parent, place.before.as_deref())?;
    let patch = draft.finish();
    Ok((next, patch))
}

/// Adds a clone edge: `id`'s existing record is shared under a second parent.
pub fn clone_edge(flow: &Flow, id: &str, place: &Placement) -> Result<(Flow, Patch), GraphError> {
    let node = flow
        .get(id)
        .ok_or_else(|| GraphError::NodeNotFound { id: id.into() })?;
    if node.is(NodeType::ExternalPortal) {
        return Err(GraphError::CannotCloneFlowReference { id: id.into() });
    }
    if node.is(NodeType::Section) {
        return Err(GraphError::CannotCloneSection { id: id.into() });
    }
    is_valid_op(flow, &place.parent, id)?;

    let mut next = flow.clone();
    let mut draft = Draft::new(&mut next);
    let index = insert_position(draft.flow, &place.parent, place.before.as_deref())?;
    draft.insert_edge(&place.parent, index, id)?;
    let patch = draft.finish();
    Ok((next, patch))
}

/// Relocates the single edge `parent -> id` to a new position, possibly
/// under a different parent.
pub fn move_node(
    flow: &Flow,
    id: &str,
    parent: &str,
    to: &Placement,
) -> Result<(Flow, Patch), GraphError> {
    if flow.get(id).is_none() {
        return Err(GraphError::NodeNotFound { id: id.into() });
    }
    let from_index = flow
        .get(parent)
        .ok_or_else(|| GraphError::ParentNotFound { id: parent.into() })?
        .edges
        .iter()
        .position(|e| e == id)
        .ok_or_else(|| GraphError::NotConnected {
            parent: parent.into(),
            id: id.into(),
        })?;

    let same_parent = to.parent == parent;
    if !same_parent {
        is_valid_op(flow, &to.parent, id)?;
    }
    if flow.get(id).is_some_and(|n| n.is(NodeType::Section))
        && !section_position_ok(flow, &to.parent)
    {
        return Err(GraphError::InvalidSectionPosition {
            parent: to.parent.clone(),
        });
    }

    let mut next = flow.clone();
    let mut draft = Draft::new(&mut next);

    if same_parent {
        // A same-parent relocation replays as one primitive move. The target
        // index is computed against the list with the edge already removed.
        let mut remaining = flow.get(parent).expect("parent checked").edges.clone();
        remaining.remove(from_index);
        let to_index = match to.before.as_deref() {
            None => remaining.len(),
            Some(sibling) => remaining.iter().position(|e| e == sibling).ok_or_else(|| {
                GraphError::BeforeNotFound {
                    id: sibling.into(),
                    parent: parent.into(),
                }
            })?,
        };
        draft.move_edge(parent, from_index, to_index)?;
    } else {
        draft.remove_edge(parent, from_index)?;
        let to_index = insert_position(draft.flow, &to.parent, to.before.as_deref())?;
        draft.insert_edge(&to.parent, to_index, id)?;
    }

    if draft.flow.is_cyclic() {
        return Err(GraphError::WouldCycle {
            parent: to.parent.clone(),
            id: id.into(),
        });
    }
    let patch = draft.finish();
    Ok((next, patch))
}

fn remove_inner(draft: &mut Draft<'_>, id: &str, parent: &str) -> Result<(), GraphError> {
    if draft.flow.get(id).is_none() {
        return Err(GraphError::NodeNotFound { id: id.into() });
    }
    let index = draft
        .flow
        .get(parent)
        .ok_or_else(|| GraphError::ParentNotFound { id: parent.into() })?
        .edges
        .iter()
        .position(|e| e == id)
        .ok_or_else(|| GraphError::NotConnected {
            parent: parent.into(),
            id: id.into(),
        })?;
    draft.remove_edge(parent, index)?;

    // Clone semantics: the record survives while any other parent still
    // references it.
    if draft.flow.edge_count_to(id) == 0 {
        let children = draft
            .flow
            .get(id)
            .map(|n| n.edges.clone())
            .unwrap_or_default();
        for child in children {
            remove_inner(draft, &child, id)?;
        }
        draft.remove_node(id)?;
    }
    Ok(())
}

/// Detaches the edge `parent -> id`. The node record (and, recursively, its
/// now-unreferenced descendants) is deleted only when no other parent still
/// references it.
pub fn remove(flow: &Flow, id: &str, parent: &str) -> Result<(Flow, Patch), GraphError> {
    let mut next = flow.clone();
    let mut draft = Draft::new(&mut next);
    remove_inner(&mut draft, id, parent)?;
    let patch = draft.finish();
    Ok((next, patch))
}

fn diff_fields(
    draft: &mut Draft<'_>,
    id: &str,
    new_data: &NodeData,
    remove_key_if_missing: bool,
) -> Result<(), GraphError> {
    let old = draft
        .flow
        .get(id)
        .ok_or_else(|| GraphError::NodeNotFound { id: id.into() })?
        .data
        .to_map();
    // Values are sanitized one by one, not as a whole object: an explicit
    // empty value is a "clear this field" signal, not noise to drop.
    let new: serde_json::Map<String, Value> = new_data
        .to_map()
        .into_iter()
        .map(|(k, v)| (k, sanitize(v)))
        .collect();

    if remove_key_if_missing {
        let stale: Vec<String> = old
            .keys()
            .filter(|k| !new.get(*k).is_some_and(is_something))
            .cloned()
            .collect();
        for key in stale {
            draft.remove_field(id, &key)?;
        }
    }

    for (key, value) in new {
        if !is_something(&value) {
            if old.contains_key(&key) && !remove_key_if_missing {
                draft.remove_field(id, &key)?;
            }
            continue;
        }
        if old.get(&key) != Some(&value) {
            draft.set_field(id, &key, value)?;
        }
    }
    Ok(())
}

fn reconcile_children(
    draft: &mut Draft<'_>,
    id: &str,
    children: Vec<NewNode>,
    remove_key_if_missing: bool,
) -> Result<(), GraphError> {
    // Give every incoming child a stable id up front so ordering and
    // diffing talk about the same list.
    let children: Vec<NewNode> = children
        .into_iter()
        .map(|c| {
            if c.id.is_some() {
                c
            } else {
                let fresh = new_node_id();
                c.with_id(fresh)
            }
        })
        .collect();
    let want: Vec<NodeId> = children.iter().filter_map(|c| c.id.clone()).collect();
    let current = draft
        .flow
        .get(id)
        .map(|n| n.edges.clone())
        .unwrap_or_default();

    if want != current {
        for child in &children {
            let cid = child.id.as_deref().expect("id assigned above");
            if !current.iter().any(|e| e == cid) {
                add_inner(draft, child.clone(), id, None)?;
            }
        }
        for gone in current.iter().filter(|e| !want.iter().any(|w| w == *e)) {
            remove_inner(draft, gone, id)?;
        }
        // Fix ordering with minimal moves.
        for (target_index, wanted) in want.iter().enumerate() {
            let edges = &draft.flow.get(id).expect("node present").edges;
            if edges.get(target_index) == Some(wanted) {
                continue;
            }
            let from = edges
                .iter()
                .position(|e| e == wanted)
                .ok_or_else(|| GraphError::NotConnected {
                    parent: id.into(),
                    id: wanted.clone(),
                })?;
            draft.move_edge(id, from, target_index)?;
        }
    }

    for child in children {
        let cid = child.id.as_deref().expect("id assigned above");
        if draft.flow.get(cid).is_some() {
            diff_fields(draft, cid, &child.data, remove_key_if_missing)?;
        } else {
            add_inner(draft, child, id, None)?;
        }
    }
    Ok(())
}

/// Computes a minimal field-level diff between a node's current data and
/// `new_data`, optionally reconciling its option children against
/// `children`.
///
/// With `remove_key_if_missing`, fields present on the node but absent (or
/// empty) in `new_data` are removed — the editor's "save this form" mode.
/// Without it, only fields explicitly set in `new_data` are touched.
pub fn update(
    flow: &Flow,
    id: &str,
    new_data: &NodeData,
    children: Option<Vec<NewNode>>,
    remove_key_if_missing: bool,
) -> Result<(Flow, Patch), GraphError> {
    if flow.get(id).is_none() {
        return Err(GraphError::NodeNotFound { id: id.into() });
    }
    let mut next = flow.clone();
    let mut draft = Draft::new(&mut next);

    if remove_key_if_missing {
        if let Some(children) = children {
            reconcile_children(&mut draft, id, children, remove_key_if_missing)?;
        }
    }
    diff_fields(&mut draft, id, new_data, remove_key_if_missing)?;

    let patch = draft.finish();
    Ok((next, patch))
}

fn make_unique_inner(
    draft: &mut Draft<'_>,
    id: &str,
    parent: &str,
    first_call: bool,
) -> Result<(), GraphError> {
    let node = draft
        .flow
        .get(id)
        .cloned()
        .ok_or_else(|| GraphError::NodeNotFound { id: id.into() })?;

    // A node still shared elsewhere keeps its identity; only the edge is
    // re-pointed at it.
    if !first_call && draft.flow.is_clone(id) {
        let index = draft
            .flow
            .get(parent)
            .map(|p| p.edges.len())
            .unwrap_or_default();
        draft.insert_edge(parent, index, id)?;
        return Ok(());
    }

    let new_id = new_node_id();
    let copy = Node {
        kind: node.kind,
        data: node.data.clone(),
        edges: Vec::new(),
    };
    draft.insert_node(&new_id, copy)?;
    let index = if first_call {
        insert_position(draft.flow, parent, Some(id))?
    } else {
        insert_position(draft.flow, parent, None)?
    };
    draft.insert_edge(parent, index, &new_id)?;

    for child in &node.edges {
        make_unique_inner(draft, child, &new_id, false)?;
    }
    Ok(())
}

/// Deep-copies the subtree rooted at `id` with fresh ids, re-pointing the
/// single edge from `parent` at the copy.
///
/// The copy is a pre-order walk: descendants that are themselves clones
/// shared outside the subtree keep their existing id and stay shared;
/// everything else gets a fresh id. The original edge (and any records it
/// alone kept alive) is then removed.
pub fn make_unique(flow: &Flow, id: &str, parent: &str) -> Result<(Flow, Patch), GraphError> {
    if flow.get(id).is_none() {
        return Err(GraphError::NodeNotFound { id: id.into() });
    }
    if flow.get(parent).is_none() {
        return Err(GraphError::ParentNotFound { id: parent.into() });
    }
    let mut next = flow.clone();
    let mut draft = Draft::new(&mut next);
    make_unique_inner(&mut draft, id, parent, true)?;
    remove_inner(&mut draft, id, parent)?;
    let patch = draft.finish();
    Ok((next, patch))
}
