//! Traversal and auto-answering.
//!
//! The interpreter decides what to present next. It maintains a *frontier*:
//! the lazily-expanding set of not-yet-visited node ids reachable from the
//! answers collected so far plus the root's edge list. Candidates are only
//! expanded into their own children once they reach the head of the frontier
//! — grouping nodes and internal subgraph references are never flattened
//! prematurely, since their children depend on which branch was taken to
//! reach them. External subgraph references are the exception: they are
//! substituted transparently by the referenced flow's content at traversal
//! time and never surface themselves.
//!
//! [`next_card_ids`] drives the advance loop: every head that can be
//! answered without a human — passive cards, value-setters, filters,
//! decisions whose answer is already implied by the passport — is folded
//! into the breadcrumb store with `auto: true`, and the loop continues. The
//! first head that needs a human stops the loop and heads the returned
//! sequence. Ambiguity is never guessed away: a decision whose only match
//! is genuinely new surfaces to the caller.

pub mod auto_answer;
pub mod session;

use rustc_hash::FxHashSet;
use serde_json::Value;
use tracing::debug;

use crate::breadcrumbs::{Breadcrumb, Breadcrumbs};
use crate::config::EngineConfig;
use crate::error::SessionError;
use crate::flow::{Flow, ROOT_NODE_ID};
use crate::passport::compute_passport;
use crate::types::{NodeId, NodeType};

pub use auto_answer::{auto_answerable_flag, auto_answerable_options};
pub use session::Session;

/// Computes the frontier: upcoming node ids in depth-first order.
///
/// Pure. Candidates are children of the collected answers (most recent
/// first) and of the root, filtered of everything already visited. A visited
/// grouping node passes through to its children; an external portal is
/// substituted by the referenced flow's root content.
#[must_use]
pub fn upcoming_card_ids(flow: &Flow, breadcrumbs: &Breadcrumbs) -> Vec<NodeId> {
    let mut candidates: FxHashSet<NodeId> = FxHashSet::default();

    let mut seeds: Vec<NodeId> = breadcrumbs.answers_rev();
    seeds.push(ROOT_NODE_ID.to_string());

    let mut seen_seeds: FxHashSet<NodeId> = FxHashSet::default();
    for seed in seeds {
        if seen_seeds.insert(seed.clone()) {
            connected_from(flow, breadcrumbs, &seed, &mut candidates, &mut FxHashSet::default());
        }
    }

    flow.sort_ids_depth_first(candidates)
}

fn connected_from(
    flow: &Flow,
    breadcrumbs: &Breadcrumbs,
    source: &str,
    candidates: &mut FxHashSet<NodeId>,
    walked: &mut FxHashSet<NodeId>,
) {
    if !walked.insert(source.to_string()) {
        return;
    }
    let Some(source_node) = flow.resolve(source) else {
        return;
    };

    // External portals contribute the referenced flow's root content.
    let children: Vec<NodeId> = if source_node.is(NodeType::ExternalPortal) {
        match source_node
            .data
            .flow_id
            .as_deref()
            .and_then(|fid| flow.external(fid))
            .and_then(|external| external.get(ROOT_NODE_ID))
        {
            Some(external_root) => external_root.edges.clone(),
            None => source_node.edges.clone(),
        }
    } else {
        source_node.edges.clone()
    };

    for child in children {
        let Some(node) = flow.resolve(&child) else {
            continue;
        };
        if breadcrumbs.contains(&child) {
            // An entered group is transparent: its children are reachable
            // even though the group itself was already visited.
            if node.kind.is_some_and(|k| k.is_grouping()) {
                connected_from(flow, breadcrumbs, &child, candidates, walked);
            }
            continue;
        }
        if node.is(NodeType::ExternalPortal) {
            connected_from(flow, breadcrumbs, &child, candidates, walked);
            continue;
        }
        // Lazy expansion: the candidate itself joins the frontier; its
        // children wait until it is visited.
        candidates.insert(child);
    }
}

/// Advances the frontier, folding every auto-answerable head into the
/// breadcrumb store, and returns the remaining upcoming sequence.
///
/// The head of the returned sequence is the first card that needs a human;
/// an empty return means the flow is complete. Deterministic for fixed
/// inputs: a repeated call records nothing further and returns the same
/// sequence.
pub fn next_card_ids(
    flow: &Flow,
    breadcrumbs: &mut Breadcrumbs,
    config: &EngineConfig,
) -> Result<Vec<NodeId>, SessionError> {
    loop {
        let upcoming = upcoming_card_ids(flow, breadcrumbs);
        let Some(head) = upcoming.first() else {
            return Ok(upcoming);
        };
        let node = flow
            .resolve(head)
            .ok_or_else(|| SessionError::NodeNotFound { id: head.clone() })?;
        let Some(kind) = node.kind else {
            return Ok(upcoming);
        };

        let crumb = if kind.is_grouping() {
            Some(Breadcrumb::automatic())
        } else if kind.is_value_setter() {
            let mut crumb = Breadcrumb::automatic();
            if let (Some(key), Some(val)) = (node.data.fn_key.clone(), node.data.val.clone()) {
                crumb = crumb.with_data(key, Value::Array(vec![Value::String(val)]));
            }
            Some(crumb)
        } else if kind.is_auto_advance() {
            Some(Breadcrumb::automatic())
        } else if kind == NodeType::Filter {
            match auto_answerable_flag(flow, breadcrumbs, config, head) {
                Some(option) => Some(Breadcrumb::automatic().with_answers([option])),
                None => {
                    // A filter with no usable options cannot be put to a
                    // human either; step over it.
                    debug!(node = %head, "stepping over filter with no matching option");
                    Some(Breadcrumb::automatic())
                }
            }
        } else if kind.is_decision() {
            let passport = compute_passport(flow, breadcrumbs, config);
            auto_answerable_options(flow, breadcrumbs, &passport, config, head)
                .map(|options| Breadcrumb::automatic().with_answers(options))
        } else {
            None
        };

        match crumb {
            Some(crumb) => {
                debug!(node = %head, "auto-answering");
                breadcrumbs.insert(head.clone(), crumb);
                breadcrumbs.sort_depth_first(flow);
            }
            None => return Ok(upcoming),
        }
    }
}
