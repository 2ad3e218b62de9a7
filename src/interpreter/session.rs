//! The session: a thin mutable layer over the pure interpreter functions.
//!
//! The engine's core is pure functions of `(flow, breadcrumbs)`. A
//! [`Session`] owns that state for one applicant, re-invoking the pure
//! functions on every change: recording answers, folding auto-answers,
//! navigating backwards, and rebuilding the passport on demand. Nothing here
//! blocks; suspension in the wider system is just the caller waiting for a
//! human between calls.
//!
//! Going back does not throw answers away. Entries removed from the history
//! move into a cache keyed by node id; when the applicant re-answers and
//! the flow converges back onto cached nodes, compatible cached entries are
//! restored — answers living on branches the new answer abandoned are
//! dropped as orphans first.

use rustc_hash::FxHashMap;
use serde_json::Value;
use tracing::warn;
use uuid::Uuid;

use crate::breadcrumbs::{Breadcrumb, Breadcrumbs};
use crate::config::EngineConfig;
use crate::error::SessionError;
use crate::flags::{self, FlagTable, ResultData, TextOverride};
use crate::flow::Flow;
use crate::passport::{compute_passport, Passport};
use crate::types::{NodeId, NodeType};

/// One applicant's interactive walk through a flow.
pub struct Session {
    flow: Flow,
    config: EngineConfig,
    breadcrumbs: Breadcrumbs,
    cached: Breadcrumbs,
    session_id: Uuid,
    restore: bool,
    changed_node: Option<NodeId>,
}

impl Session {
    /// Starts a fresh session over a flow snapshot.
    #[must_use]
    pub fn new(flow: Flow, config: EngineConfig) -> Self {
        Self {
            flow,
            config,
            breadcrumbs: Breadcrumbs::new(),
            cached: Breadcrumbs::new(),
            session_id: Uuid::new_v4(),
            restore: false,
            changed_node: None,
        }
    }

    #[must_use]
    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    #[must_use]
    pub fn flow(&self) -> &Flow {
        &self.flow
    }

    #[must_use]
    pub fn breadcrumbs(&self) -> &Breadcrumbs {
        &self.breadcrumbs
    }

    /// Recomputes the passport from the full history.
    #[must_use]
    pub fn passport(&self) -> Passport {
        compute_passport(&self.flow, &self.breadcrumbs, &self.config)
    }

    /// The upcoming sequence as it stands, without advancing anything.
    #[must_use]
    pub fn upcoming_card_ids(&self) -> Vec<NodeId> {
        super::upcoming_card_ids(&self.flow, &self.breadcrumbs)
    }

    /// Advances past everything auto-answerable and returns the remaining
    /// sequence, headed by the first card that needs the applicant.
    pub fn next_card_ids(&mut self) -> Result<Vec<NodeId>, SessionError> {
        super::next_card_ids(&self.flow, &mut self.breadcrumbs, &self.config)
    }

    /// The card to present now, advancing past auto-answerable heads.
    pub fn current_card(&mut self) -> Result<Option<NodeId>, SessionError> {
        Ok(self.next_card_ids()?.first().cloned())
    }

    /// `true` when exactly one card remains.
    #[must_use]
    pub fn is_final_card(&self) -> bool {
        self.upcoming_card_ids().len() == 1
    }

    /// Records an answer for a node.
    ///
    /// Recording for an id absent from the flow is a fatal caller error:
    /// it means the session's snapshot is stale.
    pub fn record(&mut self, id: &str, crumb: Breadcrumb) -> Result<(), SessionError> {
        if self.flow.resolve(id).is_none() {
            return Err(SessionError::NodeNotFound { id: id.to_string() });
        }

        let mut crumb = crumb;
        drop_nullish(&mut crumb.data);
        if let Some(override_data) = &mut crumb.override_data {
            drop_nullish(override_data);
            if override_data.is_empty() {
                crumb.override_data = None;
            }
        }

        // Cached descendants of the options *not* selected this time are
        // orphans: they answered questions on a branch that no longer
        // exists.
        self.remove_orphans_from_cache(id, &crumb);
        self.cached.remove(id);

        if self.restore {
            let cached = std::mem::take(&mut self.cached);
            for (cached_id, cached_crumb) in cached.iter() {
                self.breadcrumbs.insert(cached_id.clone(), cached_crumb.clone());
            }
        }

        self.breadcrumbs.insert(id.to_string(), crumb);
        self.breadcrumbs.sort_depth_first(&self.flow);
        self.restore = false;

        // Submitting a Review card completes a change-answer cycle.
        let review_present = self.breadcrumbs.keys().any(|bid| {
            self.flow
                .resolve(bid)
                .is_some_and(|n| n.is(NodeType::Review))
        });
        if review_present {
            self.changed_node = None;
        }
        Ok(())
    }

    /// Navigates back to `id`: every entry from `id` onwards moves into the
    /// cache so re-answering can restore still-valid downstream answers.
    pub fn go_back_to(&mut self, id: &str) -> Result<(), SessionError> {
        if self.flow.resolve(id).is_none() {
            return Err(SessionError::NodeNotFound { id: id.to_string() });
        }
        if let Some(tail) = self.breadcrumbs.split_off(id) {
            for (tail_id, tail_crumb) in tail.iter() {
                // Existing cache entries win over freshly removed ones.
                if !self.cached.contains(tail_id) {
                    self.cached.insert(tail_id.clone(), tail_crumb.clone());
                }
            }
        }
        Ok(())
    }

    /// Re-asks an already-answered node, keeping its previous entry cached
    /// for restore-on-match.
    pub fn change_answer(&mut self, id: &str) -> Result<(), SessionError> {
        if self.flow.resolve(id).is_none() {
            return Err(SessionError::NodeNotFound { id: id.to_string() });
        }
        self.changed_node = Some(id.to_string());
        self.restore = true;
        self.go_back_to(id)
    }

    /// Overrides a passport value that was originally written by another
    /// node (typically auto-filled from an external lookup).
    ///
    /// The original value moves into the writing breadcrumb's `override`
    /// side-channel — the rest of that entry stays untouched — and the flow
    /// navigates back to the first node that manually asks for `key`, so a
    /// fresh answer re-establishes the value.
    pub fn override_answer(&mut self, key: &str) -> Result<(), SessionError> {
        let origin = self
            .breadcrumbs
            .iter()
            .find(|(_, crumb)| crumb.data.contains_key(key))
            .map(|(id, _)| id.clone());

        if let Some(origin_id) = origin {
            if let Some(crumb) = self.breadcrumbs.get_mut(&origin_id) {
                if let Some(value) = crumb.data.remove(key) {
                    crumb
                        .override_data
                        .get_or_insert_with(FxHashMap::default)
                        .insert(key.to_string(), value);
                }
            }
        }

        let target = self
            .breadcrumbs
            .iter()
            .find(|(bid, _)| {
                self.flow.resolve(bid).is_some_and(|n| {
                    n.data.fn_key.as_deref() == Some(key) || n.data.val.as_deref() == Some(key)
                })
            })
            .map(|(bid, _)| bid.clone())
            .ok_or_else(|| SessionError::OverrideTargetNotFound {
                key: key.to_string(),
            })?;

        self.change_answer(&target)
    }

    /// `true` once a human has completed a payment. Irrevocable.
    #[must_use]
    pub fn has_paid(&self) -> bool {
        self.breadcrumbs.iter().any(|(id, crumb)| {
            !crumb.auto
                && self
                    .flow
                    .resolve(id)
                    .is_some_and(|n| n.is(NodeType::Pay))
        })
    }

    /// The eligible return point: the entry before the current card among
    /// human-answered breadcrumbs, in depth-first order.
    #[must_use]
    pub fn previous_card(&self) -> Option<NodeId> {
        let current = self.upcoming_card_ids().into_iter().next();

        if let (Some(changed), Some(current)) = (self.changed_node.as_deref(), current.as_deref()) {
            if changed == current {
                return None;
            }
        }

        let go_backable: Vec<NodeId> = self
            .breadcrumbs
            .iter()
            .filter(|(_, crumb)| !crumb.auto)
            .map(|(id, _)| id.clone())
            .collect();
        if go_backable.is_empty() {
            return None;
        }

        match current {
            None => go_backable.last().cloned(),
            Some(current) => {
                let mut ids = go_backable;
                ids.push(current.clone());
                let sorted = self.flow.sort_ids_depth_first(ids);
                let index = sorted.iter().position(|id| *id == current)?;
                if index > 0 {
                    Some(sorted[index - 1].clone())
                } else {
                    None
                }
            }
        }
    }

    /// `true` when back-navigation is currently possible: an eligible
    /// return point exists and no irrevocable payment has been recorded.
    #[must_use]
    pub fn can_go_back(&self) -> bool {
        !self.has_paid() && self.previous_card().is_some()
    }

    /// Restores a persisted session.
    ///
    /// Generic key/value persistence is free to reorder entries, so the
    /// store is re-sorted into traversal order here — the interpreter and
    /// the passport compiler are only defined over traversal-ordered
    /// history.
    pub fn resume(&mut self, mut breadcrumbs: Breadcrumbs) {
        breadcrumbs.sort_depth_first(&self.flow);
        self.breadcrumbs = breadcrumbs;
        self.cached = Breadcrumbs::new();
        self.restore = false;
        self.changed_node = None;
    }

    /// Collected flags per category, priority-ordered.
    #[must_use]
    pub fn collected_flags(&self) -> FxHashMap<String, Vec<crate::flags::Flag>> {
        flags::collected_flags(&self.flow, &self.breadcrumbs, &self.config.flags)
    }

    /// A category's reduced result.
    #[must_use]
    pub fn result_data(
        &self,
        category: Option<&str>,
        overrides: Option<&FxHashMap<String, TextOverride>>,
    ) -> ResultData {
        flags::result_data(
            &self.flow,
            &self.breadcrumbs,
            &self.config.flags,
            category,
            overrides,
        )
    }

    /// The flag table in use.
    #[must_use]
    pub fn flag_table(&self) -> &FlagTable {
        &self.config.flags
    }

    fn remove_orphans_from_cache(&mut self, id: &str, crumb: &Breadcrumb) {
        let Some(node) = self.flow.resolve(id) else {
            return;
        };
        let orphaned: Vec<NodeId> = node
            .edges
            .iter()
            .filter(|edge| !crumb.answers.iter().any(|a| a == *edge))
            .cloned()
            .collect();

        let mut to_remove = orphaned;
        let mut walked: rustc_hash::FxHashSet<NodeId> = rustc_hash::FxHashSet::default();
        while let Some(current) = to_remove.pop() {
            if !walked.insert(current.clone()) {
                continue;
            }
            let Some(current_node) = self.flow.resolve(&current) else {
                warn!(node = %current, "orphan sweep hit a node missing from the flow");
                continue;
            };
            self.cached.remove(&current);
            for child in &current_node.edges {
                if !walked.contains(child) {
                    to_remove.push(child.clone());
                }
            }
        }
    }
}

fn drop_nullish(data: &mut FxHashMap<String, Value>) {
    data.retain(|_, v| !v.is_null());
}
