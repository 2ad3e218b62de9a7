//! The passport: a flattened key/value projection of breadcrumb history.
//!
//! The passport is derived, never stored: every call to [`compute_passport`]
//! folds the full breadcrumb store, in traversal order, into a fresh
//! projection. Three kinds of contribution exist:
//!
//! 1. **Answers** — a decision breadcrumb whose node carries an `fn` key
//!    contributes its selected options' `val`s. A later breadcrumb's values
//!    are *prepended* to whatever the key already holds, and the array is
//!    then collapsed to the most granular value per dot-hierarchy chain.
//!    The merge is deliberately order-dependent (see the order-sensitivity
//!    tests): traversal order is authoritative, which is exactly why resume
//!    paths must re-sort breadcrumbs before computing.
//! 2. **Direct data** — input components write keys verbatim through the
//!    breadcrumb's `data` map. The reserved `_nots` entry folds into the
//!    parallel negative namespace instead.
//! 3. **Value-setter operations** — SetValue/Calculate breadcrumbs apply
//!    their node's operation (`replace`/`append`/`remove`) against the
//!    values accumulated so far.
//!
//! The configured constraints key is exempt from granularity collapsing:
//! externally-queried constraint data retains every level (`listed` *and*
//! `listed.grade-one`), and matching against it is exact.
//!
//! Compilation never fails. A breadcrumb referencing a node missing from the
//! flow is skipped with a warning: this path feeds read-heavy UI that must
//! not crash on partially corrupt history.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::breadcrumbs::Breadcrumbs;
use crate::config::EngineConfig;
use crate::flow::Flow;
use crate::types::SetOperation;
use crate::utils::json_ext::extends_key;

/// Reserved `data` key carrying negative facts.
pub const NOTS_KEY: &str = "_nots";

/// Derived key/value projection of the breadcrumb history.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Passport {
    /// Positive facts: `fn` key to contributed value(s). Answer-contributed
    /// keys hold ordered arrays; input components may write any JSON shape.
    #[serde(default)]
    pub data: FxHashMap<String, Value>,

    /// Negative facts: values explicitly known to be false/absent per key.
    #[serde(default, skip_serializing_if = "FxHashMap::is_empty")]
    pub nots: FxHashMap<String, Vec<String>>,
}

impl Passport {
    #[must_use]
    pub fn has(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }

    /// String-array view of a key's value.
    ///
    /// Only the array shape participates in value matching; scalar shapes
    /// written by input components are present (see [`has`](Self::has)) but
    /// are not an eligible automation format and read as empty here.
    #[must_use]
    pub fn values(&self, key: &str) -> Vec<String> {
        match self.data.get(key) {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Negative facts recorded for a key.
    #[must_use]
    pub fn nots_for(&self, key: &str) -> &[String] {
        self.nots.get(key).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Keeps only values no other value strictly extends, preserving order.
///
/// `["food", "food.fruit.apple", "drink"]` collapses to
/// `["food.fruit.apple", "drink"]` — the most granular value per chain wins.
fn collapse_most_granular(values: &[String]) -> Vec<String> {
    values
        .iter()
        .filter(|v| !values.iter().any(|other| extends_key(other, v)))
        .cloned()
        .collect()
}

fn dedup_preserving_order(values: Vec<String>) -> Vec<String> {
    let mut seen = rustc_hash::FxHashSet::default();
    values.into_iter().filter(|v| seen.insert(v.clone())).collect()
}

fn to_value_array(values: Vec<String>) -> Value {
    Value::Array(values.into_iter().map(Value::String).collect())
}

/// Compiles the passport from the full breadcrumb store.
///
/// Pure: identical `(flow, breadcrumbs, config)` always yields an identical
/// passport. Breadcrumbs must be in traversal order (resume paths re-sort
/// first; see [`Breadcrumbs::sort_depth_first`]).
#[must_use]
pub fn compute_passport(flow: &Flow, breadcrumbs: &Breadcrumbs, config: &EngineConfig) -> Passport {
    let mut passport = Passport::default();

    for (id, crumb) in breadcrumbs.iter() {
        let Some(node) = flow.resolve(id) else {
            warn!(node = %id, "skipping breadcrumb for node missing from flow");
            continue;
        };

        let fn_key = node.data.fn_key.clone();
        let previous = fn_key
            .as_deref()
            .map(|key| passport.values(key))
            .unwrap_or_default();

        // Direct data written by the node, `_nots` routed to the negative
        // namespace. A value-setter's own key is excluded: its operation
        // below is authoritative, and a recorded `remove` must not re-write
        // the value it exists to clear.
        let is_value_setter = node.kind.is_some_and(|k| k.is_value_setter());
        for (key, value) in &crumb.data {
            if is_value_setter && fn_key.as_deref() == Some(key.as_str()) {
                continue;
            }
            if key == NOTS_KEY {
                if let Value::Object(entries) = value {
                    for (not_key, not_values) in entries {
                        let values: Vec<String> = match not_values {
                            Value::Array(items) => items
                                .iter()
                                .filter_map(|v| v.as_str().map(str::to_string))
                                .collect(),
                            Value::String(s) => vec![s.clone()],
                            _ => Vec::new(),
                        };
                        passport.nots.insert(not_key.clone(), values);
                    }
                }
            } else {
                passport.data.insert(key.clone(), value.clone());
            }
        }

        // Selected options contribute their vals under the node's fn key.
        if let Some(key) = fn_key.as_deref() {
            let contributed: Vec<String> = crumb
                .answers
                .iter()
                .filter_map(|answer| flow.resolve(answer))
                .filter_map(|answer| answer.data.val.clone())
                .filter(|val| !val.trim().is_empty())
                .collect();

            if !contributed.is_empty() {
                // Later breadcrumbs prepend; existing values follow.
                let mut combined = contributed;
                combined.extend(previous.iter().cloned());
                let merged = if config.is_constraints_key(key) {
                    // Constraints retain every granularity level.
                    dedup_preserving_order(combined)
                } else {
                    dedup_preserving_order(collapse_most_granular(&combined))
                };
                passport.data.insert(key.to_string(), to_value_array(merged));
            }

            // Value-setters apply their operation against the values
            // accumulated before this breadcrumb.
            if is_value_setter {
                if let Some(val) = node.data.val.clone().filter(|v| !v.trim().is_empty()) {
                    apply_set_operation(
                        &mut passport,
                        key,
                        &val,
                        node.data.operation.unwrap_or_default(),
                        &previous,
                    );
                }
            }
        }
    }

    passport
}

fn apply_set_operation(
    passport: &mut Passport,
    key: &str,
    val: &str,
    operation: SetOperation,
    previous: &[String],
) {
    match operation {
        SetOperation::Replace => {
            passport
                .data
                .insert(key.to_string(), to_value_array(vec![val.to_string()]));
        }
        SetOperation::Append => {
            let mut values = previous.to_vec();
            values.push(val.to_string());
            passport
                .data
                .insert(key.to_string(), to_value_array(dedup_preserving_order(values)));
        }
        SetOperation::Remove => {
            // Conditional delete: only when the value is currently present.
            if previous.iter().any(|v| v == val) {
                passport.data.remove(key);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collapse_keeps_most_granular_per_chain() {
        let values: Vec<String> = ["a", "a.x", "b"].map(String::from).to_vec();
        assert_eq!(collapse_most_granular(&values), vec!["a.x", "b"]);
    }

    #[test]
    fn collapse_is_dot_boundary_aware() {
        let values: Vec<String> = ["food.fruit", "food.fruits"].map(String::from).to_vec();
        assert_eq!(
            collapse_most_granular(&values),
            vec!["food.fruit", "food.fruits"]
        );
    }
}
