//! Flag collection and result aggregation.
//!
//! Selected options may carry categorical outcome values ("flags"). The
//! aggregator scans the whole breadcrumb history, groups collected flags by
//! category, and reduces each category to its highest-priority value — the
//! category's *result*. Priority is the position in the [`FlagTable`], a
//! static configuration owned by a configuration collaborator, not by this
//! crate; a compiled-in default table is provided for convenience and tests.
//!
//! A category with no collected flag resolves to a defined "No result"
//! value rather than an empty state, so downstream surfaces never deal with
//! an absent result.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::breadcrumbs::Breadcrumbs;
use crate::flow::Flow;
use crate::types::NodeId;

/// One possible categorical outcome value.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flag {
    /// Stable machine value, matched against option `flag` data.
    pub value: String,
    /// Display text.
    pub text: String,
    /// Category this flag belongs to.
    pub category: String,
}

/// Priority-ordered flag configuration: within each category, earlier
/// entries outrank later ones.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FlagTable {
    flags: Vec<Flag>,
}

impl FlagTable {
    #[must_use]
    pub fn new(flags: Vec<Flag>) -> Self {
        Self { flags }
    }

    /// Categories in table order, de-duplicated.
    #[must_use]
    pub fn categories(&self) -> Vec<&str> {
        let mut out: Vec<&str> = Vec::new();
        for flag in &self.flags {
            if !out.contains(&flag.category.as_str()) {
                out.push(&flag.category);
            }
        }
        out
    }

    /// The default category: the table's first.
    #[must_use]
    pub fn default_category(&self) -> &str {
        self.flags.first().map(|f| f.category.as_str()).unwrap_or("")
    }

    /// Flags of one category, highest priority first.
    pub fn in_category<'a>(&'a self, category: &'a str) -> impl Iterator<Item = &'a Flag> {
        self.flags.iter().filter(move |f| f.category == category)
    }

    /// Looks a flag up by value.
    #[must_use]
    pub fn find(&self, value: &str) -> Option<&Flag> {
        self.flags.iter().find(|f| f.value == value)
    }

    /// Priority rank of a value within its category (0 = highest).
    #[must_use]
    pub fn priority(&self, category: &str, value: &str) -> Option<usize> {
        self.in_category(category).position(|f| f.value == value)
    }

    /// The defined empty result for a category.
    #[must_use]
    pub fn no_result(&self, category: &str) -> ResultFlag {
        ResultFlag {
            value: None,
            text: "No result".to_string(),
            category: category.to_string(),
        }
    }
}

impl Default for FlagTable {
    fn default() -> Self {
        let entry = |value: &str, text: &str, category: &str| Flag {
            value: value.to_string(),
            text: text.to_string(),
            category: category.to_string(),
        };
        Self::new(vec![
            entry("eligibility.blocked", "Blocked", "eligibility"),
            entry("eligibility.missing-info", "Missing information", "eligibility"),
            entry("eligibility.approval-needed", "Approval needed", "eligibility"),
            entry("eligibility.notice-only", "Notice only", "eligibility"),
            entry("eligibility.exempt", "Exempt", "eligibility"),
            entry("works.restricted", "Restricted works", "works"),
            entry("works.consent-needed", "Consent needed", "works"),
            entry("works.unrestricted", "Unrestricted", "works"),
        ])
    }
}

/// A category's reduced result: the top collected flag, or the defined
/// "No result" value when nothing was collected.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultFlag {
    pub value: Option<String>,
    pub text: String,
    pub category: String,
}

/// Heading and description shown for a category's result.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayText {
    pub heading: String,
    pub description: String,
}

/// Per-flag display text overrides supplied by the editor.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextOverride {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heading: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// One decision breadcrumb's contribution to a result page.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseSummary {
    pub question: NodeId,
    pub selections: Vec<NodeId>,
    /// `true` when none of the selections carries the result flag; such
    /// rows are collapsed by default on the result page.
    pub hidden: bool,
}

/// A category's full result: flag, display text, contributing responses.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultData {
    pub flag: ResultFlag,
    pub display_text: DisplayText,
    pub responses: Vec<ResponseSummary>,
}

/// Collected flag values of one category, de-duplicated and ordered highest
/// priority first.
///
/// Accepts both the legacy single-value `flag` data and the array form (the
/// document model normalizes both to a list). Values not present in the
/// table's category are ignored.
#[must_use]
pub fn collected_values_by_category(
    flow: &Flow,
    breadcrumbs: &Breadcrumbs,
    table: &FlagTable,
    category: &str,
) -> Vec<String> {
    let possible: Vec<&str> = table.in_category(category).map(|f| f.value.as_str()).collect();

    let mut collected: Vec<String> = Vec::new();
    for (_, crumb) in breadcrumbs.iter() {
        for answer in &crumb.answers {
            let Some(node) = flow.resolve(answer) else {
                continue;
            };
            for flag in &node.data.flags {
                if possible.contains(&flag.as_str()) {
                    collected.push(flag.clone());
                }
            }
        }
    }

    collected.sort_by_key(|value| {
        possible
            .iter()
            .position(|p| p == value)
            .unwrap_or(usize::MAX)
    });
    collected.dedup();
    collected
}

/// All collected flags, grouped per category and priority-ordered.
///
/// Every category of the table appears in the output, possibly empty.
#[must_use]
pub fn collected_flags(
    flow: &Flow,
    breadcrumbs: &Breadcrumbs,
    table: &FlagTable,
) -> FxHashMap<String, Vec<Flag>> {
    let mut out = FxHashMap::default();
    for category in table.categories() {
        let flags = collected_values_by_category(flow, breadcrumbs, table, category)
            .into_iter()
            .filter_map(|value| table.find(&value).cloned())
            .collect();
        out.insert(category.to_string(), flags);
    }
    out
}

/// Reduces one category to its result.
///
/// The top collected flag wins; an empty category resolves to the table's
/// "No result". Responses list every decision breadcrumb with its selected
/// options; a response is `hidden` unless one of its selections carries the
/// winning flag — except that when *every* response would be hidden, all are
/// shown instead.
#[must_use]
pub fn result_data(
    flow: &Flow,
    breadcrumbs: &Breadcrumbs,
    table: &FlagTable,
    category: Option<&str>,
    overrides: Option<&FxHashMap<String, TextOverride>>,
) -> ResultData {
    let category = category.unwrap_or_else(|| table.default_category());
    let collected = collected_values_by_category(flow, breadcrumbs, table, category);

    let flag = collected
        .first()
        .and_then(|value| table.find(value))
        .map(|f| ResultFlag {
            value: Some(f.value.clone()),
            text: f.text.clone(),
            category: f.category.clone(),
        })
        .unwrap_or_else(|| table.no_result(category));

    let mut responses: Vec<ResponseSummary> = breadcrumbs
        .iter()
        .filter_map(|(id, crumb)| {
            let node = flow.resolve(id)?;
            if !node.kind.is_some_and(|k| k.is_decision()) {
                return None;
            }
            let hidden = !crumb.answers.iter().any(|answer| {
                flag.value.as_deref().is_some_and(|value| {
                    flow.resolve(answer)
                        .is_some_and(|a| a.data.flags.iter().any(|f| f == value))
                })
            });
            Some(ResponseSummary {
                question: id.clone(),
                selections: crumb.answers.clone(),
                hidden,
            })
        })
        .collect();

    if responses.iter().all(|r| r.hidden) {
        for response in &mut responses {
            response.hidden = false;
        }
    }

    let override_entry = flag
        .value
        .as_deref()
        .and_then(|value| overrides.and_then(|o| o.get(value)));
    let heading = override_entry
        .and_then(|o| o.heading.clone())
        .unwrap_or_else(|| flag.text.clone());
    let description = override_entry
        .and_then(|o| o.description.clone())
        .unwrap_or_else(|| category.to_string());

    ResultData {
        flag,
        display_text: DisplayText {
            heading,
            description,
        },
        responses,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::breadcrumbs::Breadcrumb;
    use crate::flow::{Node, NodeData};
    use crate::types::NodeType;

    fn flagged_flow() -> Flow {
        let mut flow = Flow::new();
        flow.root_mut().edges = vec!["q".into()];
        flow.insert("q", Node::new(NodeType::Question).with_edges(["a1", "a2"]));
        flow.insert(
            "a1",
            Node::new(NodeType::Answer)
                .with_data(NodeData::new().flag("eligibility.exempt")),
        );
        flow.insert(
            "a2",
            Node::new(NodeType::Answer)
                .with_data(NodeData::new().flag("eligibility.blocked")),
        );
        flow
    }

    #[test]
    fn collected_flags_are_priority_ordered_and_deduped() {
        let flow = flagged_flow();
        let crumbs: Breadcrumbs = [(
            "q",
            Breadcrumb::manual().with_answers(["a1", "a2"]),
        )]
        .into_iter()
        .collect();

        let values =
            collected_values_by_category(&flow, &crumbs, &FlagTable::default(), "eligibility");
        // "blocked" outranks "exempt" regardless of selection order.
        assert_eq!(values, vec!["eligibility.blocked", "eligibility.exempt"]);
    }

    #[test]
    fn empty_category_resolves_to_no_result() {
        let flow = flagged_flow();
        let crumbs = Breadcrumbs::new();
        let result = result_data(&flow, &crumbs, &FlagTable::default(), None, None);
        assert_eq!(result.flag.value, None);
        assert_eq!(result.flag.text, "No result");
    }
}
