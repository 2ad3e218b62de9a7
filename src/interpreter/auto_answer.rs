//! Deciding a node's outcome without user input.
//!
//! Two mechanisms exist. Decision nodes (Question/Checklist) auto-answer by
//! **granularity matching** their options against the passport: an option
//! exactly matching a known value is selected; failing that, an option is
//! selected only when it is a strict prefix-ancestor of a known value and no
//! more granular sibling matches that same value. The most granular,
//! left-most match always wins. Filter nodes auto-answer from the collected
//! flags of their category: the highest-priority collected flag selects the
//! matching option edge, and no collected flag selects the blank fallback.
//!
//! The blank option of a decision node carries its own inference rule: when
//! the passport has never seen the node's key, the blank is only automated
//! once every non-blank option value has appeared somewhere in prior
//! history — an unseen absence is then safely read as "none of these". An
//! unseen option is never guessed past: ambiguity surfaces to the user.

use rustc_hash::FxHashSet;

use crate::breadcrumbs::Breadcrumbs;
use crate::config::EngineConfig;
use crate::flags::collected_values_by_category;
use crate::flow::Flow;
use crate::passport::Passport;
use crate::types::{NodeId, NodeType};
use crate::utils::json_ext::{extends_key, granularity};

#[derive(Clone, Copy)]
struct OptionRef<'a> {
    id: &'a str,
    val: Option<&'a str>,
    edge_index: usize,
}

struct MatchedOption<'a> {
    option: OptionRef<'a>,
    /// Distinct passport values this option's components cover.
    covers: Vec<String>,
    /// Summed component granularity; the specificity rank.
    gran: usize,
}

/// Options whose value is implied by the passport, ranked best first.
///
/// An option's `val` may name several comma-separated components; it only
/// matches when *every* component exact-matches a passport value or is a
/// strict dot-ancestor of one. Ranking prefers the option covering the most
/// passport values, then the most granular, then the left-most by edge
/// order — so `"food.fruit.apple,food.bread"` beats `"food.fruit.apple"`
/// when both apple and bread are known.
fn matching_options<'a>(
    non_blank: &[&OptionRef<'a>],
    passport_values: &[String],
) -> Vec<MatchedOption<'a>> {
    let mut out: Vec<MatchedOption<'a>> = Vec::new();
    for option in non_blank {
        let Some(val) = option.val else {
            continue;
        };
        let components: Vec<&str> = val
            .split(',')
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .collect();
        if components.is_empty() {
            continue;
        }

        let mut covers: Vec<String> = Vec::new();
        let mut all_components_match = true;
        for component in &components {
            let matched: Vec<&String> = passport_values
                .iter()
                .filter(|pv| pv.as_str() == *component || extends_key(pv, component))
                .collect();
            if matched.is_empty() {
                all_components_match = false;
                break;
            }
            for pv in matched {
                if !covers.contains(pv) {
                    covers.push(pv.clone());
                }
            }
        }
        if !all_components_match {
            continue;
        }

        let gran = components.iter().map(|c| granularity(c)).sum();
        out.push(MatchedOption {
            option: **option,
            covers,
            gran,
        });
    }

    out.sort_by(|a, b| {
        b.covers
            .len()
            .cmp(&a.covers.len())
            .then(b.gran.cmp(&a.gran))
            .then(a.option.edge_index.cmp(&b.option.edge_index))
    });
    out
}

fn options_of<'a>(flow: &'a Flow, edges: &'a [NodeId]) -> Vec<OptionRef<'a>> {
    edges
        .iter()
        .enumerate()
        .filter_map(|(edge_index, id)| {
            let node = flow.resolve(id)?;
            Some(OptionRef {
                id,
                val: node.data.val.as_deref().filter(|v| !v.trim().is_empty()),
                edge_index,
            })
        })
        .collect()
}

/// Option ids a Question/Checklist can be auto-answered with, or `None`
/// when the node must be put to the user.
///
/// Questions select one and return at most the single best match;
/// Checklists may return one match per distinct passport value. The
/// returned ids are ordered most granular first, edge order breaking ties.
#[must_use]
pub fn auto_answerable_options(
    flow: &Flow,
    breadcrumbs: &Breadcrumbs,
    passport: &Passport,
    config: &EngineConfig,
    id: &str,
) -> Option<Vec<NodeId>> {
    let node = flow.resolve(id)?;
    let kind = node.kind?;
    if !kind.is_decision() || node.edges.is_empty() || node.data.never_auto_answer {
        return None;
    }
    let fn_key = node.data.fn_key.as_deref()?;
    let always_blank = node.data.always_auto_answer_blank;

    // Only proceed once the flow has seen this key: either a prior node
    // asked for it, or something wrote it to the passport.
    let visited_fn_nodes: Vec<&NodeId> = breadcrumbs
        .iter()
        .filter(|(bid, _)| {
            flow.resolve(bid)
                .is_some_and(|n| n.data.fn_key.as_deref() == Some(fn_key))
        })
        .map(|(bid, _)| bid)
        .collect();
    if visited_fn_nodes.is_empty() && !passport.has(fn_key) && !always_blank {
        return None;
    }

    // Option values the user has already been shown for this key.
    let mut seen_vals: FxHashSet<&str> = FxHashSet::default();
    for bid in &visited_fn_nodes {
        if let Some(asked) = flow.resolve(bid) {
            for edge in &asked.edges {
                if let Some(answer) = flow.resolve(edge) {
                    if answer.is(NodeType::Answer) {
                        if let Some(val) = answer.data.val.as_deref() {
                            seen_vals.insert(val);
                        }
                    }
                }
            }
        }
    }

    let options = options_of(flow, &node.edges);
    let blank = options.iter().find(|o| o.val.is_none());
    let mut non_blank: Vec<&OptionRef> = options.iter().filter(|o| o.val.is_some()).collect();
    // Most granular first; stable, so edge order breaks ties.
    non_blank.sort_by(|a, b| {
        granularity(b.val.unwrap_or_default()).cmp(&granularity(a.val.unwrap_or_default()))
    });
    let seen_every_option = non_blank
        .iter()
        .all(|o| o.val.is_some_and(|v| seen_vals.contains(v)));

    let passport_values = passport.values(fn_key);
    let mut selected: Vec<&str> = Vec::new();

    if config.is_constraints_key(fn_key) {
        let nots = passport.nots_for(fn_key);
        if !passport_values.is_empty() || !nots.is_empty() {
            // Constraint data retains every granularity level, so only
            // exact matches count here.
            let exact: Vec<&OptionRef> = non_blank
                .iter()
                .filter(|o| passport_values.iter().any(|pv| Some(pv.as_str()) == o.val))
                .copied()
                .collect();
            if !exact.is_empty() {
                selected.extend(exact.iter().map(|o| o.id));
            } else if nots
                .iter()
                .any(|not| non_blank.iter().any(|o| o.val == Some(not.as_str())))
            {
                // Queried and known not to apply: automate the blank.
                if let Some(blank) = blank {
                    selected.push(blank.id);
                }
            } else if let Some(blank) = blank {
                // Asking about a constraint never queried: put it to the
                // user exactly once, automate later instances.
                if seen_every_option || always_blank {
                    selected.push(blank.id);
                }
            }
        }
    } else if !passport_values.is_empty() {
        let matching = matching_options(&non_blank, &passport_values);

        if matching.is_empty() {
            // Values exist but none relates to any option: the node is not
            // about them, travel through the blank.
            if let Some(blank) = blank {
                selected.push(blank.id);
            }
        } else {
            // Greedy coverage: the best-ranked option claims its values;
            // later options are only taken for values still uncovered, so
            // a less granular ancestor never rides along with an exact or
            // more specific sibling match for the same value.
            let mut covered: FxHashSet<String> = FxHashSet::default();
            for matched in &matching {
                if matched.covers.iter().any(|pv| !covered.contains(pv)) {
                    selected.push(matched.option.id);
                    covered.extend(matched.covers.iter().cloned());
                }
            }
        }
    } else if let Some(blank) = blank {
        // The key has never been written: infer "none of these" only once
        // the full option set has been seen before.
        if seen_every_option || always_blank {
            selected.push(blank.id);
        }
    }

    if selected.is_empty() && always_blank {
        if let Some(blank) = blank {
            selected.push(blank.id);
        }
    }

    if kind == NodeType::Question {
        selected.truncate(1);
    }

    if selected.is_empty() {
        None
    } else {
        Some(selected.into_iter().map(str::to_string).collect())
    }
}

/// The option edge a Filter auto-selects, or `None` when the filter has no
/// options at all.
///
/// The highest-priority collected flag of the filter's category picks the
/// matching option; with nothing collected, the blank "no result" edge is
/// selected.
#[must_use]
pub fn auto_answerable_flag(
    flow: &Flow,
    breadcrumbs: &Breadcrumbs,
    config: &EngineConfig,
    filter_id: &str,
) -> Option<NodeId> {
    let node = flow.resolve(filter_id)?;
    if !node.is(NodeType::Filter) || node.edges.is_empty() {
        return None;
    }

    let category = node
        .data
        .category
        .as_deref()
        .unwrap_or_else(|| config.flags.default_category());
    let collected = collected_values_by_category(flow, breadcrumbs, &config.flags, category);

    let options = options_of(flow, &node.edges);

    // Highest-priority flag first; the first option carrying it wins.
    for flag in &collected {
        if let Some(option) = options.iter().find(|o| o.val == Some(flag.as_str())) {
            return Some(option.id.to_string());
        }
    }

    options
        .iter()
        .find(|o| o.val.is_none())
        .map(|o| o.id.to_string())
}
