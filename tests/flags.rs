mod common;

use common::*;
use rustc_hash::FxHashMap;
use waymark::breadcrumbs::{Breadcrumb, Breadcrumbs};
use waymark::flags::{collected_flags, result_data, FlagTable, TextOverride};
use waymark::flow::{Flow, Node, NodeData};
use waymark::types::NodeType;

/// Two questions carrying flags from both categories; the second option of
/// the first question uses the legacy single-value wire form.
fn flagged_flow() -> Flow {
    let mut flow = Flow::new();
    flow.root_mut().edges = vec!["q1".into(), "q2".into()];
    flow.insert("q1", question("first", &["q1_exempt", "q1_blocked"]));
    flow.insert(
        "q1_exempt",
        Node::new(NodeType::Answer)
            .with_data(NodeData::new().val("e").flag("eligibility.exempt")),
    );
    // Single legacy value on the wire, normalized to a list in the model.
    let q1_blocked: Node = serde_json::from_value(serde_json::json!({
        "type": "answer",
        "data": { "val": "b", "flag": "eligibility.blocked" }
    }))
    .unwrap();
    flow.insert("q1_blocked", q1_blocked);

    flow.insert("q2", question("second", &["q2_works"]));
    flow.insert(
        "q2_works",
        Node::new(NodeType::Answer).with_data(
            NodeData::new()
                .val("w")
                .flag("works.consent-needed")
                .flag("eligibility.notice-only"),
        ),
    );
    flow
}

#[test]
fn flags_group_by_category_and_order_by_priority() {
    let flow = flagged_flow();
    let crumbs: Breadcrumbs = [
        ("q1", Breadcrumb::manual().with_answers(["q1_exempt", "q1_blocked"])),
        ("q2", Breadcrumb::manual().with_answers(["q2_works"])),
    ]
    .into_iter()
    .collect();

    let collected = collected_flags(&flow, &crumbs, &FlagTable::default());

    let eligibility: Vec<&str> = collected["eligibility"]
        .iter()
        .map(|f| f.value.as_str())
        .collect();
    assert_eq!(
        eligibility,
        vec![
            "eligibility.blocked",
            "eligibility.notice-only",
            "eligibility.exempt"
        ]
    );
    let works: Vec<&str> = collected["works"].iter().map(|f| f.value.as_str()).collect();
    assert_eq!(works, vec!["works.consent-needed"]);
}

#[test]
fn every_category_appears_even_when_empty() {
    let flow = flagged_flow();
    let crumbs = Breadcrumbs::new();
    let collected = collected_flags(&flow, &crumbs, &FlagTable::default());
    assert!(collected["eligibility"].is_empty());
    assert!(collected["works"].is_empty());
}

#[test]
fn result_is_the_highest_priority_collected_flag() {
    let flow = flagged_flow();
    let crumbs: Breadcrumbs = [
        ("q1", Breadcrumb::manual().with_answers(["q1_exempt", "q1_blocked"])),
        ("q2", Breadcrumb::manual().with_answers(["q2_works"])),
    ]
    .into_iter()
    .collect();

    let result = result_data(&flow, &crumbs, &FlagTable::default(), Some("eligibility"), None);
    assert_eq!(result.flag.value.as_deref(), Some("eligibility.blocked"));
    assert_eq!(result.display_text.heading, "Blocked");
    assert_eq!(result.display_text.description, "eligibility");
}

#[test]
fn responses_not_carrying_the_result_flag_are_hidden() {
    let flow = flagged_flow();
    let crumbs: Breadcrumbs = [
        ("q1", Breadcrumb::manual().with_answers(["q1_blocked"])),
        ("q2", Breadcrumb::manual().with_answers(["q2_works"])),
    ]
    .into_iter()
    .collect();

    let result = result_data(&flow, &crumbs, &FlagTable::default(), Some("eligibility"), None);
    let q1 = result.responses.iter().find(|r| r.question == "q1").unwrap();
    let q2 = result.responses.iter().find(|r| r.question == "q2").unwrap();
    assert!(!q1.hidden);
    assert!(q2.hidden);
}

#[test]
fn all_hidden_responses_are_unhidden_together() {
    let flow = flagged_flow();
    // No works-category flag collected: every response would be hidden, so
    // all are shown instead.
    let crumbs: Breadcrumbs = [("q1", Breadcrumb::manual().with_answers(["q1_exempt"]))]
        .into_iter()
        .collect();

    let result = result_data(&flow, &crumbs, &FlagTable::default(), Some("works"), None);
    assert!(!result.responses.is_empty());
    assert!(result.responses.iter().all(|r| !r.hidden));
}

#[test]
fn no_collected_flag_resolves_to_no_result() {
    let flow = flagged_flow();
    let crumbs = Breadcrumbs::new();
    let result = result_data(&flow, &crumbs, &FlagTable::default(), None, None);
    assert_eq!(result.flag.value, None);
    assert_eq!(result.flag.text, "No result");
}

#[test]
fn display_text_overrides_apply_per_flag() {
    let flow = flagged_flow();
    let crumbs: Breadcrumbs = [("q1", Breadcrumb::manual().with_answers(["q1_blocked"]))]
        .into_iter()
        .collect();

    let mut overrides: FxHashMap<String, TextOverride> = FxHashMap::default();
    overrides.insert(
        "eligibility.blocked".into(),
        TextOverride {
            heading: Some("You cannot apply".into()),
            description: None,
        },
    );

    let result = result_data(
        &flow,
        &crumbs,
        &FlagTable::default(),
        Some("eligibility"),
        Some(&overrides),
    );
    assert_eq!(result.display_text.heading, "You cannot apply");
    assert_eq!(result.display_text.description, "eligibility");
}

#[test]
fn flag_table_deserializes_from_configuration() {
    let table: FlagTable = serde_json::from_value(serde_json::json!([
        { "value": "custom.high", "text": "High", "category": "custom" },
        { "value": "custom.low", "text": "Low", "category": "custom" }
    ]))
    .unwrap();

    assert_eq!(table.default_category(), "custom");
    assert_eq!(table.priority("custom", "custom.low"), Some(1));
}
