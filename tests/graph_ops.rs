mod common;

use common::*;
use waymark::error::GraphError;
use waymark::flow::mutate::{self, NewNode, Placement};
use waymark::flow::{Flow, Node, NodeData, ROOT_NODE_ID};
use waymark::types::NodeType;

fn two_branch_flow() -> Flow {
    let mut flow = Flow::new();
    flow.root_mut().edges = vec!["q".into(), "note".into()];
    flow.insert("q", question("colour", &["red", "blue"]));
    flow.insert("red", option("red"));
    flow.insert("blue", option("blue"));
    flow.insert("note", Node::new(NodeType::Notice));
    flow
}

#[test]
fn add_appends_to_root_and_replays() {
    let flow = Flow::new();
    let spec = NewNode::new(NodeType::Question)
        .with_id("q1")
        .with_data(NodeData::new().fn_key("food").text("What food?"))
        .with_child(NewNode::new(NodeType::Answer).with_data(NodeData::new().val("bread")))
        .with_child(NewNode::new(NodeType::Answer).with_data(NodeData::new().val("fruit")));

    let (next, patch) = mutate::add(&flow, spec, &Placement::default()).unwrap();

    assert_eq!(next.root().edges, vec!["q1"]);
    assert_eq!(next.get("q1").unwrap().edges.len(), 2);
    assert!(next.validate().is_ok());

    // Replay and inverse both converge.
    assert_eq!(patch.apply(&flow).unwrap(), next);
    assert_eq!(patch.invert().apply(&next).unwrap(), flow);
}

#[test]
fn add_before_sibling_inserts_at_position() {
    let flow = two_branch_flow();
    let spec = NewNode::new(NodeType::Content).with_id("intro");
    let place = Placement::default().before("note");

    let (next, _) = mutate::add(&flow, spec, &place).unwrap();
    assert_eq!(next.root().edges, vec!["q", "intro", "note"]);
}

#[test]
fn add_with_unknown_before_is_rejected() {
    let flow = two_branch_flow();
    let spec = NewNode::new(NodeType::Content).with_id("intro");
    let place = Placement::default().before("missing");

    assert!(matches!(
        mutate::add(&flow, spec, &place),
        Err(GraphError::BeforeNotFound { .. })
    ));
}

#[test]
fn add_reusing_existing_id_creates_clone_edge() {
    let flow = two_branch_flow();
    // Re-adding "note" under "red" shares the record instead of copying it.
    let spec = NewNode::new(NodeType::Notice).with_id("note");
    let (next, patch) = mutate::add(&flow, spec, &Placement::under("red")).unwrap();

    assert_eq!(next.edge_count_to("note"), 2);
    assert!(next.is_clone("note"));
    assert_eq!(next.len(), flow.len());
    // The patch is a single edge insert, no node ops.
    assert_eq!(patch.len(), 1);
}

#[test]
fn remove_detaches_edge_and_reaps_unreferenced_subtree() {
    let flow = two_branch_flow();
    let (next, patch) = mutate::remove(&flow, "q", ROOT_NODE_ID).unwrap();

    assert_eq!(next.root().edges, vec!["note"]);
    assert!(next.get("q").is_none());
    assert!(next.get("red").is_none());
    assert!(next.get("blue").is_none());
    assert_eq!(patch.invert().apply(&next).unwrap(), flow);
}

#[test]
fn remove_keeps_record_referenced_by_another_parent() {
    let flow = two_branch_flow();
    // "note" is shared: root -> note and red -> note.
    let (flow, _) = mutate::clone_edge(&flow, "note", &Placement::under("red")).unwrap();

    let (next, _) = mutate::remove(&flow, "note", ROOT_NODE_ID).unwrap();
    assert!(next.get("note").is_some());
    assert_eq!(next.edge_count_to("note"), 1);
    assert!(!next.root().edges.iter().any(|e| e == "note"));
}

#[test]
fn clone_edge_rejects_duplicate_and_cycles() {
    let flow = two_branch_flow();

    assert!(matches!(
        mutate::clone_edge(&flow, "note", &Placement::default()),
        Err(GraphError::DuplicateEdge { .. })
    ));

    // red -> q would close a cycle q -> red -> q.
    assert!(matches!(
        mutate::clone_edge(&flow, "q", &Placement::under("red")),
        Err(GraphError::WouldCycle { .. })
    ));
}

#[test]
fn move_within_parent_is_a_single_move_op() {
    let flow = two_branch_flow();
    let place = Placement::under(ROOT_NODE_ID).before("q");
    let (next, patch) = mutate::move_node(&flow, "note", ROOT_NODE_ID, &place).unwrap();

    assert_eq!(next.root().edges, vec!["note", "q"]);
    assert_eq!(patch.len(), 1);
    assert_eq!(patch.apply(&flow).unwrap(), next);
}

#[test]
fn move_across_parents_relocates_single_edge() {
    let flow = two_branch_flow();
    let (next, patch) =
        mutate::move_node(&flow, "note", ROOT_NODE_ID, &Placement::under("blue")).unwrap();

    assert_eq!(next.root().edges, vec!["q"]);
    assert_eq!(next.get("blue").unwrap().edges, vec!["note"]);
    assert_eq!(patch.invert().apply(&next).unwrap(), flow);
}

#[test]
fn move_under_own_descendant_is_rejected() {
    let flow = two_branch_flow();
    assert!(matches!(
        mutate::move_node(&flow, "q", ROOT_NODE_ID, &Placement::under("red")),
        Err(GraphError::WouldCycle { .. })
    ));
}

#[test]
fn is_valid_op_rejects_each_illegal_shape() {
    let flow = two_branch_flow();

    assert!(matches!(
        mutate::is_valid_op(&flow, "missing", "q"),
        Err(GraphError::ParentNotFound { .. })
    ));
    assert!(matches!(
        mutate::is_valid_op(&flow, ROOT_NODE_ID, "missing"),
        Err(GraphError::NodeNotFound { .. })
    ));
    assert!(matches!(
        mutate::is_valid_op(&flow, "q", "q"),
        Err(GraphError::WouldCycle { .. })
    ));
    assert!(matches!(
        mutate::is_valid_op(&flow, ROOT_NODE_ID, "note"),
        Err(GraphError::DuplicateEdge { .. })
    ));
    assert!(matches!(
        mutate::is_valid_op(&flow, "red", "q"),
        Err(GraphError::WouldCycle { .. })
    ));
    assert!(mutate::is_valid_op(&flow, "blue", "note").is_ok());
}

#[test]
fn update_with_no_changes_emits_no_ops() {
    let flow = two_branch_flow();
    let current = flow.get("q").unwrap().data.clone();
    let (next, patch) = mutate::update(&flow, "q", &current, None, false).unwrap();

    assert!(patch.is_empty());
    assert_eq!(next, flow);
}

#[test]
fn update_diffs_changed_fields_only() {
    let flow = two_branch_flow();
    let mut new_data = flow.get("q").unwrap().data.clone();
    new_data.text = Some("Pick a colour".into());

    let (next, patch) = mutate::update(&flow, "q", &new_data, None, false).unwrap();
    assert_eq!(patch.len(), 1);
    assert_eq!(
        next.get("q").unwrap().data.text.as_deref(),
        Some("Pick a colour")
    );
    // The fn key is untouched.
    assert_eq!(next.get("q").unwrap().data.fn_key.as_deref(), Some("colour"));
}

#[test]
fn update_remove_key_if_missing_clears_stale_fields() {
    let flow = two_branch_flow();
    let new_data = NodeData::new().text("Pick a colour");

    let (next, _) = mutate::update(&flow, "q", &new_data, None, true).unwrap();
    assert_eq!(next.get("q").unwrap().data.fn_key, None);
    assert_eq!(
        next.get("q").unwrap().data.text.as_deref(),
        Some("Pick a colour")
    );
}

#[test]
fn update_reconciles_option_children() {
    let flow = two_branch_flow();
    // Keep "blue" (moved first), drop "red", add "green".
    let children = vec![
        NewNode::new(NodeType::Answer)
            .with_id("blue")
            .with_data(flow.get("blue").unwrap().data.clone()),
        NewNode::new(NodeType::Answer)
            .with_id("green")
            .with_data(NodeData::new().val("green")),
    ];
    let current = flow.get("q").unwrap().data.clone();

    let (next, patch) = mutate::update(&flow, "q", &current, Some(children), true).unwrap();

    assert_eq!(next.get("q").unwrap().edges, vec!["blue", "green"]);
    assert!(next.get("red").is_none());
    assert_eq!(next.get("green").unwrap().data.val.as_deref(), Some("green"));
    assert_eq!(patch.apply(&flow).unwrap(), next);
}

#[test]
fn make_unique_copies_subtree_with_fresh_ids() {
    let mut flow = two_branch_flow();
    // Share "q" under a second parent so it is a clone.
    flow.insert("folder", Node::new(NodeType::InternalPortal));
    flow.root_mut().edges.push("folder".into());
    let (flow, _) = mutate::clone_edge(&flow, "q", &Placement::under("folder")).unwrap();
    assert!(flow.is_clone("q"));

    let (next, patch) = mutate::make_unique(&flow, "q", "folder").unwrap();

    // The folder now points at a fresh copy, not at "q".
    let copy_id = next.get("folder").unwrap().edges[0].clone();
    assert_ne!(copy_id, "q");
    // The original branch is untouched.
    assert!(next.root().edges.iter().any(|e| e == "q"));
    assert!(next.get("q").is_some());
    // The copy has its own option records with fresh ids.
    let copy = next.get(&copy_id).unwrap();
    assert_eq!(copy.edges.len(), 2);
    assert!(copy.edges.iter().all(|e| e != "red" && e != "blue"));
    assert_eq!(copy.data.fn_key.as_deref(), Some("colour"));

    assert_eq!(patch.apply(&flow).unwrap(), next);
}

#[test]
fn make_unique_keeps_descendant_clones_shared() {
    // q -> red, blue; shared -> blue (blue is a clone inside and outside
    // the copied subtree).
    let mut flow = two_branch_flow();
    flow.insert(
        "shared",
        Node::new(NodeType::Question).with_edges(["blue"]),
    );
    flow.root_mut().edges.push("shared".into());
    flow.insert("folder", Node::new(NodeType::InternalPortal));
    flow.root_mut().edges.push("folder".into());
    let (flow, _) = mutate::clone_edge(&flow, "q", &Placement::under("folder")).unwrap();

    let (next, _) = mutate::make_unique(&flow, "q", "folder").unwrap();

    let copy_id = next.get("folder").unwrap().edges[0].clone();
    let copy = next.get(&copy_id).unwrap();
    // "blue" stays shared by id inside the copy; "red" was copied fresh.
    assert!(copy.edges.iter().any(|e| e == "blue"));
    assert!(copy.edges.iter().all(|e| e != "red"));
}

#[test]
fn sections_only_sit_on_the_main_graph() {
    let flow = two_branch_flow();
    let spec = NewNode::new(NodeType::Section).with_id("s1");

    assert!(matches!(
        mutate::add(&flow, spec.clone(), &Placement::under("red")),
        Err(GraphError::InvalidSectionPosition { .. })
    ));
    assert!(mutate::add(&flow, spec, &Placement::default()).is_ok());
}

#[test]
fn composed_patches_replay_sequentially() {
    let flow = two_branch_flow();
    let (mid, first) =
        mutate::add(&flow, NewNode::new(NodeType::Content).with_id("intro"), &Placement::default())
            .unwrap();
    let (end, second) = mutate::remove(&mid, "note", ROOT_NODE_ID).unwrap();

    let composed = first.compose(second);
    assert_eq!(composed.apply(&flow).unwrap(), end);
    assert_eq!(composed.invert().apply(&end).unwrap(), flow);
}

#[test]
fn describe_summarizes_changes() {
    let flow = Flow::new();
    let spec = NewNode::new(NodeType::Question)
        .with_id("q1")
        .with_data(NodeData::new().text("What food?"));
    let (_, patch) = mutate::add(&flow, spec, &Placement::default()).unwrap();

    let summary = patch.describe(&flow);
    assert!(summary.iter().any(|line| line.contains("question")));
    assert!(summary.iter().any(|line| line.contains("What food?")));
}
