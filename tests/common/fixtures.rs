use waymark::flow::{Flow, Node, NodeData};
use waymark::types::NodeType;

/// An Answer option carrying a passport value.
pub fn option(val: &str) -> Node {
    Node::new(NodeType::Answer).with_data(NodeData::new().val(val).text(val))
}

/// A blank Answer option ("none of these").
pub fn blank(text: &str) -> Node {
    Node::new(NodeType::Answer).with_data(NodeData::new().text(text))
}

/// A single-select Question reading/writing `fn_key`.
pub fn question(fn_key: &str, edges: &[&str]) -> Node {
    Node::new(NodeType::Question)
        .with_data(NodeData::new().fn_key(fn_key))
        .with_edges(edges.iter().copied())
}

/// A multi-select Checklist reading/writing `fn_key`.
pub fn checklist(fn_key: &str, edges: &[&str]) -> Node {
    Node::new(NodeType::Checklist)
        .with_data(NodeData::new().fn_key(fn_key))
        .with_edges(edges.iter().copied())
}

/// The parent/child granularity fixture: a manually-answered checklist
/// followed by a checklist and a question over the same key with options
/// `a`, `a.x`, `b` (plus `c` and a blank on the second checklist).
pub fn parent_child_flow() -> Flow {
    let mut flow = Flow::new();
    flow.root_mut().edges = vec!["checklist1".into(), "checklist2".into(), "question".into()];

    flow.insert("checklist1", checklist("values", &["c1_a", "c1_ax", "c1_b"]));
    flow.insert("c1_a", option("a"));
    flow.insert("c1_ax", option("a.x"));
    flow.insert("c1_b", option("b"));

    flow.insert(
        "checklist2",
        checklist("values", &["c2_a", "c2_ax", "c2_b", "c2_c", "c2_blank"]),
    );
    flow.insert("c2_a", option("a"));
    flow.insert("c2_ax", option("a.x"));
    flow.insert("c2_b", option("b"));
    flow.insert("c2_c", option("c"));
    flow.insert("c2_blank", blank("blank"));

    flow.insert("question", question("values", &["q_a", "q_ax", "q_b", "q_blank"]));
    flow.insert("q_a", option("a"));
    flow.insert("q_ax", option("a.x"));
    flow.insert("q_b", option("b"));
    flow.insert("q_blank", blank("blank"));

    flow
}

/// Two questions over the same never-written key. When `same_options` both
/// offer `a`/`b`/blank; otherwise the second gains an extra option `c`.
pub fn blank_inference_flow(same_options: bool) -> Flow {
    let mut flow = Flow::new();
    flow.root_mut().edges = vec!["first".into(), "second".into()];

    flow.insert("first", question("option", &["f_a", "f_b", "f_blank"]));
    flow.insert("f_a", option("a"));
    flow.insert("f_b", option("b"));
    flow.insert("f_blank", blank("none"));

    let second_edges: &[&str] = if same_options {
        &["s_a", "s_b", "s_blank"]
    } else {
        &["s_a", "s_b", "s_c", "s_blank"]
    };
    flow.insert("second", question("option", second_edges));
    flow.insert("s_a", option("a"));
    flow.insert("s_b", option("b"));
    if !same_options {
        flow.insert("s_c", option("c"));
    }
    flow.insert("s_blank", blank("none"));

    flow
}
