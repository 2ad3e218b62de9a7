//! # Waymark: Flow Interpretation & Collaborative Graph-Edit Engine
//!
//! Waymark is the engine behind a question-flow ("service") builder:
//! authors assemble a directed graph of question and content nodes, and
//! applicants walk that graph as an interactive questionnaire. This crate
//! owns the two algorithmically dense halves of that system:
//!
//! - **Interpretation** — given a graph and the answers so far, decide what
//!   to ask next, silently answer whatever can be answered safely, and
//!   derive a flattened key/value *passport* from the history.
//! - **Collaborative editing** — turn structural intents (insert, remove,
//!   move, clone, diff-and-patch) into minimal, validated, replayable edit
//!   operations that an operational-transform transport can broadcast to
//!   every connected editor.
//!
//! Rendering, transport, persistence, and auth are collaborator concerns
//! and live elsewhere.
//!
//! ## Core Concepts
//!
//! - **Flow**: an arena of nodes keyed by stable id plus ordered edge
//!   lists; shared subtrees ("clones") are first-class
//! - **Breadcrumbs**: the traversal-ordered record of per-node outcomes
//! - **Passport**: the derived key/value projection driving auto-answering
//! - **Frontier**: the lazily-expanding queue of not-yet-visited nodes
//! - **Patch**: an ordered, invertible list of primitive edit operations
//!
//! ## Quick Start
//!
//! ### Walking a flow
//!
//! ```
//! use waymark::breadcrumbs::Breadcrumb;
//! use waymark::config::EngineConfig;
//! use waymark::flow::{Flow, Node, NodeData};
//! use waymark::interpreter::Session;
//! use waymark::types::NodeType;
//!
//! let mut flow = Flow::new();
//! flow.root_mut().edges = vec!["food".into(), "fruit".into()];
//! flow.insert(
//!     "food",
//!     Node::new(NodeType::Question)
//!         .with_data(NodeData::new().fn_key("food").text("What do you eat?"))
//!         .with_edges(["apple", "bread"]),
//! );
//! flow.insert(
//!     "apple",
//!     Node::new(NodeType::Answer).with_data(NodeData::new().val("food.fruit.apple")),
//! );
//! flow.insert(
//!     "bread",
//!     Node::new(NodeType::Answer).with_data(NodeData::new().val("food.bread")),
//! );
//! flow.insert(
//!     "fruit",
//!     Node::new(NodeType::Question)
//!         .with_data(NodeData::new().fn_key("food").text("Any fruit?"))
//!         .with_edges(["fruit_yes", "fruit_no"]),
//! );
//! flow.insert(
//!     "fruit_yes",
//!     Node::new(NodeType::Answer).with_data(NodeData::new().val("food.fruit")),
//! );
//! flow.insert(
//!     "fruit_no",
//!     Node::new(NodeType::Answer).with_data(NodeData::new().val("food.none")),
//! );
//!
//! let mut session = Session::new(flow, EngineConfig::default());
//! assert_eq!(session.current_card().unwrap().as_deref(), Some("food"));
//!
//! session
//!     .record("food", Breadcrumb::manual().with_answers(["apple"]))
//!     .unwrap();
//!
//! // The second question never surfaces: the passport already holds
//! // "food.fruit.apple", which extends the "food.fruit" option value.
//! assert_eq!(session.current_card().unwrap(), None);
//! let fruit = session.breadcrumbs().get("fruit").unwrap();
//! assert!(fruit.auto);
//! assert_eq!(fruit.answers, vec!["fruit_yes"]);
//! ```
//!
//! ### Editing a flow
//!
//! ```
//! use waymark::flow::mutate::{self, NewNode, Placement};
//! use waymark::flow::{Flow, NodeData};
//! use waymark::types::NodeType;
//!
//! let flow = Flow::new();
//! let question = NewNode::new(NodeType::Question)
//!     .with_data(NodeData::new().fn_key("colour").text("Favourite colour?"))
//!     .with_child(NewNode::new(NodeType::Answer).with_data(NodeData::new().val("red")))
//!     .with_child(NewNode::new(NodeType::Answer).with_data(NodeData::new().val("blue")));
//!
//! let (next, patch) = mutate::add(&flow, question, &Placement::default()).unwrap();
//!
//! // The patch replays deterministically against the original snapshot...
//! assert_eq!(patch.apply(&flow).unwrap(), next);
//! // ...and inverts cleanly.
//! assert_eq!(patch.invert().apply(&next).unwrap(), flow);
//! ```
//!
//! ## Module Guide
//!
//! - [`flow`] - Graph document, ops, and the validated op generator
//! - [`breadcrumbs`] - Traversal-ordered answer history
//! - [`passport`] - Derived key/value projection
//! - [`interpreter`] - Frontier, auto-answering, and the session layer
//! - [`flags`] - Flag collection and result aggregation
//! - [`config`] - Flag table and constraints-key configuration
//! - [`error`] - Typed, diagnostic-carrying error families
//! - [`telemetry`] - Tracing setup helpers

pub mod breadcrumbs;
pub mod config;
pub mod error;
pub mod flags;
pub mod flow;
pub mod interpreter;
pub mod passport;
pub mod telemetry;
pub mod types;
pub mod utils;
