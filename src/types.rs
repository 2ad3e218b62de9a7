//! Core types for the waymark flow engine.
//!
//! This module defines the closed node-type enumeration used throughout the
//! engine. The interpreter never needs type-specific rendering knowledge; it
//! only cares about the *classification* of a type — whether it is a decision
//! the applicant makes, a passive card that advances on its own, a grouping
//! construct that expands into children, or an irrevocable side effect.
//!
//! # Examples
//!
//! ```rust
//! use waymark::types::NodeType;
//!
//! assert!(NodeType::Question.is_decision());
//! assert!(NodeType::Content.is_auto_advance());
//! assert!(NodeType::InternalPortal.is_grouping());
//! assert!(NodeType::Pay.is_terminal_effect());
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a node within a flow graph.
///
/// Ids are opaque strings allocated by the editor (10-char alphanumerics by
/// default, see [`crate::flow::new_node_id`]); the single reserved id
/// [`crate::flow::ROOT_NODE_ID`] denotes the document root.
pub type NodeId = String;

/// The closed set of node types a flow document may contain.
///
/// The enumeration is externally defined by the schema of the document store;
/// the engine reads it only through the classification helpers below. Adding
/// a variant here requires deciding its classification — there is no default.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NodeType {
    /// Root marker of a flow document.
    Flow,
    /// Single-select decision presented to the applicant.
    Question,
    /// One selectable option under a Question, Checklist or Filter.
    Answer,
    /// Multi-select decision presented to the applicant.
    Checklist,
    /// Writes a passport key without applicant involvement.
    SetValue,
    /// Informational card with no outcome.
    Content,
    /// Informational notice with no outcome.
    Notice,
    /// Routes on the highest-priority collected flag of a category.
    Filter,
    /// Top-level grouping marker.
    Section,
    /// Grouping of several cards presented together.
    Page,
    /// Reference to a subgraph within the same document.
    InternalPortal,
    /// Reference to another published flow, substituted at traversal time.
    ExternalPortal,
    /// Payment step; completing it is irrevocable.
    Pay,
    /// Derives a passport value from other passport values.
    Calculate,
    /// Submits the collected data to a back office.
    Send,
    /// Final confirmation card.
    Confirmation,
    /// Summary card letting the applicant change earlier answers.
    Review,
}

impl NodeType {
    /// Decision types the applicant answers by selecting option children.
    #[must_use]
    pub fn is_decision(&self) -> bool {
        matches!(self, NodeType::Question | NodeType::Checklist)
    }

    /// Passive types the interpreter always advances past without input.
    #[must_use]
    pub fn is_auto_advance(&self) -> bool {
        matches!(
            self,
            NodeType::Content | NodeType::Notice | NodeType::SetValue | NodeType::Calculate
        )
    }

    /// Value-setting types that apply a [`SetOperation`] to the passport.
    #[must_use]
    pub fn is_value_setter(&self) -> bool {
        matches!(self, NodeType::SetValue | NodeType::Calculate)
    }

    /// Grouping types expanded into their children only once they reach the
    /// head of the frontier.
    #[must_use]
    pub fn is_grouping(&self) -> bool {
        matches!(
            self,
            NodeType::Section | NodeType::Page | NodeType::InternalPortal
        )
    }

    /// Types whose completion permanently disables back-navigation.
    #[must_use]
    pub fn is_terminal_effect(&self) -> bool {
        matches!(self, NodeType::Pay | NodeType::Send | NodeType::Confirmation)
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NodeType::Flow => "flow",
            NodeType::Question => "question",
            NodeType::Answer => "answer",
            NodeType::Checklist => "checklist",
            NodeType::SetValue => "set-value",
            NodeType::Content => "content",
            NodeType::Notice => "notice",
            NodeType::Filter => "filter",
            NodeType::Section => "section",
            NodeType::Page => "page",
            NodeType::InternalPortal => "internal-portal",
            NodeType::ExternalPortal => "external-portal",
            NodeType::Pay => "pay",
            NodeType::Calculate => "calculate",
            NodeType::Send => "send",
            NodeType::Confirmation => "confirmation",
            NodeType::Review => "review",
        };
        write!(f, "{name}")
    }
}

/// How a value-setting node combines its value with what the passport
/// already holds for its key.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SetOperation {
    /// Overwrite the key's value list.
    #[default]
    Replace,
    /// Add to the key's value list, keeping existing entries.
    Append,
    /// Delete the key if the node's value is currently present; no-op otherwise.
    Remove,
}
