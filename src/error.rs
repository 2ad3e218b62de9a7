//! Error types for the waymark flow engine.
//!
//! Two families of errors exist, mirroring the two halves of the crate:
//!
//! - [`GraphError`]: structural-edit rejections from the op generator. A
//!   rejected edit emits *no* operations — the document is never left in a
//!   partially-mutated state.
//! - [`SessionError`]: interpreter-side failures. `NodeNotFound` here is a
//!   fatal caller error signalling a stale snapshot; the engine makes no
//!   attempt to recover.
//!
//! Passport compilation deliberately has no error type: it degrades by
//! skipping malformed breadcrumb entries (with a `tracing` warning) because
//! it is read-heavy and feeds surfaces that must not crash on partially
//! corrupt history.

use miette::Diagnostic;
use thiserror::Error;

use crate::types::NodeId;

/// Rejection of a structural edit before any operation is emitted.
#[derive(Debug, Clone, PartialEq, Eq, Error, Diagnostic)]
pub enum GraphError {
    /// The target node id does not exist in the document.
    #[error("node \"{id}\" not found")]
    #[diagnostic(code(waymark::graph::node_not_found))]
    NodeNotFound { id: NodeId },

    /// The named parent does not exist in the document.
    #[error("parent \"{id}\" not found")]
    #[diagnostic(code(waymark::graph::parent_not_found))]
    ParentNotFound { id: NodeId },

    /// The `before` sibling is not an edge of the target parent.
    #[error("sibling \"{id}\" not found among edges of \"{parent}\"")]
    #[diagnostic(code(waymark::graph::before_not_found))]
    BeforeNotFound { id: NodeId, parent: NodeId },

    /// The parent already holds an edge to the candidate.
    #[error("\"{parent}\" already connects to \"{id}\"")]
    #[diagnostic(code(waymark::graph::duplicate_edge))]
    DuplicateEdge { parent: NodeId, id: NodeId },

    /// The edit would close a cycle in the document.
    #[error("connecting \"{parent}\" to \"{id}\" would create a cycle")]
    #[diagnostic(
        code(waymark::graph::would_cycle),
        help("a node cannot be moved or cloned underneath its own descendants")
    )]
    WouldCycle { parent: NodeId, id: NodeId },

    /// The named parent does not hold an edge to the node being detached.
    #[error("\"{parent}\" does not connect to \"{id}\"")]
    #[diagnostic(code(waymark::graph::not_connected))]
    NotConnected { parent: NodeId, id: NodeId },

    /// Sections may only sit on the root, or directly inside a root-level
    /// internal portal.
    #[error("cannot place a section under \"{parent}\"")]
    #[diagnostic(
        code(waymark::graph::invalid_section_position),
        help("sections belong on the main graph, not on branches")
    )]
    InvalidSectionPosition { parent: NodeId },

    /// External flow references cannot be cloned.
    #[error("cannot clone external flow reference \"{id}\"")]
    #[diagnostic(code(waymark::graph::cannot_clone_flow_reference))]
    CannotCloneFlowReference { id: NodeId },

    /// Sections cannot be shared between branches.
    #[error("cannot clone section \"{id}\"")]
    #[diagnostic(code(waymark::graph::cannot_clone_section))]
    CannotCloneSection { id: NodeId },

    /// An operation list referenced an edge index that no longer exists.
    #[error("edge index {index} out of bounds for \"{id}\"")]
    #[diagnostic(
        code(waymark::graph::stale_op),
        help("the snapshot moved underneath this patch; regenerate it")
    )]
    StaleOp { id: NodeId, index: usize },

    /// A node-field operation produced data the node schema rejects.
    #[error("invalid data for field \"{key}\" of \"{id}\": {message}")]
    #[diagnostic(code(waymark::graph::invalid_field))]
    InvalidField {
        id: NodeId,
        key: String,
        message: String,
    },
}

/// Interpreter-side failures surfaced to the session owner.
#[derive(Debug, Clone, PartialEq, Eq, Error, Diagnostic)]
pub enum SessionError {
    /// An answer was recorded for an id absent from the graph. This signals
    /// a stale or inconsistent snapshot and is not recoverable.
    #[error("node \"{id}\" not found")]
    #[diagnostic(code(waymark::session::node_not_found))]
    NodeNotFound { id: NodeId },

    /// `override_answer` could not locate a node that manually asks for the
    /// overridden key.
    #[error("no node re-asks for \"{key}\"")]
    #[diagnostic(code(waymark::session::override_target_not_found))]
    OverrideTargetNotFound { key: String },

    /// `previous_card` was requested but no eligible return point exists.
    #[error("nothing to go back to")]
    #[diagnostic(code(waymark::session::nothing_to_go_back_to))]
    NothingToGoBackTo,
}
