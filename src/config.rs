//! Engine configuration.
//!
//! The engine itself owns no policy tables: the flag priority table and the
//! constraints namespace key are supplied by a configuration collaborator,
//! typically deserialized from the service's settings document. Defaults
//! exist so a bare `EngineConfig::default()` is usable in tests and simple
//! embeddings.

use serde::{Deserialize, Serialize};

use crate::flags::FlagTable;

/// Static configuration consumed by the interpreter and the flag aggregator.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineConfig {
    /// Priority-ordered flag table.
    pub flags: FlagTable,

    /// Passport key under which externally-queried constraint data lives.
    ///
    /// The constraints namespace behaves differently from ordinary keys:
    /// every granularity level is retained in the passport (no collapsing to
    /// the most granular value), auto-answering matches exactly rather than
    /// by prefix, and the parallel `_nots` namespace drives blank automation
    /// for constraints known not to apply.
    pub constraints_key: Option<String>,
}

impl EngineConfig {
    /// Is `key` the configured constraints namespace?
    #[must_use]
    pub fn is_constraints_key(&self, key: &str) -> bool {
        self.constraints_key.as_deref() == Some(key)
    }
}
