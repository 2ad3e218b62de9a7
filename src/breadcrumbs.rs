//! The ordered record of per-node answer history.
//!
//! Breadcrumbs are keyed by node id and ordered by **traversal order** — not
//! insertion order, and certainly not alphabetical order. The ordering is
//! load-bearing: the passport compiler and the interpreter are only defined
//! over traversal-ordered history (see [`crate::passport`]), and generic
//! key/value stores are free to reorder keys on persistence. That is why the
//! store is an explicit vector of entries rather than a map, and why
//! [`Breadcrumbs::sort_depth_first`] exists as a required step of any resume
//! path.
//!
//! On the wire a breadcrumb store is a plain JSON object, so existing session
//! storage reads and writes it unchanged; deserialization accepts keys in any
//! order and relies on the caller restoring traversal order.

use chrono::{DateTime, Utc};
use rustc_hash::FxHashMap;
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::fmt;

use crate::flow::Flow;
use crate::types::NodeId;

/// The recorded outcome of one visited node.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Breadcrumb {
    /// Selected option children of a Question/Checklist/Filter.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub answers: Vec<NodeId>,

    /// Passport keys this entry writes directly (value-setting nodes and
    /// input components).
    #[serde(default, skip_serializing_if = "FxHashMap::is_empty")]
    pub data: FxHashMap<String, Value>,

    /// `true` when the interpreter produced this entry without a human
    /// decision.
    pub auto: bool,

    /// Values a human subsequently overrode, retained for audit and
    /// back-navigation. Keys mirror the `data` keys they replaced.
    #[serde(rename = "override", default, skip_serializing_if = "Option::is_none")]
    pub override_data: Option<FxHashMap<String, Value>>,

    #[serde(rename = "createdAt", default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl Breadcrumb {
    /// An entry recorded from a human decision.
    #[must_use]
    pub fn manual() -> Self {
        Self {
            answers: Vec::new(),
            data: FxHashMap::default(),
            auto: false,
            override_data: None,
            created_at: Utc::now(),
        }
    }

    /// An entry the interpreter produced on its own.
    #[must_use]
    pub fn automatic() -> Self {
        Self {
            auto: true,
            ..Self::manual()
        }
    }

    #[must_use]
    pub fn with_answers<I, S>(mut self, answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<NodeId>,
    {
        self.answers = answers.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_data(mut self, key: impl Into<String>, value: Value) -> Self {
        self.data.insert(key.into(), value);
        self
    }
}

/// Ordered per-node answer history.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Breadcrumbs {
    entries: Vec<(NodeId, Breadcrumb)>,
}

impl Breadcrumbs {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.entries.iter().any(|(k, _)| k == id)
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Breadcrumb> {
        self.entries.iter().find(|(k, _)| k == id).map(|(_, v)| v)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Breadcrumb> {
        self.entries
            .iter_mut()
            .find(|(k, _)| k == id)
            .map(|(_, v)| v)
    }

    /// Iterates entries in traversal order.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = (&NodeId, &Breadcrumb)> {
        self.entries.iter().map(|(k, v)| (k, v))
    }

    /// Ids in traversal order.
    pub fn keys(&self) -> impl DoubleEndedIterator<Item = &NodeId> {
        self.entries.iter().map(|(k, _)| k)
    }

    /// Position of an id in traversal order.
    #[must_use]
    pub fn position(&self, id: &str) -> Option<usize> {
        self.entries.iter().position(|(k, _)| k == id)
    }

    /// Appends an entry, or replaces it in place if the id already exists.
    pub fn insert(&mut self, id: impl Into<NodeId>, crumb: Breadcrumb) {
        let id = id.into();
        match self.get_mut(&id) {
            Some(existing) => *existing = crumb,
            None => self.entries.push((id, crumb)),
        }
    }

    pub fn remove(&mut self, id: &str) -> Option<Breadcrumb> {
        let index = self.position(id)?;
        Some(self.entries.remove(index).1)
    }

    /// Splits the history at `id`: everything from `id` onwards (inclusive)
    /// is removed and returned. Returns `None` when `id` is not present.
    pub fn split_off(&mut self, id: &str) -> Option<Breadcrumbs> {
        let index = self.position(id)?;
        Some(Breadcrumbs {
            entries: self.entries.split_off(index),
        })
    }

    /// Keeps only entries whose id satisfies the predicate.
    pub fn retain(&mut self, mut keep: impl FnMut(&NodeId) -> bool) {
        self.entries.retain(|(k, _)| keep(k));
    }

    /// All selected answer ids, most recent entry first (each entry's own
    /// answers also reversed). This is the seed order for frontier
    /// computation.
    #[must_use]
    pub fn answers_rev(&self) -> Vec<NodeId> {
        self.entries
            .iter()
            .flat_map(|(_, crumb)| crumb.answers.iter().cloned())
            .rev()
            .collect()
    }

    /// Restores traversal order after a reload.
    ///
    /// Persistence layers are free to reorder object keys, so any resume
    /// path must call this before handing the store to the passport compiler
    /// or the interpreter. Ids no longer present in the flow sort to the end
    /// in their current relative order.
    pub fn sort_depth_first(&mut self, flow: &Flow) {
        let sorted = flow.sort_ids_depth_first(self.keys().cloned().collect::<Vec<_>>());
        let mut remaining: Vec<(NodeId, Breadcrumb)> = std::mem::take(&mut self.entries);
        for id in sorted {
            if let Some(index) = remaining.iter().position(|(k, _)| *k == id) {
                self.entries.push(remaining.remove(index));
            }
        }
        self.entries.extend(remaining);
    }
}

impl<K: Into<NodeId>> FromIterator<(K, Breadcrumb)> for Breadcrumbs {
    fn from_iter<T: IntoIterator<Item = (K, Breadcrumb)>>(iter: T) -> Self {
        let mut store = Breadcrumbs::new();
        for (id, crumb) in iter {
            store.insert(id, crumb);
        }
        store
    }
}

impl Serialize for Breadcrumbs {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (id, crumb) in &self.entries {
            map.serialize_entry(id, crumb)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Breadcrumbs {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct EntriesVisitor;

        impl<'de> Visitor<'de> for EntriesVisitor {
            type Value = Breadcrumbs;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a map of node id to breadcrumb")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut entries = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((id, crumb)) = access.next_entry::<NodeId, Breadcrumb>()? {
                    entries.push((id, crumb));
                }
                Ok(Breadcrumbs { entries })
            }
        }

        deserializer.deserialize_map(EntriesVisitor)
    }
}
