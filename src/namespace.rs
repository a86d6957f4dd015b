//! Process-wide namespace information.
//!
//! The namespace record is pushed by whatever component talks to the
//! conscience and read by handlers. Readers never block: the record is
//! held behind an [`ArcSwapOption`] and replaced wholesale on update.

use std::collections::BTreeMap;
use std::sync::Arc;

use arc_swap::ArcSwapOption;
use serde::{Deserialize, Serialize};

/// Namespace description served to clients.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamespaceInfo {
    /// Namespace name.
    pub name: String,
    /// Default chunk size in bytes.
    #[serde(default)]
    pub chunk_size: i64,
    /// Free-form namespace options.
    #[serde(default)]
    pub options: BTreeMap<String, String>,
    /// Storage policies by name.
    #[serde(default)]
    pub storage_policies: BTreeMap<String, String>,
    /// Data security rules by name.
    #[serde(default)]
    pub data_security: BTreeMap<String, String>,
}

impl NamespaceInfo {
    /// Create a namespace record with only a name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

/// Holder of the current namespace record.
#[derive(Debug, Default)]
pub struct NamespaceStore {
    current: ArcSwapOption<NamespaceInfo>,
}

impl NamespaceStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the namespace record.
    pub fn set(&self, info: NamespaceInfo) {
        self.current.store(Some(Arc::new(info)));
    }

    /// Forget the namespace record.
    pub fn unset(&self) {
        self.current.store(None);
    }

    /// Namespace name, `None` when unset or unnamed.
    pub fn ns_name(&self) -> Option<String> {
        self.current
            .load()
            .as_ref()
            .filter(|info| !info.name.is_empty())
            .map(|info| info.name.clone())
    }

    /// Independent copy of the namespace record, `None` when unset.
    pub fn namespace_info(&self) -> Option<NamespaceInfo> {
        self.current.load_full().map(|info| (*info).clone())
    }
}
