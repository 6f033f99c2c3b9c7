//! Save-time purge rules.

use ahash::AHashMap;

/// Map from field key to what happens to a node carrying that key on save:
/// `true` drops the whole node (and its subtree), `false` strips only the key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PurgeSpec {
    rules: AHashMap<String, bool>,
}

impl PurgeSpec {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every node that carries `key`.
    #[must_use]
    pub fn drop_nodes_with(mut self, key: impl Into<String>) -> Self {
        self.rules.insert(key.into(), true);
        self
    }

    /// Remove `key` from every node, keeping the node.
    #[must_use]
    pub fn strip_key(mut self, key: impl Into<String>) -> Self {
        self.rules.insert(key.into(), false);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, drop_node: bool) {
        self.rules.insert(key.into(), drop_node);
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// `Some(true)` drop node, `Some(false)` strip key, `None` untouched.
    #[must_use]
    pub fn rule(&self, key: &str) -> Option<bool> {
        self.rules.get(key).copied()
    }
}

impl<K: Into<String>> FromIterator<(K, bool)> for PurgeSpec {
    fn from_iter<I: IntoIterator<Item = (K, bool)>>(iter: I) -> Self {
        Self {
            rules: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}
