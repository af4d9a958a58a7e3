//! Named key indexes built during the first validation pass.
//!
//! The `IndexRegistryBuilder` accepts entries while the document is being
//! indexed; `finish()` turns it into a read-only `IndexRegistry` that
//! index-has-key checks look keys up in. A registry cannot be written to,
//! and a builder cannot be queried, so lookups never observe a partially
//! built index.

use indexmap::IndexMap;
use tracing::debug;

use super::key::CompositeKey;
use crate::document::NodeId;

/// One entry of an index: a key and the node that holds it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexEntry {
    /// Node that produced the key.
    pub node: NodeId,
}

/// Result of inserting a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    /// The key was new.
    Inserted,
    /// The key was already held by `existing`; the index was left unchanged.
    Duplicate {
        /// Node that holds the key.
        existing: NodeId,
    },
}

/// A named map from composite key to the first node that produced it.
#[derive(Debug, Clone, Default)]
pub struct IndexTable {
    name: String,
    entries: IndexMap<CompositeKey, IndexEntry>,
}

impl IndexTable {
    /// Create an empty table.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: IndexMap::new(),
        }
    }

    /// Index name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Insert a key. The first node to produce a key keeps it.
    pub fn insert(&mut self, key: CompositeKey, node: NodeId) -> InsertOutcome {
        match self.entries.get(&key) {
            Some(existing) => InsertOutcome::Duplicate {
                existing: existing.node,
            },
            None => {
                self.entries.insert(key, IndexEntry { node });
                InsertOutcome::Inserted
            }
        }
    }

    /// Look up the node holding `key`.
    pub fn lookup(&self, key: &CompositeKey) -> Option<NodeId> {
        self.entries.get(key).map(|entry| entry.node)
    }

    /// Check if `key` is present.
    pub fn contains_key(&self, key: &CompositeKey) -> bool {
        self.entries.contains_key(key)
    }

    /// Number of keys.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the table has no keys.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&CompositeKey, NodeId)> {
        self.entries.iter().map(|(key, entry)| (key, entry.node))
    }
}

/// Write side of the index registry.
#[derive(Debug, Default)]
pub struct IndexRegistryBuilder {
    tables: IndexMap<String, IndexTable>,
}

impl IndexRegistryBuilder {
    /// Create an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare an index so that it exists even if it receives no entries.
    pub fn declare(&mut self, name: &str) {
        if !self.tables.contains_key(name) {
            self.tables.insert(name.to_string(), IndexTable::new(name));
        }
    }

    /// Insert a key into the named index, declaring it if needed.
    pub fn insert(&mut self, name: &str, key: CompositeKey, node: NodeId) -> InsertOutcome {
        self.tables
            .entry(name.to_string())
            .or_insert_with(|| IndexTable::new(name))
            .insert(key, node)
    }

    /// Freeze the registry.
    pub fn finish(self) -> IndexRegistry {
        for table in self.tables.values() {
            debug!(index = %table.name, keys = table.len(), "Index built");
        }
        IndexRegistry {
            tables: self.tables,
        }
    }
}

/// Read side of the index registry.
#[derive(Debug, Default)]
pub struct IndexRegistry {
    tables: IndexMap<String, IndexTable>,
}

impl IndexRegistry {
    /// Get a table by name.
    pub fn table(&self, name: &str) -> Option<&IndexTable> {
        self.tables.get(name)
    }

    /// Look up a key in the named index.
    ///
    /// Returns `None` when the index is not declared, `Some(None)` when the
    /// key is absent.
    pub fn lookup(&self, name: &str, key: &CompositeKey) -> Option<Option<NodeId>> {
        self.table(name).map(|table| table.lookup(key))
    }

    /// Names of every declared index, in declaration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(String::as_str)
    }

    /// Number of declared indexes.
    pub fn len(&self) -> usize {
        self.tables.len()
    }

    /// Check if no index is declared.
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_write_wins() {
        let mut table = IndexTable::new("controls");
        let key = CompositeKey::new(["ac-1"]);

        assert_eq!(table.insert(key.clone(), NodeId(1)), InsertOutcome::Inserted);
        assert_eq!(
            table.insert(key.clone(), NodeId(5)),
            InsertOutcome::Duplicate {
                existing: NodeId(1)
            }
        );
        assert_eq!(table.lookup(&key), Some(NodeId(1)));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_registry_lookup() {
        let mut builder = IndexRegistryBuilder::new();
        builder.declare("parties");
        builder.insert("controls", CompositeKey::new(["ac-1"]), NodeId(2));
        builder.insert("controls", CompositeKey::new(["ac-2"]), NodeId(4));

        let registry = builder.finish();
        assert_eq!(registry.names().collect::<Vec<_>>(), ["parties", "controls"]);
        assert_eq!(
            registry.lookup("controls", &CompositeKey::new(["ac-2"])),
            Some(Some(NodeId(4)))
        );
        assert_eq!(registry.lookup("controls", &CompositeKey::new(["c4"])), Some(None));
        assert_eq!(registry.lookup("parties", &CompositeKey::new(["x"])), Some(None));
        assert_eq!(registry.lookup("missing", &CompositeKey::new(["x"])), None);
    }

    #[test]
    fn test_entries_keep_insertion_order() {
        let mut table = IndexTable::new("roles");
        for (i, role) in ["admin", "author", "reviewer"].iter().enumerate() {
            table.insert(CompositeKey::new([*role]), NodeId(i as u32));
        }

        let keys: Vec<_> = table.iter().map(|(k, _)| k.to_string()).collect();
        assert_eq!(keys, ["(admin)", "(author)", "(reviewer)"]);
    }
}
