//! In-memory LDAP directory.
//!
//! The directory is a tree of [`Entry`] values built once at startup by the
//! YAML loader and immutable afterwards, plus a flat DN index for exact
//! lookups. Concurrent readers need no synchronization.

use std::collections::HashMap;
use std::sync::Arc;

pub mod entry;
pub mod yaml;

pub use entry::{AclRule, AclRuleSet, Attributes, Entry, EntryBuilder};

/// Breadth of an LDAP search relative to its base entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchScope {
    /// Only the base entry itself.
    Base,
    /// The base entry and its immediate children.
    OneLevel,
    /// The base entry and every transitive descendant.
    Subtree,
}

/// The loaded directory: the root pseudo-entry plus a flat DN index over
/// every real entry.
#[derive(Debug)]
pub struct Directory {
    root: Arc<Entry>,
    index: HashMap<String, Arc<Entry>>,
}

impl Directory {
    /// Builds a directory from a frozen entry tree, indexing every entry
    /// by its full DN. The empty-DN root is kept out of the index so that
    /// only real entries are addressable by Bind and Search.
    pub fn new(root: Arc<Entry>) -> Self {
        let mut index = HashMap::new();
        index_tree(&root, &mut index);
        index.remove("");

        Self { root, index }
    }

    /// Returns the entry with the exact given DN. The empty DN resolves to
    /// the root pseudo-entry.
    pub fn lookup(&self, dn: &str) -> Option<Arc<Entry>> {
        if dn.is_empty() {
            return Some(self.root.clone());
        }
        self.index.get(dn).cloned()
    }

    /// Returns the root pseudo-entry.
    pub fn root(&self) -> &Arc<Entry> {
        &self.root
    }

    /// Number of indexed (non-root) entries.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// Returns true when the directory holds no entry besides the root.
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }
}

fn index_tree(entry: &Arc<Entry>, index: &mut HashMap<String, Arc<Entry>>) {
    index.insert(entry.dn().to_string(), entry.clone());
    for child in entry.children() {
        index_tree(child, index);
    }
}
