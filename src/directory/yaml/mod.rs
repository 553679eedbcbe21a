//! YAML directory backend.
//!
//! Loads a declarative YAML document (or stream of documents) into the
//! in-memory [`Directory`]. Loading happens once at startup: the raw text
//! is rendered as a template, parsed into document nodes, translated into
//! an entry tree and frozen.

use std::fs;
use std::path::Path;

use crate::directory::{Directory, EntryBuilder};
use crate::errors::Result;

mod node;
mod parse;
mod tags;
mod template;

pub use node::{Node, NodeKind, NodeTag};

use node::parse_error;

/// Loads a directory from a YAML string.
///
/// Each document root must be a mapping; its keys become children of the
/// synthesized root pseudo-entry.
pub fn load_str(raw: &str) -> Result<Directory> {
    let rendered = template::render(raw)?;
    let docs = node::parse_documents(&rendered)?;

    let mut root = EntryBuilder::root();
    for doc in &docs {
        if doc.is_null() {
            continue;
        }
        let NodeKind::Mapping(pairs) = &doc.kind else {
            return Err(parse_error(
                doc,
                format!(
                    "expected a mapping node (aka. dictionary) as root node, got a {}",
                    doc.kind_name()
                ),
            ));
        };

        for (key, value) in pairs {
            match &value.kind {
                NodeKind::Mapping(_) => parse::parse_entry(&mut root, key, value)?,
                NodeKind::Scalar { .. } | NodeKind::Sequence(_) => {
                    parse::parse_attribute(&mut root, key, value)?
                }
            }
        }
    }

    Ok(Directory::new(root.freeze()))
}

/// Loads a directory from a YAML file.
pub fn load_file(path: impl AsRef<Path>) -> Result<Directory> {
    let raw = fs::read_to_string(path)?;
    load_str(&raw)
}
