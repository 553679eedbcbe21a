//! YAML document node tree.
//!
//! The loader needs node-level access to tags, anchors and source
//! positions, so documents are materialized from the `yaml-rust2` marked
//! event stream instead of going through serde. Aliases are resolved while
//! building: an alias reference becomes a copy of the anchored node.

use std::collections::HashMap;

use yaml_rust2::parser::{Event, MarkedEventReceiver, Parser, Tag};
use yaml_rust2::scanner::{Marker, TScalarStyle};

use crate::errors::{CerberusError, Result};

/// A single YAML node with its tag and source position.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    /// The node payload.
    pub kind: NodeKind,
    /// Explicit tag, if any.
    pub tag: Option<NodeTag>,
    /// Source line (1-based).
    pub line: usize,
    /// Source column (1-based).
    pub col: usize,
}

/// The payload of a YAML node.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    /// A scalar value; `plain` is false for quoted and block scalars.
    Scalar { value: String, plain: bool },
    /// A sequence of nodes.
    Sequence(Vec<Node>),
    /// A mapping, as an ordered list of key/value pairs.
    Mapping(Vec<(Node, Node)>),
}

/// An explicit YAML tag, split into its resolved handle and suffix.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeTag {
    /// Tag handle (e.g. `!`, `!!` or a resolved tag URI prefix).
    pub handle: String,
    /// Tag suffix (e.g. `ldap/acl:allow-on`).
    pub suffix: String,
}

const CORE_SCHEMA_PREFIX: &str = "tag:yaml.org,2002:";

impl NodeTag {
    /// Renders the tag in shorthand form: `!!suffix` for core-schema
    /// handles, `!suffix` for local tags.
    pub fn shorthand(&self) -> String {
        match self.handle.as_str() {
            "!!" | CORE_SCHEMA_PREFIX => format!("!!{}", self.suffix),
            "!" => format!("!{}", self.suffix),
            handle => format!("{handle}{}", self.suffix),
        }
    }
}

impl Node {
    /// Returns the scalar value of the node, if it is a scalar.
    pub fn scalar(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::Scalar { value, .. } => Some(value),
            _ => None,
        }
    }

    /// Returns true for explicit `!!null` nodes and for plain scalars the
    /// YAML core schema resolves to null.
    pub fn is_null(&self) -> bool {
        if let Some(tag) = &self.tag {
            return tag.shorthand() == "!!null";
        }
        match &self.kind {
            NodeKind::Scalar { value, plain: true } => {
                matches!(value.as_str(), "" | "~" | "null" | "Null" | "NULL")
            }
            _ => false,
        }
    }

    /// Human-readable node kind for error messages.
    pub fn kind_name(&self) -> &'static str {
        match &self.kind {
            NodeKind::Scalar { .. } => "scalar node (aka. primitive)",
            NodeKind::Sequence(_) => "sequence node (aka. list/array)",
            NodeKind::Mapping(_) => "mapping node (aka. dictionary)",
        }
    }
}

/// Builds a parse error pointing at the given node.
pub(super) fn parse_error(node: &Node, reason: impl Into<String>) -> CerberusError {
    CerberusError::Parse {
        line: node.line,
        col: node.col,
        reason: reason.into(),
    }
}

/// Parses a (possibly multi-document) YAML stream into document root
/// nodes.
pub(super) fn parse_documents(raw: &str) -> Result<Vec<Node>> {
    let mut parser = Parser::new_from_str(raw);
    let mut builder = DocumentBuilder::default();

    parser
        .load(&mut builder, true)
        .map_err(|err| CerberusError::Parse {
            line: err.marker().line(),
            col: err.marker().col() + 1,
            reason: err.to_string(),
        })?;

    if let Some(err) = builder.error {
        return Err(err);
    }
    Ok(builder.docs)
}

enum Container {
    Sequence {
        items: Vec<Node>,
        tag: Option<NodeTag>,
        anchor: usize,
        line: usize,
        col: usize,
    },
    Mapping {
        pairs: Vec<(Node, Node)>,
        pending_key: Option<Node>,
        tag: Option<NodeTag>,
        anchor: usize,
        line: usize,
        col: usize,
    },
}

#[derive(Default)]
struct DocumentBuilder {
    docs: Vec<Node>,
    stack: Vec<Container>,
    anchors: HashMap<usize, Node>,
    error: Option<CerberusError>,
}

impl DocumentBuilder {
    /// Attaches a completed node to the enclosing container, or records it
    /// as a document root. Anchored nodes are remembered for later alias
    /// references.
    fn push_node(&mut self, node: Node, anchor: usize) {
        if anchor != 0 {
            self.anchors.insert(anchor, node.clone());
        }
        match self.stack.last_mut() {
            Some(Container::Sequence { items, .. }) => items.push(node),
            Some(Container::Mapping {
                pairs, pending_key, ..
            }) => match pending_key.take() {
                None => *pending_key = Some(node),
                Some(key) => pairs.push((key, node)),
            },
            None => self.docs.push(node),
        }
    }
}

fn convert_tag(tag: Tag) -> NodeTag {
    NodeTag {
        handle: tag.handle,
        suffix: tag.suffix,
    }
}

impl MarkedEventReceiver for DocumentBuilder {
    fn on_event(&mut self, ev: Event, mark: Marker) {
        if self.error.is_some() {
            return;
        }

        match ev {
            Event::Scalar(value, style, anchor, tag) => {
                let node = Node {
                    kind: NodeKind::Scalar {
                        value,
                        plain: style == TScalarStyle::Plain,
                    },
                    tag: tag.map(convert_tag),
                    line: mark.line(),
                    col: mark.col() + 1,
                };
                self.push_node(node, anchor);
            }
            Event::SequenceStart(anchor, tag) => {
                self.stack.push(Container::Sequence {
                    items: Vec::new(),
                    tag: tag.map(convert_tag),
                    anchor,
                    line: mark.line(),
                    col: mark.col() + 1,
                });
            }
            Event::SequenceEnd => {
                if let Some(Container::Sequence {
                    items,
                    tag,
                    anchor,
                    line,
                    col,
                }) = self.stack.pop()
                {
                    let node = Node {
                        kind: NodeKind::Sequence(items),
                        tag,
                        line,
                        col,
                    };
                    self.push_node(node, anchor);
                }
            }
            Event::MappingStart(anchor, tag) => {
                self.stack.push(Container::Mapping {
                    pairs: Vec::new(),
                    pending_key: None,
                    tag: tag.map(convert_tag),
                    anchor,
                    line: mark.line(),
                    col: mark.col() + 1,
                });
            }
            Event::MappingEnd => {
                if let Some(Container::Mapping {
                    pairs,
                    tag,
                    anchor,
                    line,
                    col,
                    ..
                }) = self.stack.pop()
                {
                    let node = Node {
                        kind: NodeKind::Mapping(pairs),
                        tag,
                        line,
                        col,
                    };
                    self.push_node(node, anchor);
                }
            }
            Event::Alias(id) => match self.anchors.get(&id).cloned() {
                Some(node) => self.push_node(node, 0),
                None => {
                    self.error = Some(CerberusError::Parse {
                        line: mark.line(),
                        col: mark.col() + 1,
                        reason: "alias references an unknown anchor".to_string(),
                    });
                }
            },
            // stream and document delimiters carry no content
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn single(raw: &str) -> Node {
        let docs = parse_documents(raw).unwrap();
        assert_eq!(docs.len(), 1);
        docs.into_iter().next().unwrap()
    }

    #[test]
    fn test_scalar_and_sequence_values() {
        let doc = single("name: alice\nroles: [admin, user]\n");

        let NodeKind::Mapping(pairs) = &doc.kind else {
            panic!("expected a mapping root");
        };
        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[0].0.scalar(), Some("name"));
        assert_eq!(pairs[0].1.scalar(), Some("alice"));

        let NodeKind::Sequence(items) = &pairs[1].1.kind else {
            panic!("expected a sequence value");
        };
        let values: Vec<_> = items.iter().filter_map(Node::scalar).collect();
        assert_eq!(values, vec!["admin", "user"]);
    }

    #[test]
    fn test_nodes_carry_positions() {
        let doc = single("first: 1\nsecond: 2\n");

        let NodeKind::Mapping(pairs) = &doc.kind else {
            panic!("expected a mapping root");
        };
        assert_eq!((pairs[0].0.line, pairs[0].0.col), (1, 1));
        assert_eq!((pairs[1].0.line, pairs[1].0.col), (2, 1));
    }

    #[test]
    fn test_custom_tags_are_preserved() {
        let doc = single("password: !!ldap/bind:password secret\n");

        let NodeKind::Mapping(pairs) = &doc.kind else {
            panic!("expected a mapping root");
        };
        let value = &pairs[0].1;
        assert_eq!(value.scalar(), Some("secret"));
        assert_eq!(
            value.tag.as_ref().map(NodeTag::shorthand),
            Some("!!ldap/bind:password".to_string())
        );
    }

    #[test]
    fn test_aliases_resolve_to_the_anchored_node() {
        let doc = single("base: &ref {a: 1}\nother: *ref\n");

        let NodeKind::Mapping(pairs) = &doc.kind else {
            panic!("expected a mapping root");
        };
        assert_eq!(pairs[0].1.kind, pairs[1].1.kind);
    }

    #[test]
    fn test_unknown_alias_is_an_error() {
        assert!(parse_documents("other: *missing\n").is_err());
    }

    #[test]
    fn test_multiple_documents() {
        let docs = parse_documents("a: 1\n---\nb: 2\n").unwrap();
        assert_eq!(docs.len(), 2);
    }

    #[test]
    fn test_null_detection() {
        let doc = single("explicit: !!null x\nplain: null\ntilde: ~\nempty:\nquoted: 'null'\n");

        let NodeKind::Mapping(pairs) = &doc.kind else {
            panic!("expected a mapping root");
        };
        let by_key = |name: &str| {
            pairs
                .iter()
                .find(|(key, _)| key.scalar() == Some(name))
                .map(|(_, value)| value)
                .unwrap()
        };

        assert!(by_key("explicit").is_null());
        assert!(by_key("plain").is_null());
        assert!(by_key("tilde").is_null());
        assert!(by_key("empty").is_null());
        assert!(!by_key("quoted").is_null());
    }

    #[test]
    fn test_scan_errors_carry_positions() {
        let err = parse_documents("key: [unclosed\n").unwrap_err();
        match err {
            CerberusError::Parse { line, .. } => assert!(line >= 1),
            other => panic!("unexpected error: {other}"),
        }
    }
}
