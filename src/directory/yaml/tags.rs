//! Custom YAML tags for directory entries.
//!
//! Two tag families enrich attribute nodes:
//! - `!!ldap/bind:password` records the entry credential; the scalar still
//!   flows into the attribute list.
//! - `!!ldap/acl:allow-on` / `!!ldap/acl:deny-on` append ACL rules and
//!   consume the node entirely.

use crate::directory::yaml::node::{parse_error, Node, NodeKind};
use crate::directory::{AclRule, EntryBuilder};
use crate::errors::Result;

const TAG_BIND_PASSWORD: &str = "!!ldap/bind:password";
const TAG_ACL_ALLOW: &str = "!!ldap/acl:allow-on";
const TAG_ACL_DENY: &str = "!!ldap/acl:deny-on";

/// Whether a tag handler consumed the node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum TagOutcome {
    /// No tag handled the node; regular attribute parsing continues.
    NotHandled,
    /// The node was consumed and contributes no attribute values.
    Consumed,
}

/// Applies custom tag semantics to an attribute node.
pub(super) fn apply(entry: &mut EntryBuilder, node: &Node) -> Result<TagOutcome> {
    let Some(tag) = &node.tag else {
        return Ok(TagOutcome::NotHandled);
    };

    match tag.shorthand().as_str() {
        TAG_BIND_PASSWORD => {
            let Some(secret) = node.scalar() else {
                return Err(parse_error(
                    node,
                    format!(
                        "invalid '{TAG_BIND_PASSWORD}' type: only a scalar node (aka. primitive) is allowed"
                    ),
                ));
            };
            if !entry.set_bind_secret(secret.to_string()) {
                return Err(parse_error(
                    node,
                    format!(
                        "invalid '{TAG_BIND_PASSWORD}' tag: only one {TAG_BIND_PASSWORD} per entry is allowed"
                    ),
                ));
            }
            // the password is still exposed as a regular attribute value
            Ok(TagOutcome::NotHandled)
        }

        shorthand @ (TAG_ACL_ALLOW | TAG_ACL_DENY) => {
            let allowed = shorthand == TAG_ACL_ALLOW;
            match &node.kind {
                NodeKind::Scalar { value, .. } => {
                    entry.add_acl_rule(AclRule::new(value.clone(), allowed));
                }
                NodeKind::Sequence(items) => {
                    for item in items {
                        let Some(suffix) = item.scalar() else {
                            return Err(parse_error(
                                item,
                                format!(
                                    "invalid '{shorthand}' type: only a scalar node (aka. primitive) is allowed"
                                ),
                            ));
                        };
                        entry.add_acl_rule(AclRule::new(suffix.to_string(), allowed));
                    }
                }
                NodeKind::Mapping(_) => {
                    return Err(parse_error(
                        node,
                        format!(
                            "invalid '{shorthand}' type: only a scalar node (aka. primitive) is allowed"
                        ),
                    ));
                }
            }
            Ok(TagOutcome::Consumed)
        }

        _ => Ok(TagOutcome::NotHandled),
    }
}
