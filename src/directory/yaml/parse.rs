//! Translation of YAML nodes into directory entries.

use std::collections::HashSet;

use crate::directory::yaml::node::{parse_error, Node, NodeKind};
use crate::directory::yaml::tags::{self, TagOutcome};
use crate::directory::EntryBuilder;
use crate::errors::Result;

/// Parses a YAML mapping node into a child entry of `parent`.
///
/// The mapping key must be of the form `<type>:<name>`; it becomes the RDN
/// `type=name` and auto-populates the matching attribute. Sub-mappings
/// declare children, everything else declares attributes. `<<` merge keys
/// splice the referenced mapping in at lower priority: the first
/// occurrence of a key always wins.
pub(super) fn parse_entry(parent: &mut EntryBuilder, key: &Node, value: &Node) -> Result<()> {
    let key_str = key_string(key)?;
    let (rdn_type, rdn_value) = key_str
        .split_once(':')
        .filter(|_| key_str.matches(':').count() == 1)
        .ok_or_else(|| {
            parse_error(
                value,
                format!(
                    "invalid key: '{key_str}' must be in the form '<type>:<name>' (e.g. 'ou:users')"
                ),
            )
        })?;

    let rdn = format!("{rdn_type}={rdn_value}");
    let dn = match parent.dn() {
        "" => rdn,
        parent_dn => format!("{rdn},{parent_dn}"),
    };

    let mut entry = EntryBuilder::new(dn);
    entry.append_attribute(rdn_type, [rdn_value.to_string()]);

    let NodeKind::Mapping(pairs) = &value.kind else {
        return Err(parse_error(
            value,
            format!("expected a mapping node, got a {}", value.kind_name()),
        ));
    };

    let mut work: Vec<(Node, Node)> = pairs.clone();
    let mut seen: HashSet<String> = HashSet::new();
    let mut idx = 0;

    while idx < work.len() {
        let (sub_key, sub_value) = work[idx].clone();
        idx += 1;

        let sub_key_str = key_string(&sub_key)?.to_string();
        if seen.contains(&sub_key_str) {
            continue;
        }

        if is_merge_key(&sub_key) {
            match &sub_value.kind {
                NodeKind::Mapping(merged) => work.extend(merged.iter().cloned()),
                _ => {
                    return Err(parse_error(
                        &sub_key,
                        format!(
                            "only mapping nodes can be merged, got a {}",
                            sub_value.kind_name()
                        ),
                    ))
                }
            }
            continue;
        }

        match &sub_value.kind {
            NodeKind::Mapping(_) => parse_entry(&mut entry, &sub_key, &sub_value)?,
            NodeKind::Scalar { .. } | NodeKind::Sequence(_) => {
                parse_attribute(&mut entry, &sub_key, &sub_value)?
            }
        }
        seen.insert(sub_key_str);
    }

    parent.insert_child(key_str, entry);
    Ok(())
}

/// Parses a YAML scalar or sequence node into an attribute of `entry`.
///
/// Null values are dropped. Tagged nodes go through the custom tag
/// handlers first; a handler may consume the node entirely. Declaring an
/// attribute whose name differs from an existing one only by case is an
/// error.
pub(super) fn parse_attribute(entry: &mut EntryBuilder, key: &Node, value: &Node) -> Result<()> {
    if value.is_null() {
        return Ok(());
    }

    if matches!(value.kind, NodeKind::Mapping(_)) {
        return Err(parse_error(
            value,
            "invalid attribute type: only a scalar node (aka. primitive) or a sequence node (aka. list/array) is allowed",
        ));
    }

    if tags::apply(entry, value)? == TagOutcome::Consumed {
        return Ok(());
    }

    let name = key_string(key)?;
    if let Some(existing) = entry.attribute_key_fold(name) {
        if existing != name {
            return Err(parse_error(
                key,
                format!(
                    "invalid attribute: '{name}' is already defined (case-insensitive match with '{existing}')"
                ),
            ));
        }
    }

    match &value.kind {
        NodeKind::Scalar { value: scalar, .. } => {
            entry.append_attribute(name, [scalar.clone()]);
        }
        NodeKind::Sequence(items) => {
            for item in items {
                parse_attribute(entry, key, item)?;
            }
        }
        // mappings were rejected above
        NodeKind::Mapping(_) => {}
    }
    Ok(())
}

fn key_string(key: &Node) -> Result<&str> {
    key.scalar()
        .ok_or_else(|| parse_error(key, "mapping keys must be scalar nodes"))
}

fn is_merge_key(key: &Node) -> bool {
    if key.scalar() != Some("<<") {
        return false;
    }
    match &key.tag {
        None => true,
        Some(tag) => matches!(tag.shorthand().as_str(), "!" | "!!merge"),
    }
}

#[cfg(test)]
mod tests {
    use crate::directory::yaml::load_str;
    use crate::errors::CerberusError;
    use pretty_assertions::assert_eq;

    fn values(directory: &crate::directory::Directory, dn: &str, attr: &str) -> Vec<String> {
        directory
            .lookup(dn)
            .unwrap_or_else(|| panic!("no entry {dn}"))
            .attributes()
            .get(attr)
            .map(<[String]>::to_vec)
            .unwrap_or_default()
    }

    #[test]
    fn test_entry_key_populates_rdn_attribute() {
        let directory = load_str("uid:alice: {}\n").unwrap();

        assert_eq!(values(&directory, "uid=alice", "uid"), vec!["alice"]);
    }

    #[test]
    fn test_nested_entries_build_dns_from_parents() {
        let directory = load_str(
            "dc:org:\n  ou:people:\n    uid:alice:\n      givenname: alice\n",
        )
        .unwrap();

        assert_eq!(
            values(&directory, "uid=alice,ou=people,dc=org", "givenname"),
            vec!["alice"]
        );
        assert!(directory.lookup("ou=people,dc=org").is_some());
    }

    #[test]
    fn test_scalar_and_sequence_attributes() {
        let directory = load_str(
            "uid:alice:\n  givenname: alice\n  memberOf: [admin, user, h4ck3r]\n",
        )
        .unwrap();

        assert_eq!(values(&directory, "uid=alice", "givenname"), vec!["alice"]);
        assert_eq!(
            values(&directory, "uid=alice", "memberOf"),
            vec!["admin", "user", "h4ck3r"]
        );
    }

    #[test]
    fn test_null_attributes_are_dropped() {
        let directory = load_str("uid:alice:\n  description: null\n  mail: ~\n").unwrap();

        let entry = directory.lookup("uid=alice").unwrap();
        assert!(entry.attributes().get("description").is_none());
        assert!(entry.attributes().get("mail").is_none());
    }

    #[test]
    fn test_invalid_entry_key_is_rejected() {
        let err = load_str("uid:alice:extra: {}\n").unwrap_err();
        assert!(err.to_string().contains("'<type>:<name>'"), "{err}");
    }

    #[test]
    fn test_case_insensitive_duplicate_attribute_is_rejected() {
        let err = load_str("uid:alice:\n  givenName: alice\n  givenname: malice\n").unwrap_err();

        match err {
            CerberusError::Parse { line, reason, .. } => {
                assert_eq!(line, 3);
                assert!(reason.contains("case-insensitive"), "{reason}");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_exact_duplicate_of_rdn_attribute_appends() {
        let directory = load_str("uid:alice:\n  uid: alias\n").unwrap();

        assert_eq!(values(&directory, "uid=alice", "uid"), vec!["alice", "alias"]);
    }

    #[test]
    fn test_rdn_attribute_with_other_case_is_rejected() {
        assert!(load_str("uid:alice:\n  UID: alias\n").is_err());
    }

    #[test]
    fn test_aliased_entries_share_structure() {
        let directory = load_str(
            "ou:people:\n  uid:alice: &alice\n    memberOf: [admin, user]\n    givenname: alice\n  uid:bob: *alice\n",
        )
        .unwrap();

        assert_eq!(
            values(&directory, "uid=bob,ou=people", "memberOf"),
            vec!["admin", "user"]
        );
        // the RDN attribute still reflects each entry's own key
        assert_eq!(values(&directory, "uid=bob,ou=people", "uid"), vec!["bob"]);
        assert_eq!(
            values(&directory, "uid=bob,ou=people", "givenname"),
            vec!["alice"]
        );
    }

    #[test]
    fn test_merge_keys_are_lower_priority_than_direct_keys() {
        let directory = load_str(
            "ou:people:\n  uid:alice: &alice\n    objectclass: [posixAccount]\n    memberOf: [admin]\n    givenname: alice\n  uid:bob:\n    <<: *alice\n    objectclass: [UserMail]\n    givenname: bob\n",
        )
        .unwrap();

        // direct keys win over merged ones, first occurrence kept
        assert_eq!(
            values(&directory, "uid=bob,ou=people", "objectclass"),
            vec!["UserMail"]
        );
        assert_eq!(values(&directory, "uid=bob,ou=people", "givenname"), vec!["bob"]);
        // keys only present in the merged node are spliced in
        assert_eq!(values(&directory, "uid=bob,ou=people", "memberOf"), vec!["admin"]);
    }

    #[test]
    fn test_merge_of_non_mapping_is_rejected() {
        let err = load_str("uid:alice:\n  <<: [a, b]\n").unwrap_err();
        assert!(err.to_string().contains("can be merged"), "{err}");
    }

    #[test]
    fn test_mapping_attribute_value_is_rejected() {
        // `a: {b: c}` inside an entry is neither an entry key (single ':')
        // nor a valid attribute value
        let err = load_str("uid:alice:\n  note:\n    nested: true\n").unwrap_err();
        assert!(err.to_string().contains("'<type>:<name>'"), "{err}");
    }
}
