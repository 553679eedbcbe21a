//! Directory entries, attributes and per-entry ACL rules.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

use ldap3_proto::proto::LdapFilter;

use crate::directory::SearchScope;
use crate::filters::{self, FilterError};

/// A set of LDAP named attributes.
///
/// Attribute names preserve the case they were declared with, but lookups
/// are case-insensitive (attribute descriptors are ASCII per RFC 4512).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Attributes(HashMap<String, Vec<String>>);

impl Attributes {
    /// Creates an empty attribute set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the values of the named attribute, matching the name
    /// case-insensitively.
    pub fn get(&self, name: &str) -> Option<&[String]> {
        self.0
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, values)| values.as_slice())
    }

    /// Returns the stored attribute name that matches `name`
    /// case-insensitively, with its original case.
    pub fn key_fold(&self, name: &str) -> Option<&str> {
        self.0
            .keys()
            .find(|key| key.eq_ignore_ascii_case(name))
            .map(String::as_str)
    }

    /// Appends values to the named attribute, creating it if needed.
    /// The name is stored with its exact case.
    pub fn append<I>(&mut self, name: &str, values: I)
    where
        I: IntoIterator<Item = String>,
    {
        self.0.entry(name.to_string()).or_default().extend(values);
    }

    /// Iterates over `(name, values)` pairs in unspecified order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Vec<String>)> {
        self.0.iter()
    }

    /// Number of distinct attribute names.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if no attribute is present.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<const N: usize> From<[(&str, Vec<&str>); N]> for Attributes {
    fn from(pairs: [(&str, Vec<&str>); N]) -> Self {
        let mut attributes = Attributes::new();
        for (name, values) in pairs {
            attributes.append(name, values.into_iter().map(str::to_owned));
        }
        attributes
    }
}

/// An ACL rule restricting which DNs an authenticated entry may read.
///
/// A rule applies to a target DN when `suffix` is a string suffix of it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AclRule {
    /// DN suffix the rule applies to.
    pub suffix: String,
    /// Whether matching DNs may be read.
    pub allowed: bool,
}

impl AclRule {
    /// Creates a new ACL rule.
    pub fn new(suffix: impl Into<String>, allowed: bool) -> Self {
        Self {
            suffix: suffix.into(),
            allowed,
        }
    }

    fn component_count(&self) -> usize {
        self.suffix.matches(',').count() + 1
    }
}

impl Ord for AclRule {
    /// Orders rules from most to least specific: more RDN components first,
    /// ties broken by lexicographic suffix order, then deny before allow.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .component_count()
            .cmp(&self.component_count())
            .then_with(|| self.suffix.cmp(&other.suffix))
            .then_with(|| self.allowed.cmp(&other.allowed))
    }
}

impl PartialOrd for AclRule {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// An ordered set of ACL rules, kept sorted by specificity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AclRuleSet(Vec<AclRule>);

impl AclRuleSet {
    /// Creates an empty rule set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a rule, re-sorting the set by specificity.
    pub fn push(&mut self, rule: AclRule) {
        self.0.push(rule);
        self.0.sort();
    }

    /// Decides whether `dn` may be read. The first (most specific) rule
    /// whose suffix matches wins; `None` when no rule applies.
    pub fn decide(&self, dn: &str) -> Option<bool> {
        self.0
            .iter()
            .find(|rule| dn.ends_with(&rule.suffix))
            .map(|rule| rule.allowed)
    }

    /// Iterates rules in specificity order.
    pub fn iter(&self) -> impl Iterator<Item = &AclRule> {
        self.0.iter()
    }

    /// Number of rules in the set.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if the set holds no rule.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<AclRule> for AclRuleSet {
    fn from_iter<I: IntoIterator<Item = AclRule>>(iter: I) -> Self {
        let mut set = AclRuleSet::new();
        for rule in iter {
            set.push(rule);
        }
        set
    }
}

/// An immutable directory entry.
///
/// Entries are built once by the YAML loader ([`EntryBuilder`]) and frozen
/// into an `Arc`-shared tree that concurrent request handlers read without
/// locking.
#[derive(Debug)]
pub struct Entry {
    dn: String,
    attributes: Attributes,
    bind_secret: Option<String>,
    acls: AclRuleSet,
    children: HashMap<String, Arc<Entry>>,
}

impl Entry {
    /// Returns the full DN of the entry. The root pseudo-entry has an
    /// empty DN.
    pub fn dn(&self) -> &str {
        &self.dn
    }

    /// Returns the attributes of the entry.
    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    /// Iterates over the direct children of the entry, in unspecified
    /// order.
    pub fn children(&self) -> impl Iterator<Item = &Arc<Entry>> {
        self.children.values()
    }

    /// Returns the child stored under the given local key (e.g.
    /// `uid:alice`).
    pub fn child(&self, key: &str) -> Option<&Arc<Entry>> {
        self.children.get(key)
    }

    /// Checks the given password against the entry credential.
    ///
    /// Entries without a bind secret cannot authenticate. Empty passwords
    /// are always rejected so that anonymous binds never succeed.
    pub fn bind(&self, password: &str) -> bool {
        match &self.bind_secret {
            Some(secret) => !password.is_empty() && secret == password,
            None => false,
        }
    }

    /// Returns true when the entry ACLs allow reading the target DN.
    /// Entries without any rule may read nothing.
    pub fn can_read(&self, dn: &str) -> bool {
        self.acls.decide(dn).unwrap_or(false)
    }

    /// Searches the entry and its descendants for entries matching the
    /// filter, within the requested scope. Matches are appended in
    /// traversal order; any filter evaluation error aborts the search.
    pub fn search(
        self: &Arc<Self>,
        scope: SearchScope,
        filter: &LdapFilter,
    ) -> Result<Vec<Arc<Entry>>, FilterError> {
        let mut matches = Vec::new();
        self.search_into(scope, filter, &mut matches)?;
        Ok(matches)
    }

    fn search_into(
        self: &Arc<Self>,
        scope: SearchScope,
        filter: &LdapFilter,
        matches: &mut Vec<Arc<Entry>>,
    ) -> Result<(), FilterError> {
        if filters::matches(self, filter)? {
            matches.push(self.clone());
        }

        let child_scope = match scope {
            SearchScope::Base => return Ok(()),
            SearchScope::OneLevel => SearchScope::Base,
            SearchScope::Subtree => SearchScope::Subtree,
        };

        for child in self.children.values() {
            child.search_into(child_scope, filter, matches)?;
        }
        Ok(())
    }
}

/// Mutable entry under construction, used by the YAML loader.
///
/// Builders form the same tree shape as [`Entry`] and freeze into the
/// immutable, shared form once the whole directory is parsed.
#[derive(Debug, Default)]
pub struct EntryBuilder {
    dn: String,
    attributes: Attributes,
    bind_secret: Option<String>,
    acls: AclRuleSet,
    children: HashMap<String, EntryBuilder>,
}

impl EntryBuilder {
    /// Creates a builder for the entry with the given DN.
    pub fn new(dn: impl Into<String>) -> Self {
        Self {
            dn: dn.into(),
            ..Self::default()
        }
    }

    /// Creates the root pseudo-entry (empty DN).
    pub fn root() -> Self {
        let mut root = Self::new("");
        root.append_attribute(
            "objectClass",
            ["top".to_string(), "cerberusRootDSE".to_string()],
        );
        root
    }

    /// Returns the DN of the entry under construction.
    pub fn dn(&self) -> &str {
        &self.dn
    }

    /// Returns the attributes collected so far.
    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    /// Appends values to the named attribute.
    pub fn append_attribute<I>(&mut self, name: &str, values: I)
    where
        I: IntoIterator<Item = String>,
    {
        self.attributes.append(name, values);
    }

    /// Returns the stored attribute name matching `name`
    /// case-insensitively, if any.
    pub fn attribute_key_fold(&self, name: &str) -> Option<&str> {
        self.attributes.key_fold(name)
    }

    /// Records the bind secret of the entry. Returns false when a secret
    /// was already recorded.
    pub fn set_bind_secret(&mut self, secret: String) -> bool {
        if self.bind_secret.is_some() {
            return false;
        }
        self.bind_secret = Some(secret);
        true
    }

    /// Appends an ACL rule; the rule set stays sorted by specificity.
    pub fn add_acl_rule(&mut self, rule: AclRule) {
        self.acls.push(rule);
    }

    /// Inserts a child entry under its local key (e.g. `uid:alice`),
    /// replacing any previous child with the same key.
    pub fn insert_child(&mut self, key: impl Into<String>, child: EntryBuilder) {
        self.children.insert(key.into(), child);
    }

    /// Freezes the builder tree into immutable, `Arc`-shared entries.
    pub fn freeze(self) -> Arc<Entry> {
        Arc::new(Entry {
            dn: self.dn,
            attributes: self.attributes,
            bind_secret: self.bind_secret,
            acls: self.acls,
            children: self
                .children
                .into_iter()
                .map(|(key, child)| (key, child.freeze()))
                .collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn leaf(dn: &str, attributes: Attributes) -> EntryBuilder {
        let mut builder = EntryBuilder::new(dn);
        for (name, values) in attributes.iter() {
            // re-append to keep the builder API exercised
            builder.append_attribute(name, values.clone());
        }
        builder
    }

    fn people_tree() -> Arc<Entry> {
        let mut root = EntryBuilder::new("dc=example,dc=com");
        root.append_attribute("dc", ["example".to_string()]);

        let mut users = leaf(
            "ou=users,dc=example,dc=com",
            Attributes::from([("ou", vec!["users"])]),
        );
        users.insert_child(
            "cn:alice",
            leaf(
                "cn=alice,ou=users,dc=example,dc=com",
                Attributes::from([("cn", vec!["Alice"]), ("sn", vec!["Smith"])]),
            ),
        );
        users.insert_child(
            "cn:bob",
            leaf(
                "cn=bob,ou=users,dc=example,dc=com",
                Attributes::from([("cn", vec!["Bob"]), ("sn", vec!["Johnson"])]),
            ),
        );

        let mut groups = leaf(
            "ou=groups,dc=example,dc=com",
            Attributes::from([("ou", vec!["groups"])]),
        );
        groups.insert_child(
            "cn:developers",
            leaf(
                "cn=developers,ou=groups,dc=example,dc=com",
                Attributes::from([("cn", vec!["developers"])]),
            ),
        );

        root.insert_child("ou:users", users);
        root.insert_child("ou:groups", groups);
        root.freeze()
    }

    #[test]
    fn test_attributes_case_insensitive_get() {
        let attributes = Attributes::from([("objectClass", vec!["top", "person"])]);

        assert_eq!(
            attributes.get("objectclass"),
            Some(&["top".to_string(), "person".to_string()][..])
        );
        assert_eq!(attributes.get("OBJECTCLASS"), attributes.get("objectClass"));
        assert_eq!(attributes.get("missing"), None);
    }

    #[test]
    fn test_attributes_key_fold_preserves_case() {
        let attributes = Attributes::from([("givenName", vec!["alice"])]);

        assert_eq!(attributes.key_fold("givenname"), Some("givenName"));
        assert_eq!(attributes.key_fold("surname"), None);
    }

    #[test]
    fn test_attributes_append_extends_values() {
        let mut attributes = Attributes::new();
        attributes.append("memberOf", ["admin".to_string()]);
        attributes.append("memberOf", ["user".to_string()]);

        assert_eq!(
            attributes.get("memberOf"),
            Some(&["admin".to_string(), "user".to_string()][..])
        );
        assert_eq!(attributes.len(), 1);
    }

    #[rstest]
    #[case::more_components_first(
        vec![("dc=org", true), ("ou=people,dc=org", false)],
        vec![("ou=people,dc=org", false), ("dc=org", true)],
    )]
    #[case::lexicographic_on_ties(
        vec![("ou=z,dc=org", true), ("ou=a,dc=org", false)],
        vec![("ou=a,dc=org", false), ("ou=z,dc=org", true)],
    )]
    #[case::deny_before_allow(
        vec![("ou=people,dc=org", true), ("ou=people,dc=org", false)],
        vec![("ou=people,dc=org", false), ("ou=people,dc=org", true)],
    )]
    fn test_acl_rule_set_ordering(
        #[case] rules: Vec<(&str, bool)>,
        #[case] expected: Vec<(&str, bool)>,
    ) {
        let set: AclRuleSet = rules
            .into_iter()
            .map(|(suffix, allowed)| AclRule::new(suffix, allowed))
            .collect();

        let sorted: Vec<(&str, bool)> = set
            .iter()
            .map(|rule| (rule.suffix.as_str(), rule.allowed))
            .collect();
        assert_eq!(sorted, expected);
    }

    #[rstest]
    #[case::most_specific_wins("cn=bob,ou=people,dc=org", Some(false))]
    #[case::fallback_to_subtree("cn=alice,ou=people,dc=org", Some(true))]
    #[case::no_rule_matches("cn=alice,dc=net", None)]
    fn test_acl_rule_set_decide(#[case] dn: &str, #[case] expected: Option<bool>) {
        let set: AclRuleSet = [
            AclRule::new("dc=org", true),
            AclRule::new("cn=bob,ou=people,dc=org", false),
        ]
        .into_iter()
        .collect();

        assert_eq!(set.decide(dn), expected);
    }

    #[test]
    fn test_entry_bind() {
        let mut bindable = EntryBuilder::new("cn=alice,dc=org");
        bindable.set_bind_secret("alice".to_string());
        let bindable = bindable.freeze();

        assert!(bindable.bind("alice"));
        assert!(!bindable.bind("bob"));

        let unbindable = EntryBuilder::new("cn=charlie,dc=org").freeze();
        assert!(!unbindable.bind("anything"));
    }

    #[test]
    fn test_entry_bind_empty_password_always_fails() {
        let mut entry = EntryBuilder::new("cn=alice,dc=org");
        entry.set_bind_secret(String::new());
        let entry = entry.freeze();

        assert!(!entry.bind(""));
    }

    #[test]
    fn test_entry_set_bind_secret_only_once() {
        let mut entry = EntryBuilder::new("cn=alice,dc=org");
        assert!(entry.set_bind_secret("first".to_string()));
        assert!(!entry.set_bind_secret("second".to_string()));

        let entry = entry.freeze();
        assert!(entry.bind("first"));
        assert!(!entry.bind("second"));
    }

    #[test]
    fn test_entry_can_read_defaults_to_deny() {
        let entry = EntryBuilder::new("cn=alice,dc=org").freeze();
        assert!(!entry.can_read("dc=org"));
    }

    #[test]
    fn test_entry_can_read_most_specific_rule_wins() {
        let mut builder = EntryBuilder::new("cn=alice,ou=people,dc=org");
        builder.add_acl_rule(AclRule::new("dc=org", true));
        builder.add_acl_rule(AclRule::new("cn=bob,ou=people,dc=org", false));
        let entry = builder.freeze();

        assert!(entry.can_read("ou=people,dc=org"));
        assert!(entry.can_read("cn=alice,ou=people,dc=org"));
        assert!(!entry.can_read("cn=bob,ou=people,dc=org"));
        assert!(!entry.can_read("dc=net"));
    }

    #[test]
    fn test_search_base_scope_only_matches_base() {
        let root = people_tree();
        let filter = LdapFilter::Present("dc".to_string());

        let matches = root.search(SearchScope::Base, &filter).unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].dn(), "dc=example,dc=com");

        let filter = LdapFilter::Present("cn".to_string());
        let matches = root.search(SearchScope::Base, &filter).unwrap();
        assert!(matches.is_empty());
    }

    #[test]
    fn test_search_one_level_scope_includes_children() {
        let root = people_tree();
        let filter = LdapFilter::Present("ou".to_string());

        let matches = root.search(SearchScope::OneLevel, &filter).unwrap();
        let mut dns: Vec<&str> = matches.iter().map(|entry| entry.dn()).collect();
        dns.sort_unstable();
        assert_eq!(
            dns,
            vec!["ou=groups,dc=example,dc=com", "ou=users,dc=example,dc=com"]
        );

        // grandchildren are out of reach for one-level searches
        let filter = LdapFilter::Present("sn".to_string());
        assert!(root.search(SearchScope::OneLevel, &filter).unwrap().is_empty());
    }

    #[test]
    fn test_search_subtree_scope_reaches_descendants() {
        let root = people_tree();
        let filter = LdapFilter::Present("objectClass".to_string());
        assert!(root.search(SearchScope::Subtree, &filter).unwrap().is_empty());

        let filter = LdapFilter::Present("cn".to_string());
        let matches = root.search(SearchScope::Subtree, &filter).unwrap();
        let mut dns: Vec<&str> = matches.iter().map(|entry| entry.dn()).collect();
        dns.sort_unstable();
        assert_eq!(
            dns,
            vec![
                "cn=alice,ou=users,dc=example,dc=com",
                "cn=bob,ou=users,dc=example,dc=com",
                "cn=developers,ou=groups,dc=example,dc=com",
            ]
        );
    }

    #[test]
    fn test_search_scopes_are_monotonic() {
        let root = people_tree();
        let filter = LdapFilter::Or(vec![
            LdapFilter::Present("dc".to_string()),
            LdapFilter::Present("ou".to_string()),
            LdapFilter::Present("cn".to_string()),
        ]);

        let base = root.search(SearchScope::Base, &filter).unwrap();
        let one_level = root.search(SearchScope::OneLevel, &filter).unwrap();
        let subtree = root.search(SearchScope::Subtree, &filter).unwrap();

        let dns = |entries: &[Arc<Entry>]| -> Vec<String> {
            entries.iter().map(|entry| entry.dn().to_string()).collect()
        };
        for dn in dns(&base) {
            assert!(dns(&one_level).contains(&dn));
        }
        for dn in dns(&one_level) {
            assert!(dns(&subtree).contains(&dn));
        }
    }

    #[test]
    fn test_search_propagates_filter_errors() {
        let root = people_tree();
        let filter = LdapFilter::Equality(String::new(), "value".to_string());

        assert!(root.search(SearchScope::Subtree, &filter).is_err());
    }
}
