//! LDAP search filter evaluation.
//!
//! Filters arrive from the wire codec as a decoded [`LdapFilter`] tree;
//! this module interprets one against a single directory entry. Each
//! filter family lives in its own submodule:
//! - [`boolean`]: and / or / not composition
//! - [`matching`]: equality and approximate (phonetic) matches
//! - [`substring`]: anchored and unanchored substring matches
//! - [`comparator`]: greaterOrEqual / lessOrEqual ordering matches
//! - [`present`]: attribute presence
//!
//! Attribute names always compare case-insensitively.

use std::fmt;

use ldap3_proto::proto::LdapFilter;
use thiserror::Error;

use crate::directory::Entry;

mod boolean;
mod comparator;
mod matching;
mod present;
mod substring;

/// The filter family an error originated from, with its RFC 4511 BER
/// context tag (kept for diagnostics only).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterKind {
    And,
    Or,
    Not,
    EqualityMatch,
    Substrings,
    GreaterOrEqual,
    LessOrEqual,
    Present,
    ApproxMatch,
    ExtensibleMatch,
}

impl FilterKind {
    /// BER context tag of the filter choice in a SearchRequest.
    pub const fn tag(self) -> u8 {
        match self {
            FilterKind::And => 0,
            FilterKind::Or => 1,
            FilterKind::Not => 2,
            FilterKind::EqualityMatch => 3,
            FilterKind::Substrings => 4,
            FilterKind::GreaterOrEqual => 5,
            FilterKind::LessOrEqual => 6,
            FilterKind::Present => 7,
            FilterKind::ApproxMatch => 8,
            FilterKind::ExtensibleMatch => 9,
        }
    }
}

impl fmt::Display for FilterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FilterKind::And => "and",
            FilterKind::Or => "or",
            FilterKind::Not => "not",
            FilterKind::EqualityMatch => "equalityMatch",
            FilterKind::Substrings => "substrings",
            FilterKind::GreaterOrEqual => "greaterOrEqual",
            FilterKind::LessOrEqual => "lessOrEqual",
            FilterKind::Present => "present",
            FilterKind::ApproxMatch => "approxMatch",
            FilterKind::ExtensibleMatch => "extensibleMatch",
        };
        write!(f, "{name}")
    }
}

/// A failure to evaluate a search filter.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FilterError {
    /// Structurally invalid filter (e.g. empty attribute description).
    #[error("invalid `{kind}` filter: {reason}")]
    Malformed {
        /// The filter family that failed.
        kind: FilterKind,
        /// What is wrong with it.
        reason: String,
    },

    /// Filter family the server does not implement.
    #[error("`{kind}` filter not implemented")]
    NotImplemented {
        /// The unimplemented filter family.
        kind: FilterKind,
    },
}

impl FilterError {
    pub(crate) fn malformed(kind: FilterKind, reason: impl Into<String>) -> Self {
        FilterError::Malformed {
            kind,
            reason: reason.into(),
        }
    }
}

/// Evaluates a filter against one entry.
pub fn matches(entry: &Entry, filter: &LdapFilter) -> Result<bool, FilterError> {
    match filter {
        LdapFilter::And(children) => boolean::and(entry, children),
        LdapFilter::Or(children) => boolean::or(entry, children),
        LdapFilter::Not(child) => boolean::not(entry, child),
        LdapFilter::Equality(attr, value) => matching::equality(entry, attr, value),
        LdapFilter::Substring(attr, parts) => substring::matches(entry, attr, parts),
        LdapFilter::GreaterOrEqual(attr, value) => comparator::greater_or_equal(entry, attr, value),
        LdapFilter::LessOrEqual(attr, value) => comparator::less_or_equal(entry, attr, value),
        LdapFilter::Present(attr) => present::matches(entry, attr),
        LdapFilter::Approx(attr, value) => matching::approx(entry, attr, value),
        LdapFilter::Extensible(_) => Err(FilterError::NotImplemented {
            kind: FilterKind::ExtensibleMatch,
        }),
    }
}

/// Looks up attribute values by case-insensitive name; `Ok(None)` when the
/// attribute is absent, `Err` when the attribute description is empty.
fn attribute_values<'a>(
    entry: &'a Entry,
    attr: &str,
    kind: FilterKind,
) -> Result<Option<&'a [String]>, FilterError> {
    if attr.is_empty() {
        return Err(FilterError::malformed(
            kind,
            "attribute description must be a non-empty string",
        ));
    }
    Ok(entry.attributes().get(attr))
}


#[cfg(test)]
mod tests {
    use super::testutil::entry;
    use super::*;
    use crate::directory::Attributes;
    use ldap3_proto::proto::{LdapMatchingRuleAssertion, LdapSubstringFilter};
    use pretty_assertions::assert_eq;

    fn alice() -> std::sync::Arc<Entry> {
        entry(
            "cn=alice,dc=org",
            Attributes::from([
                ("cn", vec!["alice"]),
                ("mail", vec!["alice@example.org"]),
                ("uidNumber", vec!["1000"]),
            ]),
        )
    }

    #[test]
    fn test_extensible_match_is_not_implemented() {
        let filter = LdapFilter::Extensible(LdapMatchingRuleAssertion {
            matching_rule: None,
            type_: Some("cn".to_string()),
            match_value: "alice".to_string(),
            dn_attributes: false,
        });

        assert_eq!(
            matches(&alice(), &filter),
            Err(FilterError::NotImplemented {
                kind: FilterKind::ExtensibleMatch
            })
        );
    }

    #[test]
    fn test_de_morgan_equivalence() {
        let alice = alice();
        let a = LdapFilter::Equality("cn".to_string(), "alice".to_string());
        let b = LdapFilter::Equality("uidNumber".to_string(), "1000".to_string());

        for (a, b) in [(a.clone(), b.clone()), (a.clone(), a.clone()), (b.clone(), a)] {
            let not_and = LdapFilter::Not(Box::new(LdapFilter::And(vec![a.clone(), b.clone()])));
            let or_nots = LdapFilter::Or(vec![
                LdapFilter::Not(Box::new(a)),
                LdapFilter::Not(Box::new(b)),
            ]);

            assert_eq!(
                matches(&alice, &not_and).unwrap(),
                matches(&alice, &or_nots).unwrap()
            );
        }
    }

    #[test]
    fn test_substrings_round_trip_any_split() {
        let alice = alice();
        let value = "alice@example.org";

        for i in 0..value.len() {
            for j in i..value.len() {
                let filter = LdapFilter::Substring(
                    "mail".to_string(),
                    LdapSubstringFilter {
                        initial: Some(value[..i].to_string()),
                        any: vec![value[i..j].to_string()],
                        final_: Some(value[j..].to_string()),
                    },
                );
                assert!(matches(&alice, &filter).unwrap(), "split at {i}/{j}");
            }
        }
    }

    #[test]
    fn test_filter_kind_tags_follow_rfc4511() {
        assert_eq!(FilterKind::And.tag(), 0);
        assert_eq!(FilterKind::Present.tag(), 7);
        assert_eq!(FilterKind::ExtensibleMatch.tag(), 9);
    }

    #[test]
    fn test_filter_error_display_names_the_kind() {
        let err = FilterError::malformed(FilterKind::Substrings, "boom");
        assert_eq!(err.to_string(), "invalid `substrings` filter: boom");

        let err = FilterError::NotImplemented {
            kind: FilterKind::ExtensibleMatch,
        };
        assert_eq!(err.to_string(), "`extensibleMatch` filter not implemented");
    }
}
