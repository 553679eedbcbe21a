//! Boolean filter composition: and, or, not.

use ldap3_proto::proto::LdapFilter;

use crate::directory::Entry;
use crate::filters::{matches, FilterError};

/// Evaluates an `and` filter. An empty set matches nothing; evaluation
/// short-circuits on the first child that does not match, so a definite
/// false wins over errors from later children.
pub(super) fn and(entry: &Entry, children: &[LdapFilter]) -> Result<bool, FilterError> {
    if children.is_empty() {
        return Ok(false);
    }

    for child in children {
        if !matches(entry, child)? {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Evaluates an `or` filter. An empty set matches nothing; evaluation
/// short-circuits on the first matching child, so a definite true wins
/// over errors from later children.
pub(super) fn or(entry: &Entry, children: &[LdapFilter]) -> Result<bool, FilterError> {
    if children.is_empty() {
        return Ok(false);
    }

    for child in children {
        if matches(entry, child)? {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Evaluates a `not` filter, negating its single child and propagating
/// the child error untouched.
pub(super) fn not(entry: &Entry, child: &LdapFilter) -> Result<bool, FilterError> {
    Ok(!matches(entry, child)?)
}
