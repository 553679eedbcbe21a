//! Substring filters: initial / any / final parts.

use ldap3_proto::proto::LdapSubstringFilter;

use crate::directory::Entry;
use crate::filters::{attribute_values, FilterError, FilterKind};

/// Evaluates a `substrings` filter against one entry. The initial part
/// anchors at the start of the value, the final part at its end, and every
/// `any` part must appear in order in between. Matching is
/// case-insensitive.
pub(super) fn matches(
    entry: &Entry,
    attr: &str,
    parts: &LdapSubstringFilter,
) -> Result<bool, FilterError> {
    let Some(values) = attribute_values(entry, attr, FilterKind::Substrings)? else {
        return Ok(false);
    };

    Ok(values.iter().any(|value| matches_value(value, parts)))
}

fn matches_value(value: &str, parts: &LdapSubstringFilter) -> bool {
    let value = value.to_lowercase();
    let mut start = 0;
    let mut end = value.len();

    if let Some(initial) = &parts.initial {
        let initial = initial.to_lowercase();
        if !value.starts_with(&initial) {
            return false;
        }
        start = initial.len();
    }

    if let Some(final_) = &parts.final_ {
        let final_ = final_.to_lowercase();
        if !value.ends_with(&final_) || value.len() - final_.len() < start {
            return false;
        }
        end = value.len() - final_.len();
    }

    for any in &parts.any {
        let any = any.to_lowercase();
        match value[start..end].find(&any) {
            Some(offset) => start += offset + any.len(),
            None => return false,
        }
    }
    true
}
