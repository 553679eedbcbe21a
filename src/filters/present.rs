//! Attribute presence filter.

use crate::directory::Entry;
use crate::filters::{attribute_values, FilterError, FilterKind};

/// Evaluates a `present` filter: true when the entry carries the attribute
/// with at least one value. An attribute that exists with an empty value
/// list does not count as present.
pub(super) fn matches(entry: &Entry, attr: &str) -> Result<bool, FilterError> {
    let values = attribute_values(entry, attr, FilterKind::Present)?;
    Ok(values.is_some_and(|values| !values.is_empty()))
}
