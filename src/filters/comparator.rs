//! Ordering filters: greaterOrEqual and lessOrEqual.
//!
//! When both the assertion value and an attribute value parse as integers
//! the comparison is numeric; otherwise the values compare as strings by
//! code-point order.

use std::cmp::Ordering;

use crate::directory::Entry;
use crate::filters::{attribute_values, FilterError, FilterKind};

/// Evaluates a `greaterOrEqual` filter against one entry.
pub(super) fn greater_or_equal(
    entry: &Entry,
    attr: &str,
    value: &str,
) -> Result<bool, FilterError> {
    compare(entry, attr, value, FilterKind::GreaterOrEqual, Ordering::is_ge)
}

/// Evaluates a `lessOrEqual` filter against one entry.
pub(super) fn less_or_equal(entry: &Entry, attr: &str, value: &str) -> Result<bool, FilterError> {
    compare(entry, attr, value, FilterKind::LessOrEqual, Ordering::is_le)
}

fn compare(
    entry: &Entry,
    attr: &str,
    condition: &str,
    kind: FilterKind,
    accepts: fn(Ordering) -> bool,
) -> Result<bool, FilterError> {
    let Some(values) = attribute_values(entry, attr, kind)? else {
        return Ok(false);
    };

    Ok(values
        .iter()
        .any(|value| accepts(order(value, condition))))
}

fn order(value: &str, condition: &str) -> Ordering {
    match (value.parse::<i64>(), condition.parse::<i64>()) {
        (Ok(value), Ok(condition)) => value.cmp(&condition),
        _ => value.cmp(condition),
    }
}
