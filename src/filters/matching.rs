//! Equality and approximate value matches.

use rphonetic::{Encoder, Metaphone};

use crate::directory::Entry;
use crate::filters::{attribute_values, FilterError, FilterKind};

/// Evaluates an `equalityMatch` filter: case-insensitive equality against
/// any value of the attribute.
pub(super) fn equality(entry: &Entry, attr: &str, value: &str) -> Result<bool, FilterError> {
    let Some(values) = attribute_values(entry, attr, FilterKind::EqualityMatch)? else {
        return Ok(false);
    };

    let condition = value.to_lowercase();
    Ok(values.iter().any(|value| value.to_lowercase() == condition))
}

/// Evaluates an `approxMatch` filter. Pairs of integer values (modulo
/// surrounding whitespace) compare numerically; anything else compares by
/// Metaphone phonetic equivalence.
pub(super) fn approx(entry: &Entry, attr: &str, value: &str) -> Result<bool, FilterError> {
    let Some(values) = attribute_values(entry, attr, FilterKind::ApproxMatch)? else {
        return Ok(false);
    };

    let metaphone = Metaphone::default();
    let condition_int: Option<i64> = value.trim().parse().ok();
    let condition_code = phonetic_code(&metaphone, value);

    Ok(values.iter().any(|value| {
        match (condition_int, value.trim().parse::<i64>().ok()) {
            (Some(condition), Some(value)) => value == condition,
            _ => phonetic_code(&metaphone, value) == condition_code,
        }
    }))
}

/// Metaphone code of the leading alphabetic run of the value, so that
/// `alyce` still matches `alice@example.org`.
fn phonetic_code(metaphone: &Metaphone, value: &str) -> String {
    let word: String = value
        .trim()
        .chars()
        .take_while(char::is_ascii_alphabetic)
        .collect();
    metaphone.encode(&word)
}
