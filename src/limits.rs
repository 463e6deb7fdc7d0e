//! Presence and range checks: required, optional, forbidden, numeric
//! bounds, string length and list size.

use std::fmt::Display;

use serde::Serialize;

use crate::each::KeyedMap;
use crate::field::{Error, ErrorList, Path};
use crate::operation::Operation;
use crate::reflect::{Reflect, to_json};

// ── Presence ────────────────────────────────────────────────────────

fn required(path: &Path, missing: bool) -> ErrorList {
    if missing {
        return vec![Error::required(path, "")];
    }
    Vec::new()
}

fn forbidden(path: &Path, present: bool) -> ErrorList {
    if present {
        return vec![Error::forbidden(path, "")];
    }
    Vec::new()
}

const NOT_SPECIFIED: &str = "optional value was not specified";

fn optional(path: &Path, missing: bool) -> ErrorList {
    if missing {
        return vec![Error::required(path, NOT_SPECIFIED)];
    }
    Vec::new()
}

fn value_missing<T: PartialEq + Default>(value: Option<&T>) -> bool {
    value.is_none_or(|v| *v == T::default())
}

fn pointer_missing<T>(value: Option<&Option<T>>) -> bool {
    value.is_none_or(Option::is_none)
}

fn slice_missing<T>(value: Option<&Vec<T>>) -> bool {
    value.is_none_or(Vec::is_empty)
}

fn map_missing<K, V, M: KeyedMap<K, V>>(value: Option<&M>) -> bool {
    value.is_none_or(|m| m.is_empty())
}

/// The value must be non-zero.
pub fn required_value<T: PartialEq + Default>(
    _op: &Operation,
    path: &Path,
    value: Option<&T>,
    _old: Option<&T>,
) -> ErrorList {
    required(path, value_missing(value))
}

/// The optional must be `Some`, even if it holds a zero value.
pub fn required_pointer<T>(
    _op: &Operation,
    path: &Path,
    value: Option<&Option<T>>,
    _old: Option<&Option<T>>,
) -> ErrorList {
    required(path, pointer_missing(value))
}

/// The list must be non-empty.
pub fn required_slice<T>(
    _op: &Operation,
    path: &Path,
    value: Option<&Vec<T>>,
    _old: Option<&Vec<T>>,
) -> ErrorList {
    required(path, slice_missing(value))
}

/// The map must be non-empty.
pub fn required_map<K, V, M>(
    _op: &Operation,
    path: &Path,
    value: Option<&M>,
    _old: Option<&M>,
) -> ErrorList
where
    M: KeyedMap<K, V>,
{
    required(path, map_missing(value))
}

pub fn forbidden_value<T: PartialEq + Default>(
    _op: &Operation,
    path: &Path,
    value: Option<&T>,
    _old: Option<&T>,
) -> ErrorList {
    forbidden(path, !value_missing(value))
}

pub fn forbidden_pointer<T>(
    _op: &Operation,
    path: &Path,
    value: Option<&Option<T>>,
    _old: Option<&Option<T>>,
) -> ErrorList {
    forbidden(path, !pointer_missing(value))
}

pub fn forbidden_slice<T>(
    _op: &Operation,
    path: &Path,
    value: Option<&Vec<T>>,
    _old: Option<&Vec<T>>,
) -> ErrorList {
    forbidden(path, !slice_missing(value))
}

pub fn forbidden_map<K, V, M>(
    _op: &Operation,
    path: &Path,
    value: Option<&M>,
    _old: Option<&M>,
) -> ErrorList
where
    M: KeyedMap<K, V>,
{
    forbidden(path, !map_missing(value))
}

/// The optional counterparts report a missing value so that a chain can
/// stop early. Their errors are meant to be used as a gate, not returned.
pub fn optional_value<T: PartialEq + Default>(
    _op: &Operation,
    path: &Path,
    value: Option<&T>,
    _old: Option<&T>,
) -> ErrorList {
    optional(path, value_missing(value))
}

pub fn optional_pointer<T>(
    _op: &Operation,
    path: &Path,
    value: Option<&Option<T>>,
    _old: Option<&Option<T>>,
) -> ErrorList {
    optional(path, pointer_missing(value))
}

pub fn optional_slice<T>(
    _op: &Operation,
    path: &Path,
    value: Option<&Vec<T>>,
    _old: Option<&Vec<T>>,
) -> ErrorList {
    optional(path, slice_missing(value))
}

pub fn optional_map<K, V, M>(
    _op: &Operation,
    path: &Path,
    value: Option<&M>,
    _old: Option<&M>,
) -> ErrorList
where
    M: KeyedMap<K, V>,
{
    optional(path, map_missing(value))
}

// ── Bounds ──────────────────────────────────────────────────────────

/// The value must be at least `min`. Absent values pass.
pub fn minimum<T>(
    _op: &Operation,
    path: &Path,
    value: Option<&T>,
    _old: Option<&T>,
    min: T,
) -> ErrorList
where
    T: PartialOrd + Display + Serialize,
{
    match value {
        Some(v) if *v < min => {
            vec![
                Error::invalid(path, v, format!("must be greater than or equal to {min}"))
                    .with_origin("minimum"),
            ]
        }
        _ => Vec::new(),
    }
}

/// The value must be at most `max`. Absent values pass.
pub fn maximum<T>(
    _op: &Operation,
    path: &Path,
    value: Option<&T>,
    _old: Option<&T>,
    max: T,
) -> ErrorList
where
    T: PartialOrd + Display + Serialize,
{
    match value {
        Some(v) if *v > max => {
            vec![
                Error::invalid(path, v, format!("must be less than or equal to {max}"))
                    .with_origin("maximum"),
            ]
        }
        _ => Vec::new(),
    }
}

/// The string may hold at most `max` bytes.
pub fn max_length<S: AsRef<str>>(
    _op: &Operation,
    path: &Path,
    value: Option<&S>,
    _old: Option<&S>,
    max: usize,
) -> ErrorList {
    match value.map(AsRef::as_ref) {
        Some(s) if s.len() > max => vec![Error::too_long(path, s, max).with_origin("maxLength")],
        _ => Vec::new(),
    }
}

/// The list may hold at most `max` items. Meant to short-circuit the
/// per-item checks of an oversized list.
pub fn max_items<T>(
    _op: &Operation,
    path: &Path,
    value: Option<&Vec<T>>,
    _old: Option<&Vec<T>>,
    max: usize,
) -> ErrorList {
    match value {
        Some(list) if list.len() > max => {
            vec![Error::too_many(path, list.len(), max).with_origin("maxItems")]
        }
        _ => Vec::new(),
    }
}

/// Always pass, or always fail with `detail`.
pub fn fixed_result<T: Reflect>(
    _op: &Operation,
    path: &Path,
    value: Option<&T>,
    _old: Option<&T>,
    pass: bool,
    detail: &str,
) -> ErrorList {
    if pass {
        return Vec::new();
    }
    let bad_value = value.map(|v| to_json(v));
    vec![
        Error::invalid(path, bad_value, format!("forced failure: {detail}"))
            .with_origin("validateFalse"),
    ]
}
