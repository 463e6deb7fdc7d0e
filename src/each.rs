//! Per-element validation of lists and maps, with ratcheting.
//!
//! Each function walks the *new* collection and calls a validator for every
//! element, paired with the corresponding element of the old collection when
//! one can be found. On update, an element whose old counterpart is
//! equivalent is skipped so that pre-existing problems are not re-reported.

use std::collections::{BTreeMap, HashMap};
use std::fmt::Display;
use std::hash::Hash;

use tracing::trace;

use crate::ValidateFunc;
use crate::equality::CompareFunc;
use crate::field::{ErrorList, Path};
use crate::operation::Operation;
use crate::reflect::{Reflect, is_zero};

/// The first element of `list` that `matches(target, element)` accepts.
///
/// If the match function is not injective the result depends on list order.
pub fn lookup<'a, T>(list: &'a [T], target: &T, matches: &CompareFunc<'_, T>) -> Option<&'a T> {
    list.iter().find(|candidate| matches(target, candidate))
}

fn ratchets<T>(
    op: &Operation,
    new: &T,
    old: Option<&T>,
    equiv: Option<&CompareFunc<'_, T>>,
) -> bool {
    op.is_update() && old.is_some_and(|old| equiv.is_none_or(|eq| eq(new, old)))
}

/// Validate every element of `new`.
///
/// When `match_fn` is given, each element is paired with the first matching
/// element of `old`. On update, a paired element is skipped if `equiv` holds
/// for the pair, or if no `equiv` is given (the match is then taken as a full
/// comparison). Unpaired elements are validated with no old value.
pub fn each_slice_val<T>(
    op: &Operation,
    path: &Path,
    new: &[T],
    old: &[T],
    match_fn: Option<&CompareFunc<'_, T>>,
    equiv: Option<&CompareFunc<'_, T>>,
    validator: &ValidateFunc<'_, T>,
) -> ErrorList {
    let mut errs = ErrorList::new();
    for (i, value) in new.iter().enumerate() {
        let old_value = match_fn.and_then(|m| lookup(old, value, m));
        if ratchets(op, value, old_value, equiv) {
            trace!(path = %path, index = i, "element unchanged, skipping validation");
            continue;
        }
        errs.extend(validator(op, &path.index(i), Some(value), old_value));
    }
    errs
}

/// Like [`each_slice_val`], for elements that are themselves nilable.
///
/// A matched old element that is zero (nil, empty, or all-zero) is treated
/// as absent, so the validator sees no old value for it.
pub fn each_slice_val_nilable<T: Reflect>(
    op: &Operation,
    path: &Path,
    new: &[T],
    old: &[T],
    match_fn: Option<&CompareFunc<'_, T>>,
    equiv: Option<&CompareFunc<'_, T>>,
    validator: &ValidateFunc<'_, T>,
) -> ErrorList {
    let mut errs = ErrorList::new();
    for (i, value) in new.iter().enumerate() {
        let old_value = match_fn
            .and_then(|m| lookup(old, value, m))
            .filter(|o| !is_zero(*o));
        if ratchets(op, value, old_value, equiv) {
            trace!(path = %path, index = i, "element unchanged, skipping validation");
            continue;
        }
        errs.extend(validator(op, &path.index(i), Some(value), old_value));
    }
    errs
}

/// Validate every element of `new` with no old value, on any operation.
pub fn each_slice_val_without_old<T>(
    op: &Operation,
    path: &Path,
    new: &[T],
    validator: &ValidateFunc<'_, T>,
) -> ErrorList {
    new.iter()
        .enumerate()
        .flat_map(|(i, value)| validator(op, &path.index(i), Some(value), None))
        .collect()
}

// ── Maps ────────────────────────────────────────────────────────────

/// Map types the engine can walk. Entries are visited in key order so that
/// error lists are reproducible.
pub trait KeyedMap<K, V> {
    fn sorted_entries(&self) -> Vec<(&K, &V)>;
    fn lookup(&self, key: &K) -> Option<&V>;
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<K: Ord + Eq + Hash, V> KeyedMap<K, V> for HashMap<K, V> {
    fn sorted_entries(&self) -> Vec<(&K, &V)> {
        let mut entries: Vec<(&K, &V)> = self.iter().collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));
        entries
    }

    fn lookup(&self, key: &K) -> Option<&V> {
        self.get(key)
    }

    fn len(&self) -> usize {
        self.len()
    }
}

impl<K: Ord, V> KeyedMap<K, V> for BTreeMap<K, V> {
    fn sorted_entries(&self) -> Vec<(&K, &V)> {
        self.iter().collect()
    }

    fn lookup(&self, key: &K) -> Option<&V> {
        self.get(key)
    }

    fn len(&self) -> usize {
        self.len()
    }
}

/// Validate every value of `new`, paired with the value under the same key in `old`.
///
/// On update, a value is skipped when `equiv` holds against its old value.
pub fn each_map_val<K, V, M>(
    op: &Operation,
    path: &Path,
    new: &M,
    old: Option<&M>,
    equiv: Option<&CompareFunc<'_, V>>,
    validator: &ValidateFunc<'_, V>,
) -> ErrorList
where
    K: Display,
    M: KeyedMap<K, V>,
{
    let mut errs = ErrorList::new();
    for (key, value) in new.sorted_entries() {
        let old_value = old.and_then(|o| o.lookup(key));
        if let Some(eq) = equiv
            && ratchets(op, value, old_value, Some(eq))
        {
            trace!(path = %path, key = %key, "map value unchanged, skipping validation");
            continue;
        }
        errs.extend(validator(op, &path.key(key.to_string()), Some(value), old_value));
    }
    errs
}

/// Like [`each_map_val`], treating zero old values as absent.
pub fn each_map_val_nilable<K, V, M>(
    op: &Operation,
    path: &Path,
    new: &M,
    old: Option<&M>,
    equiv: Option<&CompareFunc<'_, V>>,
    validator: &ValidateFunc<'_, V>,
) -> ErrorList
where
    K: Display,
    V: Reflect,
    M: KeyedMap<K, V>,
{
    let mut errs = ErrorList::new();
    for (key, value) in new.sorted_entries() {
        let old_value = old.and_then(|o| o.lookup(key)).filter(|o| !is_zero(*o));
        if let Some(eq) = equiv
            && ratchets(op, value, old_value, Some(eq))
        {
            trace!(path = %path, key = %key, "map value unchanged, skipping validation");
            continue;
        }
        errs.extend(validator(op, &path.key(key.to_string()), Some(value), old_value));
    }
    errs
}

/// Validate every key of `new`. Keys have no old counterpart; errors are
/// reported against the map itself.
pub fn each_map_key<K, V, M>(
    op: &Operation,
    path: &Path,
    new: &M,
    validator: &ValidateFunc<'_, K>,
) -> ErrorList
where
    M: KeyedMap<K, V>,
{
    new.sorted_entries()
        .into_iter()
        .flat_map(|(key, _)| validator(op, path, Some(key), None))
        .collect()
}
