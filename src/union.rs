//! Unions: exactly one of a fixed set of members must be set.

use crate::field::{Error, ErrorList, Path};
use crate::operation::Operation;

/// The member names of a union, in declaration order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UnionMembership {
    members: Vec<String>,
}

impl UnionMembership {
    pub fn new<S: Into<String>>(members: impl IntoIterator<Item = S>) -> Self {
        UnionMembership {
            members: members.into_iter().map(Into::into).collect(),
        }
    }

    pub fn members(&self) -> &[String] {
        &self.members
    }

    fn options(&self) -> String {
        self.members
            .iter()
            .map(|m| format!("`{m}`"))
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn check(&self, path: &Path, set: &[bool]) -> ErrorList {
        let specified: Vec<&str> = self
            .members
            .iter()
            .zip(set)
            .filter(|(_, is_set)| **is_set)
            .map(|(m, _)| m.as_str())
            .collect();
        match specified.len() {
            1 => Vec::new(),
            0 => vec![
                Error::invalid(path, "", format!("must specify one of: {}", self.options()))
                    .with_origin("union"),
            ],
            _ => vec![
                Error::invalid(
                    path,
                    format!("{{{}}}", specified.join(", ")),
                    format!("must specify exactly one of: {}", self.options()),
                )
                .with_origin("union"),
            ],
        }
    }
}

/// A test of whether one union member is set on a value.
pub type IsSetFunc<'a, T> = dyn Fn(&T) -> bool + 'a;

/// Check that exactly one member of `union` is set on `value`, with
/// `is_set[i]` testing member `i`.
///
/// On update, nothing is reported when the set of specified members is the
/// same as before, so an object that was already invalid can still be
/// updated in other ways.
pub fn union_members<T>(
    op: &Operation,
    path: &Path,
    value: Option<&T>,
    old: Option<&T>,
    union: &UnionMembership,
    is_set: &[&IsSetFunc<'_, T>],
) -> ErrorList {
    let Some(value) = value else {
        return Vec::new();
    };
    let membership = |v: &T| -> Vec<bool> { is_set.iter().map(|f| f(v)).collect() };
    let current = membership(value);
    if op.is_update()
        && let Some(old) = old
        && membership(old) == current
    {
        return Vec::new();
    }
    union.check(path, &current)
}

/// Like [`union_members`], where each member is a list-as-map item
/// selected by `selectors[i]`. A member is set when its item is present.
pub fn item_union<T>(
    op: &Operation,
    path: &Path,
    new: &[T],
    old: Option<&[T]>,
    union: &UnionMembership,
    selectors: &[&IsSetFunc<'_, T>],
) -> ErrorList {
    let membership = |list: &[T]| -> Vec<bool> {
        selectors.iter().map(|f| list.iter().any(|item| f(item))).collect()
    };
    let current = membership(new);
    if op.is_update()
        && let Some(old) = old
        && membership(old) == current
    {
        return Vec::new();
    }
    union.check(path, &current)
}
