//! Equality strategies shared by the collection, uniqueness and immutability checks.
//!
//! A [`CompareFunc`] plays one of two roles: it *matches* an element of a new
//! list with its counterpart in the old list (often by key only), or it
//! decides whether two matched elements are *equivalent* (usually a full
//! comparison). The same signature serves both.

use std::fmt::Display;

use crate::field::{Error, ErrorList, Path};
use crate::operation::Operation;
use crate::reflect::{Kind, Reflect, deref};

/// A binary predicate over two values of the same type.
pub type CompareFunc<'a, T> = dyn Fn(&T, &T) -> bool + 'a;

/// `==`, for types where direct comparison is meaningful.
pub fn direct_equal<T: PartialEq + ?Sized>(a: &T, b: &T) -> bool {
    a == b
}

/// Structural equality of two typed values. See [`semantic_deep_equal`].
pub fn deep_equal<T: Reflect>(a: &T, b: &T) -> bool {
    semantic_deep_equal(a, b)
}

/// Build a match function that compares only the extracted key.
pub fn key_equal<T, K, F>(key: F) -> impl Fn(&T, &T) -> bool
where
    K: PartialEq,
    F: Fn(&T) -> K,
{
    move |a: &T, b: &T| key(a) == key(b)
}

/// Structural equality over [`Reflect`] values.
///
/// Well-known types compare by value (`"1k"` equals `"1000"` for
/// quantities). Collections compare by contents, and a nil reference equals
/// an empty list or map. Otherwise a nil reference only equals another nil,
/// and a non-nil reference is compared through to its target.
pub fn semantic_deep_equal(a: &dyn Reflect, b: &dyn Reflect) -> bool {
    match (a.kind(), b.kind()) {
        (Kind::Optional(x), Kind::Optional(y)) => {
            return match (x, y) {
                (None, None) => true,
                (Some(x), Some(y)) => semantic_deep_equal(x, y),
                (None, Some(v)) | (Some(v), None) => deref(v).is_some_and(is_empty_collection),
            };
        }
        (Kind::Optional(_) | Kind::Null, _) | (_, Kind::Optional(_) | Kind::Null) => {
            return match (deref(a), deref(b)) {
                (None, None) => true,
                (Some(x), Some(y)) => semantic_deep_equal(x, y),
                (None, Some(v)) | (Some(v), None) => is_empty_collection(v),
            };
        }
        _ => {}
    }

    match (a.well_known(), b.well_known()) {
        (Some(x), Some(y)) => return x.equals(&y),
        (Some(_), None) | (None, Some(_)) => return false,
        (None, None) => {}
    }

    match (a.kind(), b.kind()) {
        (Kind::Bool(x), Kind::Bool(y)) => x == y,
        (Kind::Int(x), Kind::Int(y)) => x == y,
        (Kind::UInt(x), Kind::UInt(y)) => x == y,
        (Kind::Float(x), Kind::Float(y)) => x == y,
        (Kind::String(x), Kind::String(y)) => x == y,
        (Kind::List(x), Kind::List(y)) => {
            x.len() == y.len()
                && (0..x.len()).all(|i| match (x.get(i), y.get(i)) {
                    (Some(l), Some(r)) => semantic_deep_equal(l, r),
                    _ => false,
                })
        }
        (Kind::Map(x), Kind::Map(y)) => {
            x.len() == y.len()
                && x.entries().into_iter().all(|(k, l)| match y.get(&k) {
                    Some(r) => semantic_deep_equal(l, r),
                    None => false,
                })
        }
        (Kind::Struct(x), Kind::Struct(y)) => {
            x.struct_type_id() == y.struct_type_id()
                && (0..x.fields().len()).all(|i| match (x.field(i), y.field(i)) {
                    (Some(l), Some(r)) => semantic_deep_equal(l, r),
                    _ => false,
                })
        }
        _ => false,
    }
}

fn is_empty_collection(v: &dyn Reflect) -> bool {
    v.well_known().is_none()
        && match v.kind() {
            Kind::List(l) => l.is_empty(),
            Kind::Map(m) => m.is_empty(),
            _ => false,
        }
}

/// Require the value to be one of `allowed`. An absent value passes.
pub fn eq_one_of<T>(
    _op: &Operation,
    path: &Path,
    value: Option<&T>,
    _old: Option<&T>,
    allowed: &[T],
) -> ErrorList
where
    T: PartialEq + Display,
{
    let Some(value) = value else {
        return Vec::new();
    };
    if allowed.contains(value) {
        return Vec::new();
    }
    let allowed: Vec<String> = allowed.iter().map(ToString::to_string).collect();
    vec![Error::not_supported(path, value.to_string(), &allowed).with_origin("k8s:eqOneOf")]
}
