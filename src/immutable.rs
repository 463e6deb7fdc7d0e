//! Value stability across updates.
//!
//! *Frozen* values may never change once the object exists, not even from
//! unset to set. *Immutable* values may go from unset to set exactly once and
//! may never be modified or cleared afterwards. Both checks do nothing outside
//! of update operations.
//!
//! Each axis has a `_by_compare` form for `PartialEq` types and a
//! `_by_reflect` form that uses structural equality, for types whose `==` is
//! not meaningful or not available. The two forms reach the same verdict for
//! any pair of values.
//!
//! A value whose type has a non-zero default is never unset, so in practice
//! such a field behaves as frozen.

use crate::equality::deep_equal;
use crate::field::{Error, ErrorList, Path};
use crate::operation::Operation;
use crate::reflect::{Reflect, is_unset};

const FROZEN: &str = "field is frozen";
const IMMUTABLE: &str = "field is immutable";

fn forbid(path: &Path, detail: &str) -> ErrorList {
    vec![Error::forbidden(path, detail)]
}

/// Forbid any change, including setting and clearing.
pub fn frozen_by_compare<T: PartialEq>(
    op: &Operation,
    path: &Path,
    value: Option<&T>,
    old: Option<&T>,
) -> ErrorList {
    if !op.is_update() || value == old {
        return Vec::new();
    }
    forbid(path, FROZEN)
}

/// Like [`frozen_by_compare`], using structural equality.
pub fn frozen_by_reflect<T: Reflect>(
    op: &Operation,
    path: &Path,
    value: Option<&T>,
    old: Option<&T>,
) -> ErrorList {
    if !op.is_update() || reflect_equal(value, old) {
        return Vec::new();
    }
    forbid(path, FROZEN)
}

/// Allow unset to set, where the zero value counts as unset.
pub fn immutable_value_by_compare<T>(
    op: &Operation,
    path: &Path,
    value: Option<&T>,
    old: Option<&T>,
) -> ErrorList
where
    T: PartialEq + Default,
{
    immutable_by_compare_check(op, path, value, old, |v| v.is_none_or(|v| *v == T::default()))
}

/// Allow unset to set, where only an absent value counts as unset. A present
/// zero value is set.
pub fn immutable_pointer_by_compare<T: PartialEq>(
    op: &Operation,
    path: &Path,
    value: Option<&T>,
    old: Option<&T>,
) -> ErrorList {
    immutable_by_compare_check(op, path, value, old, |v| v.is_none())
}

fn immutable_by_compare_check<T: PartialEq>(
    op: &Operation,
    path: &Path,
    value: Option<&T>,
    old: Option<&T>,
    unset: impl Fn(Option<&T>) -> bool,
) -> ErrorList {
    if !op.is_update() {
        return Vec::new();
    }
    let (value, old) = match (value, old) {
        (_, None) => return Vec::new(),
        (None, Some(_)) => return forbid(path, IMMUTABLE),
        (Some(v), Some(o)) => (v, o),
    };

    let old_unset = unset(Some(old));
    let new_unset = unset(Some(value));
    if old_unset == new_unset && value == old {
        return Vec::new();
    }
    if old_unset && !new_unset {
        return Vec::new();
    }
    forbid(path, IMMUTABLE)
}

/// Allow unset to set, deciding unset-ness structurally.
///
/// An absent value, a `None` optional, an empty collection, a zero scalar and
/// a struct whose fields are all zero are unset. A `Some` holding anything
/// other than a zero struct is set.
pub fn immutable_by_reflect<T: Reflect>(
    op: &Operation,
    path: &Path,
    value: Option<&T>,
    old: Option<&T>,
) -> ErrorList {
    if !op.is_update() || reflect_equal(value, old) {
        return Vec::new();
    }
    let unset = |v: Option<&T>| v.is_none_or(|v| is_unset(v));
    if unset(old) && !unset(value) {
        return Vec::new();
    }
    forbid(path, IMMUTABLE)
}

fn reflect_equal<T: Reflect>(a: Option<&T>, b: Option<&T>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => deep_equal(a, b),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    #[derive(Clone, Debug, Default, PartialEq)]
    struct Settings {
        s: String,
        sp: Option<String>,
        i: i32,
        ss: Vec<String>,
        mss: BTreeMap<String, String>,
    }

    crate::reflect_struct!(Settings {
        s => "s",
        sp => "sp" [omit_empty],
        i => "i",
        ss => "ss" [omit_empty],
        mss => "mss" [omit_empty],
    });

    fn settings_a() -> Settings {
        Settings {
            s: "abc".into(),
            sp: Some("abc".into()),
            i: 123,
            ss: vec!["a".into(), "b".into()],
            mss: [("a".to_string(), "b".to_string())].into(),
        }
    }

    fn settings_b() -> Settings {
        Settings {
            s: "xyz".into(),
            sp: Some("xyz".into()),
            i: 456,
            ss: vec!["x".into()],
            mss: [("x".to_string(), "X".to_string())].into(),
        }
    }

    /// Run a check under create (must pass) and update (must match `fail`).
    fn check(name: &str, fail: bool, f: impl Fn(&Operation) -> ErrorList) {
        let errs = f(&Operation::create());
        assert!(errs.is_empty(), "{name} (create): expected success: {errs:?}");
        let errs = f(&Operation::update());
        assert_eq!(!errs.is_empty(), fail, "{name} (update): got {errs:?}");
    }

    #[test]
    fn test_frozen_by_compare() {
        let p = Path::new("f");
        check("nil both", false, |op| frozen_by_compare::<i32>(op, &p, None, None));
        check("nil value", true, |op| frozen_by_compare(op, &p, None, Some(&123)));
        check("nil old", true, |op| frozen_by_compare(op, &p, Some(&123), None));
        check("int", false, |op| frozen_by_compare(op, &p, Some(&123), Some(&123)));
        check("int fail", true, |op| frozen_by_compare(op, &p, Some(&123), Some(&456)));
        check("string fail", true, |op| frozen_by_compare(op, &p, Some(&"abc"), Some(&"xyz")));
        check("bool fail", true, |op| frozen_by_compare(op, &p, Some(&true), Some(&false)));
        let frozen = frozen_by_compare(&Operation::update(), &p, Some(&1), Some(&2));
        assert_eq!(frozen[0].detail, "field is frozen");
    }

    #[test]
    fn test_frozen_by_reflect() {
        let p = Path::new("f");
        let (a, a2, b) = (settings_a(), settings_a(), settings_b());
        check("nil both", false, |op| frozen_by_reflect::<i32>(op, &p, None, None));
        check("nil value", true, |op| frozen_by_reflect(op, &p, None, Some(&123)));
        check("nil old", true, |op| frozen_by_reflect(op, &p, Some(&123), None));
        check("int", false, |op| frozen_by_reflect(op, &p, Some(&123), Some(&123)));
        check("same struct", false, |op| frozen_by_reflect(op, &p, Some(&a), Some(&a)));
        check("equal struct", false, |op| frozen_by_reflect(op, &p, Some(&a), Some(&a2)));
        check("struct fail", true, |op| frozen_by_reflect(op, &p, Some(&a), Some(&b)));
    }

    fn string_cases() -> Vec<(&'static str, Option<String>, Option<String>)> {
        let s = |v: &str| Some(v.to_string());
        vec![
            ("both nil", None, None),
            ("nil to empty", None, s("")),
            ("nil to value", None, s("hello")),
            ("empty to value", s(""), s("hello")),
            ("value to empty", s("hello"), s("")),
            ("same value", s("hello"), s("hello")),
            ("different values", s("hello"), s("world")),
        ]
    }

    #[test]
    fn test_frozen_variants_agree() {
        let (op, p) = (Operation::update(), Path::new("test"));
        for (name, old, new) in string_cases() {
            let by_compare = frozen_by_compare(&op, &p, new.as_ref(), old.as_ref());
            let by_reflect = frozen_by_reflect(&op, &p, new.as_ref(), old.as_ref());
            assert_eq!(by_compare.len(), by_reflect.len(), "{name}");
        }
    }

    #[test]
    fn test_immutable_value_by_compare() {
        let p = Path::new("f");
        check("nil both", false, |op| immutable_value_by_compare::<i32>(op, &p, None, None));
        check("nil value", true, |op| immutable_value_by_compare(op, &p, None, Some(&1)));
        check("nil old", false, |op| immutable_value_by_compare(op, &p, Some(&1), None));
        check("int set", false, |op| immutable_value_by_compare(op, &p, Some(&1), Some(&0)));
        check("int clear", true, |op| immutable_value_by_compare(op, &p, Some(&0), Some(&1)));
        check("int modify", true, |op| immutable_value_by_compare(op, &p, Some(&2), Some(&1)));
        check("int same", false, |op| immutable_value_by_compare(op, &p, Some(&1), Some(&1)));
        check("string set", false, |op| {
            immutable_value_by_compare(op, &p, Some(&"a".to_string()), Some(&String::new()))
        });
        check("string clear", true, |op| {
            immutable_value_by_compare(op, &p, Some(&String::new()), Some(&"a".to_string()))
        });
        check("bool set", false, |op| {
            immutable_value_by_compare(op, &p, Some(&true), Some(&false))
        });
        check("bool clear", true, |op| {
            immutable_value_by_compare(op, &p, Some(&false), Some(&true))
        });
    }

    #[test]
    fn test_immutable_pointer_by_compare() {
        let p = Path::new("f");
        check("nil both", false, |op| immutable_pointer_by_compare::<i32>(op, &p, None, None));
        check("set", false, |op| immutable_pointer_by_compare(op, &p, Some(&1), None));
        check("clear", true, |op| immutable_pointer_by_compare(op, &p, None, Some(&1)));
        check("same", false, |op| immutable_pointer_by_compare(op, &p, Some(&1), Some(&1)));
        check("modify", true, |op| immutable_pointer_by_compare(op, &p, Some(&2), Some(&1)));
        check("nil to empty string", false, |op| {
            immutable_pointer_by_compare(op, &p, Some(&String::new()), None)
        });
        check("empty to non-empty", true, |op| {
            immutable_pointer_by_compare(op, &p, Some(&"a".to_string()), Some(&String::new()))
        });
        check("nil to false", false, |op| immutable_pointer_by_compare(op, &p, Some(&false), None));
        check("false to true", true, |op| {
            immutable_pointer_by_compare(op, &p, Some(&true), Some(&false))
        });
    }

    #[test]
    fn test_immutable_by_reflect() {
        let p = Path::new("f");
        let some = |v: Vec<&str>| Some(v.into_iter().map(String::from).collect::<Vec<_>>());
        let empty = Vec::<String>::new();
        let full = vec!["a".to_string()];
        check("slice stays empty", false, |op| {
            immutable_by_reflect(op, &p, Some(&empty), Some(&empty))
        });
        check("slice empty to non-empty", false, |op| {
            immutable_by_reflect(op, &p, Some(&full), Some(&empty))
        });
        check("slice absent to non-empty", false, |op| {
            immutable_by_reflect(op, &p, Some(&full), None)
        });
        check("slice non-empty to empty", true, |op| {
            immutable_by_reflect(op, &p, Some(&empty), Some(&full))
        });
        check("slice non-empty to absent", true, |op| {
            immutable_by_reflect(op, &p, None, Some(&full))
        });
        check("slice modify", true, |op| {
            immutable_by_reflect(op, &p, some(vec!["b"]).as_ref(), some(vec!["a"]).as_ref())
        });

        let empty_map = BTreeMap::<String, String>::new();
        let full_map: BTreeMap<String, String> = [("k".to_string(), "v".to_string())].into();
        check("map stays empty", false, |op| {
            immutable_by_reflect(op, &p, Some(&empty_map), Some(&empty_map))
        });
        check("map set", false, |op| {
            immutable_by_reflect(op, &p, Some(&full_map), Some(&empty_map))
        });
        check("map clear", true, |op| {
            immutable_by_reflect(op, &p, Some(&empty_map), Some(&full_map))
        });

        let (zero, a, b) = (Settings::default(), settings_a(), settings_b());
        check("struct set", false, |op| immutable_by_reflect(op, &p, Some(&a), Some(&zero)));
        check("struct clear", true, |op| immutable_by_reflect(op, &p, Some(&zero), Some(&a)));
        check("struct modify", true, |op| immutable_by_reflect(op, &p, Some(&b), Some(&a)));
        check("struct same", false, |op| {
            immutable_by_reflect(op, &p, Some(&a), Some(&settings_a()))
        });

        let (none, boxed) = (None::<Settings>, Some(settings_a()));
        check("optional struct set", false, |op| {
            immutable_by_reflect(op, &p, Some(&boxed), Some(&none))
        });
        check("optional struct clear", true, |op| {
            immutable_by_reflect(op, &p, Some(&none), Some(&boxed))
        });

        check("int set", false, |op| immutable_by_reflect(op, &p, Some(&5), Some(&0)));
        check("string set", false, |op| {
            immutable_by_reflect(op, &p, Some(&"x".to_string()), Some(&String::new()))
        });
        check("bool set", false, |op| immutable_by_reflect(op, &p, Some(&true), Some(&false)));
    }

    #[test]
    fn test_immutable_variants_agree() {
        let (op, p) = (Operation::update(), Path::new("test"));
        for (name, old, new) in string_cases() {
            let by_pointer = immutable_pointer_by_compare(&op, &p, new.as_ref(), old.as_ref());
            let by_reflect = immutable_by_reflect(&op, &p, Some(&new), Some(&old));
            assert_eq!(by_pointer.len(), by_reflect.len(), "{name}: pointer vs reflect");

            if let (Some(new), Some(old)) = (&new, &old) {
                let by_value = immutable_value_by_compare(&op, &p, Some(new), Some(old));
                let by_reflect = immutable_by_reflect(&op, &p, Some(new), Some(old));
                assert_eq!(by_value.len(), by_reflect.len(), "{name}: value vs reflect");
            }
        }
    }
}
