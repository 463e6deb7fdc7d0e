//! Duplicate detection within a list.
//!
//! The first occurrence of a value is never flagged; every later repeat gets
//! one `Duplicate` error at its own index. All strategies are quadratic in the
//! list length, which is fine for the list sizes API objects carry.

use serde::Serialize;

use crate::field::{Error, ErrorList, Path};
use crate::operation::Operation;
use crate::reflect::{Reflect, to_json};

/// Flag repeats under `==`. The repeated value is reported through its
/// `Serialize` impl, so plain comparable types need no `Reflect` impl.
pub fn unique_by_compare<T>(_op: &Operation, path: &Path, new: &[T], _old: &[T]) -> ErrorList
where
    T: PartialEq + Serialize,
{
    repeats(new, &|a: &T, b: &T| a == b)
        .map(|(i, value)| Error::duplicate(&path.index(i), value))
        .collect()
}

/// Flag repeats under structural equality, for element types that carry
/// lists, maps or optional fields.
pub fn unique_by_reflect<T: Reflect>(
    op: &Operation,
    path: &Path,
    new: &[T],
    old: &[T],
) -> ErrorList {
    unique(op, path, new, old, &crate::equality::deep_equal)
}

/// Flag repeats under a caller-supplied equality, e.g. one that compares a
/// subset of key fields.
pub fn unique<T: Reflect>(
    _op: &Operation,
    path: &Path,
    new: &[T],
    _old: &[T],
    equal: &dyn Fn(&T, &T) -> bool,
) -> ErrorList {
    repeats(new, equal)
        .map(|(i, value)| Error::duplicate(&path.index(i), to_json(value)))
        .collect()
}

/// Every element that equals some earlier element, with its index.
fn repeats<'a, T>(
    new: &'a [T],
    equal: &'a dyn Fn(&T, &T) -> bool,
) -> impl Iterator<Item = (usize, &'a T)> + 'a {
    new.iter()
        .enumerate()
        .filter(move |(i, value)| new[..*i].iter().any(|earlier| equal(value, earlier)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::ErrorType;
    use serde_json::json;

    #[derive(Clone, Debug, Default, PartialEq)]
    struct Entry {
        key: String,
        data: Vec<String>,
    }

    crate::reflect_struct!(Entry {
        key => "key",
        data => "data" [omit_empty],
    });

    fn entry(key: &str, data: &[&str]) -> Entry {
        Entry {
            key: key.into(),
            data: data.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn indices(errs: &ErrorList) -> Vec<String> {
        errs.iter().map(|e| e.field.clone()).collect()
    }

    #[test]
    fn test_no_duplicates() {
        let errs = unique_by_compare(&Operation::create(), &Path::new("l"), &[1, 2, 3], &[]);
        assert!(errs.is_empty());
        let errs = unique_by_compare::<i32>(&Operation::create(), &Path::new("l"), &[], &[]);
        assert!(errs.is_empty());
    }

    #[test]
    fn test_every_repeat_is_flagged_once() {
        let errs = unique_by_compare(&Operation::create(), &Path::new("l"), &[1, 2, 3, 2, 1], &[]);
        assert_eq!(indices(&errs), vec!["l[3]", "l[4]"]);
        assert!(errs.iter().all(|e| e.error_type == ErrorType::Duplicate));
        assert_eq!(errs[0].bad_value, Some(json!(2)));

        let errs = unique_by_compare(&Operation::create(), &Path::new("l"), &["a", "a", "a"], &[]);
        assert_eq!(indices(&errs), vec!["l[1]", "l[2]"]);
    }

    #[test]
    fn test_unique_by_compare_needs_no_reflection() {
        #[derive(PartialEq, serde::Serialize)]
        struct Port(u16);

        let ports = [Port(80), Port(443), Port(80)];
        let errs = unique_by_compare(&Operation::create(), &Path::new("ports"), &ports, &[]);
        assert_eq!(indices(&errs), vec!["ports[2]"]);
        assert_eq!(errs[0].bad_value, Some(json!(80)));
    }

    #[test]
    fn test_unique_by_reflect() {
        let list = vec![
            entry("a", &["x"]),
            entry("b", &[]),
            entry("a", &["x"]),
            entry("a", &["y"]),
        ];
        let errs = unique_by_reflect(&Operation::create(), &Path::new("l"), &list, &[]);
        assert_eq!(indices(&errs), vec!["l[2]"]);
        assert_eq!(errs[0].bad_value, Some(json!({"key": "a", "data": ["x"]})));
    }

    #[test]
    fn test_unique_by_key() {
        let list = vec![entry("a", &["x"]), entry("b", &[]), entry("a", &["y"])];
        let errs =
            unique(&Operation::update(), &Path::new("l"), &list, &[], &|a, b| a.key == b.key);
        assert_eq!(indices(&errs), vec!["l[2]"]);
    }
}
