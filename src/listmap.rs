//! Locating a single element of a list-as-map by its key fields.

use serde_json::Value;

use crate::ValidateFunc;
use crate::field::{ErrorList, Path};
use crate::operation::Operation;
use crate::reflect::{Kind, Reflect, lookup_field, to_json};

/// Find the first element of each list accepted by `matches` and validate
/// the pair once.
///
/// Errors are reported at the element's index in `new` when it is present
/// there, and at `path` itself when the element exists only in `old`. When
/// neither list has a match, nothing is validated.
///
/// Only the first match in each list is considered, so `matches` should
/// select on a unique key.
pub fn list_map_item_by_key_values<T>(
    op: &Operation,
    path: &Path,
    new: &[T],
    old: &[T],
    matches: &dyn Fn(&T) -> bool,
    validator: &ValidateFunc<'_, T>,
) -> ErrorList {
    let matched_old = old.iter().find(|item| matches(item));
    let matched_new = new.iter().enumerate().find(|(_, item)| matches(item));

    match (matched_new, matched_old) {
        (None, None) => Vec::new(),
        (Some((i, item)), old) => validator(op, &path.index(i), Some(item), old),
        (None, old) => validator(op, path, None, old),
    }
}

/// A compound list-map key: field names paired with the values they must hold.
///
/// ```rust
/// use kube_validate::listmap::KeyValues;
/// use serde_json::json;
///
/// let key = KeyValues::new().with("port", json!(80)).with("protocol", json!("TCP"));
/// assert_eq!(key.to_string(), "port=80,protocol=TCP");
/// ```
#[derive(Clone, Debug, Default, PartialEq)]
pub struct KeyValues {
    pairs: Vec<(String, Value)>,
}

impl KeyValues {
    pub fn new() -> Self {
        KeyValues::default()
    }

    pub fn with(mut self, field: impl Into<String>, value: Value) -> Self {
        self.pairs.push((field.into(), value));
        self
    }

    /// Whether every key field of `item` holds the expected value.
    ///
    /// Items that are not structs, or lack one of the key fields, never match.
    pub fn matches(&self, item: &dyn Reflect) -> bool {
        let Kind::Struct(s) = item.kind() else {
            return false;
        };
        self.pairs.iter().all(|(name, want)| match lookup_field(s, name) {
            Some(field) => to_json(field.value) == *want,
            None => false,
        })
    }

    /// The pairs rendered for a path segment, strings unquoted.
    pub fn rendered(&self) -> Vec<(String, String)> {
        self.pairs
            .iter()
            .map(|(k, v)| {
                let v = match v {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                (k.clone(), v)
            })
            .collect()
    }
}

impl std::fmt::Display for KeyValues {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let rendered: Vec<String> =
            self.rendered().into_iter().map(|(k, v)| format!("{k}={v}")).collect();
        f.write_str(&rendered.join(","))
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use serde_json::json;

    use super::*;
    use crate::field::Error;

    #[derive(Clone, Debug, Default, PartialEq)]
    struct Item {
        id: String,
        data: String,
    }

    crate::reflect_struct!(Item {
        id => "id",
        data => "data",
    });

    fn items(ids: &[&str]) -> Vec<Item> {
        ids.iter()
            .map(|id| Item {
                id: id.to_string(),
                data: format!("{id}-data"),
            })
            .collect()
    }

    fn paths_for(new: &[Item], old: &[Item], id: &str) -> Vec<String> {
        let key = KeyValues::new().with("id", json!(id));
        list_map_item_by_key_values(
            &Operation::update(),
            &Path::new("items"),
            new,
            old,
            &|item| key.matches(item),
            &|_, p, _, _| vec![Error::invalid(p, "", "x")],
        )
        .into_iter()
        .map(|e| e.field)
        .collect()
    }

    #[test]
    fn test_added_item_uses_new_index() {
        let old = items(&["existing"]);
        let new = items(&["existing", "temp", "new"]);
        assert_eq!(paths_for(&new, &old, "temp"), vec!["items[1]"]);
    }

    #[test]
    fn test_deleted_item_uses_list_path() {
        let old = items(&["existing", "temp"]);
        let new = items(&["existing"]);
        assert_eq!(paths_for(&new, &old, "temp"), vec!["items"]);
    }

    #[test]
    fn test_reordered_item_follows_new_index() {
        let old = items(&["low", "medium", "high"]);
        let new = items(&["high", "medium", "low"]);
        assert_eq!(paths_for(&new, &old, "high"), vec!["items[0]"]);
    }

    #[test]
    fn test_no_match_no_call() {
        assert!(paths_for(&items(&["a"]), &items(&["b"]), "zzz").is_empty());
        assert!(paths_for(&[], &[], "a").is_empty());
    }

    #[test]
    fn test_pairs_matched_items() {
        let old = vec![Item {
            id: "a".into(),
            data: "old".into(),
        }];
        let new = vec![
            Item {
                id: "b".into(),
                data: "other".into(),
            },
            Item {
                id: "a".into(),
                data: "new".into(),
            },
        ];
        let key = KeyValues::new().with("id", json!("a"));
        let seen = RefCell::new(None);
        list_map_item_by_key_values(
            &Operation::update(),
            &Path::new("items"),
            &new,
            &old,
            &|item| key.matches(item),
            &|_, _, new, old| {
                let pair = (new.map(|n| n.data.clone()), old.map(|o| o.data.clone()));
                *seen.borrow_mut() = Some(pair);
                Vec::new()
            },
        );
        assert_eq!(
            seen.into_inner(),
            Some((Some("new".to_string()), Some("old".to_string())))
        );
    }

    #[test]
    fn test_compound_keys() {
        #[derive(Default)]
        struct Port {
            port: i32,
            protocol: String,
        }
        crate::reflect_struct!(Port {
            port => "port",
            protocol => "protocol",
        });

        let key = KeyValues::new().with("port", json!(80)).with("protocol", json!("TCP"));
        let tcp = Port {
            port: 80,
            protocol: "TCP".into(),
        };
        let udp = Port {
            port: 80,
            protocol: "UDP".into(),
        };
        assert!(key.matches(&tcp));
        assert!(!key.matches(&udp));
        assert!(!KeyValues::new().with("missing", json!(1)).matches(&tcp));
        assert!(!key.matches(&5));
        assert_eq!(
            Path::new("ports").key_values(key.rendered()).to_string(),
            "ports[port=80,protocol=TCP]"
        );
    }

    #[test]
    fn test_special_key_values() {
        let key = KeyValues::new().with("id", json!(""));
        assert!(key.matches(&Item::default()));
        assert_eq!(key.to_string(), "id=");
        let key = KeyValues::new().with("id", json!("unicode-🚀"));
        assert_eq!(key.to_string(), "id=unicode-🚀");
    }
}
