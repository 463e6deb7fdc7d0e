//! Property tests for the ratcheting engine, the stability checks and
//! uniqueness.

use std::cell::Cell;

use kube_validate::each::{each_map_val, each_slice_val};
use kube_validate::equality::{deep_equal, direct_equal};
use kube_validate::field::{ErrorType, Path};
use kube_validate::immutable::{
    frozen_by_compare, frozen_by_reflect, immutable_by_reflect, immutable_pointer_by_compare,
    immutable_value_by_compare,
};
use kube_validate::operation::Operation;
use kube_validate::unique::{unique_by_compare, unique_by_reflect};
use proptest::prelude::*;

fn short_string() -> impl Strategy<Value = String> {
    prop_oneof![Just(String::new()), "[a-c]{1,3}"]
}

fn maybe_string() -> impl Strategy<Value = Option<String>> {
    proptest::option::of(short_string())
}

fn maybe_int() -> impl Strategy<Value = Option<i32>> {
    proptest::option::of(prop_oneof![Just(0), -3i32..4])
}

proptest! {
    #[test]
    fn unchanged_list_is_never_revalidated(list in proptest::collection::vec(any::<i32>(), 0..20)) {
        let calls = Cell::new(0);
        let errs = each_slice_val(
            &Operation::update(),
            &Path::new("list"),
            &list,
            &list.clone(),
            Some(&direct_equal),
            None,
            &|_, _, _, _| {
                calls.set(calls.get() + 1);
                Vec::new()
            },
        );
        prop_assert!(errs.is_empty());
        prop_assert_eq!(calls.get(), 0);
    }

    #[test]
    fn create_visits_every_element(list in proptest::collection::vec(any::<i32>(), 0..20)) {
        let calls = Cell::new(0);
        each_slice_val(
            &Operation::create(),
            &Path::new("list"),
            &list,
            &list.clone(),
            Some(&direct_equal),
            Some(&direct_equal),
            &|_, _, _, _| {
                calls.set(calls.get() + 1);
                Vec::new()
            },
        );
        prop_assert_eq!(calls.get(), list.len());
    }

    #[test]
    fn unchanged_map_is_never_revalidated(
        map in proptest::collection::btree_map("[a-z]{1,4}", any::<i64>(), 0..10)
    ) {
        let calls = Cell::new(0);
        each_map_val(
            &Operation::update(),
            &Path::new("map"),
            &map,
            Some(&map.clone()),
            Some(&deep_equal),
            &|_, _, _, _| {
                calls.set(calls.get() + 1);
                Vec::new()
            },
        );
        prop_assert_eq!(calls.get(), 0);
    }

    #[test]
    fn frozen_forms_agree_on_strings(old in maybe_string(), new in maybe_string()) {
        let (op, p) = (Operation::update(), Path::new("f"));
        let by_compare = frozen_by_compare(&op, &p, new.as_ref(), old.as_ref());
        let by_reflect = frozen_by_reflect(&op, &p, new.as_ref(), old.as_ref());
        prop_assert_eq!(by_compare.len(), by_reflect.len());
        prop_assert_eq!(by_compare.is_empty(), new == old);
    }

    #[test]
    fn frozen_forms_agree_on_ints(old in maybe_int(), new in maybe_int()) {
        let (op, p) = (Operation::update(), Path::new("f"));
        prop_assert_eq!(
            frozen_by_compare(&op, &p, new.as_ref(), old.as_ref()).len(),
            frozen_by_reflect(&op, &p, new.as_ref(), old.as_ref()).len()
        );
    }

    #[test]
    fn immutable_pointer_agrees_with_reflect(old in maybe_string(), new in maybe_string()) {
        let (op, p) = (Operation::update(), Path::new("f"));
        let by_pointer = immutable_pointer_by_compare(&op, &p, new.as_ref(), old.as_ref());
        let by_reflect = immutable_by_reflect(&op, &p, Some(&new), Some(&old));
        prop_assert_eq!(by_pointer.len(), by_reflect.len());
    }

    #[test]
    fn immutable_value_agrees_with_reflect(old in maybe_int(), new in maybe_int()) {
        let (op, p) = (Operation::update(), Path::new("f"));
        let (Some(old), Some(new)) = (old, new) else {
            return Ok(());
        };
        prop_assert_eq!(
            immutable_value_by_compare(&op, &p, Some(&new), Some(&old)).len(),
            immutable_by_reflect(&op, &p, Some(&new), Some(&old)).len()
        );
    }

    #[test]
    fn stability_checks_ignore_create(old in maybe_string(), new in maybe_string()) {
        let (op, p) = (Operation::create(), Path::new("f"));
        prop_assert!(frozen_by_compare(&op, &p, new.as_ref(), old.as_ref()).is_empty());
        prop_assert!(immutable_pointer_by_compare(&op, &p, new.as_ref(), old.as_ref()).is_empty());
    }

    #[test]
    fn each_inserted_duplicate_is_reported(
        base in proptest::collection::btree_set(any::<i64>(), 1..10),
        picks in proptest::collection::vec(any::<prop::sample::Index>(), 0..6)
    ) {
        let base: Vec<i64> = base.into_iter().collect();
        let mut list = base.clone();
        for pick in &picks {
            list.push(*pick.get(&base));
        }
        let errs = unique_by_compare(&Operation::create(), &Path::new("list"), &list, &[]);
        prop_assert_eq!(errs.len(), picks.len());
        prop_assert!(errs.iter().all(|e| e.error_type == ErrorType::Duplicate));
        let by_reflect = unique_by_reflect(&Operation::create(), &Path::new("list"), &list, &[]);
        prop_assert_eq!(by_reflect.len(), picks.len());
    }
}
