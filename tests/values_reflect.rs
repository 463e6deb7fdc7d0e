//! Typed objects evaluated by CEL through the dynamic value adapter.

#![cfg(feature = "values")]

use std::collections::BTreeMap;

use cel::{Context, Program, Value};
use kube_validate::quantity::{Quantity, parse_quantity};
use kube_validate::reflect_struct;
use kube_validate::register_all;
use kube_validate::values::{DynType, DynValue, typed_to_cel, typed_to_val};
use kube_validate::wellknown::{Duration, IntOrString};

#[derive(Clone, Debug, Default, PartialEq)]
struct Container {
    name: String,
    image: String,
}

reflect_struct!(Container {
    name => "name",
    image => "image",
});

#[derive(Clone, Debug, Default, PartialEq)]
struct Workload {
    i32: i32,
    u16: u16,
    ratio: f64,
    tags: Vec<String>,
    labels: BTreeMap<String, String>,
    containers: Vec<Container>,
    port: Option<IntOrString>,
    cpu: Option<Quantity>,
    timeout: Option<Duration>,
    note: Option<String>,
}

reflect_struct!(Workload {
    i32 => "i32",
    u16 => "u16",
    ratio => "ratio",
    tags => "tags" [omit_empty],
    labels => "labels" [omit_empty],
    containers => "containers" [omit_empty],
    port => "port" [omit_empty],
    cpu => "cpu" [omit_empty],
    timeout => "timeout" [omit_empty],
    note => "note" [omit_empty],
});

fn workload() -> Workload {
    Workload {
        i32: 32,
        u16: 16,
        ratio: 0.5,
        tags: vec!["a".into(), "b".into(), "c".into()],
        labels: BTreeMap::from([("key1".into(), "val1".into()), ("key2".into(), "val2".into())]),
        containers: vec![
            Container {
                name: "app".into(),
                image: "registry.local/app:1".into(),
            },
            Container {
                name: "sidecar".into(),
                image: "registry.local/proxy:2".into(),
            },
        ],
        port: Some(IntOrString::Int(5)),
        cpu: Some(parse_quantity("500m").unwrap()),
        timeout: Some(Duration(chrono::Duration::seconds(30))),
        note: None,
    }
}

fn eval(obj: &Workload, expr: &str) -> Value {
    let mut ctx = Context::default();
    register_all(&mut ctx);
    ctx.add_variable_from_value("c", typed_to_cel(obj));
    Program::compile(expr).unwrap().execute(&ctx).unwrap()
}

#[test]
fn scalar_fields() {
    let w = workload();
    assert_eq!(eval(&w, "c.i32 == 32"), Value::Bool(true));
    assert_eq!(eval(&w, "c.u16 == 16u"), Value::Bool(true));
    assert_eq!(eval(&w, "c.ratio < 1.0"), Value::Bool(true));
    assert_eq!(eval(&w, "c.port == 5"), Value::Bool(true));
}

#[test]
fn collections() {
    let w = workload();
    assert_eq!(eval(&w, "c.tags.size() == 3"), Value::Bool(true));
    assert_eq!(eval(&w, "'b' in c.tags"), Value::Bool(true));
    assert_eq!(eval(&w, "c.labels['key1'] == 'val1'"), Value::Bool(true));
    assert_eq!(
        eval(&w, "c.containers.all(x, x.image.startsWith('registry.local/'))"),
        Value::Bool(true)
    );
    assert_eq!(eval(&w, "c.containers.exists(x, x.name == 'sidecar')"), Value::Bool(true));
}

#[test]
fn omitted_fields_are_absent() {
    let w = workload();
    assert_eq!(eval(&w, "has(c.note)"), Value::Bool(false));
    assert_eq!(eval(&w, "has(c.timeout)"), Value::Bool(true));

    let bare = Workload::default();
    assert_eq!(eval(&bare, "has(c.tags)"), Value::Bool(false));
    assert_eq!(eval(&bare, "has(c.i32)"), Value::Bool(true));
}

#[test]
fn quantities_reach_the_quantity_library() {
    let w = workload();
    assert_eq!(eval(&w, "c.cpu.isLessThan(quantity('1'))"), Value::Bool(true));
    assert_eq!(eval(&w, "c.cpu.compareTo(quantity('0.5'))"), Value::Int(0));
}

#[test]
fn dynamic_view_matches_cel_view() {
    let w = workload();
    let v = typed_to_val(&w);
    assert_eq!(v.type_of(), DynType::Object("Workload"));
    assert_eq!(v.field("tags").unwrap().size().unwrap(), 3);
    assert!(matches!(v.field("port").unwrap(), DynValue::Int(5)));
    assert!(matches!(v.field("cpu").unwrap(), DynValue::Quantity(_)));
    assert!(!v.has("note").unwrap());

    let other = typed_to_val(&w);
    assert!(v.equal(&other).unwrap());
    let mut changed = w.clone();
    changed.labels.insert("key3".into(), "val3".into());
    assert!(!v.equal(&typed_to_val(&changed)).unwrap());
    assert_eq!(eval(&changed, "c.labels.size()"), Value::Int(3));
}
