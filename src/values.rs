//! Typed values as dynamic expression values.
//!
//! [`typed_to_val`] wraps any [`Reflect`] value as a [`DynValue`] without
//! copying it. Lists, maps and structs stay lazy: elements and fields are
//! converted only when they are read. Well-known types are mapped to their
//! dedicated dynamic representation before any structural dispatch.
//!
//! [`to_cel`] and [`typed_to_cel`] materialize a value as a [`cel::Value`]
//! so it can be bound as a variable (e.g. `self`, `oldSelf`) in a CEL
//! evaluation context.

use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use cel::Value;
use cel::objects::{Key, Map};
use chrono::{DateTime, Utc};

use crate::equality::semantic_deep_equal;
use crate::quantity::Quantity;
use crate::reflect::{
    Kind, Reflect, ReflectList, ReflectMap, ReflectStruct, WellKnown, deref, lookup_field,
    struct_fields,
};
use crate::wellknown::IntOrString;

/// Errors from operations on dynamic values.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ValueError {
    #[error("no such key: {0}")]
    NoSuchKey(String),
    #[error("index out of bounds: {0}")]
    IndexOutOfBounds(i64),
    #[error("unsupported index type '{0}' in list")]
    UnsupportedIndexType(DynType),
    #[error("no such overload")]
    NoSuchOverload,
    #[error("type conversion error from '{from}' to '{to}'")]
    Conversion { from: DynType, to: DynType },
}

/// The runtime type of a [`DynValue`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DynType {
    Null,
    Bool,
    Int,
    UInt,
    Double,
    String,
    Bytes,
    Timestamp,
    Duration,
    Quantity,
    List,
    Map,
    /// A struct, named by its type.
    Object(&'static str),
}

impl fmt::Display for DynType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DynType::Null => "null_type",
            DynType::Bool => "bool",
            DynType::Int => "int",
            DynType::UInt => "uint",
            DynType::Double => "double",
            DynType::String => "string",
            DynType::Bytes => "bytes",
            DynType::Timestamp => "google.protobuf.Timestamp",
            DynType::Duration => "google.protobuf.Duration",
            DynType::Quantity => "kubernetes.Quantity",
            DynType::List => "list",
            DynType::Map => "map",
            DynType::Object(name) => name,
        };
        f.write_str(name)
    }
}

/// A borrowed value viewed dynamically.
#[derive(Clone)]
pub enum DynValue<'a> {
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Double(f64),
    String(Cow<'a, str>),
    Bytes(Cow<'a, [u8]>),
    Timestamp(DateTime<Utc>),
    Duration(chrono::Duration),
    Quantity(&'a Quantity),
    List(ListVal<'a>),
    Map(MapVal<'a>),
    Struct(StructVal<'a>),
}

/// A list, possibly the concatenation of several underlying lists.
#[derive(Clone)]
pub struct ListVal<'a> {
    parts: Vec<&'a dyn ReflectList>,
}

#[derive(Clone, Copy)]
pub struct MapVal<'a> {
    map: &'a dyn ReflectMap,
}

#[derive(Clone, Copy)]
pub struct StructVal<'a> {
    value: &'a dyn Reflect,
    fields: &'a dyn ReflectStruct,
}

/// Wrap a typed value. Optional layers are followed and a nil one at any
/// depth becomes [`DynValue::Null`].
pub fn typed_to_val(value: &dyn Reflect) -> DynValue<'_> {
    let Some(value) = deref(value) else {
        return DynValue::Null;
    };
    if let Some(wk) = value.well_known() {
        return match wk {
            WellKnown::Timestamp(t) => DynValue::Timestamp(t),
            WellKnown::Duration(d) => DynValue::Duration(d),
            WellKnown::IntOrString(IntOrString::Int(i)) => DynValue::Int(i64::from(*i)),
            WellKnown::IntOrString(IntOrString::String(s)) => DynValue::String(Cow::Borrowed(s)),
            WellKnown::Quantity(q) => DynValue::Quantity(q),
            WellKnown::Bytes(b) => DynValue::Bytes(Cow::Borrowed(b)),
        };
    }
    match value.kind() {
        Kind::Null | Kind::Optional(_) => DynValue::Null,
        Kind::Bool(b) => DynValue::Bool(b),
        Kind::Int(i) => DynValue::Int(i),
        Kind::UInt(u) => DynValue::UInt(u),
        Kind::Float(f) => DynValue::Double(f),
        Kind::String(s) => DynValue::String(s),
        Kind::List(list) => DynValue::List(ListVal { parts: vec![list] }),
        Kind::Map(map) => DynValue::Map(MapVal { map }),
        Kind::Struct(fields) => DynValue::Struct(StructVal { value, fields }),
    }
}

impl<'a> ListVal<'a> {
    pub fn len(&self) -> usize {
        self.parts.iter().map(|p| p.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn element(&self, mut index: usize) -> Option<DynValue<'a>> {
        for part in &self.parts {
            if index < part.len() {
                return part.get(index).map(typed_to_val);
            }
            index -= part.len();
        }
        None
    }

    fn elements(&self) -> Vec<DynValue<'a>> {
        self.parts
            .iter()
            .copied()
            .flat_map(|part| (0..part.len()).filter_map(move |i| part.get(i)))
            .map(typed_to_val)
            .collect()
    }
}

impl<'a> MapVal<'a> {
    fn find(&self, key: &str) -> Option<DynValue<'a>> {
        self.map.get(key).map(typed_to_val)
    }
}

impl<'a> StructVal<'a> {
    pub fn type_name(&self) -> &'static str {
        self.fields.type_name()
    }

    /// A field by serialized name. Fields left out of the serialized form
    /// are not found.
    fn lookup(&self, name: &str) -> Option<DynValue<'a>> {
        let field = lookup_field(self.fields, name)?;
        field.is_present().then(|| typed_to_val(field.value))
    }
}

fn numeric_equal(a: &DynValue<'_>, b: &DynValue<'_>) -> Option<bool> {
    let eq = match (a, b) {
        (DynValue::Int(x), DynValue::UInt(y)) | (DynValue::UInt(y), DynValue::Int(x)) => {
            u64::try_from(*x).is_ok_and(|x| x == *y)
        }
        (DynValue::Int(x), DynValue::Double(y)) | (DynValue::Double(y), DynValue::Int(x)) => {
            *x as f64 == *y
        }
        (DynValue::UInt(x), DynValue::Double(y)) | (DynValue::Double(y), DynValue::UInt(x)) => {
            *x as f64 == *y
        }
        _ => return None,
    };
    Some(eq)
}

impl<'a> DynValue<'a> {
    pub fn type_of(&self) -> DynType {
        match self {
            DynValue::Null => DynType::Null,
            DynValue::Bool(_) => DynType::Bool,
            DynValue::Int(_) => DynType::Int,
            DynValue::UInt(_) => DynType::UInt,
            DynValue::Double(_) => DynType::Double,
            DynValue::String(_) => DynType::String,
            DynValue::Bytes(_) => DynType::Bytes,
            DynValue::Timestamp(_) => DynType::Timestamp,
            DynValue::Duration(_) => DynType::Duration,
            DynValue::Quantity(_) => DynType::Quantity,
            DynValue::List(_) => DynType::List,
            DynValue::Map(_) => DynType::Map,
            DynValue::Struct(s) => DynType::Object(s.type_name()),
        }
    }

    /// Structural equality. Structs compare with semantic deep equality,
    /// lists element by element and maps key by key. Comparing a list, map
    /// or struct with a value of another shape has no overload.
    pub fn equal(&self, other: &DynValue<'_>) -> Result<bool, ValueError> {
        match (self, other) {
            (DynValue::Struct(a), DynValue::Struct(b)) => Ok(semantic_deep_equal(a.value, b.value)),
            (DynValue::List(a), DynValue::List(b)) => {
                if a.len() != b.len() {
                    return Ok(false);
                }
                for (x, y) in a.elements().iter().zip(b.elements().iter()) {
                    if !x.equal(y)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            (DynValue::Map(a), DynValue::Map(b)) => {
                if a.map.len() != b.map.len() {
                    return Ok(false);
                }
                for (key, value) in a.map.entries() {
                    let Some(other_value) = b.find(&key) else {
                        return Ok(false);
                    };
                    if !typed_to_val(value).equal(&other_value)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            (DynValue::Struct(_) | DynValue::List(_) | DynValue::Map(_), _) => {
                Err(ValueError::NoSuchOverload)
            }
            (DynValue::Null, DynValue::Null) => Ok(true),
            (DynValue::Bool(a), DynValue::Bool(b)) => Ok(a == b),
            (DynValue::Int(a), DynValue::Int(b)) => Ok(a == b),
            (DynValue::UInt(a), DynValue::UInt(b)) => Ok(a == b),
            (DynValue::Double(a), DynValue::Double(b)) => Ok(a == b),
            (DynValue::String(a), DynValue::String(b)) => Ok(a == b),
            (DynValue::Bytes(a), DynValue::Bytes(b)) => Ok(a == b),
            (DynValue::Timestamp(a), DynValue::Timestamp(b)) => Ok(a == b),
            (DynValue::Duration(a), DynValue::Duration(b)) => Ok(a == b),
            (DynValue::Quantity(a), DynValue::Quantity(b)) => Ok(a == b),
            (a, b) => Ok(numeric_equal(a, b).unwrap_or(false)),
        }
    }

    /// Index a list by position, or a map or struct by key.
    pub fn get(&self, key: &DynValue<'_>) -> Result<DynValue<'a>, ValueError> {
        match self {
            DynValue::List(list) => {
                let DynValue::Int(i) = key else {
                    return Err(ValueError::UnsupportedIndexType(key.type_of()));
                };
                usize::try_from(*i)
                    .ok()
                    .and_then(|idx| list.element(idx))
                    .ok_or(ValueError::IndexOutOfBounds(*i))
            }
            DynValue::Map(map) => {
                let DynValue::String(k) = key else {
                    return Err(ValueError::NoSuchOverload);
                };
                map.find(k).ok_or_else(|| ValueError::NoSuchKey(k.to_string()))
            }
            DynValue::Struct(s) => {
                let DynValue::String(k) = key else {
                    return Err(ValueError::NoSuchOverload);
                };
                s.lookup(k).ok_or_else(|| ValueError::NoSuchKey(k.to_string()))
            }
            _ => Err(ValueError::NoSuchOverload),
        }
    }

    /// Select a struct field or map entry by name.
    pub fn field(&self, name: &str) -> Result<DynValue<'a>, ValueError> {
        self.get(&DynValue::String(Cow::Borrowed(name)))
    }

    /// Whether a struct field is present in the serialized form, or a map
    /// has the key.
    pub fn has(&self, name: &str) -> Result<bool, ValueError> {
        match self {
            DynValue::Struct(s) => Ok(s.lookup(name).is_some()),
            DynValue::Map(map) => Ok(map.map.get(name).is_some()),
            _ => Err(ValueError::NoSuchOverload),
        }
    }

    /// List membership by [`equal`](Self::equal), or map key membership.
    ///
    /// An element that cannot be compared is only reported when no other
    /// element matches.
    pub fn contains(&self, value: &DynValue<'_>) -> Result<bool, ValueError> {
        match self {
            DynValue::List(list) => {
                let mut failed = None;
                for element in list.elements() {
                    match element.equal(value) {
                        Ok(true) => return Ok(true),
                        Ok(false) => {}
                        Err(e) => {
                            failed.get_or_insert(e);
                        }
                    }
                }
                failed.map_or(Ok(false), Err)
            }
            DynValue::Map(map) => match value {
                DynValue::String(k) => Ok(map.map.get(k).is_some()),
                _ => Err(ValueError::NoSuchOverload),
            },
            _ => Err(ValueError::NoSuchOverload),
        }
    }

    pub fn size(&self) -> Result<i64, ValueError> {
        let n = match self {
            DynValue::List(list) => list.len(),
            DynValue::Map(map) => map.map.len(),
            DynValue::String(s) => s.chars().count(),
            DynValue::Bytes(b) => b.len(),
            _ => return Err(ValueError::NoSuchOverload),
        };
        Ok(i64::try_from(n).unwrap_or(i64::MAX))
    }

    /// Concatenate two lists without copying their elements.
    pub fn add(&self, other: &DynValue<'a>) -> Result<DynValue<'a>, ValueError> {
        match (self, other) {
            (DynValue::List(a), DynValue::List(b)) => {
                let mut parts = a.parts.clone();
                parts.extend(b.parts.iter().copied());
                Ok(DynValue::List(ListVal { parts }))
            }
            _ => Err(ValueError::NoSuchOverload),
        }
    }

    /// List elements in order, or map keys in sorted order.
    pub fn iter(&self) -> Result<std::vec::IntoIter<DynValue<'a>>, ValueError> {
        match self {
            DynValue::List(list) => Ok(list.elements().into_iter()),
            DynValue::Map(map) => {
                let keys: Vec<DynValue<'a>> = map
                    .map
                    .entries()
                    .into_iter()
                    .map(|(k, _)| DynValue::String(Cow::Owned(k)))
                    .collect();
                Ok(keys.into_iter())
            }
            _ => Err(ValueError::NoSuchOverload),
        }
    }

    /// Lists convert to lists and maps to maps. A struct converts to its
    /// own type and to a map. Scalars only convert to their own type.
    pub fn convert_to_type(&self, target: DynType) -> Result<DynValue<'a>, ValueError> {
        let own = self.type_of();
        let allowed =
            own == target || matches!((self, target), (DynValue::Struct(_), DynType::Map));
        if allowed {
            return Ok(self.clone());
        }
        Err(ValueError::Conversion { from: own, to: target })
    }
}

impl fmt::Debug for DynValue<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DynValue::Null => f.write_str("Null"),
            DynValue::Bool(b) => f.debug_tuple("Bool").field(b).finish(),
            DynValue::Int(i) => f.debug_tuple("Int").field(i).finish(),
            DynValue::UInt(u) => f.debug_tuple("UInt").field(u).finish(),
            DynValue::Double(d) => f.debug_tuple("Double").field(d).finish(),
            DynValue::String(s) => f.debug_tuple("String").field(s).finish(),
            DynValue::Bytes(b) => f.debug_tuple("Bytes").field(b).finish(),
            DynValue::Timestamp(t) => f.debug_tuple("Timestamp").field(t).finish(),
            DynValue::Duration(d) => f.debug_tuple("Duration").field(d).finish(),
            DynValue::Quantity(q) => f.debug_tuple("Quantity").field(&q.to_string()).finish(),
            DynValue::List(l) => write!(f, "List(len={})", l.len()),
            DynValue::Map(m) => write!(f, "Map(len={})", m.map.len()),
            DynValue::Struct(s) => write!(f, "Struct({})", s.type_name()),
        }
    }
}

// ── CEL conversion ──────────────────────────────────────────────────

/// Materialize a dynamic value for CEL evaluation.
///
/// Structs become maps of their serialized fields. Quantities become
/// opaque `kubernetes.Quantity` values that the functions installed by
/// [`crate::quantity::register`] operate on.
pub fn to_cel(value: &DynValue<'_>) -> Value {
    match value {
        DynValue::Null => Value::Null,
        DynValue::Bool(b) => Value::Bool(*b),
        DynValue::Int(i) => Value::Int(*i),
        DynValue::UInt(u) => Value::UInt(*u),
        DynValue::Double(d) => Value::Float(*d),
        DynValue::String(s) => Value::String(Arc::new(s.to_string())),
        DynValue::Bytes(b) => Value::Bytes(Arc::new(b.to_vec())),
        DynValue::Timestamp(t) => Value::Timestamp(t.fixed_offset()),
        DynValue::Duration(d) => Value::Duration(*d),
        DynValue::Quantity(q) => Value::Opaque(Arc::new((*q).clone())),
        DynValue::List(list) => Value::List(Arc::new(list.elements().iter().map(to_cel).collect())),
        DynValue::Map(map) => {
            let entries = map.map.entries();
            let mut out = HashMap::with_capacity(entries.len());
            for (k, v) in entries {
                out.insert(Key::String(Arc::new(k)), to_cel(&typed_to_val(v)));
            }
            Value::Map(Map { map: Arc::new(out) })
        }
        DynValue::Struct(s) => {
            let mut out = HashMap::new();
            for (name, field) in struct_fields(s.fields) {
                if field.is_present() {
                    let key = Key::String(Arc::new(name.to_string()));
                    out.insert(key, to_cel(&typed_to_val(field.value)));
                }
            }
            Value::Map(Map { map: Arc::new(out) })
        }
    }
}

/// [`typed_to_val`] followed by [`to_cel`].
pub fn typed_to_cel(value: &dyn Reflect) -> Value {
    to_cel(&typed_to_val(value))
}
