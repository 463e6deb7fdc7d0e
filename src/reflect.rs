//! A uniform, read-only view over typed values.
//!
//! Validators that cannot rely on `PartialEq` (deep equality, zero-value
//! detection, uniqueness over structs) and the dynamic value adapter work on
//! values through the [`Reflect`] trait. A value describes itself as one of a
//! closed set of [`Kind`]s; types with a dedicated representation additionally
//! return a [`WellKnown`] view, and every consumer checks that view first.
//!
//! Structs describe their fields with a static table of [`FieldInfo`],
//! normally generated with [`reflect_struct!`](crate::reflect_struct). The
//! name-to-field index derived from that table (including fields promoted
//! from inline members) is built once per type and cached.

use std::any::TypeId;
use std::borrow::Cow;
use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;
use std::sync::{Arc, LazyLock, RwLock};

use chrono::{DateTime, Utc};

use crate::quantity::Quantity;
use crate::wellknown::{Bytes, IntOrString, zero_time};

/// Implemented by every value that validators and the dynamic adapter can inspect.
pub trait Reflect {
    fn kind(&self) -> Kind<'_>;

    /// The dedicated representation of a well-known type, if any.
    fn well_known(&self) -> Option<WellKnown<'_>> {
        None
    }
}

/// The structural shape of a value.
pub enum Kind<'a> {
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    String(Cow<'a, str>),
    /// A nilable reference (`Option<T>`); `None` is nil.
    Optional(Option<&'a dyn Reflect>),
    List(&'a dyn ReflectList),
    Map(&'a dyn ReflectMap),
    Struct(&'a dyn ReflectStruct),
}

/// Types whose dynamic representation is not derived from their structure.
#[derive(Clone, Copy, Debug)]
pub enum WellKnown<'a> {
    Timestamp(DateTime<Utc>),
    Duration(chrono::Duration),
    IntOrString(&'a IntOrString),
    Quantity(&'a Quantity),
    Bytes(&'a [u8]),
}

impl WellKnown<'_> {
    pub fn is_zero(&self) -> bool {
        match self {
            WellKnown::Timestamp(t) => *t == zero_time(),
            WellKnown::Duration(d) => d.is_zero(),
            WellKnown::IntOrString(v) => **v == IntOrString::default(),
            WellKnown::Quantity(q) => q.is_zero(),
            WellKnown::Bytes(b) => b.is_empty(),
        }
    }

    pub fn equals(&self, other: &WellKnown<'_>) -> bool {
        match (self, other) {
            (WellKnown::Timestamp(a), WellKnown::Timestamp(b)) => a == b,
            (WellKnown::Duration(a), WellKnown::Duration(b)) => a == b,
            (WellKnown::IntOrString(a), WellKnown::IntOrString(b)) => a == b,
            (WellKnown::Quantity(a), WellKnown::Quantity(b)) => a == b,
            (WellKnown::Bytes(a), WellKnown::Bytes(b)) => a == b,
            _ => false,
        }
    }
}

pub trait ReflectList {
    fn len(&self) -> usize;
    fn get(&self, index: usize) -> Option<&dyn Reflect>;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A string-keyed mapping. Entries are always visited in key order.
pub trait ReflectMap {
    fn len(&self) -> usize;
    fn get(&self, key: &str) -> Option<&dyn Reflect>;
    fn entries(&self) -> Vec<(String, &dyn Reflect)>;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub trait ReflectStruct {
    fn type_name(&self) -> &'static str;
    fn struct_type_id(&self) -> TypeId;
    fn fields(&self) -> &'static [FieldInfo];
    /// The value of the field at `index` in [`fields`](ReflectStruct::fields).
    fn field(&self, index: usize) -> Option<&dyn Reflect>;
}

/// Static description of one struct field.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FieldInfo {
    pub name: &'static str,
    /// The serialized name used for lookup.
    pub json_name: &'static str,
    /// Absent from the serialized form when empty.
    pub omit_empty: bool,
    /// The field's own fields are promoted into the parent.
    pub inline: bool,
}

impl FieldInfo {
    pub const fn new(name: &'static str, json_name: &'static str) -> Self {
        FieldInfo {
            name,
            json_name,
            omit_empty: false,
            inline: false,
        }
    }

    pub const fn omit_empty(mut self) -> Self {
        self.omit_empty = true;
        self
    }

    pub const fn inline(mut self) -> Self {
        self.inline = true;
        self
    }
}

/// Implement [`Reflect`] for a struct from a field table.
///
/// ```rust
/// use kube_validate::reflect_struct;
///
/// #[derive(Default)]
/// struct Meta {
///     name: String,
///     labels: std::collections::BTreeMap<String, String>,
/// }
///
/// reflect_struct!(Meta {
///     name => "name",
///     labels => "labels" [omit_empty],
/// });
/// ```
#[macro_export]
macro_rules! reflect_struct {
    ($ty:ident { $($field:ident => $json:literal $([$($opt:ident),+])?),* $(,)? }) => {
        impl $crate::reflect::Reflect for $ty {
            fn kind(&self) -> $crate::reflect::Kind<'_> {
                $crate::reflect::Kind::Struct(self)
            }
        }

        impl $crate::reflect::ReflectStruct for $ty {
            fn type_name(&self) -> &'static str {
                stringify!($ty)
            }

            fn struct_type_id(&self) -> ::std::any::TypeId {
                ::std::any::TypeId::of::<$ty>()
            }

            fn fields(&self) -> &'static [$crate::reflect::FieldInfo] {
                const FIELDS: &[$crate::reflect::FieldInfo] = &[
                    $($crate::reflect::FieldInfo::new(stringify!($field), $json)$($(.$opt())+)?),*
                ];
                FIELDS
            }

            fn field(&self, index: usize) -> Option<&dyn $crate::reflect::Reflect> {
                let fields: &[&dyn $crate::reflect::Reflect] = &[$(&self.$field),*];
                fields.get(index).copied()
            }
        }
    };
}

// ── Field index ─────────────────────────────────────────────────────

/// Serialized-name lookup for one struct type, with inline members flattened.
#[derive(Debug, Default)]
pub struct FieldIndex {
    order: Vec<&'static str>,
    by_name: HashMap<&'static str, FieldLocation>,
}

#[derive(Clone, Debug)]
struct FieldLocation {
    /// Field indices from the outer struct down to the field.
    path: Vec<usize>,
    omit_empty: bool,
}

impl FieldIndex {
    fn build(s: &dyn ReflectStruct) -> FieldIndex {
        let mut index = FieldIndex::default();
        index.collect(s, &[]);
        index
    }

    // Direct fields shadow promoted ones, so they are inserted first.
    fn collect(&mut self, s: &dyn ReflectStruct, prefix: &[usize]) {
        let mut inlined = Vec::new();
        for (i, info) in s.fields().iter().enumerate() {
            let mut path = prefix.to_vec();
            path.push(i);
            let nested = match s.field(i).map(|f| f.kind()) {
                Some(Kind::Struct(inner)) if info.inline => Some(inner),
                _ => None,
            };
            match nested {
                Some(inner) => inlined.push((inner, path)),
                None => self.insert(info, path),
            }
        }
        for (inner, path) in inlined {
            self.collect(inner, &path);
        }
    }

    fn insert(&mut self, info: &FieldInfo, path: Vec<usize>) {
        if self.by_name.contains_key(info.json_name) {
            return;
        }
        self.order.push(info.json_name);
        self.by_name.insert(
            info.json_name,
            FieldLocation {
                path,
                omit_empty: info.omit_empty,
            },
        );
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Serialized names in declaration order.
    pub fn names(&self) -> &[&'static str] {
        &self.order
    }

    pub fn contains(&self, json_name: &str) -> bool {
        self.by_name.contains_key(json_name)
    }
}

static FIELD_INDEXES: LazyLock<RwLock<HashMap<TypeId, Arc<FieldIndex>>>> =
    LazyLock::new(|| RwLock::new(HashMap::new()));

/// The cached field index for the struct's type, building it on first use.
pub fn field_index(s: &dyn ReflectStruct) -> Arc<FieldIndex> {
    let id = s.struct_type_id();
    if let Ok(cache) = FIELD_INDEXES.read()
        && let Some(index) = cache.get(&id)
    {
        return Arc::clone(index);
    }

    let built = Arc::new(FieldIndex::build(s));
    tracing::debug!(type_name = s.type_name(), fields = built.len(), "built field index");
    match FIELD_INDEXES.write() {
        Ok(mut cache) => Arc::clone(cache.entry(id).or_insert(built)),
        Err(_) => built,
    }
}

/// A struct field found by serialized name.
pub struct FieldRef<'a> {
    pub value: &'a dyn Reflect,
    pub omit_empty: bool,
}

impl FieldRef<'_> {
    /// Whether the field appears in the serialized form.
    pub fn is_present(&self) -> bool {
        !(self.omit_empty && is_empty_value(self.value))
    }
}

/// Look up a field by serialized name, following inline members.
pub fn lookup_field<'a>(s: &'a dyn ReflectStruct, json_name: &str) -> Option<FieldRef<'a>> {
    let index = field_index(s);
    let location = index.by_name.get(json_name)?;
    let (last, parents) = location.path.split_last()?;
    let mut current = s;
    for &i in parents {
        match current.field(i)?.kind() {
            Kind::Struct(inner) => current = inner,
            _ => return None,
        }
    }
    Some(FieldRef {
        value: current.field(*last)?,
        omit_empty: location.omit_empty,
    })
}

/// All fields in declaration order, inline members flattened.
pub fn struct_fields(s: &dyn ReflectStruct) -> Vec<(&'static str, FieldRef<'_>)> {
    let index = field_index(s);
    index
        .names()
        .iter()
        .filter_map(|name| lookup_field(s, name).map(|f| (*name, f)))
        .collect()
}

// ── Zero and empty values ───────────────────────────────────────────

/// Follow `Optional` layers. `None` means a nil reference was reached.
pub fn deref(v: &dyn Reflect) -> Option<&dyn Reflect> {
    let mut current = v;
    loop {
        match current.kind() {
            Kind::Optional(Some(inner)) => current = inner,
            Kind::Optional(None) | Kind::Null => return None,
            _ => return Some(current),
        }
    }
}

/// Whether a value equals its type's zero value: nil, `false`, `0`, `""`,
/// an empty collection, or a struct whose fields are all zero.
pub fn is_zero(v: &dyn Reflect) -> bool {
    match v.kind() {
        Kind::Null | Kind::Optional(None) => return true,
        Kind::Optional(Some(_)) => return false,
        _ => {}
    }
    if let Some(wk) = v.well_known() {
        return wk.is_zero();
    }
    match v.kind() {
        Kind::Null | Kind::Optional(_) => true,
        Kind::Bool(b) => !b,
        Kind::Int(i) => i == 0,
        Kind::UInt(u) => u == 0,
        Kind::Float(f) => f == 0.0,
        Kind::String(s) => s.is_empty(),
        Kind::List(l) => l.is_empty(),
        Kind::Map(m) => m.is_empty(),
        Kind::Struct(s) => (0..s.fields().len()).all(|i| s.field(i).is_none_or(is_zero)),
    }
}

/// Whether a value counts as "never set".
///
/// A nil reference is unset. A non-nil reference to a struct is unset when
/// the struct is zero; a non-nil reference to anything else is set, even if
/// it points at a zero scalar. Non-reference values are unset when zero.
pub fn is_unset(v: &dyn Reflect) -> bool {
    match v.kind() {
        Kind::Optional(None) | Kind::Null => true,
        Kind::Optional(Some(inner)) => match deref(inner) {
            None => true,
            Some(target) => {
                target.well_known().is_none()
                    && matches!(target.kind(), Kind::Struct(_))
                    && is_zero(target)
            }
        },
        _ => is_zero(v),
    }
}

/// Whether an `omit_empty` field holding this value is left out when serialized.
///
/// Structs are never empty, matching the usual JSON encoding rules.
pub fn is_empty_value(v: &dyn Reflect) -> bool {
    match v.kind() {
        Kind::Null | Kind::Optional(None) => return true,
        Kind::Optional(Some(_)) | Kind::Struct(_) => return false,
        _ => {}
    }
    match v.well_known() {
        Some(wk) => matches!(wk, WellKnown::Bytes(b) if b.is_empty()),
        None => is_zero(v),
    }
}

// ── JSON rendering ──────────────────────────────────────────────────

/// Render a value the way it would be serialized, for error messages.
pub fn to_json(v: &dyn Reflect) -> serde_json::Value {
    use serde_json::Value as J;

    match v.kind() {
        Kind::Null | Kind::Optional(None) => return J::Null,
        Kind::Optional(Some(inner)) => return to_json(inner),
        _ => {}
    }
    if let Some(wk) = v.well_known() {
        return match wk {
            WellKnown::IntOrString(IntOrString::Int(i)) => J::from(*i),
            WellKnown::Bytes(b) => J::String(Bytes(b.to_vec()).to_base64()),
            _ => match v.kind() {
                Kind::String(s) => J::String(s.into_owned()),
                _ => J::Null,
            },
        };
    }
    match v.kind() {
        Kind::Null | Kind::Optional(_) => J::Null,
        Kind::Bool(b) => J::Bool(b),
        Kind::Int(i) => J::from(i),
        Kind::UInt(u) => J::from(u),
        Kind::Float(f) => serde_json::Number::from_f64(f).map_or(J::Null, J::Number),
        Kind::String(s) => J::String(s.into_owned()),
        Kind::List(l) => J::Array((0..l.len()).filter_map(|i| l.get(i)).map(to_json).collect()),
        Kind::Map(m) => J::Object(m.entries().into_iter().map(|(k, v)| (k, to_json(v))).collect()),
        Kind::Struct(s) => J::Object(
            struct_fields(s)
                .into_iter()
                .filter(|(_, f)| f.is_present())
                .map(|(name, f)| (name.to_string(), to_json(f.value)))
                .collect(),
        ),
    }
}

// ── Impls for std types ─────────────────────────────────────────────

impl Reflect for bool {
    fn kind(&self) -> Kind<'_> {
        Kind::Bool(*self)
    }
}

macro_rules! reflect_signed {
    ($($t:ty),*) => {$(
        impl Reflect for $t {
            fn kind(&self) -> Kind<'_> {
                Kind::Int(i64::from(*self))
            }
        }
    )*};
}

macro_rules! reflect_unsigned {
    ($($t:ty),*) => {$(
        impl Reflect for $t {
            fn kind(&self) -> Kind<'_> {
                Kind::UInt(u64::from(*self))
            }
        }
    )*};
}

reflect_signed!(i8, i16, i32, i64);
reflect_unsigned!(u8, u16, u32, u64);

impl Reflect for usize {
    fn kind(&self) -> Kind<'_> {
        Kind::UInt(*self as u64)
    }
}

impl Reflect for f32 {
    fn kind(&self) -> Kind<'_> {
        Kind::Float(f64::from(*self))
    }
}

impl Reflect for f64 {
    fn kind(&self) -> Kind<'_> {
        Kind::Float(*self)
    }
}

impl Reflect for String {
    fn kind(&self) -> Kind<'_> {
        Kind::String(Cow::Borrowed(self))
    }
}

impl Reflect for &'static str {
    fn kind(&self) -> Kind<'_> {
        Kind::String(Cow::Borrowed(*self))
    }
}

impl<T: Reflect> Reflect for Option<T> {
    fn kind(&self) -> Kind<'_> {
        Kind::Optional(self.as_ref().map(|v| v as &dyn Reflect))
    }

    fn well_known(&self) -> Option<WellKnown<'_>> {
        self.as_ref().and_then(|v| v.well_known())
    }
}

impl<T: Reflect + ?Sized> Reflect for Box<T> {
    fn kind(&self) -> Kind<'_> {
        (**self).kind()
    }

    fn well_known(&self) -> Option<WellKnown<'_>> {
        (**self).well_known()
    }
}

impl<T: Reflect + ?Sized> Reflect for Arc<T> {
    fn kind(&self) -> Kind<'_> {
        (**self).kind()
    }

    fn well_known(&self) -> Option<WellKnown<'_>> {
        (**self).well_known()
    }
}

impl<T: Reflect> Reflect for Vec<T> {
    fn kind(&self) -> Kind<'_> {
        Kind::List(self)
    }
}

impl<T: Reflect> ReflectList for Vec<T> {
    fn len(&self) -> usize {
        self.as_slice().len()
    }

    fn get(&self, index: usize) -> Option<&dyn Reflect> {
        self.as_slice().get(index).map(|v| v as &dyn Reflect)
    }
}

/// Map keys that render to and parse from strings.
pub trait MapKey: Sized {
    fn to_key(&self) -> String;
    fn from_key(key: &str) -> Option<Self>;
}

impl MapKey for String {
    fn to_key(&self) -> String {
        self.clone()
    }

    fn from_key(key: &str) -> Option<Self> {
        Some(key.to_string())
    }
}

macro_rules! map_key_parse {
    ($($t:ty),*) => {$(
        impl MapKey for $t {
            fn to_key(&self) -> String {
                self.to_string()
            }

            fn from_key(key: &str) -> Option<Self> {
                key.parse().ok()
            }
        }
    )*};
}

map_key_parse!(bool, i32, i64, u32, u64);

impl<K: MapKey + Eq + Hash, V: Reflect> Reflect for HashMap<K, V> {
    fn kind(&self) -> Kind<'_> {
        Kind::Map(self)
    }
}

impl<K: MapKey + Eq + Hash, V: Reflect> ReflectMap for HashMap<K, V> {
    fn len(&self) -> usize {
        HashMap::len(self)
    }

    fn get(&self, key: &str) -> Option<&dyn Reflect> {
        HashMap::get(self, &K::from_key(key)?).map(|v| v as &dyn Reflect)
    }

    fn entries(&self) -> Vec<(String, &dyn Reflect)> {
        let mut entries: Vec<(String, &dyn Reflect)> =
            self.iter().map(|(k, v)| (k.to_key(), v as &dyn Reflect)).collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }
}

impl<K: MapKey + Ord, V: Reflect> Reflect for BTreeMap<K, V> {
    fn kind(&self) -> Kind<'_> {
        Kind::Map(self)
    }
}

impl<K: MapKey + Ord, V: Reflect> ReflectMap for BTreeMap<K, V> {
    fn len(&self) -> usize {
        BTreeMap::len(self)
    }

    fn get(&self, key: &str) -> Option<&dyn Reflect> {
        BTreeMap::get(self, &K::from_key(key)?).map(|v| v as &dyn Reflect)
    }

    fn entries(&self) -> Vec<(String, &dyn Reflect)> {
        let mut entries: Vec<(String, &dyn Reflect)> =
            self.iter().map(|(k, v)| (k.to_key(), v as &dyn Reflect)).collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }
}

// ── Impls for unstructured JSON ─────────────────────────────────────

impl Reflect for serde_json::Value {
    fn kind(&self) -> Kind<'_> {
        use serde_json::Value as J;
        match self {
            J::Null => Kind::Null,
            J::Bool(b) => Kind::Bool(*b),
            J::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Kind::Int(i)
                } else if let Some(u) = n.as_u64() {
                    Kind::UInt(u)
                } else {
                    Kind::Float(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            J::String(s) => Kind::String(Cow::Borrowed(s)),
            J::Array(items) => Kind::List(items),
            J::Object(map) => Kind::Map(map),
        }
    }
}

impl ReflectMap for serde_json::Map<String, serde_json::Value> {
    fn len(&self) -> usize {
        serde_json::Map::len(self)
    }

    fn get(&self, key: &str) -> Option<&dyn Reflect> {
        serde_json::Map::get(self, key).map(|v| v as &dyn Reflect)
    }

    fn entries(&self) -> Vec<(String, &dyn Reflect)> {
        let mut entries: Vec<(String, &dyn Reflect)> =
            self.iter().map(|(k, v)| (k.clone(), v as &dyn Reflect)).collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }
}
