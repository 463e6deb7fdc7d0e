//! Descending into a named field of a struct or of a keyed list element.

use std::marker::PhantomData;

use crate::ValidateFunc;
use crate::error::SetupError;
use crate::field::{ErrorList, Path};
use crate::operation::Operation;
use crate::reflect::{Kind, Reflect, ReflectStruct, lookup_field};

/// Validate one field of a struct pair at `path.<field_name>`.
///
/// A missing parent yields a missing field value, so the child validator
/// still runs and can decide what absence means.
pub fn subfield<S, F>(
    op: &Operation,
    path: &Path,
    new: Option<&S>,
    old: Option<&S>,
    field_name: &str,
    get_field: &dyn Fn(&S) -> &F,
    validator: &ValidateFunc<'_, F>,
) -> ErrorList {
    let new_value = new.map(get_field);
    let old_value = old.map(get_field);
    validator(op, &path.child(field_name), new_value, old_value)
}

/// A string-valued key field of a list-as-map element type, checked once
/// when the validator is built.
#[derive(Debug)]
pub struct KeyedField<T> {
    json_name: String,
    _item: PhantomData<fn(&T)>,
}

impl<T> Clone for KeyedField<T> {
    fn clone(&self) -> Self {
        KeyedField {
            json_name: self.json_name.clone(),
            _item: PhantomData,
        }
    }
}

impl<T: ReflectStruct + Default> KeyedField<T> {
    /// Check that `T` has a string field serialized as `json_name`.
    pub fn new(json_name: &str) -> Result<Self, SetupError> {
        let sample = T::default();
        let Some(field) = lookup_field(&sample, json_name) else {
            return Err(SetupError::UnknownField {
                type_name: sample.type_name(),
                field: json_name.to_string(),
            });
        };
        if field.value.well_known().is_some() || !matches!(field.value.kind(), Kind::String(_)) {
            return Err(SetupError::NonStringKey {
                type_name: sample.type_name(),
                field: json_name.to_string(),
                kind: kind_name(&field.value.kind()),
            });
        }
        Ok(KeyedField {
            json_name: json_name.to_string(),
            _item: PhantomData,
        })
    }

    pub fn json_name(&self) -> &str {
        &self.json_name
    }

    fn value_of(&self, item: &T) -> Option<String> {
        let field = lookup_field(item, &self.json_name)?;
        match field.value.kind() {
            Kind::String(s) => Some(s.into_owned()),
            _ => None,
        }
    }
}

/// Validate the element whose key field equals `key_value`, at
/// `path[key=value]`.
///
/// The first matching element of each list is used. Nothing is validated
/// when neither list has one.
pub fn list_map_element_by_key<T: ReflectStruct + Default>(
    op: &Operation,
    path: &Path,
    new: &[T],
    old: &[T],
    key: &KeyedField<T>,
    key_value: &str,
    validator: &ValidateFunc<'_, T>,
) -> ErrorList {
    let find = |list: &[T]| -> Option<usize> {
        list.iter()
            .position(|item| key.value_of(item).as_deref() == Some(key_value))
    };
    let new_item = find(new).map(|i| &new[i]);
    let old_item = find(old).map(|i| &old[i]);
    if new_item.is_none() && old_item.is_none() {
        return Vec::new();
    }
    let element_path = path.key_values([(key.json_name(), key_value)]);
    validator(op, &element_path, new_item, old_item)
}

fn kind_name(kind: &Kind<'_>) -> &'static str {
    match kind {
        Kind::Null => "null",
        Kind::Bool(_) => "bool",
        Kind::Int(_) => "int",
        Kind::UInt(_) => "uint",
        Kind::Float(_) => "float",
        Kind::String(_) => "string",
        Kind::Optional(_) => "optional",
        Kind::List(_) => "list",
        Kind::Map(_) => "map",
        Kind::Struct(_) => "struct",
    }
}
