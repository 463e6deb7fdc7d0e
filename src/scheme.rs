//! Registration of per-type validation and composition of field validators.
//!
//! A [`Scheme`] maps each registered type to its validation functions, one
//! per subresource. It is built explicitly at startup, usually through a
//! [`SchemeBuilder`], and is read-only afterwards so it can be shared across
//! threads.
//!
//! [`Validations`] composes the validators attached to one field in the
//! order a generated validation function would call them.

use std::any::{Any, TypeId, type_name};
use std::collections::HashMap;

use crate::error::SetupError;
use crate::field::{Error, ErrorList, Path};
use crate::operation::Operation;

type ObjectValidateFunc = dyn Fn(&Operation, &dyn Any, Option<&dyn Any>) -> ErrorList + Send + Sync;

struct Registration {
    type_name: &'static str,
    by_subresource: HashMap<String, Box<ObjectValidateFunc>>,
}

/// Validation functions for whole objects, keyed by type and subresource.
#[derive(Default)]
pub struct Scheme {
    types: HashMap<TypeId, Registration>,
}

impl std::fmt::Debug for Scheme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut types: Vec<_> = self.types.values().map(|r| r.type_name).collect();
        types.sort_unstable();
        f.debug_struct("Scheme").field("types", &types).finish()
    }
}

impl Scheme {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `f` to validate objects of type `T` for `subresource`
    /// (`"/"` for the root resource, `"/status"`, ...).
    ///
    /// `f` receives the object and, on update, the previous object.
    pub fn add_validation_func<T, F>(&mut self, subresource: &str, f: F) -> Result<(), SetupError>
    where
        T: Any,
        F: Fn(&Operation, &T, Option<&T>) -> ErrorList + Send + Sync + 'static,
    {
        let registration = self.types.entry(TypeId::of::<T>()).or_insert_with(|| Registration {
            type_name: type_name::<T>(),
            by_subresource: HashMap::new(),
        });
        if registration.by_subresource.contains_key(subresource) {
            return Err(SetupError::DuplicateRegistration {
                type_name: type_name::<T>(),
            });
        }
        let erased = move |op: &Operation, obj: &dyn Any, old: Option<&dyn Any>| -> ErrorList {
            let Some(obj) = obj.downcast_ref::<T>() else {
                return vec![Error::internal_error(
                    &Path::root(),
                    format!("object is not a {}", type_name::<T>()),
                )];
            };
            f(op, obj, old.and_then(|o| o.downcast_ref::<T>()))
        };
        registration
            .by_subresource
            .insert(subresource.to_string(), Box::new(erased));
        Ok(())
    }

    /// Whether any validation is registered for `T`.
    pub fn is_registered<T: Any>(&self) -> bool {
        self.types.contains_key(&TypeId::of::<T>())
    }

    /// Validate a new object.
    pub fn validate<T: Any>(&self, op: &Operation, obj: &T) -> ErrorList {
        self.dispatch(op, obj, None)
    }

    /// Validate an object against its previous version.
    pub fn validate_update<T: Any>(&self, op: &Operation, obj: &T, old: &T) -> ErrorList {
        self.dispatch(op, obj, Some(old))
    }

    fn dispatch<T: Any>(&self, op: &Operation, obj: &T, old: Option<&T>) -> ErrorList {
        let subresource = op.request.subresource_path();
        let found = self
            .types
            .get(&TypeId::of::<T>())
            .and_then(|r| r.by_subresource.get(&subresource));
        let Some(f) = found else {
            tracing::debug!(type_name = type_name::<T>(), %subresource, "no validation registered");
            return vec![Error::internal_error(
                &Path::root(),
                format!(
                    "no validation found for {}, subresource: {subresource}",
                    type_name::<T>()
                ),
            )];
        };
        tracing::debug!(
            type_name = type_name::<T>(),
            %subresource,
            update = op.is_update(),
            "dispatching validation"
        );
        f(op, obj, old.map(|o| o as &dyn Any))
    }
}

/// A registration step run when a [`Scheme`] is built.
pub type RegisterFunc = fn(&mut Scheme) -> Result<(), SetupError>;

/// Collects registration functions from several places and applies them
/// to a fresh [`Scheme`].
#[derive(Clone, Debug, Default)]
pub struct SchemeBuilder {
    funcs: Vec<RegisterFunc>,
}

impl SchemeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, f: RegisterFunc) -> Self {
        self.funcs.push(f);
        self
    }

    /// Apply every registration in order, stopping at the first error.
    pub fn build(&self) -> Result<Scheme, SetupError> {
        let mut scheme = Scheme::new();
        for f in &self.funcs {
            f(&mut scheme)?;
        }
        Ok(scheme)
    }
}

// ── Field validator chains ──────────────────────────────────────────

enum Mode {
    Normal,
    /// Errors are reported and stop the chain.
    ShortCircuit,
    /// Errors stop the chain but are not reported.
    Gate,
}

enum Condition {
    Always,
    OptionEnabled(String),
    OptionDisabled(String),
    Subresource(String),
}

impl Condition {
    fn holds(&self, op: &Operation) -> bool {
        match self {
            Condition::Always => true,
            Condition::OptionEnabled(option) => op.has_option(option),
            Condition::OptionDisabled(option) => !op.has_option(option),
            Condition::Subresource(path) => op.request.subresource_path() == *path,
        }
    }
}

struct Step<'a, T> {
    mode: Mode,
    condition: Condition,
    validator: Box<crate::ValidateFunc<'a, T>>,
}

/// The validators attached to one field, run in two phases.
///
/// Short-circuiting validators and gates run first. If any of them reports
/// an error, the chain stops there: short-circuit errors are returned and
/// gate errors are dropped. Otherwise the remaining validators all run and
/// their errors are concatenated in order.
///
/// On update a field whose value did not change is not validated at all.
pub struct Validations<'a, T> {
    steps: Vec<Step<'a, T>>,
}

impl<T> Default for Validations<'_, T> {
    fn default() -> Self {
        Validations { steps: Vec::new() }
    }
}

impl<'a, T> Validations<'a, T> {
    pub fn new() -> Self {
        Self::default()
    }

    fn step<F>(mut self, mode: Mode, condition: Condition, f: F) -> Self
    where
        F: Fn(&Operation, &Path, Option<&T>, Option<&T>) -> ErrorList + 'a,
    {
        self.steps.push(Step {
            mode,
            condition,
            validator: Box::new(f),
        });
        self
    }

    pub fn push<F>(self, f: F) -> Self
    where
        F: Fn(&Operation, &Path, Option<&T>, Option<&T>) -> ErrorList + 'a,
    {
        self.step(Mode::Normal, Condition::Always, f)
    }

    /// Run `f` before the others and stop if it reports anything.
    pub fn short_circuit<F>(self, f: F) -> Self
    where
        F: Fn(&Operation, &Path, Option<&T>, Option<&T>) -> ErrorList + 'a,
    {
        self.step(Mode::ShortCircuit, Condition::Always, f)
    }

    /// Run `f` before the others and stop silently if it reports anything.
    /// Used with the `optional_*` validators.
    pub fn gate<F>(self, f: F) -> Self
    where
        F: Fn(&Operation, &Path, Option<&T>, Option<&T>) -> ErrorList + 'a,
    {
        self.step(Mode::Gate, Condition::Always, f)
    }

    pub fn if_option_enabled<F>(self, option: &str, f: F) -> Self
    where
        F: Fn(&Operation, &Path, Option<&T>, Option<&T>) -> ErrorList + 'a,
    {
        self.step(Mode::Normal, Condition::OptionEnabled(option.to_string()), f)
    }

    pub fn if_option_disabled<F>(self, option: &str, f: F) -> Self
    where
        F: Fn(&Operation, &Path, Option<&T>, Option<&T>) -> ErrorList + 'a,
    {
        self.step(Mode::Normal, Condition::OptionDisabled(option.to_string()), f)
    }

    /// Run `f` only for requests on `subresource` (e.g. `"/status"`).
    pub fn for_subresource<F>(self, subresource: &str, f: F) -> Self
    where
        F: Fn(&Operation, &Path, Option<&T>, Option<&T>) -> ErrorList + 'a,
    {
        self.step(Mode::Normal, Condition::Subresource(subresource.to_string()), f)
    }

    pub fn validate(
        &self,
        op: &Operation,
        path: &Path,
        new: Option<&T>,
        old: Option<&T>,
    ) -> ErrorList
    where
        T: PartialEq,
    {
        if op.is_update() && new == old {
            return Vec::new();
        }

        let mut errs = Vec::new();
        let mut stop = false;
        for step in &self.steps {
            if matches!(step.mode, Mode::Normal) || !step.condition.holds(op) {
                continue;
            }
            let found = (step.validator)(op, path, new, old);
            if found.is_empty() {
                continue;
            }
            stop = true;
            if matches!(step.mode, Mode::ShortCircuit) {
                errs.extend(found);
            }
        }
        if stop {
            tracing::trace!(%path, "validation chain stopped early");
            return errs;
        }

        for step in &self.steps {
            if matches!(step.mode, Mode::Normal) && step.condition.holds(op) {
                errs.extend((step.validator)(op, path, new, old));
            }
        }
        errs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::ErrorType;
    use crate::immutable::immutable_value_by_compare;
    use crate::limits::{max_length, minimum, optional_value, required_value};

    #[derive(Debug, Default, PartialEq)]
    struct Widget {
        replicas: i32,
    }

    fn validate_widget(op: &Operation, obj: &Widget, old: Option<&Widget>) -> ErrorList {
        Validations::new()
            .push(|op, p, n, o| minimum(op, p, n, o, 0))
            .validate(op, &Path::new("replicas"), Some(&obj.replicas), old.map(|o| &o.replicas))
    }

    fn register_widget(scheme: &mut Scheme) -> Result<(), SetupError> {
        scheme.add_validation_func::<Widget, _>("/", validate_widget)?;
        scheme.add_validation_func::<Widget, _>("/status", |_, _, _| Vec::new())
    }

    #[test]
    fn test_scheme_dispatch() {
        let scheme = SchemeBuilder::new().register(register_widget).build().unwrap();
        assert!(scheme.is_registered::<Widget>());

        let errs = scheme.validate(&Operation::create(), &Widget { replicas: -1 });
        assert_eq!(errs.len(), 1);
        assert_eq!(errs[0].field, "replicas");

        let status = Operation::update().with_subresource("status");
        assert!(
            scheme
                .validate_update(&status, &Widget { replicas: -1 }, &Widget::default())
                .is_empty()
        );
    }

    #[test]
    fn test_scheme_missing_validation() {
        let scheme = SchemeBuilder::new().register(register_widget).build().unwrap();
        let scale = Operation::create().with_subresource("scale");
        let errs = scheme.validate(&scale, &Widget::default());
        assert_eq!(errs[0].error_type, ErrorType::Internal);
        assert!(errs[0].detail.starts_with("no validation found for "));
        assert!(errs[0].detail.ends_with("Widget, subresource: /scale"));

        let errs = scheme.validate(&Operation::create(), &42u8);
        assert_eq!(errs[0].detail, "no validation found for u8, subresource: /");
    }

    #[test]
    fn test_duplicate_registration() {
        let builder = SchemeBuilder::new().register(register_widget).register(register_widget);
        assert!(matches!(
            builder.build(),
            Err(SetupError::DuplicateRegistration { .. })
        ));
    }

    #[test]
    fn test_unchanged_field_skipped_on_update() {
        let chain = Validations::new().push(|op, p, n, o| minimum(op, p, n, o, 0));
        let p = Path::new("replicas");
        assert_eq!(chain.validate(&Operation::create(), &p, Some(&-1), None).len(), 1);
        assert!(chain.validate(&Operation::update(), &p, Some(&-1), Some(&-1)).is_empty());
        assert_eq!(chain.validate(&Operation::update(), &p, Some(&-1), Some(&-2)).len(), 1);
    }

    #[test]
    fn test_short_circuit_stops_chain() {
        let chain = Validations::new()
            .push(|op, p, n, o| max_length(op, p, n, o, 3))
            .short_circuit(required_value);
        let p = Path::new("name");

        let errs = chain.validate(&Operation::create(), &p, Some(&String::new()), None);
        assert_eq!(errs.len(), 1);
        assert_eq!(errs[0].error_type, ErrorType::Required);

        let errs = chain.validate(&Operation::create(), &p, Some(&"toolong".to_string()), None);
        assert_eq!(errs.len(), 1);
        assert_eq!(errs[0].error_type, ErrorType::TooLong);
    }

    #[test]
    fn test_gate_drops_errors() {
        let chain = Validations::new()
            .gate(optional_value)
            .push(|op, p, n, o| minimum(op, p, n, o, 1));
        let p = Path::new("port");
        assert!(chain.validate(&Operation::create(), &p, Some(&0), None).is_empty());
        assert_eq!(chain.validate(&Operation::create(), &p, Some(&-3), None).len(), 1);
    }

    #[test]
    fn test_option_and_subresource_conditions() {
        let chain = Validations::new()
            .if_option_enabled("StrictReplicas", |op, p, n, o| minimum(op, p, n, o, 1))
            .if_option_disabled("StrictReplicas", |op, p, n, o| minimum(op, p, n, o, 0))
            .for_subresource("/status", immutable_value_by_compare);
        let p = Path::new("replicas");

        assert!(chain.validate(&Operation::create(), &p, Some(&0), None).is_empty());
        let strict = Operation::create().with_option("StrictReplicas");
        assert_eq!(chain.validate(&strict, &p, Some(&0), None).len(), 1);

        let status = Operation::update().with_subresource("status");
        let errs = chain.validate(&status, &p, Some(&2), Some(&1));
        assert_eq!(errs.len(), 1);
        assert_eq!(errs[0].error_type, ErrorType::Forbidden);
        assert!(chain.validate(&Operation::update(), &p, Some(&2), Some(&1)).is_empty());
    }
}
