//! Declarative validation for Kubernetes-style API objects.
//!
//! Validators are plain functions with a common shape: they take the
//! [`Operation`](operation::Operation) being performed, the [`Path`](field::Path)
//! of the value, the new value and, on update, the corresponding old value,
//! and return every problem found as a [`field::ErrorList`].
//!
//! ```rust
//! use kube_validate::each::each_slice_val;
//! use kube_validate::field::Path;
//! use kube_validate::limits::minimum;
//! use kube_validate::operation::Operation;
//!
//! let ports = vec![80, -1, 443];
//! let errs = each_slice_val(
//!     &Operation::create(),
//!     &Path::new("spec").child("ports"),
//!     &ports,
//!     &[],
//!     None,
//!     None,
//!     &|op, path, new, old| minimum(op, path, new, old, 0),
//! );
//! assert_eq!(errs.len(), 1);
//! assert_eq!(
//!     errs[0].to_string(),
//!     "spec.ports[1]: Invalid value: -1: must be greater than or equal to 0"
//! );
//! ```
//!
//! Collections are walked by [`each`], with unchanged elements skipped on
//! update. [`immutable`] restricts how values may change, [`listmap`] and
//! [`subfield`] descend into keyed list elements and struct fields, and
//! [`scheme`] ties per-type validation together.

pub mod each;
pub mod equality;
pub mod error;
pub mod field;
pub mod immutable;
pub mod limits;
pub mod listmap;
pub mod operation;
pub mod quantity;
pub mod reflect;
pub mod scheme;
pub mod subfield;
pub mod union;
pub mod unique;
pub mod wellknown;

#[cfg(feature = "names")]
pub mod names;

#[cfg(feature = "values")]
pub mod values;

pub use error::SetupError;
pub use field::{Error, ErrorList, Path};
pub use operation::Operation;

/// A validator for one value of type `T`.
///
/// `new` is `None` when the value is absent. `old` is the corresponding
/// previous value on update, or `None` when there is none.
pub type ValidateFunc<'a, T> =
    dyn Fn(&operation::Operation, &field::Path, Option<&T>, Option<&T>) -> field::ErrorList + 'a;

/// Register the CEL functions for the well-known types into a context.
pub fn register_all(ctx: &mut cel::Context<'_>) {
    quantity::register(ctx);
}
