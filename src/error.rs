/// Errors in how validation is wired up, as opposed to problems with the
/// data being validated. These surface when validators are built or
/// registered, never from a validation call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SetupError {
    #[error("type {type_name} has no field with serialized name {field:?}")]
    UnknownField { type_name: &'static str, field: String },

    #[error("key field {field:?} of {type_name} must be a string, got {kind}")]
    NonStringKey {
        type_name: &'static str,
        field: String,
        kind: &'static str,
    },

    #[error("validation for {type_name} is already registered")]
    DuplicateRegistration { type_name: &'static str },

    #[error("unknown format {0:?}")]
    UnknownFormat(String),
}
