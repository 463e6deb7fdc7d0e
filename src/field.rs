//! Field paths and field-level validation errors.
//!
//! Every validator in this crate reports problems as [`Error`] values collected
//! into an [`ErrorList`]. An error names the offending location with a
//! [`Path`], which is built by deriving child paths from a parent (paths are
//! never mutated in place).

use std::fmt;

use serde::{Deserialize, Serialize};

/// An ordered list of field errors, in traversal order.
pub type ErrorList = Vec<Error>;

// ── Path ────────────────────────────────────────────────────────────

/// One step of a [`Path`].
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Segment {
    /// A struct field, by its serialized name.
    Field(String),
    /// A position in a list.
    Index(usize),
    /// An entry in a map, by key.
    Key(String),
    /// An element of a list-as-map, by its key fields.
    KeyValues(Vec<(String, String)>),
}

/// The logical location of a value inside an object graph.
///
/// ```rust
/// use kube_validate::field::Path;
///
/// let p = Path::new("spec").child("containers").index(2).child("image");
/// assert_eq!(p.to_string(), "spec.containers[2].image");
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Path {
    segments: Vec<Segment>,
}

impl Path {
    /// The empty path, for errors about the whole object.
    pub fn root() -> Self {
        Path::default()
    }

    /// A path with a single field segment.
    pub fn new(name: impl Into<String>) -> Self {
        Path::root().child(name)
    }

    pub fn child(&self, name: impl Into<String>) -> Path {
        self.with(Segment::Field(name.into()))
    }

    pub fn index(&self, index: usize) -> Path {
        self.with(Segment::Index(index))
    }

    pub fn key(&self, key: impl Into<String>) -> Path {
        self.with(Segment::Key(key.into()))
    }

    /// Address a list-as-map element by one or more `key=value` pairs.
    pub fn key_values<K, V>(&self, pairs: impl IntoIterator<Item = (K, V)>) -> Path
    where
        K: Into<String>,
        V: Into<String>,
    {
        let pairs = pairs
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        self.with(Segment::KeyValues(pairs))
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    fn with(&self, segment: Segment) -> Path {
        let mut segments = Vec::with_capacity(self.segments.len() + 1);
        segments.extend_from_slice(&self.segments);
        segments.push(segment);
        Path { segments }
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            match segment {
                Segment::Field(name) => {
                    if i > 0 {
                        f.write_str(".")?;
                    }
                    f.write_str(name)?;
                }
                Segment::Index(idx) => write!(f, "[{idx}]")?,
                Segment::Key(key) => write!(f, "[{key}]")?,
                Segment::KeyValues(pairs) => {
                    f.write_str("[")?;
                    for (j, (k, v)) in pairs.iter().enumerate() {
                        if j > 0 {
                            f.write_str(",")?;
                        }
                        write!(f, "{k}={v}")?;
                    }
                    f.write_str("]")?;
                }
            }
        }
        Ok(())
    }
}

// ── Error ───────────────────────────────────────────────────────────

/// The class of a field error.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum ErrorType {
    NotFound,
    Required,
    Duplicate,
    Invalid,
    NotSupported,
    Forbidden,
    TooLong,
    TooMany,
    /// A programming or configuration bug, not a data problem.
    Internal,
}

impl ErrorType {
    /// The human-readable form used when rendering an [`Error`].
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorType::NotFound => "Not found",
            ErrorType::Required => "Required value",
            ErrorType::Duplicate => "Duplicate value",
            ErrorType::Invalid => "Invalid value",
            ErrorType::NotSupported => "Unsupported value",
            ErrorType::Forbidden => "Forbidden",
            ErrorType::TooLong => "Too long",
            ErrorType::TooMany => "Too many",
            ErrorType::Internal => "Internal error",
        }
    }

    /// Whether the rendered error includes the offending value.
    fn shows_value(&self) -> bool {
        !matches!(
            self,
            ErrorType::Required | ErrorType::Forbidden | ErrorType::TooLong | ErrorType::Internal
        )
    }
}

impl fmt::Display for ErrorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single validation failure.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Error {
    #[serde(rename = "type")]
    pub error_type: ErrorType,
    /// Rendered [`Path`] of the offending field.
    pub field: String,
    /// The offending value, `None` when omitted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bad_value: Option<serde_json::Value>,
    #[serde(default)]
    pub detail: String,
    /// Identifies the rule that produced the error, e.g. `minimum`.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub origin: String,
    /// Set on hand-written errors that a declarative rule also reports.
    #[serde(default)]
    pub covered_by_declarative: bool,
}

fn to_bad_value(value: impl Serialize) -> Option<serde_json::Value> {
    serde_json::to_value(value).ok()
}

impl Error {
    fn new(
        error_type: ErrorType,
        path: &Path,
        bad_value: Option<serde_json::Value>,
        detail: impl Into<String>,
    ) -> Self {
        Error {
            error_type,
            field: path.to_string(),
            bad_value,
            detail: detail.into(),
            origin: String::new(),
            covered_by_declarative: false,
        }
    }

    pub fn not_found(path: &Path, value: impl Serialize) -> Self {
        Error::new(ErrorType::NotFound, path, to_bad_value(value), "")
    }

    pub fn required(path: &Path, detail: impl Into<String>) -> Self {
        Error::new(ErrorType::Required, path, None, detail)
    }

    pub fn duplicate(path: &Path, value: impl Serialize) -> Self {
        Error::new(ErrorType::Duplicate, path, to_bad_value(value), "")
    }

    pub fn invalid(path: &Path, value: impl Serialize, detail: impl Into<String>) -> Self {
        Error::new(ErrorType::Invalid, path, to_bad_value(value), detail)
    }

    /// A value outside an explicit allowed set. The detail lists the set.
    pub fn not_supported<S: AsRef<str>>(path: &Path, value: impl Serialize, valid: &[S]) -> Self {
        let detail = if valid.is_empty() {
            String::new()
        } else {
            let quoted: Vec<String> = valid.iter().map(|v| format!("{:?}", v.as_ref())).collect();
            format!("supported values: {}", quoted.join(", "))
        };
        Error::new(ErrorType::NotSupported, path, to_bad_value(value), detail)
    }

    pub fn forbidden(path: &Path, detail: impl Into<String>) -> Self {
        Error::new(ErrorType::Forbidden, path, None, detail)
    }

    pub fn too_long(path: &Path, value: impl Serialize, max_length: usize) -> Self {
        let detail = format!("may not be more than {max_length} bytes");
        Error::new(ErrorType::TooLong, path, to_bad_value(value), detail)
    }

    pub fn too_many(path: &Path, actual: usize, max: usize) -> Self {
        let detail = format!("must have at most {max} items");
        Error::new(ErrorType::TooMany, path, to_bad_value(actual), detail)
    }

    pub fn internal_error(path: &Path, err: impl fmt::Display) -> Self {
        Error::new(ErrorType::Internal, path, None, err.to_string())
    }

    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = origin.into();
        self
    }

    pub fn mark_covered_by_declarative(mut self) -> Self {
        self.covered_by_declarative = true;
        self
    }

    /// Drop the offending value, e.g. when it is too large or sensitive to echo.
    pub fn omit_value(mut self) -> Self {
        self.bad_value = None;
        self
    }

    /// The message without the field prefix.
    pub fn body(&self) -> String {
        let mut s = self.error_type.as_str().to_string();
        if self.error_type.shows_value() {
            match &self.bad_value {
                Some(serde_json::Value::String(v)) => s.push_str(&format!(": {v:?}")),
                Some(v) => s.push_str(&format!(": {v}")),
                None => {}
            }
        }
        if !self.detail.is_empty() {
            s.push_str(": ");
            s.push_str(&self.detail);
        }
        s
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.field.is_empty() {
            f.write_str(&self.body())
        } else {
            write!(f, "{}: {}", self.field, self.body())
        }
    }
}

impl std::error::Error for Error {}

/// Set the origin on every error in a list.
pub fn with_origin(errs: ErrorList, origin: &str) -> ErrorList {
    errs.into_iter().map(|e| e.with_origin(origin)).collect()
}

// ── Matching ────────────────────────────────────────────────────────

/// Compares errors on a chosen subset of their attributes.
///
/// Used to check that hand-written and declarative validation report the
/// same errors regardless of order or wording.
#[derive(Clone, Copy, Debug, Default)]
pub struct ErrorMatcher {
    by_type: bool,
    by_field: bool,
    by_value: bool,
    by_origin: bool,
    by_detail: bool,
}

impl ErrorMatcher {
    pub fn new() -> Self {
        ErrorMatcher::default()
    }

    pub fn by_type(mut self) -> Self {
        self.by_type = true;
        self
    }

    pub fn by_field(mut self) -> Self {
        self.by_field = true;
        self
    }

    pub fn by_value(mut self) -> Self {
        self.by_value = true;
        self
    }

    pub fn by_origin(mut self) -> Self {
        self.by_origin = true;
        self
    }

    pub fn by_detail_exact(mut self) -> Self {
        self.by_detail = true;
        self
    }

    pub fn matches(&self, want: &Error, got: &Error) -> bool {
        (!self.by_type || want.error_type == got.error_type)
            && (!self.by_field || want.field == got.field)
            && (!self.by_value || want.bad_value == got.bad_value)
            && (!self.by_origin || want.origin == got.origin)
            && (!self.by_detail || want.detail == got.detail)
    }

    /// Pair every wanted error with a distinct actual error, ignoring order.
    ///
    /// Returns a description of the unmatched errors on failure.
    pub fn test(&self, want: &[Error], got: &[Error]) -> Result<(), String> {
        let mut remaining: Vec<&Error> = got.iter().collect();
        let mut missing = Vec::new();
        for w in want {
            match remaining.iter().position(|g| self.matches(w, g)) {
                Some(pos) => {
                    remaining.remove(pos);
                }
                None => missing.push(w.to_string()),
            }
        }
        if missing.is_empty() && remaining.is_empty() {
            return Ok(());
        }
        let unexpected: Vec<String> = remaining.iter().map(|e| e.to_string()).collect();
        Err(format!(
            "missing errors: [{}]; unexpected errors: [{}]",
            missing.join("; "),
            unexpected.join("; ")
        ))
    }
}
