//! Identifier formats: short names (DNS labels), long names (DNS
//! subdomains) and generated-name prefixes.

use std::sync::LazyLock;

use regex::Regex;

use crate::ValidateFunc;
use crate::error::SetupError;
use crate::field::{Error, ErrorList, Path};
use crate::operation::Operation;

pub const DNS1123_LABEL_MAX_LENGTH: usize = 63;
pub const DNS1123_SUBDOMAIN_MAX_LENGTH: usize = 253;

/// Message for negative values of fields that must be non-negative.
pub const IS_NEGATIVE_ERROR_MSG: &str = "must be greater than or equal to 0";

const DNS1123_LABEL_FMT: &str = "[a-z0-9]([-a-z0-9]*[a-z0-9])?";
const DNS1123_LABEL_ERROR_MSG: &str = "a lowercase RFC 1123 label must consist of lower case \
    alphanumeric characters or '-', and must start and end with an alphanumeric character";
const DNS1123_SUBDOMAIN_FMT: &str =
    r"[a-z0-9]([-a-z0-9]*[a-z0-9])?(\.[a-z0-9]([-a-z0-9]*[a-z0-9])?)*";
const DNS1123_SUBDOMAIN_ERROR_MSG: &str = "a lowercase RFC 1123 subdomain must consist of lower \
    case alphanumeric characters, '-' or '.', and must start and end with an alphanumeric \
    character";

static DNS1123_LABEL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&format!("^{DNS1123_LABEL_FMT}$")).expect("label regex is valid"));
static DNS1123_SUBDOMAIN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!("^{DNS1123_SUBDOMAIN_FMT}$")).expect("subdomain regex is valid")
});
static FORMAT_CALL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([^(]+)\(([^)]*)\)$").expect("format call regex is valid"));

fn max_len_error(length: usize) -> String {
    format!("must be no more than {length} characters")
}

fn regex_error(msg: &str, fmt: &str, examples: &[&str]) -> String {
    if examples.is_empty() {
        return format!("{msg} (regex used for validation is '{fmt}')");
    }
    let examples: Vec<String> = examples.iter().map(|e| format!("'{e}', ")).collect();
    format!(
        "{msg} (e.g. {}regex used for validation is '{fmt}')",
        examples.join("or ")
    )
}

/// Problems with `value` as an RFC 1123 label; empty when valid.
pub fn is_dns1123_label(value: &str) -> Vec<String> {
    let mut errs = Vec::new();
    if value.len() > DNS1123_LABEL_MAX_LENGTH {
        errs.push(max_len_error(DNS1123_LABEL_MAX_LENGTH));
    }
    if !DNS1123_LABEL.is_match(value) {
        errs.push(regex_error(DNS1123_LABEL_ERROR_MSG, DNS1123_LABEL_FMT, &["my-name", "123-abc"]));
    }
    errs
}

/// Problems with `value` as an RFC 1123 subdomain; empty when valid.
///
/// Only the total length is bounded. A single label may be as long as the
/// whole name, which older objects rely on.
pub fn is_dns1123_subdomain(value: &str) -> Vec<String> {
    let mut errs = Vec::new();
    if value.len() > DNS1123_SUBDOMAIN_MAX_LENGTH {
        errs.push(max_len_error(DNS1123_SUBDOMAIN_MAX_LENGTH));
    }
    if !DNS1123_SUBDOMAIN.is_match(value) {
        errs.push(regex_error(
            DNS1123_SUBDOMAIN_ERROR_MSG,
            DNS1123_SUBDOMAIN_FMT,
            &["example.com"],
        ));
    }
    errs
}

fn format_errors(path: &Path, value: &str, problems: Vec<String>, origin: &str) -> ErrorList {
    problems
        .into_iter()
        .map(|msg| Error::invalid(path, value, msg).with_origin(origin))
        .collect()
}

/// A DNS label: at most 63 lowercase alphanumerics or interior dashes.
pub fn short_name<S: AsRef<str>>(
    _op: &Operation,
    path: &Path,
    value: Option<&S>,
    _old: Option<&S>,
) -> ErrorList {
    let Some(value) = value.map(AsRef::as_ref) else {
        return Vec::new();
    };
    format_errors(path, value, is_dns1123_label(value), "format=k8s-short-name")
}

/// A DNS subdomain: dot-separated labels, at most 253 characters in total.
pub fn long_name<S: AsRef<str>>(
    _op: &Operation,
    path: &Path,
    value: Option<&S>,
    _old: Option<&S>,
) -> ErrorList {
    let Some(value) = value.map(AsRef::as_ref) else {
        return Vec::new();
    };
    format_errors(path, value, is_dns1123_subdomain(value), "format=k8s-long-name")
}

/// Replace a trailing dash with a character that is valid at the end of a name.
///
/// Used on prefixes to which a random suffix will be appended. Note that
/// the last *two* characters are replaced by one.
pub fn mask_trailing_dash(name: &str) -> String {
    if name.len() > 1
        && let Some(stem) = name.strip_suffix('-')
    {
        let mut chars = stem.chars();
        chars.next_back();
        return format!("{}x", chars.as_str());
    }
    name.to_string()
}

/// Check a name prefix by masking its trailing dash and handing the result
/// to `validator`, which always runs exactly once.
pub fn generate_name(
    op: &Operation,
    path: &Path,
    value: Option<&String>,
    old: Option<&String>,
    validator: &ValidateFunc<'_, String>,
) -> ErrorList {
    let masked = value.map(|v| mask_trailing_dash(v));
    validator(op, path, masked.as_ref(), old)
}

/// A named string format.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Format {
    ShortName,
    LongName,
    /// A generated-name prefix checked against the inner format.
    GenerateName(Box<Format>),
}

impl Format {
    /// Parse a format name such as `k8s-long-name` or
    /// `generate-name(k8s-short-name)`.
    pub fn parse(text: &str) -> Result<Format, SetupError> {
        let text = text.trim();
        if let Some(call) = FORMAT_CALL.captures(text) {
            let (name, arg) = (&call[1], &call[2]);
            return match name.trim() {
                "generate-name" => Ok(Format::GenerateName(Box::new(Format::parse(arg)?))),
                _ => Err(SetupError::UnknownFormat(text.to_string())),
            };
        }
        match text {
            "k8s-short-name" => Ok(Format::ShortName),
            "k8s-long-name" => Ok(Format::LongName),
            _ => Err(SetupError::UnknownFormat(text.to_string())),
        }
    }

    pub fn validate(
        &self,
        op: &Operation,
        path: &Path,
        value: Option<&String>,
        old: Option<&String>,
    ) -> ErrorList {
        match self {
            Format::ShortName => short_name(op, path, value, old),
            Format::LongName => long_name(op, path, value, old),
            Format::GenerateName(inner) => {
                generate_name(op, path, value, old, &|op, path, value, old| {
                    inner.validate(op, path, value, old)
                })
            }
        }
    }
}

// ── Imperative helpers ──────────────────────────────────────────────

/// Problems with `name` as a DNS subdomain. With `prefix`, the name is a
/// generated-name prefix and may end in a dash.
pub fn name_is_dns_subdomain(name: &str, prefix: bool) -> Vec<String> {
    if prefix {
        return is_dns1123_subdomain(&mask_trailing_dash(name));
    }
    is_dns1123_subdomain(name)
}

/// Problems with `name` as a DNS label. See [`name_is_dns_subdomain`].
pub fn name_is_dns_label(name: &str, prefix: bool) -> Vec<String> {
    if prefix {
        return is_dns1123_label(&mask_trailing_dash(name));
    }
    is_dns1123_label(name)
}

/// The long-name check for hand-written validation, with errors marked as
/// also reported by the declarative rule.
pub fn validate_name_as_long_name(path: &Path, name: &str, prefix: bool) -> ErrorList {
    let name = if prefix { mask_trailing_dash(name) } else { name.to_string() };
    long_name(&Operation::default(), path, Some(&name), None)
        .into_iter()
        .map(Error::mark_covered_by_declarative)
        .collect()
}

pub fn validate_nonnegative_field(value: i64, path: &Path) -> ErrorList {
    if value < 0 {
        return vec![Error::invalid(path, value, IS_NEGATIVE_ERROR_MSG).with_origin("minimum")];
    }
    Vec::new()
}
