//! Well-known API types with their own dynamic representation.
//!
//! These wrap common scalar-like values that API objects embed as structs
//! (timestamps, durations, int-or-string unions, raw bytes). Their
//! [`Reflect`] impls advertise a [`WellKnown`] view, which every consumer
//! checks before falling back to structural dispatch.

use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

use base64::Engine;
use chrono::{DateTime, SecondsFormat, Utc};

use crate::reflect::{Kind, Reflect, WellKnown};

// ── Time ────────────────────────────────────────────────────────────

/// Seconds from `0001-01-01T00:00:00Z` to the Unix epoch.
const ZERO_TIME_UNIX_SECS: i64 = -62_135_596_800;

/// The zero timestamp, `0001-01-01T00:00:00Z`.
pub fn zero_time() -> DateTime<Utc> {
    DateTime::from_timestamp(ZERO_TIME_UNIX_SECS, 0).unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// A point in time, rendered as RFC 3339. The zero value is
/// `0001-01-01T00:00:00Z`, so the Unix epoch counts as set.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Time(pub DateTime<Utc>);

impl Default for Time {
    fn default() -> Self {
        Time(zero_time())
    }
}

impl Time {
    pub fn parse(s: &str) -> Result<Self, chrono::ParseError> {
        Ok(Time(DateTime::parse_from_rfc3339(s)?.with_timezone(&Utc)))
    }

    pub fn is_zero(&self) -> bool {
        self.0 == zero_time()
    }
}

impl fmt::Display for Time {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.to_rfc3339_opts(SecondsFormat::AutoSi, true))
    }
}

impl Reflect for Time {
    fn kind(&self) -> Kind<'_> {
        Kind::String(Cow::Owned(self.to_string()))
    }

    fn well_known(&self) -> Option<WellKnown<'_>> {
        Some(WellKnown::Timestamp(self.0))
    }
}

// ── Duration ────────────────────────────────────────────────────────

/// A span of time, written the way Go formats durations (`"1h30m0s"`).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Duration(pub chrono::Duration);

impl Duration {
    pub fn seconds(secs: i64) -> Self {
        Duration(chrono::Duration::seconds(secs))
    }
}

impl FromStr for Duration {
    type Err = DurationParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_go_duration(s)
            .map(Duration)
            .ok_or_else(|| DurationParseError(s.to_string()))
    }
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("invalid duration: {0:?}")]
pub struct DurationParseError(String);

impl fmt::Display for Duration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&format_go_duration(self.0))
    }
}

impl Reflect for Duration {
    fn kind(&self) -> Kind<'_> {
        Kind::String(Cow::Owned(self.to_string()))
    }

    fn well_known(&self) -> Option<WellKnown<'_>> {
        Some(WellKnown::Duration(self.0))
    }
}

/// Parse a Go-style duration string such as `"1h30m"`, `"500ms"` or `"-2s"`.
///
/// Units: `h`, `m`, `s`, `ms`, `us`, `ns`. The bare string `"0"` is zero.
pub fn parse_go_duration(input: &str) -> Option<chrono::Duration> {
    let (mut rest, negative) = match input.strip_prefix('-') {
        Some(r) => (r, true),
        None => (input.strip_prefix('+').unwrap_or(input), false),
    };
    if rest == "0" {
        return Some(chrono::Duration::zero());
    }
    if rest.is_empty() {
        return None;
    }

    let mut total_nanos: i64 = 0;
    while !rest.is_empty() {
        let num_end = rest.find(|c: char| !c.is_ascii_digit() && c != '.')?;
        if num_end == 0 {
            return None;
        }
        let value: f64 = rest[..num_end].parse().ok()?;
        rest = &rest[num_end..];

        let (unit_nanos, unit_len) = [
            ("ns", 1i64),
            ("us", 1_000),
            ("ms", 1_000_000),
            ("h", 3_600_000_000_000),
            ("m", 60_000_000_000),
            ("s", 1_000_000_000),
        ]
        .iter()
        .find(|(unit, _)| rest.starts_with(unit))
        .map(|(unit, nanos)| (*nanos, unit.len()))?;
        rest = &rest[unit_len..];

        total_nanos = total_nanos.checked_add((value * unit_nanos as f64).trunc() as i64)?;
    }

    if negative {
        total_nanos = -total_nanos;
    }
    Some(chrono::Duration::nanoseconds(total_nanos))
}

/// Inverse of [`parse_go_duration`], producing Go's canonical form.
pub fn format_go_duration(d: chrono::Duration) -> String {
    let Some(nanos) = d.num_nanoseconds() else {
        return format!("{}s", d.num_seconds());
    };
    if nanos == 0 {
        return "0s".into();
    }
    let sign = if nanos < 0 { "-" } else { "" };
    let abs = nanos.unsigned_abs();

    if abs < 1_000 {
        return format!("{sign}{abs}ns");
    }
    if abs < 1_000_000 {
        return format!("{sign}{}us", trim_fraction(abs, 1_000));
    }
    if abs < 1_000_000_000 {
        return format!("{sign}{}ms", trim_fraction(abs, 1_000_000));
    }

    let hours = abs / 3_600_000_000_000;
    let minutes = (abs / 60_000_000_000) % 60;
    let secs = trim_fraction(abs % 60_000_000_000, 1_000_000_000);
    let mut out = String::from(sign);
    if hours > 0 {
        out.push_str(&format!("{hours}h"));
    }
    if hours > 0 || minutes > 0 {
        out.push_str(&format!("{minutes}m"));
    }
    out.push_str(&format!("{secs}s"));
    out
}

fn trim_fraction(value: u64, unit: u64) -> String {
    let whole = value / unit;
    let frac = value % unit;
    if frac == 0 {
        return whole.to_string();
    }
    let width = unit.ilog10() as usize;
    let digits = format!("{frac:0width$}");
    format!("{whole}.{}", digits.trim_end_matches('0'))
}

// ── IntOrString ─────────────────────────────────────────────────────

/// A value that holds either an integer or a string, e.g. a port or a percentage.
#[derive(Clone, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(untagged)]
pub enum IntOrString {
    Int(i32),
    String(String),
}

impl Default for IntOrString {
    fn default() -> Self {
        IntOrString::Int(0)
    }
}

impl From<i32> for IntOrString {
    fn from(v: i32) -> Self {
        IntOrString::Int(v)
    }
}

impl From<&str> for IntOrString {
    fn from(v: &str) -> Self {
        IntOrString::String(v.to_string())
    }
}

impl fmt::Display for IntOrString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IntOrString::Int(i) => write!(f, "{i}"),
            IntOrString::String(s) => f.write_str(s),
        }
    }
}

impl Reflect for IntOrString {
    fn kind(&self) -> Kind<'_> {
        match self {
            IntOrString::Int(i) => Kind::Int(i64::from(*i)),
            IntOrString::String(s) => Kind::String(Cow::Borrowed(s)),
        }
    }

    fn well_known(&self) -> Option<WellKnown<'_>> {
        Some(WellKnown::IntOrString(self))
    }
}

// ── Bytes ───────────────────────────────────────────────────────────

/// Raw bytes. Serialized forms use standard base64.
///
/// A plain `Vec<u8>` reflects as a list of integers; wrap it in `Bytes` to
/// get byte-sequence semantics.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Bytes(pub Vec<u8>);

impl Bytes {
    pub fn to_base64(&self) -> String {
        base64::engine::general_purpose::STANDARD.encode(&self.0)
    }
}

impl From<&[u8]> for Bytes {
    fn from(b: &[u8]) -> Self {
        Bytes(b.to_vec())
    }
}

impl Reflect for Bytes {
    fn kind(&self) -> Kind<'_> {
        Kind::String(Cow::Owned(self.to_base64()))
    }

    fn well_known(&self) -> Option<WellKnown<'_>> {
        Some(WellKnown::Bytes(&self.0))
    }
}
