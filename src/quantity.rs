//! Resource quantities (`"500m"`, `"1.5Gi"`, `"2e3"`).
//!
//! [`Quantity`] is one of the well-known types the dynamic value adapter maps
//! directly. It reaches CEL as an opaque `kubernetes.Quantity` value, and
//! [`register`] installs the functions that operate on it.

use std::borrow::Cow;
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use cel::extractors::{Arguments, This};
use cel::objects::{Opaque, Value};
use cel::{Context, ExecutionError, ResolveResult};

use crate::reflect::{Kind, Reflect, WellKnown};

/// Errors produced when parsing or converting a quantity.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum QuantityError {
    #[error("empty quantity string")]
    Empty,
    #[error("invalid number in quantity {0:?}")]
    InvalidNumber(String),
    #[error("unknown quantity suffix {0:?}")]
    UnknownSuffix(String),
    #[error("quantity {0:?} is out of range")]
    Overflow(String),
    #[error("quantity is not an integer")]
    NotInteger,
}

/// Largest decimal exponent, in either direction, a quantity may carry.
const MAX_SCALE: i32 = 1024;

/// Exponents beyond this are rendered as `<mantissa>e<scale>`.
const MAX_PLAIN_DIGITS: u32 = 18;

/// An exact decimal amount stored as `mantissa * 10^scale`.
///
/// Binary suffixes are folded into the mantissa at parse time, so `1Ki` and
/// `1024` are the same value. The scale always stays within `±MAX_SCALE`.
#[derive(Clone, Debug, Default)]
pub struct Quantity {
    mantissa: i128,
    scale: i32,
}

impl Quantity {
    fn new(mantissa: i128, scale: i32) -> Result<Self, QuantityError> {
        let q = Quantity { mantissa, scale }.normalized();
        if q.scale.unsigned_abs() > MAX_SCALE.unsigned_abs() {
            return Err(QuantityError::Overflow(format!("{mantissa}e{scale}")));
        }
        Ok(q)
    }

    pub fn from_int(value: i64) -> Self {
        Quantity { mantissa: i128::from(value), scale: 0 }.normalized()
    }

    fn from_uint(value: u64) -> Self {
        Quantity { mantissa: i128::from(value), scale: 0 }.normalized()
    }

    fn normalized(mut self) -> Self {
        if self.mantissa == 0 {
            self.scale = 0;
            return self;
        }
        while self.mantissa % 10 == 0 {
            self.mantissa /= 10;
            self.scale = self.scale.saturating_add(1);
        }
        self
    }

    pub fn is_zero(&self) -> bool {
        self.mantissa == 0
    }

    pub fn sign(&self) -> i64 {
        match self.mantissa.cmp(&0) {
            Ordering::Less => -1,
            Ordering::Equal => 0,
            Ordering::Greater => 1,
        }
    }

    pub fn is_integer(&self) -> bool {
        self.scale >= 0
    }

    pub fn as_integer(&self) -> Result<i64, QuantityError> {
        if self.scale < 0 {
            return Err(QuantityError::NotInteger);
        }
        let overflow = || QuantityError::Overflow(self.to_string());
        let factor = 10i128.checked_pow(self.scale as u32).ok_or_else(overflow)?;
        let value = self.mantissa.checked_mul(factor).ok_or_else(overflow)?;
        i64::try_from(value).map_err(|_| overflow())
    }

    pub fn as_approximate_float(&self) -> f64 {
        self.mantissa as f64 * 10f64.powi(self.scale)
    }

    /// The exact sum, or [`QuantityError::Overflow`] when it needs more
    /// precision than a quantity holds.
    pub fn add(&self, other: &Quantity) -> Result<Quantity, QuantityError> {
        let overflow = || QuantityError::Overflow(format!("{self} + {other}"));
        let (a, b, scale) = aligned(self, other).ok_or_else(overflow)?;
        Quantity::new(a.checked_add(b).ok_or_else(overflow)?, scale)
    }

    pub fn sub(&self, other: &Quantity) -> Result<Quantity, QuantityError> {
        let overflow = || QuantityError::Overflow(format!("{self} - {other}"));
        let (a, b, scale) = aligned(self, other).ok_or_else(overflow)?;
        Quantity::new(a.checked_sub(b).ok_or_else(overflow)?, scale)
    }
}

/// Both mantissas rescaled to the smaller exponent, if they fit.
fn aligned(a: &Quantity, b: &Quantity) -> Option<(i128, i128, i32)> {
    let scale = a.scale.min(b.scale);
    let rescale = |q: &Quantity| {
        let exp = u32::try_from(q.scale.checked_sub(scale)?).ok()?;
        10i128.checked_pow(exp)?.checked_mul(q.mantissa)
    };
    Some((rescale(a)?, rescale(b)?, scale))
}

impl PartialEq for Quantity {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Quantity {}

impl Ord for Quantity {
    fn cmp(&self, other: &Self) -> Ordering {
        match self.sign().cmp(&other.sign()) {
            Ordering::Equal => {}
            ord => return ord,
        }
        match aligned(self, other) {
            Some((a, b, _)) => a.cmp(&b),
            // Same sign, and the side with the larger scale no longer fits
            // once rescaled, so it has the larger magnitude.
            None if self.mantissa < 0 => other.scale.cmp(&self.scale),
            None => self.scale.cmp(&other.scale),
        }
    }
}

impl PartialOrd for Quantity {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.scale.unsigned_abs() > MAX_PLAIN_DIGITS {
            return write!(f, "{}e{}", self.mantissa, self.scale);
        }
        if self.scale >= 0 {
            return write!(f, "{}{}", self.mantissa, "0".repeat(self.scale.unsigned_abs() as usize));
        }
        let places = self.scale.unsigned_abs() as usize;
        let sign = if self.mantissa < 0 { "-" } else { "" };
        let digits = self.mantissa.unsigned_abs().to_string();
        if digits.len() <= places {
            write!(f, "{sign}0.{}{digits}", "0".repeat(places - digits.len()))
        } else {
            let (int, frac) = digits.split_at(digits.len() - places);
            write!(f, "{sign}{int}.{frac}")
        }
    }
}

impl FromStr for Quantity {
    type Err = QuantityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_quantity(s)
    }
}

impl Opaque for Quantity {
    fn runtime_type_name(&self) -> &str {
        "kubernetes.Quantity"
    }
}

impl Reflect for Quantity {
    fn kind(&self) -> Kind<'_> {
        Kind::String(Cow::Owned(self.to_string()))
    }

    fn well_known(&self) -> Option<WellKnown<'_>> {
        Some(WellKnown::Quantity(self))
    }
}

// ── Parsing ─────────────────────────────────────────────────────────

/// Parse a quantity: an optionally signed decimal, then either a decimal
/// exponent (`e3`), an SI suffix (`m`, `k`, `G`, ...) or a binary suffix
/// (`Ki`, `Mi`, ...).
pub fn parse_quantity(input: &str) -> Result<Quantity, QuantityError> {
    let s = input.trim();
    if s.is_empty() {
        return Err(QuantityError::Empty);
    }

    let split = s
        .char_indices()
        .find(|&(i, c)| !(c.is_ascii_digit() || c == '.' || (i == 0 && (c == '-' || c == '+'))))
        .map_or(s.len(), |(i, _)| i);
    let (number, suffix) = s.split_at(split);
    let (mantissa, shift) =
        parse_decimal(number).ok_or_else(|| QuantityError::InvalidNumber(input.into()))?;

    let overflow = || QuantityError::Overflow(input.into());
    let (mantissa, scale) = match parse_suffix(suffix)? {
        Suffix::Decimal(exp) => (mantissa, shift.checked_add(exp).ok_or_else(overflow)?),
        Suffix::Binary(multiplier) => {
            (mantissa.checked_mul(multiplier).ok_or_else(overflow)?, shift)
        }
    };
    Quantity::new(mantissa, scale).map_err(|_| overflow())
}

/// `"1.25"` -> `(125, -2)`.
fn parse_decimal(s: &str) -> Option<(i128, i32)> {
    let (int, frac) = s.split_once('.').unwrap_or((s, ""));
    let unsigned = int.trim_start_matches(['-', '+']);
    if unsigned.is_empty() && frac.is_empty() {
        return None;
    }
    if frac.contains(['-', '+']) {
        return None;
    }
    let mantissa: i128 = format!("{int}{frac}").parse().ok()?;
    Some((mantissa, -i32::try_from(frac.len()).ok()?))
}

enum Suffix {
    Decimal(i32),
    Binary(i128),
}

fn parse_suffix(suffix: &str) -> Result<Suffix, QuantityError> {
    let decimal = |exp| Ok(Suffix::Decimal(exp));
    match suffix {
        "" => decimal(0),
        "n" => decimal(-9),
        "u" => decimal(-6),
        "m" => decimal(-3),
        "k" => decimal(3),
        "M" => decimal(6),
        "G" => decimal(9),
        "T" => decimal(12),
        "P" => decimal(15),
        "E" => decimal(18),
        "Ki" => Ok(Suffix::Binary(1 << 10)),
        "Mi" => Ok(Suffix::Binary(1 << 20)),
        "Gi" => Ok(Suffix::Binary(1 << 30)),
        "Ti" => Ok(Suffix::Binary(1 << 40)),
        "Pi" => Ok(Suffix::Binary(1 << 50)),
        "Ei" => Ok(Suffix::Binary(1 << 60)),
        other => {
            let exp = other
                .strip_prefix(['e', 'E'])
                .and_then(|e| e.parse::<i32>().ok())
                .ok_or_else(|| QuantityError::UnknownSuffix(other.into()))?;
            decimal(exp)
        }
    }
}

// ── CEL functions ───────────────────────────────────────────────────

/// Register the quantity functions into a CEL context.
pub fn register(ctx: &mut Context<'_>) {
    ctx.add_function("quantity", cel_quantity);
    ctx.add_function("isQuantity", cel_is_quantity);
    ctx.add_function("isInteger", cel_is_integer);
    ctx.add_function("asInteger", cel_as_integer);
    ctx.add_function("asApproximateFloat", cel_as_approximate_float);
    ctx.add_function("sign", cel_sign);
    ctx.add_function("add", cel_add);
    ctx.add_function("sub", cel_sub);
    ctx.add_function("isGreaterThan", cel_is_greater_than);
    ctx.add_function("isLessThan", cel_is_less_than);
    ctx.add_function("compareTo", cel_compare_to);
}

fn as_quantity<'v>(val: &'v Value, func: &str) -> Result<&'v Quantity, ExecutionError> {
    let quantity = match val {
        Value::Opaque(o) => o.downcast_ref::<Quantity>(),
        _ => None,
    };
    quantity.ok_or_else(|| ExecutionError::function_error(func, "expected Quantity"))
}

fn quantity_or_int(val: &Value, func: &str) -> Result<Quantity, ExecutionError> {
    match val {
        Value::Int(n) => Ok(Quantity::from_int(*n)),
        Value::UInt(n) => Ok(Quantity::from_uint(*n)),
        other => as_quantity(other, func).cloned(),
    }
}

fn cel_quantity(s: Arc<String>) -> ResolveResult {
    let q = parse_quantity(&s)
        .map_err(|e| ExecutionError::function_error("quantity", e.to_string()))?;
    Ok(Value::Opaque(Arc::new(q)))
}

fn cel_is_quantity(s: Arc<String>) -> ResolveResult {
    Ok(Value::Bool(parse_quantity(&s).is_ok()))
}

fn cel_is_integer(This(this): This<Value>) -> ResolveResult {
    Ok(Value::Bool(as_quantity(&this, "isInteger")?.is_integer()))
}

fn cel_as_integer(This(this): This<Value>) -> ResolveResult {
    let n = as_quantity(&this, "asInteger")?
        .as_integer()
        .map_err(|e| ExecutionError::function_error("asInteger", e.to_string()))?;
    Ok(Value::Int(n))
}

fn cel_as_approximate_float(This(this): This<Value>) -> ResolveResult {
    Ok(Value::Float(as_quantity(&this, "asApproximateFloat")?.as_approximate_float()))
}

fn cel_sign(This(this): This<Value>) -> ResolveResult {
    Ok(Value::Int(as_quantity(&this, "sign")?.sign()))
}

fn binary_arg<'a>(args: &'a [Value], func: &str) -> Result<&'a Value, ExecutionError> {
    args.first()
        .ok_or_else(|| ExecutionError::function_error(func, "missing argument"))
}

fn cel_add(This(this): This<Value>, Arguments(args): Arguments) -> ResolveResult {
    let q = as_quantity(&this, "add")?;
    let other = quantity_or_int(binary_arg(&args, "add")?, "add")?;
    let sum = q.add(&other).map_err(|e| ExecutionError::function_error("add", e.to_string()))?;
    Ok(Value::Opaque(Arc::new(sum)))
}

fn cel_sub(This(this): This<Value>, Arguments(args): Arguments) -> ResolveResult {
    let q = as_quantity(&this, "sub")?;
    let other = quantity_or_int(binary_arg(&args, "sub")?, "sub")?;
    let diff = q.sub(&other).map_err(|e| ExecutionError::function_error("sub", e.to_string()))?;
    Ok(Value::Opaque(Arc::new(diff)))
}

fn cel_is_greater_than(This(this): This<Value>, other: Value) -> ResolveResult {
    Ok(Value::Bool(as_quantity(&this, "isGreaterThan")? > as_quantity(&other, "isGreaterThan")?))
}

fn cel_is_less_than(This(this): This<Value>, other: Value) -> ResolveResult {
    Ok(Value::Bool(as_quantity(&this, "isLessThan")? < as_quantity(&other, "isLessThan")?))
}

fn cel_compare_to(This(this): This<Value>, other: Value) -> ResolveResult {
    let ord = as_quantity(&this, "compareTo")?.cmp(as_quantity(&other, "compareTo")?);
    Ok(Value::Int(ord as i64))
}
