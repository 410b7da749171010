//! Exact decimal arithmetic for prices, amounts and fees.
//!
//! Exchanges send numbers with up to 18 significant decimals, often as strings and
//! sometimes in scientific notation. [`Precise`] keeps them as a sign, a decimal
//! digit vector and a scale, so no value ever passes through binary floating point.
//!
//! ```rust
//! use exchange_api_core::precise::{string_add, parse_precision};
//!
//! assert_eq!(string_add("0.1", "0.2").unwrap(), "0.3");
//! assert_eq!(parse_precision("0.00001").unwrap(), "0.00001");
//! assert_eq!(parse_precision("8").unwrap(), "0.00000001");
//! ```

use std::cmp::Ordering;
use std::fmt;
use std::ops::{Add, Mul, Neg, Sub};
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Default number of decimal places kept by [`Precise::div`].
pub const DEFAULT_DIV_PRECISION: u32 = 18;

/// Exponents beyond this are rejected to bound digit-vector growth.
const MAX_EXPONENT: i64 = 4096;

/// Failure to build or combine [`Precise`] values.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PreciseError {
    /// The input was not a numeric-looking string.
    #[error("invalid number: {0:?}")]
    InvalidNumber(String),

    /// Division or modulo by zero.
    #[error("division by zero")]
    DivisionByZero,
}

/// How digits beyond the requested precision are handled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundingMode {
    /// Drop extra digits (round toward zero).
    #[default]
    Truncate,
    /// Round to nearest, ties away from zero.
    RoundHalfUp,
}

/// What a precision value counts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CountingMode {
    /// Number of digits after the decimal point.
    DecimalPlaces(i32),
    /// Number of significant digits.
    SignificantDigits(u32),
    /// Values are multiples of this step (e.g. `0.05`).
    TickSize(Precise),
}

/// An exact signed decimal number.
///
/// Ordering comes from [`Ord`], so `a.gt(&b)`, `a.le(&b)`, `a.min(b)` work as usual.
///
/// The value is `(-1)^negative * digits * 10^-scale`. Values are kept normalized
/// (no leading zeros, no trailing fractional zeros, zero is non-negative with scale 0)
/// so derived equality matches numeric equality.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Precise {
    negative: bool,
    // Most significant digit first; empty means zero.
    digits: Vec<u8>,
    scale: u32,
}

impl Precise {
    /// Zero.
    pub fn zero() -> Self {
        Self {
            negative: false,
            digits: Vec::new(),
            scale: 0,
        }
    }

    /// Parse a numeric string: `[+-]digits[.digits][(e|E)[+-]digits]`.
    pub fn parse(input: &str) -> Result<Self, PreciseError> {
        let invalid = || PreciseError::InvalidNumber(input.to_string());
        let bytes = input.as_bytes();
        let mut pos = 0;

        let mut negative = false;
        if let Some(&sign) = bytes.first() {
            if sign == b'-' || sign == b'+' {
                negative = sign == b'-';
                pos = 1;
            }
        }

        let mut digits = Vec::with_capacity(bytes.len());
        let mut scale: i64 = 0;
        let mut seen_digit = false;
        let mut seen_point = false;
        while pos < bytes.len() {
            match bytes[pos] {
                b @ b'0'..=b'9' => {
                    digits.push(b - b'0');
                    seen_digit = true;
                    if seen_point {
                        scale += 1;
                    }
                }
                b'.' if !seen_point => seen_point = true,
                b'e' | b'E' => break,
                _ => return Err(invalid()),
            }
            pos += 1;
        }
        if !seen_digit {
            return Err(invalid());
        }

        if pos < bytes.len() {
            // Skip the 'e' and read a signed integer exponent.
            let exponent = &input[pos + 1..];
            let unsigned = exponent.strip_prefix(['+', '-']).unwrap_or(exponent);
            if unsigned.is_empty() || !unsigned.bytes().all(|b| b.is_ascii_digit()) {
                return Err(invalid());
            }
            let exp: i64 = exponent.parse().map_err(|_| invalid())?;
            if exp.abs() > MAX_EXPONENT {
                return Err(invalid());
            }
            scale -= exp;
        }

        if scale < 0 {
            digits.extend(std::iter::repeat_n(0, (-scale) as usize));
            scale = 0;
        }

        Ok(Self::from_parts(negative, digits, scale as u32))
    }

    fn from_parts(negative: bool, mut digits: Vec<u8>, mut scale: u32) -> Self {
        while scale > 0 && digits.last() == Some(&0) {
            digits.pop();
            scale -= 1;
        }
        let leading = digits.iter().take_while(|&&d| d == 0).count();
        digits.drain(..leading);
        if digits.is_empty() {
            return Self::zero();
        }
        Self {
            negative,
            digits,
            scale,
        }
    }

    /// True for zero.
    pub fn is_zero(&self) -> bool {
        self.digits.is_empty()
    }

    /// True for values strictly below zero.
    pub fn is_negative(&self) -> bool {
        self.negative
    }

    /// Number of digits after the decimal point in normalized form.
    pub fn scale(&self) -> u32 {
        self.scale
    }

    /// Absolute value.
    pub fn abs(&self) -> Self {
        Self {
            negative: false,
            ..self.clone()
        }
    }

    /// Divide, keeping `precision` decimal places.
    pub fn div(
        &self,
        other: &Self,
        precision: u32,
        rounding: RoundingMode,
    ) -> Result<Self, PreciseError> {
        if other.is_zero() {
            return Err(PreciseError::DivisionByZero);
        }
        // One guard digit decides half-up rounding exactly.
        let places = precision + 1;
        let numerator = shift(&self.digits, (places + other.scale) as usize);
        let denominator = shift(&other.digits, self.scale as usize);
        let (quotient, _) = divrem(&numerator, &denominator);
        let raw = Self::from_parts(self.negative != other.negative, quotient, places);
        Ok(raw.round_to_places(precision as i64, rounding))
    }

    /// Remainder of truncated division; the sign follows the dividend.
    pub fn rem(&self, other: &Self) -> Result<Self, PreciseError> {
        if other.is_zero() {
            return Err(PreciseError::DivisionByZero);
        }
        let scale = self.scale.max(other.scale);
        let a = shift(&self.digits, (scale - self.scale) as usize);
        let b = shift(&other.digits, (scale - other.scale) as usize);
        let (_, remainder) = divrem(&a, &b);
        Ok(Self::from_parts(self.negative, remainder, scale))
    }

    /// Round to `places` decimal places. Negative places round to tens, hundreds...
    pub fn round_to_places(&self, places: i64, rounding: RoundingMode) -> Self {
        if places >= self.scale as i64 {
            return self.clone();
        }
        let drop = (self.scale as i64 - places) as usize;
        let len = self.digits.len();
        let (mut kept, first_dropped) = if drop > len {
            (Vec::new(), 0)
        } else {
            (self.digits[..len - drop].to_vec(), self.digits[len - drop])
        };
        if rounding == RoundingMode::RoundHalfUp && first_dropped >= 5 {
            kept = add_mag(&kept, &[1]);
        }
        if places < 0 {
            let kept = shift(&kept, (-places) as usize);
            Self::from_parts(self.negative, kept, 0)
        } else {
            Self::from_parts(self.negative, kept, places as u32)
        }
    }

    /// Round to a multiple of `step`.
    pub fn round_to_step(&self, step: &Self, rounding: RoundingMode) -> Result<Self, PreciseError> {
        let steps = self.div(step, 0, rounding)?;
        Ok(&steps * step)
    }

    /// Convert to a fixed-width [`Decimal`].
    pub fn to_decimal(&self) -> Result<Decimal, PreciseError> {
        let text = self.to_string();
        Decimal::from_str_exact(&text).map_err(|_| PreciseError::InvalidNumber(text))
    }
}

// Magnitude helpers on most-significant-first digit vectors.

fn shift(digits: &[u8], zeros: usize) -> Vec<u8> {
    if digits.is_empty() {
        return Vec::new();
    }
    let mut out = Vec::with_capacity(digits.len() + zeros);
    out.extend_from_slice(digits);
    out.extend(std::iter::repeat_n(0, zeros));
    out
}

fn trim(mut digits: Vec<u8>) -> Vec<u8> {
    let leading = digits.iter().take_while(|&&d| d == 0).count();
    digits.drain(..leading);
    digits
}

fn cmp_mag(a: &[u8], b: &[u8]) -> Ordering {
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

fn add_mag(a: &[u8], b: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(a.len().max(b.len()) + 1);
    let (mut i, mut j) = (a.len(), b.len());
    let mut carry = 0u8;
    while i > 0 || j > 0 || carry > 0 {
        let mut sum = carry;
        if i > 0 {
            i -= 1;
            sum += a[i];
        }
        if j > 0 {
            j -= 1;
            sum += b[j];
        }
        out.push(sum % 10);
        carry = sum / 10;
    }
    out.reverse();
    trim(out)
}

// Requires a >= b.
fn sub_mag(a: &[u8], b: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(a.len());
    let mut j = b.len();
    let mut borrow = 0i8;
    for i in (0..a.len()).rev() {
        let mut diff = a[i] as i8 - borrow;
        if j > 0 {
            j -= 1;
            diff -= b[j] as i8;
        }
        if diff < 0 {
            diff += 10;
            borrow = 1;
        } else {
            borrow = 0;
        }
        out.push(diff as u8);
    }
    out.reverse();
    trim(out)
}

fn mul_mag(a: &[u8], b: &[u8]) -> Vec<u8> {
    if a.is_empty() || b.is_empty() {
        return Vec::new();
    }
    let mut acc = vec![0u32; a.len() + b.len()];
    for (i, &x) in a.iter().enumerate().rev() {
        for (j, &y) in b.iter().enumerate().rev() {
            acc[i + j + 1] += x as u32 * y as u32;
        }
    }
    for k in (1..acc.len()).rev() {
        let carry = acc[k] / 10;
        acc[k] %= 10;
        acc[k - 1] += carry;
    }
    trim(acc.into_iter().map(|d| d as u8).collect())
}

// Schoolbook long division; `b` must be non-empty.
fn divrem(a: &[u8], b: &[u8]) -> (Vec<u8>, Vec<u8>) {
    let mut quotient = Vec::with_capacity(a.len());
    let mut remainder: Vec<u8> = Vec::new();
    for &digit in a {
        remainder.push(digit);
        remainder = trim(remainder);
        let mut q = 0u8;
        while cmp_mag(&remainder, b) != Ordering::Less {
            remainder = sub_mag(&remainder, b);
            q += 1;
        }
        quotient.push(q);
    }
    (trim(quotient), remainder)
}

fn align(a: &Precise, b: &Precise) -> (Vec<u8>, Vec<u8>, u32) {
    let scale = a.scale.max(b.scale);
    (
        shift(&a.digits, (scale - a.scale) as usize),
        shift(&b.digits, (scale - b.scale) as usize),
        scale,
    )
}

fn signed_sum(a: &Precise, b: &Precise, negate_b: bool) -> Precise {
    let (x, y, scale) = align(a, b);
    let b_negative = b.negative != negate_b;
    if a.negative == b_negative {
        return Precise::from_parts(a.negative, add_mag(&x, &y), scale);
    }
    match cmp_mag(&x, &y) {
        Ordering::Less => Precise::from_parts(b_negative, sub_mag(&y, &x), scale),
        _ => Precise::from_parts(a.negative, sub_mag(&x, &y), scale),
    }
}

impl Add for &Precise {
    type Output = Precise;

    fn add(self, rhs: &Precise) -> Precise {
        signed_sum(self, rhs, false)
    }
}

impl Add for Precise {
    type Output = Precise;

    fn add(self, rhs: Precise) -> Precise {
        &self + &rhs
    }
}

impl Sub for &Precise {
    type Output = Precise;

    fn sub(self, rhs: &Precise) -> Precise {
        signed_sum(self, rhs, true)
    }
}

impl Sub for Precise {
    type Output = Precise;

    fn sub(self, rhs: Precise) -> Precise {
        &self - &rhs
    }
}

impl Mul for &Precise {
    type Output = Precise;

    fn mul(self, rhs: &Precise) -> Precise {
        Precise::from_parts(
            self.negative != rhs.negative,
            mul_mag(&self.digits, &rhs.digits),
            self.scale + rhs.scale,
        )
    }
}

impl Mul for Precise {
    type Output = Precise;

    fn mul(self, rhs: Precise) -> Precise {
        &self * &rhs
    }
}

impl Neg for &Precise {
    type Output = Precise;

    fn neg(self) -> Precise {
        if self.is_zero() {
            return Precise::zero();
        }
        Precise {
            negative: !self.negative,
            ..self.clone()
        }
    }
}

impl Neg for Precise {
    type Output = Precise;

    fn neg(self) -> Precise {
        -&self
    }
}

impl Ord for Precise {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.negative, other.negative) {
            (false, true) => Ordering::Greater,
            (true, false) => Ordering::Less,
            (negative, _) => {
                let (x, y, _) = align(self, other);
                let ordering = cmp_mag(&x, &y);
                if negative { ordering.reverse() } else { ordering }
            }
        }
    }
}

impl PartialOrd for Precise {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Default for Precise {
    fn default() -> Self {
        Self::zero()
    }
}

impl fmt::Display for Precise {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_zero() {
            return f.write_str("0");
        }
        let mut out = String::with_capacity(self.digits.len() + 3);
        if self.negative {
            out.push('-');
        }
        let scale = self.scale as usize;
        let len = self.digits.len();
        let text: String = self.digits.iter().map(|d| char::from(b'0' + d)).collect();
        if scale == 0 {
            out.push_str(&text);
        } else if len > scale {
            out.push_str(&text[..len - scale]);
            out.push('.');
            out.push_str(&text[len - scale..]);
        } else {
            out.push_str("0.");
            out.extend(std::iter::repeat_n('0', scale - len));
            out.push_str(&text);
        }
        f.write_str(&out)
    }
}

impl fmt::Debug for Precise {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Precise({self})")
    }
}

impl FromStr for Precise {
    type Err = PreciseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl From<i64> for Precise {
    fn from(value: i64) -> Self {
        let digits = value
            .unsigned_abs()
            .to_string()
            .bytes()
            .map(|b| b - b'0')
            .collect();
        Self::from_parts(value < 0, digits, 0)
    }
}

impl From<Decimal> for Precise {
    fn from(value: Decimal) -> Self {
        let mantissa = value.mantissa();
        let digits = mantissa
            .unsigned_abs()
            .to_string()
            .bytes()
            .map(|b| b - b'0')
            .collect();
        Self::from_parts(mantissa < 0, digits, value.scale())
    }
}

impl TryFrom<&Precise> for Decimal {
    type Error = PreciseError;

    fn try_from(value: &Precise) -> Result<Self, Self::Error> {
        value.to_decimal()
    }
}

impl Serialize for Precise {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Precise {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        // Numbers keep their original text through serde_json's arbitrary_precision.
        let value = serde_json::Value::deserialize(deserializer)?;
        let text = match &value {
            serde_json::Value::String(s) => s.clone(),
            serde_json::Value::Number(n) => n.to_string(),
            other => {
                return Err(serde::de::Error::custom(format!(
                    "expected a decimal string or number, got {other}"
                )));
            }
        };
        Precise::parse(&text).map_err(serde::de::Error::custom)
    }
}

/// Convert a tick size or a digit count into a step.
///
/// `"0.00001"` stays `"0.00001"`, `"8"` becomes `"0.00000001"` and `"-2"` becomes `"100"`.
pub fn parse_precision(value: &str) -> Result<String, PreciseError> {
    Ok(precision_step(value)?.to_string())
}

/// [`parse_precision`] returning the step as a [`Precise`].
pub fn precision_step(value: &str) -> Result<Precise, PreciseError> {
    if value.contains(['.', 'e', 'E']) {
        return Precise::parse(value);
    }
    let count: i64 = value
        .parse()
        .map_err(|_| PreciseError::InvalidNumber(value.to_string()))?;
    if count.abs() > MAX_EXPONENT {
        return Err(PreciseError::InvalidNumber(value.to_string()));
    }
    Precise::parse(&format!("1e{}", -count))
}

/// Number of decimal places in a tick size: `"0.001"` gives 3, `"1e-8"` gives 8.
pub fn precision_from_string(value: &str) -> Result<u32, PreciseError> {
    Ok(Precise::parse(value)?.scale())
}

/// Format `value` to the given precision.
pub fn decimal_to_precision(
    value: &str,
    rounding: RoundingMode,
    counting: &CountingMode,
) -> Result<String, PreciseError> {
    let number = Precise::parse(value)?;
    let rounded = match counting {
        CountingMode::DecimalPlaces(places) => number.round_to_places(*places as i64, rounding),
        CountingMode::TickSize(step) => number.round_to_step(step, rounding)?,
        CountingMode::SignificantDigits(count) => {
            if number.is_zero() {
                number
            } else {
                let integer_digits = number.digits.len() as i64 - number.scale as i64;
                number.round_to_places(*count as i64 - integer_digits, rounding)
            }
        }
    };
    Ok(rounded.to_string())
}

fn binary(
    a: &str,
    b: &str,
    op: impl FnOnce(Precise, Precise) -> Result<Precise, PreciseError>,
) -> Result<String, PreciseError> {
    Ok(op(Precise::parse(a)?, Precise::parse(b)?)?.to_string())
}

fn compare(a: &str, b: &str) -> Result<Ordering, PreciseError> {
    Ok(Precise::parse(a)?.cmp(&Precise::parse(b)?))
}

/// `a + b` on decimal strings.
pub fn string_add(a: &str, b: &str) -> Result<String, PreciseError> {
    binary(a, b, |x, y| Ok(x + y))
}

/// `a - b` on decimal strings.
pub fn string_sub(a: &str, b: &str) -> Result<String, PreciseError> {
    binary(a, b, |x, y| Ok(x - y))
}

/// `a * b` on decimal strings.
pub fn string_mul(a: &str, b: &str) -> Result<String, PreciseError> {
    binary(a, b, |x, y| Ok(x * y))
}

/// Divide with [`DEFAULT_DIV_PRECISION`] places, truncating.
pub fn string_div(a: &str, b: &str) -> Result<String, PreciseError> {
    binary(a, b, |x, y| x.div(&y, DEFAULT_DIV_PRECISION, RoundingMode::Truncate))
}

/// Remainder of `a / b`, with the sign of `a`.
pub fn string_mod(a: &str, b: &str) -> Result<String, PreciseError> {
    binary(a, b, |x, y| x.rem(&y))
}

/// The smaller of `a` and `b`, normalized.
pub fn string_min(a: &str, b: &str) -> Result<String, PreciseError> {
    binary(a, b, |x, y| Ok(x.min(y)))
}

/// The larger of `a` and `b`, normalized.
pub fn string_max(a: &str, b: &str) -> Result<String, PreciseError> {
    binary(a, b, |x, y| Ok(x.max(y)))
}

/// `-a`.
pub fn string_neg(a: &str) -> Result<String, PreciseError> {
    Ok((-Precise::parse(a)?).to_string())
}

/// `|a|`.
pub fn string_abs(a: &str) -> Result<String, PreciseError> {
    Ok(Precise::parse(a)?.abs().to_string())
}

/// Numeric comparison of decimal strings; `"1.50"` and `"1.5"` are equal.
pub fn string_gt(a: &str, b: &str) -> Result<bool, PreciseError> {
    Ok(compare(a, b)? == Ordering::Greater)
}

pub fn string_ge(a: &str, b: &str) -> Result<bool, PreciseError> {
    Ok(compare(a, b)? != Ordering::Less)
}

pub fn string_lt(a: &str, b: &str) -> Result<bool, PreciseError> {
    Ok(compare(a, b)? == Ordering::Less)
}

pub fn string_le(a: &str, b: &str) -> Result<bool, PreciseError> {
    Ok(compare(a, b)? != Ordering::Greater)
}

pub fn string_eq(a: &str, b: &str) -> Result<bool, PreciseError> {
    Ok(compare(a, b)? == Ordering::Equal)
}
