// src/math.rs

//! Fixed-point decimals and integer amounts.
//!
//! [`Dec`] is a signed decimal with 18 fractional digits stored as a raw
//! `i128`. [`Int`] is a signed 128-bit integer amount. `Dec` saturates
//! instead of wrapping; `Int` has no arithmetic operators, only `checked_*`
//! methods that fail with [`NmxError::Overflow`], so an amount is never
//! clamped silently. Every rounding step truncates toward zero. Products
//! and quotients go through a 256-bit intermediate so that no precision is
//! lost before the final truncation.
//!
//! In human-readable formats (genesis, queries) both types serialize as
//! decimal strings; in the canonical binary codec they are raw `i128`.

use crate::errors::NmxError;
use primitive_types::U256;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Neg, Sub, SubAssign};
use std::str::FromStr;

/// Number of fractional digits in a [`Dec`]
pub const DEC_PRECISION: u32 = 18;

const ONE_RAW: i128 = 1_000_000_000_000_000_000;

/// Computes `a * b / c` with a 256-bit intermediate, truncating toward zero
///
/// Returns `None` when `c` is zero. Results beyond the `i128` range saturate.
pub fn mul_div(a: i128, b: i128, c: i128) -> Option<i128> {
    if c == 0 {
        return None;
    }
    let negative = (a < 0) ^ (b < 0) ^ (c < 0);
    let product = U256::from(a.unsigned_abs()) * U256::from(b.unsigned_abs());
    let quotient = product / U256::from(c.unsigned_abs());
    let magnitude = if quotient > U256::from(i128::MAX as u128) {
        i128::MAX
    } else {
        quotient.low_u128() as i128
    };
    Some(if negative { -magnitude } else { magnitude })
}

/// Signed fixed-point decimal with 18 fractional digits
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Dec(i128);

impl Dec {
    /// 0.0
    pub const ZERO: Dec = Dec(0);

    /// 1.0
    pub const ONE: Dec = Dec(ONE_RAW);

    /// Wraps a raw value scaled by 10^18
    pub const fn from_raw(raw: i128) -> Self {
        Dec(raw)
    }

    /// Raw value scaled by 10^18
    pub const fn raw(&self) -> i128 {
        self.0
    }

    /// Converts an integer
    pub fn from_int(value: i128) -> Self {
        Dec(value.saturating_mul(ONE_RAW))
    }

    /// `num / den`; a zero denominator yields zero
    ///
    /// # Example
    /// ```
    /// use nmx_core::math::Dec;
    ///
    /// assert_eq!(Dec::from_ratio(1, 4).to_string(), "0.250000000000000000");
    /// ```
    pub fn from_ratio(num: i128, den: i128) -> Self {
        Dec(mul_div(num, ONE_RAW, den).unwrap_or(0))
    }

    /// `p / 100`
    pub fn percent(p: i128) -> Self {
        Self::from_ratio(p, 100)
    }

    /// Product, truncated toward zero
    pub fn mul(self, other: Dec) -> Dec {
        Dec(mul_div(self.0, other.0, ONE_RAW).unwrap_or(0))
    }

    /// Quotient, truncated toward zero; `None` on division by zero
    pub fn checked_quo(self, other: Dec) -> Option<Dec> {
        mul_div(self.0, ONE_RAW, other.0).map(Dec)
    }

    /// Division by an integer; `None` on division by zero
    pub fn quo_int(self, divisor: i128) -> Option<Dec> {
        if divisor == 0 {
            return None;
        }
        Some(Dec(self.0 / divisor))
    }

    /// Multiplication by an integer amount
    pub fn mul_int(self, value: Int) -> Dec {
        Dec(self.0.saturating_mul(value.0))
    }

    /// `self * num / den` with a single truncation
    pub fn mul_ratio(self, num: i128, den: i128) -> Option<Dec> {
        mul_div(self.0, num, den).map(Dec)
    }

    /// Integer part, truncated toward zero
    pub fn truncate_int(self) -> Int {
        Int(self.0 / ONE_RAW)
    }

    /// Largest integer not above the value
    pub fn floor_int(self) -> Int {
        let q = self.0 / ONE_RAW;
        if self.0 < 0 && self.0 % ONE_RAW != 0 {
            Int(q - 1)
        } else {
            Int(q)
        }
    }

    /// Smallest integer not below the value
    pub fn ceil_int(self) -> Int {
        let q = self.0 / ONE_RAW;
        if self.0 > 0 && self.0 % ONE_RAW != 0 {
            Int(q + 1)
        } else {
            Int(q)
        }
    }

    /// Whether the value is exactly zero
    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Whether the value is below zero
    pub fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Whether the value is above zero
    pub fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// Absolute value
    pub fn abs(self) -> Dec {
        Dec(self.0.saturating_abs())
    }

    /// Clamps into `[0, 1]`
    pub fn clamp_unit(self) -> Dec {
        self.clamp(Dec::ZERO, Dec::ONE)
    }

    /// Whether the value lies in `[0, 1]`
    pub fn is_unit(&self) -> bool {
        *self >= Dec::ZERO && *self <= Dec::ONE
    }
}

impl Add for Dec {
    type Output = Dec;
    fn add(self, rhs: Dec) -> Dec {
        Dec(self.0.saturating_add(rhs.0))
    }
}

impl Sub for Dec {
    type Output = Dec;
    fn sub(self, rhs: Dec) -> Dec {
        Dec(self.0.saturating_sub(rhs.0))
    }
}

impl Neg for Dec {
    type Output = Dec;
    fn neg(self) -> Dec {
        Dec(self.0.saturating_neg())
    }
}

impl AddAssign for Dec {
    fn add_assign(&mut self, rhs: Dec) {
        *self = *self + rhs;
    }
}

impl SubAssign for Dec {
    fn sub_assign(&mut self, rhs: Dec) {
        *self = *self - rhs;
    }
}

impl Sum for Dec {
    fn sum<I: Iterator<Item = Dec>>(iter: I) -> Dec {
        iter.fold(Dec::ZERO, |acc, d| acc + d)
    }
}

impl fmt::Display for Dec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let magnitude = self.0.unsigned_abs();
        let one = ONE_RAW as u128;
        write!(f, "{}{}.{:018}", sign, magnitude / one, magnitude % one)
    }
}

impl fmt::Debug for Dec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Dec({})", self)
    }
}

impl FromStr for Dec {
    type Err = NmxError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || NmxError::InvalidMessage(format!("invalid decimal: {:?}", s));
        let trimmed = s.trim();
        let (negative, body) = match trimmed.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, trimmed),
        };
        let (int_part, frac_part) = match body.split_once('.') {
            Some((i, f)) => (i, f),
            None => (body, ""),
        };
        if int_part.is_empty()
            || frac_part.len() > DEC_PRECISION as usize
            || !int_part.bytes().all(|b| b.is_ascii_digit())
            || !frac_part.bytes().all(|b| b.is_ascii_digit())
        {
            return Err(invalid());
        }

        let int_value: i128 = int_part.parse().map_err(|_| invalid())?;
        let mut frac_value: i128 = 0;
        for (i, digit) in frac_part.bytes().enumerate() {
            let scale = 10i128.pow(DEC_PRECISION - 1 - i as u32);
            frac_value += (digit - b'0') as i128 * scale;
        }
        let raw = int_value
            .checked_mul(ONE_RAW)
            .and_then(|v| v.checked_add(frac_value))
            .ok_or_else(invalid)?;
        Ok(Dec(if negative { -raw } else { raw }))
    }
}

impl Serialize for Dec {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if serializer.is_human_readable() {
            serializer.serialize_str(&self.to_string())
        } else {
            serializer.serialize_i128(self.0)
        }
    }
}

impl<'de> Deserialize<'de> for Dec {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        if deserializer.is_human_readable() {
            let s = String::deserialize(deserializer)?;
            s.parse().map_err(serde::de::Error::custom)
        } else {
            Ok(Dec(i128::deserialize(deserializer)?))
        }
    }
}

/// Signed integer amount
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Int(i128);

impl Int {
    /// 0
    pub const ZERO: Int = Int(0);

    /// Wraps a value
    pub const fn new(value: i128) -> Self {
        Int(value)
    }

    /// Inner value
    pub const fn value(&self) -> i128 {
        self.0
    }

    /// Whether the value is exactly zero
    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Whether the value is above zero
    pub fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// Whether the value is below zero
    pub fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Addition that reports overflow
    pub fn checked_add(self, other: Int) -> crate::Result<Int> {
        self.0
            .checked_add(other.0)
            .map(Int)
            .ok_or_else(|| NmxError::Overflow(format!("{} + {}", self, other)))
    }

    /// Subtraction that reports overflow
    pub fn checked_sub(self, other: Int) -> crate::Result<Int> {
        self.0
            .checked_sub(other.0)
            .map(Int)
            .ok_or_else(|| NmxError::Overflow(format!("{} - {}", self, other)))
    }

    /// Sum of `values`, failing on the first overflow
    pub fn checked_sum(values: impl IntoIterator<Item = Int>) -> crate::Result<Int> {
        values.into_iter().try_fold(Int::ZERO, Int::checked_add)
    }

    /// Converts to a decimal
    pub fn to_dec(self) -> Dec {
        Dec::from_int(self.0)
    }

    /// `self * d`, truncated toward zero
    pub fn mul_dec_truncate(self, d: Dec) -> Int {
        Int(mul_div(self.0, d.raw(), ONE_RAW).unwrap_or(0))
    }

    /// `self * num / den`, truncated toward zero; `None` on division by zero
    pub fn mul_ratio(self, num: i128, den: i128) -> Option<Int> {
        mul_div(self.0, num, den).map(Int)
    }
}

impl From<u64> for Int {
    fn from(v: u64) -> Self {
        Int(v as i128)
    }
}

impl From<i64> for Int {
    fn from(v: i64) -> Self {
        Int(v as i128)
    }
}

impl From<i128> for Int {
    fn from(v: i128) -> Self {
        Int(v)
    }
}

impl fmt::Display for Int {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for Int {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Int({})", self.0)
    }
}

impl FromStr for Int {
    type Err = NmxError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<i128>()
            .map(Int)
            .map_err(|_| NmxError::InvalidMessage(format!("invalid integer: {:?}", s)))
    }
}

impl Serialize for Int {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if serializer.is_human_readable() {
            serializer.serialize_str(&self.0.to_string())
        } else {
            serializer.serialize_i128(self.0)
        }
    }
}

impl<'de> Deserialize<'de> for Int {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        if deserializer.is_human_readable() {
            let s = String::deserialize(deserializer)?;
            s.parse().map_err(serde::de::Error::custom)
        } else {
            Ok(Int(i128::deserialize(deserializer)?))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Dec {
        s.parse().unwrap()
    }

    #[test]
    fn test_parse_and_display() {
        assert_eq!(dec("0.05").to_string(), "0.050000000000000000");
        assert_eq!(dec("-1.5").to_string(), "-1.500000000000000000");
        assert_eq!(dec("42"), Dec::from_int(42));
        assert!("1.0000000000000000001".parse::<Dec>().is_err());
        assert!("abc".parse::<Dec>().is_err());
        assert!(".5".parse::<Dec>().is_err());
    }

    #[test]
    fn test_mul_truncates_toward_zero() {
        let third = Dec::from_ratio(1, 3);
        assert_eq!(third.raw(), 333_333_333_333_333_333);
        assert_eq!((-third).mul(Dec::from_int(3)).raw(), -999_999_999_999_999_999);
        assert_eq!(Dec::percent(2).mul(Dec::percent(1)), dec("0.0002"));
    }

    #[test]
    fn test_quo() {
        assert_eq!(Dec::ONE.checked_quo(Dec::from_int(4)).unwrap(), dec("0.25"));
        assert!(Dec::ONE.checked_quo(Dec::ZERO).is_none());
        assert_eq!(Dec::from_ratio(5, 0), Dec::ZERO);
    }

    #[test]
    fn test_floor_and_ceil() {
        assert_eq!(dec("2.5").floor_int(), Int::new(2));
        assert_eq!(dec("2.5").ceil_int(), Int::new(3));
        assert_eq!(dec("-2.5").floor_int(), Int::new(-3));
        assert_eq!(dec("-2.5").truncate_int(), Int::new(-2));
        assert_eq!(dec("50").ceil_int(), Int::new(50));
    }

    #[test]
    fn test_saturation() {
        let big = Dec::from_raw(i128::MAX);
        assert_eq!(big + Dec::ONE, big);
        assert_eq!(big.mul(Dec::from_int(10)).raw(), i128::MAX);
    }

    #[test]
    fn test_int_overflow_is_reported() {
        let max = Int::new(i128::MAX);
        assert!(matches!(max.checked_add(Int::new(1)), Err(NmxError::Overflow(_))));
        assert_eq!(max.checked_sub(Int::new(1)).unwrap(), Int::new(i128::MAX - 1));
        assert_eq!(max.checked_add(Int::new(-1)).unwrap(), Int::new(i128::MAX - 1));
        assert!(matches!(Int::new(i128::MIN).checked_sub(Int::new(1)), Err(NmxError::Overflow(_))));

        let half = Int::new(i128::MAX / 2 + 1);
        assert!(matches!(Int::checked_sum([half, half]), Err(NmxError::Overflow(_))));
        assert_eq!(
            Int::checked_sum([Int::new(i128::MAX - 2), Int::new(1), Int::new(1)]).unwrap(),
            Int::new(i128::MAX)
        );
        assert_eq!(Int::checked_sum(Vec::new()).unwrap(), Int::ZERO);

        // a product beyond the range saturates only through mul_ratio's 256-bit path
        assert_eq!(max.mul_dec_truncate(Dec::ONE), max);
        assert_eq!(max.mul_ratio(1, 2), Some(Int::new(i128::MAX / 2)));
    }

    #[test]
    fn test_int_mul_dec() {
        let tokens = Int::new(1_500_000);
        let kept = tokens.mul_dec_truncate(Dec::ONE - Dec::percent(1));
        assert_eq!(kept, Int::new(1_485_000));
        assert_eq!(Int::new(7).mul_dec_truncate(Dec::from_ratio(1, 2)), Int::new(3));
    }

    #[test]
    fn test_mul_div_large() {
        // Intermediate exceeds i128 but the result fits
        let a = i128::MAX / 2;
        assert_eq!(mul_div(a, 4, 4), Some(a));
        assert_eq!(mul_div(1, 1, 0), None);
    }

    #[test]
    fn test_serde_forms() {
        let d = dec("0.9");
        assert_eq!(serde_json::to_string(&d).unwrap(), "\"0.900000000000000000\"");
        let back: Dec = serde_json::from_str("\"0.9\"").unwrap();
        assert_eq!(back, d);

        let i = Int::new(-12);
        assert_eq!(serde_json::to_string(&i).unwrap(), "\"-12\"");
        let bytes = crate::codec::encode(&i).unwrap();
        assert_eq!(bytes.len(), 16);
        assert_eq!(crate::codec::decode::<Int>(&bytes).unwrap(), i);
    }

    #[test]
    fn test_clamp_unit() {
        assert_eq!(dec("1.2").clamp_unit(), Dec::ONE);
        assert_eq!(dec("-0.1").clamp_unit(), Dec::ZERO);
        assert!(dec("0.3").is_unit());
    }
}
