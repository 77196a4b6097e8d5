//! exact decimal amounts
//!
//! every monetary value the node hands us is a decimal string. ledger rows
//! carry lossless coin amounts ("12.5", "-3.25"), balances carry raw units
//! with an implicit 10^30 scale. all arithmetic here is integer arithmetic on
//! a big mantissa with an explicit decimal scale; the only float path is
//! [`divide`], which yields non-monetary ratios.

use std::cmp::Ordering;
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, Mul, Neg, Sub};
use std::str::FromStr;

use num_bigint::{BigInt, Sign};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// implied fractional digits on raw node amounts
pub const IMPLICIT_SCALE: u32 = 30;

/// fraction digits shown to users
pub const DISPLAY_DIGITS: u32 = 4;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ArithmeticError {
    #[error("malformed amount: {0:?}")]
    Malformed(String),

    #[error("division by zero")]
    DivisionByZero,
}

/// fixed-point decimal: `mantissa / 10^scale`
///
/// always normalized (no trailing fractional zeros, zero has scale 0), so
/// structural equality is value equality.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Amount {
    mantissa: BigInt,
    scale: u32,
}

fn pow10(exp: u32) -> BigInt {
    BigInt::from(10u32).pow(exp)
}

impl Amount {
    pub fn zero() -> Self {
        Self {
            mantissa: BigInt::default(),
            scale: 0,
        }
    }

    pub fn from_integer(value: i64) -> Self {
        Self::new(BigInt::from(value), 0)
    }

    fn new(mut mantissa: BigInt, mut scale: u32) -> Self {
        if mantissa.sign() == Sign::NoSign {
            return Self::zero();
        }
        let ten = BigInt::from(10u32);
        while scale > 0 && (&mantissa % &ten).sign() == Sign::NoSign {
            mantissa = mantissa / &ten;
            scale -= 1;
        }
        Self { mantissa, scale }
    }

    pub fn is_zero(&self) -> bool {
        self.mantissa.sign() == Sign::NoSign
    }

    pub fn is_negative(&self) -> bool {
        self.mantissa.sign() == Sign::Minus
    }

    pub fn abs(&self) -> Self {
        if self.is_negative() {
            -self.clone()
        } else {
            self.clone()
        }
    }

    /// number of fractional digits after normalization
    pub fn scale(&self) -> u32 {
        self.scale
    }

    /// mantissas of both operands brought to the larger scale
    fn aligned(&self, other: &Self) -> (BigInt, BigInt, u32) {
        match self.scale.cmp(&other.scale) {
            Ordering::Equal => (self.mantissa.clone(), other.mantissa.clone(), self.scale),
            Ordering::Less => (
                &self.mantissa * pow10(other.scale - self.scale),
                other.mantissa.clone(),
                other.scale,
            ),
            Ordering::Greater => (
                self.mantissa.clone(),
                &other.mantissa * pow10(self.scale - other.scale),
                self.scale,
            ),
        }
    }

    /// drop fractional digits beyond `digits`, toward zero
    pub fn truncate(&self, digits: u32) -> Self {
        if self.scale <= digits {
            return self.clone();
        }
        let divisor = pow10(self.scale - digits);
        Self::new(&self.mantissa / divisor, digits)
    }

    /// interpret `self` as raw units and drop the implicit 10^30 scale
    ///
    /// truncates toward zero. raw values with no more digits than the scale
    /// come out as zero.
    pub fn strip_implicit_scale(&self) -> Self {
        Self::new(self.mantissa.clone(), self.scale + IMPLICIT_SCALE).truncate(0)
    }

    /// truncated, zero-padded rendering with exactly `digits` fraction digits
    pub fn to_fixed(&self, digits: u32) -> String {
        let truncated = self.truncate(digits);
        let mantissa = &truncated.mantissa * pow10(digits - truncated.scale);
        format_scaled(&mantissa, digits)
    }

    /// the user-facing rendering (4 fraction digits, never rounded)
    pub fn to_display(&self) -> String {
        self.to_fixed(DISPLAY_DIGITS)
    }

    pub fn to_absolute_display(&self) -> String {
        self.abs().to_display()
    }

    /// non-monetary ratio `self / other`
    pub fn ratio(&self, other: &Self) -> Result<f64, ArithmeticError> {
        if other.is_zero() {
            return Err(ArithmeticError::DivisionByZero);
        }
        let num: f64 = self
            .to_string()
            .parse()
            .map_err(|_| ArithmeticError::Malformed(self.to_string()))?;
        let den: f64 = other
            .to_string()
            .parse()
            .map_err(|_| ArithmeticError::Malformed(other.to_string()))?;
        Ok(num / den)
    }
}

impl Default for Amount {
    fn default() -> Self {
        Self::zero()
    }
}

impl From<u64> for Amount {
    fn from(value: u64) -> Self {
        Self::new(BigInt::from(value), 0)
    }
}

/// render `mantissa / 10^scale` with exactly `scale` fraction digits
fn format_scaled(mantissa: &BigInt, scale: u32) -> String {
    let negative = mantissa.sign() == Sign::Minus;
    let digits = mantissa.magnitude().to_string();
    let scale = scale as usize;

    let body = if scale == 0 {
        digits
    } else {
        let padded = if digits.len() <= scale {
            format!("{}{}", "0".repeat(scale + 1 - digits.len()), digits)
        } else {
            digits
        };
        let split = padded.len() - scale;
        format!("{}.{}", &padded[..split], &padded[split..])
    };

    if negative {
        format!("-{}", body)
    } else {
        body
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&format_scaled(&self.mantissa, self.scale))
    }
}

impl FromStr for Amount {
    type Err = ArithmeticError;

    /// plain decimal notation: optional sign, digits, optional fraction.
    /// exponents, whitespace and separators are rejected.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || ArithmeticError::Malformed(s.to_string());

        let (negative, unsigned) = match s.as_bytes().first() {
            Some(b'-') => (true, &s[1..]),
            Some(b'+') => (false, &s[1..]),
            _ => (false, s),
        };

        let (int_part, frac_part) = match unsigned.split_once('.') {
            Some((i, f)) => (i, f),
            None => (unsigned, ""),
        };

        if int_part.is_empty() && frac_part.is_empty() {
            return Err(malformed());
        }
        if !int_part.bytes().all(|b| b.is_ascii_digit())
            || !frac_part.bytes().all(|b| b.is_ascii_digit())
        {
            return Err(malformed());
        }

        let digits = format!("{}{}", int_part, frac_part);
        let magnitude = BigInt::parse_bytes(digits.as_bytes(), 10).ok_or_else(malformed)?;
        let scale = u32::try_from(frac_part.len()).map_err(|_| malformed())?;

        let mantissa = if negative { -magnitude } else { magnitude };
        Ok(Self::new(mantissa, scale))
    }
}

impl Ord for Amount {
    fn cmp(&self, other: &Self) -> Ordering {
        let (a, b, _) = self.aligned(other);
        a.cmp(&b)
    }
}

impl PartialOrd for Amount {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Add for &Amount {
    type Output = Amount;

    fn add(self, rhs: &Amount) -> Amount {
        let (a, b, scale) = self.aligned(rhs);
        Amount::new(a + b, scale)
    }
}

impl Add for Amount {
    type Output = Amount;

    fn add(self, rhs: Amount) -> Amount {
        &self + &rhs
    }
}

impl Sub for &Amount {
    type Output = Amount;

    fn sub(self, rhs: &Amount) -> Amount {
        let (a, b, scale) = self.aligned(rhs);
        Amount::new(a - b, scale)
    }
}

impl Sub for Amount {
    type Output = Amount;

    fn sub(self, rhs: Amount) -> Amount {
        &self - &rhs
    }
}

impl Mul for &Amount {
    type Output = Amount;

    fn mul(self, rhs: &Amount) -> Amount {
        Amount::new(&self.mantissa * &rhs.mantissa, self.scale + rhs.scale)
    }
}

impl Neg for Amount {
    type Output = Amount;

    fn neg(self) -> Amount {
        Amount {
            mantissa: -self.mantissa,
            scale: self.scale,
        }
    }
}

impl<'a> Sum<&'a Amount> for Amount {
    fn sum<I: Iterator<Item = &'a Amount>>(iter: I) -> Self {
        iter.fold(Amount::zero(), |acc, x| &acc + x)
    }
}

impl Sum for Amount {
    fn sum<I: Iterator<Item = Amount>>(iter: I) -> Self {
        iter.fold(Amount::zero(), |acc, x| acc + x)
    }
}

impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(de::Error::custom)
    }
}

// string-level codec, for callers that hold the node's raw strings

pub fn add(a: &str, b: &str) -> Result<String, ArithmeticError> {
    Ok((a.parse::<Amount>()? + b.parse::<Amount>()?).to_string())
}

pub fn subtract(a: &str, b: &str) -> Result<String, ArithmeticError> {
    Ok((a.parse::<Amount>()? - b.parse::<Amount>()?).to_string())
}

pub fn multiply(a: &str, b: &str) -> Result<String, ArithmeticError> {
    Ok((&a.parse::<Amount>()? * &b.parse::<Amount>()?).to_string())
}

/// ratio of two amounts; only for progress percentages and the like
pub fn divide(a: &str, b: &str) -> Result<f64, ArithmeticError> {
    a.parse::<Amount>()?.ratio(&b.parse::<Amount>()?)
}

pub fn strip_implicit_scale(raw: &str) -> Result<String, ArithmeticError> {
    Ok(raw.parse::<Amount>()?.strip_implicit_scale().to_string())
}

pub fn to_display(amount: &str, fraction_digits: u32) -> Result<String, ArithmeticError> {
    Ok(amount.parse::<Amount>()?.to_fixed(fraction_digits))
}

pub fn to_absolute_display(amount: &str) -> Result<String, ArithmeticError> {
    Ok(amount.parse::<Amount>()?.to_absolute_display())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn amt(s: &str) -> Amount {
        s.parse().unwrap()
    }

    #[test]
    fn test_parse_and_normalize() {
        assert_eq!(amt("5.10").to_string(), "5.1");
        assert_eq!(amt("-0.050").to_string(), "-0.05");
        assert_eq!(amt("+7").to_string(), "7");
        assert_eq!(amt(".5").to_string(), "0.5");
        assert_eq!(amt("3.").to_string(), "3");
        assert_eq!(amt("-0").to_string(), "0");
        assert_eq!(amt("1.50"), amt("1.5"));
    }

    #[test]
    fn test_parse_rejects_malformed() {
        for bad in ["", "-", ".", "abc", "1e5", "1,000", " 1", "1.2.3", "--1", "NaN"] {
            assert_eq!(
                bad.parse::<Amount>(),
                Err(ArithmeticError::Malformed(bad.to_string())),
                "{bad:?} should be rejected"
            );
        }
        assert!(add("1", "x").is_err());
        assert!(to_display("undefined", 4).is_err());
    }

    #[test]
    fn test_exact_addition() {
        assert_eq!(add("0.1", "0.2").unwrap(), "0.3");
        assert_eq!(add("5", "3").unwrap(), "8");
        assert_eq!(add("-2.5", "2.5").unwrap(), "0");
        assert_eq!(subtract("1", "0.0001").unwrap(), "0.9999");
        assert_eq!(multiply("1.5", "-2").unwrap(), "-3");
    }

    #[test]
    fn test_display_truncates() {
        assert_eq!(to_display("1.23456", 4).unwrap(), "1.2345");
        assert_eq!(to_display("1.99999", 4).unwrap(), "1.9999");
        assert_eq!(to_display("2", 4).unwrap(), "2.0000");
        assert_eq!(to_display("0.00009", 4).unwrap(), "0.0000");
        assert_eq!(to_display("-1.23456", 4).unwrap(), "-1.2345");
        assert_eq!(to_display("-0.00001", 4).unwrap(), "0.0000");
        assert_eq!(to_display("12.5", 0).unwrap(), "12");
        assert_eq!(to_absolute_display("-3.25").unwrap(), "3.2500");
    }

    #[test]
    fn test_display_beyond_f64_precision() {
        let big = "123456789012345678901234567890.123456789";
        assert_eq!(to_display(big, 4).unwrap(), "123456789012345678901234567890.1234");
    }

    #[test]
    fn test_strip_implicit_scale() {
        let one_coin = format!("1{}", "0".repeat(30));
        assert_eq!(strip_implicit_scale(&one_coin).unwrap(), "1");

        let raw = format!("1234{}", "9".repeat(30));
        assert_eq!(strip_implicit_scale(&raw).unwrap(), "1234");

        let negative = format!("-42{}", "5".repeat(30));
        assert_eq!(strip_implicit_scale(&negative).unwrap(), "-42");

        // shorter than the scale resolves to zero
        assert_eq!(strip_implicit_scale("999").unwrap(), "0");
        assert_eq!(strip_implicit_scale("-999").unwrap(), "0");
        assert!(strip_implicit_scale("").is_err());
    }

    #[test]
    fn test_ordering() {
        assert!(amt("10") > amt("5"));
        assert!(amt("0.5") > amt("0.49999"));
        assert!(amt("-1") < amt("0"));
        let mut v = vec![amt("5"), amt("10"), amt("7.5")];
        v.sort();
        assert_eq!(v, vec![amt("5"), amt("7.5"), amt("10")]);
    }

    #[test]
    fn test_divide() {
        assert_eq!(divide("50", "200").unwrap(), 0.25);
        assert_eq!(divide("1", "0"), Err(ArithmeticError::DivisionByZero));
    }

    #[test]
    fn test_serde_as_string() {
        let a = amt("-12.5");
        let json = serde_json::to_string(&a).unwrap();
        assert_eq!(json, "\"-12.5\"");
        let back: Amount = serde_json::from_str(&json).unwrap();
        assert_eq!(back, a);
        assert!(serde_json::from_str::<Amount>("\"1e3\"").is_err());
    }

    fn canonical() -> impl Strategy<Value = String> {
        (any::<i64>(), 0u32..12).prop_map(|(m, s)| Amount::new(BigInt::from(m), s).to_string())
    }

    proptest! {
        #[test]
        fn prop_add_commutes(a in canonical(), b in canonical()) {
            prop_assert_eq!(add(&a, &b).unwrap(), add(&b, &a).unwrap());
        }

        #[test]
        fn prop_zero_is_identity(a in canonical()) {
            prop_assert_eq!(add(&a, "0").unwrap(), a);
        }

        #[test]
        fn prop_add_associates(a in canonical(), b in canonical(), c in canonical()) {
            let left = add(&add(&a, &b).unwrap(), &c).unwrap();
            let right = add(&a, &add(&b, &c).unwrap()).unwrap();
            prop_assert_eq!(left, right);
        }

        #[test]
        fn prop_display_never_exceeds_value(a in canonical()) {
            let shown = amt(&to_absolute_display(&a).unwrap());
            prop_assert!(shown <= amt(&a).abs());
        }
    }
}
