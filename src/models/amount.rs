use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Neg, Sub};
use std::str::FromStr;
use thiserror::Error;

/// Errors when parsing a monetary amount
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AmountError {
    #[error("Invalid amount '{0}'")]
    Invalid(String),

    #[error("Amount '{0}' has more than two decimal places")]
    TooPrecise(String),
}

/// Monetary amount in euro cents
///
/// All fee arithmetic happens on whole cents. Fractional results (75 % of a
/// session fee, the sibling discount) are rounded half away from zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Amount(i64);

impl Amount {
    pub const ZERO: Amount = Amount(0);

    pub const fn from_cents(cents: i64) -> Self {
        Self(cents)
    }

    pub const fn from_euros(euros: i64) -> Self {
        Self(euros * 100)
    }

    pub const fn cents(self) -> i64 {
        self.0
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    pub fn is_negative(self) -> bool {
        self.0 < 0
    }

    /// Multiply by `numerator / denominator`, rounding to the nearest cent
    pub fn scale(self, numerator: i64, denominator: i64) -> Self {
        debug_assert!(denominator > 0);
        Self(div_round(self.0 * numerator, denominator))
    }

    pub fn half(self) -> Self {
        self.scale(1, 2)
    }
}

/// Integer division rounding half away from zero
pub(crate) fn div_round(value: i64, denominator: i64) -> i64 {
    let quotient = value / denominator;
    let remainder = value % denominator;

    if remainder.abs() * 2 >= denominator.abs() {
        if (value < 0) != (denominator < 0) {
            quotient - 1
        } else {
            quotient + 1
        }
    } else {
        quotient
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{}{}.{:02}", sign, abs / 100, abs % 100)
    }
}

impl FromStr for Amount {
    type Err = AmountError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let (negative, digits) = match trimmed.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, trimmed.strip_prefix('+').unwrap_or(trimmed)),
        };

        let (whole, fraction) = match digits.split_once('.') {
            Some((whole, fraction)) => (whole, fraction),
            None => (digits, ""),
        };

        let all_digits = |part: &str| part.chars().all(|c| c.is_ascii_digit());
        if (whole.is_empty() && fraction.is_empty())
            || !all_digits(whole)
            || !all_digits(fraction)
        {
            return Err(AmountError::Invalid(s.to_string()));
        }
        if fraction.len() > 2 {
            return Err(AmountError::TooPrecise(s.to_string()));
        }

        let whole: i64 = if whole.is_empty() {
            0
        } else {
            whole.parse().map_err(|_| AmountError::Invalid(s.to_string()))?
        };
        let fraction: i64 = match fraction.len() {
            0 => 0,
            1 => fraction.parse::<i64>().map_err(|_| AmountError::Invalid(s.to_string()))? * 10,
            _ => fraction.parse().map_err(|_| AmountError::Invalid(s.to_string()))?,
        };

        let cents = whole
            .checked_mul(100)
            .and_then(|c| c.checked_add(fraction))
            .ok_or_else(|| AmountError::Invalid(s.to_string()))?;

        Ok(Self(if negative { -cents } else { cents }))
    }
}

impl Add for Amount {
    type Output = Amount;

    fn add(self, rhs: Self) -> Self::Output {
        Amount(self.0 + rhs.0)
    }
}

impl AddAssign for Amount {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

impl Sub for Amount {
    type Output = Amount;

    fn sub(self, rhs: Self) -> Self::Output {
        Amount(self.0 - rhs.0)
    }
}

impl Neg for Amount {
    type Output = Amount;

    fn neg(self) -> Self::Output {
        Amount(-self.0)
    }
}

impl Sum for Amount {
    fn sum<I: Iterator<Item = Amount>>(iter: I) -> Self {
        iter.fold(Amount::ZERO, |acc, x| acc + x)
    }
}

impl<'a> Sum<&'a Amount> for Amount {
    fn sum<I: Iterator<Item = &'a Amount>>(iter: I) -> Self {
        iter.copied().sum()
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
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_amounts() {
        assert_eq!("12".parse::<Amount>().unwrap(), Amount::from_cents(1200));
        assert_eq!("12.3".parse::<Amount>().unwrap(), Amount::from_cents(1230));
        assert_eq!("12.34".parse::<Amount>().unwrap(), Amount::from_cents(1234));
        assert_eq!("-1.50".parse::<Amount>().unwrap(), Amount::from_cents(-150));
        assert_eq!(".5".parse::<Amount>().unwrap(), Amount::from_cents(50));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!("".parse::<Amount>().is_err());
        assert!("12,50".parse::<Amount>().is_err());
        assert!("abc".parse::<Amount>().is_err());
        assert_eq!(
            "1.234".parse::<Amount>(),
            Err(AmountError::TooPrecise("1.234".to_string()))
        );
    }

    #[test]
    fn test_display() {
        assert_eq!(Amount::from_cents(1234).to_string(), "12.34");
        assert_eq!(Amount::from_cents(5).to_string(), "0.05");
        assert_eq!(Amount::from_cents(-150).to_string(), "-1.50");
        assert_eq!(Amount::ZERO.to_string(), "0.00");
    }

    #[test]
    fn test_scale_rounds_half_away_from_zero() {
        // 75 % of 9.99 = 7.4925
        assert_eq!(Amount::from_cents(999).scale(3, 4), Amount::from_cents(749));
        // Half of 0.05 = 0.025
        assert_eq!(Amount::from_cents(5).half(), Amount::from_cents(3));
        assert_eq!(Amount::from_cents(-5).half(), Amount::from_cents(-3));
        assert_eq!(Amount::from_cents(1000).scale(3, 4), Amount::from_cents(750));
    }

    #[test]
    fn test_serde_as_string() {
        let json = serde_json::to_string(&Amount::from_cents(1999)).unwrap();
        assert_eq!(json, "\"19.99\"");
        let back: Amount = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Amount::from_cents(1999));
    }
}
