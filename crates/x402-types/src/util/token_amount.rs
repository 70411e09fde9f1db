//! 256-bit unsigned integers carried as base-10 strings.
//!
//! JSON numbers cannot hold token amounts above 2^53 without losing precision,
//! so authorization amounts and validity bounds travel as decimal strings:
//!
//! ```json
//! "1606938044258990275541962092341162602522202993782792835301376"
//! ```

use alloy_primitives::U256;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// A non-negative integer up to `2^256 - 1`, serialized as a decimal string.
///
/// ```
/// use x402_types::util::TokenAmount;
///
/// let amount: TokenAmount = "123456789012345678901234567890".parse().unwrap();
/// assert_eq!(amount.to_string(), "123456789012345678901234567890");
/// assert!("12.5".parse::<TokenAmount>().is_err());
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TokenAmount(pub U256);

/// A string that is not a base-10 representation of a [`TokenAmount`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TokenAmountParseError {
    #[error("empty string is not an integer")]
    Empty,
    #[error("{0:?} is not a base-10 integer")]
    InvalidDigit(String),
    #[error("{0:?} does not fit in 256 bits")]
    Overflow(String),
}

impl TokenAmount {
    pub const ZERO: TokenAmount = TokenAmount(U256::ZERO);

    pub fn as_u256(&self) -> U256 {
        self.0
    }
}

impl FromStr for TokenAmount {
    type Err = TokenAmountParseError;

    /// Accepts ASCII digits only: no sign, no whitespace, no radix prefix, no separators.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(TokenAmountParseError::Empty);
        }
        if !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(TokenAmountParseError::InvalidDigit(s.to_string()));
        }
        U256::from_str_radix(s, 10)
            .map(TokenAmount)
            .map_err(|_| TokenAmountParseError::Overflow(s.to_string()))
    }
}

impl Display for TokenAmount {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<U256> for TokenAmount {
    fn from(value: U256) -> Self {
        TokenAmount(value)
    }
}

impl From<u64> for TokenAmount {
    fn from(value: u64) -> Self {
        TokenAmount(U256::from(value))
    }
}

impl From<TokenAmount> for U256 {
    fn from(value: TokenAmount) -> Self {
        value.0
    }
}

impl Serialize for TokenAmount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0.to_string())
    }
}

impl<'de> Deserialize<'de> for TokenAmount {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_beyond_u128() {
        let two_pow_200 = U256::from(1u8) << 200usize;
        let amount: TokenAmount = two_pow_200.to_string().parse().unwrap();
        assert_eq!(amount.as_u256(), two_pow_200);
    }

    #[test]
    fn test_parse_max() {
        let max = U256::MAX.to_string();
        let amount: TokenAmount = max.parse().unwrap();
        assert_eq!(amount.0, U256::MAX);
    }

    #[test]
    fn test_parse_zero() {
        assert_eq!("0".parse::<TokenAmount>().unwrap(), TokenAmount::ZERO);
        assert_eq!("000".parse::<TokenAmount>().unwrap(), TokenAmount::ZERO);
        assert_eq!(TokenAmount::default(), TokenAmount::ZERO);
    }

    #[test]
    fn test_parse_rejects_overflow() {
        // 2^256
        let too_big =
            "115792089237316195423570985008687907853269984665640564039457584007913129639936";
        assert!(matches!(
            too_big.parse::<TokenAmount>(),
            Err(TokenAmountParseError::Overflow(_))
        ));
    }

    #[test]
    fn test_parse_rejects_non_decimal() {
        for input in ["", "-1", "+1", " 1", "1 ", "0x10", "1_000", "1e3", "1.0", "abc"] {
            assert!(input.parse::<TokenAmount>().is_err(), "{input:?}");
        }
    }

    #[test]
    fn test_serializes_as_string() {
        let amount = TokenAmount::from(1_000_000u64);
        assert_eq!(serde_json::to_string(&amount).unwrap(), "\"1000000\"");
        let back: TokenAmount = serde_json::from_str("\"1000000\"").unwrap();
        assert_eq!(back, amount);
    }

    #[test]
    fn test_deserialize_rejects_json_number() {
        assert!(serde_json::from_str::<TokenAmount>("1000000").is_err());
    }
}
