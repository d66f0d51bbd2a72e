//! Amount type for prices and proceeds
//!
//! Amounts are unsigned integers in the smallest unit of the settlement
//! currency (wei-style). Arithmetic is checked; nothing wraps.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Decimal places of the settlement currency's whole unit
pub const STANDARD_DECIMALS: u8 = 18;

/// Errors from parsing human-readable amounts
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseAmountError {
    #[error("Empty amount")]
    Empty,

    #[error("Invalid digit in amount: {input}")]
    InvalidDigit { input: String },

    #[error("Amount {input} has more than {decimals} decimal places")]
    TooPrecise { input: String, decimals: u8 },

    #[error("Amount {input} overflows")]
    Overflow { input: String },
}

/// Non-negative amount in smallest units
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Amount(pub u128);

impl Amount {
    pub fn zero() -> Self {
        Self(0)
    }

    pub fn new(value: u128) -> Self {
        Self(value)
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// A valid listing price is any positive amount
    pub fn is_positive(&self) -> bool {
        self.0 > 0
    }

    pub fn checked_add(self, other: Self) -> Option<Self> {
        self.0.checked_add(other.0).map(Self)
    }

    pub fn checked_sub(self, other: Self) -> Option<Self> {
        self.0.checked_sub(other.0).map(Self)
    }

    /// Parse a decimal string such as `"0.01"` into smallest units
    pub fn parse_units(input: &str, decimals: u8) -> Result<Self, ParseAmountError> {
        let input = input.trim();
        if input.is_empty() {
            return Err(ParseAmountError::Empty);
        }

        let (whole, fraction) = match input.split_once('.') {
            Some((whole, fraction)) => (whole, fraction),
            None => (input, ""),
        };

        if fraction.len() > decimals as usize {
            return Err(ParseAmountError::TooPrecise {
                input: input.to_string(),
                decimals,
            });
        }

        let digits_ok = |s: &str| s.chars().all(|c| c.is_ascii_digit());
        if !digits_ok(whole) || !digits_ok(fraction) || (whole.is_empty() && fraction.is_empty()) {
            return Err(ParseAmountError::InvalidDigit {
                input: input.to_string(),
            });
        }

        let overflow = || ParseAmountError::Overflow {
            input: input.to_string(),
        };

        let scale = 10u128.checked_pow(decimals as u32).ok_or_else(overflow)?;
        let whole_units = if whole.is_empty() {
            0
        } else {
            whole.parse::<u128>().map_err(|_| overflow())?
        };

        // Right-pad the fraction to the full precision
        let fraction_units = if fraction.is_empty() {
            0
        } else {
            let padded = format!("{:0<width$}", fraction, width = decimals as usize);
            padded.parse::<u128>().map_err(|_| overflow())?
        };

        whole_units
            .checked_mul(scale)
            .and_then(|v| v.checked_add(fraction_units))
            .map(Self)
            .ok_or_else(overflow)
    }

    /// Format as a decimal string with trailing zeros removed
    pub fn format_units(&self, decimals: u8) -> String {
        // Past 38 decimals the scale exceeds u128 and every value is a fraction
        let (whole, fraction) = match 10u128.checked_pow(decimals as u32) {
            Some(scale) => (self.0 / scale, self.0 % scale),
            None => (0, self.0),
        };
        if fraction == 0 {
            return whole.to_string();
        }
        let fraction = format!("{:0>width$}", fraction, width = decimals as usize);
        format!("{}.{}", whole, fraction.trim_end_matches('0'))
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u128> for Amount {
    fn from(value: u128) -> Self {
        Self(value)
    }
}
