// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Fixed-point amounts in the source token's 6-decimal precision.

use std::fmt;
use std::str::FromStr;

use alloy::primitives::U256;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Fractional digits of the bridged token.
pub const TOKEN_DECIMALS: u8 = 6;

const SCALE: u64 = 1_000_000;

/// Errors produced while parsing an amount.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AmountError {
    #[error("Invalid amount format: {0}")]
    InvalidFormat(String),

    #[error("Too many decimal places (max {TOKEN_DECIMALS})")]
    TooManyDecimals,

    #[error("Amount overflow")]
    Overflow,
}

/// Token amount stored as raw integer units (`amount × 10^6`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct UsdcAmount(u64);

impl UsdcAmount {
    pub const ZERO: Self = Self(0);

    /// Build from raw integer units.
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Build from whole token units.
    pub const fn from_whole(units: u64) -> Self {
        Self(units * SCALE)
    }

    /// Raw integer units.
    pub const fn raw(&self) -> u64 {
        self.0
    }

    /// Raw integer units as a contract argument.
    pub fn to_u256(&self) -> U256 {
        U256::from(self.0)
    }

    /// Strict parse: more than 6 fractional digits is an error, never truncated.
    pub fn parse(amount: &str) -> Result<Self, AmountError> {
        parse_fixed(amount, false)
    }

    /// Lenient parse for balances reported by the destination network, which
    /// may carry more precision than the token. Extra digits are dropped
    /// (rounded toward zero), so `≥` comparisons against a 6-digit threshold
    /// are unaffected.
    pub fn parse_floor(amount: &str) -> Result<Self, AmountError> {
        parse_fixed(amount, true)
    }
}

fn parse_fixed(amount: &str, truncate: bool) -> Result<UsdcAmount, AmountError> {
    let amount = amount.trim();
    let parts: Vec<&str> = amount.split('.').collect();

    if parts.len() > 2 || parts[0].is_empty() {
        return Err(AmountError::InvalidFormat(amount.to_string()));
    }
    if !parts[0].chars().all(|c| c.is_ascii_digit()) {
        return Err(AmountError::InvalidFormat(amount.to_string()));
    }

    let whole = parts[0]
        .parse::<u64>()
        .map_err(|_| AmountError::Overflow)?;

    let fraction = match parts.get(1) {
        Some(dec_str) => {
            if dec_str.is_empty() || !dec_str.chars().all(|c| c.is_ascii_digit()) {
                return Err(AmountError::InvalidFormat(amount.to_string()));
            }
            let digits = if dec_str.len() > TOKEN_DECIMALS as usize {
                if !truncate {
                    return Err(AmountError::TooManyDecimals);
                }
                &dec_str[..TOKEN_DECIMALS as usize]
            } else {
                dec_str
            };
            // Pad with zeros to match decimals
            let padded = format!("{:0<width$}", digits, width = TOKEN_DECIMALS as usize);
            padded
                .parse::<u64>()
                .map_err(|_| AmountError::InvalidFormat(amount.to_string()))?
        }
        None => 0,
    };

    whole
        .checked_mul(SCALE)
        .and_then(|w| w.checked_add(fraction))
        .map(UsdcAmount)
        .ok_or(AmountError::Overflow)
}

impl fmt::Display for UsdcAmount {
    /// Shortest decimal form: `5`, `5.5`, `0.000001`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let whole = self.0 / SCALE;
        let remainder = self.0 % SCALE;

        if remainder == 0 {
            write!(f, "{whole}")
        } else {
            let decimal_str = format!("{:0>width$}", remainder, width = TOKEN_DECIMALS as usize);
            write!(f, "{}.{}", whole, decimal_str.trim_end_matches('0'))
        }
    }
}

impl FromStr for UsdcAmount {
    type Err = AmountError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for UsdcAmount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Accepts both `"5.5"` and `5.5`. JSON numbers go through their shortest
/// textual form, so exponent notation is rejected like any other bad format.
impl<'de> Deserialize<'de> for UsdcAmount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = serde_json::Value::deserialize(deserializer)?;
        let text = match value {
            serde_json::Value::String(s) => s,
            serde_json::Value::Number(n) => n.to_string(),
            other => {
                return Err(serde::de::Error::custom(format!(
                    "amount must be a string or number, got {other}"
                )))
            }
        };
        UsdcAmount::parse(&text).map_err(serde::de::Error::custom)
    }
}
