//! FizzBuzz request parameters
//!
//! A [`FizzBuzzQuery`] identifies one distinct request shape. It is the unit
//! the statistics index counts, so equality and hashing are structural over
//! all five fields.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Result, ServiceError};

/// Separator used by [`FizzBuzzQuery::key`].
pub const KEY_SEPARATOR: char = ':';

/// The five parameters of a FizzBuzz request.
///
/// Field names on the wire are `int1`, `int2`, `limit`, `str1` and `str2`;
/// all of them are required when decoding.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FizzBuzzQuery {
    /// Positions divisible by this are replaced with `first_string`
    #[serde(rename = "int1")]
    pub first_divisor: i64,
    /// Positions divisible by this are replaced with `second_string`
    #[serde(rename = "int2")]
    pub second_divisor: i64,
    /// Length of the generated sequence
    pub limit: i64,
    #[serde(rename = "str1")]
    pub first_string: String,
    #[serde(rename = "str2")]
    pub second_string: String,
}

impl FizzBuzzQuery {
    /// Create a new query.
    pub fn new(
        first_divisor: i64,
        second_divisor: i64,
        limit: i64,
        first_string: impl Into<String>,
        second_string: impl Into<String>,
    ) -> Self {
        Self {
            first_divisor,
            second_divisor,
            limit,
            first_string: first_string.into(),
            second_string: second_string.into(),
        }
    }

    /// Canonical string key: `int1:int2:limit:str1:str2`.
    ///
    /// Used for logging and diagnostics. Two different queries can share a
    /// key when their strings contain `:`, so the index does not key on it.
    pub fn key(&self) -> String {
        format!(
            "{}{sep}{}{sep}{}{sep}{}{sep}{}",
            self.first_divisor,
            self.second_divisor,
            self.limit,
            self.first_string,
            self.second_string,
            sep = KEY_SEPARATOR,
        )
    }

    /// Collect every failed condition against `max_limit`.
    ///
    /// An empty vector means the query is valid.
    pub fn violations(&self, max_limit: u64) -> Vec<String> {
        let mut errors = Vec::new();

        if self.first_divisor <= 0 {
            errors.push("int1 must be greater than 0".to_string());
        }

        if self.second_divisor <= 0 {
            errors.push("int2 must be greater than 0".to_string());
        }

        if self.limit <= 0 {
            errors.push("limit must be greater than 0".to_string());
        } else if self.limit as u64 > max_limit {
            errors.push(format!(
                "limit exceeds maximum allowed value of {max_limit}"
            ));
        }

        if self.first_string.is_empty() {
            errors.push("str1 cannot be empty".to_string());
        }

        if self.second_string.is_empty() {
            errors.push("str2 cannot be empty".to_string());
        }

        errors
    }

    /// Validate against `max_limit`, reporting all violations at once.
    pub fn validate(&self, max_limit: u64) -> Result<()> {
        let details = self.violations(max_limit);
        if details.is_empty() {
            Ok(())
        } else {
            Err(ServiceError::validation("invalid parameters", details))
        }
    }
}

impl fmt::Display for FizzBuzzQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key())
    }
}
