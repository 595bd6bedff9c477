//! Phone number normalization.
//!
//! Rewrites the four accepted input shapes into one canonical
//! `+<country code><subscriber>` form:
//!
//! ```text
//! +256701234567   already canonical
//!  256701234567   canonical digits, no leading '+'
//!   0701234567    local leading-zero form
//!    701234567    bare subscriber number
//! ```
//!
//! Spaces, dashes, dots and parentheses are ignored. Anything else is
//! rejected with a human-readable reason.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// A phone number that passed normalization.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CanonicalNumber(String);

impl CanonicalNumber {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for CanonicalNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CanonicalNumber {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Numbering plan used to normalize numbers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhoneNormalizer {
    country_code: String,
    subscriber_digits: usize,
}

impl Default for PhoneNormalizer {
    fn default() -> Self {
        Self::new("256", 9)
    }
}

impl PhoneNormalizer {
    /// Create a normalizer for a country code (digits only, no '+') and a
    /// fixed subscriber number length.
    pub fn new(country_code: &str, subscriber_digits: usize) -> Self {
        Self {
            country_code: country_code.trim_start_matches('+').to_string(),
            subscriber_digits,
        }
    }

    pub fn from_config(config: &crate::config::PhoneConfig) -> Self {
        Self::new(&config.country_code, config.subscriber_digits)
    }

    pub fn country_code(&self) -> &str {
        &self.country_code
    }

    /// Normalize one free-form phone number.
    pub fn normalize(&self, raw: &str) -> Result<CanonicalNumber, ValidationError> {
        let reject = |reason: String| ValidationError::InvalidPhone {
            input: raw.to_string(),
            reason,
        };

        let compact: String = raw
            .chars()
            .filter(|c| !matches!(c, ' ' | '-' | '.' | '(' | ')' | '\t'))
            .collect();
        if compact.is_empty() {
            return Err(reject("phone number is empty".into()));
        }

        let (has_plus, digits) = match compact.strip_prefix('+') {
            Some(rest) => (true, rest),
            None => (false, compact.as_str()),
        };
        if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
            return Err(reject("only digits and a leading '+' are allowed".into()));
        }

        let cc = self.country_code.as_str();
        let n = self.subscriber_digits;

        let subscriber = if has_plus {
            if !digits.starts_with(cc) {
                return Err(reject(format!("international numbers must start with +{cc}")));
            }
            if digits.len() != cc.len() + n {
                return Err(reject(format!(
                    "expected +{cc} followed by {n} digits, got {} digits",
                    digits.len().saturating_sub(cc.len())
                )));
            }
            &digits[cc.len()..]
        } else if digits.len() == cc.len() + n && digits.starts_with(cc) {
            &digits[cc.len()..]
        } else if digits.len() == n + 1 && digits.starts_with('0') {
            &digits[1..]
        } else if digits.len() == n {
            digits
        } else {
            return Err(reject(format!(
                "expected {n} digits, 0 followed by {n} digits, or {cc} followed by {n} digits"
            )));
        };

        if subscriber.starts_with('0') {
            return Err(reject("subscriber number cannot start with 0".into()));
        }

        Ok(CanonicalNumber(format!("+{cc}{subscriber}")))
    }

    /// Normalize a list of numbers, failing on the first invalid one.
    /// Duplicates are collapsed, keeping the first occurrence.
    pub fn normalize_all<S: AsRef<str>>(
        &self,
        raw: &[S],
    ) -> Result<Vec<CanonicalNumber>, ValidationError> {
        let mut out: Vec<CanonicalNumber> = Vec::with_capacity(raw.len());
        for r in raw {
            let number = self.normalize(r.as_ref())?;
            if !out.contains(&number) {
                out.push(number);
            }
        }
        Ok(out)
    }
}

/// Normalize with the default numbering plan (+256, 9 subscriber digits).
pub fn normalize(raw: &str) -> Result<CanonicalNumber, ValidationError> {
    PhoneNormalizer::default().normalize(raw)
}
