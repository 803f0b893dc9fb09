//! Chilean RUT validation and canonical formatting.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

const MIN_BODY_DIGITS: usize = 7;
const MAX_BODY_DIGITS: usize = 9;

/// A checksum-validated national identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Rut {
    digits: String,
    check_digit: char,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RutError {
    #[error("El RUT es obligatorio")]
    Empty,
    #[error("Formato de RUT inválido: {0}")]
    Malformed(String),
    #[error("RUT inválido: {0}")]
    ChecksumMismatch(String),
}

impl Rut {
    /// Parse a RUT written with or without dots and dash, e.g. `12.345.678-5`
    /// or `123456785`. The check digit may be a lowercase `k`.
    pub fn parse(raw: &str) -> Result<Self, RutError> {
        let compact = compact_form(raw);
        let Some(check_digit) = compact.chars().last() else {
            return Err(RutError::Empty);
        };
        let digits = &compact[..compact.len() - check_digit.len_utf8()];
        if digits.is_empty() {
            return Err(RutError::Malformed(raw.trim().to_string()));
        }

        if !(MIN_BODY_DIGITS..=MAX_BODY_DIGITS).contains(&digits.len())
            || !digits.bytes().all(|b| b.is_ascii_digit())
        {
            return Err(RutError::Malformed(raw.trim().to_string()));
        }
        if !(check_digit.is_ascii_digit() || check_digit == 'K') {
            return Err(RutError::Malformed(raw.trim().to_string()));
        }

        if expected_check_digit(digits) != check_digit {
            return Err(RutError::ChecksumMismatch(raw.trim().to_string()));
        }

        Ok(Self {
            digits: digits.to_string(),
            check_digit,
        })
    }

    pub fn check_digit(&self) -> char {
        self.check_digit
    }

    /// Separator-free, uppercase form used for equality against stored cells.
    pub fn compact(&self) -> String {
        format!("{}{}", self.digits, self.check_digit)
    }

    /// Dot-grouped display form, e.g. `12.345.678-5`.
    pub fn display_form(&self) -> String {
        let mut groups: Vec<&str> = Vec::new();
        let mut end = self.digits.len();
        while end > 0 {
            let start = end.saturating_sub(3);
            groups.push(&self.digits[start..end]);
            end = start;
        }
        groups.reverse();
        format!("{}-{}", groups.join("."), self.check_digit)
    }
}

/// Strip dots, dashes and surrounding whitespace and uppercase the check digit.
pub fn compact_form(raw: &str) -> String {
    raw.trim()
        .chars()
        .filter(|c| *c != '.' && *c != '-')
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

/// Weighted modulo-11 check digit over the decimal digits of `digits`.
/// Non-digit bytes are skipped.
fn expected_check_digit(digits: &str) -> char {
    let sum: u32 = digits
        .bytes()
        .filter(u8::is_ascii_digit)
        .rev()
        .zip((2..=7).cycle())
        .map(|(byte, weight)| u32::from(byte - b'0') * weight)
        .sum();

    match 11 - (sum % 11) {
        11 => '0',
        10 => 'K',
        remainder => char::from_digit(remainder, 10).unwrap_or('0'),
    }
}

impl fmt::Display for Rut {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display_form())
    }
}

impl FromStr for Rut {
    type Err = RutError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Rut::parse(s)
    }
}

impl Serialize for Rut {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.display_form())
    }
}

impl<'de> Deserialize<'de> for Rut {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Rut::parse(&raw).map_err(serde::de::Error::custom)
    }
}
