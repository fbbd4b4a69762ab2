//! Two-letter country codes.

use std::fmt;

use crate::{Error, Result};

/// An ISO 3166-1 alpha-2 country code: exactly two uppercase ASCII letters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CountryCode([u8; 2]);

impl CountryCode {
    /// Parse a country code.
    ///
    /// Only two uppercase ASCII letters are accepted; lowercase input is
    /// rejected rather than normalized.
    pub fn new(code: &str) -> Result<Self> {
        match code.as_bytes() {
            [a, b] if a.is_ascii_uppercase() && b.is_ascii_uppercase() => Ok(Self([*a, *b])),
            _ => Err(Error::InvalidCountryCode(code.to_string())),
        }
    }

    /// Decode the two raw bytes of an on-disk record.
    ///
    /// Returns `None` for the all-zero "no country" marker and for bytes
    /// that are not a valid code.
    pub fn from_bytes(bytes: [u8; 2]) -> Option<Self> {
        if bytes.iter().all(|b| b.is_ascii_uppercase()) {
            Some(Self(bytes))
        } else {
            None
        }
    }

    /// The two raw bytes of this code.
    pub fn to_bytes(self) -> [u8; 2] {
        self.0
    }

    /// Get the string representation.
    pub fn as_str(&self) -> &str {
        // Construction only admits ASCII letters.
        std::str::from_utf8(&self.0).unwrap_or("")
    }
}

impl fmt::Display for CountryCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for CountryCode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_country_code_parse() {
        assert_eq!(CountryCode::new("DE").unwrap().as_str(), "DE");
        assert_eq!("US".parse::<CountryCode>().unwrap().to_string(), "US");
    }

    #[test]
    fn test_country_code_rejects_invalid() {
        assert!(CountryCode::new("de").is_err());
        assert!(CountryCode::new("D").is_err());
        assert!(CountryCode::new("DEU").is_err());
        assert!(CountryCode::new("D1").is_err());
        assert!(CountryCode::new("").is_err());
    }

    #[test]
    fn test_country_code_from_bytes() {
        assert_eq!(CountryCode::from_bytes(*b"FR"), Some(CountryCode::new("FR").unwrap()));
        assert_eq!(CountryCode::from_bytes([0, 0]), None);
        assert_eq!(CountryCode::new("NL").unwrap().to_bytes(), *b"NL");
    }
}
