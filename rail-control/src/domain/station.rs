//! Station identifier type.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Error returned when parsing an invalid station identifier.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid station id: {reason}")]
pub struct InvalidStationId {
    reason: &'static str,
}

/// A station identifier in canonical form.
///
/// Station ids are case-insensitive. Every `StationId` holds the trimmed,
/// upper-cased form of its input, so two ids that differ only in casing
/// or surrounding whitespace compare equal and hash identically.
///
/// # Examples
///
/// ```
/// use rail_control::domain::StationId;
///
/// let a = StationId::parse("Riverside").unwrap();
/// let b = StationId::parse("  RIVERSIDE ").unwrap();
/// assert_eq!(a, b);
/// assert_eq!(a.as_str(), "RIVERSIDE");
///
/// assert!(StationId::parse("   ").is_err());
/// ```
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct StationId(String);

impl StationId {
    /// Parse a station id, normalising it to canonical form.
    pub fn parse(s: &str) -> Result<Self, InvalidStationId> {
        let trimmed = s.trim();

        if trimmed.is_empty() {
            return Err(InvalidStationId {
                reason: "must not be empty",
            });
        }

        if trimmed.chars().any(char::is_control) {
            return Err(InvalidStationId {
                reason: "must not contain control characters",
            });
        }

        Ok(StationId(trimmed.to_uppercase()))
    }

    /// Returns the canonical id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for StationId {
    type Error = InvalidStationId;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        StationId::parse(&value)
    }
}

impl From<StationId> for String {
    fn from(id: StationId) -> Self {
        id.0
    }
}

impl fmt::Debug for StationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StationId({})", self.0)
    }
}

impl fmt::Display for StationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Casing never changes identity
        #[test]
        fn case_insensitive(s in "[a-zA-Z][a-zA-Z ]{0,10}") {
            let lower = StationId::parse(&s.to_lowercase()).unwrap();
            let upper = StationId::parse(&s.to_uppercase()).unwrap();
            prop_assert_eq!(lower, upper);
        }

        /// Parsing the canonical form is a fixed point
        #[test]
        fn canonical_is_stable(s in "[a-zA-Z0-9][a-zA-Z0-9 _-]{0,12}") {
            let once = StationId::parse(&s).unwrap();
            let twice = StationId::parse(once.as_str()).unwrap();
            prop_assert_eq!(once, twice);
        }
    }
}
