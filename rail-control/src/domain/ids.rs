//! Opaque identifier types for players, connections and trains.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Error returned when parsing an empty or malformed identifier.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid {kind}: {reason}")]
pub struct InvalidIdentifier {
    kind: &'static str,
    reason: &'static str,
}

fn validate(kind: &'static str, s: &str) -> Result<String, InvalidIdentifier> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return Err(InvalidIdentifier {
            kind,
            reason: "must not be empty",
        });
    }
    if trimmed.chars().any(char::is_control) {
        return Err(InvalidIdentifier {
            kind,
            reason: "must not contain control characters",
        });
    }
    Ok(trimmed.to_string())
}

/// Defines a trimmed, non-empty, case-preserving string identifier.
macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident, $kind:literal) => {
        $(#[$meta])*
        #[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Parse an identifier, trimming surrounding whitespace.
            pub fn parse(s: &str) -> Result<Self, InvalidIdentifier> {
                validate($kind, s).map($name)
            }

            /// Returns the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl TryFrom<String> for $name {
            type Error = InvalidIdentifier;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                $name::parse(&value)
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

string_id!(
    /// Identifies a human controller across reconnects.
    PlayerId,
    "player id"
);

string_id!(
    /// Identifies one live transport connection.
    ConnectionId,
    "connection id"
);

string_id!(
    /// A train's running number, unique across the network.
    TrainNumber,
    "train number"
);

impl ConnectionId {
    /// Mint a fresh random connection id.
    pub fn generate() -> Self {
        ConnectionId(uuid::Uuid::new_v4().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_trims() {
        let p = PlayerId::parse("  alice ").unwrap();
        assert_eq!(p.as_str(), "alice");
    }

    #[test]
    fn case_is_preserved() {
        let a = TrainNumber::parse("g101").unwrap();
        let b = TrainNumber::parse("G101").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn reject_empty() {
        let err = PlayerId::parse("").unwrap_err();
        assert_eq!(err.to_string(), "invalid player id: must not be empty");
        assert!(TrainNumber::parse("  ").is_err());
    }

    #[test]
    fn debug_names_the_type() {
        let t = TrainNumber::parse("K7").unwrap();
        assert_eq!(format!("{:?}", t), "TrainNumber(K7)");
    }

    #[test]
    fn generated_connection_ids_differ() {
        assert_ne!(ConnectionId::generate(), ConnectionId::generate());
    }
}
