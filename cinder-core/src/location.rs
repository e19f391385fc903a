#![forbid(unsafe_code)]
#![allow(unused_assignments)]

use std::fmt;

use miette::Diagnostic;
use serde::ser::{Serialize, SerializeStruct, Serializer};
use thiserror::Error;

/// Fully qualified identity of a nominal type: `<prefix>.<location>.<qualified identifier>`.
pub type TypeId = String;

pub const TRANSACTION_LOCATION_PREFIX: &str = "t";
pub const STRING_LOCATION_PREFIX: &str = "S";

/// Where a program (and therefore every type it declares) comes from.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Location {
    /// A transaction, identified by its script bytes.
    Transaction(Vec<u8>),
    /// A named location, used for scripts, tests and files.
    String(String),
}

impl Location {
    pub fn prefix(&self) -> &'static str {
        match self {
            Location::Transaction(_) => TRANSACTION_LOCATION_PREFIX,
            Location::String(_) => STRING_LOCATION_PREFIX,
        }
    }

    /// `<prefix>.<location>`
    pub fn id(&self) -> String {
        format!("{}.{}", self.prefix(), self)
    }

    pub fn type_id(&self, qualified_identifier: &str) -> TypeId {
        format!("{}.{}.{}", self.prefix(), self, qualified_identifier)
    }

    /// The qualified identifier part of a type ID, if it has one.
    pub fn qualified_identifier(type_id: &str) -> Option<&str> {
        type_id.splitn(3, '.').nth(2)
    }
}

impl Default for Location {
    fn default() -> Self {
        Location::String("test".to_string())
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::Transaction(bytes) => f.write_str(&hex::encode(bytes)),
            Location::String(name) => f.write_str(name),
        }
    }
}

impl Serialize for Location {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("Location", 2)?;
        match self {
            Location::Transaction(_) => {
                state.serialize_field("Type", "TransactionLocation")?;
                state.serialize_field("Transaction", &self.to_string())?;
            }
            Location::String(name) => {
                state.serialize_field("Type", "StringLocation")?;
                state.serialize_field("String", name)?;
            }
        }
        state.end()
    }
}

#[derive(Debug, Error, Diagnostic)]
#[diagnostic(code(cinder::location))]
pub enum LocationError {
    #[error("invalid type ID: missing prefix")]
    MissingPrefix,
    #[error("invalid type ID: missing location")]
    MissingLocation,
    #[error("invalid type ID: missing qualified identifier")]
    MissingQualifiedIdentifier,
    #[error("invalid type ID: unknown location prefix `{0}`")]
    UnknownPrefix(String),
    #[error("invalid transaction location type ID: invalid location")]
    InvalidLocation(#[from] hex::FromHexError),
}

/// Split a type ID back into its location and qualified identifier.
pub fn decode_type_id(type_id: &str) -> Result<(Location, String), LocationError> {
    if type_id.is_empty() {
        return Err(LocationError::MissingPrefix);
    }

    let parts: Vec<&str> = type_id.splitn(3, '.').collect();
    match parts.as_slice() {
        [_] => Err(LocationError::MissingLocation),
        [_, _] => Err(LocationError::MissingQualifiedIdentifier),
        [prefix, location, qualified] => {
            let location = match *prefix {
                TRANSACTION_LOCATION_PREFIX => Location::Transaction(hex::decode(location)?),
                STRING_LOCATION_PREFIX => Location::String((*location).to_string()),
                other => return Err(LocationError::UnknownPrefix(other.to_string())),
            };
            Ok((location, (*qualified).to_string()))
        }
        _ => Err(LocationError::MissingPrefix),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transaction_location_type_id_is_hex_encoded() {
        let location = Location::Transaction(vec![0x01, 0xab]);
        assert_eq!(location.id(), "t.01ab");
        assert_eq!(location.type_id("R.Nested"), "t.01ab.R.Nested");
        assert_eq!(Location::qualified_identifier("t.01ab.R.Nested"), Some("R.Nested"));
    }

    #[test]
    fn decode_round_trips_both_location_kinds() {
        let (location, qualified) = decode_type_id("t.01ab.R").unwrap();
        assert_eq!(location, Location::Transaction(vec![0x01, 0xab]));
        assert_eq!(qualified, "R");

        let (location, qualified) = decode_type_id("S.test.I").unwrap();
        assert_eq!(location, Location::String("test".to_string()));
        assert_eq!(qualified, "I");
    }

    #[test]
    fn decode_reports_missing_pieces() {
        assert!(matches!(decode_type_id(""), Err(LocationError::MissingPrefix)));
        assert!(matches!(decode_type_id("t"), Err(LocationError::MissingLocation)));
        assert!(matches!(
            decode_type_id("t.01"),
            Err(LocationError::MissingQualifiedIdentifier)
        ));
        assert!(matches!(
            decode_type_id("x.01.R"),
            Err(LocationError::UnknownPrefix(p)) if p == "x"
        ));
        assert!(matches!(
            decode_type_id("t.zz.R"),
            Err(LocationError::InvalidLocation(_))
        ));
    }

    #[test]
    fn transaction_location_serializes_like_a_tagged_record() {
        let json = serde_json::to_string(&Location::Transaction(vec![0xff])).unwrap();
        assert_eq!(json, r#"{"Type":"TransactionLocation","Transaction":"ff"}"#);
    }
}
