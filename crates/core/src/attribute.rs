//! Attribute values and item accessors.
//!
//! [`AttributeValue`] mirrors the store's wire types without depending on any
//! SDK. The `get_*` helpers read typed fields back out of an [`Item`] and are
//! what `Entity::from_item` implementations are written with.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::storage::Error;

/// A stored record: attribute name to value.
pub type Item = HashMap<String, AttributeValue>;

/// A single attribute value.
///
/// Numbers are kept as decimal text, exactly as the store transmits them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttributeValue {
    S(String),
    N(String),
    B(Vec<u8>),
    Bool(bool),
    Null,
    L(Vec<AttributeValue>),
    M(HashMap<String, AttributeValue>),
    Ss(Vec<String>),
}

impl AttributeValue {
    /// Short wire name of the value's type.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::S(_) => "S",
            Self::N(_) => "N",
            Self::B(_) => "B",
            Self::Bool(_) => "BOOL",
            Self::Null => "NULL",
            Self::L(_) => "L",
            Self::M(_) => "M",
            Self::Ss(_) => "SS",
        }
    }

    pub fn as_s(&self) -> Option<&str> {
        match self {
            Self::S(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_n(&self) -> Option<&str> {
        match self {
            Self::N(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_b(&self) -> Option<&[u8]> {
        match self {
            Self::B(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Text used when this value contributes to a composite key.
    ///
    /// Only string and number values have one.
    pub fn key_text(&self) -> Option<String> {
        match self {
            Self::S(s) => Some(s.clone()),
            Self::N(n) => Some(n.clone()),
            _ => None,
        }
    }

    /// Empty strings, empty binaries and numeric zero are not valid hash keys.
    pub fn is_empty_key(&self) -> bool {
        match self {
            Self::S(s) => s.is_empty(),
            Self::B(b) => b.is_empty(),
            Self::N(n) => n.parse::<f64>().map(|v| v == 0.0).unwrap_or(n.is_empty()),
            Self::Null => true,
            _ => false,
        }
    }
}

/// Total order used for key attributes.
///
/// Strings and binaries compare bytewise, numbers numerically (falling back to
/// their text to keep the order consistent with equality). Values of
/// different types order by type.
pub fn compare_keys(a: &AttributeValue, b: &AttributeValue) -> Ordering {
    match (a, b) {
        (AttributeValue::S(a), AttributeValue::S(b)) => a.as_bytes().cmp(b.as_bytes()),
        (AttributeValue::B(a), AttributeValue::B(b)) => a.cmp(b),
        (AttributeValue::N(a), AttributeValue::N(b)) => match (a.parse::<f64>(), b.parse::<f64>()) {
            (Ok(x), Ok(y)) => x
                .partial_cmp(&y)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.cmp(b)),
            _ => a.cmp(b),
        },
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

fn type_rank(value: &AttributeValue) -> u8 {
    match value {
        AttributeValue::Null => 0,
        AttributeValue::Bool(_) => 1,
        AttributeValue::N(_) => 2,
        AttributeValue::S(_) => 3,
        AttributeValue::B(_) => 4,
        AttributeValue::Ss(_) => 5,
        AttributeValue::L(_) => 6,
        AttributeValue::M(_) => 7,
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::S(s) => f.write_str(s),
            Self::N(n) => f.write_str(n),
            Self::B(bytes) => {
                f.write_str("0x")?;
                for byte in bytes {
                    write!(f, "{byte:02x}")?;
                }
                Ok(())
            }
            Self::Bool(b) => write!(f, "{b}"),
            Self::Null => f.write_str("null"),
            other => write!(f, "{other:?}"),
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        Self::S(value.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        Self::S(value)
    }
}

impl From<&String> for AttributeValue {
    fn from(value: &String) -> Self {
        Self::S(value.clone())
    }
}

macro_rules! number_from {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for AttributeValue {
                fn from(value: $ty) -> Self {
                    Self::N(value.to_string())
                }
            }
        )*
    };
}

number_from!(i32, i64, u32, u64, usize, f64);

impl From<bool> for AttributeValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<Vec<u8>> for AttributeValue {
    fn from(value: Vec<u8>) -> Self {
        Self::B(value)
    }
}

/// Datetimes are stored as RFC 3339 UTC text with millisecond precision so
/// that their lexicographic order matches their chronological order.
impl From<DateTime<Utc>> for AttributeValue {
    fn from(value: DateTime<Utc>) -> Self {
        Self::S(value.to_rfc3339_opts(SecondsFormat::Millis, true))
    }
}

// ============================================================================
// Item accessors
// ============================================================================

/// Get a required string attribute.
pub fn get_string(item: &Item, key: &str) -> Result<String, Error> {
    get_optional_string(item, key)
        .ok_or_else(|| Error::InvalidData(format!("Missing or invalid field: {key}")))
}

/// Get an optional string attribute.
pub fn get_optional_string(item: &Item, key: &str) -> Option<String> {
    item.get(key).and_then(|v| v.as_s()).map(|s| s.to_string())
}

/// Get a required number attribute.
pub fn get_number<T: FromStr>(item: &Item, key: &str) -> Result<T, Error> {
    get_optional_number(item, key)?
        .ok_or_else(|| Error::InvalidData(format!("Missing or invalid field: {key}")))
}

/// Get an optional number attribute. A present but unparsable value is an error.
pub fn get_optional_number<T: FromStr>(item: &Item, key: &str) -> Result<Option<T>, Error> {
    match item.get(key).and_then(|v| v.as_n()) {
        Some(n) => n
            .parse()
            .map(Some)
            .map_err(|_| Error::InvalidData(format!("Invalid number {key}: {n}"))),
        None => Ok(None),
    }
}

/// Get a required boolean attribute.
pub fn get_bool(item: &Item, key: &str) -> Result<bool, Error> {
    item.get(key)
        .and_then(|v| v.as_bool())
        .ok_or_else(|| Error::InvalidData(format!("Missing or invalid field: {key}")))
}

/// Get a required binary attribute.
pub fn get_binary(item: &Item, key: &str) -> Result<Vec<u8>, Error> {
    item.get(key)
        .and_then(|v| v.as_b())
        .map(|b| b.to_vec())
        .ok_or_else(|| Error::InvalidData(format!("Missing or invalid field: {key}")))
}

/// Get a required datetime attribute (RFC 3339 format).
pub fn get_datetime(item: &Item, key: &str) -> Result<DateTime<Utc>, Error> {
    let s = get_string(item, key)?;
    parse_datetime(key, &s)
}

/// Get an optional datetime attribute (RFC 3339 format).
pub fn get_optional_datetime(item: &Item, key: &str) -> Result<Option<DateTime<Utc>>, Error> {
    get_optional_string(item, key)
        .map(|s| parse_datetime(key, &s))
        .transpose()
}

fn parse_datetime(key: &str, s: &str) -> Result<DateTime<Utc>, Error> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::InvalidData(format!("Invalid datetime {key}: {e}")))
}

/// Get a nested value stored as JSON text.
pub fn get_json<T: DeserializeOwned>(item: &Item, key: &str) -> Result<T, Error> {
    let json = get_string(item, key)?;
    serde_json::from_str(&json).map_err(|e| Error::Serialization(e.to_string()))
}

/// Encode a nested value as JSON text.
pub fn json_value<T: Serialize>(value: &T) -> Result<AttributeValue, Error> {
    serde_json::to_string(value)
        .map(AttributeValue::S)
        .map_err(|e| Error::Serialization(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(pairs: &[(&str, AttributeValue)]) -> Item {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_numbers_compare_numerically() {
        let two = AttributeValue::from(2);
        let ten = AttributeValue::from(10);
        assert_eq!(compare_keys(&two, &ten), Ordering::Less);
        assert_eq!(compare_keys(&ten, &two), Ordering::Greater);
        assert_eq!(
            compare_keys(&AttributeValue::from(-1.5), &AttributeValue::from(0)),
            Ordering::Less
        );
    }

    #[test]
    fn test_strings_compare_bytewise() {
        let upper = AttributeValue::from("B");
        let lower = AttributeValue::from("a");
        assert_eq!(compare_keys(&upper, &lower), Ordering::Less);
        assert_eq!(
            compare_keys(&AttributeValue::from("10"), &AttributeValue::from("2")),
            Ordering::Less
        );
    }

    #[test]
    fn test_number_order_is_consistent_with_equality() {
        let a = AttributeValue::N("1".to_string());
        let b = AttributeValue::N("1.0".to_string());
        assert_ne!(compare_keys(&a, &b), Ordering::Equal);
    }

    #[test]
    fn test_empty_keys() {
        assert!(AttributeValue::from("").is_empty_key());
        assert!(AttributeValue::from(0).is_empty_key());
        assert!(AttributeValue::from(Vec::new()).is_empty_key());
        assert!(!AttributeValue::from("x").is_empty_key());
        assert!(!AttributeValue::from(-3).is_empty_key());
    }

    #[test]
    fn test_key_text() {
        assert_eq!(AttributeValue::from("a").key_text(), Some("a".to_string()));
        assert_eq!(AttributeValue::from(42).key_text(), Some("42".to_string()));
        assert_eq!(AttributeValue::from(vec![1u8]).key_text(), None);
        assert_eq!(AttributeValue::Bool(true).key_text(), None);
    }

    #[test]
    fn test_datetime_round_trip() {
        let dt = DateTime::parse_from_rfc3339("2024-01-15T10:30:00.250Z")
            .unwrap()
            .with_timezone(&Utc);
        let item = item(&[("createdAt", AttributeValue::from(dt))]);

        assert_eq!(
            item.get("createdAt").unwrap().as_s().unwrap(),
            "2024-01-15T10:30:00.250Z"
        );
        assert_eq!(get_datetime(&item, "createdAt").unwrap(), dt);
    }

    #[test]
    fn test_get_string_missing_field() {
        let item = Item::new();
        assert_eq!(
            get_string(&item, "missing"),
            Err(Error::InvalidData("Missing or invalid field: missing".to_string()))
        );
    }

    #[test]
    fn test_get_number() {
        let item = item(&[
            ("version", AttributeValue::from(7)),
            ("bad", AttributeValue::N("x".to_string())),
        ]);

        assert_eq!(get_number::<i64>(&item, "version").unwrap(), 7);
        assert_eq!(get_optional_number::<i64>(&item, "absent").unwrap(), None);
        assert!(get_number::<i64>(&item, "bad").is_err());
    }

    #[test]
    fn test_json_round_trip() {
        let tags = vec!["a".to_string(), "b".to_string()];
        let item = item(&[("tags", json_value(&tags).unwrap())]);

        let parsed: Vec<String> = get_json(&item, "tags").unwrap();
        assert_eq!(parsed, tags);
    }

    #[test]
    fn test_binary_display_is_hex() {
        assert_eq!(AttributeValue::from(vec![0x0a, 0xff]).to_string(), "0x0aff");
    }
}
