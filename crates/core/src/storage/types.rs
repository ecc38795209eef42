use std::fmt;

use crate::attribute::{AttributeValue, Item};
use crate::condition::{Condition, KeyCondition};

/// The unencoded key fields that name one item, in schema order.
///
/// Used both as point-lookup input and as the payload of
/// [`Error::NotFound`](super::Error::NotFound) /
/// [`Error::AlreadyExists`](super::Error::AlreadyExists), so equality is
/// structural.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NaturalKey(Vec<(String, AttributeValue)>);

impl NaturalKey {
    /// Creates an empty key.
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Appends a field, builder style.
    pub fn with(mut self, field: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        self.push(field, value);
        self
    }

    /// Appends a field, replacing an earlier value for the same field.
    pub fn push(&mut self, field: impl Into<String>, value: impl Into<AttributeValue>) {
        let field = field.into();
        let value = value.into();
        match self.0.iter_mut().find(|(name, _)| *name == field) {
            Some(slot) => slot.1 = value,
            None => self.0.push((field, value)),
        }
    }

    pub fn get(&self, field: &str) -> Option<&AttributeValue> {
        self.0
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, value)| value)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &AttributeValue)> {
        self.0.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for NaturalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (field, value)) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{field}={value}")?;
        }
        Ok(())
    }
}

/// Single-item write.
#[derive(Debug, Clone, PartialEq)]
pub struct PutItem {
    pub table_name: String,
    pub item: Item,
    pub condition: Option<Condition>,
}

/// Point lookup by full primary key.
#[derive(Debug, Clone, PartialEq)]
pub struct GetItem {
    pub table_name: String,
    pub key: Item,
    pub consistent_read: bool,
}

/// Single-item delete by full primary key.
#[derive(Debug, Clone, PartialEq)]
pub struct DeleteItem {
    pub table_name: String,
    pub key: Item,
    pub condition: Option<Condition>,
}

/// One page of a keyed query against the table or one of its indexes.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryRequest {
    pub table_name: String,
    pub index_name: Option<String>,
    pub key_condition: KeyCondition,
    pub scan_forward: bool,
    pub exclusive_start_key: Option<Item>,
    pub limit: Option<usize>,
    pub consistent_read: bool,
}

/// One page of an unkeyed scan over the table or one of its indexes.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanRequest {
    pub table_name: String,
    pub index_name: Option<String>,
    pub exclusive_start_key: Option<Item>,
    pub limit: Option<usize>,
    pub consistent_read: bool,
}

/// Items of one page plus the continuation key, if the store has more.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    pub items: Vec<Item>,
    pub last_evaluated_key: Option<Item>,
}

/// A put or delete inside a batch.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteRequest {
    Put(Item),
    Delete(Item),
}

/// One element of an atomic multi-item write.
#[derive(Debug, Clone, PartialEq)]
pub enum TransactItem {
    Put {
        table_name: String,
        item: Item,
        condition: Option<Condition>,
    },
    Delete {
        table_name: String,
        key: Item,
        condition: Option<Condition>,
    },
    ConditionCheck {
        table_name: String,
        key: Item,
        condition: Condition,
    },
}

impl TransactItem {
    pub fn table_name(&self) -> &str {
        match self {
            Self::Put { table_name, .. }
            | Self::Delete { table_name, .. }
            | Self::ConditionCheck { table_name, .. } => table_name,
        }
    }

    pub fn condition(&self) -> Option<&Condition> {
        match self {
            Self::Put { condition, .. } | Self::Delete { condition, .. } => condition.as_ref(),
            Self::ConditionCheck { condition, .. } => Some(condition),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_natural_key_push_replaces_existing_field() {
        let mut key = NaturalKey::new().with("name", "a");
        key.push("name", "b");

        assert_eq!(key.len(), 1);
        assert_eq!(key.get("name"), Some(&AttributeValue::from("b")));
    }

    #[test]
    fn test_natural_key_equality_is_ordered() {
        let a = NaturalKey::new().with("name", "a").with("version", 1);
        let b = NaturalKey::new().with("version", 1).with("name", "a");

        assert_ne!(a, b);
        assert_eq!(a, NaturalKey::new().with("name", "a").with("version", 1));
    }

    #[test]
    fn test_natural_key_display() {
        let key = NaturalKey::new().with("name", "x").with("version", 3);
        assert_eq!(key.to_string(), "name=x, version=3");
        assert_eq!(NaturalKey::new().to_string(), "");
    }
}
