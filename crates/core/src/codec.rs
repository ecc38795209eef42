//! Key codec: entity values to stored items and back.
//!
//! `Entity::to_item` only maps declared fields. This module adds the derived
//! composite key attributes, validates separators, restores composite source
//! fields from index projections and turns [`NaturalKey`]s into the key
//! attributes the store understands. Every failure here happens before I/O.

use crate::attribute::{AttributeValue, Item};
use crate::schema::{AttributeType, CompositeKeySpec, EntitySchema, KeyAttribute, KeySchema};
use crate::storage::{Entity, Error, NaturalKey, Result, ValidationError};

// ============================================================================
// Entities
// ============================================================================

/// Encodes an entity into its stored form, composite attributes included.
pub fn encode<E: Entity>(entity: &E) -> Result<Item> {
    let mut item = entity.to_item()?;
    inject_composites(E::schema(), &mut item)?;
    Ok(item)
}

/// Decodes a stored item, which may be a partial index projection.
pub fn decode<E: Entity>(item: &Item) -> Result<E> {
    let item = restore_composites(E::schema(), item)?;
    E::from_item(&item)
}

/// Adds every composite attribute of `schema` to `item`.
pub fn inject_composites(schema: &EntitySchema, item: &mut Item) -> Result<()> {
    for spec in &schema.composites {
        let value = compose(spec, |field| item.get(field))?;
        item.insert(spec.attribute.clone(), AttributeValue::S(value));
    }
    Ok(())
}

/// Fills in composite source fields that a projection left out.
///
/// Specs are handled independently, each split on its own separator.
pub fn restore_composites(schema: &EntitySchema, item: &Item) -> Result<Item> {
    let mut restored = item.clone();
    for spec in &schema.composites {
        if spec.fields.iter().all(|f| item.contains_key(&f.name)) {
            continue;
        }
        let Some(composite) = item.get(&spec.attribute) else {
            continue;
        };
        let text = composite.as_s().ok_or_else(|| {
            Error::InvalidData(format!("Composite attribute {} is not a string", spec.attribute))
        })?;
        for (field, value) in split(spec, text)? {
            restored.entry(field).or_insert(value);
        }
    }
    Ok(restored)
}

/// Joins the source values of one composite attribute.
pub fn compose<'a, F>(spec: &CompositeKeySpec, lookup: F) -> Result<String>
where
    F: Fn(&str) -> Option<&'a AttributeValue>,
{
    let mut parts = Vec::with_capacity(spec.fields.len());
    for field in &spec.fields {
        let value = lookup(&field.name).ok_or_else(|| ValidationError::MissingField {
            field: field.name.clone(),
        })?;
        if field.attribute_type == AttributeType::Binary {
            return Err(ValidationError::UnsupportedCompositeValue {
                attribute: spec.attribute.clone(),
                field: field.name.clone(),
                actual: value.type_name(),
            }
            .into());
        }
        check_type(field, value)?;
        let text = value.key_text().ok_or_else(|| ValidationError::UnsupportedCompositeValue {
            attribute: spec.attribute.clone(),
            field: field.name.clone(),
            actual: value.type_name(),
        })?;
        if text.contains(spec.separator) {
            return Err(ValidationError::SeparatorInValue {
                attribute: spec.attribute.clone(),
                field: field.name.clone(),
                value: text,
                separator: spec.separator,
            }
            .into());
        }
        parts.push(text);
    }
    Ok(parts.join(&spec.separator.to_string()))
}

fn split(spec: &CompositeKeySpec, text: &str) -> Result<Vec<(String, AttributeValue)>> {
    let parts: Vec<&str> = text.split(spec.separator).collect();
    if parts.len() != spec.fields.len() {
        return Err(Error::InvalidData(format!(
            "Composite attribute {} has {} parts, expected {}",
            spec.attribute,
            parts.len(),
            spec.fields.len()
        )));
    }
    spec.fields
        .iter()
        .zip(parts)
        .map(|(field, part)| {
            let value = match field.attribute_type {
                AttributeType::String => AttributeValue::S(part.to_string()),
                AttributeType::Number => {
                    part.parse::<f64>().map_err(|_| {
                        Error::InvalidData(format!("Invalid number {}: {part}", field.name))
                    })?;
                    AttributeValue::N(part.to_string())
                }
                AttributeType::Binary => {
                    return Err(Error::InvalidData(format!(
                        "Binary field {} cannot be restored from {}",
                        field.name, spec.attribute
                    )))
                }
            };
            Ok((field.name.clone(), value))
        })
        .collect()
}

// ============================================================================
// Natural keys
// ============================================================================

/// The natural primary key of an encoded item.
pub fn natural_key(schema: &EntitySchema, item: &Item) -> Result<NaturalKey> {
    let mut key = NaturalKey::new();
    for attribute in schema.primary_key.attributes() {
        for field in schema.natural_fields(attribute) {
            let value = item.get(&field.name).ok_or_else(|| ValidationError::MissingField {
                field: field.name.clone(),
            })?;
            key.push(field.name, value.clone());
        }
    }
    Ok(key)
}

/// Encodes a complete natural primary key into table key attributes.
///
/// The key must name exactly the primary key fields, and hash fields must
/// not be empty.
pub fn primary_key_item(schema: &EntitySchema, key: &NaturalKey) -> Result<Item> {
    let expected: Vec<KeyAttribute> = schema
        .primary_key
        .attributes()
        .flat_map(|attribute| schema.natural_fields(attribute))
        .collect();
    for (field, _) in key.fields() {
        if !expected.iter().any(|f| f.name == field) {
            return Err(ValidationError::UnexpectedKeyField {
                field: field.to_string(),
            }
            .into());
        }
    }

    let mut item = Item::new();
    item.insert(
        schema.primary_key.hash.name.clone(),
        hash_key_value(schema, &schema.primary_key, key)?,
    );
    if let Some(range) = &schema.primary_key.range {
        item.insert(range.name.clone(), key_value(schema, range, key)?);
    }
    Ok(item)
}

/// Key attributes of the table's primary key, copied out of an encoded item.
pub fn primary_key_of(schema: &EntitySchema, item: &Item) -> Result<Item> {
    key_attributes_of(&schema.primary_key, item)
}

/// Encoded hash value for a query against `key_schema`.
///
/// Every natural hash field must be present and non-empty.
pub fn hash_key_value(
    schema: &EntitySchema,
    key_schema: &KeySchema,
    key: &NaturalKey,
) -> Result<AttributeValue> {
    for field in schema.natural_fields(&key_schema.hash) {
        let value = key.get(&field.name).ok_or_else(|| ValidationError::MissingField {
            field: field.name.clone(),
        })?;
        check_type(&field, value)?;
        if value.is_empty_key() {
            return Err(ValidationError::EmptyHashKey { field: field.name }.into());
        }
    }
    key_value(schema, &key_schema.hash, key)
}

/// Encoded value of one key attribute, composing it when needed.
pub fn key_value(
    schema: &EntitySchema,
    attribute: &KeyAttribute,
    key: &NaturalKey,
) -> Result<AttributeValue> {
    match schema.composite(&attribute.name) {
        Some(spec) => compose(spec, |field| key.get(field)).map(AttributeValue::S),
        None => {
            let value = key.get(&attribute.name).ok_or_else(|| ValidationError::MissingField {
                field: attribute.name.clone(),
            })?;
            check_type(attribute, value)?;
            Ok(value.clone())
        }
    }
}

/// Exclusive start key for resuming after `item`.
///
/// The store needs the table's primary key plus, for a secondary index, the
/// index key.
pub fn cursor_key(schema: &EntitySchema, index_key: Option<&KeySchema>, item: &Item) -> Result<Item> {
    let mut cursor = primary_key_of(schema, item)?;
    if let Some(index_key) = index_key {
        cursor.extend(key_attributes_of(index_key, item)?);
    }
    Ok(cursor)
}

fn key_attributes_of(key_schema: &KeySchema, item: &Item) -> Result<Item> {
    key_schema
        .attributes()
        .map(|attribute| {
            item.get(&attribute.name)
                .map(|value| (attribute.name.clone(), value.clone()))
                .ok_or_else(|| {
                    Error::from(ValidationError::MissingField {
                        field: attribute.name.clone(),
                    })
                })
        })
        .collect()
}

fn check_type(field: &KeyAttribute, value: &AttributeValue) -> std::result::Result<(), ValidationError> {
    let expected = field.attribute_type.as_str();
    if value.type_name() != expected {
        return Err(ValidationError::KeyTypeMismatch {
            field: field.name.clone(),
            expected,
            actual: value.type_name(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::LazyLock;

    use super::*;
    use crate::attribute::{get_number, get_string};
    use crate::schema::Projection;

    #[derive(Debug, Clone, PartialEq)]
    struct Release {
        name: String,
        branch: String,
        date: String,
        version: i64,
    }

    static RELEASE_SCHEMA: LazyLock<EntitySchema> = LazyLock::new(|| {
        EntitySchema::new("Release", KeyAttribute::string("name_branch"))
            .with_range(KeyAttribute::string("date"))
            .with_composite(
                "name_branch",
                vec![KeyAttribute::string("name"), KeyAttribute::string("branch")],
                '@',
            )
            .with_composite(
                "name_version",
                vec![KeyAttribute::string("name"), KeyAttribute::number("version")],
                ':',
            )
            .with_index(
                "nameVersion",
                KeySchema::new(KeyAttribute::string("name_version"))
                    .with_range(KeyAttribute::string("date")),
                Projection::KeysOnly,
            )
    });

    impl Entity for Release {
        fn schema() -> &'static EntitySchema {
            &RELEASE_SCHEMA
        }

        fn to_item(&self) -> Result<Item> {
            let mut item = Item::new();
            item.insert("name".to_string(), self.name.as_str().into());
            item.insert("branch".to_string(), self.branch.as_str().into());
            item.insert("date".to_string(), self.date.as_str().into());
            item.insert("version".to_string(), self.version.into());
            Ok(item)
        }

        fn from_item(item: &Item) -> Result<Self> {
            Ok(Self {
                name: get_string(item, "name")?,
                branch: get_string(item, "branch")?,
                date: get_string(item, "date")?,
                version: get_number(item, "version")?,
            })
        }
    }

    fn release(name: &str, branch: &str) -> Release {
        Release {
            name: name.to_string(),
            branch: branch.to_string(),
            date: "2024-01-01".to_string(),
            version: 3,
        }
    }

    #[test]
    fn test_encode_injects_composites() {
        let item = encode(&release("api", "main")).unwrap();

        assert_eq!(item.get("name_branch"), Some(&AttributeValue::from("api@main")));
        assert_eq!(item.get("name_version"), Some(&AttributeValue::from("api:3")));
        assert_eq!(item.get("name"), Some(&AttributeValue::from("api")));
    }

    #[test]
    fn test_round_trip() {
        let value = release("api", "main");
        let decoded: Release = decode(&encode(&value).unwrap()).unwrap();
        assert_eq!(decoded, value);
    }

    #[test]
    fn test_separator_in_value_is_rejected() {
        let error = encode(&release("api", "feature@x")).unwrap_err();
        assert_eq!(
            error,
            Error::Validation(ValidationError::SeparatorInValue {
                attribute: "name_branch".to_string(),
                field: "branch".to_string(),
                value: "feature@x".to_string(),
                separator: '@',
            })
        );
    }

    #[test]
    fn test_separators_are_validated_per_spec() {
        // ':' is only reserved by name_version, which does not use branch.
        let item = encode(&release("api", "fix:1")).unwrap();
        assert_eq!(item.get("name_branch"), Some(&AttributeValue::from("api@fix:1")));

        let error = encode(&release("a:pi", "main")).unwrap_err();
        assert!(matches!(
            error,
            Error::Validation(ValidationError::SeparatorInValue { separator: ':', .. })
        ));
    }

    #[test]
    fn test_decode_keys_only_projection() {
        let projection: Item = [
            ("name_branch", AttributeValue::from("api@main")),
            ("date", AttributeValue::from("2024-01-01")),
            ("name_version", AttributeValue::from("api:3")),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();

        let decoded: Release = decode(&projection).unwrap();
        assert_eq!(decoded, release("api", "main"));
    }

    #[test]
    fn test_decode_rejects_wrong_part_count() {
        let projection: Item = [
            ("name_branch", AttributeValue::from("api@main@extra")),
            ("date", AttributeValue::from("2024-01-01")),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();

        assert!(matches!(decode::<Release>(&projection), Err(Error::InvalidData(_))));
    }

    #[test]
    fn test_natural_key_uses_source_fields() {
        let item = encode(&release("api", "main")).unwrap();
        let key = natural_key(Release::schema(), &item).unwrap();

        assert_eq!(
            key,
            NaturalKey::new()
                .with("name", "api")
                .with("branch", "main")
                .with("date", "2024-01-01")
        );
    }

    #[test]
    fn test_primary_key_item() {
        let key = NaturalKey::new()
            .with("name", "api")
            .with("branch", "main")
            .with("date", "2024-01-01");
        let item = primary_key_item(Release::schema(), &key).unwrap();

        assert_eq!(item.len(), 2);
        assert_eq!(item.get("name_branch"), Some(&AttributeValue::from("api@main")));
        assert_eq!(item.get("date"), Some(&AttributeValue::from("2024-01-01")));
    }

    #[test]
    fn test_primary_key_item_rejects_bad_keys() {
        let missing = NaturalKey::new().with("name", "api").with("date", "d");
        assert_eq!(
            primary_key_item(Release::schema(), &missing),
            Err(Error::Validation(ValidationError::MissingField {
                field: "branch".to_string()
            }))
        );

        let extra = NaturalKey::new()
            .with("name", "api")
            .with("branch", "main")
            .with("date", "d")
            .with("version", 1);
        assert_eq!(
            primary_key_item(Release::schema(), &extra),
            Err(Error::Validation(ValidationError::UnexpectedKeyField {
                field: "version".to_string()
            }))
        );

        let empty = NaturalKey::new()
            .with("name", "")
            .with("branch", "main")
            .with("date", "d");
        assert_eq!(
            primary_key_item(Release::schema(), &empty),
            Err(Error::Validation(ValidationError::EmptyHashKey {
                field: "name".to_string()
            }))
        );
    }

    #[test]
    fn test_key_type_mismatch() {
        let schema = EntitySchema::new("Counter", KeyAttribute::number("id"));
        let key = NaturalKey::new().with("id", "seven");

        assert_eq!(
            primary_key_item(&schema, &key),
            Err(Error::Validation(ValidationError::KeyTypeMismatch {
                field: "id".to_string(),
                expected: "N",
                actual: "S",
            }))
        );
    }

    #[test]
    fn test_cursor_key_includes_index_attributes() {
        let item = encode(&release("api", "main")).unwrap();
        let index = Release::schema().index("nameVersion").unwrap();
        let cursor = cursor_key(Release::schema(), Some(&index.key), &item).unwrap();

        let mut names: Vec<&str> = cursor.keys().map(String::as_str).collect();
        names.sort();
        assert_eq!(names, vec!["date", "name_branch", "name_version"]);
    }
}
