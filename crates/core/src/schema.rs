//! Entity schema descriptors.
//!
//! An [`EntitySchema`] is everything the engine needs to know about one
//! modeled type: its key layout, secondary indexes and composite key
//! attributes. Schemas are serde (de)serializable so they can be handed over
//! as JSON and fed to the provisioning CLI.

use serde::{Deserialize, Serialize};

// ============================================================================
// Key attributes
// ============================================================================

/// Scalar type of a key attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttributeType {
    #[serde(rename = "S")]
    String,
    #[serde(rename = "N")]
    Number,
    #[serde(rename = "B")]
    Binary,
}

impl AttributeType {
    /// Wire name, matching [`AttributeValue::type_name`](crate::attribute::AttributeValue::type_name).
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::String => "S",
            Self::Number => "N",
            Self::Binary => "B",
        }
    }
}

/// A named, typed key attribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyAttribute {
    pub name: String,
    #[serde(rename = "type")]
    pub attribute_type: AttributeType,
}

impl KeyAttribute {
    pub fn string(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attribute_type: AttributeType::String,
        }
    }

    pub fn number(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attribute_type: AttributeType::Number,
        }
    }

    pub fn binary(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attribute_type: AttributeType::Binary,
        }
    }
}

/// Hash attribute plus optional range attribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeySchema {
    pub hash: KeyAttribute,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub range: Option<KeyAttribute>,
}

impl KeySchema {
    pub fn new(hash: KeyAttribute) -> Self {
        Self { hash, range: None }
    }

    pub fn with_range(mut self, range: KeyAttribute) -> Self {
        self.range = Some(range);
        self
    }

    /// Hash attribute followed by the range attribute, if any.
    pub fn attributes(&self) -> impl Iterator<Item = &KeyAttribute> {
        std::iter::once(&self.hash).chain(self.range.as_ref())
    }
}

// ============================================================================
// Indexes
// ============================================================================

/// Attributes copied into a secondary index.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Projection {
    #[default]
    All,
    KeysOnly,
    Include(Vec<String>),
}

/// A secondary index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexSchema {
    pub name: String,
    pub key: KeySchema,
    #[serde(default)]
    pub projection: Projection,
}

/// A stored attribute built by joining several fields with a separator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompositeKeySpec {
    pub attribute: String,
    pub fields: Vec<KeyAttribute>,
    pub separator: char,
}

// ============================================================================
// Entity schema
// ============================================================================

/// Complete storage layout of one entity type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntitySchema {
    pub entity: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table_name: Option<String>,
    pub primary_key: KeySchema,
    #[serde(default)]
    pub indexes: Vec<IndexSchema>,
    #[serde(default)]
    pub composites: Vec<CompositeKeySpec>,
    #[serde(default)]
    pub allow_overwrites: bool,
}

impl EntitySchema {
    pub fn new(entity: impl Into<String>, hash: KeyAttribute) -> Self {
        Self {
            entity: entity.into(),
            table_name: None,
            primary_key: KeySchema::new(hash),
            indexes: Vec::new(),
            composites: Vec::new(),
            allow_overwrites: false,
        }
    }

    pub fn with_range(mut self, range: KeyAttribute) -> Self {
        self.primary_key.range = Some(range);
        self
    }

    pub fn with_index(mut self, name: impl Into<String>, key: KeySchema, projection: Projection) -> Self {
        self.indexes.push(IndexSchema {
            name: name.into(),
            key,
            projection,
        });
        self
    }

    pub fn with_composite(
        mut self,
        attribute: impl Into<String>,
        fields: Vec<KeyAttribute>,
        separator: char,
    ) -> Self {
        self.composites.push(CompositeKeySpec {
            attribute: attribute.into(),
            fields,
            separator,
        });
        self
    }

    /// Makes plain `save` overwrite existing items.
    pub fn allow_overwrites(mut self) -> Self {
        self.allow_overwrites = true;
        self
    }

    pub fn with_table_name(mut self, table_name: impl Into<String>) -> Self {
        self.table_name = Some(table_name.into());
        self
    }

    pub fn index(&self, name: &str) -> Option<&IndexSchema> {
        self.indexes.iter().find(|index| index.name == name)
    }

    /// Key schema of the named index, or the primary key for `None`.
    pub fn key_schema(&self, index: Option<&str>) -> Option<&KeySchema> {
        match index {
            None => Some(&self.primary_key),
            Some(name) => self.index(name).map(|index| &index.key),
        }
    }

    pub fn composite(&self, attribute: &str) -> Option<&CompositeKeySpec> {
        self.composites.iter().find(|spec| spec.attribute == attribute)
    }

    /// The unencoded fields behind a key attribute.
    ///
    /// A composite attribute expands to its source fields; any other
    /// attribute stands for itself.
    pub fn natural_fields(&self, attribute: &KeyAttribute) -> Vec<KeyAttribute> {
        match self.composite(&attribute.name) {
            Some(spec) => spec.fields.clone(),
            None => vec![attribute.clone()],
        }
    }

    /// Physical table name for this entity under `prefix`.
    ///
    /// An explicit `table_name` is the complete physical name and ignores
    /// `prefix`; otherwise the entity name is pluralized and kebab-cased
    /// (`SimpleThing` -> `{prefix}-simple-things`).
    pub fn table_name(&self, prefix: &str) -> String {
        if let Some(name) = &self.table_name {
            return name.clone();
        }
        let base = pluralize(&kebab_case(&self.entity));
        if prefix.is_empty() {
            base
        } else {
            format!("{prefix}-{base}")
        }
    }

    /// Human readable provisioning layout of this schema.
    pub fn describe(&self, table_name: &str) -> Vec<String> {
        let mut lines = vec![format!("+ Create table: {table_name} ({})", self.entity)];
        push_key_lines(&mut lines, "  ", &self.primary_key);
        for index in &self.indexes {
            lines.push(format!("  + GSI: {}", index.name));
            push_key_lines(&mut lines, "    ", &index.key);
            lines.push(format!("    Projection: {}", describe_projection(&index.projection)));
        }
        for spec in &self.composites {
            let fields: Vec<&str> = spec.fields.iter().map(|f| f.name.as_str()).collect();
            lines.push(format!(
                "  Composite: {} = {}",
                spec.attribute,
                fields.join(&spec.separator.to_string())
            ));
        }
        lines.push("  Billing: PAY_PER_REQUEST".to_string());
        lines
    }
}

fn push_key_lines(lines: &mut Vec<String>, indent: &str, key: &KeySchema) {
    lines.push(format!(
        "{indent}Partition key: {} ({})",
        key.hash.name,
        key.hash.attribute_type.as_str()
    ));
    if let Some(range) = &key.range {
        lines.push(format!(
            "{indent}Sort key: {} ({})",
            range.name,
            range.attribute_type.as_str()
        ));
    }
}

fn describe_projection(projection: &Projection) -> String {
    match projection {
        Projection::All => "ALL".to_string(),
        Projection::KeysOnly => "KEYS_ONLY".to_string(),
        Projection::Include(attributes) => format!("INCLUDE [{}]", attributes.join(", ")),
    }
}

// ============================================================================
// Naming
// ============================================================================

fn kebab_case(name: &str) -> String {
    let chars: Vec<char> = name.chars().collect();
    let mut out = String::with_capacity(name.len() + 4);
    for (i, &c) in chars.iter().enumerate() {
        if c == '_' || c == ' ' {
            if !out.ends_with('-') && !out.is_empty() {
                out.push('-');
            }
            continue;
        }
        if c.is_uppercase() && i > 0 {
            let prev = chars[i - 1];
            let next_lower = chars.get(i + 1).is_some_and(|n| n.is_lowercase());
            let boundary = prev.is_lowercase()
                || prev.is_ascii_digit()
                || (prev.is_uppercase() && next_lower);
            if boundary && !out.ends_with('-') {
                out.push('-');
            }
        }
        out.extend(c.to_lowercase());
    }
    out
}

fn pluralize(word: &str) -> String {
    const VOWELS: &[char] = &['a', 'e', 'i', 'o', 'u'];

    if word.ends_with("ss")
        || word.ends_with('x')
        || word.ends_with('z')
        || word.ends_with("ch")
        || word.ends_with("sh")
    {
        return format!("{word}es");
    }
    if word.ends_with('s') {
        return word.to_string();
    }
    if let Some(stem) = word.strip_suffix('y') {
        if !stem.ends_with(VOWELS) && !stem.is_empty() {
            return format!("{stem}ies");
        }
    }
    format!("{word}s")
}
