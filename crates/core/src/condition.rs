//! Typed write preconditions and key conditions.
//!
//! Conditions are plain data: backends either evaluate them directly
//! ([`Condition::evaluate`], [`KeyCondition::matches`]) or render them to the
//! provider's expression language with an [`ExpressionBuilder`].

use std::cmp::Ordering;
use std::collections::HashMap;

use crate::attribute::{compare_keys, AttributeValue, Item};

// ============================================================================
// Conditions
// ============================================================================

/// A precondition on the current state of one item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Condition {
    AttributeExists(String),
    AttributeNotExists(String),
    Equals(String, AttributeValue),
    NotEquals(String, AttributeValue),
    LessThan(String, AttributeValue),
    LessThanOrEqual(String, AttributeValue),
    GreaterThan(String, AttributeValue),
    GreaterThanOrEqual(String, AttributeValue),
    BeginsWith(String, String),
    And(Vec<Condition>),
    Or(Vec<Condition>),
    Not(Box<Condition>),
}

impl Condition {
    pub fn exists(attribute: impl Into<String>) -> Self {
        Self::AttributeExists(attribute.into())
    }

    pub fn not_exists(attribute: impl Into<String>) -> Self {
        Self::AttributeNotExists(attribute.into())
    }

    pub fn equals(attribute: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        Self::Equals(attribute.into(), value.into())
    }

    pub fn not_equals(attribute: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        Self::NotEquals(attribute.into(), value.into())
    }

    pub fn less_than(attribute: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        Self::LessThan(attribute.into(), value.into())
    }

    pub fn greater_than(attribute: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        Self::GreaterThan(attribute.into(), value.into())
    }

    pub fn begins_with(attribute: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self::BeginsWith(attribute.into(), prefix.into())
    }

    /// Conjunction; a single condition is returned unchanged.
    pub fn all(mut conditions: Vec<Condition>) -> Self {
        if conditions.len() == 1 {
            conditions.remove(0)
        } else {
            Self::And(conditions)
        }
    }

    pub fn and(self, other: Condition) -> Self {
        match self {
            Self::And(mut conditions) => {
                conditions.push(other);
                Self::And(conditions)
            }
            this => Self::And(vec![this, other]),
        }
    }

    pub fn or(self, other: Condition) -> Self {
        Self::Or(vec![self, other])
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(self) -> Self {
        Self::Not(Box::new(self))
    }

    /// Evaluates the condition against the item's current state (`None` when absent).
    pub fn evaluate(&self, item: Option<&Item>) -> bool {
        let attribute = |name: &str| item.and_then(|item| item.get(name));
        match self {
            Self::AttributeExists(name) => attribute(name).is_some(),
            Self::AttributeNotExists(name) => attribute(name).is_none(),
            Self::Equals(name, value) => attribute(name) == Some(value),
            Self::NotEquals(name, value) => attribute(name) != Some(value),
            Self::LessThan(name, value) => compare(attribute(name), value, Ordering::is_lt),
            Self::LessThanOrEqual(name, value) => compare(attribute(name), value, Ordering::is_le),
            Self::GreaterThan(name, value) => compare(attribute(name), value, Ordering::is_gt),
            Self::GreaterThanOrEqual(name, value) => {
                compare(attribute(name), value, Ordering::is_ge)
            }
            Self::BeginsWith(name, prefix) => attribute(name)
                .and_then(|v| v.as_s())
                .is_some_and(|s| s.starts_with(prefix.as_str())),
            Self::And(conditions) => conditions.iter().all(|c| c.evaluate(item)),
            Self::Or(conditions) => conditions.iter().any(|c| c.evaluate(item)),
            Self::Not(condition) => !condition.evaluate(item),
        }
    }
}

/// Ordered comparison; values of different types never satisfy it.
fn compare(
    actual: Option<&AttributeValue>,
    expected: &AttributeValue,
    accept: fn(Ordering) -> bool,
) -> bool {
    match actual {
        Some(actual) if actual.type_name() == expected.type_name() => {
            accept(compare_keys(actual, expected))
        }
        _ => false,
    }
}

// ============================================================================
// Key conditions
// ============================================================================

/// Constraint on the range attribute of a query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RangeOp {
    Eq(AttributeValue),
    Lt(AttributeValue),
    Le(AttributeValue),
    Gt(AttributeValue),
    Ge(AttributeValue),
    Between(AttributeValue, AttributeValue),
    BeginsWith(AttributeValue),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeCondition {
    pub attribute: String,
    pub op: RangeOp,
}

/// Hash equality plus an optional range constraint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyCondition {
    pub hash_attribute: String,
    pub hash_value: AttributeValue,
    pub range: Option<RangeCondition>,
}

impl KeyCondition {
    pub fn hash(attribute: impl Into<String>, value: AttributeValue) -> Self {
        Self {
            hash_attribute: attribute.into(),
            hash_value: value,
            range: None,
        }
    }

    pub fn with_range(mut self, attribute: impl Into<String>, op: RangeOp) -> Self {
        self.range = Some(RangeCondition {
            attribute: attribute.into(),
            op,
        });
        self
    }

    /// True when the item belongs to the hash partition and satisfies the range constraint.
    pub fn matches(&self, item: &Item) -> bool {
        if item.get(&self.hash_attribute) != Some(&self.hash_value) {
            return false;
        }
        let Some(range) = &self.range else {
            return true;
        };
        let Some(actual) = item.get(&range.attribute) else {
            return false;
        };
        let ord = |bound: &AttributeValue| compare_keys(actual, bound);
        match &range.op {
            RangeOp::Eq(v) => ord(v).is_eq(),
            RangeOp::Lt(v) => ord(v).is_lt(),
            RangeOp::Le(v) => ord(v).is_le(),
            RangeOp::Gt(v) => ord(v).is_gt(),
            RangeOp::Ge(v) => ord(v).is_ge(),
            RangeOp::Between(low, high) => ord(low).is_ge() && ord(high).is_le(),
            RangeOp::BeginsWith(prefix) => match (actual, prefix) {
                (AttributeValue::S(s), AttributeValue::S(p)) => s.starts_with(p.as_str()),
                (AttributeValue::B(b), AttributeValue::B(p)) => b.starts_with(p),
                _ => false,
            },
        }
    }
}

// ============================================================================
// Expression rendering
// ============================================================================

/// Rendered expression text with its placeholder maps.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Expression {
    pub text: String,
    pub names: HashMap<String, String>,
    pub values: HashMap<String, AttributeValue>,
}

impl Expression {
    /// Renders a standalone condition expression.
    pub fn condition(condition: &Condition) -> Self {
        let mut builder = ExpressionBuilder::default();
        let text = builder.condition(condition);
        builder.finish(text)
    }

    /// Renders a standalone key condition expression.
    pub fn key_condition(condition: &KeyCondition) -> Self {
        let mut builder = ExpressionBuilder::default();
        let text = builder.key_condition(condition);
        builder.finish(text)
    }
}

/// Allocates `#nN` name and `:vN` value placeholders.
///
/// Attribute names are always aliased so reserved words never collide with
/// the expression grammar.
#[derive(Debug, Default)]
pub struct ExpressionBuilder {
    names: HashMap<String, String>,
    values: HashMap<String, AttributeValue>,
}

impl ExpressionBuilder {
    pub fn name(&mut self, attribute: &str) -> String {
        if let Some((placeholder, _)) = self.names.iter().find(|(_, name)| *name == attribute) {
            return placeholder.clone();
        }
        let placeholder = format!("#n{}", self.names.len());
        self.names.insert(placeholder.clone(), attribute.to_string());
        placeholder
    }

    pub fn value(&mut self, value: &AttributeValue) -> String {
        let placeholder = format!(":v{}", self.values.len());
        self.values.insert(placeholder.clone(), value.clone());
        placeholder
    }

    pub fn condition(&mut self, condition: &Condition) -> String {
        match condition {
            Condition::AttributeExists(name) => format!("attribute_exists({})", self.name(name)),
            Condition::AttributeNotExists(name) => {
                format!("attribute_not_exists({})", self.name(name))
            }
            Condition::Equals(name, value) => self.comparison(name, "=", value),
            Condition::NotEquals(name, value) => self.comparison(name, "<>", value),
            Condition::LessThan(name, value) => self.comparison(name, "<", value),
            Condition::LessThanOrEqual(name, value) => self.comparison(name, "<=", value),
            Condition::GreaterThan(name, value) => self.comparison(name, ">", value),
            Condition::GreaterThanOrEqual(name, value) => self.comparison(name, ">=", value),
            Condition::BeginsWith(name, prefix) => {
                let name = self.name(name);
                let value = self.value(&AttributeValue::S(prefix.clone()));
                format!("begins_with({name}, {value})")
            }
            Condition::And(conditions) => self.join(conditions, " AND "),
            Condition::Or(conditions) => self.join(conditions, " OR "),
            Condition::Not(condition) => format!("NOT ({})", self.condition(condition)),
        }
    }

    pub fn key_condition(&mut self, condition: &KeyCondition) -> String {
        let hash = self.comparison(&condition.hash_attribute, "=", &condition.hash_value);
        let Some(range) = &condition.range else {
            return hash;
        };
        let name = self.name(&range.attribute);
        let range = match &range.op {
            RangeOp::Eq(v) => format!("{name} = {}", self.value(v)),
            RangeOp::Lt(v) => format!("{name} < {}", self.value(v)),
            RangeOp::Le(v) => format!("{name} <= {}", self.value(v)),
            RangeOp::Gt(v) => format!("{name} > {}", self.value(v)),
            RangeOp::Ge(v) => format!("{name} >= {}", self.value(v)),
            RangeOp::Between(low, high) => {
                let low = self.value(low);
                let high = self.value(high);
                format!("{name} BETWEEN {low} AND {high}")
            }
            RangeOp::BeginsWith(v) => format!("begins_with({name}, {})", self.value(v)),
        };
        format!("{hash} AND {range}")
    }

    pub fn finish(self, text: String) -> Expression {
        Expression {
            text,
            names: self.names,
            values: self.values,
        }
    }

    fn comparison(&mut self, name: &str, op: &str, value: &AttributeValue) -> String {
        let name = self.name(name);
        let value = self.value(value);
        format!("{name} {op} {value}")
    }

    fn join(&mut self, conditions: &[Condition], separator: &str) -> String {
        let parts: Vec<String> = conditions
            .iter()
            .map(|c| format!("({})", self.condition(c)))
            .collect();
        parts.join(separator)
    }
}
