//! DynamoDB attribute conversion functions.
//!
//! Pure functions for converting between SDK types and `tablekit_core` types.
//! These are testable in isolation without DynamoDB access.

use std::collections::HashMap;

use aws_sdk_dynamodb::primitives::Blob;
use aws_sdk_dynamodb::types::{
    AttributeValue as SdkValue, ConditionCheck, Delete, DeleteRequest, Put, PutRequest,
    TransactWriteItem, WriteRequest as SdkWriteRequest,
};
use tablekit_core::attribute::{AttributeValue, Item};
use tablekit_core::condition::Expression;
use tablekit_core::storage::{StoreError, StoreResult, TransactItem, WriteRequest};

use super::error::map_build_error;

pub type SdkItem = HashMap<String, SdkValue>;

// ============================================================================
// Attribute values
// ============================================================================

pub fn to_sdk_value(value: &AttributeValue) -> SdkValue {
    match value {
        AttributeValue::S(s) => SdkValue::S(s.clone()),
        AttributeValue::N(n) => SdkValue::N(n.clone()),
        AttributeValue::B(b) => SdkValue::B(Blob::new(b.clone())),
        AttributeValue::Bool(b) => SdkValue::Bool(*b),
        AttributeValue::Null => SdkValue::Null(true),
        AttributeValue::L(list) => SdkValue::L(list.iter().map(to_sdk_value).collect()),
        AttributeValue::M(map) => SdkValue::M(to_sdk_item(map)),
        AttributeValue::Ss(set) => SdkValue::Ss(set.clone()),
    }
}

pub fn from_sdk_value(value: &SdkValue) -> StoreResult<AttributeValue> {
    Ok(match value {
        SdkValue::S(s) => AttributeValue::S(s.clone()),
        SdkValue::N(n) => AttributeValue::N(n.clone()),
        SdkValue::B(b) => AttributeValue::B(b.as_ref().to_vec()),
        SdkValue::Bool(b) => AttributeValue::Bool(*b),
        SdkValue::Null(_) => AttributeValue::Null,
        SdkValue::L(list) => {
            AttributeValue::L(list.iter().map(from_sdk_value).collect::<StoreResult<_>>()?)
        }
        SdkValue::M(map) => AttributeValue::M(from_sdk_item(map)?),
        SdkValue::Ss(set) => AttributeValue::Ss(set.clone()),
        other => {
            return Err(StoreError::Service(format!(
                "Unsupported attribute value: {:?}",
                other
            )))
        }
    })
}

pub fn to_sdk_item(item: &Item) -> SdkItem {
    item.iter()
        .map(|(name, value)| (name.clone(), to_sdk_value(value)))
        .collect()
}

pub fn from_sdk_item(item: &SdkItem) -> StoreResult<Item> {
    item.iter()
        .map(|(name, value)| Ok((name.clone(), from_sdk_value(value)?)))
        .collect()
}

// ============================================================================
// Expressions
// ============================================================================

/// Expression parts in the shape the request builders take.
///
/// DynamoDB rejects empty placeholder maps, so those become `None`.
pub struct SdkExpression {
    pub text: String,
    pub names: Option<HashMap<String, String>>,
    pub values: Option<SdkItem>,
}

impl From<Expression> for SdkExpression {
    fn from(expression: Expression) -> Self {
        Self {
            text: expression.text,
            names: (!expression.names.is_empty()).then_some(expression.names),
            values: (!expression.values.is_empty()).then(|| to_sdk_item(&expression.values)),
        }
    }
}

// ============================================================================
// Batch and transaction items
// ============================================================================

pub fn to_sdk_write_request(request: &WriteRequest) -> StoreResult<SdkWriteRequest> {
    let builder = SdkWriteRequest::builder();
    let builder = match request {
        WriteRequest::Put(item) => builder.put_request(
            PutRequest::builder()
                .set_item(Some(to_sdk_item(item)))
                .build()
                .map_err(map_build_error)?,
        ),
        WriteRequest::Delete(key) => builder.delete_request(
            DeleteRequest::builder()
                .set_key(Some(to_sdk_item(key)))
                .build()
                .map_err(map_build_error)?,
        ),
    };
    Ok(builder.build())
}

/// Converts an unprocessed request handed back by BatchWriteItem.
pub fn from_sdk_write_request(request: &SdkWriteRequest) -> StoreResult<WriteRequest> {
    if let Some(put) = request.put_request() {
        return Ok(WriteRequest::Put(from_sdk_item(put.item())?));
    }
    if let Some(delete) = request.delete_request() {
        return Ok(WriteRequest::Delete(from_sdk_item(delete.key())?));
    }
    Err(StoreError::Service(
        "Unprocessed write request has neither put nor delete".to_string(),
    ))
}

pub fn to_sdk_transact_item(item: &TransactItem) -> StoreResult<TransactWriteItem> {
    let builder = TransactWriteItem::builder();
    let builder = match item {
        TransactItem::Put {
            table_name,
            item,
            condition,
        } => {
            let mut put = Put::builder()
                .table_name(table_name)
                .set_item(Some(to_sdk_item(item)));
            if let Some(condition) = condition {
                let expression = SdkExpression::from(Expression::condition(condition));
                put = put
                    .condition_expression(expression.text)
                    .set_expression_attribute_names(expression.names)
                    .set_expression_attribute_values(expression.values);
            }
            builder.put(put.build().map_err(map_build_error)?)
        }
        TransactItem::Delete {
            table_name,
            key,
            condition,
        } => {
            let mut delete = Delete::builder()
                .table_name(table_name)
                .set_key(Some(to_sdk_item(key)));
            if let Some(condition) = condition {
                let expression = SdkExpression::from(Expression::condition(condition));
                delete = delete
                    .condition_expression(expression.text)
                    .set_expression_attribute_names(expression.names)
                    .set_expression_attribute_values(expression.values);
            }
            builder.delete(delete.build().map_err(map_build_error)?)
        }
        TransactItem::ConditionCheck {
            table_name,
            key,
            condition,
        } => {
            let expression = SdkExpression::from(Expression::condition(condition));
            builder.condition_check(
                ConditionCheck::builder()
                    .table_name(table_name)
                    .set_key(Some(to_sdk_item(key)))
                    .condition_expression(expression.text)
                    .set_expression_attribute_names(expression.names)
                    .set_expression_attribute_values(expression.values)
                    .build()
                    .map_err(map_build_error)?,
            )
        }
    };
    Ok(builder.build())
}
