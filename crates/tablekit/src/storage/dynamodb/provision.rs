//! Table creation from an entity schema.

use std::time::Duration;

use aws_sdk_dynamodb::types::{
    AttributeDefinition, BillingMode, GlobalSecondaryIndex, IndexStatus, KeySchemaElement,
    KeyType, Projection as SdkProjection, ProjectionType, ScalarAttributeType, TableStatus,
};
use aws_sdk_dynamodb::Client;
use tablekit_core::schema::{AttributeType, EntitySchema, KeySchema, Projection};
use tablekit_core::storage::{StoreError, StoreResult};

use super::error::{map_build_error, map_create_table_error, map_describe_table_error};

const ACTIVATION_ATTEMPTS: usize = 60;
const ACTIVATION_DELAY: Duration = Duration::from_secs(2);

/// Creates the table and its global secondary indexes with on-demand billing.
pub async fn create_table(client: &Client, table_name: &str, schema: &EntitySchema) -> StoreResult<()> {
    let mut request = client
        .create_table()
        .table_name(table_name)
        .set_key_schema(Some(key_schema(&schema.primary_key)?))
        .set_attribute_definitions(Some(attribute_definitions(schema)?))
        .billing_mode(BillingMode::PayPerRequest);

    for index in &schema.indexes {
        request = request.global_secondary_indexes(
            GlobalSecondaryIndex::builder()
                .index_name(&index.name)
                .set_key_schema(Some(key_schema(&index.key)?))
                .projection(projection(&index.projection))
                .build()
                .map_err(map_build_error)?,
        );
    }

    request.send().await.map_err(map_create_table_error)?;
    Ok(())
}

/// Polls until the table and every index report `ACTIVE`.
pub async fn wait_for_table_active(client: &Client, table_name: &str) -> StoreResult<()> {
    for _ in 0..ACTIVATION_ATTEMPTS {
        let response = client
            .describe_table()
            .table_name(table_name)
            .send()
            .await
            .map_err(map_describe_table_error)?;

        if let Some(table) = response.table() {
            let table_active = table.table_status() == Some(&TableStatus::Active);
            let indexes_active = table
                .global_secondary_indexes()
                .iter()
                .all(|gsi| gsi.index_status() == Some(&IndexStatus::Active));
            if table_active && indexes_active {
                return Ok(());
            }
        }
        tracing::debug!(table = table_name, "Waiting for table to become active");
        tokio::time::sleep(ACTIVATION_DELAY).await;
    }

    Err(StoreError::Service(format!(
        "Table {table_name} did not become active"
    )))
}

fn key_schema(key: &KeySchema) -> StoreResult<Vec<KeySchemaElement>> {
    let mut elements = vec![KeySchemaElement::builder()
        .attribute_name(&key.hash.name)
        .key_type(KeyType::Hash)
        .build()
        .map_err(map_build_error)?];

    if let Some(range) = &key.range {
        elements.push(
            KeySchemaElement::builder()
                .attribute_name(&range.name)
                .key_type(KeyType::Range)
                .build()
                .map_err(map_build_error)?,
        );
    }
    Ok(elements)
}

/// One definition per key attribute of the table and its indexes.
fn attribute_definitions(schema: &EntitySchema) -> StoreResult<Vec<AttributeDefinition>> {
    let mut definitions: Vec<AttributeDefinition> = Vec::new();
    let attributes = schema
        .primary_key
        .attributes()
        .chain(schema.indexes.iter().flat_map(|index| index.key.attributes()));

    for attribute in attributes {
        if definitions
            .iter()
            .any(|d| d.attribute_name() == attribute.name)
        {
            continue;
        }
        definitions.push(
            AttributeDefinition::builder()
                .attribute_name(&attribute.name)
                .attribute_type(scalar_type(attribute.attribute_type))
                .build()
                .map_err(map_build_error)?,
        );
    }
    Ok(definitions)
}

fn scalar_type(attribute_type: AttributeType) -> ScalarAttributeType {
    match attribute_type {
        AttributeType::String => ScalarAttributeType::S,
        AttributeType::Number => ScalarAttributeType::N,
        AttributeType::Binary => ScalarAttributeType::B,
    }
}

fn projection(projection: &Projection) -> SdkProjection {
    match projection {
        Projection::All => SdkProjection::builder()
            .projection_type(ProjectionType::All)
            .build(),
        Projection::KeysOnly => SdkProjection::builder()
            .projection_type(ProjectionType::KeysOnly)
            .build(),
        Projection::Include(attributes) => SdkProjection::builder()
            .projection_type(ProjectionType::Include)
            .set_non_key_attributes(Some(attributes.clone()))
            .build(),
    }
}
