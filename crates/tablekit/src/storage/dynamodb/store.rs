//! DynamoDB store implementation.

use async_trait::async_trait;
use aws_sdk_dynamodb::Client;
use uuid::Uuid;

use tablekit_core::attribute::Item;
use tablekit_core::condition::Expression;
use tablekit_core::schema::EntitySchema;
use tablekit_core::storage::{
    DeleteItem, GetItem, Page, PutItem, QueryRequest, ScanRequest, Store, StoreResult,
    TransactItem, WriteRequest,
};

use super::client::{create_client, AwsConfig};
use super::conversions::{
    from_sdk_item, from_sdk_write_request, to_sdk_item, to_sdk_transact_item,
    to_sdk_write_request, SdkExpression, SdkItem,
};
use super::error::{
    map_batch_write_error, map_delete_item_error, map_get_item_error, map_put_item_error,
    map_query_error, map_scan_error, map_transact_write_error,
};
use super::provision;

/// DynamoDB-based store implementation.
#[derive(Debug, Clone)]
pub struct DynamoDbStore {
    client: Client,
}

impl DynamoDbStore {
    /// Creates a new store with the given DynamoDB client.
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Creates a new store from AWS configuration.
    ///
    /// Uses the AWS SDK default credential chain.
    pub async fn from_config(config: &AwsConfig) -> Self {
        Self::new(create_client(config).await)
    }

    pub fn client(&self) -> &Client {
        &self.client
    }
}

fn page_limit(limit: Option<usize>) -> Option<i32> {
    limit.map(|limit| i32::try_from(limit).unwrap_or(i32::MAX))
}

fn page(items: &[SdkItem], last_evaluated_key: Option<&SdkItem>) -> StoreResult<Page> {
    Ok(Page {
        items: items.iter().map(from_sdk_item).collect::<StoreResult<Vec<Item>>>()?,
        last_evaluated_key: last_evaluated_key.map(from_sdk_item).transpose()?,
    })
}

#[async_trait]
impl Store for DynamoDbStore {
    async fn create_table(&self, table_name: &str, schema: &EntitySchema) -> StoreResult<()> {
        provision::create_table(&self.client, table_name, schema).await?;
        provision::wait_for_table_active(&self.client, table_name).await
    }

    async fn put_item(&self, request: PutItem) -> StoreResult<()> {
        let mut builder = self
            .client
            .put_item()
            .table_name(&request.table_name)
            .set_item(Some(to_sdk_item(&request.item)));
        if let Some(condition) = &request.condition {
            let expression = SdkExpression::from(Expression::condition(condition));
            builder = builder
                .condition_expression(expression.text)
                .set_expression_attribute_names(expression.names)
                .set_expression_attribute_values(expression.values);
        }

        builder.send().await.map_err(map_put_item_error)?;
        Ok(())
    }

    async fn get_item(&self, request: GetItem) -> StoreResult<Option<Item>> {
        let result = self
            .client
            .get_item()
            .table_name(&request.table_name)
            .set_key(Some(to_sdk_item(&request.key)))
            .consistent_read(request.consistent_read)
            .send()
            .await
            .map_err(map_get_item_error)?;

        result.item().map(from_sdk_item).transpose()
    }

    async fn delete_item(&self, request: DeleteItem) -> StoreResult<()> {
        let mut builder = self
            .client
            .delete_item()
            .table_name(&request.table_name)
            .set_key(Some(to_sdk_item(&request.key)));
        if let Some(condition) = &request.condition {
            let expression = SdkExpression::from(Expression::condition(condition));
            builder = builder
                .condition_expression(expression.text)
                .set_expression_attribute_names(expression.names)
                .set_expression_attribute_values(expression.values);
        }

        builder.send().await.map_err(map_delete_item_error)?;
        Ok(())
    }

    async fn query(&self, request: QueryRequest) -> StoreResult<Page> {
        let expression = SdkExpression::from(Expression::key_condition(&request.key_condition));
        let result = self
            .client
            .query()
            .table_name(&request.table_name)
            .set_index_name(request.index_name.clone())
            .key_condition_expression(expression.text)
            .set_expression_attribute_names(expression.names)
            .set_expression_attribute_values(expression.values)
            .scan_index_forward(request.scan_forward)
            .set_exclusive_start_key(request.exclusive_start_key.as_ref().map(to_sdk_item))
            .set_limit(page_limit(request.limit))
            .consistent_read(request.consistent_read)
            .send()
            .await
            .map_err(map_query_error)?;

        page(result.items(), result.last_evaluated_key())
    }

    async fn scan(&self, request: ScanRequest) -> StoreResult<Page> {
        let result = self
            .client
            .scan()
            .table_name(&request.table_name)
            .set_index_name(request.index_name.clone())
            .set_exclusive_start_key(request.exclusive_start_key.as_ref().map(to_sdk_item))
            .set_limit(page_limit(request.limit))
            .consistent_read(request.consistent_read)
            .send()
            .await
            .map_err(map_scan_error)?;

        page(result.items(), result.last_evaluated_key())
    }

    async fn batch_write(
        &self,
        table_name: &str,
        requests: Vec<WriteRequest>,
    ) -> StoreResult<Vec<WriteRequest>> {
        let requests = requests
            .iter()
            .map(to_sdk_write_request)
            .collect::<StoreResult<Vec<_>>>()?;

        let result = self
            .client
            .batch_write_item()
            .request_items(table_name, requests)
            .send()
            .await
            .map_err(map_batch_write_error)?;

        result
            .unprocessed_items()
            .and_then(|unprocessed| unprocessed.get(table_name))
            .map(|requests| requests.iter().map(from_sdk_write_request).collect())
            .unwrap_or_else(|| Ok(Vec::new()))
    }

    async fn transact_write(&self, items: Vec<TransactItem>) -> StoreResult<()> {
        let items = items
            .iter()
            .map(to_sdk_transact_item)
            .collect::<StoreResult<Vec<_>>>()?;

        self.client
            .transact_write_items()
            .set_transact_items(Some(items))
            .client_request_token(Uuid::new_v4().to_string())
            .send()
            .await
            .map_err(map_transact_write_error)?;
        Ok(())
    }
}
