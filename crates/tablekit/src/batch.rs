//! Chunked puts and deletes with resubmission of unprocessed items.

use tablekit_core::codec;
use tablekit_core::context::Context;
use tablekit_core::storage::{
    Entity, NaturalKey, Result, Store, ValidationError, WriteRequest,
};

use crate::table::Table;

/// Maximum number of items accepted by one batch call.
pub const MAX_BATCH_ITEMS: usize = 25;

fn check_batch_size(received: usize) -> Result<()> {
    if received > MAX_BATCH_ITEMS {
        return Err(ValidationError::BatchTooLarge {
            received,
            allowed: MAX_BATCH_ITEMS,
        }
        .into());
    }
    Ok(())
}

impl<E: Entity, S: Store> Table<E, S> {
    /// Writes up to [`MAX_BATCH_ITEMS`] entities, overwriting existing items.
    ///
    /// Every entity is encoded before the first request is sent.
    pub async fn batch_save(&self, ctx: &Context, entities: &[E]) -> Result<()> {
        check_batch_size(entities.len())?;
        let schema = E::schema();
        let requests = entities
            .iter()
            .map(|entity| -> Result<WriteRequest> {
                let item = codec::encode(entity)?;
                codec::primary_key_item(schema, &codec::natural_key(schema, &item)?)?;
                Ok(WriteRequest::Put(item))
            })
            .collect::<Result<Vec<_>>>()?;
        self.write_batch(ctx, requests).await
    }

    /// Deletes up to [`MAX_BATCH_ITEMS`] items by natural primary key.
    pub async fn batch_delete(&self, ctx: &Context, keys: &[NaturalKey]) -> Result<()> {
        check_batch_size(keys.len())?;
        let requests = keys
            .iter()
            .map(|key| codec::primary_key_item(E::schema(), key).map(WriteRequest::Delete))
            .collect::<Result<Vec<_>>>()?;
        self.write_batch(ctx, requests).await
    }

    /// Submits `requests`, then resubmits exactly the unprocessed subset
    /// until the store accepts everything.
    async fn write_batch(&self, ctx: &Context, mut requests: Vec<WriteRequest>) -> Result<()> {
        if requests.is_empty() {
            return Ok(());
        }
        tracing::debug!(table = %self.table_name, items = requests.len(), "Writing batch");

        let mut attempt = 0usize;
        loop {
            let unprocessed = ctx
                .run(self.store.batch_write(&self.table_name, requests))
                .await??;
            if unprocessed.is_empty() {
                return Ok(());
            }
            // TODO: add exponential backoff once a retry policy is configurable.
            attempt += 1;
            tracing::warn!(
                table = %self.table_name,
                unprocessed = unprocessed.len(),
                attempt,
                "Resubmitting unprocessed batch items"
            );
            requests = unprocessed;
        }
    }
}
