//! Unkeyed iteration over a whole table or secondary index.

use std::sync::Arc;

use tablekit_core::codec;
use tablekit_core::context::Context;
use tablekit_core::storage::{Entity, RateLimiter, Result, ScanRequest, Store, ValidationError};

use crate::pager::ItemStream;
use crate::table::Table;

/// Parameters of one scan. Scans have no range bound and no direction.
pub struct ScanInput<E> {
    pub index: Option<String>,
    pub starting_after: Option<E>,
    pub limit: Option<usize>,
    pub disable_consistent_read: bool,
    pub limiter: Option<Arc<dyn RateLimiter>>,
}

impl<E> Default for ScanInput<E> {
    fn default() -> Self {
        Self {
            index: None,
            starting_after: None,
            limit: None,
            disable_consistent_read: false,
            limiter: None,
        }
    }
}

impl<E> ScanInput<E> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn index(mut self, index: impl Into<String>) -> Self {
        self.index = Some(index.into());
        self
    }

    pub fn starting_after(mut self, cursor: E) -> Self {
        self.starting_after = Some(cursor);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn disable_consistent_read(mut self) -> Self {
        self.disable_consistent_read = true;
        self
    }

    pub fn limiter(mut self, limiter: Arc<dyn RateLimiter>) -> Self {
        self.limiter = Some(limiter);
        self
    }
}

impl<E: Entity, S: Store> Table<E, S> {
    /// Validates `input` and returns the lazily fetched results.
    pub fn scan(&self, ctx: &Context, input: ScanInput<E>) -> Result<ItemStream<E, S>> {
        let schema = E::schema();
        let index = input.index.as_deref();
        let key_schema = schema
            .key_schema(index)
            .ok_or_else(|| ValidationError::UnknownIndex {
                entity_type: E::entity_type(),
                index: index.unwrap_or_default().to_string(),
            })?;

        let exclusive_start_key = match &input.starting_after {
            Some(cursor) => {
                let item = codec::encode(cursor)?;
                Some(codec::cursor_key(schema, index.map(|_| key_schema), &item)?)
            }
            None => None,
        };
        tracing::debug!(table = %self.table_name, ?index, limit = ?input.limit, "Scanning");

        let request = ScanRequest {
            table_name: self.table_name.clone(),
            index_name: input.index.clone(),
            exclusive_start_key,
            limit: None,
            consistent_read: index.is_none() && !input.disable_consistent_read,
        };
        Ok(ItemStream::scan(
            Arc::clone(&self.store),
            ctx.clone(),
            request,
            self.page_size,
            input.limit,
            input.limiter,
        ))
    }
}
