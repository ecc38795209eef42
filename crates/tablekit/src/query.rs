//! Keyed range queries with direction and cursor pagination.

use std::sync::Arc;

use tablekit_core::codec;
use tablekit_core::condition::{KeyCondition, RangeOp};
use tablekit_core::context::Context;
use tablekit_core::storage::{
    Entity, NaturalKey, QueryRequest, RateLimiter, Result, Store, ValidationError,
};

use crate::pager::ItemStream;
use crate::table::Table;

/// Parameters of one query.
///
/// `hash` names the hash fields of the queried index. At most one of
/// `starting_at` (inclusive range bound) and `starting_after` (cursor
/// entity) may be set.
pub struct QueryInput<E> {
    pub index: Option<String>,
    pub hash: NaturalKey,
    pub starting_at: Option<NaturalKey>,
    pub starting_after: Option<E>,
    pub descending: bool,
    pub limit: Option<usize>,
    pub disable_consistent_read: bool,
    pub limiter: Option<Arc<dyn RateLimiter>>,
}

impl<E> QueryInput<E> {
    /// Query on the table's primary key.
    pub fn primary(hash: NaturalKey) -> Self {
        Self {
            index: None,
            hash,
            starting_at: None,
            starting_after: None,
            descending: false,
            limit: None,
            disable_consistent_read: false,
            limiter: None,
        }
    }

    /// Query on a secondary index.
    pub fn index(index: impl Into<String>, hash: NaturalKey) -> Self {
        Self {
            index: Some(index.into()),
            ..Self::primary(hash)
        }
    }

    pub fn starting_at(mut self, range: NaturalKey) -> Self {
        self.starting_at = Some(range);
        self
    }

    pub fn starting_after(mut self, cursor: E) -> Self {
        self.starting_after = Some(cursor);
        self
    }

    pub fn descending(mut self) -> Self {
        self.descending = true;
        self
    }

    /// Caps the number of items across all pages.
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
    ///
    /// Every validation failure is reported here, before any request is sent.
    pub fn query(&self, ctx: &Context, input: QueryInput<E>) -> Result<ItemStream<E, S>> {
        let request = self.query_request(input.index.as_deref(), &input)?;
        tracing::debug!(
            table = %self.table_name,
            index = ?input.index,
            descending = input.descending,
            limit = ?input.limit,
            "Querying"
        );
        Ok(ItemStream::query(
            Arc::clone(&self.store),
            ctx.clone(),
            request,
            self.page_size,
            input.limit,
            input.limiter,
        ))
    }

    fn query_request(&self, index: Option<&str>, input: &QueryInput<E>) -> Result<QueryRequest> {
        let schema = E::schema();
        let key_schema = schema
            .key_schema(index)
            .ok_or_else(|| ValidationError::UnknownIndex {
                entity_type: E::entity_type(),
                index: index.unwrap_or_default().to_string(),
            })?;

        if input.starting_at.is_some() && input.starting_after.is_some() {
            return Err(ValidationError::ConflictingStartBounds.into());
        }

        let hash_fields = schema.natural_fields(&key_schema.hash);
        if let Some((field, _)) = input
            .hash
            .fields()
            .find(|(field, _)| !hash_fields.iter().any(|f| f.name == *field))
        {
            return Err(ValidationError::UnexpectedKeyField {
                field: field.to_string(),
            }
            .into());
        }
        let mut key_condition = KeyCondition::hash(
            key_schema.hash.name.clone(),
            codec::hash_key_value(schema, key_schema, &input.hash)?,
        );

        if let Some(bound) = &input.starting_at {
            let range = key_schema
                .range
                .as_ref()
                .ok_or_else(|| ValidationError::NoRangeKey {
                    index: index.unwrap_or("primary").to_string(),
                })?;
            let value = codec::key_value(schema, range, bound)?;
            let op = if input.descending {
                RangeOp::Le(value)
            } else {
                RangeOp::Ge(value)
            };
            key_condition = key_condition.with_range(range.name.clone(), op);
        }

        let exclusive_start_key = match &input.starting_after {
            Some(cursor) => {
                let item = codec::encode(cursor)?;
                let index_key = index.map(|_| key_schema);
                Some(codec::cursor_key(schema, index_key, &item)?)
            }
            None => None,
        };

        Ok(QueryRequest {
            table_name: self.table_name.clone(),
            index_name: index.map(str::to_string),
            key_condition,
            scan_forward: !input.descending,
            exclusive_start_key,
            limit: None,
            // Secondary indexes only support eventually consistent reads.
            consistent_read: index.is_none() && !input.disable_consistent_read,
        })
    }
}
