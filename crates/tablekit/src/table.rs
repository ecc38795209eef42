//! Table access object: create, save, get and delete for one entity type.

use std::marker::PhantomData;
use std::sync::Arc;

use tablekit_core::codec;
use tablekit_core::condition::{Condition, KeyCondition, RangeOp};
use tablekit_core::context::Context;
use tablekit_core::schema::EntitySchema;
use tablekit_core::storage::{
    DeleteItem, Entity, Error, GetItem, NaturalKey, PutItem, QueryRequest, Result, Store,
    StoreError, ValidationError,
};

use crate::pager::ItemStream;

/// Whether `save` may replace an existing item with the same primary key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Uniqueness {
    /// Fail with [`Error::AlreadyExists`] when the item exists.
    Required,
    /// Overwrite unconditionally.
    Upsert,
}

impl Uniqueness {
    /// The default mode declared by a schema.
    pub fn for_schema(schema: &EntitySchema) -> Self {
        if schema.allow_overwrites {
            Self::Upsert
        } else {
            Self::Required
        }
    }
}

/// Typed access to the table that stores `E`.
pub struct Table<E, S> {
    pub(crate) store: Arc<S>,
    pub(crate) table_name: String,
    pub(crate) page_size: usize,
    _entity: PhantomData<fn() -> E>,
}

impl<E, S> Clone for Table<E, S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            table_name: self.table_name.clone(),
            page_size: self.page_size,
            _entity: PhantomData,
        }
    }
}

/// Precondition that holds only when no item with the same primary key exists.
pub(crate) fn not_exists_condition(schema: &EntitySchema) -> Condition {
    Condition::all(
        schema
            .primary_key
            .attributes()
            .map(|attribute| Condition::not_exists(&attribute.name))
            .collect(),
    )
}

impl<E: Entity, S: Store> Table<E, S> {
    pub(crate) fn new(store: Arc<S>, table_name: String, page_size: usize) -> Self {
        Self {
            store,
            table_name,
            page_size,
            _entity: PhantomData,
        }
    }

    pub fn name(&self) -> &str {
        &self.table_name
    }

    /// Provisions the table and its secondary indexes.
    ///
    /// Not idempotent: creating an existing table surfaces the store's
    /// "resource in use" error.
    pub async fn create(&self, ctx: &Context) -> Result<()> {
        tracing::debug!(table = %self.table_name, entity = E::entity_type(), "Creating table");
        ctx.run(self.store.create_table(&self.table_name, E::schema()))
            .await??;
        Ok(())
    }

    /// Saves `entity` with the schema's default uniqueness mode.
    pub async fn save(&self, ctx: &Context, entity: &E) -> Result<()> {
        self.save_with(ctx, entity, Uniqueness::for_schema(E::schema()))
            .await
    }

    /// Saves `entity`, failing with [`Error::AlreadyExists`] under
    /// [`Uniqueness::Required`] when an item with its key already exists.
    pub async fn save_with(&self, ctx: &Context, entity: &E, uniqueness: Uniqueness) -> Result<()> {
        let schema = E::schema();
        let item = codec::encode(entity)?;
        let condition = match uniqueness {
            Uniqueness::Required => Some(not_exists_condition(schema)),
            Uniqueness::Upsert => None,
        };
        tracing::debug!(table = %self.table_name, ?uniqueness, "Saving item");

        let key = codec::natural_key(schema, &item)?;
        // Rejects empty hash values and mistyped key fields.
        codec::primary_key_item(schema, &key)?;

        let request = PutItem {
            table_name: self.table_name.clone(),
            item,
            condition,
        };
        match ctx.run(self.store.put_item(request)).await? {
            Ok(()) => Ok(()),
            Err(StoreError::ConditionalCheckFailed) => Err(Error::AlreadyExists {
                entity_type: E::entity_type(),
                key,
            }),
            Err(err) => Err(err.into()),
        }
    }

    /// Strongly consistent point lookup by natural primary key.
    pub async fn get(&self, ctx: &Context, key: &NaturalKey) -> Result<E> {
        let request = GetItem {
            table_name: self.table_name.clone(),
            key: codec::primary_key_item(E::schema(), key)?,
            consistent_read: true,
        };
        tracing::debug!(table = %self.table_name, %key, "Getting item");

        match ctx.run(self.store.get_item(request)).await?? {
            Some(item) => codec::decode(&item),
            None => Err(Error::NotFound {
                entity_type: E::entity_type(),
                key: key.clone(),
            }),
        }
    }

    /// Lookup through a secondary index whose key identifies a single item.
    ///
    /// `key` names the index hash fields and, optionally, its range fields.
    pub async fn get_by_index(&self, ctx: &Context, index: &str, key: &NaturalKey) -> Result<E> {
        let schema = E::schema();
        let index_schema = schema
            .index(index)
            .ok_or_else(|| ValidationError::UnknownIndex {
                entity_type: E::entity_type(),
                index: index.to_string(),
            })?;
        let index_key = &index_schema.key;

        let mut condition = KeyCondition::hash(
            index_key.hash.name.clone(),
            codec::hash_key_value(schema, index_key, key)?,
        );
        if let Some(range) = &index_key.range {
            let has_range = schema
                .natural_fields(range)
                .iter()
                .any(|field| key.get(&field.name).is_some());
            if has_range {
                let value = codec::key_value(schema, range, key)?;
                condition = condition.with_range(range.name.clone(), RangeOp::Eq(value));
            }
        }

        let request = QueryRequest {
            table_name: self.table_name.clone(),
            index_name: Some(index.to_string()),
            key_condition: condition,
            scan_forward: true,
            exclusive_start_key: None,
            limit: None,
            consistent_read: false,
        };
        let mut items = ItemStream::<E, S>::query(
            Arc::clone(&self.store),
            ctx.clone(),
            request,
            self.page_size,
            Some(1),
            None,
        );
        match items.next().await? {
            Some((entity, _)) => Ok(entity),
            None => Err(Error::NotFound {
                entity_type: E::entity_type(),
                key: key.clone(),
            }),
        }
    }

    /// Deletes by natural primary key. Deleting an absent item succeeds.
    pub async fn delete(&self, ctx: &Context, key: &NaturalKey) -> Result<()> {
        let request = DeleteItem {
            table_name: self.table_name.clone(),
            key: codec::primary_key_item(E::schema(), key)?,
            condition: None,
        };
        tracing::debug!(table = %self.table_name, %key, "Deleting item");

        ctx.run(self.store.delete_item(request)).await??;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{self, Note, SimpleThing, Thing, ThingWithCompositeAttributes};
    use tablekit_core::storage::CancelReason;

    #[tokio::test]
    async fn test_save_then_get_round_trip() {
        let db = fixtures::database().await;
        let ctx = Context::background();
        let things = db.table::<Thing>();
        let thing = fixtures::thing("a", 1);

        things.save(&ctx, &thing).await.unwrap();
        let loaded = things.get(&ctx, &fixtures::thing_key("a", 1)).await.unwrap();

        assert_eq!(loaded, thing);
    }

    #[tokio::test]
    async fn test_save_twice_is_already_exists() {
        let db = fixtures::database().await;
        let ctx = Context::background();
        let simple = db.table::<SimpleThing>();
        let x = SimpleThing::new("x");

        simple.save(&ctx, &x).await.unwrap();
        let error = simple.save(&ctx, &x).await.unwrap_err();

        assert_eq!(
            error,
            Error::AlreadyExists {
                entity_type: "SimpleThing",
                key: NaturalKey::new().with("name", "x"),
            }
        );
    }

    #[tokio::test]
    async fn test_upsert_overwrites() {
        let db = fixtures::database().await;
        let ctx = Context::background();
        let things = db.table::<Thing>();
        let mut thing = fixtures::thing("a", 1);

        things.save(&ctx, &thing).await.unwrap();
        thing.category = Some("tools".to_string());
        things
            .save_with(&ctx, &thing, Uniqueness::Upsert)
            .await
            .unwrap();

        let loaded = things.get(&ctx, &fixtures::thing_key("a", 1)).await.unwrap();
        assert_eq!(loaded.category.as_deref(), Some("tools"));
    }

    #[tokio::test]
    async fn test_get_missing_is_not_found() {
        let db = fixtures::database().await;
        let ctx = Context::background();
        let key = NaturalKey::new().with("name", "missing");

        let error = db.table::<SimpleThing>().get(&ctx, &key).await.unwrap_err();

        assert_eq!(
            error,
            Error::NotFound {
                entity_type: "SimpleThing",
                key,
            }
        );
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let db = fixtures::database().await;
        let ctx = Context::background();
        let simple = db.table::<SimpleThing>();
        let key = NaturalKey::new().with("name", "gone");

        simple.save(&ctx, &SimpleThing::new("gone")).await.unwrap();
        simple.delete(&ctx, &key).await.unwrap();
        simple.delete(&ctx, &key).await.unwrap();

        assert!(matches!(
            simple.get(&ctx, &key).await,
            Err(Error::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_get_by_index() {
        let db = fixtures::database().await;
        let ctx = Context::background();
        let things = db.table::<Thing>();
        let thing = fixtures::thing("a", 1);
        things.save(&ctx, &thing).await.unwrap();

        let found = things
            .get_by_index(&ctx, "thingID", &NaturalKey::new().with("id", thing.id.clone()))
            .await
            .unwrap();
        assert_eq!(found, thing);

        let missing = NaturalKey::new().with("id", "nope");
        assert_eq!(
            things.get_by_index(&ctx, "thingID", &missing).await,
            Err(Error::NotFound {
                entity_type: "Thing",
                key: missing,
            })
        );
    }

    #[tokio::test]
    async fn test_get_by_unknown_index() {
        let db = fixtures::database().await;
        let ctx = Context::background();

        let error = db
            .table::<Thing>()
            .get_by_index(&ctx, "nope", &NaturalKey::new().with("id", "1"))
            .await
            .unwrap_err();
        assert_eq!(
            error,
            Error::Validation(ValidationError::UnknownIndex {
                entity_type: "Thing",
                index: "nope".to_string(),
            })
        );
    }

    #[tokio::test]
    async fn test_create_twice_is_resource_in_use() {
        let db = fixtures::database().await;
        let ctx = Context::background();

        let error = db.table::<Thing>().create(&ctx).await.unwrap_err();
        assert!(matches!(
            error,
            Error::Provider(StoreError::ResourceInUse(_))
        ));
    }

    #[tokio::test]
    async fn test_missing_table_is_provider_error() {
        let db = fixtures::empty_database();
        let ctx = Context::background();

        let error = db
            .table::<SimpleThing>()
            .get(&ctx, &NaturalKey::new().with("name", "x"))
            .await
            .unwrap_err();
        assert!(matches!(
            error,
            Error::Provider(StoreError::ResourceNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_empty_hash_key_is_rejected_without_io() {
        let db = fixtures::database().await;
        let ctx = Context::background();
        let before = db.store().request_count();

        let error = db
            .table::<SimpleThing>()
            .save(&ctx, &SimpleThing::new(""))
            .await
            .unwrap_err();

        assert_eq!(
            error,
            Error::Validation(ValidationError::EmptyHashKey {
                field: "name".to_string()
            })
        );
        assert_eq!(db.store().request_count(), before);
    }

    #[tokio::test]
    async fn test_cancelled_context_stops_get() {
        let db = fixtures::database().await;
        let (ctx, handle) = Context::with_cancel();
        handle.cancel();

        let error = db
            .table::<SimpleThing>()
            .get(&ctx, &NaturalKey::new().with("name", "x"))
            .await
            .unwrap_err();
        assert_eq!(error, Error::Cancelled(CancelReason::Cancelled));
    }

    #[test]
    fn test_uniqueness_follows_schema() {
        assert_eq!(Uniqueness::for_schema(Thing::schema()), Uniqueness::Required);
        assert_eq!(Uniqueness::for_schema(Note::schema()), Uniqueness::Upsert);
    }

    #[tokio::test]
    async fn test_save_overwrites_when_schema_allows() {
        let db = fixtures::database().await;
        let ctx = Context::background();
        let notes = db.table::<Note>();
        let key = NaturalKey::new().with("name", "todo");

        notes.save(&ctx, &Note::new("todo", "first")).await.unwrap();
        notes.save(&ctx, &Note::new("todo", "second")).await.unwrap();
        assert_eq!(notes.get(&ctx, &key).await.unwrap().body, "second");

        let error = notes
            .save_with(&ctx, &Note::new("todo", "third"), Uniqueness::Required)
            .await
            .unwrap_err();
        assert_eq!(
            error,
            Error::AlreadyExists {
                entity_type: "Note",
                key,
            }
        );
    }

    #[tokio::test]
    async fn test_separator_collision_is_rejected_without_io() {
        let db = fixtures::database().await;
        let ctx = Context::background();
        let before = db.store().request_count();

        let error = db
            .table::<ThingWithCompositeAttributes>()
            .save(
                &ctx,
                &ThingWithCompositeAttributes::new("api", "feature@x", "2024-01-01", 1),
            )
            .await
            .unwrap_err();

        assert!(matches!(
            error,
            Error::Validation(ValidationError::SeparatorInValue { separator: '@', .. })
        ));
        assert_eq!(db.store().request_count(), before);
    }
}
