//! Atomic multi-item writes across entity types.

use std::sync::Arc;

use tablekit_core::codec;
use tablekit_core::condition::Condition;
use tablekit_core::context::Context;
use tablekit_core::storage::{
    Entity, Error, NaturalKey, Result, Store, StoreError, TransactItem, ValidationError,
};

use crate::table::not_exists_condition;

/// Maximum number of items in one transaction.
pub const MAX_TRANSACTION_ITEMS: usize = 100;

/// Builder for an all-or-nothing write.
///
/// Items may target different entity types. If any precondition fails the
/// whole transaction is cancelled and nothing is written.
pub struct Transaction<S> {
    store: Arc<S>,
    prefix: String,
    items: Vec<TransactItem>,
}

impl<S: Store> Transaction<S> {
    pub(crate) fn new(store: Arc<S>, prefix: String) -> Self {
        Self {
            store,
            prefix,
            items: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Puts `entity`, optionally under a precondition on its current item.
    pub fn put<E: Entity>(mut self, entity: &E, condition: Option<Condition>) -> Result<Self> {
        let schema = E::schema();
        let item = codec::encode(entity)?;
        codec::primary_key_item(schema, &codec::natural_key(schema, &item)?)?;
        self.items.push(TransactItem::Put {
            table_name: schema.table_name(&self.prefix),
            item,
            condition,
        });
        Ok(self)
    }

    /// Puts `entity` only if no item with its primary key exists.
    pub fn create<E: Entity>(self, entity: &E) -> Result<Self> {
        self.put(entity, Some(not_exists_condition(E::schema())))
    }

    /// Deletes the item named by `key`, optionally under a precondition.
    pub fn delete<E: Entity>(mut self, key: &NaturalKey, condition: Option<Condition>) -> Result<Self> {
        let schema = E::schema();
        self.items.push(TransactItem::Delete {
            table_name: schema.table_name(&self.prefix),
            key: codec::primary_key_item(schema, key)?,
            condition,
        });
        Ok(self)
    }

    /// Requires `condition` to hold on the item named by `key` without writing it.
    pub fn condition_check<E: Entity>(mut self, key: &NaturalKey, condition: Condition) -> Result<Self> {
        let schema = E::schema();
        self.items.push(TransactItem::ConditionCheck {
            table_name: schema.table_name(&self.prefix),
            key: codec::primary_key_item(schema, key)?,
            condition,
        });
        Ok(self)
    }

    /// Submits every item atomically.
    ///
    /// A failed precondition yields [`Error::TransactionCanceled`] with one
    /// reason per item, in submission order.
    pub async fn commit(self, ctx: &Context) -> Result<()> {
        let received = self.items.len();
        if received == 0 || received > MAX_TRANSACTION_ITEMS {
            return Err(ValidationError::TransactionSize {
                received,
                allowed: MAX_TRANSACTION_ITEMS,
            }
            .into());
        }
        tracing::debug!(items = received, "Committing transaction");

        match ctx.run(self.store.transact_write(self.items)).await? {
            Ok(()) => Ok(()),
            Err(StoreError::TransactionCanceled { reasons }) => {
                tracing::debug!(?reasons, "Transaction canceled");
                Err(Error::TransactionCanceled { reasons })
            }
            Err(err) => Err(err.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{self, SimpleThing, Thing};
    use tablekit_core::storage::CancellationReason;

    #[tokio::test]
    async fn test_commit_writes_across_entities() {
        let db = fixtures::database().await;
        let ctx = Context::background();
        let thing = fixtures::thing("a", 1);
        db.table::<SimpleThing>()
            .save(&ctx, &SimpleThing::new("old"))
            .await
            .unwrap();

        db.transaction()
            .create(&thing)
            .unwrap()
            .put(&SimpleThing::new("new"), None)
            .unwrap()
            .delete::<SimpleThing>(&NaturalKey::new().with("name", "old"), None)
            .unwrap()
            .commit(&ctx)
            .await
            .unwrap();

        assert_eq!(
            db.table::<Thing>()
                .get(&ctx, &fixtures::thing_key("a", 1))
                .await
                .unwrap(),
            thing
        );
        let simple = db.table::<SimpleThing>();
        assert!(simple
            .get(&ctx, &NaturalKey::new().with("name", "new"))
            .await
            .is_ok());
        assert!(matches!(
            simple.get(&ctx, &NaturalKey::new().with("name", "old")).await,
            Err(Error::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_failed_condition_cancels_everything() {
        let db = fixtures::database().await;
        let ctx = Context::background();
        let existing = SimpleThing::new("taken");
        db.table::<SimpleThing>().save(&ctx, &existing).await.unwrap();

        let error = db
            .transaction()
            .create(&fixtures::thing("a", 1))
            .unwrap()
            .create(&existing)
            .unwrap()
            .commit(&ctx)
            .await
            .unwrap_err();

        assert_eq!(
            error,
            Error::TransactionCanceled {
                reasons: vec![
                    CancellationReason::none(),
                    CancellationReason::condition_failed(),
                ],
            }
        );
        assert!(matches!(
            db.table::<Thing>()
                .get(&ctx, &fixtures::thing_key("a", 1))
                .await,
            Err(Error::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_condition_check() {
        let db = fixtures::database().await;
        let ctx = Context::background();
        let key = NaturalKey::new().with("name", "parent");

        let missing_parent = db
            .transaction()
            .condition_check::<SimpleThing>(&key, Condition::exists("name"))
            .unwrap()
            .put(&fixtures::thing("child", 1), None)
            .unwrap()
            .commit(&ctx)
            .await;
        assert!(matches!(
            missing_parent,
            Err(Error::TransactionCanceled { .. })
        ));

        db.table::<SimpleThing>()
            .save(&ctx, &SimpleThing::new("parent"))
            .await
            .unwrap();
        db.transaction()
            .condition_check::<SimpleThing>(&key, Condition::exists("name"))
            .unwrap()
            .put(&fixtures::thing("child", 1), None)
            .unwrap()
            .commit(&ctx)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_size_limits() {
        let db = fixtures::database().await;
        let ctx = Context::background();

        assert_eq!(
            db.transaction().commit(&ctx).await,
            Err(Error::Validation(ValidationError::TransactionSize {
                received: 0,
                allowed: MAX_TRANSACTION_ITEMS,
            }))
        );

        let mut transaction = db.transaction();
        for i in 0..=MAX_TRANSACTION_ITEMS {
            transaction = transaction
                .put(&SimpleThing::new(format!("t{i}")), None)
                .unwrap();
        }
        let before = db.store().request_count();
        assert_eq!(
            transaction.commit(&ctx).await,
            Err(Error::Validation(ValidationError::TransactionSize {
                received: MAX_TRANSACTION_ITEMS + 1,
                allowed: MAX_TRANSACTION_ITEMS,
            }))
        );
        assert_eq!(db.store().request_count(), before);
    }
}
