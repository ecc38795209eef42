//! In-memory store implementation.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use tablekit_core::attribute::{compare_keys, AttributeValue, Item};
use tablekit_core::schema::{EntitySchema, KeySchema, Projection};
use tablekit_core::storage::{
    CancellationReason, DeleteItem, GetItem, Page, PutItem, QueryRequest, ScanRequest, Store,
    StoreError, StoreResult, TransactItem, WriteRequest,
};

/// Largest batch the store accepts in one call.
const MAX_BATCH_WRITE: usize = 25;

// ============================================================================
// Key ordering
// ============================================================================

/// Key attribute value ordered the way the store orders keys.
#[derive(Debug, Clone)]
struct KeyValue(AttributeValue);

impl PartialEq for KeyValue {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for KeyValue {}

impl PartialOrd for KeyValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for KeyValue {
    fn cmp(&self, other: &Self) -> Ordering {
        compare_keys(&self.0, &other.0)
    }
}

type KeyTuple = (KeyValue, Option<KeyValue>);

/// Index hash, index range, then the table key as tie-breaker.
type Position = (KeyValue, Option<KeyValue>, KeyTuple);

fn key_tuple(key: &KeySchema, item: &Item) -> Option<KeyTuple> {
    let hash = KeyValue(item.get(&key.hash.name)?.clone());
    let range = match &key.range {
        Some(range) => Some(KeyValue(item.get(&range.name)?.clone())),
        None => None,
    };
    Some((hash, range))
}

// ============================================================================
// Tables
// ============================================================================

#[derive(Debug)]
struct MemoryTable {
    schema: EntitySchema,
    items: BTreeMap<KeyTuple, Item>,
}

impl MemoryTable {
    fn primary_key(&self, item: &Item) -> StoreResult<KeyTuple> {
        key_tuple(&self.schema.primary_key, item).ok_or_else(|| {
            StoreError::Service(
                "One or more parameter values were invalid: Missing the key".to_string(),
            )
        })
    }

    /// Rejects items whose key attributes have the wrong type.
    fn validate(&self, item: &Item) -> StoreResult<()> {
        let key_attributes = self
            .schema
            .primary_key
            .attributes()
            .chain(self.schema.indexes.iter().flat_map(|i| i.key.attributes()));
        for attribute in key_attributes {
            if let Some(value) = item.get(&attribute.name) {
                if value.type_name() != attribute.attribute_type.as_str() {
                    return Err(StoreError::Service(format!(
                        "One or more parameter values were invalid: Type mismatch for key {}",
                        attribute.name
                    )));
                }
            }
        }
        self.primary_key(item).map(|_| ())
    }

    fn index(&self, name: Option<&str>) -> StoreResult<(&KeySchema, Option<&Projection>)> {
        match name {
            None => Ok((&self.schema.primary_key, None)),
            Some(name) => self
                .schema
                .index(name)
                .map(|index| (&index.key, Some(&index.projection)))
                .ok_or_else(|| {
                    StoreError::Service(format!(
                        "The table does not have the specified index: {name}"
                    ))
                }),
        }
    }

    fn position(&self, key: &KeySchema, item: &Item) -> Option<Position> {
        let (hash, range) = key_tuple(key, item)?;
        let primary = key_tuple(&self.schema.primary_key, item)?;
        Some((hash, range, primary))
    }

    fn start_position(&self, key: &KeySchema, start: &Item) -> StoreResult<Position> {
        self.position(key, start).ok_or_else(|| {
            StoreError::Service("The provided starting key is invalid".to_string())
        })
    }

    /// Table key plus index key attributes of `item`.
    fn cursor(&self, key: &KeySchema, item: &Item) -> Item {
        self.schema
            .primary_key
            .attributes()
            .chain(key.attributes())
            .filter_map(|attribute| {
                item.get(&attribute.name)
                    .map(|value| (attribute.name.clone(), value.clone()))
            })
            .collect()
    }

    fn project(&self, key: &KeySchema, projection: Option<&Projection>, item: &Item) -> Item {
        match projection {
            None | Some(Projection::All) => item.clone(),
            Some(Projection::KeysOnly) => self.cursor(key, item),
            Some(Projection::Include(attributes)) => {
                let mut projected = self.cursor(key, item);
                for name in attributes {
                    if let Some(value) = item.get(name) {
                        projected.insert(name.clone(), value.clone());
                    }
                }
                projected
            }
        }
    }
}

fn table_not_found(table_name: &str) -> StoreError {
    StoreError::ResourceNotFound(format!(
        "Requested resource not found: Table: {table_name} not found"
    ))
}

// ============================================================================
// Store
// ============================================================================

/// In-memory store for testing.
///
/// Beyond the [`Store`] contract it exposes test hooks: a forced page size,
/// simulated unprocessed batch items and a counter of store calls.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    tables: Arc<RwLock<HashMap<String, MemoryTable>>>,
    page_size: Option<usize>,
    requests: Arc<AtomicUsize>,
    throttled_batches: Arc<AtomicUsize>,
}

impl InMemoryStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Caps every query and scan page at `page_size` items.
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = Some(page_size.max(1));
        self
    }

    /// Number of store calls made so far.
    pub fn request_count(&self) -> usize {
        self.requests.load(AtomicOrdering::SeqCst)
    }

    /// Makes the next `rounds` batch writes leave their last request unprocessed.
    pub fn throttle_batch_writes(&self, rounds: usize) {
        self.throttled_batches.store(rounds, AtomicOrdering::SeqCst);
    }

    fn record(&self) {
        self.requests.fetch_add(1, AtomicOrdering::SeqCst);
    }

    fn take_throttled_round(&self) -> bool {
        self.throttled_batches
            .fetch_update(AtomicOrdering::SeqCst, AtomicOrdering::SeqCst, |n| {
                n.checked_sub(1)
            })
            .is_ok()
    }

    fn page(
        &self,
        table: &MemoryTable,
        key: &KeySchema,
        projection: Option<&Projection>,
        matches: Vec<(Position, &Item)>,
        limit: Option<usize>,
    ) -> Page {
        let limit = limit
            .unwrap_or(usize::MAX)
            .min(self.page_size.unwrap_or(usize::MAX))
            .max(1);
        let hit_limit = matches.len() >= limit;
        let selected: Vec<&Item> = matches
            .into_iter()
            .take(limit)
            .map(|(_, item)| item)
            .collect();

        // The store stops at the limit without checking for more items.
        let last_evaluated_key = match selected.last() {
            Some(last) if hit_limit => Some(table.cursor(key, last)),
            _ => None,
        };
        Page {
            items: selected
                .into_iter()
                .map(|item| table.project(key, projection, item))
                .collect(),
            last_evaluated_key,
        }
    }
}

fn table<'a>(tables: &'a HashMap<String, MemoryTable>, name: &str) -> StoreResult<&'a MemoryTable> {
    tables.get(name).ok_or_else(|| table_not_found(name))
}

fn table_mut<'a>(
    tables: &'a mut HashMap<String, MemoryTable>,
    name: &str,
) -> StoreResult<&'a mut MemoryTable> {
    tables.get_mut(name).ok_or_else(|| table_not_found(name))
}

#[async_trait]
impl Store for InMemoryStore {
    async fn create_table(&self, table_name: &str, schema: &EntitySchema) -> StoreResult<()> {
        self.record();
        let mut tables = self.tables.write().await;
        if tables.contains_key(table_name) {
            return Err(StoreError::ResourceInUse(format!(
                "Table already exists: {table_name}"
            )));
        }
        tables.insert(
            table_name.to_string(),
            MemoryTable {
                schema: schema.clone(),
                items: BTreeMap::new(),
            },
        );
        Ok(())
    }

    async fn put_item(&self, request: PutItem) -> StoreResult<()> {
        self.record();
        let mut tables = self.tables.write().await;
        let table = table_mut(&mut tables, &request.table_name)?;
        table.validate(&request.item)?;
        let key = table.primary_key(&request.item)?;

        if let Some(condition) = &request.condition {
            if !condition.evaluate(table.items.get(&key)) {
                return Err(StoreError::ConditionalCheckFailed);
            }
        }
        table.items.insert(key, request.item);
        Ok(())
    }

    async fn get_item(&self, request: GetItem) -> StoreResult<Option<Item>> {
        self.record();
        let tables = self.tables.read().await;
        let table = table(&tables, &request.table_name)?;
        let key = table.primary_key(&request.key)?;
        Ok(table.items.get(&key).cloned())
    }

    async fn delete_item(&self, request: DeleteItem) -> StoreResult<()> {
        self.record();
        let mut tables = self.tables.write().await;
        let table = table_mut(&mut tables, &request.table_name)?;
        let key = table.primary_key(&request.key)?;

        if let Some(condition) = &request.condition {
            if !condition.evaluate(table.items.get(&key)) {
                return Err(StoreError::ConditionalCheckFailed);
            }
        }
        table.items.remove(&key);
        Ok(())
    }

    async fn query(&self, request: QueryRequest) -> StoreResult<Page> {
        self.record();
        let tables = self.tables.read().await;
        let table = table(&tables, &request.table_name)?;
        let (key, projection) = table.index(request.index_name.as_deref())?;

        let mut matches: Vec<(Position, &Item)> = table
            .items
            .values()
            .filter(|item| request.key_condition.matches(item))
            .filter_map(|item| table.position(key, item).map(|position| (position, item)))
            .collect();
        matches.sort_by(|a, b| a.0.cmp(&b.0));
        if !request.scan_forward {
            matches.reverse();
        }
        if let Some(start) = &request.exclusive_start_key {
            let start = table.start_position(key, start)?;
            matches.retain(|(position, _)| {
                if request.scan_forward {
                    *position > start
                } else {
                    *position < start
                }
            });
        }
        Ok(self.page(table, key, projection, matches, request.limit))
    }

    async fn scan(&self, request: ScanRequest) -> StoreResult<Page> {
        self.record();
        let tables = self.tables.read().await;
        let table = table(&tables, &request.table_name)?;
        let (key, projection) = table.index(request.index_name.as_deref())?;

        let mut matches: Vec<(Position, &Item)> = table
            .items
            .values()
            .filter_map(|item| table.position(key, item).map(|position| (position, item)))
            .collect();
        matches.sort_by(|a, b| a.0.cmp(&b.0));
        if let Some(start) = &request.exclusive_start_key {
            let start = table.start_position(key, start)?;
            matches.retain(|(position, _)| *position > start);
        }
        Ok(self.page(table, key, projection, matches, request.limit))
    }

    async fn batch_write(
        &self,
        table_name: &str,
        mut requests: Vec<WriteRequest>,
    ) -> StoreResult<Vec<WriteRequest>> {
        self.record();
        if requests.len() > MAX_BATCH_WRITE {
            return Err(StoreError::Service(
                "Too many items requested for the BatchWriteItem call".to_string(),
            ));
        }
        let mut tables = self.tables.write().await;
        let table = table_mut(&mut tables, table_name)?;
        let mut seen = BTreeSet::new();
        for request in &requests {
            let key = match request {
                WriteRequest::Put(item) => {
                    table.validate(item)?;
                    table.primary_key(item)?
                }
                WriteRequest::Delete(key) => table.primary_key(key)?,
            };
            if !seen.insert(key) {
                return Err(StoreError::Service(
                    "Provided list of item keys contains duplicates".to_string(),
                ));
            }
        }

        let unprocessed: Vec<WriteRequest> = if self.take_throttled_round() {
            requests.pop().into_iter().collect()
        } else {
            Vec::new()
        };
        for request in requests {
            match request {
                WriteRequest::Put(item) => {
                    let key = table.primary_key(&item)?;
                    table.items.insert(key, item);
                }
                WriteRequest::Delete(key) => {
                    let key = table.primary_key(&key)?;
                    table.items.remove(&key);
                }
            }
        }
        Ok(unprocessed)
    }

    async fn transact_write(&self, items: Vec<TransactItem>) -> StoreResult<()> {
        self.record();
        let mut tables = self.tables.write().await;

        let mut keys = Vec::with_capacity(items.len());
        let mut seen = BTreeSet::new();
        let mut reasons = Vec::with_capacity(items.len());
        for item in &items {
            let table = table(&tables, item.table_name())?;
            let key_source = match item {
                TransactItem::Put { item, .. } => {
                    table.validate(item)?;
                    item
                }
                TransactItem::Delete { key, .. } | TransactItem::ConditionCheck { key, .. } => key,
            };
            let key = table.primary_key(key_source)?;
            if !seen.insert((item.table_name().to_string(), key.clone())) {
                return Err(StoreError::Service(
                    "Transaction request cannot include multiple operations on one item"
                        .to_string(),
                ));
            }

            let holds = item
                .condition()
                .is_none_or(|condition| condition.evaluate(table.items.get(&key)));
            reasons.push(if holds {
                CancellationReason::none()
            } else {
                CancellationReason::condition_failed()
            });
            keys.push(key);
        }

        if reasons.iter().any(CancellationReason::is_condition_failure) {
            return Err(StoreError::TransactionCanceled { reasons });
        }

        for (item, key) in items.into_iter().zip(keys) {
            let table = table_mut(&mut tables, item.table_name())?;
            match item {
                TransactItem::Put { item, .. } => {
                    table.items.insert(key, item);
                }
                TransactItem::Delete { .. } => {
                    table.items.remove(&key);
                }
                TransactItem::ConditionCheck { .. } => {}
            }
        }
        Ok(())
    }
}
