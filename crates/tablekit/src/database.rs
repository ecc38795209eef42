use std::sync::Arc;

use tablekit_core::storage::{Entity, Store};

use crate::config::Config;
use crate::table::Table;
use crate::transaction::Transaction;

/// Entry point of the engine: a store plus the configuration shared by every table.
#[derive(Debug)]
pub struct Database<S> {
    store: Arc<S>,
    config: Config,
}

impl<S> Clone for Database<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            config: self.config.clone(),
        }
    }
}

impl<S: Store> Database<S> {
    pub fn new(store: S, config: Config) -> Self {
        Self::from_arc(Arc::new(store), config)
    }

    pub fn from_arc(store: Arc<S>, config: Config) -> Self {
        Self { store, config }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Physical table name of `E` under the configured prefix.
    pub fn table_name<E: Entity>(&self) -> String {
        E::schema().table_name(&self.config.table_prefix)
    }

    /// Table access object for `E`.
    pub fn table<E: Entity>(&self) -> Table<E, S> {
        Table::new(
            Arc::clone(&self.store),
            self.table_name::<E>(),
            self.config.page_size,
        )
    }

    /// Starts an atomic multi-item write.
    pub fn transaction(&self) -> Transaction<S> {
        Transaction::new(Arc::clone(&self.store), self.config.table_prefix.clone())
    }
}
