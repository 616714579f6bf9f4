//! redb-based durable store for orders
//!
//! # Tables
//!
//! | Table | Key | Value | Purpose |
//! |-------|-----|-------|---------|
//! | `orders` | `order_uid` | `OrderRow` | Order header |
//! | `delivery` | `order_uid` | `Delivery` | 1:1 delivery row |
//! | `payment` | `order_uid` | `Payment` | 1:1 payment row |
//! | `items` | `(order_uid, position)` | `Item` | Order lines, in insertion order |
//!
//! Values are JSON. An order is spread over four tables the same way a relational schema
//! would hold it, and [`RedbOrderStore::load_orders`] joins them back by `order_uid`.
//!
//! # Atomicity
//!
//! [`RedbOrderStore::put_order`] writes all four tables in one write transaction. redb readers
//! work on the last committed snapshot, so a concurrent `load_all` sees either the old
//! order or the new one, never a header without its items.

use crate::model::{Delivery, Item, Order, Payment};
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use ingest_framework::{RecordLoader, RecordUpserter, StoreError};
use redb::{Database, ReadableDatabase, ReadableTable, ReadableTableMetadata, TableDefinition};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, instrument};

/// Order headers: key = order_uid, value = JSON-serialized OrderRow
const ORDERS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("orders");

/// Delivery rows: key = order_uid, value = JSON-serialized Delivery
const DELIVERY_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("delivery");

/// Payment rows: key = order_uid, value = JSON-serialized Payment
const PAYMENT_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("payment");

/// Item rows: key = (order_uid, position), value = JSON-serialized Item
const ITEMS_TABLE: TableDefinition<(&str, u32), &[u8]> = TableDefinition::new("items");

/// Storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] redb::DatabaseError),

    #[error("Transaction error: {0}")]
    Transaction(#[from] redb::TransactionError),

    #[error("Table error: {0}")]
    Table(#[from] redb::TableError),

    #[error("Storage error: {0}")]
    Storage(#[from] redb::StorageError),

    #[error("Commit error: {0}")]
    Commit(#[from] redb::CommitError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Corrupt order {order_uid}: {reason}")]
    Corrupt { order_uid: String, reason: String },

    #[error("Storage task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

pub type StorageResult<T> = Result<T, StorageError>;

impl From<StorageError> for StoreError {
    fn from(e: StorageError) -> Self {
        StoreError::backend(e)
    }
}

/// Header columns of an order, without its owned rows.
#[derive(Debug, Serialize, Deserialize)]
struct OrderRow {
    track_number: String,
    entry: String,
    locale: String,
    internal_signature: String,
    customer_id: String,
    delivery_service: String,
    shardkey: String,
    sm_id: i64,
    date_created: DateTime<FixedOffset>,
    oof_shard: String,
}

impl From<&Order> for OrderRow {
    fn from(order: &Order) -> Self {
        Self {
            track_number: order.track_number.clone(),
            entry: order.entry.clone(),
            locale: order.locale.clone(),
            internal_signature: order.internal_signature.clone(),
            customer_id: order.customer_id.clone(),
            delivery_service: order.delivery_service.clone(),
            shardkey: order.shardkey.clone(),
            sm_id: order.sm_id,
            date_created: order.date_created,
            oof_shard: order.oof_shard.clone(),
        }
    }
}

impl OrderRow {
    fn into_order(
        self,
        order_uid: String,
        delivery: Delivery,
        payment: Payment,
        items: Vec<Item>,
    ) -> Order {
        Order {
            order_uid,
            track_number: self.track_number,
            entry: self.entry,
            delivery,
            payment,
            items,
            locale: self.locale,
            internal_signature: self.internal_signature,
            customer_id: self.customer_id,
            delivery_service: self.delivery_service,
            shardkey: self.shardkey,
            sm_id: self.sm_id,
            date_created: self.date_created,
            oof_shard: self.oof_shard,
        }
    }
}

/// Order store backed by redb
#[derive(Clone)]
pub struct RedbOrderStore {
    db: Arc<Database>,
}

impl RedbOrderStore {
    /// Open or create the database at the given path
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        let db = Database::create(path.as_ref())?;
        let store = Self { db: Arc::new(db) };
        store.init_tables()?;
        let orders = store.count()?;
        info!(path = %path.as_ref().display(), orders, "Order store opened");
        Ok(store)
    }

    /// Create an in-memory database (for testing)
    pub fn open_in_memory() -> StorageResult<Self> {
        let db = Database::builder().create_with_backend(redb::backends::InMemoryBackend::new())?;
        let store = Self { db: Arc::new(db) };
        store.init_tables()?;
        Ok(store)
    }

    fn init_tables(&self) -> StorageResult<()> {
        let write_txn = self.db.begin_write()?;
        {
            let _ = write_txn.open_table(ORDERS_TABLE)?;
            let _ = write_txn.open_table(DELIVERY_TABLE)?;
            let _ = write_txn.open_table(PAYMENT_TABLE)?;
            let _ = write_txn.open_table(ITEMS_TABLE)?;
        }
        write_txn.commit()?;
        Ok(())
    }

    /// Number of stored orders
    pub fn count(&self) -> StorageResult<u64> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(ORDERS_TABLE)?;
        Ok(table.len()?)
    }

    /// Insert or replace an order together with its delivery, payment and items
    pub fn put_order(&self, order: &Order) -> StorageResult<()> {
        let order_uid = order.order_uid.as_str();
        let header = serde_json::to_vec(&OrderRow::from(order))?;
        let delivery = serde_json::to_vec(&order.delivery)?;
        let payment = serde_json::to_vec(&order.payment)?;
        let items = order
            .items
            .iter()
            .map(serde_json::to_vec)
            .collect::<Result<Vec<_>, _>>()?;

        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(ORDERS_TABLE)?;
            table.insert(order_uid, header.as_slice())?;

            let mut table = txn.open_table(DELIVERY_TABLE)?;
            table.insert(order_uid, delivery.as_slice())?;

            let mut table = txn.open_table(PAYMENT_TABLE)?;
            table.insert(order_uid, payment.as_slice())?;

            let mut table = txn.open_table(ITEMS_TABLE)?;
            let mut stale = Vec::new();
            for result in table.range((order_uid, 0u32)..=(order_uid, u32::MAX))? {
                let (key, _value) = result?;
                stale.push(key.value().1);
            }
            for position in &stale {
                table.remove((order_uid, *position))?;
            }
            for (position, row) in items.iter().enumerate() {
                table.insert((order_uid, position as u32), row.as_slice())?;
            }
        }
        txn.commit()?;

        debug!(order_uid, items = items.len(), "Order written");
        Ok(())
    }

    /// Load every order from one read snapshot
    pub fn load_orders(&self) -> StorageResult<Vec<Order>> {
        let read_txn = self.db.begin_read()?;
        let orders_table = read_txn.open_table(ORDERS_TABLE)?;
        let delivery_table = read_txn.open_table(DELIVERY_TABLE)?;
        let payment_table = read_txn.open_table(PAYMENT_TABLE)?;
        let items_table = read_txn.open_table(ITEMS_TABLE)?;

        let mut orders = Vec::new();
        for result in orders_table.iter()? {
            let (key, value) = result?;
            let order_uid = key.value().to_string();
            let row: OrderRow = serde_json::from_slice(value.value())?;

            let delivery: Delivery = match delivery_table.get(order_uid.as_str())? {
                Some(guard) => serde_json::from_slice(guard.value())?,
                None => return Err(corrupt(&order_uid, "missing delivery row")),
            };
            let payment: Payment = match payment_table.get(order_uid.as_str())? {
                Some(guard) => serde_json::from_slice(guard.value())?,
                None => return Err(corrupt(&order_uid, "missing payment row")),
            };

            let mut items = Vec::new();
            let uid = order_uid.as_str();
            for result in items_table.range((uid, 0u32)..=(uid, u32::MAX))? {
                let (_key, value) = result?;
                let item: Item = serde_json::from_slice(value.value())?;
                items.push(item);
            }

            orders.push(row.into_order(order_uid, delivery, payment, items));
        }

        Ok(orders)
    }

    /// Look up a single order. Not used on the read path, which is served by the cache.
    pub fn get_order(&self, order_uid: &str) -> StorageResult<Option<Order>> {
        let read_txn = self.db.begin_read()?;
        let orders_table = read_txn.open_table(ORDERS_TABLE)?;
        let Some(header) = orders_table.get(order_uid)? else {
            return Ok(None);
        };
        let row: OrderRow = serde_json::from_slice(header.value())?;

        let delivery_table = read_txn.open_table(DELIVERY_TABLE)?;
        let delivery: Delivery = match delivery_table.get(order_uid)? {
            Some(guard) => serde_json::from_slice(guard.value())?,
            None => return Err(corrupt(order_uid, "missing delivery row")),
        };
        let payment_table = read_txn.open_table(PAYMENT_TABLE)?;
        let payment: Payment = match payment_table.get(order_uid)? {
            Some(guard) => serde_json::from_slice(guard.value())?,
            None => return Err(corrupt(order_uid, "missing payment row")),
        };

        let items_table = read_txn.open_table(ITEMS_TABLE)?;
        let mut items = Vec::new();
        for result in items_table.range((order_uid, 0u32)..=(order_uid, u32::MAX))? {
            let (_key, value) = result?;
            items.push(serde_json::from_slice(value.value())?);
        }

        Ok(Some(row.into_order(
            order_uid.to_string(),
            delivery,
            payment,
            items,
        )))
    }

    #[cfg(test)]
    fn delete_delivery_row(&self, order_uid: &str) -> StorageResult<()> {
        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(DELIVERY_TABLE)?;
            table.remove(order_uid)?;
        }
        txn.commit()?;
        Ok(())
    }
}

fn corrupt(order_uid: &str, reason: &str) -> StorageError {
    StorageError::Corrupt {
        order_uid: order_uid.to_string(),
        reason: reason.to_string(),
    }
}

#[async_trait]
impl RecordLoader<Order> for RedbOrderStore {
    #[instrument(skip_all)]
    async fn load_all(&self) -> Result<Vec<Order>, StoreError> {
        let store = self.clone();
        let orders = tokio::task::spawn_blocking(move || store.load_orders())
            .await
            .map_err(StorageError::from)??;
        info!(count = orders.len(), "Loaded orders from store");
        Ok(orders)
    }
}

#[async_trait]
impl RecordUpserter<Order> for RedbOrderStore {
    async fn put(&self, order: &Order) -> Result<(), StoreError> {
        let store = self.clone();
        let order = order.clone();
        tokio::task::spawn_blocking(move || store.put_order(&order))
            .await
            .map_err(StorageError::from)??;
        Ok(())
    }
}
