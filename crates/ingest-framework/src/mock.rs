//! # Mock Store & Testing Guide
//!
//! [`MockStore<T>`] implements the same [`RecordLoader`] / [`RecordUpserter`] API as a real
//! store but keeps everything in memory. By default it behaves like a correct upserting
//! store; on top of that you can script failures for upcoming calls, which are otherwise
//! hard to reproduce (connection drops, constraint violations, a store that is down at
//! startup).
//!
//! ## When to use the Mock vs a Real Store
//!
//! | Feature | MockStore | Real store |
//! |---------|-----------|------------|
//! | **Speed** | Instant (in-memory) | Disk I/O |
//! | **Determinism** | 100% Deterministic | Subject to the backend |
//! | **Error Injection** | Easy (`return_err`) | Hard |
//! | **Use Case** | Consumer / bootstrap logic | Storage layout, atomicity, restarts |
//!
//! ## Example
//!
//! ```rust
//! use ingest_framework::mock::MockStore;
//! use ingest_framework::{Record, RecordUpserter, StoreError};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Clone, Debug, Serialize, Deserialize)]
//! struct Ticket { id: String }
//!
//! impl Record for Ticket {
//!     type Id = String;
//!     fn id(&self) -> &String { &self.id }
//! }
//!
//! #[tokio::main]
//! async fn main() {
//!     let store = MockStore::<Ticket>::new();
//!     store.expect_put().return_err(StoreError::Unavailable("db down".into()));
//!
//!     let ticket = Ticket { id: "t1".into() };
//!     assert!(store.put(&ticket).await.is_err());
//!     assert!(store.get("t1").is_none());
//!
//!     // Unscripted calls go through.
//!     store.put(&ticket).await.unwrap();
//!     assert!(store.get("t1").is_some());
//!
//!     store.verify();
//! }
//! ```

use crate::error::StoreError;
use crate::record::Record;
use crate::store::{RecordLoader, RecordUpserter};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::borrow::Borrow;
use std::collections::{HashMap, VecDeque};
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

type Script = Arc<Mutex<VecDeque<Result<(), StoreError>>>>;

/// An in-memory store with scripted failures.
pub struct MockStore<T: Record> {
    records: Mutex<HashMap<T::Id, T>>,
    put_script: Script,
    load_script: Script,
    put_calls: AtomicU64,
    put_delay: Option<Duration>,
}

impl<T: Record> Default for MockStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Record> MockStore<T> {
    /// Creates an empty store with no scripted failures.
    pub fn new() -> Self {
        Self {
            records: Mutex::new(HashMap::new()),
            put_script: Arc::new(Mutex::new(VecDeque::new())),
            load_script: Arc::new(Mutex::new(VecDeque::new())),
            put_calls: AtomicU64::new(0),
            put_delay: None,
        }
    }

    /// Creates a store that already holds `records`.
    pub fn with_records(records: impl IntoIterator<Item = T>) -> Self {
        let store = Self::new();
        {
            let mut map = store.records.lock();
            for record in records {
                map.insert(record.id().clone(), record);
            }
        }
        store
    }

    /// Makes every `put` take at least `delay`, to simulate slow I/O.
    pub fn with_put_delay(mut self, delay: Duration) -> Self {
        self.put_delay = Some(delay);
        self
    }

    /// Scripts the outcome of the next unscripted `put`.
    pub fn expect_put(&self) -> ExpectationBuilder {
        ExpectationBuilder {
            script: self.put_script.clone(),
        }
    }

    /// Scripts the outcome of the next unscripted `load_all`.
    pub fn expect_load_all(&self) -> ExpectationBuilder {
        ExpectationBuilder {
            script: self.load_script.clone(),
        }
    }

    pub fn get<Q>(&self, id: &Q) -> Option<T>
    where
        T::Id: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.records.lock().get(id).cloned()
    }

    /// Snapshot of every stored record.
    pub fn records(&self) -> Vec<T> {
        self.records.lock().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }

    /// Number of `put` calls, failed ones included.
    pub fn put_calls(&self) -> u64 {
        self.put_calls.load(Ordering::Acquire)
    }

    /// Verifies that every scripted outcome was consumed.
    pub fn verify(&self) {
        let puts = self.put_script.lock().len();
        let loads = self.load_script.lock().len();
        if puts + loads != 0 {
            panic!(
                "Not all expectations were met. {} put and {} load_all remaining",
                puts, loads
            );
        }
    }
}

#[async_trait]
impl<T: Record> RecordLoader<T> for MockStore<T> {
    async fn load_all(&self) -> Result<Vec<T>, StoreError> {
        let scripted = self.load_script.lock().pop_front();
        if let Some(Err(e)) = scripted {
            return Err(e);
        }
        Ok(self.records())
    }
}

#[async_trait]
impl<T: Record> RecordUpserter<T> for MockStore<T> {
    async fn put(&self, record: &T) -> Result<(), StoreError> {
        self.put_calls.fetch_add(1, Ordering::AcqRel);
        if let Some(delay) = self.put_delay {
            tokio::time::sleep(delay).await;
        }

        let scripted = self.put_script.lock().pop_front();
        if let Some(Err(e)) = scripted {
            return Err(e);
        }

        self.records
            .lock()
            .insert(record.id().clone(), record.clone());
        Ok(())
    }
}

/// Builder for one scripted store outcome.
pub struct ExpectationBuilder {
    script: Script,
}

impl ExpectationBuilder {
    /// The call behaves normally.
    pub fn return_ok(self) {
        self.script.lock().push_back(Ok(()));
    }

    /// The call fails with `error` and has no effect.
    pub fn return_err(self, error: StoreError) {
        self.script.lock().push_back(Err(error));
    }
}
