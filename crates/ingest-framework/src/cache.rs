//! # Lookup Cache
//!
//! In-memory, eviction-free mapping from record identifier to record. This is the only
//! structure the read path touches, so reads never wait on storage.
//!
//! **Concurrency Model**:
//! The consumer task writes while any number of request handlers read. The map is a
//! sharded [`DashMap`]; each `put`/`get` takes a single shard lock for the duration of
//! one insert or one clone, and no lock is ever held across an `.await`.
//!
//! Entries live until the process exits. Duplicate identifiers resolve last-write-wins.

use crate::record::Record;
use dashmap::DashMap;
use std::borrow::Borrow;
use std::hash::Hash;
use std::sync::Arc;

/// A cloneable handle to the shared cache.
///
/// Cloning is cheap: every clone points at the same map. Construct one in the
/// composition root and hand clones to the consumer and to the read gateway.
pub struct LookupCache<T: Record> {
    entries: Arc<DashMap<T::Id, T>>,
}

impl<T: Record> Clone for LookupCache<T> {
    fn clone(&self) -> Self {
        Self {
            entries: Arc::clone(&self.entries),
        }
    }
}

impl<T: Record> Default for LookupCache<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Record> LookupCache<T> {
    pub fn new() -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
        }
    }

    /// Inserts or replaces the record under its identifier.
    ///
    /// Returns `true` if an older entry was replaced.
    pub fn put(&self, record: T) -> bool {
        let id = record.id().clone();
        self.entries.insert(id, record).is_some()
    }

    /// Returns a copy of the record, or `None` if the identifier is unknown.
    pub fn get<Q>(&self, id: &Q) -> Option<T>
    where
        T::Id: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.entries.get(id).map(|entry| entry.value().clone())
    }

    pub fn contains<Q>(&self, id: &Q) -> bool
    where
        T::Id: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.entries.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
    struct Parcel {
        id: String,
        weight: u32,
    }

    impl Record for Parcel {
        type Id = String;

        fn id(&self) -> &String {
            &self.id
        }
    }

    fn parcel(id: &str, weight: u32) -> Parcel {
        Parcel {
            id: id.to_string(),
            weight,
        }
    }

    #[test]
    fn test_get_missing_returns_none() {
        let cache = LookupCache::<Parcel>::new();
        assert!(cache.get("nope").is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_put_then_get() {
        let cache = LookupCache::new();
        assert!(!cache.put(parcel("p1", 3)));
        assert_eq!(cache.get("p1"), Some(parcel("p1", 3)));
        assert!(cache.contains("p1"));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_put_overwrites_last_write_wins() {
        let cache = LookupCache::new();
        cache.put(parcel("p1", 3));
        assert!(cache.put(parcel("p1", 7)));
        assert_eq!(cache.get("p1").unwrap().weight, 7);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_clones_share_entries() {
        let cache = LookupCache::new();
        let reader = cache.clone();
        cache.put(parcel("p1", 1));
        assert_eq!(reader.get("p1"), Some(parcel("p1", 1)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_put_and_get() {
        let cache = LookupCache::new();

        let writer = {
            let cache = cache.clone();
            tokio::spawn(async move {
                for i in 0..500u32 {
                    cache.put(parcel(&format!("p{}", i % 50), i));
                }
            })
        };

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let cache = cache.clone();
                tokio::spawn(async move {
                    for i in 0..500u32 {
                        if let Some(p) = cache.get(format!("p{}", i % 50).as_str()) {
                            assert_eq!(p.weight % 50, i % 50);
                        }
                    }
                })
            })
            .collect();

        writer.await.unwrap();
        for reader in readers {
            reader.await.unwrap();
        }
        assert_eq!(cache.len(), 50);
    }
}
