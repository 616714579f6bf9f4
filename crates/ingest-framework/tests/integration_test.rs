use ingest_framework::mock::MockStore;
use ingest_framework::{
    warm, BootstrapError, BusConfig, InMemoryBus, LookupCache, Publisher, Record, StoreError,
    StreamConsumer, Subscriber,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

// --- Test Record ---

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
struct Ticket {
    id: String,
    seat: u32,
}

impl Record for Ticket {
    type Id = String;

    fn id(&self) -> &String {
        &self.id
    }

    fn validate(&self) -> Result<(), String> {
        if self.id.is_empty() {
            return Err("empty id".to_string());
        }
        Ok(())
    }
}

fn ticket(id: &str, seat: u32) -> Ticket {
    Ticket {
        id: id.to_string(),
        seat,
    }
}

fn payload(t: &Ticket) -> Vec<u8> {
    t.encode().unwrap()
}

fn bus() -> InMemoryBus {
    InMemoryBus::new(BusConfig {
        max_deliveries: 3,
        redelivery_delay: Duration::from_millis(10),
    })
}

async fn wait_until(what: &str, cond: impl Fn() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(3);
    while !cond() {
        if tokio::time::Instant::now() > deadline {
            panic!("timed out waiting for {what}");
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

struct Pipeline {
    bus: InMemoryBus,
    store: Arc<MockStore<Ticket>>,
    cache: LookupCache<Ticket>,
    stats: ingest_framework::ConsumerStats,
    shutdown: CancellationToken,
    handle: tokio::task::JoinHandle<()>,
}

async fn start(store: MockStore<Ticket>) -> Pipeline {
    let bus = bus();
    let store = Arc::new(store);
    let cache = LookupCache::new();
    let subscription = bus.subscribe("tickets", "durable").await.unwrap();
    let consumer = StreamConsumer::new(subscription, store.clone(), cache.clone());
    let stats = consumer.stats();
    let shutdown = CancellationToken::new();
    let handle = tokio::spawn(consumer.run(shutdown.clone()));
    Pipeline {
        bus,
        store,
        cache,
        stats,
        shutdown,
        handle,
    }
}

// --- Tests ---

#[tokio::test]
async fn test_ingested_record_becomes_visible() {
    let p = start(MockStore::new()).await;
    let t = ticket("t1", 12);

    p.bus.publish("tickets", payload(&t)).await.unwrap();
    wait_until("ticket cached", || p.stats.cached() == 1).await;

    assert_eq!(p.cache.get("t1"), Some(t.clone()));
    assert_eq!(p.store.get("t1"), Some(t));
    assert!(p.cache.get("missing-id").is_none());
}

#[tokio::test]
async fn test_malformed_payload_is_dropped_and_processing_continues() {
    let p = start(MockStore::new()).await;

    p.bus.publish("tickets", b"{ not json".to_vec()).await.unwrap();
    p.bus
        .publish("tickets", br#"{"id":"","seat":1}"#.to_vec())
        .await
        .unwrap();
    p.bus
        .publish("tickets", payload(&ticket("t2", 2)))
        .await
        .unwrap();

    wait_until("valid ticket cached", || p.stats.cached() == 1).await;

    assert_eq!(p.stats.rejected(), 2);
    assert_eq!(p.store.put_calls(), 1);
    assert_eq!(p.store.len(), 1);
    assert_eq!(p.cache.len(), 1);
    assert!(p.cache.contains("t2"));
}

#[tokio::test]
async fn test_store_failure_leaves_cache_untouched_until_redelivery() {
    let store = MockStore::new();
    store
        .expect_put()
        .return_err(StoreError::Unavailable("connection reset".into()));
    let p = start(store).await;

    p.bus
        .publish("tickets", payload(&ticket("t1", 1)))
        .await
        .unwrap();

    wait_until("store failure", || p.stats.store_failed() == 1).await;

    // The bus redelivers the nacked message and the second attempt succeeds.
    wait_until("redelivered ticket cached", || p.stats.cached() == 1).await;
    assert_eq!(p.store.put_calls(), 2);
    assert_eq!(p.cache.get("t1"), Some(ticket("t1", 1)));
    p.store.verify();
}

#[tokio::test]
async fn test_cache_never_ahead_of_store() {
    let store = MockStore::new();
    for _ in 0..3 {
        store
            .expect_put()
            .return_err(StoreError::Unavailable("down".into()));
    }
    let p = start(store).await;

    p.bus
        .publish("tickets", payload(&ticket("t1", 1)))
        .await
        .unwrap();

    // All three attempts fail; the bus then gives up.
    wait_until("all attempts failed", || p.stats.store_failed() == 3).await;
    assert!(p.cache.get("t1").is_none());
    assert!(p.store.get("t1").is_none());
}

#[tokio::test]
async fn test_redelivery_of_same_message_is_idempotent() {
    let p = start(MockStore::new()).await;
    let t = ticket("dup", 5);

    p.bus.publish("tickets", payload(&t)).await.unwrap();
    p.bus.publish("tickets", payload(&t)).await.unwrap();
    wait_until("both deliveries cached", || p.stats.cached() == 2).await;

    assert_eq!(p.stats.store_failed(), 0);
    assert_eq!(p.store.len(), 1);
    assert_eq!(p.cache.len(), 1);
    assert_eq!(p.cache.get("dup"), Some(t));
}

#[tokio::test]
async fn test_newer_version_replaces_older() {
    let p = start(MockStore::new()).await;

    p.bus
        .publish("tickets", payload(&ticket("t1", 1)))
        .await
        .unwrap();
    p.bus
        .publish("tickets", payload(&ticket("t1", 9)))
        .await
        .unwrap();
    wait_until("both versions processed", || p.stats.cached() == 2).await;

    assert_eq!(p.cache.get("t1").unwrap().seat, 9);
    assert_eq!(p.store.get("t1").unwrap().seat, 9);
}

#[tokio::test]
async fn test_shutdown_lets_in_flight_message_finish() {
    let store = MockStore::new().with_put_delay(Duration::from_millis(200));
    let p = start(store).await;

    p.bus
        .publish("tickets", payload(&ticket("slow", 1)))
        .await
        .unwrap();
    wait_until("put started", || p.store.put_calls() == 1).await;

    p.shutdown.cancel();
    tokio::time::timeout(Duration::from_secs(2), p.handle)
        .await
        .expect("consumer did not stop")
        .unwrap();

    assert_eq!(p.stats.cached(), 1);
    assert!(p.cache.contains("slow"));
}

#[tokio::test]
async fn test_consumer_stops_when_bus_closes() {
    let p = start(MockStore::new()).await;
    p.bus.close();

    tokio::time::timeout(Duration::from_secs(2), p.handle)
        .await
        .expect("consumer did not stop")
        .unwrap();
}

#[tokio::test]
async fn test_warm_loads_every_record() {
    let records: Vec<Ticket> = (0..20).map(|i| ticket(&format!("t{i}"), i)).collect();
    let store = MockStore::with_records(records.clone());
    let cache = LookupCache::new();

    let loaded = warm(&store, &cache).await.unwrap();

    assert_eq!(loaded, 20);
    for t in &records {
        assert_eq!(cache.get(t.id()), Some(t.clone()));
    }
    assert!(cache.get("t20").is_none());
}

#[tokio::test]
async fn test_warm_failure_is_reported() {
    let store = MockStore::with_records([ticket("t1", 1)]);
    store
        .expect_load_all()
        .return_err(StoreError::Unavailable("db down".into()));
    let cache = LookupCache::new();

    let err = warm(&store, &cache).await.unwrap_err();

    assert!(matches!(err, BootstrapError::Load(StoreError::Unavailable(_))));
    assert!(cache.is_empty());
}
