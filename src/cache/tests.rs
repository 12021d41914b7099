#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;

    use crate::cache::engine::{CacheGroup, Loader};
    use crate::cache::lru::ByteLru;
    use crate::cache::singleflight::FlightGroup;
    use crate::error::{Error, Result};
    use crate::httpc::{HttpClient, HttpResponse};
    use crate::ring::PeerPool;

    // ============================================================
    // BYTE-BOUNDED LRU
    // ============================================================

    #[test]
    fn lru_respects_byte_budget() {
        let mut cache = ByteLru::new(100);

        for i in 0..50 {
            cache.insert(&format!("key-{:02}", i), vec![0u8; 10]);
            assert!(cache.bytes() <= 100, "resident {} bytes", cache.bytes());
        }
        assert!(!cache.is_empty());
    }

    #[test]
    fn lru_evicts_least_recently_used_first() {
        // Each entry weighs 1 (key) + 9 (value) = 10 bytes; budget fits three.
        let mut cache = ByteLru::new(30);
        cache.insert("a", vec![1u8; 9]);
        cache.insert("b", vec![2u8; 9]);
        cache.insert("c", vec![3u8; 9]);

        // Touch "a" so "b" is now the oldest.
        assert!(cache.get("a").is_some());

        cache.insert("d", vec![4u8; 9]);
        assert!(cache.get("b").is_none(), "b should have been evicted");
        assert!(cache.get("a").is_some());
        assert!(cache.get("c").is_some());
        assert!(cache.get("d").is_some());
    }

    #[test]
    fn lru_replacement_keeps_accounting_exact() {
        let mut cache = ByteLru::new(1000);
        cache.insert("k", vec![0u8; 99]);
        assert_eq!(cache.bytes(), 100);

        cache.insert("k", vec![0u8; 9]);
        assert_eq!(cache.bytes(), 10);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn lru_oversized_value_does_not_stick() {
        let mut cache = ByteLru::new(10);
        cache.insert("big", vec![0u8; 64]);
        assert_eq!(cache.bytes(), 0);
        assert!(cache.is_empty());
    }

    // ============================================================
    // SINGLE-FLIGHT
    // ============================================================

    #[tokio::test]
    async fn concurrent_callers_share_one_load() {
        let flights = Arc::new(FlightGroup::new());
        let calls = Arc::new(AtomicU64::new(0));

        let mut handles = Vec::new();
        for _ in 0..16 {
            let flights = flights.clone();
            let calls = calls.clone();
            handles.push(tokio::spawn(async move {
                flights
                    .run("k", || async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        Ok(b"value".to_vec())
                    })
                    .await
            }));
        }

        let mut leaders = 0;
        for handle in handles {
            let (outcome, led) = handle.await.unwrap();
            assert_eq!(outcome.unwrap(), b"value".to_vec());
            if led {
                leaders += 1;
            }
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1, "exactly one upstream load");
        assert_eq!(leaders, 1);
        assert_eq!(flights.open_flights(), 0);
    }

    #[tokio::test]
    async fn waiters_receive_the_leaders_error() {
        let flights = Arc::new(FlightGroup::new());

        let mut handles = Vec::new();
        for _ in 0..4 {
            let flights = flights.clone();
            handles.push(tokio::spawn(async move {
                flights
                    .run("missing", || async {
                        tokio::time::sleep(Duration::from_millis(20)).await;
                        Err(Error::DataNotFound)
                    })
                    .await
            }));
        }

        for handle in handles {
            let (outcome, _) = handle.await.unwrap();
            assert_eq!(outcome.unwrap_err(), Error::DataNotFound);
        }
        assert_eq!(flights.open_flights(), 0);
    }

    #[tokio::test]
    async fn sequential_flights_load_independently() {
        let flights = FlightGroup::new();
        let calls = AtomicU64::new(0);

        for _ in 0..2 {
            let (outcome, led) = flights
                .run("k", || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(Error::DataNotFound)
                })
                .await;
            assert!(led);
            assert_eq!(outcome.unwrap_err(), Error::DataNotFound);
        }

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    // ============================================================
    // CACHE GROUP
    // ============================================================

    struct FakeLoader {
        calls: AtomicU64,
        outcome: Result<Vec<u8>>,
        delay: Duration,
    }

    impl FakeLoader {
        fn ok(bytes: &[u8]) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicU64::new(0),
                outcome: Ok(bytes.to_vec()),
                delay: Duration::ZERO,
            })
        }

        fn not_found() -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicU64::new(0),
                outcome: Err(Error::DataNotFound),
                delay: Duration::ZERO,
            })
        }

        fn slow(bytes: &[u8], delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicU64::new(0),
                outcome: Ok(bytes.to_vec()),
                delay,
            })
        }

        fn calls(&self) -> u64 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Loader for FakeLoader {
        async fn load(&self, _key: &str) -> Result<Vec<u8>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.outcome.clone()
        }
    }

    enum PeerBehavior {
        Value(Vec<u8>),
        NotFound,
        Unreachable,
    }

    struct FakePeerHttp {
        behavior: PeerBehavior,
        gets: AtomicU64,
    }

    impl FakePeerHttp {
        fn new(behavior: PeerBehavior) -> Arc<Self> {
            Arc::new(Self {
                behavior,
                gets: AtomicU64::new(0),
            })
        }
    }

    #[async_trait]
    impl HttpClient for FakePeerHttp {
        async fn get(&self, _url: &str) -> Result<HttpResponse> {
            self.gets.fetch_add(1, Ordering::SeqCst);
            match &self.behavior {
                PeerBehavior::Value(bytes) => Ok(HttpResponse {
                    status: 200,
                    body: bytes.clone(),
                }),
                PeerBehavior::NotFound => Ok(HttpResponse {
                    status: 404,
                    body: Vec::new(),
                }),
                PeerBehavior::Unreachable => {
                    Err(Error::Transport("connection refused".to_string()))
                }
            }
        }

        async fn post(
            &self,
            _url: &str,
            _content_type: &str,
            _body: Vec<u8>,
        ) -> Result<HttpResponse> {
            Ok(HttpResponse {
                status: 200,
                body: Vec::new(),
            })
        }
    }

    fn solo_group(loader: Arc<FakeLoader>) -> Arc<CacheGroup> {
        let pool = PeerPool::new("127.0.0.1:7001");
        pool.set_peers(&["127.0.0.1:7001".to_string()]);
        let http = FakePeerHttp::new(PeerBehavior::Unreachable);
        CacheGroup::new("kv", 1 << 20, pool, http, loader)
    }

    /// Pool with two peers and a key that hashes to the remote one.
    fn forwarding_group(
        http: Arc<FakePeerHttp>,
        loader: Arc<FakeLoader>,
    ) -> (Arc<CacheGroup>, String) {
        let pool = PeerPool::new("127.0.0.1:7001");
        pool.set_peers(&["127.0.0.1:7001".to_string(), "127.0.0.1:7002".to_string()]);

        let key = (0..10_000)
            .map(|i| format!("key-{}", i))
            .find(|key| {
                let (_, is_self) = pool.pick_peer(key).unwrap();
                !is_self
            })
            .expect("some key must hash to the remote peer");

        let group = CacheGroup::new("kv", 1 << 20, pool, http, loader);
        (group, key)
    }

    #[tokio::test]
    async fn miss_loads_then_hit_serves_from_cache() {
        let loader = FakeLoader::ok(b"v1");
        let group = solo_group(loader.clone());

        assert_eq!(group.get("x").await.unwrap(), b"v1".to_vec());
        assert_eq!(group.get("x").await.unwrap(), b"v1".to_vec());

        assert_eq!(loader.calls(), 1);
        let stats = group.stats().snapshot();
        assert_eq!(stats.gets, 2);
        assert_eq!(stats.cache_hits, 1);
        assert_eq!(stats.loads, 1);
        assert_eq!(stats.local_loads, 1);
    }

    #[tokio::test]
    async fn not_found_is_surfaced_and_never_cached() {
        let loader = FakeLoader::not_found();
        let group = solo_group(loader.clone());

        assert_eq!(group.get("x").await.unwrap_err(), Error::DataNotFound);
        assert_eq!(group.get("x").await.unwrap_err(), Error::DataNotFound);

        // Both misses reached the loader: negative results are not cached.
        assert_eq!(loader.calls(), 2);
        assert_eq!(group.stats().snapshot().local_loads, 0);
    }

    #[tokio::test]
    async fn concurrent_misses_dedupe_through_the_engine() {
        let loader = FakeLoader::slow(b"shared", Duration::from_millis(50));
        let group = solo_group(loader.clone());

        let mut handles = Vec::new();
        for _ in 0..12 {
            let group = group.clone();
            handles.push(tokio::spawn(async move { group.get("x").await }));
        }
        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap(), b"shared".to_vec());
        }

        assert_eq!(loader.calls(), 1);
    }

    #[tokio::test]
    async fn forwarded_key_is_served_by_peer_and_hot_cached() {
        let http = FakePeerHttp::new(PeerBehavior::Value(b"from-peer".to_vec()));
        let loader = FakeLoader::ok(b"local");
        let (group, key) = forwarding_group(http.clone(), loader.clone());

        assert_eq!(group.get(&key).await.unwrap(), b"from-peer".to_vec());
        assert_eq!(loader.calls(), 0, "owner peer answered; no local load");

        // Second read comes out of the hot cache without another hop.
        assert_eq!(group.get(&key).await.unwrap(), b"from-peer".to_vec());
        assert_eq!(http.gets.load(Ordering::SeqCst), 1);

        let stats = group.stats().snapshot();
        assert_eq!(stats.peer_loads, 1);
        assert_eq!(stats.cache_hits, 1);
    }

    #[tokio::test]
    async fn peer_not_found_falls_through_to_the_loader() {
        let http = FakePeerHttp::new(PeerBehavior::NotFound);
        let loader = FakeLoader::ok(b"local");
        let (group, key) = forwarding_group(http, loader.clone());

        assert_eq!(group.get(&key).await.unwrap(), b"local".to_vec());
        assert_eq!(loader.calls(), 1);
        assert_eq!(group.stats().snapshot().peer_errors, 1);
    }

    #[tokio::test]
    async fn peer_failure_falls_through_to_the_loader() {
        let http = FakePeerHttp::new(PeerBehavior::Unreachable);
        let loader = FakeLoader::ok(b"local");
        let (group, key) = forwarding_group(http, loader.clone());

        assert_eq!(group.get(&key).await.unwrap(), b"local".to_vec());
        assert_eq!(loader.calls(), 1);

        let stats = group.stats().snapshot();
        assert_eq!(stats.peer_errors, 1);
        assert_eq!(stats.peer_loads, 0);
    }

    #[tokio::test]
    async fn owned_get_skips_the_ring() {
        // Every key hashes to the remote peer from this node's perspective,
        // but get_owned must still answer locally.
        let http = FakePeerHttp::new(PeerBehavior::Unreachable);
        let loader = FakeLoader::ok(b"owned");
        let (group, key) = forwarding_group(http.clone(), loader.clone());

        assert_eq!(group.get_owned(&key).await.unwrap(), b"owned".to_vec());
        assert_eq!(http.gets.load(Ordering::SeqCst), 0, "no forwarding");
        assert_eq!(loader.calls(), 1);
    }
}
