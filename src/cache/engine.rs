use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use super::lru::ByteLru;
use super::singleflight::FlightGroup;
use super::stats::Stats;
use crate::error::{Error, Result};
use crate::httpc::HttpClient;
use crate::protocol::peer_key_url;
use crate::ring::PeerPool;

/// Fraction of the byte budget reserved for values fetched from peers.
const HOT_CACHE_DIVISOR: u64 = 8;

/// Upstream load callback, invoked for misses on keys this node owns. The
/// node wires its fastest-database loader in here.
#[async_trait]
pub trait Loader: Send + Sync {
    async fn load(&self, key: &str) -> Result<Vec<u8>>;
}

/// A named cache group.
///
/// The main cache holds values this node loaded as the owner; the hot cache
/// holds values fetched from peers, on a slice of the budget, so frequently
/// forwarded keys stop costing a network hop.
pub struct CacheGroup {
    name: String,
    main: Mutex<ByteLru>,
    hot: Mutex<ByteLru>,
    flights: FlightGroup,
    stats: Stats,
    pool: Arc<PeerPool>,
    http: Arc<dyn HttpClient>,
    loader: Arc<dyn Loader>,
}

impl CacheGroup {
    pub fn new(
        name: &str,
        cache_bytes: u64,
        pool: Arc<PeerPool>,
        http: Arc<dyn HttpClient>,
        loader: Arc<dyn Loader>,
    ) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            main: Mutex::new(ByteLru::new(cache_bytes)),
            hot: Mutex::new(ByteLru::new((cache_bytes / HOT_CACHE_DIVISOR).max(1))),
            flights: FlightGroup::new(),
            stats: Stats::default(),
            pool,
            http,
            loader,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn stats(&self) -> &Stats {
        &self.stats
    }

    /// Client-facing lookup: local caches, then the owning peer, then the
    /// loader. Peer failures degrade to a local load rather than an error,
    /// so a flapping peer costs latency, not availability.
    pub async fn get(&self, key: &str) -> Result<Vec<u8>> {
        self.stats.incr_gets();

        if let Some(bytes) = self.lookup(key) {
            self.stats.incr_cache_hits();
            return Ok(bytes);
        }

        if let Some((peer, is_self)) = self.pool.pick_peer(key) {
            if !is_self {
                match self.load_from_peer(&peer, key).await {
                    Ok(bytes) => {
                        self.stats.incr_peer_loads();
                        self.hot.lock().expect("hot cache lock").insert(key, bytes.clone());
                        return Ok(bytes);
                    }
                    // Any peer failure, a 404 included, degrades to a local
                    // load; the loader gives the authoritative answer.
                    Err(err) => {
                        self.stats.incr_peer_errors();
                        tracing::warn!("peer {} failed for {}: {}, loading locally", peer, key, err);
                    }
                }
            }
        }

        self.load_owned(key).await
    }

    /// Lookup-or-load without consulting the ring. The inbound peer handler
    /// uses this for keys other nodes routed here, so briefly divergent
    /// membership views cannot bounce a request between nodes.
    pub async fn get_owned(&self, key: &str) -> Result<Vec<u8>> {
        self.stats.incr_gets();

        if let Some(bytes) = self.lookup(key) {
            self.stats.incr_cache_hits();
            return Ok(bytes);
        }

        self.load_owned(key).await
    }

    fn lookup(&self, key: &str) -> Option<Vec<u8>> {
        if let Some(bytes) = self.main.lock().expect("main cache lock").get(key) {
            return Some(bytes);
        }
        self.hot.lock().expect("hot cache lock").get(key)
    }

    async fn load_owned(&self, key: &str) -> Result<Vec<u8>> {
        let (outcome, led) = self
            .flights
            .run(key, || async {
                self.stats.incr_loads();
                self.loader.load(key).await
            })
            .await;

        // Only the leader writes the cache; a NotFound outcome is handed to
        // every waiter but never inserted.
        if led {
            if let Ok(bytes) = &outcome {
                self.stats.incr_local_loads();
                self.main
                    .lock()
                    .expect("main cache lock")
                    .insert(key, bytes.clone());
            }
        }

        outcome
    }

    async fn load_from_peer(&self, peer: &str, key: &str) -> Result<Vec<u8>> {
        let url = peer_key_url(peer, &self.name, key);
        let response = self.http.get(&url).await?;

        if response.is_not_found() {
            return Err(Error::DataNotFound);
        }
        if !response.is_ok() {
            return Err(Error::Protocol(format!("peer status {}", response.status)));
        }
        if response.body.is_empty() {
            return Err(Error::Protocol(format!("peer sent empty body for {}", key)));
        }

        Ok(response.body)
    }
}
