use std::sync::{Arc, RwLock};

use axum::Router;
use axum::extract::{Extension, Path};
use axum::http::StatusCode;
use axum::routing::get;

use super::hashring::{DEFAULT_REPLICAS, HashRing};
use crate::cache::engine::CacheGroup;
use crate::error::Error;
use crate::protocol::{PEER_BASE_PATH, normalize_url};

/// Owns the current peer set and answers ownership queries for the cache
/// engine. The ring is replaced wholesale on every membership change, so a
/// reader always sees one consistent peer set.
pub struct PeerPool {
    self_url: String,
    ring: RwLock<HashRing>,
}

impl PeerPool {
    /// `self_addr` is this node's peer-facing address (`nodeAddr`).
    pub fn new(self_addr: &str) -> Arc<Self> {
        Arc::new(Self {
            self_url: normalize_url(self_addr),
            ring: RwLock::new(HashRing::new(DEFAULT_REPLICAS)),
        })
    }

    pub fn self_url(&self) -> &str {
        &self.self_url
    }

    /// Atomically replaces the ring with the given peer URLs.
    pub fn set_peers(&self, peers: &[String]) {
        let normalized: Vec<String> = peers.iter().map(|peer| normalize_url(peer)).collect();
        let mut ring = HashRing::new(DEFAULT_REPLICAS);
        ring.set(&normalized);
        *self.ring.write().expect("peer ring lock") = ring;
    }

    /// Maps `key` to its owning peer. The flag is true when the owner is this
    /// node, in which case the caller loads locally instead of forwarding.
    /// `None` means the ring is empty (not yet joined).
    pub fn pick_peer(&self, key: &str) -> Option<(String, bool)> {
        let ring = self.ring.read().expect("peer ring lock");
        ring.pick(key)
            .map(|peer| (peer.to_string(), peer == self.self_url))
    }
}

/// Inbound side of the peer protocol, served on `nodeAddr`:
/// `GET /oncekv/:group/:key` returns the raw cached bytes for keys this node
/// owns, loading them through the local engine on a miss.
pub fn peer_router(group: Arc<CacheGroup>) -> Router {
    Router::new()
        .route(&format!("{}:group/:key", PEER_BASE_PATH), get(handle_peer_get))
        .layer(Extension(group))
}

async fn handle_peer_get(
    Extension(group): Extension<Arc<CacheGroup>>,
    Path((group_name, key)): Path<(String, String)>,
) -> (StatusCode, Vec<u8>) {
    if group_name != group.name() {
        return (StatusCode::NOT_FOUND, Vec::new());
    }

    group.stats().incr_server_requests();

    // Owned load only: a peer asked because the ring routed it here, so
    // consulting the ring again could bounce the request between nodes whose
    // views briefly disagree.
    match group.get_owned(&key).await {
        Ok(bytes) => (StatusCode::OK, bytes),
        Err(Error::DataNotFound) => (StatusCode::NOT_FOUND, Vec::new()),
        Err(err) => {
            tracing::error!("peer lookup for {} failed: {}", key, err);
            (StatusCode::INTERNAL_SERVER_ERROR, Vec::new())
        }
    }
}
