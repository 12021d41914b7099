use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Monotonic counters for one cache group, exposed through `/stats` and the
/// stats WebSocket.
#[derive(Debug, Default)]
pub struct Stats {
    gets: AtomicU64,
    cache_hits: AtomicU64,
    peer_loads: AtomicU64,
    peer_errors: AtomicU64,
    loads: AtomicU64,
    local_loads: AtomicU64,
    server_requests: AtomicU64,
}

/// Point-in-time copy of [`Stats`], serialized as the stats JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub gets: u64,
    pub cache_hits: u64,
    pub peer_loads: u64,
    pub peer_errors: u64,
    pub loads: u64,
    pub local_loads: u64,
    pub server_requests: u64,
}

impl Stats {
    pub fn incr_gets(&self) {
        self.gets.fetch_add(1, Ordering::Relaxed);
    }

    pub fn incr_cache_hits(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn incr_peer_loads(&self) {
        self.peer_loads.fetch_add(1, Ordering::Relaxed);
    }

    pub fn incr_peer_errors(&self) {
        self.peer_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn incr_loads(&self) {
        self.loads.fetch_add(1, Ordering::Relaxed);
    }

    pub fn incr_local_loads(&self) {
        self.local_loads.fetch_add(1, Ordering::Relaxed);
    }

    pub fn incr_server_requests(&self) {
        self.server_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            gets: self.gets.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            peer_loads: self.peer_loads.load(Ordering::Relaxed),
            peer_errors: self.peer_errors.load(Ordering::Relaxed),
            loads: self.loads.load(Ordering::Relaxed),
            local_loads: self.local_loads.load(Ordering::Relaxed),
            server_requests: self.server_requests.load(Ordering::Relaxed),
        }
    }
}
