//! Consistent-hash peer pool.
//!
//! Maps each key to the cache node that owns it. Every node builds the same
//! ring from the same sorted peer list, so ownership decisions agree across
//! the fleet without coordination; membership changes remap only the keys in
//! the segments a peer gained or lost.

pub mod hashring;
pub mod pool;

pub use hashring::HashRing;
pub use pool::{PeerPool, peer_router};
