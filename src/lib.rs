//! Distributed Caching Tier Library
//!
//! This library crate defines the components of the caching tier that sits
//! between clients and the database replicas. It is the foundation for the
//! binary executable (`main.rs`), which runs one of the two roles.
//!
//! ## Architecture Modules
//! The system is composed of loosely coupled subsystems:
//!
//! - **`ring`**: The key-ownership layer. A consistent-hash ring with virtual
//!   nodes maps every key to the cache node that owns it, so nodes agree on
//!   placement without talking to each other.
//! - **`cache`**: The per-node engine. A byte-bounded LRU group with
//!   single-flight deduplication; misses are forwarded to the owning peer or
//!   loaded through the injected loader.
//! - **`node`**: The cache server process. Joins the master, serves client
//!   lookups and the peer protocol, accepts heartbeat membership pushes, and
//!   races the database fleet on owned misses, latching the fastest backend.
//! - **`master`**: The coordination layer. Tracks the node roster durably in
//!   the metadata store, admits joins, and broadcasts membership and the
//!   database list every heartbeat, evicting nodes that stop acknowledging.
//! - **`meta`**: The metadata-store seam behind the master's durable roster.
//! - **`httpc`**: The outbound HTTP seam, so tests inject transports.

pub mod cache;
pub mod config;
pub mod error;
pub mod httpc;
pub mod master;
pub mod meta;
pub mod node;
pub mod protocol;
pub mod ring;
