//! Cache master.
//!
//! Tracks the node roster durably through the metadata store, admits nodes
//! via the join endpoint, and broadcasts the membership and database list to
//! every node once per heartbeat period, evicting nodes that fail to
//! acknowledge.

pub mod handlers;
pub mod service;
pub mod upstream;

pub use service::Master;
pub use upstream::{DatabaseList, HttpDatabaseList, StaticDatabaseList};
