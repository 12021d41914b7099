//! Cluster wire protocol.
//!
//! Defines the endpoints and DTOs exchanged between the master and the cache
//! nodes, plus the URL helpers the data path uses to reach peers and
//! databases. Everything on this plane is JSON over HTTP.

use serde::{Deserialize, Serialize};

// --- Endpoints ---

/// Master endpoint a starting node calls to enter the roster.
pub const ENDPOINT_JOIN: &str = "/join";
/// Node endpoint the master pushes membership updates to.
pub const ENDPOINT_META: &str = "/meta";
/// Public client lookup endpoint on each node.
pub const ENDPOINT_KEY: &str = "/key";
/// Stats snapshot endpoint on each node.
pub const ENDPOINT_STATS: &str = "/stats";
/// Streaming stats endpoint on each node (1 Hz WebSocket).
pub const ENDPOINT_WS_STATS: &str = "/ws/stats";

/// Base path of the peer-to-peer cache protocol, served on `nodeAddr`.
pub const PEER_BASE_PATH: &str = "/oncekv/";
/// The single cache group every node serves.
pub const DEFAULT_GROUP: &str = "kv";

// --- DTOs ---

/// Identity a node presents to the master: where clients reach it and where
/// peers reach it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JoinRequest {
    #[serde(rename = "httpAddr")]
    pub http_addr: String,
    #[serde(rename = "nodeAddr")]
    pub node_addr: String,
}

/// Membership snapshot pushed by the master: the join reply and the heartbeat
/// body share this shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterView {
    pub peers: Vec<String>,
    pub dbs: Vec<String>,
}

// --- URL helpers ---

/// Normalizes an address into a base URL: adds the scheme when missing and
/// drops any trailing slash, so formatting code can always append a path.
pub fn normalize_url(addr: &str) -> String {
    let trimmed = addr.trim_end_matches('/');
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("http://{}", trimmed)
    }
}

pub fn join_url(master_addr: &str) -> String {
    format!("{}{}", normalize_url(master_addr), ENDPOINT_JOIN)
}

pub fn heartbeat_url(http_addr: &str) -> String {
    format!("{}{}", normalize_url(http_addr), ENDPOINT_META)
}

/// Database lookup: `GET {db}/i/key/{key}`.
pub fn db_key_url(db: &str, key: &str) -> String {
    format!("{}/i/key/{}", normalize_url(db), key)
}

/// Peer cache lookup: `GET {peer}/oncekv/{group}/{key}`.
pub fn peer_key_url(peer: &str, group: &str, key: &str) -> String {
    format!("{}{}{}/{}", normalize_url(peer), PEER_BASE_PATH, group, key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_adds_scheme_and_trims() {
        assert_eq!(normalize_url("127.0.0.1:5550"), "http://127.0.0.1:5550");
        assert_eq!(normalize_url("http://a:1/"), "http://a:1");
        assert_eq!(normalize_url("https://b:2"), "https://b:2");
    }

    #[test]
    fn url_shapes() {
        assert_eq!(db_key_url("db:1", "k"), "http://db:1/i/key/k");
        assert_eq!(
            peer_key_url("http://n:2", "kv", "k"),
            "http://n:2/oncekv/kv/k"
        );
        assert_eq!(heartbeat_url("n:3"), "http://n:3/meta");
        assert_eq!(join_url("m:4"), "http://m:4/join");
    }

    #[test]
    fn join_request_wire_casing() {
        let req = JoinRequest {
            http_addr: "a".into(),
            node_addr: "b".into(),
        };
        let json = serde_json::to_string(&req).unwrap();
        assert!(json.contains("\"httpAddr\""));
        assert!(json.contains("\"nodeAddr\""));
    }
}
