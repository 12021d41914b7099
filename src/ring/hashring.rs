use std::collections::BTreeMap;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// Virtual points placed on the ring per peer. High enough to even out the
/// key distribution, low enough that rebuilds stay cheap.
pub const DEFAULT_REPLICAS: usize = 50;

/// Hash ring over peer base URLs.
///
/// Each peer contributes `replicas` points; a key is owned by the first point
/// at or clockwise of its hash, wrapping past the top of the keyspace.
pub struct HashRing {
    replicas: usize,
    points: BTreeMap<u64, String>,
}

fn hash_of(value: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

impl HashRing {
    pub fn new(replicas: usize) -> Self {
        Self {
            replicas: replicas.max(1),
            points: BTreeMap::new(),
        }
    }

    /// Rebuilds the ring from scratch for the given peer set.
    pub fn set(&mut self, peers: &[String]) {
        self.points.clear();
        for peer in peers {
            for replica in 0..self.replicas {
                self.points
                    .insert(hash_of(&format!("{}#{}", peer, replica)), peer.clone());
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Returns the peer owning `key`, walking clockwise from the key's hash.
    pub fn pick(&self, key: &str) -> Option<&str> {
        if self.points.is_empty() {
            return None;
        }

        let hash = hash_of(key);
        self.points
            .range(hash..)
            .next()
            .or_else(|| self.points.iter().next())
            .map(|(_, peer)| peer.as_str())
    }
}
