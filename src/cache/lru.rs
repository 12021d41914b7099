use lru::LruCache;

/// LRU store bounded by resident bytes rather than entry count.
///
/// Entry weight is key length plus value length. After every insert the
/// least-recently-used entries are evicted until the total fits the budget
/// again, so the bound holds between any two operations.
pub struct ByteLru {
    entries: LruCache<String, Vec<u8>>,
    bytes: u64,
    limit: u64,
}

fn weight(key: &str, value: &[u8]) -> u64 {
    (key.len() + value.len()) as u64
}

impl ByteLru {
    pub fn new(limit: u64) -> Self {
        Self {
            entries: LruCache::unbounded(),
            bytes: 0,
            limit,
        }
    }

    /// Returns a copy of the value and marks the entry most recently used.
    pub fn get(&mut self, key: &str) -> Option<Vec<u8>> {
        self.entries.get(key).cloned()
    }

    pub fn insert(&mut self, key: &str, value: Vec<u8>) {
        if let Some(old) = self.entries.pop(key) {
            self.bytes -= weight(key, &old);
        }
        self.bytes += weight(key, &value);
        self.entries.put(key.to_string(), value);
        self.evict();
    }

    fn evict(&mut self) {
        while self.bytes > self.limit {
            match self.entries.pop_lru() {
                Some((key, value)) => {
                    self.bytes -= weight(&key, &value);
                    tracing::debug!("evicted {} ({} bytes resident)", key, self.bytes);
                }
                None => break,
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn bytes(&self) -> u64 {
        self.bytes
    }
}
