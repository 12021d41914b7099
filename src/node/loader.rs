use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{RwLock, mpsc};

use super::service::View;
use crate::cache::Loader;
use crate::error::{Error, Result};
use crate::httpc::HttpClient;
use crate::protocol::db_key_url;

/// Loads cache misses from the database tier.
///
/// While a fast-DB hint is latched, a miss costs one request. Without a hint
/// the loader races every known database and latches onto the first
/// authoritative responder, so the hint tracks whichever backend currently
/// answers quickest from this node's position. Any failure of the hinted
/// database clears the hint, and the next miss re-races the fleet.
pub struct DbLoader {
    view: Arc<RwLock<View>>,
    http: Arc<dyn HttpClient>,
    timeout: Duration,
}

impl DbLoader {
    pub fn new(view: Arc<RwLock<View>>, http: Arc<dyn HttpClient>, timeout: Duration) -> Arc<Self> {
        Arc::new(Self {
            view,
            http,
            timeout,
        })
    }

    /// Single database lookup. `Ok` carries a non-empty body; an empty 200
    /// body means the database lost the value and is reported as a protocol
    /// error.
    async fn query(http: &Arc<dyn HttpClient>, db: &str, key: &str) -> Result<Vec<u8>> {
        let response = http.get(&db_key_url(db, key)).await?;

        if response.is_not_found() {
            return Err(Error::DataNotFound);
        }
        if !response.is_ok() {
            return Err(Error::Protocol(format!("database status {}", response.status)));
        }
        if response.body.is_empty() {
            return Err(Error::Protocol(format!("database lost data for {}", key)));
        }

        Ok(response.body)
    }

    async fn set_fast_db(&self, db: Option<String>) {
        self.view.write().await.fast_db = db;
    }

    /// Clears the hint without making the caller wait on the view lock; the
    /// caller is about to start the race and already holds its own snapshot.
    fn clear_fast_db_detached(&self) {
        let view = self.view.clone();
        tokio::spawn(async move {
            view.write().await.fast_db = None;
        });
    }

    /// Fans out one probe per database and latches the first authoritative
    /// outcome: a value or a definitive not-found. Probe errors only count
    /// toward completion; when every database has failed the last error is
    /// returned immediately. The deadline bounds the whole race. The channel
    /// is buffered to the fleet size, so losers publish without blocking and
    /// their outcomes are simply discarded.
    async fn race(&self, dbs: Vec<String>, key: &str) -> Result<Vec<u8>> {
        if dbs.is_empty() {
            return Err(Error::NoDatabases);
        }

        let (tx, mut rx) = mpsc::channel(dbs.len());
        for db in dbs {
            let tx = tx.clone();
            let http = self.http.clone();
            let key = key.to_string();
            tokio::spawn(async move {
                let outcome = Self::query(&http, &db, &key).await;
                let _ = tx.send((db, outcome)).await;
            });
        }
        drop(tx);

        let deadline = tokio::time::sleep(self.timeout);
        tokio::pin!(deadline);

        let mut last_err = Error::NoDatabases;
        loop {
            tokio::select! {
                _ = &mut deadline => {
                    self.set_fast_db(None).await;
                    return Err(Error::DatabaseQueryTimeout);
                }
                completion = rx.recv() => match completion {
                    Some((db, Ok(bytes))) => {
                        tracing::info!("{} won the miss race for {}", db, key);
                        self.set_fast_db(Some(db)).await;
                        return Ok(bytes);
                    }
                    Some((db, Err(Error::DataNotFound))) => {
                        // A definitive miss is authoritative too; the fastest
                        // responder still earns the hint.
                        self.set_fast_db(Some(db)).await;
                        return Err(Error::DataNotFound);
                    }
                    Some((db, Err(err))) => {
                        tracing::warn!("database {} failed for {}: {}", db, key, err);
                        last_err = err;
                    }
                    // Channel drained: every database completed, none won.
                    None => return Err(last_err),
                }
            }
        }
    }
}

#[async_trait]
impl Loader for DbLoader {
    async fn load(&self, key: &str) -> Result<Vec<u8>> {
        let (dbs, fast) = {
            let view = self.view.read().await;
            (view.dbs.clone(), view.fast_db.clone())
        };

        if let Some(fast) = fast {
            match Self::query(&self.http, &fast, key).await {
                Ok(bytes) => return Ok(bytes),
                Err(Error::DataNotFound) => return Err(Error::DataNotFound),
                Err(err) => {
                    tracing::warn!("fast database {} failed for {}: {}", fast, key, err);
                    self.clear_fast_db_detached();
                }
            }
        }

        self.race(dbs, key).await
    }
}
