use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;

use super::loader::DbLoader;
use crate::cache::CacheGroup;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::httpc::{HttpClient, JSON_CONTENT_TYPE};
use crate::protocol::{self, ClusterView, DEFAULT_GROUP, JoinRequest, normalize_url};
use crate::ring::{PeerPool, peer_router};

const JOIN_ATTEMPTS: usize = 5;

/// The node's cluster view: peer set, database set and the fast-DB hint,
/// guarded by one lock so no reader ever sees a half-applied update. `peers`
/// and `dbs` are kept sorted; they are compared and replaced as a pair.
#[derive(Debug, Default)]
pub struct View {
    pub peers: Vec<String>,
    pub dbs: Vec<String>,
    pub fast_db: Option<String>,
}

pub struct Node {
    http_addr: String,
    node_addr: String,
    master_addr: String,
    view: Arc<RwLock<View>>,
    pool: Arc<PeerPool>,
    group: Arc<CacheGroup>,
    http: Arc<dyn HttpClient>,
}

impl Node {
    /// `http_addr`/`node_addr` are this node's bind addresses and, once
    /// normalized, the URLs it advertises to the master.
    pub fn new(
        http_addr: &str,
        node_addr: &str,
        master_addr: &str,
        cfg: &Config,
        http: Arc<dyn HttpClient>,
    ) -> Arc<Self> {
        let view = Arc::new(RwLock::new(View::default()));
        let pool = PeerPool::new(node_addr);
        let loader = DbLoader::new(view.clone(), http.clone(), cfg.http_request_timeout);
        let group = CacheGroup::new(
            DEFAULT_GROUP,
            cfg.cache_bytes,
            pool.clone(),
            http.clone(),
            loader,
        );

        Arc::new(Self {
            http_addr: http_addr.to_string(),
            node_addr: node_addr.to_string(),
            master_addr: master_addr.to_string(),
            view,
            pool,
            group,
            http,
        })
    }

    pub fn group(&self) -> Arc<CacheGroup> {
        self.group.clone()
    }

    pub fn view(&self) -> Arc<RwLock<View>> {
        self.view.clone()
    }

    /// Applies a membership snapshot from the master (join reply or
    /// heartbeat). Both lists are sorted and compared against the current
    /// view; an unchanged snapshot is accepted without mutation, otherwise
    /// peers, dbs and the ring are replaced together under the write lock.
    /// Returns whether anything changed.
    pub async fn install_view(&self, mut update: ClusterView) -> bool {
        update.peers.sort();
        update.dbs.sort();

        {
            let view = self.view.read().await;
            if view.peers == update.peers && view.dbs == update.dbs {
                return false;
            }
        }

        let mut view = self.view.write().await;
        // A concurrent heartbeat may have installed the same snapshot between
        // the two lock acquisitions.
        if view.peers == update.peers && view.dbs == update.dbs {
            return false;
        }

        tracing::info!(
            "view change: {} peer(s), {} database(s)",
            update.peers.len(),
            update.dbs.len()
        );
        self.pool.set_peers(&update.peers);
        view.peers = update.peers;
        view.dbs = update.dbs;
        true
    }

    /// Registers with the master and installs the returned view. Retries
    /// with capped exponential backoff; exhausting the attempts is fatal to
    /// startup.
    pub async fn join(&self) -> Result<()> {
        let request = JoinRequest {
            http_addr: normalize_url(&self.http_addr),
            node_addr: normalize_url(&self.node_addr),
        };
        let body =
            serde_json::to_vec(&request).map_err(|err| Error::Protocol(err.to_string()))?;

        let mut delay = Duration::from_millis(150);
        let mut last_err = Error::Transport("master unreachable".to_string());

        for attempt in 1..=JOIN_ATTEMPTS {
            match self.try_join(&body).await {
                Ok(view) => {
                    tracing::info!(
                        "joined master {} with {} peer(s)",
                        self.master_addr,
                        view.peers.len()
                    );
                    self.install_view(view).await;
                    return Ok(());
                }
                Err(err) => {
                    tracing::warn!("join attempt {}/{} failed: {}", attempt, JOIN_ATTEMPTS, err);
                    last_err = err;
                    if attempt < JOIN_ATTEMPTS {
                        let jitter = Duration::from_millis(rand::random::<u64>() % 50);
                        tokio::time::sleep(delay + jitter).await;
                        delay = (delay * 2).min(Duration::from_millis(1200));
                    }
                }
            }
        }

        Err(last_err)
    }

    async fn try_join(&self, body: &[u8]) -> Result<ClusterView> {
        let url = protocol::join_url(&self.master_addr);
        let response = self.http.post(&url, JSON_CONTENT_TYPE, body.to_vec()).await?;
        if !response.is_ok() {
            return Err(Error::Protocol(format!(
                "join status {}: {}",
                response.status,
                String::from_utf8_lossy(&response.body)
            )));
        }
        serde_json::from_slice(&response.body)
            .map_err(|err| Error::Protocol(format!("join reply: {}", err)))
    }

    /// Joins the master, then runs both listeners: the peer protocol on
    /// `nodeAddr` in the background and the client API on `httpAddr` in the
    /// foreground.
    pub async fn start(self: Arc<Self>) -> anyhow::Result<()> {
        self.join().await?;

        let peers = peer_router(self.group.clone());
        let peer_listener = tokio::net::TcpListener::bind(&self.node_addr).await?;
        tracing::info!("peer protocol listening on {}", self.node_addr);
        tokio::spawn(async move {
            if let Err(err) = axum::serve(peer_listener, peers).await {
                tracing::error!("peer server failed: {}", err);
            }
        });

        let app = super::handlers::api_router(self.clone());
        let listener = tokio::net::TcpListener::bind(&self.http_addr).await?;
        tracing::info!("node API listening on {}", self.http_addr);
        axum::serve(listener, app).await?;
        Ok(())
    }
}
