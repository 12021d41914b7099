use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::sync::broadcast::error::RecvError;

use super::upstream::DatabaseList;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::httpc::{HttpClient, JSON_CONTENT_TYPE};
use crate::meta::MetaStore;
use crate::protocol::{ClusterView, JoinRequest, heartbeat_url, normalize_url};

/// Roster of known nodes: client-facing URL to peer-protocol URL.
type Roster = HashMap<String, String>;

#[derive(Default)]
struct MasterState {
    nodes: Roster,
    dbs: Vec<String>,
}

pub struct Master {
    addr: String,
    nodes_key: String,
    heartbeat_period: Duration,
    state: RwLock<MasterState>,
    meta: Arc<dyn MetaStore>,
    dbs_source: Arc<dyn DatabaseList>,
    http: Arc<dyn HttpClient>,
}

fn http_addrs(nodes: &Roster) -> Vec<String> {
    let mut addrs: Vec<String> = nodes.keys().cloned().collect();
    addrs.sort();
    addrs
}

fn node_addrs(nodes: &Roster) -> Vec<String> {
    let mut addrs: Vec<String> = nodes.values().cloned().collect();
    addrs.sort();
    addrs
}

impl Master {
    /// Loads the persisted roster (an absent key is an empty roster) and
    /// builds the master around its injected collaborators.
    pub async fn new(
        addr: &str,
        cfg: &Config,
        meta: Arc<dyn MetaStore>,
        dbs_source: Arc<dyn DatabaseList>,
        http: Arc<dyn HttpClient>,
    ) -> Result<Arc<Self>> {
        let nodes = match meta.get(&cfg.cache_nodes_key).await? {
            None => Roster::new(),
            Some(raw) => serde_json::from_str(&raw)
                .map_err(|err| Error::Persistence(format!("roster decode: {}", err)))?,
        };
        tracing::info!("loaded roster with {} node(s)", nodes.len());

        Ok(Arc::new(Self {
            addr: addr.to_string(),
            nodes_key: cfg.cache_nodes_key.clone(),
            heartbeat_period: cfg.heartbeat_period,
            state: RwLock::new(MasterState {
                nodes,
                dbs: Vec::new(),
            }),
            meta,
            dbs_source,
            http,
        }))
    }

    /// Sorted client-facing URLs of the current roster.
    pub async fn peers(&self) -> Vec<String> {
        http_addrs(&self.state.read().await.nodes)
    }

    pub async fn dbs(&self) -> Vec<String> {
        self.state.read().await.dbs.clone()
    }

    /// Admits a node. The updated roster is persisted before it is committed
    /// to memory, so a successful reply always reflects a durable roster and
    /// the store never trails what the master believes. Re-joining with the
    /// same identity is a no-op beyond the rewrite.
    pub async fn join_node(&self, request: JoinRequest) -> Result<ClusterView> {
        if request.http_addr.is_empty() || request.node_addr.is_empty() {
            return Err(Error::BadRequest(
                "join requires both httpAddr and nodeAddr".to_string(),
            ));
        }

        let http_addr = normalize_url(&request.http_addr);
        let node_addr = normalize_url(&request.node_addr);

        let mut state = self.state.write().await;
        let mut next = state.nodes.clone();
        next.insert(http_addr.clone(), node_addr);
        self.persist(&next).await?;
        state.nodes = next;

        tracing::info!("{} joined; roster size {}", http_addr, state.nodes.len());
        Ok(ClusterView {
            peers: http_addrs(&state.nodes),
            dbs: state.dbs.clone(),
        })
    }

    async fn persist(&self, nodes: &Roster) -> Result<()> {
        let encoded =
            serde_json::to_string(nodes).map_err(|err| Error::Persistence(err.to_string()))?;
        self.meta.put(&self.nodes_key, &encoded).await
    }

    /// Refreshes the database list from the database-tier master.
    pub async fn sync_dbs(&self) -> Result<()> {
        let dbs = self.dbs_source.databases().await?;
        self.state.write().await.dbs = dbs;
        Ok(())
    }

    /// One heartbeat cycle: refresh the database list, then push the current
    /// view to every node concurrently and evict the ones that fail to
    /// acknowledge. A failed refresh skips the whole cycle; it must never
    /// evict nodes.
    pub async fn heartbeat_tick(&self) {
        if let Err(err) = self.sync_dbs().await {
            tracing::warn!("database list refresh failed, skipping broadcast: {}", err);
            return;
        }

        let (targets, view) = {
            let state = self.state.read().await;
            (
                http_addrs(&state.nodes),
                ClusterView {
                    peers: node_addrs(&state.nodes),
                    dbs: state.dbs.clone(),
                },
            )
        };
        if targets.is_empty() {
            return;
        }

        let body = match serde_json::to_vec(&view) {
            Ok(body) => body,
            Err(err) => {
                tracing::error!("heartbeat encode failed: {}", err);
                return;
            }
        };

        let mut probes = Vec::with_capacity(targets.len());
        for target in targets {
            let http = self.http.clone();
            let body = body.clone();
            probes.push(tokio::spawn(async move {
                let healthy = match http.post(&heartbeat_url(&target), JSON_CONTENT_TYPE, body).await
                {
                    Ok(response) if response.is_ok() => true,
                    Ok(response) => {
                        tracing::error!("heartbeat to {} got status {}", target, response.status);
                        false
                    }
                    Err(err) => {
                        tracing::error!("heartbeat to {} failed: {}", target, err);
                        false
                    }
                };
                (target, healthy)
            }));
        }

        for probe in probes {
            if let Ok((target, healthy)) = probe.await {
                if !healthy {
                    self.remove_node(&target).await;
                }
            }
        }
    }

    /// Drops a node from the roster and persists the shrunk map. A failed
    /// persist is logged and not retried; the next roster write rewrites the
    /// whole map.
    pub async fn remove_node(&self, http_addr: &str) {
        let mut state = self.state.write().await;
        if state.nodes.remove(http_addr).is_none() {
            return;
        }
        if let Err(err) = self.persist(&state.nodes).await {
            tracing::error!("roster persist after evicting {} failed: {}", http_addr, err);
        }
        tracing::info!("{} removed from roster", http_addr);
    }

    /// Spawns the metadata watch and heartbeat loops, then serves the join
    /// endpoint in the foreground.
    pub async fn start(self: Arc<Self>) -> anyhow::Result<()> {
        let mut modifications = self.meta.watch(&self.nodes_key);
        let watcher = self.clone();
        tokio::spawn(async move {
            loop {
                match modifications.recv().await {
                    Ok(()) | Err(RecvError::Lagged(_)) => {
                        if let Err(err) = watcher.sync_dbs().await {
                            tracing::warn!("database list refresh failed: {}", err);
                        }
                    }
                    Err(RecvError::Closed) => return,
                }
            }
        });

        let beater = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(beater.heartbeat_period);
            interval.tick().await;
            loop {
                interval.tick().await;
                beater.heartbeat_tick().await;
            }
        });

        let app = super::handlers::router(self.clone());
        let listener = tokio::net::TcpListener::bind(&self.addr).await?;
        tracing::info!("master listening on {}", self.addr);
        axum::serve(listener, app).await?;
        Ok(())
    }
}
