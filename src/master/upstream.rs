//! Source of the database list.
//!
//! The database tier has its own master; this side only consumes its
//! published list of base URLs. Deployments inject either the HTTP client
//! for that master or a static list.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::httpc::HttpClient;
use crate::protocol::normalize_url;

#[async_trait]
pub trait DatabaseList: Send + Sync {
    /// Current set of database base URLs.
    async fn databases(&self) -> Result<Vec<String>>;
}

/// Fixed database fleet, for deployments without a database master and for
/// tests.
pub struct StaticDatabaseList {
    dbs: Vec<String>,
}

impl StaticDatabaseList {
    pub fn new(dbs: Vec<String>) -> Arc<Self> {
        Arc::new(Self {
            dbs: dbs.iter().map(|db| normalize_url(db)).collect(),
        })
    }
}

#[async_trait]
impl DatabaseList for StaticDatabaseList {
    async fn databases(&self) -> Result<Vec<String>> {
        Ok(self.dbs.clone())
    }
}

/// Queries the database-tier master: `GET <base>/dbs` returning a JSON array
/// of base URLs.
pub struct HttpDatabaseList {
    url: String,
    http: Arc<dyn HttpClient>,
}

impl HttpDatabaseList {
    pub fn new(master_addr: &str, http: Arc<dyn HttpClient>) -> Arc<Self> {
        Arc::new(Self {
            url: format!("{}/dbs", normalize_url(master_addr)),
            http,
        })
    }
}

#[async_trait]
impl DatabaseList for HttpDatabaseList {
    async fn databases(&self) -> Result<Vec<String>> {
        let response = self.http.get(&self.url).await?;
        if !response.is_ok() {
            return Err(Error::Protocol(format!(
                "database master status {}",
                response.status
            )));
        }
        let dbs: Vec<String> = serde_json::from_slice(&response.body)
            .map_err(|err| Error::Protocol(format!("database list: {}", err)))?;
        Ok(dbs.iter().map(|db| normalize_url(db)).collect())
    }
}
