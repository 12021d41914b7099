//! Outbound HTTP seam.
//!
//! Everything that talks to a peer, a database or a node goes through
//! [`HttpClient`], so tests swap the transport by constructor injection
//! instead of standing up sockets.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::{Error, Result};

pub const JSON_CONTENT_TYPE: &str = "application/json";

/// Plain status + body view of an HTTP exchange. Transport failures are
/// `Err(Error::Transport)`; any received response, whatever the status, is
/// `Ok` and left to the caller to interpret.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn is_ok(&self) -> bool {
        self.status == 200
    }

    pub fn is_not_found(&self) -> bool {
        self.status == 404
    }
}

#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn get(&self, url: &str) -> Result<HttpResponse>;

    async fn post(&self, url: &str, content_type: &str, body: Vec<u8>) -> Result<HttpResponse>;
}

/// Production transport: a shared `reqwest::Client` with the configured
/// request timeout applied to every call.
pub struct ReqwestClient {
    inner: reqwest::Client,
}

impl ReqwestClient {
    pub fn new(timeout: Duration) -> Self {
        let inner = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("http client");
        Self { inner }
    }
}

#[async_trait]
impl HttpClient for ReqwestClient {
    async fn get(&self, url: &str) -> Result<HttpResponse> {
        let response = self.inner.get(url).send().await.map_err(Error::transport)?;
        let status = response.status().as_u16();
        let body = response.bytes().await.map_err(Error::transport)?.to_vec();
        Ok(HttpResponse { status, body })
    }

    async fn post(&self, url: &str, content_type: &str, body: Vec<u8>) -> Result<HttpResponse> {
        let response = self
            .inner
            .post(url)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(body)
            .send()
            .await
            .map_err(Error::transport)?;
        let status = response.status().as_u16();
        let body = response.bytes().await.map_err(Error::transport)?.to_vec();
        Ok(HttpResponse { status, body })
    }
}
