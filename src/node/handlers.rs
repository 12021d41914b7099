//! Client-facing HTTP surface of a cache node.
//!
//! `GET /key/:key` is the lookup path; `POST /meta` receives master
//! heartbeats; `/stats` and `/ws/stats` expose the group counters as a
//! snapshot and as a 1 Hz stream.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Extension, Path};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use axum::routing::{get, post};
use futures_util::{SinkExt, StreamExt};

use super::service::Node;
use crate::error::Error;
use crate::protocol::{
    ClusterView, ENDPOINT_KEY, ENDPOINT_META, ENDPOINT_STATS, ENDPOINT_WS_STATS,
};

const KEY_CONTENT_TYPE: &str = "application/json; charset=utf-8";
const STATS_STREAM_PERIOD: Duration = Duration::from_secs(1);

pub fn api_router(node: Arc<Node>) -> Router {
    Router::new()
        .route(&format!("{}/:key", ENDPOINT_KEY), get(handle_get_key))
        .route(ENDPOINT_META, post(handle_meta))
        .route(ENDPOINT_STATS, get(handle_stats))
        .route(ENDPOINT_WS_STATS, get(handle_ws_stats))
        .layer(Extension(node))
}

pub async fn handle_get_key(
    Extension(node): Extension<Arc<Node>>,
    Path(key): Path<String>,
) -> Response {
    match node.group().get(&key).await {
        Ok(bytes) => ([(header::CONTENT_TYPE, KEY_CONTENT_TYPE)], bytes).into_response(),
        Err(Error::DataNotFound) => StatusCode::NOT_FOUND.into_response(),
        Err(err) => {
            tracing::error!("lookup {} failed: {}", key, err);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Heartbeat sink. The body is parsed by hand so any malformed payload maps
/// to a plain 400; an unchanged view is acknowledged without mutation.
pub async fn handle_meta(Extension(node): Extension<Arc<Node>>, body: String) -> StatusCode {
    let update: ClusterView = match serde_json::from_str(&body) {
        Ok(update) => update,
        Err(err) => {
            tracing::warn!("rejected meta update: {}", err);
            return StatusCode::BAD_REQUEST;
        }
    };

    node.install_view(update).await;
    StatusCode::OK
}

pub async fn handle_stats(Extension(node): Extension<Arc<Node>>) -> Response {
    Json(node.group().stats().snapshot()).into_response()
}

pub async fn handle_ws_stats(
    Extension(node): Extension<Arc<Node>>,
    ws: WebSocketUpgrade,
) -> Response {
    ws.on_upgrade(move |socket| stream_stats(socket, node))
}

/// Emits the stats snapshot once per second until the peer disconnects or a
/// send fails.
async fn stream_stats(socket: WebSocket, node: Arc<Node>) {
    let (mut sender, mut receiver) = socket.split();

    // Drain client frames; the stream ending means the peer went away.
    let mut gone = tokio::spawn(async move {
        while let Some(Ok(_)) = receiver.next().await {}
    });

    let mut interval = tokio::time::interval(STATS_STREAM_PERIOD);
    // Consume the immediate first tick so the stream paces from one period.
    interval.tick().await;

    loop {
        tokio::select! {
            _ = &mut gone => return,
            _ = interval.tick() => {
                let snapshot = node.group().stats().snapshot();
                let payload = match serde_json::to_string(&snapshot) {
                    Ok(payload) => payload,
                    Err(err) => {
                        tracing::error!("stats encode failed: {}", err);
                        continue;
                    }
                };
                if sender.send(Message::Text(payload)).await.is_err() {
                    gone.abort();
                    return;
                }
            }
        }
    }
}
