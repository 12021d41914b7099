//! Master HTTP surface: the node join endpoint.

use std::sync::Arc;

use axum::extract::Extension;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};

use super::service::Master;
use crate::error::Error;
use crate::protocol::{ENDPOINT_JOIN, JoinRequest};

pub fn router(master: Arc<Master>) -> Router {
    Router::new()
        .route(ENDPOINT_JOIN, post(handle_join))
        .layer(Extension(master))
}

/// `POST /join` with `{httpAddr, nodeAddr}` → the current `{peers, dbs}`
/// view. Failures carry a descriptive message so the joining node can log
/// why it was turned away.
pub async fn handle_join(Extension(master): Extension<Arc<Master>>, body: String) -> Response {
    let request: JoinRequest = match serde_json::from_str(&body) {
        Ok(request) => request,
        Err(err) => {
            return (StatusCode::BAD_REQUEST, format!("bad join body: {}", err)).into_response();
        }
    };

    match master.join_node(request).await {
        Ok(view) => Json(view).into_response(),
        Err(Error::BadRequest(message)) => (StatusCode::BAD_REQUEST, message).into_response(),
        Err(err) => {
            tracing::error!("join failed: {}", err);
            (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response()
        }
    }
}
