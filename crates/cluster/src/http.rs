//! Inbound HTTP surface.
//!
//! One endpoint: `POST /fetch`. The handler always dispatches with
//! `force_this_node`: a peer that received a forwarded request must never
//! forward it again, whatever its current ring says.

use crate::core::ClusterNode;
use crate::error::FetchError;
use crate::protocol::{ErrorBody, FetchRequest, FETCH_PATH};
use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;

/// Builds the node's router.
pub fn router(node: Arc<ClusterNode>) -> Router {
    Router::new()
        .route(FETCH_PATH, post(handle_fetch))
        .with_state(node)
}

/// Serves the router until the listener fails.
pub async fn serve(node: Arc<ClusterNode>, listener: TcpListener) -> std::io::Result<()> {
    tracing::info!(addr = %listener.local_addr()?, "serving fetch endpoint");
    axum::serve(listener, router(node)).await
}

/// Serves the router until `shutdown` resolves.
pub async fn serve_with_shutdown(
    node: Arc<ClusterNode>,
    listener: TcpListener,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    tracing::info!(addr = %listener.local_addr()?, "serving fetch endpoint");
    axum::serve(listener, router(node))
        .with_graceful_shutdown(shutdown)
        .await
}

async fn handle_fetch(State(node): State<Arc<ClusterNode>>, body: Bytes) -> Response {
    // Parse by hand so a bad body yields the structured 400 shape peers
    // understand, not a framework default.
    let request: FetchRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(err) => return error_response(&FetchError::BadRequest(err.to_string())),
    };

    match node.fetch(&request.key, request.params, true).await {
        Ok(value) => (StatusCode::OK, Json(value)).into_response(),
        Err(err) => {
            tracing::debug!(key = %request.key, error = %err, "fetch failed");
            error_response(&err)
        }
    }
}

fn status_for(err: &FetchError) -> StatusCode {
    match err {
        FetchError::BadRequest(_) => StatusCode::BAD_REQUEST,
        FetchError::NoMembers => StatusCode::SERVICE_UNAVAILABLE,
        FetchError::OwnerUnreachable { .. } => StatusCode::BAD_GATEWAY,
        FetchError::UserFetchFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_response(err: &FetchError) -> Response {
    let body = ErrorBody {
        error: err.kind().to_string(),
        detail: err.to_string(),
    };
    (status_for(err), Json(body)).into_response()
}
