//! Read-only HTTP surface for artifact download and metadata.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use axum::Router;
use serde_json::json;
use tokio::net::TcpListener;
use tokio_util::io::ReaderStream;
use tracing::{info, warn};

use super::store::ArtifactStore;

pub fn artifact_router(store: Arc<ArtifactStore>) -> Router {
    Router::new()
        .route("/artifacts/{id}", get(download))
        .route("/artifacts/{id}/metadata", get(metadata))
        .route("/health", get(health))
        .with_state(store)
}

/// Binds the artifact server and serves until `shutdown` resolves.
pub async fn serve(
    store: Arc<ArtifactStore>,
    port: u16,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await?;
    info!(target = "agent.artifacts", %addr, "artifact server listening");

    axum::serve(listener, artifact_router(store))
        .with_graceful_shutdown(shutdown)
        .await
}

async fn download(State(store): State<Arc<ArtifactStore>>, Path(id): Path<String>) -> Response {
    let Some(entry) = store.get(&id).await else {
        return not_found("artifact not found");
    };

    let file = match tokio::fs::File::open(&entry.file_path).await {
        Ok(file) => file,
        Err(err) => {
            warn!(
                target = "agent.artifacts",
                id = %id,
                path = %entry.file_path.display(),
                error = %err,
                "artifact backing file missing"
            );
            return not_found("artifact file not found on disk");
        }
    };

    let body = Body::from_stream(ReaderStream::new(file));
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, entry.mime_type)
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", entry.file_name),
        )
        .body(body)
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}

async fn metadata(State(store): State<Arc<ArtifactStore>>, Path(id): Path<String>) -> Response {
    match store.get(&id).await {
        Some(entry) => Json(entry).into_response(),
        None => not_found("artifact not found"),
    }
}

async fn health() -> Response {
    Json(json!({ "status": "healthy", "server": "artifacts" })).into_response()
}

fn not_found(message: &str) -> Response {
    (StatusCode::NOT_FOUND, Json(json!({ "error": message }))).into_response()
}
