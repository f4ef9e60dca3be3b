use axum::{
    Json, Router,
    body::Body,
    extract::State,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use futures::StreamExt;
use serde::Serialize;
use std::{convert::Infallible, net::SocketAddr};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use webm_mux::ChunkPublisher;

use crate::pipe::{LiveStats, SharedStats, read_stats};

#[derive(Clone)]
pub struct AppState {
    pub publisher: ChunkPublisher,
    pub stats: SharedStats,
}

#[derive(Serialize)]
struct StatsResponse {
    #[serde(flatten)]
    stats: LiveStats,
    viewers: usize,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/live.webm", get(live))
        .route("/stats", get(stats))
        .with_state(state)
}

pub(crate) async fn start_api_server(
    addr: SocketAddr,
    state: AppState,
    cancel: CancellationToken,
) -> anyhow::Result<tokio::task::JoinHandle<()>> {
    let listener = TcpListener::bind(addr).await?;
    log::info!("API server started on {}", listener.local_addr()?);
    let app = router(state);
    Ok(tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal(cancel))
            .await
        {
            log::error!("API server error: {}", e);
        }
    }))
}

async fn shutdown_signal(cancel: CancellationToken) {
    cancel.cancelled().await;
    log::info!("Shutting down API server...");
}

async fn index() -> &'static str {
    "webmlive: GET /live.webm, GET /stats"
}

/// Streams the live session: metadata chunk first, then clusters as they
/// are published.
async fn live(State(state): State<AppState>) -> Response {
    if state.publisher.is_finished() {
        return (StatusCode::GONE, "stream finished").into_response();
    }
    let stream = state
        .publisher
        .subscribe()
        .map(|chunk| Ok::<_, Infallible>(chunk.data));
    log::debug!(
        "viewer joined, {} subscribers",
        state.publisher.subscriber_count()
    );
    (
        [
            (header::CONTENT_TYPE, "video/webm"),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        Body::from_stream(stream),
    )
        .into_response()
}

async fn stats(State(state): State<AppState>) -> Json<StatsResponse> {
    Json(StatsResponse {
        stats: read_stats(&state.stats),
        viewers: state.publisher.subscriber_count(),
    })
}
