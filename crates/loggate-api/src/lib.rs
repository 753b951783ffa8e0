//! loggate-api — HTTP surfaces for the Loggate gateway.
//!
//! Three independent routers, one per listener:
//!
//! | Surface | Routes |
//! |---|---|
//! | ingest | `POST /c/{collection}/{tenant_id}`, `GET /metrics` (when enabled) |
//! | recorder | `POST /record` |
//! | scrape | `GET /metrics` |
//!
//! Success responses are empty 200s; request-fatal decode errors are
//! plain-text 500s; anything off-route is a logged 404.

pub mod handlers;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;

use loggate_ingest::Pipeline;
use loggate_metrics::MetricRegistry;
use loggate_record::Recorder;
use loggate_scrape::ScrapeAggregator;

/// Shared state for the ingest surface.
#[derive(Clone)]
pub struct IngestState {
    pub pipeline: Arc<Pipeline>,
    /// Present only when the metrics processor is enabled; gates the
    /// `/metrics` route.
    pub registry: Option<Arc<MetricRegistry>>,
}

/// Shared state for the recording surface.
#[derive(Clone)]
pub struct RecordState {
    pub recorder: Arc<Recorder>,
}

/// Shared state for the scrape surface.
#[derive(Clone)]
pub struct ScrapeState {
    pub aggregator: Arc<ScrapeAggregator>,
}

/// Build the ingest router.
pub fn ingest_router(pipeline: Arc<Pipeline>, registry: Option<Arc<MetricRegistry>>) -> Router {
    let state = IngestState { pipeline, registry };
    let mut router = Router::new().route(
        "/c/{collection}/{tenant_id}",
        post(handlers::ingest_batch),
    );
    if state.registry.is_some() {
        router = router.route("/metrics", get(handlers::client_metrics));
    }
    router.fallback(handlers::not_found).with_state(state)
}

/// Build the session-recording router.
pub fn record_router(recorder: Arc<Recorder>) -> Router {
    Router::new()
        .route("/record", post(handlers::record_session))
        .fallback(handlers::not_found)
        .with_state(RecordState { recorder })
}

/// Build the peer-scrape router.
pub fn scrape_router(aggregator: Arc<ScrapeAggregator>) -> Router {
    Router::new()
        .route("/metrics", get(handlers::peer_metrics))
        .fallback(handlers::not_found)
        .with_state(ScrapeState { aggregator })
}
