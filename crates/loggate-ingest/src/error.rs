//! Error types for the ingestion pipeline.

use thiserror::Error;

/// Request-fatal batch decode failures. Nothing is dispatched to any
/// sink when one of these occurs.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("decompressing request body: {0}")]
    Decompress(#[source] std::io::Error),

    #[error("decoding record batch: {0}")]
    Deserialize(#[source] serde_json::Error),
}

/// A failure inside one sink. Logged by the pipeline, never fatal to the
/// batch or to the other sinks.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error("invalid upstream address {0:?}")]
    Address(String),

    #[error("forwarding upstream: {0}")]
    Http(String),
}
