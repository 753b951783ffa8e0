//! loggate-ingest — the batch ingestion pipeline.
//!
//! One POST from an agent carries a JSON array of record field maps,
//! optionally zstd-compressed. The pipeline decodes the batch once, then
//! fans every record out to the configured sinks in a fixed order:
//! forwarder (whole raw batch, once) → per record: file logger →
//! host-inventory extractor → client-metrics decoder.
//!
//! Batch decode failures reject the request; sink failures are logged
//! and absorbed — the gateway is a best-effort ingestion point, not a
//! transactional one.

pub mod error;
pub mod file_logger;
pub mod forward;
pub mod hostinfo;
pub mod pipeline;

pub use error::{IngestError, SinkError};
pub use file_logger::FileLogger;
pub use forward::Forwarder;
pub use hostinfo::{HostInfo, HostInfoSink};
pub use pipeline::Pipeline;
