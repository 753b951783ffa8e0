//! Batch decode and sink dispatch.

use std::sync::Arc;

use bytes::Bytes;
use serde_json::{Map, Value};
use tracing::{debug, error};

use loggate_core::LogRecord;
use loggate_metrics::MetricRegistry;

use crate::error::IngestError;
use crate::file_logger::FileLogger;
use crate::forward::Forwarder;
use crate::hostinfo::HostInfoSink;

/// The ingestion pipeline: one instance serves every concurrent request.
///
/// Sinks are optional; each is wired in only when its processor is
/// enabled in the config.
pub struct Pipeline {
    forwarder: Option<Forwarder>,
    file_logger: Option<FileLogger>,
    host_info: Option<HostInfoSink>,
    metrics: Option<Arc<MetricRegistry>>,
}

impl Pipeline {
    pub fn new(
        forwarder: Option<Forwarder>,
        file_logger: Option<FileLogger>,
        host_info: Option<HostInfoSink>,
        metrics: Option<Arc<MetricRegistry>>,
    ) -> Self {
        Self {
            forwarder,
            file_logger,
            host_info,
            metrics,
        }
    }

    /// Ingest one batch POST.
    ///
    /// Decompression and deserialization failures reject the whole batch;
    /// nothing is partially accepted. Once decoded, every record is
    /// dispatched to every configured sink regardless of individual sink
    /// failures, which are logged and absorbed.
    pub async fn ingest(
        &self,
        tenant_id: &str,
        collection: &str,
        body: Bytes,
        content_encoding: Option<&str>,
    ) -> Result<(), IngestError> {
        let raw: Vec<u8> = if content_encoding == Some("zstd") {
            zstd::decode_all(&body[..]).map_err(IngestError::Decompress)?
        } else {
            body.to_vec()
        };

        let batch: Vec<Map<String, Value>> =
            serde_json::from_slice(&raw).map_err(IngestError::Deserialize)?;
        debug!(
            records = batch.len(),
            %collection,
            tenant = %tenant_id,
            "received record batch"
        );

        // The forwarder sees the raw batch exactly once, before any
        // per-record processing.
        if let Some(forwarder) = &self.forwarder {
            if let Err(e) = forwarder.forward(&raw).await {
                error!(error = %e, tenant = %tenant_id, "forwarding batch");
            }
        }

        for fields in batch {
            let record = LogRecord {
                fields,
                collection: collection.to_string(),
                tenant_id: tenant_id.to_string(),
            };
            if let Some(file_logger) = &self.file_logger {
                if let Err(e) = file_logger.log(&record).await {
                    error!(error = %e, tenant = %tenant_id, "file sink");
                }
            }
            if let Some(host_info) = &self.host_info {
                if let Err(e) = host_info.process(&record) {
                    error!(error = %e, tenant = %tenant_id, "host-info sink");
                }
            }
            if let Some(metrics) = &self.metrics {
                if let Some(payload) = record.metrics_payload() {
                    if let Err(e) = metrics.ingest_payload(&record.tenant_id, payload).await {
                        error!(error = %e, tenant = %tenant_id, "metrics decode");
                    }
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bare_pipeline() -> Pipeline {
        Pipeline::new(None, None, None, None)
    }

    #[tokio::test]
    async fn rejects_invalid_json() {
        let err = bare_pipeline()
            .ingest("ab12", "nodes", Bytes::from_static(b"not json"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, IngestError::Deserialize(_)));
    }

    #[tokio::test]
    async fn rejects_corrupt_zstd() {
        let err = bare_pipeline()
            .ingest(
                "ab12",
                "nodes",
                Bytes::from_static(b"\x00\x01garbage"),
                Some("zstd"),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, IngestError::Decompress(_)));
    }

    #[tokio::test]
    async fn accepts_empty_batch() {
        bare_pipeline()
            .ingest("ab12", "nodes", Bytes::from_static(b"[]"), None)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn zstd_batch_round_trips() {
        let body = zstd::encode_all(&br#"[{"text":"hi"}]"#[..], 3).unwrap();
        bare_pipeline()
            .ingest("ab12", "nodes", Bytes::from(body), Some("zstd"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn metrics_records_reach_the_registry() {
        let registry = Arc::new(MetricRegistry::new());
        let pipeline = Pipeline::new(None, None, None, Some(registry.clone()));

        let body = br#"[{"metrics":"N2anetmon_link_change_eqS0202"},{"text":"plain"}]"#;
        pipeline
            .ingest("ab12", "nodes", Bytes::from_static(body), None)
            .await
            .unwrap();

        let snapshot = registry.tenant_snapshot("ab12").await.unwrap();
        assert_eq!(snapshot[&1].name, "netmon_link_change_eq");
        assert_eq!(snapshot[&1].value, 1);
    }

    #[tokio::test]
    async fn undecodable_metrics_payload_does_not_fail_the_batch() {
        let registry = Arc::new(MetricRegistry::new());
        let pipeline = Pipeline::new(None, None, None, Some(registry.clone()));

        // Unknown opcode 'Q' aborts that payload's decode only.
        let body = br#"[{"metrics":"Q000"},{"metrics":"N2anetmon_link_change_eqS0202"}]"#;
        pipeline
            .ingest("ab12", "nodes", Bytes::from_static(body), None)
            .await
            .unwrap();

        let snapshot = registry.tenant_snapshot("ab12").await.unwrap();
        assert_eq!(snapshot.len(), 1);
    }

    #[tokio::test]
    async fn forwarder_failure_does_not_block_other_sinks() {
        let dir = tempfile::tempdir().unwrap();
        let registry = Arc::new(MetricRegistry::new());
        let pipeline = Pipeline::new(
            // Nothing listens on this port; the connect is refused.
            Some(Forwarder::new("http://127.0.0.1:1/logs").unwrap()),
            Some(FileLogger::new(dir.path()).await.unwrap()),
            None,
            Some(registry.clone()),
        );

        let body = br#"[{"metrics":"N2anetmon_link_change_eqS0202"}]"#;
        // The request succeeds even though forwarding cannot.
        pipeline
            .ingest("ab12", "nodes", Bytes::from_static(body), None)
            .await
            .unwrap();

        assert!(dir.path().join("nodes").join("ab12").exists());
        assert!(registry.tenant_snapshot("ab12").await.is_some());
    }
}
