//! Host-inventory extraction.
//!
//! Agents periodically embed a `Hostinfo` object in their log records
//! describing the machine they run on. This sink decodes it into a typed
//! struct and surfaces it through the log stream; the field names mirror
//! the agent's wire format.

use serde::Deserialize;
use tracing::info;

use loggate_core::LogRecord;

use crate::error::SinkError;

/// Inventory snapshot for one agent host.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct HostInfo {
    pub app_connector: bool,
    #[serde(rename = "BackendLogID")]
    pub backend_log_id: String,
    pub container: bool,
    pub desktop: bool,
    pub distro: String,
    pub distro_version: String,
    #[serde(rename = "GoArch")]
    pub arch: String,
    #[serde(rename = "GoArchVar")]
    pub arch_variant: String,
    pub hostname: String,
    #[serde(rename = "IPNVersion")]
    pub agent_version: String,
    pub machine: String,
    #[serde(rename = "OS")]
    pub os: String,
    #[serde(rename = "OSVersion")]
    pub os_version: String,
    pub userspace: bool,
    pub userspace_router: bool,
}

/// Sink that extracts host inventory from records carrying it.
#[derive(Debug, Default)]
pub struct HostInfoSink;

impl HostInfoSink {
    pub fn new() -> Self {
        Self
    }

    /// Decode the record's `Hostinfo` field, if present.
    pub fn process(&self, record: &LogRecord) -> Result<(), SinkError> {
        if let Some(raw) = record.fields.get("Hostinfo") {
            let host: HostInfo = serde_json::from_value(raw.clone())?;
            info!(
                tenant = %record.tenant_id,
                hostname = %host.hostname,
                os = %host.os,
                os_version = %host.os_version,
                version = %host.agent_version,
                "host inventory update"
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Map};

    fn record_with(fields: serde_json::Value) -> LogRecord {
        let fields: Map<String, serde_json::Value> =
            serde_json::from_value(fields).unwrap();
        LogRecord {
            fields,
            collection: "nodes".to_string(),
            tenant_id: "ab12".to_string(),
        }
    }

    #[test]
    fn decodes_inventory_fields() {
        let record = record_with(json!({
            "Hostinfo": {
                "Hostname": "builder-7",
                "OS": "linux",
                "OSVersion": "6.8",
                "Distro": "debian",
                "GoArch": "amd64",
                "IPNVersion": "1.62.0",
                "Container": true
            }
        }));
        // Decoding succeeds and tolerates the fields we do not model.
        HostInfoSink::new().process(&record).unwrap();

        let raw = record.fields.get("Hostinfo").unwrap().clone();
        let host: HostInfo = serde_json::from_value(raw).unwrap();
        assert_eq!(host.hostname, "builder-7");
        assert_eq!(host.os, "linux");
        assert_eq!(host.arch, "amd64");
        assert!(host.container);
        // Absent fields fall back to defaults.
        assert!(!host.desktop);
        assert_eq!(host.machine, "");
    }

    #[test]
    fn record_without_hostinfo_is_a_noop() {
        let record = record_with(json!({ "text": "hello" }));
        HostInfoSink::new().process(&record).unwrap();
    }

    #[test]
    fn malformed_hostinfo_is_an_error() {
        let record = record_with(json!({ "Hostinfo": { "Hostname": 42 } }));
        assert!(HostInfoSink::new().process(&record).is_err());
    }
}
