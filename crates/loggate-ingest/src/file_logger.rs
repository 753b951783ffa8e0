//! Append-only JSON-lines persistence for log records.
//!
//! One file per `{collection}/{tenant_id}`, one JSON object per line.

use std::path::PathBuf;

use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;

use loggate_core::LogRecord;

use crate::error::SinkError;

pub struct FileLogger {
    base_dir: PathBuf,
}

impl FileLogger {
    /// Create the sink, ensuring the base directory exists.
    pub async fn new(base_dir: impl Into<PathBuf>) -> Result<Self, SinkError> {
        let base_dir = base_dir.into();
        fs::create_dir_all(&base_dir).await?;
        Ok(Self { base_dir })
    }

    /// Append one record to its collection/tenant file.
    pub async fn log(&self, record: &LogRecord) -> Result<(), SinkError> {
        let dir = self.base_dir.join(&record.collection);
        fs::create_dir_all(&dir).await?;
        let path = dir.join(&record.tenant_id);

        let mut line = serde_json::to_vec(&record.fields)?;
        line.push(b'\n');

        let mut file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(&path)
            .await?;
        file.write_all(&line).await?;
        Ok(())
    }
}
