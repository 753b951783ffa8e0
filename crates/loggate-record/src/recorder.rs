//! Asciicast header parsing and exclusive-create streaming persistence.

use std::io::ErrorKind;
use std::path::PathBuf;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Deserialize;
use thiserror::Error;
use tokio::fs::{self, OpenOptions};
use tokio::io::{self, AsyncBufRead, AsyncBufReadExt, AsyncWriteExt};
use tracing::info;

/// Failures while persisting one recording. Each aborts that request
/// only; no partially written file is ever left in a resumable state.
#[derive(Debug, Error)]
pub enum RecordError {
    #[error("recording stream ended before the header line")]
    TruncatedHeader,

    #[error("parsing recording header: {0}")]
    InvalidHeader(#[source] serde_json::Error),

    #[error("recording timestamp {0} is out of range")]
    BadTimestamp(i64),

    #[error("recording already exists at {}", .0.display())]
    Duplicate(PathBuf),

    #[error("creating recording directory: {0}")]
    CreateDir(#[source] io::Error),

    #[error("opening recording file: {0}")]
    Open(#[source] io::Error),

    #[error("reading recording stream: {0}")]
    Read(#[source] io::Error),

    #[error("writing recording: {0}")]
    IncompleteWrite(#[source] io::Error),
}

/// The asciicast v2 header, as produced by the session-recording agent.
///
/// `src_node_id` and `timestamp` determine the persistence path; the
/// remaining fields ride along for later inspection of the file.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CastMetadata {
    #[serde(default)]
    pub version: i64,
    #[serde(default)]
    pub width: u32,
    #[serde(default)]
    pub height: u32,
    pub timestamp: i64,
    #[serde(default)]
    pub command: Option<String>,
    #[serde(default)]
    pub src_node: String,
    #[serde(rename = "srcNodeID")]
    pub src_node_id: String,
    #[serde(default)]
    pub src_node_tags: Option<String>,
    #[serde(default)]
    pub src_node_user: Option<String>,
    #[serde(default, rename = "srcNodeUserID")]
    pub src_node_user_id: Option<i64>,
    #[serde(default)]
    pub ssh_user: String,
    #[serde(default)]
    pub local_user: String,
    #[serde(default, rename = "connectionID")]
    pub connection_id: String,
}

/// Persists streamed session recordings under one base directory,
/// grouped by source node.
pub struct Recorder {
    base_dir: PathBuf,
}

impl Recorder {
    /// Create the recorder, ensuring the base directory exists.
    pub async fn new(base_dir: impl Into<PathBuf>) -> Result<Self, RecordError> {
        let base_dir = base_dir.into();
        fs::create_dir_all(&base_dir)
            .await
            .map_err(RecordError::CreateDir)?;
        Ok(Self { base_dir })
    }

    /// Persist one recording stream.
    ///
    /// Reads the header line (unbounded — the stream has no read
    /// deadline), derives the destination from it, then copies the rest
    /// of the stream to the exclusively created file. An empty stream is
    /// a deliberate no-op. Returns the path written, if any.
    pub async fn record<R>(&self, mut stream: R) -> Result<Option<PathBuf>, RecordError>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut header = Vec::new();
        stream
            .read_until(b'\n', &mut header)
            .await
            .map_err(RecordError::Read)?;
        if header.is_empty() {
            info!("discarding empty recording");
            return Ok(None);
        }
        if header.last() != Some(&b'\n') {
            return Err(RecordError::TruncatedHeader);
        }

        let meta: CastMetadata = serde_json::from_slice(&header[..header.len() - 1])
            .map_err(RecordError::InvalidHeader)?;

        let dir = self.base_dir.join(&meta.src_node_id);
        fs::create_dir_all(&dir)
            .await
            .map_err(RecordError::CreateDir)?;
        let path = dir.join(format!("{}.cast", meta.timestamp_rfc3339()?));

        // create_new keeps recordings immutable: an existing file is
        // never overwritten or extended.
        let mut file = match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
        {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(RecordError::Duplicate(path));
            }
            Err(e) => return Err(RecordError::Open(e)),
        };

        file.write_all(&header)
            .await
            .map_err(RecordError::IncompleteWrite)?;
        io::copy(&mut stream, &mut file)
            .await
            .map_err(RecordError::IncompleteWrite)?;
        file.flush().await.map_err(RecordError::IncompleteWrite)?;

        info!(
            path = %path.display(),
            node = %meta.src_node_id,
            connection = %meta.connection_id,
            "session recording stored"
        );
        Ok(Some(path))
    }
}

impl CastMetadata {
    fn timestamp_rfc3339(&self) -> Result<String, RecordError> {
        let ts: DateTime<Utc> = DateTime::from_timestamp(self.timestamp, 0)
            .ok_or(RecordError::BadTimestamp(self.timestamp))?;
        Ok(ts.to_rfc3339_opts(SecondsFormat::Secs, true))
    }
}
