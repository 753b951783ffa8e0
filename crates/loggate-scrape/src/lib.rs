//! loggate-scrape — federates metrics already exposed by peer nodes.
//!
//! Each configured target's `/metrics` endpoint is fetched on demand and
//! its exposition text re-emitted with a `target` label identifying the
//! peer. Unreachable peers are logged and skipped; the aggregate of the
//! reachable ones is served.

pub mod relabel;

use http_body_util::{BodyExt, Empty};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use thiserror::Error;
use tracing::{debug, warn};

pub use relabel::relabel_exposition;

/// Port assumed for targets that do not name one.
const DEFAULT_TARGET_PORT: u16 = 5252;

#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("invalid scrape target {0:?}")]
    InvalidTarget(String),

    #[error("fetching peer exposition: {0}")]
    Fetch(String),

    #[error("peer exposition is not valid UTF-8")]
    InvalidBody,
}

/// One peer to federate metrics from.
struct ScrapeTarget {
    /// `host:port`, used as the `target` label value.
    host: String,
    url: http::Uri,
}

/// Fetches and relabels the exposition of every configured peer.
pub struct ScrapeAggregator {
    client: Client<HttpConnector, Empty<bytes::Bytes>>,
    targets: Vec<ScrapeTarget>,
}

impl ScrapeAggregator {
    pub fn new(targets: &[String]) -> Result<Self, ScrapeError> {
        let targets = targets
            .iter()
            .map(|raw| {
                let host = normalize_target(raw)
                    .ok_or_else(|| ScrapeError::InvalidTarget(raw.clone()))?;
                let url: http::Uri = format!("http://{host}/metrics")
                    .parse()
                    .map_err(|_| ScrapeError::InvalidTarget(raw.clone()))?;
                debug!(%host, "adding scrape target");
                Ok(ScrapeTarget { host, url })
            })
            .collect::<Result<Vec<_>, ScrapeError>>()?;
        Ok(Self {
            client: Client::builder(TokioExecutor::new()).build_http(),
            targets,
        })
    }

    /// Fetch every peer and return the concatenated, relabeled text.
    pub async fn gather(&self) -> String {
        let mut out = String::new();
        for target in &self.targets {
            match self.fetch(target).await {
                Ok(text) => out.push_str(&relabel_exposition(&text, &target.host)),
                Err(e) => warn!(target = %target.host, error = %e, "peer scrape failed"),
            }
        }
        out
    }

    async fn fetch(&self, target: &ScrapeTarget) -> Result<String, ScrapeError> {
        let req = http::Request::builder()
            .method(http::Method::GET)
            .uri(target.url.clone())
            .body(Empty::new())
            .map_err(|e| ScrapeError::Fetch(e.to_string()))?;
        let resp = self
            .client
            .request(req)
            .await
            .map_err(|e| ScrapeError::Fetch(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(ScrapeError::Fetch(format!("status {}", resp.status())));
        }
        let body = resp
            .into_body()
            .collect()
            .await
            .map_err(|e| ScrapeError::Fetch(e.to_string()))?
            .to_bytes();
        String::from_utf8(body.to_vec()).map_err(|_| ScrapeError::InvalidBody)
    }
}

/// Resolve a configured target to `host:port`, applying the default port
/// when none is given.
fn normalize_target(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    match raw.rsplit_once(':') {
        Some((host, port)) if !host.is_empty() && port.parse::<u16>().is_ok() => {
            Some(raw.to_string())
        }
        Some(_) => None,
        None => Some(format!("{raw}:{DEFAULT_TARGET_PORT}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_with_port_kept() {
        assert_eq!(
            normalize_target("node1:9100").as_deref(),
            Some("node1:9100")
        );
    }

    #[test]
    fn target_without_port_gets_default() {
        assert_eq!(
            normalize_target("node1").as_deref(),
            Some("node1:5252")
        );
    }

    #[test]
    fn bad_targets_rejected() {
        assert_eq!(normalize_target(""), None);
        assert_eq!(normalize_target(":9100"), None);
        assert_eq!(normalize_target("node1:notaport"), None);
        assert!(ScrapeAggregator::new(&["node1:x".to_string()]).is_err());
    }

    #[tokio::test]
    async fn unreachable_peer_is_skipped() {
        // Nothing listens on port 1; gather serves what it can (nothing).
        let agg = ScrapeAggregator::new(&["127.0.0.1:1".to_string()]).unwrap();
        assert_eq!(agg.gather().await, "");
    }
}
