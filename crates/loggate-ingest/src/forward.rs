//! Upstream batch forwarding.
//!
//! POSTs each raw (decompressed, pre-deserialization) batch body to a
//! configured upstream, once per request. Delivery is best-effort; the
//! pipeline logs failures and moves on.

use bytes::Bytes;
use http_body_util::Full;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use tracing::debug;

use crate::error::SinkError;

#[derive(Debug)]
pub struct Forwarder {
    client: Client<HttpConnector, Full<Bytes>>,
    addr: http::Uri,
}

impl Forwarder {
    pub fn new(addr: &str) -> Result<Self, SinkError> {
        let addr: http::Uri = addr
            .parse()
            .map_err(|_| SinkError::Address(addr.to_string()))?;
        let client = Client::builder(TokioExecutor::new()).build_http();
        Ok(Self { client, addr })
    }

    /// Send one raw batch upstream.
    pub async fn forward(&self, raw: &[u8]) -> Result<(), SinkError> {
        let req = http::Request::builder()
            .method(http::Method::POST)
            .uri(self.addr.clone())
            .header(http::header::CONTENT_TYPE, "application/json")
            .body(Full::new(Bytes::copy_from_slice(raw)))
            .map_err(|e| SinkError::Http(e.to_string()))?;

        let resp = self
            .client
            .request(req)
            .await
            .map_err(|e| SinkError::Http(e.to_string()))?;
        debug!(status = %resp.status(), "forwarded batch upstream");
        Ok(())
    }
}
