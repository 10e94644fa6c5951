//! HTTP transport seam.
//!
//! The channel builds a complete [`HttpRequest`] and hands it to an
//! [`HttpTransport`], which performs exactly one POST and reports the status
//! line. The response body is never inspected.

use std::pin::Pin;
use std::sync::OnceLock;

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use reqwest::{Body, Client, StatusCode};
use thiserror::Error;
use tracing::debug;

/// Streamed request body.
pub type BodyStream = Pin<Box<dyn Stream<Item = std::io::Result<Bytes>> + Send>>;

/// Request payload.
pub enum RequestBody {
    /// Fully buffered body.
    Bytes(Bytes),
    /// Body produced incrementally, e.g. a file upload.
    Stream(BodyStream),
}

impl std::fmt::Debug for RequestBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bytes(bytes) => f.debug_tuple("Bytes").field(&bytes.len()).finish(),
            Self::Stream(_) => f.write_str("Stream"),
        }
    }
}

/// A single outbound POST.
#[derive(Debug)]
pub struct HttpRequest {
    pub url: String,
    pub headers: Vec<(&'static str, String)>,
    /// Exact body length when known; streamed bodies are otherwise sent chunked.
    pub content_length: Option<u64>,
    pub body: RequestBody,
}

impl HttpRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Connection level failure: DNS, TLS, socket or body stream errors.
#[derive(Error, Debug)]
#[error("{0}")]
pub struct TransportError(pub String);

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        // Strip the URL: it embeds the bot token.
        Self(err.without_url().to_string())
    }
}

/// Performs one HTTP POST per call.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn post(&self, request: HttpRequest) -> Result<StatusCode, TransportError>;
}

pub(crate) fn install_rustls_provider() {
    static PROVIDER_INSTALLED: OnceLock<()> = OnceLock::new();
    PROVIDER_INSTALLED.get_or_init(|| {
        if let Err(e) = rustls::crypto::aws_lc_rs::default_provider().install_default() {
            // Safe to ignore: can happen if another crate installed it first.
            debug!(existing_provider = ?e, "rustls CryptoProvider already installed");
        }
    });
}

/// [`HttpTransport`] backed by a shared `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new() -> Self {
        install_rustls_provider();
        Self {
            client: Client::new(),
        }
    }

    /// Use a preconfigured client (proxy, custom roots).
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

impl Default for ReqwestTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn post(&self, request: HttpRequest) -> Result<StatusCode, TransportError> {
        let mut builder = self.client.post(&request.url);
        for (name, value) in &request.headers {
            builder = builder.header(*name, value);
        }
        if let Some(len) = request.content_length {
            builder = builder.header(reqwest::header::CONTENT_LENGTH, len);
        }

        let body = match request.body {
            RequestBody::Bytes(bytes) => Body::from(bytes),
            RequestBody::Stream(stream) => Body::wrap_stream(stream),
        };

        let response = builder.body(body).send().await?;
        Ok(response.status())
    }
}
