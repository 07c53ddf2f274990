//! HTTP transport abstraction for testability.
//!
//! The engine only needs "GET this URL with basic auth and give me the status
//! plus a byte stream". Putting that behind a trait keeps the retry and
//! streaming logic testable against scripted responses.

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use futures::StreamExt;
use thiserror::Error;

use crate::config::Credentials;
use crate::error::IngestError;

/// Streamed response body.
pub type ByteStream = BoxStream<'static, Result<Bytes, TransportError>>;

/// Errors surfaced by the transport layer.
///
/// All variants are retryable from the engine's point of view.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The request could not be sent or received no response.
    #[error("request failed: {0}")]
    Request(String),

    /// The response body stream broke mid-transfer.
    #[error("body read failed: {0}")]
    Body(String),
}

/// Raw response handed to the engine: status code plus body stream.
///
/// The status is deliberately not interpreted here; the engine decides what
/// counts as success.
pub struct RawResponse {
    pub status: u16,
    pub body: ByteStream,
}

/// Trait for authenticated streaming GET requests.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Perform a GET request against `url`.
    ///
    /// Returns the response status and body stream, or an error if no
    /// response was received at all.
    async fn fetch(&self, url: &str) -> Result<RawResponse, TransportError>;
}

/// Real transport implementation using reqwest.
///
/// No overall request timeout is set; stalls are bounded only by the
/// underlying connection defaults.
pub struct ReqwestTransport {
    client: reqwest::Client,
    credentials: Credentials,
}

impl ReqwestTransport {
    /// Create a transport authenticating with the given credentials.
    pub fn new(credentials: Credentials) -> Result<Self, IngestError> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| IngestError::ClientCreation(e.to_string()))?;
        Ok(Self { client, credentials })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn fetch(&self, url: &str) -> Result<RawResponse, TransportError> {
        let response = self
            .client
            .get(url)
            .basic_auth(&self.credentials.username, Some(&self.credentials.password))
            .send()
            .await
            .map_err(|e| TransportError::Request(e.to_string()))?;

        let status = response.status().as_u16();
        let body = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(|e| TransportError::Body(e.to_string())))
            .boxed();

        Ok(RawResponse { status, body })
    }
}
