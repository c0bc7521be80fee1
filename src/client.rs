//! Client Module
//!
//! A small client for the one-request protocol. Because the server
//! closes the socket after every exchange, the client opens a fresh
//! TCP connection per request; there is nothing to pool or keep alive.

use crate::protocol::{codec, ProtocolError, Request, Response};
use tokio::net::TcpStream;
use tracing::debug;

/// A client handle holding the server address.
///
/// Cheap to construct and to clone; no connection is made until a
/// request is sent.
#[derive(Debug, Clone)]
pub struct Client {
    addr: String,
}

impl Client {
    /// Creates a client that will talk to `addr` (for example
    /// `"127.0.0.1:4000"`).
    pub fn new(addr: impl Into<String>) -> Self {
        Self { addr: addr.into() }
    }

    /// Sends one request on a fresh connection and returns the response.
    pub async fn request(&self, request: Request) -> Result<Response, ClientError> {
        let mut stream = TcpStream::connect(&self.addr)
            .await
            .map_err(ClientError::Connect)?;
        debug!(server = %self.addr, op = %request.operation, key = %request.key, "Request sent");

        codec::write_request(&mut stream, &request).await?;
        let response = codec::read_response(&mut stream).await?;
        Ok(response)
    }

    /// Stores `value` under `key`.
    pub async fn put(
        &self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<Response, ClientError> {
        self.request(Request::put(key, value)).await
    }

    /// Looks up `key`, returning the raw response.
    pub async fn get(&self, key: impl Into<String>) -> Result<Response, ClientError> {
        self.request(Request::get(key)).await
    }

    /// Looks up `key`, mapping the not-found marker to `None`.
    ///
    /// A key stored with an empty value is indistinguishable from an
    /// absent key over the wire, so it also comes back as `None`.
    pub async fn get_value(&self, key: impl Into<String>) -> Result<Option<String>, ClientError> {
        let response = self.get(key).await?;
        if response.is_not_found() {
            Ok(None)
        } else {
            Ok(Some(response.value))
        }
    }

    /// Removes `key`. Succeeds whether or not the key existed.
    pub async fn delete(&self, key: impl Into<String>) -> Result<Response, ClientError> {
        self.request(Request::delete(key)).await
    }
}

/// Errors a client request can produce.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The TCP connection could not be established
    #[error("failed to connect: {0}")]
    Connect(#[source] std::io::Error),

    /// The exchange failed after connecting
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),
}
