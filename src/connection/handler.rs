//! Connection Handler Module
//!
//! This module serves individual client connections. A connection lives
//! for exactly one exchange; there is no command loop.
//!
//! ## Connection Lifecycle
//!
//! ```text
//! 1. Client connects (TCP handshake)
//!        │
//!        ▼
//! 2. Worker picks the connection off the queue
//!        │
//!        ▼
//! 3. ┌─────────────────────────┐
//!    │ Read one framed request │
//!    └───────────┬─────────────┘
//!                ▼
//!    ┌─────────────────────────┐
//!    │ Apply it to the store   │
//!    └───────────┬─────────────┘
//!                ▼
//!    ┌─────────────────────────┐
//!    │ Write one response      │
//!    └───────────┬─────────────┘
//!                ▼
//! 4. Socket closed
//! ```
//!
//! A request that cannot be decoded ends the connection without any
//! response; the client observes EOF. Errors stay inside the handler
//! either way. The worker that ran it carries on with the next
//! connection untouched.

use crate::protocol::codec;
use crate::protocol::{Operation, ProtocolError, Request, Response};
use crate::storage::{Store, StoreError};
use std::io::ErrorKind;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::io::BufWriter;
use tokio::net::TcpStream;
use tracing::{debug, warn};

/// Statistics for connection handling
#[derive(Debug, Default)]
pub struct ConnectionStats {
    /// Total number of connections accepted
    pub connections_accepted: AtomicU64,
    /// Currently active connections
    pub active_connections: AtomicU64,
    /// Total requests answered
    pub requests_processed: AtomicU64,
    /// Connections dropped because the request could not be decoded
    pub protocol_errors: AtomicU64,
}

impl ConnectionStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connection_opened(&self) {
        self.connections_accepted.fetch_add(1, Ordering::Relaxed);
        self.active_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn connection_closed(&self) {
        self.active_connections.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn request_processed(&self) {
        self.requests_processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn protocol_error(&self) {
        self.protocol_errors.fetch_add(1, Ordering::Relaxed);
    }
}

/// Handles a single client connection for its single exchange.
pub struct ConnectionHandler {
    /// The TCP stream for this connection
    stream: BufWriter<TcpStream>,

    /// Client's address (for logging)
    addr: SocketAddr,

    /// The store shared across connections
    store: Arc<Store>,

    /// Connection statistics (shared)
    stats: Arc<ConnectionStats>,
}

impl ConnectionHandler {
    /// Creates a new connection handler.
    ///
    /// # Arguments
    ///
    /// * `stream` - The TCP stream for this connection
    /// * `addr` - The client's socket address
    /// * `store` - The shared store
    /// * `stats` - Shared connection statistics
    pub fn new(
        stream: TcpStream,
        addr: SocketAddr,
        store: Arc<Store>,
        stats: Arc<ConnectionStats>,
    ) -> Self {
        stats.connection_opened();

        Self {
            stream: BufWriter::new(stream),
            addr,
            store,
            stats,
        }
    }

    /// Serves the connection to completion.
    ///
    /// Reads exactly one request, applies it, writes exactly one
    /// response, and returns; dropping the handler closes the socket.
    pub async fn run(mut self) -> Result<(), ConnectionError> {
        debug!(client = %self.addr, "Client connected");

        let result = self.serve_one().await;

        match &result {
            Ok(()) => debug!(client = %self.addr, "Response sent, closing connection"),
            Err(ConnectionError::Protocol(ProtocolError::Io(io_err)))
                if is_disconnect(io_err.kind()) =>
            {
                debug!(client = %self.addr, "Client disconnected mid-exchange")
            }
            Err(ConnectionError::Protocol(e)) => {
                self.stats.protocol_error();
                warn!(client = %self.addr, error = %e, "Protocol error, dropping connection");
            }
            Err(ConnectionError::Store(e)) => {
                debug!(client = %self.addr, error = %e, "Store unavailable, dropping connection")
            }
        }

        self.stats.connection_closed();
        result
    }

    /// The single read-apply-respond exchange.
    async fn serve_one(&mut self) -> Result<(), ConnectionError> {
        let request = codec::read_request(self.stream.get_mut()).await?;
        debug!(
            client = %self.addr,
            op = %request.operation,
            key = %request.key,
            "Request received"
        );

        let response = self.dispatch(request).await?;
        self.stats.request_processed();

        codec::write_response(&mut self.stream, &response).await?;
        Ok(())
    }

    /// Applies a request to the store and builds its response.
    async fn dispatch(&self, request: Request) -> Result<Response, ConnectionError> {
        let Request {
            operation,
            key,
            value,
        } = request;

        let response = match operation {
            Operation::Put => {
                self.store.put(key.clone(), value.clone()).await?;
                Response::new(key, value)
            }
            Operation::Get => match self.store.get(&key).await? {
                Some(value) => Response::new(key, value),
                None => Response::not_found(key),
            },
            Operation::Delete => {
                self.store.delete(&key).await?;
                Response::ack(key)
            }
        };

        Ok(response)
    }
}

/// Errors that can occur while handling a connection.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    /// Failure reading the request or writing the response
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// The store refused the operation
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

/// Error kinds that mean the peer is gone rather than misbehaving.
fn is_disconnect(kind: ErrorKind) -> bool {
    matches!(
        kind,
        ErrorKind::UnexpectedEof | ErrorKind::ConnectionReset | ErrorKind::BrokenPipe
    )
}

/// Serves one client connection to completion.
///
/// Convenience wrapper that builds a [`ConnectionHandler`] and runs it,
/// absorbing the outcome. Nothing escapes to the caller: however this
/// connection ends, the task that invoked it keeps serving others.
pub async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    store: Arc<Store>,
    stats: Arc<ConnectionStats>,
) {
    let handler = ConnectionHandler::new(stream, addr, store, stats);
    let _ = handler.run().await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    async fn create_test_server() -> (SocketAddr, Arc<Store>, Arc<ConnectionStats>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let store = Arc::new(Store::new());
        let stats = Arc::new(ConnectionStats::new());

        let store_clone = Arc::clone(&store);
        let stats_clone = Arc::clone(&stats);

        tokio::spawn(async move {
            while let Ok((stream, client_addr)) = listener.accept().await {
                let store = Arc::clone(&store_clone);
                let stats = Arc::clone(&stats_clone);
                tokio::spawn(handle_connection(stream, client_addr, store, stats));
            }
        });

        (addr, store, stats)
    }

    async fn exchange(addr: SocketAddr, request: Request) -> Response {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        codec::write_request(&mut stream, &request).await.unwrap();
        codec::read_response(&mut stream).await.unwrap()
    }

    #[tokio::test]
    async fn test_put_echoes_stored_pair() {
        let (addr, store, _) = create_test_server().await;

        let response = exchange(addr, Request::put("name", "kv")).await;
        assert_eq!(response, Response::new("name", "kv"));
        assert_eq!(store.get("name").await.unwrap(), Some("kv".to_string()));
    }

    #[tokio::test]
    async fn test_get_found_and_missing() {
        let (addr, store, _) = create_test_server().await;
        store.put("name".to_string(), "kv".to_string()).await.unwrap();

        let found = exchange(addr, Request::get("name")).await;
        assert_eq!(found, Response::new("name", "kv"));

        let missing = exchange(addr, Request::get("absent")).await;
        assert!(missing.is_not_found());
        assert_eq!(missing.key, "absent");
    }

    #[tokio::test]
    async fn test_delete_acknowledges_with_empty_value() {
        let (addr, store, _) = create_test_server().await;
        store.put("name".to_string(), "kv".to_string()).await.unwrap();

        let response = exchange(addr, Request::delete("name")).await;
        assert_eq!(response, Response::ack("name"));
        assert_eq!(store.get("name").await.unwrap(), None);

        // Deleting again is a no-op with the same acknowledgement.
        let again = exchange(addr, Request::delete("name")).await;
        assert_eq!(again, Response::ack("name"));
    }

    #[tokio::test]
    async fn test_stored_empty_value_reads_as_not_found_marker() {
        let (addr, store, _) = create_test_server().await;

        exchange(addr, Request::put("blank", "")).await;

        // The store distinguishes empty from absent; the wire cannot.
        assert_eq!(store.get("blank").await.unwrap(), Some(String::new()));
        let response = exchange(addr, Request::get("blank")).await;
        assert!(response.is_not_found());
    }

    #[tokio::test]
    async fn test_one_request_per_connection() {
        let (addr, _, _) = create_test_server().await;

        let mut stream = TcpStream::connect(addr).await.unwrap();
        codec::write_request(&mut stream, &Request::put("a", "1"))
            .await
            .unwrap();
        let first = codec::read_response(&mut stream).await.unwrap();
        assert_eq!(first, Response::new("a", "1"));

        // The server has already closed its end; a second exchange on the
        // same socket gets no answer.
        let _ = codec::write_request(&mut stream, &Request::get("a")).await;
        assert!(codec::read_response(&mut stream).await.is_err());
    }

    #[tokio::test]
    async fn test_garbage_closes_without_response() {
        let (addr, _, stats) = create_test_server().await;

        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream.write_all(&8u32.to_be_bytes()).await.unwrap();
        stream.write_all(&[0xff; 8]).await.unwrap();

        // No response ever arrives; the read sees the socket close.
        assert!(codec::read_response(&mut stream).await.is_err());

        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert_eq!(stats.protocol_errors.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn test_half_written_frame_then_disconnect() {
        let (addr, _, _) = create_test_server().await;

        {
            let mut stream = TcpStream::connect(addr).await.unwrap();
            stream.write_all(&100u32.to_be_bytes()).await.unwrap();
            stream.write_all(&[1, 2, 3]).await.unwrap();
            // Dropped here; the server sees EOF mid-frame.
        }

        // The server keeps serving.
        let response = exchange(addr, Request::put("after", "ok")).await;
        assert_eq!(response, Response::new("after", "ok"));
    }

    #[tokio::test]
    async fn test_connection_stats() {
        let (addr, _, stats) = create_test_server().await;

        assert_eq!(stats.active_connections.load(Ordering::Relaxed), 0);

        let response = exchange(addr, Request::put("name", "kv")).await;
        assert_eq!(response.key, "name");

        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        assert_eq!(stats.connections_accepted.load(Ordering::Relaxed), 1);
        assert_eq!(stats.requests_processed.load(Ordering::Relaxed), 1);
        assert_eq!(stats.active_connections.load(Ordering::Relaxed), 0);
    }

    #[tokio::test]
    async fn test_closed_store_drops_connection_without_response() {
        let (addr, store, _) = create_test_server().await;
        store.put("name".to_string(), "kv".to_string()).await.unwrap();

        store.close();

        let mut stream = TcpStream::connect(addr).await.unwrap();
        codec::write_request(&mut stream, &Request::get("name"))
            .await
            .unwrap();

        let mut buf = [0u8; 16];
        let n = stream.read(&mut buf).await.unwrap_or(0);
        assert_eq!(n, 0);
    }
}
