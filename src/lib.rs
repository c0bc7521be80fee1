//! # latchkv - A Networked In-Memory Key-Value Store
//!
//! latchkv is a small networked key-value store written in Rust. It
//! demonstrates systems programming concepts like semaphore-based
//! concurrency control, worker-pool dispatch, and length-prefixed wire
//! protocols.
//!
//! ## Features
//!
//! - **One Request Per Connection**: Every connection carries exactly one
//!   request and one response, then closes
//! - **Readers-Writers Store**: A shared map guarded by a two-semaphore
//!   protocol that admits concurrent readers and exclusive writers
//! - **Worker-Pool Dispatch**: A fixed pool of workers drains an unbounded
//!   connection queue, so the accept loop never blocks on slow clients
//! - **Async I/O**: Built on Tokio end to end
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                            latchkv                               │
//! │                                                                  │
//! │  ┌─────────────┐     ┌──────────────┐     ┌───────────────────┐  │
//! │  │ TCP Server  │────>│   Dispatch   │────>│   Worker Pool     │  │
//! │  │ (Listener)  │     │    Queue     │     │  (10 tasks)       │  │
//! │  └─────────────┘     └──────────────┘     └─────────┬─────────┘  │
//! │                                                     │            │
//! │                                                     ▼            │
//! │  ┌─────────────┐     ┌────────────────────────────────────────┐  │
//! │  │   Framed    │     │                 Store                  │  │
//! │  │   Codec     │     │  ┌─────────┐  ┌───────┐  ┌──────────┐  │  │
//! │  │ (bincode)   │     │  │ HashMap │  │ entry │  │write gate│  │  │
//! │  └─────────────┘     │  │         │  │ sem   │  │   sem    │  │  │
//! │                      │  └─────────┘  └───────┘  └──────────┘  │  │
//! │                      └────────────────────────────────────────┘  │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```ignore
//! use latchkv::client::Client;
//! use latchkv::server::Server;
//! use latchkv::storage::Store;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     // Start a server on an ephemeral port
//!     let store = Arc::new(Store::new());
//!     let server = Server::bind("127.0.0.1:0", store).await?;
//!     let addr = server.local_addr()?;
//!     tokio::spawn(server.run_until_ctrl_c());
//!
//!     // Talk to it
//!     let client = Client::new(addr.to_string());
//!     client.put("name", "kv").await?;
//!     assert_eq!(client.get_value("name").await?, Some("kv".to_string()));
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Protocol
//!
//! Requests and responses are bincode-serialized records behind a 4-byte
//! big-endian length prefix:
//!
//! - `Request { operation, key, value }` where operation is PUT, GET, or
//!   DELETE
//! - `Response { key, value }` where an empty value marks a missing key
//!
//! A connection that sends anything else is closed without a response.
//!
//! ## Module Overview
//!
//! - [`protocol`]: Wire records and the length-prefixed codec
//! - [`storage`]: The readers-writers store
//! - [`connection`]: One-shot connection handling
//! - [`server`]: Accept loop, dispatch queue, and worker pool
//! - [`client`]: Connection-per-request client
//!
//! ## Design Highlights
//!
//! ### Readers-Writers Coordination
//!
//! The store layers the classic two-semaphore readers-writers protocol
//! over its map: readers pass through an entry semaphore to maintain a
//! shared count, the first reader in claims the write gate and the last
//! one out returns it, and writers take the gate outright. Many readers
//! can hold the map at once; a writer holds it alone.
//!
//! ### Accept/Serve Decoupling
//!
//! The accept loop only enqueues sockets. A fixed pool of workers pulls
//! from the queue and runs one connection each to completion, so a burst
//! of connections queues up instead of spawning unbounded work.
//!
//! ### Cooperative Shutdown
//!
//! Closing the store closes its semaphores, which wakes every operation
//! still parked on a permit with an error instead of leaving it hanging.
//! Workers then drain away and the server returns.

pub mod client;
pub mod connection;
pub mod protocol;
pub mod server;
pub mod storage;

// Re-export commonly used types for convenience
pub use client::{Client, ClientError};
pub use connection::{handle_connection, ConnectionError, ConnectionHandler, ConnectionStats};
pub use protocol::{Operation, ProtocolError, Request, Response};
pub use server::{Server, DEFAULT_WORKERS};
pub use storage::{Store, StoreError, StoreStats};

/// The default port latchkv listens on
pub const DEFAULT_PORT: u16 = 4000;

/// The default host latchkv binds to
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Version of latchkv
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
