//! Dispatch Server Module
//!
//! The server decouples accepting connections from serving them. The
//! accept loop does nothing but push accepted sockets onto an internal
//! queue; a fixed pool of worker tasks pulls from that queue and serves
//! one connection at a time each.
//!
//! ```text
//!                    ┌──────────────┐
//!   clients ───────► │ accept loop  │
//!                    └──────┬───────┘
//!                           │ unbounded queue
//!            ┌──────────────┼──────────────┐
//!            ▼              ▼              ▼
//!       ┌─────────┐    ┌─────────┐    ┌─────────┐
//!       │ worker 0│    │ worker 1│ …  │ worker 9│
//!       └────┬────┘    └────┬────┘    └────┬────┘
//!            └──────────────┼──────────────┘
//!                           ▼
//!                    ┌──────────────┐
//!                    │ shared store │
//!                    └──────────────┘
//! ```
//!
//! ## Design Decisions
//!
//! 1. **Unbounded queue**: the accept loop never blocks on slow workers.
//!    A burst of connections parks in the queue until a worker frees up.
//!
//! 2. **Fault isolation**: whatever happens to one connection stays in
//!    its handler. Workers and the accept loop only stop for listener
//!    failure or shutdown.
//!
//! 3. **Error taxonomy on accept**: transient per-connection failures
//!    (peer reset during the handshake and the like) are logged and
//!    skipped; anything else means the listener itself is broken and the
//!    server stops with that error.

use crate::connection::{handle_connection, ConnectionStats};
use crate::storage::Store;
use std::future::Future;
use std::io::ErrorKind;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Number of worker tasks serving connections concurrently.
pub const DEFAULT_WORKERS: usize = 10;

/// A connection as it travels through the dispatch queue.
type Accepted = (TcpStream, SocketAddr);

/// The key-value server: a listener, a store, and a worker pool.
///
/// A server moves through a simple lifecycle: bound by [`Server::bind`],
/// listening once [`Server::run_until`] starts, then alternating between
/// accepting and queueing connections until shutdown or a listener
/// failure stops it for good.
///
/// There is no per-request deadline and no rejection when every worker is
/// busy: a slow client occupies its worker until the socket settles, and
/// everyone behind it waits in the queue. Both are extension points for a
/// hardened deployment, not current behavior.
pub struct Server {
    listener: TcpListener,
    store: Arc<Store>,
    stats: Arc<ConnectionStats>,
    workers: usize,
}

impl Server {
    /// Binds a listener and prepares a server around `store`.
    ///
    /// Binding is the one failure that is fatal before the server even
    /// starts; the error is returned to the caller as-is.
    pub async fn bind(addr: impl ToSocketAddrs, store: Arc<Store>) -> std::io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;

        Ok(Self {
            listener,
            store,
            stats: Arc::new(ConnectionStats::new()),
            workers: DEFAULT_WORKERS,
        })
    }

    /// Overrides the worker pool size.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// The address the listener actually bound to.
    ///
    /// Useful when binding to port 0 and letting the OS pick.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Shared handle to the connection statistics.
    pub fn stats(&self) -> Arc<ConnectionStats> {
        Arc::clone(&self.stats)
    }

    /// Runs the server until Ctrl+C.
    pub async fn run_until_ctrl_c(self) -> std::io::Result<()> {
        self.run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(error = %e, "Failed to install Ctrl+C handler");
            }
        })
        .await
    }

    /// Runs the server until `shutdown` completes.
    ///
    /// On shutdown the store is closed first, which wakes any operation
    /// still parked on a permit, then the queue is closed and every
    /// worker is awaited before returning.
    pub async fn run_until<F>(self, shutdown: F) -> std::io::Result<()>
    where
        F: Future<Output = ()>,
    {
        let (tx, rx) = mpsc::unbounded_channel::<Accepted>();
        let rx = Arc::new(Mutex::new(rx));

        let mut workers = Vec::with_capacity(self.workers);
        for id in 0..self.workers {
            workers.push(spawn_worker(
                id,
                Arc::clone(&rx),
                Arc::clone(&self.store),
                Arc::clone(&self.stats),
            ));
        }
        info!(workers = self.workers, "Worker pool started");

        tokio::pin!(shutdown);

        let result = loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutdown signal received, stopping server...");
                    break Ok(());
                }
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, addr)) => {
                        debug!(client = %addr, "Connection queued");
                        if tx.send((stream, addr)).is_err() {
                            error!("Dispatch queue closed unexpectedly");
                            break Ok(());
                        }
                    }
                    Err(e) if is_transient_accept_error(&e) => {
                        warn!(error = %e, "Failed to accept connection, continuing");
                    }
                    Err(e) => {
                        error!(error = %e, "Listener failed, stopping server");
                        break Err(e);
                    }
                },
            }
        };

        // Wake anything parked inside the store, then let the workers
        // drain the queue and exit.
        self.store.close();
        drop(tx);
        for worker in workers {
            let _ = worker.await;
        }

        info!("Server stopped");
        result
    }
}

/// Accept errors that concern one connection attempt, not the listener.
fn is_transient_accept_error(e: &std::io::Error) -> bool {
    matches!(
        e.kind(),
        ErrorKind::ConnectionReset | ErrorKind::ConnectionAborted | ErrorKind::Interrupted
    )
}

/// Spawns one worker task.
///
/// Each worker loops: take the queue lock, pull the next connection,
/// release the lock, serve the connection. The lock is only ever held
/// while waiting to receive, never while serving.
fn spawn_worker(
    id: usize,
    queue: Arc<Mutex<UnboundedReceiver<Accepted>>>,
    store: Arc<Store>,
    stats: Arc<ConnectionStats>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let next = queue.lock().await.recv().await;

            match next {
                Some((stream, addr)) => {
                    debug!(worker = id, client = %addr, "Connection picked up");
                    handle_connection(stream, addr, Arc::clone(&store), Arc::clone(&stats)).await;
                }
                None => {
                    debug!(worker = id, "Queue closed, worker exiting");
                    break;
                }
            }
        }
    })
}
