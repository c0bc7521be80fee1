//! Connection handling module
//!
//! One handler instance per client connection. Each connection carries a
//! single request and receives a single response before the server closes
//! the socket.

pub mod handler;

// Re-export commonly used types
pub use handler::{handle_connection, ConnectionError, ConnectionHandler, ConnectionStats};
