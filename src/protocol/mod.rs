//! Wire Protocol Implementation
//!
//! This module implements the request/response protocol spoken between
//! clients and the server.
//!
//! ## Overview
//!
//! A connection carries exactly one exchange: the client sends one framed
//! [`Request`], the server answers with one framed [`Response`], and the
//! connection closes. Frames are a 4-byte big-endian length prefix
//! followed by a bincode-serialized record.
//!
//! ## Modules
//!
//! - `message`: the `Request` and `Response` records
//! - `codec`: async reading and writing of length-prefixed frames
//!
//! ## Example
//!
//! ```ignore
//! use latchkv::protocol::{codec, Request};
//! use tokio::net::TcpStream;
//!
//! let mut stream = TcpStream::connect("127.0.0.1:4000").await?;
//! codec::write_request(&mut stream, &Request::get("name")).await?;
//! let response = codec::read_response(&mut stream).await?;
//! ```

pub mod codec;
pub mod message;

// Re-export commonly used types for convenience
pub use codec::{
    read_request, read_response, write_request, write_response, ProtocolError, ProtocolResult,
    MAX_FRAME_SIZE,
};
pub use message::{Operation, Request, Response};
