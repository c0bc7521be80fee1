//! Wire Message Records
//!
//! This module defines the two records that cross the wire: a [`Request`]
//! from client to server and a [`Response`] back. Both are plain serde
//! structs; the framing around them lives in [`crate::protocol::codec`].
//!
//! ## Schema
//!
//! ```text
//! Request  { operation: PUT | GET | DELETE, key: String, value: String }
//! Response { key: String, value: String }
//! ```
//!
//! The schema is deliberately small. Every request carries all three
//! fields even though `value` only means something for PUT, and the
//! response has no status field at all: an empty `value` doubles as the
//! "not found" marker for GET and as the acknowledgement body for PUT
//! and DELETE.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The operation a request asks the server to perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operation {
    /// Store a value under a key, overwriting any previous value.
    Put,
    /// Look up the value for a key.
    Get,
    /// Remove a key and its value.
    Delete,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Put => write!(f, "PUT"),
            Operation::Get => write!(f, "GET"),
            Operation::Delete => write!(f, "DELETE"),
        }
    }
}

/// A single client request.
///
/// The `value` field is only meaningful for [`Operation::Put`]; the
/// constructors leave it empty for the other operations.
///
/// # Example
///
/// ```
/// use latchkv::protocol::{Operation, Request};
///
/// let request = Request::put("name", "kv");
/// assert_eq!(request.operation, Operation::Put);
/// assert_eq!(request.key, "name");
/// assert_eq!(request.value, "kv");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    /// What to do with the key
    pub operation: Operation,
    /// The key to operate on
    pub key: String,
    /// The value to store (PUT only, empty otherwise)
    pub value: String,
}

impl Request {
    /// Creates a PUT request storing `value` under `key`.
    pub fn put(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            operation: Operation::Put,
            key: key.into(),
            value: value.into(),
        }
    }

    /// Creates a GET request for `key`.
    pub fn get(key: impl Into<String>) -> Self {
        Self {
            operation: Operation::Get,
            key: key.into(),
            value: String::new(),
        }
    }

    /// Creates a DELETE request for `key`.
    pub fn delete(key: impl Into<String>) -> Self {
        Self {
            operation: Operation::Delete,
            key: key.into(),
            value: String::new(),
        }
    }
}

/// The server's answer to a [`Request`].
///
/// There is no status field. GET answers carry the stored value, with an
/// empty `value` marking an absent key; PUT answers echo the stored pair;
/// DELETE answers carry the key and an empty `value`. A key stored with
/// an empty value is therefore indistinguishable from an absent key on
/// the wire. The store itself has no such ambiguity, only the protocol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    /// The key the request named
    pub key: String,
    /// The value for the key, or empty
    pub value: String,
}

impl Response {
    /// Creates a response carrying `key` and `value`.
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Creates the "not found" answer for a GET: the key with an empty value.
    pub fn not_found(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: String::new(),
        }
    }

    /// Creates the acknowledgement for a PUT or DELETE.
    pub fn ack(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: String::new(),
        }
    }

    /// Returns true if this response carries the "not found" marker.
    ///
    /// # Example
    ///
    /// ```
    /// use latchkv::protocol::Response;
    ///
    /// assert!(Response::not_found("missing").is_not_found());
    /// assert!(!Response::new("name", "kv").is_not_found());
    /// ```
    pub fn is_not_found(&self) -> bool {
        self.value.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_constructor() {
        let request = Request::put("name", "kv");
        assert_eq!(request.operation, Operation::Put);
        assert_eq!(request.key, "name");
        assert_eq!(request.value, "kv");
    }

    #[test]
    fn test_get_and_delete_leave_value_empty() {
        assert_eq!(Request::get("name").value, "");
        assert_eq!(Request::delete("name").value, "");
        assert_eq!(Request::get("name").operation, Operation::Get);
        assert_eq!(Request::delete("name").operation, Operation::Delete);
    }

    #[test]
    fn test_not_found_marker() {
        assert!(Response::not_found("k").is_not_found());
        assert!(Response::ack("k").is_not_found());
        assert!(!Response::new("k", "v").is_not_found());

        // A stored empty string looks exactly like "not found" on the wire.
        assert!(Response::new("k", "").is_not_found());
    }

    #[test]
    fn test_operation_display() {
        assert_eq!(Operation::Put.to_string(), "PUT");
        assert_eq!(Operation::Get.to_string(), "GET");
        assert_eq!(Operation::Delete.to_string(), "DELETE");
    }
}
