//! Storage Module
//!
//! This module provides the shared in-memory store behind the server:
//! a single `HashMap<String, String>` governed by a readers/writers
//! permit protocol.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────┐
//! │                    Store                      │
//! │                                               │
//! │   entry (1 permit)     write_gate (1 permit)  │
//! │        │                       │              │
//! │        ▼                       ▼              │
//! │   reader cohort ──────> HashMap<String,String>│
//! │   (readers count)       behind RwLock         │
//! └───────────────────────────────────────────────┘
//! ```
//!
//! Readers overlap; writers run alone; readers take priority over
//! waiting writers. [`Store::close`] interrupts every blocked permit
//! wait for shutdown.
//!
//! ## Example
//!
//! ```ignore
//! use latchkv::storage::Store;
//! use std::sync::Arc;
//!
//! let store = Arc::new(Store::new());
//! store.put("name".to_string(), "kv".to_string()).await?;
//! assert_eq!(store.get("name").await?, Some("kv".to_string()));
//! ```

pub mod store;

// Re-export commonly used types
pub use store::{Store, StoreError, StoreStats};
