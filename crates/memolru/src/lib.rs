//! # memolru
//!
//! Bounded memoization with least-recently-used eviction.
//!
//! ## Architecture
//! - **Fingerprint**: canonical, hashable form of a call's arguments
//! - **LruStore**: AHash map into an index-linked recency list (O(1) touch/evict)
//! - **Memo / LocalMemo**: wrap a computation, serve repeated calls from the store
//!
//! A failed computation is never stored, and arguments without a stable
//! equality/hash contract are rejected before the computation runs.

#![warn(missing_docs)]

mod config;
mod error;
mod flight;
mod key;
mod lru;
mod memo;
mod stats;

pub use config::{CacheConfig, MissPolicy};
pub use error::{Error, Result};
pub use key::{Args, Fingerprint, Value};
pub use lru::{Keys, LruStore};
pub use memo::{LocalMemo, Memo};
pub use stats::CacheStats;
