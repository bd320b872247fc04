//! Store Module - shared value space
//!
//! Thread-safe storage for node outputs.
//! Uses DashMap for lock-free concurrent access.
//!
//! Key types:
//! - `DataStore`: Central storage for node outputs
//! - `NodeResult`: Output with status and duration
//! - `NodeStatus`: Success or fallback

mod datastore;

pub use datastore::{take_value, DataStore, NodeResult, NodeStatus};
