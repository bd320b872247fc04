//! Event Module - audit trail for workflow execution
//!
//! Key types:
//! - `Event`: Envelope with id + timestamp + kind
//! - `EventKind`: workflow, node and fine-grained variants
//! - `EventLog`: Thread-safe, append-only log

mod log;

pub use log::{Event, EventKind, EventLog};
