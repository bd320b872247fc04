//! Centralized constants for flowcore runtime configuration
//!
//! All timeout and limit values in one place for easy tuning.
//! `EngineConfig` defaults are taken from here.

use std::time::Duration;

// ═══════════════════════════════════════════════════════════════
// HTTP Requester
// ═══════════════════════════════════════════════════════════════

/// Whole-request timeout when the node config sets none
pub const HTTP_TIMEOUT: Duration = Duration::from_secs(60);

/// Fixed timeout for remote-file fetches while assembling a body
pub const FILE_FETCH_TIMEOUT: Duration = Duration::from_secs(20);

/// Timeout for establishing HTTP connections
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Cumulative ceiling for streamed multipart file parts (20 MiB)
pub const MAX_FORM_DATA_BYTES: u64 = 20 * 1024 * 1024;

/// Attempts when the node config sets none
pub const DEFAULT_RETRY_TIMES: u64 = 1;

/// Maximum number of HTTP redirects to follow
pub const REDIRECT_LIMIT: usize = 5;

pub const USER_AGENT: &str = concat!("flowcore/", env!("CARGO_PKG_VERSION"));

// ═══════════════════════════════════════════════════════════════
// Cancellation
// ═══════════════════════════════════════════════════════════════

/// Retention of the durable cancel flag (24h)
pub const CANCEL_FLAG_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Buffered messages per cancel channel
pub const CANCEL_CHANNEL_CAPACITY: usize = 16;

// ═══════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════
