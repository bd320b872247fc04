//! Utilities Module - shared infrastructure
//!
//! - `constants`: Centralized timeouts and limits

pub mod constants;

pub use constants::{
    CANCEL_FLAG_TTL, CONNECT_TIMEOUT, DEFAULT_RETRY_TIMES, FILE_FETCH_TIMEOUT, HTTP_TIMEOUT,
    MAX_FORM_DATA_BYTES, REDIRECT_LIMIT, USER_AGENT,
};
