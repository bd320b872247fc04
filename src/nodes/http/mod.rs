//! HTTP requester node
//!
//! - `config`: typed node configuration (`HttpConfig`, `BodyConfig`, `AuthConfig`)
//! - `request`: per-call input, URL/header/body rendering
//! - `transport`: network seam (`HttpTransport`, `ReqwestTransport`)
//! - `executor`: `HttpRequester`, retries and output shaping
//! - `preview`: what a call would send

mod config;
mod executor;
mod preview;
mod request;
mod transport;

pub use config::{AuthConfig, AuthLocation, BodyConfig, HttpConfig};
pub use executor::{HttpRequester, OUTPUT_BODY, OUTPUT_HEADERS, OUTPUT_STATUS_CODE};
pub use preview::preview;
pub use request::{
    build_headers, build_url, render_body, render_url, Authentication, RenderedBody, Request,
    CONTENT_TYPE_BINARY, CONTENT_TYPE_FORM_URLENCODED, CONTENT_TYPE_JSON, CONTENT_TYPE_PLAIN_TEXT,
};
pub use transport::{
    FormPart, HttpTransport, InboundResponse, OutboundBody, OutboundRequest, ReqwestTransport,
};
