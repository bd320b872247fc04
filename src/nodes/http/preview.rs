//! Preview - what an HTTP requester call would send, without sending it
//!
//! Uses the same renderer and body-kind switch as the real call.

use serde_json::{json, Map, Value};

use crate::error::Result;

use super::config::{AuthConfig, HttpConfig};
use super::request::{render_body, render_url, Request, RenderedBody};

const REDACTED: &str = "***";

/// Describe the request `input` would produce
///
/// Keys: `method`, `url`, `param`, `header`, `auth`, `body`. With `redact`
/// set, credential values are masked.
pub fn preview(config: &HttpConfig, input: Map<String, Value>, redact: bool) -> Result<Map<String, Value>> {
    let request = Request::from_input(input)?;

    let mut out = Map::new();
    out.insert("method".to_string(), json!(config.method.as_str()));
    out.insert("url".to_string(), json!(render_url(config, &request)));
    out.insert("param".to_string(), json!(request.params));
    out.insert("header".to_string(), json!(request.headers));
    out.insert("auth".to_string(), preview_auth(config, &request, redact));
    out.insert("body".to_string(), preview_body(render_body(&config.body, &request)));
    Ok(out)
}

fn preview_auth(config: &HttpConfig, request: &Request, redact: bool) -> Value {
    let creds = request.credentials();
    let mask = |secret: String| if redact { REDACTED.to_string() } else { secret };

    match config.auth {
        Some(AuthConfig::Custom { .. }) => json!({
            "Key": creds.key,
            "Value": mask(creds.value),
        }),
        Some(AuthConfig::Bearer) => json!({ "token": mask(creds.token) }),
        None => Value::Null,
    }
}

/// JSON bodies are shown parsed; a template that renders to invalid JSON
/// is shown as the raw text
fn preview_body(body: RenderedBody) -> Value {
    match body {
        RenderedBody::Empty => Value::Null,
        RenderedBody::Json(text) => serde_json::from_str(&text).unwrap_or(Value::String(text)),
        RenderedBody::RawText(text) => Value::String(text),
        RenderedBody::FormUrlEncoded(fields) | RenderedBody::FormData(fields) => json!(fields),
        RenderedBody::Binary { file_url } => file_url.map_or(Value::Null, Value::String),
    }
}
