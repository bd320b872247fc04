//! Request - per-invocation input of the HTTP requester
//!
//! Built from the node's resolved input map. Shared by the real call and
//! `preview` so both render URL and body identically.

use std::collections::BTreeMap;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION};
use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};
use tracing::warn;
use url::Url;

use crate::binding::{render, value_to_string};
use crate::error::{FlowError, Result};

use super::config::{AuthConfig, AuthLocation, BodyConfig, HttpConfig};

pub const CONTENT_TYPE_JSON: &str = "application/json";
pub const CONTENT_TYPE_PLAIN_TEXT: &str = "text/plain";
pub const CONTENT_TYPE_FORM_URLENCODED: &str = "application/x-www-form-urlencoded";
pub const CONTENT_TYPE_BINARY: &str = "application/octet-stream";

/// Credential material; any missing part is an empty string
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Authentication {
    #[serde(rename = "Key")]
    pub key: String,
    #[serde(rename = "Value")]
    pub value: String,
    #[serde(rename = "Token")]
    pub token: String,
}

/// Dynamic input of one HTTP requester invocation
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Request {
    #[serde(rename = "URLVars")]
    pub url_vars: Value,
    #[serde(rename = "Headers", deserialize_with = "lenient_string_map")]
    pub headers: BTreeMap<String, String>,
    #[serde(rename = "Params", deserialize_with = "lenient_string_map")]
    pub params: BTreeMap<String, String>,
    #[serde(rename = "Authentication")]
    pub authentication: Option<Authentication>,
    #[serde(rename = "FormDataVars", deserialize_with = "lenient_string_map")]
    pub form_data_vars: BTreeMap<String, String>,
    #[serde(rename = "FormURLEncodedVars", deserialize_with = "lenient_string_map")]
    pub form_urlencoded_vars: BTreeMap<String, String>,
    #[serde(rename = "JsonVars")]
    pub json_vars: Value,
    #[serde(rename = "TextPlainVars")]
    pub text_plain_vars: Value,
    #[serde(rename = "FileURL")]
    pub file_url: Option<String>,
}

impl Default for Request {
    fn default() -> Self {
        Self {
            url_vars: Value::Object(Map::new()),
            headers: BTreeMap::new(),
            params: BTreeMap::new(),
            authentication: None,
            form_data_vars: BTreeMap::new(),
            form_urlencoded_vars: BTreeMap::new(),
            json_vars: Value::Object(Map::new()),
            text_plain_vars: Value::Object(Map::new()),
            file_url: None,
        }
    }
}

/// Map values of any scalar type are stringified, null maps are empty
fn lenient_string_map<'de, D>(deserializer: D) -> std::result::Result<BTreeMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<Map<String, Value>> = Option::deserialize(deserializer)?;
    Ok(raw
        .unwrap_or_default()
        .iter()
        .map(|(k, v)| (k.clone(), value_to_string(v)))
        .collect())
}

impl Request {
    pub fn from_input(input: Map<String, Value>) -> Result<Self> {
        serde_json::from_value(Value::Object(input)).map_err(|e| FlowError::InvalidInput {
            reason: e.to_string(),
        })
    }

    pub fn credentials(&self) -> Authentication {
        self.authentication.clone().unwrap_or_default()
    }
}

/// Body after template rendering, before any network fetch
#[derive(Debug, Clone, PartialEq)]
pub enum RenderedBody {
    Empty,
    Json(String),
    RawText(String),
    FormUrlEncoded(BTreeMap<String, String>),
    Binary { file_url: Option<String> },
    FormData(BTreeMap<String, String>),
}

/// Body-kind switch shared by the real call and the preview
pub fn render_body(body: &BodyConfig, request: &Request) -> RenderedBody {
    match body {
        BodyConfig::Empty => RenderedBody::Empty,
        BodyConfig::Json { template } => {
            RenderedBody::Json(render(template, &request.json_vars).into_owned())
        }
        BodyConfig::RawText { template } => {
            RenderedBody::RawText(render(template, &request.text_plain_vars).into_owned())
        }
        BodyConfig::FormUrlEncoded => {
            RenderedBody::FormUrlEncoded(request.form_urlencoded_vars.clone())
        }
        BodyConfig::Binary => RenderedBody::Binary {
            file_url: request.file_url.clone(),
        },
        BodyConfig::FormData { .. } => RenderedBody::FormData(request.form_data_vars.clone()),
    }
}

/// Rendered URL template, before params and auth
pub fn render_url(config: &HttpConfig, request: &Request) -> String {
    render(&config.url_template, &request.url_vars).into_owned()
}

/// Final URL: rendered template, request params over template query,
/// custom query auth, re-encoded sorted by key
pub fn build_url(config: &HttpConfig, request: &Request) -> Result<Url> {
    let rendered = render_url(config, request);
    let mut url = Url::parse(&rendered).map_err(|e| FlowError::InvalidUrl {
        url: rendered.clone(),
        reason: e.to_string(),
    })?;

    let mut query: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (k, v) in url.query_pairs() {
        query.entry(k.into_owned()).or_default().push(v.into_owned());
    }
    for (k, v) in &request.params {
        query.insert(k.clone(), vec![v.clone()]);
    }

    if let Some(AuthConfig::Custom {
        location: AuthLocation::Query,
    }) = config.auth
    {
        let creds = request.credentials();
        query.insert(creds.key, vec![creds.value]);
    }

    if query.is_empty() {
        url.set_query(None);
    } else {
        url.query_pairs_mut().clear().extend_pairs(
            query
                .iter()
                .flat_map(|(k, values)| values.iter().map(move |v| (k.as_str(), v.as_str()))),
        );
    }

    Ok(url)
}

/// Request headers then header auth; later writes replace earlier ones
pub fn build_headers(config: &HttpConfig, request: &Request) -> Result<HeaderMap> {
    let mut headers = HeaderMap::with_capacity(request.headers.len() + 1);
    for (k, v) in &request.headers {
        headers.insert(header_name(k)?, header_value(k, v)?);
    }

    match config.auth {
        Some(AuthConfig::Bearer) => {
            let token = request.credentials().token;
            headers.insert(AUTHORIZATION, header_value("Authorization", &format!("Bearer {token}"))?);
        }
        Some(AuthConfig::Custom {
            location: AuthLocation::Header,
        }) => {
            let creds = request.credentials();
            if creds.key.is_empty() {
                warn!("custom header auth without a key, skipped");
            } else {
                headers.insert(header_name(&creds.key)?, header_value(&creds.key, &creds.value)?);
            }
        }
        Some(AuthConfig::Custom {
            location: AuthLocation::Query,
        })
        | None => {}
    }

    Ok(headers)
}

fn header_name(name: &str) -> Result<HeaderName> {
    HeaderName::from_bytes(name.as_bytes()).map_err(|e| FlowError::InvalidInput {
        reason: format!("invalid header name '{name}': {e}"),
    })
}

fn header_value(name: &str, value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value).map_err(|e| FlowError::InvalidInput {
        reason: format!("invalid value for header '{name}': {e}"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{NodeKind, NodeSchema};
    use serde_json::json;

    fn config(configs: Value) -> HttpConfig {
        let mut node = NodeSchema::new("http", NodeKind::HttpRequester);
        let Value::Object(map) = configs else {
            unreachable!()
        };
        node.configs = map;
        HttpConfig::from_schema(&node).unwrap()
    }

    fn request(input: Value) -> Request {
        let Value::Object(map) = input else {
            unreachable!()
        };
        Request::from_input(map).unwrap()
    }

    #[test]
    fn request_defaults_and_lenient_maps() {
        let req = request(json!({"Headers": {"X-Count": 3, "X-Flag": true}, "Params": null}));
        assert_eq!(req.headers["X-Count"], "3");
        assert_eq!(req.headers["X-Flag"], "true");
        assert!(req.params.is_empty());
        assert_eq!(req.url_vars, json!({}));
        assert_eq!(req.credentials(), Authentication::default());
    }

    #[test]
    fn url_merges_params_and_sorts() {
        let cfg = config(json!({
            "Method": "GET",
            "URLConfig": {"tpl": "http://host/{{v}}?z=1&a=old"}
        }));
        let req = request(json!({"URLVars": {"v": "x"}, "Params": {"a": "new", "m": "a b"}}));

        let url = build_url(&cfg, &req).unwrap();
        assert_eq!(url.as_str(), "http://host/x?a=new&m=a+b&z=1");
    }

    #[test]
    fn url_without_query_stays_clean() {
        let cfg = config(json!({"Method": "GET", "URLConfig": {"tpl": "http://host/path"}}));
        let url = build_url(&cfg, &Request::default()).unwrap();
        assert_eq!(url.as_str(), "http://host/path");
    }

    #[test]
    fn invalid_rendered_url_is_reported() {
        let cfg = config(json!({"Method": "GET", "URLConfig": {"tpl": "{{base}}/x"}}));
        let err = build_url(&cfg, &Request::default()).unwrap_err();
        assert_eq!(err.code(), "FLOW-033");
    }

    #[test]
    fn custom_query_auth_goes_into_query() {
        let cfg = config(json!({
            "Method": "GET",
            "URLConfig": {"tpl": "http://host/"},
            "AuthConfig": {"type": 2, "location": 2}
        }));
        let req = request(json!({"Authentication": {"Key": "api_key", "Value": "s3cr3t"}}));
        let url = build_url(&cfg, &req).unwrap();
        assert_eq!(url.query(), Some("api_key=s3cr3t"));
        assert!(build_headers(&cfg, &req).unwrap().is_empty());
    }

    #[test]
    fn bearer_auth_sets_authorization() {
        let cfg = config(json!({
            "Method": "GET",
            "URLConfig": {"tpl": "http://host/"},
            "AuthConfig": {"type": 1}
        }));
        let req = request(json!({
            "Headers": {"Authorization": "Basic old"},
            "Authentication": {"Token": "t0k"}
        }));
        let headers = build_headers(&cfg, &req).unwrap();
        assert_eq!(headers[AUTHORIZATION], "Bearer t0k");
    }

    #[test]
    fn missing_credentials_are_empty() {
        let cfg = config(json!({
            "Method": "GET",
            "URLConfig": {"tpl": "http://host/"},
            "AuthConfig": {"type": 1}
        }));
        let headers = build_headers(&cfg, &Request::default()).unwrap();
        assert_eq!(headers[AUTHORIZATION], "Bearer ");
    }

    #[test]
    fn render_body_per_kind() {
        let req = request(json!({
            "JsonVars": {"v1": "\"a\"", "v2": 2},
            "FileURL": "http://files/x.bin"
        }));

        let json_body = BodyConfig::Json {
            template: r#"{"v1":{{v1}},"v2":{{v2}}}"#.to_string(),
        };
        assert_eq!(
            render_body(&json_body, &req),
            RenderedBody::Json(r#"{"v1":"a","v2":2}"#.to_string())
        );
        assert_eq!(
            render_body(&BodyConfig::Binary, &req),
            RenderedBody::Binary {
                file_url: Some("http://files/x.bin".to_string())
            }
        );
        assert_eq!(render_body(&BodyConfig::Empty, &req), RenderedBody::Empty);
    }
}
