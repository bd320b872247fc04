//! HttpConfig - typed HTTP requester configuration
//!
//! Decoded once from `NodeSchema.configs` by the graph compiler:
//!
//! ```yaml
//! configs:
//!   Method: POST
//!   URLConfig: { tpl: "https://api.example.com/users/{{block_output_entry.id}}" }
//!   BodyConfig:
//!     body_type: JSON
//!     text_json_config: { tpl: '{"name": "{{block_output_entry.name}}"}' }
//!   AuthConfig: { type: 1 }          # 1 = bearer, 2 = custom
//!   Timeout: 30                      # seconds, 0 = engine default
//!   RetryTimes: 3
//! ```

use std::time::Duration;

use reqwest::Method;
use rustc_hash::FxHashSet;
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::warn;

use crate::ast::NodeSchema;
use crate::error::{FlowError, Result};

pub const CONFIG_METHOD: &str = "Method";
pub const CONFIG_URL: &str = "URLConfig";
pub const CONFIG_BODY: &str = "BodyConfig";
pub const CONFIG_AUTH: &str = "AuthConfig";
pub const CONFIG_TIMEOUT: &str = "Timeout";
pub const CONFIG_RETRY_TIMES: &str = "RetryTimes";

/// Request body encoding, each variant carrying only what it needs
#[derive(Debug, Clone, PartialEq)]
pub enum BodyConfig {
    Empty,
    Json { template: String },
    RawText { template: String },
    FormUrlEncoded,
    Binary,
    /// Fields in `file_fields` hold a URL whose content is streamed as a file part
    FormData { file_fields: FxHashSet<String> },
}

impl BodyConfig {
    pub fn kind(&self) -> &'static str {
        match self {
            BodyConfig::Empty => "EMPTY",
            BodyConfig::Json { .. } => "JSON",
            BodyConfig::RawText { .. } => "RAW_TEXT",
            BodyConfig::FormUrlEncoded => "FORM_URLENCODED",
            BodyConfig::Binary => "BINARY",
            BodyConfig::FormData { .. } => "FORM_DATA",
        }
    }
}

/// Where a custom credential goes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthLocation {
    Header,
    Query,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthConfig {
    /// `Authorization: Bearer <token>`
    Bearer,
    /// One key/value pair in headers or query
    Custom { location: AuthLocation },
}

/// Typed HTTP requester configuration
#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub method: Method,
    pub url_template: String,
    pub body: BodyConfig,
    pub auth: Option<AuthConfig>,
    /// `None` falls back to the engine default
    pub timeout: Option<Duration>,
    /// `None` falls back to the engine default, 0 still makes one attempt
    pub retry_times: Option<u64>,
    /// Mirrors the node's exception policy; the runner applies it
    pub ignore_exception: bool,
    pub default_output: Option<Map<String, Value>>,
}

// ═══════════════════════════════════════════
// Raw config shapes
// ═══════════════════════════════════════════

#[derive(Deserialize)]
struct RawUrlConfig {
    tpl: String,
}

#[derive(Deserialize)]
struct RawTemplate {
    tpl: String,
}

#[derive(Deserialize, Default)]
struct RawFormData {
    #[serde(default)]
    file_type_mapping: std::collections::HashMap<String, bool>,
}

#[derive(Deserialize)]
struct RawBodyConfig {
    body_type: String,
    #[serde(default)]
    form_data_config: Option<RawFormData>,
    #[serde(default)]
    text_plain_config: Option<RawTemplate>,
    #[serde(default, alias = "TextJsonConfig")]
    text_json_config: Option<RawTemplate>,
}

#[derive(Deserialize)]
struct RawAuthConfig {
    #[serde(rename = "type")]
    auth_type: u8,
    #[serde(default)]
    location: u8,
}

impl HttpConfig {
    /// Decode from a node's raw configs
    pub fn from_schema(schema: &NodeSchema) -> Result<Self> {
        let node = schema.key.as_str();

        let method: String = schema.must_get_key(CONFIG_METHOD)?;
        let method = parse_method(node, &method)?;

        let url: RawUrlConfig = schema.must_get_key(CONFIG_URL)?;

        let body = match schema.configs.get(CONFIG_BODY) {
            None | Some(Value::Null) => BodyConfig::Empty,
            Some(_) => decode_body(node, schema.must_get_key(CONFIG_BODY)?)?,
        };

        let auth = match schema.configs.get(CONFIG_AUTH) {
            None | Some(Value::Null) => None,
            Some(_) => decode_auth(node, schema.must_get_key(CONFIG_AUTH)?),
        };

        let timeout = match schema.configs.get(CONFIG_TIMEOUT) {
            None | Some(Value::Null) => None,
            Some(_) => match schema.must_get_key::<u64>(CONFIG_TIMEOUT)? {
                0 => None,
                secs => Some(Duration::from_secs(secs)),
            },
        };

        let retry_times = match schema.configs.get(CONFIG_RETRY_TIMES) {
            None | Some(Value::Null) => None,
            Some(_) => Some(schema.must_get_key::<u64>(CONFIG_RETRY_TIMES)?),
        };

        Ok(Self {
            method,
            url_template: url.tpl,
            body,
            auth,
            timeout,
            retry_times,
            ignore_exception: schema.exception_policy.ignore_exception,
            default_output: schema.exception_policy.default_output.clone(),
        })
    }

    /// Templates whose `block_output_` placeholders become input bindings,
    /// with the input field each one renders against
    pub fn templates(&self) -> Vec<(&'static str, &str)> {
        let mut templates = vec![("URLVars", self.url_template.as_str())];
        match &self.body {
            BodyConfig::Json { template } => templates.push(("JsonVars", template.as_str())),
            BodyConfig::RawText { template } => {
                templates.push(("TextPlainVars", template.as_str()))
            }
            BodyConfig::Empty
            | BodyConfig::FormUrlEncoded
            | BodyConfig::Binary
            | BodyConfig::FormData { .. } => {}
        }
        templates
    }
}

fn parse_method(node: &str, method: &str) -> Result<Method> {
    let invalid = |reason: &str| FlowError::InvalidConfig {
        node: node.to_string(),
        key: CONFIG_METHOD.to_string(),
        reason: reason.to_string(),
    };
    if method.trim().is_empty() {
        return Err(invalid("method is required"));
    }
    Method::from_bytes(method.trim().to_ascii_uppercase().as_bytes())
        .map_err(|_| invalid("not a valid HTTP method"))
}

fn decode_body(node: &str, raw: RawBodyConfig) -> Result<BodyConfig> {
    let missing = |key: &str| FlowError::MissingConfig {
        node: node.to_string(),
        key: format!("{CONFIG_BODY}.{key}"),
    };

    match raw.body_type.as_str() {
        "EMPTY" => Ok(BodyConfig::Empty),
        "JSON" => {
            let tpl = raw.text_json_config.ok_or_else(|| missing("text_json_config"))?;
            Ok(BodyConfig::Json { template: tpl.tpl })
        }
        "RAW_TEXT" => {
            let tpl = raw.text_plain_config.ok_or_else(|| missing("text_plain_config"))?;
            Ok(BodyConfig::RawText { template: tpl.tpl })
        }
        "FORM_URLENCODED" => Ok(BodyConfig::FormUrlEncoded),
        "BINARY" => Ok(BodyConfig::Binary),
        "FORM_DATA" => {
            let file_fields = raw
                .form_data_config
                .unwrap_or_default()
                .file_type_mapping
                .into_iter()
                .filter_map(|(field, is_file)| is_file.then_some(field))
                .collect();
            Ok(BodyConfig::FormData { file_fields })
        }
        other => Err(FlowError::UnknownBodyType {
            body_type: other.to_string(),
        }),
    }
}

/// Unrecognized auth kinds and locations are a no-op
fn decode_auth(node: &str, raw: RawAuthConfig) -> Option<AuthConfig> {
    match (raw.auth_type, raw.location) {
        (1, _) => Some(AuthConfig::Bearer),
        (2, 1) => Some(AuthConfig::Custom {
            location: AuthLocation::Header,
        }),
        (2, 2) => Some(AuthConfig::Custom {
            location: AuthLocation::Query,
        }),
        (auth_type, location) => {
            warn!(node, auth_type, location, "unrecognized auth config ignored");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{ExceptionPolicy, NodeKind};
    use serde_json::json;

    fn schema(configs: Value) -> NodeSchema {
        let mut node = NodeSchema::new("http_1", NodeKind::HttpRequester);
        let Value::Object(map) = configs else {
            panic!("configs must be an object")
        };
        node.configs = map;
        node
    }

    #[test]
    fn decodes_full_config() {
        let mut node = schema(json!({
            "Method": "post",
            "URLConfig": {"tpl": "http://host/{{v}}"},
            "BodyConfig": {"body_type": "JSON", "text_json_config": {"tpl": "{\"a\":{{a}}}"}},
            "AuthConfig": {"type": 2, "location": 2},
            "Timeout": 5,
            "RetryTimes": 3
        }));
        node.exception_policy = ExceptionPolicy::ignoring(Map::new());

        let config = HttpConfig::from_schema(&node).unwrap();
        assert_eq!(config.method, Method::POST);
        assert_eq!(config.url_template, "http://host/{{v}}");
        assert_eq!(
            config.body,
            BodyConfig::Json {
                template: "{\"a\":{{a}}}".to_string()
            }
        );
        assert_eq!(
            config.auth,
            Some(AuthConfig::Custom {
                location: AuthLocation::Query
            })
        );
        assert_eq!(config.timeout, Some(Duration::from_secs(5)));
        assert_eq!(config.retry_times, Some(3));
        assert!(config.ignore_exception);
        assert_eq!(config.default_output, Some(Map::new()));
    }

    #[test]
    fn missing_method_or_url_is_config_error() {
        let err = HttpConfig::from_schema(&schema(json!({"URLConfig": {"tpl": "x"}}))).unwrap_err();
        assert_eq!(err.code(), "FLOW-001");

        let err = HttpConfig::from_schema(&schema(json!({"Method": "GET"}))).unwrap_err();
        assert_eq!(err.code(), "FLOW-001");

        let err = HttpConfig::from_schema(&schema(json!({"Method": "", "URLConfig": {"tpl": "x"}})))
            .unwrap_err();
        assert_eq!(err.code(), "FLOW-002");
    }

    #[test]
    fn unknown_body_type_is_rejected() {
        let err = HttpConfig::from_schema(&schema(json!({
            "Method": "GET",
            "URLConfig": {"tpl": "x"},
            "BodyConfig": {"body_type": "XML"}
        })))
        .unwrap_err();
        assert_eq!(err.code(), "FLOW-003");
    }

    #[test]
    fn json_body_without_template_is_missing_config() {
        let err = HttpConfig::from_schema(&schema(json!({
            "Method": "GET",
            "URLConfig": {"tpl": "x"},
            "BodyConfig": {"body_type": "JSON"}
        })))
        .unwrap_err();
        assert!(matches!(err, FlowError::MissingConfig { ref key, .. } if key == "BodyConfig.text_json_config"));
    }

    #[test]
    fn form_data_keeps_only_file_fields() {
        let config = HttpConfig::from_schema(&schema(json!({
            "Method": "POST",
            "URLConfig": {"tpl": "x"},
            "BodyConfig": {
                "body_type": "FORM_DATA",
                "form_data_config": {"file_type_mapping": {"avatar": true, "name": false}}
            }
        })))
        .unwrap();
        let BodyConfig::FormData { file_fields } = config.body else {
            panic!("expected form data")
        };
        assert!(file_fields.contains("avatar"));
        assert!(!file_fields.contains("name"));
    }

    #[test]
    fn unknown_auth_kind_is_a_no_op() {
        let config = HttpConfig::from_schema(&schema(json!({
            "Method": "GET",
            "URLConfig": {"tpl": "x"},
            "AuthConfig": {"type": 9}
        })))
        .unwrap();
        assert!(config.auth.is_none());
        assert_eq!(config.body, BodyConfig::Empty);
        assert_eq!(config.timeout, None);
        assert_eq!(config.retry_times, None);
    }

    #[test]
    fn templates_follow_body_kind() {
        let config = HttpConfig::from_schema(&schema(json!({
            "Method": "POST",
            "URLConfig": {"tpl": "u"},
            "BodyConfig": {"body_type": "RAW_TEXT", "text_plain_config": {"tpl": "t"}}
        })))
        .unwrap();
        assert_eq!(config.templates(), vec![("URLVars", "u"), ("TextPlainVars", "t")]);
    }
}
