//! Template placeholders - extraction and rendering
//!
//! Two syntaxes share the `{{...}}` delimiters:
//! - `{{block_output_<node>.<field>}}` references an upstream node's output
//!   and is turned into a binding at compile time
//! - `{{name}}` / `{{a.b}}` is rendered at run time against a variables object
//!
//! Rendering is raw: values are substituted without any escaping, so a JSON
//! body template must quote string placeholders itself.

use std::borrow::Cow;

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use smallvec::SmallVec;
use tracing::debug;

use crate::ast::{FieldInfo, FieldPath};
use crate::error::{FlowError, Result};

/// Prefix marking a reference to an upstream node's output
pub const BLOCK_OUTPUT_PREFIX: &str = "block_output_";

/// Every `{{...}}` occurrence, non-greedy up to the first closing brace
static PLACEHOLDER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{\{([^}]+)\}\}").expect("placeholder regex is valid"));

/// Renderable variable path: `{{ name }}` or `{{ a.b.0 }}`
static RENDER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{\{\s*([\w.]+)\s*\}\}").expect("render regex is valid"));

/// Extract `block_output_` references from a template as bindings
///
/// Each `{{block_output_<node>.<sub>[.<deeper>...]}}` yields one binding with
/// path `["block_output_<node>", "<sub>"]` referencing `<node>` at `[<sub>]`.
/// Only the first sub-segment is kept. Placeholders that don't start with the
/// prefix are ignored. A prefixed placeholder without a node key or a
/// sub-segment fails the whole extraction.
pub fn extract_input_fields_from_template(template: &str) -> Result<Vec<FieldInfo>> {
    let mut fields = Vec::new();

    for cap in PLACEHOLDER_RE.captures_iter(template) {
        let inner = cap[1].trim();
        let Some(rest) = inner.strip_prefix(BLOCK_OUTPUT_PREFIX) else {
            continue;
        };

        let parts: SmallVec<[&str; 4]> = rest.split('.').collect();
        let malformed = || FlowError::InvalidPlaceholder {
            placeholder: inner.to_string(),
        };

        if parts.len() < 2 {
            return Err(malformed());
        }
        let (node_key, sub) = (parts[0], parts[1]);
        if node_key.is_empty() || sub.is_empty() {
            return Err(malformed());
        }

        let path = FieldPath::new([format!("{BLOCK_OUTPUT_PREFIX}{node_key}"), sub.to_string()])?;
        fields.push(FieldInfo::reference(path, node_key, vec![sub.to_string()]));
    }

    debug!(count = fields.len(), "extracted template bindings");
    Ok(fields)
}

/// Render `{{var}}` placeholders against `vars`
///
/// Strings render raw, numbers and booleans via display, objects and arrays
/// as compact JSON, missing or null values as the empty string.
/// Returns `Cow::Borrowed` when the template has no placeholders.
pub fn render<'a>(template: &'a str, vars: &Value) -> Cow<'a, str> {
    if !template.contains("{{") {
        return Cow::Borrowed(template);
    }

    RENDER_RE.replace_all(template, |cap: &regex::Captures<'_>| {
        lookup(vars, &cap[1]).map(value_to_string).unwrap_or_default()
    })
}

/// Walk a dot path into `vars`, numeric segments index arrays
fn lookup<'v>(vars: &'v Value, path: &str) -> Option<&'v Value> {
    let mut current = vars;
    for segment in path.split('.') {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Stringify a value for substitution
pub fn value_to_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Array(_) | Value::Object(_) => value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::FieldSource;
    use serde_json::json;

    #[test]
    fn extracts_block_output_references() {
        let fields =
            extract_input_fields_from_template("{{block_output_n1.a}} and {{block_output_n2.b}}")
                .unwrap();

        assert_eq!(fields.len(), 2);
        assert_eq!(fields[0].path.segments(), ["block_output_n1", "a"]);
        let r = fields[0].as_reference().unwrap();
        assert_eq!(r.from_node, "n1");
        assert_eq!(r.from_path, vec!["a".to_string()]);
        assert_eq!(fields[1].as_reference().unwrap().from_node, "n2");
    }

    #[test]
    fn ignores_non_block_output_placeholders() {
        let fields = extract_input_fields_from_template("{{user}} {{ x.y }} {{block_output_n.v}}")
            .unwrap();
        assert_eq!(fields.len(), 1);
    }

    #[test]
    fn nested_reference_is_truncated_to_one_level() {
        let fields = extract_input_fields_from_template("{{block_output_n1.a.b.c}}").unwrap();
        assert_eq!(fields.len(), 1);
        assert_eq!(fields[0].path.segments(), ["block_output_n1", "a"]);
        assert_eq!(
            fields[0].source,
            FieldSource::Ref(crate::ast::Reference {
                from_node: "n1".to_string(),
                from_path: vec!["a".to_string()],
            })
        );
    }

    #[test]
    fn missing_sub_path_fails_whole_extraction() {
        let err = extract_input_fields_from_template("{{block_output_n1.a}} {{block_output_n2}}")
            .unwrap_err();
        assert_eq!(err.code(), "FLOW-060");

        assert!(extract_input_fields_from_template("{{block_output_.a}}").is_err());
        assert!(extract_input_fields_from_template("{{block_output_n1.}}").is_err());
    }

    #[test]
    fn whitespace_inside_braces_is_trimmed() {
        let fields = extract_input_fields_from_template("{{ block_output_n1.a }}").unwrap();
        assert_eq!(fields[0].as_reference().unwrap().from_node, "n1");
    }

    #[test]
    fn render_without_placeholders_borrows() {
        let out = render("http://example.com/users", &json!({}));
        assert!(matches!(out, Cow::Borrowed(_)));
    }

    #[test]
    fn render_substitutes_raw_values() {
        let vars = json!({"v1": "x", "v2": 2, "obj": {"a": [1, 2]}, "flag": true, "nothing": null});
        assert_eq!(render(r#"{"v1":{{v1}},"v2":{{v2}}}"#, &vars), r#"{"v1":x,"v2":2}"#);
        assert_eq!(render("{{ obj.a }}|{{obj.a.1}}", &vars), "[1,2]|2");
        assert_eq!(render("{{flag}}-{{nothing}}-{{missing}}", &vars), "true--");
    }

    #[test]
    fn render_url_template() {
        let url = render("http://host/{{v}}?q={{ q }}", &json!({"v": "x", "q": 1}));
        assert_eq!(url, "http://host/x?q=1");
    }
}
