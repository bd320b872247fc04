//! Field bindings (FieldInfo)
//!
//! A binding describes how one target field obtains its value: either a
//! literal, or a reference to an upstream node's output path.
//!
//! ```yaml
//! inputs:
//!   - path: [URLVars, id]
//!     source: { ref: { from_node: entry, from_path: [user_id] } }
//!   - path: [Headers, X-Trace]
//!     source: { val: "abc" }
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::FlowError;

/// Non-empty sequence of path segments
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct FieldPath(Vec<String>);

impl FieldPath {
    pub fn new<I, S>(segments: I) -> Result<Self, FlowError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let segments: Vec<String> = segments.into_iter().map(Into::into).collect();
        if segments.is_empty() {
            return Err(FlowError::InvalidFieldPath {
                path: String::new(),
                reason: "field path must not be empty".to_string(),
            });
        }
        Ok(Self(segments))
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    pub fn first(&self) -> &str {
        &self.0[0]
    }

    /// Dot-joined form, used as a deduplication key
    pub fn joined(&self) -> String {
        self.0.join(".")
    }

    /// New path with `prefix` prepended
    pub fn prefixed(&self, prefix: &str) -> Self {
        let mut segments = Vec::with_capacity(self.0.len() + 1);
        segments.push(prefix.to_string());
        segments.extend(self.0.iter().cloned());
        Self(segments)
    }
}

impl TryFrom<Vec<String>> for FieldPath {
    type Error = FlowError;

    fn try_from(segments: Vec<String>) -> Result<Self, Self::Error> {
        Self::new(segments)
    }
}

impl From<FieldPath> for Vec<String> {
    fn from(path: FieldPath) -> Self {
        path.0
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.joined())
    }
}

/// Reference to an upstream node's output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reference {
    pub from_node: String,
    #[serde(default)]
    pub from_path: Vec<String>,
}

impl Reference {
    /// `node.path.to.field`
    pub fn joined(&self) -> String {
        if self.from_path.is_empty() {
            self.from_node.clone()
        } else {
            format!("{}.{}", self.from_node, self.from_path.join("."))
        }
    }
}

/// Where a binding's value comes from. Exactly one of literal or reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldSource {
    Val(Value),
    Ref(Reference),
}

/// How one target field obtains its value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldInfo {
    pub path: FieldPath,
    pub source: FieldSource,
}

impl FieldInfo {
    pub fn literal(path: FieldPath, value: Value) -> Self {
        Self {
            path,
            source: FieldSource::Val(value),
        }
    }

    pub fn reference(path: FieldPath, from_node: impl Into<String>, from_path: Vec<String>) -> Self {
        Self {
            path,
            source: FieldSource::Ref(Reference {
                from_node: from_node.into(),
                from_path,
            }),
        }
    }

    pub fn as_reference(&self) -> Option<&Reference> {
        match &self.source {
            FieldSource::Ref(r) => Some(r),
            FieldSource::Val(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_path_is_rejected() {
        assert!(FieldPath::new(Vec::<String>::new()).is_err());
        let parsed: Result<FieldPath, _> = serde_json::from_value(json!([]));
        assert!(parsed.is_err());
    }

    #[test]
    fn source_is_exactly_one_variant() {
        let lit: FieldInfo = serde_json::from_value(json!({
            "path": ["a"],
            "source": {"val": 3}
        }))
        .unwrap();
        assert_eq!(lit.source, FieldSource::Val(json!(3)));

        let reference: FieldInfo = serde_json::from_value(json!({
            "path": ["a", "b"],
            "source": {"ref": {"from_node": "n1", "from_path": ["x"]}}
        }))
        .unwrap();
        assert_eq!(reference.as_reference().unwrap().joined(), "n1.x");

        let both: Result<FieldInfo, _> = serde_json::from_value(json!({
            "path": ["a"],
            "source": {"val": 1, "ref": {"from_node": "n1"}}
        }));
        assert!(both.is_err());

        let neither: Result<FieldInfo, _> = serde_json::from_value(json!({
            "path": ["a"],
            "source": {}
        }));
        assert!(neither.is_err());
    }

    #[test]
    fn prefixed_path() {
        let path = FieldPath::new(["block_output_n1", "id"]).unwrap();
        assert_eq!(path.prefixed("URLVars").joined(), "URLVars.block_output_n1.id");
    }
}
