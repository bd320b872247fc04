//! NodeSchema - declarative representation of one graph node
//!
//! Holds the raw configuration map, declared input/output types and the
//! ordered input/output bindings. Typed per-kind configuration is decoded
//! from `configs` once by the graph compiler (see `dag::NodeConfig`).

use std::fmt;

use rustc_hash::FxHashMap;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{FlowError, Result};

use super::field::FieldInfo;
use super::types::TypeInfo;

/// Config key holding a sub-workflow's id
pub const CONFIG_WORKFLOW_ID: &str = "WorkflowID";
/// Config key holding a sub-workflow's version
pub const CONFIG_WORKFLOW_VERSION: &str = "WorkflowVersion";

/// Node kind tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Entry,
    Exit,
    SubWorkflow,
    #[serde(alias = "http")]
    HttpRequester,
    DatabaseQuery,
    DatabaseInsert,
    DatabaseUpdate,
    DatabaseDelete,
}

impl NodeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Entry => "entry",
            NodeKind::Exit => "exit",
            NodeKind::SubWorkflow => "sub_workflow",
            NodeKind::HttpRequester => "http_requester",
            NodeKind::DatabaseQuery => "database_query",
            NodeKind::DatabaseInsert => "database_insert",
            NodeKind::DatabaseUpdate => "database_update",
            NodeKind::DatabaseDelete => "database_delete",
        }
    }

    pub fn is_database(&self) -> bool {
        matches!(
            self,
            NodeKind::DatabaseQuery
                | NodeKind::DatabaseInsert
                | NodeKind::DatabaseUpdate
                | NodeKind::DatabaseDelete
        )
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// "Ignore exception, use default output" policy
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExceptionPolicy {
    #[serde(default)]
    pub ignore_exception: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_output: Option<Map<String, Value>>,
}

impl ExceptionPolicy {
    pub fn ignoring(default_output: Map<String, Value>) -> Self {
        Self {
            ignore_exception: true,
            default_output: Some(default_output),
        }
    }
}

/// One node of a workflow graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeSchema {
    pub key: String,
    #[serde(rename = "type")]
    pub kind: NodeKind,
    #[serde(default)]
    pub configs: Map<String, Value>,
    #[serde(default)]
    pub input_types: FxHashMap<String, TypeInfo>,
    #[serde(default)]
    pub output_types: FxHashMap<String, TypeInfo>,
    #[serde(default)]
    pub inputs: Vec<FieldInfo>,
    #[serde(default)]
    pub outputs: Vec<FieldInfo>,
    #[serde(default)]
    pub exception_policy: ExceptionPolicy,
}

impl NodeSchema {
    pub fn new(key: impl Into<String>, kind: NodeKind) -> Self {
        Self {
            key: key.into(),
            kind,
            configs: Map::new(),
            input_types: FxHashMap::default(),
            output_types: FxHashMap::default(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            exception_policy: ExceptionPolicy::default(),
        }
    }

    pub fn set_config_kv(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.configs.insert(key.into(), value.into());
    }

    pub fn set_input_type(&mut self, field: impl Into<String>, ty: TypeInfo) {
        self.input_types.insert(field.into(), ty);
    }

    pub fn add_input_source<I>(&mut self, sources: I)
    where
        I: IntoIterator<Item = FieldInfo>,
    {
        self.inputs.extend(sources);
    }

    pub fn set_output_type(&mut self, field: impl Into<String>, ty: TypeInfo) {
        self.output_types.insert(field.into(), ty);
    }

    pub fn add_output_source<I>(&mut self, sources: I)
    where
        I: IntoIterator<Item = FieldInfo>,
    {
        self.outputs.extend(sources);
    }

    /// Typed config value, or the type's default when absent or null.
    /// A present value of the wrong type is a configuration error.
    pub fn get_key_or_default<T>(&self, key: &str) -> Result<T>
    where
        T: DeserializeOwned + Default,
    {
        match self.configs.get(key) {
            None | Some(Value::Null) => Ok(T::default()),
            Some(_) => self.must_get_key(key),
        }
    }

    /// Typed config value; absence or a type mismatch is a configuration error
    pub fn must_get_key<T>(&self, key: &str) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let value = self.configs.get(key).ok_or_else(|| FlowError::MissingConfig {
            node: self.key.clone(),
            key: key.to_string(),
        })?;

        serde_json::from_value(value.clone()).map_err(|e| FlowError::InvalidConfig {
            node: self.key.clone(),
            key: key.to_string(),
            reason: e.to_string(),
        })
    }

    /// `(workflow_id, version)` for sub-workflow nodes, `None` for every other kind
    pub fn sub_workflow_identity(&self) -> Result<Option<(i64, String)>> {
        if self.kind != NodeKind::SubWorkflow {
            return Ok(None);
        }

        let id: i64 = self.must_get_key(CONFIG_WORKFLOW_ID)?;
        let version: String = self.get_key_or_default(CONFIG_WORKFLOW_VERSION)?;
        Ok(Some((id, version)))
    }
}
