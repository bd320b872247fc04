//! Declared value shapes (TypeInfo)
//!
//! A `TypeInfo` is the contract a run-time value must conform to. It is used
//! both for declared node inputs/outputs and as the coercion target of the
//! tabular nodes.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Primitive tag of a declared type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataType {
    String,
    #[serde(alias = "float")]
    Number,
    Integer,
    Boolean,
    Time,
    Array,
    Object,
}

impl DataType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataType::String => "string",
            DataType::Number => "number",
            DataType::Integer => "integer",
            DataType::Boolean => "boolean",
            DataType::Time => "time",
            DataType::Array => "array",
            DataType::Object => "object",
        }
    }

    /// Scalar types that coercion can target directly
    pub fn is_primitive(&self) -> bool {
        !matches!(self, DataType::Array | DataType::Object)
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Declared run-time shape of a value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeInfo {
    #[serde(rename = "type")]
    pub data_type: DataType,
    /// Element type, only meaningful for arrays
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elem_type_info: Option<Box<TypeInfo>>,
    /// Property types, only meaningful for objects
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, TypeInfo>,
}

impl TypeInfo {
    pub fn new(data_type: DataType) -> Self {
        Self {
            data_type,
            elem_type_info: None,
            properties: BTreeMap::new(),
        }
    }

    pub fn string() -> Self {
        Self::new(DataType::String)
    }

    pub fn number() -> Self {
        Self::new(DataType::Number)
    }

    pub fn integer() -> Self {
        Self::new(DataType::Integer)
    }

    pub fn boolean() -> Self {
        Self::new(DataType::Boolean)
    }

    pub fn time() -> Self {
        Self::new(DataType::Time)
    }

    pub fn array_of(elem: TypeInfo) -> Self {
        Self {
            data_type: DataType::Array,
            elem_type_info: Some(Box::new(elem)),
            properties: BTreeMap::new(),
        }
    }

    pub fn object_of<I, K>(properties: I) -> Self
    where
        I: IntoIterator<Item = (K, TypeInfo)>,
        K: Into<String>,
    {
        Self {
            data_type: DataType::Object,
            elem_type_info: None,
            properties: properties.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }

    /// Element type of an array, if declared
    pub fn elem(&self) -> Option<&TypeInfo> {
        self.elem_type_info.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_nested_object_list() {
        let ty: TypeInfo = serde_json::from_value(json!({
            "type": "array",
            "elem_type_info": {
                "type": "object",
                "properties": {
                    "id": {"type": "integer"},
                    "name": {"type": "string"}
                }
            }
        }))
        .unwrap();

        assert_eq!(ty.data_type, DataType::Array);
        let elem = ty.elem().unwrap();
        assert_eq!(elem.data_type, DataType::Object);
        assert_eq!(elem.properties["id"], TypeInfo::integer());
        assert_eq!(elem.properties["name"], TypeInfo::string());
    }

    #[test]
    fn float_alias_is_number() {
        let ty: TypeInfo = serde_json::from_value(json!({"type": "float"})).unwrap();
        assert_eq!(ty.data_type, DataType::Number);
    }

    #[test]
    fn builders_match_serde_shape() {
        let built = TypeInfo::array_of(TypeInfo::object_of([("id", TypeInfo::integer())]));
        let value = serde_json::to_value(&built).unwrap();
        assert_eq!(
            value,
            json!({
                "type": "array",
                "elem_type_info": {"type": "object", "properties": {"id": {"type": "integer"}}}
            })
        );
    }
}
