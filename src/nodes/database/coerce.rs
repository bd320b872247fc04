//! Coercion of database values into declared output types
//!
//! Scalar rules are loosely typed:
//! - null becomes `""`, `0` or `false`
//! - booleans become `1` / `0` and numbers become `true` when non-zero
//! - numeric strings parse, integers accept a trailing `.0` and a
//!   `0x` / `0o` / `0b` prefix (a bare leading `0` means octal)
//! - booleans parse `1 t T TRUE true True 0 f F FALSE false False`

use std::collections::BTreeMap;

use rustc_hash::FxHashMap;
use serde_json::{Map, Number, Value};
use tracing::warn;

use crate::ast::{DataType, TypeInfo};
use crate::error::{FlowError, Result};

use super::operator::Response;

/// Output key holding the formatted row list
pub const OUTPUT_LIST: &str = "outputList";
/// Output key holding the affected/returned row count
pub const ROW_NUM: &str = "rowNum";

/// Coerce `value` to the declared type
///
/// Arrays are decoded from a JSON string (or taken as-is when already an
/// array) and coerced element-wise. Object types and arrays of non-primitive
/// elements are not supported.
pub fn formatted(value: &Value, ty: &TypeInfo) -> Result<Value> {
    match ty.data_type {
        DataType::String | DataType::Time => to_string_strict(value).map(Value::String),
        DataType::Number => to_number(value),
        DataType::Integer => to_i64(value).map(Value::from),
        DataType::Boolean => to_bool(value).map(Value::Bool),
        DataType::Array => formatted_array(value, ty),
        DataType::Object => Err(FlowError::UnsupportedType {
            data_type: DataType::Object.to_string(),
        }),
    }
}

fn formatted_array(value: &Value, ty: &TypeInfo) -> Result<Value> {
    let elem = ty.elem().ok_or_else(|| FlowError::UnsupportedType {
        data_type: "array without element type".to_string(),
    })?;
    if !elem.data_type.is_primitive() {
        return Err(FlowError::UnsupportedType {
            data_type: format!("array<{}>", elem.data_type),
        });
    }

    let decoded;
    let items = match value {
        Value::Array(items) => items,
        Value::String(text) => {
            decoded = serde_json::from_str::<Vec<Value>>(text)
                .map_err(|_| coercion_error(value, DataType::Array))?;
            &decoded
        }
        other => return Err(coercion_error(other, DataType::Array)),
    };

    items
        .iter()
        .map(|item| match elem.data_type {
            DataType::String | DataType::Time => Ok(Value::String(to_string_lenient(item))),
            DataType::Number => to_number(item),
            DataType::Integer => to_i64(item).map(Value::from),
            DataType::Boolean => to_bool(item).map(Value::Bool),
            DataType::Array | DataType::Object => Err(FlowError::UnsupportedType {
                data_type: format!("array<{}>", elem.data_type),
            }),
        })
        .collect::<Result<Vec<_>>>()
        .map(Value::Array)
}

/// Coerce one row against declared properties
///
/// With no properties every value is stringified. Otherwise each declared
/// property is coerced when present and non-null, else set to null;
/// undeclared columns are dropped.
pub fn object_formatted(
    props: &BTreeMap<String, TypeInfo>,
    object: &Map<String, Value>,
) -> Result<Map<String, Value>> {
    if props.is_empty() {
        return Ok(object
            .iter()
            .map(|(k, v)| (k.clone(), Value::String(to_string_lenient(v))))
            .collect());
    }

    props
        .iter()
        .map(|(k, ty)| {
            let value = match object.get(k) {
                Some(v) if !v.is_null() => formatted(v, ty)?,
                _ => Value::Null,
            };
            Ok((k.clone(), value))
        })
        .collect()
}

/// Shape an operator response into the node output
///
/// `outputList` must be declared as an array of objects. A row failing
/// coercion nulls the whole list; `rowNum` is always carried over.
pub fn response_formatted(
    output_types: &FxHashMap<String, TypeInfo>,
    response: &Response,
) -> Result<Map<String, Value>> {
    let props = output_list_properties(output_types)?;

    let list = response
        .objects
        .iter()
        .map(|row| object_formatted(props, row).map(Value::Object))
        .collect::<Result<Vec<_>>>();

    let mut out = Map::new();
    out.insert(
        OUTPUT_LIST.to_string(),
        match list {
            Ok(rows) => Value::Array(rows),
            Err(e) => {
                warn!(error = %e, "row coercion failed, outputList set to null");
                Value::Null
            }
        },
    );
    out.insert(
        ROW_NUM.to_string(),
        response.row_number.map_or(Value::Null, Value::from),
    );
    Ok(out)
}

/// Element properties of the declared `outputList`
pub fn output_list_properties(
    output_types: &FxHashMap<String, TypeInfo>,
) -> Result<&BTreeMap<String, TypeInfo>> {
    let contract = |reason: String| FlowError::SchemaContract { reason };

    let list = output_types
        .get(OUTPUT_LIST)
        .ok_or_else(|| contract(format!("{OUTPUT_LIST} key is required")))?;
    if list.data_type != DataType::Array {
        return Err(contract(format!(
            "{OUTPUT_LIST} must be an array, got {}",
            list.data_type
        )));
    }
    let elem = list
        .elem()
        .ok_or_else(|| contract(format!("{OUTPUT_LIST} must declare its element type")))?;
    if elem.data_type != DataType::Object {
        return Err(contract(format!(
            "{OUTPUT_LIST} elements must be objects, got {}",
            elem.data_type
        )));
    }
    Ok(&elem.properties)
}

// ═══════════════════════════════════════════
// Scalar casts
// ═══════════════════════════════════════════

fn coercion_error(value: &Value, target: DataType) -> FlowError {
    FlowError::Coercion {
        value: value.to_string(),
        target: target.to_string(),
    }
}

fn number_to_string(n: &Number) -> String {
    match (n.as_i64(), n.as_u64(), n.as_f64()) {
        (Some(i), _, _) => i.to_string(),
        (_, Some(u), _) => u.to_string(),
        (_, _, Some(f)) => f.to_string(),
        _ => n.to_string(),
    }
}

/// Scalars only; arrays and objects do not stringify
fn to_string_strict(value: &Value) -> Result<String> {
    match value {
        Value::Null => Ok(String::new()),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Number(n) => Ok(number_to_string(n)),
        Value::String(s) => Ok(s.clone()),
        Value::Array(_) | Value::Object(_) => Err(coercion_error(value, DataType::String)),
    }
}

/// Never fails; arrays and objects become compact JSON
fn to_string_lenient(value: &Value) -> String {
    to_string_strict(value).unwrap_or_else(|_| value.to_string())
}

fn to_f64(value: &Value) -> Result<f64> {
    match value {
        Value::Null => Ok(0.0),
        Value::Bool(b) => Ok(if *b { 1.0 } else { 0.0 }),
        Value::Number(n) => n.as_f64().ok_or_else(|| coercion_error(value, DataType::Number)),
        Value::String(s) => s
            .parse::<f64>()
            .map_err(|_| coercion_error(value, DataType::Number)),
        Value::Array(_) | Value::Object(_) => Err(coercion_error(value, DataType::Number)),
    }
}

fn to_number(value: &Value) -> Result<Value> {
    let f = to_f64(value)?;
    Number::from_f64(f)
        .map(Value::Number)
        .ok_or_else(|| coercion_error(value, DataType::Number))
}

fn to_i64(value: &Value) -> Result<i64> {
    let err = || coercion_error(value, DataType::Integer);
    match value {
        Value::Null => Ok(0),
        Value::Bool(b) => Ok(i64::from(*b)),
        Value::Number(n) => match (n.as_i64(), n.as_f64()) {
            (Some(i), _) => Ok(i),
            (None, Some(f)) if n.is_f64() && f.is_finite() => Ok(f.trunc() as i64),
            _ => Err(err()),
        },
        Value::String(s) => parse_int(trim_zero_decimal(s)).ok_or_else(err),
        Value::Array(_) | Value::Object(_) => Err(err()),
    }
}

fn to_bool(value: &Value) -> Result<bool> {
    match value {
        Value::Null => Ok(false),
        Value::Bool(b) => Ok(*b),
        Value::Number(n) => Ok(n.as_f64().is_some_and(|f| f != 0.0)),
        Value::String(s) => match s.as_str() {
            "1" | "t" | "T" | "TRUE" | "true" | "True" => Ok(true),
            "0" | "f" | "F" | "FALSE" | "false" | "False" => Ok(false),
            _ => Err(coercion_error(value, DataType::Boolean)),
        },
        Value::Array(_) | Value::Object(_) => Err(coercion_error(value, DataType::Boolean)),
    }
}

/// `"12.00"` -> `"12"`; anything else is returned unchanged
fn trim_zero_decimal(s: &str) -> &str {
    let trimmed = s.trim_end_matches('0');
    match trimmed.strip_suffix('.') {
        Some(int_part) if trimmed.len() < s.len() => int_part,
        _ => s,
    }
}

/// Signed integer with an optional base prefix
fn parse_int(s: &str) -> Option<i64> {
    let (negative, digits) = match s.as_bytes().first()? {
        b'-' => (true, &s[1..]),
        b'+' => (false, &s[1..]),
        _ => (false, s),
    };

    let lower = digits.to_ascii_lowercase();
    let (radix, body) = if let Some(rest) = lower.strip_prefix("0x") {
        (16, rest)
    } else if let Some(rest) = lower.strip_prefix("0o") {
        (8, rest)
    } else if let Some(rest) = lower.strip_prefix("0b") {
        (2, rest)
    } else if lower.len() > 1 && lower.starts_with('0') {
        (8, &lower[1..])
    } else {
        (10, lower.as_str())
    };

    if body.is_empty() || body.starts_with(['+', '-']) {
        return None;
    }
    let magnitude = i128::from_str_radix(body, radix).ok()?;
    let signed = if negative { -magnitude } else { magnitude };
    i64::try_from(signed).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn int() -> TypeInfo {
        TypeInfo::integer()
    }

    #[test]
    fn scalars_follow_loose_rules() {
        assert_eq!(formatted(&json!(null), &TypeInfo::string()).unwrap(), json!(""));
        assert_eq!(formatted(&json!(1.5), &TypeInfo::string()).unwrap(), json!("1.5"));
        assert_eq!(formatted(&json!(true), &int()).unwrap(), json!(1));
        assert_eq!(formatted(&json!("12.00"), &int()).unwrap(), json!(12));
        assert_eq!(formatted(&json!("0x1f"), &int()).unwrap(), json!(31));
        assert_eq!(formatted(&json!("-0b101"), &int()).unwrap(), json!(-5));
        assert_eq!(formatted(&json!("010"), &int()).unwrap(), json!(8));
        assert_eq!(formatted(&json!(7.9), &int()).unwrap(), json!(7));
        assert_eq!(formatted(&json!("2.5"), &TypeInfo::number()).unwrap(), json!(2.5));
        assert_eq!(formatted(&json!(null), &TypeInfo::number()).unwrap(), json!(0.0));
        assert_eq!(formatted(&json!("T"), &TypeInfo::boolean()).unwrap(), json!(true));
        assert_eq!(formatted(&json!(0), &TypeInfo::boolean()).unwrap(), json!(false));
        assert_eq!(
            formatted(&json!("2024-01-02 03:04:05"), &TypeInfo::time()).unwrap(),
            json!("2024-01-02 03:04:05")
        );
    }

    #[test]
    fn bad_scalars_are_coercion_errors() {
        assert_eq!(formatted(&json!("12."), &int()).unwrap_err().code(), "FLOW-020");
        assert_eq!(formatted(&json!("1a"), &int()).unwrap_err().code(), "FLOW-020");
        assert_eq!(formatted(&json!("yes"), &TypeInfo::boolean()).unwrap_err().code(), "FLOW-020");
        assert_eq!(formatted(&json!([1]), &TypeInfo::string()).unwrap_err().code(), "FLOW-020");
        assert_eq!(formatted(&json!("NaN"), &TypeInfo::number()).unwrap_err().code(), "FLOW-020");
    }

    #[test]
    fn arrays_decode_from_string_or_value() {
        let ints = TypeInfo::array_of(int());
        assert_eq!(formatted(&json!("[1, \"2\", true]"), &ints).unwrap(), json!([1, 2, 1]));
        assert_eq!(formatted(&json!([1, 2]), &ints).unwrap(), json!([1, 2]));

        let strings = TypeInfo::array_of(TypeInfo::string());
        assert_eq!(
            formatted(&json!("[1, null, {\"a\":1}]"), &strings).unwrap(),
            json!(["1", "", "{\"a\":1}"])
        );

        let bools = TypeInfo::array_of(TypeInfo::boolean());
        assert_eq!(formatted(&json!("[\"maybe\"]"), &bools).unwrap_err().code(), "FLOW-020");
        assert_eq!(formatted(&json!("not json"), &ints).unwrap_err().code(), "FLOW-020");
    }

    #[test]
    fn unsupported_types_are_rejected() {
        let object = TypeInfo::object_of([("a", TypeInfo::string())]);
        assert_eq!(formatted(&json!({"a": 1}), &object).unwrap_err().code(), "FLOW-021");

        let nested = TypeInfo::array_of(TypeInfo::array_of(int()));
        assert_eq!(formatted(&json!("[[1]]"), &nested).unwrap_err().code(), "FLOW-021");

        let objects = TypeInfo::array_of(object);
        assert_eq!(formatted(&json!("[]"), &objects).unwrap_err().code(), "FLOW-021");
    }

    #[test]
    fn object_without_props_stringifies_everything() {
        let row = json!({"id": 1, "name": "a", "gone": null});
        let out = object_formatted(&BTreeMap::new(), row.as_object().unwrap()).unwrap();
        assert_eq!(Value::Object(out), json!({"id": "1", "name": "a", "gone": ""}));
    }

    #[test]
    fn object_with_props_nulls_missing_fields() {
        let props: BTreeMap<_, _> = [("id".to_string(), int()), ("name".to_string(), TypeInfo::string())]
            .into_iter()
            .collect();
        let row = json!({"id": "3", "extra": true});
        let out = object_formatted(&props, row.as_object().unwrap()).unwrap();
        assert_eq!(Value::Object(out), json!({"id": 3, "name": null}));
    }

    fn output_types() -> FxHashMap<String, TypeInfo> {
        let mut types = FxHashMap::default();
        types.insert(
            OUTPUT_LIST.to_string(),
            TypeInfo::array_of(TypeInfo::object_of([("id", int())])),
        );
        types.insert(ROW_NUM.to_string(), int());
        types
    }

    fn rows(values: Value) -> Vec<Map<String, Value>> {
        serde_json::from_value(values).unwrap()
    }

    #[test]
    fn response_rows_are_formatted() {
        let response = Response {
            objects: rows(json!([{"id": "1"}, {"id": 2.0}])),
            row_number: Some(2),
        };
        let out = response_formatted(&output_types(), &response).unwrap();
        assert_eq!(Value::Object(out), json!({"outputList": [{"id": 1}, {"id": 2}], "rowNum": 2}));
    }

    #[test]
    fn failing_row_nulls_output_list_but_keeps_row_num() {
        let response = Response {
            objects: rows(json!([{"id": "1created at: None"}])),
            row_number: Some(1),
        };
        let out = response_formatted(&output_types(), &response).unwrap();
        assert_eq!(out[OUTPUT_LIST], Value::Null);
        assert_eq!(out[ROW_NUM], json!(1));
    }

    #[test]
    fn absent_row_number_is_null() {
        let response = Response::default();
        let out = response_formatted(&output_types(), &response).unwrap();
        assert_eq!(out[OUTPUT_LIST], json!([]));
        assert_eq!(out[ROW_NUM], Value::Null);
    }

    #[test]
    fn output_list_contract_is_enforced() {
        let response = Response::default();

        let err = response_formatted(&FxHashMap::default(), &response).unwrap_err();
        assert_eq!(err.code(), "FLOW-004");

        let mut types = FxHashMap::default();
        types.insert(OUTPUT_LIST.to_string(), TypeInfo::string());
        assert!(response_formatted(&types, &response).is_err());

        types.insert(OUTPUT_LIST.to_string(), TypeInfo::new(DataType::Array));
        assert!(response_formatted(&types, &response).is_err());

        types.insert(OUTPUT_LIST.to_string(), TypeInfo::array_of(int()));
        assert!(response_formatted(&types, &response).is_err());
    }
}
