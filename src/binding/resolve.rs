//! Runtime binding resolution
//!
//! Turns a node's declared input bindings into its nested input map by
//! reading literals or upstream outputs from the `DataStore`.

use serde_json::{Map, Value};
use tracing::debug;

use crate::ast::{FieldPath, FieldSource, NodeSchema};
use crate::error::{FlowError, Result};
use crate::store::DataStore;

/// Build the input map for `schema` from its bindings
///
/// A reference to a node that has no output yet is `UpstreamNotReady`.
/// A reference whose path is absent from an existing output leaves the
/// target field unset.
pub fn resolve_inputs(schema: &NodeSchema, store: &DataStore) -> Result<Map<String, Value>> {
    let mut input = Map::new();

    for field in &schema.inputs {
        let value = match &field.source {
            FieldSource::Val(v) => v.clone(),
            FieldSource::Ref(r) => match store.resolve(&r.from_node, &r.from_path) {
                Some(Some(v)) => v,
                Some(None) => {
                    debug!(node = %schema.key, from = %r.joined(), "upstream path absent, field left unset");
                    continue;
                }
                None => {
                    return Err(FlowError::UpstreamNotReady {
                        node: schema.key.clone(),
                        from_node: r.from_node.clone(),
                    })
                }
            },
        };

        set_map_value(&mut input, &field.path, value)?;
    }

    Ok(input)
}

/// Value at `path` in a nested map
pub fn take_map_value<'m>(map: &'m Map<String, Value>, path: &[&str]) -> Option<&'m Value> {
    let (first, rest) = path.split_first()?;
    let mut current = map.get(*first)?;
    for segment in rest {
        current = current.as_object()?.get(*segment)?;
    }
    Some(current)
}

/// Write `value` at `path`, creating intermediate objects
///
/// Fails when an intermediate segment already holds a non-object value.
pub fn set_map_value(map: &mut Map<String, Value>, path: &FieldPath, value: Value) -> Result<()> {
    let segments = path.segments();
    let (last, parents) = segments
        .split_last()
        .ok_or_else(|| FlowError::InvalidFieldPath {
            path: path.joined(),
            reason: "empty path".to_string(),
        })?;

    let mut current = map;
    for segment in parents {
        let slot = current
            .entry(segment.clone())
            .or_insert_with(|| Value::Object(Map::new()));
        current = slot.as_object_mut().ok_or_else(|| FlowError::InvalidFieldPath {
            path: path.joined(),
            reason: format!("'{segment}' is not an object"),
        })?;
    }

    current.insert(last.clone(), value);
    Ok(())
}
