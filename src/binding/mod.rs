//! Binding Module - Field Resolution Engine
//!
//! How a node obtains its inputs:
//! - `template`: `{{block_output_<node>.<field>}}` extraction, `{{var}}` rendering
//! - `dedup`: Binding deduplication
//! - `resolve`: Runtime resolution against the `DataStore`
//!
//! Data flow:
//! ```text
//! Node templates ──extract──→ Vec<FieldInfo>
//!                                  ↓ dedup (compile time)
//!                          NodeSchema.inputs
//!                                  ↓ resolve (run time)
//!                           Node input map
//!                                  ↓ render
//!                      URL / JSON body / text body
//! ```

mod dedup;
mod resolve;
mod template;

pub use dedup::deduplicate_input_fields;
pub use resolve::{resolve_inputs, set_map_value, take_map_value};
pub use template::{
    extract_input_fields_from_template, render, value_to_string, BLOCK_OUTPUT_PREFIX,
};
