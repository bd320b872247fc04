//! Binding deduplication
//!
//! Key: (target segments, source node, source segments), compared unjoined.
//! Literal bindings are always kept.

use rustc_hash::FxHashSet;

use crate::ast::{FieldInfo, FieldSource};

/// Drop reference bindings whose (target path, source node, source path)
/// was already seen. Order is preserved and the operation is idempotent.
pub fn deduplicate_input_fields(inputs: Vec<FieldInfo>) -> Vec<FieldInfo> {
    let mut seen: FxHashSet<(Vec<String>, String, Vec<String>)> = FxHashSet::default();
    let mut deduped = Vec::with_capacity(inputs.len());

    for field in inputs {
        let key = match &field.source {
            FieldSource::Val(_) => {
                deduped.push(field);
                continue;
            }
            FieldSource::Ref(r) => (
                field.path.segments().to_vec(),
                r.from_node.clone(),
                r.from_path.clone(),
            ),
        };

        if seen.insert(key) {
            deduped.push(field);
        }
    }

    deduped
}
