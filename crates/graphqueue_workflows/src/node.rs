//! A tagged-variant tree used for workflow template nodes.
//!
//! The upstream graph-runner payload is a JSON object whose leaves can be
//! scalars, arrays (including `[node_id, output_index]` references), or
//! nested objects. We keep it as `serde_json::Value` for serialization but
//! route every mutation through the typed helpers below so the apply-phases
//! in `materializer.rs` stay exhaustive and don't reach into raw `Value`
//! matching at each call site.

use serde_json::Value;

/// One `{class_type, inputs}` node in a template prompt.
pub type Node = serde_json::Map<String, Value>;

/// The full template: node id -> node object.
pub type TemplatePrompt = serde_json::Map<String, Value>;

/// Borrow a node's `inputs` object, creating it if absent.
pub fn inputs_mut(node: &mut Value) -> Option<&mut serde_json::Map<String, Value>> {
    let obj = node.as_object_mut()?;
    if !obj.contains_key("inputs") {
        obj.insert("inputs".to_string(), Value::Object(Default::default()));
    }
    obj.get_mut("inputs")?.as_object_mut()
}

/// Read a node's `class_type`, if present.
pub fn class_type(node: &Value) -> Option<&str> {
    node.get("class_type")?.as_str()
}

/// Write `value` into `preferred` if set, else the first field of
/// `candidates` that already exists in `node_inputs`, else `candidates[0]`
/// as a fallback. Returns whether a field was written.
///
/// A preferred field always wins (and is created if missing); a candidate
/// list prefers an already-present field but still falls back to creating
/// the first candidate so callers never silently no-op.
pub fn set_field(
    node_inputs: &mut serde_json::Map<String, Value>,
    preferred: Option<&str>,
    candidates: Option<&[String]>,
    value: Value,
) -> bool {
    if let Some(preferred) = preferred {
        node_inputs.insert(preferred.to_string(), value);
        return true;
    }

    if let Some(candidates) = candidates {
        if let Some(existing) = candidates.iter().find(|f| node_inputs.contains_key(*f)) {
            node_inputs.insert(existing.clone(), value);
            return true;
        }
        if let Some(first) = candidates.first() {
            node_inputs.insert(first.clone(), value);
            return true;
        }
    }

    false
}

/// `true` iff the value is a JSON number that is not a boolean.
pub fn is_numeric_non_bool(value: &Value) -> bool {
    value.is_number()
}
