//! Parameter resolution: coerce user-supplied values against a workflow's
//! declared `ParameterDef`s.

use std::collections::HashMap;

use serde_json::Value;
use thiserror::Error;

use crate::definition::{ParamType, WorkflowDefinition};

#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    #[error("unknown parameter '{0}'")]
    UnknownParameter(String),

    #[error("parameter '{name}' must be a {expected}")]
    WrongType { name: String, expected: &'static str },

    #[error("parameter '{name}' must be >= {min}")]
    BelowMin { name: String, min: f64 },

    #[error("parameter '{name}' must be <= {max}")]
    AboveMax { name: String, max: f64 },
}

/// Resolve `overrides` against `workflow`'s declared parameters, returning
/// the full set of parameter name -> coerced value (defaults filled in for
/// anything not overridden).
///
/// Unknown keys in `overrides` are rejected rather than silently ignored,
/// so a typo'd parameter name surfaces immediately instead of defaulting.
pub fn resolve(
    workflow: &WorkflowDefinition,
    overrides: &serde_json::Map<String, Value>,
) -> Result<HashMap<String, Value>, ValidationError> {
    for key in overrides.keys() {
        if !workflow.parameters.contains_key(key) {
            return Err(ValidationError::UnknownParameter(key.clone()));
        }
    }

    let mut resolved = HashMap::with_capacity(workflow.parameters.len());
    for (name, def) in &workflow.parameters {
        let raw = overrides.get(name).cloned().unwrap_or_else(|| def.default.clone());
        let coerced = coerce_param(name, def.param_type, def.min, def.max, raw)?;
        resolved.insert(name.clone(), coerced);
    }
    Ok(resolved)
}

fn coerce_param(
    name: &str,
    param_type: ParamType,
    min: Option<f64>,
    max: Option<f64>,
    value: Value,
) -> Result<Value, ValidationError> {
    let coerced = match param_type {
        ParamType::Text => match value {
            Value::String(s) => Value::String(s),
            Value::Null => Value::String(String::new()),
            Value::Number(n) => Value::String(n.to_string()),
            Value::Bool(b) => Value::String(b.to_string()),
            _ => {
                return Err(ValidationError::WrongType {
                    name: name.to_string(),
                    expected: "string",
                })
            }
        },
        ParamType::Bool => match value {
            Value::Bool(b) => Value::Bool(b),
            Value::Number(n) => Value::Bool(n.as_f64().map(|f| f != 0.0).unwrap_or(false)),
            Value::String(s) => Value::Bool(matches!(
                s.to_ascii_lowercase().as_str(),
                "1" | "true" | "yes" | "on"
            )),
            _ => {
                return Err(ValidationError::WrongType {
                    name: name.to_string(),
                    expected: "bool",
                })
            }
        },
        ParamType::Int => {
            let as_i64 = match &value {
                Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.round() as i64)),
                Value::String(s) => s.trim().parse::<i64>().ok(),
                // Native bools are rejected rather than coerced: `true`/`false`
                // are not valid spellings of an integer parameter.
                Value::Bool(_) => None,
                _ => None,
            };
            let n = as_i64.ok_or_else(|| ValidationError::WrongType {
                name: name.to_string(),
                expected: "int",
            })?;
            check_range(name, n as f64, min, max)?;
            Value::Number(n.into())
        }
        ParamType::Float => {
            let as_f64 = match &value {
                Value::Number(n) => n.as_f64(),
                Value::String(s) => s.trim().parse::<f64>().ok(),
                Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
                _ => None,
            };
            let f = as_f64.ok_or_else(|| ValidationError::WrongType {
                name: name.to_string(),
                expected: "float",
            })?;
            check_range(name, f, min, max)?;
            Value::Number(
                serde_json::Number::from_f64(f).ok_or_else(|| ValidationError::WrongType {
                    name: name.to_string(),
                    expected: "float",
                })?,
            )
        }
    };
    Ok(coerced)
}

fn check_range(name: &str, value: f64, min: Option<f64>, max: Option<f64>) -> Result<(), ValidationError> {
    if let Some(min) = min {
        if value < min {
            return Err(ValidationError::BelowMin {
                name: name.to_string(),
                min,
            });
        }
    }
    if let Some(max) = max {
        if value > max {
            return Err(ValidationError::AboveMax {
                name: name.to_string(),
                max,
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::{InputType, ParameterDef, WorkflowDefinition};
    use serde_json::json;
    use std::collections::HashMap as Map;
    use std::path::PathBuf;

    fn workflow_with_params(params: Vec<ParameterDef>) -> WorkflowDefinition {
        let mut parameters = Map::new();
        for p in params {
            parameters.insert(p.name.clone(), p);
        }
        WorkflowDefinition {
            name: "t".into(),
            display_name: None,
            group: None,
            category: None,
            description: "t".into(),
            input_type: InputType::Image,
            input_extensions: vec![".png".into()],
            template_prompt: serde_json::Map::new(),
            file_bindings: Map::new(),
            parameters,
            switch_states: vec![],
            model_rewire: vec![],
            move_processed: false,
            source_file: PathBuf::from("test.yaml"),
        }
    }

    fn int_param(name: &str, default: i64, min: Option<f64>, max: Option<f64>) -> ParameterDef {
        ParameterDef {
            name: name.into(),
            label: name.into(),
            param_type: ParamType::Int,
            default: json!(default),
            min,
            max,
            nodes: None,
            field: None,
            fields: None,
        }
    }

    #[test]
    fn fills_defaults_when_no_override() {
        let wf = workflow_with_params(vec![int_param("steps", 20, Some(1.0), Some(150.0))]);
        let resolved = resolve(&wf, &serde_json::Map::new()).unwrap();
        assert_eq!(resolved.get("steps"), Some(&json!(20)));
    }

    #[test]
    fn rejects_unknown_parameter() {
        let wf = workflow_with_params(vec![]);
        let mut overrides = serde_json::Map::new();
        overrides.insert("bogus".into(), json!(1));
        let err = resolve(&wf, &overrides).unwrap_err();
        assert_eq!(err, ValidationError::UnknownParameter("bogus".into()));
    }

    #[test]
    fn enforces_min_and_max() {
        let wf = workflow_with_params(vec![int_param("steps", 20, Some(1.0), Some(150.0))]);
        let mut overrides = serde_json::Map::new();
        overrides.insert("steps".into(), json!(0));
        assert!(matches!(
            resolve(&wf, &overrides).unwrap_err(),
            ValidationError::BelowMin { .. }
        ));

        let mut overrides = serde_json::Map::new();
        overrides.insert("steps".into(), json!(500));
        assert!(matches!(
            resolve(&wf, &overrides).unwrap_err(),
            ValidationError::AboveMax { .. }
        ));
    }

    #[test]
    fn coerces_string_int() {
        let wf = workflow_with_params(vec![int_param("steps", 20, None, None)]);
        let mut overrides = serde_json::Map::new();
        overrides.insert("steps".into(), json!("42"));
        let resolved = resolve(&wf, &overrides).unwrap();
        assert_eq!(resolved.get("steps"), Some(&json!(42)));
    }

    #[test]
    fn coerces_bool_from_string() {
        let wf = workflow_with_params(vec![ParameterDef {
            name: "flag".into(),
            label: "flag".into(),
            param_type: ParamType::Bool,
            default: json!(false),
            min: None,
            max: None,
            nodes: None,
            field: None,
            fields: None,
        }]);
        let mut overrides = serde_json::Map::new();
        overrides.insert("flag".into(), json!("yes"));
        let resolved = resolve(&wf, &overrides).unwrap();
        assert_eq!(resolved.get("flag"), Some(&json!(true)));
    }

    #[test]
    fn rejects_native_bool_for_int_param() {
        let wf = workflow_with_params(vec![int_param("steps", 20, None, None)]);
        let mut overrides = serde_json::Map::new();
        overrides.insert("steps".into(), json!(true));
        assert!(matches!(
            resolve(&wf, &overrides).unwrap_err(),
            ValidationError::WrongType { .. }
        ));
    }
}
