//! Workflow definition loading and validation.
//!
//! Definitions are plain YAML files, one per workflow, loaded eagerly at
//! startup into owned Rust types with `thiserror`-backed validation errors.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info};

use crate::node::TemplatePrompt;

/// Parameter types a workflow definition may declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    Text,
    Bool,
    Int,
    Float,
}

impl ParamType {
    fn parse(raw: &str) -> Option<Self> {
        match raw {
            "text" => Some(Self::Text),
            "bool" => Some(Self::Bool),
            "int" => Some(Self::Int),
            "float" => Some(Self::Float),
            _ => None,
        }
    }
}

/// `input_type` a workflow definition declares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputType {
    Image,
    Video,
    None,
}

impl InputType {
    fn parse(raw: &str) -> Option<Self> {
        match raw {
            "image" => Some(Self::Image),
            "video" => Some(Self::Video),
            "none" => Some(Self::None),
            _ => None,
        }
    }
}

/// A named group of template nodes + target field(s) a file path or
/// parameter value is written into.
#[derive(Debug, Clone)]
pub struct NodeBinding {
    pub nodes: Vec<String>,
    pub field: Option<String>,
    pub fields: Option<Vec<String>>,
}

/// One declared user-facing knob.
#[derive(Debug, Clone)]
pub struct ParameterDef {
    pub name: String,
    pub label: String,
    pub param_type: ParamType,
    pub default: Value,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub nodes: Option<Vec<String>>,
    pub field: Option<String>,
    pub fields: Option<Vec<String>>,
}

/// An unconditional `{node_id}.inputs.{field} = value` write applied to
/// every materialized prompt.
#[derive(Debug, Clone)]
pub struct SwitchState {
    pub node_id: String,
    pub field: String,
    pub value: Value,
}

/// One candidate model source feeding a rewire target, tied to the
/// extra-LoRA slot that has to be active for it to be selected.
#[derive(Debug, Clone)]
pub struct ModelRewireCandidate {
    pub slot: String,
    pub source_node: String,
}

/// A consumer node/field whose `model` reference is re-pointed at the
/// highest active extra-LoRA slot's output, falling back to `base` when
/// none of `chain` is active. Generalizes "single-pass" model-source
/// rewiring into a declarative form any workflow can opt into.
#[derive(Debug, Clone)]
pub struct ModelRewireTarget {
    pub node_id: String,
    pub field: String,
    /// Highest-priority candidate first.
    pub chain: Vec<ModelRewireCandidate>,
    pub base: String,
}

/// A fully validated, immutable workflow definition.
#[derive(Debug, Clone)]
pub struct WorkflowDefinition {
    pub name: String,
    pub display_name: Option<String>,
    pub group: Option<String>,
    pub category: Option<String>,
    pub description: String,
    pub input_type: InputType,
    pub input_extensions: Vec<String>,
    pub template_prompt: TemplatePrompt,
    pub file_bindings: HashMap<String, NodeBinding>,
    pub parameters: HashMap<String, ParameterDef>,
    pub switch_states: Vec<SwitchState>,
    pub model_rewire: Vec<ModelRewireTarget>,
    pub move_processed: bool,
    pub source_file: PathBuf,
}

/// Load-time and schema-validation failures. Every variant names the
/// offending file and field path.
#[derive(Debug, Error)]
pub enum DefinitionError {
    #[error("{path}: invalid YAML: {source}")]
    InvalidYaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("{path}: field '{field}': {message}")]
    Field {
        path: PathBuf,
        field: String,
        message: String,
    },

    #[error("duplicate workflow name '{name}' in {path}")]
    DuplicateName { name: String, path: PathBuf },

    #[error("{path}: {message}")]
    Io { path: PathBuf, message: String },
}

impl DefinitionError {
    fn field(path: &Path, field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Field {
            path: path.to_path_buf(),
            field: field.into(),
            message: message.into(),
        }
    }
}

type Result<T> = std::result::Result<T, DefinitionError>;

/// Load every `*.yaml` definition file in `root`, sorted by filename.
/// Fails fast on the first structurally invalid file.
pub fn load_all(root: &Path) -> Result<Vec<WorkflowDefinition>> {
    if !root.exists() {
        return Ok(Vec::new());
    }

    let mut paths: Vec<PathBuf> = fs::read_dir(root)
        .map_err(|e| DefinitionError::Io {
            path: root.to_path_buf(),
            message: e.to_string(),
        })?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|p| p.extension().and_then(|e| e.to_str()) == Some("yaml"))
        .collect();
    paths.sort();

    let mut workflows = Vec::with_capacity(paths.len());
    let mut names = std::collections::HashSet::new();
    for path in paths {
        let wf = load_one(&path)?;
        if !names.insert(wf.name.clone()) {
            return Err(DefinitionError::DuplicateName {
                name: wf.name,
                path,
            });
        }
        workflows.push(wf);
    }
    info!(count = workflows.len(), dir = %root.display(), "loaded workflow definitions");
    Ok(workflows)
}

/// Load and validate one definition file.
pub fn load_one(path: &Path) -> Result<WorkflowDefinition> {
    let text = fs::read_to_string(path).map_err(|e| DefinitionError::Io {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    let raw: Value =
        serde_yaml::from_str(&text).map_err(|e| DefinitionError::InvalidYaml {
            path: path.to_path_buf(),
            source: e,
        })?;

    let raw = raw
        .as_object()
        .ok_or_else(|| DefinitionError::field(path, "<root>", "top-level YAML must be a mapping"))?;

    for required in ["name", "description", "input_type", "input_extensions"] {
        if !raw.contains_key(required) {
            return Err(DefinitionError::field(path, required, "is required"));
        }
    }

    let name = raw["name"]
        .as_str()
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| DefinitionError::field(path, "name", "must be a non-empty string"))?
        .to_string();

    let description = raw["description"]
        .as_str()
        .ok_or_else(|| DefinitionError::field(path, "description", "must be a string"))?
        .to_string();

    let display_name = optional_string(raw, path, "display_name")?;
    let group = optional_string(raw, path, "group")?;
    let category = optional_string(raw, path, "category")?;

    let input_type_raw = raw["input_type"]
        .as_str()
        .ok_or_else(|| DefinitionError::field(path, "input_type", "must be a string"))?;
    let input_type = InputType::parse(input_type_raw).ok_or_else(|| {
        DefinitionError::field(path, "input_type", "must be 'image', 'video', or 'none'")
    })?;

    let input_extensions = raw["input_extensions"]
        .as_array()
        .filter(|a| !a.is_empty())
        .ok_or_else(|| {
            DefinitionError::field(path, "input_extensions", "must be a non-empty list")
        })?
        .iter()
        .map(|v| {
            v.as_str()
                .filter(|s| s.starts_with('.'))
                .map(|s| s.to_string())
                .ok_or_else(|| {
                    DefinitionError::field(
                        path,
                        "input_extensions",
                        "must contain extensions like '.png'",
                    )
                })
        })
        .collect::<Result<Vec<_>>>()?;

    let template_prompt = load_template(path, raw)?;

    let file_bindings_raw = raw.get("file_bindings").cloned().unwrap_or(Value::Object(Default::default()));
    let file_bindings_raw = file_bindings_raw
        .as_object()
        .ok_or_else(|| DefinitionError::field(path, "file_bindings", "must be a mapping"))?;
    let mut file_bindings = HashMap::new();
    for (name_, value) in file_bindings_raw {
        file_bindings.insert(name_.clone(), parse_binding(path, name_, value)?);
    }

    let params_raw = raw.get("parameters").cloned().unwrap_or(Value::Object(Default::default()));
    let params_raw = params_raw
        .as_object()
        .ok_or_else(|| DefinitionError::field(path, "parameters", "must be a mapping"))?;
    let mut parameters = HashMap::new();
    for (name_, value) in params_raw {
        parameters.insert(name_.clone(), parse_parameter(path, name_, value)?);
    }

    let switches_raw = raw.get("switch_states").cloned().unwrap_or(Value::Object(Default::default()));
    let switches_raw = switches_raw
        .as_object()
        .ok_or_else(|| DefinitionError::field(path, "switch_states", "must be a mapping"))?;
    let mut switch_states = Vec::new();
    for (node_id, cfg) in switches_raw {
        let cfg = cfg.as_object().ok_or_else(|| {
            DefinitionError::field(path, &format!("switch_states.{node_id}"), "must be a mapping")
        })?;
        let field = cfg
            .get("field")
            .and_then(|v| v.as_str())
            .ok_or_else(|| {
                DefinitionError::field(
                    path,
                    &format!("switch_states.{node_id}.field"),
                    "must be a string",
                )
            })?
            .to_string();
        let value = cfg.get("value").cloned().ok_or_else(|| {
            DefinitionError::field(path, &format!("switch_states.{node_id}.value"), "is required")
        })?;
        switch_states.push(SwitchState {
            node_id: node_id.clone(),
            field,
            value,
        });
    }

    let model_rewire = match raw.get("model_rewire") {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items
            .iter()
            .enumerate()
            .map(|(i, v)| parse_model_rewire_target(path, i, v))
            .collect::<Result<Vec<_>>>()?,
        Some(_) => {
            return Err(DefinitionError::field(path, "model_rewire", "must be a list"))
        }
    };

    let move_processed = raw
        .get("move_processed")
        .and_then(|v| v.as_bool())
        .unwrap_or(false);

    let workflow = WorkflowDefinition {
        name,
        display_name,
        group,
        category,
        description,
        input_type,
        input_extensions,
        template_prompt,
        file_bindings,
        parameters,
        switch_states,
        model_rewire,
        move_processed,
        source_file: path.to_path_buf(),
    };

    validate_template_refs(path, &workflow)?;
    debug!(workflow = %workflow.name, path = %path.display(), "loaded workflow definition");
    Ok(workflow)
}

fn optional_string(
    raw: &serde_json::Map<String, Value>,
    path: &Path,
    field: &str,
) -> Result<Option<String>> {
    match raw.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(DefinitionError::field(path, field, "must be a string")),
    }
}

fn load_template(path: &Path, raw: &serde_json::Map<String, Value>) -> Result<TemplatePrompt> {
    if let Some(inline) = raw.get("template_inline") {
        return inline
            .as_object()
            .cloned()
            .ok_or_else(|| DefinitionError::field(path, "template_inline", "must be a mapping"));
    }

    let template = raw
        .get("template")
        .and_then(|v| v.as_str())
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| {
            DefinitionError::field(
                path,
                "template",
                "is required unless template_inline is provided",
            )
        })?;

    let mut template_path = PathBuf::from(template);
    if !template_path.is_absolute() {
        template_path = path
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join(&template_path);
    }

    if !template_path.exists() {
        return Err(DefinitionError::field(
            path,
            "template",
            format!("template file does not exist: {}", template_path.display()),
        ));
    }

    let text = fs::read_to_string(&template_path).map_err(|e| DefinitionError::Io {
        path: template_path.clone(),
        message: e.to_string(),
    })?;
    let obj: Value = serde_json::from_str(&text)
        .map_err(|e| DefinitionError::field(path, "template", format!("invalid JSON: {e}")))?;

    let prompt = match obj {
        Value::Object(mut map) if map.contains_key("prompt") => map.remove("prompt").unwrap(),
        other => other,
    };

    prompt
        .as_object()
        .cloned()
        .ok_or_else(|| DefinitionError::field(path, "template", "template JSON must be a prompt mapping"))
}

fn parse_binding(path: &Path, name: &str, value: &Value) -> Result<NodeBinding> {
    let obj = value
        .as_object()
        .ok_or_else(|| DefinitionError::field(path, &format!("file_bindings.{name}"), "must be a mapping"))?;

    let nodes = obj
        .get("nodes")
        .and_then(|v| v.as_array())
        .filter(|a| !a.is_empty())
        .ok_or_else(|| {
            DefinitionError::field(
                path,
                &format!("file_bindings.{name}.nodes"),
                "must be a non-empty list[str]",
            )
        })?
        .iter()
        .map(|v| {
            v.as_str().map(|s| s.to_string()).ok_or_else(|| {
                DefinitionError::field(
                    path,
                    &format!("file_bindings.{name}.nodes"),
                    "must be a non-empty list[str]",
                )
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let field = match obj.get("field") {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s.clone()),
        Some(_) => {
            return Err(DefinitionError::field(
                path,
                &format!("file_bindings.{name}.field"),
                "must be a string",
            ))
        }
    };

    let fields = parse_string_list_opt(path, obj, &format!("file_bindings.{name}.fields"))?;

    if field.is_none() && fields.is_none() {
        return Err(DefinitionError::field(
            path,
            &format!("file_bindings.{name}"),
            "must include 'field' or 'fields'",
        ));
    }

    Ok(NodeBinding {
        nodes,
        field,
        fields,
    })
}

fn parse_string_list_opt(
    path: &Path,
    obj: &serde_json::Map<String, Value>,
    field_path: &str,
) -> Result<Option<Vec<String>>> {
    match obj.get(field_path.rsplit('.').next().unwrap_or(field_path)) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Array(items)) if !items.is_empty() => {
            let strs = items
                .iter()
                .map(|v| {
                    v.as_str()
                        .map(|s| s.to_string())
                        .ok_or_else(|| DefinitionError::field(path, field_path, "must be a non-empty list[str]"))
                })
                .collect::<Result<Vec<_>>>()?;
            Ok(Some(strs))
        }
        Some(_) => Err(DefinitionError::field(
            path,
            field_path,
            "must be a non-empty list[str]",
        )),
    }
}

fn parse_parameter(path: &Path, name: &str, value: &Value) -> Result<ParameterDef> {
    let obj = value
        .as_object()
        .ok_or_else(|| DefinitionError::field(path, &format!("parameters.{name}"), "must be a mapping"))?;

    let ptype_raw = obj
        .get("type")
        .and_then(|v| v.as_str())
        .ok_or_else(|| {
            DefinitionError::field(
                path,
                &format!("parameters.{name}.type"),
                "must be one of [\"bool\", \"float\", \"int\", \"text\"]",
            )
        })?;
    let param_type = ParamType::parse(ptype_raw).ok_or_else(|| {
        DefinitionError::field(
            path,
            &format!("parameters.{name}.type"),
            "must be one of [\"bool\", \"float\", \"int\", \"text\"]",
        )
    })?;

    let label = match obj.get("label") {
        None => name.to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(_) => {
            return Err(DefinitionError::field(
                path,
                &format!("parameters.{name}.label"),
                "must be a string",
            ))
        }
    };

    let nodes = match obj.get("nodes") {
        None | Some(Value::Null) => None,
        Some(Value::Array(items)) => Some(
            items
                .iter()
                .map(|v| {
                    v.as_str().map(|s| s.to_string()).ok_or_else(|| {
                        DefinitionError::field(path, &format!("parameters.{name}.nodes"), "must be list[str]")
                    })
                })
                .collect::<Result<Vec<_>>>()?,
        ),
        Some(_) => {
            return Err(DefinitionError::field(
                path,
                &format!("parameters.{name}.nodes"),
                "must be list[str]",
            ))
        }
    };

    let field = match obj.get("field") {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s.clone()),
        Some(_) => {
            return Err(DefinitionError::field(
                path,
                &format!("parameters.{name}.field"),
                "must be a string",
            ))
        }
    };

    let fields = match obj.get("fields") {
        None | Some(Value::Null) => None,
        Some(Value::Array(items)) => Some(
            items
                .iter()
                .map(|v| {
                    v.as_str().map(|s| s.to_string()).ok_or_else(|| {
                        DefinitionError::field(path, &format!("parameters.{name}.fields"), "must be list[str]")
                    })
                })
                .collect::<Result<Vec<_>>>()?,
        ),
        Some(_) => {
            return Err(DefinitionError::field(
                path,
                &format!("parameters.{name}.fields"),
                "must be list[str]",
            ))
        }
    };

    let min = numeric_opt(path, obj, name, "min")?;
    let max = numeric_opt(path, obj, name, "max")?;

    Ok(ParameterDef {
        name: name.to_string(),
        label,
        param_type,
        default: obj.get("default").cloned().unwrap_or(Value::Null),
        min,
        max,
        nodes,
        field,
        fields,
    })
}

fn parse_model_rewire_target(path: &Path, index: usize, value: &Value) -> Result<ModelRewireTarget> {
    let prefix = format!("model_rewire[{index}]");
    let obj = value
        .as_object()
        .ok_or_else(|| DefinitionError::field(path, &prefix, "must be a mapping"))?;

    let node_id = obj
        .get("node")
        .and_then(|v| v.as_str())
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| DefinitionError::field(path, format!("{prefix}.node"), "must be a non-empty string"))?
        .to_string();

    let field = obj
        .get("field")
        .and_then(|v| v.as_str())
        .filter(|s| !s.trim().is_empty())
        .unwrap_or("model")
        .to_string();

    let base = obj
        .get("base")
        .and_then(|v| v.as_str())
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| DefinitionError::field(path, format!("{prefix}.base"), "must be a non-empty string"))?
        .to_string();

    let chain_raw = obj
        .get("chain")
        .and_then(|v| v.as_array())
        .cloned()
        .unwrap_or_default();
    let chain = chain_raw
        .iter()
        .enumerate()
        .map(|(i, v)| {
            let cobj = v.as_object().ok_or_else(|| {
                DefinitionError::field(path, format!("{prefix}.chain[{i}]"), "must be a mapping")
            })?;
            let slot = cobj
                .get("slot")
                .and_then(|v| v.as_str())
                .filter(|s| !s.trim().is_empty())
                .ok_or_else(|| {
                    DefinitionError::field(path, format!("{prefix}.chain[{i}].slot"), "must be a non-empty string")
                })?
                .to_string();
            let source_node = cobj
                .get("source")
                .and_then(|v| v.as_str())
                .filter(|s| !s.trim().is_empty())
                .ok_or_else(|| {
                    DefinitionError::field(path, format!("{prefix}.chain[{i}].source"), "must be a non-empty string")
                })?
                .to_string();
            Ok(ModelRewireCandidate { slot, source_node })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(ModelRewireTarget {
        node_id,
        field,
        chain,
        base,
    })
}

fn numeric_opt(
    path: &Path,
    obj: &serde_json::Map<String, Value>,
    name: &str,
    field: &str,
) -> Result<Option<f64>> {
    match obj.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => v.as_f64().map(Some).ok_or_else(|| {
            DefinitionError::field(path, &format!("parameters.{name}.{field}"), "must be numeric")
        }),
    }
}

fn validate_template_refs(path: &Path, workflow: &WorkflowDefinition) -> Result<()> {
    let node_ids: std::collections::HashSet<&String> = workflow.template_prompt.keys().collect();

    for (bname, binding) in &workflow.file_bindings {
        for nid in &binding.nodes {
            if !node_ids.contains(nid) {
                return Err(DefinitionError::field(
                    path,
                    &format!("file_bindings.{bname}.nodes"),
                    format!("node id '{nid}' not in template"),
                ));
            }
        }
    }

    for (pname, param) in &workflow.parameters {
        let Some(nodes) = &param.nodes else { continue };
        for nid in nodes {
            if !node_ids.contains(nid) {
                return Err(DefinitionError::field(
                    path,
                    &format!("parameters.{pname}.nodes"),
                    format!("node id '{nid}' not in template"),
                ));
            }
        }
    }

    for switch in &workflow.switch_states {
        if !node_ids.contains(&switch.node_id) {
            return Err(DefinitionError::field(
                path,
                "switch_states",
                format!("node id '{}' not in template", switch.node_id),
            ));
        }
    }

    for target in &workflow.model_rewire {
        if !node_ids.contains(&target.node_id) {
            return Err(DefinitionError::field(
                path,
                "model_rewire",
                format!("node id '{}' not in template", target.node_id),
            ));
        }
        if !node_ids.contains(&target.base) {
            return Err(DefinitionError::field(
                path,
                "model_rewire",
                format!("base node id '{}' not in template", target.base),
            ));
        }
        for candidate in &target.chain {
            if !node_ids.contains(&candidate.source_node) {
                return Err(DefinitionError::field(
                    path,
                    "model_rewire",
                    format!("source node id '{}' not in template", candidate.source_node),
                ));
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_def(dir: &Path, name: &str, contents: &str) -> PathBuf {
        let path = dir.join(name);
        let mut f = fs::File::create(&path).unwrap();
        f.write_all(contents.as_bytes()).unwrap();
        path
    }

    const MINIMAL_YAML: &str = r#"
name: test-workflow
description: a test workflow
input_type: image
input_extensions: [".png"]
template_inline:
  "1":
    class_type: LoadImage
    inputs:
      image: ""
"#;

    #[test]
    fn loads_minimal_definition() {
        let dir = tempfile::tempdir().unwrap();
        write_def(dir.path(), "a.yaml", MINIMAL_YAML);
        let defs = load_all(dir.path()).unwrap();
        assert_eq!(defs.len(), 1);
        assert_eq!(defs[0].name, "test-workflow");
    }

    #[test]
    fn rejects_dangling_node_reference() {
        let dir = tempfile::tempdir().unwrap();
        let yaml = format!(
            "{MINIMAL_YAML}\nfile_bindings:\n  load_image:\n    nodes: [\"999\"]\n    field: image\n"
        );
        write_def(dir.path(), "a.yaml", &yaml);
        let err = load_all(dir.path()).unwrap_err();
        assert!(matches!(err, DefinitionError::Field { .. }));
    }

    #[test]
    fn rejects_duplicate_names() {
        let dir = tempfile::tempdir().unwrap();
        write_def(dir.path(), "a.yaml", MINIMAL_YAML);
        write_def(dir.path(), "b.yaml", MINIMAL_YAML);
        let err = load_all(dir.path()).unwrap_err();
        assert!(matches!(err, DefinitionError::DuplicateName { .. }));
    }

    #[test]
    fn missing_dir_yields_empty_list() {
        let defs = load_all(Path::new("/nonexistent/does/not/exist")).unwrap();
        assert!(defs.is_empty());
    }

    #[test]
    fn rejects_bad_input_extension() {
        let dir = tempfile::tempdir().unwrap();
        let yaml = MINIMAL_YAML.replace(r#"[".png"]"#, r#"["png"]"#);
        write_def(dir.path(), "a.yaml", &yaml);
        let err = load_all(dir.path()).unwrap_err();
        assert!(matches!(err, DefinitionError::Field { .. }));
    }

    #[test]
    fn parses_model_rewire_chain() {
        let dir = tempfile::tempdir().unwrap();
        let yaml = format!(
            "{MINIMAL_YAML}\nmodel_rewire:\n  - node: \"1\"\n    field: model\n    base: \"1\"\n    chain:\n      - {{slot: extra_lora, source: \"1\"}}\n"
        );
        write_def(dir.path(), "a.yaml", &yaml);
        let defs = load_all(dir.path()).unwrap();
        assert_eq!(defs[0].model_rewire.len(), 1);
        assert_eq!(defs[0].model_rewire[0].chain[0].slot, "extra_lora");
    }

    #[test]
    fn rejects_model_rewire_dangling_base() {
        let dir = tempfile::tempdir().unwrap();
        let yaml = format!("{MINIMAL_YAML}\nmodel_rewire:\n  - node: \"1\"\n    base: \"999\"\n");
        write_def(dir.path(), "a.yaml", &yaml);
        let err = load_all(dir.path()).unwrap_err();
        assert!(matches!(err, DefinitionError::Field { .. }));
    }
}
