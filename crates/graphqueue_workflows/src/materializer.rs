//! Prompt materialization: turn a workflow template + resolved parameters
//! + per-job inputs into one or more concrete prompts ready to submit
//! upstream. Owns the full per-input, per-try expansion (including
//! no-input jobs, per-file override merging, and the extra-LoRA slot
//! policy) rather than leaving it to a calling layer.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use rand::Rng;
use serde_json::Value;
use thiserror::Error;

use crate::definition::WorkflowDefinition;
use crate::node::{self, TemplatePrompt};
use crate::resolver::{self, ValidationError};

#[derive(Debug, Error)]
pub enum MaterializeError {
    #[error("template node '{0}' referenced by a binding is missing from the prompt")]
    MissingNode(String),
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// One materialized submission unit, ready to persist as a `Prompt` row.
#[derive(Debug, Clone)]
pub struct PromptSpec {
    pub input_file: String,
    pub prompt_json: TemplatePrompt,
    pub seed_used: Option<i64>,
    pub output_prefix: String,
}

/// `uniform_standard` is the name used in several hand-authored templates;
/// the upstream node schema renamed it to `standard_uniform` after the
/// template files were written. Normalize on materialization rather than
/// editing every template on disk.
const CONTEXT_SCHEDULE_ALIASES: &[(&str, &str)] = &[("uniform_standard", "standard_uniform")];
const CONTEXT_WINDOW_CLASS_HINT: &str = "WanContextWindowsManual";

const EXTRA_LORA_SLOT_NAMES: &[&str] = &[
    "extra_lora", "extra_lora2", "extra_lora3", "extra_lora4", "extra_lora5",
];

/// Build every `PromptSpec` for one job submission.
///
/// `inputs` pairs the original input path with its upstream-visible
/// (typically staged) path; pass a single `(PathBuf::new(), PathBuf::new())`
/// placeholder-free empty slice for `input_type: none` workflows — an
/// empty list synthesizes one no-input iteration.
pub fn build_prompts(
    workflow: &WorkflowDefinition,
    inputs: &[(PathBuf, PathBuf)],
    resolved: &HashMap<String, Value>,
    per_file_overrides: Option<&HashMap<String, serde_json::Map<String, Value>>>,
    upstream_input_root: Option<&Path>,
    resolution: Option<(i64, i64)>,
    flip: bool,
) -> Result<Vec<PromptSpec>, MaterializeError> {
    let iterations: Vec<Option<(PathBuf, PathBuf)>> = if inputs.is_empty() {
        vec![None]
    } else {
        inputs.iter().cloned().map(Some).collect()
    };

    let mut specs = Vec::new();
    for pair in iterations {
        let params_for_input = match &pair {
            Some((original, _)) => merge_per_file_overrides(workflow, resolved, per_file_overrides, original)?,
            None => resolved.clone(),
        };

        let tries = params_for_input
            .get("tries")
            .and_then(|v| v.as_i64())
            .filter(|n| *n > 0)
            .unwrap_or(1);
        let randomize_seed = params_for_input
            .get("randomize_seed")
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
            || tries > 1;

        let stem = match &pair {
            Some((original, _)) => original
                .file_stem()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_else(|| "prompt".to_string()),
            None => "prompt".to_string(),
        };

        for try_idx in 1..=tries {
            let upstream_path = match &pair {
                Some((_, staged)) => rewrite_for_upstream(staged, upstream_input_root),
                None => String::new(),
            };

            let seed_used = if randomize_seed {
                Some(generate_seed())
            } else {
                params_for_input.get("seed").and_then(value_to_i64)
            };

            let output_prefix = match workflow.file_bindings.get("output_prefix") {
                Some(_) if tries > 1 => format!("{stem}_try{try_idx:02}"),
                Some(_) => stem.clone(),
                None => stem.clone(),
            };

            let mut effective = params_for_input.clone();
            apply_extra_lora_policy(&mut effective);

            let prompt = build_one(
                workflow,
                &effective,
                &upstream_path,
                resolution,
                flip,
                &output_prefix,
                seed_used,
            )?;

            specs.push(PromptSpec {
                input_file: pair
                    .as_ref()
                    .map(|(original, _)| original.to_string_lossy().to_string())
                    .unwrap_or_default(),
                prompt_json: prompt,
                seed_used,
                output_prefix,
            });
        }
    }

    Ok(specs)
}

fn merge_per_file_overrides(
    workflow: &WorkflowDefinition,
    resolved: &HashMap<String, Value>,
    per_file_overrides: Option<&HashMap<String, serde_json::Map<String, Value>>>,
    original: &Path,
) -> Result<HashMap<String, Value>, MaterializeError> {
    let Some(overrides_by_path) = per_file_overrides else {
        return Ok(resolved.clone());
    };

    let basename = original
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let full = original.to_string_lossy().to_string();

    let entry = overrides_by_path
        .get(&full)
        .or_else(|| overrides_by_path.get(&basename));

    let Some(entry) = entry else {
        return Ok(resolved.clone());
    };

    let mut merged = serde_json::Map::new();
    for (k, v) in resolved {
        merged.insert(k.clone(), v.clone());
    }
    for (k, v) in entry {
        merged.insert(k.clone(), v.clone());
    }

    Ok(resolver::resolve(workflow, &merged)?)
}

fn value_to_i64(value: &Value) -> Option<i64> {
    value.as_i64()
}

fn generate_seed() -> i64 {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or(0);
    let random_bits: u32 = rand::thread_rng().gen_range(0..(1u32 << 31));
    ((nanos as i64) ^ (random_bits as i64)) & 0x7fff_ffff_ffff_ffff
}

/// Writes the path relative to `upstream_input_root` when it's
/// underneath it, else the absolute path verbatim.
fn rewrite_for_upstream(path: &Path, upstream_input_root: Option<&Path>) -> String {
    if let Some(root) = upstream_input_root {
        if let (Ok(root_canon), Ok(path_canon)) = (root.canonicalize(), path.canonicalize()) {
            if let Ok(relative) = path_canon.strip_prefix(&root_canon) {
                return relative.to_string_lossy().replace('\\', "/");
            }
        }
    }
    path.to_string_lossy().replace('\\', "/")
}

/// A slot is active iff `{slot}_enabled` is truthy and both
/// `{slot}_name_high`/`{slot}_name_low` (or legacy `{slot}_name`) are
/// non-empty after trimming.
fn slot_active(params: &HashMap<String, Value>, slot: &str) -> bool {
    let enabled = params
        .get(&format!("{slot}_enabled"))
        .and_then(|v| v.as_bool())
        .unwrap_or(false);
    if !enabled {
        return false;
    }

    let names_present = ["name_high", "name_low", "name"].iter().any(|suffix| {
        params
            .get(&format!("{slot}_{suffix}"))
            .and_then(|v| v.as_str())
            .map(|s| !s.trim().is_empty())
            .unwrap_or(false)
    });

    let high = params.get(&format!("{slot}_name_high")).and_then(|v| v.as_str());
    let low = params.get(&format!("{slot}_name_low")).and_then(|v| v.as_str());
    match (high, low) {
        (Some(h), Some(l)) => !h.trim().is_empty() && !l.trim().is_empty(),
        _ => names_present,
    }
}

/// Zero out strength-like fields for every inactive extra-LoRA slot.
///
/// Inactive slots have their `{slot}_strength_high`/`{slot}_strength_low`/
/// legacy `{slot}_strength` forced to `0.0` regardless of what the caller
/// supplied.
fn apply_extra_lora_policy(params: &mut HashMap<String, Value>) {
    for slot in EXTRA_LORA_SLOT_NAMES {
        if slot_active(params, slot) {
            continue;
        }

        for suffix in ["strength_high", "strength_low", "strength"] {
            let key = format!("{slot}_{suffix}");
            if params.contains_key(&key) {
                params.insert(key, Value::from(0.0));
            }
        }
    }
}

/// (g, second sentence) Re-point each declared model-consumer's `model`
/// input at the highest-priority active extra-LoRA slot's source node,
/// falling back to the base 4-step loader when none of the chain is
/// active. `chain` is given highest-priority candidate first.
fn apply_model_rewire(workflow: &WorkflowDefinition, prompt: &mut TemplatePrompt, params: &HashMap<String, Value>) {
    for target in &workflow.model_rewire {
        let chosen = target
            .chain
            .iter()
            .find(|candidate| slot_active(params, &candidate.slot))
            .map(|candidate| candidate.source_node.as_str())
            .unwrap_or(target.base.as_str());

        let Some(node) = prompt.get_mut(&target.node_id) else {
            continue;
        };
        let Some(inputs) = node::inputs_mut(node) else {
            continue;
        };
        inputs.insert(
            target.field.clone(),
            Value::Array(vec![Value::String(chosen.to_string()), Value::from(0)]),
        );
    }
}

fn build_one(
    workflow: &WorkflowDefinition,
    params: &HashMap<String, Value>,
    upstream_input_path: &str,
    resolution: Option<(i64, i64)>,
    flip: bool,
    output_prefix: &str,
    seed_used: Option<i64>,
) -> Result<TemplatePrompt, MaterializeError> {
    let mut prompt: TemplatePrompt = workflow.template_prompt.clone();

    apply_input_binding(workflow, &mut prompt, upstream_input_path)?;
    apply_param_overrides(workflow, &mut prompt, params);
    apply_switch_states(workflow, &mut prompt);
    normalize_context_schedule(&mut prompt);
    apply_resolution(&mut prompt, resolution);
    flip_orientation(&mut prompt, flip);
    apply_model_rewire(workflow, &mut prompt, params);
    apply_output_prefix(workflow, &mut prompt, output_prefix);
    apply_seed(workflow, &mut prompt, seed_used);

    Ok(prompt)
}

/// (a) Bind the input path into `load_image`/`load_video`/`input_file`
/// bindings.
fn apply_input_binding(
    workflow: &WorkflowDefinition,
    prompt: &mut TemplatePrompt,
    upstream_input_path: &str,
) -> Result<(), MaterializeError> {
    if upstream_input_path.is_empty() {
        return Ok(());
    }

    for name in ["load_image", "load_video", "input_file"] {
        let Some(binding) = workflow.file_bindings.get(name) else {
            continue;
        };
        for node_id in &binding.nodes {
            let node = prompt
                .get_mut(node_id)
                .ok_or_else(|| MaterializeError::MissingNode(node_id.clone()))?;
            let Some(inputs) = node::inputs_mut(node) else {
                continue;
            };
            node::set_field(
                inputs,
                binding.field.as_deref(),
                binding.fields.as_deref(),
                Value::String(upstream_input_path.to_string()),
            );
        }
    }
    Ok(())
}

/// (b) Write each resolved parameter value into its declared node/field.
/// Skips empty-string `extra_lora*_name*` overrides so template defaults
/// survive rather than being blanked.
fn apply_param_overrides(
    workflow: &WorkflowDefinition,
    prompt: &mut TemplatePrompt,
    params: &HashMap<String, Value>,
) {
    for (name, def) in &workflow.parameters {
        let Some(value) = params.get(name) else {
            continue;
        };
        let Some(nodes) = &def.nodes else { continue };

        if is_empty_extra_lora_name(name, value) {
            continue;
        }

        for node_id in nodes {
            let Some(node) = prompt.get_mut(node_id) else {
                continue;
            };
            let Some(inputs) = node::inputs_mut(node) else {
                continue;
            };
            node::set_field(inputs, def.field.as_deref(), def.fields.as_deref(), value.clone());
        }
    }
}

fn is_empty_extra_lora_name(name: &str, value: &Value) -> bool {
    if !name.starts_with("extra_lora") || !name.contains("name") {
        return false;
    }
    matches!(value, Value::String(s) if s.trim().is_empty())
}

/// (c) Unconditional `{node}.inputs.{field} = value` writes.
fn apply_switch_states(workflow: &WorkflowDefinition, prompt: &mut TemplatePrompt) {
    for switch in &workflow.switch_states {
        let Some(node) = prompt.get_mut(&switch.node_id) else {
            continue;
        };
        let Some(inputs) = node::inputs_mut(node) else {
            continue;
        };
        inputs.insert(switch.field.clone(), switch.value.clone());
    }
}

/// (d) Rename deprecated `context_schedule` values on windowed-context
/// nodes so templates authored against either name behave identically.
fn normalize_context_schedule(prompt: &mut TemplatePrompt) {
    for node in prompt.values_mut() {
        let is_context_node = node::class_type(node) == Some(CONTEXT_WINDOW_CLASS_HINT);
        if !is_context_node {
            continue;
        }
        let Some(inputs) = node::inputs_mut(node) else {
            continue;
        };
        if let Some(Value::String(current)) = inputs.get("context_schedule").cloned() {
            for (from, to) in CONTEXT_SCHEDULE_ALIASES {
                if current == *from {
                    inputs.insert("context_schedule".to_string(), Value::String(to.to_string()));
                }
            }
        }
    }
}

/// (e) Override width/height on every node whose `inputs` carries numeric
/// non-boolean `width` AND `height`.
fn apply_resolution(prompt: &mut TemplatePrompt, resolution: Option<(i64, i64)>) {
    let Some((width, height)) = resolution else {
        return;
    };
    for node in prompt.values_mut() {
        let Some(inputs) = node.get("inputs").and_then(|v| v.as_object()) else {
            continue;
        };
        let has_both = inputs.get("width").map(node::is_numeric_non_bool).unwrap_or(false)
            && inputs.get("height").map(node::is_numeric_non_bool).unwrap_or(false);
        if !has_both {
            continue;
        }
        let Some(inputs) = node::inputs_mut(node) else {
            continue;
        };
        inputs.insert("width".to_string(), Value::from(width));
        inputs.insert("height".to_string(), Value::from(height));
    }
}

/// (f) Swap width/height on every node with both fields, when requested.
fn flip_orientation(prompt: &mut TemplatePrompt, flip: bool) {
    if !flip {
        return;
    }
    for node in prompt.values_mut() {
        let Some(inputs) = node.get("inputs").and_then(|v| v.as_object()) else {
            continue;
        };
        let has_both = inputs.get("width").map(node::is_numeric_non_bool).unwrap_or(false)
            && inputs.get("height").map(node::is_numeric_non_bool).unwrap_or(false);
        if !has_both {
            continue;
        }
        let Some(inputs) = node::inputs_mut(node) else {
            continue;
        };
        let width = inputs.get("width").cloned();
        let height = inputs.get("height").cloned();
        if let (Some(w), Some(h)) = (width, height) {
            inputs.insert("width".to_string(), h);
            inputs.insert("height".to_string(), w);
        }
    }
}

/// (h) Write the final output prefix into the `output_prefix` binding, if
/// the workflow declares one.
fn apply_output_prefix(workflow: &WorkflowDefinition, prompt: &mut TemplatePrompt, output_prefix: &str) {
    let Some(binding) = workflow.file_bindings.get("output_prefix") else {
        return;
    };
    for node_id in &binding.nodes {
        let Some(node) = prompt.get_mut(node_id) else {
            continue;
        };
        let Some(inputs) = node::inputs_mut(node) else {
            continue;
        };
        node::set_field(
            inputs,
            binding.field.as_deref(),
            binding.fields.as_deref(),
            Value::String(output_prefix.to_string()),
        );
    }
}

/// (i) Bind the seed, if the workflow declares a `seed` binding and one
/// was generated.
fn apply_seed(workflow: &WorkflowDefinition, prompt: &mut TemplatePrompt, seed_used: Option<i64>) {
    let Some(seed) = seed_used else { return };
    let Some(binding) = workflow.file_bindings.get("seed") else {
        return;
    };
    for node_id in &binding.nodes {
        let Some(node) = prompt.get_mut(node_id) else {
            continue;
        };
        let Some(inputs) = node::inputs_mut(node) else {
            continue;
        };
        node::set_field(inputs, binding.field.as_deref(), binding.fields.as_deref(), Value::from(seed));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::{InputType, NodeBinding, ParamType, ParameterDef};
    use serde_json::json;
    use std::collections::HashMap as Map;
    use std::path::PathBuf;

    fn base_workflow() -> WorkflowDefinition {
        let mut template_prompt = serde_json::Map::new();
        template_prompt.insert(
            "1".to_string(),
            json!({"class_type": "LoadImage", "inputs": {"image": ""}}),
        );
        template_prompt.insert(
            "2".to_string(),
            json!({"class_type": "EmptyLatentImage", "inputs": {"width": 512, "height": 512}}),
        );
        template_prompt.insert(
            "3".to_string(),
            json!({"class_type": "KSampler", "inputs": {"seed": 0, "steps": 20}}),
        );
        template_prompt.insert(
            "4".to_string(),
            json!({"class_type": "SaveImage", "inputs": {"filename_prefix": "out"}}),
        );

        let mut file_bindings = Map::new();
        file_bindings.insert(
            "load_image".to_string(),
            NodeBinding {
                nodes: vec!["1".to_string()],
                field: Some("image".to_string()),
                fields: None,
            },
        );
        file_bindings.insert(
            "seed".to_string(),
            NodeBinding {
                nodes: vec!["3".to_string()],
                field: Some("seed".to_string()),
                fields: None,
            },
        );
        file_bindings.insert(
            "output_prefix".to_string(),
            NodeBinding {
                nodes: vec!["4".to_string()],
                field: Some("filename_prefix".to_string()),
                fields: None,
            },
        );

        let mut parameters = Map::new();
        parameters.insert(
            "steps".to_string(),
            ParameterDef {
                name: "steps".to_string(),
                label: "Steps".to_string(),
                param_type: ParamType::Int,
                default: json!(20),
                min: Some(1.0),
                max: Some(150.0),
                nodes: Some(vec!["3".to_string()]),
                field: Some("steps".to_string()),
                fields: None,
            },
        );

        WorkflowDefinition {
            name: "t".into(),
            display_name: None,
            group: None,
            category: None,
            description: "t".into(),
            input_type: InputType::Image,
            input_extensions: vec![".png".into()],
            template_prompt,
            file_bindings,
            parameters,
            switch_states: vec![],
            model_rewire: vec![],
            move_processed: false,
            source_file: PathBuf::from("test.yaml"),
        }
    }

    fn single_pass_workflow() -> WorkflowDefinition {
        use crate::definition::{ModelRewireCandidate, ModelRewireTarget};

        let mut workflow = base_workflow();
        workflow.template_prompt.insert(
            "101".to_string(),
            json!({"class_type": "LoraLoaderModelOnly", "inputs": {}}),
        );
        workflow.template_prompt.insert(
            "102".to_string(),
            json!({"class_type": "LoraLoaderModelOnly", "inputs": {}}),
        );
        workflow.template_prompt.insert(
            "201".to_string(),
            json!({"class_type": "LoraLoaderModelOnly", "inputs": {"strength_model": 1.0}}),
        );
        workflow.template_prompt.insert(
            "103".to_string(),
            json!({"class_type": "KSampler", "inputs": {"model": ["102", 0]}}),
        );
        workflow.template_prompt.insert(
            "104".to_string(),
            json!({"class_type": "KSampler", "inputs": {"model": ["101", 0]}}),
        );

        workflow.parameters.insert(
            "extra_lora_strength_high".to_string(),
            ParameterDef {
                name: "extra_lora_strength_high".to_string(),
                label: "Extra LoRA strength".to_string(),
                param_type: ParamType::Float,
                default: json!(1.0),
                min: Some(0.0),
                max: Some(2.0),
                nodes: Some(vec!["201".to_string()]),
                field: Some("strength_model".to_string()),
                fields: None,
            },
        );

        workflow.model_rewire = vec![
            ModelRewireTarget {
                node_id: "104".to_string(),
                field: "model".to_string(),
                chain: vec![ModelRewireCandidate {
                    slot: "extra_lora".to_string(),
                    source_node: "201".to_string(),
                }],
                base: "101".to_string(),
            },
            ModelRewireTarget {
                node_id: "103".to_string(),
                field: "model".to_string(),
                chain: vec![ModelRewireCandidate {
                    slot: "extra_lora".to_string(),
                    source_node: "201".to_string(),
                }],
                base: "102".to_string(),
            },
        ];
        workflow
    }

    #[test]
    fn binds_input_and_params() {
        let workflow = base_workflow();
        let mut params = HashMap::new();
        params.insert("steps".to_string(), json!(33));
        let inputs = vec![(PathBuf::from("/orig/foo.png"), PathBuf::from("/staged/foo.png"))];

        let specs = build_prompts(&workflow, &inputs, &params, None, None, None, false).unwrap();
        assert_eq!(specs.len(), 1);
        assert_eq!(specs[0].prompt_json["1"]["inputs"]["image"], json!("/staged/foo.png"));
        assert_eq!(specs[0].prompt_json["3"]["inputs"]["steps"], json!(33));
        assert_eq!(specs[0].output_prefix, "foo");
    }

    #[test]
    fn no_input_synthesizes_one_iteration() {
        let workflow = base_workflow();
        let params = HashMap::new();
        let specs = build_prompts(&workflow, &[], &params, None, None, None, false).unwrap();
        assert_eq!(specs.len(), 1);
        assert_eq!(specs[0].input_file, "");
        assert_eq!(specs[0].output_prefix, "prompt");
    }

    #[test]
    fn tries_multiply_and_suffix_prefix() {
        let workflow = base_workflow();
        let mut params = HashMap::new();
        params.insert("tries".to_string(), json!(3));
        let inputs = vec![(PathBuf::from("/orig/foo.png"), PathBuf::from("/staged/foo.png"))];

        let specs = build_prompts(&workflow, &inputs, &params, None, None, None, false).unwrap();
        assert_eq!(specs.len(), 3);
        assert_eq!(specs[0].output_prefix, "foo_try01");
        assert_eq!(specs[2].output_prefix, "foo_try03");
        assert!(specs[0].seed_used.is_some());
        assert_ne!(specs[0].prompt_json["3"]["inputs"]["seed"], specs[1].prompt_json["3"]["inputs"]["seed"]);
    }

    #[test]
    fn resolution_applies_only_to_width_height_nodes() {
        let workflow = base_workflow();
        let mut params = HashMap::new();
        params.insert("steps".to_string(), json!(20));
        let inputs = vec![(PathBuf::from("/orig/foo.png"), PathBuf::from("/staged/foo.png"))];

        let specs = build_prompts(&workflow, &inputs, &params, None, None, Some((768, 1024)), true).unwrap();
        assert_eq!(specs[0].prompt_json["2"]["inputs"]["width"], json!(1024));
        assert_eq!(specs[0].prompt_json["2"]["inputs"]["height"], json!(768));
        assert!(specs[0].prompt_json["3"]["inputs"].get("width").is_none());
    }

    #[test]
    fn extra_lora_inactive_slot_zeroes_strength() {
        let workflow = base_workflow();
        let mut params = HashMap::new();
        params.insert("extra_lora_enabled".to_string(), json!(false));
        params.insert("extra_lora_strength_high".to_string(), json!(1.25));
        params.insert("extra_lora_strength_low".to_string(), json!(0.9));

        let mut effective = params.clone();
        apply_extra_lora_policy(&mut effective);
        assert_eq!(effective.get("extra_lora_strength_high"), Some(&json!(0.0)));
        assert_eq!(effective.get("extra_lora_strength_low"), Some(&json!(0.0)));
    }

    #[test]
    fn extra_lora_active_slot_passes_through() {
        let mut params = HashMap::new();
        params.insert("extra_lora_enabled".to_string(), json!(true));
        params.insert("extra_lora_name_high".to_string(), json!("foo.safetensors"));
        params.insert("extra_lora_name_low".to_string(), json!("bar.safetensors"));
        params.insert("extra_lora_strength_high".to_string(), json!(1.25));

        apply_extra_lora_policy(&mut params);
        assert_eq!(params.get("extra_lora_strength_high"), Some(&json!(1.25)));
    }

    #[test]
    fn model_rewire_falls_back_to_base_loaders_when_slot_inactive() {
        let workflow = single_pass_workflow();
        let mut params = HashMap::new();
        params.insert("extra_lora_enabled".to_string(), json!(false));
        let inputs = vec![(PathBuf::from("/orig/foo.png"), PathBuf::from("/staged/foo.png"))];

        let specs = build_prompts(&workflow, &inputs, &params, None, None, None, false).unwrap();
        assert_eq!(specs[0].prompt_json["104"]["inputs"]["model"], json!(["101", 0]));
        assert_eq!(specs[0].prompt_json["103"]["inputs"]["model"], json!(["102", 0]));
        assert_eq!(specs[0].prompt_json["201"]["inputs"]["strength_model"], json!(0.0));
    }

    #[test]
    fn model_rewire_points_at_active_slot() {
        let workflow = single_pass_workflow();
        let mut params = HashMap::new();
        params.insert("extra_lora_enabled".to_string(), json!(true));
        params.insert("extra_lora_name_high".to_string(), json!("foo.safetensors"));
        params.insert("extra_lora_name_low".to_string(), json!("bar.safetensors"));
        params.insert("extra_lora_strength_high".to_string(), json!(0.8));
        let inputs = vec![(PathBuf::from("/orig/foo.png"), PathBuf::from("/staged/foo.png"))];

        let specs = build_prompts(&workflow, &inputs, &params, None, None, None, false).unwrap();
        assert_eq!(specs[0].prompt_json["104"]["inputs"]["model"], json!(["201", 0]));
        assert_eq!(specs[0].prompt_json["103"]["inputs"]["model"], json!(["201", 0]));
        assert_eq!(specs[0].prompt_json["201"]["inputs"]["strength_model"], json!(0.8));
    }
}
