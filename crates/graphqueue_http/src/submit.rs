//! Job submission orchestration: the one place request validation, input
//! discovery, staging, and prompt materialization meet before a job lands
//! in the store. Every step below delegates to `graphqueue_workflows` or
//! `graphqueue_store`; this module only sequences them.

use std::path::{Path, PathBuf};

use graphqueue_store::NewPrompt;
use graphqueue_workflows::{self as workflows, InputType, WorkflowDefinition};

use crate::dto::{PromptMode, SubmitJobRequest};
use crate::error::ApiError;
use crate::inputpath::normalize_input_dir;
use crate::state::{resolution_preset, AppState};

pub async fn submit_job(state: &AppState, request: SubmitJobRequest) -> Result<Vec<i64>, ApiError> {
    let workflow = state
        .workflow(&request.workflow_name)
        .ok_or_else(|| ApiError::bad_request(format!("unknown workflow '{}'", request.workflow_name)))?
        .clone();

    validate_prompt_mode(&request)?;

    let resolved = workflows::resolve(&workflow, &request.params)?;

    let resolution = match &request.resolution_preset {
        Some(id) => Some(
            resolution_preset(id)
                .ok_or_else(|| ApiError::bad_request(format!("unknown resolution preset '{id}'")))?,
        ),
        None => None,
    };

    let normalized_input_dir = request.input_dir.as_deref().map(normalize_input_dir).transpose()?;
    let normalized_input_file = request.input_file.as_deref().map(normalize_input_dir).transpose()?;

    let originals = discover_inputs(&workflow, normalized_input_dir.as_deref(), normalized_input_file.as_deref())?;

    if let Some(dir) = &normalized_input_dir {
        state.store.touch_input_dir_history(&dir.to_string_lossy()).await?;
    }

    let staged: Vec<(PathBuf, PathBuf)> = if originals.is_empty() {
        Vec::new()
    } else {
        let batch_token = workflows::new_batch_token();
        let staging_root = state.staging_root();
        originals
            .iter()
            .map(|original| {
                let staged = workflows::stage_file(&staging_root, &batch_token, original)?;
                Ok((original.clone(), staged.staged_path))
            })
            .collect::<Result<Vec<_>, workflows::StageError>>()?
    };

    let input_dir = normalized_input_dir
        .as_ref()
        .map(|p| p.to_string_lossy().to_string())
        .or_else(|| {
            normalized_input_file
                .as_ref()
                .and_then(|f| f.parent().map(|p| p.to_string_lossy().to_string()))
        })
        .unwrap_or_default();

    let params_json = serde_json::to_string(&resolved).map_err(|e| {
        ApiError::new(axum::http::StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
    })?;

    let groups: Vec<Vec<(PathBuf, PathBuf)>> = if request.split_by_input && !staged.is_empty() {
        staged.into_iter().map(|pair| vec![pair]).collect()
    } else {
        vec![staged]
    };

    let mut job_ids = Vec::with_capacity(groups.len());
    for group in groups {
        let specs = workflows::build_prompts(
            &workflow,
            &group,
            &resolved,
            request.per_file_params.as_ref(),
            state.upstream_input_root.as_deref(),
            resolution,
            request.flip_orientation,
        )?;

        let new_prompts: Vec<NewPrompt> = specs
            .into_iter()
            .map(|spec| {
                Ok(NewPrompt {
                    input_file: spec.input_file,
                    prompt_json: serde_json::to_string(&spec.prompt_json).map_err(|e| {
                        ApiError::new(axum::http::StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
                    })?,
                    seed_used: spec.seed_used,
                })
            })
            .collect::<Result<Vec<_>, ApiError>>()?;

        let job_id = state
            .store
            .create_job(
                &workflow.name,
                request.job_name.as_deref(),
                &input_dir,
                &params_json,
                &new_prompts,
                request.priority,
                request.move_processed,
            )
            .await?;
        job_ids.push(job_id);
    }

    Ok(job_ids)
}

fn validate_prompt_mode(request: &SubmitJobRequest) -> Result<(), ApiError> {
    let Some(mode) = request.prompt_mode else {
        return Ok(());
    };
    let requires_per_file = matches!(mode, PromptMode::PerImageManual | PromptMode::PerImageAuto);
    if requires_per_file && request.per_file_params.as_ref().map(|m| m.is_empty()).unwrap_or(true) {
        return Err(ApiError::bad_request(
            "per_file_params must be non-empty for a per-image prompt mode",
        ));
    }
    Ok(())
}

/// Resolve the job's input set: a directory scan, a single file, or
/// nothing for `input_type: none` workflows. Validates extensions against
/// the workflow's declared `input_extensions`.
fn discover_inputs(
    workflow: &WorkflowDefinition,
    input_dir: Option<&Path>,
    input_file: Option<&Path>,
) -> Result<Vec<PathBuf>, ApiError> {
    if workflow.input_type == InputType::None {
        if input_dir.is_some() || input_file.is_some() {
            return Err(ApiError::bad_request(format!(
                "workflow '{}' does not accept an input",
                workflow.name
            )));
        }
        return Ok(Vec::new());
    }

    match (input_dir, input_file) {
        (Some(_), Some(_)) => Err(ApiError::bad_request(
            "provide exactly one of input_dir or input_file",
        )),
        (None, None) => Err(ApiError::bad_request(format!(
            "workflow '{}' requires input_dir or input_file",
            workflow.name
        ))),
        (Some(dir), None) => scan_directory(dir, workflow),
        (None, Some(file)) => {
            check_extension(file, workflow)?;
            if !file.is_file() {
                return Err(ApiError::bad_request(format!(
                    "input_file does not exist: {}",
                    file.display()
                )));
            }
            Ok(vec![file.to_path_buf()])
        }
    }
}

fn scan_directory(dir: &Path, workflow: &WorkflowDefinition) -> Result<Vec<PathBuf>, ApiError> {
    if !dir.is_dir() {
        return Err(ApiError::bad_request(format!(
            "input_dir does not exist: {}",
            dir.display()
        )));
    }

    let mut matches: Vec<PathBuf> = std::fs::read_dir(dir)
        .map_err(|e| ApiError::bad_request(format!("failed to read input_dir: {e}")))?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && check_extension(path, workflow).is_ok())
        .collect();
    matches.sort();

    if matches.is_empty() {
        return Err(ApiError::bad_request(format!(
            "no files with extensions {:?} found in {}",
            workflow.input_extensions,
            dir.display()
        )));
    }

    Ok(matches)
}

fn check_extension(path: &Path, workflow: &WorkflowDefinition) -> Result<(), ApiError> {
    let ext = path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy().to_ascii_lowercase()))
        .unwrap_or_default();
    let allowed = workflow
        .input_extensions
        .iter()
        .any(|allowed| allowed.eq_ignore_ascii_case(&ext));
    if allowed {
        Ok(())
    } else {
        Err(ApiError::bad_request(format!(
            "'{}' has an unsupported extension for workflow '{}'",
            path.display(),
            workflow.name
        )))
    }
}
