//! Request/response shapes for the HTTP adapter. These are pure
//! translation types: every field maps onto a core call's parameters or a
//! store row's columns, nothing is computed here.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use graphqueue_store::{Job, Prompt, Status};

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum PromptMode {
    Manual,
    #[serde(rename = "per-image manual")]
    PerImageManual,
    #[serde(rename = "per-image auto")]
    PerImageAuto,
}

/// `POST /api/jobs`. Exactly one of `input_dir`/`input_file` is expected
/// for workflows with an `input_type`; both absent is valid only for
/// `input_type: none` workflows.
#[derive(Debug, Deserialize, Default)]
pub struct SubmitJobRequest {
    pub workflow_name: String,
    pub job_name: Option<String>,
    pub input_dir: Option<String>,
    pub input_file: Option<String>,
    #[serde(default)]
    pub params: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    pub priority: i64,
    pub resolution_preset: Option<String>,
    #[serde(default)]
    pub flip_orientation: bool,
    #[serde(default)]
    pub move_processed: bool,
    #[serde(default)]
    pub split_by_input: bool,
    pub per_file_params: Option<HashMap<String, serde_json::Map<String, serde_json::Value>>>,
    pub prompt_mode: Option<PromptMode>,
}

#[derive(Debug, Serialize)]
pub struct SubmitJobResponse {
    pub job_ids: Vec<i64>,
}

#[derive(Debug, Serialize)]
pub struct WorkflowSummary {
    pub name: String,
    pub display_name: Option<String>,
    pub group: Option<String>,
    pub category: Option<String>,
    pub description: String,
    pub input_type: &'static str,
    pub input_extensions: Vec<String>,
    pub parameters: Vec<ParameterSummary>,
}

#[derive(Debug, Serialize)]
pub struct ParameterSummary {
    pub name: String,
    pub label: String,
    #[serde(rename = "type")]
    pub param_type: &'static str,
    pub default: serde_json::Value,
    pub min: Option<f64>,
    pub max: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct JobView {
    pub id: i64,
    pub workflow_name: String,
    pub job_name: Option<String>,
    pub status: Status,
    pub cancel_requested: bool,
    pub priority: i64,
    pub input_dir: String,
    pub params: serde_json::Value,
    pub move_processed: bool,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub log_path: Option<String>,
}

impl From<Job> for JobView {
    fn from(job: Job) -> Self {
        let params = serde_json::from_str(&job.params_json).unwrap_or(serde_json::Value::Null);
        Self {
            id: job.id,
            workflow_name: job.workflow_name,
            job_name: job.job_name,
            status: job.status,
            cancel_requested: job.cancel_requested,
            priority: job.priority,
            input_dir: job.input_dir,
            params,
            move_processed: job.move_processed,
            created_at: job.created_at,
            started_at: job.started_at,
            finished_at: job.finished_at,
            last_error: job.last_error,
            log_path: job.log_path,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PromptView {
    pub id: i64,
    pub job_id: i64,
    pub input_file: String,
    /// Serialized graph payload, kept as a JSON string rather than a
    /// nested value so the wire shape matches what the store persists.
    pub prompt_json: String,
    pub status: Status,
    pub upstream_prompt_id: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub exit_status: Option<String>,
    pub error_detail: Option<String>,
    pub output_paths: Vec<String>,
    pub seed_used: Option<i64>,
}

impl From<Prompt> for PromptView {
    fn from(prompt: Prompt) -> Self {
        let output_paths = prompt.output_paths_vec();
        Self {
            id: prompt.id,
            job_id: prompt.job_id,
            input_file: prompt.input_file,
            prompt_json: prompt.prompt_json,
            status: prompt.status,
            upstream_prompt_id: prompt.upstream_prompt_id,
            started_at: prompt.started_at,
            finished_at: prompt.finished_at,
            exit_status: prompt.exit_status,
            error_detail: prompt.error_detail,
            output_paths,
            seed_used: prompt.seed_used,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct JobDetail {
    #[serde(flatten)]
    pub job: JobView,
    pub prompts: Vec<PromptView>,
}

#[derive(Debug, Deserialize)]
pub struct ListJobsQuery {
    pub status: Option<Status>,
    #[serde(default = "default_list_limit")]
    pub limit: i64,
}

fn default_list_limit() -> i64 {
    100
}

#[derive(Debug, Serialize)]
pub struct CancelResponse {
    pub mode: &'static str,
    pub canceled_pending: i64,
    pub running_prompts: i64,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub upstream: bool,
    pub worker: &'static str,
    pub pending: i64,
    pub running: i64,
}

#[derive(Debug, Serialize)]
pub struct InputDirHistoryEntry {
    pub path: String,
    pub last_used_at: DateTime<Utc>,
    pub use_count: i64,
}

#[derive(Debug, Deserialize)]
pub struct NormalizeInputDirRequest {
    pub path: String,
}

#[derive(Debug, Serialize)]
pub struct NormalizeInputDirResponse {
    pub normalized_path: String,
}

#[derive(Debug, Deserialize)]
pub struct SavePromptPresetRequest {
    pub name: String,
    pub mode: String,
    #[serde(default)]
    pub positive: String,
    #[serde(default)]
    pub negative: String,
}

#[derive(Debug, Serialize)]
pub struct PromptPresetView {
    pub name: String,
    pub mode: String,
    pub positive: String,
    pub negative: String,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct SaveSettingsPresetRequest {
    pub name: String,
    pub payload: serde_json::Value,
}

#[derive(Debug, Serialize)]
pub struct SettingsPresetView {
    pub name: String,
    pub payload: serde_json::Value,
    pub updated_at: DateTime<Utc>,
}
