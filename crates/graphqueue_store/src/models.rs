//! Row types for the queue store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Job / Prompt lifecycle status. Stored as the literal lower-case token
/// so the HTTP surface can echo it verbatim without translation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Pending,
    Running,
    Succeeded,
    Failed,
    Canceled,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Pending => "pending",
            Status::Running => "running",
            Status::Succeeded => "succeeded",
            Status::Failed => "failed",
            Status::Canceled => "canceled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Status::Succeeded | Status::Failed | Status::Canceled)
    }
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Job {
    pub id: i64,
    pub workflow_name: String,
    pub job_name: Option<String>,
    pub status: Status,
    pub cancel_requested: bool,
    pub priority: i64,
    pub input_dir: String,
    pub params_json: String,
    pub move_processed: bool,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub log_path: Option<String>,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Prompt {
    pub id: i64,
    pub job_id: i64,
    pub input_file: String,
    pub prompt_json: String,
    pub status: Status,
    pub upstream_prompt_id: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub exit_status: Option<String>,
    pub error_detail: Option<String>,
    pub output_paths: String,
    pub seed_used: Option<i64>,
}

impl Prompt {
    pub fn output_paths_vec(&self) -> Vec<String> {
        serde_json::from_str(&self.output_paths).unwrap_or_default()
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct InputDirHistoryRow {
    pub path: String,
    pub last_used_at: DateTime<Utc>,
    pub use_count: i64,
}

#[derive(Debug, Clone, FromRow)]
pub struct PromptPresetRow {
    pub name: String,
    pub mode: String,
    pub positive: String,
    pub negative: String,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct SettingsPresetRow {
    pub name: String,
    pub payload: String,
    pub updated_at: DateTime<Utc>,
}

/// Aggregate pending/running counts over all prompts.
#[derive(Debug, Clone, Copy, FromRow)]
pub struct QueueCounts {
    pub pending: i64,
    pub running: i64,
}

/// Summary returned by `cancel_job`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelMode {
    Immediate,
    CancelAfterCurrent,
}

#[derive(Debug, Clone, Copy)]
pub struct CancelSummary {
    pub mode: CancelMode,
    pub canceled_pending: i64,
    pub running_prompts: i64,
}

/// One prompt to insert as part of `create_job`, produced by the
/// materializer.
#[derive(Debug, Clone, Default)]
pub struct NewPrompt {
    pub input_file: String,
    pub prompt_json: String,
    pub seed_used: Option<i64>,
}
