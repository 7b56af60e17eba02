//! Shared application state handed to every handler via `State<AppState>`.

use std::path::PathBuf;
use std::sync::Arc;

use graphqueue_store::QueueStore;
use graphqueue_upstream::UpstreamClient;
use graphqueue_workflows::WorkflowDefinition;

/// One entry in the fixed resolution-preset table: a static `{id, label,
/// width, height}` list, unlike prompt/settings presets which are
/// database-backed.
#[derive(Debug, Clone, Copy, serde::Serialize)]
pub struct ResolutionPreset {
    pub id: &'static str,
    pub label: &'static str,
    pub width: i64,
    pub height: i64,
}

pub const RESOLUTION_PRESETS: &[ResolutionPreset] = &[
    ResolutionPreset { id: "sd-square", label: "Square (768x768)", width: 768, height: 768 },
    ResolutionPreset { id: "sd-portrait", label: "Portrait (768x1152)", width: 768, height: 1152 },
    ResolutionPreset { id: "sd-landscape", label: "Landscape (1152x768)", width: 1152, height: 768 },
    ResolutionPreset { id: "hd-portrait", label: "HD Portrait (1080x1920)", width: 1080, height: 1920 },
    ResolutionPreset { id: "hd-landscape", label: "HD Landscape (1920x1080)", width: 1920, height: 1080 },
];

pub fn resolution_preset(id: &str) -> Option<(i64, i64)> {
    RESOLUTION_PRESETS
        .iter()
        .find(|p| p.id == id)
        .map(|p| (p.width, p.height))
}

#[derive(Clone)]
pub struct AppState {
    pub store: QueueStore,
    pub upstream: UpstreamClient,
    pub workflows: Arc<Vec<WorkflowDefinition>>,
    /// Root the worker loop logs under: `{data_dir}/logs/{job}_{prompt}.log`.
    pub data_dir: PathBuf,
    /// The graph runner's own input directory, if it differs from ours.
    /// Staged files are written under `{upstream_input_root}/staging/...`.
    pub upstream_input_root: Option<PathBuf>,
}

impl AppState {
    pub fn workflow(&self, name: &str) -> Option<&WorkflowDefinition> {
        self.workflows.iter().find(|w| w.name == name)
    }

    pub fn staging_root(&self) -> PathBuf {
        match &self.upstream_input_root {
            Some(root) => root.join("staging"),
            None => self.data_dir.join("staging"),
        }
    }

    pub fn log_path(&self, job_id: i64, prompt_id: i64) -> PathBuf {
        graphqueue_logging::logs_dir(&self.data_dir).join(format!("{job_id}_{prompt_id}.log"))
    }
}
