//! Route handlers. Each function maps one HTTP endpoint onto calls into
//! `graphqueue_store`/`graphqueue_workflows`/`graphqueue_upstream`; no
//! handler here computes anything the core crates don't already compute.

use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};

use graphqueue_store::CancelMode;

use crate::dto::{
    CancelResponse, HealthResponse, InputDirHistoryEntry, JobDetail, JobView, ListJobsQuery,
    NormalizeInputDirRequest, NormalizeInputDirResponse, ParameterSummary, PromptPresetView,
    PromptView, SavePromptPresetRequest, SaveSettingsPresetRequest, SettingsPresetView,
    SubmitJobRequest, SubmitJobResponse, WorkflowSummary,
};
use crate::error::ApiError;
use crate::inputpath::normalize_input_dir;
use crate::state::{AppState, RESOLUTION_PRESETS};
use crate::submit;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/workflows", get(list_workflows))
        .route("/api/resolution-presets", get(list_resolution_presets))
        .route("/api/jobs", get(list_jobs).post(create_job))
        .route("/api/jobs/:id", get(get_job))
        .route("/api/jobs/:id/cancel", post(cancel_job))
        .route("/api/jobs/:id/retry", post(retry_job))
        .route("/api/jobs/:id/prompts/:prompt_id/log", get(prompt_log))
        .route("/api/queue/pause", post(pause_queue))
        .route("/api/queue/resume", post(resume_queue))
        .route("/api/queue/clear", post(clear_queue))
        .route("/api/health", get(health))
        .route("/api/input-dir-history", get(input_dir_history))
        .route("/api/input-dirs/normalize", post(normalize_input_dir_route))
        .route("/api/presets/prompt", get(list_prompt_presets).post(save_prompt_preset))
        .route("/api/presets/settings", get(list_settings_presets).post(save_settings_preset))
        .layer(tower_http::cors::CorsLayer::permissive())
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(state)
}

async fn list_workflows(State(state): State<AppState>) -> Json<Vec<WorkflowSummary>> {
    let summaries = state
        .workflows
        .iter()
        .map(|wf| WorkflowSummary {
            name: wf.name.clone(),
            display_name: wf.display_name.clone(),
            group: wf.group.clone(),
            category: wf.category.clone(),
            description: wf.description.clone(),
            input_type: match wf.input_type {
                graphqueue_workflows::InputType::Image => "image",
                graphqueue_workflows::InputType::Video => "video",
                graphqueue_workflows::InputType::None => "none",
            },
            input_extensions: wf.input_extensions.clone(),
            parameters: wf
                .parameters
                .values()
                .map(|p| ParameterSummary {
                    name: p.name.clone(),
                    label: p.label.clone(),
                    param_type: match p.param_type {
                        graphqueue_workflows::ParamType::Text => "text",
                        graphqueue_workflows::ParamType::Bool => "bool",
                        graphqueue_workflows::ParamType::Int => "int",
                        graphqueue_workflows::ParamType::Float => "float",
                    },
                    default: p.default.clone(),
                    min: p.min,
                    max: p.max,
                })
                .collect(),
        })
        .collect();
    Json(summaries)
}

async fn list_resolution_presets() -> Json<&'static [crate::state::ResolutionPreset]> {
    Json(RESOLUTION_PRESETS)
}

async fn create_job(
    State(state): State<AppState>,
    Json(request): Json<SubmitJobRequest>,
) -> Result<Json<SubmitJobResponse>, ApiError> {
    let job_ids = submit::submit_job(&state, request).await?;
    Ok(Json(SubmitJobResponse { job_ids }))
}

async fn list_jobs(
    State(state): State<AppState>,
    Query(query): Query<ListJobsQuery>,
) -> Result<Json<Vec<JobView>>, ApiError> {
    let jobs = state.store.list_jobs(query.status, query.limit).await?;
    Ok(Json(jobs.into_iter().map(JobView::from).collect()))
}

async fn get_job(State(state): State<AppState>, Path(id): Path<i64>) -> Result<Json<JobDetail>, ApiError> {
    let job = state.store.get_job(id).await?;
    let prompts = state.store.get_prompts_for_job(id).await?;
    Ok(Json(JobDetail {
        job: JobView::from(job),
        prompts: prompts.into_iter().map(PromptView::from).collect(),
    }))
}

async fn cancel_job(State(state): State<AppState>, Path(id): Path<i64>) -> Result<Json<CancelResponse>, ApiError> {
    let summary = state.store.cancel_job(id).await?;
    Ok(Json(CancelResponse {
        mode: match summary.mode {
            CancelMode::Immediate => "immediate",
            CancelMode::CancelAfterCurrent => "cancel-after-current",
        },
        canceled_pending: summary.canceled_pending,
        running_prompts: summary.running_prompts,
    }))
}

async fn retry_job(State(state): State<AppState>, Path(id): Path<i64>) -> Result<impl IntoResponse, ApiError> {
    state.store.retry_job(id).await?;
    Ok(Json(JobView::from(state.store.get_job(id).await?)))
}

async fn prompt_log(
    State(state): State<AppState>,
    Path((job_id, prompt_id)): Path<(i64, i64)>,
) -> Result<String, ApiError> {
    // `job_id` is kept in the route only to disambiguate log file naming;
    // the prompt row itself carries the authoritative job_id.
    let prompt = state.store.get_prompt(prompt_id).await?;
    if prompt.job_id != job_id {
        return Err(ApiError::not_found(format!("prompt {prompt_id} not found under job {job_id}")));
    }
    let log_path = state.log_path(job_id, prompt_id);
    match tokio::fs::read_to_string(&log_path).await {
        Ok(contents) => Ok(contents),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(String::new()),
        Err(e) => Err(ApiError::new(axum::http::StatusCode::INTERNAL_SERVER_ERROR, e.to_string())),
    }
}

async fn pause_queue(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    state.store.pause().await?;
    Ok(Json(serde_json::json!({ "paused": true })))
}

async fn resume_queue(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    state.store.resume().await?;
    Ok(Json(serde_json::json!({ "paused": false })))
}

async fn clear_queue(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let canceled = state.store.clear_queue().await?;
    Ok(Json(serde_json::json!({ "canceled_jobs": canceled })))
}

async fn health(State(state): State<AppState>) -> Result<Json<HealthResponse>, ApiError> {
    let counts = state.store.queue_counts().await?;
    let paused = state.store.is_paused().await?;
    let upstream_ok = state.upstream.health().await;
    Ok(Json(HealthResponse {
        upstream: upstream_ok,
        worker: if paused { "paused" } else { "running" },
        pending: counts.pending,
        running: counts.running,
    }))
}

async fn input_dir_history(State(state): State<AppState>) -> Result<Json<Vec<InputDirHistoryEntry>>, ApiError> {
    let rows = state.store.list_input_dir_history(20).await?;
    Ok(Json(
        rows.into_iter()
            .map(|row| InputDirHistoryEntry {
                path: row.path,
                last_used_at: row.last_used_at,
                use_count: row.use_count,
            })
            .collect(),
    ))
}

async fn normalize_input_dir_route(
    Json(request): Json<NormalizeInputDirRequest>,
) -> Result<Json<NormalizeInputDirResponse>, ApiError> {
    let normalized = normalize_input_dir(&request.path)?;
    Ok(Json(NormalizeInputDirResponse {
        normalized_path: normalized.to_string_lossy().to_string(),
    }))
}

async fn list_prompt_presets(State(state): State<AppState>) -> Result<Json<Vec<PromptPresetView>>, ApiError> {
    let rows = state.store.list_prompt_presets(50, None).await?;
    Ok(Json(
        rows.into_iter()
            .map(|row| PromptPresetView {
                name: row.name,
                mode: row.mode,
                positive: row.positive,
                negative: row.negative,
                updated_at: row.updated_at,
            })
            .collect(),
    ))
}

async fn save_prompt_preset(
    State(state): State<AppState>,
    Json(request): Json<SavePromptPresetRequest>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .store
        .save_prompt_preset(&request.name, &request.mode, &request.positive, &request.negative)
        .await?;
    Ok(Json(serde_json::json!({ "saved": true })))
}

async fn list_settings_presets(State(state): State<AppState>) -> Result<Json<Vec<SettingsPresetView>>, ApiError> {
    let rows = state.store.list_settings_presets(50).await?;
    rows.into_iter()
        .map(|row| {
            let payload = serde_json::from_str(&row.payload)
                .map_err(|e| ApiError::new(axum::http::StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
            Ok(SettingsPresetView {
                name: row.name,
                payload,
                updated_at: row.updated_at,
            })
        })
        .collect::<Result<Vec<_>, ApiError>>()
        .map(Json)
}

async fn save_settings_preset(
    State(state): State<AppState>,
    Json(request): Json<SaveSettingsPresetRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let payload = serde_json::to_string(&request.payload)
        .map_err(|e| ApiError::new(axum::http::StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    state.store.save_settings_preset(&request.name, &payload).await?;
    Ok(Json(serde_json::json!({ "saved": true })))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use graphqueue_store::{create_pool, DbConfig, QueueStore};
    use graphqueue_upstream::UpstreamClient;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use super::build_router;
    use crate::state::AppState;

    const NO_INPUT_WORKFLOW: &str = r#"
name: upscale-none
description: a workflow that takes no input file
input_type: none
input_extensions: []
template_inline:
  "1":
    class_type: KSampler
    inputs:
      seed: 0
"#;

    async fn test_state(workflow_yaml: &str) -> (AppState, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("wf.yaml"), workflow_yaml).unwrap();
        let workflows = graphqueue_workflows::load_all(dir.path()).unwrap();

        let pool = create_pool(DbConfig::memory()).await.unwrap();
        let store = QueueStore::new(pool);
        // Nothing listens on this port; UpstreamClient::health() degrades to
        // `false` on a connection failure rather than erroring.
        let upstream = UpstreamClient::new("http://127.0.0.1:1").unwrap();

        let state = AppState {
            store,
            upstream,
            workflows: Arc::new(workflows),
            data_dir: dir.path().to_path_buf(),
            upstream_input_root: None,
        };
        (state, dir)
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn list_workflows_returns_loaded_definitions() {
        let (state, _dir) = test_state(NO_INPUT_WORKFLOW).await;
        let app = build_router(state);

        let response = app
            .oneshot(Request::builder().uri("/api/workflows").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        let list = body.as_array().unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0]["name"], "upscale-none");
        assert_eq!(list[0]["input_type"], "none");
    }

    #[tokio::test]
    async fn health_reports_queue_counts_and_unreachable_upstream() {
        let (state, _dir) = test_state(NO_INPUT_WORKFLOW).await;
        let app = build_router(state);

        let response = app
            .oneshot(Request::builder().uri("/api/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["upstream"], false);
        assert_eq!(body["worker"], "running");
        assert_eq!(body["pending"], 0);
        assert_eq!(body["running"], 0);
    }

    #[tokio::test]
    async fn create_job_rejects_unknown_workflow() {
        let (state, _dir) = test_state(NO_INPUT_WORKFLOW).await;
        let app = build_router(state);

        let request = Request::builder()
            .method("POST")
            .uri("/api/jobs")
            .header("content-type", "application/json")
            .body(Body::from(
                json!({ "workflow_name": "does-not-exist" }).to_string(),
            ))
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn create_job_then_fetch_detail_roundtrips_a_single_prompt() {
        let (state, _dir) = test_state(NO_INPUT_WORKFLOW).await;
        let app = build_router(state);

        let submit = Request::builder()
            .method("POST")
            .uri("/api/jobs")
            .header("content-type", "application/json")
            .body(Body::from(
                json!({ "workflow_name": "upscale-none" }).to_string(),
            ))
            .unwrap();
        let response = app.clone().oneshot(submit).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        let job_id = body["job_ids"][0].as_i64().unwrap();

        let detail_req = Request::builder()
            .uri(format!("/api/jobs/{job_id}"))
            .body(Body::empty())
            .unwrap();
        let detail_resp = app.oneshot(detail_req).await.unwrap();
        assert_eq!(detail_resp.status(), StatusCode::OK);
        let detail = body_json(detail_resp).await;
        assert_eq!(detail["status"], "pending");
        assert_eq!(detail["prompts"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn normalize_input_dir_strips_quoting() {
        let (state, _dir) = test_state(NO_INPUT_WORKFLOW).await;
        let app = build_router(state);

        let request = Request::builder()
            .method("POST")
            .uri("/api/input-dirs/normalize")
            .header("content-type", "application/json")
            .body(Body::from(json!({ "path": "  \"/tmp/inputs\"  " }).to_string()))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["normalized_path"], "/tmp/inputs");
    }

    #[tokio::test]
    async fn get_job_for_missing_id_is_404() {
        let (state, _dir) = test_state(NO_INPUT_WORKFLOW).await;
        let app = build_router(state);

        let response = app
            .oneshot(Request::builder().uri("/api/jobs/999").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn pause_then_resume_round_trips_through_health() {
        let (state, _dir) = test_state(NO_INPUT_WORKFLOW).await;
        let app = build_router(state);

        let pause_resp = app
            .clone()
            .oneshot(Request::builder().method("POST").uri("/api/queue/pause").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(pause_resp.status(), StatusCode::OK);

        let health_resp = app
            .clone()
            .oneshot(Request::builder().uri("/api/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let health = body_json(health_resp).await;
        assert_eq!(health["worker"], "paused");

        let resume_resp = app
            .oneshot(Request::builder().method("POST").uri("/api/queue/resume").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resume_resp.status(), StatusCode::OK);
    }
}
