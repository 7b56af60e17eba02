//! The single long-running worker loop: claims pending prompts, dispatches
//! them upstream, polls to completion, and reconciles `running` prompts
//! against upstream state on startup and each loop iteration. Runs as an
//! owned `tokio::task` driven by a cooperative `StopToken`.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use graphqueue_store::{PromptStatusUpdate, QueueStore, Status};
use graphqueue_upstream::{UpstreamClient, UpstreamError};
use serde_json::Value;
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::cancel::StopToken;
use crate::mover::move_processed;

const BACKOFF_SECONDS: &[u64] = &[5, 10, 30, 60];
const IDLE_SLEEP: Duration = Duration::from_secs(1);
const PAUSED_SLEEP: Duration = Duration::from_secs(1);

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub data_dir: PathBuf,
    pub poll_interval: Duration,
    pub poll_timeout: Duration,
}

pub struct Worker {
    store: QueueStore,
    upstream: UpstreamClient,
    config: WorkerConfig,
    stop: StopToken,
    running: Arc<Mutex<bool>>,
}

impl Worker {
    pub fn new(store: QueueStore, upstream: UpstreamClient, config: WorkerConfig) -> Self {
        Self {
            store,
            upstream,
            config,
            stop: StopToken::new(),
            running: Arc::new(Mutex::new(false)),
        }
    }

    pub fn stop_token(&self) -> StopToken {
        self.stop.clone()
    }

    pub async fn is_running(&self) -> bool {
        *self.running.lock().await
    }

    /// Run the worker loop to completion (i.e. until stopped). Intended to
    /// be spawned as one `tokio::task`.
    pub async fn run(&self) {
        *self.running.lock().await = true;

        if let Err(e) = self.startup_reconciliation().await {
            error!(error = %e, "startup reconciliation failed");
        }

        let mut backoff_index = 0usize;

        while !self.stop.is_stopped() {
            if self.store.is_paused().await.unwrap_or(false) {
                tokio::time::sleep(PAUSED_SLEEP).await;
                continue;
            }

            if !self.upstream.health().await {
                let delay = BACKOFF_SECONDS[backoff_index.min(BACKOFF_SECONDS.len() - 1)];
                warn!(delay, "upstream unhealthy, backing off");
                backoff_index = (backoff_index + 1).min(BACKOFF_SECONDS.len() - 1);
                tokio::time::sleep(Duration::from_secs(delay)).await;
                continue;
            }
            backoff_index = 0;

            if let Err(e) = self.reconcile_running(false).await {
                warn!(error = %e, "in-loop reconciliation failed");
            }

            let claimed = match self.store.next_pending_prompt(None).await {
                Ok(p) => p,
                Err(e) => {
                    error!(error = %e, "failed to claim next prompt");
                    tokio::time::sleep(IDLE_SLEEP).await;
                    continue;
                }
            };

            let Some(prompt) = claimed else {
                tokio::time::sleep(IDLE_SLEEP).await;
                continue;
            };

            self.dispatch(prompt).await;
        }

        *self.running.lock().await = false;
    }

    pub async fn stop(&self, timeout: Duration) {
        self.stop.stop();
        let deadline = tokio::time::Instant::now() + timeout;
        while self.is_running().await && tokio::time::Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    }

    async fn dispatch(&self, prompt: graphqueue_store::Prompt) {
        let job_id = prompt.job_id;

        match self.store.is_cancel_requested(job_id).await {
            Ok(true) => {
                let _ = self
                    .store
                    .update_prompt_status(
                        prompt.id,
                        Status::Canceled,
                        PromptStatusUpdate {
                            finished_at: Some(Utc::now()),
                            ..Default::default()
                        },
                    )
                    .await;
                let _ = self.store.update_job_status(job_id).await;
                return;
            }
            Ok(false) => {}
            Err(e) => {
                error!(error = %e, job_id, "failed to check cancel_requested");
                return;
            }
        }

        let started_at = Utc::now();
        if let Err(e) = self
            .store
            .update_prompt_status(
                prompt.id,
                Status::Running,
                PromptStatusUpdate {
                    started_at: Some(started_at),
                    ..Default::default()
                },
            )
            .await
        {
            error!(error = %e, prompt_id = prompt.id, "failed to mark prompt running");
            return;
        }
        let _ = self.store.update_job_status(job_id).await;

        let graph: Value = match serde_json::from_str(&prompt.prompt_json) {
            Ok(v) => v,
            Err(e) => {
                self.finish_failed(&prompt, "exception", &e.to_string()).await;
                return;
            }
        };

        let outcome = self.execute(&graph).await;

        match outcome {
            Ok((upstream_id, ok, status_str, outputs)) => {
                let log_line = format!(
                    "[{}] prompt {} upstream={} status={}\n",
                    Utc::now().to_rfc3339(),
                    prompt.id,
                    upstream_id,
                    status_str
                );
                self.append_log(job_id, prompt.id, &log_line).await;

                if ok {
                    let _ = self
                        .store
                        .update_prompt_status(
                            prompt.id,
                            Status::Succeeded,
                            PromptStatusUpdate {
                                upstream_prompt_id: Some(upstream_id),
                                finished_at: Some(Utc::now()),
                                exit_status: Some(status_str),
                                output_paths: Some(outputs),
                                ..Default::default()
                            },
                        )
                        .await;
                } else {
                    let _ = self
                        .store
                        .update_prompt_status(
                            prompt.id,
                            Status::Failed,
                            PromptStatusUpdate {
                                upstream_prompt_id: Some(upstream_id),
                                finished_at: Some(Utc::now()),
                                exit_status: Some(status_str),
                                ..Default::default()
                            },
                        )
                        .await;
                }
            }
            Err(e) => {
                self.finish_failed(&prompt, e.exit_status(), &e.to_string()).await;
            }
        }

        if self.store.is_cancel_requested(job_id).await.unwrap_or(false) {
            let _ = self.store.cancel_pending_prompts(job_id).await;
        }

        let new_status = self.store.update_job_status(job_id).await.ok();

        if new_status == Some(Status::Succeeded) {
            if let Ok(job) = self.store.get_job(job_id).await {
                if job.move_processed {
                    if let Err(e) = move_processed(&self.store, &job).await {
                        warn!(error = %e, job_id, "move-processed failed");
                    }
                }
            }
        }
    }

    async fn execute(
        &self,
        graph: &Value,
    ) -> Result<(String, bool, String, Vec<String>), UpstreamError> {
        let upstream_id = self.upstream.queue_prompt(graph).await?;
        let (ok, status_str) = self
            .upstream
            .poll_until_done(&upstream_id, Some(self.config.poll_interval), Some(self.config.poll_timeout))
            .await?;
        let outputs = if ok { self.upstream.outputs(&upstream_id).await? } else { Vec::new() };
        Ok((upstream_id, ok, status_str, outputs))
    }

    async fn finish_failed(&self, prompt: &graphqueue_store::Prompt, exit_status: &str, detail: &str) {
        let _ = self
            .store
            .update_prompt_status(
                prompt.id,
                Status::Failed,
                PromptStatusUpdate {
                    finished_at: Some(Utc::now()),
                    exit_status: Some(exit_status.to_string()),
                    error_detail: Some(detail.to_string()),
                    ..Default::default()
                },
            )
            .await;
        let _ = self.store.update_job_status(prompt.job_id).await;
    }

    async fn append_log(&self, job_id: i64, prompt_id: i64, line: &str) {
        let logs_dir = self.config.data_dir.join("logs");
        if let Err(e) = fs::create_dir_all(&logs_dir).await {
            warn!(error = %e, "failed to create logs dir");
            return;
        }
        let log_path = logs_dir.join(format!("{job_id}_{prompt_id}.log"));
        if let Err(e) = append_file(&log_path, line).await {
            warn!(error = %e, "failed to append prompt log");
            return;
        }
        let _ = self.store.set_log_path(job_id, &log_path.to_string_lossy()).await;
    }

    /// Startup reconciliation: every `running` prompt is checked against
    /// upstream state before the loop begins.
    async fn startup_reconciliation(&self) -> Result<(), graphqueue_store::StoreError> {
        self.reconcile_running(true).await
    }

    /// Shared reconciliation pass. `strict` matches startup semantics
    /// (unknown-to-upstream => `failed(interrupted)`); the in-loop pass
    /// instead leaves ambiguous prompts untouched (best-effort).
    async fn reconcile_running(&self, strict: bool) -> Result<(), graphqueue_store::StoreError> {
        let running = self.store.list_running_prompts().await?;
        for prompt in running {
            self.reconcile_one(&prompt, strict).await;
        }
        Ok(())
    }

    async fn reconcile_one(&self, prompt: &graphqueue_store::Prompt, strict: bool) {
        let Some(upstream_id) = &prompt.upstream_prompt_id else {
            if strict {
                self.finish_failed(prompt, "interrupted", "prompt had no upstream id at restart").await;
            }
            return;
        };

        match self.upstream.history(upstream_id).await {
            Ok(Some(entry)) => {
                let status = entry.get("status").cloned().unwrap_or(Value::Null);
                let completed = status.get("completed").and_then(|v| v.as_bool()).unwrap_or(false);
                let status_str = status
                    .get("status_str")
                    .and_then(|v| v.as_str())
                    .unwrap_or("running")
                    .to_string();

                if completed {
                    let outputs = self.upstream.outputs(upstream_id).await.unwrap_or_default();
                    let _ = self
                        .store
                        .update_prompt_status(
                            prompt.id,
                            Status::Succeeded,
                            PromptStatusUpdate {
                                finished_at: Some(Utc::now()),
                                exit_status: Some(status_str),
                                output_paths: Some(outputs),
                                ..Default::default()
                            },
                        )
                        .await;
                    let _ = self.store.update_job_status(prompt.job_id).await;
                } else if matches!(status_str.as_str(), "error" | "failed") {
                    self.finish_failed(prompt, "error", &status_str).await;
                } else if status_str == "canceled" {
                    let _ = self
                        .store
                        .update_prompt_status(
                            prompt.id,
                            Status::Canceled,
                            PromptStatusUpdate {
                                finished_at: Some(Utc::now()),
                                ..Default::default()
                            },
                        )
                        .await;
                    let _ = self.store.update_job_status(prompt.job_id).await;
                }
            }
            Ok(None) => {
                if !strict {
                    return;
                }
                match self.upstream.queue_ids().await {
                    Ok(ids) if !ids.contains(upstream_id) => {
                        self.finish_failed(prompt, "interrupted", "prompt missing from upstream queue and history").await;
                    }
                    Ok(_) => {}
                    Err(_) => {
                        info!(prompt_id = prompt.id, "upstream unreachable during reconciliation, leaving running");
                    }
                }
            }
            Err(_) => {
                info!(prompt_id = prompt.id, "upstream unreachable during reconciliation, leaving running");
            }
        }
    }
}

async fn append_file(path: &std::path::Path, line: &str) -> std::io::Result<()> {
    use tokio::io::AsyncWriteExt;
    let mut file = fs::OpenOptions::new().create(true).append(true).open(path).await?;
    file.write_all(line.as_bytes()).await
}


#[cfg(test)]
mod tests {
    use super::*;
    use fake_upstream::spawn;
    use graphqueue_store::{create_pool, DbConfig, NewPrompt};

    async fn test_worker(base_url: &str, data_dir: &std::path::Path) -> Worker {
        let pool = create_pool(DbConfig::memory()).await.unwrap();
        let store = QueueStore::new(pool);
        let upstream = UpstreamClient::new(base_url).unwrap();
        let config = WorkerConfig {
            data_dir: data_dir.to_path_buf(),
            poll_interval: Duration::from_millis(10),
            poll_timeout: Duration::from_secs(5),
        };
        Worker::new(store, upstream, config)
    }

    #[tokio::test]
    async fn dispatch_happy_path_marks_prompt_succeeded() {
        let (base_url, _fake) = spawn().await;
        let data_dir = tempfile::tempdir().unwrap();
        let worker = test_worker(&base_url, data_dir.path()).await;

        let job_id = worker
            .store
            .create_job(
                "wf",
                None,
                "/in",
                "{}",
                &[NewPrompt {
                    input_file: "a.png".into(),
                    prompt_json: "{}".into(),
                    ..Default::default()
                }],
                0,
                false,
            )
            .await
            .unwrap();

        let prompt = worker.store.next_pending_prompt(Some(job_id)).await.unwrap().unwrap();
        worker.dispatch(prompt).await;

        let job = worker.store.get_job(job_id).await.unwrap();
        assert_eq!(job.status, Status::Succeeded);
        let prompts = worker.store.get_prompts_for_job(job_id).await.unwrap();
        assert_eq!(prompts[0].status, Status::Succeeded);
        assert_eq!(prompts[0].exit_status.as_deref(), Some("success"));
    }

    #[tokio::test]
    async fn dispatch_cancels_instead_of_running_when_cancel_requested() {
        let (base_url, _fake) = spawn().await;
        let data_dir = tempfile::tempdir().unwrap();
        let worker = test_worker(&base_url, data_dir.path()).await;

        let job_id = worker
            .store
            .create_job(
                "wf",
                None,
                "/in",
                "{}",
                &[NewPrompt {
                    input_file: "a.png".into(),
                    prompt_json: "{}".into(),
                    ..Default::default()
                }],
                0,
                false,
            )
            .await
            .unwrap();

        let prompt = worker.store.next_pending_prompt(Some(job_id)).await.unwrap().unwrap();
        worker.store.cancel_job(job_id).await.unwrap();
        worker.dispatch(prompt).await;

        let prompts = worker.store.get_prompts_for_job(job_id).await.unwrap();
        assert_eq!(prompts[0].status, Status::Canceled);
    }

    #[tokio::test]
    async fn startup_reconciliation_fails_running_prompt_with_no_upstream_id() {
        let (base_url, _fake) = spawn().await;
        let data_dir = tempfile::tempdir().unwrap();
        let worker = test_worker(&base_url, data_dir.path()).await;

        let job_id = worker
            .store
            .create_job(
                "wf",
                None,
                "/in",
                "{}",
                &[NewPrompt {
                    input_file: "a.png".into(),
                    prompt_json: "{}".into(),
                    ..Default::default()
                }],
                0,
                false,
            )
            .await
            .unwrap();
        let prompt = worker.store.next_pending_prompt(Some(job_id)).await.unwrap().unwrap();
        worker
            .store
            .update_prompt_status(prompt.id, Status::Running, Default::default())
            .await
            .unwrap();

        worker.startup_reconciliation().await.unwrap();

        let prompts = worker.store.get_prompts_for_job(job_id).await.unwrap();
        assert_eq!(prompts[0].status, Status::Failed);
        assert_eq!(prompts[0].exit_status.as_deref(), Some("interrupted"));
    }

    #[tokio::test]
    async fn reconciliation_adopts_completed_upstream_history_entry() {
        let (base_url, fake) = spawn().await;
        let data_dir = tempfile::tempdir().unwrap();
        let worker = test_worker(&base_url, data_dir.path()).await;

        fake
            .seed_history(
                "upstream-1",
                serde_json::json!({"status": {"completed": true, "status_str": "success"}, "outputs": {}}),
            )
            .await;

        let job_id = worker
            .store
            .create_job(
                "wf",
                None,
                "/in",
                "{}",
                &[NewPrompt {
                    input_file: "a.png".into(),
                    prompt_json: "{}".into(),
                    ..Default::default()
                }],
                0,
                false,
            )
            .await
            .unwrap();
        let prompt = worker.store.next_pending_prompt(Some(job_id)).await.unwrap().unwrap();
        worker
            .store
            .update_prompt_status(
                prompt.id,
                Status::Running,
                PromptStatusUpdate {
                    upstream_prompt_id: Some("upstream-1".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        worker.reconcile_running(true).await.unwrap();

        let prompts = worker.store.get_prompts_for_job(job_id).await.unwrap();
        assert_eq!(prompts[0].status, Status::Succeeded);
    }

    #[tokio::test]
    async fn in_loop_reconciliation_leaves_prompt_running_when_unreachable() {
        let data_dir = tempfile::tempdir().unwrap();
        // Port 1 with no listener: connections fail immediately, standing in
        // for "upstream unreachable during reconciliation".
        let worker = test_worker("http://127.0.0.1:1", data_dir.path()).await;

        let job_id = worker
            .store
            .create_job(
                "wf",
                None,
                "/in",
                "{}",
                &[NewPrompt {
                    input_file: "a.png".into(),
                    prompt_json: "{}".into(),
                    ..Default::default()
                }],
                0,
                false,
            )
            .await
            .unwrap();
        let prompt = worker.store.next_pending_prompt(Some(job_id)).await.unwrap().unwrap();
        worker
            .store
            .update_prompt_status(
                prompt.id,
                Status::Running,
                PromptStatusUpdate {
                    upstream_prompt_id: Some("upstream-1".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        worker.reconcile_running(false).await.unwrap();

        let prompts = worker.store.get_prompts_for_job(job_id).await.unwrap();
        assert_eq!(prompts[0].status, Status::Running);
    }
}
