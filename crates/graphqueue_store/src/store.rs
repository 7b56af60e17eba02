//! Queue store operations: transactional status transitions and reads
//! over `jobs`/`prompts` plus the auxiliary durable entities. Wraps a
//! `Pool<Sqlite>` with thin per-operation methods, using transactions
//! for multi-statement writes.

use chrono::Utc;
use sqlx::{Row, SqlitePool};
use tracing::{info, warn};

use crate::error::StoreError;
use crate::models::{
    CancelMode, CancelSummary, InputDirHistoryRow, Job, NewPrompt, Prompt, PromptPresetRow,
    QueueCounts, SettingsPresetRow, Status,
};

#[derive(Clone)]
pub struct QueueStore {
    pool: SqlitePool,
}

/// Whitelisted fields `update_prompt_status` may set alongside the new
/// status set alongside a status transition.
#[derive(Debug, Clone, Default)]
pub struct PromptStatusUpdate {
    pub upstream_prompt_id: Option<String>,
    pub started_at: Option<chrono::DateTime<Utc>>,
    pub finished_at: Option<chrono::DateTime<Utc>>,
    pub exit_status: Option<String>,
    pub error_detail: Option<String>,
    pub output_paths: Option<Vec<String>>,
    pub seed_used: Option<i64>,
}

impl QueueStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Atomically insert a Job and all of its child Prompts in `pending`.
    pub async fn create_job(
        &self,
        workflow_name: &str,
        job_name: Option<&str>,
        input_dir: &str,
        params_json: &str,
        prompts: &[NewPrompt],
        priority: i64,
        move_processed: bool,
    ) -> Result<i64, StoreError> {
        let mut tx = self.pool.begin().await?;
        let now = Utc::now();

        let job_id = sqlx::query(
            r#"
            INSERT INTO jobs (workflow_name, job_name, status, cancel_requested, priority,
                               input_dir, params_json, move_processed, created_at)
            VALUES (?, ?, 'pending', 0, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(workflow_name)
        .bind(job_name)
        .bind(priority)
        .bind(input_dir)
        .bind(params_json)
        .bind(move_processed)
        .bind(now)
        .execute(&mut *tx)
        .await?
        .last_insert_rowid();

        for prompt in prompts {
            sqlx::query(
                r#"
                INSERT INTO prompts (job_id, input_file, prompt_json, status, output_paths, seed_used)
                VALUES (?, ?, ?, 'pending', '[]', ?)
                "#,
            )
            .bind(job_id)
            .bind(&prompt.input_file)
            .bind(&prompt.prompt_json)
            .bind(prompt.seed_used)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        info!(job_id, workflow_name, prompts = prompts.len(), "created job");
        Ok(job_id)
    }

    /// Claim the next runnable prompt: queue not paused, parent job in
    /// `{pending, running}`, `cancel_requested = 0`. Ordering: job
    /// priority DESC, job created_at ASC, prompt id ASC.
    pub async fn next_pending_prompt(
        &self,
        job_id: Option<i64>,
    ) -> Result<Option<Prompt>, StoreError> {
        if self.is_paused().await? {
            return Ok(None);
        }

        let row: Option<(i64,)> = sqlx::query_as(
            r#"
            SELECT p.id
            FROM prompts p
            JOIN jobs j ON j.id = p.job_id
            WHERE p.status = 'pending'
              AND j.status IN ('pending', 'running')
              AND j.cancel_requested = 0
              AND (?1 IS NULL OR j.id = ?1)
            ORDER BY j.priority DESC, j.created_at ASC, p.id ASC
            LIMIT 1
            "#,
        )
        .bind(job_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some((prompt_id,)) = row else {
            return Ok(None);
        };

        let prompt: Prompt = sqlx::query_as("SELECT * FROM prompts WHERE id = ?")
            .bind(prompt_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(Some(prompt))
    }

    pub async fn update_prompt_status(
        &self,
        prompt_id: i64,
        status: Status,
        update: PromptStatusUpdate,
    ) -> Result<(), StoreError> {
        let output_paths = update
            .output_paths
            .map(|paths| serde_json::to_string(&paths))
            .transpose()?;

        sqlx::query(
            r#"
            UPDATE prompts
            SET status = ?,
                upstream_prompt_id = COALESCE(?, upstream_prompt_id),
                started_at = COALESCE(?, started_at),
                finished_at = COALESCE(?, finished_at),
                exit_status = COALESCE(?, exit_status),
                error_detail = COALESCE(?, error_detail),
                output_paths = COALESCE(?, output_paths),
                seed_used = COALESCE(?, seed_used)
            WHERE id = ?
            "#,
        )
        .bind(status)
        .bind(update.upstream_prompt_id)
        .bind(update.started_at)
        .bind(update.finished_at)
        .bind(update.exit_status)
        .bind(update.error_detail)
        .bind(output_paths)
        .bind(update.seed_used)
        .bind(prompt_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Recompute a job's status from its prompts and
    /// write `started_at`/`finished_at` accordingly.
    pub async fn update_job_status(&self, job_id: i64) -> Result<Status, StoreError> {
        let mut tx = self.pool.begin().await?;

        let job: Job = sqlx::query_as("SELECT * FROM jobs WHERE id = ?")
            .bind(job_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(StoreError::JobNotFound(job_id))?;

        let statuses: Vec<Status> =
            sqlx::query_scalar("SELECT status FROM prompts WHERE job_id = ?")
                .bind(job_id)
                .fetch_all(&mut *tx)
                .await?;

        let new_status = derive_job_status(&statuses, job.cancel_requested);

        let now = Utc::now();
        let set_started = job.started_at.is_none() && new_status != Status::Pending;
        let set_finished = new_status.is_terminal();
        let clear_finished = new_status == Status::Pending;

        sqlx::query(
            r#"
            UPDATE jobs
            SET status = ?,
                started_at = CASE WHEN ? THEN ? ELSE started_at END,
                finished_at = CASE WHEN ? THEN ? WHEN ? THEN NULL ELSE finished_at END
            WHERE id = ?
            "#,
        )
        .bind(new_status)
        .bind(set_started)
        .bind(now)
        .bind(set_finished)
        .bind(now)
        .bind(clear_finished)
        .bind(job_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(new_status)
    }

    /// Cancel a job: immediate for pending prompts, cooperative for a
    /// running one. Idempotent.
    pub async fn cancel_job(&self, job_id: i64) -> Result<CancelSummary, StoreError> {
        let mut tx = self.pool.begin().await?;
        let now = Utc::now();

        let canceled_pending = sqlx::query(
            r#"
            UPDATE prompts
            SET status = 'canceled', finished_at = ?
            WHERE job_id = ? AND status = 'pending'
            "#,
        )
        .bind(now)
        .bind(job_id)
        .execute(&mut *tx)
        .await?
        .rows_affected() as i64;

        sqlx::query("UPDATE jobs SET cancel_requested = 1 WHERE id = ?")
            .bind(job_id)
            .execute(&mut *tx)
            .await?;

        let running_prompts: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM prompts WHERE job_id = ? AND status = 'running'",
        )
        .bind(job_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        self.update_job_status(job_id).await?;

        let mode = if running_prompts > 0 {
            CancelMode::CancelAfterCurrent
        } else {
            CancelMode::Immediate
        };

        info!(job_id, canceled_pending, running_prompts, ?mode, "canceled job");

        Ok(CancelSummary {
            mode,
            canceled_pending,
            running_prompts,
        })
    }

    /// Reset every `failed` prompt of the job back to `pending`.
    pub async fn retry_job(&self, job_id: i64) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            UPDATE prompts
            SET status = 'pending',
                upstream_prompt_id = NULL,
                started_at = NULL,
                finished_at = NULL,
                exit_status = NULL,
                error_detail = NULL,
                output_paths = '[]'
            WHERE job_id = ? AND status = 'failed'
            "#,
        )
        .bind(job_id)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            UPDATE jobs
            SET status = 'pending',
                cancel_requested = 0,
                started_at = NULL,
                finished_at = NULL,
                last_error = NULL
            WHERE id = ?
            "#,
        )
        .bind(job_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        self.update_job_status(job_id).await?;
        info!(job_id, "retried job");
        Ok(())
    }

    /// Cancel every job still in `{pending, running}`, the way a single
    /// `cancel_job` call would for each of them. Returns the number of
    /// jobs canceled.
    pub async fn clear_queue(&self) -> Result<i64, StoreError> {
        let job_ids: Vec<i64> = sqlx::query_scalar(
            "SELECT id FROM jobs WHERE status IN ('pending', 'running')",
        )
        .fetch_all(&self.pool)
        .await?;

        for job_id in &job_ids {
            self.cancel_job(*job_id).await?;
        }

        info!(count = job_ids.len(), "cleared queue");
        Ok(job_ids.len() as i64)
    }

    pub async fn set_log_path(&self, job_id: i64, log_path: &str) -> Result<(), StoreError> {
        sqlx::query("UPDATE jobs SET log_path = ? WHERE id = ?")
            .bind(log_path)
            .bind(job_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn is_cancel_requested(&self, job_id: i64) -> Result<bool, StoreError> {
        let cancel_requested: bool =
            sqlx::query_scalar("SELECT cancel_requested FROM jobs WHERE id = ?")
                .bind(job_id)
                .fetch_optional(&self.pool)
                .await?
                .ok_or(StoreError::JobNotFound(job_id))?;
        Ok(cancel_requested)
    }

    pub async fn cancel_pending_prompts(&self, job_id: i64) -> Result<i64, StoreError> {
        let now = Utc::now();
        let affected = sqlx::query(
            r#"
            UPDATE prompts
            SET status = 'canceled', finished_at = ?
            WHERE job_id = ? AND status = 'pending'
            "#,
        )
        .bind(now)
        .bind(job_id)
        .execute(&self.pool)
        .await?
        .rows_affected() as i64;
        Ok(affected)
    }

    pub async fn is_paused(&self) -> Result<bool, StoreError> {
        let paused: bool = sqlx::query_scalar("SELECT paused FROM queue_state WHERE id = 1")
            .fetch_one(&self.pool)
            .await?;
        Ok(paused)
    }

    pub async fn pause(&self) -> Result<(), StoreError> {
        sqlx::query("UPDATE queue_state SET paused = 1 WHERE id = 1")
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn resume(&self) -> Result<(), StoreError> {
        sqlx::query("UPDATE queue_state SET paused = 0 WHERE id = 1")
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn queue_counts(&self) -> Result<QueueCounts, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT
                (SELECT COUNT(*) FROM prompts WHERE status = 'pending') AS pending,
                (SELECT COUNT(*) FROM prompts WHERE status = 'running') AS running
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(QueueCounts {
            pending: row.try_get("pending")?,
            running: row.try_get("running")?,
        })
    }

    pub async fn list_running_prompts(&self) -> Result<Vec<Prompt>, StoreError> {
        let prompts = sqlx::query_as("SELECT * FROM prompts WHERE status = 'running'")
            .fetch_all(&self.pool)
            .await?;
        Ok(prompts)
    }

    pub async fn list_jobs(&self, status: Option<Status>, limit: i64) -> Result<Vec<Job>, StoreError> {
        let jobs = sqlx::query_as(
            r#"
            SELECT * FROM jobs
            WHERE (?1 IS NULL OR status = ?1)
            ORDER BY created_at DESC
            LIMIT ?2
            "#,
        )
        .bind(status)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(jobs)
    }

    pub async fn get_job(&self, job_id: i64) -> Result<Job, StoreError> {
        sqlx::query_as("SELECT * FROM jobs WHERE id = ?")
            .bind(job_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StoreError::JobNotFound(job_id))
    }

    pub async fn get_prompts_for_job(&self, job_id: i64) -> Result<Vec<Prompt>, StoreError> {
        let prompts = sqlx::query_as("SELECT * FROM prompts WHERE job_id = ? ORDER BY id ASC")
            .bind(job_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(prompts)
    }

    pub async fn get_prompt(&self, prompt_id: i64) -> Result<Prompt, StoreError> {
        sqlx::query_as("SELECT * FROM prompts WHERE id = ?")
            .bind(prompt_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StoreError::PromptNotFound(prompt_id))
    }

    /// Conservative: true iff any prompt for `input_file` exists in
    /// `{pending, running}` whose parent job is `{pending, running}`.
    pub async fn has_active_prompts_for_input(
        &self,
        input_file: &str,
        exclude_job_id: Option<i64>,
    ) -> Result<bool, StoreError> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM prompts p
            JOIN jobs j ON j.id = p.job_id
            WHERE p.input_file = ?
              AND p.status IN ('pending', 'running')
              AND j.status IN ('pending', 'running')
              AND (?2 IS NULL OR j.id != ?2)
            "#,
        )
        .bind(input_file)
        .bind(exclude_job_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count > 0)
    }

    pub async fn touch_input_dir_history(&self, path: &str) -> Result<(), StoreError> {
        let now = Utc::now();
        sqlx::query(
            r#"
            INSERT INTO input_dir_history (path, last_used_at, use_count)
            VALUES (?, ?, 1)
            ON CONFLICT(path) DO UPDATE SET
                last_used_at = excluded.last_used_at,
                use_count = input_dir_history.use_count + 1
            "#,
        )
        .bind(path)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Falls back to scanning distinct `jobs.input_dir` values when the
    /// history table is empty (e.g. upgrading from a pre-history store).
    pub async fn list_input_dir_history(&self, limit: i64) -> Result<Vec<InputDirHistoryRow>, StoreError> {
        let rows: Vec<InputDirHistoryRow> = sqlx::query_as(
            "SELECT * FROM input_dir_history ORDER BY last_used_at DESC LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        if !rows.is_empty() {
            return Ok(rows);
        }

        warn!("input_dir_history empty, falling back to distinct job input_dir values");
        let fallback: Vec<(String, chrono::DateTime<Utc>)> = sqlx::query_as(
            r#"
            SELECT input_dir, MAX(created_at) as created_at
            FROM jobs
            WHERE input_dir != ''
            GROUP BY input_dir
            ORDER BY created_at DESC
            LIMIT ?
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(fallback
            .into_iter()
            .map(|(path, last_used_at)| InputDirHistoryRow {
                path,
                last_used_at,
                use_count: 1,
            })
            .collect())
    }

    pub async fn list_prompt_presets(
        &self,
        limit: i64,
        mode: Option<&str>,
    ) -> Result<Vec<PromptPresetRow>, StoreError> {
        let rows = sqlx::query_as(
            r#"
            SELECT * FROM prompt_presets
            WHERE (?1 IS NULL OR mode = ?1)
            ORDER BY updated_at DESC
            LIMIT ?2
            "#,
        )
        .bind(mode)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn save_prompt_preset(
        &self,
        name: &str,
        mode: &str,
        positive: &str,
        negative: &str,
    ) -> Result<(), StoreError> {
        let now = Utc::now();
        sqlx::query(
            r#"
            INSERT INTO prompt_presets (name, mode, positive, negative, updated_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(name) DO UPDATE SET
                mode = excluded.mode,
                positive = excluded.positive,
                negative = excluded.negative,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(name)
        .bind(mode)
        .bind(positive)
        .bind(negative)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn list_settings_presets(&self, limit: i64) -> Result<Vec<SettingsPresetRow>, StoreError> {
        let rows = sqlx::query_as("SELECT * FROM settings_presets ORDER BY updated_at DESC LIMIT ?")
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    pub async fn save_settings_preset(&self, name: &str, payload: &str) -> Result<(), StoreError> {
        let now = Utc::now();
        sqlx::query(
            r#"
            INSERT INTO settings_presets (name, payload, updated_at)
            VALUES (?, ?, ?)
            ON CONFLICT(name) DO UPDATE SET
                payload = excluded.payload,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(name)
        .bind(payload)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

/// Status derivation rule.
fn derive_job_status(statuses: &[Status], cancel_requested: bool) -> Status {
    if statuses.is_empty() {
        return Status::Pending;
    }
    if statuses.iter().any(|s| *s == Status::Running) {
        return Status::Running;
    }
    if statuses.iter().any(|s| *s == Status::Pending) {
        return Status::Pending;
    }
    if statuses.iter().any(|s| *s == Status::Failed) {
        return Status::Failed;
    }
    if statuses.iter().all(|s| *s == Status::Succeeded) {
        return Status::Succeeded;
    }
    if statuses.iter().all(|s| *s == Status::Canceled) {
        return Status::Canceled;
    }
    let mixed_succeeded_canceled = statuses
        .iter()
        .all(|s| matches!(s, Status::Succeeded | Status::Canceled));
    if mixed_succeeded_canceled && cancel_requested {
        return Status::Canceled;
    }
    Status::Succeeded
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{create_pool, DbConfig};

    async fn test_store() -> QueueStore {
        let pool = create_pool(DbConfig::memory()).await.unwrap();
        QueueStore::new(pool)
    }

    #[tokio::test]
    async fn create_job_inserts_pending_prompts() {
        let store = test_store().await;
        let job_id = store
            .create_job(
                "wf",
                None,
                "/in",
                "{}",
                &[NewPrompt {
                    input_file: "/in/a.png".into(),
                    prompt_json: "{}".into(),
                    ..Default::default()
                }],
                0,
                false,
            )
            .await
            .unwrap();

        let job = store.get_job(job_id).await.unwrap();
        assert_eq!(job.status, Status::Pending);

        let prompts = store.get_prompts_for_job(job_id).await.unwrap();
        assert_eq!(prompts.len(), 1);
        assert_eq!(prompts[0].status, Status::Pending);
    }

    #[tokio::test]
    async fn next_pending_prompt_respects_priority_and_pause() {
        let store = test_store().await;
        let low = store
            .create_job("wf", None, "/in", "{}", &[NewPrompt { input_file: "a".into(), prompt_json: "{}".into(), ..Default::default() }], 0, false)
            .await
            .unwrap();
        let high = store
            .create_job("wf", None, "/in", "{}", &[NewPrompt { input_file: "b".into(), prompt_json: "{}".into(), ..Default::default() }], 10, false)
            .await
            .unwrap();

        let next = store.next_pending_prompt(None).await.unwrap().unwrap();
        assert_eq!(next.job_id, high);

        store.pause().await.unwrap();
        assert!(store.next_pending_prompt(None).await.unwrap().is_none());
        store.resume().await.unwrap();

        let next2 = store.next_pending_prompt(Some(low)).await.unwrap().unwrap();
        assert_eq!(next2.job_id, low);
    }

    #[tokio::test]
    async fn cancel_job_is_idempotent() {
        let store = test_store().await;
        store.pause().await.unwrap();
        let job_id = store
            .create_job(
                "wf",
                None,
                "/in",
                "{}",
                &[
                    NewPrompt { input_file: "a".into(), prompt_json: "{}".into(), ..Default::default() },
                    NewPrompt { input_file: "a".into(), prompt_json: "{}".into(), ..Default::default() },
                ],
                0,
                false,
            )
            .await
            .unwrap();

        let summary = store.cancel_job(job_id).await.unwrap();
        assert_eq!(summary.mode, CancelMode::Immediate);
        assert_eq!(summary.canceled_pending, 2);
        assert_eq!(summary.running_prompts, 0);

        let job = store.get_job(job_id).await.unwrap();
        assert_eq!(job.status, Status::Canceled);

        let summary2 = store.cancel_job(job_id).await.unwrap();
        assert_eq!(summary2.canceled_pending, 0);
    }

    #[tokio::test]
    async fn retry_job_resets_only_failed_prompts() {
        let store = test_store().await;
        let job_id = store
            .create_job(
                "wf",
                None,
                "/in",
                "{}",
                &[NewPrompt { input_file: "a".into(), prompt_json: "{}".into(), ..Default::default() }],
                0,
                false,
            )
            .await
            .unwrap();

        let prompt = store.next_pending_prompt(Some(job_id)).await.unwrap().unwrap();
        store
            .update_prompt_status(
                prompt.id,
                Status::Failed,
                PromptStatusUpdate {
                    exit_status: Some("error".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        store.update_job_status(job_id).await.unwrap();

        let job = store.get_job(job_id).await.unwrap();
        assert_eq!(job.status, Status::Failed);

        store.retry_job(job_id).await.unwrap();
        let job = store.get_job(job_id).await.unwrap();
        assert_eq!(job.status, Status::Pending);

        let prompts = store.get_prompts_for_job(job_id).await.unwrap();
        assert_eq!(prompts[0].status, Status::Pending);
        assert!(prompts[0].exit_status.is_none());
    }

    #[tokio::test]
    async fn get_prompt_returns_not_found_for_unknown_id() {
        let store = test_store().await;
        let err = store.get_prompt(999).await.unwrap_err();
        assert!(matches!(err, StoreError::PromptNotFound(999)));
    }

    #[tokio::test]
    async fn create_job_persists_seed_used() {
        let store = test_store().await;
        let job_id = store
            .create_job(
                "wf",
                None,
                "/in",
                "{}",
                &[NewPrompt {
                    input_file: "a".into(),
                    prompt_json: "{}".into(),
                    seed_used: Some(12345),
                }],
                0,
                false,
            )
            .await
            .unwrap();
        let prompts = store.get_prompts_for_job(job_id).await.unwrap();
        assert_eq!(prompts[0].seed_used, Some(12345));
    }

    #[tokio::test]
    async fn input_dir_history_upserts_and_falls_back() {
        let store = test_store().await;
        store.touch_input_dir_history("/a").await.unwrap();
        store.touch_input_dir_history("/a").await.unwrap();

        let rows = store.list_input_dir_history(10).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].use_count, 2);
    }
}
