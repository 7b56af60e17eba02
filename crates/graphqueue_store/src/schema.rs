//! SQLite schema for the durable queue store, bundled as a plain SQL
//! string and applied at pool-creation time rather than via a separate
//! migrations directory.

pub const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS jobs (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    workflow_name   TEXT NOT NULL,
    job_name        TEXT,
    status          TEXT NOT NULL DEFAULT 'pending',
    cancel_requested INTEGER NOT NULL DEFAULT 0,
    priority        INTEGER NOT NULL DEFAULT 0,
    input_dir       TEXT NOT NULL DEFAULT '',
    params_json     TEXT NOT NULL DEFAULT '{}',
    move_processed  INTEGER NOT NULL DEFAULT 0,
    created_at      TEXT NOT NULL,
    started_at      TEXT,
    finished_at     TEXT,
    last_error      TEXT,
    log_path        TEXT
);

CREATE INDEX IF NOT EXISTS idx_jobs_status ON jobs(status);
CREATE INDEX IF NOT EXISTS idx_jobs_created_at ON jobs(created_at);

CREATE TABLE IF NOT EXISTS prompts (
    id                  INTEGER PRIMARY KEY AUTOINCREMENT,
    job_id              INTEGER NOT NULL REFERENCES jobs(id) ON DELETE CASCADE,
    input_file          TEXT NOT NULL DEFAULT '',
    prompt_json         TEXT NOT NULL,
    status              TEXT NOT NULL DEFAULT 'pending',
    upstream_prompt_id  TEXT,
    started_at          TEXT,
    finished_at         TEXT,
    exit_status         TEXT,
    error_detail        TEXT,
    output_paths        TEXT NOT NULL DEFAULT '[]',
    seed_used           INTEGER
);

CREATE INDEX IF NOT EXISTS idx_prompts_job_id ON prompts(job_id);
CREATE INDEX IF NOT EXISTS idx_prompts_status ON prompts(status);

CREATE TABLE IF NOT EXISTS queue_state (
    id      INTEGER PRIMARY KEY CHECK (id = 1),
    paused  INTEGER NOT NULL DEFAULT 0
);

INSERT OR IGNORE INTO queue_state (id, paused) VALUES (1, 0);

CREATE TABLE IF NOT EXISTS input_dir_history (
    path            TEXT PRIMARY KEY,
    last_used_at    TEXT NOT NULL,
    use_count       INTEGER NOT NULL DEFAULT 1
);

CREATE INDEX IF NOT EXISTS idx_input_dir_history_last_used
    ON input_dir_history(last_used_at DESC);

CREATE TABLE IF NOT EXISTS prompt_presets (
    name        TEXT PRIMARY KEY,
    mode        TEXT NOT NULL,
    positive    TEXT NOT NULL DEFAULT '',
    negative    TEXT NOT NULL DEFAULT '',
    updated_at  TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_prompt_presets_updated_at
    ON prompt_presets(updated_at DESC);

CREATE TABLE IF NOT EXISTS settings_presets (
    name        TEXT PRIMARY KEY,
    payload     TEXT NOT NULL,
    updated_at  TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_settings_presets_updated_at
    ON settings_presets(updated_at DESC);
"#;

/// Apply the schema and pragmas required for single-writer-friendly
/// concurrent access.
pub async fn init(pool: &sqlx::SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query("PRAGMA journal_mode=WAL").execute(pool).await?;
    sqlx::query("PRAGMA foreign_keys=ON").execute(pool).await?;
    sqlx::query("PRAGMA synchronous=NORMAL").execute(pool).await?;

    for statement in SCHEMA_SQL.split(';') {
        let statement = statement.trim();
        if statement.is_empty() {
            continue;
        }
        sqlx::query(statement).execute(pool).await?;
    }

    Ok(())
}
