//! Move-processed post-action: relocate a succeeded job's input files into
//! `{input_dir}/_processed/` once nothing else still needs them.

use std::collections::HashSet;
use std::path::Path;

use graphqueue_store::{Job, QueueStore, StoreError};
use tokio::fs;
use tracing::warn;

pub async fn move_processed(store: &QueueStore, job: &Job) -> Result<(), StoreError> {
    let processed_dir = Path::new(&job.input_dir).join("_processed");
    if let Err(e) = fs::create_dir_all(&processed_dir).await {
        warn!(error = %e, dir = %processed_dir.display(), "failed to create _processed dir");
        return Ok(());
    }

    let prompts = store.get_prompts_for_job(job.id).await?;
    let mut seen = HashSet::new();

    for prompt in prompts {
        if prompt.input_file.is_empty() || !seen.insert(prompt.input_file.clone()) {
            continue;
        }

        let source = Path::new(&prompt.input_file);
        if !source.exists() {
            continue;
        }

        if store
            .has_active_prompts_for_input(&prompt.input_file, Some(job.id))
            .await?
        {
            continue;
        }

        if let Err(e) = move_one(source, &processed_dir).await {
            warn!(error = %e, file = %prompt.input_file, "failed to move processed input");
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use graphqueue_store::{create_pool, DbConfig, NewPrompt};

    #[tokio::test]
    async fn moves_input_with_no_active_prompts() {
        let pool = create_pool(DbConfig::memory()).await.unwrap();
        let store = QueueStore::new(pool);

        let input_dir = tempfile::tempdir().unwrap();
        let src = input_dir.path().join("a.png");
        std::fs::write(&src, b"x").unwrap();

        let job_id = store
            .create_job(
                "wf",
                None,
                &input_dir.path().to_string_lossy(),
                "{}",
                &[NewPrompt {
                    input_file: src.to_string_lossy().to_string(),
                    prompt_json: "{}".into(),
                    ..Default::default()
                }],
                0,
                true,
            )
            .await
            .unwrap();

        let prompt = store.next_pending_prompt(Some(job_id)).await.unwrap().unwrap();
        store
            .update_prompt_status(
                prompt.id,
                graphqueue_store::Status::Succeeded,
                Default::default(),
            )
            .await
            .unwrap();
        store.update_job_status(job_id).await.unwrap();

        let job = store.get_job(job_id).await.unwrap();
        move_processed(&store, &job).await.unwrap();

        assert!(!src.exists());
        assert!(input_dir.path().join("_processed").join("a.png").exists());
    }

    #[tokio::test]
    async fn skips_file_with_active_prompt_elsewhere() {
        let pool = create_pool(DbConfig::memory()).await.unwrap();
        let store = QueueStore::new(pool);

        let input_dir = tempfile::tempdir().unwrap();
        let src = input_dir.path().join("a.png");
        std::fs::write(&src, b"x").unwrap();
        let src_str = src.to_string_lossy().to_string();

        let job_id = store
            .create_job(
                "wf",
                None,
                &input_dir.path().to_string_lossy(),
                "{}",
                &[NewPrompt { input_file: src_str.clone(), prompt_json: "{}".into(), ..Default::default() }],
                0,
                true,
            )
            .await
            .unwrap();
        let _other_job_id = store
            .create_job(
                "wf",
                None,
                &input_dir.path().to_string_lossy(),
                "{}",
                &[NewPrompt { input_file: src_str.clone(), prompt_json: "{}".into(), ..Default::default() }],
                0,
                false,
            )
            .await
            .unwrap();

        let prompt = store.next_pending_prompt(Some(job_id)).await.unwrap().unwrap();
        store
            .update_prompt_status(prompt.id, graphqueue_store::Status::Succeeded, Default::default())
            .await
            .unwrap();
        store.update_job_status(job_id).await.unwrap();

        let job = store.get_job(job_id).await.unwrap();
        move_processed(&store, &job).await.unwrap();

        assert!(src.exists());
    }
}

async fn move_one(source: &Path, processed_dir: &Path) -> std::io::Result<()> {
    let filename = source
        .file_name()
        .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::InvalidInput, "source has no filename"))?;

    let mut dest = processed_dir.join(filename);
    if dest.exists() {
        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        let stem = source.file_stem().unwrap_or_default().to_string_lossy();
        let ext = source.extension().map(|e| e.to_string_lossy().to_string());
        let renamed = match ext {
            Some(ext) => format!("{stem}_{now}.{ext}"),
            None => format!("{stem}_{now}"),
        };
        dest = processed_dir.join(renamed);
    }

    fs::rename(source, dest).await
}
