//! Input Stager: copies a submitted input file into a batch-scoped staging
//! directory under a sanitized, collision-free name, so the upstream
//! graph-runner never touches a path outside its own input root.
//!
//! Built in the idiom of `graphqueue_logging`'s filesystem helpers (plain
//! `std::fs`, `thiserror` for fallible paths).

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StageError {
    #[error("source file does not exist: {0}")]
    SourceMissing(PathBuf),
    #[error("failed to create staging directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to copy {from} to {to}: {source}")]
    Copy {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to read metadata for {0}: {1}")]
    Metadata(PathBuf, std::io::Error),
}

/// A staged file plus enough bookkeeping to map it back to its source.
#[derive(Debug, Clone)]
pub struct StagedFile {
    pub staged_path: PathBuf,
    pub original_path: PathBuf,
    pub original_filename: String,
}

/// Generate a batch token: `<unix_ms>_<6-digit nanosecond remainder>`.
///
/// Two files staged in the same batch share this token so they land in the
/// same subdirectory and so log output can correlate them without a
/// database round-trip.
pub fn new_batch_token() -> String {
    let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default();
    let millis = now.as_millis();
    let nanos_remainder = now.subsec_nanos() % 1_000_000;
    format!("{millis}_{nanos_remainder:06}")
}

/// Stage `source` into `staging_root/<batch_token>/`, sanitizing the
/// filename and resolving collisions within that directory.
pub fn stage_file(
    staging_root: &Path,
    batch_token: &str,
    source: &Path,
) -> Result<StagedFile, StageError> {
    if !source.is_file() {
        return Err(StageError::SourceMissing(source.to_path_buf()));
    }

    let batch_dir = staging_root.join(batch_token);
    fs::create_dir_all(&batch_dir).map_err(|e| StageError::CreateDir {
        path: batch_dir.clone(),
        source: e,
    })?;

    let original_filename = source
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "input".to_string());
    let sanitized = sanitize_filename(&original_filename);

    let staged_path = first_available_name(&batch_dir, &sanitized);

    fs::copy(source, &staged_path).map_err(|e| StageError::Copy {
        from: source.to_path_buf(),
        to: staged_path.clone(),
        source: e,
    })?;

    if let Ok(metadata) = fs::metadata(source) {
        if let Ok(modified) = metadata.modified() {
            let _ = filetime_set(&staged_path, modified);
        }
    }

    Ok(StagedFile {
        staged_path,
        original_path: source.to_path_buf(),
        original_filename,
    })
}

/// Whitelist filename characters to `[A-Za-z0-9_.-]`, trim leading/trailing
/// `.`/`_`, and lowercase the extension. Anything that sanitizes to an
/// empty stem falls back to `"input"`.
fn sanitize_filename(name: &str) -> String {
    let (stem, ext) = match name.rsplit_once('.') {
        Some((s, e)) if !s.is_empty() => (s, Some(e)),
        _ => (name, None),
    };

    let clean_stem: String = stem
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect();
    let clean_stem = clean_stem.trim_matches(|c| c == '.' || c == '_');
    let clean_stem = if clean_stem.is_empty() { "input" } else { clean_stem };

    match ext {
        Some(ext) => {
            let clean_ext: String = ext
                .chars()
                .filter(|c| c.is_ascii_alphanumeric())
                .collect::<String>()
                .to_ascii_lowercase();
            if clean_ext.is_empty() {
                clean_stem.to_string()
            } else {
                format!("{clean_stem}.{clean_ext}")
            }
        }
        None => clean_stem.to_string(),
    }
}

/// Find the first unused `name`, `name__2`, `name__3`, ... in `dir`.
fn first_available_name(dir: &Path, name: &str) -> PathBuf {
    let candidate = dir.join(name);
    if !candidate.exists() {
        return candidate;
    }

    let (stem, ext) = match name.rsplit_once('.') {
        Some((s, e)) if !s.is_empty() => (s.to_string(), Some(e.to_string())),
        _ => (name.to_string(), None),
    };

    let mut counter = 2;
    loop {
        let attempt = match &ext {
            Some(ext) => format!("{stem}__{counter}.{ext}"),
            None => format!("{stem}__{counter}"),
        };
        let path = dir.join(&attempt);
        if !path.exists() {
            return path;
        }
        counter += 1;
    }
}

fn filetime_set(path: &Path, modified: SystemTime) -> std::io::Result<()> {
    let file = fs::OpenOptions::new().write(true).open(path)?;
    file.set_modified(modified)
}
