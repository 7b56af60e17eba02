//! Input-directory path hygiene. A pasted path often carries quoting or
//! CR/LF cruft from a shell or GUI file manager; `~` is a shell-only
//! shorthand the OS never expands for us. No Windows drive-letter
//! rewriting -- there is no Windows host for this build to run against.

use std::path::PathBuf;

use crate::error::ApiError;

pub fn normalize_input_dir(raw: &str) -> Result<PathBuf, ApiError> {
    let trimmed = raw.trim().trim_matches('"').trim_matches('\'');
    let trimmed = trimmed.replace(['\r', '\n'], "");
    if trimmed.is_empty() {
        return Err(ApiError::bad_request("input directory is required"));
    }
    Ok(expand_tilde(&trimmed))
}

fn expand_tilde(value: &str) -> PathBuf {
    if value == "~" {
        return dirs::home_dir().unwrap_or_else(|| PathBuf::from(value));
    }
    if let Some(rest) = value.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_quotes_and_whitespace() {
        let normalized = normalize_input_dir("  \"/tmp/inputs\"  ").unwrap();
        assert_eq!(normalized, PathBuf::from("/tmp/inputs"));
    }

    #[test]
    fn strips_embedded_crlf() {
        let normalized = normalize_input_dir("/tmp/in\r\nputs").unwrap();
        assert_eq!(normalized, PathBuf::from("/tmp/inputs"));
    }

    #[test]
    fn rejects_blank_path() {
        assert!(normalize_input_dir("   ").is_err());
    }

    #[test]
    fn expands_home_relative_path() {
        let normalized = normalize_input_dir("~/inputs").unwrap();
        if let Some(home) = dirs::home_dir() {
            assert_eq!(normalized, home.join("inputs"));
        }
    }
}
