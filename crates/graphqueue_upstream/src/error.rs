use thiserror::Error;

/// Connection-level failures, request validation, server failures, and
/// everything else.
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("upstream unreachable: {0}")]
    Unreachable(String),

    #[error("upstream rejected request: {0}")]
    Validation(String),

    #[error("upstream server error ({status}): {body}")]
    ServerError { status: u16, body: String },

    #[error("upstream error: {0}")]
    Generic(String),
}

impl UpstreamError {
    pub fn exit_status(&self) -> &'static str {
        match self {
            UpstreamError::Unreachable(_) => "unreachable",
            UpstreamError::Validation(_) => "validation_error",
            UpstreamError::ServerError { .. } => "error",
            UpstreamError::Generic(_) => "exception",
        }
    }

    pub(crate) fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() || err.is_connect() {
            return UpstreamError::Unreachable(err.to_string());
        }
        UpstreamError::Generic(err.to_string())
    }
}
