use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("LLM server at {url} is unreachable: {message}")]
    Unavailable { url: String, message: String },

    #[error("LLM request timed out after {0:?}")]
    Timeout(Duration),

    #[error("LLM server returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed LLM response: {0}")]
    Decode(String),

    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
}

impl From<LlmError> for minirag_core::Error {
    fn from(e: LlmError) -> Self {
        match e {
            LlmError::Unavailable { .. } | LlmError::Status { .. } => Self::ServiceUnavailable(e.to_string()),
            LlmError::Timeout(_) => Self::Timeout(e.to_string()),
            LlmError::Decode(_) | LlmError::Client(_) => Self::Operation(e.to_string()),
        }
    }
}
