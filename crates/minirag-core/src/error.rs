use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Embedding model mismatch: index was built with '{expected}', got '{found}'")]
    ModelMismatch { expected: String, found: String },

    #[error("Busy: {0}")]
    Busy(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Operation failed: {0}")]
    Operation(String),
}

impl Error {
    /// Short machine-readable name, used in API error bodies and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidConfig(_) => "invalid_config",
            Self::NotFound(_) => "not_found",
            Self::UnsupportedFormat(_) => "unsupported_format",
            Self::ServiceUnavailable(_) => "service_unavailable",
            Self::Timeout(_) => "timeout",
            Self::Validation(_) => "validation_error",
            Self::ModelMismatch { .. } => "model_mismatch",
            Self::Busy(_) => "busy",
            Self::Io(_) | Self::Operation(_) => "internal_error",
        }
    }

    /// True for failures of an external dependency (model backend, LLM server)
    /// as opposed to bad input or a bug.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::ServiceUnavailable(_) | Self::Timeout(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
