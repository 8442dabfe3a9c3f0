use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScribeError {
    #[error("unsupported file type: .{0}")]
    UnsupportedFormat(String),

    #[error("file too large: {size} bytes (limit {limit})")]
    UploadTooLarge { size: u64, limit: u64 },

    #[error("audio conversion failed: {0}")]
    Conversion(String),

    #[error("duration probe failed: {0}")]
    Probe(String),

    #[error("transcription failed: {0}")]
    Transcription(#[from] ApiFailure),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ScribeError>;

/// Classified failure from the speech API. Each class carries its own
/// user-facing message so callers never leak raw API bodies to clients.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ApiFailure {
    #[error("invalid API credentials")]
    InvalidApiKey,

    #[error("API quota exhausted")]
    QuotaExceeded,

    #[error("transcription model unavailable")]
    ModelUnavailable,

    #[error("audio payload exceeds the API size limit")]
    PayloadTooLarge,

    #[error("request rejected: {message}")]
    Rejected {
        message: String,
        /// The rejected upload was an m4a container, which the API
        /// intermittently refuses even after re-encoding.
        m4a_source: bool,
    },

    #[error("speech API server error (HTTP {status})")]
    Server { status: u16 },

    #[error("could not reach the speech API: {0}")]
    Connection(String),

    #[error("{0}")]
    Other(String),
}

impl ApiFailure {
    /// Message safe to show to an end user.
    pub fn user_message(&self) -> String {
        match self {
            ApiFailure::InvalidApiKey => {
                "Transcription service credentials are invalid. Check the configured API key."
                    .to_string()
            }
            ApiFailure::QuotaExceeded => {
                "Transcription quota is exhausted. Try again later or review your API plan."
                    .to_string()
            }
            ApiFailure::ModelUnavailable => {
                "The transcription model is currently unavailable.".to_string()
            }
            ApiFailure::PayloadTooLarge => {
                "The audio file is too large for the transcription service.".to_string()
            }
            ApiFailure::Rejected { message, m4a_source } => {
                if *m4a_source {
                    "The service rejected this m4a file. Re-export the recording as mp3 or wav \
                     and upload it again."
                        .to_string()
                } else {
                    format!("The transcription service rejected the file: {message}")
                }
            }
            ApiFailure::Server { .. } => {
                "The transcription service is experiencing problems. Try again shortly."
                    .to_string()
            }
            ApiFailure::Connection(_) => {
                "Could not reach the transcription service. Check network connectivity."
                    .to_string()
            }
            ApiFailure::Other(_) => "Transcription failed for an unexpected reason.".to_string(),
        }
    }

    /// Server hiccups and connectivity failures are worth retrying;
    /// everything else is deterministic.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ApiFailure::Server { .. } | ApiFailure::Connection(_))
    }
}

impl ScribeError {
    pub fn user_message(&self) -> String {
        match self {
            ScribeError::UnsupportedFormat(ext) => {
                format!("Unsupported file type: .{ext}")
            }
            ScribeError::UploadTooLarge { size, limit } => format!(
                "File is too large: {:.1} MB (limit {:.1} MB)",
                *size as f64 / 1_048_576.0,
                *limit as f64 / 1_048_576.0
            ),
            ScribeError::Conversion(_) => {
                "Could not prepare the audio file for transcription.".to_string()
            }
            ScribeError::Transcription(api) => api.user_message(),
            _ => "Internal error while processing the file.".to_string(),
        }
    }
}
