use thiserror::Error;

use crate::openai::OpenAiError;
use crate::storage::StorageError;

/// Crate-level error. Every stage returns this; `main` logs it and exits non-zero.
#[derive(Debug, Error)]
pub enum RedatorError {
    /// A required setting is missing or invalid.
    #[error("Config error: {0}")]
    Config(String),

    /// An upstream service answered, but not with what we asked for.
    /// `payload` keeps the raw text so it can be logged verbatim.
    #[error("Unexpected upstream response ({context})")]
    Upstream { context: String, payload: String },

    /// Something a publish stage depends on does not exist yet.
    #[error("Missing artifact: {0}")]
    MissingArtifact(String),

    /// Non-success HTTP status from a publishing API.
    #[error("{service} returned status {status}: {body}")]
    Http {
        service: &'static str,
        status: u16,
        body: String,
    },

    #[error("OpenAI error: {0}")]
    OpenAi(#[from] OpenAiError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("HTTP error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl RedatorError {
    pub fn upstream(context: impl Into<String>, payload: impl Into<String>) -> Self {
        RedatorError::Upstream {
            context: context.into(),
            payload: payload.into(),
        }
    }

    /// Raw payload attached to upstream errors, if any.
    pub fn payload(&self) -> Option<&str> {
        match self {
            RedatorError::Upstream { payload, .. } => Some(payload),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, RedatorError>;
