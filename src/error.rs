use reqwest::StatusCode;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TranslateError {
    #[error("API key is not configured (set GEMINI_API_KEY or pass --key)")]
    MissingCredential,

    #[error("no text to translate")]
    EmptyInput,

    #[error("Gemini API error ({status}): {message}")]
    Status {
        status: StatusCode,
        message: String,
        retry_after: Option<Duration>,
    },

    #[error("request to Gemini failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("request timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("failed to parse Gemini response: {0}")]
    InvalidResponse(String),

    #[error("translation result is empty")]
    EmptyTranslation,

    #[error("failed to render prompt: {0}")]
    Prompt(#[from] tera::Error),
}

impl TranslateError {
    /// Failures detected before any request is sent.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            TranslateError::MissingCredential | TranslateError::EmptyInput
        )
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            TranslateError::Status {
                status, message, ..
            } => is_retryable_status(*status, message),
            TranslateError::Http(err) => !err.is_builder(),
            TranslateError::Timeout(_) => true,
            _ => false,
        }
    }

    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            TranslateError::Status { retry_after, .. } => *retry_after,
            _ => None,
        }
    }
}

fn is_retryable_status(status: StatusCode, body: &str) -> bool {
    if status == StatusCode::TOO_MANY_REQUESTS || status == StatusCode::REQUEST_TIMEOUT {
        return true;
    }
    if status.is_server_error() || status.as_u16() == 529 {
        return true;
    }
    let lower = body.to_lowercase();
    lower.contains("rate limit")
        || lower.contains("rate_limit")
        || lower.contains("too many requests")
        || lower.contains("resource_exhausted")
        || lower.contains("overloaded")
}
