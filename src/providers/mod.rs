use serde::Serialize;
use std::future::Future;
use std::pin::Pin;

use crate::error::TranslateError;

mod gemini;
pub mod retry;

pub use gemini::{DEFAULT_BASE_URL, DEFAULT_MODEL, Gemini};

/// Sampling parameters sent alongside a prompt. Fixed per prompt mode.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub temperature: f32,
    pub top_p: f32,
    pub top_k: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_output_tokens: Option<u32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProviderUsage {
    pub prompt_tokens: Option<u64>,
    pub completion_tokens: Option<u64>,
    pub total_tokens: Option<u64>,
}

impl ProviderUsage {
    pub fn total(&self) -> Option<u64> {
        self.total_tokens.or_else(|| {
            self.prompt_tokens
                .zip(self.completion_tokens)
                .map(|(prompt, completion)| prompt + completion)
        })
    }
}

/// Primary text output of the first candidate, if the model produced any.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ProviderResponse {
    pub text: Option<String>,
    pub model: Option<String>,
    pub usage: Option<ProviderUsage>,
}

impl ProviderResponse {
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::default()
        }
    }

    /// `model=…, tokens=…` for logs; unknown parts read as `unavailable`.
    pub fn usage_line(&self) -> String {
        let model = self.model.as_deref().unwrap_or("unavailable");
        let tokens = self
            .usage
            .as_ref()
            .and_then(ProviderUsage::total)
            .map(|total| total.to_string())
            .unwrap_or_else(|| "unavailable".to_string());
        format!("model={}, tokens={}", model, tokens)
    }
}

pub type ProviderFuture = Pin<Box<dyn Future<Output = Result<ProviderResponse, TranslateError>> + Send>>;

pub trait Provider: Clone + Send + Sync {
    /// Whether a credential is available; checked once per invocation.
    fn has_credential(&self) -> bool;
    fn generate(&self, prompt: String, config: GenerationConfig) -> ProviderFuture;
}
