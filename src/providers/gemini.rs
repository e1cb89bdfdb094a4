use serde::Deserialize;
use serde_json::{Value, json};
use tracing::debug;

use super::retry::retry_after;
use super::{GenerationConfig, Provider, ProviderFuture, ProviderResponse, ProviderUsage};
use crate::error::TranslateError;

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

#[derive(Debug, Clone)]
pub struct Gemini {
    key: String,
    model: String,
    base_url: String,
    client: reqwest::Client,
}

impl Gemini {
    pub fn new(key: impl Into<String>) -> Self {
        Self::with_client(key, reqwest::Client::new())
    }

    /// Uses `client` (and its connection pool) for every request.
    pub fn with_client(key: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            key: key.into(),
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            client,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        let model = model.into();
        if !model.trim().is_empty() {
            self.model = model;
        }
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        let trimmed = base_url.trim().trim_end_matches('/');
        if !trimmed.is_empty() {
            self.base_url = trimmed.to_string();
        }
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/{}:generateContent", self.base_url, self.model)
    }
}

impl Provider for Gemini {
    fn has_credential(&self) -> bool {
        !self.key.trim().is_empty()
    }

    fn generate(&self, prompt: String, config: GenerationConfig) -> ProviderFuture {
        let client = self.client.clone();
        let url = self.endpoint();
        let key = self.key.clone();
        let model = self.model.clone();
        Box::pin(async move {
            let body = request_body(&prompt, &config);
            debug!("POST {} ({} prompt chars)", url, prompt.chars().count());
            let response = client
                .post(&url)
                .header("x-goog-api-key", key)
                .json(&body)
                .send()
                .await?;

            let status = response.status();
            let retry_after = retry_after(response.headers());
            let text = response.text().await.unwrap_or_default();
            if !status.is_success() {
                return Err(TranslateError::Status {
                    status,
                    message: extract_gemini_error(&text).unwrap_or(text),
                    retry_after,
                });
            }
            extract_text_response(&text, &model)
        })
    }
}

fn request_body(prompt: &str, config: &GenerationConfig) -> Value {
    json!({
        "contents": [
            {
                "role": "user",
                "parts": [{"text": prompt}]
            }
        ],
        "generationConfig": config
    })
}

fn extract_text_response(
    text: &str,
    fallback_model: &str,
) -> Result<ProviderResponse, TranslateError> {
    let payload: GeminiResponse = serde_json::from_str(text)
        .map_err(|err| TranslateError::InvalidResponse(err.to_string()))?;

    let text = payload
        .candidates
        .first()
        .and_then(|candidate| candidate.content.as_ref())
        .and_then(|content| {
            let joined = content
                .parts
                .iter()
                .filter_map(|part| part.text.as_deref())
                .collect::<String>();
            if joined.is_empty() { None } else { Some(joined) }
        });

    let model = payload
        .model_version
        .filter(|value| !value.trim().is_empty())
        .or_else(|| Some(fallback_model.to_string()));
    let usage = payload.usage_metadata.map(|usage| ProviderUsage {
        prompt_tokens: usage.prompt_token_count,
        completion_tokens: usage.candidates_token_count,
        total_tokens: usage.total_token_count,
    });

    Ok(ProviderResponse { text, model, usage })
}

fn extract_gemini_error(body: &str) -> Option<String> {
    #[derive(Deserialize)]
    struct ErrorBody {
        error: Option<GeminiError>,
    }

    #[derive(Deserialize)]
    struct GeminiError {
        message: Option<String>,
        status: Option<String>,
        code: Option<i32>,
    }

    let parsed: ErrorBody = serde_json::from_str(body).ok()?;
    let error = parsed.error?;
    Some(format_error_parts(
        error.message,
        error.status,
        error.code.map(|value| value.to_string()),
    ))
}

fn format_error_parts(
    message: Option<String>,
    kind: Option<String>,
    code: Option<String>,
) -> String {
    let mut parts = Vec::new();
    if let Some(message) = message
        && !message.trim().is_empty()
    {
        parts.push(message);
    }
    if let Some(kind) = kind
        && !kind.trim().is_empty()
    {
        parts.push(format!("type: {}", kind));
    }
    if let Some(code) = code
        && !code.trim().is_empty()
    {
        parts.push(format!("code: {}", code));
    }
    if parts.is_empty() {
        "unknown error".to_string()
    } else {
        parts.join(" | ")
    }
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    #[serde(rename = "usageMetadata")]
    usage_metadata: Option<GeminiUsage>,
    #[serde(rename = "modelVersion")]
    model_version: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiUsage {
    #[serde(rename = "promptTokenCount")]
    prompt_token_count: Option<u64>,
    #[serde(rename = "candidatesTokenCount")]
    candidates_token_count: Option<u64>,
    #[serde(rename = "totalTokenCount")]
    total_token_count: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiContent>,
}

#[derive(Debug, Deserialize)]
struct GeminiContent {
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Deserialize)]
struct GeminiPart {
    text: Option<String>,
}
