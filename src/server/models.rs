use serde::{Deserialize, Serialize};

use crate::settings::Settings;

#[derive(Debug, Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
pub(crate) struct PageRequest {
    #[serde(alias = "texts")]
    pub(crate) segments: Vec<String>,
    pub(crate) target_lang: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
pub(crate) struct SelectionRequest {
    pub(crate) text: String,
    pub(crate) target_lang: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
pub(crate) struct AskRequest {
    pub(crate) selected_text: String,
    pub(crate) question: String,
    pub(crate) language: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct SelectionResponse {
    pub(crate) translation: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct AskResponse {
    pub(crate) answer: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SettingsResponse {
    pub(crate) has_api_key: bool,
    pub(crate) model: String,
    pub(crate) source_lang: String,
    pub(crate) target_lang: String,
    pub(crate) selection_translate_enabled: bool,
    pub(crate) max_chunk_size: usize,
    pub(crate) concurrency: usize,
}

impl From<&Settings> for SettingsResponse {
    fn from(settings: &Settings) -> Self {
        Self {
            has_api_key: settings.resolve_api_key(None).is_some(),
            model: settings.model.clone(),
            source_lang: settings.source_lang.clone(),
            target_lang: settings.target_lang.clone(),
            selection_translate_enabled: settings.selection_enabled,
            max_chunk_size: settings.max_chunk_size,
            concurrency: settings.concurrency,
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct SuccessResponse {
    pub(crate) success: bool,
}

#[derive(Debug, Serialize)]
pub(crate) struct ErrorResponse {
    pub(crate) error: String,
}
