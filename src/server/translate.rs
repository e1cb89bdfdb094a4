use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use std::sync::Arc;
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tracing::{error, warn};

use super::models::{
    AskRequest, AskResponse, ErrorResponse, PageRequest, SelectionRequest, SelectionResponse,
    SettingsResponse, SuccessResponse,
};
use super::state::ServerState;
use crate::dispatcher::DispatchEvent;
use crate::error::TranslateError;
use crate::settings::{self, UserSettingsUpdate};

#[derive(Debug)]
pub(crate) struct ServerError {
    pub(crate) status: StatusCode,
    pub(crate) message: String,
}

impl ServerError {
    pub(crate) fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    fn forbidden(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::FORBIDDEN,
            message: message.into(),
        }
    }

    fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }
}

impl From<TranslateError> for ServerError {
    fn from(err: TranslateError) -> Self {
        let status = match &err {
            err if err.is_configuration() => StatusCode::BAD_REQUEST,
            TranslateError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            TranslateError::Prompt(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_GATEWAY,
        };
        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl From<anyhow::Error> for ServerError {
    fn from(err: anyhow::Error) -> Self {
        ServerError::internal(format!("{:#}", err))
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        (self.status, Json(ErrorResponse { error: self.message })).into_response()
    }
}

/// Starts a page translation in the background and returns its event feed.
/// The feed closes after the `complete` (or `error`) event.
pub(crate) async fn start_page_translation(
    state: Arc<ServerState>,
    request: PageRequest,
) -> Result<UnboundedReceiver<DispatchEvent>, ServerError> {
    let (dispatcher, settings) = state.dispatcher().await;
    if !dispatcher.has_credential() {
        return Err(TranslateError::MissingCredential.into());
    }
    let target_lang = pick_lang(request.target_lang, &settings.target_lang);

    let (mut events, receiver) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        let result = dispatcher
            .translate_page(request.segments, &target_lang, &mut events)
            .await;
        if let Err(err) = result {
            error!("page translation failed: {}", err);
            let _ = events.send(DispatchEvent::Error {
                error: err.to_string(),
            });
        }
    });
    Ok(receiver)
}

pub(crate) async fn translate_selection(
    state: &ServerState,
    request: SelectionRequest,
) -> Result<SelectionResponse, ServerError> {
    let (dispatcher, settings) = state.dispatcher().await;
    if !settings.selection_enabled {
        return Err(ServerError::forbidden("selection translation is disabled"));
    }
    let target_lang = pick_lang(request.target_lang, &settings.target_lang);
    let translation = dispatcher
        .translate_selection(&request.text, &target_lang)
        .await
        .inspect_err(|err| warn!("selection translation failed: {}", err))?;
    Ok(SelectionResponse { translation })
}

pub(crate) async fn ask_question(
    state: &ServerState,
    request: AskRequest,
) -> Result<AskResponse, ServerError> {
    let (dispatcher, settings) = state.dispatcher().await;
    let language = pick_lang(request.language, &settings.target_lang);
    let answer = dispatcher
        .ask_question(&request.selected_text, &request.question, &language)
        .await
        .inspect_err(|err| warn!("question failed: {}", err))?;
    Ok(AskResponse { answer })
}

pub(crate) async fn current_settings(state: &ServerState) -> SettingsResponse {
    SettingsResponse::from(&state.snapshot().await)
}

pub(crate) async fn save_settings(
    state: &ServerState,
    update: UserSettingsUpdate,
) -> Result<SuccessResponse, ServerError> {
    if let Some(path) = state.user_settings_path.clone() {
        let file_update = update.clone();
        tokio::task::spawn_blocking(move || settings::save_user_settings(&path, &file_update))
            .await
            .map_err(|err| ServerError::internal(format!("settings task failed: {}", err)))??;
    }
    state.settings.write().await.apply_update(&update);
    Ok(SuccessResponse { success: true })
}

fn pick_lang(requested: Option<String>, fallback: &str) -> String {
    requested
        .map(|lang| lang.trim().to_string())
        .filter(|lang| !lang.is_empty())
        .unwrap_or_else(|| fallback.to_string())
}
