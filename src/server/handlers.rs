use anyhow::{Context, Result};
use axum::body::Body;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::{HeaderMap, HeaderValue, Method, Request, Response, StatusCode};
use axum::middleware::Next;
use axum::response::IntoResponse;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures_util::stream::{self, Stream};
use std::sync::Arc;
use tracing::info;

use super::models::{
    AskRequest, AskResponse, PageRequest, SelectionRequest, SelectionResponse, SettingsResponse,
    SuccessResponse,
};
use super::state::ServerState;
use super::translate::{self, ServerError};
use crate::settings::{self, Settings, UserSettingsUpdate};

pub async fn run_server(settings: Settings, addr: String) -> Result<()> {
    let state = Arc::new(ServerState::new(settings, settings::user_settings_path()));
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| "failed to bind server address")?;
    info!("listening on {}", addr);
    axum::serve(listener, router(state)).await?;
    Ok(())
}

pub(crate) fn router(state: Arc<ServerState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/translate", post(translate_page))
        .route("/translate-selection", post(translate_selection))
        .route("/ask", post(ask))
        .route("/settings", get(settings_info).post(save_settings))
        .with_state(state)
        .layer(axum::middleware::from_fn(cors_middleware))
}

async fn health() -> impl IntoResponse {
    (StatusCode::OK, Json(serde_json::json!({ "status": "ok" })))
}

async fn cors_middleware(req: Request<Body>, next: Next) -> Result<Response<Body>, StatusCode> {
    if req.method() == Method::OPTIONS {
        let mut response = Response::new(Body::empty());
        *response.status_mut() = StatusCode::NO_CONTENT;
        apply_cors_headers(response.headers_mut());
        return Ok(response);
    }
    let mut response = next.run(req).await;
    apply_cors_headers(response.headers_mut());
    Ok(response)
}

fn apply_cors_headers(headers: &mut HeaderMap) {
    headers.insert("access-control-allow-origin", HeaderValue::from_static("*"));
    headers.insert(
        "access-control-allow-methods",
        HeaderValue::from_static("GET,POST,OPTIONS"),
    );
    headers.insert(
        "access-control-allow-headers",
        HeaderValue::from_static("content-type,authorization"),
    );
}

fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ServerError> {
    payload
        .map(|Json(value)| value)
        .map_err(|rejection| ServerError::bad_request(rejection.body_text()))
}

async fn translate_page(
    State(state): State<Arc<ServerState>>,
    payload: Result<Json<PageRequest>, JsonRejection>,
) -> Result<Sse<impl Stream<Item = Result<Event, axum::Error>>>, ServerError> {
    let request = json_body(payload)?;
    let events = translate::start_page_translation(state, request).await?;
    let stream = stream::unfold(events, |mut events| async move {
        let event = events.recv().await?;
        Some((Event::default().json_data(event), events))
    });
    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

async fn translate_selection(
    State(state): State<Arc<ServerState>>,
    payload: Result<Json<SelectionRequest>, JsonRejection>,
) -> Result<Json<SelectionResponse>, ServerError> {
    let request = json_body(payload)?;
    translate::translate_selection(state.as_ref(), request)
        .await
        .map(Json)
}

async fn ask(
    State(state): State<Arc<ServerState>>,
    payload: Result<Json<AskRequest>, JsonRejection>,
) -> Result<Json<AskResponse>, ServerError> {
    let request = json_body(payload)?;
    translate::ask_question(state.as_ref(), request)
        .await
        .map(Json)
}

async fn settings_info(State(state): State<Arc<ServerState>>) -> Json<SettingsResponse> {
    Json(translate::current_settings(state.as_ref()).await)
}

async fn save_settings(
    State(state): State<Arc<ServerState>>,
    payload: Result<Json<UserSettingsUpdate>, JsonRejection>,
) -> Result<Json<SuccessResponse>, ServerError> {
    let update = json_body(payload)?;
    translate::save_settings(state.as_ref(), update)
        .await
        .map(Json)
}
