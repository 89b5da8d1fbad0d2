//! WebSocket event stream + REST endpoints for the intro.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::intro::{IntroEvent, IntroPreference, IntroSite, Key};

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub site: Arc<IntroSite>,
}

/// Build the Axum router with the intro WebSocket and REST routes.
pub fn intro_routes(site: Arc<IntroSite>) -> Router {
    let state = AppState { site };

    Router::new()
        .route("/ws/intro", get(ws_handler))
        .route("/health", get(health))
        .route("/api/intro/status", get(status))
        .route("/api/intro/skip", post(skip))
        .route("/api/intro/key", post(key))
        .route("/api/intro/reload", post(reload))
        .route("/api/intro/session/end", post(end_session))
        .route(
            "/api/intro/preference",
            get(get_preference).put(put_preference),
        )
        .with_state(state)
}

// ── Health ──────────────────────────────────────────────────────────────

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "intro-sequencer"
    }))
}

// ── REST ────────────────────────────────────────────────────────────────

/// GET /api/intro/status
async fn status(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.site.snapshot().await)
}

/// POST /api/intro/skip
///
/// The skip control. 202 when the request reached a mounted intro,
/// 409 when there is nothing to skip.
async fn skip(State(state): State<AppState>) -> impl IntoResponse {
    match state.site.skip().await {
        Ok(()) => (
            StatusCode::ACCEPTED,
            Json(serde_json::json!({"accepted": true})),
        ),
        Err(e) => (
            StatusCode::CONFLICT,
            Json(serde_json::json!({"error": e.to_string()})),
        ),
    }
}

#[derive(Deserialize)]
struct KeyBody {
    key: String,
}

/// POST /api/intro/key
async fn key(State(state): State<AppState>, Json(body): Json<KeyBody>) -> impl IntoResponse {
    let skipped = state.site.key_pressed(Key::from(body.key.as_str())).await;
    Json(serde_json::json!({"skipped": skipped}))
}

/// POST /api/intro/reload
///
/// Equivalent to a fresh page load.
async fn reload(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.site.reload().await)
}

/// POST /api/intro/session/end
async fn end_session(State(state): State<AppState>) -> impl IntoResponse {
    state.site.end_session().await;
    StatusCode::NO_CONTENT
}

/// GET /api/intro/preference
async fn get_preference(State(state): State<AppState>) -> impl IntoResponse {
    let snapshot = state.site.snapshot().await;
    Json(serde_json::json!({"preference": snapshot.preference}))
}

#[derive(Deserialize)]
struct PreferenceBody {
    preference: String,
}

/// PUT /api/intro/preference
async fn put_preference(
    State(state): State<AppState>,
    Json(body): Json<PreferenceBody>,
) -> impl IntoResponse {
    match body.preference.parse::<IntroPreference>() {
        Ok(pref) => {
            state.site.set_preference(pref).await;
            (
                StatusCode::OK,
                Json(serde_json::json!({"preference": pref})),
            )
        }
        Err(e) => (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({"error": e.to_string()})),
        ),
    }
}

// ── WebSocket ───────────────────────────────────────────────────────────

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    info!("Intro renderer connecting");
    ws.on_upgrade(|socket| handle_socket(socket, state.site))
}

/// Actions a renderer can send.
#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
enum ClientAction {
    Skip,
    Key { key: String },
}

async fn sync_message(site: &IntroSite) -> IntroEvent {
    let snapshot = site.snapshot().await;
    IntroEvent::Sync {
        phase: snapshot.phase,
        should_show: snapshot.should_show,
        is_complete: snapshot.is_complete,
        preference: snapshot.preference,
    }
}

async fn send_event(socket: &mut WebSocket, event: &IntroEvent) -> bool {
    match serde_json::to_string(event) {
        Ok(json) => socket.send(Message::Text(json.into())).await.is_ok(),
        Err(e) => {
            warn!("Failed to serialize intro event: {}", e);
            true
        }
    }
}

async fn handle_socket(mut socket: WebSocket, site: Arc<IntroSite>) {
    // Subscribe before the snapshot so nothing falls between the two.
    let mut rx = site.subscribe();

    let sync = sync_message(&site).await;
    if !send_event(&mut socket, &sync).await {
        warn!("Failed to send initial sync, renderer disconnected");
        return;
    }

    loop {
        tokio::select! {
            result = rx.recv() => {
                match result {
                    Ok(event) => {
                        if !send_event(&mut socket, &event).await {
                            debug!("Renderer disconnected during send");
                            break;
                        }
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                        warn!(missed = n, "Intro renderer lagged behind broadcast");
                        let sync = sync_message(&site).await;
                        if !send_event(&mut socket, &sync).await {
                            break;
                        }
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => {
                        debug!("Broadcast channel closed");
                        break;
                    }
                }
            }

            result = socket.recv() => {
                match result {
                    Some(Ok(Message::Text(text))) => {
                        handle_client_message(&text, &site).await;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if socket.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        info!("Intro renderer disconnected");
                        break;
                    }
                    Some(Err(e)) => {
                        warn!("WebSocket error: {}", e);
                        break;
                    }
                    _ => {}
                }
            }
        }
    }
}

async fn handle_client_message(text: &str, site: &IntroSite) {
    let action: ClientAction = match serde_json::from_str(text) {
        Ok(a) => a,
        Err(e) => {
            warn!(raw = %text, "Invalid renderer action: {}", e);
            return;
        }
    };

    match action {
        ClientAction::Skip => {
            if let Err(e) = site.skip().await {
                debug!("Skip ignored: {}", e);
            }
        }
        ClientAction::Key { key } => {
            site.key_pressed(Key::from(key.as_str())).await;
        }
    }
}
