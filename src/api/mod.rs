// HTTP API routes: the gateway adapter in front of the game engine.
//
// Each route maps one inbound operation onto the engine; the chat
// platform itself is out of scope, so user identity arrives as opaque
// numeric ids supplied by whatever gateway fronts this service.

pub mod ws;

use axum::{
    extract::{Json, Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

use crate::db::Database;
use crate::engine::channel_game::ChannelGame;
use crate::engine::language::Language;
use crate::engine::lexicon::Dictionaries;
use crate::engine::session::{start_session, GameOptions};
use crate::engine::validator::GameMode;
use crate::engine::EngineError;
use crate::metrics;
use crate::registry::{ChannelGameRegistry, SessionRegistry};

// ── Request types ─────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct StartGameRequest {
    pub user_id: u64,
    pub display_name: String,
    pub language: Option<String>,
    pub mode: Option<String>,
    pub min_players: Option<usize>,
    pub join_secs: Option<u64>,
    pub turn_secs: Option<u64>,
}

#[derive(Deserialize)]
pub struct JoinRequest {
    pub user_id: u64,
    pub display_name: String,
}

#[derive(Deserialize)]
pub struct PlayWordRequest {
    pub user_id: u64,
    pub word: String,
}

#[derive(Deserialize)]
pub struct UserRequest {
    pub user_id: u64,
}

#[derive(Deserialize)]
pub struct BindChainRequest {
    pub language: String,
    pub mode: Option<String>,
    pub turn_time_secs: Option<i64>,
}

#[derive(Deserialize)]
pub struct ChainMessageRequest {
    pub user_id: u64,
    pub display_name: String,
    pub text: String,
}

// ── Shared application state ─────────────────────────────────────────

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Database>,
    pub dicts: Arc<Dictionaries>,
    pub sessions: SessionRegistry,
    pub channels: ChannelGameRegistry,
}

// ── Error helpers ─────────────────────────────────────────────────────

fn json_error(status: StatusCode, msg: &str) -> impl IntoResponse {
    (status, Json(json!({ "error": msg })))
}

fn internal_error(e: sqlx::Error) -> impl IntoResponse {
    tracing::error!("Database error: {e}");
    json_error(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
}

/// Engine refusals are expected outcomes; map them to benign statuses.
fn engine_error(e: EngineError) -> axum::response::Response {
    let status = match e {
        EngineError::UnknownLanguage(_) => StatusCode::BAD_REQUEST,
        EngineError::DictionaryUnavailable(_) => StatusCode::UNPROCESSABLE_ENTITY,
        EngineError::GameAlreadyRunning => StatusCode::CONFLICT,
        EngineError::GameNotFound => StatusCode::NOT_FOUND,
        EngineError::NotInProgress | EngineError::NotYourTurn => StatusCode::CONFLICT,
        EngineError::Storage(ref inner) => {
            tracing::error!("Database error: {inner}");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    json_error(status, &e.to_string()).into_response()
}

// ── Router ────────────────────────────────────────────────────────────

pub fn router(
    db: Arc<Database>,
    dicts: Arc<Dictionaries>,
    sessions: SessionRegistry,
    channels: ChannelGameRegistry,
) -> Router {
    let state = AppState {
        db,
        dicts,
        sessions,
        channels,
    };

    Router::new()
        // Dictionaries
        .route("/api/languages", get(list_languages))
        // Ephemeral lobby games
        .route("/api/channels/{id}/game/start", post(start_game))
        .route("/api/channels/{id}/game/join", post(join_game))
        .route("/api/channels/{id}/game/start-now", post(start_now))
        .route("/api/channels/{id}/game/play", post(play_word))
        .route("/api/channels/{id}/game/giveup", post(give_up))
        .route("/api/channels/{id}/game/stop", post(stop_game))
        .route("/api/channels/{id}/game", get(game_status))
        // Persistent channel games
        .route(
            "/api/channels/{id}/chain",
            post(bind_chain).get(chain_status).delete(unbind_chain),
        )
        .route("/api/channels/{id}/chain/message", post(chain_message))
        .route("/api/channels/{id}/chain/giveup", post(chain_give_up))
        // Observability
        .route("/metrics", get(metrics_text))
        // WebSocket event stream
        .route("/ws/channels/{id}", get(ws::ws_events))
        .with_state(state)
}

// ── Dictionary handlers ───────────────────────────────────────────────

async fn list_languages(State(state): State<AppState>) -> impl IntoResponse {
    let languages: Vec<_> = state
        .dicts
        .available()
        .into_iter()
        .map(|(language, words)| json!({ "language": language, "words": words }))
        .collect();
    Json(json!({ "languages": languages }))
}

// ── Lobby game handlers ───────────────────────────────────────────────

async fn start_game(
    State(state): State<AppState>,
    Path(channel_id): Path<i64>,
    Json(req): Json<StartGameRequest>,
) -> impl IntoResponse {
    let defaults = GameOptions::default();
    let language = match req.language.as_deref() {
        Some(tag) => match Language::from_tag(tag) {
            Some(l) => l,
            None => {
                return json_error(StatusCode::BAD_REQUEST, "unknown language").into_response()
            }
        },
        None => defaults.language,
    };
    let mode = match req.mode.as_deref() {
        Some(tag) => match GameMode::from_tag(tag) {
            Some(m) => m,
            None => return json_error(StatusCode::BAD_REQUEST, "unknown mode").into_response(),
        },
        None => defaults.mode,
    };
    let options = GameOptions {
        language,
        mode,
        min_players: req.min_players.unwrap_or(defaults.min_players).max(1),
        join_secs: req.join_secs.unwrap_or(defaults.join_secs),
        turn_secs: req.turn_secs.unwrap_or(defaults.turn_secs).max(1),
    };

    match start_session(&state.sessions, &state.dicts, channel_id, options) {
        Ok(session) => {
            // The initiator is always the first player.
            session.join(req.user_id, &req.display_name);
            (StatusCode::CREATED, Json(json!({ "accepted": true }))).into_response()
        }
        Err(e) => engine_error(e),
    }
}

async fn join_game(
    State(state): State<AppState>,
    Path(channel_id): Path<i64>,
    Json(req): Json<JoinRequest>,
) -> impl IntoResponse {
    match state.sessions.get(channel_id) {
        Some(session) => {
            let joined = session.join(req.user_id, &req.display_name);
            Json(json!({ "joined": joined })).into_response()
        }
        None => engine_error(EngineError::GameNotFound),
    }
}

async fn start_now(
    State(state): State<AppState>,
    Path(channel_id): Path<i64>,
    Json(req): Json<UserRequest>,
) -> impl IntoResponse {
    match state.sessions.get(channel_id) {
        Some(session) => {
            let accepted = session.request_start(req.user_id);
            Json(json!({ "accepted": accepted })).into_response()
        }
        None => engine_error(EngineError::GameNotFound),
    }
}

async fn play_word(
    State(state): State<AppState>,
    Path(channel_id): Path<i64>,
    Json(req): Json<PlayWordRequest>,
) -> impl IntoResponse {
    let session = match state.sessions.get(channel_id) {
        Some(s) => s,
        None => return engine_error(EngineError::GameNotFound),
    };
    match session.play_word(req.user_id, &req.word) {
        Ok(verdict) => Json(json!({ "verdict": verdict })).into_response(),
        Err(e) => engine_error(e),
    }
}

async fn give_up(
    State(state): State<AppState>,
    Path(channel_id): Path<i64>,
    Json(req): Json<UserRequest>,
) -> impl IntoResponse {
    match state.sessions.get(channel_id) {
        Some(session) => {
            let accepted = session.give_up(req.user_id);
            Json(json!({ "accepted": accepted })).into_response()
        }
        None => engine_error(EngineError::GameNotFound),
    }
}

async fn stop_game(
    State(state): State<AppState>,
    Path(channel_id): Path<i64>,
) -> impl IntoResponse {
    match state.sessions.get(channel_id) {
        Some(session) => {
            session.stop();
            Json(json!({ "stopped": true })).into_response()
        }
        None => engine_error(EngineError::GameNotFound),
    }
}

async fn game_status(
    State(state): State<AppState>,
    Path(channel_id): Path<i64>,
) -> impl IntoResponse {
    match state.sessions.get(channel_id) {
        Some(session) => Json(json!(session.snapshot())).into_response(),
        None => engine_error(EngineError::GameNotFound),
    }
}

// ── Persistent channel game handlers ──────────────────────────────────

async fn bind_chain(
    State(state): State<AppState>,
    Path(channel_id): Path<i64>,
    Json(req): Json<BindChainRequest>,
) -> impl IntoResponse {
    let language = match Language::from_tag(&req.language) {
        Some(l) => l,
        None => return json_error(StatusCode::BAD_REQUEST, "unknown language").into_response(),
    };
    let mode = match req.mode.as_deref() {
        Some(tag) => match GameMode::from_tag(tag) {
            Some(m) => m,
            None => return json_error(StatusCode::BAD_REQUEST, "unknown mode").into_response(),
        },
        None => GameMode::Normal,
    };
    let turn_time_secs = req.turn_time_secs.unwrap_or(60).max(1);

    if state.channels.get(channel_id).is_some() {
        return engine_error(EngineError::GameAlreadyRunning);
    }
    match ChannelGame::create(
        state.db.clone(),
        &state.dicts,
        channel_id,
        language,
        mode,
        turn_time_secs,
    )
    .await
    {
        Ok(game) => {
            let starting_word = game.current_word();
            if !state.channels.insert_if_absent(channel_id, game) {
                // Lost a race after the durable insert; the winner owns it.
                return engine_error(EngineError::GameAlreadyRunning);
            }
            (
                StatusCode::CREATED,
                Json(json!({ "accepted": true, "starting_word": starting_word })),
            )
                .into_response()
        }
        Err(e) => engine_error(e),
    }
}

async fn chain_status(
    State(state): State<AppState>,
    Path(channel_id): Path<i64>,
) -> impl IntoResponse {
    match state.channels.get(channel_id) {
        Some(game) => Json(json!({
            "channel_id": game.channel_id(),
            "language": game.language(),
            "mode": game.mode(),
            "turn_time_secs": game.turn_time_secs(),
            "current_word": game.current_word(),
            "participants": game.participant_count(),
        }))
        .into_response(),
        None => engine_error(EngineError::GameNotFound),
    }
}

async fn unbind_chain(
    State(state): State<AppState>,
    Path(channel_id): Path<i64>,
) -> impl IntoResponse {
    state.channels.remove(channel_id);
    match state.db.delete_channel_game(channel_id).await {
        Ok(deleted) => Json(json!({ "deleted": deleted })).into_response(),
        Err(e) => internal_error(e).into_response(),
    }
}

async fn chain_message(
    State(state): State<AppState>,
    Path(channel_id): Path<i64>,
    Json(req): Json<ChainMessageRequest>,
) -> impl IntoResponse {
    let game = match state.channels.get(channel_id) {
        Some(g) => g,
        None => return engine_error(EngineError::GameNotFound),
    };
    let verdict = game
        .handle_message(req.user_id, &req.display_name, &req.text)
        .await;
    Json(json!({ "verdict": verdict })).into_response()
}

async fn chain_give_up(
    State(state): State<AppState>,
    Path(channel_id): Path<i64>,
    Json(req): Json<UserRequest>,
) -> impl IntoResponse {
    match state.channels.get(channel_id) {
        Some(game) => {
            let left = game.give_up(req.user_id).await;
            Json(json!({ "left": left })).into_response()
        }
        None => engine_error(EngineError::GameNotFound),
    }
}

// ── Observability ─────────────────────────────────────────────────────

async fn metrics_text() -> impl IntoResponse {
    metrics::gather_metrics()
}
