use crate::session::{
    FlipResponse, GameStateResponse, SessionError, SessionId, SessionManager,
};
use crate::settings::{AppSettings, SettingsStore};
use pairs_engine::cards::CardId;
use pairs_engine::game::GameConfig;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use warp::http::{self, StatusCode};
use warp::reply::{self, Response};
use warp::Reply;

/// Body of `POST /api/sessions`. Omitted fields fall back to the current settings.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct CreateSessionRequest {
    #[serde(default)]
    pub pairs: Option<usize>,
    #[serde(default)]
    pub max_attempts: Option<u32>,
    #[serde(default)]
    pub values: Option<Vec<String>>,
    #[serde(default)]
    pub seed: Option<u64>,
}

impl CreateSessionRequest {
    fn into_config(self, defaults: &AppSettings) -> GameConfig {
        let mut config = defaults.game_config();
        if let Some(pairs) = self.pairs {
            config.pairs = pairs;
        }
        if let Some(max_attempts) = self.max_attempts {
            config.max_attempts = max_attempts;
        }
        config.values = self.values;
        config.seed = self.seed;
        config
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionResponse {
    pub session_id: SessionId,
    pub config: GameConfig,
    pub state: GameStateResponse,
    /// Delay the page should wait after a mismatch before re-polling
    pub flip_back_ms: u64,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct FlipRequest {
    pub card_id: CardId,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct ResetRequest {
    /// New value pool; the current board's values are reused when absent
    #[serde(default)]
    pub values: Option<Vec<String>>,
}

/// `POST /api/sessions`
///
/// Creates a session and starts its game straight away. Responds `201` with
/// a [`SessionResponse`], or `400 config_error` when the board cannot be
/// built from the requested pairs and values.
pub async fn create_session(
    sessions: Arc<SessionManager>,
    settings: Arc<SettingsStore>,
    request: CreateSessionRequest,
) -> Response {
    let defaults = match settings.get() {
        Ok(defaults) => defaults,
        Err(err) => {
            use crate::errors::IntoErrorResponse;
            return err.into_http_response();
        }
    };
    let config = request.into_config(&defaults);

    match sessions
        .create_session(config)
        .and_then(|id| assemble_session_response(&sessions, &id))
    {
        Ok(response) => success_response(StatusCode::CREATED, response),
        Err(err) => session_error(err),
    }
}

/// `GET /api/sessions/{id}`: configuration and current board.
pub async fn get_session(sessions: Arc<SessionManager>, session_id: SessionId) -> Response {
    match assemble_session_response(&sessions, &session_id) {
        Ok(response) => success_response(StatusCode::OK, response),
        Err(err) => session_error(err),
    }
}

/// `GET /api/sessions/{id}/state`: the board as the page renders it.
pub async fn get_session_state(sessions: Arc<SessionManager>, session_id: SessionId) -> Response {
    match sessions.state(&session_id) {
        Ok(state) => success_response(StatusCode::OK, state),
        Err(err) => session_error(err),
    }
}

/// `POST /api/sessions/{id}/flip`
///
/// Responds with a [`FlipResponse`]. Rejections keep their taxonomy:
/// `404 card_not_found` for an unknown id, `409 invalid_state` for a matched
/// card, a card waiting to be hidden, or a finished game.
pub async fn flip_card(
    sessions: Arc<SessionManager>,
    session_id: SessionId,
    request: FlipRequest,
) -> Response {
    match sessions.flip(&session_id, request.card_id) {
        Ok(response) => success_response(StatusCode::OK, response),
        Err(err) => session_error(err),
    }
}

/// `POST /api/sessions/{id}/start`: new attempt budget on the same board.
pub async fn start_game(sessions: Arc<SessionManager>, session_id: SessionId) -> Response {
    match sessions.start(&session_id) {
        Ok(state) => success_response(StatusCode::OK, state),
        Err(err) => session_error(err),
    }
}

/// `POST /api/sessions/{id}/reset`: reshuffled board, optionally from new values.
pub async fn reset_game(
    sessions: Arc<SessionManager>,
    session_id: SessionId,
    request: ResetRequest,
) -> Response {
    match sessions.reset(&session_id, request.values) {
        Ok(state) => success_response(StatusCode::OK, state),
        Err(err) => session_error(err),
    }
}

/// `DELETE /api/sessions/{id}`
pub async fn delete_session(sessions: Arc<SessionManager>, session_id: SessionId) -> Response {
    match sessions.delete_session(&session_id) {
        Ok(()) => empty_response(StatusCode::NO_CONTENT),
        Err(err) => session_error(err),
    }
}

fn assemble_session_response(
    sessions: &SessionManager,
    session_id: &SessionId,
) -> Result<SessionResponse, SessionError> {
    let state = sessions.state(session_id)?;
    let config = sessions.config(session_id)?;
    Ok(SessionResponse {
        session_id: session_id.clone(),
        config,
        state,
        flip_back_ms: sessions.flip_back_delay().as_millis() as u64,
    })
}

fn success_response<T>(status: StatusCode, body: T) -> Response
where
    T: Serialize,
{
    reply::with_status(reply::json(&body), status).into_response()
}

fn empty_response(status: StatusCode) -> Response {
    let mut response = http::Response::new(warp::hyper::Body::empty());
    *response.status_mut() = status;
    response
}

fn session_error(err: SessionError) -> Response {
    use crate::errors::IntoErrorResponse;
    err.into_http_response()
}
