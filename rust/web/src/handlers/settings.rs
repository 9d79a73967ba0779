use crate::errors::IntoErrorResponse;
use crate::session::SessionManager;
use crate::settings::{AppSettings, SettingsStore};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use warp::reply::{self, Response};
use warp::Reply;

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct UpdateSettingsRequest {
    pub default_pairs: Option<usize>,
    pub default_max_attempts: Option<u32>,
    pub session_timeout_minutes: Option<u64>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct UpdateFieldRequest {
    pub field: String,
    pub value: serde_json::Value,
}

/// `GET /api/settings`
pub async fn get_settings(store: Arc<SettingsStore>) -> Response {
    match store.get() {
        Ok(settings) => reply::json(&settings).into_response(),
        Err(err) => err.into_http_response(),
    }
}

/// `PUT /api/settings`: fields left out keep their current value.
pub async fn update_settings(
    store: Arc<SettingsStore>,
    sessions: Arc<SessionManager>,
    request: UpdateSettingsRequest,
) -> Response {
    let mut current = match store.get() {
        Ok(s) => s,
        Err(err) => return err.into_http_response(),
    };

    if let Some(pairs) = request.default_pairs {
        current.default_pairs = pairs;
    }
    if let Some(attempts) = request.default_max_attempts {
        current.default_max_attempts = attempts;
    }
    if let Some(timeout) = request.session_timeout_minutes {
        current.session_timeout_minutes = timeout;
    }

    applied(store.update(current), &sessions)
}

/// `PATCH /api/settings`: one field by name.
pub async fn update_field(
    store: Arc<SettingsStore>,
    sessions: Arc<SessionManager>,
    request: UpdateFieldRequest,
) -> Response {
    applied(store.update_field(&request.field, request.value), &sessions)
}

/// `POST /api/settings/reset`
pub async fn reset_settings(store: Arc<SettingsStore>, sessions: Arc<SessionManager>) -> Response {
    applied(store.reset(), &sessions)
}

fn applied(
    result: Result<AppSettings, crate::settings::SettingsError>,
    sessions: &SessionManager,
) -> Response {
    match result {
        Ok(settings) => {
            sessions.set_session_ttl(Duration::from_secs(settings.session_timeout_minutes * 60));
            reply::json(&settings).into_response()
        }
        Err(err) => err.into_http_response(),
    }
}
