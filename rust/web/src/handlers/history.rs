use crate::errors::IntoErrorResponse;
use crate::history::{GameFilter, HistoryStore};
use serde::Deserialize;
use std::sync::Arc;
use warp::reply::{self, Response};
use warp::Reply;

#[derive(Debug, Default, Deserialize)]
pub struct GetHistoryQuery {
    #[serde(default)]
    pub limit: Option<usize>,
}

/// `GET /api/history?limit=N`: finished games, newest first.
pub async fn get_recent_games(history: Arc<HistoryStore>, query: GetHistoryQuery) -> Response {
    match history.get_recent_games(query.limit) {
        Ok(games) => reply::json(&games).into_response(),
        Err(err) => err.into_http_response(),
    }
}

/// `GET /api/history/{game_id}`
pub async fn get_game_by_id(history: Arc<HistoryStore>, game_id: String) -> Response {
    match history.get_game(&game_id) {
        Ok(game) => reply::json(&game).into_response(),
        Err(err) => err.into_http_response(),
    }
}

/// `POST /api/history/filter`
pub async fn filter_games(history: Arc<HistoryStore>, filter: GameFilter) -> Response {
    match history.filter_games(&filter) {
        Ok(games) => reply::json(&games).into_response(),
        Err(err) => err.into_http_response(),
    }
}

/// `GET /api/history/stats`
pub async fn get_statistics(history: Arc<HistoryStore>) -> Response {
    match history.calculate_stats() {
        Ok(stats) => reply::json(&stats).into_response(),
        Err(err) => err.into_http_response(),
    }
}
