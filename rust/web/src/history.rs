use crate::session::SessionId;
use pairs_engine::game::GameStatus;
use serde::{Deserialize, Serialize};
use std::sync::RwLock;
use thiserror::Error;

/// Outcome of one finished game, kept for the lifetime of the server process.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GameSummary {
    pub game_id: String,
    pub session_id: SessionId,
    /// `Won` or `Lost`
    pub status: GameStatus,
    pub pairs: usize,
    pub max_attempts: u32,
    pub attempts_left: u32,
    pub turns: u32,
    pub seed: u64,
    /// RFC3339 timestamp
    pub finished_at: String,
}

impl GameSummary {
    pub fn attempts_used(&self) -> u32 {
        self.max_attempts.saturating_sub(self.attempts_left)
    }
}

/// Finished-game storage and retrieval
#[derive(Debug)]
pub struct HistoryStore {
    games: RwLock<Vec<GameSummary>>,
}

impl HistoryStore {
    pub fn new() -> Self {
        Self {
            games: RwLock::new(Vec::new()),
        }
    }

    pub fn add_game(&self, summary: GameSummary) -> Result<(), HistoryError> {
        let mut games = self
            .games
            .write()
            .map_err(|_| HistoryError::StoragePoisoned)?;
        games.push(summary);
        Ok(())
    }

    /// Most recent first, 100 by default
    pub fn get_recent_games(&self, limit: Option<usize>) -> Result<Vec<GameSummary>, HistoryError> {
        let games = self
            .games
            .read()
            .map_err(|_| HistoryError::StoragePoisoned)?;
        let limit = limit.unwrap_or(100);
        Ok(games.iter().rev().take(limit).cloned().collect())
    }

    pub fn get_game(&self, game_id: &str) -> Result<GameSummary, HistoryError> {
        let games = self
            .games
            .read()
            .map_err(|_| HistoryError::StoragePoisoned)?;
        games
            .iter()
            .find(|g| g.game_id == game_id)
            .cloned()
            .ok_or_else(|| HistoryError::NotFound(game_id.to_string()))
    }

    pub fn filter_games(&self, filter: &GameFilter) -> Result<Vec<GameSummary>, HistoryError> {
        let games = self
            .games
            .read()
            .map_err(|_| HistoryError::StoragePoisoned)?;
        Ok(games.iter().filter(|g| filter.matches(g)).cloned().collect())
    }

    pub fn calculate_stats(&self) -> Result<GameStatistics, HistoryError> {
        let games = self
            .games
            .read()
            .map_err(|_| HistoryError::StoragePoisoned)?;

        if games.is_empty() {
            return Ok(GameStatistics::default());
        }

        let total_games = games.len();
        let wins = games.iter().filter(|g| g.status == GameStatus::Won).count();
        let turns: u64 = games.iter().map(|g| u64::from(g.turns)).sum();
        let used: u64 = games.iter().map(|g| u64::from(g.attempts_used())).sum();

        Ok(GameStatistics {
            total_games,
            wins,
            losses: total_games - wins,
            win_rate: (wins as f64 / total_games as f64) * 100.0,
            avg_turns: turns as f64 / total_games as f64,
            avg_attempts_used: used as f64 / total_games as f64,
        })
    }

    pub fn total_games(&self) -> Result<usize, HistoryError> {
        let games = self
            .games
            .read()
            .map_err(|_| HistoryError::StoragePoisoned)?;
        Ok(games.len())
    }
}

impl Default for HistoryStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Filter criteria for game history
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GameFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<GameStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pairs: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_from: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_to: Option<String>,
}

impl GameFilter {
    fn matches(&self, game: &GameSummary) -> bool {
        if self.status.is_some_and(|s| s != game.status) {
            return false;
        }
        if self.pairs.is_some_and(|p| p != game.pairs) {
            return false;
        }
        // RFC3339 strings in the same offset compare chronologically
        if let Some(from) = &self.date_from {
            if game.finished_at.as_str() < from.as_str() {
                return false;
            }
        }
        if let Some(to) = &self.date_to {
            if game.finished_at.as_str() > to.as_str() {
                return false;
            }
        }
        true
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct GameStatistics {
    pub total_games: usize,
    pub wins: usize,
    pub losses: usize,
    pub win_rate: f64,
    pub avg_turns: f64,
    pub avg_attempts_used: f64,
}

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("History storage poisoned")]
    StoragePoisoned,
    #[error("Game not found: {0}")]
    NotFound(String),
}

impl crate::errors::IntoErrorResponse for HistoryError {
    fn status_code(&self) -> warp::http::StatusCode {
        use warp::http::StatusCode;
        match self {
            HistoryError::StoragePoisoned => StatusCode::INTERNAL_SERVER_ERROR,
            HistoryError::NotFound(_) => StatusCode::NOT_FOUND,
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            HistoryError::StoragePoisoned => "history_storage_error",
            HistoryError::NotFound(_) => "game_not_found",
        }
    }

    fn error_message(&self) -> String {
        self.to_string()
    }

    fn severity(&self) -> crate::errors::ErrorSeverity {
        use crate::errors::ErrorSeverity;
        match self {
            HistoryError::StoragePoisoned => ErrorSeverity::Critical,
            HistoryError::NotFound(_) => ErrorSeverity::Client,
        }
    }
}
