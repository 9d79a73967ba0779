use thiserror::Error;

use crate::cards::CardId;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum GameError {
    #[error("Invalid configuration: {0}")]
    Config(String),
    #[error("Card not found: {0}")]
    NotFound(CardId),
    #[error("Invalid state: {0}")]
    InvalidState(String),
}

impl GameError {
    /// Stable, machine-readable name of the failure class.
    pub fn kind(&self) -> &'static str {
        match self {
            GameError::Config(_) => "config_error",
            GameError::NotFound(_) => "card_not_found",
            GameError::InvalidState(_) => "invalid_state",
        }
    }
}
