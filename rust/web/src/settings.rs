use pairs_engine::game::{GameConfig, DEFAULT_MAX_ATTEMPTS, DEFAULT_PAIRS};
use serde::{Deserialize, Serialize};
use std::sync::RwLock;
use thiserror::Error;

/// Upper bound on board size offered to new sessions.
pub const MAX_PAIRS: usize = 32;

/// Defaults applied to new sessions; editable at runtime through the API.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AppSettings {
    pub default_pairs: usize,
    pub default_max_attempts: u32,
    /// Idle time after which a session is dropped
    pub session_timeout_minutes: u64,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            default_pairs: DEFAULT_PAIRS,
            default_max_attempts: DEFAULT_MAX_ATTEMPTS,
            session_timeout_minutes: 30,
        }
    }
}

impl AppSettings {
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.default_pairs < 1 || self.default_pairs > MAX_PAIRS {
            return Err(SettingsError::InvalidValue(format!(
                "default_pairs must be between 1 and {MAX_PAIRS}"
            )));
        }

        if self.default_max_attempts < 1 {
            return Err(SettingsError::InvalidValue(
                "default_max_attempts must be at least 1".to_string(),
            ));
        }

        if self.session_timeout_minutes == 0 {
            return Err(SettingsError::InvalidValue(
                "session_timeout_minutes must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Game configuration for a session that did not ask for anything specific.
    pub fn game_config(&self) -> GameConfig {
        GameConfig::new(self.default_pairs, self.default_max_attempts)
    }
}

/// In-memory settings store with validation
#[derive(Debug)]
pub struct SettingsStore {
    settings: RwLock<AppSettings>,
    /// What `reset` goes back to; the startup configuration, not the built-ins
    baseline: AppSettings,
}

impl SettingsStore {
    pub fn new() -> Self {
        Self {
            settings: RwLock::new(AppSettings::default()),
            baseline: AppSettings::default(),
        }
    }

    pub fn with_settings(settings: AppSettings) -> Result<Self, SettingsError> {
        settings.validate()?;
        Ok(Self {
            settings: RwLock::new(settings.clone()),
            baseline: settings,
        })
    }

    pub fn get(&self) -> Result<AppSettings, SettingsError> {
        self.settings
            .read()
            .map(|guard| guard.clone())
            .map_err(|_| SettingsError::StoragePoisoned)
    }

    pub fn update(&self, new_settings: AppSettings) -> Result<AppSettings, SettingsError> {
        new_settings.validate()?;

        let mut guard = self
            .settings
            .write()
            .map_err(|_| SettingsError::StoragePoisoned)?;
        *guard = new_settings.clone();
        tracing::info!(
            default_pairs = new_settings.default_pairs,
            default_max_attempts = new_settings.default_max_attempts,
            session_timeout_minutes = new_settings.session_timeout_minutes,
            "settings updated"
        );
        Ok(new_settings)
    }

    pub fn update_field(
        &self,
        field: &str,
        value: serde_json::Value,
    ) -> Result<AppSettings, SettingsError> {
        let mut current = self.get()?;
        let number = |name: &str| {
            value
                .as_u64()
                .ok_or_else(|| SettingsError::InvalidValue(format!("{name} must be a number")))
        };

        match field {
            "default_pairs" => current.default_pairs = number(field)? as usize,
            "default_max_attempts" => {
                current.default_max_attempts = u32::try_from(number(field)?).map_err(|_| {
                    SettingsError::InvalidValue("default_max_attempts is too large".to_string())
                })?
            }
            "session_timeout_minutes" => current.session_timeout_minutes = number(field)?,
            _ => {
                return Err(SettingsError::InvalidValue(format!(
                    "unknown field: {}",
                    field
                )))
            }
        }

        self.update(current)
    }

    pub fn reset(&self) -> Result<AppSettings, SettingsError> {
        self.update(self.baseline.clone())
    }
}

impl Default for SettingsStore {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Invalid settings value: {0}")]
    InvalidValue(String),
    #[error("Settings storage poisoned")]
    StoragePoisoned,
}

impl crate::errors::IntoErrorResponse for SettingsError {
    fn status_code(&self) -> warp::http::StatusCode {
        use warp::http::StatusCode;
        match self {
            SettingsError::InvalidValue(_) => StatusCode::BAD_REQUEST,
            SettingsError::StoragePoisoned => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            SettingsError::InvalidValue(_) => "invalid_settings",
            SettingsError::StoragePoisoned => "settings_storage_error",
        }
    }

    fn error_message(&self) -> String {
        self.to_string()
    }

    fn severity(&self) -> crate::errors::ErrorSeverity {
        use crate::errors::ErrorSeverity;
        match self {
            SettingsError::InvalidValue(_) => ErrorSeverity::Client,
            SettingsError::StoragePoisoned => ErrorSeverity::Critical,
        }
    }
}
