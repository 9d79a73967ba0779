//! # pairs_web: host for the pairs memory game
//!
//! Serves the game page, owns one [`pairs_engine::Game`] per play session and
//! drives it through a JSON API. Mismatched pairs are hidden again by a
//! [`FlipBackScheduler`] after the configured delay; every change is also
//! pushed to the page as a server-sent event.

pub mod config;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod history;
pub mod logging;
pub mod middleware;
pub mod scheduler;
pub mod server;
pub mod session;
pub mod settings;
pub mod static_handler;

pub use config::{ConfigError, ServerArgs, ServerSettings};
pub use errors::{ErrorResponse, ErrorSeverity, IntoErrorResponse};
pub use events::{EventBus, GameEvent};
pub use history::{GameFilter, GameStatistics, GameSummary, HistoryError, HistoryStore};
pub use logging::{init_logging, init_test_logging, LogEntry, LogFormat, TestLogSubscriber};
pub use middleware::{log_response, with_request_logging, RequestMetrics};
pub use scheduler::{FlipBackScheduler, ManualScheduler, TokioScheduler};
pub use server::{AppContext, ServerConfig, ServerError, ServerHandle, WebServer};
pub use session::{
    CardView, FlipResponse, GameStateResponse, SessionError, SessionId, SessionManager,
};
pub use settings::{AppSettings, SettingsError, SettingsStore};
pub use static_handler::{StaticError, StaticHandler};
