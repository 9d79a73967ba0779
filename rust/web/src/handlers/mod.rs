pub mod game;
pub mod health;
pub mod history;
pub mod settings;
pub mod sse;

pub use game::{
    create_session, delete_session, flip_card, get_session, get_session_state, reset_game,
    start_game, CreateSessionRequest, FlipRequest, ResetRequest, SessionResponse,
};
pub use health::health;
pub use history::{filter_games, get_game_by_id, get_recent_games, get_statistics};
pub use settings::{
    get_settings, reset_settings, update_field, update_settings, UpdateFieldRequest,
    UpdateSettingsRequest,
};
pub use sse::stream_events;
