use crate::events::{EventBus, GameEvent};
use crate::history::{GameSummary, HistoryStore};
use crate::scheduler::{FlipBackScheduler, TokioScheduler};
use pairs_engine::cards::{Card, CardId, CardState};
use pairs_engine::errors::GameError;
use pairs_engine::game::{FlipBack, Game, GameConfig, GameStatus, TurnOutcome};
use pairs_engine::logger::{TurnLogger, TurnRecord};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use std::time::{Duration, Instant};
use thiserror::Error;
use uuid::Uuid;

pub type SessionId = String;

const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(30 * 60);
pub const DEFAULT_FLIP_BACK_DELAY: Duration = Duration::from_millis(450);

/// Owns one [`Game`] per browser play session and drives it on behalf of
/// the page: applies flips, schedules flip-backs, publishes events and
/// records finished games.
#[derive(Debug)]
pub struct SessionManager {
    sessions: RwLock<HashMap<SessionId, Arc<GameSession>>>,
    event_bus: Arc<EventBus>,
    history_store: Option<Arc<HistoryStore>>,
    scheduler: Arc<dyn FlipBackScheduler>,
    turn_log: Option<Arc<Mutex<TurnLogger>>>,
    /// Idle time before a session is dropped, in milliseconds
    session_ttl_ms: AtomicU64,
    flip_back_delay: Duration,
}

impl SessionManager {
    pub fn new(event_bus: Arc<EventBus>) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            event_bus,
            history_store: None,
            scheduler: Arc::new(TokioScheduler),
            turn_log: None,
            session_ttl_ms: AtomicU64::new(DEFAULT_SESSION_TTL.as_millis() as u64),
            flip_back_delay: DEFAULT_FLIP_BACK_DELAY,
        }
    }

    pub fn with_history(event_bus: Arc<EventBus>, history_store: Arc<HistoryStore>) -> Self {
        Self {
            history_store: Some(history_store),
            ..Self::new(event_bus)
        }
    }

    pub fn with_ttl(event_bus: Arc<EventBus>, ttl: Duration) -> Self {
        Self::new(event_bus).with_session_ttl(ttl)
    }

    pub fn with_scheduler(mut self, scheduler: Arc<dyn FlipBackScheduler>) -> Self {
        self.scheduler = scheduler;
        self
    }

    pub fn with_flip_back_delay(mut self, delay: Duration) -> Self {
        self.flip_back_delay = delay;
        self
    }

    pub fn with_session_ttl(self, ttl: Duration) -> Self {
        self.set_session_ttl(ttl);
        self
    }

    /// Applies to existing sessions too, from their next access or sweep.
    pub fn set_session_ttl(&self, ttl: Duration) {
        self.session_ttl_ms
            .store(ttl.as_millis() as u64, Ordering::Relaxed);
    }

    pub fn session_ttl(&self) -> Duration {
        Duration::from_millis(self.session_ttl_ms.load(Ordering::Relaxed))
    }

    pub fn with_turn_log(mut self, logger: TurnLogger) -> Self {
        self.turn_log = Some(Arc::new(Mutex::new(logger)));
        self
    }

    pub fn create_session(&self, config: GameConfig) -> Result<SessionId, SessionError> {
        let id = Uuid::new_v4().to_string();

        let mut game = Game::new(config.clone())?;
        game.start();

        tracing::info!(
            session_id = %id,
            pairs = config.pairs,
            max_attempts = config.max_attempts,
            seed = game.seed(),
            "creating new game session"
        );

        let event = GameEvent::GameStarted {
            session_id: id.clone(),
            pairs: game.pairs(),
            max_attempts: game.max_attempts(),
            generation: game.generation(),
        };
        let session = Arc::new(GameSession::new(id.clone(), config, game));
        {
            let mut guard = self
                .sessions
                .write()
                .map_err(|_| SessionError::StoragePoisoned)?;
            guard.insert(id.clone(), session);
        }

        self.event_bus.broadcast(&id, event);
        Ok(id)
    }

    pub fn get_session(&self, id: &SessionId) -> Result<Arc<GameSession>, SessionError> {
        let guard = self
            .sessions
            .read()
            .map_err(|_| SessionError::StoragePoisoned)?;
        guard
            .get(id)
            .cloned()
            .ok_or_else(|| SessionError::NotFound(id.clone()))
    }

    /// Looks up a session for a player request, expiring it if it idled past the TTL.
    fn live_session(&self, session_id: &SessionId) -> Result<Arc<GameSession>, SessionError> {
        let session = self.get_session(session_id)?;
        if session.is_expired(self.session_ttl()) {
            self.expire_session(session_id, "expired due to inactivity")?;
            return Err(SessionError::Expired(session_id.clone()));
        }
        session.touch();
        Ok(session)
    }

    pub fn state(&self, session_id: &SessionId) -> Result<GameStateResponse, SessionError> {
        self.live_session(session_id)?.state_snapshot()
    }

    pub fn config(&self, session_id: &SessionId) -> Result<GameConfig, SessionError> {
        Ok(self.live_session(session_id)?.config())
    }

    /// Applies a click on `card_id`.
    ///
    /// A mismatch schedules the flip-back on the configured scheduler; the
    /// response carries the delay so the page knows when to poll again.
    pub fn flip(
        &self,
        session_id: &SessionId,
        card_id: CardId,
    ) -> Result<FlipResponse, SessionError> {
        let session = self.live_session(session_id)?;

        let mut game = session.lock_game()?;
        let was_playing = game.status() == GameStatus::Playing;
        let result = game.flip(card_id);
        let flip = match result {
            Ok(flip) => flip,
            Err(err) => {
                tracing::info!(
                    session_id = %session_id,
                    card_id,
                    error = %err,
                    "flip rejected"
                );
                drop(game);
                self.event_bus.broadcast(
                    session_id,
                    GameEvent::Error {
                        session_id: session_id.clone(),
                        code: err.kind().to_string(),
                        message: err.to_string(),
                    },
                );
                return Err(err.into());
            }
        };
        let status = game.status();
        let attempts_left = game.attempts_left();
        let turn = flip
            .outcome
            .as_ref()
            .and_then(|_| game.turns().last().cloned());
        let summary = (was_playing && status.is_over()).then(|| session.summarize(&game));
        drop(game);

        tracing::debug!(
            session_id = %session_id,
            card_id,
            attempts_left,
            status = %status,
            "card flipped"
        );

        let card = CardView::from(&flip.card);
        self.event_bus.broadcast(
            session_id,
            GameEvent::CardFlipped {
                session_id: session_id.clone(),
                card: card.clone(),
            },
        );

        let mut flip_back_ms = None;
        match flip.outcome {
            Some(TurnOutcome::Matched { cards }) => {
                self.event_bus.broadcast(
                    session_id,
                    GameEvent::PairMatched {
                        session_id: session_id.clone(),
                        cards,
                        value: flip.card.value.clone(),
                    },
                );
            }
            Some(TurnOutcome::Mismatched { flip_back }) => {
                let delay_ms = self.flip_back_delay.as_millis() as u64;
                self.event_bus.broadcast(
                    session_id,
                    GameEvent::PairMismatched {
                        session_id: session_id.clone(),
                        cards: flip_back.cards,
                        attempts_left,
                        flip_back_ms: delay_ms,
                    },
                );
                self.schedule_flip_back(&session, flip_back);
                flip_back_ms = Some(delay_ms);
            }
            None => {}
        }

        if let Some(record) = turn {
            self.log_turn(session_id, record);
        }

        if let Some(summary) = summary {
            tracing::info!(
                session_id = %session_id,
                status = %status,
                attempts_left,
                turns = summary.turns,
                "game finished"
            );
            self.event_bus.broadcast(
                session_id,
                GameEvent::GameOver {
                    session_id: session_id.clone(),
                    status,
                    attempts_left,
                },
            );
            self.record_history(summary);
        }

        Ok(FlipResponse {
            session_id: session_id.clone(),
            card,
            outcome: flip.outcome,
            status,
            attempts_left,
            flip_back_ms,
        })
    }

    /// Restores the attempt budget without reshuffling.
    pub fn start(&self, session_id: &SessionId) -> Result<GameStateResponse, SessionError> {
        let session = self.live_session(session_id)?;
        let event = {
            let mut game = session.lock_game()?;
            game.start();
            started_event(session_id, &game)
        };
        self.event_bus.broadcast(session_id, event);
        session.state_snapshot()
    }

    /// Deals a fresh board, optionally from a new value list.
    pub fn reset(
        &self,
        session_id: &SessionId,
        values: Option<Vec<String>>,
    ) -> Result<GameStateResponse, SessionError> {
        let session = self.live_session(session_id)?;
        let event = {
            let mut game = session.lock_game()?;
            game.reset(values.as_deref())?;
            started_event(session_id, &game)
        };
        tracing::debug!(session_id = %session_id, "board reset");
        self.event_bus.broadcast(session_id, event);
        session.state_snapshot()
    }

    pub fn delete_session(&self, session_id: &SessionId) -> Result<(), SessionError> {
        match self.remove_session(session_id)? {
            Some(_) => {
                self.end_session(session_id, "terminated_by_request");
                Ok(())
            }
            None => Err(SessionError::NotFound(session_id.clone())),
        }
    }

    pub fn cleanup_expired_sessions(&self) -> usize {
        let ttl = self.session_ttl();
        let mut expired = Vec::new();
        {
            let mut guard = match self.sessions.write() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            guard.retain(|id, session| {
                if session.is_expired(ttl) {
                    expired.push(id.clone());
                    false
                } else {
                    true
                }
            });
        }

        for id in &expired {
            self.end_session(id, "expired");
        }
        if !expired.is_empty() {
            tracing::info!(count = expired.len(), "expired idle sessions");
        }
        expired.len()
    }

    pub fn active_sessions(&self) -> Vec<SessionId> {
        match self.sessions.read() {
            Ok(guard) => guard.keys().cloned().collect(),
            Err(_) => Vec::new(),
        }
    }

    pub fn event_bus(&self) -> Arc<EventBus> {
        Arc::clone(&self.event_bus)
    }

    pub fn flip_back_delay(&self) -> Duration {
        self.flip_back_delay
    }

    fn schedule_flip_back(&self, session: &Arc<GameSession>, flip_back: FlipBack) {
        let session = Arc::clone(session);
        let event_bus = Arc::clone(&self.event_bus);
        self.scheduler.schedule(
            self.flip_back_delay,
            Box::new(move || {
                let changed = match session.lock_game() {
                    Ok(mut game) => game.resolve_mismatch(&flip_back),
                    Err(err) => {
                        tracing::error!(session_id = %session.id, error = %err, "flip-back skipped");
                        return;
                    }
                };
                if changed {
                    event_bus.broadcast(
                        &session.id,
                        GameEvent::CardsHidden {
                            session_id: session.id.clone(),
                            cards: flip_back.cards,
                        },
                    );
                }
            }),
        );
    }

    fn log_turn(&self, session_id: &SessionId, mut record: TurnRecord) {
        let Some(log) = &self.turn_log else {
            return;
        };
        record.meta = Some(serde_json::json!({ "session_id": session_id }));
        match log.lock() {
            Ok(mut logger) => {
                if let Err(err) = logger.write(&record) {
                    tracing::warn!(session_id = %session_id, error = %err, "failed to write turn log");
                }
            }
            Err(_) => tracing::error!("turn log lock poisoned"),
        }
    }

    fn record_history(&self, summary: GameSummary) {
        if let Some(history) = &self.history_store {
            if let Err(err) = history.add_game(summary) {
                tracing::error!(error = %err, "failed to record finished game");
            }
        }
    }

    fn expire_session(&self, session_id: &SessionId, reason: &str) -> Result<(), SessionError> {
        if self.remove_session(session_id)?.is_some() {
            self.end_session(session_id, reason);
        }
        Ok(())
    }

    /// Tells subscribers the session is over, then closes their streams.
    fn end_session(&self, session_id: &SessionId, reason: &str) {
        self.event_bus.broadcast(
            session_id,
            GameEvent::GameEnded {
                session_id: session_id.clone(),
                reason: reason.to_string(),
            },
        );
        self.event_bus.drop_session(session_id);
    }

    fn remove_session(
        &self,
        session_id: &SessionId,
    ) -> Result<Option<Arc<GameSession>>, SessionError> {
        match self.sessions.write() {
            Ok(mut guard) => Ok(guard.remove(session_id)),
            Err(_) => Err(SessionError::StoragePoisoned),
        }
    }
}

fn started_event(session_id: &SessionId, game: &Game) -> GameEvent {
    GameEvent::GameStarted {
        session_id: session_id.clone(),
        pairs: game.pairs(),
        max_attempts: game.max_attempts(),
        generation: game.generation(),
    }
}

#[derive(Debug)]
pub struct GameSession {
    id: SessionId,
    game: Mutex<Game>,
    config: GameConfig,
    last_active: Mutex<Instant>,
}

impl GameSession {
    fn new(id: SessionId, config: GameConfig, game: Game) -> Self {
        Self {
            id,
            game: Mutex::new(game),
            config,
            last_active: Mutex::new(Instant::now()),
        }
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    fn lock_game(&self) -> Result<MutexGuard<'_, Game>, SessionError> {
        self.game.lock().map_err(|_| SessionError::StoragePoisoned)
    }

    fn config(&self) -> GameConfig {
        self.config.clone()
    }

    fn summarize(&self, game: &Game) -> GameSummary {
        GameSummary {
            game_id: Uuid::new_v4().to_string(),
            session_id: self.id.clone(),
            status: game.status(),
            pairs: game.pairs(),
            max_attempts: game.max_attempts(),
            attempts_left: game.attempts_left(),
            turns: game.turns().len() as u32,
            seed: game.seed(),
            finished_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    fn touch(&self) {
        if let Ok(mut guard) = self.last_active.lock() {
            *guard = Instant::now();
        }
    }

    fn is_expired(&self, ttl: Duration) -> bool {
        match self.last_active.lock() {
            Ok(last) => last.elapsed() >= ttl,
            Err(_) => false,
        }
    }

    fn state_snapshot(&self) -> Result<GameStateResponse, SessionError> {
        let game = self.lock_game()?;
        Ok(GameStateResponse {
            session_id: self.id.clone(),
            status: game.status(),
            attempts_left: game.attempts_left(),
            max_attempts: game.max_attempts(),
            pairs: game.pairs(),
            matched_pairs: game.matched_pairs(),
            generation: game.generation(),
            selected: game.selected().to_vec(),
            cards: game.cards().iter().map(CardView::from).collect(),
        })
    }
}

#[cfg(test)]
impl GameSession {
    fn force_last_active(&self, instant: Instant) {
        if let Ok(mut guard) = self.last_active.lock() {
            *guard = instant;
        }
    }
}

/// A card as the page sees it: the value of a face-down card is withheld.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CardView {
    pub id: CardId,
    pub state: CardState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

impl From<&Card> for CardView {
    fn from(card: &Card) -> Self {
        Self {
            id: card.id,
            state: card.state,
            value: (!card.is_face_down()).then(|| card.value.clone()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GameStateResponse {
    pub session_id: SessionId,
    pub status: GameStatus,
    pub attempts_left: u32,
    pub max_attempts: u32,
    pub pairs: usize,
    pub matched_pairs: usize,
    pub generation: u64,
    pub selected: Vec<CardId>,
    pub cards: Vec<CardView>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FlipResponse {
    pub session_id: SessionId,
    pub card: CardView,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<TurnOutcome>,
    pub status: GameStatus,
    pub attempts_left: u32,
    /// Set after a mismatch: the page should re-poll once this many ms passed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flip_back_ms: Option<u64>,
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Session not found: {0}")]
    NotFound(SessionId),
    #[error("Session expired: {0}")]
    Expired(SessionId),
    #[error(transparent)]
    Game(#[from] GameError),
    #[error("Session storage poisoned")]
    StoragePoisoned,
}

impl crate::errors::IntoErrorResponse for SessionError {
    fn status_code(&self) -> warp::http::StatusCode {
        use warp::http::StatusCode;
        match self {
            SessionError::NotFound(_) => StatusCode::NOT_FOUND,
            SessionError::Expired(_) => StatusCode::GONE,
            SessionError::Game(GameError::Config(_)) => StatusCode::BAD_REQUEST,
            SessionError::Game(GameError::NotFound(_)) => StatusCode::NOT_FOUND,
            SessionError::Game(GameError::InvalidState(_)) => StatusCode::CONFLICT,
            SessionError::StoragePoisoned => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            SessionError::NotFound(_) => "session_not_found",
            SessionError::Expired(_) => "session_expired",
            SessionError::Game(err) => err.kind(),
            SessionError::StoragePoisoned => "session_storage_error",
        }
    }

    fn error_message(&self) -> String {
        self.to_string()
    }

    fn error_details(&self) -> Option<serde_json::Value> {
        match self {
            SessionError::NotFound(id) => Some(serde_json::json!({
                "session_id": id
            })),
            SessionError::Expired(id) => Some(serde_json::json!({
                "session_id": id,
                "reason": "Session expired due to inactivity"
            })),
            SessionError::Game(GameError::NotFound(card_id)) => Some(serde_json::json!({
                "card_id": card_id
            })),
            _ => None,
        }
    }

    fn severity(&self) -> crate::errors::ErrorSeverity {
        use crate::errors::ErrorSeverity;
        match self {
            SessionError::StoragePoisoned => ErrorSeverity::Critical,
            _ => ErrorSeverity::Client,
        }
    }
}
