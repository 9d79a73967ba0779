use crate::session::{CardView, SessionId};
use pairs_engine::cards::CardId;
use pairs_engine::game::GameStatus;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::sync::mpsc;

// A subscriber whose channel is full gets dropped, broadcast never blocks.
const EVENT_CHANNEL_BUFFER: usize = 256;

pub type EventSender = mpsc::Sender<GameEvent>;
pub type EventReceiver = mpsc::Receiver<GameEvent>;

pub struct EventSubscription {
    bus: EventBus,
    session_id: SessionId,
    subscriber_id: usize,
    pub receiver: EventReceiver,
}

impl EventSubscription {
    pub fn receiver(&mut self) -> &mut EventReceiver {
        &mut self.receiver
    }
}

impl Drop for EventSubscription {
    fn drop(&mut self) {
        self.bus.unsubscribe(&self.session_id, self.subscriber_id);
    }
}

type SubscriberMap = HashMap<SessionId, Vec<(usize, EventSender)>>;

/// Per-session fan-out of [`GameEvent`]s to server-sent event streams.
#[derive(Debug, Clone, Default)]
pub struct EventBus {
    inner: Arc<EventBusInner>,
}

#[derive(Debug, Default)]
struct EventBusInner {
    subscribers: RwLock<SubscriberMap>,
    next_id: AtomicUsize,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, session_id: SessionId) -> EventSubscription {
        let (subscriber_id, receiver) = self.subscribe_raw(session_id.clone());
        EventSubscription {
            bus: self.clone(),
            session_id,
            subscriber_id,
            receiver,
        }
    }

    fn subscribe_raw(&self, session_id: SessionId) -> (usize, EventReceiver) {
        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_BUFFER);
        let id = self.inner.next_id.fetch_add(1, Ordering::AcqRel);
        self.write_guard()
            .entry(session_id.clone())
            .or_default()
            .push((id, tx));

        tracing::info!(
            session_id = %session_id,
            subscriber_id = id,
            "client subscribed to game events"
        );

        (id, rx)
    }

    pub fn broadcast(&self, session_id: &SessionId, event: GameEvent) {
        tracing::debug!(
            session_id = %session_id,
            event_type = event.kind(),
            "broadcasting game event"
        );

        let subscribers = self.read_guard().get(session_id).cloned();

        let Some(list) = subscribers else {
            tracing::trace!(session_id = %session_id, "no subscribers for session");
            return;
        };

        let mut failed = Vec::new();
        for (id, sender) in list {
            if let Err(e) = sender.try_send(event.clone()) {
                tracing::warn!(
                    session_id = %session_id,
                    subscriber_id = id,
                    error = %e,
                    "dropping subscriber that cannot take events"
                );
                failed.push(id);
            }
        }
        if !failed.is_empty() {
            self.remove_subscribers(session_id, &failed);
        }
    }

    pub fn unsubscribe(&self, session_id: &SessionId, subscriber_id: usize) {
        self.remove_subscribers(session_id, &[subscriber_id]);
    }

    pub fn drop_session(&self, session_id: &SessionId) {
        self.write_guard().remove(session_id);
    }

    pub fn subscriber_count(&self) -> usize {
        self.read_guard().values().map(|list| list.len()).sum()
    }

    fn remove_subscribers(&self, session_id: &SessionId, ids: &[usize]) {
        let mut guard = self.write_guard();
        if let Some(list) = guard.get_mut(session_id) {
            list.retain(|(id, _)| !ids.contains(id));
            if list.is_empty() {
                guard.remove(session_id);
            }
        }
    }

    // the map stays consistent across a panic, so poisoning is ignored
    fn read_guard(&self) -> RwLockReadGuard<'_, SubscriberMap> {
        self.inner
            .subscribers
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write_guard(&self) -> RwLockWriteGuard<'_, SubscriberMap> {
        self.inner
            .subscribers
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Everything the page needs to know about between polls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GameEvent {
    GameStarted {
        session_id: SessionId,
        pairs: usize,
        max_attempts: u32,
        generation: u64,
    },
    CardFlipped {
        session_id: SessionId,
        card: CardView,
    },
    PairMatched {
        session_id: SessionId,
        cards: [CardId; 2],
        value: String,
    },
    PairMismatched {
        session_id: SessionId,
        cards: [CardId; 2],
        attempts_left: u32,
        flip_back_ms: u64,
    },
    CardsHidden {
        session_id: SessionId,
        cards: [CardId; 2],
    },
    GameOver {
        session_id: SessionId,
        status: GameStatus,
        attempts_left: u32,
    },
    GameEnded {
        session_id: SessionId,
        reason: String,
    },
    /// A player action the game refused
    Error {
        session_id: SessionId,
        code: String,
        message: String,
    },
}

impl GameEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            GameEvent::GameStarted { .. } => "game_started",
            GameEvent::CardFlipped { .. } => "card_flipped",
            GameEvent::PairMatched { .. } => "pair_matched",
            GameEvent::PairMismatched { .. } => "pair_mismatched",
            GameEvent::CardsHidden { .. } => "cards_hidden",
            GameEvent::GameOver { .. } => "game_over",
            GameEvent::GameEnded { .. } => "game_ended",
            GameEvent::Error { .. } => "error",
        }
    }
}
