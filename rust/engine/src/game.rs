use serde::{Deserialize, Serialize};
use std::fmt;

use crate::cards::{default_values, Card, CardId, CardState};
use crate::deck::Deck;
use crate::errors::GameError;
use crate::logger::{TurnRecord, TurnResult};

/// Lifecycle of a game.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameStatus {
    /// Constructed, `start` not called yet
    Idle,
    /// Accepting flips
    Playing,
    /// Every card matched
    Won,
    /// Attempt budget exhausted
    Lost,
}

impl GameStatus {
    pub fn is_over(self) -> bool {
        matches!(self, GameStatus::Won | GameStatus::Lost)
    }
}

impl fmt::Display for GameStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            GameStatus::Idle => "idle",
            GameStatus::Playing => "playing",
            GameStatus::Won => "won",
            GameStatus::Lost => "lost",
        };
        f.write_str(s)
    }
}

pub const DEFAULT_PAIRS: usize = 6;
pub const DEFAULT_MAX_ATTEMPTS: u32 = 10;

/// Construction input for a [`Game`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameConfig {
    /// Number of distinct values on the board
    pub pairs: usize,
    /// Mismatches allowed before the game is lost
    pub max_attempts: u32,
    /// Value pool; `None` uses [`crate::cards::DEFAULT_VALUES`]
    #[serde(default)]
    pub values: Option<Vec<String>>,
    /// Shuffle seed; `None` draws a random one
    #[serde(default)]
    pub seed: Option<u64>,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            pairs: DEFAULT_PAIRS,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            values: None,
            seed: None,
        }
    }
}

impl GameConfig {
    pub fn new(pairs: usize, max_attempts: u32) -> Self {
        Self {
            pairs,
            max_attempts,
            ..Self::default()
        }
    }

    pub fn with_values<I, T>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: ToString,
    {
        self.values = Some(values.into_iter().map(|v| v.to_string()).collect());
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}

/// Token for hiding a mismatched pair once the host's display delay elapses.
///
/// Only valid for the deck generation it was issued in; see
/// [`Game::resolve_mismatch`].
#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
pub struct FlipBack {
    pub generation: u64,
    pub cards: [CardId; 2],
}

/// Result of evaluating a two-card turn.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TurnOutcome {
    Matched { cards: [CardId; 2] },
    Mismatched { flip_back: FlipBack },
}

/// What a single `flip` call produced.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct Flip {
    /// Snapshot of the flipped card after the call
    pub card: Card,
    /// Present when this flip completed a turn
    pub outcome: Option<TurnOutcome>,
}

/// Serializable view of a game for rendering.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct GameSnapshot {
    pub status: GameStatus,
    pub attempts_left: u32,
    pub max_attempts: u32,
    pub pairs: usize,
    pub matched_pairs: usize,
    pub generation: u64,
    pub cards: Vec<Card>,
}

/// Pairs game state machine.
///
/// `Idle → Playing → {Won, Lost}`. Terminal states are left only through
/// [`Game::start`] or [`Game::reset`].
///
/// # Examples
///
/// ```
/// use pairs_engine::game::{Game, GameConfig, GameStatus};
///
/// let mut game = Game::new(GameConfig::new(2, 3).with_values(["A", "B"])).unwrap();
/// game.start();
/// assert_eq!(game.status(), GameStatus::Playing);
/// assert_eq!(game.cards().len(), 4);
/// ```
#[derive(Debug)]
pub struct Game {
    pairs: usize,
    max_attempts: u32,
    seed: u64,
    status: GameStatus,
    attempts_left: u32,
    deck: Deck,
    selected: Vec<CardId>,
    turns: Vec<TurnRecord>,
}

impl Game {
    pub fn new(config: GameConfig) -> Result<Self, GameError> {
        if config.pairs < 1 {
            return Err(GameError::Config("pairs must be >= 1".into()));
        }
        if config.max_attempts < 1 {
            return Err(GameError::Config("max_attempts must be >= 1".into()));
        }
        let values = config.values.unwrap_or_else(default_values);
        let pool = derive_pool(&values, config.pairs)?;
        let seed = config.seed.unwrap_or_else(rand::random);
        let deck = Deck::new_with_seed(&pool, seed)?;

        tracing::debug!(pairs = config.pairs, seed, "game constructed");

        Ok(Self {
            pairs: config.pairs,
            max_attempts: config.max_attempts,
            seed,
            status: GameStatus::Idle,
            attempts_left: config.max_attempts,
            deck,
            selected: Vec::with_capacity(2),
            turns: Vec::new(),
        })
    }

    /// Enters `Playing` with a full attempt budget. The board is left as is;
    /// a card flipped in an unfinished turn is turned back face down.
    pub fn start(&mut self) {
        for id in std::mem::take(&mut self.selected) {
            if let Ok(card) = self.deck.get_mut(id) {
                if card.state == CardState::FaceUp {
                    card.state = CardState::FaceDown;
                }
            }
        }
        self.status = GameStatus::Playing;
        self.attempts_left = self.max_attempts;
        self.turns.clear();
    }

    /// Flips card `id` face up and evaluates the turn once two cards are up.
    ///
    /// # Errors
    ///
    /// - [`GameError::InvalidState`] if the game is not `Playing`, the card is
    ///   already matched, or the card is still showing from a mismatch whose
    ///   flip-back has not run yet
    /// - [`GameError::NotFound`] for an unknown id
    ///
    /// Flipping a card that is already selected in the current turn is a
    /// no-op.
    pub fn flip(&mut self, id: CardId) -> Result<Flip, GameError> {
        if self.status != GameStatus::Playing {
            return Err(GameError::InvalidState(format!(
                "cannot flip while game is {}",
                self.status
            )));
        }

        let card = self.deck.get(id)?;
        if card.is_matched() {
            return Err(GameError::InvalidState(format!(
                "card {id} is already matched"
            )));
        }
        if self.selected.contains(&id) {
            return Ok(Flip {
                card: card.clone(),
                outcome: None,
            });
        }
        if card.state == CardState::FaceUp {
            return Err(GameError::InvalidState(format!(
                "card {id} is waiting to be flipped back"
            )));
        }

        self.deck.get_mut(id)?.state = CardState::FaceUp;
        self.selected.push(id);

        let outcome = if self.selected.len() == 2 {
            Some(self.evaluate_turn()?)
        } else {
            None
        };

        Ok(Flip {
            card: self.deck.get(id)?.clone(),
            outcome,
        })
    }

    fn evaluate_turn(&mut self) -> Result<TurnOutcome, GameError> {
        let selected = std::mem::take(&mut self.selected);
        let (first, second) = (selected[0], selected[1]);
        let a = self.deck.get(first)?.value.clone();
        let b = self.deck.get(second)?.value.clone();

        let (outcome, result) = if a == b && first != second {
            self.deck.get_mut(first)?.state = CardState::Matched;
            self.deck.get_mut(second)?.state = CardState::Matched;
            if self.deck.all_matched() {
                self.status = GameStatus::Won;
            }
            (
                TurnOutcome::Matched {
                    cards: [first, second],
                },
                TurnResult::Match,
            )
        } else {
            self.attempts_left = self.attempts_left.saturating_sub(1);
            if self.attempts_left == 0 {
                self.status = GameStatus::Lost;
            }
            (
                TurnOutcome::Mismatched {
                    flip_back: FlipBack {
                        generation: self.deck.generation(),
                        cards: [first, second],
                    },
                },
                TurnResult::Mismatch,
            )
        };

        self.turns.push(TurnRecord {
            turn: self.turns.len() as u32 + 1,
            cards: [first, second],
            values: [a, b],
            result,
            attempts_left: self.attempts_left,
            ts: None,
            meta: None,
        });

        tracing::debug!(
            first,
            second,
            result = ?result,
            attempts_left = self.attempts_left,
            status = %self.status,
            "turn evaluated"
        );

        Ok(outcome)
    }

    /// Turns a mismatched pair face down again.
    ///
    /// Returns `false` without touching anything when the token belongs to an
    /// earlier deck generation. Cards that are no longer face up are skipped.
    /// Applies in every status, including `Lost`.
    pub fn resolve_mismatch(&mut self, flip_back: &FlipBack) -> bool {
        if flip_back.generation != self.deck.generation() {
            tracing::trace!(
                token_generation = flip_back.generation,
                deck_generation = self.deck.generation(),
                "stale flip-back ignored"
            );
            return false;
        }
        let mut changed = false;
        for id in flip_back.cards {
            if let Ok(card) = self.deck.get_mut(id) {
                if card.state == CardState::FaceUp {
                    card.state = CardState::FaceDown;
                    changed = true;
                }
            }
        }
        changed
    }

    /// Rebuilds the deck and starts a new round.
    ///
    /// `values` is used when it holds at least `pairs` entries; otherwise the
    /// current deck's values are reshuffled.
    pub fn reset(&mut self, values: Option<&[String]>) -> Result<(), GameError> {
        let pool = match values {
            Some(v) if v.len() >= self.pairs => derive_pool(v, self.pairs)?,
            _ => derive_pool(&self.deck.values(), self.pairs)?,
        };
        self.deck.reset(&pool)?;
        self.selected.clear();
        self.start();
        tracing::debug!(generation = self.deck.generation(), "game reset");
        Ok(())
    }

    pub fn status(&self) -> GameStatus {
        self.status
    }

    pub fn attempts_left(&self) -> u32 {
        self.attempts_left
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn pairs(&self) -> usize {
        self.pairs
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn generation(&self) -> u64 {
        self.deck.generation()
    }

    pub fn deck(&self) -> &Deck {
        &self.deck
    }

    pub fn cards(&self) -> &[Card] {
        self.deck.all()
    }

    /// Owned copies of the cards in display order.
    pub fn get_cards(&self) -> Vec<Card> {
        self.deck.all().to_vec()
    }

    pub fn selected(&self) -> &[CardId] {
        &self.selected
    }

    pub fn turns(&self) -> &[TurnRecord] {
        &self.turns
    }

    pub fn matched_pairs(&self) -> usize {
        self.deck.all().iter().filter(|c| c.is_matched()).count() / 2
    }

    pub fn snapshot(&self) -> GameSnapshot {
        GameSnapshot {
            status: self.status,
            attempts_left: self.attempts_left,
            max_attempts: self.max_attempts,
            pairs: self.pairs,
            matched_pairs: self.matched_pairs(),
            generation: self.deck.generation(),
            cards: self.get_cards(),
        }
    }

    #[cfg(test)]
    pub(crate) fn deck_mut(&mut self) -> &mut Deck {
        &mut self.deck
    }
}

/// First `pairs` entries of `values`, sorted. Sorting fixes which id pair
/// each value gets; the board order comes from the shuffle.
pub fn derive_pool(values: &[String], pairs: usize) -> Result<Vec<String>, GameError> {
    if values.len() < pairs {
        return Err(GameError::Config(format!(
            "value pool has {} entries, {} pairs requested",
            values.len(),
            pairs
        )));
    }
    let mut pool: Vec<String> = values.iter().take(pairs).cloned().collect();
    pool.sort();
    Ok(pool)
}
