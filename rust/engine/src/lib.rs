//! # pairs-engine: Memory Game Core
//!
//! The state model of a memory-matching ("pairs") card game: a shuffled deck
//! of paired values is laid out face down, the player flips two cards per
//! turn, matches stay revealed and mismatches cost one attempt.
//!
//! ## Core Modules
//!
//! - [`cards`] - Card, card state and the default value pool
//! - [`shuffle`] - Fisher–Yates permutation helper
//! - [`deck`] - Shuffled deck with id-indexed lookup
//! - [`game`] - Turn evaluation, attempt budget, win/loss detection
//! - [`logger`] - Turn records and JSONL turn log
//! - [`errors`] - Error types for game operations
//!
//! ## Quick Start
//!
//! ```rust
//! use pairs_engine::game::{Game, GameConfig, GameStatus, TurnOutcome};
//!
//! let config = GameConfig::new(3, 3).with_values(["A", "B", "C"]).with_seed(7);
//! let mut game = Game::new(config).unwrap();
//! game.start();
//!
//! // ids 0 and 1 hold the first value of the sorted pool
//! let flip = game.flip(0).unwrap();
//! assert!(flip.outcome.is_none());
//! let flip = game.flip(1).unwrap();
//! assert!(matches!(flip.outcome, Some(TurnOutcome::Matched { .. })));
//! assert_eq!(game.status(), GameStatus::Playing);
//! ```
//!
//! ## Deferred Flip-Back
//!
//! A mismatch leaves both cards face up so the player can see them. The
//! host decides when to hide them again:
//!
//! ```rust
//! use pairs_engine::game::{Game, GameConfig, TurnOutcome};
//!
//! let mut game = Game::new(GameConfig::new(2, 5).with_values(["A", "B"])).unwrap();
//! game.start();
//! game.flip(0).unwrap();
//! let flip = game.flip(2).unwrap();
//! if let Some(TurnOutcome::Mismatched { flip_back }) = flip.outcome {
//!     // ...after the display delay
//!     assert!(game.resolve_mismatch(&flip_back));
//! }
//! assert!(game.cards().iter().all(|c| c.is_face_down()));
//! ```

pub mod cards;
pub mod deck;
pub mod errors;
pub mod game;
pub mod logger;
pub mod shuffle;

pub use cards::{Card, CardId, CardState};
pub use deck::Deck;
pub use errors::GameError;
pub use game::{Flip, FlipBack, Game, GameConfig, GameSnapshot, GameStatus, TurnOutcome};
