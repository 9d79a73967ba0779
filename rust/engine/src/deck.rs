use std::collections::{HashMap, HashSet};

use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;

use crate::cards::{paired_cards, Card, CardId};
use crate::errors::GameError;
use crate::shuffle::shuffled;

/// Shuffled pairs deck with an id index over the display order.
///
/// The index maps each card id to its position in `cards`; both are rebuilt
/// together on every `reset`, which also bumps `generation`.
#[derive(Debug)]
pub struct Deck {
    cards: Vec<Card>,
    index: HashMap<CardId, usize>,
    generation: u64,
    rng: ChaCha20Rng,
}

impl Deck {
    pub fn new_with_seed(values: &[String], seed: u64) -> Result<Self, GameError> {
        let mut deck = Self {
            cards: Vec::new(),
            index: HashMap::new(),
            generation: 0,
            rng: ChaCha20Rng::seed_from_u64(seed),
        };
        deck.rebuild(values)?;
        Ok(deck)
    }

    /// Current display order.
    pub fn all(&self) -> &[Card] {
        &self.cards
    }

    pub fn get(&self, id: CardId) -> Result<&Card, GameError> {
        let pos = self.position(id)?;
        Ok(&self.cards[pos])
    }

    pub(crate) fn get_mut(&mut self, id: CardId) -> Result<&mut Card, GameError> {
        let pos = self.position(id)?;
        Ok(&mut self.cards[pos])
    }

    pub fn position(&self, id: CardId) -> Result<usize, GameError> {
        self.index.get(&id).copied().ok_or(GameError::NotFound(id))
    }

    /// Discards every card and builds a fresh shuffled deck from `values`.
    /// On error the current cards are kept.
    pub fn reset(&mut self, values: &[String]) -> Result<(), GameError> {
        self.rebuild(values)?;
        self.generation += 1;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    /// Number of times the deck has been rebuilt since construction.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Distinct values in order of first appearance on the board.
    pub fn values(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.cards
            .iter()
            .filter(|c| seen.insert(c.value.as_str()))
            .map(|c| c.value.clone())
            .collect()
    }

    pub fn all_matched(&self) -> bool {
        self.cards.iter().all(Card::is_matched)
    }

    pub(crate) fn cards_mut(&mut self) -> impl Iterator<Item = &mut Card> {
        self.cards.iter_mut()
    }

    fn rebuild(&mut self, values: &[String]) -> Result<(), GameError> {
        validate_values(values)?;
        let cards = shuffled(&paired_cards(values), &mut self.rng);
        let index = cards
            .iter()
            .enumerate()
            .map(|(pos, card)| (card.id, pos))
            .collect();
        self.cards = cards;
        self.index = index;
        Ok(())
    }
}

fn validate_values(values: &[String]) -> Result<(), GameError> {
    if values.is_empty() {
        return Err(GameError::Config(
            "a deck needs at least one value".to_string(),
        ));
    }
    let mut seen = HashSet::with_capacity(values.len());
    for v in values {
        if !seen.insert(v.as_str()) {
            return Err(GameError::Config(format!("duplicate value `{v}`")));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vals(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn index_matches_positions() {
        let deck = Deck::new_with_seed(&vals(&["A", "B", "C"]), 5).unwrap();
        for (pos, card) in deck.all().iter().enumerate() {
            assert_eq!(deck.position(card.id).unwrap(), pos);
        }
        assert_eq!(deck.index.len(), deck.len());
    }

    #[test]
    fn reset_bumps_generation_and_keeps_cards_on_error() {
        let mut deck = Deck::new_with_seed(&vals(&["A", "B"]), 5).unwrap();
        assert_eq!(deck.generation(), 0);
        deck.reset(&vals(&["X", "Y", "Z"])).unwrap();
        assert_eq!(deck.generation(), 1);
        assert_eq!(deck.len(), 6);

        let before = deck.all().to_vec();
        assert!(deck.reset(&[]).is_err());
        assert_eq!(deck.all(), before.as_slice());
        assert_eq!(deck.generation(), 1);
    }

    #[test]
    fn values_lists_each_value_once() {
        let deck = Deck::new_with_seed(&vals(&["A", "B", "C"]), 11).unwrap();
        let mut values = deck.values();
        values.sort();
        assert_eq!(values, vals(&["A", "B", "C"]));
    }

    #[test]
    fn get_mut_changes_card_in_place() {
        let mut deck = Deck::new_with_seed(&vals(&["A"]), 1).unwrap();
        deck.get_mut(1).unwrap().state = crate::cards::CardState::Matched;
        assert!(deck.get(1).unwrap().is_matched());
        assert!(!deck.get(0).unwrap().is_matched());
    }
}
