use serde::{Deserialize, Serialize};

/// Identifier of a card, unique within one deck build.
/// Ids are reused when the deck is rebuilt, so they are only meaningful
/// together with the deck generation they were observed in.
pub type CardId = u32;

/// Visibility of a card on the board.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CardState {
    /// Hidden, can be flipped
    FaceDown,
    /// Revealed during the current turn, or waiting to be hidden again
    FaceUp,
    /// Permanently revealed as part of a found pair
    Matched,
}

/// A single card of a pairs deck.
/// Two cards in a deck share each value; the id tells them apart.
#[derive(Debug, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct Card {
    /// Position-independent identity within the deck
    pub id: CardId,
    /// Equality key used for matching
    pub value: String,
    /// Current visibility
    pub state: CardState,
}

impl Card {
    pub fn new(id: CardId, value: impl Into<String>) -> Self {
        Self {
            id,
            value: value.into(),
            state: CardState::FaceDown,
        }
    }

    /// Cards that are not yet part of a found pair.
    pub fn is_matchable(&self) -> bool {
        matches!(self.state, CardState::FaceDown | CardState::FaceUp)
    }

    pub fn is_face_down(&self) -> bool {
        self.state == CardState::FaceDown
    }

    pub fn is_matched(&self) -> bool {
        self.state == CardState::Matched
    }
}

/// Symbols used when a game is configured without its own value pool.
pub const DEFAULT_VALUES: [&str; 6] = ["🍎", "🍌", "🍇", "🍒", "🍋", "🥝"];

pub fn default_values() -> Vec<String> {
    DEFAULT_VALUES.iter().map(|v| v.to_string()).collect()
}

/// Builds the unshuffled card list for `values`: ids `2i` and `2i + 1` hold
/// the value at position `i`.
pub fn paired_cards(values: &[String]) -> Vec<Card> {
    let mut v = Vec::with_capacity(values.len() * 2);
    for (i, value) in values.iter().enumerate() {
        let base = (i as CardId) * 2;
        v.push(Card::new(base, value.clone()));
        v.push(Card::new(base + 1, value.clone()));
    }
    v
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_card_starts_face_down() {
        let card = Card::new(7, "A");
        assert_eq!(card.state, CardState::FaceDown);
        assert!(card.is_face_down());
        assert!(card.is_matchable());
    }

    #[test]
    fn matched_card_is_not_matchable() {
        let mut card = Card::new(0, "A");
        card.state = CardState::FaceUp;
        assert!(card.is_matchable());
        card.state = CardState::Matched;
        assert!(!card.is_matchable());
        assert!(card.is_matched());
    }

    #[test]
    fn paired_cards_assigns_sequential_ids() {
        let values = vec!["A".to_string(), "B".to_string()];
        let cards = paired_cards(&values);
        let ids: Vec<CardId> = cards.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![0, 1, 2, 3]);
        assert_eq!(cards[0].value, "A");
        assert_eq!(cards[1].value, "A");
        assert_eq!(cards[2].value, "B");
        assert_eq!(cards[3].value, "B");
    }

    #[test]
    fn card_state_serializes_snake_case() {
        let json = serde_json::to_string(&CardState::FaceDown).unwrap();
        assert_eq!(json, "\"face_down\"");
    }

    #[test]
    fn default_values_has_six_distinct_symbols() {
        let mut values = default_values();
        values.sort();
        values.dedup();
        assert_eq!(values.len(), 6);
    }
}
