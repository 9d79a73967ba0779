use pairs_engine::cards::{CardId, CardState};
use pairs_engine::errors::GameError;
use pairs_engine::game::{Game, GameConfig, GameStatus, TurnOutcome};

fn abc_game() -> Game {
    let mut g = Game::new(
        GameConfig::new(3, 3)
            .with_values(["A", "B", "C"])
            .with_seed(2024),
    )
    .expect("valid config");
    g.start();
    g
}

fn pair(g: &Game, value: &str) -> [CardId; 2] {
    let ids: Vec<CardId> = g
        .cards()
        .iter()
        .filter(|c| c.value == value)
        .map(|c| c.id)
        .collect();
    [ids[0], ids[1]]
}

fn state(g: &Game, id: CardId) -> CardState {
    g.deck().get(id).unwrap().state
}

fn mismatch(g: &mut Game, x: CardId, y: CardId) {
    g.flip(x).unwrap();
    let flip = g.flip(y).unwrap();
    match flip.outcome {
        Some(TurnOutcome::Mismatched { flip_back }) => {
            assert_eq!(flip_back.cards, [x, y]);
            g.resolve_mismatch(&flip_back);
        }
        other => panic!("expected mismatch, got {other:?}"),
    }
}

#[test]
fn scenario_match_then_three_mismatches_loses() {
    let mut g = abc_game();
    let mut values: Vec<String> = g.cards().iter().map(|c| c.value.clone()).collect();
    values.sort();
    assert_eq!(values, vec!["A", "A", "B", "B", "C", "C"]);

    let a = pair(&g, "A");
    let b = pair(&g, "B");
    let c = pair(&g, "C");

    g.flip(a[0]).unwrap();
    let flip = g.flip(a[1]).unwrap();
    assert!(matches!(flip.outcome, Some(TurnOutcome::Matched { .. })));
    assert_eq!(state(&g, a[0]), CardState::Matched);
    assert_eq!(state(&g, a[1]), CardState::Matched);
    assert_eq!(g.attempts_left(), 3);

    g.flip(b[0]).unwrap();
    let flip = g.flip(c[0]).unwrap();
    assert_eq!(g.attempts_left(), 2);
    // still revealed until the deferred flip-back runs
    assert_eq!(state(&g, b[0]), CardState::FaceUp);
    assert_eq!(state(&g, c[0]), CardState::FaceUp);
    let Some(TurnOutcome::Mismatched { flip_back }) = flip.outcome else {
        panic!("expected mismatch");
    };
    assert!(g.resolve_mismatch(&flip_back));
    assert_eq!(state(&g, b[0]), CardState::FaceDown);
    assert_eq!(state(&g, c[0]), CardState::FaceDown);

    mismatch(&mut g, b[1], c[1]);
    assert_eq!(g.attempts_left(), 1);
    assert_eq!(g.status(), GameStatus::Playing);

    g.flip(b[0]).unwrap();
    g.flip(c[1]).unwrap();
    assert_eq!(g.attempts_left(), 0);
    assert_eq!(g.status(), GameStatus::Lost);
}

#[test]
fn lost_is_observable_with_cards_still_face_up() {
    let mut g = Game::new(GameConfig::new(2, 1).with_values(["A", "B"])).unwrap();
    g.start();
    let a = pair(&g, "A");
    let b = pair(&g, "B");
    g.flip(a[0]).unwrap();
    let flip = g.flip(b[0]).unwrap();
    assert_eq!(g.status(), GameStatus::Lost);
    assert_eq!(state(&g, a[0]), CardState::FaceUp);
    assert_eq!(state(&g, b[0]), CardState::FaceUp);

    let Some(TurnOutcome::Mismatched { flip_back }) = flip.outcome else {
        panic!("expected mismatch");
    };
    assert!(g.resolve_mismatch(&flip_back));
    assert!(g.cards().iter().all(|c| c.is_face_down()));
    assert_eq!(g.status(), GameStatus::Lost);
}

#[test]
fn scenario_all_pairs_matched_wins_with_full_budget() {
    let mut g = abc_game();
    for value in ["A", "B", "C"] {
        let [x, y] = pair(&g, value);
        g.flip(x).unwrap();
        g.flip(y).unwrap();
    }
    assert_eq!(g.status(), GameStatus::Won);
    assert_eq!(g.attempts_left(), 3);
    assert!(g.cards().iter().all(|c| c.is_matched()));
}

#[test]
fn won_only_after_last_pair() {
    let mut g = abc_game();
    for value in ["A", "B"] {
        let [x, y] = pair(&g, value);
        g.flip(x).unwrap();
        g.flip(y).unwrap();
        assert_eq!(g.status(), GameStatus::Playing);
    }
}

#[test]
fn flipping_selected_card_twice_is_noop() {
    let mut g = abc_game();
    let a = pair(&g, "A");
    let first = g.flip(a[0]).unwrap();
    let again = g.flip(a[0]).unwrap();
    assert_eq!(first.card, again.card);
    assert!(again.outcome.is_none());
    assert_eq!(g.selected(), &[a[0]]);
    assert_eq!(g.attempts_left(), 3);
    assert!(g.turns().is_empty());
}

#[test]
fn flip_errors_follow_taxonomy() {
    let mut g = abc_game();
    assert_eq!(g.flip(99).unwrap_err(), GameError::NotFound(99));

    let a = pair(&g, "A");
    g.flip(a[0]).unwrap();
    g.flip(a[1]).unwrap();
    assert!(matches!(g.flip(a[0]), Err(GameError::InvalidState(_))));

    for value in ["B", "C"] {
        let [x, y] = pair(&g, value);
        g.flip(x).unwrap();
        g.flip(y).unwrap();
    }
    assert_eq!(g.status(), GameStatus::Won);
    let err = g.flip(a[0]).unwrap_err();
    assert!(matches!(err, GameError::InvalidState(_)));
}

#[test]
fn reset_without_values_keeps_theme_and_restarts() {
    let mut g = abc_game();
    let b = pair(&g, "B");
    let c = pair(&g, "C");
    for _ in 0..3 {
        mismatch(&mut g, b[0], c[0]);
    }
    assert_eq!(g.status(), GameStatus::Lost);

    g.reset(None).expect("reset");
    assert_eq!(g.status(), GameStatus::Playing);
    assert_eq!(g.attempts_left(), 3);
    assert_eq!(g.cards().len(), 6);
    assert!(g.cards().iter().all(|c| c.state == CardState::FaceDown));
    let mut values = g.deck().values();
    values.sort();
    assert_eq!(values, vec!["A", "B", "C"]);
}

#[test]
fn reset_with_new_values_uses_them() {
    let mut g = abc_game();
    let values: Vec<String> = ["Z", "Y", "X", "W"].iter().map(|s| s.to_string()).collect();
    g.reset(Some(&values)).expect("reset");
    let mut got = g.deck().values();
    got.sort();
    assert_eq!(got, vec!["X", "Y", "Z"]);
    assert_eq!(g.cards().len(), 6);
}

#[test]
fn reset_with_short_list_falls_back_to_current_values() {
    let mut g = abc_game();
    let short: Vec<String> = vec!["Q".into()];
    g.reset(Some(&short)).expect("reset");
    let mut got = g.deck().values();
    got.sort();
    assert_eq!(got, vec!["A", "B", "C"]);
}

#[test]
fn stale_flip_back_after_reset_is_ignored() {
    let mut g = abc_game();
    let b = pair(&g, "B");
    let c = pair(&g, "C");
    g.flip(b[0]).unwrap();
    let flip = g.flip(c[0]).unwrap();
    let Some(TurnOutcome::Mismatched { flip_back }) = flip.outcome else {
        panic!("expected mismatch");
    };

    g.reset(None).unwrap();
    g.flip(b[0]).unwrap();
    assert!(!g.resolve_mismatch(&flip_back));
    assert_eq!(state(&g, b[0]), CardState::FaceUp);
}

#[test]
fn start_after_loss_keeps_pending_flip_back_valid() {
    let mut g = Game::new(GameConfig::new(2, 1).with_values(["A", "B"])).unwrap();
    g.start();
    let a = pair(&g, "A");
    let b = pair(&g, "B");
    g.flip(a[0]).unwrap();
    let flip = g.flip(b[0]).unwrap();
    assert_eq!(g.status(), GameStatus::Lost);

    g.start();
    assert_eq!(g.status(), GameStatus::Playing);
    assert_eq!(g.attempts_left(), 1);
    let Some(TurnOutcome::Mismatched { flip_back }) = flip.outcome else {
        panic!("expected mismatch");
    };
    assert!(g.resolve_mismatch(&flip_back));
    assert!(g.cards().iter().all(|c| c.is_face_down()));
}
