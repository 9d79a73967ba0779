use pairs_engine::cards::{Card, CardId};
use pairs_engine::game::{Game, GameConfig};
use pairs_web::server::{AppContext, ServerConfig, WebServer};
use pairs_web::ManualScheduler;
use serde_json::{json, Value};
use std::sync::Arc;
use warp::http::StatusCode;

const SEED: u64 = 4242;

fn context() -> (AppContext, Arc<ManualScheduler>) {
    let scheduler = Arc::new(ManualScheduler::new());
    let context = AppContext::with_scheduler(ServerConfig::for_tests(), scheduler.clone())
        .expect("build context");
    (context, scheduler)
}

async fn call(
    context: &AppContext,
    method: &str,
    path: &str,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut request = warp::test::request().method(method).path(path);
    if let Some(body) = body {
        request = request.json(&body);
    }
    let response = request.reply(&WebServer::routes(context)).await;
    let status = response.status();
    let json = if response.body().is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(response.body()).expect("json body")
    };
    (status, json)
}

fn letters(n: usize) -> Vec<String> {
    (0..n).map(|i| ((b'A' + i as u8) as char).to_string()).collect()
}

/// Cards the server deals for the same seeded config, in display order.
fn layout(pairs: usize, max_attempts: u32) -> Vec<Card> {
    let config = GameConfig::new(pairs, max_attempts)
        .with_values(letters(pairs))
        .with_seed(SEED);
    let mut game = Game::new(config).expect("mirror game");
    game.start();
    game.get_cards()
}

fn value_of(board: &[Card], id: CardId) -> &str {
    &board.iter().find(|c| c.id == id).expect("card on board").value
}

fn partner(board: &[Card], id: CardId) -> CardId {
    let value = value_of(board, id);
    board
        .iter()
        .find(|c| c.id != id && c.value == value)
        .map(|c| c.id)
        .expect("every value appears twice")
}

fn stranger(board: &[Card], id: CardId) -> CardId {
    let value = value_of(board, id);
    board
        .iter()
        .find(|c| c.value != value)
        .map(|c| c.id)
        .expect("board has at least two values")
}

fn card_in<'a>(state: &'a Value, id: CardId) -> &'a Value {
    state["cards"]
        .as_array()
        .expect("cards")
        .iter()
        .find(|c| c["id"] == id)
        .expect("card in state")
}

async fn create(context: &AppContext, pairs: usize, max_attempts: u32) -> String {
    let (status, body) = call(
        context,
        "POST",
        "/api/sessions",
        Some(json!({
            "pairs": pairs,
            "max_attempts": max_attempts,
            "values": letters(pairs),
            "seed": SEED,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "create: {body}");
    body["session_id"].as_str().expect("session id").to_string()
}

async fn flip(context: &AppContext, id: &str, card: CardId) -> (StatusCode, Value) {
    call(
        context,
        "POST",
        &format!("/api/sessions/{id}/flip"),
        Some(json!({ "card_id": card })),
    )
    .await
}

#[tokio::test]
async fn created_session_is_playing_with_values_hidden() {
    let (ctx, _) = context();
    let (status, body) = call(&ctx, "POST", "/api/sessions", Some(json!({ "pairs": 3 }))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["flip_back_ms"], 450);

    let state = &body["state"];
    assert_eq!(state["status"], "playing");
    assert_eq!(state["pairs"], 3);
    let cards = state["cards"].as_array().expect("cards");
    assert_eq!(cards.len(), 6);
    for card in cards {
        assert_eq!(card["state"], "face_down");
        assert!(card.get("value").is_none(), "face-down value leaked: {card}");
    }

    let id = body["session_id"].as_str().expect("id");
    let (status, info) = call(&ctx, "GET", &format!("/api/sessions/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(info["config"]["pairs"], 3);
}

#[tokio::test]
async fn empty_body_uses_current_settings() {
    let (ctx, _) = context();
    let (status, body) = call(&ctx, "POST", "/api/sessions", Some(json!({}))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["state"]["pairs"], 6);
    assert_eq!(body["state"]["max_attempts"], 10);
}

#[tokio::test]
async fn bad_config_is_rejected() {
    let (ctx, _) = context();
    let (status, body) = call(&ctx, "POST", "/api/sessions", Some(json!({ "pairs": 0 }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "config_error");

    let (status, body) = call(
        &ctx,
        "POST",
        "/api/sessions",
        Some(json!({ "pairs": 3, "values": ["x", "y"] })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "config_error");
}

#[tokio::test]
async fn matching_pair_stays_revealed() {
    let (ctx, _) = context();
    let board = layout(3, 5);
    let id = create(&ctx, 3, 5).await;

    let (status, first) = flip(&ctx, &id, 0).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["card"]["value"], value_of(&board, 0));
    assert!(first.get("outcome").is_none());

    let (status, second) = flip(&ctx, &id, partner(&board, 0)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(second.get("flip_back_ms").is_none());
    assert_eq!(second["attempts_left"], 5);

    let (_, state) = call(&ctx, "GET", &format!("/api/sessions/{id}/state"), None).await;
    assert_eq!(state["matched_pairs"], 1);
    assert_eq!(card_in(&state, 0)["state"], "matched");
}

#[tokio::test]
async fn mismatch_hides_cards_after_flip_back() {
    let (ctx, scheduler) = context();
    let board = layout(3, 5);
    let id = create(&ctx, 3, 5).await;
    let other = stranger(&board, 0);

    flip(&ctx, &id, 0).await;
    let (status, result) = flip(&ctx, &id, other).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(result["attempts_left"], 4);
    assert_eq!(result["flip_back_ms"], 450);

    let (_, state) = call(&ctx, "GET", &format!("/api/sessions/{id}/state"), None).await;
    assert_eq!(card_in(&state, 0)["state"], "face_up");
    assert_eq!(card_in(&state, other)["state"], "face_up");

    assert_eq!(scheduler.run_pending(), 1);
    let (_, state) = call(&ctx, "GET", &format!("/api/sessions/{id}/state"), None).await;
    assert_eq!(card_in(&state, 0)["state"], "face_down");
    assert_eq!(card_in(&state, other)["state"], "face_down");
    assert!(card_in(&state, 0).get("value").is_none());
}

#[tokio::test]
async fn flip_errors_use_the_error_taxonomy() {
    let (ctx, _) = context();
    let board = layout(2, 5);
    let id = create(&ctx, 2, 5).await;

    let (status, body) = flip(&ctx, &id, 99).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "card_not_found");
    assert_eq!(body["details"]["card_id"], 99);

    flip(&ctx, &id, 0).await;
    flip(&ctx, &id, partner(&board, 0)).await;
    let (status, body) = flip(&ctx, &id, 0).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "invalid_state");
}

#[tokio::test]
async fn winning_game_is_recorded_in_history() {
    let (ctx, _) = context();
    let board = layout(2, 5);
    let id = create(&ctx, 2, 5).await;

    flip(&ctx, &id, 0).await;
    flip(&ctx, &id, partner(&board, 0)).await;
    let rest: Vec<CardId> = board
        .iter()
        .map(|c| c.id)
        .filter(|&c| c != 0 && c != partner(&board, 0))
        .collect();
    flip(&ctx, &id, rest[0]).await;
    let (_, last) = flip(&ctx, &id, rest[1]).await;
    assert_eq!(last["status"], "won");

    let (status, body) = flip(&ctx, &id, 0).await;
    assert_eq!(status, StatusCode::CONFLICT, "flip after win: {body}");

    let (status, games) = call(&ctx, "GET", "/api/history", None).await;
    assert_eq!(status, StatusCode::OK);
    let games = games.as_array().expect("games");
    assert_eq!(games.len(), 1);
    assert_eq!(games[0]["session_id"], id.as_str());
    assert_eq!(games[0]["status"], "won");
    assert_eq!(games[0]["seed"], SEED);

    let game_id = games[0]["game_id"].as_str().expect("game id");
    let (status, _) = call(&ctx, "GET", &format!("/api/history/{game_id}"), None).await;
    assert_eq!(status, StatusCode::OK);

    let (_, stats) = call(&ctx, "GET", "/api/history/stats", None).await;
    assert_eq!(stats["wins"], 1);
    assert_eq!(stats["losses"], 0);
}

#[tokio::test]
async fn running_out_of_attempts_loses() {
    let (ctx, _) = context();
    let board = layout(3, 1);
    let id = create(&ctx, 3, 1).await;

    flip(&ctx, &id, 0).await;
    let (_, result) = flip(&ctx, &id, stranger(&board, 0)).await;
    assert_eq!(result["status"], "lost");
    assert_eq!(result["attempts_left"], 0);

    let (_, games) = call(&ctx, "GET", "/api/history", None).await;
    assert_eq!(games[0]["status"], "lost");
}

#[tokio::test]
async fn reset_deals_a_new_board_and_voids_pending_flip_back() {
    let (ctx, scheduler) = context();
    let board = layout(3, 5);
    let id = create(&ctx, 3, 5).await;

    flip(&ctx, &id, 0).await;
    flip(&ctx, &id, stranger(&board, 0)).await;

    let (status, state) = call(
        &ctx,
        "POST",
        &format!("/api/sessions/{id}/reset"),
        Some(json!({ "values": ["p", "q", "r", "s"] })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(state["status"], "playing");
    assert_eq!(state["attempts_left"], 5);
    assert_eq!(state["matched_pairs"], 0);

    let (_, first) = flip(&ctx, &id, 0).await;
    assert_eq!(scheduler.run_pending(), 1);

    let (_, state) = call(&ctx, "GET", &format!("/api/sessions/{id}/state"), None).await;
    assert_eq!(card_in(&state, 0)["state"], "face_up", "stale flip-back hid a card");
    assert_eq!(state["selected"], json!([0]));
    assert!(["p", "q", "r", "s"].contains(&first["card"]["value"].as_str().expect("value")));
}

#[tokio::test]
async fn start_clears_a_half_finished_turn() {
    let (ctx, _) = context();
    let id = create(&ctx, 3, 5).await;
    flip(&ctx, &id, 0).await;

    let (status, state) = call(&ctx, "POST", &format!("/api/sessions/{id}/start"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(state["selected"], json!([]));
    assert_eq!(card_in(&state, 0)["state"], "face_down");
}

#[tokio::test]
async fn deleted_session_is_gone() {
    let (ctx, _) = context();
    let id = create(&ctx, 2, 5).await;

    let (status, body) = call(&ctx, "DELETE", &format!("/api/sessions/{id}"), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(body, Value::Null);

    let (status, body) = call(&ctx, "GET", &format!("/api/sessions/{id}/state"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "session_not_found");

    let (status, _) = call(&ctx, "DELETE", &format!("/api/sessions/{id}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn malformed_body_is_a_bad_request() {
    let (ctx, _) = context();
    let id = create(&ctx, 2, 5).await;
    let response = warp::test::request()
        .method("POST")
        .path(&format!("/api/sessions/{id}/flip"))
        .header("content-type", "application/json")
        .body("{\"card_id\": \"zero\"}")
        .reply(&WebServer::routes(&ctx))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn page_and_assets_are_served() {
    let (ctx, _) = context();
    let routes = WebServer::routes(&ctx);

    let index = warp::test::request().path("/").reply(&routes).await;
    assert_eq!(index.status(), StatusCode::OK);
    assert!(String::from_utf8_lossy(index.body()).contains("id=\"board\""));

    let script = warp::test::request().path("/static/app.js").reply(&routes).await;
    assert_eq!(script.status(), StatusCode::OK);

    let (status, health) = call(&ctx, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(health["status"], "ok");
}
