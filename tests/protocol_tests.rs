#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing
)]
//! Wire-format tests for the Rocket Race protocol types.
//!
//! Verifies that every message serializes to the `{"event": ..., "data": ...}`
//! shape the game server speaks, that the metric fields keep their `WPM` /
//! `WPMAverage` casing, and that the empty-`gameData` convention round-trips
//! as `None` distinctly from a populated zero score.

use rocket_race_client::protocol::{
    ApplyPowerPayload, ClientMessage, GameData, GameStatePayload, JoinRacePayload, Player,
    PowerUp, ServerMessage,
};
use serde_json::json;

// ════════════════════════════════════════════════════════════════════
// Helpers
// ════════════════════════════════════════════════════════════════════

fn sample_player() -> Player {
    Player {
        user_id: "sock-1".into(),
        user_name: "Alice".into(),
        color: "blue".into(),
        is_host: true,
        is_ready: true,
        game_data: None,
        user_paragraph: "the quick brown fox".into(),
        available_pus: vec![PowerUp {
            id: "pu1".into(),
            power_up: "freeze".into(),
        }],
        applied_pus: vec![],
        rank: 0,
        wpm_average: None,
    }
}

// ════════════════════════════════════════════════════════════════════
// Outbound intent wire shapes
// ════════════════════════════════════════════════════════════════════

#[test]
fn sync_start_wire_shape() {
    let value = serde_json::to_value(ClientMessage::SyncStart).unwrap();
    assert_eq!(value, json!({ "event": "syncStart" }));
}

#[test]
fn player_ready_wire_shape() {
    let value = serde_json::to_value(ClientMessage::PlayerReady).unwrap();
    assert_eq!(value, json!({ "event": "playerReady" }));
}

#[test]
fn round_control_wire_shapes() {
    assert_eq!(
        serde_json::to_value(ClientMessage::PlayAgain).unwrap(),
        json!({ "event": "playAgain" })
    );
    assert_eq!(
        serde_json::to_value(ClientMessage::NextRound).unwrap(),
        json!({ "event": "nextRound" })
    );
    assert_eq!(
        serde_json::to_value(ClientMessage::SendToFinal).unwrap(),
        json!({ "event": "sendToFinal" })
    );
}

#[test]
fn apply_power_wire_shape() {
    let msg = ClientMessage::ApplyPower(ApplyPowerPayload {
        power: "pu1".into(),
        user_name: "Alice".into(),
    });
    let value = serde_json::to_value(&msg).unwrap();
    assert_eq!(
        value,
        json!({
            "event": "applyPower",
            "data": { "power": "pu1", "userName": "Alice" }
        })
    );
}

#[test]
fn join_race_wire_shape() {
    let msg = ClientMessage::JoinRace(JoinRacePayload {
        room_id: "a1b2c3".into(),
        user_name: "Alice".into(),
        color: "blue".into(),
    });
    let value = serde_json::to_value(&msg).unwrap();
    assert_eq!(
        value,
        json!({
            "event": "joinRace",
            "data": { "roomId": "a1b2c3", "userName": "Alice", "color": "blue" }
        })
    );
}

// ════════════════════════════════════════════════════════════════════
// Inbound broadcast fixtures (raw server JSON)
// ════════════════════════════════════════════════════════════════════

#[test]
fn welcome_fixture_parses() {
    let raw = r#"{"event":"welcome","data":{"userId":"sock-1"}}"#;
    let msg: ServerMessage = serde_json::from_str(raw).unwrap();
    assert_eq!(
        msg,
        ServerMessage::Welcome {
            user_id: "sock-1".into()
        }
    );
}

#[test]
fn player_info_fixture_parses_with_empty_game_data() {
    let raw = r#"{
        "event": "playerInfo",
        "data": [{
            "userId": "sock-1",
            "userName": "Alice",
            "color": "blue",
            "isHost": true,
            "isReady": false,
            "gameData": {},
            "userParagraph": "the quick brown fox",
            "availablePUs": [{"id": "pu1", "powerUp": "freeze"}],
            "appliedPUs": [],
            "rank": 0
        }]
    }"#;
    let msg: ServerMessage = serde_json::from_str(raw).unwrap();
    let ServerMessage::PlayerInfo(players) = msg else {
        panic!("expected PlayerInfo");
    };
    assert_eq!(players.len(), 1);
    let alice = &players[0];
    assert_eq!(alice.user_id, "sock-1");
    assert!(alice.is_host);
    assert!(alice.game_data.is_none());
    assert!(!alice.finished());
    assert_eq!(alice.available_pus[0].power_up, "freeze");
    assert!(alice.wpm_average.is_none());
}

#[test]
fn results_fixture_parses_with_metrics() {
    let raw = r#"{
        "event": "results",
        "data": [{
            "userId": "sock-2",
            "userName": "Bob",
            "color": "yellow",
            "isHost": false,
            "isReady": true,
            "gameData": {"WPM": 95.0, "accuracy": 98.2, "finishTime": 31.7},
            "userParagraph": "",
            "availablePUs": [],
            "appliedPUs": [],
            "rank": 1,
            "WPMAverage": 88.5
        }]
    }"#;
    let msg: ServerMessage = serde_json::from_str(raw).unwrap();
    let ServerMessage::Results(players) = msg else {
        panic!("expected Results");
    };
    let bob = &players[0];
    assert!(bob.finished());
    let metrics = bob.game_data.unwrap();
    assert_eq!(metrics.wpm, 95.0);
    assert_eq!(metrics.accuracy, 98.2);
    assert_eq!(metrics.finish_time, 31.7);
    assert_eq!(bob.wpm_average, Some(88.5));
    assert_eq!(bob.rank, 1);
}

#[test]
fn game_state_fixture_parses() {
    let raw = r#"{"event":"getGameState","data":{"rounds":3,"currRound":2,"gamemode":"powerups"}}"#;
    let msg: ServerMessage = serde_json::from_str(raw).unwrap();
    assert_eq!(
        msg,
        ServerMessage::GetGameState(GameStatePayload {
            rounds: 3,
            curr_round: 2,
            gamemode: Some("powerups".into()),
        })
    );
}

#[test]
fn game_state_without_gamemode_disables_powerups() {
    let raw = r#"{"event":"getGameState","data":{"rounds":0,"currRound":1}}"#;
    let msg: ServerMessage = serde_json::from_str(raw).unwrap();
    let ServerMessage::GetGameState(state) = msg else {
        panic!("expected GetGameState");
    };
    assert_eq!(state.gamemode, None);
}

#[test]
fn bare_navigation_fixtures_parse() {
    let start: ServerMessage = serde_json::from_str(r#"{"event":"startRace"}"#).unwrap();
    assert_eq!(start, ServerMessage::StartRace);

    let lobby: ServerMessage = serde_json::from_str(r#"{"event":"navigateToLobby"}"#).unwrap();
    assert_eq!(lobby, ServerMessage::NavigateToLobby);

    let final_: ServerMessage = serde_json::from_str(r#"{"event":"navigateToFinal"}"#).unwrap();
    assert_eq!(final_, ServerMessage::NavigateToFinal);
}

// ════════════════════════════════════════════════════════════════════
// gameData empty-record convention
// ════════════════════════════════════════════════════════════════════

#[test]
fn unfinished_player_serializes_empty_game_data_record() {
    let value = serde_json::to_value(sample_player()).unwrap();
    assert_eq!(value["gameData"], json!({}));
    // Unset average is omitted entirely, matching server output.
    assert!(value.get("WPMAverage").is_none());
}

#[test]
fn metric_field_casing_is_preserved() {
    let mut finished = sample_player();
    finished.game_data = Some(GameData {
        wpm: 0.0,
        accuracy: 100.0,
        finish_time: 12.0,
    });
    finished.wpm_average = Some(64.25);
    let value = serde_json::to_value(&finished).unwrap();
    assert_eq!(value["gameData"]["WPM"], json!(0.0));
    assert_eq!(value["gameData"]["finishTime"], json!(12.0));
    assert_eq!(value["WPMAverage"], json!(64.25));
}

#[test]
fn zero_score_is_distinct_from_unfinished() {
    let mut zero = sample_player();
    zero.game_data = Some(GameData {
        wpm: 0.0,
        accuracy: 0.0,
        finish_time: 0.0,
    });
    let json_zero = serde_json::to_string(&zero).unwrap();
    let back: Player = serde_json::from_str(&json_zero).unwrap();
    assert!(back.finished(), "a zero score is still a finished round");

    let unfinished = sample_player();
    let json_none = serde_json::to_string(&unfinished).unwrap();
    let back: Player = serde_json::from_str(&json_none).unwrap();
    assert!(!back.finished());
}

#[test]
fn partially_populated_game_data_reads_as_unfinished() {
    // A record missing any metric is not a finished round.
    let raw = r#"{
        "userId": "sock-3",
        "userName": "Cara",
        "color": "pink",
        "isHost": false,
        "isReady": true,
        "gameData": {"WPM": 50.0}
    }"#;
    let p: Player = serde_json::from_str(raw).unwrap();
    assert!(p.game_data.is_none());
}

#[test]
fn player_round_trips_losslessly() {
    let mut original = sample_player();
    original.game_data = Some(GameData {
        wpm: 87.3,
        accuracy: 94.1,
        finish_time: 42.0,
    });
    original.applied_pus.push(PowerUp {
        id: "pu9".into(),
        power_up: "blind".into(),
    });
    original.rank = 2;

    let json = serde_json::to_string(&original).unwrap();
    let back: Player = serde_json::from_str(&json).unwrap();
    assert_eq!(back, original);
}
