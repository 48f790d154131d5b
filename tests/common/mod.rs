//! Shared test helpers: a scripted `MockTransport` and JSON fixture builders.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use rocket_race_client::error::RaceClientError;
use rocket_race_client::protocol::{GameData, GameStatePayload, Player, PowerUp, ServerMessage};
use rocket_race_client::transport::Transport;

/// One scripted inbound item: a message, a transport error, or a clean close.
pub type Scripted = Option<Result<String, RaceClientError>>;

/// A mock transport that records sent messages and replays scripted responses.
///
/// After the script is exhausted, `recv()` hangs forever so the transport loop
/// stays alive until shutdown.
pub struct MockTransport {
    incoming: VecDeque<Scripted>,
    sent: Arc<Mutex<Vec<String>>>,
    closed: Arc<AtomicBool>,
}

impl MockTransport {
    pub fn new(incoming: Vec<Scripted>) -> (Self, Arc<Mutex<Vec<String>>>, Arc<AtomicBool>) {
        let sent = Arc::new(Mutex::new(Vec::new()));
        let closed = Arc::new(AtomicBool::new(false));
        let transport = Self {
            incoming: VecDeque::from(incoming),
            sent: Arc::clone(&sent),
            closed: Arc::clone(&closed),
        };
        (transport, sent, closed)
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&mut self, message: String) -> Result<(), RaceClientError> {
        self.sent.lock().unwrap().push(message);
        Ok(())
    }

    async fn recv(&mut self) -> Option<Result<String, RaceClientError>> {
        if let Some(item) = self.incoming.pop_front() {
            item
        } else {
            std::future::pending().await
        }
    }

    async fn close(&mut self) -> Result<(), RaceClientError> {
        self.closed.store(true, Ordering::Relaxed);
        Ok(())
    }
}

// ── Roster builders ─────────────────────────────────────────────────

/// A lobby player with no typing metrics yet.
pub fn player(user_id: &str, user_name: &str, is_host: bool, is_ready: bool) -> Player {
    Player {
        user_id: user_id.into(),
        user_name: user_name.into(),
        color: "blue".into(),
        is_host,
        is_ready,
        game_data: None,
        user_paragraph: "the quick brown fox jumps over the lazy dog".into(),
        available_pus: vec![],
        applied_pus: vec![],
        rank: 0,
        wpm_average: None,
    }
}

/// Attach finished-round metrics.
pub fn finished(mut p: Player, wpm: f64) -> Player {
    p.game_data = Some(GameData {
        wpm,
        accuracy: 96.5,
        finish_time: 41.2,
    });
    p
}

/// Attach an available power-up card.
pub fn holding(mut p: Player, card_id: &str) -> Player {
    p.available_pus.push(PowerUp {
        id: card_id.into(),
        power_up: "freeze".into(),
    });
    p
}

/// Attach a final-standings average.
pub fn averaging(mut p: Player, avg: f64) -> Player {
    p.wpm_average = Some(avg);
    p
}

// ── JSON fixtures ───────────────────────────────────────────────────

fn scripted(msg: &ServerMessage) -> Scripted {
    Some(Ok(serde_json::to_string(msg).unwrap()))
}

pub fn welcome_json(user_id: &str) -> Scripted {
    scripted(&ServerMessage::Welcome {
        user_id: user_id.into(),
    })
}

pub fn player_info_json(players: Vec<Player>) -> Scripted {
    scripted(&ServerMessage::PlayerInfo(players))
}

pub fn game_state_json(rounds: u32, curr_round: u32, gamemode: Option<&str>) -> Scripted {
    scripted(&ServerMessage::GetGameState(GameStatePayload {
        rounds,
        curr_round,
        gamemode: gamemode.map(Into::into),
    }))
}

pub fn start_race_json() -> Scripted {
    scripted(&ServerMessage::StartRace)
}

pub fn results_json(players: Vec<Player>) -> Scripted {
    scripted(&ServerMessage::Results(players))
}

pub fn navigate_to_final_json() -> Scripted {
    scripted(&ServerMessage::NavigateToFinal)
}

pub fn navigate_to_lobby_json() -> Scripted {
    scripted(&ServerMessage::NavigateToLobby)
}
