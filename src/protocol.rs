//! Wire-compatible protocol types for the Rocket Race typing-race protocol.
//!
//! Every type in this module produces the JSON the game server broadcasts to
//! its browser clients. Key properties of the wire format:
//!
//! - Messages are internally tagged: `{"event": "...", "data": ...}`, with the
//!   event names the server uses verbatim (`playerInfo`, `syncStart`, …).
//! - Field names are camelCase, except the WPM metrics which the server spells
//!   `WPM` / `WPMAverage`.
//! - A player's `gameData` is an empty record (`{}`) until that player has
//!   finished the current round; it maps to `None` here, which is distinct
//!   from a populated record with a zero score.

use serde::{Deserialize, Serialize};

// ── Type aliases ────────────────────────────────────────────────────

/// Stable player identity, equal to the server-issued channel connection id.
pub type UserId = String;

/// Room routing key, externally assigned.
pub type RoomId = String;

// ── Structs ─────────────────────────────────────────────────────────

/// Per-round typing metrics for one player.
///
/// All three fields are populated together once the player finishes a round.
/// Until then the server sends an empty record, represented in [`Player`] as
/// `game_data: None`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameData {
    /// Words per minute, the primary performance metric.
    #[serde(rename = "WPM")]
    pub wpm: f64,
    /// Typing accuracy in percent.
    pub accuracy: f64,
    /// Seconds elapsed from race start to finishing the paragraph.
    pub finish_time: f64,
}

/// A consumable power-up card held or received by a player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PowerUp {
    /// Server-assigned card id, also used as the drag handle id in the UI.
    pub id: String,
    /// Effect key selecting the card asset and behavior.
    pub power_up: String,
}

/// One connected participant as broadcast by the server.
///
/// The roster is always replaced wholesale; the client never merges partial
/// player updates, and never locally mutates another player's `game_data` or
/// `rank` (those only ever arrive from the server).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    /// Stable identity, equal to this player's channel connection id.
    pub user_id: UserId,
    /// Display name, also the drop-target id for power-up cards.
    pub user_name: String,
    /// Rocket color, selects the visual asset key.
    pub color: String,
    /// Exactly one player per room has this set.
    pub is_host: bool,
    /// Lobby readiness flag, aggregated into room-ready by the session store.
    pub is_ready: bool,
    /// Populated only once this player finished the current round.
    #[serde(default, with = "game_data_record")]
    pub game_data: Option<GameData>,
    /// The paragraph assigned to this player for the round (opaque here).
    #[serde(default)]
    pub user_paragraph: String,
    /// Power-ups held but not yet used, in server order.
    #[serde(rename = "availablePUs", default)]
    pub available_pus: Vec<PowerUp>,
    /// Power-ups other players have applied to this player.
    #[serde(rename = "appliedPUs", default)]
    pub applied_pus: Vec<PowerUp>,
    /// This round's placement (1-based), assigned by the server.
    #[serde(default)]
    pub rank: u32,
    /// Mean WPM across completed rounds; present only for final standings.
    #[serde(rename = "WPMAverage", default, skip_serializing_if = "Option::is_none")]
    pub wpm_average: Option<f64>,
}

impl Player {
    /// Whether this player has finished the current round.
    pub fn finished(&self) -> bool {
        self.game_data.is_some()
    }
}

/// `gameData` field codec: the server sends an empty record (`{}`) for a
/// player who has not finished yet, and a fully-populated one afterwards.
/// A record missing any of the three metrics deserializes to `None`.
mod game_data_record {
    use serde::ser::SerializeMap;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    use super::GameData;

    #[derive(Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct PartialGameData {
        #[serde(rename = "WPM")]
        wpm: Option<f64>,
        accuracy: Option<f64>,
        finish_time: Option<f64>,
    }

    pub fn serialize<S>(value: &Option<GameData>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(data) => data.serialize(serializer),
            None => serializer.serialize_map(Some(0))?.end(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<GameData>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let partial = Option::<PartialGameData>::deserialize(deserializer)?;
        Ok(match partial {
            Some(PartialGameData {
                wpm: Some(wpm),
                accuracy: Some(accuracy),
                finish_time: Some(finish_time),
            }) => Some(GameData {
                wpm,
                accuracy,
                finish_time,
            }),
            _ => None,
        })
    }
}

// ── Payload structs ─────────────────────────────────────────────────

/// Payload for the `getGameState` server message (round metadata).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameStatePayload {
    /// Total configured rounds; `0` means single-race mode, no progression.
    #[serde(default)]
    pub rounds: u32,
    /// 1-based index of the active round.
    #[serde(default)]
    pub curr_round: u32,
    /// Presence toggles whether power-ups are active for the room.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gamemode: Option<String>,
}

/// Payload for the outbound `applyPower` intent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplyPowerPayload {
    /// The dragged card id.
    pub power: String,
    /// The target player's display name (the drop zone id).
    pub user_name: String,
}

/// Payload for the outbound `joinRace` intent sent from the avatar phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinRacePayload {
    pub room_id: RoomId,
    pub user_name: String,
    pub color: String,
}

// ── Messages ────────────────────────────────────────────────────────

/// Message types sent from client to server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ClientMessage {
    /// Join a room with the chosen display identity (avatar phase).
    JoinRace(JoinRacePayload),
    /// Toggle lobby readiness; the server aggregates and rebroadcasts.
    PlayerReady,
    /// Host: synchronize race start for every player in the room.
    /// Local precondition: is-host and room-ready.
    SyncStart,
    /// Apply a power-up to another player. Only ever emitted through the
    /// targeting validator in [`crate::targeting`].
    ApplyPower(ApplyPowerPayload),
    /// Host: restart the race after results (single-race mode).
    PlayAgain,
    /// Host: advance to the next round's lobby. Local precondition:
    /// all finished and more rounds remain.
    NextRound,
    /// Host: move everyone to final standings after the last round.
    SendToFinal,
}

/// Message types sent from server to client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ServerMessage {
    /// Identity assignment: the channel connection id this client goes by.
    /// May arrive before or after the first roster broadcast.
    #[serde(rename_all = "camelCase")]
    Welcome { user_id: UserId },
    /// Full roster replacement (full-state sync, not a diff).
    PlayerInfo(Vec<Player>),
    /// Round metadata replacement.
    GetGameState(GameStatePayload),
    /// The host started the race; every client transitions to the race phase.
    StartRace,
    /// Roster replacement carrying per-round results as they come in.
    Results(Vec<Player>),
    /// Move to aggregate final standings.
    NavigateToFinal,
    /// Advance to the next round's lobby.
    NavigateToLobby,
}
