//! Game phase state machine and its route surface.
//!
//! Phases advance in order `AvatarSelect → Lobby → Race → Results`, after
//! which the room either loops back to `Lobby` (more rounds remain) or moves
//! to `Final`. Transitions are driven only by inbound server events applied
//! through [`Session::apply`](crate::session::Session::apply); there is no
//! terminal phase short of leaving the room.

use serde::{Deserialize, Serialize};

/// The current step of the game flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Picking a display name and rocket color; initial phase on room entry.
    #[default]
    AvatarSelect,
    /// Waiting room: readiness toggles, power-up drags, host start control.
    Lobby,
    /// The race itself (keystroke capture is external to this crate).
    Race,
    /// Per-round standings.
    Results,
    /// Aggregate standings across all rounds.
    Final,
}

impl Phase {
    /// The route path the UI should render for this phase.
    ///
    /// Matches the browser client's route surface: `/:roomId` for avatar
    /// selection, then `/:roomId/{lobby,race,results,final}`.
    pub fn path(&self, room_id: &str) -> String {
        match self {
            Phase::AvatarSelect => format!("/{room_id}"),
            Phase::Lobby => format!("/{room_id}/lobby"),
            Phase::Race => format!("/{room_id}/race"),
            Phase::Results => format!("/{room_id}/results"),
            Phase::Final => format!("/{room_id}/final"),
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Phase::AvatarSelect => "avatar_select",
            Phase::Lobby => "lobby",
            Phase::Race => "race",
            Phase::Results => "results",
            Phase::Final => "final",
        };
        f.write_str(name)
    }
}
