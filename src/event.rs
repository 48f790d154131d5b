//! Typed events emitted to the UI layer.
//!
//! Every inbound broadcast the transport loop applies to the session store
//! produces exactly one [`RaceEvent`] on the bounded event channel, plus the
//! synthetic `Connected` / `Disconnected` lifecycle events. Consumers render
//! from these and from session snapshots; they never subscribe to the
//! transport directly, which is what keeps listener registration single and
//! scoped to the session.

use crate::phase::Phase;
use crate::protocol::{Player, UserId};

/// Events delivered to the consumer of a [`RaceClient`](crate::client::RaceClient).
#[derive(Debug, Clone, PartialEq)]
pub enum RaceEvent {
    /// The transport loop is running; emitted once before any server event.
    Connected,
    /// The server assigned our channel identity.
    Welcome { user_id: UserId },
    /// The roster was replaced by a `playerInfo` broadcast.
    RosterUpdated { players: Vec<Player> },
    /// Round metadata was replaced by a `getGameState` broadcast.
    GameStateUpdated {
        rounds: u32,
        curr_round: u32,
        gamemode: Option<String>,
    },
    /// The roster was replaced by a `results` broadcast. `round_complete` is
    /// true once every player has populated typing metrics.
    ResultsUpdated {
        players: Vec<Player>,
        round_complete: bool,
    },
    /// The active phase changed (race start, lobby loop, final standings).
    PhaseChanged { phase: Phase },
    /// The transport closed; always the last event on the channel.
    Disconnected { reason: Option<String> },
}
