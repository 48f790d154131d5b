//! Replicated room/round session state.
//!
//! [`Session`] is the single source of local truth for one race session. The
//! server is authoritative: every broadcast replaces the roster or the round
//! metadata wholesale (full-state sync, not a diff), which makes application
//! idempotent by construction — re-delivering a broadcast is an equivalent
//! replacement with no extra side effects.
//!
//! Mutation happens through a bounded set of entry points:
//!
//! - [`Session::apply`] — one inbound [`ServerMessage`], called only by the
//!   transport loop while holding the session lock, so no reader ever sees a
//!   torn update where `players` reflects one broadcast and `curr_round`
//!   another.
//! - [`Session::enter_lobby`] — the one locally-driven phase edge
//!   (avatar selection completed), invoked by the client handle on `joinRace`.
//!
//! Everything else is a derived read over the current snapshot.

use crate::event::RaceEvent;
use crate::phase::Phase;
use crate::protocol::{Player, RoomId, ServerMessage, UserId};

/// Locally replicated view of one room and its round progression.
#[derive(Debug, Clone)]
pub struct Session {
    room_id: RoomId,
    /// Own channel identity; unknown until the server's `welcome` arrives.
    self_id: Option<UserId>,
    /// Current roster in server order, unique by `userId`.
    players: Vec<Player>,
    /// Last resolved view of ourselves. Retained as-is when a broadcast does
    /// not contain our id (identity race at join time) — never cleared by an
    /// unmatched roster.
    local_player: Option<Player>,
    rounds: u32,
    curr_round: u32,
    gamemode: Option<String>,
    phase: Phase,
    final_standings: bool,
}

impl Session {
    /// Fresh session for a room; phase starts at avatar selection.
    pub fn new(room_id: impl Into<RoomId>) -> Self {
        Self {
            room_id: room_id.into(),
            self_id: None,
            players: Vec::new(),
            local_player: None,
            rounds: 0,
            curr_round: 1,
            gamemode: None,
            phase: Phase::AvatarSelect,
            final_standings: false,
        }
    }

    // ── Write entry points ──────────────────────────────────────────

    /// Apply one inbound broadcast and report what changed.
    ///
    /// Round metadata and roster are independently replaceable, so the store
    /// tolerates `getGameState` and `playerInfo` arriving in either order.
    pub fn apply(&mut self, msg: &ServerMessage) -> RaceEvent {
        match msg {
            ServerMessage::Welcome { user_id } => {
                self.self_id = Some(user_id.clone());
                // The roster may have arrived first; resolve against it now.
                self.resolve_local_player();
                RaceEvent::Welcome {
                    user_id: user_id.clone(),
                }
            }
            ServerMessage::PlayerInfo(players) => {
                self.replace_roster(players);
                RaceEvent::RosterUpdated {
                    players: self.players.clone(),
                }
            }
            ServerMessage::GetGameState(state) => {
                self.rounds = state.rounds;
                self.curr_round = state.curr_round;
                self.gamemode = state.gamemode.clone();
                RaceEvent::GameStateUpdated {
                    rounds: self.rounds,
                    curr_round: self.curr_round,
                    gamemode: self.gamemode.clone(),
                }
            }
            ServerMessage::StartRace => {
                self.phase = Phase::Race;
                RaceEvent::PhaseChanged { phase: self.phase }
            }
            ServerMessage::Results(players) => {
                self.replace_roster(players);
                if self.phase == Phase::Race {
                    self.phase = Phase::Results;
                }
                RaceEvent::ResultsUpdated {
                    players: self.players.clone(),
                    round_complete: self.all_finished(),
                }
            }
            ServerMessage::NavigateToFinal => {
                self.final_standings = true;
                self.phase = Phase::Final;
                RaceEvent::PhaseChanged { phase: self.phase }
            }
            ServerMessage::NavigateToLobby => {
                // Never advance past the configured round count.
                if self.rounds == 0 || self.curr_round < self.rounds {
                    self.curr_round += 1;
                }
                self.phase = Phase::Lobby;
                RaceEvent::PhaseChanged { phase: self.phase }
            }
        }
    }

    /// Avatar selection completed: move to the lobby.
    pub(crate) fn enter_lobby(&mut self) {
        if self.phase == Phase::AvatarSelect {
            self.phase = Phase::Lobby;
        }
    }

    fn replace_roster(&mut self, players: &[Player]) {
        self.players = players.to_vec();
        self.resolve_local_player();
    }

    /// Re-point `local_player` at our roster entry. If our id is unknown or
    /// absent from the roster, the previous pointer is kept; matching on id
    /// (never "first element") avoids crashing on an empty match.
    fn resolve_local_player(&mut self) {
        let Some(self_id) = &self.self_id else {
            return;
        };
        if let Some(me) = self.players.iter().find(|p| &p.user_id == self_id) {
            self.local_player = Some(me.clone());
        }
    }

    // ── Derived reads ───────────────────────────────────────────────

    pub fn room_id(&self) -> &RoomId {
        &self.room_id
    }

    /// Own channel identity, once the server has assigned it.
    pub fn self_id(&self) -> Option<&UserId> {
        self.self_id.as_ref()
    }

    /// Current roster in server order.
    pub fn players(&self) -> &[Player] {
        &self.players
    }

    /// Our own player record, as of the last roster that contained us.
    pub fn local_player(&self) -> Option<&Player> {
        self.local_player.as_ref()
    }

    /// Whether we are the room host. False while identity is unresolved.
    pub fn is_host(&self) -> bool {
        self.local_player.as_ref().is_some_and(|p| p.is_host)
    }

    /// Room-ready: every player on the roster has flagged ready.
    /// (Vacuously true for an empty roster; the start control is host-gated
    /// and a host implies a non-empty roster.)
    pub fn room_ready(&self) -> bool {
        self.players.iter().all(|p| p.is_ready)
    }

    /// Round-complete: every player has a populated `gameData`.
    pub fn all_finished(&self) -> bool {
        self.players.iter().all(Player::finished)
    }

    pub fn rounds(&self) -> u32 {
        self.rounds
    }

    pub fn curr_round(&self) -> u32 {
        self.curr_round
    }

    /// Gamemode flag; presence means power-ups are active for the room.
    pub fn gamemode(&self) -> Option<&str> {
        self.gamemode.as_deref()
    }

    pub fn powerups_enabled(&self) -> bool {
        self.gamemode.is_some()
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Whether the session has been moved to aggregate final standings.
    pub fn final_standings(&self) -> bool {
        self.final_standings
    }

    /// Multi-round mode with rounds still to race.
    pub fn more_rounds_remain(&self) -> bool {
        self.rounds > 0 && self.curr_round < self.rounds
    }

    /// Per-control enablement for the host-only buttons.
    ///
    /// This mirrors the server-enforced authority client-side so the UI can
    /// disable controls; it is not itself authoritative.
    pub fn controls(&self) -> Controls {
        let host = self.is_host();
        let finished = self.all_finished() && !self.players.is_empty();
        Controls {
            start_race: host && self.room_ready(),
            play_again: host && finished && self.rounds == 0,
            next_round: host && finished && self.more_rounds_remain(),
            send_to_final: host && finished && self.rounds > 0 && !self.more_rounds_remain(),
            power_ups: self.powerups_enabled(),
        }
    }
}

/// UI-permission mirror for the room controls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Controls {
    /// "Start Race": host with every player ready.
    pub start_race: bool,
    /// "Play Again": host with every player finished, single-race mode only
    /// (`rounds == 0`).
    pub play_again: bool,
    /// "Next Round": host, everyone finished, more rounds remain.
    pub next_round: bool,
    /// "Final Results": host, everyone finished, no rounds remain.
    pub send_to_final: bool,
    /// Whether the power-up pool is shown at all (gamemode present).
    pub power_ups: bool,
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::protocol::{GameData, GameStatePayload};

    fn player(user_id: &str, is_host: bool, is_ready: bool) -> Player {
        Player {
            user_id: user_id.into(),
            user_name: user_id.to_uppercase(),
            color: "blue".into(),
            is_host,
            is_ready,
            game_data: None,
            user_paragraph: "the quick brown fox".into(),
            available_pus: vec![],
            applied_pus: vec![],
            rank: 0,
            wpm_average: None,
        }
    }

    fn finished(mut p: Player, wpm: f64) -> Player {
        p.game_data = Some(GameData {
            wpm,
            accuracy: 98.0,
            finish_time: 35.0,
        });
        p
    }

    fn welcomed(room: &str, self_id: &str) -> Session {
        let mut session = Session::new(room);
        session.apply(&ServerMessage::Welcome {
            user_id: self_id.into(),
        });
        session
    }

    #[test]
    fn roster_broadcast_replaces_wholesale() {
        let mut session = welcomed("room1", "a");
        session.apply(&ServerMessage::PlayerInfo(vec![
            player("a", true, false),
            player("b", false, false),
        ]));
        assert_eq!(session.players().len(), 2);

        session.apply(&ServerMessage::PlayerInfo(vec![player("a", true, false)]));
        assert_eq!(session.players().len(), 1);
    }

    #[test]
    fn apply_is_idempotent_for_identical_broadcasts() {
        let roster = vec![player("a", true, true), player("b", false, false)];
        let mut once = welcomed("room1", "a");
        once.apply(&ServerMessage::PlayerInfo(roster.clone()));

        let mut twice = welcomed("room1", "a");
        twice.apply(&ServerMessage::PlayerInfo(roster.clone()));
        twice.apply(&ServerMessage::PlayerInfo(roster));

        assert_eq!(once.players(), twice.players());
        assert_eq!(once.local_player(), twice.local_player());
        assert_eq!(once.room_ready(), twice.room_ready());
    }

    #[test]
    fn local_player_resolved_by_id_not_position() {
        let mut session = welcomed("room1", "b");
        session.apply(&ServerMessage::PlayerInfo(vec![
            player("a", true, false),
            player("b", false, true),
        ]));
        let me = session.local_player().unwrap();
        assert_eq!(me.user_id, "b");
        assert!(!session.is_host());
    }

    #[test]
    fn roster_before_welcome_resolves_once_identity_arrives() {
        let mut session = Session::new("room1");
        session.apply(&ServerMessage::PlayerInfo(vec![player("a", true, false)]));
        assert!(session.local_player().is_none());

        session.apply(&ServerMessage::Welcome {
            user_id: "a".into(),
        });
        assert_eq!(session.local_player().unwrap().user_id, "a");
        assert!(session.is_host());
    }

    #[test]
    fn unmatched_roster_retains_previous_local_player() {
        let mut session = welcomed("room1", "a");
        session.apply(&ServerMessage::PlayerInfo(vec![player("a", true, true)]));
        assert!(session.is_host());

        // A broadcast racing our join may not contain us yet.
        session.apply(&ServerMessage::PlayerInfo(vec![player("b", false, false)]));
        let me = session.local_player().unwrap();
        assert_eq!(me.user_id, "a");
        assert!(session.is_host());
    }

    #[test]
    fn room_ready_tracks_every_player() {
        let mut session = welcomed("room1", "a");
        session.apply(&ServerMessage::PlayerInfo(vec![
            player("a", true, true),
            player("b", false, true),
        ]));
        assert!(session.room_ready());

        session.apply(&ServerMessage::PlayerInfo(vec![
            player("a", true, true),
            player("b", false, false),
        ]));
        assert!(!session.room_ready());
    }

    #[test]
    fn game_state_and_roster_commute() {
        let state = GameStatePayload {
            rounds: 3,
            curr_round: 1,
            gamemode: Some("powerups".into()),
        };
        let roster = vec![player("a", true, false)];

        let mut state_first = welcomed("room1", "a");
        state_first.apply(&ServerMessage::GetGameState(state.clone()));
        state_first.apply(&ServerMessage::PlayerInfo(roster.clone()));

        let mut roster_first = welcomed("room1", "a");
        roster_first.apply(&ServerMessage::PlayerInfo(roster));
        roster_first.apply(&ServerMessage::GetGameState(state));

        assert_eq!(state_first.rounds(), roster_first.rounds());
        assert_eq!(state_first.curr_round(), roster_first.curr_round());
        assert_eq!(state_first.players(), roster_first.players());
        assert!(state_first.powerups_enabled());
    }

    #[test]
    fn start_race_moves_to_race_phase() {
        let mut session = welcomed("room1", "a");
        session.enter_lobby();
        assert_eq!(session.phase(), Phase::Lobby);
        session.apply(&ServerMessage::StartRace);
        assert_eq!(session.phase(), Phase::Race);
    }

    #[test]
    fn results_complete_only_when_everyone_finished() {
        let mut session = welcomed("room1", "a");
        let event = session.apply(&ServerMessage::Results(vec![
            finished(player("a", true, true), 80.0),
            player("b", false, true),
        ]));
        match event {
            RaceEvent::ResultsUpdated { round_complete, .. } => assert!(!round_complete),
            other => panic!("expected ResultsUpdated, got {other:?}"),
        }
        assert!(!session.all_finished());

        let event = session.apply(&ServerMessage::Results(vec![
            finished(player("a", true, true), 80.0),
            finished(player("b", false, true), 95.0),
        ]));
        match event {
            RaceEvent::ResultsUpdated { round_complete, .. } => assert!(round_complete),
            other => panic!("expected ResultsUpdated, got {other:?}"),
        }
    }

    #[test]
    fn results_during_race_move_to_results_phase() {
        let mut session = welcomed("room1", "a");
        session.apply(&ServerMessage::StartRace);
        session.apply(&ServerMessage::Results(vec![finished(
            player("a", true, true),
            80.0,
        )]));
        assert_eq!(session.phase(), Phase::Results);
    }

    #[test]
    fn navigate_to_lobby_increments_round_within_bound() {
        let mut session = welcomed("room1", "a");
        session.apply(&ServerMessage::GetGameState(GameStatePayload {
            rounds: 2,
            curr_round: 1,
            gamemode: None,
        }));

        session.apply(&ServerMessage::NavigateToLobby);
        assert_eq!(session.curr_round(), 2);
        assert_eq!(session.phase(), Phase::Lobby);

        // Already at the last round: the bound holds.
        session.apply(&ServerMessage::NavigateToLobby);
        assert_eq!(session.curr_round(), 2);
    }

    #[test]
    fn navigate_to_final_sets_final_mode() {
        let mut session = welcomed("room1", "a");
        assert!(!session.final_standings());
        session.apply(&ServerMessage::NavigateToFinal);
        assert!(session.final_standings());
        assert_eq!(session.phase(), Phase::Final);
    }

    #[test]
    fn start_race_control_requires_host_and_room_ready() {
        let mut host_side = welcomed("room1", "a");
        host_side.apply(&ServerMessage::PlayerInfo(vec![
            player("a", true, true),
            player("b", false, true),
        ]));
        assert!(host_side.room_ready());
        assert!(host_side.controls().start_race);

        let mut guest_side = welcomed("room1", "b");
        guest_side.apply(&ServerMessage::PlayerInfo(vec![
            player("a", true, true),
            player("b", false, true),
        ]));
        assert!(!guest_side.controls().start_race);
    }

    #[test]
    fn next_round_disabled_until_all_finished() {
        let mut session = welcomed("room1", "a");
        session.apply(&ServerMessage::GetGameState(GameStatePayload {
            rounds: 3,
            curr_round: 1,
            gamemode: None,
        }));
        session.apply(&ServerMessage::Results(vec![
            finished(player("a", true, true), 80.0),
            player("b", false, true),
        ]));
        // Host, but one player still racing.
        assert!(session.is_host());
        assert!(!session.controls().next_round);

        session.apply(&ServerMessage::Results(vec![
            finished(player("a", true, true), 80.0),
            finished(player("b", false, true), 95.0),
        ]));
        assert!(session.controls().next_round);
        assert!(!session.controls().send_to_final);
    }

    #[test]
    fn play_again_only_in_single_race_mode() {
        // Multi-round room, everyone finished: the round controls take over
        // and play-again stays dark.
        let mut multi = welcomed("room1", "a");
        multi.apply(&ServerMessage::GetGameState(GameStatePayload {
            rounds: 3,
            curr_round: 1,
            gamemode: None,
        }));
        multi.apply(&ServerMessage::Results(vec![
            finished(player("a", true, true), 80.0),
            finished(player("b", false, true), 95.0),
        ]));
        let controls = multi.controls();
        assert!(controls.next_round);
        assert!(!controls.play_again);

        // Same roster in a single-race room (rounds == 0) unlocks it.
        let mut single = welcomed("room1", "a");
        single.apply(&ServerMessage::Results(vec![
            finished(player("a", true, true), 80.0),
            finished(player("b", false, true), 95.0),
        ]));
        assert!(single.controls().play_again);
        assert!(!single.controls().next_round);
    }

    #[test]
    fn send_to_final_enabled_on_last_round() {
        let mut session = welcomed("room1", "a");
        session.apply(&ServerMessage::GetGameState(GameStatePayload {
            rounds: 2,
            curr_round: 2,
            gamemode: None,
        }));
        session.apply(&ServerMessage::Results(vec![
            finished(player("a", true, true), 80.0),
            finished(player("b", false, true), 95.0),
        ]));
        let controls = session.controls();
        assert!(!controls.next_round);
        assert!(controls.send_to_final);
    }

    #[test]
    fn controls_all_disabled_without_players() {
        let session = welcomed("room1", "a");
        let controls = session.controls();
        assert!(!controls.start_race);
        assert!(!controls.play_again);
        assert!(!controls.next_round);
        assert!(!controls.send_to_final);
    }
}
