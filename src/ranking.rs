//! Standings computation for the results and final screens.
//!
//! [`standings`] is a pure function over the current roster: it never touches
//! the session store and never writes the computed placement back onto the
//! [`Player`] entities (the server owns the persisted `rank` field). The
//! winner highlighted by the presentation layer is element 0 of the output.

use crate::protocol::Player;

/// Which metric orders the standings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RankingMode {
    /// Per-round standings, ordered by this round's `WPM`.
    Round,
    /// Aggregate standings, ordered by `WPMAverage` across completed rounds.
    Final,
}

/// One row of the ordered standings view.
#[derive(Debug, Clone, PartialEq)]
pub struct Standing {
    /// 1-based placement in the ordered view.
    pub rank: usize,
    pub player: Player,
}

/// Order the roster for display.
///
/// Players with the ranking metric sort by it descending. Players without it
/// (not yet finished, or no average computed) sort after all of them, keeping
/// their roster order — "not yet finished" is distinct from a zero score.
///
/// Ties on the metric break by ascending `userId`. The observed game leaves
/// the tie order unspecified; an explicit deterministic rule keeps the view
/// stable across re-renders and across clients.
pub fn standings(players: &[Player], mode: RankingMode) -> Vec<Standing> {
    let metric = |p: &Player| -> Option<f64> {
        match mode {
            RankingMode::Round => p.game_data.map(|g| g.wpm),
            RankingMode::Final => p.wpm_average,
        }
    };

    let mut scored: Vec<(&Player, f64)> = players
        .iter()
        .filter_map(|p| metric(p).map(|value| (p, value)))
        .collect();
    scored.sort_by(|(a, va), (b, vb)| {
        vb.total_cmp(va).then_with(|| a.user_id.cmp(&b.user_id))
    });

    let unfinished = players.iter().filter(|p| metric(p).is_none());

    scored
        .into_iter()
        .map(|(p, _)| p)
        .chain(unfinished)
        .enumerate()
        .map(|(i, p)| Standing {
            rank: i + 1,
            player: p.clone(),
        })
        .collect()
}
