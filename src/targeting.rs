//! Power-up targeting validation.
//!
//! The lobby UI lets a player drag one of their power-up cards onto another
//! player's rocket. The drag library reports where the card landed; this
//! module is the single gate deciding whether that interaction becomes an
//! outbound `applyPower` intent. Nothing else in the crate constructs an
//! [`ApplyPowerPayload`], so self-application and malformed targets can never
//! reach the channel.

use crate::protocol::{ApplyPowerPayload, Player};

/// Drop-zone id of the acting player's own card pool. Dropping a card back
/// into the pool is a cancelled interaction, not a target.
pub const OWN_POOL_ID: &str = "my-powerups";

/// Result of a completed drag interaction, as reported by the UI layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DragResult {
    /// Id of the dragged power-up card.
    pub draggable_id: String,
    /// Where the card was dropped; `None` when the drop was cancelled.
    pub destination: Option<DropTarget>,
}

/// The drop zone a dragged card landed in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DropTarget {
    /// Drop-zone id: a target player's `userName`, or [`OWN_POOL_ID`].
    pub droppable_id: String,
}

impl DragResult {
    /// A drag that landed in the given drop zone.
    pub fn dropped_on(draggable_id: impl Into<String>, droppable_id: impl Into<String>) -> Self {
        Self {
            draggable_id: draggable_id.into(),
            destination: Some(DropTarget {
                droppable_id: droppable_id.into(),
            }),
        }
    }

    /// A drag that was released outside any drop zone.
    pub fn cancelled(draggable_id: impl Into<String>) -> Self {
        Self {
            draggable_id: draggable_id.into(),
            destination: None,
        }
    }
}

/// Validate a drag interaction against the acting player and produce the
/// `applyPower` payload to emit, if any.
///
/// Returns `None` (drop the intent silently, no user-facing error) when:
/// - the drop was cancelled (no destination),
/// - the card landed back in the acting player's own pool,
/// - the target is the acting player themselves (self-targeting forbidden),
/// - the dragged id is not in the acting player's available pool, so an
///   applied power-up always originates from the sender's own cards.
pub fn validate_power_target(result: &DragResult, actor: &Player) -> Option<ApplyPowerPayload> {
    let destination = result.destination.as_ref()?;
    if destination.droppable_id == OWN_POOL_ID {
        return None;
    }
    if destination.droppable_id == actor.user_name {
        return None;
    }
    if !actor.available_pus.iter().any(|pu| pu.id == result.draggable_id) {
        return None;
    }
    Some(ApplyPowerPayload {
        power: result.draggable_id.clone(),
        user_name: destination.droppable_id.clone(),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::protocol::PowerUp;

    fn actor_with_cards(user_name: &str, cards: &[&str]) -> Player {
        Player {
            user_id: user_name.to_lowercase(),
            user_name: user_name.into(),
            color: "yellow".into(),
            is_host: false,
            is_ready: true,
            game_data: None,
            user_paragraph: String::new(),
            available_pus: cards
                .iter()
                .map(|id| PowerUp {
                    id: (*id).into(),
                    power_up: "freeze".into(),
                })
                .collect(),
            applied_pus: vec![],
            rank: 0,
            wpm_average: None,
        }
    }

    #[test]
    fn cancelled_drop_emits_nothing() {
        let actor = actor_with_cards("B", &["pu1"]);
        let result = DragResult::cancelled("pu1");
        assert_eq!(validate_power_target(&result, &actor), None);
    }

    #[test]
    fn own_pool_drop_emits_nothing() {
        let actor = actor_with_cards("B", &["pu1"]);
        let result = DragResult::dropped_on("pu1", OWN_POOL_ID);
        assert_eq!(validate_power_target(&result, &actor), None);
    }

    #[test]
    fn self_target_emits_nothing() {
        let actor = actor_with_cards("A", &["pu1"]);
        let result = DragResult::dropped_on("pu1", "A");
        assert_eq!(validate_power_target(&result, &actor), None);
    }

    #[test]
    fn card_not_in_pool_emits_nothing() {
        let actor = actor_with_cards("B", &["pu2"]);
        let result = DragResult::dropped_on("pu1", "A");
        assert_eq!(validate_power_target(&result, &actor), None);
    }

    #[test]
    fn valid_target_produces_payload() {
        let actor = actor_with_cards("B", &["pu1", "pu2"]);
        let result = DragResult::dropped_on("pu1", "A");
        let payload = validate_power_target(&result, &actor).unwrap();
        assert_eq!(payload.power, "pu1");
        assert_eq!(payload.user_name, "A");
    }
}
