//! Saving and restoring a faction's AI registry.
//!
//! Records are plain JSON. Ids inside a restored record are checked against
//! the world it is loaded into; anything that no longer resolves is dropped,
//! as are one-time missions.

use colony_core::{FactionId, GameState, Location};
use thiserror::Error;
use tracing::debug;

use crate::mission::Mission;
use crate::types::{AiState, TransportableId};

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("malformed ai record: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("record belongs to {found}, expected {expected}")]
    FactionMismatch {
        expected: FactionId,
        found: FactionId,
    },
}

pub fn save(state: &AiState) -> Result<String, PersistError> {
    Ok(serde_json::to_string_pretty(state)?)
}

/// Decodes the record of `faction`.
pub fn load(record: &str, faction: FactionId) -> Result<AiState, PersistError> {
    let state: AiState = serde_json::from_str(record)?;
    if state.faction != faction {
        return Err(PersistError::FactionMismatch {
            expected: faction,
            found: state.faction,
        });
    }
    Ok(state)
}

/// Re-validates a loaded registry against `world`.
///
/// 1. Records of units that no longer exist, or changed hands, are dropped.
/// 2. One-time missions are dropped and their wishes reopened.
/// 3. Colony records, wishes and parcels tied to lost places are dropped.
/// 4. Transport assignments and pioneer claims to missing units are cleared.
pub fn restore(state: &mut AiState, world: &GameState) {
    let faction = state.faction;
    let alive = |unit| world.unit(unit).is_some_and(|u| u.owner == faction);

    state.units.retain(|id, _| alive(*id));
    for unit in state.units.values_mut() {
        if unit.mission.as_ref().is_some_and(Mission::is_one_time) {
            debug!(unit = %unit.unit, "one-time mission dropped on restore");
            unit.mission = None;
        }
        if unit.transport.is_some_and(|c| !alive(c)) {
            unit.transport = None;
        }
    }

    state
        .colonies
        .retain(|id, _| world.settlement(*id).is_some_and(|s| s.owner == faction));
    let colonies = &state.colonies;
    state
        .wishes
        .retain(|_, w| colonies.contains_key(&w.destination));

    state.goods.retain(|_, g| match g.location {
        Location::Aboard(carrier) => alive(carrier),
        _ => true,
    });
    for goods in state.goods.values_mut() {
        if goods.transport.is_some_and(|c| !alive(c)) {
            goods.transport = None;
        }
        if goods.wish.is_some_and(|w| !state.wishes.contains_key(&w)) {
            goods.wish = None;
        }
    }

    let bound_elsewhere: Vec<_> = state
        .wishes
        .values()
        .filter_map(|w| w.transportable.map(|t| (w.id, t)))
        .filter(|(id, t)| match t {
            TransportableId::Unit(unit) => !matches!(
                state.units.get(unit).and_then(|u| u.mission.as_ref()),
                Some(Mission::WishRealization { wish, .. }) if wish == id
            ),
            TransportableId::Goods(goods) => !state.goods.contains_key(goods),
        })
        .map(|(id, _)| id)
        .collect();
    for id in bound_elsewhere {
        if let Some(wish) = state.wishes.get_mut(&id) {
            wish.transportable = None;
        }
    }

    for colony in state.colonies.values_mut() {
        colony.wishes.retain(|w| state.wishes.contains_key(w));
        for plan in &mut colony.plans {
            if plan.pioneer.is_some_and(|p| !alive(p)) {
                plan.pioneer = None;
            }
        }
    }
}
