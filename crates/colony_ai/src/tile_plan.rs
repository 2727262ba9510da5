use std::collections::BTreeMap;

use colony_core::{GameState, ImprovementKind, TilePos, UnitId};
use serde::{Deserialize, Serialize};

use crate::mission::Mission;
use crate::types::AiState;

/// A tile improvement a colony would like done, optionally claimed by a pioneer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileImprovementPlan {
    pub tile: TilePos,
    pub improvement: ImprovementKind,
    pub value: i32,
    #[serde(default)]
    pub pioneer: Option<UnitId>,
}

impl TileImprovementPlan {
    pub fn new(tile: TilePos, improvement: ImprovementKind, value: i32) -> Self {
        Self {
            tile,
            improvement,
            value,
            pioneer: None,
        }
    }

    /// The improvement can still be applied.
    pub fn is_valid(&self, world: &GameState) -> bool {
        world
            .map
            .tile(self.tile)
            .is_some_and(|t| t.can_improve(self.improvement))
    }
}

/// Drops claims held by pioneers that died or moved on to something else.
pub fn release_stale_claims(ai: &mut AiState, world: &GameState) {
    let claims: Vec<(TilePos, UnitId)> = ai
        .colonies
        .values()
        .flat_map(|c| c.plans.iter())
        .filter_map(|p| p.pioneer.map(|unit| (p.tile, unit)))
        .collect();
    for (tile, unit) in claims {
        let still_working = world.unit(unit).is_some()
            && matches!(
                ai.mission(unit),
                Some(Mission::Pioneering { tile: t, .. }) if *t == tile
            );
        if !still_working {
            set_claim(ai, tile, None);
        }
    }
}

/// Sets or clears the pioneer claim on every plan for `tile`.
pub fn set_claim(ai: &mut AiState, tile: TilePos, pioneer: Option<UnitId>) {
    for colony in ai.colonies.values_mut() {
        for plan in colony.plans.iter_mut().filter(|p| p.tile == tile) {
            plan.pioneer = pioneer;
        }
    }
}

/// Tile to best plan across all colonies. The highest value wins; on equal
/// values the plan seen first is kept. Plans that no longer apply are skipped.
pub fn build_tip_map(
    ai: &AiState,
    world: &GameState,
) -> BTreeMap<TilePos, TileImprovementPlan> {
    let mut map: BTreeMap<TilePos, TileImprovementPlan> = BTreeMap::new();
    for plan in ai.colonies.values().flat_map(|c| c.plans.iter()) {
        if !plan.is_valid(world) {
            continue;
        }
        let better = map.get(&plan.tile).map_or(true, |best| plan.value > best.value);
        if better {
            map.insert(plan.tile, plan.clone());
        }
    }
    map
}
