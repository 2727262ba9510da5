use std::collections::BTreeMap;

use ahash::AHashMap;
use colony_core::TilePos;

use crate::tile_plan::TileImprovementPlan;
use crate::types::{TransportableId, WishId};
use crate::wish::WishIndex;

/// Per-turn caches for one faction. Built at the start of its turn and
/// dropped at the end; never shared between factions.
#[derive(Debug, Default)]
pub struct TurnScratch {
    /// Tile to best improvement plan.
    pub tip_map: BTreeMap<TilePos, TileImprovementPlan>,
    pub wishes: WishIndex,
    /// Transportables that want a carrier and have none.
    pub transport_supply: Vec<TransportableId>,
    /// Goods wishes nobody is bringing yet.
    pub transport_demand: Vec<WishId>,
    /// Free carriers still wanted, keyed by landmass region (0 for off-map).
    pub carriers_needed: AHashMap<u32, u32>,
}

impl TurnScratch {
    pub fn carriers_needed_total(&self) -> u32 {
        self.carriers_needed.values().sum()
    }
}
