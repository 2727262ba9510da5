//! `colony_ai` — turn-based decision engine for computer-controlled factions.
//!
//! Each turn, for each AI faction, the engine keeps its own registry of unit
//! missions, goods parcels, colony wishes and tile-improvement plans in line
//! with the world, hands out missions, matches waiting units and goods with
//! carriers, and steps every mission. The world is only ever changed through
//! `colony_core::execute`.

mod bootstrap;
mod broker;
mod cargo;
mod config;
mod context;
mod labor;
pub mod mission;
pub mod persist;
mod scratch;
mod selector;
mod stance;
mod targets;
mod tile_plan;
mod transportable;
mod turn;
mod types;
mod wish;

pub use broker::{allocate, urgent_count, urgent_subset, Allocation};
pub use cargo::{Cargo, CargoMode, CargoPlan, PlanError, MAX_TRY};
pub use config::AiConfig;
pub use context::{AiContext, View};
pub use labor::{badly_defended, defenders, DemandPlanner, LaborPlanner};
pub use mission::{Mission, MissionKind, SeekTarget, StepOutcome, TransportMission};
pub use scratch::TurnScratch;
pub use selector::{
    builders_needed, change_mission, grant_missions, pioneers_needed, quota_phase, scouts_needed,
    Quotas,
};
pub use stance::{desired_stance, determine_stances, treaty_hold_percent};
pub use tile_plan::TileImprovementPlan;
pub use turn::{do_missions, faction_turn, sync_registry, AiController, TurnReport};
pub use types::{AiColony, AiGoods, AiState, AiUnit, GoodsId, TransportableId, WishId};
pub use wish::{Wish, WishError, WishIndex, WishKind};

#[cfg(test)]
mod tests;
