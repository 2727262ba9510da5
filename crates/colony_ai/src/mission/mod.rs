//! Unit missions: a closed set of standing goals, one per unit at most.
//!
//! A mission is re-validated every pass (`invalid_reason`) and advanced one
//! step at a time (`do_step`). Stepping may move the unit, board or leave a
//! carrier, attack, or hand the unit over to a colony. All world effects go
//! through `AiContext::submit`.

mod colonial;
mod military;
mod native;
mod transport;
mod travel;

use colony_core::{
    FactionKind, ImprovementKind, Location, Role, SettlementId, SettlementKind, TilePos, UnitId,
};
use serde::{Deserialize, Serialize};

use crate::context::{AiContext, View};
use crate::tile_plan::set_claim;
use crate::types::{TransportableId, WishId};
use crate::wish::release_wish;

pub use transport::{
    dump_transportable, queue_transportable, remove_transportable, transport_mission,
    TransportMission,
};
pub use travel::{travel_to, MoveOutcome};

/// What a seek-and-destroy mission is hunting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id")]
pub enum SeekTarget {
    Unit(UnitId),
    Settlement(SettlementId),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Mission {
    BuildColony {
        target: TilePos,
        value: i64,
    },
    Transport(TransportMission),
    Privateer {
        target: UnitId,
    },
    Scouting {
        target: TilePos,
    },
    Pioneering {
        tile: TilePos,
        improvement: ImprovementKind,
    },
    Missionary {
        settlement: SettlementId,
    },
    DefendSettlement {
        settlement: SettlementId,
    },
    SeekAndDestroy {
        target: SeekTarget,
        range: u32,
    },
    CashInTreasureTrain {
        target: TilePos,
    },
    WishRealization {
        wish: WishId,
        settlement: SettlementId,
    },
    WorkInsideColony {
        settlement: SettlementId,
    },
    WanderHostile,
    IdleAtSettlement {
        #[serde(default)]
        settlement: Option<SettlementId>,
    },
    IndianBringGift {
        home: SettlementId,
        colony: SettlementId,
        #[serde(default)]
        collected: bool,
    },
    IndianDemand {
        home: SettlementId,
        colony: SettlementId,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum MissionKind {
    BuildColony,
    Transport,
    Privateer,
    Scouting,
    Pioneering,
    Missionary,
    DefendSettlement,
    SeekAndDestroy,
    CashInTreasureTrain,
    WishRealization,
    WorkInsideColony,
    WanderHostile,
    IdleAtSettlement,
    IndianBringGift,
    IndianDemand,
}

/// Result of one mission step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// Something happened; the unit may act again this turn.
    Progress,
    /// Nothing more to do until next turn.
    Idle,
    /// The mission is finished and should be disposed.
    Done,
}

fn settlement_tile(view: View<'_>, id: SettlementId) -> Option<Location> {
    view.world.settlement(id).map(|s| Location::Tile(s.tile))
}

impl Mission {
    pub fn kind(&self) -> MissionKind {
        match self {
            Mission::BuildColony { .. } => MissionKind::BuildColony,
            Mission::Transport(_) => MissionKind::Transport,
            Mission::Privateer { .. } => MissionKind::Privateer,
            Mission::Scouting { .. } => MissionKind::Scouting,
            Mission::Pioneering { .. } => MissionKind::Pioneering,
            Mission::Missionary { .. } => MissionKind::Missionary,
            Mission::DefendSettlement { .. } => MissionKind::DefendSettlement,
            Mission::SeekAndDestroy { .. } => MissionKind::SeekAndDestroy,
            Mission::CashInTreasureTrain { .. } => MissionKind::CashInTreasureTrain,
            Mission::WishRealization { .. } => MissionKind::WishRealization,
            Mission::WorkInsideColony { .. } => MissionKind::WorkInsideColony,
            Mission::WanderHostile => MissionKind::WanderHostile,
            Mission::IdleAtSettlement { .. } => MissionKind::IdleAtSettlement,
            Mission::IndianBringGift { .. } => MissionKind::IndianBringGift,
            Mission::IndianDemand { .. } => MissionKind::IndianDemand,
        }
    }

    /// Where the mission wants the unit to be. `None` for missions without a
    /// fixed destination.
    pub fn target(&self, view: View<'_>) -> Option<Location> {
        match self {
            Mission::BuildColony { target, .. }
            | Mission::Scouting { target }
            | Mission::CashInTreasureTrain { target } => Some(Location::Tile(*target)),
            Mission::Pioneering { tile, .. } => Some(Location::Tile(*tile)),
            Mission::Transport(tm) => tm.target,
            Mission::Privateer { target } => view.world.unit_map_location(*target),
            Mission::Missionary { settlement }
            | Mission::DefendSettlement { settlement }
            | Mission::WishRealization { settlement, .. }
            | Mission::WorkInsideColony { settlement } => settlement_tile(view, *settlement),
            Mission::SeekAndDestroy { target, .. } => match target {
                SeekTarget::Unit(unit) => view.world.unit_map_location(*unit),
                SeekTarget::Settlement(s) => settlement_tile(view, *s),
            },
            Mission::WanderHostile => None,
            Mission::IdleAtSettlement { settlement } => {
                settlement.and_then(|s| settlement_tile(view, s))
            }
            Mission::IndianBringGift {
                home,
                colony,
                collected,
            } => settlement_tile(view, if *collected { *colony } else { *home }),
            Mission::IndianDemand { colony, .. } => settlement_tile(view, *colony),
        }
    }

    /// Priority a unit on this mission starts from when it asks for transport.
    pub fn base_transport_priority(&self) -> i32 {
        match self.kind() {
            MissionKind::CashInTreasureTrain => 90,
            MissionKind::WishRealization => 80,
            MissionKind::WorkInsideColony => 70,
            MissionKind::DefendSettlement => 60,
            MissionKind::BuildColony => 50,
            MissionKind::Pioneering => 40,
            MissionKind::Scouting | MissionKind::Missionary => 30,
            MissionKind::SeekAndDestroy => 20,
            _ => 0,
        }
    }

    /// One-time missions are not carried across a save.
    pub fn is_one_time(&self) -> bool {
        matches!(
            self.kind(),
            MissionKind::WishRealization | MissionKind::IndianBringGift | MissionKind::IndianDemand
        )
    }

    /// Why the mission can no longer be carried out by `unit`, if it can't.
    #[allow(clippy::too_many_lines)]
    pub fn invalid_reason(&self, view: View<'_>, unit: UnitId) -> Option<&'static str> {
        let world = view.world;
        let Some(state) = world.unit(unit) else {
            return Some("unit-disposed");
        };
        let Some(def) = view.content.unit_type(&state.unit_type) else {
            return Some("unit-type-unknown");
        };
        let owner = state.owner;
        let owned_colony = |id: SettlementId| {
            world
                .settlement(id)
                .is_some_and(|s| s.owner == owner && s.kind == SettlementKind::Colony)
        };
        match self {
            Mission::BuildColony { target, .. } => {
                if !def.colonist {
                    return Some("unit-not-colonist");
                }
                let Some(tile) = world.map.tile(*target) else {
                    return Some("target-off-map");
                };
                if !tile.terrain.is_land() || tile.owner.is_some_and(|o| o != owner) {
                    return Some("target-claimed");
                }
                let crowded = std::iter::once(*target)
                    .chain(world.map.neighbours(*target))
                    .any(|p| world.settlement_at(p).is_some());
                crowded.then_some("target-crowded")
            }
            Mission::Transport(_) => (def.space == 0).then_some("unit-not-carrier"),
            Mission::Privateer { target } => {
                if !def.can_raid {
                    return Some("unit-cannot-raid");
                }
                let prey = world.unit(*target);
                let hunted = prey.is_some_and(|p| {
                    world.at_war(owner, p.owner)
                        && p.location.tile().is_some_and(|t| world.map.is_water(t))
                });
                (!hunted).then_some("target-gone")
            }
            Mission::Scouting { target } => {
                if state.role != Role::Scout {
                    return Some("unit-not-scout");
                }
                let rumour = world.map.tile(*target).is_some_and(|t| t.rumour);
                let village = world.settlement_at(*target).is_some_and(|s| {
                    s.kind == SettlementKind::Native && !s.visited_by.contains(&owner)
                });
                (!rumour && !village).then_some("target-explored")
            }
            Mission::Pioneering { tile, improvement } => {
                if state.work.is_some() {
                    return None;
                }
                if state.role != Role::Pioneer || state.role_uses == 0 {
                    return Some("unit-not-pioneer");
                }
                let applies = world.map.tile(*tile).is_some_and(|t| {
                    t.can_improve(*improvement) && t.owner.map_or(true, |o| o == owner)
                });
                (!applies).then_some("improvement-done")
            }
            Mission::Missionary { settlement } => {
                if state.role != Role::Missionary {
                    return Some("unit-not-missionary");
                }
                let open = world.settlement(*settlement).is_some_and(|s| {
                    s.kind == SettlementKind::Native
                        && s.missionary.is_none()
                        && !world.at_war(owner, s.owner)
                });
                (!open).then_some("target-unavailable")
            }
            Mission::DefendSettlement { settlement } => {
                let ours = world.settlement(*settlement).is_some_and(|s| s.owner == owner);
                (!ours).then_some("settlement-lost")
            }
            Mission::SeekAndDestroy { target, .. } => {
                if def.offence == 0 && !state.role.is_armed() {
                    return Some("unit-not-offensive");
                }
                let enemy = match target {
                    SeekTarget::Unit(u) => world.unit(*u).map(|u| u.owner),
                    SeekTarget::Settlement(s) => world.settlement(*s).map(|s| s.owner),
                };
                (!enemy.is_some_and(|e| world.at_war(owner, e))).then_some("target-gone")
            }
            Mission::CashInTreasureTrain { target } => {
                if !def.treasure_train || state.treasure == 0 {
                    return Some("no-treasure");
                }
                let port = world
                    .settlement_at(*target)
                    .is_some_and(|s| s.owner == owner && s.kind == SettlementKind::Colony)
                    && world.map.is_connected_port(*target);
                (!port).then_some("target-not-port")
            }
            Mission::WishRealization { wish, settlement } => {
                let bound = view.ai.wishes.get(wish).is_some_and(|w| {
                    w.destination == *settlement
                        && w.transportable == Some(TransportableId::Unit(unit))
                });
                if !bound {
                    return Some("wish-gone");
                }
                (!owned_colony(*settlement)).then_some("settlement-lost")
            }
            Mission::WorkInsideColony { settlement } => {
                if !def.colonist {
                    return Some("unit-not-colonist");
                }
                (!owned_colony(*settlement)).then_some("settlement-lost")
            }
            Mission::WanderHostile => None,
            Mission::IdleAtSettlement { settlement } => settlement.and_then(|s| {
                let ours = world.settlement(s).is_some_and(|s| s.owner == owner);
                (!ours).then_some("settlement-lost")
            }),
            Mission::IndianBringGift { home, colony, .. }
            | Mission::IndianDemand { home, colony } => {
                let native = world
                    .factions
                    .get(&owner)
                    .is_some_and(|f| f.kind == FactionKind::Native);
                if !native {
                    return Some("unit-not-native");
                }
                let home_ok = world.settlement(*home).is_some_and(|s| s.owner == owner);
                let visited = world.settlement(*colony).map(|s| s.owner);
                match visited {
                    Some(other) if home_ok && other != owner && !world.at_war(owner, other) => None,
                    _ => Some("target-unavailable"),
                }
            }
        }
    }

    /// Releases whatever the mission holds: bound wishes, pioneer claims and
    /// transport assignments of queued cargo.
    pub fn dispose(&self, ctx: &mut AiContext<'_>, unit: UnitId) {
        match self {
            Mission::WishRealization { wish, .. } => {
                release_wish(ctx.ai, &mut ctx.scratch.wishes, ctx.world, *wish);
            }
            Mission::Pioneering { tile, .. } => {
                set_claim(ctx.ai, *tile, None);
                if let Some(plan) = ctx.scratch.tip_map.get_mut(tile) {
                    if plan.pioneer == Some(unit) {
                        plan.pioneer = None;
                    }
                }
            }
            Mission::Transport(tm) => {
                for cargo in &tm.cargoes {
                    for t in cargo.transportables() {
                        if t.assigned_transport(ctx.ai) == Some(unit) {
                            t.set_transport(ctx.ai, None);
                        }
                    }
                }
            }
            _ => {}
        }
    }

    /// Advances the mission by one step.
    pub fn do_step(&mut self, ctx: &mut AiContext<'_>, unit: UnitId) -> StepOutcome {
        match self {
            Mission::BuildColony { target, .. } => colonial::build_colony(ctx, unit, *target),
            Mission::Transport(tm) => tm.step(ctx, unit),
            Mission::Privateer { target } => military::privateer(ctx, unit, target),
            Mission::Scouting { target } => colonial::scout(ctx, unit, *target),
            Mission::Pioneering { tile, improvement } => {
                colonial::pioneer(ctx, unit, *tile, *improvement)
            }
            Mission::Missionary { settlement } => colonial::missionary(ctx, unit, *settlement),
            Mission::DefendSettlement { settlement } => military::defend(ctx, unit, *settlement),
            Mission::SeekAndDestroy { target, .. } => {
                military::seek_and_destroy(ctx, unit, *target)
            }
            Mission::CashInTreasureTrain { target } => colonial::cash_in(ctx, unit, *target),
            Mission::WishRealization { wish, settlement } => {
                colonial::realize_wish(ctx, unit, *wish, *settlement)
            }
            Mission::WorkInsideColony { settlement } => {
                colonial::work_inside(ctx, unit, *settlement)
            }
            Mission::WanderHostile => military::wander(ctx, unit),
            Mission::IdleAtSettlement { settlement } => colonial::idle(ctx, unit, *settlement),
            Mission::IndianBringGift {
                home,
                colony,
                collected,
            } => native::bring_gift(ctx, unit, *home, *colony, collected),
            Mission::IndianDemand { colony, .. } => native::demand(ctx, unit, *colony),
        }
    }
}
