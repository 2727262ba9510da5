//! Settlement labor: the per-colony planner that produces wishes, tile
//! improvement plans and export parcels, and puts colonists to work.

use colony_core::{
    role_goods, Command, GameContent, GameState, GoodsTypeId, ImprovementKind, Location, Role,
    SettlementId, SettlementKind, TilePos, UnitId, UnitState, UnitTypeId,
};
use tracing::debug;

use crate::config::AiConfig;
use crate::context::{AiContext, View};
use crate::tile_plan::TileImprovementPlan;
use crate::types::{AiColony, AiState, WishId};
use crate::wish::{Wish, WishKind};

/// Plans kept per colony.
const MAX_PLANS: usize = 2;
const CLEAR_FOREST_VALUE: i32 = 30;
const PLOW_VALUE: i32 = 40;
const COLONY_TILE_BONUS: i32 = 20;
/// Never ask for more unskilled workers than this at once.
const MAX_WORKER_WISHES: u32 = 2;

/// The labor collaborator the turn loop consults for every owned colony.
pub trait LaborPlanner {
    /// Refreshes wishes, tile-improvement plans and export parcels.
    fn update(
        &self,
        ai: &mut AiState,
        world: &GameState,
        content: &GameContent,
        config: &AiConfig,
        colony: SettlementId,
    );

    /// Moves the colony's workers to the goods it needs.
    fn rearrange(&self, ctx: &mut AiContext<'_>, colony: SettlementId);

    fn is_badly_defended(&self, view: View<'_>, colony: SettlementId) -> bool;
}

/// Demand-driven planner: keeps colonies at a target population, asks for
/// the equipment its plans need and ships surplus to market.
#[derive(Debug, Clone, Copy, Default)]
pub struct DemandPlanner;

impl LaborPlanner for DemandPlanner {
    fn update(
        &self,
        ai: &mut AiState,
        world: &GameState,
        content: &GameContent,
        config: &AiConfig,
        colony: SettlementId,
    ) {
        let Some(settlement) = world.settlement(colony) else {
            return;
        };
        if settlement.owner != ai.faction || settlement.kind != SettlementKind::Colony {
            return;
        }
        let tile = settlement.tile;
        ai.colonies
            .entry(colony)
            .or_insert_with(|| AiColony::new(colony));

        let plans = tile_plans(ai, world, tile);
        let has_plans = !plans.is_empty();
        if let Some(record) = ai.colonies.get_mut(&colony) {
            record.plans = plans;
        }

        let workers = worker_wants(world, content, config, colony);
        reconcile(ai, colony, workers, true);

        let mut goods = Vec::new();
        if has_plans {
            goods.extend(shortfall_want(world, content, config, colony, Role::Pioneer));
        }
        if badly_defended(world, content, colony) {
            goods.extend(shortfall_want(world, content, config, colony, Role::Soldier));
        }
        reconcile(ai, colony, goods, false);

        plan_exports(ai, world, content, config, colony);
    }

    fn rearrange(&self, ctx: &mut AiContext<'_>, colony: SettlementId) {
        let content = ctx.content;
        let workers: Vec<(UnitId, Option<GoodsTypeId>, Option<GoodsTypeId>)> = ctx
            .world
            .live_units()
            .filter(|u| u.working_in == Some(colony))
            .map(|u| {
                let expert = content
                    .unit_type(&u.unit_type)
                    .and_then(|d| d.expert_goods.clone());
                (u.id, expert, u.work_goods.clone())
            })
            .collect();
        let mut unskilled = 0usize;
        for (unit, expert, current) in workers {
            let goods_type = expert.unwrap_or_else(|| {
                unskilled += 1;
                if unskilled % 2 == 1 {
                    content.constants.default_work_goods.clone()
                } else {
                    ctx.config.cash_goods.clone()
                }
            });
            if current.as_ref() == Some(&goods_type) {
                continue;
            }
            if let Err(err) = ctx.submit(Command::AssignWork { unit, goods_type }) {
                debug!(unit = %unit, %err, "work assignment refused");
            }
        }
    }

    fn is_badly_defended(&self, view: View<'_>, colony: SettlementId) -> bool {
        badly_defended(view.world, view.content, colony)
    }
}

// ---------------------------------------------------------------------------
// Defence
// ---------------------------------------------------------------------------

fn is_defender(content: &GameContent, unit: &UnitState) -> bool {
    let Some(def) = content.unit_type(&unit.unit_type) else {
        return false;
    };
    !def.naval && (unit.role.is_armed() || def.offence > 0)
}

/// Armed units of the owner standing in the settlement, not counting its
/// workers.
pub fn defenders(world: &GameState, content: &GameContent, settlement: SettlementId) -> u32 {
    let Some(s) = world.settlement(settlement) else {
        return 0;
    };
    world
        .units_at(Location::Tile(s.tile))
        .filter(|u| u.owner == s.owner && u.working_in != Some(settlement))
        .filter(|u| is_defender(content, u))
        .count() as u32
}

/// One defender, plus one for every four colonists.
pub fn badly_defended(world: &GameState, content: &GameContent, settlement: SettlementId) -> bool {
    if world.settlement(settlement).is_none() {
        return false;
    }
    defenders(world, content, settlement) < 1 + world.population(settlement) / 4
}

// ---------------------------------------------------------------------------
// Wishes
// ---------------------------------------------------------------------------

fn farmer_type(content: &GameContent) -> Option<&UnitTypeId> {
    let food = &content.constants.default_work_goods;
    content
        .unit_types
        .values()
        .find(|d| d.colonist && d.expert_goods.as_ref() == Some(food))
        .map(|d| &d.id)
}

fn worker_wants(
    world: &GameState,
    content: &GameContent,
    config: &AiConfig,
    colony: SettlementId,
) -> Vec<(WishKind, i32)> {
    let deficit = config
        .target_population
        .saturating_sub(world.population(colony));
    let mut wants = Vec::new();
    if deficit == 0 {
        return wants;
    }
    let food = &content.constants.default_work_goods;
    let has_farmer = world.live_units().any(|u| {
        u.working_in == Some(colony)
            && content
                .unit_type(&u.unit_type)
                .is_some_and(|d| d.expert_goods.as_ref() == Some(food))
    });
    if let (false, Some(farmer)) = (has_farmer, farmer_type(content)) {
        wants.push((
            WishKind::Worker {
                unit_type: farmer.clone(),
                expert_required: true,
            },
            config.expert_worker_wish_value,
        ));
    }
    let workers = (deficit - wants.len() as u32).min(MAX_WORKER_WISHES);
    for _ in 0..workers {
        wants.push((
            WishKind::Worker {
                unit_type: config.default_worker_type.clone(),
                expert_required: false,
            },
            config.worker_wish_value,
        ));
    }
    wants
}

/// Goods wishes for whatever a full `role` kit needs and the store lacks.
fn shortfall_want(
    world: &GameState,
    content: &GameContent,
    config: &AiConfig,
    colony: SettlementId,
    role: Role,
) -> Vec<(WishKind, i32)> {
    let uses = content.role(role).map_or(1, |r| r.max_uses);
    role_goods(content, role, uses)
        .into_iter()
        .filter(|(goods, amount)| world.settlement_goods(colony, goods) < *amount)
        .map(|(goods_type, amount)| {
            (
                WishKind::Goods { goods_type, amount },
                config.goods_wish_value,
            )
        })
        .collect()
}

fn same_request(a: &WishKind, b: &WishKind) -> bool {
    match (a, b) {
        (WishKind::Worker { unit_type: x, .. }, WishKind::Worker { unit_type: y, .. }) => x == y,
        (WishKind::Goods { goods_type: x, .. }, WishKind::Goods { goods_type: y, .. }) => x == y,
        _ => false,
    }
}

/// Matches fresh wants against the colony's existing wishes of one kind.
/// Matched wishes keep their id, binding and grown value; open wishes that
/// are no longer wanted are dropped.
fn reconcile(ai: &mut AiState, colony: SettlementId, wants: Vec<(WishKind, i32)>, worker: bool) {
    let mut unmatched: Vec<WishId> = ai
        .colonies
        .get(&colony)
        .map(|c| c.wishes.clone())
        .unwrap_or_default()
        .into_iter()
        .filter(|id| {
            ai.wishes
                .get(id)
                .is_some_and(|w| matches!(w.kind, WishKind::Worker { .. }) == worker)
        })
        .collect();

    for (kind, value) in wants {
        let found = unmatched.iter().position(|id| {
            ai.wishes
                .get(id)
                .is_some_and(|w| same_request(&w.kind, &kind))
        });
        if let Some(i) = found {
            let id = unmatched.remove(i);
            if let Some(wish) = ai.wishes.get_mut(&id) {
                wish.kind = kind;
                wish.value = wish.value.max(value);
            }
            continue;
        }
        let id = ai.next_wish_id();
        ai.wishes.insert(
            id,
            Wish {
                id,
                destination: colony,
                value,
                transportable: None,
                kind,
            },
        );
        if let Some(record) = ai.colonies.get_mut(&colony) {
            record.wishes.push(id);
        }
    }

    for id in unmatched {
        if ai.wishes.get(&id).is_some_and(Wish::is_open) {
            ai.wishes.remove(&id);
            if let Some(record) = ai.colonies.get_mut(&colony) {
                record.wishes.retain(|w| *w != id);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tile plans
// ---------------------------------------------------------------------------

/// Best improvements on the colony tile and its neighbours. Claims held on
/// an unchanged plan carry over.
fn tile_plans(ai: &AiState, world: &GameState, centre: TilePos) -> Vec<TileImprovementPlan> {
    let faction = ai.faction;
    let mut plans: Vec<TileImprovementPlan> = std::iter::once(centre)
        .chain(world.map.neighbours(centre))
        .filter_map(|pos| {
            let tile = world.map.tile(pos)?;
            if !tile.terrain.is_land() || tile.owner.is_some_and(|o| o != faction) {
                return None;
            }
            let (improvement, value) = if tile.can_improve(ImprovementKind::ClearForest) {
                (ImprovementKind::ClearForest, CLEAR_FOREST_VALUE)
            } else if tile.can_improve(ImprovementKind::Plow) {
                let bonus = if pos == centre { COLONY_TILE_BONUS } else { 0 };
                (ImprovementKind::Plow, PLOW_VALUE + bonus)
            } else {
                return None;
            };
            Some(TileImprovementPlan::new(pos, improvement, value))
        })
        .collect();
    plans.sort_by(|a, b| b.value.cmp(&a.value).then(a.tile.cmp(&b.tile)));
    plans.truncate(MAX_PLANS);

    let previous = ai.colonies.values().flat_map(|c| c.plans.iter());
    let claims: Vec<&TileImprovementPlan> = previous.filter(|p| p.pioneer.is_some()).collect();
    for plan in &mut plans {
        plan.pioneer = claims
            .iter()
            .find(|old| old.tile == plan.tile && old.improvement == plan.improvement)
            .and_then(|old| old.pioneer);
    }
    plans
}

// ---------------------------------------------------------------------------
// Exports
// ---------------------------------------------------------------------------

/// Surplus non-food goods at a port colony become parcels bound for Europe.
/// Parcels still waiting in the store shrink with it.
fn plan_exports(
    ai: &mut AiState,
    world: &GameState,
    content: &GameContent,
    config: &AiConfig,
    colony: SettlementId,
) {
    let Some(settlement) = world.settlement(colony) else {
        return;
    };
    let here = Location::Tile(settlement.tile);

    let waiting: Vec<_> = ai
        .goods
        .values()
        .filter(|p| p.location == here && p.wish.is_none() && p.transport.is_none())
        .map(|p| (p.id, p.goods_type.clone()))
        .collect();
    for (id, goods_type) in waiting {
        let stock = world.settlement_goods(colony, &goods_type);
        if stock == 0 {
            ai.goods.remove(&id);
        } else if let Some(parcel) = ai.goods.get_mut(&id) {
            parcel.amount = parcel.amount.min(stock);
        }
    }

    if !world.map.is_connected_port(settlement.tile) {
        return;
    }
    let wanted: Vec<GoodsTypeId> = ai
        .colonies
        .get(&colony)
        .into_iter()
        .flat_map(|c| c.wishes.iter())
        .filter_map(|id| match &ai.wishes.get(id)?.kind {
            WishKind::Goods { goods_type, .. } => Some(goods_type.clone()),
            WishKind::Worker { .. } => None,
        })
        .collect();
    for goods in content.goods_types.iter().filter(|g| !g.food) {
        let stock = world.settlement_goods(colony, &goods.id);
        if stock < config.export_threshold || wanted.contains(&goods.id) {
            continue;
        }
        let pending = ai
            .goods
            .values()
            .any(|p| p.goods_type == goods.id && p.location == here && p.wish.is_none());
        if pending {
            continue;
        }
        let amount = stock.min(content.constants.goods_per_slot);
        ai.add_goods(goods.id.clone(), amount, here, Some(Location::Europe));
    }
}
