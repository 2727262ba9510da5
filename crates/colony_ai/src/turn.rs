//! The per-faction turn loop and the controller that runs it for every
//! computer faction.

use std::collections::{BTreeMap, VecDeque};
use std::panic::{catch_unwind, AssertUnwindSafe};

use colony_core::{
    EventEnvelope, FactionId, GameContent, GameState, Location, SettlementId, UnitId,
};
use rand::RngCore;
use tracing::{debug, error, info};

use crate::bootstrap;
use crate::broker::{allocate, urgent_subset};
use crate::config::AiConfig;
use crate::context::AiContext;
use crate::labor::{DemandPlanner, LaborPlanner};
use crate::mission::{remove_transportable, transport_mission, Mission, StepOutcome};
use crate::scratch::TurnScratch;
use crate::selector::{change_mission, grant_missions, update_transport};
use crate::stance::determine_stances;
use crate::tile_plan::{build_tip_map, release_stale_claims};
use crate::types::{AiState, AiUnit, TransportableId};
use crate::wish::{complete_wish, grow_wishes, release_bound, wishes, WishIndex, WishKind};

/// What one faction did with its turn.
#[derive(Debug, Clone)]
pub struct TurnReport {
    pub faction: FactionId,
    pub passes: u32,
    pub missions_granted: u32,
    pub transport_allocations: u32,
    pub events: Vec<EventEnvelope>,
}

/// Runs the AI for every computer-controlled faction.
pub struct AiController {
    config: AiConfig,
    states: BTreeMap<FactionId, AiState>,
    planner: Box<dyn LaborPlanner>,
}

impl AiController {
    pub fn new(config: AiConfig) -> Self {
        Self::with_planner(config, Box::new(DemandPlanner))
    }

    pub fn with_planner(config: AiConfig, planner: Box<dyn LaborPlanner>) -> Self {
        Self {
            config,
            states: BTreeMap::new(),
            planner,
        }
    }

    pub fn config(&self) -> &AiConfig {
        &self.config
    }

    pub fn state(&self, faction: FactionId) -> Option<&AiState> {
        self.states.get(&faction)
    }

    pub fn states(&self) -> impl Iterator<Item = &AiState> {
        self.states.values()
    }

    /// Installs a restored registry for its faction.
    pub fn insert_state(&mut self, state: AiState) {
        self.states.insert(state.faction, state);
    }

    /// One turn for every live AI faction, in faction id order.
    pub fn run_turn(
        &mut self,
        world: &mut GameState,
        content: &GameContent,
        rng: &mut dyn RngCore,
    ) -> Vec<TurnReport> {
        let factions: Vec<FactionId> = world
            .factions
            .values()
            .filter(|f| f.ai && !f.dead)
            .map(|f| f.id)
            .collect();
        factions
            .into_iter()
            .map(|faction| self.run_faction_turn(world, content, faction, rng))
            .collect()
    }

    /// Runs one faction's turn to completion.
    pub fn run_faction_turn(
        &mut self,
        world: &mut GameState,
        content: &GameContent,
        faction: FactionId,
        rng: &mut dyn RngCore,
    ) -> TurnReport {
        let mut ai = self
            .states
            .remove(&faction)
            .unwrap_or_else(|| AiState::new(faction));
        let mut scratch = TurnScratch::default();
        let mut events = Vec::new();
        let mut report = TurnReport {
            faction,
            passes: 0,
            missions_granted: 0,
            transport_allocations: 0,
            events: Vec::new(),
        };
        {
            let mut ctx = AiContext {
                world,
                content,
                config: &self.config,
                ai: &mut ai,
                scratch: &mut scratch,
                rng,
                events: &mut events,
            };
            faction_turn(&mut ctx, self.planner.as_ref(), &mut report);
        }
        self.states.insert(faction, ai);
        report.events = events;
        info!(
            faction = %faction,
            turn = world.meta.turn,
            passes = report.passes,
            granted = report.missions_granted,
            allocated = report.transport_allocations,
            "ai turn finished"
        );
        report
    }
}

// ---------------------------------------------------------------------------
// Turn steps
// ---------------------------------------------------------------------------

/// The full turn: bookkeeping, then up to `max_passes` rounds of mission
/// selection, transport allocation and mission execution.
pub fn faction_turn(ctx: &mut AiContext<'_>, planner: &dyn LaborPlanner, report: &mut TurnReport) {
    sync_registry(ctx);
    determine_stances(ctx);

    for colony in own_colonies(ctx) {
        planner.update(ctx.ai, ctx.world, ctx.content, ctx.config, colony);
    }
    release_stale_claims(ctx.ai, ctx.world);
    ctx.scratch.tip_map = build_tip_map(ctx.ai, ctx.world);
    ctx.scratch.wishes = WishIndex::rebuild(ctx.ai, ctx.world);
    grow_wishes(ctx.ai, ctx.config);

    bootstrap::apply(ctx);
    sync_registry(ctx);
    survey_transport(ctx);

    let mut quiet_passes = 0;
    for _ in 0..ctx.config.max_passes {
        report.passes += 1;
        for colony in own_colonies(ctx) {
            planner.rearrange(ctx, colony);
        }
        let granted = grant_missions(ctx, planner);
        report.missions_granted += granted;
        report.transport_allocations += allocate_transport(ctx);

        let active = do_missions(ctx);
        if active == 0 {
            break;
        }
        quiet_passes = if granted == 0 { quiet_passes + 1 } else { 0 };
        if quiet_passes >= 2 && !any_moves_left(ctx) {
            break;
        }
    }
}

fn own_colonies(ctx: &AiContext<'_>) -> Vec<SettlementId> {
    ctx.world.colonies_of(ctx.ai.faction).map(|s| s.id).collect()
}

fn any_moves_left(ctx: &AiContext<'_>) -> bool {
    ctx.world
        .faction_units(ctx.ai.faction)
        .any(|u| u.moves_left > 0 && u.voyage.is_none())
}

/// Brings the registry in line with the world: new units get a record,
/// dead ones are disposed, records of lost colonies go with their wishes.
pub fn sync_registry(ctx: &mut AiContext<'_>) {
    let faction = ctx.ai.faction;
    let live: Vec<UnitId> = ctx.world.faction_units(faction).map(|u| u.id).collect();
    for unit in &live {
        ctx.ai
            .units
            .entry(*unit)
            .or_insert_with(|| AiUnit::new(*unit));
    }
    let dead: Vec<UnitId> = ctx
        .ai
        .units
        .keys()
        .copied()
        .filter(|u| ctx.world.unit(*u).map_or(true, |s| s.owner != faction))
        .collect();
    for unit in dead {
        dispose_ai_unit(ctx, unit);
    }

    let lost: Vec<SettlementId> = ctx
        .ai
        .colonies
        .keys()
        .copied()
        .filter(|c| ctx.world.settlement(*c).map_or(true, |s| s.owner != faction))
        .collect();
    for colony in lost {
        debug!(faction = %faction, colony = %colony, "colony record dropped");
        ctx.ai.colonies.remove(&colony);
    }
    let orphaned: Vec<_> = ctx
        .ai
        .wishes
        .values()
        .filter(|w| !ctx.ai.colonies.contains_key(&w.destination))
        .map(|w| w.id)
        .collect();
    for wish in orphaned {
        complete_wish(ctx.ai, &mut ctx.scratch.wishes, wish);
    }

    let stranded: Vec<_> = ctx
        .ai
        .goods
        .values()
        .filter(|g| match g.location {
            Location::Aboard(carrier) => ctx.world.unit(carrier).is_none(),
            _ => false,
        })
        .map(|g| g.id)
        .collect();
    for id in stranded {
        let t = TransportableId::Goods(id);
        release_bound(ctx.ai, &mut ctx.scratch.wishes, ctx.world, t);
        ctx.ai.goods.remove(&id);
    }
}

/// Removes a unit's record and everything that refers to it.
pub fn dispose_ai_unit(ctx: &mut AiContext<'_>, unit: UnitId) {
    let t = TransportableId::Unit(unit);
    if let Some(carrier) = t.assigned_transport(ctx.ai) {
        remove_transportable(ctx, carrier, t);
    }
    let Some(record) = ctx.ai.units.remove(&unit) else {
        return;
    };
    if let Some(mission) = &record.mission {
        mission.dispose(ctx, unit);
    }
    release_bound(ctx.ai, &mut ctx.scratch.wishes, ctx.world, t);

    for other in ctx.ai.units.values_mut() {
        if other.transport == Some(unit) {
            other.transport = None;
        }
    }
    for goods in ctx.ai.goods.values_mut() {
        if goods.transport == Some(unit) {
            goods.transport = None;
        }
    }
    debug!(unit = %unit, "unit record disposed");
}

/// Collects who wants a carrier and how many carriers each landmass needs.
fn survey_transport(ctx: &mut AiContext<'_>) {
    let view = ctx.view();
    let mut supply: Vec<TransportableId> = view
        .ai
        .units
        .keys()
        .map(|u| TransportableId::Unit(*u))
        .chain(view.ai.goods.keys().map(|g| TransportableId::Goods(*g)))
        .filter(|t| {
            !t.is_disposed(view)
                && t.assigned_transport(view.ai).is_none()
                && t.transport_destination(view).is_some()
        })
        .collect();
    supply.sort();
    let demand: Vec<_> = wishes(view)
        .into_iter()
        .filter(|w| matches!(w.kind, WishKind::Goods { .. }))
        .map(|w| w.id)
        .collect();

    let mut waiting: BTreeMap<u32, u32> = BTreeMap::new();
    for t in &supply {
        let region = t
            .map_location(view)
            .and_then(Location::tile)
            .and_then(|p| view.world.map.region(p))
            .unwrap_or(0);
        *waiting.entry(region).or_default() += 1;
    }
    let carriers = view
        .ai
        .units
        .keys()
        .filter(|u| transport_mission(view.ai, **u).is_some())
        .count() as u32;

    for t in &supply {
        t.bump_priority(ctx.ai, ctx.config.transport_priority_step);
    }
    ctx.scratch.carriers_needed = waiting
        .into_iter()
        .map(|(region, count)| (region, (count + 1) / 2))
        .collect();
    let needed = ctx.scratch.carriers_needed_total();
    ctx.ai.carrier_shortfall = needed > carriers;
    ctx.scratch.transport_supply = supply;
    ctx.scratch.transport_demand = demand;
}

/// Offers the most urgent waiting transportables to the faction's carriers.
fn allocate_transport(ctx: &mut AiContext<'_>) -> u32 {
    let view = ctx.view();
    let waiting: Vec<TransportableId> = view
        .scratch
        .transport_supply
        .iter()
        .copied()
        .filter(|t| !t.is_disposed(view) && t.assigned_transport(view.ai).is_none())
        .collect();
    if waiting.is_empty() {
        return 0;
    }
    let carriers: Vec<UnitId> = view
        .ai
        .units
        .keys()
        .copied()
        .filter(|u| transport_mission(view.ai, *u).is_some())
        .collect();
    let urgent = urgent_subset(view, &waiting);
    allocate(ctx, &urgent, &carriers).len() as u32
}

// ---------------------------------------------------------------------------
// Mission execution
// ---------------------------------------------------------------------------

fn has_moves(ctx: &AiContext<'_>, unit: UnitId) -> bool {
    let Some(state) = ctx.world.unit(unit) else {
        return false;
    };
    if state.moves_left == 0 {
        return false;
    }
    match state.location.carrier() {
        Some(carrier) => ctx.world.unit(carrier).is_some_and(|c| c.moves_left > 0),
        None => true,
    }
}

/// Steps every unit's mission until it runs out of moves, goes idle or
/// exhausts its step allowance for the pass. Returns how many units want
/// another pass: those cut off by the allowance with moves still left, and
/// those whose mission ended while they could still act.
pub fn do_missions(ctx: &mut AiContext<'_>) -> u32 {
    let mut queue: VecDeque<(UnitId, u32)> = ctx
        .ai
        .units
        .values()
        .filter(|u| u.has_mission())
        .map(|u| (u.unit, 0))
        .collect();
    let mut active = 0;

    while let Some((unit, steps)) = queue.pop_front() {
        if ctx.world.unit(unit).is_none() {
            dispose_ai_unit(ctx, unit);
            continue;
        }
        let Some(mut mission) = ctx.ai.units.get_mut(&unit).and_then(|u| u.mission.take()) else {
            continue;
        };
        let old_target = mission.target(ctx.view());
        let stepped = catch_unwind(AssertUnwindSafe(|| mission.do_step(ctx, unit)));
        restore_mission(ctx, unit, mission);

        let outcome = match stepped {
            Ok(outcome) => outcome,
            Err(_) => {
                error!(unit = %unit, "mission step panicked; mission discarded");
                change_mission(ctx, unit, None);
                if has_moves(ctx, unit) {
                    active += 1;
                }
                continue;
            }
        };
        if ctx.world.unit(unit).is_none() {
            dispose_ai_unit(ctx, unit);
            continue;
        }
        if outcome == StepOutcome::Done {
            debug!(unit = %unit, "mission complete");
            change_mission(ctx, unit, None);
            if has_moves(ctx, unit) {
                active += 1;
            }
            continue;
        }
        update_transport(ctx, unit, old_target);
        if outcome == StepOutcome::Progress && has_moves(ctx, unit) {
            if steps + 1 < ctx.config.max_steps_per_pass {
                queue.push_back((unit, steps + 1));
            } else {
                active += 1;
            }
        }
    }
    active
}

fn restore_mission(ctx: &mut AiContext<'_>, unit: UnitId, mission: Mission) {
    if let Some(record) = ctx.ai.units.get_mut(&unit) {
        if record.mission.is_none() {
            record.mission = Some(mission);
        }
    }
}
