//! Mission selection.
//!
//! Every pass first drops missions that no longer hold. Colonial factions
//! then run a quota phase that hands out colony building, scouting and
//! pioneering to the best suited idle colonists. Everything still idle walks
//! down a fixed ladder of candidates for its category and takes the first
//! mission whose precondition holds and whose target search succeeds.

use colony_core::{
    equip_cost, offence_power, Command, FactionKind, Location, Role, SettlementId, UnitId,
    UnitTypeId,
};
use tracing::debug;

use crate::context::{AiContext, View};
use crate::labor::LaborPlanner;
use crate::mission::{
    dump_transportable, queue_transportable, remove_transportable, transport_mission, Mission,
    MissionKind, TransportMission,
};
use crate::targets;
use crate::tile_plan::set_claim;
use crate::types::TransportableId;
use crate::wish::{best_worker_wish, consume_worker_wish};

// ---------------------------------------------------------------------------
// Quotas
// ---------------------------------------------------------------------------

/// Missions still to hand out this turn. Negative means oversubscribed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Quotas {
    pub builders: i32,
    pub scouts: i32,
    pub pioneers: i32,
}

impl Quotas {
    pub fn compute(view: View<'_>) -> Self {
        Self {
            builders: builders_needed(view),
            scouts: scouts_needed(view),
            pioneers: pioneers_needed(view),
        }
    }

    fn slot(&mut self, kind: MissionKind) -> Option<&mut i32> {
        match kind {
            MissionKind::BuildColony => Some(&mut self.builders),
            MissionKind::Scouting => Some(&mut self.scouts),
            MissionKind::Pioneering => Some(&mut self.pioneers),
            _ => None,
        }
    }

    /// Counts valid missions already under way against the quotas.
    pub fn survey(&mut self, view: View<'_>) {
        for unit in view.ai.units.values() {
            let Some(mission) = &unit.mission else {
                continue;
            };
            if mission.invalid_reason(view, unit.unit).is_some() {
                continue;
            }
            if let Some(slot) = self.slot(mission.kind()) {
                *slot -= 1;
            }
        }
    }
}

/// Colony builders wanted: a trickle, not a land rush.
///
/// 1. Two while the faction has no colony or no colony with an ocean port.
/// 2. One while it has at most one port and three or more colonists.
/// 3. One while colonies average more than `e` inhabitants.
pub fn builders_needed(view: View<'_>) -> i32 {
    let faction = view.ai.faction;
    let world = view.world;
    let colonies: Vec<SettlementId> = world.colonies_of(faction).map(|s| s.id).collect();
    let ports = world
        .colonies_of(faction)
        .filter(|s| world.map.is_connected_port(s.tile))
        .count();
    if colonies.is_empty() || ports == 0 {
        return 2;
    }
    let settled: u32 = colonies.iter().map(|c| world.population(*c)).sum();
    let waiting = world
        .faction_units(faction)
        .filter(|u| u.location == Location::Europe)
        .filter(|u| {
            view.content
                .unit_type(&u.unit_type)
                .is_some_and(|d| d.colonist)
        })
        .count() as u32;
    if ports <= 1 && settled + waiting >= 3 {
        return 1;
    }
    let average = f64::from(settled) / colonies.len() as f64;
    if average > std::f64::consts::E {
        return 1;
    }
    0
}

/// Roughly one pioneer per two outstanding improvement jobs.
pub fn pioneers_needed(view: View<'_>) -> i32 {
    (view.scratch.tip_map.len() as i32 + 1) / 2
}

/// Scouting matters early and tapers off.
pub fn scouts_needed(view: View<'_>) -> i32 {
    3 - (view.world.meta.turn / 100).min(3) as i32
}

// ---------------------------------------------------------------------------
// Mission bookkeeping
// ---------------------------------------------------------------------------

/// Replaces the unit's mission, disposing the old one first, then reconciles
/// its transport against the new target.
pub fn change_mission(ctx: &mut AiContext<'_>, unit: UnitId, mission: Option<Mission>) {
    let old_target = ctx.ai.mission(unit).and_then(|m| m.target(ctx.view()));
    let old = ctx.ai.units.get_mut(&unit).and_then(|u| u.mission.take());
    if let Some(old) = old {
        old.dispose(ctx, unit);
    }
    if let Some(record) = ctx.ai.units.get_mut(&unit) {
        record.mission = mission;
    }
    update_transport(ctx, unit, old_target);
}

/// Keeps a unit's transport assignment in line with its mission target.
///
/// 1. Aboard a carrier heading elsewhere: the carrier drops it off.
/// 2. Waiting for pickup with nowhere to go: taken off the queue.
/// 3. Otherwise the cargo is re-planned against the new target.
pub fn update_transport(ctx: &mut AiContext<'_>, unit: UnitId, old_target: Option<Location>) {
    let t = TransportableId::Unit(unit);
    let Some(carrier) = t.assigned_transport(ctx.ai) else {
        return;
    };
    let view = ctx.view();
    let new_target = view.ai.mission(unit).and_then(|m| m.target(view));
    if new_target == old_target && transport_mission(view.ai, carrier).is_some() {
        return;
    }
    if view.world.unit(carrier).is_none() || transport_mission(view.ai, carrier).is_none() {
        t.set_transport(ctx.ai, None);
        return;
    }
    let aboard = t.carrier(view) == Some(carrier);
    let carrier_target = transport_mission(view.ai, carrier).and_then(|tm| tm.target);

    if aboard && (new_target.is_none() || carrier_target != new_target) {
        if let Err(err) = dump_transportable(ctx, carrier, t) {
            debug!(unit = %unit, carrier = %carrier, %err, "cannot drop off passenger");
            remove_transportable(ctx, carrier, t);
        }
    } else if new_target.is_none() {
        remove_transportable(ctx, carrier, t);
    } else if let Err(err) = queue_transportable(ctx, carrier, t) {
        debug!(unit = %unit, carrier = %carrier, %err, "passenger re-plan failed");
        remove_transportable(ctx, carrier, t);
    }
}

fn grant(ctx: &mut AiContext<'_>, unit: UnitId, mission: Mission) {
    debug!(
        faction = %ctx.ai.faction,
        unit = %unit,
        mission = ?mission.kind(),
        "mission granted"
    );
    change_mission(ctx, unit, Some(mission));
}

/// Drops every mission that no longer holds.
pub fn discard_invalid(ctx: &mut AiContext<'_>) {
    let stale: Vec<(UnitId, &'static str)> = ctx
        .ai
        .units
        .values()
        .filter_map(|u| {
            let reason = u.mission.as_ref()?.invalid_reason(ctx.view(), u.unit)?;
            Some((u.unit, reason))
        })
        .collect();
    for (unit, reason) in stale {
        debug!(unit = %unit, reason, "mission discarded");
        change_mission(ctx, unit, None);
    }
}

// ---------------------------------------------------------------------------
// Unit facts
// ---------------------------------------------------------------------------

/// What the ladders need to know about a unit.
struct Facts {
    unit_type: UnitTypeId,
    naval: bool,
    space: u32,
    colonist: bool,
    skill: i32,
    can_raid: bool,
    treasure: bool,
    offensive: bool,
    expeditionary: bool,
    on_map: bool,
    role: Role,
    expert_role: Option<Role>,
    working_in: Option<SettlementId>,
    home: Option<SettlementId>,
    hold_empty: bool,
}

impl Facts {
    fn of(view: View<'_>, unit: UnitId) -> Option<Self> {
        let state = view.world.unit(unit)?;
        let def = view.content.unit_type(&state.unit_type)?;
        Some(Self {
            unit_type: state.unit_type.clone(),
            naval: def.naval,
            space: def.space,
            colonist: def.colonist,
            skill: def.skill,
            can_raid: def.can_raid,
            treasure: def.treasure_train && state.treasure > 0,
            offensive: offence_power(view.content, state) > 0,
            expeditionary: state.expeditionary,
            on_map: state.location.tile().is_some(),
            role: state.role,
            expert_role: def.expert_role,
            working_in: state.working_in,
            home: state.home_settlement,
            hold_empty: view.world.space_used(unit, view.content) == 0,
        })
    }
}

fn builder_score(f: &Facts) -> i32 {
    let mut score = 100 - 10 * f.skill;
    if f.role != Role::Default {
        score -= 20;
    }
    if f.on_map {
        score += 10;
    }
    score
}

fn specialist_score(f: &Facts, role: Role) -> i32 {
    let mut score = 50;
    if f.role == role {
        score += 40;
    }
    if f.expert_role == Some(role) {
        score += 30;
    }
    if f.on_map {
        score += 10;
    }
    score
}

fn quota_score(f: &Facts, kind: MissionKind) -> i32 {
    match kind {
        MissionKind::BuildColony => builder_score(f),
        MissionKind::Scouting => specialist_score(f, Role::Scout),
        _ => specialist_score(f, Role::Pioneer),
    }
}

// ---------------------------------------------------------------------------
// Equipment
// ---------------------------------------------------------------------------

/// Takes up `role` where the unit stands, if it can be priced and paid.
fn equip(ctx: &mut AiContext<'_>, unit: UnitId, role: Role) -> bool {
    let holds = ctx.world.unit(unit).is_some_and(|u| {
        u.role == role && (role != Role::Pioneer || u.role_uses > 0)
    });
    if holds {
        return true;
    }
    if equip_cost(ctx.world, ctx.content, unit, role).is_none() {
        return false;
    }
    match ctx.submit(Command::Equip { unit, role }) {
        Ok(()) => true,
        Err(err) => {
            debug!(unit = %unit, ?role, %err, "equip refused");
            false
        }
    }
}

/// Hands special equipment back when the mission it was for found no target.
fn unequip(ctx: &mut AiContext<'_>, unit: UnitId, role: Role) {
    let holds = ctx.world.unit(unit).is_some_and(|u| u.role == role);
    if !holds || equip_cost(ctx.world, ctx.content, unit, Role::Default).is_none() {
        return;
    }
    if let Err(err) = ctx.submit(Command::Equip {
        unit,
        role: Role::Default,
    }) {
        debug!(unit = %unit, %err, "unequip refused");
    }
}

// ---------------------------------------------------------------------------
// Candidates
// ---------------------------------------------------------------------------

fn try_build(ctx: &mut AiContext<'_>, unit: UnitId) -> Option<Mission> {
    let (target, value) = targets::build_site(ctx.view(), unit)?;
    Some(Mission::BuildColony { target, value })
}

fn try_scout(ctx: &mut AiContext<'_>, unit: UnitId) -> Option<Mission> {
    if !equip(ctx, unit, Role::Scout) {
        return None;
    }
    match targets::scout_target(ctx.view(), unit) {
        Some(target) => Some(Mission::Scouting { target }),
        None => {
            unequip(ctx, unit, Role::Scout);
            None
        }
    }
}

fn try_pioneer(ctx: &mut AiContext<'_>, unit: UnitId) -> Option<Mission> {
    if ctx.scratch.tip_map.is_empty() || !equip(ctx, unit, Role::Pioneer) {
        return None;
    }
    match targets::pioneer_target(ctx.view(), unit) {
        Some((tile, improvement)) => {
            set_claim(ctx.ai, tile, Some(unit));
            if let Some(plan) = ctx.scratch.tip_map.get_mut(&tile) {
                plan.pioneer = Some(unit);
            }
            Some(Mission::Pioneering { tile, improvement })
        }
        None => {
            unequip(ctx, unit, Role::Pioneer);
            None
        }
    }
}

fn try_missionary(ctx: &mut AiContext<'_>, unit: UnitId) -> Option<Mission> {
    if !equip(ctx, unit, Role::Missionary) {
        return None;
    }
    match targets::missionary_target(ctx.view(), unit) {
        Some(settlement) => Some(Mission::Missionary { settlement }),
        None => {
            unequip(ctx, unit, Role::Missionary);
            None
        }
    }
}

/// Binds the best open worker wish for `wanted` to the unit.
fn try_wish(ctx: &mut AiContext<'_>, unit: UnitId, wanted: &UnitTypeId) -> Option<Mission> {
    let wish = best_worker_wish(ctx.view(), unit, wanted)?;
    let settlement = ctx.ai.wishes.get(&wish)?.destination;
    let bound = consume_worker_wish(
        ctx.ai,
        &mut ctx.scratch.wishes,
        wish,
        TransportableId::Unit(unit),
    );
    if let Err(err) = bound {
        debug!(unit = %unit, %err, "wish unavailable");
        return None;
    }
    Some(Mission::WishRealization { wish, settlement })
}

fn try_defend(
    ctx: &AiContext<'_>,
    planner: &dyn LaborPlanner,
    unit: UnitId,
    radius: u32,
) -> Option<Mission> {
    let settlement = targets::defend_target(ctx.view(), planner, unit, radius)?;
    Some(Mission::DefendSettlement { settlement })
}

fn try_seek(ctx: &AiContext<'_>, unit: UnitId, range: u32) -> Option<Mission> {
    let target = targets::seek_target(ctx.view(), unit, range)?;
    Some(Mission::SeekAndDestroy { target, range })
}

fn idle(ctx: &AiContext<'_>, unit: UnitId) -> Mission {
    Mission::IdleAtSettlement {
        settlement: targets::nearest_own_settlement(ctx.view(), unit),
    }
}

// ---------------------------------------------------------------------------
// Ladders
// ---------------------------------------------------------------------------

/// Ships: raid, carry, hunt, roam.
fn naval_ladder(ctx: &mut AiContext<'_>, unit: UnitId, f: &Facts) -> Mission {
    if f.can_raid && f.hold_empty {
        if let Some((target, _)) = targets::privateer_target(ctx.view(), unit) {
            return Mission::Privateer { target };
        }
    }
    if f.space > 0 {
        return Mission::Transport(TransportMission::default());
    }
    if f.offensive {
        if let Some(m) = try_seek(ctx, unit, ctx.config.seek_turns_near) {
            return m;
        }
    }
    Mission::WanderHostile
}

/// Land units of colonial powers and the crown.
fn colonial_ladder(
    ctx: &mut AiContext<'_>,
    planner: &dyn LaborPlanner,
    unit: UnitId,
    f: &Facts,
) -> Mission {
    let config = ctx.config;
    if f.treasure {
        if let Some(target) = targets::cash_in_target(ctx.view(), unit) {
            return Mission::CashInTreasureTrain { target };
        }
    }
    if let Some(settlement) = f.working_in {
        return Mission::WorkInsideColony { settlement };
    }
    if f.offensive {
        if let Some(m) = try_defend(ctx, planner, unit, config.defend_turns_strict) {
            return m;
        }
    }
    if f.expeditionary {
        if let Some(m) = try_seek(ctx, unit, config.ref_seek_turns) {
            return m;
        }
        return Mission::WanderHostile;
    }
    if f.colonist && f.skill > 0 {
        if let Some(m) = try_wish(ctx, unit, &f.unit_type) {
            return m;
        }
    }
    if f.offensive {
        if let Some(m) = try_defend(ctx, planner, unit, config.defend_turns_relaxed) {
            return m;
        }
        if let Some(m) = try_seek(ctx, unit, config.seek_turns_near) {
            return m;
        }
    }
    let preaching = f.role == Role::Missionary || f.expert_role == Some(Role::Missionary);
    if f.colonist && preaching {
        if let Some(m) = try_missionary(ctx, unit) {
            return m;
        }
    }
    if f.colonist {
        if let Some(m) = try_wish(ctx, unit, &config.default_worker_type) {
            return m;
        }
    }
    if f.offensive {
        if let Some(m) = try_seek(ctx, unit, config.seek_turns_far) {
            return m;
        }
        return Mission::WanderHostile;
    }
    idle(ctx, unit)
}

/// Native braves: guard the village, visit the colonists, fight when at war.
fn native_ladder(
    ctx: &mut AiContext<'_>,
    planner: &dyn LaborPlanner,
    unit: UnitId,
    f: &Facts,
) -> Mission {
    let faction = ctx.ai.faction;
    let config = ctx.config;
    let Some(home) = f.home.filter(|h| ctx.world.settlement(*h).is_some()) else {
        return idle(ctx, unit);
    };
    if planner.is_badly_defended(ctx.view(), home) {
        return Mission::DefendSettlement { settlement: home };
    }
    if ctx.roll(config.native_demand_percent) {
        let colony = targets::native_colony_target(ctx.view(), unit).filter(|c| {
            let owner = ctx.world.settlement(*c).map(|s| s.owner);
            owner.is_some_and(|o| ctx.world.tension(faction, o) >= config.native_demand_tension)
        });
        if let Some(colony) = colony {
            return Mission::IndianDemand { home, colony };
        }
    }
    if ctx.roll(config.native_gift_percent) {
        let has_gift = ctx
            .world
            .settlement_goods(home, &ctx.content.constants.native_goods)
            > 0;
        let colony = targets::native_colony_target(ctx.view(), unit).filter(|c| {
            let owner = ctx.world.settlement(*c).map(|s| s.owner);
            owner.is_some_and(|o| ctx.world.tension(faction, o) <= config.native_gift_max_tension)
        });
        if let (true, Some(colony)) = (has_gift, colony) {
            return Mission::IndianBringGift {
                home,
                colony,
                collected: false,
            };
        }
    }
    let at_war = ctx
        .world
        .factions
        .values()
        .any(|o| o.id != faction && !o.dead && ctx.world.at_war(faction, o.id));
    if at_war && f.offensive {
        if let Some(m) = try_seek(ctx, unit, config.seek_turns_near) {
            return m;
        }
        return Mission::WanderHostile;
    }
    Mission::IdleAtSettlement {
        settlement: Some(home),
    }
}

fn ladder(ctx: &mut AiContext<'_>, planner: &dyn LaborPlanner, unit: UnitId) -> Option<Mission> {
    let facts = Facts::of(ctx.view(), unit)?;
    let kind = ctx.world.factions.get(&ctx.ai.faction)?.kind;
    let mission = if facts.naval {
        naval_ladder(ctx, unit, &facts)
    } else if facts.space > 0 {
        Mission::Transport(TransportMission::default())
    } else if kind == FactionKind::Native {
        native_ladder(ctx, planner, unit, &facts)
    } else {
        colonial_ladder(ctx, planner, unit, &facts)
    };
    Some(mission)
}

// ---------------------------------------------------------------------------
// Quota phase
// ---------------------------------------------------------------------------

/// Colonists free to take up a quota mission: on land, not working inside a
/// colony, not with the crown's army.
fn quota_pool(view: View<'_>, idle: &[UnitId]) -> Vec<UnitId> {
    idle.iter()
        .copied()
        .filter(|u| {
            Facts::of(view, *u).is_some_and(|f| {
                f.colonist && !f.naval && f.working_in.is_none() && !f.expeditionary
            })
        })
        .collect()
}

/// Grants building, then scouting, then pioneering to the best suited units
/// in `pool` until each quota is used up. Granted units leave the pool.
pub fn quota_phase(ctx: &mut AiContext<'_>, quotas: &mut Quotas, pool: &mut Vec<UnitId>) -> u32 {
    let mut granted = 0;
    for kind in [
        MissionKind::BuildColony,
        MissionKind::Scouting,
        MissionKind::Pioneering,
    ] {
        if quotas.slot(kind).map_or(0, |q| *q) <= 0 {
            continue;
        }
        let mut ranked: Vec<(i32, UnitId)> = pool
            .iter()
            .filter_map(|u| Facts::of(ctx.view(), *u).map(|f| (quota_score(&f, kind), *u)))
            .collect();
        ranked.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));

        for (_, unit) in ranked {
            if quotas.slot(kind).map_or(0, |q| *q) <= 0 {
                break;
            }
            let mission = match kind {
                MissionKind::BuildColony => try_build(ctx, unit),
                MissionKind::Scouting => try_scout(ctx, unit),
                _ => try_pioneer(ctx, unit),
            };
            let Some(mission) = mission else {
                continue;
            };
            grant(ctx, unit, mission);
            if let Some(q) = quotas.slot(kind) {
                *q -= 1;
            }
            pool.retain(|u| *u != unit);
            granted += 1;
        }
    }
    granted
}

/// Units of the faction that are alive and have no mission, in id order.
fn idle_units(view: View<'_>) -> Vec<UnitId> {
    view.ai
        .units
        .values()
        .filter(|u| u.mission.is_none() && view.world.unit(u.unit).is_some())
        .map(|u| u.unit)
        .collect()
}

/// One selection pass for the faction. Returns the number of missions granted.
pub fn grant_missions(ctx: &mut AiContext<'_>, planner: &dyn LaborPlanner) -> u32 {
    discard_invalid(ctx);
    let mut granted = 0;
    let colonial = ctx
        .world
        .factions
        .get(&ctx.ai.faction)
        .is_some_and(|f| f.kind == FactionKind::European);

    let idle = idle_units(ctx.view());
    if colonial {
        let mut quotas = Quotas::compute(ctx.view());
        quotas.survey(ctx.view());
        let mut pool = quota_pool(ctx.view(), &idle);
        granted += quota_phase(ctx, &mut quotas, &mut pool);
    }

    for unit in idle {
        if ctx.ai.mission(unit).is_some() {
            continue;
        }
        let Some(mission) = ladder(ctx, planner, unit) else {
            continue;
        };
        grant(ctx, unit, mission);
        granted += 1;
    }
    granted
}
