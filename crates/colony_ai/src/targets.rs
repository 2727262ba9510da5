//! Target searches for the mission selector.
//!
//! Every finder runs a scored search from the unit's position within a
//! mission-specific radius. Land units on the map search on foot; units in
//! Europe or aboard a carrier search as if riding a ship, and the Atlantic
//! crossing is added to their radius.

use std::collections::BTreeSet;

use colony_core::path::{search_scored, CarrierSpec, Traveller};
use colony_core::{ImprovementKind, Location, SettlementId, SettlementKind, TilePos, UnitId};

use crate::context::View;
use crate::labor::LaborPlanner;
use crate::mission::{Mission, SeekTarget};

struct Seeker {
    traveller: Traveller,
    start: Location,
    carrier: Option<CarrierSpec>,
    extra_turns: u32,
}

fn seeker(view: View<'_>, unit: UnitId) -> Option<Seeker> {
    let state = view.world.unit(unit)?;
    let def = view.content.unit_type(&state.unit_type)?;
    let traveller = Traveller::of_unit(view.world, view.content, unit)?;
    let off_map = state.location.tile().is_none();
    let carrier = (!def.naval && off_map)
        .then(|| CarrierSpec::virtual_ship(view.config.virtual_ship_speed));
    let extra_turns = if off_map {
        view.content.constants.europe_sail_turns
    } else {
        0
    };
    Some(Seeker {
        traveller,
        start: state.location,
        carrier,
        extra_turns,
    })
}

/// Highest-scoring location within `radius` turns of the unit.
fn best_location(
    view: View<'_>,
    unit: UnitId,
    radius: u32,
    score: impl FnMut(Location, u32) -> Option<i64>,
) -> Option<(Location, i64)> {
    let seeker = seeker(view, unit)?;
    let (path, value) = search_scored(
        view.world,
        view.content,
        &seeker.traveller,
        seeker.start,
        score,
        radius.saturating_add(seeker.extra_turns),
        seeker.carrier.as_ref(),
    )?;
    Some((path.last()?.location, value))
}

fn best_tile(
    view: View<'_>,
    unit: UnitId,
    radius: u32,
    score: impl FnMut(Location, u32) -> Option<i64>,
) -> Option<TilePos> {
    best_location(view, unit, radius, score).and_then(|(l, _)| l.tile())
}

/// Targets already claimed by other units on the same kind of mission.
fn claimed_by_others(
    view: View<'_>,
    unit: UnitId,
    pick: impl Fn(&Mission) -> Option<TilePos>,
) -> BTreeSet<TilePos> {
    view.ai
        .units
        .values()
        .filter(|u| u.unit != unit)
        .filter_map(|u| u.mission.as_ref().and_then(&pick))
        .collect()
}

// ---------------------------------------------------------------------------
// Colonial missions
// ---------------------------------------------------------------------------

/// Best free colony site: good land around it, a bonus for an ocean port,
/// fewer turns away is better.
pub fn build_site(view: View<'_>, unit: UnitId) -> Option<(TilePos, i64)> {
    let faction = view.ai.faction;
    let map = &view.world.map;
    let claimed = claimed_by_others(view, unit, |m| match m {
        Mission::BuildColony { target, .. } => Some(*target),
        _ => None,
    });
    let radius = view.config.build_colony_turns;
    let (location, value) = best_location(view, unit, radius, |loc, turns| {
        let pos = loc.tile()?;
        let tile = map.tile(pos)?;
        if !tile.terrain.is_land() || tile.owner.is_some_and(|o| o != faction) {
            return None;
        }
        let crowded = std::iter::once(pos)
            .chain(map.neighbours(pos))
            .any(|p| view.world.settlement_at(p).is_some());
        if crowded || claimed.iter().any(|c| c.distance(pos) <= 1) {
            return None;
        }
        let land: i64 = map
            .neighbours(pos)
            .filter_map(|n| map.terrain(n))
            .filter(|t| t.is_land())
            .map(|t| i64::from(t.colony_value()))
            .sum();
        let port = if map.is_connected_port(pos) { 10 } else { 0 };
        let centre = i64::from(tile.terrain.colony_value()) * 2;
        let value = centre + land + port - 3 * i64::from(turns);
        (value > 0).then_some(value)
    })?;
    Some((location.tile()?, value))
}

/// Most valuable unclaimed improvement plan, discounted by distance.
pub fn pioneer_target(view: View<'_>, unit: UnitId) -> Option<(TilePos, ImprovementKind)> {
    let tip_map = &view.scratch.tip_map;
    let tile = best_tile(view, unit, view.config.pioneer_turns, |loc, turns| {
        let plan = tip_map.get(&loc.tile()?)?;
        if plan.pioneer.is_some_and(|p| p != unit) {
            return None;
        }
        Some(i64::from(plan.value) * 100 / (i64::from(turns) + 1))
    })?;
    tip_map.get(&tile).map(|plan| (tile, plan.improvement))
}

/// Nearest worthwhile rumour or unvisited village no other scout is after.
pub fn scout_target(view: View<'_>, unit: UnitId) -> Option<TilePos> {
    let faction = view.ai.faction;
    let world = view.world;
    let claimed = claimed_by_others(view, unit, |m| match m {
        Mission::Scouting { target } => Some(*target),
        _ => None,
    });
    best_tile(view, unit, view.config.scout_turns, |loc, turns| {
        let pos = loc.tile()?;
        if claimed.contains(&pos) {
            return None;
        }
        let village = world
            .settlement_at(pos)
            .is_some_and(|s| s.kind == SettlementKind::Native && !s.visited_by.contains(&faction));
        let rumour = world.map.tile(pos).is_some_and(|t| t.rumour);
        let value = match (village, rumour) {
            (true, _) => 150,
            (false, true) => 100,
            (false, false) => return None,
        };
        Some(value * 10 / (i64::from(turns) + 1))
    })
}

/// Nearest village without a mission whose people are not at war with us.
pub fn missionary_target(view: View<'_>, unit: UnitId) -> Option<SettlementId> {
    let faction = view.ai.faction;
    let world = view.world;
    let claimed = claimed_by_others(view, unit, |m| match m {
        Mission::Missionary { settlement } => world.settlement(*settlement).map(|s| s.tile),
        _ => None,
    });
    let tile = best_tile(view, unit, view.config.missionary_turns, |loc, turns| {
        let pos = loc.tile()?;
        let village = world.settlement_at(pos)?;
        let open = village.kind == SettlementKind::Native
            && village.missionary.is_none()
            && !world.at_war(faction, village.owner)
            && !claimed.contains(&pos);
        open.then(|| -i64::from(turns))
    })?;
    world.settlement_at(tile).map(|s| s.id)
}

/// Nearest own port colony a treasure train can cash in at.
pub fn cash_in_target(view: View<'_>, unit: UnitId) -> Option<TilePos> {
    let faction = view.ai.faction;
    let world = view.world;
    let treasure_space = world
        .unit(unit)
        .and_then(|u| view.content.unit_type(&u.unit_type))
        .map_or(1, |d| d.space_taken);
    let has_galleon = world.faction_units(faction).any(|u| {
        view.content
            .unit_type(&u.unit_type)
            .is_some_and(|d| d.naval && d.space >= treasure_space)
    });
    let radius = if has_galleon {
        view.config.cash_in_turns
    } else {
        view.config.cash_in_turns_no_carrier
    };
    best_tile(view, unit, radius, |loc, turns| {
        let pos = loc.tile()?;
        let port = world
            .settlement_at(pos)
            .is_some_and(|s| s.owner == faction && s.kind == SettlementKind::Colony)
            && world.map.is_connected_port(pos);
        port.then(|| -i64::from(turns))
    })
}

// ---------------------------------------------------------------------------
// Military missions
// ---------------------------------------------------------------------------

/// An enemy ship within raiding range, and where it is.
pub fn privateer_target(view: View<'_>, unit: UnitId) -> Option<(UnitId, TilePos)> {
    let faction = view.ai.faction;
    let world = view.world;
    let prey_at = |pos: TilePos| {
        world
            .units_at(Location::Tile(pos))
            .filter(|u| u.owner != faction && world.at_war(faction, u.owner))
            .map(|u| u.id)
            .min()
    };
    let tile = best_tile(view, unit, view.config.privateer_turns, |loc, turns| {
        let pos = loc.tile()?;
        if !world.map.is_water(pos) {
            return None;
        }
        prey_at(pos).map(|_| -i64::from(turns))
    })?;
    prey_at(tile).map(|prey| (prey, tile))
}

/// Nearest enemy the unit can fight in its own element: units on tiles of
/// the right kind, or hostile settlements for land units.
pub fn seek_target(view: View<'_>, unit: UnitId, range: u32) -> Option<SeekTarget> {
    let faction = view.ai.faction;
    let world = view.world;
    let naval = world
        .unit(unit)
        .and_then(|u| view.content.unit_type(&u.unit_type))
        .is_some_and(|d| d.naval);
    let enemy = |pos: TilePos| -> Option<SeekTarget> {
        if world.map.is_water(pos) != naval {
            return None;
        }
        if let Some(s) = world.settlement_at(pos) {
            if s.owner != faction && world.at_war(faction, s.owner) {
                return Some(SeekTarget::Settlement(s.id));
            }
        }
        world
            .units_at(Location::Tile(pos))
            .filter(|u| u.owner != faction && world.at_war(faction, u.owner))
            .map(|u| u.id)
            .min()
            .map(SeekTarget::Unit)
    };
    let tile = best_tile(view, unit, range, |loc, turns| {
        let target = enemy(loc.tile()?)?;
        let base = match target {
            SeekTarget::Settlement(_) => 150,
            SeekTarget::Unit(_) => 100,
        };
        Some(base * 10 / (i64::from(turns) + 1))
    })?;
    enemy(tile)
}

/// Own settlement most in need of another defender within `radius`.
pub fn defend_target(
    view: View<'_>,
    planner: &dyn LaborPlanner,
    unit: UnitId,
    radius: u32,
) -> Option<SettlementId> {
    let faction = view.ai.faction;
    let world = view.world;
    let tile = best_tile(view, unit, radius, |loc, turns| {
        let settlement = world.settlement_at(loc.tile()?)?;
        if settlement.owner != faction || !planner.is_badly_defended(view, settlement.id) {
            return None;
        }
        Some(1000 / (i64::from(turns) + 1))
    })?;
    world.settlement_at(tile).map(|s| s.id)
}

/// Nearest settlement the faction owns.
pub fn nearest_own_settlement(view: View<'_>, unit: UnitId) -> Option<SettlementId> {
    let faction = view.ai.faction;
    let world = view.world;
    let tile = best_tile(view, unit, view.config.many_turns, |loc, turns| {
        let owned = world.settlement_at(loc.tile()?)?.owner == faction;
        owned.then(|| -i64::from(turns))
    })?;
    world.settlement_at(tile).map(|s| s.id)
}

// ---------------------------------------------------------------------------
// Native missions
// ---------------------------------------------------------------------------

/// Nearest foreign colony at peace with the natives.
pub fn native_colony_target(view: View<'_>, unit: UnitId) -> Option<SettlementId> {
    let faction = view.ai.faction;
    let world = view.world;
    let tile = best_tile(view, unit, view.config.native_target_turns, |loc, turns| {
        let colony = world.settlement_at(loc.tile()?)?;
        let ok = colony.kind == SettlementKind::Colony
            && colony.owner != faction
            && !world.at_war(faction, colony.owner);
        ok.then(|| -i64::from(turns))
    })?;
    world.settlement_at(tile).map(|s| s.id)
}
