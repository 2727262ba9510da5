use colony_core::{offence_power, Command, Location, SettlementId, TilePos, UnitId};
use tracing::debug;

use super::travel::{travel_to, MoveOutcome};
use super::{SeekTarget, StepOutcome};
use crate::context::AiContext;
use crate::targets;

fn attack(ctx: &mut AiContext<'_>, unit: UnitId, target: TilePos) -> StepOutcome {
    if ctx.world.unit(unit).map_or(0, |u| u.moves_left) == 0 {
        return StepOutcome::Idle;
    }
    if let Err(err) = ctx.submit(Command::Attack { unit, target }) {
        debug!(unit = %unit, tile = %target, %err, "attack refused");
    }
    StepOutcome::Idle
}

/// Closes in on a tile and strikes it from next door.
fn strike(ctx: &mut AiContext<'_>, unit: UnitId, target: TilePos) -> StepOutcome {
    match travel_to(ctx, unit, Location::Tile(target), true) {
        MoveOutcome::Arrived => attack(ctx, unit, target),
        MoveOutcome::Moved => StepOutcome::Progress,
        MoveOutcome::NoPath => StepOutcome::Done,
        MoveOutcome::Waiting | MoveOutcome::Failed => StepOutcome::Idle,
    }
}

/// Hunts enemy shipping; picks a new victim when the current one is gone.
pub(super) fn privateer(
    ctx: &mut AiContext<'_>,
    unit: UnitId,
    target: &mut UnitId,
) -> StepOutcome {
    let prey_at = ctx.world.unit(*target).and_then(|p| p.location.tile());
    let tile = match prey_at {
        Some(tile) => tile,
        None => match targets::privateer_target(ctx.view(), unit) {
            Some((prey, tile)) => {
                *target = prey;
                tile
            }
            None => return StepOutcome::Done,
        },
    };
    strike(ctx, unit, tile)
}

pub(super) fn defend(
    ctx: &mut AiContext<'_>,
    unit: UnitId,
    settlement: SettlementId,
) -> StepOutcome {
    let Some(tile) = ctx.world.settlement(settlement).map(|s| s.tile) else {
        return StepOutcome::Done;
    };
    match travel_to(ctx, unit, Location::Tile(tile), false) {
        MoveOutcome::Arrived => {}
        MoveOutcome::Moved => return StepOutcome::Progress,
        _ => return StepOutcome::Idle,
    }
    let fortify = ctx
        .world
        .unit(unit)
        .is_some_and(|u| !u.fortified && u.moves_left > 0);
    if fortify {
        if let Err(err) = ctx.submit(Command::Fortify { unit }) {
            debug!(unit = %unit, %err, "cannot fortify");
        }
    }
    StepOutcome::Idle
}

pub(super) fn seek_and_destroy(
    ctx: &mut AiContext<'_>,
    unit: UnitId,
    target: SeekTarget,
) -> StepOutcome {
    let tile = match target {
        SeekTarget::Unit(u) => ctx.world.unit(u).and_then(|u| u.location.tile()),
        SeekTarget::Settlement(s) => ctx.world.settlement(s).map(|s| s.tile),
    };
    match tile {
        Some(tile) => strike(ctx, unit, tile),
        None => StepOutcome::Done,
    }
}

/// Attacks whatever hostile stands next to the unit, or drifts one tile in
/// a random direction.
pub(super) fn wander(ctx: &mut AiContext<'_>, unit: UnitId) -> StepOutcome {
    let Some(state) = ctx.world.unit(unit) else {
        return StepOutcome::Done;
    };
    let Some(pos) = state.location.tile() else {
        return StepOutcome::Idle;
    };
    if state.moves_left == 0 || state.voyage.is_some() {
        return StepOutcome::Idle;
    }
    let owner = state.owner;
    let naval = ctx
        .content
        .unit_type(&state.unit_type)
        .is_some_and(|d| d.naval);
    let offensive = offence_power(ctx.content, state) > 0;

    let world = &*ctx.world;
    let mut victims = Vec::new();
    let mut open = Vec::new();
    for n in world.map.neighbours(pos) {
        if world.map.is_water(n) != naval {
            continue;
        }
        let hostile = world
            .units_at(Location::Tile(n))
            .any(|u| u.owner != owner && world.at_war(owner, u.owner));
        let foreign = world.units_at(Location::Tile(n)).any(|u| u.owner != owner)
            || world.settlement_at(n).is_some_and(|s| s.owner != owner);
        if hostile {
            victims.push(n);
        } else if !foreign {
            open.push(n);
        }
    }
    if offensive {
        if let Some(&victim) = victims.first() {
            return attack(ctx, unit, victim);
        }
    }
    if open.is_empty() {
        return StepOutcome::Idle;
    }
    let to = open[ctx.pick(open.len())];
    match ctx.submit(Command::Move { unit, to }) {
        Ok(()) => StepOutcome::Progress,
        Err(_) => StepOutcome::Idle,
    }
}
