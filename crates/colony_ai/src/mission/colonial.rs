use colony_core::{
    Command, ImprovementKind, Location, SettlementId, SettlementKind, TilePos, UnitId,
};
use tracing::{debug, info};

use super::travel::{travel_to, MoveOutcome};
use super::StepOutcome;
use crate::context::AiContext;
use crate::types::WishId;
use crate::wish::complete_wish;

fn moves_left(ctx: &AiContext<'_>, unit: UnitId) -> u32 {
    ctx.world.unit(unit).map_or(0, |u| u.moves_left)
}

fn settlement_tile(ctx: &AiContext<'_>, id: SettlementId) -> Option<TilePos> {
    ctx.world.settlement(id).map(|s| s.tile)
}

/// Maps a travel result that did not arrive to a step outcome.
fn en_route(outcome: MoveOutcome) -> StepOutcome {
    match outcome {
        MoveOutcome::Moved => StepOutcome::Progress,
        _ => StepOutcome::Idle,
    }
}

/// Submits a finishing command; `Done` on success, `Idle` to retry later.
fn finish(ctx: &mut AiContext<'_>, unit: UnitId, command: Command) -> StepOutcome {
    match ctx.submit(command) {
        Ok(()) => StepOutcome::Done,
        Err(err) => {
            debug!(unit = %unit, %err, "mission action refused");
            StepOutcome::Idle
        }
    }
}

pub(super) fn build_colony(ctx: &mut AiContext<'_>, unit: UnitId, target: TilePos) -> StepOutcome {
    let outcome = travel_to(ctx, unit, Location::Tile(target), false);
    if outcome != MoveOutcome::Arrived {
        return en_route(outcome);
    }
    if moves_left(ctx, unit) == 0 {
        return StepOutcome::Idle;
    }
    let faction = ctx.ai.faction;
    let name = match ctx.world.factions.get(&faction) {
        Some(f) => format!("{} colony {}", f.name, ctx.world.colonies_of(faction).count() + 1),
        None => format!("colony {}", target),
    };
    let outcome = finish(ctx, unit, Command::BuildColony { unit, name });
    if outcome == StepOutcome::Done {
        info!(faction = %faction, unit = %unit, tile = %target, "colony founded");
    }
    outcome
}

/// Explores a rumour by stepping onto it, or visits a village chief from
/// next door.
pub(super) fn scout(ctx: &mut AiContext<'_>, unit: UnitId, target: TilePos) -> StepOutcome {
    let village = ctx
        .world
        .settlement_at(target)
        .filter(|s| s.kind == SettlementKind::Native)
        .map(|s| s.id);
    let outcome = travel_to(ctx, unit, Location::Tile(target), village.is_some());
    if outcome != MoveOutcome::Arrived {
        return en_route(outcome);
    }
    match village {
        Some(settlement) if moves_left(ctx, unit) > 0 => {
            finish(ctx, unit, Command::SpeakToChief { unit, settlement })
        }
        Some(_) => StepOutcome::Idle,
        None => StepOutcome::Done,
    }
}

pub(super) fn pioneer(
    ctx: &mut AiContext<'_>,
    unit: UnitId,
    tile: TilePos,
    improvement: ImprovementKind,
) -> StepOutcome {
    if ctx.world.unit(unit).is_some_and(|u| u.work.is_some()) {
        return StepOutcome::Idle;
    }
    let outcome = travel_to(ctx, unit, Location::Tile(tile), false);
    if outcome != MoveOutcome::Arrived {
        return en_route(outcome);
    }
    if moves_left(ctx, unit) == 0 {
        return StepOutcome::Idle;
    }
    if let Err(err) = ctx.submit(Command::ImproveTile { unit, improvement }) {
        debug!(unit = %unit, %err, "improvement refused");
    }
    StepOutcome::Idle
}

pub(super) fn missionary(
    ctx: &mut AiContext<'_>,
    unit: UnitId,
    settlement: SettlementId,
) -> StepOutcome {
    let Some(tile) = settlement_tile(ctx, settlement) else {
        return StepOutcome::Done;
    };
    let outcome = travel_to(ctx, unit, Location::Tile(tile), true);
    if outcome != MoveOutcome::Arrived {
        return en_route(outcome);
    }
    if moves_left(ctx, unit) == 0 {
        return StepOutcome::Idle;
    }
    finish(ctx, unit, Command::EstablishMission { unit, settlement })
}

pub(super) fn cash_in(ctx: &mut AiContext<'_>, unit: UnitId, target: TilePos) -> StepOutcome {
    let outcome = travel_to(ctx, unit, Location::Tile(target), false);
    if outcome != MoveOutcome::Arrived {
        return en_route(outcome);
    }
    finish(ctx, unit, Command::CashInTreasure { unit })
}

/// Walks (or rides) to the wishing colony and joins it.
pub(super) fn realize_wish(
    ctx: &mut AiContext<'_>,
    unit: UnitId,
    wish: WishId,
    settlement: SettlementId,
) -> StepOutcome {
    let joined = ctx
        .world
        .unit(unit)
        .is_some_and(|u| u.working_in == Some(settlement));
    if !joined {
        let Some(tile) = settlement_tile(ctx, settlement) else {
            return StepOutcome::Done;
        };
        let outcome = travel_to(ctx, unit, Location::Tile(tile), false);
        if outcome != MoveOutcome::Arrived {
            return en_route(outcome);
        }
        if let Err(err) = ctx.submit(Command::JoinColony { unit, settlement }) {
            debug!(unit = %unit, %err, "cannot join colony");
            return StepOutcome::Idle;
        }
    }
    complete_wish(ctx.ai, &mut ctx.scratch.wishes, wish);
    StepOutcome::Done
}

pub(super) fn work_inside(
    ctx: &mut AiContext<'_>,
    unit: UnitId,
    settlement: SettlementId,
) -> StepOutcome {
    let working = ctx
        .world
        .unit(unit)
        .is_some_and(|u| u.working_in == Some(settlement));
    if working {
        return StepOutcome::Idle;
    }
    let Some(tile) = settlement_tile(ctx, settlement) else {
        return StepOutcome::Done;
    };
    let outcome = travel_to(ctx, unit, Location::Tile(tile), false);
    if outcome != MoveOutcome::Arrived {
        return en_route(outcome);
    }
    if let Err(err) = ctx.submit(Command::JoinColony { unit, settlement }) {
        debug!(unit = %unit, %err, "cannot join colony");
    }
    StepOutcome::Idle
}

pub(super) fn idle(
    ctx: &mut AiContext<'_>,
    unit: UnitId,
    settlement: Option<SettlementId>,
) -> StepOutcome {
    let Some(tile) = settlement.and_then(|s| settlement_tile(ctx, s)) else {
        return StepOutcome::Idle;
    };
    en_route(travel_to(ctx, unit, Location::Tile(tile), false))
}
