use colony_core::{Command, Location, SettlementId, UnitId};
use tracing::debug;

use super::travel::{travel_to, MoveOutcome};
use super::StepOutcome;
use crate::context::AiContext;

fn visit(ctx: &mut AiContext<'_>, unit: UnitId, colony: SettlementId) -> Option<StepOutcome> {
    let Some(tile) = ctx.world.settlement(colony).map(|s| s.tile) else {
        return Some(StepOutcome::Done);
    };
    match travel_to(ctx, unit, Location::Tile(tile), true) {
        MoveOutcome::Arrived => None,
        MoveOutcome::Moved => Some(StepOutcome::Progress),
        MoveOutcome::NoPath => Some(StepOutcome::Done),
        MoveOutcome::Waiting | MoveOutcome::Failed => Some(StepOutcome::Idle),
    }
}

fn deal(ctx: &mut AiContext<'_>, unit: UnitId, command: Command) -> StepOutcome {
    if ctx.world.unit(unit).map_or(0, |u| u.moves_left) == 0 {
        return StepOutcome::Idle;
    }
    if let Err(err) = ctx.submit(command) {
        debug!(unit = %unit, %err, "native visit refused");
    }
    StepOutcome::Done
}

pub(super) fn demand(ctx: &mut AiContext<'_>, unit: UnitId, colony: SettlementId) -> StepOutcome {
    if let Some(outcome) = visit(ctx, unit, colony) {
        return outcome;
    }
    deal(ctx, unit, Command::DemandTribute { unit, settlement: colony })
}

/// Picks up the gift at home first, then carries it to the colony.
pub(super) fn bring_gift(
    ctx: &mut AiContext<'_>,
    unit: UnitId,
    home: SettlementId,
    colony: SettlementId,
    collected: &mut bool,
) -> StepOutcome {
    if !*collected {
        let Some(tile) = ctx.world.settlement(home).map(|s| s.tile) else {
            return StepOutcome::Done;
        };
        match travel_to(ctx, unit, Location::Tile(tile), false) {
            MoveOutcome::Arrived => *collected = true,
            MoveOutcome::Moved => return StepOutcome::Progress,
            MoveOutcome::NoPath => return StepOutcome::Done,
            MoveOutcome::Waiting | MoveOutcome::Failed => return StepOutcome::Idle,
        }
    }
    if let Some(outcome) = visit(ctx, unit, colony) {
        return outcome;
    }
    deal(ctx, unit, Command::DeliverGift { unit, settlement: colony })
}
