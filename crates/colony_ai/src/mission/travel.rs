use colony_core::path::{find_path, Traveller};
use colony_core::{Command, CommandError, Location, UnitId};
use tracing::debug;

use crate::context::AiContext;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveOutcome {
    /// At the target (or next to it when stopping adjacent).
    Arrived,
    /// Made progress but is not there yet.
    Moved,
    /// Sailing, aboard a carrier, or out of moves.
    Waiting,
    /// No way there on its own.
    NoPath,
    /// The world refused the first step.
    Failed,
}

fn arrived(at: Location, target: Location, stop_adjacent: bool) -> bool {
    if at == target {
        return true;
    }
    match (at, target) {
        (Location::Tile(a), Location::Tile(b)) => stop_adjacent && a.is_adjacent(b),
        _ => false,
    }
}

fn moves_left(ctx: &AiContext<'_>, unit: UnitId) -> u32 {
    ctx.world.unit(unit).map_or(0, |u| u.moves_left)
}

/// Walks or sails `unit` towards `target` as far as its moves allow.
///
/// Units aboard a carrier never move themselves; the carrier's transport
/// mission delivers them. A ship in Europe sets sail for America, a land
/// unit in Europe waits for a ship.
pub fn travel_to(
    ctx: &mut AiContext<'_>,
    unit: UnitId,
    target: Location,
    stop_adjacent: bool,
) -> MoveOutcome {
    let Some(state) = ctx.world.unit(unit) else {
        return MoveOutcome::Failed;
    };
    if state.voyage.is_some() || state.location.carrier().is_some() {
        return MoveOutcome::Waiting;
    }
    let at = state.location;
    if arrived(at, target, stop_adjacent) {
        return MoveOutcome::Arrived;
    }
    let naval = ctx
        .content
        .unit_type(&state.unit_type)
        .is_some_and(|d| d.naval);
    if at.is_europe() {
        if !naval {
            return MoveOutcome::Waiting;
        }
        return match ctx.submit(Command::SailToAmerica { unit }) {
            Ok(()) => MoveOutcome::Moved,
            Err(_) => MoveOutcome::Failed,
        };
    }
    if state.moves_left == 0 {
        return MoveOutcome::Waiting;
    }
    let Some(traveller) = Traveller::of_unit(ctx.world, ctx.content, unit) else {
        return MoveOutcome::Failed;
    };
    let Some(path) = find_path(ctx.world, ctx.content, &traveller, at, target, None) else {
        return MoveOutcome::NoPath;
    };

    let nodes = path.nodes();
    let end = if stop_adjacent {
        nodes.len().saturating_sub(1)
    } else {
        nodes.len()
    };
    let mut moved = false;
    let mut refused: Option<CommandError> = None;
    for node in nodes.iter().take(end).skip(1) {
        if moves_left(ctx, unit) == 0 {
            break;
        }
        let command = match node.location {
            Location::Tile(to) => Command::Move { unit, to },
            Location::Europe => Command::SailToEurope { unit },
            Location::Aboard(_) => break,
        };
        let sailing = matches!(command, Command::SailToEurope { .. });
        match ctx.submit(command) {
            Ok(()) => moved = true,
            Err(err) => {
                refused = Some(err);
                break;
            }
        }
        if sailing {
            break;
        }
    }

    let now = ctx.world.unit(unit).map(|u| u.location);
    if now.is_some_and(|l| arrived(l, target, stop_adjacent)) {
        return MoveOutcome::Arrived;
    }
    match (moved, refused) {
        (true, _) => MoveOutcome::Moved,
        (false, None) => MoveOutcome::Waiting,
        (false, Some(err)) => {
            debug!(unit = %unit, %err, "travel blocked");
            MoveOutcome::Failed
        }
    }
}
