use super::*;
use crate::test_fixtures::{base_content, base_state, make_rng, spawn, DUTCH};

mod commands;
mod upkeep;

// --- Shared test helpers ------------------------------------------------

fn test_content() -> GameContent {
    base_content()
}

fn test_state(content: &GameContent) -> GameState {
    base_state(content)
}

fn tile(x: i32, y: i32) -> Location {
    Location::Tile(TilePos::new(x, y))
}

/// Runs one command issued by the Dutch.
fn run(
    state: &mut GameState,
    content: &GameContent,
    command: Command,
) -> Result<Vec<EventEnvelope>, CommandError> {
    run_as(state, content, DUTCH, command)
}

fn run_as(
    state: &mut GameState,
    content: &GameContent,
    faction: FactionId,
    command: Command,
) -> Result<Vec<EventEnvelope>, CommandError> {
    let mut rng = make_rng();
    let turn = state.meta.turn;
    let envelope = make_cmd(&mut state.counters, faction, turn, command);
    execute(state, content, &envelope, &mut rng)
}

fn colonist_at(state: &mut GameState, content: &GameContent, x: i32, y: i32) -> UnitId {
    spawn(state, content, "free_colonist", DUTCH, tile(x, y))
}
