//! `colony_core` — deterministic world model for the colonization simulation.
//!
//! No IO, no network. All randomness via the passed-in Rng.

mod combat;
mod engine;
mod equip;
pub mod path;
mod types;
mod world;

#[cfg(any(test, feature = "test-support"))]
pub mod test_fixtures;

pub use combat::{defence_power, offence_power};
pub use engine::{advance_turn, execute, make_cmd, CommandError};
pub use equip::{equip_cost, role_goods, EquipCost};
pub use types::*;
pub use world::goods_slots;

pub(crate) fn emit(counters: &mut Counters, turn: u64, event: Event) -> EventEnvelope {
    let id = EventId(format!("evt_{:06}", counters.next_event_id));
    counters.next_event_id += 1;
    EventEnvelope { id, turn, event }
}

#[cfg(test)]
mod tests;
