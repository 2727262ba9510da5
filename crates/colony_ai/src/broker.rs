//! Transport broker: hands waiting units and parcels to carriers.
//!
//! Greedy and order dependent on purpose. Requests are served highest
//! priority first; each takes the best carrier still open and never gives
//! it back within the pass.

use colony_core::UnitId;
use tracing::debug;

use crate::cargo::Cargo;
use crate::context::{AiContext, View};
use crate::mission::{queue_transportable, transport_mission};
use crate::types::TransportableId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Allocation {
    pub transportable: TransportableId,
    pub carrier: UnitId,
    /// Planned turns until delivery.
    pub turns: u32,
}

/// Highest transport priority first; ties by id.
pub fn by_priority(view: View<'_>, requests: &[TransportableId]) -> Vec<TransportableId> {
    let mut ordered: Vec<(i32, TransportableId)> = requests
        .iter()
        .map(|t| (t.transport_priority(view), *t))
        .collect();
    ordered.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));
    ordered.into_iter().map(|(_, t)| t).collect()
}

/// How many requests the broker looks at in one pass: a tenth, at least two.
pub fn urgent_count(requests: usize) -> usize {
    ((requests + 5) / 10).max(2)
}

/// The most urgent requests, in the order the broker serves them.
pub fn urgent_subset(view: View<'_>, requests: &[TransportableId]) -> Vec<TransportableId> {
    let mut ordered = by_priority(view, requests);
    ordered.truncate(urgent_count(requests.len()));
    ordered
}

fn capacity(view: View<'_>, carrier: UnitId) -> i32 {
    transport_mission(view.ai, carrier).map_or(0, |tm| tm.destination_capacity(view, carrier))
}

/// Score of carrying `t` with `carrier`. A carrier already at the rendezvous
/// scores its spare capacity and outranks every carrier that still has to
/// travel; the rest score `priority / turns`.
fn score(view: View<'_>, cargo: &Cargo, priority: i32) -> (bool, i64) {
    if cargo.plan.carrier_turns == 0 {
        (true, i64::from(capacity(view, cargo.carrier)))
    } else {
        let turns = i64::from(cargo.plan.turns.max(1));
        (false, i64::from(priority) * 100 / turns)
    }
}

/// Assigns each transportable to at most one carrier.
///
/// 1. Transportables already aboard only consider their own carrier.
/// 2. A structural planning failure drops the transportable for this pass.
/// 3. Carriers without room for the transportable are skipped for it.
/// 4. Carriers whose capacity runs out leave the pool.
pub fn allocate(
    ctx: &mut AiContext<'_>,
    transportables: &[TransportableId],
    carriers: &[UnitId],
) -> Vec<Allocation> {
    let mut open: Vec<UnitId> = carriers
        .iter()
        .copied()
        .filter(|c| capacity(ctx.view(), *c) > 0)
        .collect();
    let mut allocations = Vec::new();

    for t in by_priority(ctx.view(), transportables) {
        if open.is_empty() {
            break;
        }
        let view = ctx.view();
        if t.is_disposed(view) {
            continue;
        }
        let candidates: Vec<UnitId> = match t.carrier(view) {
            Some(aboard) if open.contains(&aboard) => vec![aboard],
            Some(_) => continue,
            None => open.clone(),
        };
        let priority = t.transport_priority(view);
        let space = t.space_taken(view) as i32;

        let mut best: Option<((bool, i64), UnitId, u32)> = None;
        let mut untransportable = false;
        for carrier in candidates {
            let cargo = match Cargo::new(view, t, carrier, None, true) {
                Ok(cargo) => cargo,
                Err(err) if err.is_invalid() => {
                    debug!(transportable = %t, %err, "dropped from transport pass");
                    untransportable = true;
                    break;
                }
                Err(err) => {
                    debug!(transportable = %t, carrier = %carrier, %err, "carrier unsuitable");
                    continue;
                }
            };
            let aboard = t.carrier(view) == Some(carrier);
            if !aboard && capacity(view, carrier) < space {
                continue;
            }
            let key = score(view, &cargo, priority);
            if best.map_or(true, |(b, _, _)| key > b) {
                best = Some((key, carrier, cargo.plan.turns));
            }
        }
        if untransportable {
            continue;
        }
        let Some((_, carrier, turns)) = best else {
            continue;
        };
        match queue_transportable(ctx, carrier, t) {
            Ok(()) => {
                debug!(transportable = %t, carrier = %carrier, turns, "transport allocated");
                allocations.push(Allocation {
                    transportable: t,
                    carrier,
                    turns,
                });
            }
            Err(err) => debug!(transportable = %t, carrier = %carrier, %err, "queueing failed"),
        }
        if capacity(ctx.view(), carrier) <= 0 {
            open.retain(|c| *c != carrier);
        }
    }
    allocations
}
