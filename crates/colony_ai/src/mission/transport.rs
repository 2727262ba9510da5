//! Carrier side of transport: the cargo queue, pickups, deliveries, and
//! buying goods in Europe for open goods wishes.

use colony_core::{goods_slots, Command, GoodsTypeId, Location, SettlementKind, TilePos, UnitId};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::travel::{travel_to, MoveOutcome};
use super::{Mission, StepOutcome};
use crate::cargo::{carrier_turns_to, Cargo, CargoMode, PlanError};
use crate::context::{AiContext, View};
use crate::types::{AiState, GoodsId, TransportableId, WishId};
use crate::wish::{best_goods_wish, complete_wish, consume_goods_wish, release_bound, WishKind};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportMission {
    #[serde(default)]
    pub cargoes: Vec<Cargo>,
    /// The stop the carrier is currently heading for.
    #[serde(default)]
    pub target: Option<Location>,
}

impl TransportMission {
    pub fn has_cargo(&self, t: TransportableId) -> bool {
        self.cargoes.iter().any(|c| c.transportables().contains(&t))
    }

    pub fn cargo(&self, t: TransportableId) -> Option<&Cargo> {
        self.cargoes.iter().find(|c| c.transportable == t)
    }

    /// Removes the cargo for `t`; anything it wrapped goes back on the queue.
    pub fn remove_cargo(&mut self, t: TransportableId) -> bool {
        let Some(index) = self
            .cargoes
            .iter()
            .position(|c| c.transportables().contains(&t))
        else {
            return false;
        };
        let mut outer = self.cargoes.remove(index);
        let mut inner = outer.unwrap();
        if outer.transportable != t {
            inner.retain(|c| c.transportable != t);
            self.cargoes.insert(index, outer);
        }
        self.cargoes.extend(inner);
        true
    }

    /// Free space once every queued collection has happened.
    pub fn destination_capacity(&self, view: View<'_>, carrier: UnitId) -> i32 {
        let left = view.world.space_left(carrier, view.content) as i32;
        left + self
            .cargoes
            .iter()
            .map(|c| c.new_space(view).min(0))
            .sum::<i32>()
    }

    /// Plans `t` onto this carrier, replacing any earlier cargo for it.
    /// Cargoes meeting the carrier at the same rendezvous are wrapped together.
    pub fn queue(
        &mut self,
        view: View<'_>,
        carrier: UnitId,
        t: TransportableId,
        destination: Option<Location>,
    ) -> Result<(), PlanError> {
        let cargo = Cargo::new(view, t, carrier, destination, true)?;
        self.remove_cargo(t);
        match self.cargoes.iter_mut().find(|c| c.could_wrap(&cargo, view)) {
            Some(outer) => outer.wrap(cargo),
            None => self.cargoes.push(cargo),
        }
        Ok(())
    }

    /// One step of the carrier's transport duty.
    pub(crate) fn step(&mut self, ctx: &mut AiContext<'_>, carrier: UnitId) -> StepOutcome {
        self.prune(ctx, carrier);
        let start = ctx.world.unit(carrier).map(|u| u.location);
        let mut busy = false;
        if ctx.world.unit(carrier).is_some_and(|u| u.location.is_europe())
            && !ctx.world.is_sailing(carrier)
        {
            busy |= self.buy_for_wishes(ctx, carrier);
        }
        busy |= self.handle_stop(ctx, carrier);

        if ctx.world.is_sailing(carrier) {
            return idle_unless(busy);
        }
        self.refresh(ctx, carrier);
        self.target = self.next_stop(ctx.view(), carrier);
        let Some(next) = self.target else {
            return idle_unless(busy);
        };
        match travel_to(ctx, carrier, next, false) {
            MoveOutcome::Arrived | MoveOutcome::Moved => {
                self.handle_stop(ctx, carrier);
            }
            MoveOutcome::NoPath | MoveOutcome::Failed => self.fail_stop(ctx, carrier, next),
            MoveOutcome::Waiting => {}
        }
        let moved = ctx.world.unit(carrier).map(|u| u.location) != start;
        idle_unless(busy || moved)
    }

    /// Drops cargoes whose transportable vanished or was reassigned.
    fn prune(&mut self, ctx: &mut AiContext<'_>, carrier: UnitId) {
        let view = ctx.view();
        let stale: Vec<TransportableId> = self
            .cargoes
            .iter()
            .flat_map(Cargo::transportables)
            .filter(|t| {
                t.is_disposed(view)
                    || (t.carrier(view) != Some(carrier)
                        && t.assigned_transport(view.ai) != Some(carrier))
            })
            .collect();
        for t in stale {
            self.remove_cargo(t);
        }
    }

    /// Delivers and collects everything that can be handled where the
    /// carrier stands. True if anything changed hands.
    fn handle_stop(&mut self, ctx: &mut AiContext<'_>, carrier: UnitId) -> bool {
        let mut busy = false;
        let mut index = 0;
        while index < self.cargoes.len() {
            let view = ctx.view();
            let cargo = &self.cargoes[index];
            let ready_to_drop = cargo.is_deliverable(view);
            let ready_to_load = cargo.is_collectable(view);
            if ready_to_drop && deliver(ctx, carrier, cargo) {
                let mut done = self.cargoes.remove(index);
                self.cargoes.extend(done.unwrap());
                busy = true;
                continue;
            }
            if ready_to_load && collect(ctx, carrier, cargo.transportable) {
                let mut loaded = self.cargoes.remove(index);
                let inner = loaded.unwrap();
                loaded.reset_tries();
                match loaded.update(ctx.view()) {
                    Ok(()) => self.cargoes.insert(index, loaded),
                    Err(err) => {
                        debug!(
                            carrier = %carrier,
                            transportable = %loaded.transportable,
                            %err,
                            "replan after loading failed"
                        );
                        if loaded.dump(ctx.view()).is_ok() {
                            self.cargoes.insert(index, loaded);
                        } else {
                            loaded.transportable.set_transport(ctx.ai, None);
                        }
                    }
                }
                self.cargoes.extend(inner);
                busy = true;
            }
            index += 1;
        }
        busy
    }

    /// Re-plans every queued cargo against the current world.
    fn refresh(&mut self, ctx: &mut AiContext<'_>, carrier: UnitId) {
        let mut index = 0;
        while index < self.cargoes.len() {
            let view = ctx.view();
            let cargo = &mut self.cargoes[index];
            let aboard = cargo.transportable.carrier(view) == Some(carrier);
            let Err(err) = cargo.update(view) else {
                index += 1;
                continue;
            };
            let keep = if aboard {
                cargo.mode() == CargoMode::Dump || cargo.dump(view).is_ok()
            } else if err.is_invalid() {
                false
            } else {
                cargo.retry()
            };
            if keep {
                index += 1;
                continue;
            }
            debug!(
                carrier = %carrier,
                transportable = %cargo.transportable,
                %err,
                "cargo abandoned"
            );
            let t = cargo.transportable;
            self.remove_cargo(t);
            if t.assigned_transport(ctx.ai) == Some(carrier) {
                t.set_transport(ctx.ai, None);
            }
        }
    }

    /// The nearest stop of any queued cargo. Stops at the carrier's own
    /// position only count when nothing is waiting elsewhere.
    fn next_stop(&self, view: View<'_>, carrier: UnitId) -> Option<Location> {
        let here = view.world.unit(carrier).map(|u| u.location)?;
        let mut best: Option<(u32, Location)> = None;
        let mut waiting_here = false;
        for cargo in &self.cargoes {
            let stop = cargo.carrier_stop();
            if stop == here {
                waiting_here = true;
                continue;
            }
            let Some(turns) = carrier_turns_to(view, carrier, stop) else {
                continue;
            };
            if best.map_or(true, |(b, _)| turns < b) {
                best = Some((turns, stop));
            }
        }
        match best {
            Some((_, stop)) => Some(stop),
            None if waiting_here => Some(here),
            None => nearest_port(view, carrier, here),
        }
    }

    /// The carrier could not get to `stop`: every cargo bound there uses up
    /// a try, and is dumped or dropped once out of tries.
    fn fail_stop(&mut self, ctx: &mut AiContext<'_>, carrier: UnitId, stop: Location) {
        let mut exhausted = Vec::new();
        for cargo in self.cargoes.iter_mut().filter(|c| c.carrier_stop() == stop) {
            if !cargo.retry() {
                exhausted.push(cargo.transportable);
            }
        }
        for t in exhausted {
            let view = ctx.view();
            let dumped = match self.cargoes.iter_mut().find(|c| c.transportable == t) {
                Some(cargo) if cargo.mode() != CargoMode::Dump => cargo.dump(view).is_ok(),
                _ => false,
            };
            if dumped {
                continue;
            }
            warn!(carrier = %carrier, transportable = %t, "giving up on cargo");
            self.remove_cargo(t);
            if t.assigned_transport(ctx.ai) == Some(carrier) {
                t.set_transport(ctx.ai, None);
            }
        }
    }

    /// Buys goods in Europe for the best open goods wishes while the hold
    /// has room. True if anything was bought.
    fn buy_for_wishes(&mut self, ctx: &mut AiContext<'_>, carrier: UnitId) -> bool {
        let per_slot = ctx.content.constants.goods_per_slot;
        let wanted: Vec<GoodsTypeId> = ctx.scratch.wishes.goods_types().cloned().collect();
        let mut bought = false;
        for goods_type in wanted {
            let Some(wish_id) = best_goods_wish(ctx.view(), carrier, &goods_type) else {
                continue;
            };
            let Some((colony, amount)) = goods_shortfall(ctx.view(), wish_id, per_slot) else {
                continue;
            };
            let load = Command::LoadGoods {
                carrier,
                goods_type: goods_type.clone(),
                amount,
            };
            if let Err(err) = ctx.submit(load) {
                debug!(carrier = %carrier, goods = %goods_type, %err, "cannot buy goods");
                continue;
            }
            let id = ctx.ai.add_goods(
                goods_type,
                amount,
                Location::Aboard(carrier),
                Some(Location::Tile(colony)),
            );
            if let Some(parcel) = ctx.ai.goods.get_mut(&id) {
                parcel.wish = Some(wish_id);
            }
            let t = TransportableId::Goods(id);
            if let Err(err) = consume_goods_wish(ctx.ai, &mut ctx.scratch.wishes, wish_id, t) {
                warn!(%err, "goods wish taken twice");
            }
            match self.queue(ctx.view(), carrier, t, None) {
                Ok(()) => t.set_transport(ctx.ai, Some(carrier)),
                Err(err) => debug!(carrier = %carrier, %err, "bought goods cannot be planned"),
            }
            bought = true;
        }
        bought
    }
}

fn idle_unless(busy: bool) -> StepOutcome {
    if busy {
        StepOutcome::Progress
    } else {
        StepOutcome::Idle
    }
}

/// Colony tile and amount still missing for a goods wish, rounded to what
/// fits in whole slots.
fn goods_shortfall(view: View<'_>, wish: WishId, per_slot: u32) -> Option<(TilePos, u32)> {
    let wish = view.ai.wishes.get(&wish)?;
    let WishKind::Goods { goods_type, amount } = &wish.kind else {
        return None;
    };
    let colony = view.world.settlement(wish.destination)?;
    let have = view.world.settlement_goods(colony.id, goods_type);
    let missing = amount.saturating_sub(have).min(per_slot);
    (missing > 0).then_some((colony.tile, missing))
}

/// Nearest own connected port colony for an empty carrier to wait in.
fn nearest_port(view: View<'_>, carrier: UnitId, here: Location) -> Option<Location> {
    let faction = view.ai.faction;
    let ports: Vec<Location> = view
        .world
        .colonies_of(faction)
        .filter(|s| view.world.map.is_connected_port(s.tile))
        .map(|s| Location::Tile(s.tile))
        .collect();
    if ports.contains(&here) {
        return Some(here);
    }
    ports
        .into_iter()
        .filter_map(|p| carrier_turns_to(view, carrier, p).map(|t| (t, p)))
        .min_by_key(|(t, _)| *t)
        .map(|(_, p)| p)
}

/// Puts a transportable down at the carrier's current stop.
fn deliver(ctx: &mut AiContext<'_>, carrier: UnitId, cargo: &Cargo) -> bool {
    let Some(at) = ctx.world.unit(carrier).map(|u| u.location) else {
        return false;
    };
    let delivered = match cargo.transportable {
        TransportableId::Unit(unit) => {
            let to = match at {
                Location::Tile(pos) if !in_own_colony(ctx.view(), pos) => {
                    match landing_tile(ctx.view(), pos, cargo.plan.tdst) {
                        Some(tile) => Some(tile),
                        None => return false,
                    }
                }
                _ => None,
            };
            ctx.submit(Command::Disembark { unit, to }).is_ok()
        }
        TransportableId::Goods(id) => unload_parcel(ctx, carrier, id, at),
    };
    if delivered {
        debug!(carrier = %carrier, transportable = %cargo.transportable, "delivered");
        let t = cargo.transportable;
        if t.assigned_transport(ctx.ai) == Some(carrier) {
            t.set_transport(ctx.ai, None);
        }
    }
    delivered
}

fn in_own_colony(view: View<'_>, pos: TilePos) -> bool {
    view.world
        .settlement_at(pos)
        .is_some_and(|s| s.owner == view.ai.faction && s.kind == SettlementKind::Colony)
}

/// Land next to the carrier that a unit may step onto, closest to where it
/// is ultimately going.
fn landing_tile(view: View<'_>, pos: TilePos, goal: Location) -> Option<TilePos> {
    let faction = view.ai.faction;
    let world = view.world;
    world
        .map
        .neighbours(pos)
        .filter(|n| world.map.is_land(*n))
        .filter(|n| world.settlement_at(*n).map_or(true, |s| s.owner == faction))
        .filter(|n| {
            world
                .units_at(Location::Tile(*n))
                .all(|u| u.owner == faction)
        })
        .min_by_key(|n| goal.tile().map_or(0, |g| n.distance(g)))
}

fn unload_parcel(
    ctx: &mut AiContext<'_>,
    carrier: UnitId,
    id: GoodsId,
    at: Location,
) -> bool {
    let Some(parcel) = ctx.ai.goods.get(&id).cloned() else {
        return false;
    };
    let held = ctx
        .world
        .unit(carrier)
        .and_then(|u| u.goods.get(&parcel.goods_type).copied())
        .unwrap_or(0);
    let amount = parcel.amount.min(held);
    if amount > 0 {
        let unload = Command::UnloadGoods {
            carrier,
            goods_type: parcel.goods_type.clone(),
            amount,
        };
        if let Err(err) = ctx.submit(unload) {
            debug!(carrier = %carrier, goods = %id, %err, "unload refused");
            return false;
        }
    }
    let t = TransportableId::Goods(id);
    let arrived = parcel.destination == Some(at) || at.is_europe() || amount == 0;
    if arrived {
        match parcel.wish {
            Some(wish) if parcel.destination == Some(at) => {
                complete_wish(ctx.ai, &mut ctx.scratch.wishes, wish);
            }
            _ => release_bound(ctx.ai, &mut ctx.scratch.wishes, ctx.world, t),
        }
        ctx.ai.goods.remove(&id);
    } else if let Some(parcel) = ctx.ai.goods.get_mut(&id) {
        parcel.location = at;
        parcel.amount = amount;
    }
    true
}

/// Boards a unit or loads a parcel at the rendezvous.
fn collect(ctx: &mut AiContext<'_>, carrier: UnitId, t: TransportableId) -> bool {
    match t {
        TransportableId::Unit(unit) => ctx.submit(Command::Embark { unit, carrier }).is_ok(),
        TransportableId::Goods(id) => {
            let Some(parcel) = ctx.ai.goods.get(&id).cloned() else {
                return false;
            };
            let stock = parcel
                .location
                .tile()
                .and_then(|p| ctx.world.settlement_at(p))
                .map_or(0, |s| ctx.world.settlement_goods(s.id, &parcel.goods_type));
            let per_slot = ctx.content.constants.goods_per_slot;
            let amount = parcel.amount.min(stock);
            if amount == 0 {
                release_bound(ctx.ai, &mut ctx.scratch.wishes, ctx.world, t);
                ctx.ai.goods.remove(&id);
                return false;
            }
            let room = ctx.world.space_left(carrier, ctx.content);
            if goods_slots(amount, per_slot) > room {
                return false;
            }
            let load = Command::LoadGoods {
                carrier,
                goods_type: parcel.goods_type.clone(),
                amount,
            };
            if ctx.submit(load).is_err() {
                return false;
            }
            if let Some(parcel) = ctx.ai.goods.get_mut(&id) {
                parcel.location = Location::Aboard(carrier);
                parcel.amount = amount;
            }
            true
        }
    }
}

// ---------------------------------------------------------------------------
// Registry helpers
// ---------------------------------------------------------------------------

/// The transport mission of `carrier`, if it has one.
pub fn transport_mission(ai: &AiState, carrier: UnitId) -> Option<&TransportMission> {
    match ai.mission(carrier) {
        Some(Mission::Transport(tm)) => Some(tm),
        _ => None,
    }
}

fn take_transport(ai: &mut AiState, carrier: UnitId) -> Option<TransportMission> {
    let slot = &mut ai.units.get_mut(&carrier)?.mission;
    match slot.take() {
        Some(Mission::Transport(tm)) => Some(tm),
        other => {
            *slot = other;
            None
        }
    }
}

fn put_transport(ai: &mut AiState, carrier: UnitId, tm: TransportMission) {
    if let Some(unit) = ai.units.get_mut(&carrier) {
        unit.mission = Some(Mission::Transport(tm));
    }
}

/// Queues `t` on `carrier`'s transport mission and records the assignment.
pub fn queue_transportable(
    ctx: &mut AiContext<'_>,
    carrier: UnitId,
    t: TransportableId,
) -> Result<(), PlanError> {
    let mut tm = take_transport(ctx.ai, carrier).ok_or(PlanError::NullCarrier)?;
    let result = tm.queue(ctx.view(), carrier, t, None);
    put_transport(ctx.ai, carrier, tm);
    if result.is_ok() {
        t.set_transport(ctx.ai, Some(carrier));
    }
    result
}

/// Takes `t` off `carrier`'s queue and clears its assignment.
pub fn remove_transportable(ctx: &mut AiContext<'_>, carrier: UnitId, t: TransportableId) {
    if let Some(mut tm) = take_transport(ctx.ai, carrier) {
        tm.remove_cargo(t);
        put_transport(ctx.ai, carrier, tm);
    }
    if t.assigned_transport(ctx.ai) == Some(carrier) {
        t.set_transport(ctx.ai, None);
    }
}

/// Sends `t` off `carrier` at the nearest place it can leave.
pub fn dump_transportable(
    ctx: &mut AiContext<'_>,
    carrier: UnitId,
    t: TransportableId,
) -> Result<(), PlanError> {
    let mut tm = take_transport(ctx.ai, carrier).ok_or(PlanError::NullCarrier)?;
    let view = ctx.view();
    let mut result = Err(PlanError::NoDump);
    if let Some(index) = tm
        .cargoes
        .iter()
        .position(|c| c.transportables().contains(&t))
    {
        let mut outer = tm.cargoes.remove(index);
        let inner = outer.unwrap();
        tm.cargoes.push(outer);
        tm.cargoes.extend(inner);
        if let Some(cargo) = tm.cargoes.iter_mut().find(|c| c.transportable == t) {
            result = cargo.dump(view);
        }
    }
    put_transport(ctx.ai, carrier, tm);
    result
}
