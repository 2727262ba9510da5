//! Uniform accessors over units and goods parcels that may need a carrier.

use colony_core::path::{find_path, Traveller};
use colony_core::{goods_slots, Location, UnitId};

use crate::context::View;
use crate::types::{AiState, TransportableId};

/// Base priority of a parcel that fulfils a goods wish.
pub const WISH_GOODS_PRIORITY: i32 = 60;
/// Base priority of a parcel headed for market.
pub const EXPORT_GOODS_PRIORITY: i32 = 20;

impl TransportableId {
    pub fn is_disposed(self, view: View<'_>) -> bool {
        match self {
            TransportableId::Unit(id) => view.world.unit(id).is_none(),
            TransportableId::Goods(id) => !view.ai.goods.contains_key(&id),
        }
    }

    /// Raw location; `Aboard` while carried.
    pub fn location(self, view: View<'_>) -> Option<Location> {
        match self {
            TransportableId::Unit(id) => view.world.unit(id).map(|u| u.location),
            TransportableId::Goods(id) => view.ai.goods.get(&id).map(|g| g.location),
        }
    }

    /// Location resolved through any carrier.
    pub fn map_location(self, view: View<'_>) -> Option<Location> {
        self.location(view)
            .and_then(|l| view.world.resolve_location(l))
    }

    /// The carrier the transportable is physically aboard.
    pub fn carrier(self, view: View<'_>) -> Option<UnitId> {
        self.location(view).and_then(Location::carrier)
    }

    /// The carrier assigned to move it, aboard or not.
    pub fn assigned_transport(self, ai: &AiState) -> Option<UnitId> {
        match self {
            TransportableId::Unit(id) => ai.units.get(&id).and_then(|u| u.transport),
            TransportableId::Goods(id) => ai.goods.get(&id).and_then(|g| g.transport),
        }
    }

    /// Records the responsible carrier. Assignment resets the waiting priority.
    pub fn set_transport(self, ai: &mut AiState, carrier: Option<UnitId>) {
        let (slot, priority) = match self {
            TransportableId::Unit(id) => match ai.units.get_mut(&id) {
                Some(u) => (&mut u.transport, &mut u.transport_priority),
                None => return,
            },
            TransportableId::Goods(id) => match ai.goods.get_mut(&id) {
                Some(g) => (&mut g.transport, &mut g.transport_priority),
                None => return,
            },
        };
        *slot = carrier;
        if carrier.is_some() {
            *priority = 0;
        }
    }

    pub fn bump_priority(self, ai: &mut AiState, step: i32) {
        match self {
            TransportableId::Unit(id) => {
                if let Some(u) = ai.units.get_mut(&id) {
                    u.transport_priority += step;
                }
            }
            TransportableId::Goods(id) => {
                if let Some(g) = ai.goods.get_mut(&id) {
                    g.transport_priority += step;
                }
            }
        }
    }

    /// Cargo slots taken aboard a carrier.
    pub fn space_taken(self, view: View<'_>) -> u32 {
        match self {
            TransportableId::Unit(id) => view
                .world
                .unit(id)
                .and_then(|u| view.content.unit_type(&u.unit_type))
                .map_or(1, |d| d.space_taken),
            TransportableId::Goods(id) => view.ai.goods.get(&id).map_or(1, |g| {
                goods_slots(g.amount, view.content.constants.goods_per_slot)
            }),
        }
    }

    pub fn traveller(self, view: View<'_>) -> Option<Traveller> {
        match self {
            TransportableId::Unit(id) => Traveller::of_unit(view.world, view.content, id),
            TransportableId::Goods(id) => view
                .ai
                .goods
                .get(&id)
                .map(|_| Traveller::goods(view.ai.faction)),
        }
    }

    pub fn transport_priority(self, view: View<'_>) -> i32 {
        match self {
            TransportableId::Unit(id) => view.ai.units.get(&id).map_or(0, |u| {
                let base = u
                    .mission
                    .as_ref()
                    .map_or(0, |m| m.base_transport_priority());
                base + u.transport_priority
            }),
            TransportableId::Goods(id) => view.ai.goods.get(&id).map_or(0, |g| {
                let base = if g.wish.is_some() {
                    WISH_GOODS_PRIORITY
                } else {
                    EXPORT_GOODS_PRIORITY
                };
                base + g.transport_priority
            }),
        }
    }

    /// Where the transportable wants a carrier to take it. `None` means it
    /// does not currently need transport.
    pub fn transport_destination(self, view: View<'_>) -> Option<Location> {
        match self {
            TransportableId::Unit(id) => unit_destination(view, id),
            TransportableId::Goods(id) => {
                let goods = view.ai.goods.get(&id)?;
                let destination = goods.destination?;
                let aboard = goods.location.carrier().is_some();
                (aboard || goods.location != destination).then_some(destination)
            }
        }
    }
}

fn unit_destination(view: View<'_>, id: UnitId) -> Option<Location> {
    let unit = view.world.unit(id)?;
    let def = view.content.unit_type(&unit.unit_type)?;
    if def.naval {
        return None;
    }
    let target = view.ai.mission(id)?.target(view)?;
    match unit.location {
        Location::Aboard(_) => Some(target),
        Location::Europe => (target != Location::Europe).then_some(target),
        Location::Tile(_) if unit.location == target => None,
        Location::Tile(_) => {
            let walker = Traveller::of_unit(view.world, view.content, id)?;
            let walkable =
                find_path(view.world, view.content, &walker, unit.location, target, None).is_some();
            (!walkable).then_some(target)
        }
    }
}
