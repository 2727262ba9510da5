//! Cargo planning: how one carrier collects one transportable and where it
//! drops it.
//!
//! A plan names four locations. `twait` and `cwait` are where the
//! transportable and the carrier wait for each other; they are equal when
//! boarding needs no extra step (inside a settlement, in Europe, or when the
//! transportable is already aboard). `cdst` is the last location the carrier
//! has to visit and `tdst` the final destination of the transportable, which
//! may lie further inland.

use colony_core::path::{find_path, intermediate_path, search, CarrierSpec, Traveller};
use colony_core::{Location, SettlementKind, UnitId, VoyageLeg};
use serde::{Deserialize, Serialize};
use smallvec::{smallvec, SmallVec};
use thiserror::Error;

use crate::context::View;
use crate::types::TransportableId;

/// Attempts a cargo gets before it is abandoned.
pub const MAX_TRY: u32 = 3;

/// Turn horizon for partial-progress plans.
const FALLBACK_TURNS: u32 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CargoMode {
    /// Board where both parties already wait together.
    Load,
    /// Leave the carrier at its final stop.
    Unload,
    /// Board from a neighbouring tile.
    Pickup,
    /// Leave the carrier short of the destination and continue alone.
    Dropoff,
    /// Leave the carrier wherever is nearest.
    Dump,
}

impl CargoMode {
    /// The transportable has not boarded yet.
    pub fn is_collection(self) -> bool {
        matches!(self, CargoMode::Load | CargoMode::Pickup)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlanError {
    #[error("invalid-disposed")]
    Disposed,
    #[error("invalid-null-carrier")]
    NullCarrier,
    #[error("invalid-null-destination")]
    NullDestination,
    #[error("invalid-collected-elsewhere")]
    CollectedElsewhere,
    #[error("no-deliver {transportable}/{carrier}")]
    NoDeliver {
        transportable: TransportableId,
        carrier: UnitId,
    },
    #[error("invalid-transport-not-needed")]
    TransportNotNeeded,
    #[error("no-collect")]
    NoCollect,
    #[error("no-dump")]
    NoDump,
}

impl PlanError {
    /// Structural failures: no carrier will do better this pass.
    pub fn is_invalid(&self) -> bool {
        matches!(
            self,
            PlanError::Disposed
                | PlanError::NullCarrier
                | PlanError::NullDestination
                | PlanError::CollectedElsewhere
                | PlanError::TransportNotNeeded
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CargoPlan {
    pub twait: Location,
    pub cwait: Location,
    pub cdst: Location,
    pub tdst: Location,
    /// Estimated turns until the transportable reaches `tdst`.
    pub turns: u32,
    /// Turns the carrier needs to reach `cwait`.
    pub carrier_turns: u32,
    pub mode: CargoMode,
    /// The plan only gets closer to the destination.
    pub fallback: bool,
}

/// Where the carrier effectively is, and how long until it is there.
fn carrier_position(view: View<'_>, carrier: UnitId) -> Option<(Location, u32)> {
    let unit = view.world.unit(carrier)?;
    match unit.voyage {
        Some(voyage) => {
            let delay = voyage.arrives_turn.saturating_sub(view.world.meta.turn) as u32;
            let at = match voyage.to {
                VoyageLeg::ToEurope => Location::Europe,
                VoyageLeg::ToAmerica => {
                    Location::Tile(view.world.factions.get(&unit.owner)?.entry_location)
                }
            };
            Some((at, delay))
        }
        None => Some((view.world.resolve_location(unit.location)?, 0)),
    }
}

/// Turns for `carrier` to sail or drive to `to`.
pub fn carrier_turns_to(view: View<'_>, carrier: UnitId, to: Location) -> Option<u32> {
    let (at, delay) = carrier_position(view, carrier)?;
    if at == to {
        return Some(delay);
    }
    let mut driver = Traveller::of_unit(view.world, view.content, carrier)?;
    if delay > 0 {
        driver.moves_left = driver.speed;
    }
    let path = find_path(view.world, view.content, &driver, at, to, None)?;
    Some(delay + path.total_turns())
}

/// Plans moving `transportable` with `carrier` to `destination`, or to the
/// transportable's own transport destination when none is given.
pub fn plan(
    view: View<'_>,
    transportable: TransportableId,
    carrier: Option<UnitId>,
    destination: Option<Location>,
    allow_fallback: bool,
) -> Result<CargoPlan, PlanError> {
    if transportable.is_disposed(view) {
        return Err(PlanError::Disposed);
    }
    let carrier = carrier.ok_or(PlanError::NullCarrier)?;
    let spec =
        CarrierSpec::of_unit(view.world, view.content, carrier).ok_or(PlanError::NullCarrier)?;
    let destination = destination
        .or_else(|| transportable.transport_destination(view))
        .ok_or(PlanError::NullDestination)?;

    let start = transportable.location(view).ok_or(PlanError::Disposed)?;
    let aboard = match start.carrier() {
        Some(other) if other != carrier => return Err(PlanError::CollectedElsewhere),
        Some(_) => true,
        None => false,
    };

    let traveller = transportable.traveller(view).ok_or(PlanError::Disposed)?;
    let no_deliver = PlanError::NoDeliver {
        transportable,
        carrier,
    };
    let direct = find_path(
        view.world,
        view.content,
        &traveller,
        start,
        destination,
        Some(&spec),
    );
    let (path, fallback) = match direct {
        Some(path) => (path, false),
        None if allow_fallback => {
            let partial = intermediate_path(
                view.world,
                view.content,
                &traveller,
                start,
                destination,
                FALLBACK_TURNS,
                Some(&spec),
            )
            .ok_or(no_deliver)?;
            (partial, true)
        }
        None => return Err(no_deliver),
    };

    let pickup = path.carrier_move().ok_or(PlanError::TransportNotNeeded)?;
    let nodes = path.nodes();
    let last = path.last().ok_or(PlanError::TransportNotNeeded)?;
    let tdst = last.location;
    let cdst = match path.transport_drop() {
        Some(drop) if drop > 0 => nodes[drop - 1].location,
        _ => tdst,
    };
    let delivery_mode = if cdst.is_europe() || cdst == tdst {
        CargoMode::Unload
    } else {
        CargoMode::Dropoff
    };

    if aboard {
        let here = nodes[pickup].location;
        return Ok(CargoPlan {
            twait: here,
            cwait: here,
            cdst,
            tdst,
            turns: path.total_turns(),
            carrier_turns: 0,
            mode: delivery_mode,
            fallback,
        });
    }

    let cwait = nodes[pickup].location;
    let (twait, transportable_turns) = match pickup.checked_sub(1) {
        Some(before) => (nodes[before].location, nodes[before].turns),
        None => (cwait, 0),
    };
    let carrier_turns = carrier_turns_to(view, carrier, cwait).ok_or(PlanError::NoCollect)?;
    let remaining = path.total_turns().saturating_sub(nodes[pickup].turns);
    Ok(CargoPlan {
        twait,
        cwait,
        cdst,
        tdst,
        turns: transportable_turns.max(carrier_turns) + remaining,
        carrier_turns,
        mode: if twait == cwait {
            CargoMode::Load
        } else {
            CargoMode::Pickup
        },
        fallback,
    })
}

// ---------------------------------------------------------------------------
// Cargo
// ---------------------------------------------------------------------------

/// One transportable bound to one carrier, with its current plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cargo {
    pub transportable: TransportableId,
    pub carrier: UnitId,
    pub plan: CargoPlan,
    /// Explicit destination overriding the transportable's own.
    #[serde(default)]
    pub destination: Option<Location>,
    #[serde(default)]
    tries: u32,
    #[serde(default)]
    allow_fallback: bool,
    #[serde(default)]
    wrapped: Vec<Cargo>,
}

impl Cargo {
    pub fn new(
        view: View<'_>,
        transportable: TransportableId,
        carrier: UnitId,
        destination: Option<Location>,
        allow_fallback: bool,
    ) -> Result<Self, PlanError> {
        let plan = plan(view, transportable, Some(carrier), destination, allow_fallback)?;
        Ok(Self {
            transportable,
            carrier,
            plan,
            destination,
            tries: 0,
            allow_fallback,
            wrapped: Vec::new(),
        })
    }

    pub fn mode(&self) -> CargoMode {
        self.plan.mode
    }

    /// Where the carrier has to go next for this cargo.
    pub fn carrier_stop(&self) -> Location {
        if self.plan.mode.is_collection() {
            self.plan.cwait
        } else {
            self.plan.cdst
        }
    }

    /// Re-plans against the current world, keeping the fallback tolerance.
    /// A dumped cargo stays dumped.
    pub fn update(&mut self, view: View<'_>) -> Result<(), PlanError> {
        if self.plan.mode == CargoMode::Dump {
            return self.dump(view);
        }
        self.plan = plan(
            view,
            self.transportable,
            Some(self.carrier),
            self.destination,
            self.allow_fallback,
        )?;
        Ok(())
    }

    /// Retargets the cargo to the nearest place the carrier can simply put
    /// it down: an own colony, Europe, or (for units) any shore.
    pub fn dump(&mut self, view: View<'_>) -> Result<(), PlanError> {
        if self.transportable.carrier(view) != Some(self.carrier) {
            return Err(PlanError::NoDump);
        }
        let (at, _) = carrier_position(view, self.carrier).ok_or(PlanError::NoDump)?;
        let driver =
            Traveller::of_unit(view.world, view.content, self.carrier).ok_or(PlanError::NoDump)?;
        let faction = view.ai.faction;
        let unit = matches!(self.transportable, TransportableId::Unit(_));
        let map = &view.world.map;
        let trivial = |location: Location| match location {
            Location::Europe => true,
            Location::Tile(pos) => {
                let own_colony = view
                    .world
                    .settlement_at(pos)
                    .is_some_and(|s| s.owner == faction && s.kind == SettlementKind::Colony);
                let shore = map.is_water(pos) && map.neighbours(pos).any(|n| map.is_land(n));
                own_colony || (unit && shore)
            }
            Location::Aboard(_) => false,
        };
        let path = search(
            view.world,
            view.content,
            &driver,
            at,
            trivial,
            view.config.many_turns,
            None,
        )
        .ok_or(PlanError::NoDump)?;
        let stop = path.last().map_or(at, |n| n.location);
        self.plan = CargoPlan {
            twait: at,
            cwait: at,
            cdst: stop,
            tdst: stop,
            turns: path.total_turns(),
            carrier_turns: 0,
            mode: CargoMode::Dump,
            fallback: false,
        };
        Ok(())
    }

    /// Counts a failed attempt. False once the cargo has used up its tries.
    pub fn retry(&mut self) -> bool {
        self.tries = self.tries.saturating_add(1);
        self.tries <= MAX_TRY
    }

    pub fn reset_tries(&mut self) {
        self.tries = 0;
    }

    /// Change in free carrier space when this cargo (and anything it wraps)
    /// progresses: negative while collecting, positive while delivering.
    pub fn new_space(&self, view: View<'_>) -> i32 {
        let space = self.transportable.space_taken(view) as i32;
        let own = if self.plan.mode.is_collection() {
            -space
        } else {
            space
        };
        own + self.wrapped.iter().map(|c| c.new_space(view)).sum::<i32>()
    }

    /// Both cargoes board the same carrier at the same point.
    pub fn could_wrap(&self, other: &Cargo, view: View<'_>) -> bool {
        self.transportable != other.transportable
            && self.carrier == other.carrier
            && self.plan.cwait == other.plan.cwait
            && self.new_space(view) < 0
            && other.new_space(view) < 0
    }

    pub fn wrap(&mut self, other: Cargo) {
        self.wrapped.push(other);
    }

    pub fn unwrap(&mut self) -> Vec<Cargo> {
        std::mem::take(&mut self.wrapped)
    }

    pub fn has_wrapped(&self) -> bool {
        !self.wrapped.is_empty()
    }

    pub fn wrapped(&self) -> &[Cargo] {
        &self.wrapped
    }

    /// Both parties stand at their rendezvous points.
    pub fn is_collectable(&self, view: View<'_>) -> bool {
        if !self.plan.mode.is_collection() || view.world.is_sailing(self.carrier) {
            return false;
        }
        let carrier_at = view.world.unit(self.carrier).map(|u| u.location);
        self.transportable.location(view) == Some(self.plan.twait)
            && carrier_at == Some(self.plan.cwait)
    }

    /// Aboard, and the carrier has reached its drop point.
    pub fn is_deliverable(&self, view: View<'_>) -> bool {
        if self.plan.mode.is_collection() || view.world.is_sailing(self.carrier) {
            return false;
        }
        let carrier_at = view.world.unit(self.carrier).map(|u| u.location);
        self.transportable.carrier(view) == Some(self.carrier)
            && carrier_at == Some(self.plan.cdst)
    }

    pub fn is_delivered(&self, view: View<'_>) -> bool {
        !self.plan.mode.is_collection() && self.transportable.carrier(view) != Some(self.carrier)
    }

    /// This cargo and everything wrapped inside it.
    pub fn transportables(&self) -> SmallVec<[TransportableId; 4]> {
        let mut out: SmallVec<[TransportableId; 4]> = smallvec![self.transportable];
        for inner in &self.wrapped {
            out.extend(inner.transportables());
        }
        out
    }
}
