//! Wish registry: open demand for workers and goods at owned colonies.
//!
//! Wishes live in `AiState::wishes`; the per-turn `WishIndex` keys the open
//! ones by unit type and goods type. Binding a wish to a transportable
//! removes it from the index in the same call, so no two units or parcels
//! can be sent after the same wish.

use std::collections::BTreeMap;

use colony_core::path::{find_path, CarrierSpec, Traveller};
use colony_core::{GameState, GoodsTypeId, Location, SettlementId, UnitId, UnitTypeId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::AiConfig;
use crate::context::View;
use crate::types::{AiState, TransportableId, WishId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum WishKind {
    Worker {
        unit_type: UnitTypeId,
        expert_required: bool,
    },
    /// Wants the colony stock of `goods_type` raised to `amount`.
    Goods { goods_type: GoodsTypeId, amount: u32 },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Wish {
    pub id: WishId,
    pub destination: SettlementId,
    pub value: i32,
    #[serde(default)]
    pub transportable: Option<TransportableId>,
    pub kind: WishKind,
}

impl Wish {
    pub fn is_open(&self) -> bool {
        self.transportable.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WishError {
    #[error("{0} does not exist")]
    Unknown(WishId),
    #[error("{0} is already bound to {1}")]
    AlreadyBound(WishId, TransportableId),
    #[error("{0} is the wrong kind of wish")]
    WrongKind(WishId),
}

// ---------------------------------------------------------------------------
// Index
// ---------------------------------------------------------------------------

/// Open wishes keyed by the type they ask for. Buckets are kept in id order;
/// queries rank by value.
#[derive(Debug, Clone, Default)]
pub struct WishIndex {
    worker: BTreeMap<UnitTypeId, Vec<WishId>>,
    goods: BTreeMap<GoodsTypeId, Vec<WishId>>,
}

impl WishIndex {
    /// Full rescan of every open wish at an owned colony.
    pub fn rebuild(ai: &AiState, world: &GameState) -> Self {
        let mut index = Self::default();
        for wish in open_wishes(ai, world) {
            index.insert(wish);
        }
        index
    }

    pub fn insert(&mut self, wish: &Wish) {
        let bucket = match &wish.kind {
            WishKind::Worker { unit_type, .. } => self.worker.entry(unit_type.clone()).or_default(),
            WishKind::Goods { goods_type, .. } => self.goods.entry(goods_type.clone()).or_default(),
        };
        if bucket.contains(&wish.id) {
            return;
        }
        bucket.push(wish.id);
        bucket.sort_by_key(|id| *id);
    }

    pub fn remove(&mut self, id: WishId) {
        for bucket in self.worker.values_mut().chain(self.goods.values_mut()) {
            bucket.retain(|w| *w != id);
        }
    }

    pub fn worker(&self, unit_type: &UnitTypeId) -> &[WishId] {
        self.worker.get(unit_type).map_or(&[], Vec::as_slice)
    }

    pub fn goods(&self, goods_type: &GoodsTypeId) -> &[WishId] {
        self.goods.get(goods_type).map_or(&[], Vec::as_slice)
    }

    pub fn goods_types(&self) -> impl Iterator<Item = &GoodsTypeId> {
        self.goods
            .iter()
            .filter(|(_, ids)| !ids.is_empty())
            .map(|(g, _)| g)
    }

    pub fn is_empty(&self) -> bool {
        self.worker.values().all(Vec::is_empty) && self.goods.values().all(Vec::is_empty)
    }
}

fn open_wishes<'a>(ai: &'a AiState, world: &'a GameState) -> impl Iterator<Item = &'a Wish> {
    ai.wishes.values().filter(move |w| {
        w.is_open()
            && world
                .settlement(w.destination)
                .is_some_and(|s| s.owner == ai.faction)
    })
}

fn by_value(ai: &AiState, ids: &mut [WishId]) {
    ids.sort_by(|a, b| {
        let va = ai.wishes.get(a).map_or(i32::MIN, |w| w.value);
        let vb = ai.wishes.get(b).map_or(i32::MIN, |w| w.value);
        vb.cmp(&va).then(a.cmp(b))
    });
}

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

/// Every open wish of the faction, most valuable first.
pub fn wishes<'a>(view: View<'a>) -> Vec<&'a Wish> {
    let mut out: Vec<&Wish> = open_wishes(view.ai, view.world).collect();
    out.sort_by(|a, b| b.value.cmp(&a.value).then(a.id.cmp(&b.id)));
    out
}

fn filter_at(view: View<'_>, ids: &[WishId], location: Option<Location>) -> Vec<WishId> {
    let mut out: Vec<WishId> = ids
        .iter()
        .copied()
        .filter(|id| {
            let Some(wish) = view.ai.wishes.get(id) else {
                return false;
            };
            location.map_or(true, |at| {
                view.world
                    .settlement(wish.destination)
                    .is_some_and(|s| Location::Tile(s.tile) == at)
            })
        })
        .collect();
    by_value(view.ai, &mut out);
    out
}

/// Open worker wishes for `unit_type`, optionally only those at `location`.
pub fn worker_wishes_at(
    view: View<'_>,
    location: Option<Location>,
    unit_type: &UnitTypeId,
) -> Vec<WishId> {
    filter_at(view, view.scratch.wishes.worker(unit_type), location)
}

pub fn goods_wishes_at(
    view: View<'_>,
    location: Option<Location>,
    goods_type: &GoodsTypeId,
) -> Vec<WishId> {
    filter_at(view, view.scratch.wishes.goods(goods_type), location)
}

/// Reachable wishes score `value / turns` and always outrank unreachable
/// ones, which are ranked by raw value. Ties keep the earlier candidate.
fn best_of(
    view: View<'_>,
    candidates: &[WishId],
    mut turns_to: impl FnMut(Location) -> Option<u32>,
) -> Option<WishId> {
    let many_turns = view.config.many_turns;
    let mut best: Option<((bool, i64), WishId)> = None;
    for id in candidates {
        let Some(wish) = view.ai.wishes.get(id) else {
            continue;
        };
        let Some(colony) = view.world.settlement(wish.destination) else {
            continue;
        };
        let score = match turns_to(Location::Tile(colony.tile)) {
            Some(turns) if turns < many_turns => {
                (true, i64::from(wish.value) * 100 / i64::from(turns.max(1)))
            }
            _ => (false, i64::from(wish.value)),
        };
        if best.map_or(true, |(b, _)| score > b) {
            best = Some((score, *id));
        }
    }
    best.map(|(_, id)| id)
}

fn unit_turns(view: View<'_>, unit: UnitId, to: Location) -> Option<u32> {
    let state = view.world.unit(unit)?;
    let traveller = Traveller::of_unit(view.world, view.content, unit)?;
    let ship = CarrierSpec::virtual_ship(view.config.virtual_ship_speed);
    let carrier = (state.location.tile().is_none()).then_some(&ship);
    find_path(view.world, view.content, &traveller, state.location, to, carrier)
        .map(|p| p.total_turns())
}

/// Best open worker wish of `unit_type` for `unit` to realize.
pub fn best_worker_wish(
    view: View<'_>,
    unit: UnitId,
    unit_type: &UnitTypeId,
) -> Option<WishId> {
    best_of(view, view.scratch.wishes.worker(unit_type), |to| {
        unit_turns(view, unit, to)
    })
}

/// Best open goods wish of `goods_type` for `carrier` to deliver.
pub fn best_goods_wish(
    view: View<'_>,
    carrier: UnitId,
    goods_type: &GoodsTypeId,
) -> Option<WishId> {
    best_of(view, view.scratch.wishes.goods(goods_type), |to| {
        crate::cargo::carrier_turns_to(view, carrier, to)
    })
}

// ---------------------------------------------------------------------------
// Mutation
// ---------------------------------------------------------------------------

fn consume(
    ai: &mut AiState,
    index: &mut WishIndex,
    id: WishId,
    transportable: TransportableId,
    worker: bool,
) -> Result<(), WishError> {
    let wish = ai.wishes.get_mut(&id).ok_or(WishError::Unknown(id))?;
    if matches!(wish.kind, WishKind::Worker { .. }) != worker {
        return Err(WishError::WrongKind(id));
    }
    if let Some(bound) = wish.transportable {
        return Err(WishError::AlreadyBound(id, bound));
    }
    wish.transportable = Some(transportable);
    index.remove(id);
    Ok(())
}

/// Binds a worker wish to the unit sent to realize it.
pub fn consume_worker_wish(
    ai: &mut AiState,
    index: &mut WishIndex,
    id: WishId,
    transportable: TransportableId,
) -> Result<(), WishError> {
    consume(ai, index, id, transportable, true)
}

/// Binds a goods wish to the parcel that will fulfil it.
pub fn consume_goods_wish(
    ai: &mut AiState,
    index: &mut WishIndex,
    id: WishId,
    transportable: TransportableId,
) -> Result<(), WishError> {
    consume(ai, index, id, transportable, false)
}

/// Removes a satisfied wish everywhere.
pub fn complete_wish(ai: &mut AiState, index: &mut WishIndex, id: WishId) {
    index.remove(id);
    if let Some(wish) = ai.wishes.remove(&id) {
        if let Some(colony) = ai.colonies.get_mut(&wish.destination) {
            colony.wishes.retain(|w| *w != id);
        }
    }
    for goods in ai.goods.values_mut() {
        if goods.wish == Some(id) {
            goods.wish = None;
        }
    }
}

/// Unbinds a wish whose transportable gave up, reopening it.
pub fn release_wish(ai: &mut AiState, index: &mut WishIndex, world: &GameState, id: WishId) {
    let Some(wish) = ai.wishes.get_mut(&id) else {
        return;
    };
    wish.transportable = None;
    let owned = world
        .settlement(wish.destination)
        .is_some_and(|s| s.owner == ai.faction);
    if owned {
        index.insert(wish);
    }
}

/// Releases every wish bound to `transportable`.
pub fn release_bound(
    ai: &mut AiState,
    index: &mut WishIndex,
    world: &GameState,
    transportable: TransportableId,
) {
    let bound: Vec<WishId> = ai
        .wishes
        .values()
        .filter(|w| w.transportable == Some(transportable))
        .map(|w| w.id)
        .collect();
    for id in bound {
        release_wish(ai, index, world, id);
    }
}

/// Open wishes grow more urgent every turn they stay open.
pub fn grow_wishes(ai: &mut AiState, config: &AiConfig) {
    for wish in ai.wishes.values_mut().filter(|w| w.is_open()) {
        wish.value = wish.value.saturating_add(config.wish_value_growth);
    }
}
