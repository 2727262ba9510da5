//! AI-side registry: the per-faction objects layered over the world model.

use std::collections::BTreeMap;

use colony_core::{FactionId, GoodsTypeId, Location, SettlementId, UnitId};
use serde::{Deserialize, Serialize};

use crate::mission::Mission;
use crate::tile_plan::TileImprovementPlan;
use crate::wish::Wish;

// ---------------------------------------------------------------------------
// ID newtypes
// ---------------------------------------------------------------------------

macro_rules! ai_id {
    ($name:ident, $prefix:literal) => {
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        pub struct $name(pub u32);

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, concat!($prefix, ":{}"), self.0)
            }
        }
    };
}

ai_id!(GoodsId, "goods");
ai_id!(WishId, "wish");

/// Anything the transport broker can move: a unit, or an AI goods parcel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TransportableId {
    Unit(UnitId),
    Goods(GoodsId),
}

impl std::fmt::Display for TransportableId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportableId::Unit(id) => id.fmt(f),
            TransportableId::Goods(id) => id.fmt(f),
        }
    }
}

// ---------------------------------------------------------------------------
// Registry entries
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AiUnit {
    pub unit: UnitId,
    #[serde(default)]
    pub mission: Option<Mission>,
    /// Carrier currently responsible for moving this unit.
    #[serde(default)]
    pub transport: Option<UnitId>,
    /// Grows every turn the unit waits for a carrier; reset on assignment.
    #[serde(default)]
    pub transport_priority: i32,
}

impl AiUnit {
    pub fn new(unit: UnitId) -> Self {
        Self {
            unit,
            mission: None,
            transport: None,
            transport_priority: 0,
        }
    }

    pub fn has_mission(&self) -> bool {
        self.mission.is_some()
    }
}

/// A parcel of goods the AI wants moved, at most one cargo slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AiGoods {
    pub id: GoodsId,
    pub goods_type: GoodsTypeId,
    pub amount: u32,
    pub location: Location,
    #[serde(default)]
    pub destination: Option<Location>,
    #[serde(default)]
    pub wish: Option<WishId>,
    #[serde(default)]
    pub transport: Option<UnitId>,
    #[serde(default)]
    pub transport_priority: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AiColony {
    pub settlement: SettlementId,
    #[serde(default)]
    pub wishes: Vec<WishId>,
    #[serde(default)]
    pub plans: Vec<TileImprovementPlan>,
}

impl AiColony {
    pub fn new(settlement: SettlementId) -> Self {
        Self {
            settlement,
            wishes: Vec::new(),
            plans: Vec::new(),
        }
    }
}

/// Everything one faction's AI remembers between turns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AiState {
    pub faction: FactionId,
    #[serde(default)]
    pub units: BTreeMap<UnitId, AiUnit>,
    #[serde(default)]
    pub goods: BTreeMap<GoodsId, AiGoods>,
    #[serde(default)]
    pub colonies: BTreeMap<SettlementId, AiColony>,
    #[serde(default)]
    pub wishes: BTreeMap<WishId, Wish>,
    #[serde(default)]
    pub next_goods_id: u32,
    #[serde(default)]
    pub next_wish_id: u32,
    /// Set when last turn's transport maps wanted more carriers than exist.
    #[serde(default)]
    pub carrier_shortfall: bool,
}

impl AiState {
    pub fn new(faction: FactionId) -> Self {
        Self {
            faction,
            units: BTreeMap::new(),
            goods: BTreeMap::new(),
            colonies: BTreeMap::new(),
            wishes: BTreeMap::new(),
            next_goods_id: 0,
            next_wish_id: 0,
            carrier_shortfall: false,
        }
    }

    pub fn mission(&self, unit: UnitId) -> Option<&Mission> {
        self.units.get(&unit).and_then(|u| u.mission.as_ref())
    }

    pub fn add_goods(
        &mut self,
        goods_type: GoodsTypeId,
        amount: u32,
        location: Location,
        destination: Option<Location>,
    ) -> GoodsId {
        let id = GoodsId(self.next_goods_id);
        self.next_goods_id += 1;
        self.goods.insert(
            id,
            AiGoods {
                id,
                goods_type,
                amount,
                location,
                destination,
                wish: None,
                transport: None,
                transport_priority: 0,
            },
        );
        id
    }

    pub fn next_wish_id(&mut self) -> WishId {
        let id = WishId(self.next_wish_id);
        self.next_wish_id += 1;
        id
    }
}
