//! Type definitions for `colony_core`.
//!
//! All public types, structs, enums, and ID newtypes used by the world model.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// ID newtypes
// ---------------------------------------------------------------------------

macro_rules! string_id {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(id: &str) -> Self {
                Self(id.to_string())
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

/// Arena-style ids: a slot index that is never reused once disposed.
macro_rules! index_id {
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

string_id!(UnitTypeId);
string_id!(GoodsTypeId);
string_id!(CommandId);
string_id!(EventId);

index_id!(UnitId, "unit");
index_id!(SettlementId, "settlement");
index_id!(FactionId, "faction");

// ---------------------------------------------------------------------------
// Geometry
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TilePos {
    pub x: i32,
    pub y: i32,
}

impl TilePos {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Chebyshev distance: diagonal steps cost the same as orthogonal ones.
    pub fn distance(self, other: TilePos) -> u32 {
        (self.x - other.x)
            .unsigned_abs()
            .max((self.y - other.y).unsigned_abs())
    }

    pub fn is_adjacent(self, other: TilePos) -> bool {
        self.distance(other) == 1
    }
}

impl std::fmt::Display for TilePos {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({},{})", self.x, self.y)
    }
}

/// Where a unit (or an AI goods parcel) is.
///
/// Settlements are addressed through their tile; `Europe` is the single
/// administrative location reached by sailing off the high seas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Location {
    Tile(TilePos),
    Europe,
    Aboard(UnitId),
}

impl Location {
    pub fn tile(self) -> Option<TilePos> {
        match self {
            Location::Tile(pos) => Some(pos),
            Location::Europe | Location::Aboard(_) => None,
        }
    }

    pub fn is_europe(self) -> bool {
        matches!(self, Location::Europe)
    }

    pub fn carrier(self) -> Option<UnitId> {
        match self {
            Location::Aboard(carrier) => Some(carrier),
            Location::Tile(_) | Location::Europe => None,
        }
    }
}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Location::Tile(pos) => write!(f, "tile{pos}"),
            Location::Europe => f.write_str("europe"),
            Location::Aboard(carrier) => write!(f, "aboard {carrier}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Core enums
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Terrain {
    Ocean,
    /// Ocean from which ships may sail to Europe.
    HighSeas,
    Plains,
    Grassland,
    Forest,
    Hills,
    Mountains,
}

impl Terrain {
    pub fn is_land(self) -> bool {
        !self.is_water()
    }

    pub fn is_water(self) -> bool {
        matches!(self, Terrain::Ocean | Terrain::HighSeas)
    }

    /// Rough desirability of the tile as a colony site.
    pub fn colony_value(self) -> i32 {
        match self {
            Terrain::Plains => 5,
            Terrain::Grassland | Terrain::Hills => 4,
            Terrain::Forest => 3,
            Terrain::Mountains => 1,
            Terrain::Ocean | Terrain::HighSeas => 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ImprovementKind {
    Plow,
    Road,
    ClearForest,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Role {
    Default,
    Soldier,
    Dragoon,
    Pioneer,
    Scout,
    Missionary,
}

impl Role {
    pub fn is_armed(self) -> bool {
        matches!(self, Role::Soldier | Role::Dragoon)
    }

    pub fn is_mounted(self) -> bool {
        matches!(self, Role::Dragoon | Role::Scout)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Stance {
    Unknown,
    Peace,
    Ceasefire,
    Alliance,
    War,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FactionKind {
    /// A colonial power running settlements, wishes and transport.
    European,
    Native,
    /// The royal expeditionary force sent against rebels.
    Royal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SettlementKind {
    Colony,
    Native,
}

// ---------------------------------------------------------------------------
// State types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameState {
    pub meta: MetaState,
    pub map: MapState,
    /// Unit arena. A disposed unit leaves `None` in its slot.
    pub units: Vec<Option<UnitState>>,
    pub settlements: BTreeMap<SettlementId, SettlementState>,
    pub factions: BTreeMap<FactionId, FactionState>,
    pub europe: EuropeState,
    pub counters: Counters,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetaState {
    pub turn: u64,
    pub seed: u64,
    pub schema_version: u32,
    pub content_version: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Counters {
    pub next_event_id: u64,
    pub next_command_id: u64,
    pub next_settlement_id: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MapState {
    pub width: i32,
    pub height: i32,
    /// Row-major, `width * height` entries.
    pub tiles: Vec<TileState>,
    /// Water regions that touch the high seas.
    #[serde(default)]
    pub ocean_regions: BTreeSet<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TileState {
    pub terrain: Terrain,
    #[serde(default)]
    pub improvements: Vec<ImprovementKind>,
    #[serde(default)]
    pub owner: Option<FactionId>,
    #[serde(default)]
    pub settlement: Option<SettlementId>,
    #[serde(default)]
    pub rumour: bool,
    /// Contiguous land mass or body of water; assigned by `MapState::label_regions`.
    #[serde(default)]
    pub region: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnitState {
    pub id: UnitId,
    pub unit_type: UnitTypeId,
    pub owner: FactionId,
    pub location: Location,
    pub moves_left: u32,
    pub role: Role,
    /// Remaining uses of the role equipment (pioneer tool kits).
    #[serde(default)]
    pub role_uses: u32,
    #[serde(default)]
    pub work: Option<TileWork>,
    #[serde(default)]
    pub working_in: Option<SettlementId>,
    #[serde(default)]
    pub work_goods: Option<GoodsTypeId>,
    /// Goods carried in the hold (carriers, native braves).
    #[serde(default)]
    pub goods: BTreeMap<GoodsTypeId, u32>,
    #[serde(default)]
    pub treasure: u32,
    #[serde(default)]
    pub fortified: bool,
    /// Member of a royal expeditionary force.
    #[serde(default)]
    pub expeditionary: bool,
    #[serde(default)]
    pub home_settlement: Option<SettlementId>,
    /// Set while sailing between Europe and the map; the unit cannot act until then.
    #[serde(default)]
    pub voyage: Option<Voyage>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Voyage {
    pub to: VoyageLeg,
    pub arrives_turn: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VoyageLeg {
    ToEurope,
    ToAmerica,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileWork {
    pub tile: TilePos,
    pub improvement: ImprovementKind,
    pub turns_left: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettlementState {
    pub id: SettlementId,
    pub name: String,
    pub owner: FactionId,
    pub tile: TilePos,
    pub kind: SettlementKind,
    #[serde(default)]
    pub goods: BTreeMap<GoodsTypeId, u32>,
    #[serde(default)]
    pub missionary: Option<FactionId>,
    #[serde(default)]
    pub visited_by: BTreeSet<FactionId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FactionState {
    pub id: FactionId,
    pub name: String,
    pub kind: FactionKind,
    pub ai: bool,
    pub gold: i64,
    #[serde(default)]
    pub stances: BTreeMap<FactionId, Stance>,
    /// How much this faction resents each other faction.
    #[serde(default)]
    pub tension: BTreeMap<FactionId, i32>,
    /// Turn on which the current peace with each faction was signed.
    #[serde(default)]
    pub treaty_turn: BTreeMap<FactionId, u64>,
    /// High-seas tile where ships arriving from Europe appear.
    pub entry_location: TilePos,
    #[serde(default)]
    pub dead: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EuropeState {
    /// Purchase price per unit of goods; sales pay half.
    pub prices: BTreeMap<GoodsTypeId, u32>,
}

// ---------------------------------------------------------------------------
// Command types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandEnvelope {
    pub id: CommandId,
    pub issued_by: FactionId,
    pub issued_turn: u64,
    pub command: Command,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Command {
    Move {
        unit: UnitId,
        to: TilePos,
    },
    SailToEurope {
        unit: UnitId,
    },
    SailToAmerica {
        unit: UnitId,
    },
    Embark {
        unit: UnitId,
        carrier: UnitId,
    },
    /// Leave the carrier; `to: None` disembarks in place (settlement or Europe).
    Disembark {
        unit: UnitId,
        to: Option<TilePos>,
    },
    LoadGoods {
        carrier: UnitId,
        goods_type: GoodsTypeId,
        amount: u32,
    },
    UnloadGoods {
        carrier: UnitId,
        goods_type: GoodsTypeId,
        amount: u32,
    },
    BuildColony {
        unit: UnitId,
        name: String,
    },
    JoinColony {
        unit: UnitId,
        settlement: SettlementId,
    },
    AssignWork {
        unit: UnitId,
        goods_type: GoodsTypeId,
    },
    Equip {
        unit: UnitId,
        role: Role,
    },
    ImproveTile {
        unit: UnitId,
        improvement: ImprovementKind,
    },
    Fortify {
        unit: UnitId,
    },
    Attack {
        unit: UnitId,
        target: TilePos,
    },
    SpeakToChief {
        unit: UnitId,
        settlement: SettlementId,
    },
    EstablishMission {
        unit: UnitId,
        settlement: SettlementId,
    },
    CashInTreasure {
        unit: UnitId,
    },
    DeliverGift {
        unit: UnitId,
        settlement: SettlementId,
    },
    DemandTribute {
        unit: UnitId,
        settlement: SettlementId,
    },
    SetStance {
        other: FactionId,
        stance: Stance,
    },
    /// AI catch-up injections.
    GrantGold {
        amount: i64,
    },
    RecruitUnit {
        unit_type: UnitTypeId,
        role: Role,
    },
}

// ---------------------------------------------------------------------------
// Event types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub id: EventId,
    pub turn: u64,
    pub event: Event,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    UnitMoved {
        unit: UnitId,
        to: Location,
    },
    UnitEmbarked {
        unit: UnitId,
        carrier: UnitId,
    },
    UnitDisembarked {
        unit: UnitId,
        at: Location,
    },
    GoodsLoaded {
        carrier: UnitId,
        goods_type: GoodsTypeId,
        amount: u32,
    },
    GoodsUnloaded {
        carrier: UnitId,
        goods_type: GoodsTypeId,
        amount: u32,
    },
    ColonyFounded {
        settlement: SettlementId,
        owner: FactionId,
        tile: TilePos,
    },
    UnitJoinedColony {
        unit: UnitId,
        settlement: SettlementId,
    },
    RoleChanged {
        unit: UnitId,
        role: Role,
    },
    TileImproved {
        tile: TilePos,
        improvement: ImprovementKind,
    },
    CombatResolved {
        attacker: UnitId,
        defender: UnitId,
        attacker_won: bool,
    },
    UnitDestroyed {
        unit: UnitId,
    },
    SettlementCaptured {
        settlement: SettlementId,
        new_owner: FactionId,
    },
    SettlementDestroyed {
        settlement: SettlementId,
    },
    RumourExplored {
        unit: UnitId,
        tile: TilePos,
        gold: i64,
    },
    ChiefSpokenTo {
        unit: UnitId,
        settlement: SettlementId,
    },
    MissionEstablished {
        settlement: SettlementId,
        faction: FactionId,
    },
    TreasureCashedIn {
        faction: FactionId,
        gold: i64,
    },
    GiftDelivered {
        settlement: SettlementId,
        goods_type: GoodsTypeId,
        amount: u32,
    },
    TributeDemanded {
        settlement: SettlementId,
        goods_type: Option<GoodsTypeId>,
        amount: u32,
    },
    StanceChanged {
        faction: FactionId,
        other: FactionId,
        stance: Stance,
    },
    GoldGranted {
        faction: FactionId,
        amount: i64,
    },
    UnitRecruited {
        unit: UnitId,
        faction: FactionId,
    },
    ArrivedInEurope {
        unit: UnitId,
    },
    ArrivedInAmerica {
        unit: UnitId,
    },
}

// ---------------------------------------------------------------------------
// Content types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameContent {
    pub content_version: String,
    pub unit_types: BTreeMap<UnitTypeId, UnitTypeDef>,
    pub goods_types: Vec<GoodsTypeDef>,
    pub roles: Vec<RoleDef>,
    pub constants: Constants,
}

fn default_space_taken() -> u32 {
    1
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnitTypeDef {
    pub id: UnitTypeId,
    pub name: String,
    pub offence: u32,
    pub defence: u32,
    pub moves_per_turn: u32,
    #[serde(default)]
    pub naval: bool,
    /// Carrier capacity in cargo slots.
    #[serde(default)]
    pub space: u32,
    #[serde(default = "default_space_taken")]
    pub space_taken: u32,
    #[serde(default)]
    pub skill: i32,
    #[serde(default)]
    pub expert_goods: Option<GoodsTypeId>,
    #[serde(default)]
    pub expert_role: Option<Role>,
    /// Can found, join and work in colonies.
    #[serde(default)]
    pub colonist: bool,
    #[serde(default)]
    pub treasure_train: bool,
    #[serde(default)]
    pub can_raid: bool,
    /// Recruitment price in Europe; `None` means it cannot be bought.
    #[serde(default)]
    pub price: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoodsTypeDef {
    pub id: GoodsTypeId,
    pub name: String,
    #[serde(default)]
    pub food: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleDef {
    pub role: Role,
    /// Goods consumed per equipment use.
    #[serde(default)]
    pub goods: Vec<(GoodsTypeId, u32)>,
    #[serde(default)]
    pub offence_bonus: u32,
    #[serde(default)]
    pub defence_bonus: u32,
    #[serde(default)]
    pub moves_per_turn: Option<u32>,
    #[serde(default = "default_space_taken")]
    pub max_uses: u32,
    /// Role can only be taken up in Europe (missionaries are blessed there).
    #[serde(default)]
    pub europe_only: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Constants {
    pub europe_sail_turns: u32,
    pub cash_in_fee_percent: u32,
    pub rumour_gold: i64,
    pub chief_gift_gold: i64,
    pub worker_production: u32,
    pub expert_production: u32,
    pub native_production: u32,
    pub native_goods: GoodsTypeId,
    pub default_work_goods: GoodsTypeId,
    pub warehouse_capacity: u32,
    pub goods_per_slot: u32,
    pub improvement_turns: u32,
    pub gift_amount: u32,
    pub demand_amount: u32,
    pub gift_tension_relief: i32,
    pub demand_tension: i32,
    pub tension_decay: i32,
    pub fortify_bonus_percent: u32,
    pub settlement_bonus_percent: u32,
    /// Tension raised in the defender's faction by each attack.
    pub combat_tension: i32,
    /// Treasure carried off when a native settlement is destroyed.
    pub settlement_treasure: u32,
    pub treasure_train_type: UnitTypeId,
}
