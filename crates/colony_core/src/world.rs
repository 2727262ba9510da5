use std::collections::{BTreeSet, VecDeque};

use crate::{
    FactionId, GameContent, GameState, GoodsTypeId, ImprovementKind, Location, MapState, Role,
    RoleDef, SettlementId, SettlementKind, SettlementState, Stance, Terrain, TilePos, TileState,
    UnitId, UnitState, UnitTypeDef, UnitTypeId,
};

const NEIGHBOUR_OFFSETS: [(i32, i32); 8] = [
    (-1, -1),
    (0, -1),
    (1, -1),
    (-1, 0),
    (1, 0),
    (-1, 1),
    (0, 1),
    (1, 1),
];

// ---------------------------------------------------------------------------
// Map queries
// ---------------------------------------------------------------------------

impl MapState {
    /// Builds a map and labels its regions.
    pub fn new(width: i32, height: i32, tiles: Vec<TileState>) -> Self {
        let mut map = Self {
            width,
            height,
            tiles,
            ocean_regions: BTreeSet::new(),
        };
        map.label_regions();
        map
    }

    pub fn contains(&self, pos: TilePos) -> bool {
        pos.x >= 0 && pos.y >= 0 && pos.x < self.width && pos.y < self.height
    }

    fn index(&self, pos: TilePos) -> Option<usize> {
        self.contains(pos)
            .then(|| (pos.y * self.width + pos.x) as usize)
    }

    pub fn tile(&self, pos: TilePos) -> Option<&TileState> {
        self.index(pos).and_then(|i| self.tiles.get(i))
    }

    pub fn tile_mut(&mut self, pos: TilePos) -> Option<&mut TileState> {
        self.index(pos).and_then(|i| self.tiles.get_mut(i))
    }

    pub fn terrain(&self, pos: TilePos) -> Option<Terrain> {
        self.tile(pos).map(|t| t.terrain)
    }

    pub fn is_land(&self, pos: TilePos) -> bool {
        self.terrain(pos).is_some_and(Terrain::is_land)
    }

    pub fn is_water(&self, pos: TilePos) -> bool {
        self.terrain(pos).is_some_and(Terrain::is_water)
    }

    pub fn region(&self, pos: TilePos) -> Option<u32> {
        self.tile(pos).map(|t| t.region)
    }

    pub fn neighbours(&self, pos: TilePos) -> impl Iterator<Item = TilePos> + '_ {
        NEIGHBOUR_OFFSETS
            .iter()
            .map(move |(dx, dy)| TilePos::new(pos.x + dx, pos.y + dy))
            .filter(|p| self.contains(*p))
    }

    pub fn positions(&self) -> impl Iterator<Item = TilePos> + '_ {
        (0..self.height).flat_map(move |y| (0..self.width).map(move |x| TilePos::new(x, y)))
    }

    /// Land tile next to at least one water tile.
    pub fn is_coastal(&self, pos: TilePos) -> bool {
        self.is_land(pos) && self.neighbours(pos).any(|n| self.is_water(n))
    }

    /// Land tile next to water that connects to the high seas.
    pub fn is_connected_port(&self, pos: TilePos) -> bool {
        self.is_land(pos)
            && self.neighbours(pos).any(|n| {
                self.tile(n)
                    .is_some_and(|t| t.terrain.is_water() && self.ocean_regions.contains(&t.region))
            })
    }

    /// Flood-fills contiguous land masses and bodies of water, 8-connected.
    /// Region ids start at 1.
    pub fn label_regions(&mut self) {
        for tile in &mut self.tiles {
            tile.region = 0;
        }
        self.ocean_regions.clear();
        let positions: Vec<TilePos> = self.positions().collect();
        let mut next_region = 1;
        for start in positions {
            if self.region(start) != Some(0) {
                continue;
            }
            let water = self.is_water(start);
            let mut touches_high_seas = false;
            let mut queue = VecDeque::from([start]);
            if let Some(tile) = self.tile_mut(start) {
                tile.region = next_region;
            }
            while let Some(pos) = queue.pop_front() {
                if self.terrain(pos) == Some(Terrain::HighSeas) {
                    touches_high_seas = true;
                }
                let neighbours: Vec<TilePos> = self.neighbours(pos).collect();
                for n in neighbours {
                    if self.is_water(n) != water || self.region(n) != Some(0) {
                        continue;
                    }
                    if let Some(tile) = self.tile_mut(n) {
                        tile.region = next_region;
                    }
                    queue.push_back(n);
                }
            }
            if water && touches_high_seas {
                self.ocean_regions.insert(next_region);
            }
            next_region += 1;
        }
    }
}

impl TileState {
    /// Whether `kind` can still be applied to this tile.
    pub fn can_improve(&self, kind: ImprovementKind) -> bool {
        if self.terrain.is_water() || self.improvements.contains(&kind) {
            return false;
        }
        match kind {
            ImprovementKind::Plow => matches!(
                self.terrain,
                Terrain::Plains | Terrain::Grassland | Terrain::Hills
            ),
            ImprovementKind::ClearForest => self.terrain == Terrain::Forest,
            ImprovementKind::Road => true,
        }
    }
}

// ---------------------------------------------------------------------------
// Content lookups
// ---------------------------------------------------------------------------

impl GameContent {
    pub fn unit_type(&self, id: &UnitTypeId) -> Option<&UnitTypeDef> {
        self.unit_types.get(id)
    }

    pub fn role(&self, role: Role) -> Option<&RoleDef> {
        self.roles.iter().find(|r| r.role == role)
    }

    /// Moves per turn for a unit type in a role; role mounts override the base speed.
    pub fn moves_for(&self, unit_type: &UnitTypeId, role: Role) -> u32 {
        let base = self.unit_type(unit_type).map_or(1, |def| def.moves_per_turn);
        self.role(role)
            .and_then(|r| r.moves_per_turn)
            .map_or(base, |m| m.max(base))
    }
}

// ---------------------------------------------------------------------------
// World queries
// ---------------------------------------------------------------------------

impl GameState {
    pub fn unit(&self, id: UnitId) -> Option<&UnitState> {
        self.units.get(id.0 as usize).and_then(Option::as_ref)
    }

    pub fn unit_mut(&mut self, id: UnitId) -> Option<&mut UnitState> {
        self.units.get_mut(id.0 as usize).and_then(Option::as_mut)
    }

    pub fn live_units(&self) -> impl Iterator<Item = &UnitState> {
        self.units.iter().filter_map(Option::as_ref)
    }

    pub fn faction_units(&self, faction: FactionId) -> impl Iterator<Item = &UnitState> {
        self.live_units().filter(move |u| u.owner == faction)
    }

    /// Creates a unit with a full move allowance and returns its id.
    pub fn add_unit(
        &mut self,
        content: &GameContent,
        unit_type: &UnitTypeId,
        owner: FactionId,
        location: Location,
        role: Role,
    ) -> UnitId {
        let id = UnitId(self.units.len() as u32);
        let role_uses = content.role(role).map_or(0, |r| r.max_uses);
        self.units.push(Some(UnitState {
            id,
            unit_type: unit_type.clone(),
            owner,
            location,
            moves_left: content.moves_for(unit_type, role),
            role,
            role_uses,
            work: None,
            working_in: None,
            work_goods: None,
            goods: std::collections::BTreeMap::new(),
            treasure: 0,
            fortified: false,
            expeditionary: false,
            home_settlement: None,
            voyage: None,
        }));
        id
    }

    /// Removes a unit and everything aboard it. Returns every disposed id.
    pub fn dispose_unit(&mut self, id: UnitId) -> Vec<UnitId> {
        let mut disposed = Vec::new();
        let mut pending = vec![id];
        while let Some(next) = pending.pop() {
            let Some(slot) = self.units.get_mut(next.0 as usize) else {
                continue;
            };
            if slot.take().is_none() {
                continue;
            }
            disposed.push(next);
            pending.extend(
                self.live_units()
                    .filter(|u| u.location == Location::Aboard(next))
                    .map(|u| u.id),
            );
        }
        disposed
    }

    pub fn units_at(&self, location: Location) -> impl Iterator<Item = &UnitState> {
        self.live_units().filter(move |u| u.location == location)
    }

    /// Resolves a location through any chain of carriers to a tile or Europe.
    pub fn resolve_location(&self, location: Location) -> Option<Location> {
        let mut current = location;
        for _ in 0..8 {
            match current {
                Location::Aboard(carrier) => current = self.unit(carrier)?.location,
                Location::Tile(_) | Location::Europe => return Some(current),
            }
        }
        None
    }

    pub fn unit_map_location(&self, id: UnitId) -> Option<Location> {
        self.resolve_location(self.unit(id)?.location)
    }

    pub fn unit_tile(&self, id: UnitId) -> Option<TilePos> {
        self.unit_map_location(id).and_then(Location::tile)
    }

    pub fn settlement(&self, id: SettlementId) -> Option<&SettlementState> {
        self.settlements.get(&id)
    }

    pub fn settlement_at(&self, pos: TilePos) -> Option<&SettlementState> {
        self.map
            .tile(pos)
            .and_then(|t| t.settlement)
            .and_then(|id| self.settlements.get(&id))
    }

    /// Inserts a settlement at `tile` and claims the unowned land around it.
    pub fn place_settlement(
        &mut self,
        owner: FactionId,
        tile: TilePos,
        kind: SettlementKind,
        name: &str,
    ) -> SettlementId {
        let id = SettlementId(self.counters.next_settlement_id);
        self.counters.next_settlement_id += 1;
        self.settlements.insert(
            id,
            SettlementState {
                id,
                name: name.to_string(),
                owner,
                tile,
                kind,
                goods: std::collections::BTreeMap::new(),
                missionary: None,
                visited_by: BTreeSet::new(),
            },
        );
        let claimed: Vec<TilePos> =
            std::iter::once(tile).chain(self.map.neighbours(tile)).collect();
        for pos in claimed {
            if let Some(t) = self.map.tile_mut(pos) {
                if t.terrain.is_land() && t.owner.is_none() {
                    t.owner = Some(owner);
                }
                if pos == tile {
                    t.settlement = Some(id);
                }
            }
        }
        id
    }

    pub fn colonies_of(&self, faction: FactionId) -> impl Iterator<Item = &SettlementState> {
        self.settlements
            .values()
            .filter(move |s| s.owner == faction && s.kind == SettlementKind::Colony)
    }

    /// Colonists working inside the settlement.
    pub fn population(&self, settlement: SettlementId) -> u32 {
        self.live_units()
            .filter(|u| u.working_in == Some(settlement))
            .count() as u32
    }

    pub fn stance(&self, faction: FactionId, other: FactionId) -> Stance {
        self.factions
            .get(&faction)
            .and_then(|f| f.stances.get(&other).copied())
            .unwrap_or(Stance::Unknown)
    }

    pub fn at_war(&self, faction: FactionId, other: FactionId) -> bool {
        faction != other && self.stance(faction, other) == Stance::War
    }

    pub fn tension(&self, faction: FactionId, other: FactionId) -> i32 {
        self.factions
            .get(&faction)
            .and_then(|f| f.tension.get(&other).copied())
            .unwrap_or(0)
    }

    pub fn is_sailing(&self, id: UnitId) -> bool {
        self.unit(id).is_some_and(|u| u.voyage.is_some())
    }

    /// Cargo slots occupied by passengers and goods.
    pub fn space_used(&self, carrier: UnitId, content: &GameContent) -> u32 {
        let passengers: u32 = self
            .units_at(Location::Aboard(carrier))
            .map(|u| content.unit_type(&u.unit_type).map_or(1, |d| d.space_taken))
            .sum();
        let goods: u32 = self.unit(carrier).map_or(0, |u| {
            u.goods
                .values()
                .map(|amount| goods_slots(*amount, content.constants.goods_per_slot))
                .sum()
        });
        passengers + goods
    }

    pub fn space_left(&self, carrier: UnitId, content: &GameContent) -> u32 {
        let capacity = self
            .unit(carrier)
            .and_then(|u| content.unit_type(&u.unit_type))
            .map_or(0, |d| d.space);
        capacity.saturating_sub(self.space_used(carrier, content))
    }

    pub fn settlement_goods(&self, settlement: SettlementId, goods: &GoodsTypeId) -> u32 {
        self.settlements
            .get(&settlement)
            .and_then(|s| s.goods.get(goods).copied())
            .unwrap_or(0)
    }
}

pub fn goods_slots(amount: u32, per_slot: u32) -> u32 {
    amount.div_ceil(per_slot.max(1))
}
