//! Multimodal pathfinding: on foot, riding a carrier, and across the Europe link.
//!
//! Paths are computed by Dijkstra over `(location, on_carrier)` states with a
//! lexicographic `(turns, moves used)` cost. Every tile step costs one move;
//! boarding or leaving a carrier inside a friendly settlement or in Europe is
//! free, while boarding from the shore or landing on a beach costs the
//! traveller a step.

use std::cmp::Reverse;
use std::collections::{BTreeMap, BinaryHeap};

use smallvec::SmallVec;

use crate::{FactionId, GameContent, GameState, Location, Terrain, TilePos, UnitId, VoyageLeg};

/// How a traveller gets around when not riding a carrier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Domain {
    Land,
    Naval,
    /// Goods cannot move by themselves.
    Goods,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Traveller {
    pub owner: FactionId,
    pub domain: Domain,
    pub speed: u32,
    pub moves_left: u32,
}

impl Traveller {
    pub fn of_unit(state: &GameState, content: &GameContent, id: UnitId) -> Option<Self> {
        let unit = state.unit(id)?;
        let def = content.unit_type(&unit.unit_type)?;
        Some(Self {
            owner: unit.owner,
            domain: if def.naval { Domain::Naval } else { Domain::Land },
            speed: content.moves_for(&unit.unit_type, unit.role),
            moves_left: unit.moves_left,
        })
    }

    pub fn goods(owner: FactionId) -> Self {
        Self {
            owner,
            domain: Domain::Goods,
            speed: 0,
            moves_left: 0,
        }
    }
}

/// The carrier a traveller may ride while searching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CarrierSpec {
    /// `None` for a hypothetical ship used to estimate crossings.
    pub unit: Option<UnitId>,
    pub naval: bool,
    pub speed: u32,
    pub moves_left: u32,
}

impl CarrierSpec {
    pub fn of_unit(state: &GameState, content: &GameContent, id: UnitId) -> Option<Self> {
        let unit = state.unit(id)?;
        let def = content.unit_type(&unit.unit_type)?;
        if def.space == 0 {
            return None;
        }
        Some(Self {
            unit: Some(id),
            naval: def.naval,
            speed: content.moves_for(&unit.unit_type, unit.role),
            moves_left: unit.moves_left,
        })
    }

    pub fn virtual_ship(speed: u32) -> Self {
        Self {
            unit: None,
            naval: true,
            speed,
            moves_left: speed,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PathNode {
    /// Always a tile or Europe, never `Aboard`.
    pub location: Location,
    /// Cumulative turns to reach this node.
    pub turns: u32,
    pub on_carrier: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Path {
    nodes: SmallVec<[PathNode; 16]>,
}

impl Path {
    pub fn nodes(&self) -> &[PathNode] {
        &self.nodes
    }

    pub fn first(&self) -> Option<&PathNode> {
        self.nodes.first()
    }

    pub fn last(&self) -> Option<&PathNode> {
        self.nodes.last()
    }

    pub fn total_turns(&self) -> u32 {
        self.last().map_or(0, |n| n.turns)
    }

    /// Index of the first node travelled aboard the carrier.
    pub fn carrier_move(&self) -> Option<usize> {
        self.nodes.iter().position(|n| n.on_carrier)
    }

    /// Index of the first node off the carrier after the carried stretch.
    pub fn transport_drop(&self) -> Option<usize> {
        let boarded = self.carrier_move()?;
        self.nodes
            .iter()
            .skip(boarded)
            .position(|n| !n.on_carrier)
            .map(|offset| boarded + offset)
    }

    /// Turns spent before reaching `index`, or the whole path when out of range.
    pub fn turns_at(&self, index: usize) -> u32 {
        self.nodes
            .get(index)
            .map_or_else(|| self.total_turns(), |n| n.turns)
    }
}

// ---------------------------------------------------------------------------
// Search
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct Key {
    location: Location,
    on_carrier: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct Cost {
    turns: u32,
    used: u32,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mover {
    Foot,
    Ship,
    Wagon,
}

struct Search<'a> {
    state: &'a GameState,
    content: &'a GameContent,
    traveller: Traveller,
    carrier: Option<CarrierSpec>,
    best: BTreeMap<Key, (Cost, Option<Key>)>,
    settled: Vec<Key>,
    heap: BinaryHeap<Reverse<(Cost, Key)>>,
}

impl<'a> Search<'a> {
    fn new(
        state: &'a GameState,
        content: &'a GameContent,
        traveller: &Traveller,
        carrier: Option<&CarrierSpec>,
    ) -> Self {
        Self {
            state,
            content,
            traveller: *traveller,
            carrier: carrier.copied(),
            best: BTreeMap::new(),
            settled: Vec::new(),
            heap: BinaryHeap::new(),
        }
    }

    /// Seeds the search. Returns false when the start cannot be resolved.
    fn seed(&mut self, start: Location) -> bool {
        let key;
        let cost;
        match start {
            Location::Aboard(carrier_id) => {
                if self.carrier.is_none() {
                    self.carrier = CarrierSpec::of_unit(self.state, self.content, carrier_id);
                }
                let Some(spec) = self.carrier else {
                    return false;
                };
                let (location, delay) = self.voyage_position(carrier_id);
                let Some(location) = location else {
                    return false;
                };
                key = Key {
                    location,
                    on_carrier: true,
                };
                cost = Cost {
                    turns: delay,
                    used: spec.speed.saturating_sub(spec.moves_left),
                };
            }
            Location::Tile(_) | Location::Europe => {
                key = Key {
                    location: start,
                    on_carrier: false,
                };
                cost = Cost {
                    turns: 0,
                    used: self.traveller.speed.saturating_sub(self.traveller.moves_left),
                };
            }
        }
        self.best.insert(key, (cost, None));
        self.heap.push(Reverse((cost, key)));
        true
    }

    /// Where a carrier effectively is, and how many turns until it gets there.
    fn voyage_position(&self, id: UnitId) -> (Option<Location>, u32) {
        let Some(unit) = self.state.unit(id) else {
            return (None, 0);
        };
        match unit.voyage {
            Some(voyage) => {
                let delay = voyage.arrives_turn.saturating_sub(self.state.meta.turn) as u32;
                let location = match voyage.to {
                    VoyageLeg::ToEurope => Some(Location::Europe),
                    VoyageLeg::ToAmerica => self
                        .state
                        .factions
                        .get(&unit.owner)
                        .map(|f| Location::Tile(f.entry_location)),
                };
                (location, delay)
            }
            None => (self.state.resolve_location(unit.location), 0),
        }
    }

    fn mover(&self, key: Key) -> Option<(Mover, u32)> {
        if key.on_carrier {
            let spec = self.carrier?;
            let mover = if spec.naval { Mover::Ship } else { Mover::Wagon };
            return Some((mover, spec.speed));
        }
        match self.traveller.domain {
            Domain::Land => Some((Mover::Foot, self.traveller.speed)),
            Domain::Naval => Some((Mover::Ship, self.traveller.speed)),
            Domain::Goods => None,
        }
    }

    fn own_settlement(&self, pos: TilePos) -> bool {
        self.state
            .settlement_at(pos)
            .is_some_and(|s| s.owner == self.traveller.owner)
    }

    fn foreign_settlement(&self, pos: TilePos) -> bool {
        self.state
            .settlement_at(pos)
            .is_some_and(|s| s.owner != self.traveller.owner)
    }

    fn can_enter(&self, mover: Mover, pos: TilePos) -> bool {
        let map = &self.state.map;
        match mover {
            Mover::Ship => {
                map.is_water(pos) || (self.own_settlement(pos) && map.is_coastal(pos))
            }
            Mover::Foot => map.is_land(pos),
            Mover::Wagon => map.is_land(pos) && !self.foreign_settlement(pos),
        }
    }

    fn step(cost: Cost, speed: u32) -> Option<Cost> {
        if speed == 0 {
            return None;
        }
        Some(if cost.used + 1 > speed {
            Cost {
                turns: cost.turns + 1,
                used: 1,
            }
        } else {
            Cost {
                turns: cost.turns,
                used: cost.used + 1,
            }
        })
    }

    fn successors(&self, key: Key, cost: Cost) -> Vec<(Key, Cost)> {
        let mut out = Vec::new();
        let sail_turns = self.content.constants.europe_sail_turns;
        let carrier = self.carrier;
        let domain = self.traveller.domain;

        match key.location {
            Location::Europe => {
                if let Some((Mover::Ship, _)) = self.mover(key) {
                    if let Some(faction) = self.state.factions.get(&self.traveller.owner) {
                        out.push((
                            Key {
                                location: Location::Tile(faction.entry_location),
                                on_carrier: key.on_carrier,
                            },
                            Cost {
                                turns: cost.turns + sail_turns,
                                used: 0,
                            },
                        ));
                    }
                }
                let boards = carrier.is_some_and(|c| c.naval) && domain != Domain::Naval;
                if boards {
                    out.push((
                        Key {
                            location: Location::Europe,
                            on_carrier: !key.on_carrier,
                        },
                        cost,
                    ));
                }
            }
            Location::Tile(pos) => {
                // Foreign settlements end a land journey.
                if !key.on_carrier && domain == Domain::Land && self.foreign_settlement(pos) {
                    return out;
                }
                if let Some((mover, speed)) = self.mover(key) {
                    if let Some(next_cost) = Self::step(cost, speed) {
                        for n in self.state.map.neighbours(pos) {
                            if self.can_enter(mover, n) {
                                out.push((
                                    Key {
                                        location: Location::Tile(n),
                                        on_carrier: key.on_carrier,
                                    },
                                    next_cost,
                                ));
                            }
                        }
                    }
                    let high_seas = self.state.map.terrain(pos) == Some(Terrain::HighSeas);
                    if mover == Mover::Ship && high_seas {
                        out.push((
                            Key {
                                location: Location::Europe,
                                on_carrier: key.on_carrier,
                            },
                            Cost {
                                turns: cost.turns + sail_turns,
                                used: 0,
                            },
                        ));
                    }
                }
                self.transfers(key, pos, cost, &mut out);
            }
            Location::Aboard(_) => {}
        }
        out
    }

    /// Boarding and leaving the carrier at a tile.
    fn transfers(&self, key: Key, pos: TilePos, cost: Cost, out: &mut Vec<(Key, Cost)>) {
        let Some(spec) = self.carrier else {
            return;
        };
        let domain = self.traveller.domain;
        if domain == Domain::Naval || (!spec.naval && domain == Domain::Land) {
            return;
        }
        let map = &self.state.map;
        let carrier_fits = if spec.naval {
            map.is_coastal(pos)
        } else {
            map.is_land(pos)
        };
        if self.own_settlement(pos) && carrier_fits {
            out.push((
                Key {
                    location: key.location,
                    on_carrier: !key.on_carrier,
                },
                cost,
            ));
        }
        if domain != Domain::Land || !spec.naval {
            return;
        }
        let Some(walk) = Self::step(cost, self.traveller.speed) else {
            return;
        };
        if key.on_carrier && map.is_water(pos) {
            for n in map.neighbours(pos).filter(|n| map.is_land(*n)) {
                out.push((
                    Key {
                        location: Location::Tile(n),
                        on_carrier: false,
                    },
                    walk,
                ));
            }
        } else if !key.on_carrier && map.is_land(pos) && !self.own_settlement(pos) {
            for n in map.neighbours(pos).filter(|n| map.is_water(*n)) {
                out.push((
                    Key {
                        location: Location::Tile(n),
                        on_carrier: true,
                    },
                    walk,
                ));
            }
        }
    }

    /// Runs Dijkstra until `stop` accepts a settled off-carrier state.
    fn run(&mut self, max_turns: u32, mut stop: impl FnMut(Location, u32) -> bool) -> Option<Key> {
        while let Some(Reverse((cost, key))) = self.heap.pop() {
            if self.best.get(&key).is_some_and(|(c, _)| *c < cost) {
                continue;
            }
            self.settled.push(key);
            if self.is_stoppable(key) && stop(key.location, cost.turns) {
                return Some(key);
            }
            for (next, next_cost) in self.successors(key, cost) {
                if next_cost.turns > max_turns {
                    continue;
                }
                let better = self.best.get(&next).map_or(true, |(c, _)| next_cost < *c);
                if better {
                    self.best.insert(next, (next_cost, Some(key)));
                    self.heap.push(Reverse((next_cost, next)));
                }
            }
        }
        None
    }

    /// Off the carrier, and somewhere the traveller may actually stay.
    fn is_stoppable(&self, key: Key) -> bool {
        if key.on_carrier {
            return false;
        }
        match (self.traveller.domain, key.location) {
            (Domain::Goods, Location::Tile(pos)) => self.own_settlement(pos),
            _ => true,
        }
    }

    fn path_to(&self, end: Key) -> Path {
        let mut nodes: SmallVec<[PathNode; 16]> = SmallVec::new();
        let mut cursor = Some(end);
        while let Some(key) = cursor {
            let Some((cost, previous)) = self.best.get(&key) else {
                break;
            };
            nodes.push(PathNode {
                location: key.location,
                turns: cost.turns,
                on_carrier: key.on_carrier,
            });
            cursor = *previous;
        }
        nodes.reverse();
        Path { nodes }
    }
}

// ---------------------------------------------------------------------------
// Public entry points
// ---------------------------------------------------------------------------

/// Finds the nearest stoppable location accepted by `goal` within `max_turns`.
pub fn search(
    state: &GameState,
    content: &GameContent,
    traveller: &Traveller,
    start: Location,
    mut goal: impl FnMut(Location) -> bool,
    max_turns: u32,
    carrier: Option<&CarrierSpec>,
) -> Option<Path> {
    let mut search = Search::new(state, content, traveller, carrier);
    if !search.seed(start) {
        return None;
    }
    let end = search.run(max_turns, |location, _| goal(location))?;
    Some(search.path_to(end))
}

/// Shortest path from `from` to `to`, possibly riding `carrier`.
pub fn find_path(
    state: &GameState,
    content: &GameContent,
    traveller: &Traveller,
    from: Location,
    to: Location,
    carrier: Option<&CarrierSpec>,
) -> Option<Path> {
    search(
        state,
        content,
        traveller,
        from,
        |location| location == to,
        u32::MAX,
        carrier,
    )
}

/// Explores everything within `max_turns` and returns the highest-scoring
/// location. Ties keep the location reached first.
pub fn search_scored(
    state: &GameState,
    content: &GameContent,
    traveller: &Traveller,
    start: Location,
    mut score: impl FnMut(Location, u32) -> Option<i64>,
    max_turns: u32,
    carrier: Option<&CarrierSpec>,
) -> Option<(Path, i64)> {
    let mut search = Search::new(state, content, traveller, carrier);
    if !search.seed(start) {
        return None;
    }
    let mut best: Option<(Location, i64)> = None;
    search.run(max_turns, |location, turns| {
        if let Some(value) = score(location, turns) {
            if best.map_or(true, |(_, b)| value > b) {
                best = Some((location, value));
            }
        }
        false
    });
    let (location, value) = best?;
    let end = search
        .settled
        .iter()
        .copied()
        .find(|k| k.location == location && !k.on_carrier)?;
    Some((search.path_to(end), value))
}

/// Best partial progress towards `to` when no full path exists: the
/// stoppable location closest to the destination, ties broken by turns.
pub fn intermediate_path(
    state: &GameState,
    content: &GameContent,
    traveller: &Traveller,
    from: Location,
    to: Location,
    max_turns: u32,
    carrier: Option<&CarrierSpec>,
) -> Option<Path> {
    let mut search = Search::new(state, content, traveller, carrier);
    if !search.seed(from) {
        return None;
    }
    let origin = state.resolve_location(from)?;
    let start_distance = location_distance(origin, to);
    let mut best: Option<(u32, Location)> = None;
    search.run(max_turns, |location, _| {
        let distance = location_distance(location, to);
        if distance < start_distance && best.map_or(true, |(d, _)| distance < d) {
            best = Some((distance, location));
        }
        false
    });
    let (_, location) = best?;
    let end = search
        .settled
        .iter()
        .copied()
        .find(|k| k.location == location && !k.on_carrier)?;
    Some(search.path_to(end))
}

/// Tile distance between two map locations; Europe is far from everything else.
pub fn location_distance(a: Location, b: Location) -> u32 {
    match (a, b) {
        (Location::Tile(x), Location::Tile(y)) => x.distance(y),
        (Location::Europe, Location::Europe) => 0,
        _ => u32::MAX / 2,
    }
}
