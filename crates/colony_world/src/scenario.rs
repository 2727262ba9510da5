//! Scenario files: a hand-authored starting world for a run.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use anyhow::{bail, ensure, Context, Result};
use colony_core::{
    Counters, EuropeState, FactionId, FactionKind, FactionState, GameContent, GameState,
    GoodsTypeId, Location, MapState, MetaState, Role, SettlementId, SettlementKind, Stance,
    Terrain, TilePos, TileState, UnitTypeId,
};
use serde::Deserialize;

use crate::read_json;

fn default_true() -> bool {
    true
}

fn default_count() -> u32 {
    1
}

fn default_role() -> Role {
    Role::Default
}

#[derive(Debug, Clone, Deserialize)]
pub struct Scenario {
    pub name: String,
    /// Overridden by an explicit seed on the command line.
    #[serde(default)]
    pub seed: Option<u64>,
    /// Terrain glyph rows, see [`parse_map`].
    pub map: Vec<String>,
    #[serde(default)]
    pub rumours: Vec<TilePos>,
    pub factions: Vec<FactionSpec>,
    /// Pairs at war from the first turn. Everyone else starts at peace.
    #[serde(default)]
    pub wars: Vec<(FactionId, FactionId)>,
    #[serde(default)]
    pub settlements: Vec<SettlementSpec>,
    #[serde(default)]
    pub units: Vec<UnitSpec>,
    #[serde(default)]
    pub europe_prices: BTreeMap<GoodsTypeId, u32>,
    #[serde(default)]
    pub ai_overrides: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FactionSpec {
    pub id: FactionId,
    pub name: String,
    pub kind: FactionKind,
    #[serde(default = "default_true")]
    pub ai: bool,
    #[serde(default)]
    pub gold: i64,
    /// Where ships from Europe arrive; must be a high-seas tile.
    /// Natives never sail and may leave it out.
    #[serde(default)]
    pub entry: Option<TilePos>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SettlementSpec {
    pub owner: FactionId,
    pub name: String,
    pub tile: TilePos,
    pub kind: SettlementKind,
    #[serde(default)]
    pub goods: BTreeMap<GoodsTypeId, u32>,
    /// Colonists already working inside, on the default work goods.
    #[serde(default)]
    pub workers: Vec<UnitTypeId>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UnitSpec {
    pub owner: FactionId,
    pub unit_type: UnitTypeId,
    /// `None` places the unit in Europe.
    #[serde(default)]
    pub tile: Option<TilePos>,
    #[serde(default = "default_role")]
    pub role: Role,
    #[serde(default = "default_count")]
    pub count: u32,
    #[serde(default)]
    pub treasure: u32,
    /// Tile of the native settlement the unit belongs to.
    #[serde(default)]
    pub home: Option<TilePos>,
}

pub fn load_scenario(path: &Path) -> Result<Scenario> {
    read_json(path)
}

/// Parses rows of terrain glyphs: `~` high seas, `.` ocean, `p` plains,
/// `g` grassland, `f` forest, `h` hills, `m` mountains.
pub fn parse_map(rows: &[String]) -> Result<MapState> {
    let Some(first) = rows.first() else {
        bail!("scenario map has no rows");
    };
    let width = first.chars().count();
    ensure!(width > 0, "scenario map rows are empty");
    let mut tiles = Vec::with_capacity(width * rows.len());
    for (y, row) in rows.iter().enumerate() {
        ensure!(
            row.chars().count() == width,
            "map row {y} has {} tiles, expected {width}",
            row.chars().count()
        );
        for (x, glyph) in row.chars().enumerate() {
            let terrain = match glyph {
                '~' => Terrain::HighSeas,
                '.' => Terrain::Ocean,
                'p' => Terrain::Plains,
                'g' => Terrain::Grassland,
                'f' => Terrain::Forest,
                'h' => Terrain::Hills,
                'm' => Terrain::Mountains,
                other => bail!("unknown terrain glyph '{other}' at ({x},{y})"),
            };
            tiles.push(TileState {
                terrain,
                improvements: Vec::new(),
                owner: None,
                settlement: None,
                rumour: false,
                region: 0,
            });
        }
    }
    let width = i32::try_from(width).context("map too wide")?;
    let height = i32::try_from(rows.len()).context("map too tall")?;
    Ok(MapState::new(width, height, tiles))
}

fn factions(scenario: &Scenario, map: &MapState) -> Result<BTreeMap<FactionId, FactionState>> {
    let mut factions = BTreeMap::new();
    for def in &scenario.factions {
        let entry = match (def.entry, def.kind) {
            (Some(pos), _) => {
                ensure!(
                    map.terrain(pos) == Some(Terrain::HighSeas),
                    "{} enters at {pos}, which is not high seas",
                    def.name
                );
                pos
            }
            (None, FactionKind::Native) => TilePos::new(0, 0),
            (None, _) => bail!("{} needs an entry tile", def.name),
        };
        let state = FactionState {
            id: def.id,
            name: def.name.clone(),
            kind: def.kind,
            ai: def.ai,
            gold: def.gold,
            stances: BTreeMap::new(),
            tension: BTreeMap::new(),
            treaty_turn: BTreeMap::new(),
            entry_location: entry,
            dead: false,
        };
        ensure!(
            factions.insert(def.id, state).is_none(),
            "faction {} is listed twice",
            def.id
        );
    }

    let at_war: BTreeSet<(FactionId, FactionId)> = scenario
        .wars
        .iter()
        .flat_map(|&(a, b)| [(a, b), (b, a)])
        .collect();
    for &(a, b) in &at_war {
        ensure!(
            factions.contains_key(&a) && factions.contains_key(&b),
            "war between unknown factions {a} and {b}"
        );
    }
    let kinds: Vec<(FactionId, FactionKind)> =
        factions.values().map(|f| (f.id, f.kind)).collect();
    for faction in factions.values_mut() {
        for &(other, kind) in &kinds {
            if other == faction.id {
                continue;
            }
            let royal_rebel = matches!(
                (faction.kind, kind),
                (FactionKind::Royal, FactionKind::European)
                    | (FactionKind::European, FactionKind::Royal)
            );
            let stance = if royal_rebel || at_war.contains(&(faction.id, other)) {
                Stance::War
            } else {
                Stance::Peace
            };
            faction.stances.insert(other, stance);
        }
    }
    Ok(factions)
}

fn place_settlements(
    state: &mut GameState,
    content: &GameContent,
    scenario: &Scenario,
) -> Result<()> {
    for spec in &scenario.settlements {
        ensure!(
            state.factions.contains_key(&spec.owner),
            "settlement {} has unknown owner {}",
            spec.name,
            spec.owner
        );
        ensure!(
            state.map.is_land(spec.tile),
            "settlement {} at {} is not on land",
            spec.name,
            spec.tile
        );
        ensure!(
            state.settlement_at(spec.tile).is_none(),
            "settlement {} at {} overlaps another",
            spec.name,
            spec.tile
        );
        for goods_type in spec.goods.keys() {
            ensure!(
                content.goods_types.iter().any(|g| &g.id == goods_type),
                "settlement {} stores unknown goods '{goods_type}'",
                spec.name
            );
        }
        let id = state.place_settlement(spec.owner, spec.tile, spec.kind, &spec.name);
        if let Some(settlement) = state.settlements.get_mut(&id) {
            settlement.goods = spec.goods.clone();
        }
        for worker in &spec.workers {
            ensure!(
                content.unit_type(worker).is_some_and(|d| d.colonist),
                "settlement {} lists '{worker}', which cannot work in a colony",
                spec.name
            );
            let unit = state.add_unit(
                content,
                worker,
                spec.owner,
                Location::Tile(spec.tile),
                Role::Default,
            );
            if let Some(unit) = state.unit_mut(unit) {
                unit.working_in = Some(id);
                unit.work_goods = Some(content.constants.default_work_goods.clone());
            }
        }
    }
    Ok(())
}

fn place_units(state: &mut GameState, content: &GameContent, scenario: &Scenario) -> Result<()> {
    for spec in &scenario.units {
        let Some(def) = content.unit_type(&spec.unit_type) else {
            bail!("unknown unit type '{}'", spec.unit_type);
        };
        let Some(kind) = state.factions.get(&spec.owner).map(|f| f.kind) else {
            bail!("{} has unknown owner {}", spec.unit_type, spec.owner);
        };
        let location = match spec.tile {
            Some(pos) => {
                let fits = if def.naval {
                    state.map.is_water(pos)
                } else {
                    state.map.is_land(pos)
                };
                ensure!(fits, "{} cannot start at {pos}", spec.unit_type);
                Location::Tile(pos)
            }
            None => Location::Europe,
        };
        let home: Option<SettlementId> = match spec.home {
            Some(pos) => {
                let Some(settlement) = state.settlement_at(pos) else {
                    bail!("{} has no home settlement at {pos}", spec.unit_type);
                };
                Some(settlement.id)
            }
            None => None,
        };
        for _ in 0..spec.count {
            let id = state.add_unit(content, &spec.unit_type, spec.owner, location, spec.role);
            if let Some(unit) = state.unit_mut(id) {
                unit.treasure = spec.treasure;
                unit.home_settlement = home;
                unit.expeditionary = kind == FactionKind::Royal;
            }
        }
    }
    Ok(())
}

/// Builds the turn-1 world described by `scenario`.
pub fn build_state(content: &GameContent, scenario: &Scenario, seed: u64) -> Result<GameState> {
    let mut map = parse_map(&scenario.map).with_context(|| format!("map of {}", scenario.name))?;
    for &pos in &scenario.rumours {
        let Some(tile) = map.tile_mut(pos).filter(|t| t.terrain.is_land()) else {
            bail!("rumour at {pos} is not on land");
        };
        tile.rumour = true;
    }
    for goods_type in scenario.europe_prices.keys() {
        ensure!(
            content.goods_types.iter().any(|g| &g.id == goods_type),
            "europe prices unknown goods '{goods_type}'"
        );
    }
    let factions = factions(scenario, &map)?;

    let mut state = GameState {
        meta: MetaState {
            turn: 1,
            seed,
            schema_version: 1,
            content_version: content.content_version.clone(),
        },
        map,
        units: Vec::new(),
        settlements: BTreeMap::new(),
        factions,
        europe: EuropeState {
            prices: scenario.europe_prices.clone(),
        },
        counters: Counters {
            next_event_id: 0,
            next_command_id: 0,
            next_settlement_id: 1,
        },
    };
    place_settlements(&mut state, content, scenario)?;
    place_units(&mut state, content, scenario)?;
    tracing::info!(
        scenario = scenario.name.as_str(),
        factions = state.factions.len(),
        settlements = state.settlements.len(),
        units = state.units.len(),
        "scenario built"
    );
    Ok(state)
}
