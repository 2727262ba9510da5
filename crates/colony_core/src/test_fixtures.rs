//! Shared test fixtures for colony_core and downstream crates.
//!
//! `base_content()` mirrors `content/*.json` closely enough for behavioural
//! tests. `base_state()` builds a 16x8 map with high seas on the west edge,
//! a main continent (columns 3-9), an island (columns 12-14), two European
//! factions and one native nation with a village on each land mass.

use std::collections::BTreeMap;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::{
    Constants, Counters, EuropeState, FactionId, FactionKind, FactionState, GameContent,
    GameState, GoodsTypeDef, GoodsTypeId, Location, MapState, MetaState, Role, RoleDef,
    SettlementId, SettlementKind, Stance, Terrain, TilePos, TileState, UnitId, UnitTypeDef,
    UnitTypeId,
};

pub const DUTCH: FactionId = FactionId(1);
pub const ENGLISH: FactionId = FactionId(2);
pub const ARAWAK: FactionId = FactionId(3);

/// Native village on the main continent.
pub const MAINLAND_VILLAGE: SettlementId = SettlementId(1);
/// Native village on the island.
pub const ISLAND_VILLAGE: SettlementId = SettlementId(2);

pub const MAP_ROWS: [&str; 8] = [
    "~~..............",
    "~~.pggfph...ppg.",
    "~~.pppgfhm..gpf.",
    "~~.gpggffm..pgg.",
    "~~.ppgghhm..ggp.",
    "~~.fppgff....p..",
    "~~.pggppf.......",
    "~~..............",
];

pub fn ut(id: &str) -> UnitTypeId {
    UnitTypeId::new(id)
}

pub fn gt(id: &str) -> GoodsTypeId {
    GoodsTypeId::new(id)
}

pub fn make_rng() -> ChaCha8Rng {
    ChaCha8Rng::seed_from_u64(42)
}

/// Parses rows of terrain glyphs: `~` high seas, `.` ocean, `p` plains,
/// `g` grassland, `f` forest, `h` hills, `m` mountains.
pub fn parse_map(rows: &[&str]) -> MapState {
    let height = rows.len() as i32;
    let width = rows.first().map_or(0, |r| r.len()) as i32;
    let tiles = rows
        .iter()
        .flat_map(|row| row.chars())
        .map(|c| TileState {
            terrain: match c {
                '~' => Terrain::HighSeas,
                'p' => Terrain::Plains,
                'g' => Terrain::Grassland,
                'f' => Terrain::Forest,
                'h' => Terrain::Hills,
                'm' => Terrain::Mountains,
                _ => Terrain::Ocean,
            },
            improvements: Vec::new(),
            owner: None,
            settlement: None,
            rumour: false,
            region: 0,
        })
        .collect();
    MapState::new(width, height, tiles)
}

#[allow(clippy::too_many_lines)]
pub fn base_content() -> GameContent {
    let unit = |id: &str, offence: u32, defence: u32, moves: u32| UnitTypeDef {
        id: ut(id),
        name: id.replace('_', " "),
        offence,
        defence,
        moves_per_turn: moves,
        naval: false,
        space: 0,
        space_taken: 1,
        skill: 0,
        expert_goods: None,
        expert_role: None,
        colonist: false,
        treasure_train: false,
        can_raid: false,
        price: None,
    };
    let colonist = |id: &str, skill: i32, price: u32| UnitTypeDef {
        colonist: true,
        skill,
        price: Some(price),
        ..unit(id, 0, 1, 1)
    };
    let ship = |id: &str, offence: u32, defence: u32, moves: u32, space: u32| UnitTypeDef {
        naval: true,
        space,
        ..unit(id, offence, defence, moves)
    };

    let unit_types = vec![
        colonist("free_colonist", 0, 600),
        UnitTypeDef {
            expert_goods: Some(gt("food")),
            ..colonist("expert_farmer", 1, 1100)
        },
        UnitTypeDef {
            expert_role: Some(Role::Pioneer),
            ..colonist("hardy_pioneer", 1, 1200)
        },
        UnitTypeDef {
            expert_role: Some(Role::Scout),
            ..colonist("seasoned_scout", 1, 1400)
        },
        UnitTypeDef {
            expert_role: Some(Role::Soldier),
            ..colonist("veteran_soldier", 2, 2000)
        },
        UnitTypeDef {
            expert_role: Some(Role::Missionary),
            ..colonist("jesuit_missionary", 2, 2000)
        },
        UnitTypeDef {
            price: Some(1000),
            ..ship("caravel", 0, 2, 4, 2)
        },
        UnitTypeDef {
            price: Some(2000),
            ..ship("merchantman", 0, 6, 5, 4)
        },
        UnitTypeDef {
            can_raid: true,
            price: Some(2000),
            ..ship("privateer", 8, 8, 6, 2)
        },
        ship("man_o_war", 24, 24, 6, 6),
        UnitTypeDef {
            space: 2,
            ..unit("wagon_train", 0, 1, 2)
        },
        UnitTypeDef {
            treasure_train: true,
            space_taken: 6,
            ..unit("treasure_train", 0, 0, 1)
        },
        unit("native_brave", 1, 1, 1),
        UnitTypeDef {
            expert_role: Some(Role::Soldier),
            ..unit("king_regular", 4, 3, 1)
        },
    ];

    let goods_types = ["food", "furs", "tools", "muskets", "horses"]
        .iter()
        .map(|id| GoodsTypeDef {
            id: gt(id),
            name: (*id).to_string(),
            food: *id == "food",
        })
        .collect();

    let role = |role: Role, goods: Vec<(GoodsTypeId, u32)>| RoleDef {
        role,
        goods,
        offence_bonus: 0,
        defence_bonus: 0,
        moves_per_turn: None,
        max_uses: 1,
        europe_only: false,
    };
    let roles = vec![
        role(Role::Default, vec![]),
        RoleDef {
            offence_bonus: 2,
            defence_bonus: 1,
            ..role(Role::Soldier, vec![(gt("muskets"), 50)])
        },
        RoleDef {
            offence_bonus: 3,
            defence_bonus: 2,
            moves_per_turn: Some(4),
            ..role(Role::Dragoon, vec![(gt("muskets"), 50), (gt("horses"), 50)])
        },
        RoleDef {
            max_uses: 3,
            ..role(Role::Pioneer, vec![(gt("tools"), 20)])
        },
        RoleDef {
            moves_per_turn: Some(4),
            ..role(Role::Scout, vec![(gt("horses"), 50)])
        },
        RoleDef {
            europe_only: true,
            ..role(Role::Missionary, vec![])
        },
    ];

    GameContent {
        content_version: "test".to_string(),
        unit_types: unit_types.into_iter().map(|d| (d.id.clone(), d)).collect(),
        goods_types,
        roles,
        constants: Constants {
            europe_sail_turns: 2,
            cash_in_fee_percent: 50,
            rumour_gold: 100,
            chief_gift_gold: 50,
            worker_production: 3,
            expert_production: 6,
            native_production: 2,
            native_goods: gt("furs"),
            default_work_goods: gt("food"),
            warehouse_capacity: 100,
            goods_per_slot: 100,
            improvement_turns: 3,
            gift_amount: 20,
            demand_amount: 30,
            gift_tension_relief: 20,
            demand_tension: 15,
            tension_decay: 2,
            fortify_bonus_percent: 50,
            settlement_bonus_percent: 50,
            combat_tension: 25,
            settlement_treasure: 300,
            treasure_train_type: ut("treasure_train"),
        },
    }
}

fn faction(id: FactionId, name: &str, kind: FactionKind, entry: TilePos) -> FactionState {
    FactionState {
        id,
        name: name.to_string(),
        kind,
        ai: true,
        gold: 1000,
        stances: BTreeMap::new(),
        tension: BTreeMap::new(),
        treaty_turn: BTreeMap::new(),
        entry_location: entry,
        dead: false,
    }
}

/// Map, factions at peace with each other, and two native villages.
pub fn base_state(content: &GameContent) -> GameState {
    let mut factions = BTreeMap::new();
    factions.insert(
        DUTCH,
        faction(DUTCH, "Dutch", FactionKind::European, TilePos::new(1, 3)),
    );
    factions.insert(
        ENGLISH,
        faction(ENGLISH, "English", FactionKind::European, TilePos::new(1, 5)),
    );
    factions.insert(
        ARAWAK,
        faction(ARAWAK, "Arawak", FactionKind::Native, TilePos::new(0, 0)),
    );
    let ids: Vec<FactionId> = factions.keys().copied().collect();
    for faction in factions.values_mut() {
        for other in &ids {
            if *other != faction.id {
                faction.stances.insert(*other, Stance::Peace);
            }
        }
    }

    let prices = [("food", 1), ("furs", 4), ("tools", 2), ("muskets", 3), ("horses", 2)]
        .iter()
        .map(|(g, p)| (gt(g), *p))
        .collect();

    let mut state = GameState {
        meta: MetaState {
            turn: 1,
            seed: 42,
            schema_version: 1,
            content_version: content.content_version.clone(),
        },
        map: parse_map(&MAP_ROWS),
        units: Vec::new(),
        settlements: BTreeMap::new(),
        factions,
        europe: EuropeState { prices },
        counters: Counters {
            next_event_id: 0,
            next_command_id: 0,
            next_settlement_id: 1,
        },
    };
    add_settlement(
        &mut state,
        ARAWAK,
        TilePos::new(8, 4),
        SettlementKind::Native,
    );
    add_settlement(
        &mut state,
        ARAWAK,
        TilePos::new(13, 3),
        SettlementKind::Native,
    );
    state
}

/// Places a settlement directly, claiming the surrounding land.
pub fn add_settlement(
    state: &mut GameState,
    owner: FactionId,
    tile: TilePos,
    kind: SettlementKind,
) -> SettlementId {
    let name = format!("settlement {}", state.counters.next_settlement_id);
    state.place_settlement(owner, tile, kind, &name)
}

/// Adds a unit of `unit_type` at `location` in the default role.
pub fn spawn(
    state: &mut GameState,
    content: &GameContent,
    unit_type: &str,
    owner: FactionId,
    location: Location,
) -> UnitId {
    state.add_unit(content, &ut(unit_type), owner, location, Role::Default)
}

/// Adds a colonist already working inside `colony`.
pub fn spawn_worker(
    state: &mut GameState,
    content: &GameContent,
    unit_type: &str,
    colony: SettlementId,
) -> UnitId {
    let (owner, tile) = state
        .settlement(colony)
        .map(|s| (s.owner, s.tile))
        .expect("colony exists");
    let id = spawn(state, content, unit_type, owner, Location::Tile(tile));
    if let Some(unit) = state.unit_mut(id) {
        unit.working_in = Some(colony);
        unit.work_goods = Some(content.constants.default_work_goods.clone());
    }
    id
}

pub fn set_war(state: &mut GameState, a: FactionId, b: FactionId) {
    for (x, y) in [(a, b), (b, a)] {
        if let Some(faction) = state.factions.get_mut(&x) {
            faction.stances.insert(y, Stance::War);
        }
    }
}
