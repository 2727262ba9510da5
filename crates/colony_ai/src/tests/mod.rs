use colony_core::test_fixtures::{add_settlement, base_content, base_state, make_rng, spawn, ut};
use colony_core::{
    EventEnvelope, FactionId, GameContent, GameState, Location, SettlementId, SettlementKind,
    TilePos, UnitId,
};
use rand_chacha::ChaCha8Rng;

use crate::config::AiConfig;
use crate::context::{AiContext, View};
use crate::mission::Mission;
use crate::scratch::TurnScratch;
use crate::turn::sync_registry;
use crate::types::{AiColony, AiState};
use crate::wish::{Wish, WishIndex, WishKind};
use crate::WishId;

mod cargo;
mod labor;
mod selector;
mod stance;
mod wish;

// --- Shared test helpers ------------------------------------------------

/// One faction's AI over the fixture world.
struct Harness {
    content: GameContent,
    world: GameState,
    config: AiConfig,
    ai: AiState,
    scratch: TurnScratch,
    rng: ChaCha8Rng,
    events: Vec<EventEnvelope>,
}

impl Harness {
    fn new(faction: FactionId) -> Self {
        let content = base_content();
        let world = base_state(&content);
        Self {
            content,
            world,
            config: AiConfig::default(),
            ai: AiState::new(faction),
            scratch: TurnScratch::default(),
            rng: make_rng(),
            events: Vec::new(),
        }
    }

    fn ctx(&mut self) -> AiContext<'_> {
        AiContext {
            world: &mut self.world,
            content: &self.content,
            config: &self.config,
            ai: &mut self.ai,
            scratch: &mut self.scratch,
            rng: &mut self.rng,
            events: &mut self.events,
        }
    }

    fn view(&self) -> View<'_> {
        View {
            world: &self.world,
            content: &self.content,
            config: &self.config,
            ai: &self.ai,
            scratch: &self.scratch,
        }
    }

    /// Adds a unit for the harness faction and registers it.
    fn spawn(&mut self, unit_type: &str, location: Location) -> UnitId {
        let faction = self.ai.faction;
        self.spawn_for(faction, unit_type, location)
    }

    fn spawn_for(&mut self, owner: FactionId, unit_type: &str, location: Location) -> UnitId {
        let id = spawn(&mut self.world, &self.content, unit_type, owner, location);
        self.sync();
        id
    }

    /// Adds a colonist working inside `colony`.
    fn worker(&mut self, unit_type: &str, colony: SettlementId) -> UnitId {
        let id = colony_core::test_fixtures::spawn_worker(
            &mut self.world,
            &self.content,
            unit_type,
            colony,
        );
        self.sync();
        id
    }

    fn colony(&mut self, x: i32, y: i32) -> SettlementId {
        let faction = self.ai.faction;
        let id = add_settlement(
            &mut self.world,
            faction,
            TilePos::new(x, y),
            SettlementKind::Colony,
        );
        self.ai.colonies.insert(id, AiColony::new(id));
        id
    }

    fn stock(&mut self, colony: SettlementId, goods: &str, amount: u32) {
        if let Some(s) = self.world.settlements.get_mut(&colony) {
            s.goods.insert(colony_core::test_fixtures::gt(goods), amount);
        }
    }

    fn sync(&mut self) {
        sync_registry(&mut self.ctx());
    }

    fn set_mission(&mut self, unit: UnitId, mission: Mission) {
        if let Some(record) = self.ai.units.get_mut(&unit) {
            record.mission = Some(mission);
        }
    }

    fn mission(&self, unit: UnitId) -> Option<&Mission> {
        self.ai.mission(unit)
    }

    fn add_wish(&mut self, colony: SettlementId, kind: WishKind, value: i32) -> WishId {
        let id = self.ai.next_wish_id();
        self.ai.wishes.insert(
            id,
            Wish {
                id,
                destination: colony,
                value,
                transportable: None,
                kind,
            },
        );
        self.ai
            .colonies
            .entry(colony)
            .or_insert_with(|| AiColony::new(colony))
            .wishes
            .push(id);
        id
    }

    fn reindex(&mut self) {
        self.scratch.wishes = WishIndex::rebuild(&self.ai, &self.world);
    }
}

fn tile(x: i32, y: i32) -> Location {
    Location::Tile(TilePos::new(x, y))
}

fn worker_kind(unit_type: &str, expert_required: bool) -> WishKind {
    WishKind::Worker {
        unit_type: ut(unit_type),
        expert_required,
    }
}
