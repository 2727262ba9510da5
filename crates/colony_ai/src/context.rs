use colony_core::{
    execute, make_cmd, Command, CommandError, EventEnvelope, GameContent, GameState,
};
use rand::{Rng, RngCore};

use crate::config::AiConfig;
use crate::scratch::TurnScratch;
use crate::types::AiState;

/// Mutable handle on everything one faction's turn touches.
pub struct AiContext<'a> {
    pub world: &'a mut GameState,
    pub content: &'a GameContent,
    pub config: &'a AiConfig,
    pub ai: &'a mut AiState,
    pub scratch: &'a mut TurnScratch,
    pub rng: &'a mut dyn RngCore,
    /// Events produced by every command submitted this turn.
    pub events: &'a mut Vec<EventEnvelope>,
}

/// Read-only snapshot used by planners and target searches.
#[derive(Clone, Copy)]
pub struct View<'a> {
    pub world: &'a GameState,
    pub content: &'a GameContent,
    pub config: &'a AiConfig,
    pub ai: &'a AiState,
    pub scratch: &'a TurnScratch,
}

impl<'a> AiContext<'a> {
    pub fn view(&self) -> View<'_> {
        View {
            world: self.world,
            content: self.content,
            config: self.config,
            ai: self.ai,
            scratch: self.scratch,
        }
    }

    /// Issues a command on behalf of the faction and applies it to the world.
    pub fn submit(&mut self, command: Command) -> Result<(), CommandError> {
        let turn = self.world.meta.turn;
        let envelope = make_cmd(&mut self.world.counters, self.ai.faction, turn, command);
        let events = execute(self.world, self.content, &envelope, &mut self.rng)?;
        self.events.extend(events);
        Ok(())
    }

    /// True with `percent` chance.
    pub fn roll(&mut self, percent: u32) -> bool {
        Rng::gen_range(&mut self.rng, 0..100u32) < percent
    }

    pub fn pick(&mut self, len: usize) -> usize {
        if len <= 1 {
            return 0;
        }
        Rng::gen_range(&mut self.rng, 0..len)
    }
}
