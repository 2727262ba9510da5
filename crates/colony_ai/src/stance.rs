//! Diplomatic stance decisions, made at the start of every faction turn.

use colony_core::{Command, FactionId, FactionKind, Stance};
use tracing::{debug, info};

use crate::config::AiConfig;
use crate::context::AiContext;

/// Chance, in percent, that a peace signed `turns_since` turns ago still
/// holds when tension says war.
pub fn treaty_hold_percent(turns_since: u64, decay: i32) -> u32 {
    let lost = i64::try_from(turns_since)
        .unwrap_or(i64::MAX)
        .saturating_mul(i64::from(decay));
    (100i64.saturating_sub(lost)).clamp(0, 100) as u32
}

/// The stance tension alone asks for, if it differs from `current`.
///
/// 1. The crown and its colonists are always at war.
/// 2. First contact starts in peace.
/// 3. War ends once resentment falls to the peace threshold.
/// 4. Peace breaks once resentment reaches the war threshold.
pub fn desired_stance(
    own: FactionKind,
    other: FactionKind,
    current: Stance,
    tension: i32,
    config: &AiConfig,
) -> Option<Stance> {
    let royal_war = matches!(
        (own, other),
        (FactionKind::Royal, FactionKind::European) | (FactionKind::European, FactionKind::Royal)
    );
    let wanted = if royal_war {
        Stance::War
    } else {
        match current {
            Stance::Unknown => Stance::Peace,
            Stance::War if tension <= config.peace_tension => Stance::Peace,
            Stance::Peace if tension >= config.war_tension => Stance::War,
            other => other,
        }
    };
    (wanted != current).then_some(wanted)
}

/// Decides and applies a stance towards every other live faction.
pub fn determine_stances(ctx: &mut AiContext<'_>) {
    let faction = ctx.ai.faction;
    let Some(own) = ctx.world.factions.get(&faction) else {
        return;
    };
    let own_kind = own.kind;
    let turn = ctx.world.meta.turn;
    let others: Vec<(FactionId, FactionKind, Option<u64>)> = ctx
        .world
        .factions
        .values()
        .filter(|f| f.id != faction && !f.dead)
        .map(|f| (f.id, f.kind, own.treaty_turn.get(&f.id).copied()))
        .collect();

    for (other, other_kind, treaty) in others {
        let current = ctx.world.stance(faction, other);
        let tension = ctx.world.tension(faction, other);
        let Some(stance) = desired_stance(own_kind, other_kind, current, tension, ctx.config)
        else {
            continue;
        };
        if current == Stance::Peace && stance == Stance::War {
            let since = treaty.map_or(u64::MAX, |t| turn.saturating_sub(t));
            let hold = treaty_hold_percent(since, ctx.config.peace_hold_decay);
            if ctx.roll(hold) {
                debug!(faction = %faction, other = %other, hold, "peace treaty holds");
                continue;
            }
        }
        match ctx.submit(Command::SetStance { other, stance }) {
            Ok(()) => info!(faction = %faction, other = %other, ?stance, "stance changed"),
            Err(err) => debug!(faction = %faction, other = %other, %err, "stance change refused"),
        }
    }
}
