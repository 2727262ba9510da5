//! Catch-up injections that keep computer factions in the game: free gold,
//! recruits and ships under tunable random thresholds.

use colony_core::{Command, FactionKind, Location, Role, SettlementKind, UnitTypeId};
use tracing::{debug, info};

use crate::context::AiContext;

fn grant(ctx: &mut AiContext<'_>, command: Command, what: &str) {
    let faction = ctx.ai.faction;
    match ctx.submit(command) {
        Ok(()) => info!(faction = %faction, what, "bootstrap injection"),
        Err(err) => debug!(faction = %faction, what, %err, "bootstrap injection refused"),
    }
}

fn recruit(ctx: &mut AiContext<'_>, unit_type: UnitTypeId, role: Role, what: &str) {
    if ctx.content.unit_type(&unit_type).is_none() {
        return;
    }
    grant(ctx, Command::RecruitUnit { unit_type, role }, what);
}

/// Applies this turn's injections for the faction.
pub fn apply(ctx: &mut AiContext<'_>) {
    let faction = ctx.ai.faction;
    let Some(state) = ctx.world.factions.get(&faction) else {
        return;
    };
    match state.kind {
        FactionKind::European => colonial(ctx),
        FactionKind::Native => native(ctx),
        FactionKind::Royal => {}
    }
}

fn colonial(ctx: &mut AiContext<'_>) {
    let faction = ctx.ai.faction;
    let config = ctx.config;
    let gold = ctx.world.factions.get(&faction).map_or(0, |f| f.gold);

    if gold < config.poor_gold && ctx.roll(config.gold_grant_percent) {
        grant(ctx, Command::GrantGold { amount: config.gold_grant }, "gold");
    }
    if ctx.roll(config.recruit_percent) {
        recruit(ctx, config.default_worker_type.clone(), Role::Default, "colonist");
    }

    let content = ctx.content;
    let world = &*ctx.world;
    let carriers = world
        .faction_units(faction)
        .filter(|u| {
            content
                .unit_type(&u.unit_type)
                .is_some_and(|d| d.naval && d.space > 0)
        })
        .count();
    let colonies = world.colonies_of(faction).count();
    let stranded = world.faction_units(faction).any(|u| {
        u.location == Location::Europe
            && content.unit_type(&u.unit_type).is_some_and(|d| !d.naval)
    });
    let at_war = world
        .factions
        .values()
        .any(|f| f.id != faction && !f.dead && world.at_war(faction, f.id));

    let wanted = ctx.ai.carrier_shortfall || stranded;
    if wanted && carriers < 1 + colonies / 2 {
        recruit(ctx, config.carrier_type.clone(), Role::Default, "carrier");
    }
    if at_war && ctx.roll(config.soldier_percent) {
        recruit(ctx, config.soldier_type.clone(), Role::Soldier, "soldier");
    }
}

fn native(ctx: &mut AiContext<'_>) {
    let faction = ctx.ai.faction;
    let config = ctx.config;
    let villages = ctx
        .world
        .settlements
        .values()
        .filter(|s| s.owner == faction && s.kind == SettlementKind::Native)
        .count();
    let braves = ctx
        .world
        .faction_units(faction)
        .filter(|u| u.unit_type == config.native_unit_type)
        .count();
    if villages > 0 && braves < villages * 2 && ctx.roll(config.recruit_percent) {
        recruit(ctx, config.native_unit_type.clone(), Role::Default, "brave");
    }
}
