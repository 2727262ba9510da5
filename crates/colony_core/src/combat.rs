//! Combat resolution and native dealings with foreign colonies.
//!
//! Win probability is `offence / (offence + defence)`. A losing unit in an
//! armed role is disarmed; any other loser is destroyed. An unarmed colony
//! defender that loses hands the colony to a colonial attacker, while
//! natives only pillage. A native settlement falls once its last brave does.

use rand::Rng;

use crate::engine::{actor, on_map, require_moves, unit_def, CommandError};
use crate::{
    emit, Event, EventEnvelope, FactionId, FactionKind, GameContent, GameState, Location, Role,
    SettlementId, SettlementKind, TilePos, UnitId, UnitState,
};

pub fn offence_power(content: &GameContent, unit: &UnitState) -> u32 {
    let base = content.unit_type(&unit.unit_type).map_or(0, |d| d.offence);
    let bonus = content.role(unit.role).map_or(0, |r| r.offence_bonus);
    base + bonus
}

pub fn defence_power(state: &GameState, content: &GameContent, unit: &UnitState) -> u32 {
    let base = content.unit_type(&unit.unit_type).map_or(1, |d| d.defence);
    let bonus = content.role(unit.role).map_or(0, |r| r.defence_bonus);
    let mut power = (base + bonus).max(1);
    if unit.fortified {
        power = power * (100 + content.constants.fortify_bonus_percent) / 100;
    }
    let in_settlement = unit
        .location
        .tile()
        .is_some_and(|pos| state.settlement_at(pos).is_some());
    if in_settlement {
        power = power * (100 + content.constants.settlement_bonus_percent) / 100;
    }
    power
}

/// Strongest unit standing on the tile. Ties go to the lowest id.
fn best_defender(state: &GameState, content: &GameContent, pos: TilePos) -> Option<UnitId> {
    state
        .units_at(Location::Tile(pos))
        .map(|u| (defence_power(state, content, u), u.id))
        .max_by(|a, b| a.0.cmp(&b.0).then(b.1.cmp(&a.1)))
        .map(|(_, id)| id)
}

pub(crate) fn attack(
    state: &mut GameState,
    content: &GameContent,
    by: FactionId,
    id: UnitId,
    target: TilePos,
    rng: &mut impl Rng,
    events: &mut Vec<EventEnvelope>,
) -> Result<(), CommandError> {
    let unit = actor(state, by, id)?;
    let from = on_map(unit)?;
    require_moves(unit)?;
    if !from.is_adjacent(target) {
        return Err(CommandError::NotAdjacent(target));
    }
    let naval = unit_def(content, unit)?.naval;
    let offence = offence_power(content, unit);
    if offence == 0 {
        return Err(CommandError::Invalid("unit cannot attack"));
    }
    if naval != state.map.is_water(target) {
        return Err(CommandError::Blocked(target));
    }
    let defender = best_defender(state, content, target);
    let settlement = state.settlement_at(target).map(|s| (s.id, s.owner));
    let enemy = defender
        .and_then(|d| state.unit(d).map(|u| u.owner))
        .or(settlement.map(|(_, owner)| owner))
        .ok_or(CommandError::Invalid("nothing to attack"))?;
    if !state.at_war(by, enemy) {
        return Err(CommandError::Invalid("not at war"));
    }

    if let Some(unit) = state.unit_mut(id) {
        unit.moves_left = 0;
        unit.fortified = false;
    }
    if let Some(faction) = state.factions.get_mut(&enemy) {
        *faction.tension.entry(by).or_default() += content.constants.combat_tension;
    }

    let Some(defender) = defender else {
        if let Some((settlement, _)) = settlement {
            overrun(state, content, by, id, settlement, events);
        }
        return Ok(());
    };

    let defence = state
        .unit(defender)
        .map_or(1, |d| defence_power(state, content, d));
    let attacker_won = rng.gen_range(0..offence + defence) < offence;
    let turn = state.meta.turn;
    events.push(emit(
        &mut state.counters,
        turn,
        Event::CombatResolved {
            attacker: id,
            defender,
            attacker_won,
        },
    ));

    if !attacker_won {
        lose(state, id, events);
        return Ok(());
    }
    let unarmed = state.unit(defender).is_some_and(|d| !d.role.is_armed());
    match settlement {
        Some((settlement, _)) if unarmed => {
            let native_target = state
                .settlement(settlement)
                .is_some_and(|s| s.kind == SettlementKind::Native);
            if native_target {
                lose(state, defender, events);
                if best_defender(state, content, target).is_none() {
                    overrun(state, content, by, id, settlement, events);
                }
            } else {
                overrun(state, content, by, id, settlement, events);
            }
        }
        _ => lose(state, defender, events),
    }
    Ok(())
}

/// Disarms an armed loser, destroys anything else.
fn lose(state: &mut GameState, id: UnitId, events: &mut Vec<EventEnvelope>) {
    let turn = state.meta.turn;
    let armed = state.unit(id).is_some_and(|u| u.role.is_armed());
    if armed {
        if let Some(unit) = state.unit_mut(id) {
            unit.role = Role::Default;
            unit.role_uses = 0;
            unit.fortified = false;
        }
        events.push(emit(
            &mut state.counters,
            turn,
            Event::RoleChanged {
                unit: id,
                role: Role::Default,
            },
        ));
        return;
    }
    for disposed in state.dispose_unit(id) {
        events.push(emit(
            &mut state.counters,
            turn,
            Event::UnitDestroyed { unit: disposed },
        ));
    }
}

/// The attacker takes a settlement whose defence has collapsed.
fn overrun(
    state: &mut GameState,
    content: &GameContent,
    by: FactionId,
    attacker: UnitId,
    settlement: SettlementId,
    events: &mut Vec<EventEnvelope>,
) {
    let Some(target) = state.settlement(settlement) else {
        return;
    };
    let (kind, old_owner, tile) = (target.kind, target.owner, target.tile);
    let attacker_kind = state.factions.get(&by).map(|f| f.kind);
    let turn = state.meta.turn;

    match (kind, attacker_kind) {
        (SettlementKind::Colony, Some(FactionKind::Native)) => {
            if let Some(target) = state.settlements.get_mut(&settlement) {
                for stock in target.goods.values_mut() {
                    *stock /= 2;
                }
            }
        }
        (SettlementKind::Colony, _) => {
            if let Some(target) = state.settlements.get_mut(&settlement) {
                target.owner = by;
            }
            let stranded: Vec<UnitId> = state
                .units_at(Location::Tile(tile))
                .filter(|u| u.owner == old_owner && u.working_in != Some(settlement))
                .map(|u| u.id)
                .collect();
            for id in stranded {
                for disposed in state.dispose_unit(id) {
                    events.push(emit(
                        &mut state.counters,
                        turn,
                        Event::UnitDestroyed { unit: disposed },
                    ));
                }
            }
            for unit in state.units.iter_mut().filter_map(Option::as_mut) {
                if unit.working_in == Some(settlement) {
                    unit.owner = by;
                }
            }
            let claimed: Vec<TilePos> = std::iter::once(tile)
                .chain(state.map.neighbours(tile))
                .collect();
            for pos in claimed {
                if let Some(t) = state.map.tile_mut(pos) {
                    if t.owner == Some(old_owner) {
                        t.owner = Some(by);
                    }
                }
            }
            events.push(emit(
                &mut state.counters,
                turn,
                Event::SettlementCaptured {
                    settlement,
                    new_owner: by,
                },
            ));
        }
        (SettlementKind::Native, _) => {
            destroy_settlement(state, settlement, events);
            let treasure_type = &content.constants.treasure_train_type;
            let colonial = matches!(
                attacker_kind,
                Some(FactionKind::European | FactionKind::Royal)
            );
            let at = state.unit(attacker).map(|u| u.location);
            if let (true, Some(at), Some(_)) = (colonial, at, content.unit_type(treasure_type)) {
                let train = state.add_unit(content, treasure_type, by, at, Role::Default);
                if let Some(train) = state.unit_mut(train) {
                    train.treasure = content.constants.settlement_treasure;
                    train.moves_left = 0;
                }
            }
        }
    }
}

fn destroy_settlement(
    state: &mut GameState,
    settlement: SettlementId,
    events: &mut Vec<EventEnvelope>,
) {
    let Some(removed) = state.settlements.remove(&settlement) else {
        return;
    };
    let claimed: Vec<TilePos> = std::iter::once(removed.tile)
        .chain(state.map.neighbours(removed.tile))
        .collect();
    for pos in claimed {
        if let Some(t) = state.map.tile_mut(pos) {
            if t.settlement == Some(settlement) {
                t.settlement = None;
            }
            if t.owner == Some(removed.owner) {
                t.owner = None;
            }
        }
    }
    for unit in state.units.iter_mut().filter_map(Option::as_mut) {
        if unit.home_settlement == Some(settlement) {
            unit.home_settlement = None;
        }
    }
    let homeless = !state.settlements.values().any(|s| s.owner == removed.owner);
    if let Some(faction) = state.factions.get_mut(&removed.owner) {
        if homeless && faction.kind == FactionKind::Native {
            faction.dead = true;
        }
    }
    let turn = state.meta.turn;
    events.push(emit(
        &mut state.counters,
        turn,
        Event::SettlementDestroyed { settlement },
    ));
}

// ---------------------------------------------------------------------------
// Gifts and demands
// ---------------------------------------------------------------------------

/// Validates a native unit standing next to a foreign settlement.
fn native_visit(
    state: &GameState,
    by: FactionId,
    id: UnitId,
    settlement: SettlementId,
) -> Result<(SettlementId, FactionId), CommandError> {
    let unit = actor(state, by, id)?;
    let home = unit
        .home_settlement
        .ok_or(CommandError::Invalid("unit has no home settlement"))?;
    let pos = on_map(unit)?;
    require_moves(unit)?;
    let target = state
        .settlement(settlement)
        .ok_or(CommandError::UnknownSettlement(settlement))?;
    if target.owner == by {
        return Err(CommandError::Invalid("target is an own settlement"));
    }
    if pos.distance(target.tile) > 1 {
        return Err(CommandError::NotAdjacent(target.tile));
    }
    Ok((home, target.owner))
}

pub(crate) fn deliver_gift(
    state: &mut GameState,
    content: &GameContent,
    by: FactionId,
    id: UnitId,
    settlement: SettlementId,
    events: &mut Vec<EventEnvelope>,
) -> Result<(), CommandError> {
    let (home, recipient) = native_visit(state, by, id, settlement)?;
    let goods = content.constants.native_goods.clone();
    let amount = state
        .settlement_goods(home, &goods)
        .min(content.constants.gift_amount);
    if amount == 0 {
        return Err(CommandError::Invalid("nothing to give"));
    }

    if let Some(home) = state.settlements.get_mut(&home) {
        if let Some(stock) = home.goods.get_mut(&goods) {
            *stock -= amount;
        }
    }
    if let Some(target) = state.settlements.get_mut(&settlement) {
        *target.goods.entry(goods.clone()).or_default() += amount;
    }
    if let Some(faction) = state.factions.get_mut(&by) {
        let tension = faction.tension.entry(recipient).or_default();
        *tension = (*tension - content.constants.gift_tension_relief).max(0);
    }
    if let Some(unit) = state.unit_mut(id) {
        unit.moves_left = 0;
    }
    let turn = state.meta.turn;
    events.push(emit(
        &mut state.counters,
        turn,
        Event::GiftDelivered {
            settlement,
            goods_type: goods,
            amount,
        },
    ));
    Ok(())
}

pub(crate) fn demand_tribute(
    state: &mut GameState,
    content: &GameContent,
    by: FactionId,
    id: UnitId,
    settlement: SettlementId,
    events: &mut Vec<EventEnvelope>,
) -> Result<(), CommandError> {
    let (home, victim) = native_visit(state, by, id, settlement)?;
    let tribute = state.settlement(settlement).and_then(|target| {
        target
            .goods
            .iter()
            .filter(|(_, n)| **n > 0)
            .max_by(|a, b| a.1.cmp(b.1).then(b.0.cmp(a.0)))
            .map(|(g, n)| (g.clone(), (*n).min(content.constants.demand_amount)))
    });

    match &tribute {
        Some((goods, amount)) => {
            if let Some(target) = state.settlements.get_mut(&settlement) {
                if let Some(stock) = target.goods.get_mut(goods) {
                    *stock -= amount;
                }
            }
            if let Some(home) = state.settlements.get_mut(&home) {
                *home.goods.entry(goods.clone()).or_default() += amount;
            }
        }
        None => {
            if let Some(faction) = state.factions.get_mut(&by) {
                *faction.tension.entry(victim).or_default() += content.constants.demand_tension;
            }
        }
    }
    if let Some(unit) = state.unit_mut(id) {
        unit.moves_left = 0;
    }
    let (goods_type, amount) = tribute.map_or((None, 0), |(g, n)| (Some(g), n));
    let turn = state.meta.turn;
    events.push(emit(
        &mut state.counters,
        turn,
        Event::TributeDemanded {
            settlement,
            goods_type,
            amount,
        },
    ));
    Ok(())
}
