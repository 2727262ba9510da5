use rand::Rng;
use thiserror::Error;
use tracing::debug;

use crate::combat::{attack, deliver_gift, demand_tribute};
use crate::equip::{equip_cost, role_goods};
use crate::{
    emit, goods_slots, Command, CommandEnvelope, CommandId, Counters, Event, EventEnvelope,
    FactionId, FactionKind, GameContent, GameState, GoodsTypeId, ImprovementKind, Location, Role,
    SettlementId, SettlementKind, SettlementState, Stance, TilePos, TileWork, UnitId, UnitState,
    UnitTypeDef, UnitTypeId, Voyage, VoyageLeg,
};

/// Why the world refused a command.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("unit {0} does not exist")]
    UnknownUnit(UnitId),
    #[error("unit {unit} is not owned by {faction}")]
    NotOwner { unit: UnitId, faction: FactionId },
    #[error("unit {0} is at sea")]
    Sailing(UnitId),
    #[error("unit {0} has no moves left")]
    NoMoves(UnitId),
    #[error("settlement {0} does not exist")]
    UnknownSettlement(SettlementId),
    #[error("faction {0} does not exist")]
    UnknownFaction(FactionId),
    #[error("unit type {0} does not exist")]
    UnknownUnitType(UnitTypeId),
    #[error("{0} is not adjacent")]
    NotAdjacent(TilePos),
    #[error("cannot enter {0}")]
    Blocked(TilePos),
    #[error("carrier {0} has no room")]
    NoRoom(UnitId),
    #[error("not enough {goods}: have {have}, need {need}")]
    NotEnoughGoods {
        goods: GoodsTypeId,
        have: u32,
        need: u32,
    },
    #[error("not enough gold: have {have}, need {need}")]
    NotEnoughGold { have: i64, need: i64 },
    #[error("{0}")]
    Invalid(&'static str),
}

pub fn make_cmd(
    counters: &mut Counters,
    issued_by: FactionId,
    turn: u64,
    command: Command,
) -> CommandEnvelope {
    let id = CommandId(format!("cmd_{:06}", counters.next_command_id));
    counters.next_command_id += 1;
    CommandEnvelope {
        id,
        issued_by,
        issued_turn: turn,
        command,
    }
}

/// Validates and applies one command. Nothing is mutated when an error is returned.
pub fn execute(
    state: &mut GameState,
    content: &GameContent,
    envelope: &CommandEnvelope,
    rng: &mut impl Rng,
) -> Result<Vec<EventEnvelope>, CommandError> {
    let mut events = Vec::new();
    let by = envelope.issued_by;
    let result = match &envelope.command {
        Command::Move { unit, to } => move_unit(state, content, by, *unit, *to, rng, &mut events),
        Command::SailToEurope { unit } => {
            sail(state, content, by, *unit, VoyageLeg::ToEurope, &mut events)
        }
        Command::SailToAmerica { unit } => {
            sail(state, content, by, *unit, VoyageLeg::ToAmerica, &mut events)
        }
        Command::Embark { unit, carrier } => {
            embark(state, content, by, *unit, *carrier, &mut events)
        }
        Command::Disembark { unit, to } => {
            disembark(state, content, by, *unit, *to, rng, &mut events)
        }
        Command::LoadGoods {
            carrier,
            goods_type,
            amount,
        } => load_goods(state, content, by, *carrier, goods_type, *amount, &mut events),
        Command::UnloadGoods {
            carrier,
            goods_type,
            amount,
        } => unload_goods(state, by, *carrier, goods_type, *amount, &mut events),
        Command::BuildColony { unit, name } => {
            build_colony(state, content, by, *unit, name, &mut events)
        }
        Command::JoinColony { unit, settlement } => {
            join_colony(state, content, by, *unit, *settlement, &mut events)
        }
        Command::AssignWork { unit, goods_type } => {
            assign_work(state, content, by, *unit, goods_type)
        }
        Command::Equip { unit, role } => equip(state, content, by, *unit, *role, &mut events),
        Command::ImproveTile { unit, improvement } => {
            improve_tile(state, content, by, *unit, *improvement)
        }
        Command::Fortify { unit } => fortify(state, by, *unit),
        Command::Attack { unit, target } => {
            attack(state, content, by, *unit, *target, rng, &mut events)
        }
        Command::SpeakToChief { unit, settlement } => {
            speak_to_chief(state, content, by, *unit, *settlement, &mut events)
        }
        Command::EstablishMission { unit, settlement } => {
            establish_mission(state, content, by, *unit, *settlement, &mut events)
        }
        Command::CashInTreasure { unit } => cash_in(state, content, by, *unit, &mut events),
        Command::DeliverGift { unit, settlement } => {
            deliver_gift(state, content, by, *unit, *settlement, &mut events)
        }
        Command::DemandTribute { unit, settlement } => {
            demand_tribute(state, content, by, *unit, *settlement, &mut events)
        }
        Command::SetStance { other, stance } => {
            set_stance(state, by, *other, *stance, &mut events)
        }
        Command::GrantGold { amount } => grant_gold(state, by, *amount, &mut events),
        Command::RecruitUnit { unit_type, role } => {
            recruit(state, content, by, unit_type, *role, &mut events)
        }
    };
    if let Err(err) = &result {
        debug!(command = envelope.id.0.as_str(), faction = %by, %err, "command rejected");
    }
    result.map(|()| events)
}

// ---------------------------------------------------------------------------
// Shared validation
// ---------------------------------------------------------------------------

/// Looks up a unit the faction may command right now.
pub(crate) fn actor(
    state: &GameState,
    faction: FactionId,
    id: UnitId,
) -> Result<&UnitState, CommandError> {
    let unit = state.unit(id).ok_or(CommandError::UnknownUnit(id))?;
    if unit.owner != faction {
        return Err(CommandError::NotOwner { unit: id, faction });
    }
    if unit.voyage.is_some() {
        return Err(CommandError::Sailing(id));
    }
    Ok(unit)
}

pub(crate) fn unit_def<'c>(
    content: &'c GameContent,
    unit: &UnitState,
) -> Result<&'c UnitTypeDef, CommandError> {
    content
        .unit_type(&unit.unit_type)
        .ok_or_else(|| CommandError::UnknownUnitType(unit.unit_type.clone()))
}

pub(crate) fn on_map(unit: &UnitState) -> Result<TilePos, CommandError> {
    unit.location
        .tile()
        .ok_or(CommandError::Invalid("unit is not on the map"))
}

pub(crate) fn require_moves(unit: &UnitState) -> Result<(), CommandError> {
    if unit.moves_left == 0 {
        return Err(CommandError::NoMoves(unit.id));
    }
    Ok(())
}

fn own_colony_at(state: &GameState, faction: FactionId, pos: TilePos) -> Option<SettlementId> {
    state
        .settlement_at(pos)
        .filter(|s| s.owner == faction && s.kind == SettlementKind::Colony)
        .map(|s| s.id)
}

fn foreign_units_on(state: &GameState, faction: FactionId, pos: TilePos) -> bool {
    state
        .units_at(Location::Tile(pos))
        .any(|u| u.owner != faction)
}

/// Leaves colony work and any tile job behind.
fn stand_down(unit: &mut UnitState) {
    unit.working_in = None;
    unit.work_goods = None;
    unit.work = None;
    unit.fortified = false;
}

/// Returns role equipment to the colony store and resets the role.
fn strip_role(state: &mut GameState, content: &GameContent, id: UnitId, colony: SettlementId) {
    let Some(unit) = state.unit(id) else {
        return;
    };
    let refund = role_goods(content, unit.role, unit.role_uses);
    if let Some(settlement) = state.settlements.get_mut(&colony) {
        for (goods, amount) in refund {
            *settlement.goods.entry(goods).or_default() += amount;
        }
    }
    if let Some(unit) = state.unit_mut(id) {
        unit.role = Role::Default;
        unit.role_uses = 0;
    }
}

fn explore_rumour(
    state: &mut GameState,
    content: &GameContent,
    id: UnitId,
    pos: TilePos,
    rng: &mut impl Rng,
    events: &mut Vec<EventEnvelope>,
) {
    let Some(owner) = state.unit(id).map(|u| u.owner) else {
        return;
    };
    let Some(tile) = state.map.tile_mut(pos) else {
        return;
    };
    if !tile.rumour {
        return;
    }
    tile.rumour = false;
    let gold = rng.gen_range(0..=content.constants.rumour_gold.max(0));
    if let Some(faction) = state.factions.get_mut(&owner) {
        faction.gold += gold;
    }
    let turn = state.meta.turn;
    events.push(emit(
        &mut state.counters,
        turn,
        Event::RumourExplored {
            unit: id,
            tile: pos,
            gold,
        },
    ));
}

// ---------------------------------------------------------------------------
// Movement
// ---------------------------------------------------------------------------

fn move_unit(
    state: &mut GameState,
    content: &GameContent,
    by: FactionId,
    id: UnitId,
    to: TilePos,
    rng: &mut impl Rng,
    events: &mut Vec<EventEnvelope>,
) -> Result<(), CommandError> {
    let unit = actor(state, by, id)?;
    let from = on_map(unit)?;
    require_moves(unit)?;
    if !from.is_adjacent(to) {
        return Err(CommandError::NotAdjacent(to));
    }
    let naval = unit_def(content, unit)?.naval;
    let map = &state.map;
    let enterable = if naval {
        map.is_water(to) || (own_colony_at(state, by, to).is_some() && map.is_coastal(to))
    } else {
        map.is_land(to) && state.settlement_at(to).map_or(true, |s| s.owner == by)
    };
    if !enterable || foreign_units_on(state, by, to) {
        return Err(CommandError::Blocked(to));
    }

    if let Some(unit) = state.unit_mut(id) {
        stand_down(unit);
        unit.location = Location::Tile(to);
        unit.moves_left -= 1;
    }
    let turn = state.meta.turn;
    events.push(emit(
        &mut state.counters,
        turn,
        Event::UnitMoved {
            unit: id,
            to: Location::Tile(to),
        },
    ));
    if !naval {
        explore_rumour(state, content, id, to, rng, events);
    }
    Ok(())
}

fn sail(
    state: &mut GameState,
    content: &GameContent,
    by: FactionId,
    id: UnitId,
    leg: VoyageLeg,
    events: &mut Vec<EventEnvelope>,
) -> Result<(), CommandError> {
    let unit = actor(state, by, id)?;
    if !unit_def(content, unit)?.naval {
        return Err(CommandError::Invalid("only ships can sail"));
    }
    match leg {
        VoyageLeg::ToEurope => {
            require_moves(unit)?;
            let pos = on_map(unit)?;
            if state.map.terrain(pos) != Some(crate::Terrain::HighSeas) {
                return Err(CommandError::Invalid("not on the high seas"));
            }
        }
        VoyageLeg::ToAmerica => {
            if !unit.location.is_europe() {
                return Err(CommandError::Invalid("not in europe"));
            }
        }
    }
    let arrives_turn = state.meta.turn + u64::from(content.constants.europe_sail_turns);
    if let Some(unit) = state.unit_mut(id) {
        unit.location = Location::Europe;
        unit.moves_left = 0;
        unit.voyage = Some(Voyage {
            to: leg,
            arrives_turn,
        });
    }
    if leg == VoyageLeg::ToEurope {
        let turn = state.meta.turn;
        events.push(emit(
            &mut state.counters,
            turn,
            Event::UnitMoved {
                unit: id,
                to: Location::Europe,
            },
        ));
    }
    Ok(())
}

fn embark(
    state: &mut GameState,
    content: &GameContent,
    by: FactionId,
    id: UnitId,
    carrier_id: UnitId,
    events: &mut Vec<EventEnvelope>,
) -> Result<(), CommandError> {
    let unit = actor(state, by, id)?;
    let carrier = actor(state, by, carrier_id)?;
    let carrier_def = unit_def(content, carrier)?;
    let passenger_def = unit_def(content, unit)?;
    if !carrier_def.naval || passenger_def.naval {
        return Err(CommandError::Invalid("units only board ships"));
    }
    if matches!(unit.location, Location::Aboard(_)) {
        return Err(CommandError::Invalid("already aboard"));
    }
    if state.space_left(carrier_id, content) < passenger_def.space_taken {
        return Err(CommandError::NoRoom(carrier_id));
    }
    let from_shore = match (unit.location, carrier.location) {
        (a, b) if a == b => false,
        (Location::Tile(a), Location::Tile(b)) if a.is_adjacent(b) && state.map.is_water(b) => {
            require_moves(unit)?;
            true
        }
        (_, Location::Tile(b)) => return Err(CommandError::NotAdjacent(b)),
        _ => return Err(CommandError::Invalid("carrier is elsewhere")),
    };

    if let Some(unit) = state.unit_mut(id) {
        stand_down(unit);
        unit.location = Location::Aboard(carrier_id);
        if from_shore {
            unit.moves_left = 0;
        }
    }
    let turn = state.meta.turn;
    events.push(emit(
        &mut state.counters,
        turn,
        Event::UnitEmbarked {
            unit: id,
            carrier: carrier_id,
        },
    ));
    Ok(())
}

fn disembark(
    state: &mut GameState,
    content: &GameContent,
    by: FactionId,
    id: UnitId,
    to: Option<TilePos>,
    rng: &mut impl Rng,
    events: &mut Vec<EventEnvelope>,
) -> Result<(), CommandError> {
    let unit = actor(state, by, id)?;
    let Location::Aboard(carrier_id) = unit.location else {
        return Err(CommandError::Invalid("not aboard a carrier"));
    };
    let carrier = actor(state, by, carrier_id)?;
    let destination = match (to, carrier.location) {
        (None, Location::Europe) => Location::Europe,
        (None, Location::Tile(pos)) if own_colony_at(state, by, pos).is_some() => {
            Location::Tile(pos)
        }
        (None, _) => return Err(CommandError::Invalid("carrier is not in port")),
        (Some(pos), Location::Tile(at)) => {
            require_moves(unit)?;
            if !at.is_adjacent(pos) {
                return Err(CommandError::NotAdjacent(pos));
            }
            let friendly = state.settlement_at(pos).map_or(true, |s| s.owner == by);
            if !state.map.is_land(pos) || !friendly || foreign_units_on(state, by, pos) {
                return Err(CommandError::Blocked(pos));
            }
            Location::Tile(pos)
        }
        (Some(_), _) => return Err(CommandError::Invalid("carrier is not on the map")),
    };

    if let Some(unit) = state.unit_mut(id) {
        unit.location = destination;
        if to.is_some() {
            unit.moves_left = 0;
        }
    }
    let turn = state.meta.turn;
    events.push(emit(
        &mut state.counters,
        turn,
        Event::UnitDisembarked {
            unit: id,
            at: destination,
        },
    ));
    if let Some(pos) = to {
        explore_rumour(state, content, id, pos, rng, events);
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Goods
// ---------------------------------------------------------------------------

fn load_goods(
    state: &mut GameState,
    content: &GameContent,
    by: FactionId,
    carrier_id: UnitId,
    goods: &GoodsTypeId,
    amount: u32,
    events: &mut Vec<EventEnvelope>,
) -> Result<(), CommandError> {
    let carrier = actor(state, by, carrier_id)?;
    if amount == 0 {
        return Err(CommandError::Invalid("nothing to load"));
    }
    let capacity = unit_def(content, carrier)?.space;
    let per_slot = content.constants.goods_per_slot;
    let held = carrier.goods.get(goods).copied().unwrap_or(0);
    let used = state.space_used(carrier_id, content) - goods_slots(held, per_slot);
    if used + goods_slots(held + amount, per_slot) > capacity {
        return Err(CommandError::NoRoom(carrier_id));
    }

    let location = carrier.location;
    match location {
        Location::Tile(pos) => {
            let colony = own_colony_at(state, by, pos)
                .ok_or(CommandError::Invalid("carrier is not in port"))?;
            let have = state.settlement_goods(colony, goods);
            if have < amount {
                return Err(CommandError::NotEnoughGoods {
                    goods: goods.clone(),
                    have,
                    need: amount,
                });
            }
            if let Some(settlement) = state.settlements.get_mut(&colony) {
                settlement.goods.insert(goods.clone(), have - amount);
            }
        }
        Location::Europe => {
            let price = state
                .europe
                .prices
                .get(goods)
                .copied()
                .ok_or(CommandError::Invalid("goods not sold in europe"))?;
            let cost = i64::from(price) * i64::from(amount);
            let faction = state
                .factions
                .get_mut(&by)
                .ok_or(CommandError::UnknownFaction(by))?;
            if faction.gold < cost {
                return Err(CommandError::NotEnoughGold {
                    have: faction.gold,
                    need: cost,
                });
            }
            faction.gold -= cost;
        }
        Location::Aboard(_) => return Err(CommandError::Invalid("carrier is aboard")),
    }

    if let Some(carrier) = state.unit_mut(carrier_id) {
        *carrier.goods.entry(goods.clone()).or_default() += amount;
    }
    let turn = state.meta.turn;
    events.push(emit(
        &mut state.counters,
        turn,
        Event::GoodsLoaded {
            carrier: carrier_id,
            goods_type: goods.clone(),
            amount,
        },
    ));
    Ok(())
}

fn unload_goods(
    state: &mut GameState,
    by: FactionId,
    carrier_id: UnitId,
    goods: &GoodsTypeId,
    amount: u32,
    events: &mut Vec<EventEnvelope>,
) -> Result<(), CommandError> {
    let carrier = actor(state, by, carrier_id)?;
    let held = carrier.goods.get(goods).copied().unwrap_or(0);
    if amount == 0 || held < amount {
        return Err(CommandError::NotEnoughGoods {
            goods: goods.clone(),
            have: held,
            need: amount,
        });
    }
    let location = carrier.location;
    match location {
        Location::Tile(pos) => {
            let colony = own_colony_at(state, by, pos)
                .ok_or(CommandError::Invalid("carrier is not in port"))?;
            if let Some(settlement) = state.settlements.get_mut(&colony) {
                *settlement.goods.entry(goods.clone()).or_default() += amount;
            }
        }
        Location::Europe => {
            let price = state.europe.prices.get(goods).copied().unwrap_or(0);
            let proceeds = i64::from(price) * i64::from(amount) / 2;
            if let Some(faction) = state.factions.get_mut(&by) {
                faction.gold += proceeds;
            }
        }
        Location::Aboard(_) => return Err(CommandError::Invalid("carrier is aboard")),
    }

    if let Some(carrier) = state.unit_mut(carrier_id) {
        if held == amount {
            carrier.goods.remove(goods);
        } else {
            carrier.goods.insert(goods.clone(), held - amount);
        }
    }
    let turn = state.meta.turn;
    events.push(emit(
        &mut state.counters,
        turn,
        Event::GoodsUnloaded {
            carrier: carrier_id,
            goods_type: goods.clone(),
            amount,
        },
    ));
    Ok(())
}

// ---------------------------------------------------------------------------
// Colonies and roles
// ---------------------------------------------------------------------------

fn build_colony(
    state: &mut GameState,
    content: &GameContent,
    by: FactionId,
    id: UnitId,
    name: &str,
    events: &mut Vec<EventEnvelope>,
) -> Result<(), CommandError> {
    let unit = actor(state, by, id)?;
    let def = unit_def(content, unit)?;
    if !def.colonist {
        return Err(CommandError::Invalid("unit cannot found colonies"));
    }
    let pos = on_map(unit)?;
    require_moves(unit)?;
    let work_goods = def
        .expert_goods
        .clone()
        .unwrap_or_else(|| content.constants.default_work_goods.clone());
    let tile = state.map.tile(pos).ok_or(CommandError::Blocked(pos))?;
    if !tile.terrain.is_land() || tile.owner.is_some_and(|o| o != by) {
        return Err(CommandError::Blocked(pos));
    }
    let crowded = std::iter::once(pos)
        .chain(state.map.neighbours(pos))
        .any(|p| state.settlement_at(p).is_some());
    if crowded {
        return Err(CommandError::Invalid("too close to another settlement"));
    }

    let settlement_id = state.place_settlement(by, pos, SettlementKind::Colony, name);
    if let Some(tile) = state.map.tile_mut(pos) {
        if !tile.improvements.contains(&ImprovementKind::Road) {
            tile.improvements.push(ImprovementKind::Road);
        }
    }
    strip_role(state, content, id, settlement_id);
    if let Some(unit) = state.unit_mut(id) {
        stand_down(unit);
        unit.working_in = Some(settlement_id);
        unit.work_goods = Some(work_goods);
        unit.moves_left = 0;
    }
    let turn = state.meta.turn;
    events.push(emit(
        &mut state.counters,
        turn,
        Event::ColonyFounded {
            settlement: settlement_id,
            owner: by,
            tile: pos,
        },
    ));
    Ok(())
}

fn join_colony(
    state: &mut GameState,
    content: &GameContent,
    by: FactionId,
    id: UnitId,
    settlement: SettlementId,
    events: &mut Vec<EventEnvelope>,
) -> Result<(), CommandError> {
    let unit = actor(state, by, id)?;
    let def = unit_def(content, unit)?;
    if !def.colonist {
        return Err(CommandError::Invalid("unit cannot work in colonies"));
    }
    let colony = state
        .settlement(settlement)
        .ok_or(CommandError::UnknownSettlement(settlement))?;
    if colony.owner != by || colony.kind != SettlementKind::Colony {
        return Err(CommandError::Invalid("not an own colony"));
    }
    if unit.location != Location::Tile(colony.tile) {
        return Err(CommandError::NotAdjacent(colony.tile));
    }
    if unit.working_in == Some(settlement) {
        return Err(CommandError::Invalid("already working there"));
    }
    let work_goods = def
        .expert_goods
        .clone()
        .unwrap_or_else(|| content.constants.default_work_goods.clone());

    strip_role(state, content, id, settlement);
    if let Some(unit) = state.unit_mut(id) {
        stand_down(unit);
        unit.working_in = Some(settlement);
        unit.work_goods = Some(work_goods);
        unit.moves_left = 0;
    }
    let turn = state.meta.turn;
    events.push(emit(
        &mut state.counters,
        turn,
        Event::UnitJoinedColony { unit: id, settlement },
    ));
    Ok(())
}

fn assign_work(
    state: &mut GameState,
    content: &GameContent,
    by: FactionId,
    id: UnitId,
    goods: &GoodsTypeId,
) -> Result<(), CommandError> {
    let unit = actor(state, by, id)?;
    if unit.working_in.is_none() {
        return Err(CommandError::Invalid("unit is not working in a colony"));
    }
    if !content.goods_types.iter().any(|g| &g.id == goods) {
        return Err(CommandError::Invalid("unknown goods type"));
    }
    if let Some(unit) = state.unit_mut(id) {
        unit.work_goods = Some(goods.clone());
    }
    Ok(())
}

fn equip(
    state: &mut GameState,
    content: &GameContent,
    by: FactionId,
    id: UnitId,
    role: Role,
    events: &mut Vec<EventEnvelope>,
) -> Result<(), CommandError> {
    let unit = actor(state, by, id)?;
    if !unit_def(content, unit)?.colonist {
        return Err(CommandError::Invalid("unit cannot take up roles"));
    }
    let location = unit.location;
    let cost = equip_cost(state, content, id, role)
        .ok_or(CommandError::Invalid("equipment unavailable here"))?;

    match location {
        Location::Tile(pos) => {
            let colony = own_colony_at(state, by, pos)
                .ok_or(CommandError::Invalid("not in an own colony"))?;
            if let Some(settlement) = state.settlements.get_mut(&colony) {
                for (goods, amount) in &cost.refund {
                    *settlement.goods.entry(goods.clone()).or_default() += amount;
                }
                for (goods, amount) in &cost.goods {
                    let stock = settlement.goods.entry(goods.clone()).or_default();
                    *stock = stock.saturating_sub(*amount);
                }
            }
        }
        Location::Europe | Location::Aboard(_) => {
            if let Some(faction) = state.factions.get_mut(&by) {
                faction.gold -= cost.gold;
            }
        }
    }
    let uses = content.role(role).map_or(0, |def| def.max_uses);
    if let Some(unit) = state.unit_mut(id) {
        if role != Role::Default {
            stand_down(unit);
        }
        unit.role = role;
        unit.role_uses = if role == Role::Default { 0 } else { uses };
    }
    let turn = state.meta.turn;
    events.push(emit(
        &mut state.counters,
        turn,
        Event::RoleChanged { unit: id, role },
    ));
    Ok(())
}

fn improve_tile(
    state: &mut GameState,
    content: &GameContent,
    by: FactionId,
    id: UnitId,
    improvement: ImprovementKind,
) -> Result<(), CommandError> {
    let unit = actor(state, by, id)?;
    if unit.role != Role::Pioneer || unit.role_uses == 0 {
        return Err(CommandError::Invalid("unit has no tools"));
    }
    let pos = on_map(unit)?;
    require_moves(unit)?;
    let applies = state
        .map
        .tile(pos)
        .is_some_and(|t| t.can_improve(improvement));
    if !applies {
        return Err(CommandError::Invalid("improvement does not apply"));
    }
    let turns_left = content.constants.improvement_turns.max(1);
    if let Some(unit) = state.unit_mut(id) {
        stand_down(unit);
        unit.work = Some(TileWork {
            tile: pos,
            improvement,
            turns_left,
        });
        unit.moves_left = 0;
    }
    Ok(())
}

fn fortify(state: &mut GameState, by: FactionId, id: UnitId) -> Result<(), CommandError> {
    let unit = actor(state, by, id)?;
    on_map(unit)?;
    if unit.fortified {
        return Err(CommandError::Invalid("already fortified"));
    }
    if let Some(unit) = state.unit_mut(id) {
        unit.fortified = true;
        unit.moves_left = 0;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Dealings with native settlements
// ---------------------------------------------------------------------------

/// A native settlement next to (or under) the unit.
fn adjacent_native<'s>(
    state: &'s GameState,
    unit: &UnitState,
    settlement: SettlementId,
) -> Result<&'s SettlementState, CommandError> {
    let pos = on_map(unit)?;
    let target = state
        .settlement(settlement)
        .ok_or(CommandError::UnknownSettlement(settlement))?;
    if target.kind != SettlementKind::Native {
        return Err(CommandError::Invalid("not a native settlement"));
    }
    if pos.distance(target.tile) > 1 {
        return Err(CommandError::NotAdjacent(target.tile));
    }
    Ok(target)
}

fn speak_to_chief(
    state: &mut GameState,
    content: &GameContent,
    by: FactionId,
    id: UnitId,
    settlement: SettlementId,
    events: &mut Vec<EventEnvelope>,
) -> Result<(), CommandError> {
    let unit = actor(state, by, id)?;
    if unit.role != Role::Scout {
        return Err(CommandError::Invalid("only scouts speak to chiefs"));
    }
    require_moves(unit)?;
    let target = adjacent_native(state, unit, settlement)?;
    if target.visited_by.contains(&by) {
        return Err(CommandError::Invalid("chief already visited"));
    }

    if let Some(target) = state.settlements.get_mut(&settlement) {
        target.visited_by.insert(by);
    }
    if let Some(faction) = state.factions.get_mut(&by) {
        faction.gold += content.constants.chief_gift_gold;
    }
    if let Some(unit) = state.unit_mut(id) {
        unit.moves_left = 0;
    }
    let turn = state.meta.turn;
    events.push(emit(
        &mut state.counters,
        turn,
        Event::ChiefSpokenTo { unit: id, settlement },
    ));
    Ok(())
}

fn establish_mission(
    state: &mut GameState,
    content: &GameContent,
    by: FactionId,
    id: UnitId,
    settlement: SettlementId,
    events: &mut Vec<EventEnvelope>,
) -> Result<(), CommandError> {
    let unit = actor(state, by, id)?;
    if unit.role != Role::Missionary {
        return Err(CommandError::Invalid("unit is not a missionary"));
    }
    require_moves(unit)?;
    let target = adjacent_native(state, unit, settlement)?;
    if target.missionary.is_some() {
        return Err(CommandError::Invalid("settlement already has a mission"));
    }
    let natives = target.owner;
    if state.at_war(natives, by) {
        return Err(CommandError::Invalid("natives are hostile"));
    }

    if let Some(target) = state.settlements.get_mut(&settlement) {
        target.missionary = Some(by);
    }
    if let Some(faction) = state.factions.get_mut(&natives) {
        let tension = faction.tension.entry(by).or_default();
        *tension = (*tension - content.constants.gift_tension_relief).max(0);
    }
    state.dispose_unit(id);
    let turn = state.meta.turn;
    events.push(emit(
        &mut state.counters,
        turn,
        Event::MissionEstablished {
            settlement,
            faction: by,
        },
    ));
    Ok(())
}

fn cash_in(
    state: &mut GameState,
    content: &GameContent,
    by: FactionId,
    id: UnitId,
    events: &mut Vec<EventEnvelope>,
) -> Result<(), CommandError> {
    let unit = actor(state, by, id)?;
    if !unit_def(content, unit)?.treasure_train || unit.treasure == 0 {
        return Err(CommandError::Invalid("no treasure to cash in"));
    }
    let pos = on_map(unit)?;
    if own_colony_at(state, by, pos).is_none() || !state.map.is_connected_port(pos) {
        return Err(CommandError::Invalid("treasure must reach a port colony"));
    }
    let fee = u64::from(content.constants.cash_in_fee_percent.min(100));
    let gold = (u64::from(unit.treasure) * (100 - fee) / 100) as i64;

    state.dispose_unit(id);
    if let Some(faction) = state.factions.get_mut(&by) {
        faction.gold += gold;
    }
    let turn = state.meta.turn;
    events.push(emit(
        &mut state.counters,
        turn,
        Event::TreasureCashedIn { faction: by, gold },
    ));
    Ok(())
}

// ---------------------------------------------------------------------------
// Faction-level commands
// ---------------------------------------------------------------------------

fn set_stance(
    state: &mut GameState,
    by: FactionId,
    other: FactionId,
    stance: Stance,
    events: &mut Vec<EventEnvelope>,
) -> Result<(), CommandError> {
    if by == other {
        return Err(CommandError::Invalid("cannot set stance towards self"));
    }
    if !state.factions.contains_key(&other) {
        return Err(CommandError::UnknownFaction(other));
    }
    let turn = state.meta.turn;
    for (a, b) in [(by, other), (other, by)] {
        let faction = state
            .factions
            .get_mut(&a)
            .ok_or(CommandError::UnknownFaction(a))?;
        faction.stances.insert(b, stance);
        if stance == Stance::Peace {
            faction.treaty_turn.insert(b, turn);
        }
    }
    events.push(emit(
        &mut state.counters,
        turn,
        Event::StanceChanged {
            faction: by,
            other,
            stance,
        },
    ));
    Ok(())
}

fn grant_gold(
    state: &mut GameState,
    by: FactionId,
    amount: i64,
    events: &mut Vec<EventEnvelope>,
) -> Result<(), CommandError> {
    let faction = state
        .factions
        .get_mut(&by)
        .ok_or(CommandError::UnknownFaction(by))?;
    faction.gold += amount;
    let turn = state.meta.turn;
    events.push(emit(
        &mut state.counters,
        turn,
        Event::GoldGranted {
            faction: by,
            amount,
        },
    ));
    Ok(())
}

fn recruit(
    state: &mut GameState,
    content: &GameContent,
    by: FactionId,
    unit_type: &UnitTypeId,
    role: Role,
    events: &mut Vec<EventEnvelope>,
) -> Result<(), CommandError> {
    let faction = state
        .factions
        .get(&by)
        .ok_or(CommandError::UnknownFaction(by))?;
    let def = content
        .unit_type(unit_type)
        .ok_or_else(|| CommandError::UnknownUnitType(unit_type.clone()))?;
    let (location, home) = match faction.kind {
        FactionKind::European | FactionKind::Royal => (Location::Europe, None),
        FactionKind::Native => {
            let home = state
                .settlements
                .values()
                .find(|s| s.owner == by)
                .ok_or(CommandError::Invalid("natives have no settlement"))?;
            (Location::Tile(home.tile), Some(home.id))
        }
    };
    let expeditionary = faction.kind == FactionKind::Royal && !def.naval;

    let id = state.add_unit(content, unit_type, by, location, role);
    if let Some(unit) = state.unit_mut(id) {
        unit.home_settlement = home;
        unit.expeditionary = expeditionary;
    }
    let turn = state.meta.turn;
    events.push(emit(
        &mut state.counters,
        turn,
        Event::UnitRecruited {
            unit: id,
            faction: by,
        },
    ));
    Ok(())
}

// ---------------------------------------------------------------------------
// Turn upkeep
// ---------------------------------------------------------------------------

/// End-of-turn upkeep for every faction.
///
/// Order of operations:
/// 1. Land ships whose voyage ends next turn.
/// 2. Progress pioneer work and apply finished improvements.
/// 3. Colony and native production, capped by warehouse capacity.
/// 4. Decay tension.
/// 5. Reset move allowances and advance the turn counter.
pub fn advance_turn(state: &mut GameState, content: &GameContent) -> Vec<EventEnvelope> {
    let mut events = Vec::new();
    let next_turn = state.meta.turn + 1;

    complete_voyages(state, next_turn, &mut events);
    progress_tile_work(state, &mut events);
    produce_goods(state, content);
    decay_tension(state, content);

    let allowances: Vec<(UnitId, u32)> = state
        .live_units()
        .map(|u| {
            let moves = if u.voyage.is_some() {
                0
            } else {
                content.moves_for(&u.unit_type, u.role)
            };
            (u.id, moves)
        })
        .collect();
    for (id, moves) in allowances {
        if let Some(unit) = state.unit_mut(id) {
            unit.moves_left = moves;
        }
    }
    state.meta.turn = next_turn;
    events
}

fn complete_voyages(state: &mut GameState, next_turn: u64, events: &mut Vec<EventEnvelope>) {
    let arriving: Vec<(UnitId, VoyageLeg)> = state
        .live_units()
        .filter_map(|u| u.voyage.filter(|v| v.arrives_turn <= next_turn).map(|v| (u.id, v.to)))
        .collect();
    for (id, leg) in arriving {
        let owner = state.unit(id).map(|u| u.owner);
        let entry = owner
            .and_then(|o| state.factions.get(&o))
            .map(|f| f.entry_location);
        let event = match (leg, entry) {
            (VoyageLeg::ToEurope, _) => {
                if let Some(unit) = state.unit_mut(id) {
                    unit.location = Location::Europe;
                    unit.voyage = None;
                }
                Event::ArrivedInEurope { unit: id }
            }
            (VoyageLeg::ToAmerica, Some(entry)) => {
                if let Some(unit) = state.unit_mut(id) {
                    unit.location = Location::Tile(entry);
                    unit.voyage = None;
                }
                Event::ArrivedInAmerica { unit: id }
            }
            (VoyageLeg::ToAmerica, None) => continue,
        };
        let turn = state.meta.turn;
        events.push(emit(&mut state.counters, turn, event));
    }
}

fn progress_tile_work(state: &mut GameState, events: &mut Vec<EventEnvelope>) {
    let mut finished: Vec<(UnitId, TileWork)> = Vec::new();
    for unit in state.units.iter_mut().filter_map(Option::as_mut) {
        let Some(work) = unit.work.as_mut() else {
            continue;
        };
        work.turns_left = work.turns_left.saturating_sub(1);
        if work.turns_left == 0 {
            if let Some(work) = unit.work.take() {
                finished.push((unit.id, work));
            }
        }
    }
    for (id, work) in finished {
        if let Some(tile) = state.map.tile_mut(work.tile) {
            if work.improvement == ImprovementKind::ClearForest {
                tile.terrain = crate::Terrain::Plains;
            } else if !tile.improvements.contains(&work.improvement) {
                tile.improvements.push(work.improvement);
            }
        }
        if let Some(unit) = state.unit_mut(id) {
            unit.role_uses = unit.role_uses.saturating_sub(1);
            if unit.role_uses == 0 {
                unit.role = Role::Default;
            }
        }
        let turn = state.meta.turn;
        events.push(emit(
            &mut state.counters,
            turn,
            Event::TileImproved {
                tile: work.tile,
                improvement: work.improvement,
            },
        ));
    }
}

fn produce_goods(state: &mut GameState, content: &GameContent) {
    let constants = &content.constants;
    let mut output: Vec<(SettlementId, GoodsTypeId, u32)> = Vec::new();
    for unit in state.live_units() {
        let Some(colony) = unit.working_in else {
            continue;
        };
        let goods = unit
            .work_goods
            .clone()
            .unwrap_or_else(|| constants.default_work_goods.clone());
        let expert = content
            .unit_type(&unit.unit_type)
            .and_then(|d| d.expert_goods.as_ref())
            == Some(&goods);
        let amount = if expert {
            constants.expert_production
        } else {
            constants.worker_production
        };
        output.push((colony, goods, amount));
    }
    for settlement in state.settlements.values() {
        if settlement.kind == SettlementKind::Native {
            output.push((
                settlement.id,
                constants.native_goods.clone(),
                constants.native_production,
            ));
        }
    }
    for (id, goods, amount) in output {
        if let Some(settlement) = state.settlements.get_mut(&id) {
            let stock = settlement.goods.entry(goods).or_default();
            *stock = (*stock + amount).min(constants.warehouse_capacity);
        }
    }
}

fn decay_tension(state: &mut GameState, content: &GameContent) {
    let decay = content.constants.tension_decay;
    for faction in state.factions.values_mut() {
        for tension in faction.tension.values_mut() {
            *tension = if *tension > 0 {
                (*tension - decay).max(0)
            } else {
                (*tension + decay).min(0)
            };
        }
    }
}
