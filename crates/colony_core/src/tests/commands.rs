use super::*;
use crate::test_fixtures::{add_settlement, gt, spawn, ut, ARAWAK, ENGLISH, MAINLAND_VILLAGE};

fn colony_at(state: &mut GameState, x: i32, y: i32) -> SettlementId {
    add_settlement(state, DUTCH, TilePos::new(x, y), SettlementKind::Colony)
}

fn stock(state: &GameState, colony: SettlementId, goods: &str) -> u32 {
    state.settlement_goods(colony, &gt(goods))
}

fn gold(state: &GameState, faction: FactionId) -> i64 {
    state.factions[&faction].gold
}

// --- Movement -------------------------------------------------------------

#[test]
fn move_spends_a_move_and_reports_it() {
    let content = test_content();
    let mut state = test_state(&content);
    let unit = colonist_at(&mut state, &content, 3, 3);

    let events = run(
        &mut state,
        &content,
        Command::Move {
            unit,
            to: TilePos::new(4, 3),
        },
    )
    .unwrap();

    assert_eq!(state.unit(unit).unwrap().location, tile(4, 3));
    assert_eq!(state.unit(unit).unwrap().moves_left, 0);
    assert!(matches!(events[0].event, Event::UnitMoved { .. }));
    let again = run(
        &mut state,
        &content,
        Command::Move {
            unit,
            to: TilePos::new(5, 3),
        },
    );
    assert_eq!(again.unwrap_err(), CommandError::NoMoves(unit));
}

#[test]
fn rejected_command_leaves_state_untouched() {
    let content = test_content();
    let mut state = test_state(&content);
    let unit = colonist_at(&mut state, &content, 3, 3);
    let before = serde_json::to_string(&state).unwrap();

    let result = run(
        &mut state,
        &content,
        Command::Move {
            unit,
            to: TilePos::new(6, 3),
        },
    );

    assert_eq!(result.unwrap_err(), CommandError::NotAdjacent(TilePos::new(6, 3)));
    // The command counter moves on; nothing else may change.
    state.counters.next_command_id -= 1;
    assert_eq!(serde_json::to_string(&state).unwrap(), before);
}

#[test]
fn other_factions_cannot_command_a_unit() {
    let content = test_content();
    let mut state = test_state(&content);
    let unit = colonist_at(&mut state, &content, 3, 3);

    let result = run_as(&mut state, &content, ENGLISH, Command::Fortify { unit });

    assert_eq!(
        result.unwrap_err(),
        CommandError::NotOwner {
            unit,
            faction: ENGLISH
        }
    );
}

#[test]
fn land_units_stop_at_foreign_settlements() {
    let content = test_content();
    let mut state = test_state(&content);
    let unit = colonist_at(&mut state, &content, 7, 4);

    let result = run(
        &mut state,
        &content,
        Command::Move {
            unit,
            to: TilePos::new(8, 4),
        },
    );

    assert_eq!(result.unwrap_err(), CommandError::Blocked(TilePos::new(8, 4)));
}

#[test]
fn boarding_from_the_shore_uses_up_the_turn() {
    let content = test_content();
    let mut state = test_state(&content);
    let unit = colonist_at(&mut state, &content, 3, 3);
    let ship = spawn(&mut state, &content, "caravel", DUTCH, tile(2, 3));

    run(&mut state, &content, Command::Embark { unit, carrier: ship }).unwrap();

    let passenger = state.unit(unit).unwrap();
    assert_eq!(passenger.location, Location::Aboard(ship));
    assert_eq!(passenger.moves_left, 0);
    let landing = Command::Disembark {
        unit,
        to: Some(TilePos::new(3, 4)),
    };
    assert_eq!(
        run(&mut state, &content, landing.clone()).unwrap_err(),
        CommandError::NoMoves(unit)
    );

    advance_turn(&mut state, &content);
    run(&mut state, &content, landing).unwrap();
    assert_eq!(state.unit(unit).unwrap().location, tile(3, 4));
}

#[test]
fn boarding_in_port_is_free() {
    let content = test_content();
    let mut state = test_state(&content);
    colony_at(&mut state, 3, 2);
    let unit = colonist_at(&mut state, &content, 3, 2);
    let ship = spawn(&mut state, &content, "caravel", DUTCH, tile(3, 2));

    run(&mut state, &content, Command::Embark { unit, carrier: ship }).unwrap();
    assert_eq!(state.unit(unit).unwrap().moves_left, 1);

    run(&mut state, &content, Command::Disembark { unit, to: None }).unwrap();
    assert_eq!(state.unit(unit).unwrap().location, tile(3, 2));
}

#[test]
fn full_ships_refuse_passengers() {
    let content = test_content();
    let mut state = test_state(&content);
    let ship = spawn(&mut state, &content, "caravel", DUTCH, tile(2, 3));
    for _ in 0..2 {
        spawn(
            &mut state,
            &content,
            "free_colonist",
            DUTCH,
            Location::Aboard(ship),
        );
    }
    let unit = colonist_at(&mut state, &content, 3, 3);

    let result = run(&mut state, &content, Command::Embark { unit, carrier: ship });

    assert_eq!(result.unwrap_err(), CommandError::NoRoom(ship));
}

#[test]
fn ships_only_leave_for_europe_from_the_high_seas() {
    let content = test_content();
    let mut state = test_state(&content);
    let coastal = spawn(&mut state, &content, "caravel", DUTCH, tile(2, 3));
    let offshore = spawn(&mut state, &content, "caravel", DUTCH, tile(1, 3));

    assert!(run(&mut state, &content, Command::SailToEurope { unit: coastal }).is_err());
    run(&mut state, &content, Command::SailToEurope { unit: offshore }).unwrap();
    assert!(state.is_sailing(offshore));
    assert_eq!(
        run(&mut state, &content, Command::Fortify { unit: offshore }).unwrap_err(),
        CommandError::Sailing(offshore)
    );

    let first = advance_turn(&mut state, &content);
    assert!(!first
        .iter()
        .any(|e| matches!(e.event, Event::ArrivedInEurope { .. })));
    let second = advance_turn(&mut state, &content);
    assert!(second
        .iter()
        .any(|e| e.event == Event::ArrivedInEurope { unit: offshore }));
    let ship = state.unit(offshore).unwrap();
    assert_eq!(ship.location, Location::Europe);
    assert!(ship.voyage.is_none());
    assert_eq!(ship.moves_left, 4);
}

#[test]
fn ships_return_to_the_entry_location() {
    let content = test_content();
    let mut state = test_state(&content);
    let ship = spawn(&mut state, &content, "caravel", DUTCH, Location::Europe);

    run(&mut state, &content, Command::SailToAmerica { unit: ship }).unwrap();
    advance_turn(&mut state, &content);
    advance_turn(&mut state, &content);

    assert_eq!(state.unit(ship).unwrap().location, tile(1, 3));
}

// --- Goods ----------------------------------------------------------------

#[test]
fn goods_move_from_the_colony_store_into_the_hold() {
    let content = test_content();
    let mut state = test_state(&content);
    let colony = colony_at(&mut state, 3, 2);
    state
        .settlements
        .get_mut(&colony)
        .unwrap()
        .goods
        .insert(gt("furs"), 100);
    let ship = spawn(&mut state, &content, "caravel", DUTCH, tile(3, 2));

    run(
        &mut state,
        &content,
        Command::LoadGoods {
            carrier: ship,
            goods_type: gt("furs"),
            amount: 100,
        },
    )
    .unwrap();

    assert_eq!(stock(&state, colony, "furs"), 0);
    assert_eq!(state.unit(ship).unwrap().goods[&gt("furs")], 100);
    assert_eq!(state.space_left(ship, &content), 1);
}

#[test]
fn loading_more_slots_than_the_hold_has_fails() {
    let content = test_content();
    let mut state = test_state(&content);
    let colony = colony_at(&mut state, 3, 2);
    state
        .settlements
        .get_mut(&colony)
        .unwrap()
        .goods
        .insert(gt("furs"), 300);
    let ship = spawn(&mut state, &content, "caravel", DUTCH, tile(3, 2));

    let result = run(
        &mut state,
        &content,
        Command::LoadGoods {
            carrier: ship,
            goods_type: gt("furs"),
            amount: 300,
        },
    );

    assert_eq!(result.unwrap_err(), CommandError::NoRoom(ship));
    assert_eq!(stock(&state, colony, "furs"), 300);
}

#[test]
fn europe_buys_at_full_price_and_sells_at_half() {
    let content = test_content();
    let mut state = test_state(&content);
    let ship = spawn(&mut state, &content, "caravel", DUTCH, Location::Europe);

    run(
        &mut state,
        &content,
        Command::LoadGoods {
            carrier: ship,
            goods_type: gt("tools"),
            amount: 100,
        },
    )
    .unwrap();
    assert_eq!(gold(&state, DUTCH), 800);

    run(
        &mut state,
        &content,
        Command::UnloadGoods {
            carrier: ship,
            goods_type: gt("tools"),
            amount: 100,
        },
    )
    .unwrap();
    assert_eq!(gold(&state, DUTCH), 900);
    assert!(state.unit(ship).unwrap().goods.is_empty());
}

// --- Colonies and roles ---------------------------------------------------

#[test]
fn founding_a_colony_claims_land_and_puts_the_founder_to_work() {
    let content = test_content();
    let mut state = test_state(&content);
    let unit = colonist_at(&mut state, &content, 4, 2);

    let events = run(
        &mut state,
        &content,
        Command::BuildColony {
            unit,
            name: "Nieuw Amsterdam".into(),
        },
    )
    .unwrap();

    let Event::ColonyFounded { settlement, .. } = events[0].event else {
        panic!("expected ColonyFounded, got {:?}", events[0].event);
    };
    let founder = state.unit(unit).unwrap();
    assert_eq!(founder.working_in, Some(settlement));
    assert_eq!(founder.work_goods, Some(gt("food")));
    assert_eq!(state.population(settlement), 1);
    let centre = state.map.tile(TilePos::new(4, 2)).unwrap();
    assert!(centre.improvements.contains(&ImprovementKind::Road));
    assert_eq!(state.map.tile(TilePos::new(5, 3)).unwrap().owner, Some(DUTCH));
}

#[test]
fn colonies_need_elbow_room() {
    let content = test_content();
    let mut state = test_state(&content);
    colony_at(&mut state, 4, 2);
    let unit = colonist_at(&mut state, &content, 5, 3);

    let result = run(
        &mut state,
        &content,
        Command::BuildColony {
            unit,
            name: "Too Close".into(),
        },
    );

    assert_eq!(
        result.unwrap_err(),
        CommandError::Invalid("too close to another settlement")
    );
}

#[test]
fn joining_strips_the_role_back_into_the_store() {
    let content = test_content();
    let mut state = test_state(&content);
    let colony = colony_at(&mut state, 4, 2);
    let soldier = state.add_unit(
        &content,
        &ut("free_colonist"),
        DUTCH,
        tile(4, 2),
        Role::Soldier,
    );

    run(
        &mut state,
        &content,
        Command::JoinColony {
            unit: soldier,
            settlement: colony,
        },
    )
    .unwrap();

    assert_eq!(state.unit(soldier).unwrap().role, Role::Default);
    assert_eq!(stock(&state, colony, "muskets"), 50);
}

#[test]
fn equipping_in_a_colony_draws_on_the_store() {
    let content = test_content();
    let mut state = test_state(&content);
    let colony = colony_at(&mut state, 4, 2);
    state
        .settlements
        .get_mut(&colony)
        .unwrap()
        .goods
        .insert(gt("tools"), 70);
    let first = colonist_at(&mut state, &content, 4, 2);
    let second = colonist_at(&mut state, &content, 4, 2);

    run(
        &mut state,
        &content,
        Command::Equip {
            unit: first,
            role: Role::Pioneer,
        },
    )
    .unwrap();

    assert_eq!(stock(&state, colony, "tools"), 10);
    assert_eq!(state.unit(first).unwrap().role_uses, 3);
    assert!(equip_cost(&state, &content, second, Role::Pioneer).is_none());
}

#[test]
fn equipping_in_europe_costs_gold() {
    let content = test_content();
    let mut state = test_state(&content);
    let unit = spawn(
        &mut state,
        &content,
        "free_colonist",
        DUTCH,
        Location::Europe,
    );

    let cost = equip_cost(&state, &content, unit, Role::Dragoon).unwrap();
    assert_eq!(cost.gold, 250);

    run(
        &mut state,
        &content,
        Command::Equip {
            unit,
            role: Role::Soldier,
        },
    )
    .unwrap();
    assert_eq!(gold(&state, DUTCH), 850);

    // Upgrading sells the muskets back at half price.
    let upgrade = equip_cost(&state, &content, unit, Role::Dragoon).unwrap();
    assert_eq!(upgrade.gold, 250 - 75);
}

#[test]
fn missionaries_are_only_commissioned_in_europe() {
    let content = test_content();
    let mut state = test_state(&content);
    colony_at(&mut state, 4, 2);
    let local = colonist_at(&mut state, &content, 4, 2);
    let abroad = spawn(
        &mut state,
        &content,
        "free_colonist",
        DUTCH,
        Location::Europe,
    );

    assert!(equip_cost(&state, &content, local, Role::Missionary).is_none());
    assert_eq!(
        equip_cost(&state, &content, abroad, Role::Missionary).map(|c| c.gold),
        Some(0)
    );
}

#[test]
fn pioneers_finish_improvements_after_several_turns() {
    let content = test_content();
    let mut state = test_state(&content);
    let pioneer = state.add_unit(
        &content,
        &ut("hardy_pioneer"),
        DUTCH,
        tile(7, 3),
        Role::Pioneer,
    );

    run(
        &mut state,
        &content,
        Command::ImproveTile {
            unit: pioneer,
            improvement: ImprovementKind::ClearForest,
        },
    )
    .unwrap();
    advance_turn(&mut state, &content);
    advance_turn(&mut state, &content);
    assert_eq!(state.map.terrain(TilePos::new(7, 3)), Some(Terrain::Forest));
    let events = advance_turn(&mut state, &content);

    assert_eq!(state.map.terrain(TilePos::new(7, 3)), Some(Terrain::Plains));
    assert!(events.iter().any(|e| matches!(
        e.event,
        Event::TileImproved {
            improvement: ImprovementKind::ClearForest,
            ..
        }
    )));
    let pioneer = state.unit(pioneer).unwrap();
    assert!(pioneer.work.is_none());
    assert_eq!(pioneer.role_uses, 2);
}

#[test]
fn plowing_requires_suitable_terrain() {
    let content = test_content();
    let mut state = test_state(&content);
    let pioneer = state.add_unit(
        &content,
        &ut("hardy_pioneer"),
        DUTCH,
        tile(7, 3),
        Role::Pioneer,
    );

    let result = run(
        &mut state,
        &content,
        Command::ImproveTile {
            unit: pioneer,
            improvement: ImprovementKind::Plow,
        },
    );

    assert_eq!(
        result.unwrap_err(),
        CommandError::Invalid("improvement does not apply")
    );
}

#[test]
fn treasure_is_cashed_in_at_a_port_colony_minus_the_fee() {
    let content = test_content();
    let mut state = test_state(&content);
    colony_at(&mut state, 3, 2);
    let train = spawn(&mut state, &content, "treasure_train", DUTCH, tile(3, 2));
    state.unit_mut(train).unwrap().treasure = 300;

    run(&mut state, &content, Command::CashInTreasure { unit: train }).unwrap();

    assert_eq!(gold(&state, DUTCH), 1150);
    assert!(state.unit(train).is_none());
}

// --- Natives and diplomacy ------------------------------------------------

#[test]
fn a_chief_receives_each_nation_once() {
    let content = test_content();
    let mut state = test_state(&content);
    let scout = state.add_unit(
        &content,
        &ut("seasoned_scout"),
        DUTCH,
        tile(7, 4),
        Role::Scout,
    );
    let visit = Command::SpeakToChief {
        unit: scout,
        settlement: MAINLAND_VILLAGE,
    };

    run(&mut state, &content, visit.clone()).unwrap();
    assert_eq!(gold(&state, DUTCH), 1050);

    advance_turn(&mut state, &content);
    assert_eq!(
        run(&mut state, &content, visit).unwrap_err(),
        CommandError::Invalid("chief already visited")
    );
}

#[test]
fn a_mission_consumes_the_missionary_and_calms_the_natives() {
    let content = test_content();
    let mut state = test_state(&content);
    state
        .factions
        .get_mut(&ARAWAK)
        .unwrap()
        .tension
        .insert(DUTCH, 30);
    let missionary = state.add_unit(
        &content,
        &ut("jesuit_missionary"),
        DUTCH,
        tile(7, 4),
        Role::Missionary,
    );

    run(
        &mut state,
        &content,
        Command::EstablishMission {
            unit: missionary,
            settlement: MAINLAND_VILLAGE,
        },
    )
    .unwrap();

    assert!(state.unit(missionary).is_none());
    assert_eq!(
        state.settlement(MAINLAND_VILLAGE).unwrap().missionary,
        Some(DUTCH)
    );
    assert_eq!(state.tension(ARAWAK, DUTCH), 10);
}

#[test]
fn stance_changes_apply_to_both_sides() {
    let content = test_content();
    let mut state = test_state(&content);

    run(
        &mut state,
        &content,
        Command::SetStance {
            other: ENGLISH,
            stance: Stance::War,
        },
    )
    .unwrap();
    assert!(state.at_war(ENGLISH, DUTCH));

    run_as(
        &mut state,
        &content,
        ENGLISH,
        Command::SetStance {
            other: DUTCH,
            stance: Stance::Peace,
        },
    )
    .unwrap();
    assert_eq!(state.stance(DUTCH, ENGLISH), Stance::Peace);
    assert_eq!(state.factions[&DUTCH].treaty_turn[&ENGLISH], 1);
}

#[test]
fn recruits_appear_in_europe_or_at_the_village() {
    let content = test_content();
    let mut state = test_state(&content);

    run(
        &mut state,
        &content,
        Command::RecruitUnit {
            unit_type: ut("free_colonist"),
            role: Role::Default,
        },
    )
    .unwrap();
    run_as(
        &mut state,
        &content,
        ARAWAK,
        Command::RecruitUnit {
            unit_type: ut("native_brave"),
            role: Role::Default,
        },
    )
    .unwrap();

    let colonist = state.faction_units(DUTCH).next().unwrap();
    assert_eq!(colonist.location, Location::Europe);
    let brave = state.faction_units(ARAWAK).next().unwrap();
    assert_eq!(brave.location, tile(8, 4));
    assert_eq!(brave.home_settlement, Some(MAINLAND_VILLAGE));
}
