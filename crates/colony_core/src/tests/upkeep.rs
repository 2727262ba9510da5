use super::*;
use crate::test_fixtures::{
    add_settlement, gt, spawn, spawn_worker, ARAWAK, ENGLISH, MAINLAND_VILLAGE,
};

#[test]
fn experts_outproduce_plain_workers() {
    let content = test_content();
    let mut state = test_state(&content);
    let colony = add_settlement(&mut state, DUTCH, TilePos::new(4, 2), SettlementKind::Colony);
    spawn_worker(&mut state, &content, "free_colonist", colony);
    spawn_worker(&mut state, &content, "expert_farmer", colony);

    advance_turn(&mut state, &content);

    assert_eq!(state.settlement_goods(colony, &gt("food")), 9);
    assert_eq!(state.settlement_goods(MAINLAND_VILLAGE, &gt("furs")), 2);
}

#[test]
fn warehouses_cap_production() {
    let content = test_content();
    let mut state = test_state(&content);
    let colony = add_settlement(&mut state, DUTCH, TilePos::new(4, 2), SettlementKind::Colony);
    state
        .settlements
        .get_mut(&colony)
        .unwrap()
        .goods
        .insert(gt("food"), 99);
    spawn_worker(&mut state, &content, "expert_farmer", colony);

    advance_turn(&mut state, &content);

    assert_eq!(state.settlement_goods(colony, &gt("food")), 100);
}

#[test]
fn tension_drifts_back_towards_zero() {
    let content = test_content();
    let mut state = test_state(&content);
    let tension = &mut state.factions.get_mut(&ARAWAK).unwrap().tension;
    tension.insert(DUTCH, 5);
    tension.insert(ENGLISH, -1);

    advance_turn(&mut state, &content);

    assert_eq!(state.tension(ARAWAK, DUTCH), 3);
    assert_eq!(state.tension(ARAWAK, ENGLISH), 0);
}

#[test]
fn a_new_turn_restores_moves_and_counts_up() {
    let content = test_content();
    let mut state = test_state(&content);
    let unit = colonist_at(&mut state, &content, 3, 3);
    state.unit_mut(unit).unwrap().moves_left = 0;

    advance_turn(&mut state, &content);

    assert_eq!(state.meta.turn, 2);
    assert_eq!(state.unit(unit).unwrap().moves_left, 1);
}

#[test]
fn disposing_a_ship_takes_its_passengers_along() {
    let content = test_content();
    let mut state = test_state(&content);
    let ship = spawn(&mut state, &content, "caravel", DUTCH, tile(2, 3));
    let passenger = spawn(
        &mut state,
        &content,
        "free_colonist",
        DUTCH,
        Location::Aboard(ship),
    );

    let disposed = state.dispose_unit(ship);

    assert_eq!(disposed, vec![ship, passenger]);
    assert!(state.unit(passenger).is_none());
}
