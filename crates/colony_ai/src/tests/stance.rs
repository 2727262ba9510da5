use colony_core::test_fixtures::{ARAWAK, DUTCH, ENGLISH};
use colony_core::{FactionKind, Stance};

use super::*;
use crate::stance::{desired_stance, determine_stances, treaty_hold_percent};

fn set_tension(h: &mut Harness, from: FactionId, to: FactionId, tension: i32) {
    h.world
        .factions
        .get_mut(&from)
        .unwrap()
        .tension
        .insert(to, tension);
}

#[test]
fn tension_thresholds_decide_the_stance() {
    let config = AiConfig::default();
    let (eu, native) = (FactionKind::European, FactionKind::Native);

    assert_eq!(
        desired_stance(eu, native, Stance::Unknown, 90, &config),
        Some(Stance::Peace)
    );
    assert_eq!(
        desired_stance(eu, native, Stance::Peace, config.war_tension, &config),
        Some(Stance::War)
    );
    assert_eq!(
        desired_stance(eu, native, Stance::Peace, config.war_tension - 1, &config),
        None
    );
    assert_eq!(
        desired_stance(eu, native, Stance::War, config.peace_tension, &config),
        Some(Stance::Peace)
    );
    assert_eq!(
        desired_stance(eu, native, Stance::War, config.peace_tension + 1, &config),
        None
    );
    assert_eq!(desired_stance(eu, native, Stance::Ceasefire, 100, &config), None);
}

#[test]
fn crown_and_colonists_are_always_at_war() {
    let config = AiConfig::default();
    for current in [Stance::Unknown, Stance::Peace, Stance::Alliance] {
        assert_eq!(
            desired_stance(FactionKind::Royal, FactionKind::European, current, 0, &config),
            Some(Stance::War)
        );
        assert_eq!(
            desired_stance(FactionKind::European, FactionKind::Royal, current, 0, &config),
            Some(Stance::War)
        );
    }
    assert_eq!(
        desired_stance(FactionKind::Royal, FactionKind::Native, Stance::Peace, 0, &config),
        None
    );
}

#[test]
fn fresh_treaties_hold_and_old_ones_fade() {
    assert_eq!(treaty_hold_percent(0, 10), 100);
    assert_eq!(treaty_hold_percent(3, 10), 70);
    assert_eq!(treaty_hold_percent(10, 10), 0);
    assert_eq!(treaty_hold_percent(u64::MAX, 10), 0);
    assert_eq!(treaty_hold_percent(50, 0), 100);
}

#[test]
fn resentment_breaks_an_old_peace() {
    let mut h = Harness::new(DUTCH);
    set_tension(&mut h, DUTCH, ENGLISH, 80);

    determine_stances(&mut h.ctx());

    assert_eq!(h.world.stance(DUTCH, ENGLISH), Stance::War);
    assert_eq!(h.world.stance(ENGLISH, DUTCH), Stance::War);
    assert_eq!(h.world.stance(DUTCH, ARAWAK), Stance::Peace);
}

#[test]
fn a_treaty_signed_this_turn_holds() {
    let mut h = Harness::new(DUTCH);
    set_tension(&mut h, DUTCH, ENGLISH, 80);
    let turn = h.world.meta.turn;
    h.world
        .factions
        .get_mut(&DUTCH)
        .unwrap()
        .treaty_turn
        .insert(ENGLISH, turn);

    determine_stances(&mut h.ctx());

    assert_eq!(h.world.stance(DUTCH, ENGLISH), Stance::Peace);
}

#[test]
fn war_ends_when_resentment_fades() {
    let mut h = Harness::new(DUTCH);
    colony_core::test_fixtures::set_war(&mut h.world, DUTCH, ARAWAK);
    set_tension(&mut h, DUTCH, ARAWAK, 5);

    determine_stances(&mut h.ctx());

    assert_eq!(h.world.stance(DUTCH, ARAWAK), Stance::Peace);
    assert_eq!(
        h.world.factions[&DUTCH].treaty_turn.get(&ARAWAK),
        Some(&h.world.meta.turn)
    );
    assert!(!h.events.is_empty());
}
