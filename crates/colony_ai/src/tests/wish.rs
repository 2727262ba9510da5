use colony_core::test_fixtures::{gt, ut, DUTCH};

use super::*;
use crate::types::TransportableId;
use crate::wish::{
    best_worker_wish, consume_goods_wish, consume_worker_wish, grow_wishes, release_wish,
    wishes, WishError,
};

#[test]
fn worker_wish_is_consumed_exactly_once() {
    let mut h = Harness::new(DUTCH);
    let colony = h.colony(3, 3);
    let wish = h.add_wish(colony, worker_kind("free_colonist", false), 100);
    let first = h.spawn("free_colonist", tile(4, 4));
    let second = h.spawn("free_colonist", tile(5, 4));
    h.reindex();

    let bound = consume_worker_wish(
        &mut h.ai,
        &mut h.scratch.wishes,
        wish,
        TransportableId::Unit(first),
    );
    assert_eq!(bound, Ok(()));
    let again = consume_worker_wish(
        &mut h.ai,
        &mut h.scratch.wishes,
        wish,
        TransportableId::Unit(second),
    );
    assert_eq!(
        again,
        Err(WishError::AlreadyBound(wish, TransportableId::Unit(first)))
    );
    assert!(h.scratch.wishes.worker(&ut("free_colonist")).is_empty());
    assert_eq!(
        h.ai.wishes[&wish].transportable,
        Some(TransportableId::Unit(first))
    );
}

#[test]
fn wish_kinds_are_not_interchangeable() {
    let mut h = Harness::new(DUTCH);
    let colony = h.colony(3, 3);
    let goods = h.add_wish(
        colony,
        WishKind::Goods {
            goods_type: gt("tools"),
            amount: 60,
        },
        60,
    );
    let unit = h.spawn("free_colonist", tile(4, 4));
    h.reindex();

    let err = consume_worker_wish(
        &mut h.ai,
        &mut h.scratch.wishes,
        goods,
        TransportableId::Unit(unit),
    );
    assert_eq!(err, Err(WishError::WrongKind(goods)));
    assert!(h.ai.wishes[&goods].is_open());

    let parcel = h.ai.add_goods(gt("tools"), 60, Location::Europe, Some(tile(3, 3)));
    let bound = consume_goods_wish(
        &mut h.ai,
        &mut h.scratch.wishes,
        goods,
        TransportableId::Goods(parcel),
    );
    assert_eq!(bound, Ok(()));
    assert_eq!(h.scratch.wishes.goods_types().count(), 0);
}

#[test]
fn released_wish_is_open_again() {
    let mut h = Harness::new(DUTCH);
    let colony = h.colony(3, 3);
    let wish = h.add_wish(colony, worker_kind("free_colonist", false), 100);
    let unit = h.spawn("free_colonist", tile(4, 4));
    h.reindex();
    consume_worker_wish(
        &mut h.ai,
        &mut h.scratch.wishes,
        wish,
        TransportableId::Unit(unit),
    )
    .unwrap();

    release_wish(&mut h.ai, &mut h.scratch.wishes, &h.world, wish);

    assert!(h.ai.wishes[&wish].is_open());
    assert_eq!(h.scratch.wishes.worker(&ut("free_colonist")), &[wish]);
}

#[test]
fn most_valuable_reachable_wish_wins() {
    let mut h = Harness::new(DUTCH);
    let colony = h.colony(3, 3);
    let modest = h.add_wish(colony, worker_kind("free_colonist", false), 100);
    let urgent = h.add_wish(colony, worker_kind("free_colonist", false), 150);
    let unit = h.spawn("free_colonist", tile(4, 4));
    h.reindex();

    let best = best_worker_wish(h.view(), unit, &ut("free_colonist"));

    assert_eq!(best, Some(urgent));
    assert_ne!(best, Some(modest));
    assert_eq!(best_worker_wish(h.view(), unit, &ut("expert_farmer")), None);
}

#[test]
fn only_open_wishes_grow() {
    let mut h = Harness::new(DUTCH);
    let colony = h.colony(3, 3);
    let open = h.add_wish(colony, worker_kind("free_colonist", false), 100);
    let taken = h.add_wish(colony, worker_kind("expert_farmer", true), 120);
    let unit = h.spawn("expert_farmer", tile(4, 4));
    h.reindex();
    consume_worker_wish(
        &mut h.ai,
        &mut h.scratch.wishes,
        taken,
        TransportableId::Unit(unit),
    )
    .unwrap();

    grow_wishes(&mut h.ai, &h.config);

    assert_eq!(h.ai.wishes[&open].value, 100 + h.config.wish_value_growth);
    assert_eq!(h.ai.wishes[&taken].value, 120);
}

#[test]
fn long_open_wish_value_stops_at_the_ceiling() {
    let mut h = Harness::new(DUTCH);
    let colony = h.colony(3, 3);
    let wish = h.add_wish(colony, worker_kind("free_colonist", false), i32::MAX - 1);

    grow_wishes(&mut h.ai, &h.config);
    grow_wishes(&mut h.ai, &h.config);

    assert_eq!(h.ai.wishes[&wish].value, i32::MAX);
}

#[test]
fn wishes_at_lost_colonies_are_not_listed() {
    let mut h = Harness::new(DUTCH);
    let ours = h.colony(3, 3);
    let lost = h.colony(5, 6);
    let kept = h.add_wish(ours, worker_kind("free_colonist", false), 100);
    h.add_wish(lost, worker_kind("free_colonist", false), 500);
    h.world.settlements.get_mut(&lost).unwrap().owner = colony_core::test_fixtures::ENGLISH;
    h.reindex();

    let listed: Vec<WishId> = wishes(h.view()).iter().map(|w| w.id).collect();

    assert_eq!(listed, vec![kept]);
    assert_eq!(h.scratch.wishes.worker(&ut("free_colonist")), &[kept]);
}
