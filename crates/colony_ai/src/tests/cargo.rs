use colony_core::path::{find_path, CarrierSpec, Traveller};
use colony_core::test_fixtures::{gt, DUTCH};

use super::*;
use crate::cargo::{plan, Cargo, CargoMode, PlanError, MAX_TRY};
use crate::mission::TransportMission;
use crate::types::{GoodsId, TransportableId};

/// A colonist on the mainland shore wanting to reach the island, and a
/// caravel next to it.
fn island_bound(h: &mut Harness) -> (UnitId, UnitId) {
    let unit = h.spawn("free_colonist", tile(3, 3));
    let ship = h.spawn("caravel", tile(2, 3));
    h.set_mission(
        unit,
        Mission::Scouting {
            target: TilePos::new(12, 2),
        },
    );
    (unit, ship)
}

#[test]
fn planning_without_a_carrier_fails_and_changes_nothing() {
    let mut h = Harness::new(DUTCH);
    let (unit, _) = island_bound(&mut h);
    let before = h.ai.clone();

    let err = plan(h.view(), TransportableId::Unit(unit), None, None, false).unwrap_err();

    assert_eq!(err, PlanError::NullCarrier);
    assert_eq!(err.to_string(), "invalid-null-carrier");
    assert!(err.is_invalid());
    assert_eq!(h.ai, before);
    assert_eq!(h.world.unit(unit).unwrap().location, tile(3, 3));
}

#[test]
fn unknown_parcel_is_disposed() {
    let mut h = Harness::new(DUTCH);
    let (_, ship) = island_bound(&mut h);

    let err = plan(h.view(), TransportableId::Goods(GoodsId(99)), Some(ship), None, false)
        .unwrap_err();

    assert_eq!(err, PlanError::Disposed);
}

#[test]
fn unit_without_a_target_has_no_destination() {
    let mut h = Harness::new(DUTCH);
    let unit = h.spawn("free_colonist", tile(3, 3));
    let ship = h.spawn("caravel", tile(2, 3));

    let err = plan(h.view(), TransportableId::Unit(unit), Some(ship), None, false).unwrap_err();

    assert_eq!(err, PlanError::NullDestination);
}

#[test]
fn walkable_destination_needs_no_transport() {
    let mut h = Harness::new(DUTCH);
    let (unit, ship) = island_bound(&mut h);

    let err = plan(
        h.view(),
        TransportableId::Unit(unit),
        Some(ship),
        Some(tile(5, 3)),
        false,
    )
    .unwrap_err();

    assert_eq!(err, PlanError::TransportNotNeeded);
}

#[test]
fn unit_is_picked_up_from_the_shore() {
    let mut h = Harness::new(DUTCH);
    let (unit, ship) = island_bound(&mut h);

    let cargo = Cargo::new(h.view(), TransportableId::Unit(unit), ship, None, false).unwrap();

    assert_eq!(cargo.mode(), CargoMode::Pickup);
    assert_eq!(cargo.plan.twait, tile(3, 3));
    assert!(h.world.map.is_water(cargo.plan.cwait.tile().unwrap()));
    assert_eq!(cargo.plan.tdst, tile(12, 2));
    assert_eq!(cargo.carrier_stop(), cargo.plan.cwait);
    assert!(!cargo.plan.fallback);
}

#[test]
fn cargo_is_collected_carried_and_delivered() {
    let mut h = Harness::new(DUTCH);
    let (unit, ship) = island_bound(&mut h);
    let mut cargo =
        Cargo::new(h.view(), TransportableId::Unit(unit), ship, None, false).unwrap();

    h.world.unit_mut(ship).unwrap().location = cargo.plan.cwait;
    assert!(cargo.is_collectable(h.view()));
    assert!(!cargo.is_deliverable(h.view()));

    h.world.unit_mut(unit).unwrap().location = Location::Aboard(ship);
    assert!(!cargo.is_collectable(h.view()));
    cargo.update(h.view()).unwrap();
    assert!(!cargo.mode().is_collection());
    assert_eq!(cargo.carrier_stop(), cargo.plan.cdst);
    assert!(!cargo.is_delivered(h.view()));

    h.world.unit_mut(ship).unwrap().location = cargo.plan.cdst;
    assert!(cargo.is_deliverable(h.view()));

    h.world.unit_mut(unit).unwrap().location = cargo.plan.tdst;
    assert!(cargo.is_delivered(h.view()));
}

#[test]
fn retries_are_bounded() {
    let mut h = Harness::new(DUTCH);
    let (unit, ship) = island_bound(&mut h);
    let mut cargo =
        Cargo::new(h.view(), TransportableId::Unit(unit), ship, None, false).unwrap();

    for _ in 0..MAX_TRY {
        assert!(cargo.retry());
    }
    assert!(!cargo.retry());
    cargo.reset_tries();
    assert!(cargo.retry());
}

#[test]
fn exhausted_cargo_stays_exhausted() {
    let mut h = Harness::new(DUTCH);
    let (unit, ship) = island_bound(&mut h);
    let mut cargo =
        Cargo::new(h.view(), TransportableId::Unit(unit), ship, None, false).unwrap();

    for _ in 0..MAX_TRY {
        cargo.retry();
    }
    for _ in 0..1_000 {
        assert!(!cargo.retry());
    }
}

#[test]
fn unit_aboard_another_carrier_cannot_be_planned() {
    let mut h = Harness::new(DUTCH);
    let (unit, ship) = island_bound(&mut h);
    let other = h.spawn("merchantman", tile(2, 5));
    h.world.unit_mut(unit).unwrap().location = Location::Aboard(other);

    let err = plan(h.view(), TransportableId::Unit(unit), Some(ship), None, false).unwrap_err();

    assert_eq!(err, PlanError::CollectedElsewhere);
    assert_eq!(err.to_string(), "invalid-collected-elsewhere");
    assert!(err.is_invalid());
}

#[test]
fn unreachable_destination_falls_back_to_partial_progress() {
    let mut h = Harness::new(DUTCH);
    let (unit, ship) = island_bound(&mut h);
    let t = TransportableId::Unit(unit);
    // Open water: a colonist can never stand there.
    let out_at_sea = tile(15, 7);

    let strict = plan(h.view(), t, Some(ship), Some(out_at_sea), false).unwrap_err();
    assert_eq!(
        strict,
        PlanError::NoDeliver {
            transportable: t,
            carrier: ship,
        }
    );
    assert!(!strict.is_invalid());

    let mut cargo = Cargo::new(h.view(), t, ship, Some(out_at_sea), true).unwrap();
    assert!(cargo.plan.fallback);
    assert_eq!(cargo.plan.tdst, tile(13, 5));
    assert_eq!(cargo.mode(), CargoMode::Pickup);

    cargo.update(h.view()).unwrap();
    assert!(cargo.plan.fallback);
    assert_eq!(cargo.plan.tdst, tile(13, 5));
}

#[test]
fn carrier_that_cannot_reach_the_pickup_fails_to_collect() {
    let mut h = Harness::new(DUTCH);
    h.colony(12, 1);
    h.colony(14, 4);
    let parcel = h.ai.add_goods(gt("furs"), 100, tile(12, 1), Some(tile(14, 4)));
    // The wagon is on the mainland; both colonies are on the island.
    let wagon = h.spawn("wagon_train", tile(4, 3));
    h.set_mission(wagon, Mission::Transport(TransportMission::default()));

    let err = plan(h.view(), TransportableId::Goods(parcel), Some(wagon), None, false)
        .unwrap_err();

    assert_eq!(err, PlanError::NoCollect);
    assert!(!err.is_invalid());
}

#[test]
fn passenger_landing_on_a_beach_is_dropped_off() {
    let mut h = Harness::new(DUTCH);
    let (unit, ship) = island_bound(&mut h);
    h.world.unit_mut(unit).unwrap().location = Location::Aboard(ship);
    let t = TransportableId::Unit(unit);

    let cargo = plan(h.view(), t, Some(ship), None, false).unwrap();

    assert_eq!(cargo.mode, CargoMode::Dropoff);
    assert_eq!(cargo.twait, tile(2, 3));
    assert_eq!(cargo.cwait, tile(2, 3));
    assert_eq!(cargo.carrier_turns, 0);
    assert_eq!(cargo.tdst, tile(12, 2));
    assert!(h.world.map.is_water(cargo.cdst.tile().unwrap()));

    let rider = Traveller::of_unit(&h.world, &h.content, unit).unwrap();
    let hold = CarrierSpec::of_unit(&h.world, &h.content, ship).unwrap();
    let full = find_path(
        &h.world,
        &h.content,
        &rider,
        Location::Aboard(ship),
        tile(12, 2),
        Some(&hold),
    )
    .unwrap();
    assert_eq!(cargo.turns, full.total_turns());
    assert!(cargo.turns > 0);
}

#[test]
fn passenger_bound_for_a_port_colony_is_unloaded_there() {
    let mut h = Harness::new(DUTCH);
    h.colony(12, 1);
    let (unit, ship) = island_bound(&mut h);
    h.world.unit_mut(unit).unwrap().location = Location::Aboard(ship);

    let cargo = plan(
        h.view(),
        TransportableId::Unit(unit),
        Some(ship),
        Some(tile(12, 1)),
        false,
    )
    .unwrap();

    assert_eq!(cargo.mode, CargoMode::Unload);
    assert_eq!(cargo.cdst, tile(12, 1));
    assert_eq!(cargo.tdst, tile(12, 1));
}

#[test]
fn cargoes_boarding_together_wrap_and_unwrap() {
    let mut h = Harness::new(DUTCH);
    let (first, ship) = island_bound(&mut h);
    let second = h.spawn("free_colonist", tile(3, 3));
    h.set_mission(
        second,
        Mission::Scouting {
            target: TilePos::new(12, 2),
        },
    );
    let a_id = TransportableId::Unit(first);
    let b_id = TransportableId::Unit(second);
    let mut a = Cargo::new(h.view(), a_id, ship, None, false).unwrap();
    let b = Cargo::new(h.view(), b_id, ship, None, false).unwrap();

    assert_eq!(a.plan.cwait, b.plan.cwait);
    assert!(a.could_wrap(&b, h.view()));
    assert!(!a.could_wrap(&a.clone(), h.view()));

    a.wrap(b);
    assert!(a.has_wrapped());
    assert_eq!(a.transportables().as_slice(), &[a_id, b_id]);
    assert_eq!(a.new_space(h.view()), -2);

    let inner = a.unwrap();
    assert_eq!(inner.len(), 1);
    assert_eq!(inner[0].transportable, b_id);
    assert!(!a.has_wrapped());
    assert_eq!(a.new_space(h.view()), -1);
}

#[test]
fn only_cargo_aboard_can_be_dumped() {
    let mut h = Harness::new(DUTCH);
    let (unit, ship) = island_bound(&mut h);
    let mut cargo =
        Cargo::new(h.view(), TransportableId::Unit(unit), ship, None, false).unwrap();

    assert_eq!(cargo.dump(h.view()), Err(PlanError::NoDump));

    h.world.unit_mut(unit).unwrap().location = Location::Aboard(ship);
    cargo.dump(h.view()).unwrap();
    assert_eq!(cargo.mode(), CargoMode::Dump);
    let stop = cargo.plan.cdst.tile().unwrap();
    assert!(h.world.map.is_water(stop));
    assert!(h.world.map.neighbours(stop).any(|n| h.world.map.is_land(n)));
    // A dumped cargo stays dumped when re-planned.
    cargo.update(h.view()).unwrap();
    assert_eq!(cargo.mode(), CargoMode::Dump);
}
