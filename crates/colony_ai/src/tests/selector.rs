use colony_core::test_fixtures::{
    gt, set_war, ut, ARAWAK, DUTCH, ENGLISH, ISLAND_VILLAGE, MAINLAND_VILLAGE,
};
use colony_core::{ImprovementKind, Role};

use super::*;
use crate::cargo::CargoMode;
use crate::labor::{badly_defended, DemandPlanner, LaborPlanner};
use crate::mission::{queue_transportable, transport_mission, MissionKind, TransportMission};
use crate::selector::{
    builders_needed, change_mission, grant_missions, pioneers_needed, quota_phase,
    scouts_needed, Quotas,
};
use crate::tile_plan::TileImprovementPlan;
use crate::types::TransportableId;
use crate::wish::consume_worker_wish;

fn quotas(builders: i32, scouts: i32, pioneers: i32) -> Quotas {
    Quotas {
        builders,
        scouts,
        pioneers,
    }
}

// --- Quotas ---------------------------------------------------------------

#[test]
fn two_builders_wanted_without_any_colony() {
    let h = Harness::new(DUTCH);
    assert_eq!(builders_needed(h.view()), 2);
}

#[test]
fn one_port_colony_with_few_colonists_wants_no_builder() {
    let mut h = Harness::new(DUTCH);
    h.colony(3, 3);
    assert_eq!(builders_needed(h.view()), 0);
}

#[test]
fn colonists_waiting_in_europe_call_for_another_builder() {
    let mut h = Harness::new(DUTCH);
    let colony = h.colony(3, 3);
    h.worker("free_colonist", colony);
    h.spawn("free_colonist", Location::Europe);
    h.spawn("free_colonist", Location::Europe);

    assert_eq!(builders_needed(h.view()), 1);
}

#[test]
fn scouting_tapers_off_with_time() {
    let mut h = Harness::new(DUTCH);
    assert_eq!(scouts_needed(h.view()), 3);
    h.world.meta.turn = 250;
    assert_eq!(scouts_needed(h.view()), 1);
    h.world.meta.turn = 900;
    assert_eq!(scouts_needed(h.view()), 0);
}

#[test]
fn one_pioneer_per_two_improvements() {
    let mut h = Harness::new(DUTCH);
    assert_eq!(pioneers_needed(h.view()), 0);
    for x in 3..6 {
        let pos = TilePos::new(x, 5);
        h.scratch
            .tip_map
            .insert(pos, TileImprovementPlan::new(pos, ImprovementKind::Plow, 40));
    }
    assert_eq!(pioneers_needed(h.view()), 2);
}

#[test]
fn missions_under_way_count_against_the_quota() {
    let mut h = Harness::new(DUTCH);
    let builder = h.spawn("free_colonist", tile(4, 4));
    h.set_mission(
        builder,
        Mission::BuildColony {
            target: TilePos::new(5, 5),
            value: 20,
        },
    );

    let mut q = Quotas::compute(h.view());
    q.survey(h.view());

    assert_eq!(q.builders, 1);
}

#[test]
fn quota_phase_never_grants_beyond_the_quota() {
    let mut h = Harness::new(DUTCH);
    let units: Vec<UnitId> = [(4, 4), (5, 5), (6, 6)]
        .iter()
        .map(|(x, y)| h.spawn("free_colonist", tile(*x, *y)))
        .collect();
    let mut q = quotas(1, 0, 0);
    let mut pool = units.clone();

    let granted = quota_phase(&mut h.ctx(), &mut q, &mut pool);

    assert_eq!(granted, 1);
    assert_eq!(q, quotas(0, 0, 0));
    assert_eq!(pool.len(), 2);
    assert!(matches!(
        h.mission(units[0]),
        Some(Mission::BuildColony { .. })
    ));

    let again = quota_phase(&mut h.ctx(), &mut q, &mut pool);
    assert_eq!(again, 0);
    assert_eq!(q, quotas(0, 0, 0));
}

#[test]
fn an_improvement_is_claimed_by_one_pioneer_only() {
    let mut h = Harness::new(DUTCH);
    let colony = h.colony(4, 3);
    h.stock(colony, "tools", 200);
    let first = h.spawn("free_colonist", tile(4, 3));
    let second = h.spawn("free_colonist", tile(4, 3));
    let pos = TilePos::new(5, 3);
    let plan = TileImprovementPlan::new(pos, ImprovementKind::Plow, 40);
    h.ai.colonies.get_mut(&colony).unwrap().plans.push(plan.clone());
    h.scratch.tip_map.insert(pos, plan);
    let mut q = quotas(0, 0, 2);
    let mut pool = vec![first, second];

    let granted = quota_phase(&mut h.ctx(), &mut q, &mut pool);

    assert_eq!(granted, 1);
    assert_eq!(
        h.mission(first),
        Some(&Mission::Pioneering {
            tile: pos,
            improvement: ImprovementKind::Plow,
        })
    );
    assert_eq!(h.mission(second), None);
    assert_eq!(h.world.unit(first).unwrap().role, Role::Pioneer);
    assert_eq!(h.world.unit(second).unwrap().role, Role::Default);
    assert_eq!(h.scratch.tip_map[&pos].pioneer, Some(first));
    assert_eq!(h.ai.colonies[&colony].plans[0].pioneer, Some(first));
    // 60 tools for one kit; the second unit's kit went back into the store.
    assert_eq!(h.world.settlement_goods(colony, &gt("tools")), 140);
}

#[test]
fn scout_without_a_target_hands_back_its_horses() {
    let mut h = Harness::new(DUTCH);
    let colony = h.colony(4, 3);
    h.stock(colony, "horses", 50);
    for village in [MAINLAND_VILLAGE, ISLAND_VILLAGE] {
        h.world
            .settlements
            .get_mut(&village)
            .unwrap()
            .visited_by
            .insert(DUTCH);
    }
    let unit = h.spawn("free_colonist", tile(4, 3));
    let mut q = quotas(0, 1, 0);
    let mut pool = vec![unit];

    let granted = quota_phase(&mut h.ctx(), &mut q, &mut pool);

    assert_eq!(granted, 0);
    assert_eq!(q.scouts, 1);
    assert_eq!(h.world.unit(unit).unwrap().role, Role::Default);
    assert_eq!(h.world.settlement_goods(colony, &gt("horses")), 50);
}

#[test]
fn scout_heads_for_an_unvisited_village() {
    let mut h = Harness::new(DUTCH);
    let colony = h.colony(4, 3);
    h.stock(colony, "horses", 50);
    let unit = h.spawn("free_colonist", tile(4, 3));
    let mut q = quotas(0, 1, 0);
    let mut pool = vec![unit];

    quota_phase(&mut h.ctx(), &mut q, &mut pool);

    let village = h.world.settlement(MAINLAND_VILLAGE).unwrap().tile;
    assert_eq!(h.mission(unit), Some(&Mission::Scouting { target: village }));
    assert_eq!(h.world.unit(unit).unwrap().role, Role::Scout);
    assert_eq!(q.scouts, 0);
}

// --- Ladders --------------------------------------------------------------

#[test]
fn expert_farmer_answers_the_colony_farmer_wish() {
    let mut h = Harness::new(DUTCH);
    let colony = h.colony(3, 3);
    let worker = h.worker("free_colonist", colony);
    let farmer = h.spawn("expert_farmer", tile(4, 4));
    DemandPlanner.update(&mut h.ai, &h.world, &h.content, &h.config, colony);
    h.reindex();

    let granted = grant_missions(&mut h.ctx(), &DemandPlanner);

    assert!(granted >= 2);
    let Some(Mission::WishRealization { wish, settlement }) = h.mission(farmer).cloned() else {
        panic!("farmer got {:?}", h.mission(farmer));
    };
    assert_eq!(settlement, colony);
    let wish = &h.ai.wishes[&wish];
    assert_eq!(wish.kind, worker_kind("expert_farmer", true));
    assert_eq!(wish.transportable, Some(TransportableId::Unit(farmer)));
    assert_eq!(
        h.mission(worker),
        Some(&Mission::WorkInsideColony { settlement: colony })
    );
}

#[test]
fn privateer_prefers_prey_over_cargo() {
    let mut h = Harness::new(DUTCH);
    let privateer = h.spawn("privateer", tile(2, 3));
    let prey = h.spawn_for(ENGLISH, "caravel", tile(2, 5));
    set_war(&mut h.world, DUTCH, ENGLISH);

    grant_missions(&mut h.ctx(), &DemandPlanner);

    assert_eq!(h.mission(privateer), Some(&Mission::Privateer { target: prey }));
}

#[test]
fn privateer_at_peace_carries_cargo() {
    let mut h = Harness::new(DUTCH);
    let privateer = h.spawn("privateer", tile(2, 3));
    h.spawn_for(ENGLISH, "caravel", tile(2, 5));

    grant_missions(&mut h.ctx(), &DemandPlanner);

    assert_eq!(
        h.mission(privateer).map(Mission::kind),
        Some(MissionKind::Transport)
    );
}

#[test]
fn every_unit_ends_up_with_exactly_one_mission() {
    let mut h = Harness::new(DUTCH);
    let colony = h.colony(3, 3);
    h.worker("free_colonist", colony);
    h.spawn("free_colonist", tile(5, 5));
    h.spawn("caravel", tile(2, 3));
    h.spawn("wagon_train", tile(3, 3));
    h.spawn("expert_farmer", Location::Europe);
    DemandPlanner.update(&mut h.ai, &h.world, &h.content, &h.config, colony);
    h.reindex();

    let granted = grant_missions(&mut h.ctx(), &DemandPlanner);

    assert_eq!(granted as usize, h.ai.units.len());
    assert!(h.ai.units.values().all(|u| u.has_mission()));
}

#[test]
fn treasure_train_heads_for_a_port() {
    let mut h = Harness::new(DUTCH);
    let colony = h.colony(3, 3);
    let train = h.spawn("treasure_train", tile(5, 4));
    h.world.unit_mut(train).unwrap().treasure = 500;
    h.spawn("caravel", tile(2, 3));

    grant_missions(&mut h.ctx(), &DemandPlanner);

    let port = h.world.settlement(colony).unwrap().tile;
    assert_eq!(
        h.mission(train),
        Some(&Mission::CashInTreasureTrain { target: port })
    );
}

#[test]
fn native_brave_stays_home_in_peace() {
    let mut h = Harness::new(ARAWAK);
    let brave = h.spawn("native_brave", tile(8, 4));
    h.world.unit_mut(brave).unwrap().home_settlement = Some(MAINLAND_VILLAGE);
    h.config.native_demand_percent = 0;
    h.config.native_gift_percent = 0;

    grant_missions(&mut h.ctx(), &DemandPlanner);

    assert!(!badly_defended(&h.world, &h.content, MAINLAND_VILLAGE));
    assert_eq!(
        h.mission(brave),
        Some(&Mission::IdleAtSettlement {
            settlement: Some(MAINLAND_VILLAGE),
        })
    );
}

#[test]
fn native_brave_seeks_a_fight_at_war() {
    let mut h = Harness::new(ARAWAK);
    let guard = h.spawn("native_brave", tile(8, 4));
    let brave = h.spawn("native_brave", tile(7, 4));
    for unit in [guard, brave] {
        h.world.unit_mut(unit).unwrap().home_settlement = Some(MAINLAND_VILLAGE);
    }
    h.config.native_demand_percent = 0;
    h.config.native_gift_percent = 0;
    let settler = h.spawn_for(DUTCH, "free_colonist", tile(5, 4));
    set_war(&mut h.world, ARAWAK, DUTCH);

    grant_missions(&mut h.ctx(), &DemandPlanner);

    let kind = h.mission(brave).map(Mission::kind);
    assert!(
        matches!(kind, Some(MissionKind::SeekAndDestroy | MissionKind::WanderHostile)),
        "brave got {kind:?}"
    );
    assert!(h.world.unit(settler).is_some());
}

// --- Mission changes --------------------------------------------------------

/// A colonist bound for the island, queued on a caravel off the west coast.
fn queued_passenger(h: &mut Harness) -> (UnitId, UnitId) {
    let unit = h.spawn("free_colonist", tile(3, 3));
    h.set_mission(
        unit,
        Mission::Scouting {
            target: TilePos::new(12, 2),
        },
    );
    let ship = h.spawn("caravel", tile(2, 3));
    h.set_mission(ship, Mission::Transport(TransportMission::default()));
    queue_transportable(&mut h.ctx(), ship, TransportableId::Unit(unit)).unwrap();
    (unit, ship)
}

#[test]
fn passenger_aboard_with_a_new_target_is_dropped_off() {
    let mut h = Harness::new(DUTCH);
    let unit = h.spawn("free_colonist", tile(3, 3));
    let ship = h.spawn("caravel", tile(2, 3));
    h.world.unit_mut(unit).unwrap().location = Location::Aboard(ship);
    h.set_mission(
        unit,
        Mission::Scouting {
            target: TilePos::new(12, 2),
        },
    );
    h.set_mission(ship, Mission::Transport(TransportMission::default()));
    let t = TransportableId::Unit(unit);
    queue_transportable(&mut h.ctx(), ship, t).unwrap();

    change_mission(
        &mut h.ctx(),
        unit,
        Some(Mission::Scouting {
            target: TilePos::new(13, 5),
        }),
    );

    let cargo = transport_mission(&h.ai, ship).unwrap().cargo(t).unwrap();
    assert_eq!(cargo.mode(), CargoMode::Dump);
    assert_eq!(t.assigned_transport(&h.ai), Some(ship));
}

#[test]
fn waiting_passenger_without_a_target_leaves_the_queue() {
    let mut h = Harness::new(DUTCH);
    let (unit, ship) = queued_passenger(&mut h);
    let t = TransportableId::Unit(unit);

    change_mission(&mut h.ctx(), unit, None);

    assert!(!transport_mission(&h.ai, ship).unwrap().has_cargo(t));
    assert_eq!(t.assigned_transport(&h.ai), None);
    assert_eq!(h.mission(unit), None);
}

#[test]
fn waiting_passenger_with_a_new_target_is_replanned() {
    let mut h = Harness::new(DUTCH);
    let (unit, ship) = queued_passenger(&mut h);
    let t = TransportableId::Unit(unit);
    let before = transport_mission(&h.ai, ship).unwrap().cargo(t).unwrap().plan.tdst;
    assert_eq!(before, tile(12, 2));

    change_mission(
        &mut h.ctx(),
        unit,
        Some(Mission::Scouting {
            target: TilePos::new(13, 5),
        }),
    );

    let cargo = transport_mission(&h.ai, ship).unwrap().cargo(t).unwrap();
    assert_eq!(cargo.plan.tdst, tile(13, 5));
    assert!(cargo.mode().is_collection());
    assert_eq!(t.assigned_transport(&h.ai), Some(ship));
}

#[test]
fn replaced_wish_mission_reopens_its_wish() {
    let mut h = Harness::new(DUTCH);
    let colony = h.colony(3, 3);
    let wish = h.add_wish(colony, worker_kind("free_colonist", false), 100);
    let unit = h.spawn("free_colonist", tile(5, 5));
    h.reindex();
    consume_worker_wish(
        &mut h.ai,
        &mut h.scratch.wishes,
        wish,
        TransportableId::Unit(unit),
    )
    .unwrap();
    h.set_mission(
        unit,
        Mission::WishRealization {
            wish,
            settlement: colony,
        },
    );
    assert!(h.scratch.wishes.worker(&ut("free_colonist")).is_empty());

    change_mission(&mut h.ctx(), unit, Some(Mission::WanderHostile));

    assert_eq!(h.mission(unit), Some(&Mission::WanderHostile));
    assert_eq!(h.ai.wishes[&wish].transportable, None);
    assert_eq!(h.scratch.wishes.worker(&ut("free_colonist")), &[wish]);
}

#[test]
fn replaced_pioneer_mission_gives_up_its_claim() {
    let mut h = Harness::new(DUTCH);
    let colony = h.colony(4, 3);
    let unit = h.spawn("hardy_pioneer", tile(4, 3));
    let pos = TilePos::new(5, 3);
    let mut plan = TileImprovementPlan::new(pos, ImprovementKind::Plow, 40);
    plan.pioneer = Some(unit);
    h.ai.colonies.get_mut(&colony).unwrap().plans.push(plan.clone());
    h.scratch.tip_map.insert(pos, plan);
    h.set_mission(
        unit,
        Mission::Pioneering {
            tile: pos,
            improvement: ImprovementKind::Plow,
        },
    );

    change_mission(
        &mut h.ctx(),
        unit,
        Some(Mission::IdleAtSettlement {
            settlement: Some(colony),
        }),
    );

    assert_eq!(h.ai.colonies[&colony].plans[0].pioneer, None);
    assert_eq!(h.scratch.tip_map[&pos].pioneer, None);
    assert_eq!(
        h.mission(unit),
        Some(&Mission::IdleAtSettlement {
            settlement: Some(colony),
        })
    );
}
