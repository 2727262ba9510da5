use colony_core::test_fixtures::{gt, DUTCH};
use colony_core::{ImprovementKind, Role};

use super::*;
use crate::labor::{badly_defended, defenders, DemandPlanner, LaborPlanner};

fn update(h: &mut Harness, colony: SettlementId) {
    DemandPlanner.update(&mut h.ai, &h.world, &h.content, &h.config, colony);
}

fn wish_summary(h: &Harness, colony: SettlementId) -> Vec<(WishKind, i32)> {
    h.ai.colonies[&colony]
        .wishes
        .iter()
        .map(|id| {
            let wish = &h.ai.wishes[id];
            (wish.kind.clone(), wish.value)
        })
        .collect()
}

#[test]
fn small_colony_asks_for_workers_tools_and_muskets() {
    let mut h = Harness::new(DUTCH);
    let colony = h.colony(3, 3);
    h.worker("free_colonist", colony);

    update(&mut h, colony);

    assert_eq!(
        wish_summary(&h, colony),
        vec![
            (worker_kind("expert_farmer", true), 120),
            (worker_kind("free_colonist", false), 100),
            (worker_kind("free_colonist", false), 100),
            (
                WishKind::Goods {
                    goods_type: gt("tools"),
                    amount: 60,
                },
                60
            ),
            (
                WishKind::Goods {
                    goods_type: gt("muskets"),
                    amount: 50,
                },
                60
            ),
        ]
    );
}

#[test]
fn repeated_updates_keep_wish_ids_and_grown_values() {
    let mut h = Harness::new(DUTCH);
    let colony = h.colony(3, 3);
    h.worker("free_colonist", colony);
    update(&mut h, colony);
    let before = h.ai.colonies[&colony].wishes.clone();
    let first = before[0];
    h.ai.wishes.get_mut(&first).unwrap().value += 14;

    update(&mut h, colony);

    assert_eq!(h.ai.colonies[&colony].wishes, before);
    assert_eq!(h.ai.wishes[&first].value, 134);
}

#[test]
fn wishes_shrink_as_the_colony_fills() {
    let mut h = Harness::new(DUTCH);
    let colony = h.colony(3, 3);
    h.worker("expert_farmer", colony);
    h.worker("free_colonist", colony);
    h.worker("free_colonist", colony);
    update(&mut h, colony);
    let workers = |h: &Harness| {
        wish_summary(h, colony)
            .into_iter()
            .filter(|(k, _)| matches!(k, WishKind::Worker { .. }))
            .count()
    };
    assert_eq!(workers(&h), 1);

    h.worker("free_colonist", colony);
    update(&mut h, colony);

    assert_eq!(workers(&h), 0);
    assert!(h.ai.wishes.values().all(|w| w.destination == colony));
}

#[test]
fn stocked_colony_has_no_goods_wishes() {
    let mut h = Harness::new(DUTCH);
    let colony = h.colony(3, 3);
    h.worker("free_colonist", colony);
    h.stock(colony, "tools", 60);
    h.stock(colony, "muskets", 50);

    update(&mut h, colony);

    assert!(wish_summary(&h, colony)
        .iter()
        .all(|(k, _)| matches!(k, WishKind::Worker { .. })));
}

#[test]
fn colony_tile_is_plowed_first() {
    let mut h = Harness::new(DUTCH);
    let colony = h.colony(3, 3);

    update(&mut h, colony);

    let plans = &h.ai.colonies[&colony].plans;
    assert_eq!(plans.len(), 2);
    assert_eq!(plans[0].tile, TilePos::new(3, 3));
    assert_eq!(plans[0].improvement, ImprovementKind::Plow);
    assert!(plans[0].value > plans[1].value);
}

#[test]
fn an_armed_unit_defends_the_colony() {
    let mut h = Harness::new(DUTCH);
    let colony = h.colony(3, 3);
    h.worker("free_colonist", colony);
    assert!(badly_defended(&h.world, &h.content, colony));

    let soldier = h.spawn("free_colonist", tile(3, 3));
    h.world.unit_mut(soldier).unwrap().role = Role::Soldier;

    assert_eq!(defenders(&h.world, &h.content, colony), 1);
    assert!(!badly_defended(&h.world, &h.content, colony));
    assert!(!DemandPlanner.is_badly_defended(h.view(), colony));
}

#[test]
fn port_colony_ships_surplus_to_europe() {
    let mut h = Harness::new(DUTCH);
    let colony = h.colony(3, 3);
    h.stock(colony, "furs", 150);
    h.stock(colony, "food", 300);

    update(&mut h, colony);

    let parcels: Vec<_> = h.ai.goods.values().collect();
    assert_eq!(parcels.len(), 1);
    assert_eq!(parcels[0].goods_type, gt("furs"));
    assert_eq!(parcels[0].amount, 100);
    assert_eq!(parcels[0].location, tile(3, 3));
    assert_eq!(parcels[0].destination, Some(Location::Europe));

    // The store ran dry before a carrier came: the parcel goes away.
    h.stock(colony, "furs", 0);
    update(&mut h, colony);
    assert!(h.ai.goods.is_empty());
}

#[test]
fn workers_are_split_between_food_and_cash_goods() {
    let mut h = Harness::new(DUTCH);
    let colony = h.colony(3, 3);
    let farmer = h.worker("expert_farmer", colony);
    let first = h.worker("free_colonist", colony);
    let second = h.worker("free_colonist", colony);

    DemandPlanner.rearrange(&mut h.ctx(), colony);

    let goods = |u: UnitId| h.world.unit(u).unwrap().work_goods.clone();
    assert_eq!(goods(farmer), Some(gt("food")));
    assert_eq!(goods(first), Some(gt("food")));
    assert_eq!(goods(second), Some(gt("furs")));
}
