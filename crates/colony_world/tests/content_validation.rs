//! Validation of the shipped `content/*.json` files.
//!
//! Loading runs `validate_content`, so these tests only add the checks the
//! loader does not: range sanity and that the AI settings fit the content.

use colony_core::{GameContent, Role};
use colony_world::{load_ai_config, load_content};
use std::collections::HashSet;
use std::sync::OnceLock;

/// Integration tests run from the crate directory, so go up two levels.
fn content_dir() -> String {
    let manifest = std::env::var("CARGO_MANIFEST_DIR").expect("CARGO_MANIFEST_DIR not set");
    format!("{manifest}/../../content")
}

fn load_test_content() -> &'static GameContent {
    static CONTENT: OnceLock<GameContent> = OnceLock::new();
    CONTENT.get_or_init(|| {
        load_content(&content_dir()).expect("load_content should succeed for production content")
    })
}

#[test]
fn content_loads_successfully() {
    let content = load_test_content();
    assert!(!content.content_version.is_empty());
}

#[test]
fn ai_config_matches_content() {
    let content = load_test_content();
    let config = load_ai_config(&content_dir(), content).expect("ai.json should validate");
    assert!(config.max_passes > 0);
    assert!(content.unit_type(&config.carrier_type).is_some_and(|d| d.naval && d.space > 0));
}

#[test]
fn goods_ids_are_unique() {
    let content = load_test_content();
    let mut seen = HashSet::new();
    for goods in &content.goods_types {
        assert!(!goods.id.0.is_empty(), "goods type has empty id");
        assert!(seen.insert(&goods.id), "goods type '{}' listed twice", goods.id);
    }
    assert!(
        content.goods_types.iter().any(|g| g.food),
        "no goods type is food"
    );
}

#[test]
fn every_role_is_defined_once() {
    let content = load_test_content();
    for role in [
        Role::Default,
        Role::Soldier,
        Role::Dragoon,
        Role::Pioneer,
        Role::Scout,
        Role::Missionary,
    ] {
        let count = content.roles.iter().filter(|r| r.role == role).count();
        assert_eq!(count, 1, "role {role:?} defined {count} times");
    }
}

#[test]
fn carriers_have_space_and_colonists_fit() {
    let content = load_test_content();
    let largest = content
        .unit_types
        .values()
        .filter(|d| d.naval)
        .map(|d| d.space)
        .max()
        .unwrap_or(0);
    for def in content.unit_types.values() {
        assert!(
            def.space_taken <= largest,
            "unit type '{}' fits on no ship",
            def.id
        );
        if def.colonist {
            assert!(def.price.is_some(), "colonist '{}' cannot be recruited", def.id);
        }
    }
}

#[test]
fn every_expert_role_has_an_expert() {
    let content = load_test_content();
    for role in [Role::Pioneer, Role::Scout, Role::Soldier, Role::Missionary] {
        assert!(
            content
                .unit_types
                .values()
                .any(|d| d.colonist && d.expert_role == Some(role)),
            "no colonist is an expert {role:?}"
        );
    }
}

#[test]
fn fee_and_percentages_are_in_range() {
    let c = &load_test_content().constants;
    assert!(c.cash_in_fee_percent <= 100);
    assert!(c.fortify_bonus_percent <= 200);
    assert!(c.settlement_bonus_percent <= 200);
    assert!(c.expert_production >= c.worker_production);
    assert!(c.warehouse_capacity >= c.goods_per_slot);
}
