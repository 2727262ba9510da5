//! Content and scenario loading shared between colony_cli and the tests.

use anyhow::{bail, Context, Result};
use colony_ai::AiConfig;
use colony_core::{
    Constants, GameContent, GoodsTypeDef, GoodsTypeId, RoleDef, UnitTypeDef, UnitTypeId,
};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;

mod scenario;

pub use scenario::{
    build_state, load_scenario, parse_map, FactionSpec, Scenario, SettlementSpec, UnitSpec,
};

#[derive(Deserialize)]
struct UnitTypesFile {
    content_version: String,
    unit_types: Vec<UnitTypeDef>,
}

#[derive(Deserialize)]
struct GoodsFile {
    goods: Vec<GoodsTypeDef>,
}

#[derive(Deserialize)]
struct RolesFile {
    roles: Vec<RoleDef>,
}

/// AI settings a scenario may override. Unit and goods type ids are tied to
/// the content and stay out of reach.
pub const AI_OVERRIDE_KEYS: &[&str] = &[
    "build_colony_turns",
    "pioneer_turns",
    "scout_turns",
    "missionary_turns",
    "privateer_turns",
    "cash_in_turns",
    "cash_in_turns_no_carrier",
    "defend_turns_strict",
    "defend_turns_relaxed",
    "seek_turns_near",
    "seek_turns_far",
    "ref_seek_turns",
    "native_target_turns",
    "many_turns",
    "max_passes",
    "max_steps_per_pass",
    "virtual_ship_speed",
    "wish_value_growth",
    "target_population",
    "expert_worker_wish_value",
    "worker_wish_value",
    "goods_wish_value",
    "export_threshold",
    "transport_priority_step",
    "war_tension",
    "peace_tension",
    "peace_hold_decay",
    "poor_gold",
    "gold_grant",
    "gold_grant_percent",
    "recruit_percent",
    "soldier_percent",
    "native_demand_percent",
    "native_gift_percent",
    "native_demand_tension",
    "native_gift_max_tension",
];

pub(crate) fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let name = path.display();
    let text = std::fs::read_to_string(path).with_context(|| format!("reading {name}"))?;
    serde_json::from_str(&text).with_context(|| format!("parsing {name}"))
}

/// Validates cross-references in loaded content, panicking on any authoring error.
///
/// Catches mistakes like a role kit made of unknown goods, an expert for a
/// goods type that does not exist, or a treasure type that cannot carry
/// treasure.
pub fn validate_content(content: &GameContent) {
    let goods: HashSet<&GoodsTypeId> = content.goods_types.iter().map(|g| &g.id).collect();

    for (id, def) in &content.unit_types {
        assert_eq!(id, &def.id, "unit type keyed as '{id}' is named '{}'", def.id);
        assert!(
            def.moves_per_turn > 0,
            "unit type '{id}' has no moves per turn"
        );
        if let Some(expert) = &def.expert_goods {
            assert!(
                goods.contains(expert),
                "unit type '{id}' is an expert in unknown goods '{expert}'"
            );
        }
        if def.naval {
            assert!(!def.colonist, "unit type '{id}' is both naval and a colonist");
        }
    }

    for role in &content.roles {
        for (goods_type, amount) in &role.goods {
            assert!(
                goods.contains(goods_type),
                "role {:?} needs unknown goods '{goods_type}'",
                role.role
            );
            assert!(*amount > 0, "role {:?} needs zero '{goods_type}'", role.role);
        }
        assert!(role.max_uses > 0, "role {:?} has no uses", role.role);
    }

    let c = &content.constants;
    for (what, id) in [
        ("native_goods", &c.native_goods),
        ("default_work_goods", &c.default_work_goods),
    ] {
        assert!(goods.contains(id), "constants.{what} '{id}' is not a known goods type");
    }
    assert!(c.goods_per_slot > 0, "constants.goods_per_slot must be positive");
    assert!(c.europe_sail_turns > 0, "constants.europe_sail_turns must be positive");
    let treasure = content.unit_type(&c.treasure_train_type);
    assert!(
        treasure.is_some_and(|d| d.treasure_train),
        "constants.treasure_train_type '{}' is not a treasure train",
        c.treasure_train_type
    );
}

/// Checks that the AI settings name unit and goods types the content knows.
pub fn validate_ai_config(config: &AiConfig, content: &GameContent) -> Result<()> {
    let unit_types: [(&str, &UnitTypeId); 4] = [
        ("default_worker_type", &config.default_worker_type),
        ("carrier_type", &config.carrier_type),
        ("soldier_type", &config.soldier_type),
        ("native_unit_type", &config.native_unit_type),
    ];
    for (field, id) in unit_types {
        if content.unit_type(id).is_none() {
            bail!("ai.{field} '{id}' is not a known unit type");
        }
    }
    if !content.goods_types.iter().any(|g| g.id == config.cash_goods) {
        bail!("ai.cash_goods '{}' is not a known goods type", config.cash_goods);
    }
    if config.max_passes == 0 || config.max_steps_per_pass == 0 {
        bail!("ai.max_passes and ai.max_steps_per_pass must be positive");
    }
    Ok(())
}

pub fn load_content(content_dir: &str) -> Result<GameContent> {
    let dir = Path::new(content_dir);
    let constants: Constants = read_json(&dir.join("constants.json"))?;
    let unit_types: UnitTypesFile = read_json(&dir.join("unit_types.json"))?;
    let goods: GoodsFile = read_json(&dir.join("goods.json"))?;
    let roles: RolesFile = read_json(&dir.join("roles.json"))?;
    let content = GameContent {
        content_version: unit_types.content_version,
        unit_types: unit_types
            .unit_types
            .into_iter()
            .map(|d| (d.id.clone(), d))
            .collect(),
        goods_types: goods.goods,
        roles: roles.roles,
        constants,
    };
    validate_content(&content);
    tracing::debug!(
        version = content.content_version.as_str(),
        unit_types = content.unit_types.len(),
        "content loaded"
    );
    Ok(content)
}

/// Loads `ai.json` from the content directory; a missing file means defaults.
pub fn load_ai_config(content_dir: &str, content: &GameContent) -> Result<AiConfig> {
    let path = Path::new(content_dir).join("ai.json");
    let config = if path.exists() {
        read_json(&path)?
    } else {
        AiConfig::default()
    };
    validate_ai_config(&config, content)?;
    Ok(config)
}

/// Applies whitelisted key overrides on top of `config`.
pub fn apply_ai_overrides(
    config: &AiConfig,
    overrides: &serde_json::Map<String, serde_json::Value>,
) -> Result<AiConfig> {
    if overrides.is_empty() {
        return Ok(config.clone());
    }
    let mut value = serde_json::to_value(config).context("encoding ai config")?;
    let Some(fields) = value.as_object_mut() else {
        bail!("ai config did not encode as an object");
    };
    for (key, v) in overrides {
        if !AI_OVERRIDE_KEYS.contains(&key.as_str()) {
            bail!("ai override '{key}' is not allowed");
        }
        fields.insert(key.clone(), v.clone());
    }
    serde_json::from_value(value).context("applying ai overrides")
}

#[cfg(test)]
mod tests {
    use super::*;
    use colony_core::Role;
    use std::collections::BTreeMap;

    fn minimal_content() -> GameContent {
        let goods = |id: &str| GoodsTypeDef {
            id: GoodsTypeId::new(id),
            name: id.to_string(),
            food: id == "food",
        };
        let unit = |id: &str| UnitTypeDef {
            id: UnitTypeId::new(id),
            name: id.to_string(),
            offence: 0,
            defence: 1,
            moves_per_turn: 1,
            naval: false,
            space: 0,
            space_taken: 1,
            skill: 0,
            expert_goods: None,
            expert_role: None,
            colonist: true,
            treasure_train: false,
            can_raid: false,
            price: None,
        };
        let treasure = UnitTypeDef {
            colonist: false,
            treasure_train: true,
            ..unit("treasure_train")
        };
        let unit_types: BTreeMap<UnitTypeId, UnitTypeDef> = [unit("free_colonist"), treasure]
            .into_iter()
            .map(|d| (d.id.clone(), d))
            .collect();
        GameContent {
            content_version: "test".to_string(),
            unit_types,
            goods_types: vec![goods("food"), goods("furs"), goods("tools")],
            roles: vec![RoleDef {
                role: Role::Pioneer,
                goods: vec![(GoodsTypeId::new("tools"), 20)],
                offence_bonus: 0,
                defence_bonus: 0,
                moves_per_turn: None,
                max_uses: 3,
                europe_only: false,
            }],
            constants: Constants {
                europe_sail_turns: 2,
                cash_in_fee_percent: 50,
                rumour_gold: 100,
                chief_gift_gold: 50,
                worker_production: 3,
                expert_production: 6,
                native_production: 2,
                native_goods: GoodsTypeId::new("furs"),
                default_work_goods: GoodsTypeId::new("food"),
                warehouse_capacity: 100,
                goods_per_slot: 100,
                improvement_turns: 3,
                gift_amount: 20,
                demand_amount: 30,
                gift_tension_relief: 20,
                demand_tension: 15,
                tension_decay: 2,
                fortify_bonus_percent: 50,
                settlement_bonus_percent: 50,
                combat_tension: 25,
                settlement_treasure: 300,
                treasure_train_type: UnitTypeId::new("treasure_train"),
            },
        }
    }

    #[test]
    fn test_valid_content_passes_validation() {
        validate_content(&minimal_content());
    }

    #[test]
    #[should_panic(expected = "needs unknown goods 'muskets'")]
    fn test_role_with_unknown_goods_panics() {
        let mut content = minimal_content();
        content.roles[0].goods.push((GoodsTypeId::new("muskets"), 50));
        validate_content(&content);
    }

    #[test]
    #[should_panic(expected = "is an expert in unknown goods")]
    fn test_expert_in_unknown_goods_panics() {
        let mut content = minimal_content();
        if let Some(def) = content.unit_types.get_mut(&UnitTypeId::new("free_colonist")) {
            def.expert_goods = Some(GoodsTypeId::new("silver"));
        }
        validate_content(&content);
    }

    #[test]
    #[should_panic(expected = "is not a treasure train")]
    fn test_treasure_type_must_carry_treasure() {
        let mut content = minimal_content();
        content.constants.treasure_train_type = UnitTypeId::new("free_colonist");
        validate_content(&content);
    }

    #[test]
    fn test_ai_config_must_name_known_types() {
        let mut content = minimal_content();
        for id in ["caravel", "veteran_soldier", "native_brave"] {
            let def = UnitTypeDef {
                id: UnitTypeId::new(id),
                ..content.unit_types[&UnitTypeId::new("free_colonist")].clone()
            };
            content.unit_types.insert(def.id.clone(), def);
        }
        let config = AiConfig::default();
        assert!(validate_ai_config(&config, &content).is_ok());

        let bad = AiConfig {
            carrier_type: UnitTypeId::new("galleon"),
            ..AiConfig::default()
        };
        let err = validate_ai_config(&bad, &content).unwrap_err();
        assert!(err.to_string().contains("ai.carrier_type 'galleon'"));
    }

    #[test]
    fn test_overrides_replace_whitelisted_keys_only() {
        let base = AiConfig::default();
        let overrides: serde_json::Map<String, serde_json::Value> =
            serde_json::from_str(r#"{"max_passes": 5, "war_tension": 90}"#).unwrap();

        let merged = apply_ai_overrides(&base, &overrides).unwrap();

        assert_eq!(merged.max_passes, 5);
        assert_eq!(merged.war_tension, 90);
        assert_eq!(merged.seek_turns_far, base.seek_turns_far);

        let forbidden: serde_json::Map<String, serde_json::Value> =
            serde_json::from_str(r#"{"carrier_type": "galleon"}"#).unwrap();
        let err = apply_ai_overrides(&base, &forbidden).unwrap_err();
        assert!(err.to_string().contains("'carrier_type' is not allowed"));
    }

    #[test]
    fn test_override_with_wrong_type_is_an_error() {
        let overrides: serde_json::Map<String, serde_json::Value> =
            serde_json::from_str(r#"{"max_passes": "many"}"#).unwrap();
        assert!(apply_ai_overrides(&AiConfig::default(), &overrides).is_err());
    }
}
