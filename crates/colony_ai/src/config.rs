use colony_core::{GoodsTypeId, UnitTypeId};
use serde::{Deserialize, Serialize};

/// Hand-tuned constants for the AI. Every field has a default so partial
/// JSON documents and scenario overrides load cleanly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AiConfig {
    // --- Target search radii, in turns ---
    pub build_colony_turns: u32,
    pub pioneer_turns: u32,
    pub scout_turns: u32,
    pub missionary_turns: u32,
    pub privateer_turns: u32,
    pub cash_in_turns: u32,
    /// Cash-in radius when the faction has no ship to carry treasure.
    pub cash_in_turns_no_carrier: u32,
    pub defend_turns_strict: u32,
    pub defend_turns_relaxed: u32,
    pub seek_turns_near: u32,
    pub seek_turns_far: u32,
    pub ref_seek_turns: u32,
    pub native_target_turns: u32,

    // --- Turn loop ---
    /// Wishes further away than this are scored by raw value only.
    pub many_turns: u32,
    pub max_passes: u32,
    pub max_steps_per_pass: u32,
    /// Speed of the hypothetical ship used to estimate crossings.
    pub virtual_ship_speed: u32,

    // --- Wishes and labor ---
    pub wish_value_growth: i32,
    pub target_population: u32,
    pub expert_worker_wish_value: i32,
    pub worker_wish_value: i32,
    pub goods_wish_value: i32,
    /// Stock of a non-food good that triggers an export parcel.
    pub export_threshold: u32,
    /// What every second unskilled colonist produces for sale.
    pub cash_goods: GoodsTypeId,
    pub transport_priority_step: i32,

    // --- Diplomacy ---
    pub war_tension: i32,
    pub peace_tension: i32,
    /// Percentage points a peace treaty loses per turn since signing.
    pub peace_hold_decay: i32,

    // --- Catch-up injections (percent chances per turn) ---
    pub poor_gold: i64,
    pub gold_grant: i64,
    pub gold_grant_percent: u32,
    pub recruit_percent: u32,
    pub soldier_percent: u32,

    // --- Native behaviour ---
    pub native_demand_percent: u32,
    pub native_gift_percent: u32,
    pub native_demand_tension: i32,
    pub native_gift_max_tension: i32,

    // --- Unit types the AI asks for ---
    pub default_worker_type: UnitTypeId,
    pub carrier_type: UnitTypeId,
    pub soldier_type: UnitTypeId,
    pub native_unit_type: UnitTypeId,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            build_colony_turns: 5,
            pioneer_turns: 10,
            scout_turns: 20,
            missionary_turns: 20,
            privateer_turns: 1,
            cash_in_turns: 12,
            cash_in_turns_no_carrier: 20,
            defend_turns_strict: 4,
            defend_turns_relaxed: 12,
            seek_turns_near: 8,
            seek_turns_far: 16,
            ref_seek_turns: 30,
            native_target_turns: 8,
            many_turns: 25,
            max_passes: 3,
            max_steps_per_pass: 4,
            virtual_ship_speed: 4,
            wish_value_growth: 2,
            target_population: 4,
            expert_worker_wish_value: 120,
            worker_wish_value: 100,
            goods_wish_value: 60,
            export_threshold: 100,
            cash_goods: GoodsTypeId::new("furs"),
            transport_priority_step: 10,
            war_tension: 60,
            peace_tension: 20,
            peace_hold_decay: 10,
            poor_gold: 300,
            gold_grant: 200,
            gold_grant_percent: 20,
            recruit_percent: 10,
            soldier_percent: 10,
            native_demand_percent: 5,
            native_gift_percent: 5,
            native_demand_tension: 40,
            native_gift_max_tension: 20,
            default_worker_type: UnitTypeId::new("free_colonist"),
            carrier_type: UnitTypeId::new("caravel"),
            soldier_type: UnitTypeId::new("veteran_soldier"),
            native_unit_type: UnitTypeId::new("native_brave"),
        }
    }
}
