//! Role equipment pricing.

use std::collections::BTreeMap;

use crate::{GameContent, GameState, GoodsTypeId, Location, Role, SettlementKind, UnitId};

/// What changing a unit's role costs at its current location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EquipCost {
    /// Goods taken from the colony store (empty in Europe).
    pub goods: Vec<(GoodsTypeId, u32)>,
    /// Goods handed back from the unit's current role.
    pub refund: Vec<(GoodsTypeId, u32)>,
    /// Net gold paid in Europe (negative when selling equipment back).
    pub gold: i64,
}

/// Goods making up a full set of equipment for `role` with `uses` charges.
pub fn role_goods(content: &GameContent, role: Role, uses: u32) -> Vec<(GoodsTypeId, u32)> {
    content.role(role).map_or_else(Vec::new, |def| {
        def.goods
            .iter()
            .map(|(goods, per_use)| (goods.clone(), per_use * uses))
            .collect()
    })
}

/// Prices equipping `unit` for `role` where it stands. `None` when the unit
/// is not somewhere it can change role, or cannot afford it.
pub fn equip_cost(
    state: &GameState,
    content: &GameContent,
    unit: UnitId,
    role: Role,
) -> Option<EquipCost> {
    let unit = state.unit(unit)?;
    if unit.voyage.is_some() || unit.role == role {
        return None;
    }
    let max_uses = content.role(role).map_or(0, |def| def.max_uses);
    let europe_only = content.role(role).is_some_and(|def| def.europe_only);
    let goods = role_goods(content, role, max_uses);
    let refund = role_goods(content, unit.role, unit.role_uses);

    match unit.location {
        Location::Tile(pos) => {
            if europe_only {
                return None;
            }
            let colony = state
                .settlement_at(pos)
                .filter(|s| s.owner == unit.owner && s.kind == SettlementKind::Colony)?;
            let mut available: BTreeMap<&GoodsTypeId, u32> =
                colony.goods.iter().map(|(g, n)| (g, *n)).collect();
            for (g, n) in &refund {
                *available.entry(g).or_default() += n;
            }
            let affordable = goods
                .iter()
                .all(|(g, n)| available.get(g).copied().unwrap_or(0) >= *n);
            affordable.then_some(EquipCost {
                goods,
                refund,
                gold: 0,
            })
        }
        Location::Europe => {
            let prices = &state.europe.prices;
            let mut gold: i64 = 0;
            for (g, n) in &goods {
                gold += i64::from(*prices.get(g)?) * i64::from(*n);
            }
            for (g, n) in &refund {
                gold -= i64::from(prices.get(g).copied().unwrap_or(0)) * i64::from(*n) / 2;
            }
            let treasury = state.factions.get(&unit.owner)?.gold;
            (gold <= treasury).then_some(EquipCost {
                goods: Vec::new(),
                refund,
                gold,
            })
        }
        Location::Aboard(_) => None,
    }
}
