/// Read-only ability metadata catalog.
///
/// The host backs this with the game's action sheet; tests and the replay tool
/// use a plain `HashMap` or the simulated game in `sim.rs`.
use crate::{ability_rules::AbilityRules, engine::EntryKind};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Action category rows that change how a use is classified.
pub const CATEGORY_AUTO_ATTACK: u32 = 1;
pub const CATEGORY_ABILITY:     u32 = 4;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AbilityInfo {
    pub icon:             u32,
    pub category:         u32,
    /// Catalog recast for one charge, seconds.
    pub base_recast_secs: f32,
    pub max_charges:      u16,
}

pub trait AbilityCatalog {
    fn lookup(&self, ability_id: u32) -> Option<AbilityInfo>;
}

impl AbilityCatalog for HashMap<u32, AbilityInfo> {
    fn lookup(&self, ability_id: u32) -> Option<AbilityInfo> {
        self.get(&ability_id).cloned()
    }
}

/// Kind of timeline entry an executed action produces.
pub fn classify(ability_id: u32, info: &AbilityInfo, rules: &AbilityRules) -> EntryKind {
    if info.category == CATEGORY_ABILITY || rules.is_off_gcd(ability_id) {
        EntryKind::OffCooldownAbility
    } else if info.category == CATEGORY_AUTO_ATTACK {
        EntryKind::AutoAttack
    } else {
        EntryKind::Instant
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(category: u32) -> AbilityInfo {
        AbilityInfo { icon: 1, category, base_recast_secs: 2.5, max_charges: 1 }
    }

    #[test]
    fn classifies_by_category() {
        let rules = AbilityRules::default();
        assert_eq!(classify(7, &info(CATEGORY_ABILITY), &rules), EntryKind::OffCooldownAbility);
        assert_eq!(classify(7, &info(CATEGORY_AUTO_ATTACK), &rules), EntryKind::AutoAttack);
        assert_eq!(classify(7, &info(2), &rules), EntryKind::Instant);
    }

    #[test]
    fn off_gcd_override_wins_over_category() {
        let rules = AbilityRules::from_toml("off_gcd_abilities = [3]").unwrap();
        assert_eq!(classify(3, &info(10), &rules), EntryKind::OffCooldownAbility);
    }

    #[test]
    fn map_catalog_misses_are_none() {
        let mut catalog = HashMap::new();
        catalog.insert(5, info(2));
        assert!(catalog.lookup(5).is_some());
        assert!(catalog.lookup(6).is_none());
    }
}
