/// Simulated game host.
///
/// Implements the three host seams (`AbilityCatalog`, `RecastOracle`,
/// `StatusOracle`) over a TOML fixture and a virtual millisecond clock. Used by
/// the engine tests and by the `replay` command.
///
/// Fixture format:
///
///   [[abilities]]
///   id          = 7531
///   icon        = 2512
///   category    = 4          # 1 auto-attack, 2 spell, 3 weaponskill, 4 ability
///   recast_secs = 90.0       # per charge
///   max_charges = 2          # optional, default 1
///   current_max_charges = 1  # optional, level-synced charge count
///   gcd_secs    = 0.0        # optional
///   cast_secs   = 0.0        # optional
///   group       = 7531       # optional, abilities sharing a recast group
///
/// Recast groups behave like the game's: one timer for the whole charge pool.
/// Using an idle group starts it one charge short of full; using an active
/// group spends one charge worth of progress.
use crate::{
    catalog::{AbilityCatalog, AbilityInfo},
    recast::{RecastOracle, RecastTimer},
    status::{ActiveStatus, StatusOracle},
};
use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

fn one() -> u16 {
    1
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FixtureAbility {
    pub id:                  u32,
    #[serde(default)]
    pub icon:                u32,
    pub category:            u32,
    pub recast_secs:         f32,
    #[serde(default = "one")]
    pub max_charges:         u16,
    #[serde(default)]
    pub current_max_charges: Option<u16>,
    #[serde(default)]
    pub gcd_secs:            f32,
    #[serde(default)]
    pub cast_secs:           f32,
    #[serde(default)]
    pub group:               Option<u32>,
}

impl FixtureAbility {
    fn group_id(&self) -> u32 {
        self.group.unwrap_or(self.id)
    }

    fn pool_charges(&self) -> i64 {
        i64::from(self.max_charges.max(1))
    }

    fn charge_ms(&self) -> i64 {
        (f64::from(self.recast_secs) * 1_000.0).round() as i64
    }

    fn total_ms(&self) -> i64 {
        self.charge_ms() * self.pool_charges()
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct Fixture {
    #[serde(default)]
    abilities: Vec<FixtureAbility>,
}

/// Running timer of one recast group. Idle groups are not stored.
#[derive(Debug, Clone, Copy)]
struct GroupTimer {
    total_ms:   i64,
    elapsed_ms: i64,
    /// Clock reading `elapsed_ms` was taken at.
    mark_ms:    u64,
}

impl GroupTimer {
    fn elapsed_at(&self, now_ms: u64) -> i64 {
        self.elapsed_ms + now_ms.saturating_sub(self.mark_ms) as i64
    }
}

#[derive(Debug, Clone, Default)]
pub struct SimulatedGame {
    now_ms:    u64,
    abilities: HashMap<u32, FixtureAbility>,
    groups:    HashMap<u32, GroupTimer>,
    /// status id → applied by the tracked actor itself
    statuses:  HashMap<u32, bool>,
}

impl SimulatedGame {
    pub fn from_toml(raw: &str) -> Result<Self> {
        let fixture: Fixture = toml::from_str(raw).context("Invalid ability fixture")?;
        let mut game = Self::default();
        for ability in fixture.abilities {
            if ability.recast_secs < 0.0 || !ability.recast_secs.is_finite() {
                bail!("ability {}: recast_secs must be a non-negative number", ability.id);
            }
            let id = ability.id;
            if game.abilities.insert(id, ability).is_some() {
                bail!("ability {} listed twice in fixture", id);
            }
        }
        Ok(game)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Cannot read fixture {:?}", path))?;
        let game = Self::from_toml(&raw)?;
        tracing::info!("Loaded {} abilities from {:?}", game.abilities.len(), path);
        Ok(game)
    }

    /// Register `alias` as a second action sharing `canonical`'s recast group.
    pub fn add_alias_ability(&mut self, alias: u32, canonical: u32) -> bool {
        let Some(base) = self.abilities.get(&canonical) else {
            return false;
        };
        let ability = FixtureAbility { id: alias, group: Some(base.group_id()), ..base.clone() };
        self.abilities.insert(alias, ability);
        true
    }

    // -----------------------------------------------------------------------
    // Clock
    // -----------------------------------------------------------------------

    pub fn now_ms(&self) -> u64 {
        self.now_ms
    }

    pub fn advance(&mut self, delta_ms: u64) {
        self.set_time(self.now_ms + delta_ms);
    }

    /// Move the clock and retire groups that finished recovering.
    pub fn set_time(&mut self, now_ms: u64) {
        self.now_ms = now_ms;
        self.groups.retain(|_, t| t.elapsed_at(now_ms) < t.total_ms);
    }

    // -----------------------------------------------------------------------
    // Actions
    // -----------------------------------------------------------------------

    /// Spend a charge. False when the ability is unknown or nothing is ready.
    pub fn use_ability(&mut self, ability_id: u32) -> bool {
        let Some(ability) = self.abilities.get(&ability_id) else {
            return false;
        };
        let (total_ms, charge_ms) = (ability.total_ms(), ability.charge_ms());
        if total_ms == 0 {
            return true;
        }
        let now = self.now_ms;
        let group = ability.group_id();

        match self.groups.get_mut(&group) {
            Some(timer) if timer.elapsed_at(now) < timer.total_ms => {
                let elapsed = timer.elapsed_at(now);
                if elapsed < charge_ms {
                    return false;
                }
                timer.elapsed_ms = elapsed - charge_ms;
                timer.mark_ms = now;
            }
            _ => {
                self.groups.insert(group, GroupTimer {
                    total_ms,
                    elapsed_ms: total_ms - charge_ms,
                    mark_ms:    now,
                });
            }
        }
        true
    }

    /// Give back one charge outside of normal recovery (resource refunds).
    pub fn refund_charge(&mut self, ability_id: u32) {
        let Some(ability) = self.abilities.get(&ability_id) else {
            return;
        };
        let charge_ms = ability.charge_ms();
        let now = self.now_ms;
        let group = ability.group_id();
        if let Some(timer) = self.groups.get_mut(&group) {
            timer.elapsed_ms = timer.elapsed_at(now) + charge_ms;
            timer.mark_ms = now;
            if timer.elapsed_ms >= timer.total_ms {
                self.groups.remove(&group);
            }
        }
    }

    /// Every recast group back to idle.
    pub fn reset_recasts(&mut self) {
        self.groups.clear();
    }

    pub fn set_status(&mut self, status_id: u32, self_applied: bool, active: bool) {
        if active {
            self.statuses.insert(status_id, self_applied);
        } else {
            self.statuses.remove(&status_id);
        }
    }
}

// ---------------------------------------------------------------------------
// Host seams
// ---------------------------------------------------------------------------

impl AbilityCatalog for SimulatedGame {
    fn lookup(&self, ability_id: u32) -> Option<AbilityInfo> {
        self.abilities.get(&ability_id).map(|a| AbilityInfo {
            icon:             a.icon,
            category:         a.category,
            base_recast_secs: a.recast_secs,
            max_charges:      a.max_charges,
        })
    }
}

impl RecastOracle for SimulatedGame {
    fn recast_timer(&self, ability_id: u32) -> Option<RecastTimer> {
        let ability = self.abilities.get(&ability_id)?;
        let timer = self
            .groups
            .get(&ability.group_id())
            .filter(|t| t.elapsed_at(self.now_ms) < t.total_ms);
        Some(match timer {
            Some(t) => RecastTimer {
                total:   t.total_ms as f32 / 1_000.0,
                elapsed: t.elapsed_at(self.now_ms) as f32 / 1_000.0,
            },
            None => RecastTimer::default(),
        })
    }

    fn baseline_max_charges(&self, ability_id: u32) -> u16 {
        self.abilities.get(&ability_id).map_or(0, |a| a.max_charges)
    }

    fn current_max_charges(&self, ability_id: u32) -> u16 {
        self.abilities
            .get(&ability_id)
            .map_or(0, |a| a.current_max_charges.unwrap_or(a.max_charges))
    }

    fn gcd_time(&self, ability_id: u32) -> f32 {
        self.abilities.get(&ability_id).map_or(0.0, |a| a.gcd_secs)
    }

    fn cast_time(&self, ability_id: u32) -> f32 {
        self.abilities.get(&ability_id).map_or(0.0, |a| a.cast_secs)
    }
}

impl StatusOracle for SimulatedGame {
    fn active_statuses(&self) -> Vec<ActiveStatus> {
        self.statuses
            .iter()
            .map(|(&status_id, &self_applied)| ActiveStatus { status_id, self_applied })
            .collect()
    }
}
