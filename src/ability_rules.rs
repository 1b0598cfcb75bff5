/// Ability rule tables: the per-ability quirks the timeline engine applies at
/// ingestion time.
///
/// Every special case lives here as data rather than as branches in the
/// engine: shared-charge aliasing, hardcoded GCD lengths, icon overrides,
/// charge restorers, combo follow-ups and the two charge-resync triggers.
///
/// A built-in table is embedded at compile time from `data/ability_rules.toml`
/// and parsed once. Hosts and tests inject their own with `from_toml`.
use crate::{engine::EntryKind, status::StatusFlags};
use once_cell::sync::Lazy;
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use thiserror::Error;

// ---------------------------------------------------------------------------
// Embedded TOML data
// ---------------------------------------------------------------------------

const BUILTIN_RULES: &str = include_str!("../data/ability_rules.toml");

static BUILTIN: Lazy<AbilityRules> = Lazy::new(|| {
    AbilityRules::from_toml(BUILTIN_RULES).unwrap_or_else(|e| {
        tracing::warn!("Built-in ability rules rejected, running without quirks: {}", e);
        AbilityRules::default()
    })
});

#[derive(Debug, Error)]
pub enum RulesError {
    #[error("ability rules parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("ability {id} is listed more than once in `{table}`")]
    Duplicate { id: u32, table: &'static str },
    #[error("ability {0} is listed as restoring its own charges")]
    SelfRestore(u32),
    #[error("fixed GCD for ability {0} must be a positive number of seconds")]
    BadFixedGcd(u32),
}

// ---------------------------------------------------------------------------
// TOML deserialization structs (private)
// ---------------------------------------------------------------------------

#[derive(Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct TomlRules {
    #[serde(default)]
    aliases:               Vec<(u32, u32)>,
    #[serde(default)]
    fixed_gcd:             Vec<(u32, f32)>,
    #[serde(default)]
    icons:                 Vec<(u32, u32)>,
    #[serde(default)]
    off_gcd_abilities:     Vec<u32>,
    #[serde(default)]
    instant_cast_statuses: Vec<u32>,
    #[serde(default)]
    restorers:             Vec<TomlRestorer>,
    #[serde(default)]
    follow_ups:            Vec<TomlFollowUp>,
    #[serde(default)]
    resync_on_use:         Vec<TomlUseResync>,
    #[serde(default)]
    resync_while_status:   Vec<TomlStatusResync>,
    #[serde(default)]
    preview:               Vec<(u32, EntryKind)>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct TomlRestorer {
    ability:  u32,
    restores: Vec<u32>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct TomlFollowUp {
    status:    u32,
    abilities: Vec<u32>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct TomlUseResync {
    ability: u32,
    targets: Vec<u32>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct TomlStatusResync {
    status:  u32,
    #[serde(default)]
    own:     bool,
    targets: Vec<u32>,
}

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// Abilities that must not open their own timer while the actor carries `status`.
#[derive(Debug, Clone, PartialEq)]
pub struct FollowUpRule {
    pub status:    u32,
    pub abilities: HashSet<u32>,
}

/// While `status` is up (applied by the actor itself when `own_only`), the
/// `targets` timers are recomputed from the recast oracle every tick.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusResync {
    pub status:   u32,
    pub own_only: bool,
    pub targets:  Vec<u32>,
}

#[derive(Debug, Clone, Default)]
pub struct AbilityRules {
    aliases:               HashMap<u32, u32>,
    fixed_gcd:             HashMap<u32, f32>,
    icons:                 HashMap<u32, u32>,
    off_gcd:               HashSet<u32>,
    instant_cast_statuses: Vec<u32>,
    restorers:             HashMap<u32, Vec<u32>>,
    follow_ups:            Vec<FollowUpRule>,
    resync_on_use:         HashMap<u32, Vec<u32>>,
    resync_while_status:   Vec<StatusResync>,
    preview:               Vec<(u32, EntryKind)>,
}

// ---------------------------------------------------------------------------
// Parsing helpers
// ---------------------------------------------------------------------------

fn unique_map<V>(
    pairs: Vec<(u32, V)>,
    table: &'static str,
) -> Result<HashMap<u32, V>, RulesError> {
    let mut map = HashMap::with_capacity(pairs.len());
    for (id, value) in pairs {
        if map.insert(id, value).is_some() {
            return Err(RulesError::Duplicate { id, table });
        }
    }
    Ok(map)
}

impl AbilityRules {
    /// Parse and validate a rule table.
    pub fn from_toml(raw: &str) -> Result<Self, RulesError> {
        let file: TomlRules = toml::from_str(raw)?;

        if let Some(&(id, _)) = file.fixed_gcd.iter().find(|(_, secs)| !(*secs > 0.0)) {
            return Err(RulesError::BadFixedGcd(id));
        }
        if let Some(r) = file.restorers.iter().find(|r| r.restores.contains(&r.ability)) {
            return Err(RulesError::SelfRestore(r.ability));
        }

        let restorers = unique_map(
            file.restorers.into_iter().map(|r| (r.ability, r.restores)).collect(),
            "restorers",
        )?;
        let resync_on_use = unique_map(
            file.resync_on_use.into_iter().map(|r| (r.ability, r.targets)).collect(),
            "resync_on_use",
        )?;

        Ok(Self {
            aliases:               unique_map(file.aliases, "aliases")?,
            fixed_gcd:             unique_map(file.fixed_gcd, "fixed_gcd")?,
            icons:                 unique_map(file.icons, "icons")?,
            off_gcd:               file.off_gcd_abilities.into_iter().collect(),
            instant_cast_statuses: file.instant_cast_statuses,
            restorers,
            follow_ups:            file.follow_ups
                                       .into_iter()
                                       .map(|f| FollowUpRule {
                                           status:    f.status,
                                           abilities: f.abilities.into_iter().collect(),
                                       })
                                       .collect(),
            resync_on_use,
            resync_while_status:   file.resync_while_status
                                       .into_iter()
                                       .map(|r| StatusResync {
                                           status:   r.status,
                                           own_only: r.own,
                                           targets:  r.targets,
                                       })
                                       .collect(),
            preview:               file.preview,
        })
    }

    /// Load a rule table from disk.
    pub fn load(path: &std::path::Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let rules = Self::from_toml(&raw)?;
        tracing::info!("Loaded ability rules from {:?}", path);
        Ok(rules)
    }

    /// The table shipped with the crate.
    pub fn builtin() -> Self {
        BUILTIN.clone()
    }

    // -----------------------------------------------------------------------
    // Lookups
    // -----------------------------------------------------------------------

    /// Canonical id whose charge pool `ability_id` shares; identity when unaliased.
    pub fn resolve_alias(&self, ability_id: u32) -> u32 {
        self.aliases.get(&ability_id).copied().unwrap_or(ability_id)
    }

    pub fn is_aliased(&self, ability_id: u32) -> bool {
        self.aliases.contains_key(&ability_id)
    }

    /// Hardcoded GCD length in seconds.
    pub fn fixed_duration(&self, ability_id: u32) -> Option<f32> {
        self.fixed_gcd.get(&ability_id).copied()
    }

    pub fn icon_override(&self, ability_id: u32) -> Option<u32> {
        self.icons.get(&ability_id).copied()
    }

    /// Ids whose tracked timers are dropped when `ability_id` is used.
    pub fn charge_restorer(&self, ability_id: u32) -> &[u32] {
        self.restorers.get(&ability_id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_suppressed_follow_up(&self, ability_id: u32, statuses: &StatusFlags) -> bool {
        self.follow_ups
            .iter()
            .any(|f| f.abilities.contains(&ability_id) && statuses.has(f.status))
    }

    pub fn is_off_gcd(&self, ability_id: u32) -> bool {
        self.off_gcd.contains(&ability_id)
    }

    /// True when any status that turns casts instant is currently up.
    pub fn has_instant_cast(&self, statuses: &StatusFlags) -> bool {
        self.instant_cast_statuses.iter().any(|&s| statuses.has(s))
    }

    pub fn resync_on_use(&self, ability_id: u32) -> &[u32] {
        self.resync_on_use.get(&ability_id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Resync targets for every status rule currently satisfied.
    pub fn active_status_resyncs<'a>(
        &'a self,
        statuses: &'a StatusFlags,
    ) -> impl Iterator<Item = &'a [u32]> + 'a {
        self.resync_while_status
            .iter()
            .filter(move |r| {
                if r.own_only { statuses.has_own(r.status) } else { statuses.has(r.status) }
            })
            .map(|r| r.targets.as_slice())
    }

    pub fn preview_script(&self) -> &[(u32, EntryKind)] {
        &self.preview
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::ActiveStatus;

    const SYNTHETIC: &str = r#"
aliases   = [[11, 10], [12, 10]]
fixed_gcd = [[20, 0.5]]
icons     = [[11, 900]]
off_gcd_abilities     = [3]
instant_cast_statuses = [167]
preview = [[10, "OffCooldownAbility"], [20, "Instant"]]

[[restorers]]
ability  = 30
restores = [10, 40]

[[follow_ups]]
status    = 496
abilities = [10]

[[resync_on_use]]
ability = 50
targets = [51, 52]

[[resync_while_status]]
status  = 2217
own     = true
targets = [60]
"#;

    fn flags(statuses: &[(u32, bool)]) -> StatusFlags {
        StatusFlags::from_statuses(statuses.iter().map(|&(status_id, self_applied)| ActiveStatus {
            status_id,
            self_applied,
        }))
    }

    #[test]
    fn builtin_table_parses() {
        let rules = AbilityRules::from_toml(BUILTIN_RULES).expect("built-in rules should parse");
        assert_eq!(rules.resolve_alias(117), 110);   // rain of death → bloodletter
        assert_eq!(rules.fixed_duration(2266), Some(1.5));
        assert_eq!(rules.icon_override(3), Some(104));
        assert_eq!(rules.charge_restorer(2245), &[2259, 2261, 2263]);
        assert_eq!(rules.preview_script().len(), 7);
    }

    #[test]
    fn alias_is_identity_when_unlisted() {
        let rules = AbilityRules::from_toml(SYNTHETIC).unwrap();
        assert_eq!(rules.resolve_alias(12), 10);
        assert_eq!(rules.resolve_alias(999), 999);
        assert!(rules.is_aliased(11));
        assert!(!rules.is_aliased(999));
    }

    #[test]
    fn lookups_default_to_none_or_empty() {
        let rules = AbilityRules::from_toml(SYNTHETIC).unwrap();
        assert_eq!(rules.fixed_duration(999), None);
        assert_eq!(rules.icon_override(999), None);
        assert!(rules.charge_restorer(999).is_empty());
        assert!(rules.resync_on_use(999).is_empty());
    }

    #[test]
    fn follow_up_needs_precursor_status() {
        let rules = AbilityRules::from_toml(SYNTHETIC).unwrap();
        assert!(!rules.is_suppressed_follow_up(10, &flags(&[])));
        assert!(rules.is_suppressed_follow_up(10, &flags(&[(496, false)])));
        assert!(!rules.is_suppressed_follow_up(11, &flags(&[(496, false)])));
    }

    #[test]
    fn status_resync_respects_ownership() {
        let rules = AbilityRules::from_toml(SYNTHETIC).unwrap();
        let foreign = flags(&[(2217, false)]);
        assert_eq!(rules.active_status_resyncs(&foreign).count(), 0);

        let own = flags(&[(2217, true)]);
        let targets: Vec<&[u32]> = rules.active_status_resyncs(&own).collect();
        assert_eq!(targets, vec![&[60][..]]);
    }

    #[test]
    fn instant_cast_status() {
        let rules = AbilityRules::from_toml(SYNTHETIC).unwrap();
        assert!(rules.has_instant_cast(&flags(&[(167, true)])));
        assert!(!rules.has_instant_cast(&flags(&[(168, true)])));
    }

    #[test]
    fn rejects_duplicate_alias() {
        let err = AbilityRules::from_toml("aliases = [[1, 2], [1, 3]]").unwrap_err();
        assert!(matches!(err, RulesError::Duplicate { id: 1, table: "aliases" }));
    }

    #[test]
    fn rejects_self_restore() {
        let raw = "[[restorers]]\nability = 7\nrestores = [7]\n";
        assert!(matches!(AbilityRules::from_toml(raw), Err(RulesError::SelfRestore(7))));
    }

    #[test]
    fn rejects_unknown_table() {
        assert!(matches!(
            AbilityRules::from_toml("mystery = [1]"),
            Err(RulesError::Parse(_))
        ));
    }

    #[test]
    fn empty_table_is_valid() {
        let rules = AbilityRules::from_toml("").unwrap();
        assert_eq!(rules.resolve_alias(5), 5);
        assert!(rules.preview_script().is_empty());
    }
}
