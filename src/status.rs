/// Status effects currently on the tracked actor.
///
/// The engine polls the host once per frame and caches the answer in
/// `StatusFlags`, so every ingestion during that frame sees the same buffs.
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActiveStatus {
    pub status_id:    u32,
    /// The tracked actor applied this status to itself.
    pub self_applied: bool,
}

/// Host-side query for the tracked actor's status list.
pub trait StatusOracle {
    fn active_statuses(&self) -> Vec<ActiveStatus>;
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatusFlags {
    /// status id → applied by the actor itself
    active: HashMap<u32, bool>,
}

impl StatusFlags {
    pub fn from_statuses(statuses: impl IntoIterator<Item = ActiveStatus>) -> Self {
        let mut active = HashMap::new();
        for s in statuses {
            // Several stacks of one status can come from different sources.
            *active.entry(s.status_id).or_insert(false) |= s.self_applied;
        }
        Self { active }
    }

    pub fn has(&self, status_id: u32) -> bool {
        self.active.contains_key(&status_id)
    }

    pub fn has_own(&self, status_id: u32) -> bool {
        self.active.get(&status_id).copied().unwrap_or(false)
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merges_sources_of_the_same_status() {
        let flags = StatusFlags::from_statuses([
            ActiveStatus { status_id: 2217, self_applied: false },
            ActiveStatus { status_id: 2217, self_applied: true },
            ActiveStatus { status_id: 167,  self_applied: false },
        ]);
        assert!(flags.has(2217));
        assert!(flags.has_own(2217));
        assert!(flags.has(167));
        assert!(!flags.has_own(167));
        assert!(!flags.has(496));
    }

    #[test]
    fn default_is_empty() {
        let flags = StatusFlags::default();
        assert!(flags.is_empty());
        assert!(!flags.has_own(1));
    }
}
