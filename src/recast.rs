//! Recast oracle adapter.
//!
//! Wraps the host's live recast timers into a normalised `RecastInfo` and
//! holds the charge arithmetic shared by ingestion and charge resync.
//!
//! Charge abilities report one timer for the whole pool: `total` is the time
//! to refill every charge, `elapsed` how far the refill has progressed. When
//! level sync or stat modifiers lower the charge count below the baseline the
//! timer still runs against the baseline pool, so `total` is rescaled here.

/// Raw recast group timer, seconds.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RecastTimer {
    pub total:   f32,
    pub elapsed: f32,
}

/// Host-side recast queries. All lookups are non-blocking in-memory reads.
pub trait RecastOracle {
    /// Timer of the ability's recast group; `None` when it has no group.
    fn recast_timer(&self, ability_id: u32) -> Option<RecastTimer>;
    /// Charge count at the reference level the timer is built against.
    fn baseline_max_charges(&self, ability_id: u32) -> u16;
    /// Charge count at the player's current level and modifiers.
    fn current_max_charges(&self, ability_id: u32) -> u16;
    /// Adjusted GCD length, seconds.
    fn gcd_time(&self, ability_id: u32) -> f32;
    /// Adjusted cast time, seconds.
    fn cast_time(&self, ability_id: u32) -> f32;
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RecastInfo {
    pub total:       f32,
    pub elapsed:     f32,
    pub max_charges: u16,
}

impl RecastInfo {
    /// Charges ready right now.
    pub fn ready_charges(&self) -> u16 {
        if self.total == 0.0 {
            return self.max_charges;
        }
        let ready = (f32::from(self.max_charges) * (self.elapsed / self.total)).floor();
        (ready.max(0.0) as u16).min(self.max_charges)
    }

    /// Time to recover a single charge.
    pub fn charge_time(&self) -> f32 {
        if self.max_charges == 0 {
            self.total
        } else {
            self.total / f32::from(self.max_charges)
        }
    }

    /// Time left until the charge currently recovering is ready.
    ///
    /// Lies in `(0, charge_time]` while anything is still recovering, so a
    /// timer sitting exactly on a charge boundary reports a full charge.
    pub fn remainder_within_charge(&self) -> f32 {
        let charge_time = self.charge_time();
        if charge_time == 0.0 {
            return 0.0;
        }
        let remaining = (self.total - self.elapsed).abs();
        let rem = remaining % charge_time;
        if rem == 0.0 && remaining > 0.0 { charge_time } else { rem }
    }

    /// How far into the current charge the timer is.
    pub fn progress_within_charge(&self) -> f32 {
        (self.charge_time() - self.remainder_within_charge()).abs()
    }
}

/// Normalised recast for `ability_id`. Unknown ids yield a zeroed `RecastInfo`.
pub fn adjusted_recast<O: RecastOracle + ?Sized>(oracle: &O, ability_id: u32) -> RecastInfo {
    let Some(timer) = oracle.recast_timer(ability_id) else {
        return RecastInfo::default();
    };

    let mut info = RecastInfo {
        total:       timer.total,
        elapsed:     timer.elapsed,
        max_charges: oracle.baseline_max_charges(ability_id),
    };
    if info.max_charges <= 1 {
        return info;
    }

    let current = oracle.current_max_charges(ability_id);
    if current == info.max_charges {
        return info;
    }

    info.total = info.total * f32::from(current) / f32::from(info.max_charges);
    info.max_charges = current;
    if info.elapsed > info.total {
        info.total = 0.0;
        info.elapsed = 0.0;
    }
    info
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[derive(Default)]
    struct FakeOracle {
        timers:  HashMap<u32, RecastTimer>,
        charges: HashMap<u32, (u16, u16)>,
    }

    impl RecastOracle for FakeOracle {
        fn recast_timer(&self, id: u32) -> Option<RecastTimer> {
            self.timers.get(&id).copied()
        }
        fn baseline_max_charges(&self, id: u32) -> u16 {
            self.charges.get(&id).map(|c| c.0).unwrap_or(0)
        }
        fn current_max_charges(&self, id: u32) -> u16 {
            self.charges.get(&id).map(|c| c.1).unwrap_or(0)
        }
        fn gcd_time(&self, _: u32) -> f32 { 0.0 }
        fn cast_time(&self, _: u32) -> f32 { 0.0 }
    }

    fn oracle(id: u32, total: f32, elapsed: f32, baseline: u16, current: u16) -> FakeOracle {
        let mut o = FakeOracle::default();
        o.timers.insert(id, RecastTimer { total, elapsed });
        o.charges.insert(id, (baseline, current));
        o
    }

    #[test]
    fn single_charge_passes_through() {
        let info = adjusted_recast(&oracle(1, 60.0, 12.0, 1, 1), 1);
        assert_eq!(info, RecastInfo { total: 60.0, elapsed: 12.0, max_charges: 1 });
    }

    #[test]
    fn unknown_ability_is_zeroed() {
        let info = adjusted_recast(&FakeOracle::default(), 404);
        assert_eq!(info, RecastInfo::default());
        assert_eq!(info.remainder_within_charge(), 0.0);
    }

    #[test]
    fn rescales_when_charges_are_reduced() {
        // 3 baseline charges of 30s, synced down to 2
        let info = adjusted_recast(&oracle(1, 90.0, 20.0, 3, 2), 1);
        assert_eq!(info.total, 60.0);
        assert_eq!(info.elapsed, 20.0);
        assert_eq!(info.max_charges, 2);
    }

    #[test]
    fn clamps_to_ready_when_elapsed_overshoots() {
        let info = adjusted_recast(&oracle(1, 90.0, 75.0, 3, 2), 1);
        assert_eq!(info.total, 0.0);
        assert_eq!(info.elapsed, 0.0);
        assert_eq!(info.ready_charges(), 2);
    }

    #[test]
    fn charge_math() {
        let info = RecastInfo { total: 60.0, elapsed: 40.0, max_charges: 2 };
        assert_eq!(info.charge_time(), 30.0);
        assert_eq!(info.ready_charges(), 1);
        assert_eq!(info.remainder_within_charge(), 20.0);
        assert_eq!(info.progress_within_charge(), 10.0);
    }

    #[test]
    fn boundary_reports_a_full_charge() {
        let info = RecastInfo { total: 60.0, elapsed: 30.0, max_charges: 2 };
        assert_eq!(info.remainder_within_charge(), 30.0);

        let single = RecastInfo { total: 120.0, elapsed: 0.0, max_charges: 1 };
        assert_eq!(single.remainder_within_charge(), 120.0);
        assert_eq!(single.ready_charges(), 0);
    }

    #[test]
    fn zero_charges_use_whole_timer() {
        let info = RecastInfo { total: 10.0, elapsed: 4.0, max_charges: 0 };
        assert_eq!(info.charge_time(), 10.0);
        assert_eq!(info.remainder_within_charge(), 6.0);
    }
}
