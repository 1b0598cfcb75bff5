/// Remaining-time → axis offset mapping.
///
/// Remaining cooldown is clamped to the visible window, then placed with a
/// power-law curve: `offset = (remaining / window) ^ exponent * axis_len`.
/// Exponents below 1 stretch the region near "ready" so icons slow down as
/// they come off cooldown; exponents above 1 do the opposite.
///
/// Parameters are validated when the config loads (`config::TimelineConfig::validate`),
/// so nothing here re-checks them per frame.
use crate::config::TimelineConfig;
use serde::{Deserialize, Serialize};

/// Which edge of the timeline means "ready now".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Orientation {
    /// Ready at the right edge; icons travel left to right.
    LeftToRight,
    /// Ready at the left edge; icons travel right to left.
    #[default]
    RightToLeft,
    /// Ready at the bottom edge; icons travel downwards.
    TopToBottom,
    /// Ready at the top edge; icons travel upwards.
    BottomToTop,
}

impl Orientation {
    /// Forward orientations measure offsets from the far end of the axis.
    pub fn is_forward(self) -> bool {
        matches!(self, Self::LeftToRight | Self::TopToBottom)
    }

    pub fn is_horizontal(self) -> bool {
        matches!(self, Self::LeftToRight | Self::RightToLeft)
    }
}

/// Place a cooldown on the axis.
///
/// `cooldown_total` and `elapsed` are seconds; the result is in the same unit
/// as `axis_len`.
pub fn map_to_axis(
    cooldown_total:       f32,
    elapsed:              f32,
    axis_len:             f32,
    timeline_window:      f32,
    compression_exponent: f32,
    direction_is_forward: bool,
) -> f32 {
    let remaining = (cooldown_total - elapsed).clamp(0.0, timeline_window);
    let offset = remaining.powf(compression_exponent)
        / timeline_window.powf(compression_exponent)
        * axis_len;

    if direction_is_forward { axis_len - offset } else { offset }
}

/// Axis parameters lifted out of the config once per frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisParams {
    pub window_secs: f32,
    pub compression: f32,
    pub forward:     bool,
}

impl AxisParams {
    pub fn from_config(config: &TimelineConfig) -> Self {
        Self {
            window_secs: config.general.timeline_window_secs,
            compression: config.general.compression,
            forward:     config.general.orientation.is_forward(),
        }
    }

    pub fn offset(&self, cooldown_total: f32, elapsed: f32, axis_len: f32) -> f32 {
        map_to_axis(cooldown_total, elapsed, axis_len, self.window_secs, self.compression, self.forward)
    }

    /// Axis end that represents "ready now".
    pub fn ready_end(&self, axis_len: f32) -> f32 {
        if self.forward { axis_len } else { 0.0 }
    }
}

/// Grid line offsets for segment marks (seconds remaining).
/// Marks outside `[0, window]` are skipped.
pub fn grid_positions(params: &AxisParams, axis_len: f32, segments: &[f32]) -> Vec<(f32, f32)> {
    segments
        .iter()
        .copied()
        .filter(|&s| (0.0..=params.window_secs).contains(&s))
        .map(|s| (s, params.offset(s, 0.0, axis_len)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const AXIS: f32 = 600.0;

    fn params(compression: f32, forward: bool) -> AxisParams {
        AxisParams { window_secs: 120.0, compression, forward }
    }

    #[test]
    fn linear_midpoint() {
        assert_eq!(map_to_axis(60.0, 0.0, AXIS, 120.0, 1.0, false), 300.0);
        assert_eq!(map_to_axis(60.0, 0.0, AXIS, 120.0, 1.0, true), 300.0);
        assert_eq!(map_to_axis(90.0, 30.0, AXIS, 120.0, 1.0, false), 300.0);
    }

    #[test]
    fn ready_sits_on_the_ready_end() {
        for forward in [false, true] {
            let p = params(0.3, forward);
            assert_eq!(p.offset(30.0, 30.0, AXIS), p.ready_end(AXIS));
            // overdue entries clamp to the ready end too
            assert_eq!(p.offset(30.0, 45.0, AXIS), p.ready_end(AXIS));
        }
    }

    #[test]
    fn beyond_window_stacks_at_far_edge() {
        assert_eq!(map_to_axis(300.0, 0.0, AXIS, 120.0, 0.3, false), AXIS);
        assert_eq!(map_to_axis(300.0, 0.0, AXIS, 120.0, 0.3, true), 0.0);
    }

    #[test]
    fn compression_below_one_stretches_near_ready() {
        let compressed = map_to_axis(10.0, 0.0, AXIS, 120.0, 0.3, false);
        let linear = map_to_axis(10.0, 0.0, AXIS, 120.0, 1.0, false);
        let expanded = map_to_axis(10.0, 0.0, AXIS, 120.0, 2.0, false);
        assert!(compressed > linear);
        assert!(expanded < linear);
    }

    #[test]
    fn monotonic_distance_from_ready_end() {
        for compression in [0.1, 0.3, 1.0, 2.5] {
            for forward in [false, true] {
                let p = params(compression, forward);
                let ready = p.ready_end(AXIS);
                let mut last = -1.0_f32;
                for step in 0..=130 {
                    let distance = (p.offset(step as f32, 0.0, AXIS) - ready).abs();
                    assert!(distance >= last, "not monotonic at {step}s (c={compression})");
                    last = distance;
                }
            }
        }
    }

    #[test]
    fn grid_skips_segments_outside_window() {
        let p = params(1.0, false);
        let marks = grid_positions(&p, AXIS, &[30.0, 60.0, 120.0, 180.0]);
        assert_eq!(marks, vec![(30.0, 150.0), (60.0, 300.0), (120.0, 600.0)]);
    }

    #[test]
    fn orientation_ready_edges() {
        let axis = |o: Orientation| AxisParams { window_secs: 120.0, compression: 1.0, forward: o.is_forward() };
        assert_eq!(axis(Orientation::LeftToRight).ready_end(AXIS), AXIS);
        assert_eq!(axis(Orientation::TopToBottom).ready_end(AXIS), AXIS);
        assert_eq!(axis(Orientation::RightToLeft).ready_end(AXIS), 0.0);
        assert_eq!(axis(Orientation::BottomToTop).ready_end(AXIS), 0.0);
        assert_eq!(axis(Orientation::LeftToRight).offset(0.0, 0.0, AXIS), AXIS);
    }

    #[test]
    fn orientation_flags() {
        assert!(Orientation::LeftToRight.is_forward());
        assert!(!Orientation::BottomToTop.is_forward());
        assert!(Orientation::RightToLeft.is_horizontal());
        assert!(!Orientation::TopToBottom.is_horizontal());
        assert_eq!(Orientation::default(), Orientation::RightToLeft);
    }
}
