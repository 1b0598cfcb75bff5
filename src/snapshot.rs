/// Read-only timeline copies for renderers.
///
/// The engine hands out owned snapshots; everything a renderer needs to draw a
/// frame (axis offset, draw order, highlight, countdown text) is derived here
/// without touching engine state.
use crate::{
    config::{RoundingMode, TimelineConfig},
    engine::TimelineEntry,
    position::{grid_positions, AxisParams},
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimelineSnapshot {
    pub captured_ms: u64,
    pub entries:     Vec<TimelineEntry>,
}

/// One icon to draw.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Placement {
    pub ability_id:  u32,
    pub icon_id:     u32,
    /// Seconds until the next charge.
    pub remaining:   f32,
    /// Distance along the axis, same unit as `axis_len`.
    pub offset:      f32,
    pub highlighted: bool,
    pub label:       String,
}

impl TimelineSnapshot {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Placements in draw order: furthest from ready first, or closest first
    /// with `reverse_draw_order`. Entries already at zero are left out until
    /// the next tick retires or recharges them.
    pub fn placements(&self, now_ms: u64, axis_len: f32, config: &TimelineConfig) -> Vec<Placement> {
        let axis = AxisParams::from_config(config);
        let cd = &config.cooldown;

        let mut out: Vec<Placement> = self
            .entries
            .iter()
            .filter_map(|e| {
                let elapsed = e.elapsed_secs(now_ms);
                let remaining = e.cooldown_secs() - elapsed;
                if remaining <= 0.0 {
                    return None;
                }
                Some(Placement {
                    ability_id:  e.ability_id,
                    icon_id:     e.icon_id,
                    remaining,
                    offset:      axis.offset(e.cooldown_secs(), elapsed, axis_len),
                    highlighted: cd.threshold_enabled && remaining <= cd.threshold_secs,
                    label:       countdown_label(remaining, cd.rounding, cd.show_as_minutes),
                })
            })
            .collect();

        if config.general.reverse_draw_order {
            out.sort_by(|a, b| a.remaining.total_cmp(&b.remaining));
        } else {
            out.sort_by(|a, b| b.remaining.total_cmp(&a.remaining));
        }
        out
    }
}

/// Grid line offsets for the configured segments; empty when the grid is off.
pub fn grid_marks(axis_len: f32, config: &TimelineConfig) -> Vec<(f32, f32)> {
    if !config.grid.show {
        return Vec::new();
    }
    grid_positions(&AxisParams::from_config(config), axis_len, &config.grid.segments)
}

// ---------------------------------------------------------------------------
// Countdown text
// ---------------------------------------------------------------------------

pub fn round_remaining(remaining: f32, mode: RoundingMode) -> f32 {
    match mode {
        RoundingMode::Truncate => remaining.trunc(),
        RoundingMode::Floor    => remaining.floor(),
        RoundingMode::Ceiling  => remaining.ceil(),
        RoundingMode::Round    => remaining.round_ties_even(),
    }
}

pub fn countdown_label(remaining: f32, mode: RoundingMode, as_minutes: bool) -> String {
    let rounded = round_remaining(remaining, mode);
    if as_minutes {
        format_duration(rounded)
    } else {
        format!("{}", rounded as i64)
    }
}

/// `1h`, `7m`, `1:05` or plain seconds; zero renders as nothing.
pub fn format_duration(secs: f32) -> String {
    if secs == 0.0 {
        return String::new();
    }
    let whole = secs as i64;
    let hours = whole / 3_600;
    let minutes = (whole / 60) % 60;
    let seconds = whole % 60;

    if hours >= 1 {
        format!("{}h", hours)
    } else if minutes >= 5 {
        format!("{}m", minutes)
    } else if minutes >= 1 {
        format!("{}:{:02}", minutes, seconds)
    } else {
        format!("{}", secs.round() as i64)
    }
}
