/// Timeline configuration, persisted as TOML in the host's config directory.
///
/// Everything the engine and the placement helpers read per frame lives here:
/// the timeline window and compression curve, ability filtering, the recast
/// threshold, countdown highlighting and grid segments.
///
/// Invalid values (non-positive window or compression, zero capacity, ...) are
/// rejected when the config is loaded or imported, never during a frame.
///
/// Two text formats exist for sharing:
///   * the whole config as base64(deflate(JSON)), same shape as the on-disk data
///   * the filter list alone as `Name[id]|id|Name[id]|id|...`
use crate::position::Orientation;
use anyhow::Result;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use flate2::{read::DeflateDecoder, write::DeflateEncoder, Compression};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::io::{Read, Write};
use std::path::Path;
use thiserror::Error;

pub const CONFIG_FILE: &str = "config.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("timeline window must be positive, got {0}s")]
    Window(f32),
    #[error("compression exponent must be a positive finite number, got {0}")]
    Compression(f32),
    #[error("timeline capacity must be at least 1")]
    Capacity,
    #[error("recast threshold must not be negative, got {0}s")]
    RecastThreshold(f32),
    #[error("highlight threshold must not be negative, got {0}s")]
    HighlightThreshold(f32),
    #[error("grid segment must not be negative, got {0}s")]
    GridSegment(f32),
    #[error("config parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("import string is not valid: {0}")]
    Import(String),
}

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// How far ahead the timeline reaches, seconds.
    pub timeline_window_secs: f32,
    /// Power-law exponent of the axis; below 1 icons slow down near "ready".
    pub compression:          f32,
    pub orientation:          Orientation,
    /// Draw entries closest to ready first (so later ones overlap them).
    pub reverse_draw_order:   bool,
    /// Fill the timeline with a fixed script for positioning the window.
    pub preview:              bool,
    /// Maximum number of tracked entries.
    pub capacity:             usize,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            timeline_window_secs: 120.0,
            compression:          0.3,
            orientation:          Orientation::default(),
            reverse_draw_order:   false,
            preview:              false,
            capacity:             50,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterMode {
    #[default]
    Off,
    /// Listed abilities are never tracked.
    Deny,
    /// Only listed abilities are tracked.
    Allow,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AbilitiesConfig {
    pub ignore_below_enabled: bool,
    /// Abilities whose recast is at or below this many seconds are skipped.
    pub ignore_below_secs:    f32,
    pub filter_mode:          FilterMode,
    /// `"Name[id]"` → id; the key keeps the list readable and sorted.
    pub filtered_abilities:   BTreeMap<String, u32>,
}

impl Default for AbilitiesConfig {
    fn default() -> Self {
        Self {
            ignore_below_enabled: true,
            ignore_below_secs:    2.5,
            filter_mode:          FilterMode::Off,
            filtered_abilities:   BTreeMap::new(),
        }
    }
}

impl AbilitiesConfig {
    pub fn filter_key(name: &str, ability_id: u32) -> String {
        format!("{}[{}]", name, ability_id)
    }

    /// Add an ability to the filter list. Returns false if it was already listed.
    pub fn add_filtered(&mut self, name: &str, ability_id: u32) -> bool {
        let key = Self::filter_key(name, ability_id);
        if self.filtered_abilities.contains_key(&key) {
            return false;
        }
        self.filtered_abilities.insert(key, ability_id);
        true
    }

    pub fn filtered_ids(&self) -> HashSet<u32> {
        self.filtered_abilities.values().copied().collect()
    }

    pub fn export_filter_list(&self) -> String {
        self.filtered_abilities
            .iter()
            .map(|(key, id)| format!("{}|{}|", key, id))
            .collect()
    }

    /// Replace the filter list from an export string. On error the current
    /// list is left untouched. A trailing key without an id is ignored.
    pub fn import_filter_list(&mut self, raw: &str) -> Result<(), ConfigError> {
        let parts: Vec<&str> = raw.trim().split('|').filter(|p| !p.is_empty()).collect();
        let mut list = BTreeMap::new();
        for pair in parts.chunks_exact(2) {
            let id: u32 = pair[1]
                .trim()
                .parse()
                .map_err(|_| ConfigError::Import(format!("bad ability id '{}'", pair[1])))?;
            list.insert(pair[0].to_owned(), id);
        }
        self.filtered_abilities = list;
        Ok(())
    }
}

/// How countdown text is rounded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoundingMode {
    Truncate,
    Floor,
    #[default]
    Ceiling,
    Round,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CooldownConfig {
    /// Highlight entries this close to ready.
    pub threshold_enabled: bool,
    pub threshold_secs:    f32,
    pub rounding:          RoundingMode,
    /// `1:30` / `5m` / `1h` instead of raw seconds.
    pub show_as_minutes:   bool,
}

impl Default for CooldownConfig {
    fn default() -> Self {
        Self {
            threshold_enabled: true,
            threshold_secs:    5.0,
            rounding:          RoundingMode::default(),
            show_as_minutes:   true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    pub show:     bool,
    /// Grid marks, seconds remaining.
    pub segments: Vec<f32>,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self { show: true, segments: vec![10.0, 30.0, 60.0, 120.0] }
    }
}

// ---------------------------------------------------------------------------
// TimelineConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimelineConfig {
    pub general:   GeneralConfig,
    pub abilities: AbilitiesConfig,
    pub cooldown:  CooldownConfig,
    pub grid:      GridConfig,
}

impl TimelineConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let g = &self.general;
        if !(g.timeline_window_secs > 0.0) || !g.timeline_window_secs.is_finite() {
            return Err(ConfigError::Window(g.timeline_window_secs));
        }
        if !(g.compression > 0.0) || !g.compression.is_finite() {
            return Err(ConfigError::Compression(g.compression));
        }
        if g.capacity == 0 {
            return Err(ConfigError::Capacity);
        }
        if self.abilities.ignore_below_secs < 0.0 {
            return Err(ConfigError::RecastThreshold(self.abilities.ignore_below_secs));
        }
        if self.cooldown.threshold_secs < 0.0 {
            return Err(ConfigError::HighlightThreshold(self.cooldown.threshold_secs));
        }
        if let Some(&s) = self.grid.segments.iter().find(|s| **s < 0.0) {
            return Err(ConfigError::GridSegment(s));
        }
        Ok(())
    }

    pub fn from_toml(raw: &str) -> Result<Self, ConfigError> {
        let cfg: TimelineConfig = toml::from_str(raw)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// base64(deflate(JSON)) export string.
    pub fn export_string(&self) -> Result<String> {
        let json = serde_json::to_vec(self)?;
        let mut encoder = DeflateEncoder::new(Vec::new(), Compression::best());
        encoder.write_all(&json)?;
        Ok(BASE64.encode(encoder.finish()?))
    }

    pub fn import_string(raw: &str) -> Result<Self, ConfigError> {
        let bytes = BASE64
            .decode(raw.trim())
            .map_err(|e| ConfigError::Import(e.to_string()))?;
        let mut json = String::new();
        DeflateDecoder::new(bytes.as_slice())
            .read_to_string(&mut json)
            .map_err(|e| ConfigError::Import(e.to_string()))?;
        let cfg: TimelineConfig =
            serde_json::from_str(&json).map_err(|e| ConfigError::Import(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }
}

// ---------------------------------------------------------------------------
// Load / save
// ---------------------------------------------------------------------------

pub fn load_file(path: &Path) -> Result<TimelineConfig> {
    let raw = std::fs::read_to_string(path)?;
    let cfg = TimelineConfig::from_toml(&raw)
        .map_err(|e| anyhow::anyhow!("{}: {}", path.display(), e))?;
    tracing::info!("Loaded config from {:?}", path);
    Ok(cfg)
}

pub fn load_or_default(config_dir: &Path) -> Result<TimelineConfig> {
    let path = config_dir.join(CONFIG_FILE);
    if path.exists() {
        load_file(&path)
    } else {
        tracing::info!("No config at {:?}, using defaults", path);
        Ok(TimelineConfig::default())
    }
}

pub fn save(config: &TimelineConfig, config_dir: &Path) -> Result<()> {
    config.validate()?;
    std::fs::create_dir_all(config_dir)?;
    let raw = toml::to_string_pretty(config)
        .map_err(|e| anyhow::anyhow!("Config serialize error: {}", e))?;
    std::fs::write(config_dir.join(CONFIG_FILE), raw)?;
    Ok(())
}
