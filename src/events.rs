/// Input events and the replay journal format.
///
/// The host delivers `GameEvent`s straight from its hooks. For offline replay
/// the same events are stored one per line as JSON with a timestamp:
///
///   {"t_ms": 1200, "type": "ActionUsed",   "actor_id": 1, "ability_id": 7531}
///   {"t_ms": 1800, "type": "CastStarted",  "actor_id": 1, "ability_id": 3577}
///   {"t_ms": 4300, "type": "CastCanceled", "actor_id": 1, "ability_id": 3577}
///   {"t_ms": 9000, "type": "FullReset",    "actor_id": 1}
///
/// Blank lines and lines starting with `#` are skipped.
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum GameEvent {
    /// An action finished executing (instant, off-GCD or cast completion).
    ActionUsed   { actor_id: u64, ability_id: u32 },
    CastStarted  { actor_id: u64, ability_id: u32 },
    CastCanceled { actor_id: u64, ability_id: u32 },
    /// Wipe, duty reset or fade-out; clears the whole timeline.
    FullReset    { actor_id: u64 },
}

impl GameEvent {
    pub fn actor_id(&self) -> u64 {
        match *self {
            GameEvent::ActionUsed { actor_id, .. }
            | GameEvent::CastStarted { actor_id, .. }
            | GameEvent::CastCanceled { actor_id, .. }
            | GameEvent::FullReset { actor_id } => actor_id,
        }
    }

    pub fn ability_id(&self) -> Option<u32> {
        match *self {
            GameEvent::ActionUsed { ability_id, .. }
            | GameEvent::CastStarted { ability_id, .. }
            | GameEvent::CastCanceled { ability_id, .. } => Some(ability_id),
            GameEvent::FullReset { .. } => None,
        }
    }
}

/// One timestamped journal line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEntry {
    pub t_ms:  u64,
    #[serde(flatten)]
    pub event: GameEvent,
}

#[derive(Debug, Error)]
pub enum JournalError {
    #[error("line {line}: {source}")]
    Json {
        line:   usize,
        #[source]
        source: serde_json::Error,
    },
    #[error("line {line}: timestamp {t_ms} goes backwards (previous {previous})")]
    OutOfOrder { line: usize, t_ms: u64, previous: u64 },
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

/// Parse one journal line. `Ok(None)` for blank and comment lines.
pub fn parse_line(raw: &str) -> Result<Option<JournalEntry>, serde_json::Error> {
    let line = raw.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }
    serde_json::from_str(line).map(Some)
}

/// Parse a whole journal. Any malformed line fails the read; entries must be
/// in non-decreasing time order.
pub fn read_journal(text: &str) -> Result<Vec<JournalEntry>, JournalError> {
    let mut out = Vec::new();
    let mut previous = 0u64;

    for (idx, raw) in text.lines().enumerate() {
        let line = idx + 1;
        let Some(entry) = parse_line(raw).map_err(|source| JournalError::Json { line, source })? else {
            continue;
        };
        if entry.t_ms < previous {
            return Err(JournalError::OutOfOrder { line, t_ms: entry.t_ms, previous });
        }
        previous = entry.t_ms;
        out.push(entry);
    }

    tracing::debug!("Journal: {} events", out.len());
    Ok(out)
}
