/// Timeline engine: the cooldown tracking state machine.
///
/// Ingests ability use / cast / cancel / reset signals for the tracked actor,
/// resolves per-ability quirks through `AbilityRules`, and keeps a bounded
/// list of entries whose charges recover on the per-frame `tick`.
///
/// Entry lifecycle:
///   created   → first qualifying use (after filters and the recast threshold)
///   decrement → repeat use of a multi-charge ability while tracked
///   recover   → `tick` once a full charge period has passed, one entry per frame
///   removed   → fully recovered and due again, restored by another ability,
///               evicted at capacity, or cleared by a full reset
///
/// The engine is single-threaded. When events arrive from another thread the
/// `run` task owns the engine and serialises events, config updates and frame
/// ticks through one `select!` loop; readers get copies through a watch channel.
use crate::{
    ability_rules::AbilityRules,
    catalog::{self, AbilityCatalog},
    config::{ConfigError, FilterMode, TimelineConfig},
    events::GameEvent,
    recast::{adjusted_recast, RecastOracle},
    snapshot::TimelineSnapshot,
    status::{StatusFlags, StatusOracle},
};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;
use tokio::sync::{mpsc::Receiver, watch};

/// Cooldowns are stored in tenths of a second.
pub const COOLDOWN_UNITS_PER_SEC: f32 = 10.0;

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntryKind {
    Instant,
    CastStart,
    CastCanceled,
    OffCooldownAbility,
    AutoAttack,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineEntry {
    /// Canonical id after alias resolution.
    pub ability_id:     u32,
    pub icon_id:        u32,
    pub kind:           EntryKind,
    /// Creation time, or the time the last charge came back.
    pub activation_ms:  u64,
    /// Seconds; 0 when the action is not on the GCD.
    pub gcd_duration:   f32,
    /// Seconds; 0 for instants.
    pub cast_duration:  f32,
    /// Tenths of a second, see `COOLDOWN_UNITS_PER_SEC`.
    pub cooldown_total: f32,
    /// Charges that were ready when the entry was captured.
    pub max_charges:    u16,
    pub active_charges: u16,
    /// Insertion order, assigned by the engine; eviction drops the lowest.
    #[serde(default)]
    pub seq:            u64,
}

impl TimelineEntry {
    pub fn cooldown_secs(&self) -> f32 {
        self.cooldown_total / COOLDOWN_UNITS_PER_SEC
    }

    pub fn cooldown_ms(&self) -> u64 {
        (f64::from(self.cooldown_total) * 100.0).round() as u64
    }

    pub fn elapsed_secs(&self, now_ms: u64) -> f32 {
        now_ms.saturating_sub(self.activation_ms) as f32 / 1_000.0
    }

    /// A full cooldown period has passed since activation.
    pub fn is_due(&self, now_ms: u64) -> bool {
        now_ms.saturating_sub(self.activation_ms) >= self.cooldown_ms()
    }
}

/// Everything the engine reads from the host.
pub trait GameView: AbilityCatalog + RecastOracle + StatusOracle {}
impl<T: AbilityCatalog + RecastOracle + StatusOracle + ?Sized> GameView for T {}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// GCD and cast time captured at cast start, reused when the cast completes.
#[derive(Debug, Clone, Copy, PartialEq)]
struct PendingCast {
    ability_id:    u32,
    gcd_duration:  f32,
    cast_duration: f32,
}

pub struct TimelineEngine {
    entries:        Vec<TimelineEntry>,
    rules:          AbilityRules,
    config:         TimelineConfig,
    filtered_ids:   HashSet<u32>,
    tracked_actor:  Option<u64>,
    statuses:       StatusFlags,
    pending_cast:   Option<PendingCast>,
    preview_active: bool,
    next_seq:       u64,
}

impl TimelineEngine {
    pub fn new(rules: AbilityRules, config: TimelineConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let filtered_ids = config.abilities.filtered_ids();
        Ok(Self {
            entries: Vec::with_capacity(config.general.capacity),
            rules,
            config,
            filtered_ids,
            tracked_actor: None,
            statuses: StatusFlags::default(),
            pending_cast: None,
            preview_active: false,
            next_seq: 0,
        })
    }

    pub fn entries(&self) -> &[TimelineEntry] {
        &self.entries
    }

    pub fn config(&self) -> &TimelineConfig {
        &self.config
    }

    pub fn rules(&self) -> &AbilityRules {
        &self.rules
    }

    pub fn snapshot(&self, now_ms: u64) -> TimelineSnapshot {
        TimelineSnapshot { captured_ms: now_ms, entries: self.entries.clone() }
    }

    /// The local player; events from any other actor are ignored.
    pub fn set_tracked_actor(&mut self, actor_id: Option<u64>) {
        if self.tracked_actor != actor_id {
            tracing::info!("Tracked actor → {:?}", actor_id);
        }
        self.tracked_actor = actor_id;
    }

    /// Swap in a new config. Invalid configs are rejected and the current one
    /// stays. Shrinking capacity drops the oldest entries.
    pub fn apply_config(&mut self, config: TimelineConfig) -> Result<(), ConfigError> {
        config.validate()?;
        self.filtered_ids = config.abilities.filtered_ids();
        self.config = config;
        while self.entries.len() > self.config.general.capacity {
            if self.evict_oldest().is_none() {
                break;
            }
        }
        Ok(())
    }

    /// Clear every entry (wipe / fade-out).
    pub fn reset(&mut self) {
        if !self.entries.is_empty() {
            tracing::info!("Full reset — clearing {} timeline entries", self.entries.len());
        }
        self.entries.clear();
        self.pending_cast = None;
    }

    // -----------------------------------------------------------------------
    // Ingestion
    // -----------------------------------------------------------------------

    /// Route a raw host event.
    pub fn handle_event<G: GameView + ?Sized>(&mut self, game: &G, event: &GameEvent, now_ms: u64) {
        match *event {
            GameEvent::ActionUsed { actor_id, ability_id } => {
                let tracked = self.is_tracked(actor_id);
                if let Some(info) = game.lookup(ability_id) {
                    let kind = catalog::classify(ability_id, &info, &self.rules);
                    self.ingest(game, ability_id, kind, tracked, now_ms);
                }
                // A completed action ends whatever cast was in flight, even
                // when it was filtered or merged and never reached cast timing.
                if tracked {
                    self.pending_cast = None;
                }
            }
            GameEvent::CastStarted { actor_id, ability_id } => {
                let tracked = self.is_tracked(actor_id);
                self.ingest(game, ability_id, EntryKind::CastStart, tracked, now_ms);
            }
            GameEvent::CastCanceled { actor_id, ability_id } => {
                let tracked = self.is_tracked(actor_id);
                let id = self.rules.resolve_alias(ability_id);
                if tracked && self.pending_cast.is_some_and(|p| p.ability_id == id) {
                    self.pending_cast = None;
                }
                self.ingest(game, ability_id, EntryKind::CastCanceled, tracked, now_ms);
            }
            GameEvent::FullReset { .. } => self.reset(),
        }
    }

    fn is_tracked(&self, actor_id: u64) -> bool {
        self.tracked_actor == Some(actor_id)
    }

    /// Process one ability signal.
    pub fn ingest<G: GameView + ?Sized>(
        &mut self,
        game:          &G,
        ability_id:    u32,
        kind:          EntryKind,
        actor_matches: bool,
        now_ms:        u64,
    ) {
        if !actor_matches {
            return;
        }

        // Shared charge pools are tracked under one id; the rename also
        // collapses the signal to a plain action.
        let mut kind = kind;
        let id = self.rules.resolve_alias(ability_id);
        if self.rules.is_aliased(ability_id) {
            kind = EntryKind::Instant;
        }

        let restored = self.rules.charge_restorer(id).to_vec();
        if !restored.is_empty() {
            let before = self.entries.len();
            self.entries.retain(|e| !restored.contains(&e.ability_id));
            if self.entries.len() != before {
                tracing::debug!("Ability {} restored charges of {:?}", id, restored);
            }
        }

        let resync = self.rules.resync_on_use(id).to_vec();
        if !resync.is_empty() {
            self.resync_entries(game, &resync, now_ms);
        }

        if self.rules.is_suppressed_follow_up(id, &self.statuses) {
            tracing::debug!("Ability {} suppressed as a follow-up", id);
            return;
        }

        if kind == EntryKind::CastStart {
            self.pending_cast = Some(PendingCast {
                ability_id:    id,
                gcd_duration:  game.gcd_time(id),
                cast_duration: game.cast_time(id),
            });
        }

        let Some(info) = game.lookup(id) else {
            return;
        };
        let recast = adjusted_recast(game, id);
        let cooldown_total = recast.remainder_within_charge() * COOLDOWN_UNITS_PER_SEC;

        if self.is_filtered(id) {
            tracing::debug!("Ability {} filtered out", id);
            return;
        }
        let abilities = &self.config.abilities;
        if abilities.ignore_below_enabled
            && cooldown_total / COOLDOWN_UNITS_PER_SEC <= abilities.ignore_below_secs
        {
            return;
        }

        if let Some(existing) = self.entries.iter_mut().find(|e| e.ability_id == id) {
            if recast.max_charges > 1 {
                existing.active_charges = existing.active_charges.saturating_sub(1);
                tracing::debug!(
                    "Ability {} charge used, {} left",
                    id, existing.active_charges
                );
            }
            return;
        }

        let (kind, gcd_duration, cast_duration) = self.cast_timing(game, id, kind);
        let icon_id = self.rules.icon_override(id).unwrap_or(info.icon);
        let charges = recast.ready_charges();

        self.push(TimelineEntry {
            ability_id: id,
            icon_id,
            kind,
            activation_ms: now_ms,
            gcd_duration,
            cast_duration,
            cooldown_total,
            max_charges: charges,
            active_charges: charges,
            seq: 0,
        });
    }

    fn is_filtered(&self, ability_id: u32) -> bool {
        let listed = self.filtered_ids.contains(&ability_id);
        match self.config.abilities.filter_mode {
            FilterMode::Off   => false,
            FilterMode::Deny  => listed,
            FilterMode::Allow => !listed,
        }
    }

    /// Kind, GCD length and cast time for a new entry.
    fn cast_timing<G: GameView + ?Sized>(
        &mut self,
        game: &G,
        id:   u32,
        kind: EntryKind,
    ) -> (EntryKind, f32, f32) {
        let (mut kind, mut gcd, cast) = match kind {
            EntryKind::CastStart => (kind, game.gcd_time(id), game.cast_time(id)),
            EntryKind::Instant => match self.pending_cast.take() {
                Some(p) if p.ability_id == id => (kind, p.gcd_duration, p.cast_duration),
                _ => {
                    let cast = if self.rules.has_instant_cast(&self.statuses) {
                        0.0
                    } else {
                        game.cast_time(id)
                    };
                    (kind, game.gcd_time(id), cast)
                }
            },
            _ => (kind, 0.0, 0.0),
        };

        if let Some(fixed) = self.rules.fixed_duration(id) {
            kind = EntryKind::Instant;
            gcd = fixed;
        }
        (kind, gcd, cast)
    }

    fn push(&mut self, mut entry: TimelineEntry) {
        let capacity = self.config.general.capacity;
        if capacity == 0 {
            return;
        }
        while self.entries.len() >= capacity {
            let Some(evicted) = self.evict_oldest() else {
                break;
            };
            tracing::debug!("Timeline full, evicted ability {}", evicted.ability_id);
        }
        entry.seq = self.next_seq;
        self.next_seq += 1;
        self.entries.push(entry);
        self.entries
            .sort_by(|a, b| a.cooldown_total.total_cmp(&b.cooldown_total));
    }

    /// Remove the earliest-inserted entry, whatever its place in the sort.
    fn evict_oldest(&mut self) -> Option<TimelineEntry> {
        let idx = self
            .entries
            .iter()
            .enumerate()
            .min_by_key(|(_, e)| e.seq)
            .map(|(i, _)| i)?;
        Some(self.entries.remove(idx))
    }

    /// Overwrite charges and activation of tracked `targets` from the oracle.
    fn resync_entries<G: GameView + ?Sized>(&mut self, game: &G, targets: &[u32], now_ms: u64) {
        for entry in self.entries.iter_mut().filter(|e| targets.contains(&e.ability_id)) {
            let recast = adjusted_recast(game, entry.ability_id);
            let progress_ms = (f64::from(recast.progress_within_charge()) * 1_000.0).round() as u64;
            entry.active_charges = recast.ready_charges().min(entry.max_charges);
            entry.activation_ms = now_ms.saturating_sub(progress_ms);
        }
    }

    // -----------------------------------------------------------------------
    // Preview
    // -----------------------------------------------------------------------

    /// Toggle preview mode. Entering fills the timeline from the rules'
    /// preview script; leaving clears it.
    pub fn set_preview<G: GameView + ?Sized>(&mut self, game: &G, enabled: bool, now_ms: u64) {
        if enabled == self.preview_active {
            return;
        }
        self.preview_active = enabled;
        self.entries.clear();
        if !enabled {
            return;
        }

        let script = self.rules.preview_script().to_vec();
        for (ability_id, kind) in script {
            let id = self.rules.resolve_alias(ability_id);
            if self.entries.iter().any(|e| e.ability_id == id) {
                continue;
            }
            let Some(info) = game.lookup(id) else {
                continue;
            };
            let charges = adjusted_recast(game, id).ready_charges();
            let icon_id = self.rules.icon_override(id).unwrap_or(info.icon);
            self.push(TimelineEntry {
                ability_id: id,
                icon_id,
                kind,
                activation_ms: now_ms,
                gcd_duration: 0.0,
                cast_duration: 0.0,
                cooldown_total: info.base_recast_secs * COOLDOWN_UNITS_PER_SEC,
                max_charges: charges,
                active_charges: charges,
                seq: 0,
            });
        }
        tracing::info!("Preview on — {} entries", self.entries.len());
    }

    pub fn is_preview_active(&self) -> bool {
        self.preview_active
    }

    // -----------------------------------------------------------------------
    // Maintenance
    // -----------------------------------------------------------------------

    /// Per-frame maintenance: refresh statuses, follow the preview toggle,
    /// apply status-driven resyncs, then recover at most one charge.
    pub fn tick<G: GameView + ?Sized>(&mut self, game: &G, now_ms: u64) {
        self.statuses = StatusFlags::from_statuses(game.active_statuses());

        let preview = self.config.general.preview;
        self.set_preview(game, preview, now_ms);

        let targets: Vec<u32> = self
            .rules
            .active_status_resyncs(&self.statuses)
            .flatten()
            .copied()
            .collect();
        if !targets.is_empty() {
            self.resync_entries(game, &targets, now_ms);
        }

        self.recover(now_ms);
    }

    /// Walk due entries in order: drop fully recovered ones, and stop at the
    /// first that still has a charge to recover.
    fn recover(&mut self, now_ms: u64) {
        let mut i = 0;
        while i < self.entries.len() {
            let entry = &mut self.entries[i];
            if !entry.is_due(now_ms) {
                i += 1;
                continue;
            }
            if entry.active_charges < entry.max_charges {
                entry.active_charges += 1;
                entry.activation_ms = now_ms;
                return;
            }
            let removed = self.entries.remove(i);
            tracing::debug!("Ability {} off cooldown", removed.ability_id);
        }
    }
}

// ---------------------------------------------------------------------------
// Engine task
// ---------------------------------------------------------------------------

/// Own the engine on one task. Events and config updates are applied in
/// arrival order, a tick runs every `frame`, and a fresh snapshot is
/// published after each. Returns when the event channel closes.
pub async fn run<G: GameView>(
    mut engine:     TimelineEngine,
    game:           G,
    mut event_rx:   Receiver<GameEvent>,
    mut config_rx:  Receiver<TimelineConfig>,
    snapshot_tx:    watch::Sender<TimelineSnapshot>,
    frame:          Duration,
) -> Result<()> {
    let started = tokio::time::Instant::now();
    let now_ms = || started.elapsed().as_millis() as u64;
    let mut frames = tokio::time::interval(frame);
    frames.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    tracing::info!("Timeline engine started (frame {:?})", frame);

    loop {
        tokio::select! {
            event = event_rx.recv() => {
                let Some(event) = event else { break };
                engine.handle_event(&game, &event, now_ms());
            }

            Some(config) = config_rx.recv() => {
                match engine.apply_config(config) {
                    Ok(()) => tracing::info!("Timeline config updated"),
                    Err(e) => tracing::warn!("Rejected timeline config: {}", e),
                }
            }

            _ = frames.tick() => {
                engine.tick(&game, now_ms());
            }
        }

        // Readers only ever see whole snapshots; nobody listening is fine.
        let _ = snapshot_tx.send(engine.snapshot(now_ms()));
    }

    tracing::info!("Event source closed — timeline engine stopped");
    Ok(())
}
