//! `cooldown-timeline` command line.
//!
//! `replay` drives the timeline engine from a recorded event journal against a
//! simulated game, printing the placements a renderer would draw after every
//! event. The config subcommands check, export and import settings files.

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use cooldown_timeline_lib::{
    ability_rules::AbilityRules,
    config::{self, TimelineConfig},
    engine::TimelineEngine,
    events::{self, GameEvent},
    sim::SimulatedGame,
    snapshot::{grid_marks, TimelineSnapshot},
};

// ---------------------------------------------------------------------------
// CLI arguments
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(name = "cooldown-timeline")]
#[command(about = "Cooldown timeline engine tools")]
#[command(version)]
struct Cli {
    /// Write logs to a daily rolling file in this directory instead of stderr
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Replay an event journal against an ability fixture
    Replay(ReplayArgs),
    /// Validate a config file
    CheckConfig {
        path: PathBuf,
    },
    /// Print the shareable export string of a config file
    ExportConfig {
        path: PathBuf,
    },
    /// Decode an export string and save it as config.toml in a directory
    ImportConfig {
        string: String,
        #[arg(long)]
        out_dir: PathBuf,
    },
}

#[derive(clap::Args, Debug)]
struct ReplayArgs {
    /// Ability fixture (TOML)
    #[arg(long)]
    fixture: PathBuf,

    /// Event journal (JSON lines)
    #[arg(long)]
    events: PathBuf,

    /// Timeline config (defaults when omitted)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Ability rules table (built-in table when omitted)
    #[arg(long)]
    rules: Option<PathBuf>,

    /// Actor id of the tracked player
    #[arg(long, default_value_t = 1)]
    actor: u64,

    /// Frame interval for maintenance ticks, milliseconds
    #[arg(long, default_value_t = 16)]
    frame_ms: u64,

    /// Timeline axis length in pixels
    #[arg(long, default_value_t = 600.0)]
    axis: f32,

    /// Keep ticking after the last event until the timeline is empty
    #[arg(long)]
    drain: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let _guard = cooldown_timeline_lib::init_tracing(cli.log_dir.as_deref())?;

    match cli.command {
        Command::Replay(args) => replay(&args),
        Command::CheckConfig { path } => {
            config::load_file(&path)?;
            println!("{}: ok", path.display());
            Ok(())
        }
        Command::ExportConfig { path } => {
            let cfg = config::load_file(&path)?;
            println!("{}", cfg.export_string()?);
            Ok(())
        }
        Command::ImportConfig { string, out_dir } => {
            let cfg = TimelineConfig::import_string(&string)?;
            config::save(&cfg, &out_dir)?;
            println!("Saved {}", out_dir.join(config::CONFIG_FILE).display());
            Ok(())
        }
    }
}

// ---------------------------------------------------------------------------
// Replay
// ---------------------------------------------------------------------------

fn replay(args: &ReplayArgs) -> Result<()> {
    let mut game = SimulatedGame::load(&args.fixture)?;
    let config = match &args.config {
        Some(path) => config::load_file(path)?,
        None => TimelineConfig::default(),
    };
    let rules = match &args.rules {
        Some(path) => AbilityRules::load(path)?,
        None => AbilityRules::builtin(),
    };
    let journal = read_journal(&args.events)?;

    let mut engine = TimelineEngine::new(rules, config.clone())?;
    engine.set_tracked_actor(Some(args.actor));

    let frame = args.frame_ms.max(1);
    let mut now = 0u64;
    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    if config.grid.show {
        let marks: Vec<String> = grid_marks(args.axis, &config)
            .iter()
            .map(|(secs, offset)| format!("{}s@{:.0}", secs, offset))
            .collect();
        writeln!(out, "grid   {}", marks.join(" "))?;
    }

    for entry in &journal {
        while now + frame <= entry.t_ms {
            now += frame;
            game.set_time(now);
            engine.tick(&game, now);
        }
        now = entry.t_ms;
        game.set_time(now);

        // The journal records what the player did; mirror it into the
        // simulated recast state before the engine queries it.
        if let GameEvent::ActionUsed { actor_id, ability_id } = entry.event {
            if actor_id == args.actor && !game.use_ability(ability_id) {
                tracing::warn!("t={}ms: ability {} used with no charge ready", now, ability_id);
            }
        }
        engine.handle_event(&game, &entry.event, now);
        engine.tick(&game, now);

        print_frame(&mut out, &engine.snapshot(now), now, args.axis, &config)?;
    }

    if args.drain && !config.general.preview {
        while !engine.entries().is_empty() {
            now += frame;
            game.set_time(now);
            engine.tick(&game, now);
        }
        writeln!(out, "{:>9.3}s  timeline empty", now as f64 / 1_000.0)?;
    }
    Ok(())
}

fn read_journal(path: &Path) -> Result<Vec<events::JournalEntry>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Cannot read journal {:?}", path))?;
    let journal = events::read_journal(&text)
        .with_context(|| format!("Bad journal {:?}", path))?;
    tracing::info!("Replaying {} events from {:?}", journal.len(), path);
    Ok(journal)
}

fn print_frame(
    out:      &mut impl Write,
    snapshot: &TimelineSnapshot,
    now_ms:   u64,
    axis:     f32,
    config:   &TimelineConfig,
) -> Result<()> {
    let icons: Vec<String> = snapshot
        .placements(now_ms, axis, config)
        .iter()
        .map(|p| {
            let mark = if p.highlighted { "*" } else { "" };
            format!("{}{}@{:.0}[{}]", mark, p.ability_id, p.offset, p.label)
        })
        .collect();
    writeln!(out, "{:>9.3}s  {}", now_ms as f64 / 1_000.0, icons.join(" "))?;
    Ok(())
}
