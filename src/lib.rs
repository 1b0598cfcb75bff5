pub mod ability_rules;
pub mod catalog;
pub mod config;
pub mod engine;
pub mod events;
pub mod position;
pub mod recast;
pub mod sim;
pub mod snapshot;
pub mod status;

use anyhow::Result;
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;

/// Install the global subscriber and the panic hook.
///
/// With `log_dir` set, logs go to a daily rolling `timeline.log` there;
/// otherwise to stderr. `RUST_LOG` adds to the default
/// `cooldown_timeline_lib=info` directive. Keep the returned guard alive for
/// the life of the process; dropping it flushes and stops the writer.
pub fn init_tracing(log_dir: Option<&Path>) -> Result<WorkerGuard> {
    let (writer, guard) = match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)?;
            tracing_appender::non_blocking(tracing_appender::rolling::daily(dir, "timeline.log"))
        }
        None => tracing_appender::non_blocking(std::io::stderr()),
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("cooldown_timeline_lib=info".parse()?),
        )
        .with_writer(writer)
        .with_ansi(log_dir.is_none()) // log files should not contain ANSI colour codes
        .try_init()
        .map_err(|e| anyhow::anyhow!("Tracing init failed: {}", e))?;

    // -----------------------------------------------------------------------
    // Panic hook: log panics through tracing before the process dies.
    // -----------------------------------------------------------------------
    std::panic::set_hook(Box::new(|info| {
        let location = info
            .location()
            .map(|l| format!("{}:{}", l.file(), l.line()))
            .unwrap_or_else(|| "unknown location".to_string());
        let message = if let Some(s) = info.payload().downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = info.payload().downcast_ref::<String>() {
            s.clone()
        } else {
            "non-string panic payload".to_string()
        };
        tracing::error!("PANIC at {}: {}", location, message);
    }));

    match log_dir {
        Some(dir) => tracing::info!("Cooldown timeline starting — logs → {}", dir.display()),
        None => tracing::debug!("Cooldown timeline starting"),
    }
    Ok(guard)
}
