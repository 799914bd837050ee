//! Logging setup with journald support on Linux.
//!
//! The CLI tries systemd-journald first and falls back to a daily rolling
//! file. The purge command falls back to stderr so the operator sees what
//! was removed.

use anyhow::{Context, Result};
use std::path::PathBuf;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Where log output goes when journald is not available.
#[derive(Debug, Clone)]
pub enum Fallback {
    /// Daily rolling file in the given directory (data dir when `None`).
    File(Option<PathBuf>),
    Stderr,
}

/// Initialize the logging system.
///
/// Log level is read from `PICCAT_LOG` (e.g. `PICCAT_LOG=debug`), defaulting
/// to `info`.
pub fn init(fallback: Fallback) -> Result<()> {
    let env_filter = EnvFilter::try_from_env("PICCAT_LOG")
        .unwrap_or_else(|_| EnvFilter::new("info"));

    #[cfg(target_os = "linux")]
    {
        if let Ok(journald_layer) = tracing_journald::layer() {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(journald_layer)
                .try_init()
                .context("Failed to set tracing subscriber")?;

            tracing::info!("Logging initialized with journald backend");
            return Ok(());
        }
    }

    match fallback {
        Fallback::Stderr => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().with_writer(std::io::stderr))
                .try_init()
                .context("Failed to set tracing subscriber")?;
        }
        Fallback::File(log_dir) => {
            let log_dir = log_dir.unwrap_or_else(|| {
                dirs::data_local_dir()
                    .unwrap_or_else(|| PathBuf::from("."))
                    .join("piccat")
                    .join("logs")
            });

            std::fs::create_dir_all(&log_dir)?;

            let file_appender = tracing_appender::rolling::daily(&log_dir, "piccat.log");
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

            // Dropping the guard stops the writer thread, so it lives for the process.
            static GUARD: std::sync::OnceLock<tracing_appender::non_blocking::WorkerGuard> =
                std::sync::OnceLock::new();
            let _ = GUARD.set(guard);

            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
                .try_init()
                .context("Failed to set tracing subscriber")?;

            tracing::info!("Logging initialized with file backend at {:?}", log_dir);
        }
    }

    Ok(())
}
