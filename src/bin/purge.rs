//! Maintenance command that removes records pending deletion.
//!
//! Every record with a negative fav is listed and, after confirmation, its
//! catalog and stats rows are deleted. Unless `--data-only` is given (or
//! `maintenance.purge_data_only` is set) the record's directory is deleted
//! from disk as well.
//!
//! ## Usage
//!
//! ```bash
//! piccat-purge                # Ask, then remove rows and directories
//! piccat-purge --data-only    # Ask, then remove rows only
//! piccat-purge --yes          # Do not ask
//! ```

use anyhow::{Context, Result};
use std::path::PathBuf;
use tracing::info;

use piccat::config::Config;
use piccat::logging::{self, Fallback};
use piccat::purge::{PurgeMode, PurgeOutcome};
use piccat::Library;

/// Exit status when the operator declines.
const EXIT_ABORTED: i32 = 9;

#[derive(Default)]
struct PurgeArgs {
    data_only: bool,
    assume_yes: bool,
    config_path: Option<PathBuf>,
}

fn main() -> Result<()> {
    let args = parse_args();

    logging::init(Fallback::Stderr)?;

    let config = match &args.config_path {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    let library = Library::open(&config)
        .with_context(|| format!("Failed to open catalog at {}", config.db_path.display()))?;

    let mode = PurgeMode::from_data_only(args.data_only || config.maintenance.purge_data_only);
    info!(?mode, db = %config.db_path.display(), "purge starting");

    let outcome = library.purger().purge_interactive(
        mode,
        args.assume_yes,
        &mut std::io::stdin().lock(),
        &mut std::io::stdout(),
    )?;

    match outcome {
        PurgeOutcome::NothingPending => println!("Nothing to purge"),
        PurgeOutcome::Aborted => {
            println!("Aborted");
            std::process::exit(EXIT_ABORTED);
        }
        PurgeOutcome::Purged(report) => {
            for (item, reason) in &report.failed {
                eprintln!("kept id={} {}: {}", item.id, item.path, reason);
            }
            for item in &report.skipped {
                eprintln!("skipped id={} {}: no longer pending", item.id, item.path);
            }
            println!("Done ({} items removed)", report.removed.len());
        }
    }

    Ok(())
}

fn parse_args() -> PurgeArgs {
    let args: Vec<String> = std::env::args().collect();
    let mut parsed = PurgeArgs::default();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--data-only" | "-d" => {
                parsed.data_only = true;
            }
            "--yes" | "-y" => {
                parsed.assume_yes = true;
            }
            "--config" | "-c" => {
                if i + 1 < args.len() {
                    parsed.config_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                } else {
                    eprintln!("Error: --config requires a path argument");
                    std::process::exit(1);
                }
            }
            "--help" | "-h" => {
                print_help();
                std::process::exit(0);
            }
            _ => {
                eprintln!("Unknown argument: {}", args[i]);
                print_help();
                std::process::exit(1);
            }
        }
        i += 1;
    }

    parsed
}

fn print_help() {
    println!(
        r#"piccat-purge - Remove catalog records with a negative fav

USAGE:
    piccat-purge [OPTIONS]

OPTIONS:
    --data-only, -d     Remove database rows only, keep directories on disk
    --yes, -y           Do not ask for confirmation
    --config, -c PATH   Path to config file
    --help, -h          Show this help message

ENVIRONMENT:
    PICCAT_CONFIG       Path to config file (overrides default location)
    PICCAT_LOG          Log level (trace, debug, info, warn, error)

Exits with status 9 when the confirmation is declined.
"#
    );
}
