use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};
use tracing::info;

use piccat::config::Config;
use piccat::db::{
    CatalogEntry, NewRecord, Ordering, QueryContext, QueryTarget, RecordUpdate, Selection,
};
use piccat::export::{export_catalog, ExportFormat};
use piccat::library::{Library, Move};
use piccat::logging::{self, Fallback};
use piccat::purge::{PurgeMode, PurgeOutcome};

/// Exit status when the operator declines a purge.
const EXIT_ABORTED: i32 = 9;

struct Args {
    config_path: Option<PathBuf>,
    command: String,
    rest: Vec<String>,
}

fn parse_args() -> Args {
    let args: Vec<String> = std::env::args().collect();
    let mut config_path = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => {
                print_help();
                std::process::exit(0);
            }
            "--version" | "-V" => {
                println!("piccat {}", env!("CARGO_PKG_VERSION"));
                std::process::exit(0);
            }
            "--config" | "-c" => {
                if i + 1 < args.len() {
                    config_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                } else {
                    eprintln!("Error: --config requires a path argument");
                    std::process::exit(1);
                }
            }
            arg if arg.starts_with('-') => {
                eprintln!("Unknown argument: {}", arg);
                print_help();
                std::process::exit(1);
            }
            _ => {
                return Args {
                    config_path,
                    command: args[i].clone(),
                    rest: args[i + 1..].to_vec(),
                };
            }
        }
        i += 1;
    }

    print_help();
    std::process::exit(1);
}

fn print_help() {
    println!(
        r#"piccat - personal catalog of image directories

USAGE:
    piccat [OPTIONS] <COMMAND> [ARGS]

OPTIONS:
    --config, -c PATH   Path to config file
    --version, -V       Show version
    --help, -h          Show this help message

COMMANDS:
    add --path DIR [--title T] [--creator C] [--media M] [--mark K] [--info I]
                        Register a directory and compute its stats
    update ID [--path DIR] [--title T] [--creator C] [--media M] [--mark K]
              [--fav N] [--info I]
                        Edit a record
    delete ID           Remove a record and its stats (files are kept)
    show ID [--json]    Show one record
    list [--filter F] [--mark K] [--creator C] [--from ID] [--favorites]
         [--most-viewed] [--order asc|desc|title] [--catalog] [--json]
                        List records (combined view unless --catalog)
    marks               List distinct marks
    creators            List creators with record count and highest fav
    view ID [--desc]    List a record's images and count the view
    fav ID | unfav ID   Raise or lower a record's fav by one
    nav FILE [first|last|next|prev]
                        Move between images in FILE's directory
    check [--auto-delete]
                        Report records whose directory is gone
    status              Compare catalog and stats row counts
    refresh [ID]        Rebuild all stats, or recompute one record
    purge [--data-only] [--yes]
                        Remove records with a negative fav
    export FILE [--csv] [--force]
                        Write the combined view as JSON or CSV

ENVIRONMENT:
    PICCAT_CONFIG       Path to config file (overrides default location)
    PICCAT_LOG          Log level (trace, debug, info, warn, error)

Config file location: $XDG_CONFIG_HOME/piccat/config.toml

See also: piccat-purge --help"#
    );
}

/// Positional arguments and `--name [value]` options of one command.
struct CommandArgs {
    positional: Vec<String>,
    options: Vec<(String, Option<String>)>,
}

impl CommandArgs {
    /// Split `args`; names listed in `flags` take no value.
    fn parse(args: &[String], flags: &[&str]) -> Result<Self> {
        let mut positional = Vec::new();
        let mut options = Vec::new();

        let mut iter = args.iter();
        while let Some(arg) = iter.next() {
            match arg.strip_prefix("--") {
                Some(name) if flags.contains(&name) => options.push((name.to_string(), None)),
                Some(name) => {
                    let value = iter
                        .next()
                        .with_context(|| format!("--{} requires a value", name))?;
                    options.push((name.to_string(), Some(value.clone())));
                }
                None => positional.push(arg.clone()),
            }
        }

        Ok(Self { positional, options })
    }

    fn flag(&self, name: &str) -> bool {
        self.options.iter().any(|(n, _)| n == name)
    }

    fn value(&self, name: &str) -> Option<String> {
        self.options
            .iter()
            .rev()
            .find(|(n, _)| n == name)
            .and_then(|(_, v)| v.clone())
    }

    fn id(&self) -> Result<i64> {
        let raw = self.positional.first().context("missing record ID")?;
        raw.parse()
            .with_context(|| format!("invalid record ID: {}", raw))
    }
}

fn main() -> Result<()> {
    let args = parse_args();

    let _ = logging::init(Fallback::File(None));

    let config = match &args.config_path {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };

    let library = Library::open(&config)
        .with_context(|| format!("Failed to open catalog at {}", config.db_path.display()))?;

    run(&library, &config, &args.command, &args.rest)
}

fn run(library: &Library, config: &Config, command: &str, rest: &[String]) -> Result<()> {
    match command {
        "add" => cmd_add(library, rest),
        "update" => cmd_update(library, rest),
        "delete" => cmd_delete(library, rest),
        "show" => cmd_show(library, rest),
        "list" => cmd_list(library, rest),
        "marks" => {
            for mark in library.db().catalog().marks()? {
                println!("{}", mark);
            }
            Ok(())
        }
        "creators" => {
            for c in library.db().catalog().creators()? {
                println!("{:<30} {:>5} records  max fav {}", c.creator, c.records, c.max_fav);
            }
            Ok(())
        }
        "view" => cmd_view(library, rest),
        "fav" | "unfav" => {
            let id = CommandArgs::parse(rest, &[])?.id()?;
            if command == "fav" {
                library.favorite(id)?;
            } else {
                library.unfavorite(id)?;
            }
            Ok(())
        }
        "nav" => cmd_nav(library, rest),
        "check" => cmd_check(library, config, rest),
        "status" => cmd_status(library),
        "refresh" => cmd_refresh(library, rest),
        "purge" => cmd_purge(library, config, rest),
        "export" => cmd_export(library, rest),
        other => {
            eprintln!("Unknown command: {}", other);
            print_help();
            std::process::exit(1);
        }
    }
}

fn format_entry(entry: &CatalogEntry) -> String {
    let r = &entry.record;
    let mut line = format!(
        "{:>5}  fav {:>3}  {}  [{}]  {}",
        r.id, r.fav, r.title, r.creator, r.path
    );
    if let Some(stats) = entry.stats {
        line.push_str(&format!(
            "  ({} files, {} MB)",
            stats.file_count, stats.total_size_mb
        ));
    }
    line
}

fn print_entries(entries: &[CatalogEntry], json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(entries)?);
    } else {
        for entry in entries {
            println!("{}", format_entry(entry));
        }
    }
    Ok(())
}

// ============================================================================
// Commands
// ============================================================================

fn cmd_add(library: &Library, rest: &[String]) -> Result<()> {
    let args = CommandArgs::parse(rest, &[])?;
    let path = args.value("path").context("add requires --path DIR")?;

    let record = library.add_item(NewRecord {
        title: args.value("title").unwrap_or_default(),
        creator: args.value("creator").unwrap_or_default(),
        path,
        media: args.value("media").unwrap_or_default(),
        mark: args.value("mark").unwrap_or_default(),
        info: args.value("info").unwrap_or_default(),
    })?;

    let entry = library
        .db()
        .catalog()
        .get_entry(QueryTarget::Combined, record.id)?;
    match entry {
        Some(entry) => println!("Added {}", format_entry(&entry)),
        None => println!("Added id={} {}", record.id, record.path),
    }
    Ok(())
}

fn cmd_update(library: &Library, rest: &[String]) -> Result<()> {
    let args = CommandArgs::parse(rest, &[])?;
    let id = args.id()?;
    let fav = match args.value("fav") {
        Some(raw) => Some(
            raw.parse()
                .with_context(|| format!("invalid --fav value: {}", raw))?,
        ),
        None => None,
    };

    let record = library.update_item(
        id,
        RecordUpdate {
            title: args.value("title"),
            creator: args.value("creator"),
            path: args.value("path"),
            media: args.value("media"),
            mark: args.value("mark"),
            fav,
            info: args.value("info"),
        },
    )?;
    println!("Updated id={} {}", record.id, record.title);
    Ok(())
}

fn cmd_delete(library: &Library, rest: &[String]) -> Result<()> {
    let id = CommandArgs::parse(rest, &[])?.id()?;
    if !library.delete_item(id)? {
        bail!(piccat::Error::NotFound(id));
    }
    println!("Deleted id={}", id);
    Ok(())
}

fn cmd_show(library: &Library, rest: &[String]) -> Result<()> {
    let args = CommandArgs::parse(rest, &["json"])?;
    let id = args.id()?;
    let catalog = library.db().catalog();

    let entry = match catalog.get_entry(QueryTarget::Combined, id)? {
        Some(entry) => entry,
        None => catalog
            .get_entry(QueryTarget::Catalog, id)?
            .ok_or(piccat::Error::NotFound(id))?,
    };

    if args.flag("json") {
        println!("{}", serde_json::to_string_pretty(&entry)?);
    } else {
        let r = &entry.record;
        println!("id:      {}", r.id);
        println!("title:   {}", r.title);
        println!("creator: {}", r.creator);
        println!("path:    {}", r.path);
        println!("media:   {}", r.media);
        println!("mark:    {}", r.mark);
        if r.is_pending_deletion() {
            println!("fav:     {} (pending deletion)", r.fav);
        } else {
            println!("fav:     {}", r.fav);
        }
        println!("views:   {}", r.count);
        println!("added:   {}", r.date.as_deref().unwrap_or("-"));
        if !r.info.is_empty() {
            println!("info:    {}", r.info);
        }
        match entry.stats {
            Some(stats) => println!(
                "files:   {} ({} MB)",
                stats.file_count, stats.total_size_mb
            ),
            None => println!("files:   no stats, run `piccat refresh {}`", r.id),
        }
    }
    Ok(())
}

fn cmd_list(library: &Library, rest: &[String]) -> Result<()> {
    let args = CommandArgs::parse(rest, &["favorites", "most-viewed", "catalog", "json"])?;
    let target = if args.flag("catalog") {
        QueryTarget::Catalog
    } else {
        QueryTarget::Combined
    };
    let ordering = match args.value("order") {
        Some(raw) => {
            Ordering::parse(&raw).with_context(|| format!("invalid --order value: {}", raw))?
        }
        None => Ordering::default(),
    };
    let catalog = library.db().catalog();

    let entries = if args.flag("favorites") {
        catalog.list_favorites(target)?
    } else if args.flag("most-viewed") {
        catalog.list_most_viewed(target)?
    } else if let Some(creator) = args.value("creator") {
        catalog.query(target, &Selection::Creator(creator), ordering)?
    } else if let Some(raw) = args.value("from") {
        let id = raw
            .parse()
            .with_context(|| format!("invalid --from value: {}", raw))?;
        catalog.query(target, &Selection::FromId(id), ordering)?
    } else {
        let mut ctx = QueryContext::default().with_ordering(ordering);
        if let Some(filter) = args.value("filter") {
            ctx = ctx.with_filter(filter);
        }
        if let Some(mark) = args.value("mark") {
            ctx = ctx.with_mark(mark);
        }
        catalog.list(target, &ctx)?
    };

    print_entries(&entries, args.flag("json"))
}

fn cmd_view(library: &Library, rest: &[String]) -> Result<()> {
    let args = CommandArgs::parse(rest, &["desc"])?;
    let ordering = if args.flag("desc") {
        Ordering::Desc
    } else {
        Ordering::Asc
    };

    let view = library.view_item(args.id()?, ordering)?;
    println!("{}", format_entry(&view.entry));
    for file in &view.files {
        println!("  {}", file);
    }
    Ok(())
}

fn cmd_nav(library: &Library, rest: &[String]) -> Result<()> {
    let args = CommandArgs::parse(rest, &[])?;
    let file = args.positional.first().context("nav requires FILE")?;
    let movement = match args.positional.get(1) {
        Some(raw) => Move::parse(raw).with_context(|| format!("invalid move: {}", raw))?,
        None => Move::Stay,
    };

    let step = library.step(file, movement)?;
    let position = step.position + 1;
    match &step.title {
        Some(title) => println!("{} ({}/{})  {}", step.path, position, step.count, title),
        None => println!("{} ({}/{})", step.path, position, step.count),
    }
    if let Some(boundary) = step.boundary {
        println!("{}", boundary.notice());
    }
    Ok(())
}

fn cmd_check(library: &Library, config: &Config, rest: &[String]) -> Result<()> {
    let args = CommandArgs::parse(rest, &["auto-delete"])?;
    let auto_delete = args.flag("auto-delete") || config.maintenance.auto_delete_missing;

    let missing = library.checker().sweep_missing(auto_delete)?;
    if missing.is_empty() {
        println!("All catalog directories exist");
        return Ok(());
    }
    for path in &missing {
        println!("missing: {}", path);
    }
    if auto_delete {
        println!("{} records removed", missing.len());
    } else {
        println!("{} records point at missing directories", missing.len());
    }
    Ok(())
}

fn cmd_status(library: &Library) -> Result<()> {
    let status = library.status()?;
    println!("records:    {}", status.records);
    println!("with stats: {}", status.with_stats);
    println!("{}", status.drift);
    if !status.drift.is_consistent() {
        std::process::exit(2);
    }
    Ok(())
}

fn cmd_refresh(library: &Library, rest: &[String]) -> Result<()> {
    let args = CommandArgs::parse(rest, &[])?;

    if !args.positional.is_empty() {
        let (stats, write) = library.stats_manager().recompute(args.id()?)?;
        println!(
            "id={}: {} files, {} MB ({:?})",
            stats.id, stats.file_count, stats.total_size_mb, write
        );
        return Ok(());
    }

    let (report, state) = library.refresh()?;
    println!("Rebuilt stats for {} records", report.rebuilt.len());
    for (id, reason) in &report.failed {
        println!("  skipped id={}: {}", id, reason);
    }
    println!("{}", state);
    Ok(())
}

fn cmd_purge(library: &Library, config: &Config, rest: &[String]) -> Result<()> {
    let args = CommandArgs::parse(rest, &["data-only", "yes"])?;
    let mode = PurgeMode::from_data_only(args.flag("data-only") || config.maintenance.purge_data_only);
    purge_interactive(library, mode, args.flag("yes"))
}

fn purge_interactive(library: &Library, mode: PurgeMode, assume_yes: bool) -> Result<()> {
    let outcome = library.purger().purge_interactive(
        mode,
        assume_yes,
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
                println!("kept id={} {}: {}", item.id, item.path, reason);
            }
            for item in &report.skipped {
                println!("skipped id={} {}: no longer pending", item.id, item.path);
            }
            println!("Done ({} items removed)", report.removed.len());
        }
    }
    Ok(())
}

fn cmd_export(library: &Library, rest: &[String]) -> Result<()> {
    let args = CommandArgs::parse(rest, &["csv", "force"])?;
    let file = args.positional.first().context("export requires FILE")?;
    let path = Path::new(file);

    if !args.flag("force") {
        library.checker().ensure_consistent()?;
    }

    let format = if args.flag("csv") {
        ExportFormat::Csv
    } else {
        ExportFormat::from_path(path)
    };
    let count = export_catalog(library.db(), path, format)?;
    info!(count, "export finished");
    println!("Exported {} records to {}", count, path.display());
    Ok(())
}
