//! CLI entry point.
//!
//! # Responsibility
//! - Resolve settings, start logging and open the document store.
//! - Run one command against the current cap table and print the result.
//!
//! Usage: `captable_cli [summary | import <file.csv> [--accept-overage] | export | version]`

use captable_core::repo::store::CapTableStore;
use captable_core::service::OverageDecision;
use captable_core::{
    init_logging, open_db, CapTableService, FallbackStore, JsonFileCache, ServiceError, Settings,
    SqliteCapTableStore,
};
use log::{info, warn};
use std::process::ExitCode;

const ACCEPT_OVERAGE_FLAG: &str = "--accept-overage";
const USAGE: &str =
    "usage: captable_cli [summary | import <file.csv> [--accept-overage] | export | version]";

enum Command {
    Summary,
    Import {
        path: String,
        decision: OverageDecision,
    },
    Export,
    Version,
}

fn parse_command(args: &[String]) -> Result<Command, String> {
    match args.first().map(String::as_str) {
        None | Some("summary") => Ok(Command::Summary),
        Some("import") => parse_import(&args[1..]),
        Some("export") => Ok(Command::Export),
        Some("version") => Ok(Command::Version),
        Some(other) => Err(format!("unknown command `{other}`")),
    }
}

fn parse_import(args: &[String]) -> Result<Command, String> {
    let mut path = None;
    let mut decision = OverageDecision::Reject;
    for arg in args {
        match arg.as_str() {
            ACCEPT_OVERAGE_FLAG => decision = OverageDecision::Accept,
            flag if flag.starts_with("--") => return Err(format!("unknown flag `{flag}`")),
            _ if path.is_none() => path = Some(arg.clone()),
            extra => return Err(format!("unexpected argument `{extra}`")),
        }
    }
    path.map(|path| Command::Import { path, decision })
        .ok_or_else(|| "import needs a CSV file path".to_string())
}

fn main() -> ExitCode {
    let args = std::env::args().skip(1).collect::<Vec<_>>();
    let command = match parse_command(&args) {
        Ok(command) => command,
        Err(message) => {
            eprintln!("{message}");
            eprintln!("{USAGE}");
            return ExitCode::from(2);
        }
    };

    if let Command::Version = command {
        println!("captable_core version={}", captable_core::core_version());
        return ExitCode::SUCCESS;
    }

    let settings = match Settings::from_env() {
        Ok(settings) => settings,
        Err(err) => {
            eprintln!("configuration error: {err}");
            return ExitCode::from(2);
        }
    };
    if let Err(err) = std::fs::create_dir_all(settings.data_dir()) {
        eprintln!("cannot create data directory: {err}");
        return ExitCode::FAILURE;
    }
    let log_dir = settings.log_dir();
    if let Err(err) = init_logging(&settings.log_level, &log_dir.to_string_lossy()) {
        eprintln!("logging disabled: {err}");
    }

    let cache = JsonFileCache::new(settings.cache_path());
    let result = match open_db(settings.db_path()) {
        Ok(conn) => match SqliteCapTableStore::try_new(&conn) {
            Ok(primary) => run(FallbackStore::new(primary, cache), &settings, command),
            Err(err) => {
                warn!("event=cli_store module=cli status=fallback error={err}");
                run(cache, &settings, command)
            }
        },
        Err(err) => {
            warn!("event=cli_store module=cli status=fallback error={err}");
            run(cache, &settings, command)
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("{message}");
            ExitCode::FAILURE
        }
    }
}

fn run<S: CapTableStore>(store: S, settings: &Settings, command: Command) -> Result<(), String> {
    let mut service = CapTableService::open(store, settings.authorized_headroom)
        .map_err(|err| format!("cannot load cap table: {err}"))?;

    match command {
        Command::Summary | Command::Version => print_summary(&service),
        Command::Import { path, decision } => {
            let input = std::fs::read_to_string(&path)
                .map_err(|err| format!("cannot read `{path}`: {err}"))?;
            let outcome = service
                .import_csv(&input, decision)
                .map_err(|err| match err {
                    ServiceError::Overage(_) => {
                        format!("import refused: {err}; rerun with {ACCEPT_OVERAGE_FLAG} to accept")
                    }
                    other => format!("import failed: {other}"),
                })?;
            for warning in &outcome.warnings {
                println!("warning: {warning}");
            }
            if let Some(err) = &outcome.save_error {
                println!("warning: imported table was not saved: {err}");
            }
            info!(
                "event=cli_import module=cli status=ok rounds={}",
                service.cap_table().rounds.len()
            );
            print_summary(&service);
        }
        Command::Export => {
            let table = service
                .export_csv()
                .map_err(|err| format!("export failed: {err}"))?;
            print!("{table}");
        }
    }
    Ok(())
}

fn print_summary<S: CapTableStore>(service: &CapTableService<S>) {
    let summary = service.summary();
    println!("company: {}", service.cap_table().company_name);
    println!("issued shares: {}", summary.issued_shares);
    println!("fully diluted shares: {}", summary.fully_diluted_shares);
    println!(
        "authorized shares: {} (suggested {})",
        summary.authorized_shares, summary.suggested_authorized_shares
    );
    if summary.over_allocated {
        println!("warning: fully diluted shares exceed authorized shares");
    }
    match summary.effective_price_per_share {
        Some(price) => println!("price per share: {price:.4}"),
        None => println!("price per share: N/A"),
    }
    if let Some(valuation) = summary.post_money_valuation {
        println!("post-money valuation: {valuation:.2}");
    }
    for pool in &summary.pools {
        println!(
            "pool `{}`: {} of {} allocated ({})",
            pool.round_name, pool.allocated, pool.authorized, pool.utilization
        );
    }
    println!("holders:");
    for row in service.ownership() {
        println!(
            "  {:<24} {:>14} {:>8}",
            row.holder_name,
            row.shares,
            row.percent.to_string()
        );
    }
}
