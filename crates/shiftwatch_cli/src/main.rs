//! Command-line front end for the shiftwatch engine.
//!
//! # Responsibility
//! - Record and fulfill pending obligations in the local ledger.
//! - Show the current alert snapshot once, or keep watching it.
//! - Keep all rules in `shiftwatch_core`; this binary only wires and prints.

use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use log::{info, warn};
use shiftwatch_core::{
    active_alerts, business_days_overdue, init_console_logging, init_logging, next_business_day,
    AlertCatalog, AlertMonitor, AlertSnapshot, ChannelSink, Clock, ConfigManager,
    EngineSettings, Identity, LocalClock, LogSink, MonitorConfig, MonitorDeps, MonitorHandle,
    NotificationSink, Obligation, ObligationId, ObligationLedger, PassOutcome, SqliteLedger,
};
use std::error::Error;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

type CliResult<T> = Result<T, Box<dyn Error>>;

#[derive(Debug, Parser)]
#[command(name = "shiftwatch", version, about = "Shift alerts and file-return deadlines")]
struct Cli {
    /// Directory holding `settings.json`.
    #[arg(long, global = true, default_value = ".shiftwatch")]
    config_dir: PathBuf,

    /// Ledger database path; overrides `db_path` from settings.
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Record a file sent today (or on --on) that awaits a return.
    Record {
        #[arg(long)]
        user: String,
        label: String,
        #[arg(long)]
        on: Option<NaiveDate>,
    },
    /// Mark an obligation as returned.
    Fulfill {
        id: ObligationId,
        #[arg(long)]
        on: Option<NaiveDate>,
        #[arg(long)]
        notes: Option<String>,
    },
    /// Run one evaluation pass and print the snapshot.
    Status {
        #[arg(long)]
        user: String,
    },
    /// Keep evaluating until interrupted, printing fired alerts.
    Watch {
        #[arg(long)]
        user: String,
    },
    /// List alert definitions, or only those already passed today.
    Alerts {
        #[arg(long)]
        active: bool,
    },
    /// Print the business day after DATE (default: today).
    NextBusinessDay { date: Option<NaiveDate> },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> CliResult<()> {
    let manager = ConfigManager::new(&cli.config_dir);
    let mut settings = manager.load();
    if let Some(db) = cli.db {
        settings.db_path = db;
    }
    start_logging(&settings);

    let catalog = Arc::new(build_catalog(&settings));
    let clock = LocalClock;

    match cli.command {
        Command::NextBusinessDay { date } => {
            let date = date.unwrap_or_else(|| Local::now().date_naive());
            println!("{}", next_business_day(date)?);
        }
        Command::Alerts { active } => {
            let definitions = if active {
                active_alerts(&catalog.list_all(), clock.now())
            } else {
                catalog.list_all()
            };
            for definition in definitions {
                println!(
                    "{}  {:<28} {}",
                    definition.trigger, definition.title, definition.message
                );
            }
        }
        Command::Record { user, label, on } => {
            let ledger = SqliteLedger::open(&settings.db_path)?;
            let on = on.unwrap_or_else(|| clock.now().date());
            let obligation = ledger.insert_obligation(&user, on, &label).await?;
            println!(
                "recorded {} due {}",
                obligation.id, obligation.expected_return_on
            );
        }
        Command::Fulfill { id, on, notes } => {
            let ledger = SqliteLedger::open(&settings.db_path)?;
            let on = on.unwrap_or_else(|| clock.now().date());
            let obligation = ledger.mark_fulfilled(id, on, notes).await?;
            println!("fulfilled {} on {on}", obligation.id);
        }
        Command::Status { user } => {
            let identity = Identity::signed_in(user);
            let handle = start_monitor(&settings, catalog, identity.clone())?;
            let outcome = handle.refresh().await;
            print_snapshot(&handle.snapshot());
            handle.stop().await;
            if outcome == PassOutcome::FetchFailed {
                return Err("ledger fetch failed".into());
            }
        }
        Command::Watch { user } => {
            watch(&settings, catalog, Identity::signed_in(user)).await?;
        }
    }
    Ok(())
}

fn start_logging(settings: &EngineSettings) {
    let result = match settings.log_dir.as_ref().and_then(|dir| dir.to_str()) {
        Some(dir) => init_logging(&settings.log_level, dir),
        None => init_console_logging(&settings.log_level),
    };
    if let Err(err) = result {
        eprintln!("warning: logging disabled: {err}");
    }
}

fn build_catalog(settings: &EngineSettings) -> AlertCatalog {
    let catalog = AlertCatalog::with_builtin();
    for input in settings.custom_alerts.iter().cloned() {
        if let Err(err) = catalog.register_input(input) {
            warn!("event=cli_custom_alert module=cli status=skip error={err}");
        }
    }
    catalog
}

fn start_monitor(
    settings: &EngineSettings,
    catalog: Arc<AlertCatalog>,
    identity: Identity,
) -> CliResult<MonitorHandle> {
    start_monitor_with_sink(settings, catalog, identity, Arc::new(LogSink))
}

fn start_monitor_with_sink(
    settings: &EngineSettings,
    catalog: Arc<AlertCatalog>,
    identity: Identity,
    sink: Arc<dyn NotificationSink>,
) -> CliResult<MonitorHandle> {
    let ledger = SqliteLedger::open(&settings.db_path)?;
    Ok(AlertMonitor::start(
        MonitorConfig::from_settings(settings),
        MonitorDeps {
            ledger: Arc::new(ledger),
            catalog,
            identity,
            clock: Arc::new(LocalClock),
            sink,
        },
    ))
}

async fn watch(
    settings: &EngineSettings,
    catalog: Arc<AlertCatalog>,
    identity: Identity,
) -> CliResult<()> {
    let (sink, mut fired) = ChannelSink::new();
    let handle = start_monitor_with_sink(settings, catalog, identity.clone(), Arc::new(sink))?;
    let mut snapshots = handle.subscribe();
    info!("event=cli_watch module=cli status=ok db={}", settings.db_path.display());

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            Some(event) = fired.recv() => {
                println!(
                    "[{}] {}: {}",
                    event.fired_at.format("%H:%M"),
                    event.definition.title,
                    event.definition.message
                );
            }
            changed = snapshots.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = snapshots.borrow_and_update().clone();
                if !snapshot.is_loading {
                    print_snapshot(&snapshot);
                }
            }
        }
    }

    handle.stop().await;
    drop(identity);
    Ok(())
}

fn print_snapshot(snapshot: &AlertSnapshot) {
    let today = snapshot
        .evaluated_at
        .map_or_else(|| LocalClock.now().date(), |at| at.date());
    if let Some(err) = &snapshot.last_error {
        println!("last error: {err}");
    }
    println!(
        "alerts due now: {}  due today: {}  overdue: {}",
        snapshot.daily_alerts_due.len(),
        snapshot.obligations_due_today.len(),
        snapshot.obligations_overdue.len()
    );
    for obligation in &snapshot.obligations_due_today {
        print_obligation("due", obligation, None);
    }
    for obligation in &snapshot.obligations_overdue {
        let days = business_days_overdue(obligation.expected_return_on, today);
        print_obligation("overdue", obligation, Some(days));
    }
}

fn print_obligation(kind: &str, obligation: &Obligation, overdue_days: Option<u32>) {
    match overdue_days {
        Some(days) => println!(
            "  {kind:<8} {}  {}  expected {} ({days} business days late)",
            obligation.id, obligation.label, obligation.expected_return_on
        ),
        None => println!(
            "  {kind:<8} {}  {}  expected {}",
            obligation.id, obligation.label, obligation.expected_return_on
        ),
    }
}
