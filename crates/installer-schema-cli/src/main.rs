use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use installer_schema_store_sqlite::SqliteStore;
use serde_json::Value;
use tracing_subscriber::EnvFilter;

const CLI_CONTRACT_VERSION: &str = "cli.v1";

#[derive(Debug, Parser)]
#[command(name = "installer-db")]
#[command(about = "Installer database schema tool")]
struct Cli {
    #[arg(long, default_value = "./installer.sqlite3")]
    db: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    Db {
        #[command(subcommand)]
        command: Box<DbCommand>,
    },
}

#[derive(Debug, Subcommand)]
enum DbCommand {
    /// Bring the database in line with the installer's record shapes.
    Reconcile(ReconcileArgs),
    /// Report the ledger, pending steps and column drift.
    Status,
}

#[derive(Debug, Args)]
struct ReconcileArgs {
    #[arg(long, default_value_t = false)]
    dry_run: bool,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

fn with_contract_version(value: Value) -> Value {
    match value {
        Value::Object(mut object) => {
            object.insert(
                "contract_version".to_string(),
                Value::String(CLI_CONTRACT_VERSION.to_string()),
            );
            Value::Object(object)
        }
        other => serde_json::json!({
            "contract_version": CLI_CONTRACT_VERSION,
            "payload": other
        }),
    }
}

fn emit_json(value: Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(&with_contract_version(value))?);
    Ok(())
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    match cli.command {
        Command::Db { command } => run_db(*command, &cli.db),
    }
}

fn run_db(command: DbCommand, db: &Path) -> Result<()> {
    match command {
        DbCommand::Reconcile(args) => run_db_reconcile(&args, db),
        DbCommand::Status => run_db_status(db),
    }
}

fn run_db_reconcile(args: &ReconcileArgs, db: &Path) -> Result<()> {
    if args.dry_run {
        let store = SqliteStore::open_read_only(db)?;
        let plan = store.plan().context("failed to plan schema reconciliation")?;
        return emit_json(serde_json::json!({
            "dry_run": true,
            "has_changes": plan.has_changes(),
            "would_apply_versions": plan.pending_versions(),
            "tables": plan.tables,
            "steps": plan.steps
        }));
    }

    let mut store = SqliteStore::open(db)?;
    let report = store.reconcile()?;
    tracing::info!(noop = report.is_noop(), "schema reconciliation finished");
    emit_json(serde_json::json!({
        "dry_run": false,
        "noop": report.is_noop(),
        "tables_created": report.tables_created,
        "steps_applied": report.steps_applied,
        "steps_satisfied": report.steps_satisfied,
        "tables_changed": report.changed_tables().collect::<Vec<_>>()
    }))
}

fn run_db_status(db: &Path) -> Result<()> {
    let store = SqliteStore::open_read_only(db)?;
    let status = store.schema_status()?;
    emit_json(serde_json::to_value(status)?)
}
