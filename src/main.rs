use std::fs;
use std::path::{Path, PathBuf};
use std::process;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::json;
use tokio::sync::watch;

use pennywise_lib::backup::BackupScheduler;
use pennywise_lib::commands;
use pennywise_lib::config::Config;
use pennywise_lib::state::AppState;
use pennywise_lib::sync::ImportRequest;
use pennywise_lib::AppError;

#[derive(Debug, Parser)]
#[command(name = "pennywise", about = "Pennywise ledger backups and sync", version)]
struct Cli {
    /// Database file; overrides PENNYWISE_DB.
    #[arg(long, global = true)]
    db: Option<PathBuf>,
    /// Backup directory; overrides PENNYWISE_BACKUP_DIR.
    #[arg(long, global = true)]
    backup_dir: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run the backup scheduler until interrupted.
    Serve,
    /// Run a single backup cycle into the backup directory.
    Backup,
    /// Write a dated snapshot of the database into a directory.
    Download {
        #[arg(long, default_value = ".")]
        out: PathBuf,
    },
    /// Replace the database with an uploaded snapshot.
    Restore { file: PathBuf },
    /// Show backup configuration and the last successful backup.
    Status,
    /// Show the live transaction count and server time.
    SyncStatus,
    /// Export transactions and categories as JSON.
    Export {
        /// "all" or a four-digit year; defaults to the current year.
        #[arg(long)]
        period: Option<String>,
        /// Write to this file instead of stdout.
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Rebuild an empty database from a client export.
    Import { file: PathBuf },
}

fn main() {
    pennywise_lib::init_logging();

    let cli = Cli::parse();
    match run(cli) {
        Ok(code) => process::exit(code),
        Err(err) => {
            eprintln!("Error: {err:#}");
            process::exit(1);
        }
    }
}

fn run(cli: Cli) -> Result<i32> {
    let config = Config::from_env()
        .context("resolve configuration")?
        .with_db_path(cli.db)
        .with_backup_dir(cli.backup_dir);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("start async runtime")?;
    runtime.block_on(run_with_state(config, cli.command))
}

async fn run_with_state(config: Config, command: Commands) -> Result<i32> {
    let state = AppState::open(config).await.context("open database")?;
    let code = handle_command(&state, command).await;
    state.store.close().await;
    code
}

async fn handle_command(state: &AppState, command: Commands) -> Result<i32> {
    match command {
        Commands::Serve => serve(state).await,
        Commands::Backup => {
            let scheduler = scheduler(state)?;
            let report = scheduler.run_cycle().await;
            print_json(&json!({
                "snapshot": step_json(&report.snapshot),
                "export": step_json(&report.export),
                "completedAt": report.completed_at.map(|at| pennywise_lib::time::to_wire(&at)),
            }))?;
            Ok(if report.is_success() { 0 } else { 1 })
        }
        Commands::Download { out } => {
            let download = commands::download(state).await.context("create snapshot")?;
            fs::create_dir_all(&out)
                .with_context(|| format!("create output directory {}", out.display()))?;
            let path = out.join(&download.file_name);
            fs::write(&path, &download.bytes)
                .with_context(|| format!("write snapshot {}", path.display()))?;
            println!("{}", path.display());
            Ok(0)
        }
        Commands::Restore { file } => {
            let upload = match fs::read(&file) {
                Ok(bytes) => bytes,
                Err(err) => {
                    tracing::warn!(target: "pennywise", event = "restore_no_file", error = %err);
                    print_json(&commands::RestoreOutcome {
                        success: false,
                        message: "No file provided".into(),
                    })?;
                    return Ok(1);
                }
            };
            let outcome = commands::restore(state, &upload).await;
            print_json(&outcome)?;
            Ok(if outcome.success { 0 } else { 1 })
        }
        Commands::Status => {
            print_json(&commands::status(state))?;
            Ok(0)
        }
        Commands::SyncStatus => {
            print_json(&commands::sync_status(state).await?)?;
            Ok(0)
        }
        Commands::Export { period, out } => {
            let envelope = commands::sync_export(state, period.as_deref()).await?;
            let json = serde_json::to_string_pretty(&envelope).context("serialize export")?;
            match out {
                Some(path) => {
                    fs::write(&path, json)
                        .with_context(|| format!("write export {}", path.display()))?;
                }
                None => println!("{json}"),
            }
            Ok(0)
        }
        Commands::Import { file } => {
            let request = read_import_request(&file)?;
            print_json(&commands::sync_import(state, request).await?)?;
            Ok(0)
        }
    }
}

fn scheduler(state: &AppState) -> Result<BackupScheduler> {
    let dir = state
        .config
        .backup_dir
        .clone()
        .context("no backup directory configured (set PENNYWISE_BACKUP_DIR or --backup-dir)")?;
    Ok(BackupScheduler::new(
        state.store.clone(),
        state.backup_status.clone(),
        state.maintenance.clone(),
        dir,
    ))
}

async fn serve(state: &AppState) -> Result<i32> {
    let scheduler = scheduler(state)?;
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let interval = state.config.backup_interval;

    let loop_handle = tokio::spawn(async move { scheduler.run(interval, shutdown_rx).await });

    tokio::signal::ctrl_c().await.context("wait for Ctrl-C")?;
    tracing::info!(target: "pennywise", event = "shutdown_requested");
    let _ = shutdown_tx.send(true);
    loop_handle.await.context("join backup scheduler")?;
    Ok(0)
}

fn step_json(step: &Result<PathBuf, AppError>) -> serde_json::Value {
    match step {
        Ok(path) => json!({ "ok": true, "path": path.display().to_string() }),
        Err(err) => json!({ "ok": false, "code": err.code(), "message": err.message() }),
    }
}

fn read_import_request(path: &Path) -> Result<ImportRequest> {
    let raw = fs::read(path).with_context(|| format!("read {}", path.display()))?;
    serde_json::from_slice(&raw).with_context(|| format!("parse {}", path.display()))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("serialize output")?;
    println!("{json}");
    Ok(())
}
