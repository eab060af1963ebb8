//! ailint - reporting CLI for stored code-analysis history
//!
//! Reads history, statistics, and storage status through the hybrid
//! storage coordinator.

use ailint_core::{AnalysisDocument, Config, HybridStorage, Statistics, StorageInfo};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "ailint")]
#[command(about = "Code analysis history and statistics")]
#[command(version)]
struct Cli {
    /// Override the local data directory
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Print machine-readable JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show recent analysis records
    History {
        /// Maximum number of records to show
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
    /// Show aggregate statistics
    Stats,
    /// Show which storage backend is in use
    Info,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load().context("failed to load configuration")?;
    if let Some(data_dir) = cli.data_dir.clone() {
        config.storage.data_dir = Some(data_dir);
    }
    let _log_guard = ailint_core::logging::init(&config.logging).ok();

    let storage = HybridStorage::connect(&config).context("failed to open storage")?;

    match cli.command {
        Command::History { limit } => {
            let history = storage.get_history(limit);
            if cli.json {
                print_json(&history)?;
            } else {
                print_history(&history);
            }
        }
        Command::Stats => {
            let stats = storage.get_statistics();
            if cli.json {
                print_json(&stats)?;
            } else {
                print_stats(&stats);
            }
        }
        Command::Info => {
            let info = storage.get_storage_info();
            if cli.json {
                print_json(&info)?;
            } else {
                print_info(&info);
            }
        }
    }

    storage.disconnect();
    Ok(())
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_history(history: &[AnalysisDocument]) {
    if history.is_empty() {
        println!("No analyses recorded yet.");
        return;
    }
    for doc in history {
        println!(
            "{}  {:<12}  {:<30}  {} errors, {} warnings  ({:.2}s)",
            doc.saved_at.format("%Y-%m-%d %H:%M:%S"),
            doc.status.as_str(),
            doc.file_name,
            doc.error_count,
            doc.warning_count,
            doc.execution_time,
        );
        println!("    id: {}", doc.id);
    }
    println!("\n{} record(s)", history.len());
}

fn print_stats(stats: &Statistics) {
    println!("Analyses:        {}", stats.total_analyses);
    println!("Errors found:    {}", stats.total_errors);
    println!("Warnings found:  {}", stats.total_warnings);
    println!("Avg exec time:   {:.2}s", stats.avg_execution_time);
    if let Some(storage_type) = &stats.storage_type {
        println!("Storage:         {}", storage_type);
    }
}

fn print_info(info: &StorageInfo) {
    println!(
        "Backend:         {}",
        if info.uses_remote { "remote" } else { "local" }
    );
    println!("Storage type:    {}", info.storage_type);
    println!("Local data dir:  {}", info.local_data_dir.display());
}
