//! Periodic cleanup of old chat sessions; run it from cron or a scheduler.

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

use supportbot_cli::retention::DEFAULT_RETENTION_DAYS;
use supportbot_cli::{ChatManager, cleanup_old_sessions, logging};
use supportbot_core::AppConfig;

#[derive(Parser)]
#[command(name = "data-retention")]
#[command(about = "Data retention cleanup utility", long_about = None)]
struct Cli {
    /// Delete sessions older than this many days
    #[arg(long, default_value_t = DEFAULT_RETENTION_DAYS)]
    days: u32,

    /// Session directory (defaults to SUPPORTBOT_CHAT_DIR or data/chats)
    #[arg(long)]
    dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = AppConfig::from_env()?;
    logging::init(&config.log_level, config.log_file.as_deref())?;

    let manager = ChatManager::new(cli.dir.unwrap_or(config.chat_storage_dir));
    let report = cleanup_old_sessions(&manager, cli.days).await;

    println!(
        "Deleted {} of {} sessions older than {} days ({:.2} KB -> {:.2} KB)",
        report.deleted,
        report.initial_count,
        report.retention_days,
        report.initial_bytes as f64 / 1024.0,
        report.final_bytes as f64 / 1024.0
    );
    Ok(())
}
