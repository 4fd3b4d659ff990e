//! Data-retention cleanup for stored sessions

use serde::Serialize;
use tracing::info;

use crate::session::ChatManager;

/// Default retention period in days
pub const DEFAULT_RETENTION_DAYS: u32 = 90;

/// Storage state before and after a cleanup run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RetentionReport {
    pub retention_days: u32,
    pub initial_count: usize,
    pub initial_bytes: u64,
    pub deleted: usize,
    pub final_count: usize,
    pub final_bytes: u64,
}

fn kilobytes(bytes: u64) -> f64 {
    bytes as f64 / 1024.0
}

/// Delete sessions older than `retention_days` and report the storage change
pub async fn cleanup_old_sessions(manager: &ChatManager, retention_days: u32) -> RetentionReport {
    info!(retention_days, "starting data retention cleanup");

    let initial_count = manager.session_count().await;
    let initial_bytes = manager.storage_size().await;
    info!(
        sessions = initial_count,
        size_kb = %format!("{:.2}", kilobytes(initial_bytes)),
        "initial state"
    );

    let deleted = manager.delete_old_sessions(retention_days).await;

    let final_count = manager.session_count().await;
    let final_bytes = manager.storage_size().await;
    info!(
        sessions = final_count,
        size_kb = %format!("{:.2}", kilobytes(final_bytes)),
        "final state"
    );
    info!(deleted, "cleanup completed");

    RetentionReport {
        retention_days,
        initial_count,
        initial_bytes,
        deleted,
        final_count,
        final_bytes,
    }
}
