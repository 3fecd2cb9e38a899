use std::time::Duration;

use lectern_core::config::LecternConfig;
use lectern_core::error::{CoreError, Result};
use rusqlite::Connection;
use tokio::signal;
use tracing::info;

/// Open the SQLite store named in `config` and bring its schema up to date.
pub fn open_store(config: &LecternConfig) -> Result<Connection> {
    let path = &config.database.path;
    ensure_parent_dir(path)?;
    info!(path = %path, "opening SQLite store");

    let busy = Duration::from_millis(config.publisher.transaction_timeout_ms);
    let conn = lectern_catalog::db::open(path, busy)
        .map_err(|e| CoreError::Database(e.to_string()))?;

    // run schema migrations (idempotent)
    lectern_catalog::db::init_db(&conn).map_err(|e| CoreError::Database(e.to_string()))?;
    info!("database migrations complete");
    Ok(conn)
}

fn ensure_parent_dir(path: &str) -> Result<()> {
    match std::path::Path::new(path).parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            std::fs::create_dir_all(parent)?;
            Ok(())
        }
        _ => Ok(()),
    }
}

/// Resolve on Ctrl+C or SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::warn!("Ctrl+C handler unavailable: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::warn!("SIGTERM handler unavailable: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received Ctrl+C, shutting down"),
        _ = terminate => info!("received SIGTERM, shutting down"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_store_creates_parent_dir_and_schema() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = LecternConfig::default();
        config.database.path = dir
            .path()
            .join("nested/data/lectern.db")
            .to_string_lossy()
            .into_owned();

        let conn = open_store(&config).unwrap();
        let tables: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table'
                 AND name IN ('programs', 'terms', 'lessons')",
                [],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(tables, 3);
    }

    #[test]
    fn unreachable_store_is_a_startup_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = LecternConfig::default();
        // A directory cannot be opened as a database file.
        config.database.path = dir.path().to_string_lossy().into_owned();

        let err = open_store(&config).unwrap_err();
        assert_eq!(err.code(), "DATABASE_ERROR");
    }
}
