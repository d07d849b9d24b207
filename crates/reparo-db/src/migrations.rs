//! # Database Migrations
//!
//! `migrations/sqlite/*.sql` is compiled into the binary and applied in
//! filename order. Applied versions are recorded in `_sqlx_migrations`.

use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::error::DbResult;

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("../../migrations/sqlite");

/// Applies every migration not yet recorded. Safe to call on each start.
pub async fn run_migrations(pool: &SqlitePool) -> DbResult<()> {
    let (total, applied) = migration_status(pool).await?;
    if applied >= total {
        debug!(total, "Schema up to date");
        return Ok(());
    }

    info!(pending = total - applied, "Applying migrations");
    MIGRATOR.run(pool).await?;
    Ok(())
}

/// Returns `(embedded, applied)` migration counts.
///
/// A fresh database has no bookkeeping table yet and reports zero applied.
pub async fn migration_status(pool: &SqlitePool) -> DbResult<(usize, usize)> {
    let applied: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM _sqlx_migrations")
        .fetch_one(pool)
        .await
        .unwrap_or(0);

    Ok((MIGRATOR.migrations.len(), applied.max(0) as usize))
}
