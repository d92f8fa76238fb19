use std::str::FromStr;
use std::time::Duration;

use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};

use crate::domain::file::CatalogError;

/// Opens the catalog database and applies the embedded migrations.
///
/// `sqlite::memory:` urls get a single long-lived connection, since every
/// connection to an in-memory database sees its own empty database.
pub async fn connect_pool(db_url: &str) -> Result<SqlitePool, CatalogError> {
    let in_memory = db_url.contains(":memory:");
    let mut options = SqliteConnectOptions::from_str(db_url)?
        .create_if_missing(true)
        .synchronous(SqliteSynchronous::Full)
        .busy_timeout(Duration::from_secs(5));
    if !in_memory {
        options = options.journal_mode(SqliteJournalMode::Wal);
    }

    let pool = if in_memory {
        SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?
    } else {
        SqlitePoolOptions::new()
            .max_connections(12)
            .connect_with(options)
            .await?
    };

    sqlx::migrate!("./migrations").run(&pool).await?;
    tracing::debug!(db_url, "catalog database ready");
    Ok(pool)
}
