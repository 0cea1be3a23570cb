// SQLite connection pool: create the database if missing, enable WAL for
// concurrent readers, apply the schema.

use crate::db::INIT_SCHEMA;
use sqlx::{migrate::MigrateDatabase, Pool, Sqlite, SqlitePool};
use tracing::info;

pub async fn establish_connection(database_url: &str) -> Result<Pool<Sqlite>, sqlx::Error> {
    if !Sqlite::database_exists(database_url).await.unwrap_or(false) {
        Sqlite::create_database(database_url).await?;
    }

    let pool = SqlitePool::connect(database_url).await?;

    // WAL keeps read-only consumers unblocked while a sync holds the writer role
    sqlx::query("PRAGMA journal_mode=WAL").execute(&pool).await?;

    run_migrations(&pool).await?;

    Ok(pool)
}

pub async fn run_migrations(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    info!("Running database migrations...");
    sqlx::raw_sql(INIT_SCHEMA).execute(pool).await?;
    info!("Database migrations completed successfully");
    Ok(())
}
