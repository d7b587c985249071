//! Database layer for outpost.
//!
//! A single `SQLite` file owned by one process (spec.md §1/§5) — there is
//! no connection pool fan-out across processes to coordinate.

pub mod entities;
pub mod migrations;
pub mod repositories;
pub mod test_utils;

use outpost_common::{AppError, Config};
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use std::time::Duration;
use tracing::log::LevelFilter;

/// Open the `SQLite` database named by `config.database.path`, creating it
/// if absent.
pub async fn init(config: &Config) -> Result<DatabaseConnection, AppError> {
    let url = format!("sqlite://{}?mode=rwc", config.database.path);
    let mut opt = ConnectOptions::new(url);

    opt.max_connections(config.database.max_connections)
        .connect_timeout(Duration::from_secs(10))
        .acquire_timeout(Duration::from_secs(10))
        .idle_timeout(Duration::from_secs(600))
        .sqlx_logging(true)
        .sqlx_logging_level(LevelFilter::Debug);

    Database::connect(opt)
        .await
        .map_err(|e| AppError::Database(e.to_string()))
}

/// Run pending migrations.
pub async fn migrate(db: &DatabaseConnection) -> Result<(), AppError> {
    use sea_orm_migration::MigratorTrait;
    migrations::Migrator::up(db, None)
        .await
        .map_err(|e| AppError::Database(e.to_string()))
}
