//! Test utilities for database operations.
//!
//! A real `SQLite` file is one process's whole database, so tests get an
//! in-memory `SQLite` connection with migrations applied rather than a
//! mocked driver — exercising the real schema and constraints.

use sea_orm::{Database, DatabaseConnection, DbErr};
use tracing::info;

/// An in-memory `SQLite` database with migrations applied, torn down for
/// free when dropped (no file, no cleanup step needed).
pub struct TestDatabase {
    /// Database connection.
    pub conn: DatabaseConnection,
}

impl TestDatabase {
    /// Create a fresh in-memory database and run all migrations against
    /// it.
    pub async fn new() -> Result<Self, DbErr> {
        let conn = Database::connect("sqlite::memory:").await?;
        crate::migrations::Migrator::up(&conn, None).await?;
        info!("Opened in-memory test database");
        Ok(Self { conn })
    }

    /// Get the database connection.
    #[must_use]
    pub const fn connection(&self) -> &DatabaseConnection {
        &self.conn
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::ConnectionTrait;

    #[tokio::test]
    async fn migrations_apply_cleanly() {
        let db = TestDatabase::new().await.unwrap();
        assert!(db.connection().ping().await.is_ok());
    }
}
