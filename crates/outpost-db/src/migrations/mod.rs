//! Database migrations.

#![allow(missing_docs)]

use sea_orm_migration::prelude::*;

mod m20260101_000001_create_person_table;
mod m20260101_000002_create_person_keypair_table;
mod m20260101_000003_create_note_table;
mod m20260101_000004_create_poll_tables;
mod m20260101_000005_create_following_tables;
mod m20260101_000006_create_share_table;
mod m20260101_000007_create_hashtag_table;
mod m20260101_000008_create_inbox_table;
mod m20260101_000009_create_outbox_tables;
mod m20260101_000010_create_feed_table;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20260101_000001_create_person_table::Migration),
            Box::new(m20260101_000002_create_person_keypair_table::Migration),
            Box::new(m20260101_000003_create_note_table::Migration),
            Box::new(m20260101_000004_create_poll_tables::Migration),
            Box::new(m20260101_000005_create_following_tables::Migration),
            Box::new(m20260101_000006_create_share_table::Migration),
            Box::new(m20260101_000007_create_hashtag_table::Migration),
            Box::new(m20260101_000008_create_inbox_table::Migration),
            Box::new(m20260101_000009_create_outbox_tables::Migration),
            Box::new(m20260101_000010_create_feed_table::Migration),
        ]
    }
}
