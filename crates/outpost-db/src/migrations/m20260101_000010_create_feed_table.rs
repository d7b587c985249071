//! Create materialized feed table migration.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Feed::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Feed::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Feed::OwnerId).string_len(1024).not_null())
                    .col(ColumnDef::new(Feed::NoteId).string_len(1024).not_null())
                    .col(
                        ColumnDef::new(Feed::InsertedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_feed_owner")
                    .table(Feed::Table)
                    .col(Feed::OwnerId)
                    .col(Feed::Id)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_feed_owner_note_unique")
                    .table(Feed::Table)
                    .col(Feed::OwnerId)
                    .col(Feed::NoteId)
                    .unique()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Feed::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Feed {
    Table,
    Id,
    OwnerId,
    NoteId,
    InsertedAt,
}
