//! Create inbox queue table migration.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Inbox::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Inbox::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Inbox::Sender).string_len(1024).not_null())
                    .col(ColumnDef::new(Inbox::ActivityType).string_len(64).not_null())
                    .col(ColumnDef::new(Inbox::Raw).json_binary().not_null())
                    .col(
                        ColumnDef::new(Inbox::ReceivedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(ColumnDef::new(Inbox::Attempts).integer().not_null().default(0))
                    .col(ColumnDef::new(Inbox::LastError).text())
                    .col(ColumnDef::new(Inbox::LeasedUntil).timestamp_with_time_zone())
                    .col(ColumnDef::new(Inbox::ProcessedAt).timestamp_with_time_zone())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_inbox_unprocessed")
                    .table(Inbox::Table)
                    .col(Inbox::ProcessedAt)
                    .col(Inbox::LeasedUntil)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Inbox::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Inbox {
    Table,
    Id,
    Sender,
    ActivityType,
    Raw,
    ReceivedAt,
    Attempts,
    LastError,
    LeasedUntil,
    ProcessedAt,
}
