//! Create share table migration.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Share::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Share::ActivityId)
                            .string_len(1024)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Share::ActorId).string_len(1024).not_null())
                    .col(ColumnDef::new(Share::NoteId).string_len(1024).not_null())
                    .col(ColumnDef::new(Share::Kind).string_len(16).not_null())
                    .col(ColumnDef::new(Share::ViaGroupRelay).boolean().not_null().default(false))
                    .col(
                        ColumnDef::new(Share::CreatedAt)
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
                    .name("idx_share_actor_note_kind")
                    .table(Share::Table)
                    .col(Share::ActorId)
                    .col(Share::NoteId)
                    .col(Share::Kind)
                    .unique()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Share::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Share {
    Table,
    ActivityId,
    ActorId,
    NoteId,
    Kind,
    ViaGroupRelay,
    CreatedAt,
}
