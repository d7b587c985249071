//! Create note table migration.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Note::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Note::Id).string_len(1024).not_null().primary_key())
                    .col(ColumnDef::new(Note::LocalId).string_len(64).not_null())
                    .col(ColumnDef::new(Note::ActorId).string_len(1024).not_null())
                    .col(ColumnDef::new(Note::ActorHost).string_len(256))
                    .col(ColumnDef::new(Note::Text).text())
                    .col(ColumnDef::new(Note::Cw).string_len(512))
                    .col(ColumnDef::new(Note::Visibility).string_len(16).not_null())
                    .col(ColumnDef::new(Note::ReplyId).string_len(1024))
                    .col(ColumnDef::new(Note::ThreadId).string_len(1024))
                    .col(ColumnDef::new(Note::Mentions).json_binary().not_null())
                    .col(ColumnDef::new(Note::VisibleActorIds).json_binary().not_null())
                    .col(ColumnDef::new(Note::Tags).json_binary().not_null())
                    .col(ColumnDef::new(Note::RepliesCount).integer().not_null().default(0))
                    .col(ColumnDef::new(Note::SharesCount).integer().not_null().default(0))
                    .col(ColumnDef::new(Note::IsLocal).boolean().not_null().default(true))
                    .col(ColumnDef::new(Note::Raw).json_binary())
                    .col(ColumnDef::new(Note::DeletedAt).timestamp_with_time_zone())
                    .col(
                        ColumnDef::new(Note::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(ColumnDef::new(Note::EditedAt).timestamp_with_time_zone())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_note_local_id")
                    .table(Note::Table)
                    .col(Note::LocalId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_note_actor_id")
                    .table(Note::Table)
                    .col(Note::ActorId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_note_reply_id")
                    .table(Note::Table)
                    .col(Note::ReplyId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_note_thread_id")
                    .table(Note::Table)
                    .col(Note::ThreadId)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Note::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Note {
    Table,
    Id,
    LocalId,
    ActorId,
    ActorHost,
    Text,
    Cw,
    Visibility,
    ReplyId,
    ThreadId,
    Mentions,
    VisibleActorIds,
    Tags,
    RepliesCount,
    SharesCount,
    IsLocal,
    Raw,
    DeletedAt,
    CreatedAt,
    EditedAt,
}
