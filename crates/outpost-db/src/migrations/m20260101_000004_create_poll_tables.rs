//! Create poll + poll_vote table migration.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Poll::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Poll::NoteId)
                            .string_len(1024)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Poll::Options).json().not_null())
                    .col(ColumnDef::new(Poll::Tallies).json().not_null())
                    .col(ColumnDef::new(Poll::Multiple).boolean().not_null().default(false))
                    .col(ColumnDef::new(Poll::ExpiresAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(Poll::Closed).boolean().not_null().default(false))
                    .col(ColumnDef::new(Poll::VotersCount).integer().not_null().default(0))
                    .foreign_key(
                        ForeignKey::create()
                            .from(Poll::Table, Poll::NoteId)
                            .to(Note::Table, Note::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(PollVote::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(PollVote::Id).string_len(64).not_null().primary_key())
                    .col(ColumnDef::new(PollVote::NoteId).string_len(1024).not_null())
                    .col(ColumnDef::new(PollVote::ActorId).string_len(1024).not_null())
                    .col(ColumnDef::new(PollVote::Choice).integer().not_null())
                    .col(
                        ColumnDef::new(PollVote::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .from(PollVote::Table, PollVote::NoteId)
                            .to(Poll::Table, Poll::NoteId)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_poll_vote_note_actor")
                    .table(PollVote::Table)
                    .col(PollVote::NoteId)
                    .col(PollVote::ActorId)
                    .unique()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(PollVote::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Poll::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Poll {
    Table,
    NoteId,
    Options,
    Tallies,
    Multiple,
    ExpiresAt,
    Closed,
    VotersCount,
}

#[derive(Iden)]
enum PollVote {
    Table,
    Id,
    NoteId,
    ActorId,
    Choice,
    CreatedAt,
}

#[derive(Iden)]
enum Note {
    Table,
    Id,
}
