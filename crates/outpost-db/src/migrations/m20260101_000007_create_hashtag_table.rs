//! Create hashtag join table migration.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Hashtag::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Hashtag::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Hashtag::Tag).string_len(128).not_null())
                    .col(ColumnDef::new(Hashtag::NoteId).string_len(1024).not_null())
                    .col(
                        ColumnDef::new(Hashtag::CreatedAt)
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
                    .name("idx_hashtag_tag")
                    .table(Hashtag::Table)
                    .col(Hashtag::Tag)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Hashtag::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Hashtag {
    Table,
    Id,
    Tag,
    NoteId,
    CreatedAt,
}
