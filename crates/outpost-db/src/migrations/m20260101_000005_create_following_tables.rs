//! Create following + follow_request table migration.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Following::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Following::Id).string_len(64).not_null().primary_key())
                    .col(ColumnDef::new(Following::FollowerId).string_len(1024).not_null())
                    .col(ColumnDef::new(Following::FolloweeId).string_len(1024).not_null())
                    .col(ColumnDef::new(Following::FollowerHost).string_len(256))
                    .col(ColumnDef::new(Following::FolloweeHost).string_len(256))
                    .col(ColumnDef::new(Following::FollowerInbox).string_len(1024))
                    .col(ColumnDef::new(Following::FollowerSharedInbox).string_len(1024))
                    .col(ColumnDef::new(Following::FolloweeInbox).string_len(1024))
                    .col(ColumnDef::new(Following::FolloweeSharedInbox).string_len(1024))
                    .col(
                        ColumnDef::new(Following::CreatedAt)
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
                    .name("idx_following_pair")
                    .table(Following::Table)
                    .col(Following::FollowerId)
                    .col(Following::FolloweeId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(FollowRequest::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(FollowRequest::Id)
                            .string_len(64)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(FollowRequest::FollowerId).string_len(1024).not_null())
                    .col(ColumnDef::new(FollowRequest::FolloweeId).string_len(1024).not_null())
                    .col(ColumnDef::new(FollowRequest::FollowerHost).string_len(256))
                    .col(ColumnDef::new(FollowRequest::FolloweeHost).string_len(256))
                    .col(ColumnDef::new(FollowRequest::FollowerInbox).string_len(1024))
                    .col(ColumnDef::new(FollowRequest::FollowerSharedInbox).string_len(1024))
                    .col(ColumnDef::new(FollowRequest::ActivityId).string_len(1024).not_null())
                    .col(
                        ColumnDef::new(FollowRequest::CreatedAt)
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
                    .name("idx_follow_request_pair")
                    .table(FollowRequest::Table)
                    .col(FollowRequest::FollowerId)
                    .col(FollowRequest::FolloweeId)
                    .unique()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(FollowRequest::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Following::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Following {
    Table,
    Id,
    FollowerId,
    FolloweeId,
    FollowerHost,
    FolloweeHost,
    FollowerInbox,
    FollowerSharedInbox,
    FolloweeInbox,
    FolloweeSharedInbox,
    CreatedAt,
}

#[derive(Iden)]
enum FollowRequest {
    Table,
    Id,
    FollowerId,
    FolloweeId,
    FollowerHost,
    FolloweeHost,
    FollowerInbox,
    FollowerSharedInbox,
    ActivityId,
    CreatedAt,
}
