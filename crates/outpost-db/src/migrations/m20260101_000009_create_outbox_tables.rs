//! Create outbox + delivery table migration.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Outbox::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Outbox::Id)
                            .string_len(1024)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Outbox::ActorId).string_len(1024).not_null())
                    .col(ColumnDef::new(Outbox::SenderId).string_len(1024).null())
                    .col(ColumnDef::new(Outbox::ActivityType).string_len(64).not_null())
                    .col(ColumnDef::new(Outbox::Activity).json_binary().not_null())
                    .col(
                        ColumnDef::new(Outbox::CreatedAt)
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
                    .name("idx_outbox_actor")
                    .table(Outbox::Table)
                    .col(Outbox::ActorId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_outbox_sender")
                    .table(Outbox::Table)
                    .col(Outbox::SenderId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Delivery::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Delivery::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Delivery::OutboxId).string_len(1024).not_null())
                    .col(ColumnDef::new(Delivery::RecipientInbox).string_len(1024).not_null())
                    .col(ColumnDef::new(Delivery::Attempts).integer().not_null().default(0))
                    .col(ColumnDef::new(Delivery::LastError).text())
                    .col(
                        ColumnDef::new(Delivery::NextAttemptAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(ColumnDef::new(Delivery::LeasedUntil).timestamp_with_time_zone())
                    .col(ColumnDef::new(Delivery::DeliveredAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(Delivery::Abandoned).boolean().not_null().default(false))
                    .col(
                        ColumnDef::new(Delivery::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .from(Delivery::Table, Delivery::OutboxId)
                            .to(Outbox::Table, Outbox::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_delivery_due")
                    .table(Delivery::Table)
                    .col(Delivery::DeliveredAt)
                    .col(Delivery::Abandoned)
                    .col(Delivery::NextAttemptAt)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Delivery::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Outbox::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Outbox {
    Table,
    Id,
    ActorId,
    SenderId,
    ActivityType,
    Activity,
    CreatedAt,
}

#[derive(Iden)]
enum Delivery {
    Table,
    Id,
    OutboxId,
    RecipientInbox,
    Attempts,
    LastError,
    NextAttemptAt,
    LeasedUntil,
    DeliveredAt,
    Abandoned,
    CreatedAt,
}
