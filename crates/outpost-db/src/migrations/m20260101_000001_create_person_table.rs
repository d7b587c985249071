//! Create person table migration.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Person::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Person::Id).string_len(1024).not_null().primary_key())
                    .col(ColumnDef::new(Person::Kind).string_len(16).not_null())
                    .col(ColumnDef::new(Person::PreferredUsername).string_len(128).not_null())
                    .col(ColumnDef::new(Person::Host).string_len(256))
                    .col(ColumnDef::new(Person::Inbox).string_len(1024).not_null())
                    .col(ColumnDef::new(Person::SharedInbox).string_len(1024))
                    .col(ColumnDef::new(Person::Followers).string_len(1024).not_null())
                    .col(ColumnDef::new(Person::Bio).text())
                    .col(ColumnDef::new(Person::PublicKeyPem).text())
                    .col(ColumnDef::new(Person::MovedTo).string_len(1024))
                    .col(ColumnDef::new(Person::AlsoKnownAs).json())
                    .col(
                        ColumnDef::new(Person::Published)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(ColumnDef::new(Person::LastFetchedAt).timestamp_with_time_zone())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_person_username_host")
                    .table(Person::Table)
                    .col(Person::PreferredUsername)
                    .col(Person::Host)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_person_host")
                    .table(Person::Table)
                    .col(Person::Host)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Person::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Person {
    Table,
    Id,
    Kind,
    PreferredUsername,
    Host,
    Inbox,
    SharedInbox,
    Followers,
    Bio,
    PublicKeyPem,
    MovedTo,
    AlsoKnownAs,
    Published,
    LastFetchedAt,
}
