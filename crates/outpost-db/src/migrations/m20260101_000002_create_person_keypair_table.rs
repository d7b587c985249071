//! Create person_keypair table migration.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(PersonKeypair::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(PersonKeypair::PersonId)
                            .string_len(1024)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(PersonKeypair::PublicKeyPem).text().not_null())
                    .col(ColumnDef::new(PersonKeypair::PrivateKeyPem).text().not_null())
                    .col(ColumnDef::new(PersonKeypair::KeyId).string_len(1024).not_null())
                    .col(
                        ColumnDef::new(PersonKeypair::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .from(PersonKeypair::Table, PersonKeypair::PersonId)
                            .to(Person::Table, Person::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(PersonKeypair::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum PersonKeypair {
    Table,
    PersonId,
    PublicKeyPem,
    PrivateKeyPem,
    KeyId,
    CreatedAt,
}

#[derive(Iden)]
enum Person {
    Table,
    Id,
}
