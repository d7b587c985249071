//! Keypair entity for local actors' `ActivityPub` HTTP Signatures.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Keypair for a local actor. Each local actor has exactly one.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "person_keypair")]
pub struct Model {
    /// Same as `person.id` (1:1 relationship).
    #[sea_orm(primary_key, auto_increment = false)]
    pub person_id: String,

    #[sea_orm(column_type = "Text")]
    pub public_key_pem: String,

    #[sea_orm(column_type = "Text")]
    pub private_key_pem: String,

    /// Key id referenced by `keyId` in outgoing signatures
    /// (`{actor_id}#main-key`).
    pub key_id: String,

    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::person::Entity",
        from = "Column::PersonId",
        to = "super::person::Column::Id",
        on_delete = "Cascade"
    )]
    Person,
}

impl Related<super::person::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Person.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
