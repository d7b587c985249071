//! Outbox row: one per activity a local actor has produced. A `delivery`
//! row is fanned out per recipient inbox (see `delivery.rs`); the outbox
//! row itself is the durable record of "this activity was authored",
//! independent of how many recipients it reaches.

use sea_orm::entity::prelude::*;
use serde_json::Value as JsonValue;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "outbox")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    /// The activity's true author (`activity.actor`) — who produced the
    /// content, not necessarily whose delivery context fanned it out.
    #[sea_orm(indexed)]
    pub actor_id: String,

    /// The local account whose outbox/relay authority this row was
    /// delivered under, when it differs from `actor_id`. `None` means
    /// self-authored: the actor delivered to their own audience.
    /// Set for a Group relay's local-initiation shape (spec.md §4.4 case
    /// 2): a member's `Create` is recorded with `actor_id` = the member
    /// and `sender_id` = the Group whose followers received it.
    #[sea_orm(nullable, indexed)]
    pub sender_id: Option<String>,

    pub activity_type: String,

    #[sea_orm(column_type = "JsonBinary")]
    pub activity: JsonValue,

    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::delivery::Entity")]
    Deliveries,
}

impl Related<super::delivery::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Deliveries.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
