//! Accepted follow relationship (spec.md §4.5 follow state machine,
//! terminal state `accepted`).

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "following")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    #[sea_orm(indexed)]
    pub follower_id: String,

    #[sea_orm(indexed)]
    pub followee_id: String,

    #[sea_orm(nullable)]
    pub follower_host: Option<String>,

    #[sea_orm(nullable)]
    pub followee_host: Option<String>,

    /// Follower's inbox, denormalized so fanning the followee's new posts
    /// out to followers doesn't need a join back to `person` per row.
    #[sea_orm(nullable)]
    pub follower_inbox: Option<String>,

    #[sea_orm(nullable)]
    pub follower_shared_inbox: Option<String>,

    /// Followee's inbox, denormalized for the follower's own reference
    /// (e.g. addressing a `Like` straight at them).
    #[sea_orm(nullable)]
    pub followee_inbox: Option<String>,

    #[sea_orm(nullable)]
    pub followee_shared_inbox: Option<String>,

    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::person::Entity",
        from = "Column::FollowerId",
        to = "super::person::Column::Id",
        on_delete = "Cascade"
    )]
    Follower,

    #[sea_orm(
        belongs_to = "super::person::Entity",
        from = "Column::FolloweeId",
        to = "super::person::Column::Id",
        on_delete = "Cascade"
    )]
    Followee,
}

impl ActiveModelBehavior for ActiveModel {}
