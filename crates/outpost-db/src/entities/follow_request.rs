//! Pending follow relationship (spec.md §4.5 follow state machine, state
//! `pending`). Promoted to `following` on `Accept`, dropped on `Reject` or
//! a self-initiated `Undo`.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "follow_request")]
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

    #[sea_orm(nullable)]
    pub follower_inbox: Option<String>,

    #[sea_orm(nullable)]
    pub follower_shared_inbox: Option<String>,

    /// The original `Follow` activity's id, echoed back as the `object`
    /// of the eventual `Accept`/`Reject`.
    pub activity_id: String,

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
