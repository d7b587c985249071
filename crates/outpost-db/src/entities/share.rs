//! Share entity: spec.md §3's single `Share` concept, covering both the
//! `Announce` (repost/boost) and `Like` wire activities. They differ only
//! in `kind` — both bump the target note's `shares_count` and both are
//! undone by `Undo` (spec.md §4.4).

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
pub enum ShareKind {
    #[sea_orm(string_value = "announce")]
    Announce,
    #[sea_orm(string_value = "like")]
    Like,
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "share")]
pub struct Model {
    /// The originating `Announce`/`Like` activity id, so a later `Undo`
    /// can find this row by its `object`.
    #[sea_orm(primary_key, auto_increment = false)]
    pub activity_id: String,

    #[sea_orm(indexed)]
    pub actor_id: String,

    #[sea_orm(indexed)]
    pub note_id: String,

    pub kind: ShareKind,

    /// Set when this share was relayed by a Group actor wrapping the
    /// original (spec.md §4.4 "Group-as-relay").
    #[sea_orm(default_value = false)]
    pub via_group_relay: bool,

    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::person::Entity",
        from = "Column::ActorId",
        to = "super::person::Column::Id",
        on_delete = "Cascade"
    )]
    Actor,

    #[sea_orm(
        belongs_to = "super::note::Entity",
        from = "Column::NoteId",
        to = "super::note::Column::Id",
        on_delete = "Cascade"
    )]
    Note,
}

impl Related<super::person::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Actor.def()
    }
}

impl Related<super::note::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Note.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
