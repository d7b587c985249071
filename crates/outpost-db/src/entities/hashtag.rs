//! Hashtag join table, backing `hashtag/<tag>` and the `hashtags` listing
//! (spec.md §6). Deliberately a plain join, not a denormalized counter
//! entity: per-tag note counts are a `COUNT(*) GROUP BY tag` away and a
//! join table never drifts out of sync with `note.tags`.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "hashtag")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    /// Lowercased, without the leading `#`.
    #[sea_orm(indexed)]
    pub tag: String,

    #[sea_orm(indexed)]
    pub note_id: String,

    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::note::Entity",
        from = "Column::NoteId",
        to = "super::note::Column::Id",
        on_delete = "Cascade"
    )]
    Note,
}

impl Related<super::note::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Note.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
