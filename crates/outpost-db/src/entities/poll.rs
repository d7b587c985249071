//! Poll entity, attached 1:1 to a `note` whose `Question` object carries
//! `oneOf`/`anyOf` options (spec.md §4 "Poll aggregator").

use sea_orm::entity::prelude::*;
use serde_json::Value as JsonValue;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "poll")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub note_id: String,

    /// Poll options, 2 to 5 entries ("Polls must have 2 to 5 options").
    #[sea_orm(column_type = "Json")]
    pub options: JsonValue,

    /// Vote tally per option, same length/order as `options`. Recomputed
    /// from `poll_vote` rows rather than incremented in place, so a late
    /// vote arriving out of order never desyncs the count.
    #[sea_orm(column_type = "Json")]
    pub tallies: JsonValue,

    /// `oneOf` (false) vs `anyOf` (true) in the wire `Question` object.
    pub multiple: bool,

    #[sea_orm(nullable)]
    pub expires_at: Option<DateTimeWithTimeZone>,

    /// Set once a closure `Update` is processed or `expires_at` has
    /// passed at aggregation time. A closed poll rejects further votes
    /// but keeps accepting replies.
    #[sea_orm(default_value = false)]
    pub closed: bool,

    pub voters_count: i32,
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
