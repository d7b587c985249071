//! Note (`ActivityPub` Note/Question object) entity, spec.md §3 "Post".

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Post visibility levels (spec.md §4.2 "Audience & Visibility").
#[derive(Debug, Clone, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
pub enum Visibility {
    /// Addressed to the public collection; appears on `local`/hashtag feeds.
    #[sea_orm(string_value = "public")]
    Public,
    /// Addressed to followers + public, but not advertised on public feeds
    /// ("unlisted" in spec.md terms).
    #[sea_orm(string_value = "home")]
    Home,
    /// Addressed only to the followers collection.
    #[sea_orm(string_value = "followers")]
    Followers,
    /// Addressed only to explicitly named actors (`dm`).
    #[sea_orm(string_value = "specified")]
    Specified,
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "note")]
pub struct Model {
    /// `ActivityPub` object id (URL). Local posts mint this from
    /// `local_id`; remote posts keep the author's id verbatim.
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    /// Content-addressed id (`hex(sha256(id))`), used in short text-interface
    /// references (`view/<local_id>`).
    #[sea_orm(unique, indexed)]
    pub local_id: String,

    #[sea_orm(indexed)]
    pub actor_id: String,

    /// Author's host, denormalized for feed/query efficiency. `None` for
    /// local authors.
    #[sea_orm(nullable)]
    pub actor_host: Option<String>,

    #[sea_orm(column_type = "Text", nullable)]
    pub text: Option<String>,

    #[sea_orm(nullable)]
    pub cw: Option<String>,

    pub visibility: Visibility,

    #[sea_orm(nullable, indexed)]
    pub reply_id: Option<String>,

    /// Thread root id, precomputed by walking `reply_id` at create time so
    /// ancestor lookups (spec.md §4.3 reply-forwarding) don't need
    /// recursive queries.
    #[sea_orm(nullable, indexed)]
    pub thread_id: Option<String>,

    /// Actor ids mentioned via `Mention` tags.
    #[sea_orm(column_type = "JsonBinary")]
    pub mentions: Json,

    /// Explicit recipients for `visibility = Specified`.
    #[sea_orm(column_type = "JsonBinary")]
    pub visible_actor_ids: Json,

    /// Hashtags, lowercased, without the leading `#`.
    #[sea_orm(column_type = "JsonBinary")]
    pub tags: Json,

    /// Denormalized reply count.
    #[sea_orm(default_value = 0)]
    pub replies_count: i32,

    /// Denormalized share count (`Announce` + `Like`, spec.md §4.4).
    #[sea_orm(default_value = 0)]
    pub shares_count: i32,

    #[sea_orm(default_value = true)]
    pub is_local: bool,

    /// Full original `ActivityPub` object, preserved verbatim so `Update`
    /// and reply-forwarding can re-derive fields without an outbound
    /// fetch. `None` for local posts (no remote document exists).
    #[sea_orm(column_type = "JsonBinary", nullable)]
    pub raw: Option<Json>,

    /// Set by a processed `Delete`/`Tombstone`. The row is kept (children
    /// still need `reply_id` to resolve) but `text`/`cw` are cleared.
    #[sea_orm(nullable)]
    pub deleted_at: Option<DateTimeWithTimeZone>,

    pub created_at: DateTimeWithTimeZone,

    /// Set on `Update`, per spec.md §4.1 "Edit" (local) and the federated
    /// `Update` activity (remote).
    #[sea_orm(nullable)]
    pub edited_at: Option<DateTimeWithTimeZone>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::person::Entity",
        from = "Column::ActorId",
        to = "super::person::Column::Id"
    )]
    Actor,

    #[sea_orm(belongs_to = "Entity", from = "Column::ReplyId", to = "Column::Id")]
    Reply,

    #[sea_orm(has_one = "super::poll::Entity")]
    Poll,

    #[sea_orm(has_many = "super::share::Entity")]
    Shares,
}

impl Related<super::person::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Actor.def()
    }
}

impl Related<super::poll::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Poll.def()
    }
}

impl Related<super::share::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Shares.def()
    }
}

impl Model {
    /// True once a `Delete`/`Tombstone` has been processed for this post.
    #[must_use]
    pub const fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

impl ActiveModelBehavior for ActiveModel {}
