//! Actor entity (spec.md §3 "Actor").
//!
//! Unique by `id` (the `ActivityPub` URL). Local actors carry `host = NULL`.
//! Remote actors are "observed" copies refreshed on staleness or an
//! explicit `Update`.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Actor kind, closed per spec.md §3.
#[derive(Debug, Clone, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
pub enum ActorKind {
    #[sea_orm(string_value = "person")]
    Person,
    #[sea_orm(string_value = "group")]
    Group,
    #[sea_orm(string_value = "application")]
    Application,
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "person")]
pub struct Model {
    /// `ActivityPub` actor id (URL), globally unique.
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    pub kind: ActorKind,

    pub preferred_username: String,

    /// NULL = local actor, Some(host) = remote actor.
    #[sea_orm(nullable, indexed)]
    pub host: Option<String>,

    pub inbox: String,

    #[sea_orm(nullable)]
    pub shared_inbox: Option<String>,

    pub followers: String,

    /// Free-text profile bio, set via the text interface's `bio/set`
    /// command (spec.md §6). `None` renders as empty on `bio`.
    #[sea_orm(column_type = "Text", nullable)]
    pub bio: Option<String>,

    /// RSA public key PEM (remote actors only; local actors' keys live in
    /// `person_keypair`).
    #[sea_orm(column_type = "Text", nullable)]
    pub public_key_pem: Option<String>,

    /// `ActivityPub` id this actor has `Move`d to, if any (spec.md §4.1 Move).
    #[sea_orm(nullable)]
    pub moved_to: Option<String>,

    /// Ids this actor claims as prior identities (`alsoKnownAs`). A `Move`
    /// only rewrites a follower's edge when the target actor names the
    /// moving actor here — otherwise the alias isn't mutual and the move
    /// is recorded but not acted on (spec.md §4.1 Move).
    #[sea_orm(column_type = "Json", nullable)]
    pub also_known_as: Option<serde_json::Value>,

    pub published: DateTimeWithTimeZone,

    /// Last time a remote actor document was (re)fetched. `None` for local
    /// actors, which are never stale.
    #[sea_orm(nullable)]
    pub last_fetched_at: Option<DateTimeWithTimeZone>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_one = "super::person_keypair::Entity")]
    Keypair,
    #[sea_orm(has_many = "super::note::Entity")]
    Notes,
}

impl Related<super::person_keypair::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Keypair.def()
    }
}

impl Related<super::note::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Notes.def()
    }
}

impl Model {
    /// True for actors hosted by this instance.
    #[must_use]
    pub const fn is_local(&self) -> bool {
        self.host.is_none()
    }
}

impl ActiveModelBehavior for ActiveModel {}
