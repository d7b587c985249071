//! Per-recipient delivery task, fanned out from an `outbox` row. A worker
//! pool (spec.md §5, sized by `DeliveryWorkers`) leases rows whose
//! `next_attempt_at` has passed and POSTs the signed activity, backing
//! off per the exponential schedule in `outpost_queue::retry`.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "delivery")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    #[sea_orm(indexed)]
    pub outbox_id: String,

    /// Destination inbox URL — the recipient's `sharedInbox` when one was
    /// available and shareable, else their personal inbox.
    pub recipient_inbox: String,

    #[sea_orm(default_value = 0)]
    pub attempts: i32,

    #[sea_orm(nullable)]
    pub last_error: Option<String>,

    pub next_attempt_at: DateTimeWithTimeZone,

    #[sea_orm(nullable)]
    pub leased_until: Option<DateTimeWithTimeZone>,

    #[sea_orm(nullable)]
    pub delivered_at: Option<DateTimeWithTimeZone>,

    /// Set once `DeliveryRetryMax` attempts have failed; the task is
    /// abandoned rather than retried further (spec.md §5/§7).
    #[sea_orm(default_value = false)]
    pub abandoned: bool,

    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::outbox::Entity",
        from = "Column::OutboxId",
        to = "super::outbox::Column::Id",
        on_delete = "Cascade"
    )]
    Outbox,
}

impl Related<super::outbox::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Outbox.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
