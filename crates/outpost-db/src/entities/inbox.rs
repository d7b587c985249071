//! Inbox queue row: one per received activity, admitted but not yet (or
//! not successfully) processed. Dispatched by a single poller task per
//! spec.md §5's "inbox queue is a single-writer, ordered-by-arrival log" —
//! `leased_until` exists only so a crash mid-processing doesn't wedge the
//! row forever, not to support concurrent dispatch.

use sea_orm::entity::prelude::*;
use serde_json::Value as JsonValue;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "inbox")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    /// `actor` field of the envelope, pre-signature-verification.
    pub sender: String,

    pub activity_type: String,

    /// Full activity JSON as received.
    #[sea_orm(column_type = "JsonBinary")]
    pub raw: JsonValue,

    pub received_at: DateTimeWithTimeZone,

    #[sea_orm(default_value = 0)]
    pub attempts: i32,

    #[sea_orm(nullable)]
    pub last_error: Option<String>,

    /// Claimed-until marker simulating `SELECT ... FOR UPDATE SKIP LOCKED`
    /// on `SQLite`, which has no row-level locking.
    #[sea_orm(nullable)]
    pub leased_until: Option<DateTimeWithTimeZone>,

    #[sea_orm(nullable)]
    pub processed_at: Option<DateTimeWithTimeZone>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
