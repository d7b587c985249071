//! Inbox queue repository — admission (`enqueue`) and the single poller's
//! lease/complete/fail cycle (spec.md §5).

use std::sync::Arc;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use outpost_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, QuerySelect, Set,
};

use crate::entities::{inbox, Inbox};

#[derive(Clone)]
pub struct InboxRepository {
    db: Arc<DatabaseConnection>,
}

impl InboxRepository {
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    pub async fn enqueue(&self, model: inbox::ActiveModel) -> AppResult<inbox::Model> {
        model
            .insert(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Claim the oldest unprocessed, unleased row and mark it leased for
    /// `lease_secs`. Returns `None` when the queue is empty.
    pub async fn lease_next(&self, lease_secs: i64) -> AppResult<Option<inbox::Model>> {
        let now = Utc::now();
        let candidate = Inbox::find()
            .filter(
                Condition::all().add(inbox::Column::ProcessedAt.is_null()).add(
                    Condition::any()
                        .add(inbox::Column::LeasedUntil.is_null())
                        .add(inbox::Column::LeasedUntil.lt(now)),
                ),
            )
            .order_by_asc(inbox::Column::Id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let Some(row) = candidate else {
            return Ok(None);
        };

        let leased_until: DateTime<Utc> = now + ChronoDuration::seconds(lease_secs);
        let mut active: inbox::ActiveModel = row.into();
        active.leased_until = Set(Some(leased_until.into()));
        let leased = active
            .update(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(Some(leased))
    }

    pub async fn mark_processed(&self, id: i64) -> AppResult<()> {
        if let Some(row) = Inbox::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?
        {
            let mut active: inbox::ActiveModel = row.into();
            active.processed_at = Set(Some(Utc::now().into()));
            active.leased_until = Set(None);
            active
                .update(self.db.as_ref())
                .await
                .map_err(|e| AppError::Database(e.to_string()))?;
        }
        Ok(())
    }

    /// Records a transient failure (spec.md §4.1: "exponential backoff
    /// capped at a configured ceiling; dropped after a maximum attempt
    /// count"). Releases the lease and sets `leased_until` to the next
    /// backoff deadline so `lease_next` skips it until then. Once
    /// `attempts` reaches `max_attempts` the row is marked processed
    /// (dropped) instead, and this returns `true`.
    pub async fn mark_failed(
        &self,
        id: i64,
        error: &str,
        backoff_until: DateTime<Utc>,
        max_attempts: u32,
    ) -> AppResult<bool> {
        let Some(row) = Inbox::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?
        else {
            return Ok(false);
        };

        let attempts = row.attempts + 1;
        let dropped = attempts as u32 >= max_attempts;
        let mut active: inbox::ActiveModel = row.into();
        active.attempts = Set(attempts);
        active.last_error = Set(Some(error.to_string()));
        if dropped {
            active.leased_until = Set(None);
            active.processed_at = Set(Some(Utc::now().into()));
        } else {
            active.leased_until = Set(Some(backoff_until.into()));
        }
        active
            .update(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(dropped)
    }
}
