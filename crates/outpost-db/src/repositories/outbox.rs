//! Outbox + per-recipient delivery repositories (spec.md §4.6 outbox
//! writer, §5 delivery worker pool).

use std::sync::Arc;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use outpost_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, QuerySelect, Set,
};

use crate::entities::{delivery, outbox, Delivery, Outbox};

#[derive(Clone)]
pub struct OutboxRepository {
    db: Arc<DatabaseConnection>,
}

impl OutboxRepository {
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    pub async fn create(&self, model: outbox::ActiveModel) -> AppResult<outbox::Model> {
        model
            .insert(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    pub async fn find_by_actor(
        &self,
        actor_id: &str,
        limit: u64,
    ) -> AppResult<Vec<outbox::Model>> {
        Outbox::find()
            .filter(outbox::Column::ActorId.eq(actor_id))
            .order_by_desc(outbox::Column::CreatedAt)
            .limit(limit)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Looks up the authored activity a `delivery` row's `outbox_id`
    /// points at — the delivery worker needs the raw activity and the
    /// authoring actor to sign and send it.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<outbox::Model>> {
        Outbox::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}

/// Per-recipient delivery repository.
#[derive(Clone)]
pub struct DeliveryRepository {
    db: Arc<DatabaseConnection>,
}

impl DeliveryRepository {
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    pub async fn create(&self, model: delivery::ActiveModel) -> AppResult<delivery::Model> {
        model
            .insert(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Claim up to `batch_size` due, unleased, non-abandoned deliveries.
    pub async fn lease_due(
        &self,
        batch_size: u64,
        lease_secs: i64,
    ) -> AppResult<Vec<delivery::Model>> {
        let now = Utc::now();
        let due = Delivery::find()
            .filter(
                Condition::all()
                    .add(delivery::Column::DeliveredAt.is_null())
                    .add(delivery::Column::Abandoned.eq(false))
                    .add(delivery::Column::NextAttemptAt.lte(now))
                    .add(
                        Condition::any()
                            .add(delivery::Column::LeasedUntil.is_null())
                            .add(delivery::Column::LeasedUntil.lt(now)),
                    ),
            )
            .order_by_asc(delivery::Column::NextAttemptAt)
            .limit(batch_size)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let leased_until: DateTime<Utc> = now + ChronoDuration::seconds(lease_secs);
        let mut leased = Vec::with_capacity(due.len());
        for row in due {
            let mut active: delivery::ActiveModel = row.into();
            active.leased_until = Set(Some(leased_until.into()));
            let updated = active
                .update(self.db.as_ref())
                .await
                .map_err(|e| AppError::Database(e.to_string()))?;
            leased.push(updated);
        }
        Ok(leased)
    }

    pub async fn mark_delivered(&self, id: i64) -> AppResult<()> {
        if let Some(row) = Delivery::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?
        {
            let mut active: delivery::ActiveModel = row.into();
            active.delivered_at = Set(Some(Utc::now().into()));
            active.leased_until = Set(None);
            active
                .update(self.db.as_ref())
                .await
                .map_err(|e| AppError::Database(e.to_string()))?;
        }
        Ok(())
    }

    /// Schedule the next attempt per the exponential backoff schedule, or
    /// mark abandoned once `max_attempts` is reached.
    pub async fn mark_retry(
        &self,
        id: i64,
        error: &str,
        next_attempt_at: DateTime<Utc>,
        max_attempts: u32,
    ) -> AppResult<()> {
        if let Some(row) = Delivery::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?
        {
            let attempts = row.attempts + 1;
            let abandoned = attempts as u32 >= max_attempts;
            let mut active: delivery::ActiveModel = row.into();
            active.attempts = Set(attempts);
            active.last_error = Set(Some(error.to_string()));
            active.leased_until = Set(None);
            active.abandoned = Set(abandoned);
            if !abandoned {
                active.next_attempt_at = Set(next_attempt_at.into());
            }
            active
                .update(self.db.as_ref())
                .await
                .map_err(|e| AppError::Database(e.to_string()))?;
        }
        Ok(())
    }
}
