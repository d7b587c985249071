//! `ActivityPub` delivery service.
//!
//! Provides an abstraction for queueing outbound activities without core
//! services depending directly on `outpost-db`'s delivery fan-out
//! machinery or, transitively, on `outpost-federation`'s signing/HTTP
//! stack.

use async_trait::async_trait;
use chrono::Utc;
use outpost_common::{AppError, AppResult, IdGenerator};
use outpost_db::{
    entities::{delivery, outbox},
    repositories::{DeliveryRepository, OutboxRepository},
};
use sea_orm::Set;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;

/// Queues one outbound activity, recording it once in `outbox` and fanning
/// a `delivery` task out to each distinct recipient inbox.
#[async_trait]
pub trait ActivityDelivery: Send + Sync {
    /// Queue `activity` (of the given `activity_type`, e.g. `"Follow"`,
    /// `"Create"`, `"Undo"`) as authored by `actor_id`, to be delivered to
    /// each inbox in `recipient_inboxes`.
    ///
    /// `sender_id` is `Some(group_id)` when this row is delivered under a
    /// Group relay's authority rather than the actor's own (spec.md §4.4
    /// case 2); `None` for ordinary self-authored delivery.
    async fn enqueue(
        &self,
        actor_id: &str,
        sender_id: Option<&str>,
        activity_type: &str,
        activity: Value,
        recipient_inboxes: Vec<String>,
    ) -> AppResult<()>;
}

/// A no-op implementation for tests or when federation delivery is disabled.
#[derive(Clone, Default)]
pub struct NoOpDelivery;

#[async_trait]
impl ActivityDelivery for NoOpDelivery {
    async fn enqueue(
        &self,
        _actor_id: &str,
        _sender_id: Option<&str>,
        _activity_type: &str,
        _activity: Value,
        _recipient_inboxes: Vec<String>,
    ) -> AppResult<()> {
        Ok(())
    }
}

/// Writes directly to the `outbox`/`delivery` tables. `outpost-queue`'s
/// delivery worker pool drains the rows this produces.
#[derive(Clone)]
pub struct OutboxDelivery {
    outbox_repo: OutboxRepository,
    delivery_repo: DeliveryRepository,
    id_gen: IdGenerator,
}

impl OutboxDelivery {
    #[must_use]
    pub const fn new(outbox_repo: OutboxRepository, delivery_repo: DeliveryRepository) -> Self {
        Self {
            outbox_repo,
            delivery_repo,
            id_gen: IdGenerator::new(),
        }
    }
}

#[async_trait]
impl ActivityDelivery for OutboxDelivery {
    async fn enqueue(
        &self,
        actor_id: &str,
        sender_id: Option<&str>,
        activity_type: &str,
        activity: Value,
        recipient_inboxes: Vec<String>,
    ) -> AppResult<()> {
        let outbox_id = self.id_gen.generate();
        let model = outbox::ActiveModel {
            id: Set(outbox_id.clone()),
            actor_id: Set(actor_id.to_string()),
            sender_id: Set(sender_id.map(str::to_string)),
            activity_type: Set(activity_type.to_string()),
            activity: Set(activity),
            created_at: Set(Utc::now().into()),
        };
        self.outbox_repo.create(model).await?;

        // Dedup recipients — sharedInbox fan-out commonly repeats a URL
        // across several followers of the same remote instance.
        let distinct: HashSet<String> = recipient_inboxes.into_iter().collect();
        for inbox in distinct {
            let task = delivery::ActiveModel {
                id: sea_orm::NotSet,
                outbox_id: Set(outbox_id.clone()),
                recipient_inbox: Set(inbox),
                attempts: Set(0),
                last_error: Set(None),
                next_attempt_at: Set(Utc::now().into()),
                leased_until: Set(None),
                delivered_at: Set(None),
                abandoned: Set(false),
                created_at: Set(Utc::now().into()),
            };
            self.delivery_repo
                .create(task)
                .await
                .map_err(|e| AppError::Database(e.to_string()))?;
        }

        Ok(())
    }
}

pub type DeliveryService = Arc<dyn ActivityDelivery>;
