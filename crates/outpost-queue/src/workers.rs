//! Long-running worker tasks (spec.md §5): one `tokio` task per worker,
//! each on its own `tokio::time::interval` and stopping when its
//! `tokio::sync::watch<bool>` cancellation signal flips to `true`.

#![allow(missing_docs)]

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use outpost_common::AppResult;
use outpost_db::repositories::{
    DeliveryRepository, InboxRepository, OutboxRepository, PersonKeypairRepository, PollRepository,
};
use outpost_federation::client::{ApClient, DeliveryOutcome};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::dispatcher::{self, DispatchContext};
use crate::retry::RetryConfig;

/// Returns once `cancel` flips to `true`, or after `dur` elapses —
/// whichever comes first. Every worker loop iteration races its sleep
/// against this so shutdown never waits a full tick.
async fn sleep_or_cancelled(dur: Duration, cancel: &mut watch::Receiver<bool>) -> bool {
    tokio::select! {
        () = tokio::time::sleep(dur) => false,
        result = cancel.changed() => result.is_err() || *cancel.borrow(),
    }
}

/// Drains `inbox` rows one at a time, handing each to the dispatch table.
/// Permanent failures are logged and dropped; transient ones are released
/// for a later lease (spec.md §4.1/§7).
pub struct InboxPoller {
    pub inbox_repo: InboxRepository,
    pub dispatch_ctx: DispatchContext,
    pub poll_interval: Duration,
    pub lease_secs: i64,
    pub batch_size: usize,
    pub retry: RetryConfig,
}

impl InboxPoller {
    pub async fn run(self, mut cancel: watch::Receiver<bool>) {
        info!("inbox poller: starting");
        loop {
            if *cancel.borrow() {
                break;
            }

            let mut processed_any = false;
            for _ in 0..self.batch_size {
                match self.inbox_repo.lease_next(self.lease_secs).await {
                    Ok(Some(row)) => {
                        processed_any = true;
                        match dispatcher::dispatch(&self.dispatch_ctx, &row.sender, &row.raw).await
                        {
                            Ok(()) => {
                                if let Err(e) = self.inbox_repo.mark_processed(row.id).await {
                                    error!(error = %e, row_id = row.id, "inbox poller: failed to mark processed");
                                }
                            }
                            Err(e) if dispatcher::is_transient(&e) => {
                                let backoff = self.retry.delay_for_attempt(row.attempts as u32);
                                let backoff_until = Utc::now() + backoff;
                                match self
                                    .inbox_repo
                                    .mark_failed(
                                        row.id,
                                        &e.to_string(),
                                        backoff_until,
                                        self.retry.max_retries,
                                    )
                                    .await
                                {
                                    Ok(true) => warn!(error = %e, row_id = row.id, "inbox poller: max attempts reached, dropping"),
                                    Ok(false) => warn!(error = %e, row_id = row.id, ?backoff, "inbox poller: transient failure, will retry"),
                                    Err(e) => error!(error = %e, row_id = row.id, "inbox poller: failed to record failure"),
                                }
                            }
                            Err(e) => {
                                warn!(error = %e, row_id = row.id, "inbox poller: permanent failure, dropping");
                                if let Err(e) = self.inbox_repo.mark_processed(row.id).await {
                                    error!(error = %e, row_id = row.id, "inbox poller: failed to quarantine");
                                }
                            }
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        error!(error = %e, "inbox poller: failed to lease");
                        break;
                    }
                }
            }

            let wait = if processed_any {
                Duration::from_millis(50)
            } else {
                self.poll_interval
            };
            if sleep_or_cancelled(wait, &mut cancel).await {
                break;
            }
        }
        info!("inbox poller: stopped");
    }
}

/// Drains due `delivery` rows, signs and POSTs each with the authoring
/// local actor's key, and classifies the response per
/// `ApClient::deliver`'s `DeliveryOutcome` (spec.md §5/§7).
pub struct DeliveryWorker {
    pub delivery_repo: DeliveryRepository,
    pub outbox_repo: OutboxRepository,
    pub keypair_repo: PersonKeypairRepository,
    pub client: Arc<ApClient>,
    pub retry: RetryConfig,
    pub poll_interval: Duration,
    pub lease_secs: i64,
    pub batch_size: u64,
}

impl DeliveryWorker {
    pub async fn run(self, mut cancel: watch::Receiver<bool>) {
        info!("delivery worker: starting");
        loop {
            if *cancel.borrow() {
                break;
            }

            match self.drain_batch().await {
                Ok(0) => {
                    if sleep_or_cancelled(self.poll_interval, &mut cancel).await {
                        break;
                    }
                }
                Ok(_) => {
                    if sleep_or_cancelled(Duration::from_millis(50), &mut cancel).await {
                        break;
                    }
                }
                Err(e) => {
                    error!(error = %e, "delivery worker: batch failed");
                    if sleep_or_cancelled(self.poll_interval, &mut cancel).await {
                        break;
                    }
                }
            }
        }
        info!("delivery worker: stopped");
    }

    /// Leases and attempts one batch, returning how many rows it handled.
    async fn drain_batch(&self) -> AppResult<usize> {
        let leased = self
            .delivery_repo
            .lease_due(self.batch_size, self.lease_secs)
            .await?;
        let count = leased.len();

        for task in leased {
            if let Err(e) = self.attempt_one(&task).await {
                error!(error = %e, task_id = task.id, "delivery worker: attempt failed internally");
            }
        }
        Ok(count)
    }

    async fn attempt_one(
        &self,
        task: &outpost_db::entities::delivery::Model,
    ) -> AppResult<()> {
        let Some(outbox_row) = self.outbox_repo.find_by_id(&task.outbox_id).await? else {
            warn!(task_id = task.id, outbox_id = %task.outbox_id, "delivery worker: outbox row missing, abandoning");
            self.delivery_repo.mark_delivered(task.id).await?;
            return Ok(());
        };

        let Some(keypair) = self.keypair_repo.find_by_person_id(&outbox_row.actor_id).await? else {
            error!(actor = %outbox_row.actor_id, "delivery worker: no keypair for authoring actor");
            return Ok(());
        };

        let outcome = self
            .client
            .deliver(
                &task.recipient_inbox,
                &outbox_row.activity,
                &keypair.private_key_pem,
                &keypair.key_id,
            )
            .await;

        match outcome {
            Ok(DeliveryOutcome::Delivered) => {
                debug!(task_id = task.id, inbox = %task.recipient_inbox, "delivery worker: delivered");
                self.delivery_repo.mark_delivered(task.id).await?;
            }
            Ok(DeliveryOutcome::PermanentFailure { status }) => {
                warn!(task_id = task.id, status, "delivery worker: permanent failure, abandoning");
                self.delivery_repo
                    .mark_retry(task.id, &format!("permanent failure: {status}"), Utc::now(), 0)
                    .await?;
            }
            Ok(DeliveryOutcome::TransientFailure { status, body }) => {
                let next_attempt = Utc::now() + self.retry.delay_for_attempt(task.attempts as u32);
                warn!(task_id = task.id, status, "delivery worker: transient failure, scheduling retry");
                self.delivery_repo
                    .mark_retry(
                        task.id,
                        &format!("{status}: {body}"),
                        next_attempt,
                        self.retry.max_retries,
                    )
                    .await?;
            }
            Err(e) => {
                let next_attempt = Utc::now() + self.retry.delay_for_attempt(task.attempts as u32);
                warn!(task_id = task.id, error = %e, "delivery worker: transport error, scheduling retry");
                self.delivery_repo
                    .mark_retry(task.id, &e.to_string(), next_attempt, self.retry.max_retries)
                    .await?;
            }
        }
        Ok(())
    }
}

/// Periodically closes locally-hosted polls whose `expires_at` has
/// passed. Votes already reject past-expiry in `PollService::vote`; this
/// worker just flips `closed` so a poll's view no longer looks live.
pub struct PollPoller {
    pub poll_repo: PollRepository,
    pub poll_interval: Duration,
}

impl PollPoller {
    pub async fn run(self, mut cancel: watch::Receiver<bool>) {
        info!("poll poller: starting");
        loop {
            if *cancel.borrow() {
                break;
            }

            if let Err(e) = self.close_expired().await {
                error!(error = %e, "poll poller: sweep failed");
            }

            if sleep_or_cancelled(self.poll_interval, &mut cancel).await {
                break;
            }
        }
        info!("poll poller: stopped");
    }

    async fn close_expired(&self) -> AppResult<()> {
        let expired = self.poll_repo.find_expired_open(Utc::now()).await?;
        for poll in expired {
            let note_id = poll.note_id.clone();
            let mut active: outpost_db::entities::poll::ActiveModel = poll.into();
            active.closed = sea_orm::Set(true);
            if let Err(e) = self.poll_repo.update(active).await {
                error!(error = %e, note_id = %note_id, "poll poller: failed to close expired poll");
            }
        }
        Ok(())
    }
}
