//! Local share/unshare authoring (spec.md §4.4's `Share` concept, the
//! local-authoring half): recording an `Announce` of someone else's post
//! on the caller's own audience, and undoing it.

use chrono::{Duration, Utc};
use outpost_common::{AppError, AppResult, IdGenerator};
use outpost_db::{
    entities::share::{self, ShareKind},
    repositories::{FollowingRepository, NoteRepository, PersonRepository, ShareRepository},
};
use sea_orm::Set;
use serde_json::json;

use crate::services::delivery::DeliveryService;

#[derive(Clone)]
pub struct ShareService {
    share_repo: ShareRepository,
    note_repo: NoteRepository,
    person_repo: PersonRepository,
    following_repo: FollowingRepository,
    delivery: Option<DeliveryService>,
    server_url: String,
    id_gen: IdGenerator,
    share_throttle: Duration,
}

impl ShareService {
    #[must_use]
    pub fn new(
        share_repo: ShareRepository,
        note_repo: NoteRepository,
        person_repo: PersonRepository,
        following_repo: FollowingRepository,
        share_throttle: Duration,
    ) -> Self {
        Self {
            share_repo,
            note_repo,
            person_repo,
            following_repo,
            delivery: None,
            server_url: String::new(),
            id_gen: IdGenerator::new(),
            share_throttle,
        }
    }

    #[must_use]
    pub fn with_delivery(mut self, delivery: DeliveryService, server_url: String) -> Self {
        self.delivery = Some(delivery);
        self.server_url = server_url;
        self
    }

    /// Shares (`Announce`s) a post to the caller's own followers. Re-sharing
    /// an already-shared post is a no-op, not a duplicate row. Share
    /// throttling is symmetric with the post throttle (spec.md §4.6): a
    /// caller who just shared must wait out the same window before sharing
    /// again, checked against their most recent share regardless of which
    /// post it targeted.
    pub async fn share(&self, actor_id: &str, note_id: &str) -> AppResult<()> {
        let note = self.note_repo.get_by_id(note_id).await?;
        if note.is_deleted() {
            return Err(AppError::NoteNotFound(note_id.to_string()));
        }
        if self
            .share_repo
            .find_by_actor_and_note(actor_id, note_id, ShareKind::Announce)
            .await?
            .is_some()
        {
            return Ok(());
        }

        if let Some(last) = self.share_repo.find_latest_by_actor(actor_id).await?
            && Utc::now().signed_duration_since(last.created_at) < self.share_throttle
        {
            return Err(AppError::BadRequest(
                "Please wait before posting again".to_string(),
            ));
        }

        let actor = self.person_repo.get_by_id(actor_id).await?;
        let activity_id = format!("{}/activities/{}", self.server_url, self.id_gen.generate());

        let model = share::ActiveModel {
            activity_id: Set(activity_id.clone()),
            actor_id: Set(actor.id.clone()),
            note_id: Set(note.id.clone()),
            kind: Set(ShareKind::Announce),
            via_group_relay: Set(false),
            created_at: Set(Utc::now().into()),
        };
        self.share_repo.create(model).await?;
        self.note_repo.increment_shares_count(&note.id).await?;

        if let Some(ref delivery) = self.delivery {
            let recipients = self.follower_inboxes(&actor.id).await?;
            if !recipients.is_empty() {
                let activity = json!({
                    "@context": "https://www.w3.org/ns/activitystreams",
                    "type": "Announce",
                    "id": activity_id,
                    "actor": actor.id,
                    "object": note.id,
                    "to": ["https://www.w3.org/ns/activitystreams#Public"],
                    "cc": [format!("{}/followers", actor.id)],
                });
                delivery
                    .enqueue(&actor.id, None, "Announce", activity, recipients)
                    .await?;
            }
        }
        Ok(())
    }

    /// Undoes a previously authored share.
    pub async fn unshare(&self, actor_id: &str, note_id: &str) -> AppResult<()> {
        let Some(existing) = self
            .share_repo
            .find_by_actor_and_note(actor_id, note_id, ShareKind::Announce)
            .await?
        else {
            return Err(AppError::NotFound("Share not found".to_string()));
        };

        self.share_repo
            .delete_by_activity_id(&existing.activity_id)
            .await?;
        self.note_repo.decrement_shares_count(note_id).await?;

        if let Some(ref delivery) = self.delivery {
            let actor = self.person_repo.get_by_id(actor_id).await?;
            let recipients = self.follower_inboxes(&actor.id).await?;
            if !recipients.is_empty() {
                let activity = json!({
                    "@context": "https://www.w3.org/ns/activitystreams",
                    "type": "Undo",
                    "id": format!("{}/activities/{}", self.server_url, self.id_gen.generate()),
                    "actor": actor.id,
                    "object": {
                        "id": existing.activity_id,
                        "type": "Announce",
                        "actor": actor.id,
                        "object": note_id,
                    },
                    "to": ["https://www.w3.org/ns/activitystreams#Public"],
                });
                delivery
                    .enqueue(&actor.id, None, "Undo", activity, recipients)
                    .await?;
            }
        }
        Ok(())
    }

    async fn follower_inboxes(&self, actor_id: &str) -> AppResult<Vec<String>> {
        let mut followers = self.following_repo.all_followers(actor_id).await?;
        Ok(followers
            .drain(..)
            .filter_map(|f| f.follower_shared_inbox.or(f.follower_inbox))
            .collect())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use outpost_db::entities::note;
    use sea_orm::{DatabaseBackend, MockDatabase};
    use serde_json::json as jsonv;
    use std::sync::Arc;

    fn note_model(id: &str) -> note::Model {
        note::Model {
            id: id.to_string(),
            local_id: "abc".to_string(),
            actor_id: "https://example.test/users/bob".to_string(),
            actor_host: None,
            text: Some("hi".to_string()),
            cw: None,
            visibility: note::Visibility::Public,
            reply_id: None,
            thread_id: None,
            mentions: jsonv([]),
            visible_actor_ids: jsonv([]),
            tags: jsonv([]),
            replies_count: 0,
            shares_count: 0,
            is_local: true,
            raw: None,
            deleted_at: None,
            created_at: Utc::now().into(),
            edited_at: None,
        }
    }

    #[tokio::test]
    async fn re_sharing_is_a_no_op() {
        let note = note_model("https://example.test/notes/1");
        let share_row = share::Model {
            activity_id: "https://example.test/activities/1".to_string(),
            actor_id: "https://example.test/users/alice".to_string(),
            note_id: note.id.clone(),
            kind: ShareKind::Announce,
            via_group_relay: false,
            created_at: Utc::now().into(),
        };
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Sqlite)
                .append_query_results([vec![note.clone()]])
                .append_query_results([vec![share_row]])
                .into_connection(),
        );
        let svc = ShareService::new(
            ShareRepository::new(db.clone()),
            NoteRepository::new(db.clone()),
            PersonRepository::new(db.clone()),
            FollowingRepository::new(db),
            Duration::seconds(30),
        );
        assert!(svc
            .share("https://example.test/users/alice", &note.id)
            .await
            .is_ok());
    }
}
