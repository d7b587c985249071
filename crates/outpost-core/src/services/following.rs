//! Follow state machine (spec.md §4.5/§4.7): `none → pending → accepted`,
//! collapsing to `none` via `Undo`, `Reject`, or `Block` on either side.

use crate::services::delivery::DeliveryService;
use outpost_common::{AppError, AppResult, IdGenerator};
use outpost_db::{
    entities::{follow_request, following, person},
    repositories::{FollowRequestRepository, FollowingRepository, PersonRepository},
};
use sea_orm::Set;
use serde_json::json;

/// Result of a locally-initiated follow.
pub enum FollowResult {
    /// The followee is local: per spec.md §4.1's Follow row, a local,
    /// non-blocking followee auto-accepts unconditionally.
    Accepted,
    /// The followee is remote: state stays `pending` until their `Accept`
    /// or `Reject` arrives through the inbox.
    Pending,
}

#[derive(Clone)]
pub struct FollowingService {
    following_repo: FollowingRepository,
    follow_request_repo: FollowRequestRepository,
    person_repo: PersonRepository,
    delivery: Option<DeliveryService>,
    server_url: String,
    id_gen: IdGenerator,
}

impl FollowingService {
    #[must_use]
    pub fn new(
        following_repo: FollowingRepository,
        follow_request_repo: FollowRequestRepository,
        person_repo: PersonRepository,
    ) -> Self {
        Self {
            following_repo,
            follow_request_repo,
            person_repo,
            delivery: None,
            server_url: String::new(),
            id_gen: IdGenerator::new(),
        }
    }

    #[must_use]
    pub fn with_delivery(
        following_repo: FollowingRepository,
        follow_request_repo: FollowRequestRepository,
        person_repo: PersonRepository,
        delivery: DeliveryService,
        server_url: String,
    ) -> Self {
        Self {
            following_repo,
            follow_request_repo,
            person_repo,
            delivery: Some(delivery),
            server_url,
            id_gen: IdGenerator::new(),
        }
    }

    /// A local actor follows `followee_id` (local or remote). Remote
    /// followees stay `pending` until their `Accept` arrives; local
    /// followees auto-accept immediately (no blocking relationship
    /// checked here — callers gate on `Block` before reaching this).
    pub async fn follow(&self, follower_id: &str, followee_id: &str) -> AppResult<FollowResult> {
        if follower_id == followee_id {
            return Err(AppError::BadRequest("Cannot follow yourself".to_string()));
        }
        if self
            .following_repo
            .is_following(follower_id, followee_id)
            .await?
        {
            return Err(AppError::BadRequest("Already following".to_string()));
        }
        if self
            .follow_request_repo
            .find_by_pair(follower_id, followee_id)
            .await?
            .is_some()
        {
            return Err(AppError::BadRequest(
                "Follow request already pending".to_string(),
            ));
        }

        let follower = self.person_repo.get_by_id(follower_id).await?;
        let followee = self.person_repo.get_by_id(followee_id).await?;

        let activity_id = format!(
            "{}/activities/follow/{}",
            self.server_url,
            self.id_gen.generate()
        );

        let request = follow_request::ActiveModel {
            id: Set(self.id_gen.generate()),
            follower_id: Set(follower.id.clone()),
            followee_id: Set(followee.id.clone()),
            follower_host: Set(follower.host.clone()),
            followee_host: Set(followee.host.clone()),
            follower_inbox: Set(Some(follower.inbox.clone())),
            follower_shared_inbox: Set(follower.shared_inbox.clone()),
            activity_id: Set(activity_id.clone()),
            created_at: Set(chrono::Utc::now().into()),
        };
        self.follow_request_repo.create(request).await?;

        if let Some(ref delivery) = self.delivery {
            let activity = json!({
                "@context": "https://www.w3.org/ns/activitystreams",
                "type": "Follow",
                "id": activity_id,
                "actor": follower.id,
                "object": followee.id,
            });
            delivery
                .enqueue(
                    &follower.id,
                    None,
                    "Follow",
                    activity,
                    vec![followee.inbox.clone()],
                )
                .await?;
        }

        if followee.is_local() {
            self.accept(&followee, &follower).await?;
            return Ok(FollowResult::Accepted);
        }

        Ok(FollowResult::Pending)
    }

    /// Promotes a pending request to `following`, deleting the request row
    /// and — when the follower is remote — queueing the `Accept`. Used
    /// both for local auto-accept and for the federation inbox processor
    /// handling an inbound `Follow` of a local actor.
    pub async fn accept(
        &self,
        followee: &person::Model,
        follower: &person::Model,
    ) -> AppResult<following::Model> {
        let request = self
            .follow_request_repo
            .find_by_pair(&follower.id, &followee.id)
            .await?;

        // A replayed Accept (or a second local auto-accept racing the
        // inbound one) must be a clean no-op, not a unique-constraint
        // error on `following(follower_id, followee_id)`.
        if let Some(existing) = self
            .following_repo
            .find_by_pair(&follower.id, &followee.id)
            .await?
        {
            if request.is_some() {
                self.follow_request_repo
                    .delete_by_pair(&follower.id, &followee.id)
                    .await?;
            }
            return Ok(existing);
        }

        let following_row = self.create_following(follower, followee).await?;

        if let Some(request) = request {
            self.follow_request_repo
                .delete_by_pair(&follower.id, &followee.id)
                .await?;

            if follower.host.is_some()
                && let Some(ref delivery) = self.delivery
            {
                let accept_id = format!(
                    "{}/activities/accept/{}",
                    self.server_url,
                    self.id_gen.generate()
                );
                let activity = json!({
                    "@context": "https://www.w3.org/ns/activitystreams",
                    "type": "Accept",
                    "id": accept_id,
                    "actor": followee.id,
                    "object": {
                        "type": "Follow",
                        "id": request.activity_id,
                        "actor": follower.id,
                        "object": followee.id,
                    },
                });
                delivery
                    .enqueue(&followee.id, None, "Accept", activity, vec![follower.inbox.clone()])
                    .await?;
            }
        }

        Ok(following_row)
    }

    /// Rejects a pending request — the row is dropped, no `following` row
    /// is ever created.
    pub async fn reject(&self, followee: &person::Model, follower: &person::Model) -> AppResult<()> {
        let request = self
            .follow_request_repo
            .find_by_pair(&follower.id, &followee.id)
            .await?;
        self.follow_request_repo
            .delete_by_pair(&follower.id, &followee.id)
            .await?;

        if let Some(request) = request
            && follower.host.is_some()
            && let Some(ref delivery) = self.delivery
        {
            let reject_id = format!(
                "{}/activities/reject/{}",
                self.server_url,
                self.id_gen.generate()
            );
            let activity = json!({
                "@context": "https://www.w3.org/ns/activitystreams",
                "type": "Reject",
                "id": reject_id,
                "actor": followee.id,
                "object": {
                    "type": "Follow",
                    "id": request.activity_id,
                    "actor": follower.id,
                    "object": followee.id,
                },
            });
            delivery
                .enqueue(&followee.id, None, "Reject", activity, vec![follower.inbox.clone()])
                .await?;
        }

        Ok(())
    }

    async fn create_following(
        &self,
        follower: &person::Model,
        followee: &person::Model,
    ) -> AppResult<following::Model> {
        let model = following::ActiveModel {
            id: Set(self.id_gen.generate()),
            follower_id: Set(follower.id.clone()),
            followee_id: Set(followee.id.clone()),
            follower_host: Set(follower.host.clone()),
            followee_host: Set(followee.host.clone()),
            follower_inbox: Set(Some(follower.inbox.clone())),
            follower_shared_inbox: Set(follower.shared_inbox.clone()),
            followee_inbox: Set(Some(followee.inbox.clone())),
            followee_shared_inbox: Set(followee.shared_inbox.clone()),
            created_at: Set(chrono::Utc::now().into()),
        };
        self.following_repo.create(model).await
    }

    /// Unfollows, dropping either a `pending` or `accepted` edge and
    /// emitting `Undo(Follow)` toward a remote followee.
    pub async fn unfollow(&self, follower_id: &str, followee_id: &str) -> AppResult<()> {
        let was_pending = self
            .follow_request_repo
            .find_by_pair(follower_id, followee_id)
            .await?
            .is_some();
        let was_following = self
            .following_repo
            .is_following(follower_id, followee_id)
            .await?;

        if !was_pending && !was_following {
            return Err(AppError::BadRequest("Not following".to_string()));
        }

        let follower = self.person_repo.get_by_id(follower_id).await?;
        let followee = self.person_repo.get_by_id(followee_id).await?;

        self.follow_request_repo
            .delete_by_pair(follower_id, followee_id)
            .await?;
        self.following_repo
            .delete_by_pair(follower_id, followee_id)
            .await?;

        if followee.host.is_some()
            && let Some(ref delivery) = self.delivery
        {
            let undo_id = format!(
                "{}/activities/undo/{}",
                self.server_url,
                self.id_gen.generate()
            );
            let activity = json!({
                "@context": "https://www.w3.org/ns/activitystreams",
                "type": "Undo",
                "id": undo_id,
                "actor": follower.id,
                "object": {
                    "type": "Follow",
                    "actor": follower.id,
                    "object": followee.id,
                },
            });
            delivery
                .enqueue(&follower.id, None, "Undo", activity, vec![followee.inbox.clone()])
                .await?;
        }

        Ok(())
    }

    /// Collapses any existing state between the two actors directly to
    /// `none` (spec.md §4.1 Block), on both sides.
    pub async fn sever_on_block(&self, a_id: &str, b_id: &str) -> AppResult<()> {
        self.follow_request_repo.delete_by_pair(a_id, b_id).await?;
        self.follow_request_repo.delete_by_pair(b_id, a_id).await?;
        self.following_repo.delete_by_pair(a_id, b_id).await?;
        self.following_repo.delete_by_pair(b_id, a_id).await?;
        Ok(())
    }

    pub async fn get_followers(
        &self,
        actor_id: &str,
        limit: u64,
        until_id: Option<&str>,
    ) -> AppResult<Vec<following::Model>> {
        self.following_repo
            .find_followers(actor_id, limit, until_id)
            .await
    }

    pub async fn all_follower_inboxes(&self, actor_id: &str) -> AppResult<Vec<String>> {
        let rows = self.following_repo.all_followers(actor_id).await?;
        Ok(rows
            .into_iter()
            .filter_map(|row| row.follower_shared_inbox.or(row.follower_inbox))
            .collect())
    }

    pub async fn is_following(&self, follower_id: &str, followee_id: &str) -> AppResult<bool> {
        self.following_repo
            .is_following(follower_id, followee_id)
            .await
    }

    pub async fn get_pending_requests(
        &self,
        followee_id: &str,
        limit: u64,
        until_id: Option<&str>,
    ) -> AppResult<Vec<follow_request::Model>> {
        self.follow_request_repo
            .find_received(followee_id, limit, until_id)
            .await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use sea_orm::{DatabaseBackend, MockDatabase};
    use std::sync::Arc;

    fn edge(id: &str, follower: &str, followee: &str) -> following::Model {
        following::Model {
            id: id.to_string(),
            follower_id: follower.to_string(),
            followee_id: followee.to_string(),
            follower_host: None,
            followee_host: None,
            follower_inbox: None,
            follower_shared_inbox: None,
            followee_inbox: None,
            followee_shared_inbox: None,
            created_at: chrono::Utc::now().into(),
        }
    }

    fn service() -> FollowingService {
        let db1 = Arc::new(MockDatabase::new(DatabaseBackend::Sqlite).into_connection());
        let db2 = Arc::new(MockDatabase::new(DatabaseBackend::Sqlite).into_connection());
        let db3 = Arc::new(MockDatabase::new(DatabaseBackend::Sqlite).into_connection());
        FollowingService::new(
            FollowingRepository::new(db1),
            FollowRequestRepository::new(db2),
            PersonRepository::new(db3),
        )
    }

    fn actor(id: &str) -> person::Model {
        person::Model {
            id: id.to_string(),
            kind: person::ActorKind::Person,
            preferred_username: id.to_string(),
            host: None,
            inbox: format!("{id}/inbox"),
            shared_inbox: None,
            followers: format!("{id}/followers"),
            bio: None,
            public_key_pem: None,
            moved_to: None,
            also_known_as: None,
            published: chrono::Utc::now().into(),
            last_fetched_at: None,
        }
    }

    /// A duplicate inbound `Accept` (or a racing local auto-accept) must
    /// be a clean no-op, not a `following` UNIQUE INDEX violation.
    #[tokio::test]
    async fn accept_is_idempotent_when_already_following() {
        let follower = actor("https://example.test/users/bob");
        let followee = actor("https://example.test/users/alice");
        let existing = edge("existing", &follower.id, &followee.id);

        let following_db = Arc::new(
            MockDatabase::new(DatabaseBackend::Sqlite)
                .append_query_results([[existing.clone()]])
                .into_connection(),
        );
        let follow_request_db = Arc::new(
            MockDatabase::new(DatabaseBackend::Sqlite)
                .append_query_results([Vec::<follow_request::Model>::new()])
                .into_connection(),
        );
        let person_db = Arc::new(MockDatabase::new(DatabaseBackend::Sqlite).into_connection());

        let svc = FollowingService::new(
            FollowingRepository::new(following_db),
            FollowRequestRepository::new(follow_request_db),
            PersonRepository::new(person_db),
        );

        // No second `following::create` query result is registered above;
        // if `accept` tried to insert again this would panic on an
        // unconfigured exec, proving the guard short-circuits first.
        let row = svc.accept(&followee, &follower).await.unwrap();
        assert_eq!(row.id, existing.id);
    }

    #[tokio::test]
    async fn follow_yourself_is_rejected() {
        let result = service().follow("alice", "alice").await;
        assert!(matches!(result, Err(AppError::BadRequest(_))));
    }

    #[tokio::test]
    async fn is_following_reads_through_repo() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Sqlite)
                .append_query_results([[edge("f1", "alice", "bob")]])
                .into_connection(),
        );
        let svc = FollowingService::new(
            FollowingRepository::new(db),
            FollowRequestRepository::new(Arc::new(
                MockDatabase::new(DatabaseBackend::Sqlite).into_connection(),
            )),
            PersonRepository::new(Arc::new(
                MockDatabase::new(DatabaseBackend::Sqlite).into_connection(),
            )),
        );
        assert!(svc.is_following("alice", "bob").await.unwrap());
    }
}
