//! Dispatch-table integration tests exercising the admission and
//! follow-family paths end to end against a mocked database (spec.md §8
//! invariants and S1/S4-adjacent scenarios).

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use outpost_core::services::{FeedService, FollowingService, NoOpDelivery, PollService};
use outpost_db::entities::note;
use outpost_db::entities::person::{self, ActorKind};
use outpost_db::repositories::{
    FeedRepository, FollowRequestRepository, FollowingRepository, HashtagRepository,
    NoteRepository, PersonRepository, PollRepository, PollVoteRepository,
};
use outpost_federation::client::ApClient;
use outpost_queue::dispatcher::{self, DispatchContext};
use sea_orm::{DatabaseBackend, MockDatabase};
use serde_json::json;

fn actor(id: &str, local: bool) -> person::Model {
    person::Model {
        id: id.to_string(),
        kind: ActorKind::Person,
        preferred_username: "alice".to_string(),
        host: if local { None } else { Some("remote.example".to_string()) },
        inbox: format!("{id}/inbox"),
        shared_inbox: None,
        followers: format!("{id}/followers"),
        bio: None,
        public_key_pem: Some("-----BEGIN PUBLIC KEY-----\n-----END PUBLIC KEY-----".to_string()),
        moved_to: None,
        also_known_as: None,
        published: Utc::now().into(),
        last_fetched_at: None,
    }
}

fn context(db: Arc<sea_orm::DatabaseConnection>) -> DispatchContext {
    let person_repo = PersonRepository::new(db.clone());
    let note_repo = NoteRepository::new(db.clone());
    let poll_repo = PollRepository::new(db.clone());
    let vote_repo = PollVoteRepository::new(db.clone());
    let following_repo = FollowingRepository::new(db.clone());
    let follow_request_repo = FollowRequestRepository::new(db.clone());
    let share_repo = outpost_db::repositories::ShareRepository::new(db.clone());
    let hashtag_repo = HashtagRepository::new(db.clone());
    let feed_repo = FeedRepository::new(db.clone());

    let following_service = FollowingService::new(
        following_repo.clone(),
        follow_request_repo.clone(),
        person_repo.clone(),
    );
    let poll_service = PollService::new(poll_repo.clone(), vote_repo.clone());
    let feed_service = FeedService::new(feed_repo, following_repo.clone(), note_repo.clone());

    DispatchContext::new(
        person_repo,
        note_repo,
        poll_repo,
        vote_repo,
        following_repo,
        follow_request_repo,
        share_repo,
        hashtag_repo,
        following_service,
        poll_service,
        feed_service,
        Arc::new(NoOpDelivery),
        Arc::new(ApClient::new("https://example.test")),
        Arc::new(HashSet::new()),
        4,
        false,
    )
}

#[tokio::test]
async fn follow_of_unknown_local_actor_is_dropped_not_errored() {
    let remote = actor("https://remote.example/users/bob", false);
    let db = Arc::new(
        MockDatabase::new(DatabaseBackend::Sqlite)
            // ensure_person(sender) finds the remote follower already on file
            .append_query_results([vec![remote.clone()]])
            // followee lookup finds nothing local
            .append_query_results([Vec::<person::Model>::new()])
            .into_connection(),
    );
    let ctx = context(db);

    let activity = json!({
        "type": "Follow",
        "id": "https://remote.example/activities/1",
        "actor": remote.id,
        "object": "https://example.test/users/nobody",
    });

    let result = dispatcher::dispatch(&ctx, &remote.id, &activity).await;
    assert!(result.is_ok());
}

#[tokio::test]
async fn sender_actor_mismatch_is_rejected_at_admission() {
    let db = Arc::new(MockDatabase::new(DatabaseBackend::Sqlite).into_connection());
    let ctx = context(db);

    let activity = json!({
        "type": "Follow",
        "id": "https://remote.example/activities/1",
        "actor": "https://remote.example/users/bob",
        "object": "https://example.test/users/alice",
    });

    let result = dispatcher::dispatch(&ctx, "https://remote.example/users/eve", &activity).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn blocked_host_is_rejected_at_admission() {
    let db = Arc::new(MockDatabase::new(DatabaseBackend::Sqlite).into_connection());
    let person_repo = PersonRepository::new(db.clone());
    let note_repo = NoteRepository::new(db.clone());
    let poll_repo = PollRepository::new(db.clone());
    let vote_repo = PollVoteRepository::new(db.clone());
    let following_repo = FollowingRepository::new(db.clone());
    let follow_request_repo = FollowRequestRepository::new(db.clone());
    let share_repo = outpost_db::repositories::ShareRepository::new(db.clone());
    let hashtag_repo = HashtagRepository::new(db.clone());
    let feed_repo = FeedRepository::new(db.clone());

    let following_service = FollowingService::new(
        following_repo.clone(),
        follow_request_repo.clone(),
        person_repo.clone(),
    );
    let poll_service = PollService::new(poll_repo.clone(), vote_repo.clone());
    let feed_service = FeedService::new(feed_repo, following_repo.clone(), note_repo.clone());

    let mut block_list = HashSet::new();
    block_list.insert("blocked.example".to_string());

    let ctx = DispatchContext::new(
        person_repo,
        note_repo,
        poll_repo,
        vote_repo,
        following_repo,
        follow_request_repo,
        share_repo,
        hashtag_repo,
        following_service,
        poll_service,
        feed_service,
        Arc::new(NoOpDelivery),
        Arc::new(ApClient::new("https://example.test")),
        Arc::new(block_list),
        4,
        false,
    );

    let activity = json!({
        "type": "Follow",
        "id": "https://blocked.example/activities/1",
        "actor": "https://blocked.example/users/bob",
        "object": "https://example.test/users/alice",
    });

    let result = dispatcher::dispatch(&ctx, "https://blocked.example/users/bob", &activity).await;
    assert!(result.is_err());
}

fn note(id: &str, actor_id: &str) -> note::Model {
    note::Model {
        id: id.to_string(),
        local_id: "abc".to_string(),
        actor_id: actor_id.to_string(),
        actor_host: Some("orig.example".to_string()),
        text: Some("hi".to_string()),
        cw: None,
        visibility: note::Visibility::Public,
        reply_id: None,
        thread_id: None,
        mentions: json!([]),
        visible_actor_ids: json!([]),
        tags: json!([]),
        replies_count: 0,
        shares_count: 0,
        is_local: false,
        raw: None,
        deleted_at: None,
        created_at: Utc::now().into(),
        edited_at: None,
    }
}

#[tokio::test]
async fn group_relayed_delete_from_non_author_is_dropped_by_default() {
    let group = actor("https://relay.example/groups/g", false);
    let mut group_model = group.clone();
    group_model.kind = ActorKind::Group;
    let target = note(
        "https://orig.example/notes/1",
        "https://orig.example/users/carol",
    );

    let db = Arc::new(
        MockDatabase::new(DatabaseBackend::Sqlite)
            // ensure_person(sender) finds the relaying Group already on file
            .append_query_results([vec![group_model.clone()]])
            // note_repo.find_by_id(object_id) for the relayed Delete's target
            .append_query_results([vec![target.clone()]])
            .into_connection(),
    );
    let ctx = context(db);

    let activity = json!({
        "type": "Announce",
        "id": "https://relay.example/activities/1",
        "actor": group_model.id,
        "to": ["https://www.w3.org/ns/activitystreams#Public"],
        "object": {
            "type": "Delete",
            "id": "https://orig.example/activities/delete-1",
            "actor": "https://impostor.example/users/mallory",
            "object": target.id,
        },
    });

    let result = dispatcher::dispatch(&ctx, &group_model.id, &activity).await;
    assert!(result.is_ok());
}

#[test]
fn database_errors_are_transient_but_bad_requests_are_not() {
    assert!(dispatcher::is_transient(&outpost_common::AppError::Database(
        "connection reset".to_string()
    )));
    assert!(!dispatcher::is_transient(&outpost_common::AppError::BadRequest(
        "malformed".to_string()
    )));
}
