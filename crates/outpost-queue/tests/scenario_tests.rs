//! End-to-end dispatcher scenarios against a real in-memory `SQLite`
//! database (spec.md §8): group relay, reply forwarding and its depth
//! boundary, the poll vote-vs-reply split, and the feed purge that a
//! severed follow must trigger.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use outpost_core::services::{
    CreateNoteInput, FeedService, FollowingService, NoOpDelivery, NoteService, OutboxDelivery,
    PollService,
};
use outpost_db::entities::note::{self, Visibility};
use outpost_db::entities::person::{self, ActorKind};
use outpost_db::entities::{following, Delivery, Outbox};
use outpost_db::repositories::{
    DeliveryRepository, FeedRepository, FollowRequestRepository, FollowingRepository,
    HashtagRepository, NoteRepository, OutboxRepository, PersonRepository, PollRepository,
    PollVoteRepository,
};
use outpost_db::test_utils::TestDatabase;
use outpost_federation::client::ApClient;
use outpost_queue::dispatcher::{self, DispatchContext};
use sea_orm::{DatabaseConnection, EntityTrait};
use serde_json::{json, Value};

fn local_actor(username: &str) -> person::ActiveModel {
    use sea_orm::Set;
    let id = format!("https://example.test/users/{username}");
    person::ActiveModel {
        id: Set(id.clone()),
        kind: Set(ActorKind::Person),
        preferred_username: Set(username.to_string()),
        host: Set(None),
        inbox: Set(format!("{id}/inbox")),
        shared_inbox: Set(Some("https://example.test/inbox".to_string())),
        followers: Set(format!("{id}/followers")),
        bio: Set(None),
        public_key_pem: Set(None),
        moved_to: Set(None),
        also_known_as: Set(None),
        published: Set(Utc::now().into()),
        last_fetched_at: Set(None),
    }
}

fn remote_actor(username: &str, host: &str, kind: ActorKind) -> person::ActiveModel {
    use sea_orm::Set;
    let id = format!("https://{host}/users/{username}");
    person::ActiveModel {
        id: Set(id.clone()),
        kind: Set(kind),
        preferred_username: Set(username.to_string()),
        host: Set(Some(host.to_string())),
        inbox: Set(format!("{id}/inbox")),
        shared_inbox: Set(Some(format!("https://{host}/inbox"))),
        followers: Set(format!("{id}/followers")),
        bio: Set(None),
        public_key_pem: Set(Some(
            "-----BEGIN PUBLIC KEY-----\n-----END PUBLIC KEY-----".to_string(),
        )),
        moved_to: Set(None),
        also_known_as: Set(None),
        published: Set(Utc::now().into()),
        last_fetched_at: Set(Some(Utc::now().into())),
    }
}

fn local_note(id: &str, actor_id: &str, visibility: Visibility) -> note::ActiveModel {
    use sea_orm::Set;
    note::ActiveModel {
        id: Set(id.to_string()),
        local_id: Set(outpost_common::hash_local_id(id)),
        actor_id: Set(actor_id.to_string()),
        actor_host: Set(None),
        text: Set(Some("root post".to_string())),
        cw: Set(None),
        visibility: Set(visibility),
        reply_id: Set(None),
        thread_id: Set(None),
        mentions: Set(json!([])),
        visible_actor_ids: Set(json!([])),
        tags: Set(json!([])),
        replies_count: Set(0),
        shares_count: Set(0),
        is_local: Set(true),
        raw: Set(None),
        deleted_at: Set(None),
        created_at: Set(Utc::now().into()),
        edited_at: Set(None),
    }
}

/// A remote ancestor note, with the `raw` payload a forwarded activity
/// would need to replay verbatim.
fn remote_note(id: &str, actor_id: &str, reply_id: Option<&str>) -> note::ActiveModel {
    use sea_orm::Set;
    let raw = json!({
        "id": id,
        "type": "Note",
        "attributedTo": actor_id,
        "content": "hi",
        "inReplyTo": reply_id,
        "to": ["https://www.w3.org/ns/activitystreams#Public"],
        "cc": [],
        "published": Utc::now().to_rfc3339(),
    });
    note::ActiveModel {
        id: Set(id.to_string()),
        local_id: Set(outpost_common::hash_local_id(id)),
        actor_id: Set(actor_id.to_string()),
        actor_host: Set(Some("remote.example".to_string())),
        text: Set(Some("hi".to_string())),
        cw: Set(None),
        visibility: Set(Visibility::Public),
        reply_id: Set(reply_id.map(str::to_string)),
        thread_id: Set(None),
        mentions: Set(json!([])),
        visible_actor_ids: Set(json!([])),
        tags: Set(json!([])),
        replies_count: Set(0),
        shares_count: Set(0),
        is_local: Set(false),
        raw: Set(Some(raw)),
        deleted_at: Set(None),
        created_at: Set(Utc::now().into()),
        edited_at: Set(None),
    }
}

struct Harness {
    db: Arc<DatabaseConnection>,
}

impl Harness {
    async fn new() -> Self {
        let test_db = TestDatabase::new().await.expect("migrations apply");
        Self {
            db: Arc::new(test_db.conn),
        }
    }

    fn person_repo(&self) -> PersonRepository {
        PersonRepository::new(self.db.clone())
    }

    fn note_repo(&self) -> NoteRepository {
        NoteRepository::new(self.db.clone())
    }

    fn following_repo(&self) -> FollowingRepository {
        FollowingRepository::new(self.db.clone())
    }

    fn share_repo(&self) -> outpost_db::repositories::ShareRepository {
        outpost_db::repositories::ShareRepository::new(self.db.clone())
    }

    /// A `NoteService` wired to this harness's real repositories, for
    /// exercising local-authoring scenarios (e.g. the Group Relay's
    /// local-initiation shape) the same way `outpost-text` would.
    fn note_service(&self, delivery: outpost_core::services::DeliveryService) -> NoteService {
        NoteService::new(
            self.note_repo(),
            self.person_repo(),
            self.following_repo(),
            HashtagRepository::new(self.db.clone()),
            self.share_repo(),
            chrono::Duration::zero(),
            chrono::Duration::zero(),
            5000,
            10,
        )
        .with_delivery(delivery, "https://example.test".to_string())
    }

    /// Builds a `DispatchContext` wired to real repositories against this
    /// harness's database. `max_forwarding_depth` and the delivery sink
    /// are the only pieces that vary per scenario.
    fn context(&self, max_forwarding_depth: u32, delivery: outpost_core::services::DeliveryService) -> DispatchContext {
        let person_repo = self.person_repo();
        let note_repo = self.note_repo();
        let poll_repo = PollRepository::new(self.db.clone());
        let vote_repo = PollVoteRepository::new(self.db.clone());
        let following_repo = self.following_repo();
        let follow_request_repo = FollowRequestRepository::new(self.db.clone());
        let share_repo = outpost_db::repositories::ShareRepository::new(self.db.clone());
        let hashtag_repo = HashtagRepository::new(self.db.clone());
        let feed_repo = FeedRepository::new(self.db.clone());

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
            delivery,
            Arc::new(ApClient::new("https://example.test")),
            Arc::new(HashSet::new()),
            max_forwarding_depth,
            false,
        )
    }

    async fn follow(&self, follower_id: &str, followee_id: &str, follower_inbox: &str) {
        use sea_orm::Set;
        self.following_repo()
            .create(following::ActiveModel {
                id: Set(outpost_common::IdGenerator::new().generate()),
                follower_id: Set(follower_id.to_string()),
                followee_id: Set(followee_id.to_string()),
                follower_host: Set(None),
                followee_host: Set(None),
                follower_inbox: Set(Some(follower_inbox.to_string())),
                follower_shared_inbox: Set(None),
                followee_inbox: Set(None),
                followee_shared_inbox: Set(None),
                created_at: Set(Utc::now().into()),
            })
            .await
            .expect("follow edge inserted");
    }
}

fn create_activity(actor: &str, object: Value) -> Value {
    json!({
        "type": "Create",
        "id": format!("{actor}/activities/{}", object.get("id").and_then(Value::as_str).unwrap_or("x")),
        "actor": actor,
        "to": object.get("to").cloned().unwrap_or(json!([])),
        "cc": object.get("cc").cloned().unwrap_or(json!([])),
        "object": object,
    })
}

// === Group relay: a Group's Announce of a Create persists the note and
// fans it out to the Group's own followers (spec.md §4.4). ===
#[tokio::test]
async fn group_announce_of_new_create_persists_and_fans_out_to_group_followers() {
    let h = Harness::new().await;
    let group = remote_actor("news", "relay.example", ActorKind::Group);
    let author = remote_actor("carol", "orig.example", ActorKind::Person);
    let local_follower = local_actor("dave");

    h.person_repo().create(group.clone()).await.unwrap();
    h.person_repo().create(author.clone()).await.unwrap();
    let dave = h.person_repo().create(local_follower).await.unwrap();
    let group_id = "https://relay.example/users/news".to_string();
    let author_id = "https://orig.example/users/carol".to_string();

    h.follow(&dave.id, &group_id, &format!("{group_id}/inbox")).await;

    let ctx = h.context(4, Arc::new(NoOpDelivery));

    let note_id = "https://orig.example/notes/1";
    let wrapped_create = json!({
        "type": "Create",
        "id": "https://orig.example/activities/create-1",
        "actor": author_id,
        "object": {
            "id": note_id,
            "type": "Note",
            "attributedTo": author_id,
            "content": "breaking news",
            "to": ["https://www.w3.org/ns/activitystreams#Public"],
            "cc": [],
            "published": Utc::now().to_rfc3339(),
        },
    });
    let announce = json!({
        "type": "Announce",
        "id": "https://relay.example/activities/announce-1",
        "actor": group_id,
        "to": ["https://www.w3.org/ns/activitystreams#Public"],
        "object": wrapped_create,
    });

    dispatcher::dispatch(&ctx, &group_id, &announce)
        .await
        .expect("group announce dispatched");

    let note = h.note_repo().find_by_id(note_id).await.unwrap();
    assert!(note.is_some(), "relayed note must be persisted");

    let feed_repo = FeedRepository::new(h.db.clone());
    let dave_feed = feed_repo.find_all_for_owner(&dave.id).await.unwrap();
    assert!(
        dave_feed.iter().any(|row| row.note_id == note_id),
        "a local follower of the relaying Group must see the relayed note in their feed"
    );

    let share_repo = outpost_db::repositories::ShareRepository::new(h.db.clone());
    let share = share_repo
        .find_by_activity_id("https://relay.example/activities/announce-1")
        .await
        .unwrap();
    assert!(share.is_some_and(|s| s.via_group_relay), "relay must be recorded as a group relay");
}

// === Reply forwarding: a reply to a local actor's public-visible
// ancestor is re-delivered verbatim to that actor's followers (spec.md
// §4.3). ===
#[tokio::test]
async fn reply_to_local_public_post_is_forwarded_to_authors_followers() {
    let h = Harness::new().await;
    let alice = local_actor("alice");
    let alice = h.person_repo().create(alice).await.unwrap();
    let bob = remote_actor("bob", "remote.example", ActorKind::Person);
    h.person_repo().create(bob).await.unwrap();
    let dave = local_actor("dave");
    let dave = h.person_repo().create(dave).await.unwrap();

    h.follow(&dave.id, &alice.id, &dave.inbox).await;

    let root = local_note(
        "https://example.test/notes/root",
        &alice.id,
        Visibility::Public,
    );
    h.note_repo().create(root).await.unwrap();

    let outbox_repo = OutboxRepository::new(h.db.clone());
    let delivery_repo = DeliveryRepository::new(h.db.clone());
    let delivery = Arc::new(OutboxDelivery::new(outbox_repo.clone(), delivery_repo));
    let ctx = h.context(4, delivery);

    let bob_id = "https://remote.example/users/bob".to_string();
    let reply = create_activity(
        &bob_id,
        json!({
            "id": "https://remote.example/notes/reply-1",
            "type": "Note",
            "attributedTo": bob_id,
            "content": "nice post",
            "inReplyTo": "https://example.test/notes/root",
            "to": [alice.followers.clone()],
            "cc": [],
            "published": Utc::now().to_rfc3339(),
        }),
    );

    dispatcher::dispatch(&ctx, &bob_id, &reply)
        .await
        .expect("reply dispatched");

    let forwarded = outbox_repo.find_by_actor(&alice.id, 10).await.unwrap();
    assert_eq!(forwarded.len(), 1, "forwarding writes exactly one outbox row for the forwarding actor");
    assert_eq!(forwarded[0].activity_type, "Create");

    let deliveries = Delivery::find()
        .all(h.db.as_ref())
        .await
        .unwrap();
    assert!(
        deliveries.iter().any(|d| d.recipient_inbox == dave.inbox),
        "the forwarded activity must be queued to Alice's follower's inbox"
    );
}

// === Forwarding depth boundary: an ancestor beyond `max_forwarding_depth`
// hops is never reached, so nothing is forwarded (spec.md §4.3 edge
// case). ===
#[tokio::test]
async fn forwarding_depth_boundary_is_respected() {
    let h = Harness::new().await;
    let alice = local_actor("alice");
    let alice = h.person_repo().create(alice).await.unwrap();
    let dave = local_actor("dave");
    let dave = h.person_repo().create(dave).await.unwrap();
    h.follow(&dave.id, &alice.id, &dave.inbox).await;

    let y = remote_actor("yara", "remote.example", ActorKind::Person);
    h.person_repo().create(y).await.unwrap();
    let z = remote_actor("zane", "remote.example", ActorKind::Person);
    h.person_repo().create(z).await.unwrap();

    let root = local_note(
        "https://example.test/notes/root",
        &alice.id,
        Visibility::Public,
    );
    h.note_repo().create(root).await.unwrap();

    let r1 = remote_note(
        "https://remote.example/notes/r1",
        "https://remote.example/users/yara",
        Some("https://example.test/notes/root"),
    );
    h.note_repo().create(r1).await.unwrap();

    let outbox_repo = OutboxRepository::new(h.db.clone());
    let delivery_repo_for = |h: &Harness| DeliveryRepository::new(h.db.clone());

    // depth = 1: the walk only inspects r1 (1 hop) and never reaches the
    // local root, so nothing is forwarded.
    {
        let delivery = Arc::new(OutboxDelivery::new(outbox_repo.clone(), delivery_repo_for(&h)));
        let ctx = h.context(1, delivery);
        let z_id = "https://remote.example/users/zane".to_string();
        let reply2 = create_activity(
            &z_id,
            json!({
                "id": "https://remote.example/notes/r2",
                "type": "Note",
                "attributedTo": z_id,
                "content": "deep reply",
                "inReplyTo": "https://remote.example/notes/r1",
                "to": [alice.followers.clone()],
                "cc": [],
                "published": Utc::now().to_rfc3339(),
            }),
        );
        dispatcher::dispatch(&ctx, &z_id, &reply2).await.unwrap();
        let forwarded = outbox_repo.find_by_actor(&alice.id, 10).await.unwrap();
        assert!(forwarded.is_empty(), "depth 1 must not reach the 2-hop-distant local ancestor");
    }

    // depth = 2: the same chain, now within reach, is forwarded.
    {
        let r2 = remote_note(
            "https://remote.example/notes/r2b",
            "https://remote.example/users/zane",
            Some("https://remote.example/notes/r1"),
        );
        h.note_repo().create(r2).await.unwrap();

        let delivery = Arc::new(OutboxDelivery::new(outbox_repo.clone(), delivery_repo_for(&h)));
        let ctx = h.context(2, delivery);
        let z_id = "https://remote.example/users/zane".to_string();
        let reply3 = create_activity(
            &z_id,
            json!({
                "id": "https://remote.example/notes/r3",
                "type": "Note",
                "attributedTo": z_id,
                "content": "even deeper reply",
                "inReplyTo": "https://remote.example/notes/r2b",
                "to": [alice.followers.clone()],
                "cc": [],
                "published": Utc::now().to_rfc3339(),
            }),
        );
        dispatcher::dispatch(&ctx, &z_id, &reply3).await.unwrap();
        let forwarded = outbox_repo.find_by_actor(&alice.id, 10).await.unwrap();
        assert_eq!(forwarded.len(), 1, "depth 2 reaches the local ancestor and forwards");
    }
}

// === Poll vote vs. free reply (spec.md §4.5): a reply carrying only
// `name` matching an option is a vote; one carrying `content` is an
// ordinary stored reply, even if it also names an option. ===
#[tokio::test]
async fn poll_vote_reply_is_recorded_as_a_vote_not_a_note() {
    use sea_orm::Set;
    let h = Harness::new().await;
    let alice = local_actor("alice");
    let alice = h.person_repo().create(alice).await.unwrap();
    let bob = remote_actor("bob", "remote.example", ActorKind::Person);
    h.person_repo().create(bob).await.unwrap();

    let question_id = "https://example.test/notes/q1";
    h.note_repo()
        .create(local_note(question_id, &alice.id, Visibility::Public))
        .await
        .unwrap();
    let poll_repo = PollRepository::new(h.db.clone());
    poll_repo
        .create(outpost_db::entities::poll::ActiveModel {
            note_id: Set(question_id.to_string()),
            options: Set(json!(["cats", "dogs"])),
            tallies: Set(json!([0, 0])),
            multiple: Set(false),
            expires_at: Set(None),
            closed: Set(false),
            voters_count: Set(0),
        })
        .await
        .unwrap();

    let ctx = h.context(4, Arc::new(NoOpDelivery));
    let bob_id = "https://remote.example/users/bob".to_string();

    let vote_reply = create_activity(
        &bob_id,
        json!({
            "id": "https://remote.example/notes/vote-1",
            "type": "Note",
            "attributedTo": bob_id,
            "name": "cats",
            "inReplyTo": question_id,
            "to": [question_id],
            "cc": [],
            "published": Utc::now().to_rfc3339(),
        }),
    );
    dispatcher::dispatch(&ctx, &bob_id, &vote_reply).await.unwrap();

    let vote_repo = PollVoteRepository::new(h.db.clone());
    let votes = vote_repo.find_by_note(question_id).await.unwrap();
    assert_eq!(votes.len(), 1, "a name-only reply matching an option is recorded as a vote");
    assert_eq!(votes[0].choice, 0);

    let stored_note = h
        .note_repo()
        .find_by_id("https://remote.example/notes/vote-1")
        .await
        .unwrap();
    assert!(stored_note.is_none(), "a vote reply is never stored as a note");

    // A second reply from Bob, this time with real content, is a
    // genuine reply even though it also happens to name an option.
    let real_reply = create_activity(
        &bob_id,
        json!({
            "id": "https://remote.example/notes/reply-2",
            "type": "Note",
            "attributedTo": bob_id,
            "content": "dogs are better, change my mind",
            "name": "dogs",
            "inReplyTo": question_id,
            "to": [question_id],
            "cc": [],
            "published": Utc::now().to_rfc3339(),
        }),
    );
    dispatcher::dispatch(&ctx, &bob_id, &real_reply).await.unwrap();

    let votes = vote_repo.find_by_note(question_id).await.unwrap();
    assert_eq!(votes.len(), 1, "a reply carrying content is never treated as a vote");
    let stored = h
        .note_repo()
        .find_by_id("https://remote.example/notes/reply-2")
        .await
        .unwrap();
    assert!(stored.is_some(), "a reply carrying content is stored as an ordinary note");
}

// === Closed poll rejects votes outright (spec.md §4.5 edge case). ===
#[tokio::test]
async fn vote_on_closed_poll_is_dropped_not_recorded() {
    use sea_orm::Set;
    let h = Harness::new().await;
    let alice = local_actor("alice");
    let alice = h.person_repo().create(alice).await.unwrap();
    let bob = remote_actor("bob", "remote.example", ActorKind::Person);
    h.person_repo().create(bob).await.unwrap();

    let question_id = "https://example.test/notes/q2";
    h.note_repo()
        .create(local_note(question_id, &alice.id, Visibility::Public))
        .await
        .unwrap();
    let poll_repo = PollRepository::new(h.db.clone());
    poll_repo
        .create(outpost_db::entities::poll::ActiveModel {
            note_id: Set(question_id.to_string()),
            options: Set(json!(["cats", "dogs"])),
            tallies: Set(json!([0, 0])),
            multiple: Set(false),
            expires_at: Set(None),
            closed: Set(true),
            voters_count: Set(0),
        })
        .await
        .unwrap();

    let ctx = h.context(4, Arc::new(NoOpDelivery));
    let bob_id = "https://remote.example/users/bob".to_string();
    let vote_reply = create_activity(
        &bob_id,
        json!({
            "id": "https://remote.example/notes/vote-2",
            "type": "Note",
            "attributedTo": bob_id,
            "name": "cats",
            "inReplyTo": question_id,
            "to": [question_id],
            "cc": [],
            "published": Utc::now().to_rfc3339(),
        }),
    );

    let result = dispatcher::dispatch(&ctx, &bob_id, &vote_reply).await;
    assert!(result.is_ok(), "a rejected vote is dropped, not surfaced as an error");

    let vote_repo = PollVoteRepository::new(h.db.clone());
    let votes = vote_repo.find_by_note(question_id).await.unwrap();
    assert!(votes.is_empty(), "no vote is recorded against a closed poll");
}

// === A severed follow purges the feed row it previously fanned out
// (spec.md §8 invariant 3), exercised here via an inbound Block. ===
#[tokio::test]
async fn block_purges_the_feed_row_it_previously_fanned_out() {
    let h = Harness::new().await;
    let dave = local_actor("dave");
    let dave = h.person_repo().create(dave).await.unwrap();
    let carol = remote_actor("carol", "remote.example", ActorKind::Person);
    h.person_repo().create(carol).await.unwrap();
    let carol_id = "https://remote.example/users/carol".to_string();

    // Dave follows Carol, and Carol's note was fanned out into his feed.
    h.follow(&dave.id, &carol_id, &format!("{carol_id}/inbox")).await;

    let note = remote_note("https://remote.example/notes/1", &carol_id, None);
    h.note_repo().create(note).await.unwrap();
    let feed_repo = FeedRepository::new(h.db.clone());
    feed_repo
        .insert(outpost_db::entities::feed::ActiveModel {
            id: sea_orm::NotSet,
            owner_id: sea_orm::Set(dave.id.clone()),
            note_id: sea_orm::Set("https://remote.example/notes/1".to_string()),
            inserted_at: sea_orm::Set(Utc::now().into()),
        })
        .await
        .unwrap();

    let ctx = h.context(4, Arc::new(NoOpDelivery));
    let block = json!({
        "type": "Block",
        "id": "https://remote.example/activities/block-1",
        "actor": carol_id,
        "object": dave.id,
    });
    dispatcher::dispatch(&ctx, &carol_id, &block).await.unwrap();

    assert!(
        !h.following_repo().is_following(&dave.id, &carol_id).await.unwrap(),
        "Block must sever the follow edge"
    );
    let remaining = feed_repo.find_all_for_owner(&dave.id).await.unwrap();
    assert!(
        remaining.is_empty(),
        "Block must purge the blocked party's notes out of the other side's feed"
    );
}

// === Group relay, local-initiation shape: a member's own post `@mentions`
// a Group they follow, and the post is relayed to the Group's followers as
// a second `Create`/`Announce` row pair under the Group's authority
// (spec.md §4.4 case 2, §8 S1/S2). ===
#[tokio::test]
async fn mentioning_a_followed_group_relays_the_post_to_its_followers() {
    let h = Harness::new().await;
    let alice = h.person_repo().create(local_actor("alice")).await.unwrap();
    let mut group = local_actor("bobgroup");
    group.kind = sea_orm::Set(ActorKind::Group);
    let group = h.person_repo().create(group).await.unwrap();
    let remote_follower = remote_actor("dave", "remote.example", ActorKind::Person);
    h.person_repo().create(remote_follower).await.unwrap();
    let dave_id = "https://remote.example/users/dave".to_string();

    // Alice follows the Group (required for the relay to fire) and the
    // Group itself has one remote follower to relay to.
    h.follow(&alice.id, &group.id, &format!("{}/inbox", alice.id)).await;
    h.follow(&dave_id, &group.id, &format!("{dave_id}/inbox")).await;

    let outbox_repo = OutboxRepository::new(h.db.clone());
    let delivery_repo = DeliveryRepository::new(h.db.clone());
    let delivery = Arc::new(OutboxDelivery::new(outbox_repo.clone(), delivery_repo));
    let note_service = h.note_service(delivery);

    let input = CreateNoteInput {
        text: format!("hello @{} check this out", group.preferred_username),
        cw: None,
        visibility: Visibility::Public,
        reply_id: None,
        explicit_recipients: vec![],
        mentioned_actor_ids: vec![group.id.clone()],
    };
    note_service.create(&alice.id, input).await.expect("post created");

    let create_row = outbox_repo.find_by_actor(&alice.id, 10).await.unwrap();
    assert_eq!(create_row.len(), 1, "exactly one Create row, authored by Alice");
    assert_eq!(create_row[0].activity_type, "Create");
    assert_eq!(
        create_row[0].sender_id.as_deref(),
        Some(group.id.as_str()),
        "the Create must carry the Group as its delegated sender"
    );

    let announce_row = outbox_repo.find_by_actor(&group.id, 10).await.unwrap();
    assert_eq!(announce_row.len(), 1, "exactly one Announce row, authored by the Group");
    assert_eq!(announce_row[0].activity_type, "Announce");
    assert_eq!(announce_row[0].sender_id.as_deref(), Some(group.id.as_str()));

    let share = h
        .share_repo()
        .find_by_activity_id(&announce_row[0].id)
        .await
        .unwrap();
    assert!(
        share.is_some_and(|s| s.via_group_relay),
        "the relayed Announce must be recorded as a group relay share"
    );
}

#[tokio::test]
async fn mentioning_an_unfollowed_group_relays_nothing() {
    let h = Harness::new().await;
    let alice = h.person_repo().create(local_actor("alice")).await.unwrap();
    let mut group = local_actor("bobgroup");
    group.kind = sea_orm::Set(ActorKind::Group);
    let group = h.person_repo().create(group).await.unwrap();

    // Alice does NOT follow the Group.
    let outbox_repo = OutboxRepository::new(h.db.clone());
    let delivery_repo = DeliveryRepository::new(h.db.clone());
    let delivery = Arc::new(OutboxDelivery::new(outbox_repo.clone(), delivery_repo));
    let note_service = h.note_service(delivery);

    let input = CreateNoteInput {
        text: format!("hello @{} check this out", group.preferred_username),
        cw: None,
        visibility: Visibility::Public,
        reply_id: None,
        explicit_recipients: vec![],
        mentioned_actor_ids: vec![group.id.clone()],
    };
    note_service.create(&alice.id, input).await.expect("post created");

    let alice_rows = outbox_repo.find_by_actor(&alice.id, 10).await.unwrap();
    assert!(
        alice_rows.is_empty(),
        "Alice has no followers of her own, so no ordinary delivery row either"
    );
    let group_rows = outbox_repo.find_by_actor(&group.id, 10).await.unwrap();
    assert!(
        group_rows.is_empty(),
        "an unfollowed Group must produce zero relay rows (spec.md S2)"
    );
}
