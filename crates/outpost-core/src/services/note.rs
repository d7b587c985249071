//! Note (post) authoring and the audience funnel (spec.md §4.2/§4.6):
//! "local authoring goes through a single funnel ... compute audience from
//! the command verb ... build the Object/Activity, insert into
//! `notes`/`outbox` atomically."

use crate::services::delivery::DeliveryService;
use chrono::{Duration, Utc};
use outpost_common::{AppError, AppResult, IdGenerator};
use outpost_db::{
    entities::note::{self, Visibility},
    entities::person::ActorKind,
    entities::share::{self, ShareKind},
    repositories::{
        FollowingRepository, HashtagRepository, NoteRepository, PersonRepository, ShareRepository,
    },
};
use sea_orm::Set;
use serde_json::json;

#[derive(Clone)]
pub struct NoteService {
    note_repo: NoteRepository,
    person_repo: PersonRepository,
    following_repo: FollowingRepository,
    hashtag_repo: HashtagRepository,
    share_repo: ShareRepository,
    delivery: Option<DeliveryService>,
    server_url: String,
    post_throttle: Duration,
    edit_throttle: Duration,
    max_post_length: usize,
    max_recipients: usize,
    id_gen: IdGenerator,
}

/// Input for authoring a new post. `visibility` and `explicit_recipients`
/// are already resolved from the command verb by the caller (spec.md §4.6
/// "compute audience from the command verb"). `mentioned_actor_ids` carries
/// any `@mention`s resolved by the caller purely so `create` can check them
/// for the Group-relay path (spec.md §4.4 case 2) — it has no bearing on
/// `explicit_recipients`/audience.
pub struct CreateNoteInput {
    pub text: String,
    pub cw: Option<String>,
    pub visibility: Visibility,
    pub reply_id: Option<String>,
    pub explicit_recipients: Vec<String>,
    pub mentioned_actor_ids: Vec<String>,
}

pub struct UpdateNoteInput {
    pub note_id: String,
    pub text: Option<String>,
    pub cw: Option<Option<String>>,
}

impl NoteService {
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        note_repo: NoteRepository,
        person_repo: PersonRepository,
        following_repo: FollowingRepository,
        hashtag_repo: HashtagRepository,
        share_repo: ShareRepository,
        post_throttle: Duration,
        edit_throttle: Duration,
        max_post_length: usize,
        max_recipients: usize,
    ) -> Self {
        Self {
            note_repo,
            person_repo,
            following_repo,
            hashtag_repo,
            share_repo,
            delivery: None,
            server_url: String::new(),
            post_throttle,
            edit_throttle,
            max_post_length,
            max_recipients,
            id_gen: IdGenerator::new(),
        }
    }

    #[must_use]
    pub fn with_delivery(mut self, delivery: DeliveryService, server_url: String) -> Self {
        self.delivery = Some(delivery);
        self.server_url = server_url;
        self
    }

    /// Authors a post. Validates length, enforces the post throttle,
    /// resolves reply ancestry (`thread_id`), extracts mentions/hashtags,
    /// inserts the note atomically with its hashtag rows, and — when
    /// federation delivery is wired in — enqueues the `Create` activity to
    /// the resolved audience.
    pub async fn create(&self, actor_id: &str, input: CreateNoteInput) -> AppResult<note::Model> {
        if input.text.trim().is_empty() {
            return Err(AppError::BadRequest("Text is required".to_string()));
        }
        if input.text.chars().count() > self.max_post_length {
            return Err(AppError::BadRequest("Post is too long".to_string()));
        }
        if input.explicit_recipients.len() > self.max_recipients {
            return Err(AppError::BadRequest("Too many recipients".to_string()));
        }

        let actor = self.person_repo.get_by_id(actor_id).await?;

        if let Some(last) = self
            .note_repo
            .find_by_actor(actor_id, 1, None)
            .await?
            .into_iter()
            .next()
            && Utc::now().signed_duration_since(last.created_at) < self.post_throttle
        {
            return Err(AppError::BadRequest(
                "Please wait before posting again".to_string(),
            ));
        }

        let reply = match &input.reply_id {
            Some(id) => Some(self.note_repo.get_by_id(id).await?),
            None => None,
        };

        let mentions = extract_mentions(&input.text);
        let tags = extract_hashtags(&input.text);
        let thread_id = reply
            .as_ref()
            .map(|r| r.thread_id.clone().unwrap_or_else(|| r.id.clone()));

        let note_id = format!("{}/notes/{}", self.server_url, self.id_gen.generate());
        let local_id = outpost_common::hash_local_id(&note_id);

        let model = note::ActiveModel {
            id: Set(note_id.clone()),
            local_id: Set(local_id),
            actor_id: Set(actor.id.clone()),
            actor_host: Set(actor.host.clone()),
            text: Set(Some(input.text.clone())),
            cw: Set(input.cw.clone()),
            visibility: Set(input.visibility.clone()),
            reply_id: Set(input.reply_id.clone()),
            thread_id: Set(thread_id),
            mentions: Set(json!(mentions)),
            visible_actor_ids: Set(json!(input.explicit_recipients)),
            tags: Set(json!(tags)),
            replies_count: Set(0),
            shares_count: Set(0),
            is_local: Set(true),
            raw: Set(None),
            deleted_at: Set(None),
            created_at: Set(Utc::now().into()),
            edited_at: Set(None),
        };

        let note = self.note_repo.create(model).await?;

        for tag in &tags {
            let model = outpost_db::entities::hashtag::ActiveModel {
                id: sea_orm::NotSet,
                tag: Set(tag.clone()),
                note_id: Set(note.id.clone()),
                created_at: Set(Utc::now().into()),
            };
            self.hashtag_repo.record(model).await?;
        }

        if let Some(ref parent) = reply {
            self.note_repo.increment_replies_count(&parent.id).await?;
        }

        if let Some(ref delivery) = self.delivery {
            let recipients = self
                .resolve_recipients(&actor.id, &input.visibility, &input.explicit_recipients)
                .await?;
            if !recipients.is_empty() {
                let activity = self.build_create_activity(&actor.id, &note, &input.visibility);
                delivery
                    .enqueue(&actor.id, None, "Create", activity, recipients)
                    .await?;
            }

            self.relay_through_mentioned_groups(&actor, &note, &input.mentioned_actor_ids, delivery)
                .await?;
        }

        Ok(note)
    }

    /// Implements the Group Relay's local-initiation shape (spec.md §4.4
    /// case 2): when the author `@mentions` a local Group they follow, the
    /// post is additionally delivered under the Group's authority — once as
    /// the member's own `Create` (`sender` = the Group), once as the
    /// Group's `Announce` of it — to the Group's followers. A mention of a
    /// Group the author does not follow is silently ignored; no row is
    /// produced (spec.md §8 S2).
    async fn relay_through_mentioned_groups(
        &self,
        actor: &outpost_db::entities::person::Model,
        note: &note::Model,
        mentioned_actor_ids: &[String],
        delivery: &DeliveryService,
    ) -> AppResult<()> {
        for group_id in mentioned_actor_ids {
            let Some(group) = self.person_repo.find_by_id(group_id).await? else {
                continue;
            };
            if group.kind != ActorKind::Group || !group.is_local() {
                continue;
            }
            if !self.following_repo.is_following(&actor.id, &group.id).await? {
                continue;
            }

            let inboxes = self.follower_inboxes(&group.id).await?;
            if inboxes.is_empty() {
                continue;
            }

            let create_activity = self.build_create_activity(&actor.id, note, &Visibility::Public);
            delivery
                .enqueue(
                    &actor.id,
                    Some(&group.id),
                    "Create",
                    create_activity,
                    inboxes.clone(),
                )
                .await?;

            let announce_id = format!("{}/activities/{}", self.server_url, self.id_gen.generate());
            let announce_activity = json!({
                "@context": "https://www.w3.org/ns/activitystreams",
                "type": "Announce",
                "id": announce_id,
                "actor": group.id,
                "object": note.id,
                "to": ["https://www.w3.org/ns/activitystreams#Public"],
                "cc": [format!("{}/followers", group.id)],
            });
            delivery
                .enqueue(
                    &group.id,
                    Some(&group.id),
                    "Announce",
                    announce_activity,
                    inboxes,
                )
                .await?;

            let share_model = share::ActiveModel {
                activity_id: Set(announce_id),
                actor_id: Set(group.id.clone()),
                note_id: Set(note.id.clone()),
                kind: Set(ShareKind::Announce),
                via_group_relay: Set(true),
                created_at: Set(Utc::now().into()),
            };
            self.share_repo.create(share_model).await?;
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

    /// Edits text/content-warning in place, stamping `edited_at`. Throttled
    /// per entity (spec.md §9: "a single timestamp column per entity
    /// suffices") against this note's own `edited_at`, not the actor's
    /// edit history globally — unlike the post/share throttles, which are
    /// per-actor.
    pub async fn update(&self, actor_id: &str, input: UpdateNoteInput) -> AppResult<note::Model> {
        let note = self.note_repo.get_by_id(&input.note_id).await?;
        if note.actor_id != actor_id {
            return Err(AppError::Forbidden("Not your post".to_string()));
        }
        if note.is_deleted() {
            return Err(AppError::NoteNotFound(input.note_id));
        }
        if let Some(last_edit) = note.edited_at
            && Utc::now().signed_duration_since(last_edit) < self.edit_throttle
        {
            return Err(AppError::BadRequest(
                "Please wait before posting again".to_string(),
            ));
        }

        let mut active: note::ActiveModel = note.clone().into();
        if let Some(text) = input.text {
            if text.chars().count() > self.max_post_length {
                return Err(AppError::BadRequest("Post is too long".to_string()));
            }
            active.tags = Set(json!(extract_hashtags(&text)));
            active.mentions = Set(json!(extract_mentions(&text)));
            active.text = Set(Some(text));
        }
        if let Some(cw) = input.cw {
            active.cw = Set(cw);
        }
        active.edited_at = Set(Some(Utc::now().into()));

        self.note_repo.update(active).await
    }

    /// Soft-deletes a post: content is cleared but the row (and its
    /// `reply_id` chain) survives so descendant resolution still works.
    pub async fn delete(&self, actor_id: &str, note_id: &str) -> AppResult<()> {
        let note = self.note_repo.get_by_id(note_id).await?;
        if note.actor_id != actor_id {
            return Err(AppError::Forbidden("Not your post".to_string()));
        }

        let mut active: note::ActiveModel = note.into();
        active.text = Set(None);
        active.cw = Set(None);
        active.deleted_at = Set(Some(Utc::now().into()));
        self.note_repo.update(active).await?;
        Ok(())
    }

    async fn resolve_recipients(
        &self,
        actor_id: &str,
        visibility: &Visibility,
        explicit_recipients: &[String],
    ) -> AppResult<Vec<String>> {
        match visibility {
            Visibility::Public | Visibility::Home | Visibility::Followers => {
                let mut inboxes = self.following_repo.all_followers(actor_id).await?;
                Ok(inboxes
                    .drain(..)
                    .filter_map(|f| f.follower_shared_inbox.or(f.follower_inbox))
                    .collect())
            }
            Visibility::Specified => {
                let actors = self.person_repo.find_by_ids(explicit_recipients).await?;
                Ok(actors.into_iter().map(|a| a.inbox).collect())
            }
        }
    }

    fn build_create_activity(
        &self,
        actor_id: &str,
        note: &note::Model,
        visibility: &Visibility,
    ) -> serde_json::Value {
        let (to, cc) = match visibility {
            Visibility::Public => (
                vec!["https://www.w3.org/ns/activitystreams#Public".to_string()],
                vec![format!("{actor_id}/followers")],
            ),
            Visibility::Home => (
                vec![format!("{actor_id}/followers")],
                vec!["https://www.w3.org/ns/activitystreams#Public".to_string()],
            ),
            Visibility::Followers => (vec![format!("{actor_id}/followers")], vec![]),
            Visibility::Specified => {
                let recipients: Vec<String> =
                    serde_json::from_value(note.visible_actor_ids.clone()).unwrap_or_default();
                (recipients, vec![])
            }
        };

        json!({
            "@context": "https://www.w3.org/ns/activitystreams",
            "type": "Create",
            "id": format!("{}/activity", note.id),
            "actor": actor_id,
            "to": to,
            "cc": cc,
            "object": {
                "id": note.id,
                "type": "Note",
                "attributedTo": actor_id,
                "content": note.text,
                "summary": note.cw,
                "inReplyTo": note.reply_id,
                "to": to,
                "cc": cc,
            },
        })
    }
}

/// Extracts `@actor` mentions (bare tokens, resolved to actor ids by the
/// caller at a higher layer — this just finds candidates in the text).
fn extract_mentions(text: &str) -> Vec<String> {
    text.split_whitespace()
        .filter(|w| w.starts_with('@') && w.len() > 1)
        .map(|w| w[1..].to_string())
        .collect()
}

/// Extracts `#hashtag` tokens, lowercased.
fn extract_hashtags(text: &str) -> Vec<String> {
    text.split_whitespace()
        .filter(|w| w.starts_with('#') && w.len() > 1)
        .map(|w| w[1..].to_lowercase())
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn extract_mentions_finds_at_tokens() {
        assert_eq!(
            extract_mentions("hello @alice and @bob"),
            vec!["alice".to_string(), "bob".to_string()]
        );
    }

    #[test]
    fn extract_hashtags_lowercases() {
        assert_eq!(
            extract_hashtags("loving #RustLang today"),
            vec!["rustlang".to_string()]
        );
    }

    fn actor(id: &str) -> outpost_db::entities::person::Model {
        outpost_db::entities::person::Model {
            id: id.to_string(),
            kind: outpost_db::entities::person::ActorKind::Person,
            preferred_username: id.to_string(),
            host: None,
            inbox: format!("{id}/inbox"),
            shared_inbox: None,
            followers: format!("{id}/followers"),
            bio: None,
            public_key_pem: None,
            moved_to: None,
            also_known_as: None,
            published: Utc::now().into(),
            last_fetched_at: None,
        }
    }

    fn posted_note(id: &str, actor_id: &str, created_at: chrono::DateTime<Utc>) -> note::Model {
        note::Model {
            id: id.to_string(),
            local_id: outpost_common::hash_local_id(id),
            actor_id: actor_id.to_string(),
            actor_host: None,
            text: Some("earlier post".to_string()),
            cw: None,
            visibility: Visibility::Public,
            reply_id: None,
            thread_id: None,
            mentions: json!([]),
            visible_actor_ids: json!([]),
            tags: json!([]),
            replies_count: 0,
            shares_count: 0,
            is_local: true,
            raw: None,
            deleted_at: None,
            created_at: created_at.into(),
            edited_at: None,
        }
    }

    /// A `post_throttle` of zero must disable throttling entirely (used
    /// by tests that post repeatedly), even when the actor's previous
    /// post landed an instant ago.
    #[tokio::test]
    async fn zero_throttle_lets_immediate_repost_through() {
        use outpost_db::repositories::{
            FollowingRepository, HashtagRepository, NoteRepository, PersonRepository,
            ShareRepository,
        };
        use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};
        use std::sync::Arc;

        let actor_id = "https://example.test/users/alice";
        let last_post = posted_note("https://example.test/notes/1", actor_id, Utc::now());

        let note_db = Arc::new(
            MockDatabase::new(DatabaseBackend::Sqlite)
                .append_query_results([[last_post]])
                .append_exec_results([MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 1,
                }])
                .into_connection(),
        );
        let person_db = Arc::new(
            MockDatabase::new(DatabaseBackend::Sqlite)
                .append_query_results([[actor(actor_id)]])
                .into_connection(),
        );
        let following_db = Arc::new(MockDatabase::new(DatabaseBackend::Sqlite).into_connection());
        let hashtag_db = Arc::new(MockDatabase::new(DatabaseBackend::Sqlite).into_connection());
        let share_db = Arc::new(MockDatabase::new(DatabaseBackend::Sqlite).into_connection());

        let service = NoteService::new(
            NoteRepository::new(note_db),
            PersonRepository::new(person_db),
            FollowingRepository::new(following_db),
            HashtagRepository::new(hashtag_db),
            ShareRepository::new(share_db),
            Duration::zero(),
            Duration::zero(),
            5000,
            10,
        );

        let input = CreateNoteInput {
            text: "right back at it".to_string(),
            cw: None,
            visibility: Visibility::Public,
            reply_id: None,
            explicit_recipients: vec![],
            mentioned_actor_ids: vec![],
        };

        let note = service.create(actor_id, input).await.unwrap();
        assert_eq!(note.actor_id, actor_id);
    }
}
