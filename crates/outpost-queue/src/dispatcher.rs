//! Inbox dispatch table (spec.md §4.1): admission checks, the
//! per-activity-kind dispatch, reply-forwarding (§4.3), group relay
//! (§4.4) and the poll vote-vs-reply split (§4.5).
//!
//! The HTTP inbox handler (`outpost_federation::handler::inbox`) already
//! verified the envelope's signature; everything here works off the
//! `sender` column it wrote, never re-verifying `httpsig`.

#![allow(missing_docs)]

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use outpost_common::{AppError, AppResult, IdGenerator};
use outpost_db::entities::{follow_request, following, hashtag, note, person, poll, share};
use outpost_db::repositories::{
    FollowRequestRepository, FollowingRepository, HashtagRepository, NoteRepository,
    PersonRepository, PollRepository, PollVoteRepository, ShareRepository,
};
use outpost_core::services::{
    CreatePollInput, DeliveryService, FeedService, FollowingService, PollService,
};
use outpost_federation::{client::ApClient, convert::parse_note_json, parse_actor_json, AS_PUBLIC};
use sea_orm::Set;
use serde_json::Value;
use tracing::{debug, info, warn};

/// Everything the dispatcher needs to process one inbox row.
#[derive(Clone)]
pub struct DispatchContext {
    pub person_repo: PersonRepository,
    pub note_repo: NoteRepository,
    pub poll_repo: PollRepository,
    pub vote_repo: PollVoteRepository,
    pub following_repo: FollowingRepository,
    pub follow_request_repo: FollowRequestRepository,
    pub share_repo: ShareRepository,
    pub hashtag_repo: HashtagRepository,
    pub following_service: FollowingService,
    pub poll_service: PollService,
    pub feed_service: FeedService,
    pub delivery: DeliveryService,
    pub client: Arc<ApClient>,
    pub block_list: Arc<HashSet<String>>,
    pub max_forwarding_depth: u32,
    /// Open question decision (spec.md §4.1/§4.4, see DESIGN.md): whether a
    /// Group-relayed `Delete` is honoured even when the relayed actor
    /// doesn't match the target note's author. Default `false` — the
    /// stricter reading, requiring the relayed `Delete`'s actor to be the
    /// note's own author.
    pub accept_forwarded_deletes: bool,
    id_gen: IdGenerator,
}

impl DispatchContext {
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        person_repo: PersonRepository,
        note_repo: NoteRepository,
        poll_repo: PollRepository,
        vote_repo: PollVoteRepository,
        following_repo: FollowingRepository,
        follow_request_repo: FollowRequestRepository,
        share_repo: ShareRepository,
        hashtag_repo: HashtagRepository,
        following_service: FollowingService,
        poll_service: PollService,
        feed_service: FeedService,
        delivery: DeliveryService,
        client: Arc<ApClient>,
        block_list: Arc<HashSet<String>>,
        max_forwarding_depth: u32,
        accept_forwarded_deletes: bool,
    ) -> Self {
        Self {
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
            client,
            block_list,
            max_forwarding_depth,
            accept_forwarded_deletes,
            id_gen: IdGenerator::new(),
        }
    }
}

/// True when `err` reflects a condition spec.md §7 classifies as
/// "Transient I/O" (remote unreachable, DB contention) — worth a retry.
/// Everything else (malformed input, unknown actor, business-rule
/// rejection) is permanent: the row is dropped, not retried.
#[must_use]
pub const fn is_transient(err: &AppError) -> bool {
    matches!(
        err,
        AppError::Database(_) | AppError::Federation(_) | AppError::ExternalService(_)
    )
}

/// Processes one admitted inbox row. `sender` is the envelope's
/// pre-verified `actor`; `activity` is the raw JSON as received.
pub async fn dispatch(ctx: &DispatchContext, sender: &str, activity: &Value) -> AppResult<()> {
    admit(ctx, sender, activity).await?;

    let kind = activity
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| AppError::BadRequest("activity missing type".to_string()))?;

    match kind {
        "Create" => handle_create(ctx, sender, activity).await,
        "Update" => handle_update(ctx, sender, activity).await,
        "Delete" => handle_delete(ctx, sender, activity).await,
        "Follow" => handle_follow(ctx, sender, activity).await,
        "Accept" => handle_accept(ctx, sender, activity).await,
        "Reject" => handle_reject(ctx, sender, activity).await,
        "Undo" => handle_undo(ctx, sender, activity).await,
        "Announce" => handle_announce(ctx, sender, activity).await,
        "Like" => handle_like(ctx, sender, activity).await,
        "Block" => handle_block(ctx, sender, activity).await,
        "Move" => handle_move(ctx, sender, activity).await,
        other => {
            // Internal invariant per spec.md §7: the inbox handler only
            // admits JSON at all, so an activity kind outside the closed
            // set reaches here, not the HTTP layer. Quarantine, don't crash.
            warn!(kind = other, "dispatcher: unrecognised activity kind, quarantining");
            Ok(())
        }
    }
}

// === Admission (spec.md §4.1) ===

async fn admit(ctx: &DispatchContext, sender: &str, activity: &Value) -> AppResult<()> {
    let activity_actor = activity_actor_id(activity)
        .ok_or_else(|| AppError::BadRequest("activity missing actor".to_string()))?;
    if activity_actor != sender {
        return Err(AppError::BadRequest(format!(
            "sender {sender} does not match activity actor {activity_actor}"
        )));
    }

    let host = url::Url::parse(sender)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .ok_or_else(|| AppError::BadRequest("sender is not a URL".to_string()))?;
    if ctx.block_list.contains(&host) {
        return Err(AppError::Forbidden(format!("sender host {host} is blocked")));
    }

    let kind = activity.get("type").and_then(Value::as_str).unwrap_or("");
    if matches!(kind, "Create" | "Update" | "Announce" | "Like") {
        let (to, cc) = activity_audience(activity);
        if to.is_empty() && cc.is_empty() {
            return Err(AppError::BadRequest("activity has empty audience".to_string()));
        }
    }

    Ok(())
}

fn activity_actor_id(activity: &Value) -> Option<String> {
    activity.get("actor").and_then(|v| {
        v.as_str()
            .map(str::to_string)
            .or_else(|| v.get("id").and_then(Value::as_str).map(str::to_string))
    })
}

/// The envelope's own `to`/`cc`, falling back to the wrapped object's when
/// the envelope doesn't carry them (common for `Create`).
fn activity_audience(activity: &Value) -> (Vec<String>, Vec<String>) {
    let mut to = string_array(activity.get("to"));
    let mut cc = string_array(activity.get("cc"));
    if to.is_empty() && cc.is_empty()
        && let Some(object) = activity.get("object")
    {
        to = string_array(object.get("to"));
        cc = string_array(object.get("cc"));
    }
    (to, cc)
}

fn string_array(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect(),
        Some(Value::String(s)) => vec![s.clone()],
        _ => Vec::new(),
    }
}

/// Looks up `actor_id`, fetching and persisting a new `person` row on
/// first sighting (spec.md §3 "created on first sighting or registration").
async fn ensure_person(ctx: &DispatchContext, actor_id: &str) -> AppResult<person::Model> {
    if let Some(existing) = ctx.person_repo.find_by_id(actor_id).await? {
        return Ok(existing);
    }

    let fetched = ctx
        .client
        .fetch_actor(actor_id)
        .await
        .map_err(|e| AppError::Federation(e.to_string()))?;
    let parsed = parse_actor_json(&fetched)?;

    let model = person::ActiveModel {
        id: Set(parsed.id),
        kind: Set(parsed.kind),
        preferred_username: Set(parsed.preferred_username),
        host: Set(Some(parsed.host)),
        inbox: Set(parsed.inbox),
        shared_inbox: Set(parsed.shared_inbox),
        followers: Set(parsed.followers),
        bio: Set(parsed.bio),
        public_key_pem: Set(parsed.public_key_pem),
        moved_to: Set(parsed.moved_to),
        also_known_as: Set(if parsed.also_known_as.is_empty() {
            None
        } else {
            Some(serde_json::json!(parsed.also_known_as))
        }),
        published: Set(Utc::now().into()),
        last_fetched_at: Set(Some(Utc::now().into())),
    };
    ctx.person_repo.create(model).await
}

// === Create / Update / Delete ===

async fn handle_create(ctx: &DispatchContext, _sender: &str, activity: &Value) -> AppResult<()> {
    let object = activity
        .get("object")
        .ok_or_else(|| AppError::BadRequest("Create missing object".to_string()))?;

    let object_id = object
        .get("id")
        .and_then(Value::as_str)
        .ok_or_else(|| AppError::BadRequest("object missing id".to_string()))?;

    // Idempotent replay drop: the object is already persisted.
    if ctx.note_repo.find_by_id(object_id).await?.is_some() {
        debug!(object_id, "dispatcher: Create already applied, skipping");
        return Ok(());
    }

    let attributed_to = object
        .get("attributedTo")
        .and_then(Value::as_str)
        .ok_or_else(|| AppError::BadRequest("object missing attributedTo".to_string()))?;
    let author = ensure_person(ctx, attributed_to).await?;

    // A reply to an active poll carrying only `name` is a vote, not a
    // stored reply (spec.md §4.5).
    if let Some(reply_to) = object.get("inReplyTo").and_then(Value::as_str)
        && let Some(poll) = ctx.poll_repo.find_by_note_id(reply_to).await?
        && is_vote_reply(object, &poll)
    {
        let choice = resolve_choice(object, &poll)?;
        match ctx.poll_service.vote(&author.id, reply_to, choice).await {
            Ok(_) => info!(note_id = reply_to, actor = %author.id, "dispatcher: vote recorded"),
            Err(AppError::BadRequest(msg)) => {
                debug!(note_id = reply_to, actor = %author.id, reason = %msg, "dispatcher: vote rejected");
            }
            Err(e) => return Err(e),
        }
        return Ok(());
    }

    persist_note(ctx, &author, object).await?;
    Ok(())
}

/// Shared by `Create` and (for `Update`) re-ingestion: parses, stores, and
/// fans out a `Note`/`Question` object.
async fn persist_note(
    ctx: &DispatchContext,
    author: &person::Model,
    object: &Value,
) -> AppResult<note::Model> {
    let parsed = parse_note_json(object, &author.followers)?;

    let to = string_array(object.get("to"));
    let cc = string_array(object.get("cc"));
    let visible_actor_ids: Vec<&String> = to
        .iter()
        .chain(cc.iter())
        .filter(|a| *a != AS_PUBLIC && *a != &author.followers)
        .collect();

    let thread_id = match &parsed.in_reply_to {
        Some(parent_id) => match ctx.note_repo.find_by_id(parent_id).await? {
            Some(parent) => Some(parent.thread_id.unwrap_or(parent.id)),
            None => None,
        },
        None => None,
    };

    let model = note::ActiveModel {
        id: Set(parsed.id.clone()),
        local_id: Set(outpost_common::hash_local_id(&parsed.id)),
        actor_id: Set(author.id.clone()),
        actor_host: Set(author.host.clone()),
        text: Set(parsed.text),
        cw: Set(parsed.cw),
        visibility: Set(parsed.visibility),
        reply_id: Set(parsed.in_reply_to.clone()),
        thread_id: Set(thread_id),
        mentions: Set(serde_json::json!(parsed.mentions)),
        visible_actor_ids: Set(serde_json::json!(visible_actor_ids)),
        tags: Set(serde_json::json!(parsed.tags)),
        replies_count: Set(0),
        shares_count: Set(0),
        is_local: Set(false),
        raw: Set(Some(object.clone())),
        deleted_at: Set(None),
        created_at: Set(parsed.created_at.into()),
        edited_at: Set(None),
    };
    let created = ctx.note_repo.create(model).await?;

    for tag in &parsed.tags {
        let hashtag_model = hashtag::ActiveModel {
            id: sea_orm::NotSet,
            tag: Set(tag.clone()),
            note_id: Set(created.id.clone()),
            created_at: Set(Utc::now().into()),
        };
        ctx.hashtag_repo.record(hashtag_model).await?;
    }

    if let Some(poll) = parsed.poll {
        ctx.poll_service
            .create_poll(
                &created.id,
                CreatePollInput {
                    options: poll.options,
                    tallies: poll.tallies,
                    multiple: poll.multiple,
                    expires_at: poll.end_time,
                    closed: poll.closed,
                },
            )
            .await?;
    }

    if let Some(parent_id) = &created.reply_id {
        ctx.note_repo.increment_replies_count(parent_id).await?;
    }

    ctx.feed_service.fan_out(&author.id, &created.id).await?;

    forward_reply(ctx, &created, &to, &cc, "Create").await?;

    Ok(created)
}

/// Reply (or ancestor-rooted) forwarding per spec.md §4.3: a note
/// addressed to a local actor's followers, whose ancestor chain within
/// `MaxForwardingDepth` hops is authored by that same local actor, is
/// re-delivered to that actor's followers verbatim.
async fn forward_activity(
    ctx: &DispatchContext,
    note: &note::Model,
    to: &[String],
    cc: &[String],
    activity_type: &str,
    raw: &Value,
) -> AppResult<()> {
    let Some(local_author) = forwarding_target(ctx, note, to, cc).await? else {
        return Ok(());
    };

    let inboxes = ctx.following_service.all_follower_inboxes(&local_author.id).await?;
    if inboxes.is_empty() {
        return Ok(());
    }

    ctx.delivery
        .enqueue(&local_author.id, None, activity_type, raw.clone(), inboxes)
        .await?;
    info!(actor = %local_author.id, activity_type, "dispatcher: forwarded to followers");
    Ok(())
}

async fn forward_reply(
    ctx: &DispatchContext,
    note: &note::Model,
    to: &[String],
    cc: &[String],
    activity_type: &str,
) -> AppResult<()> {
    if let Some(raw) = &note.raw {
        forward_activity(ctx, note, to, cc, activity_type, raw).await?;
    }
    Ok(())
}

async fn forwarding_target(
    ctx: &DispatchContext,
    note: &note::Model,
    to: &[String],
    cc: &[String],
) -> AppResult<Option<person::Model>> {
    let mut current = note.reply_id.clone();
    for _ in 0..ctx.max_forwarding_depth {
        let Some(ancestor_id) = current else { break };
        let Some(ancestor) = ctx.note_repo.find_by_id(&ancestor_id).await? else {
            break;
        };
        if ancestor.is_local && ancestor.visibility != note::Visibility::Specified {
            let addressed = to
                .iter()
                .chain(cc.iter())
                .any(|a| a == &ancestor.actor_id)
                || ctx
                    .person_repo
                    .find_by_id(&ancestor.actor_id)
                    .await?
                    .is_some_and(|p| to.iter().chain(cc.iter()).any(|a| *a == p.followers));
            if addressed
                && let Some(local_author) = ctx.person_repo.find_by_id(&ancestor.actor_id).await?
            {
                return Ok(Some(local_author));
            }
        }
        current = ancestor.reply_id;
    }
    Ok(None)
}

/// A reply R to a `Question` Q is a vote iff it carries only `name` (no
/// `content`) and that name matches one of Q's options (spec.md §4.5).
fn is_vote_reply(object: &Value, poll: &poll::Model) -> bool {
    if object.get("content").and_then(Value::as_str).is_some() {
        return false;
    }
    let Some(name) = object.get("name").and_then(Value::as_str) else {
        return false;
    };
    let options: Vec<String> = serde_json::from_value(poll.options.clone()).unwrap_or_default();
    options.iter().any(|o| o == name)
}

fn resolve_choice(object: &Value, poll: &poll::Model) -> AppResult<i32> {
    let name = object
        .get("name")
        .and_then(Value::as_str)
        .ok_or_else(|| AppError::BadRequest("vote reply missing name".to_string()))?;
    let options: Vec<String> = serde_json::from_value(poll.options.clone())
        .map_err(|e| AppError::Internal(format!("invalid poll options: {e}")))?;
    options
        .iter()
        .position(|o| o == name)
        .map(|i| i as i32)
        .ok_or_else(|| AppError::BadRequest("vote reply does not match any option".to_string()))
}

async fn handle_update(ctx: &DispatchContext, _sender: &str, activity: &Value) -> AppResult<()> {
    let object = activity
        .get("object")
        .ok_or_else(|| AppError::BadRequest("Update missing object".to_string()))?;
    let object_id = object
        .get("id")
        .and_then(Value::as_str)
        .ok_or_else(|| AppError::BadRequest("object missing id".to_string()))?;

    let updated = object.get("updated").and_then(Value::as_str).and_then(|s| {
        chrono::DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|d| d.with_timezone(&Utc))
    });

    let Some(existing) = ctx.note_repo.find_by_id(object_id).await? else {
        // Unknown object: treat the Update as the first sighting.
        let attributed_to = object
            .get("attributedTo")
            .and_then(Value::as_str)
            .ok_or_else(|| AppError::BadRequest("object missing attributedTo".to_string()))?;
        let author = ensure_person(ctx, attributed_to).await?;
        persist_note(ctx, &author, object).await?;
        return Ok(());
    };

    let stored_updated = existing.edited_at.map(|t| t.with_timezone(&Utc)).unwrap_or(
        existing.created_at.with_timezone(&Utc),
    );
    if let Some(updated) = updated
        && updated <= stored_updated
    {
        debug!(object_id, "dispatcher: stale Update ignored");
        return Ok(());
    }

    let author = ctx.person_repo.get_by_id(&existing.actor_id).await?;
    let parsed = parse_note_json(object, &author.followers)?;

    let to = string_array(object.get("to"));
    let cc = string_array(object.get("cc"));
    let visible_actor_ids: Vec<&String> = to
        .iter()
        .chain(cc.iter())
        .filter(|a| *a != AS_PUBLIC && *a != &author.followers)
        .collect();

    let mut active: note::ActiveModel = existing.into();
    active.text = Set(parsed.text);
    active.cw = Set(parsed.cw);
    active.visibility = Set(parsed.visibility);
    active.mentions = Set(serde_json::json!(parsed.mentions));
    active.visible_actor_ids = Set(serde_json::json!(visible_actor_ids));
    active.tags = Set(serde_json::json!(parsed.tags));
    active.raw = Set(Some(object.clone()));
    active.edited_at = Set(Some(updated.unwrap_or_else(Utc::now).into()));
    let updated_note = ctx.note_repo.update(active).await?;

    forward_reply(ctx, &updated_note, &to, &cc, "Update").await?;
    Ok(())
}

async fn handle_delete(ctx: &DispatchContext, sender: &str, activity: &Value) -> AppResult<()> {
    let object_id = match activity.get("object") {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Object(_)) => activity
            .get("object")
            .and_then(|o| o.get("id"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| AppError::BadRequest("Delete object missing id".to_string()))?,
        _ => return Err(AppError::BadRequest("Delete missing object".to_string())),
    };

    let Some(existing) = ctx.note_repo.find_by_id(&object_id).await? else {
        debug!(object_id, "dispatcher: Delete of unknown object, dropping");
        return Ok(());
    };

    // Deletions from a non-owning actor are ignored.
    if existing.actor_id != sender {
        warn!(object_id, sender, "dispatcher: Delete from non-owning actor, ignoring");
        return Ok(());
    }

    if existing.is_deleted() {
        debug!(object_id, "dispatcher: already tombstoned, no-op");
        return Ok(());
    }

    let (to, cc) = activity_audience(activity);
    let raw = existing.raw.clone();
    let tombstoned = tombstone_note_and_cascade(ctx, existing).await?;

    if let Some(raw) = raw {
        forward_activity(ctx, &tombstoned, &to, &cc, "Delete", &raw).await?;
    }
    Ok(())
}

/// Tombstones `existing` (clears `text`/`cw`, stamps `deleted_at`) and
/// cascades to replies owned by the same author, per spec.md §4.1.
async fn tombstone_note_and_cascade(
    ctx: &DispatchContext,
    existing: note::Model,
) -> AppResult<note::Model> {
    let mut active: note::ActiveModel = existing.clone().into();
    active.text = Set(None);
    active.cw = Set(None);
    active.deleted_at = Set(Some(Utc::now().into()));
    let tombstoned = ctx.note_repo.update(active).await?;

    let replies = ctx.note_repo.find_replies(&tombstoned.id).await?;
    for reply in replies {
        if reply.actor_id == tombstoned.actor_id && !reply.is_deleted() {
            let mut reply_active: note::ActiveModel = reply.into();
            reply_active.text = Set(None);
            reply_active.cw = Set(None);
            reply_active.deleted_at = Set(Some(Utc::now().into()));
            ctx.note_repo.update(reply_active).await?;
        }
    }
    Ok(tombstoned)
}

// === Follow family (spec.md §4.7) ===

async fn handle_follow(ctx: &DispatchContext, sender: &str, activity: &Value) -> AppResult<()> {
    let activity_id = activity
        .get("id")
        .and_then(Value::as_str)
        .ok_or_else(|| AppError::BadRequest("Follow missing id".to_string()))?;
    let object_id = activity
        .get("object")
        .and_then(Value::as_str)
        .ok_or_else(|| AppError::BadRequest("Follow missing object".to_string()))?;

    let follower = ensure_person(ctx, sender).await?;
    let Some(followee) = ctx.person_repo.find_by_id(object_id).await? else {
        warn!(object_id, "dispatcher: Follow of unknown local actor, dropping");
        return Ok(());
    };
    if !followee.is_local() {
        warn!(object_id, "dispatcher: Follow targets a non-local actor, dropping");
        return Ok(());
    }

    if ctx.following_repo.is_following(&follower.id, &followee.id).await? {
        debug!(follower = %follower.id, followee = %followee.id, "dispatcher: already following, replay drop");
        return Ok(());
    }
    if ctx
        .follow_request_repo
        .find_by_pair(&follower.id, &followee.id)
        .await?
        .is_some()
    {
        debug!(follower = %follower.id, followee = %followee.id, "dispatcher: Follow already pending, replay drop");
        return Ok(());
    }

    let request = follow_request::ActiveModel {
        id: Set(ctx.id_gen.generate()),
        follower_id: Set(follower.id.clone()),
        followee_id: Set(followee.id.clone()),
        follower_host: Set(follower.host.clone()),
        followee_host: Set(followee.host.clone()),
        follower_inbox: Set(Some(follower.inbox.clone())),
        follower_shared_inbox: Set(follower.shared_inbox.clone()),
        activity_id: Set(activity_id.to_string()),
        created_at: Set(Utc::now().into()),
    };
    ctx.follow_request_repo.create(request).await?;

    // A local followee not on BlockList (already enforced by admission)
    // auto-accepts unconditionally — Groups included.
    ctx.following_service.accept(&followee, &follower).await?;
    Ok(())
}

async fn handle_accept(ctx: &DispatchContext, sender: &str, activity: &Value) -> AppResult<()> {
    let inner = activity
        .get("object")
        .ok_or_else(|| AppError::BadRequest("Accept missing object".to_string()))?;
    let follower_id = inner_follow_actor(inner)?;

    let followee = ctx.person_repo.get_by_id(sender).await?;
    let Some(follower) = ctx.person_repo.find_by_id(&follower_id).await? else {
        warn!(follower_id, "dispatcher: Accept for unknown follower, dropping");
        return Ok(());
    };

    ctx.following_service.accept(&followee, &follower).await?;
    Ok(())
}

async fn handle_reject(ctx: &DispatchContext, sender: &str, activity: &Value) -> AppResult<()> {
    let inner = activity
        .get("object")
        .ok_or_else(|| AppError::BadRequest("Reject missing object".to_string()))?;
    let follower_id = inner_follow_actor(inner)?;

    let followee = ctx.person_repo.get_by_id(sender).await?;
    let Some(follower) = ctx.person_repo.find_by_id(&follower_id).await? else {
        return Ok(());
    };

    ctx.following_service.reject(&followee, &follower).await?;
    Ok(())
}

fn inner_follow_actor(inner: &Value) -> AppResult<String> {
    inner
        .get("actor")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| AppError::BadRequest("embedded Follow missing actor".to_string()))
}

// === Undo ===

async fn handle_undo(ctx: &DispatchContext, sender: &str, activity: &Value) -> AppResult<()> {
    let inner = activity
        .get("object")
        .ok_or_else(|| AppError::BadRequest("Undo missing object".to_string()))?;
    let inner_type = inner.get("type").and_then(Value::as_str).unwrap_or("");

    match inner_type {
        "Follow" => {
            let followee_id = inner
                .get("object")
                .and_then(Value::as_str)
                .ok_or_else(|| AppError::BadRequest("embedded Follow missing object".to_string()))?;
            ctx.follow_request_repo.delete_by_pair(sender, followee_id).await?;
            ctx.following_repo.delete_by_pair(sender, followee_id).await?;
            Ok(())
        }
        "Announce" | "Like" => {
            let inner_id = inner
                .get("id")
                .and_then(Value::as_str)
                .ok_or_else(|| AppError::BadRequest("embedded activity missing id".to_string()))?;
            if let Some(removed) = ctx.share_repo.delete_by_activity_id(inner_id).await? {
                ctx.note_repo.decrement_shares_count(&removed.note_id).await?;
            }
            Ok(())
        }
        other => {
            debug!(inner_type = other, "dispatcher: Undo of unsupported activity, ignoring");
            Ok(())
        }
    }
}

// === Announce / Like (spec.md §4.4) ===

async fn handle_announce(ctx: &DispatchContext, sender: &str, activity: &Value) -> AppResult<()> {
    let announcer = ensure_person(ctx, sender).await?;
    let activity_id = activity
        .get("id")
        .and_then(Value::as_str)
        .ok_or_else(|| AppError::BadRequest("Announce missing id".to_string()))?;

    if announcer.kind == person::ActorKind::Group {
        handle_group_announce(ctx, &announcer, activity_id, activity).await
    } else {
        let object_id = activity
            .get("object")
            .and_then(Value::as_str)
            .ok_or_else(|| AppError::BadRequest("Announce missing object".to_string()))?;
        record_share(ctx, &announcer, activity_id, object_id, share::ShareKind::Announce, false).await
    }
}

/// Unwraps a Group's `Announce` of an embedded or referenced `Create`,
/// persists the underlying note if unknown, and records the relay.
async fn handle_group_announce(
    ctx: &DispatchContext,
    group: &person::Model,
    activity_id: &str,
    activity: &Value,
) -> AppResult<()> {
    let wrapped = match activity.get("object") {
        Some(Value::Object(_)) => activity.get("object").cloned().unwrap_or(Value::Null),
        Some(Value::String(url)) => ctx
            .client
            .fetch_object(url)
            .await
            .map_err(|e| AppError::Federation(e.to_string()))?,
        _ => return Err(AppError::BadRequest("Announce missing object".to_string())),
    };

    let wrapped_type = wrapped.get("type").and_then(Value::as_str).unwrap_or("");
    if wrapped_type == "Delete" {
        return handle_group_relayed_delete(ctx, group, &wrapped).await;
    }
    let object = if wrapped_type == "Create" {
        wrapped
            .get("object")
            .cloned()
            .ok_or_else(|| AppError::BadRequest("wrapped Create missing object".to_string()))?
    } else {
        wrapped
    };

    let object_id = object
        .get("id")
        .and_then(Value::as_str)
        .ok_or_else(|| AppError::BadRequest("relayed object missing id".to_string()))?
        .to_string();

    let note = match ctx.note_repo.find_by_id(&object_id).await? {
        Some(existing) => existing,
        None => {
            let attributed_to = object
                .get("attributedTo")
                .and_then(Value::as_str)
                .ok_or_else(|| AppError::BadRequest("relayed object missing attributedTo".to_string()))?;
            let author = ensure_person(ctx, attributed_to).await?;
            persist_note(ctx, &author, &object).await?
        }
    };

    record_share(ctx, group, activity_id, &note.id, share::ShareKind::Announce, true).await?;
    // Visibility for G's followers is derived from G's Announce, not the
    // original Create (spec.md §4.4) — fan out to G's own audience too.
    ctx.feed_service.fan_out(&group.id, &note.id).await?;
    Ok(())
}

/// Handles a Group relaying a `Delete` by wrapping it in its `Announce`
/// (the open-question decision in spec.md §4.1/§4.4, recorded in
/// DESIGN.md): honoured only when the wrapped `Delete`'s actor matches
/// the target note's own author, unless `accept_forwarded_deletes` opts
/// into trusting the relay outright.
async fn handle_group_relayed_delete(
    ctx: &DispatchContext,
    group: &person::Model,
    wrapped: &Value,
) -> AppResult<()> {
    let delete_actor = wrapped
        .get("actor")
        .and_then(Value::as_str)
        .ok_or_else(|| AppError::BadRequest("wrapped Delete missing actor".to_string()))?;
    let object_id = match wrapped.get("object") {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Object(_)) => wrapped
            .get("object")
            .and_then(|o| o.get("id"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| AppError::BadRequest("wrapped Delete object missing id".to_string()))?,
        _ => return Err(AppError::BadRequest("wrapped Delete missing object".to_string())),
    };

    let Some(existing) = ctx.note_repo.find_by_id(&object_id).await? else {
        debug!(object_id, group = %group.id, "dispatcher: group-relayed Delete of unknown object, dropping");
        return Ok(());
    };
    if existing.is_deleted() {
        debug!(object_id, "dispatcher: already tombstoned, no-op");
        return Ok(());
    }
    if existing.actor_id != delete_actor && !ctx.accept_forwarded_deletes {
        warn!(
            object_id,
            delete_actor,
            group = %group.id,
            "dispatcher: group-relayed Delete author mismatch, rejecting"
        );
        return Ok(());
    }

    tombstone_note_and_cascade(ctx, existing).await?;
    Ok(())
}

async fn handle_like(ctx: &DispatchContext, sender: &str, activity: &Value) -> AppResult<()> {
    let actor = ensure_person(ctx, sender).await?;
    let activity_id = activity
        .get("id")
        .and_then(Value::as_str)
        .ok_or_else(|| AppError::BadRequest("Like missing id".to_string()))?;
    let object_id = activity
        .get("object")
        .and_then(Value::as_str)
        .ok_or_else(|| AppError::BadRequest("Like missing object".to_string()))?;
    record_share(ctx, &actor, activity_id, object_id, share::ShareKind::Like, false).await
}

async fn record_share(
    ctx: &DispatchContext,
    actor: &person::Model,
    activity_id: &str,
    note_id: &str,
    kind: share::ShareKind,
    via_group_relay: bool,
) -> AppResult<()> {
    if ctx.share_repo.find_by_activity_id(activity_id).await?.is_some() {
        debug!(activity_id, "dispatcher: Share already recorded, replay drop");
        return Ok(());
    }
    if ctx.note_repo.find_by_id(note_id).await?.is_none() {
        warn!(note_id, "dispatcher: Share of unknown object, dropping");
        return Ok(());
    }

    let model = share::ActiveModel {
        activity_id: Set(activity_id.to_string()),
        actor_id: Set(actor.id.clone()),
        note_id: Set(note_id.to_string()),
        kind: Set(kind),
        via_group_relay: Set(via_group_relay),
        created_at: Set(Utc::now().into()),
    };
    ctx.share_repo.create(model).await?;
    ctx.note_repo.increment_shares_count(note_id).await?;
    Ok(())
}

/// True when `actor.also_known_as` names `target_id` (spec.md §4.1 Move's
/// "mutual alias" requirement).
fn also_known_as_contains(actor: &person::Model, target_id: &str) -> bool {
    actor
        .also_known_as
        .as_ref()
        .and_then(|v| v.as_array())
        .is_some_and(|ids| ids.iter().any(|id| id.as_str() == Some(target_id)))
}

// === Block / Move ===

async fn handle_block(ctx: &DispatchContext, sender: &str, activity: &Value) -> AppResult<()> {
    let object_id = activity
        .get("object")
        .and_then(Value::as_str)
        .ok_or_else(|| AppError::BadRequest("Block missing object".to_string()))?;
    let was_following_sender = ctx.following_service.is_following(sender, object_id).await?;
    let was_following_object = ctx.following_service.is_following(object_id, sender).await?;
    ctx.following_service.sever_on_block(sender, object_id).await?;

    // spec.md §8 invariant 3: a severed follow purges the (local) former
    // follower's feed of the other party's notes.
    if was_following_sender {
        ctx.feed_service.purge_for_unfollow(sender, object_id).await?;
    }
    if was_following_object {
        ctx.feed_service.purge_for_unfollow(object_id, sender).await?;
    }
    Ok(())
}

async fn handle_move(ctx: &DispatchContext, sender: &str, activity: &Value) -> AppResult<()> {
    let target_id = activity
        .get("target")
        .or_else(|| activity.get("object"))
        .and_then(Value::as_str)
        .ok_or_else(|| AppError::BadRequest("Move missing target".to_string()))?
        .to_string();

    let Some(old_actor) = ctx.person_repo.find_by_id(sender).await? else {
        return Err(AppError::UserNotFound(sender.to_string()));
    };

    let mut active: person::ActiveModel = old_actor.clone().into();
    active.moved_to = Set(Some(target_id.clone()));
    ctx.person_repo.update(active).await?;

    let new_actor = ensure_person(ctx, &target_id).await?;

    // spec.md §4.1 Move: only rewrite follows "when the alias is mutual" —
    // the target must itself claim the old id via `alsoKnownAs`.
    if !also_known_as_contains(&new_actor, &old_actor.id) {
        info!(
            from = %old_actor.id,
            to = %new_actor.id,
            "dispatcher: Move target does not claim alsoKnownAs, not rewriting follows"
        );
        return Ok(());
    }

    let followers = ctx.following_repo.all_followers(&old_actor.id).await?;
    for edge in followers {
        if edge.follower_host.is_some() {
            continue;
        }
        ctx.following_repo
            .delete_by_pair(&edge.follower_id, &old_actor.id)
            .await?;
        if !ctx
            .following_repo
            .is_following(&edge.follower_id, &new_actor.id)
            .await?
        {
            let model = following::ActiveModel {
                id: Set(ctx.id_gen.generate()),
                follower_id: Set(edge.follower_id.clone()),
                followee_id: Set(new_actor.id.clone()),
                follower_host: Set(None),
                followee_host: Set(new_actor.host.clone()),
                follower_inbox: Set(edge.follower_inbox.clone()),
                follower_shared_inbox: Set(edge.follower_shared_inbox.clone()),
                followee_inbox: Set(Some(new_actor.inbox.clone())),
                followee_shared_inbox: Set(new_actor.shared_inbox.clone()),
                created_at: Set(Utc::now().into()),
            };
            ctx.following_repo.create(model).await?;
        }
    }

    info!(from = %old_actor.id, to = %new_actor.id, "dispatcher: Move recorded, follows rewritten");
    Ok(())
}
