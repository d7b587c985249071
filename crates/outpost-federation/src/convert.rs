//! Conversions between `ActivityPub` wire JSON and the database's actor /
//! note shapes.

use chrono::{DateTime, Utc};
use outpost_common::{AppError, AppResult};
use outpost_db::entities::{note::Visibility, person::ActorKind};

use crate::wire::{
    ActorJson, Endpoints, NoteJson, PollOptionJson, PollOptionRepliesJson, PublicKeyJson, TagJson,
    UrlConfig, as_context, AS_PUBLIC,
};

/// A local actor's fields, enough to build its `ActorJson` document.
pub struct LocalActor<'a> {
    pub username: &'a str,
    pub kind: &'a ActorKind,
    pub bio: Option<&'a str>,
    pub moved_to: Option<&'a str>,
    pub also_known_as: &'a [String],
    pub public_key_pem: &'a str,
}

/// Builds the outgoing actor document for a locally-hosted actor.
#[must_use]
pub fn local_actor_to_json(actor: &LocalActor<'_>, urls: &UrlConfig) -> ActorJson {
    let kind = match actor.kind {
        ActorKind::Person => "Person",
        ActorKind::Group => "Group",
        ActorKind::Application => "Application",
    };
    ActorJson {
        context: as_context(),
        id: urls.user_url(actor.username),
        kind: kind.to_string(),
        preferred_username: actor.username.to_string(),
        inbox: urls.inbox_url(actor.username),
        outbox: urls.outbox_url(actor.username),
        followers: urls.followers_url(actor.username),
        following: urls.following_url(actor.username),
        summary: actor.bio.map(str::to_string),
        moved_to: actor.moved_to.map(str::to_string),
        also_known_as: actor.also_known_as.to_vec(),
        endpoints: Endpoints {
            shared_inbox: urls.shared_inbox_url(),
        },
        public_key: PublicKeyJson {
            id: urls.public_key_url(actor.username),
            owner: urls.user_url(actor.username),
            public_key_pem: actor.public_key_pem.to_string(),
        },
    }
}

/// Actor fields parsed from a fetched remote actor document.
pub struct ParsedActor {
    pub id: String,
    pub kind: ActorKind,
    pub preferred_username: String,
    pub host: String,
    pub inbox: String,
    pub shared_inbox: Option<String>,
    pub followers: String,
    pub bio: Option<String>,
    pub public_key_pem: Option<String>,
    pub moved_to: Option<String>,
    pub also_known_as: Vec<String>,
}

/// Parses a remote actor document, deriving `host` from its `id` URL.
pub fn parse_actor_json(json: &serde_json::Value) -> AppResult<ParsedActor> {
    let actor: ActorJson = serde_json::from_value(json.clone())
        .map_err(|e| AppError::Federation(format!("invalid actor document: {e}")))?;

    let url = url::Url::parse(&actor.id)
        .map_err(|e| AppError::Federation(format!("invalid actor id: {e}")))?;
    let host = url
        .host_str()
        .ok_or_else(|| AppError::Federation("actor id has no host".to_string()))?
        .to_string();

    let kind = match actor.kind.as_str() {
        "Group" => ActorKind::Group,
        "Application" | "Service" => ActorKind::Application,
        _ => ActorKind::Person,
    };

    Ok(ParsedActor {
        id: actor.id,
        kind,
        preferred_username: actor.preferred_username,
        host,
        inbox: actor.inbox,
        shared_inbox: Some(actor.endpoints.shared_inbox),
        followers: actor.followers,
        bio: actor.summary,
        public_key_pem: Some(actor.public_key.public_key_pem),
        moved_to: actor.moved_to,
        also_known_as: actor.also_known_as,
    })
}

/// Local note fields, enough to build its outgoing `Note`/`Question`
/// object (the `Create`/`Update` wrapper is built by the caller, which
/// knows the activity id and audience already).
pub struct LocalNote<'a> {
    pub id: &'a str,
    pub actor_id: &'a str,
    pub text: Option<&'a str>,
    pub cw: Option<&'a str>,
    pub in_reply_to: Option<&'a str>,
    pub to: Vec<String>,
    pub cc: Vec<String>,
    pub mentions: &'a [String],
    pub tags: &'a [String],
    pub created_at: DateTime<Utc>,
    pub edited_at: Option<DateTime<Utc>>,
    pub poll: Option<LocalPoll<'a>>,
}

pub struct LocalPoll<'a> {
    pub options: &'a [String],
    pub tallies: &'a [i64],
    pub multiple: bool,
    pub end_time: Option<DateTime<Utc>>,
    pub closed: bool,
}

#[must_use]
pub fn local_note_to_json(note: &LocalNote<'_>) -> NoteJson {
    let mut tag = Vec::new();
    for mention in note.mentions {
        tag.push(TagJson::Mention {
            href: mention.clone(),
            name: String::new(),
        });
    }
    for hashtag in note.tags {
        tag.push(TagJson::Hashtag {
            name: format!("#{hashtag}"),
        });
    }

    let (one_of, any_of) = note.poll.as_ref().map_or((None, None), |poll| {
        let options: Vec<PollOptionJson> = poll
            .options
            .iter()
            .zip(poll.tallies.iter())
            .map(|(name, count)| PollOptionJson {
                name: name.clone(),
                replies: PollOptionRepliesJson {
                    kind: "Collection".to_string(),
                    total_items: *count,
                },
            })
            .collect();
        if poll.multiple {
            (None, Some(options))
        } else {
            (Some(options), None)
        }
    });

    NoteJson {
        id: note.id.to_string(),
        kind: if note.poll.is_some() { "Question".to_string() } else { "Note".to_string() },
        attributed_to: note.actor_id.to_string(),
        content: note.text.map(str::to_string),
        summary: note.cw.map(str::to_string),
        in_reply_to: note.in_reply_to.map(str::to_string),
        to: note.to.clone(),
        cc: note.cc.clone(),
        tag,
        published: note.created_at,
        updated: note.edited_at,
        one_of,
        any_of,
        voters_count: note.poll.as_ref().map(|p| p.tallies.iter().sum::<i64>() as i32),
        end_time: note.poll.as_ref().and_then(|p| p.end_time),
        closed: note.poll.as_ref().filter(|p| p.closed).map(|_| serde_json::json!(Utc::now())),
    }
}

/// Note fields parsed from a remote `Create`/`Update` object.
pub struct ParsedNote {
    pub id: String,
    pub actor_id: String,
    pub text: Option<String>,
    pub cw: Option<String>,
    pub in_reply_to: Option<String>,
    pub visibility: Visibility,
    pub mentions: Vec<String>,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub poll: Option<ParsedPoll>,
}

pub struct ParsedPoll {
    pub options: Vec<String>,
    pub tallies: Vec<i64>,
    pub multiple: bool,
    pub end_time: Option<DateTime<Utc>>,
    pub closed: bool,
}

/// Resolves visibility from `to`/`cc` per spec.md §4.2: public if the
/// public sentinel is addressed directly, home/unlisted if it only
/// appears in `cc`, followers-only if the author's followers collection
/// is addressed without the public sentinel, else a direct/specified
/// message.
fn resolve_visibility(to: &[String], cc: &[String], followers_url: &str) -> Visibility {
    if to.iter().any(|t| t == AS_PUBLIC) {
        Visibility::Public
    } else if cc.iter().any(|t| t == AS_PUBLIC) {
        Visibility::Home
    } else if to.iter().chain(cc.iter()).any(|t| t == followers_url) {
        Visibility::Followers
    } else {
        Visibility::Specified
    }
}

/// Parses a remote `Note`/`Question` object, given the author's followers
/// collection URL (needed to resolve visibility).
pub fn parse_note_json(json: &serde_json::Value, followers_url: &str) -> AppResult<ParsedNote> {
    let note: NoteJson = serde_json::from_value(json.clone())
        .map_err(|e| AppError::Federation(format!("invalid note object: {e}")))?;

    let visibility = resolve_visibility(&note.to, &note.cc, followers_url);

    let mut mentions = Vec::new();
    let mut tags = Vec::new();
    for t in &note.tag {
        match t {
            TagJson::Mention { href, .. } => mentions.push(href.clone()),
            TagJson::Hashtag { name } => tags.push(name.trim_start_matches('#').to_lowercase()),
        }
    }

    let is_poll = note.one_of.is_some() || note.any_of.is_some();
    let multiple = note.any_of.is_some();
    let end_time = note.end_time;
    let closed = note.closed.is_some();
    let poll = if is_poll {
        let opts = note.one_of.or(note.any_of).unwrap_or_default();
        let tallies = opts.iter().map(|o| o.replies.total_items).collect();
        Some(ParsedPoll {
            options: opts.into_iter().map(|o| o.name).collect(),
            tallies,
            multiple,
            end_time,
            closed,
        })
    } else {
        None
    };

    Ok(ParsedNote {
        id: note.id,
        actor_id: note.attributed_to,
        text: note.content,
        cw: note.summary,
        in_reply_to: note.in_reply_to,
        visibility,
        mentions,
        tags,
        created_at: note.published,
        poll,
    })
}
