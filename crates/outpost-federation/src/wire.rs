//! `ActivityPub` wire shapes: the JSON actually exchanged over HTTP, kept
//! separate from the database's internal entity shapes (spec.md §3).
//!
//! Only the closed vocabulary spec.md needs is modelled here — no
//! attachments, no custom extension namespaces.

use serde::{Deserialize, Serialize};
use url::Url;

/// The `ActivityStreams` public collection sentinel (spec.md §4.2).
pub const AS_PUBLIC: &str = "https://www.w3.org/ns/activitystreams#Public";

/// `@context` value used on every outgoing document.
pub fn as_context() -> serde_json::Value {
    serde_json::json!(["https://www.w3.org/ns/activitystreams", "https://w3id.org/security/v1"])
}

/// Builds the well-known URLs for a local actor from the instance's base
/// URL. Every handler and conversion routine that needs to mint or parse
/// one of these URLs goes through here rather than formatting ad hoc.
#[derive(Clone, Debug)]
pub struct UrlConfig {
    base: String,
}

impl UrlConfig {
    #[must_use]
    pub fn new(base_url: Url) -> Self {
        Self {
            base: base_url.as_str().trim_end_matches('/').to_string(),
        }
    }

    #[must_use]
    pub fn user_url(&self, username: &str) -> String {
        format!("{}/users/{username}", self.base)
    }

    #[must_use]
    pub fn inbox_url(&self, username: &str) -> String {
        format!("{}/users/{username}/inbox", self.base)
    }

    #[must_use]
    pub fn outbox_url(&self, username: &str) -> String {
        format!("{}/users/{username}/outbox", self.base)
    }

    #[must_use]
    pub fn shared_inbox_url(&self) -> String {
        format!("{}/inbox", self.base)
    }

    #[must_use]
    pub fn followers_url(&self, username: &str) -> String {
        format!("{}/users/{username}/followers", self.base)
    }

    #[must_use]
    pub fn following_url(&self, username: &str) -> String {
        format!("{}/users/{username}/following", self.base)
    }

    #[must_use]
    pub fn public_key_url(&self, username: &str) -> String {
        format!("{}/users/{username}#main-key", self.base)
    }
}

/// Actor document (`Person`/`Group`/`Application`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActorJson {
    #[serde(rename = "@context")]
    pub context: serde_json::Value,
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(rename = "preferredUsername")]
    pub preferred_username: String,
    pub inbox: String,
    pub outbox: String,
    pub followers: String,
    pub following: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", rename = "movedTo")]
    pub moved_to: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty", rename = "alsoKnownAs")]
    pub also_known_as: Vec<String>,
    pub endpoints: Endpoints,
    #[serde(rename = "publicKey")]
    pub public_key: PublicKeyJson,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Endpoints {
    #[serde(rename = "sharedInbox")]
    pub shared_inbox: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicKeyJson {
    pub id: String,
    pub owner: String,
    #[serde(rename = "publicKeyPem")]
    pub public_key_pem: String,
}

/// `Note`/`Question` object. `oneOf`/`anyOf` carry poll options (mutually
/// exclusive vs. multiple-choice, spec.md §4.5); `replies`/votes are
/// re-derived locally, never trusted from the wire beyond initial ingest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NoteJson {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(rename = "attributedTo")]
    pub attributed_to: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, rename = "inReplyTo", skip_serializing_if = "Option::is_none")]
    pub in_reply_to: Option<String>,
    #[serde(default)]
    pub to: Vec<String>,
    #[serde(default)]
    pub cc: Vec<String>,
    #[serde(default)]
    pub tag: Vec<TagJson>,
    pub published: chrono::DateTime<chrono::Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated: Option<chrono::DateTime<chrono::Utc>>,
    #[serde(default, rename = "oneOf", skip_serializing_if = "Option::is_none")]
    pub one_of: Option<Vec<PollOptionJson>>,
    #[serde(default, rename = "anyOf", skip_serializing_if = "Option::is_none")]
    pub any_of: Option<Vec<PollOptionJson>>,
    #[serde(default, rename = "votersCount", skip_serializing_if = "Option::is_none")]
    pub voters_count: Option<i32>,
    #[serde(default, rename = "endTime", skip_serializing_if = "Option::is_none")]
    pub end_time: Option<chrono::DateTime<chrono::Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub closed: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum TagJson {
    Mention {
        href: String,
        #[serde(default)]
        name: String,
    },
    Hashtag {
        name: String,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollOptionJson {
    pub name: String,
    pub replies: PollOptionRepliesJson,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollOptionRepliesJson {
    #[serde(rename = "type", default = "collection_kind")]
    pub kind: String,
    #[serde(rename = "totalItems", default)]
    pub total_items: i64,
}

fn collection_kind() -> String {
    "Collection".to_string()
}

/// `Tombstone` object left behind by a `Delete`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TombstoneJson {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
}
