//! `ActivityPub` Collection handlers (Outbox, Followers, Following).

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use outpost_db::entities::note::Visibility;
use outpost_db::repositories::{FollowingRepository, NoteRepository, PersonRepository, PollRepository};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, info};
use url::Url;

use crate::convert::{LocalNote, LocalPoll, local_note_to_json};
use crate::wire::{UrlConfig, as_context};

/// State required for collection handlers.
#[derive(Clone)]
pub struct CollectionState {
    pub person_repo: PersonRepository,
    pub note_repo: NoteRepository,
    pub following_repo: FollowingRepository,
    pub poll_repo: PollRepository,
    pub url_config: UrlConfig,
}

impl CollectionState {
    /// Create a new collection state.
    #[must_use]
    pub fn new(
        person_repo: PersonRepository,
        note_repo: NoteRepository,
        following_repo: FollowingRepository,
        poll_repo: PollRepository,
        base_url: Url,
    ) -> Self {
        Self {
            person_repo,
            note_repo,
            following_repo,
            poll_repo,
            url_config: UrlConfig::new(base_url),
        }
    }
}

/// Query parameters for paginated collections.
#[derive(Debug, Deserialize)]
pub struct CollectionQuery {
    pub page: Option<bool>,
    pub max_id: Option<String>,
}

/// `ActivityPub` `OrderedCollection`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderedCollection {
    #[serde(rename = "@context")]
    pub context: serde_json::Value,
    #[serde(rename = "type")]
    pub kind: String,
    pub id: String,
    pub total_items: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first: Option<String>,
}

/// `ActivityPub` `OrderedCollectionPage`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderedCollectionPage {
    #[serde(rename = "@context")]
    pub context: serde_json::Value,
    #[serde(rename = "type")]
    pub kind: String,
    pub id: String,
    pub part_of: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next: Option<String>,
    pub ordered_items: Vec<serde_json::Value>,
}

const PAGE_SIZE: u64 = 20;

/// Handle `GET /users/:username/outbox` — the actor's public post history.
pub async fn outbox_handler(
    State(state): State<CollectionState>,
    Path(username): Path<String>,
    Query(query): Query<CollectionQuery>,
) -> impl IntoResponse {
    info!(username = %username, "ActivityPub outbox lookup");

    let person = match state.person_repo.find_local_by_username(&username).await {
        Ok(Some(p)) => p,
        Ok(None) => return (StatusCode::NOT_FOUND, "actor not found").into_response(),
        Err(e) => {
            error!(error = %e, "failed to fetch actor");
            return (StatusCode::INTERNAL_SERVER_ERROR, "database error").into_response();
        }
    };

    let outbox_url = state.url_config.outbox_url(&username);

    if query.page == Some(true) {
        let notes = match state
            .note_repo
            .find_by_actor(&person.id, PAGE_SIZE, query.max_id.as_deref())
            .await
        {
            Ok(n) => n,
            Err(e) => {
                error!(error = %e, "failed to fetch notes");
                return (StatusCode::INTERNAL_SERVER_ERROR, "database error").into_response();
            }
        };
        let notes: Vec<_> = notes
            .into_iter()
            .filter(|n| n.visibility == Visibility::Public)
            .collect();

        let mut items = Vec::new();
        for note in &notes {
            let poll = match state.poll_repo.find_by_note_id(&note.id).await {
                Ok(Some(p)) => Some(p),
                _ => None,
            };
            let mentions: Vec<String> = serde_json::from_value(note.mentions.clone()).unwrap_or_default();
            let tags: Vec<String> = serde_json::from_value(note.tags.clone()).unwrap_or_default();
            let options: Vec<String> = poll
                .as_ref()
                .map(|p| serde_json::from_value(p.options.clone()).unwrap_or_default())
                .unwrap_or_default();
            let tallies: Vec<i64> = poll
                .as_ref()
                .map(|p| serde_json::from_value(p.tallies.clone()).unwrap_or_default())
                .unwrap_or_default();
            let local_poll = poll.as_ref().map(|p| LocalPoll {
                options: &options,
                tallies: &tallies,
                multiple: p.multiple,
                end_time: p.expires_at.map(|t| t.with_timezone(&chrono::Utc)),
                closed: p.closed,
            });

            let to = note_audience_to(note, &state.url_config, &person.preferred_username);
            let cc = note_audience_cc(note, &state.url_config, &person.preferred_username);

            let local_note = LocalNote {
                id: &note.id,
                actor_id: &person.id,
                text: note.text.as_deref(),
                cw: note.cw.as_deref(),
                in_reply_to: note.reply_id.as_deref(),
                to,
                cc,
                mentions: &mentions,
                tags: &tags,
                created_at: note.created_at.with_timezone(&chrono::Utc),
                edited_at: note.edited_at.map(|t| t.with_timezone(&chrono::Utc)),
                poll: local_poll,
            };
            let ap_note = local_note_to_json(&local_note);

            items.push(json!({
                "type": "Create",
                "id": format!("{}/activity", note.id),
                "actor": person.id,
                "published": note.created_at.to_rfc3339(),
                "to": ap_note.to,
                "cc": ap_note.cc,
                "object": ap_note,
            }));
        }

        let next = if notes.len() as u64 == PAGE_SIZE {
            notes.last().map(|n| format!("{outbox_url}?page=true&max_id={}", n.id))
        } else {
            None
        };

        let page = OrderedCollectionPage {
            context: as_context(),
            kind: "OrderedCollectionPage".to_string(),
            id: format!("{outbox_url}?page=true"),
            part_of: outbox_url,
            next,
            ordered_items: items,
        };
        return (
            StatusCode::OK,
            [("Content-Type", "application/activity+json; charset=utf-8")],
            Json(page),
        )
            .into_response();
    }

    let total_items = state
        .note_repo
        .count_public_by_actor(&person.id)
        .await
        .unwrap_or(0);

    let collection = OrderedCollection {
        context: as_context(),
        kind: "OrderedCollection".to_string(),
        id: outbox_url.clone(),
        total_items,
        first: Some(format!("{outbox_url}?page=true")),
    };

    (
        StatusCode::OK,
        [("Content-Type", "application/activity+json; charset=utf-8")],
        Json(collection),
    )
        .into_response()
}

fn note_audience_to(
    note: &outpost_db::entities::note::Model,
    urls: &UrlConfig,
    username: &str,
) -> Vec<String> {
    match note.visibility {
        Visibility::Public => vec![crate::wire::AS_PUBLIC.to_string()],
        Visibility::Home => vec![urls.followers_url(username)],
        Visibility::Followers => vec![urls.followers_url(username)],
        Visibility::Specified => {
            serde_json::from_value(note.visible_actor_ids.clone()).unwrap_or_default()
        }
    }
}

fn note_audience_cc(
    note: &outpost_db::entities::note::Model,
    urls: &UrlConfig,
    username: &str,
) -> Vec<String> {
    match note.visibility {
        Visibility::Public => vec![urls.followers_url(username)],
        Visibility::Home => vec![crate::wire::AS_PUBLIC.to_string()],
        Visibility::Followers | Visibility::Specified => vec![],
    }
}

/// Handle `GET /users/:username/followers`.
pub async fn followers_handler(
    State(state): State<CollectionState>,
    Path(username): Path<String>,
    Query(query): Query<CollectionQuery>,
) -> impl IntoResponse {
    info!(username = %username, "ActivityPub followers lookup");

    let person = match state.person_repo.find_local_by_username(&username).await {
        Ok(Some(p)) => p,
        Ok(None) => return (StatusCode::NOT_FOUND, "actor not found").into_response(),
        Err(e) => {
            error!(error = %e, "failed to fetch actor");
            return (StatusCode::INTERNAL_SERVER_ERROR, "database error").into_response();
        }
    };

    let followers_url = state.url_config.followers_url(&username);

    if query.page == Some(true) {
        let edges = match state
            .following_repo
            .find_followers(&person.id, PAGE_SIZE, query.max_id.as_deref())
            .await
        {
            Ok(f) => f,
            Err(e) => {
                error!(error = %e, "failed to fetch followers");
                return (StatusCode::INTERNAL_SERVER_ERROR, "database error").into_response();
            }
        };

        let items: Vec<serde_json::Value> = edges.iter().map(|e| json!(e.follower_id)).collect();
        let next = if edges.len() as u64 == PAGE_SIZE {
            edges.last().map(|e| format!("{followers_url}?page=true&max_id={}", e.id))
        } else {
            None
        };

        let page = OrderedCollectionPage {
            context: as_context(),
            kind: "OrderedCollectionPage".to_string(),
            id: format!("{followers_url}?page=true"),
            part_of: followers_url,
            next,
            ordered_items: items,
        };
        return (
            StatusCode::OK,
            [("Content-Type", "application/activity+json; charset=utf-8")],
            Json(page),
        )
            .into_response();
    }

    let total_items = state.following_repo.count_followers(&person.id).await.unwrap_or(0);
    let collection = OrderedCollection {
        context: as_context(),
        kind: "OrderedCollection".to_string(),
        id: followers_url.clone(),
        total_items,
        first: Some(format!("{followers_url}?page=true")),
    };

    (
        StatusCode::OK,
        [("Content-Type", "application/activity+json; charset=utf-8")],
        Json(collection),
    )
        .into_response()
}

/// Handle `GET /users/:username/following`.
pub async fn following_handler(
    State(state): State<CollectionState>,
    Path(username): Path<String>,
    Query(query): Query<CollectionQuery>,
) -> impl IntoResponse {
    info!(username = %username, "ActivityPub following lookup");

    let person = match state.person_repo.find_local_by_username(&username).await {
        Ok(Some(p)) => p,
        Ok(None) => return (StatusCode::NOT_FOUND, "actor not found").into_response(),
        Err(e) => {
            error!(error = %e, "failed to fetch actor");
            return (StatusCode::INTERNAL_SERVER_ERROR, "database error").into_response();
        }
    };

    let following_url = state.url_config.following_url(&username);

    if query.page == Some(true) {
        let edges = match state
            .following_repo
            .find_following(&person.id, PAGE_SIZE, query.max_id.as_deref())
            .await
        {
            Ok(f) => f,
            Err(e) => {
                error!(error = %e, "failed to fetch following");
                return (StatusCode::INTERNAL_SERVER_ERROR, "database error").into_response();
            }
        };

        let items: Vec<serde_json::Value> = edges.iter().map(|e| json!(e.followee_id)).collect();
        let next = if edges.len() as u64 == PAGE_SIZE {
            edges.last().map(|e| format!("{following_url}?page=true&max_id={}", e.id))
        } else {
            None
        };

        let page = OrderedCollectionPage {
            context: as_context(),
            kind: "OrderedCollectionPage".to_string(),
            id: format!("{following_url}?page=true"),
            part_of: following_url,
            next,
            ordered_items: items,
        };
        return (
            StatusCode::OK,
            [("Content-Type", "application/activity+json; charset=utf-8")],
            Json(page),
        )
            .into_response();
    }

    let total_items = state.following_repo.count_following(&person.id).await.unwrap_or(0);
    let collection = OrderedCollection {
        context: as_context(),
        kind: "OrderedCollection".to_string(),
        id: following_url.clone(),
        total_items,
        first: Some(format!("{following_url}?page=true")),
    };

    (
        StatusCode::OK,
        [("Content-Type", "application/activity+json; charset=utf-8")],
        Json(collection),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_as_context_is_array() {
        assert!(as_context().is_array());
    }
}
