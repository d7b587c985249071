//! Shared inbox / per-actor inbox HTTP endpoint.
//!
//! The handler is the "trusted front" spec.md §2 refers to: it performs
//! the full HTTP Signature verification (fetching/caching the sender's
//! public key as needed) and, on success, does nothing more than insert a
//! row into `inbox(sender, activity, raw)`. All admission checks,
//! dispatch-table routing, reply-forwarding and group relay live in the
//! poller (`outpost-queue`), not here.

#![allow(missing_docs)]

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{OriginalUri, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use chrono::Utc;
use outpost_db::{
    entities::inbox,
    repositories::{InboxRepository, PersonRepository},
};
use sea_orm::Set;
use tracing::{debug, warn};

use crate::cache::RemoteActorCache;
use crate::client::ApClient;
use crate::convert::parse_actor_json;
use crate::signature::{verify_digest, HttpVerifier};

#[derive(Clone)]
pub struct InboxState {
    pub person_repo: PersonRepository,
    pub inbox_repo: InboxRepository,
    pub cache: RemoteActorCache,
    pub client: Arc<ApClient>,
}

/// Shared inbox: `POST /inbox`. Accepts activities addressed to any local
/// actor, deduplicated later by the dispatcher's per-`to`/`cc` fan-out.
pub async fn inbox_handler(
    State(state): State<InboxState>,
    uri: OriginalUri,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    handle(state, uri.0.path().to_string(), headers, body).await
}

/// Per-actor inbox: `POST /users/:username/inbox`. Functionally identical
/// to the shared inbox — the sender is still whatever the envelope's
/// `actor` field and signature say, not the path.
pub async fn user_inbox_handler(
    State(state): State<InboxState>,
    uri: OriginalUri,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    handle(state, uri.0.path().to_string(), headers, body).await
}

async fn handle(state: InboxState, path: String, headers: HeaderMap, body: Bytes) -> StatusCode {
    let json: serde_json::Value = match serde_json::from_slice(&body) {
        Ok(v) => v,
        Err(e) => {
            warn!(error = %e, "inbox: malformed JSON body");
            return StatusCode::BAD_REQUEST;
        }
    };

    let activity_actor = json.get("actor").and_then(|v| {
        v.as_str()
            .map(str::to_string)
            .or_else(|| v.get("id").and_then(|id| id.as_str()).map(str::to_string))
    });
    let Some(activity_actor) = activity_actor else {
        warn!("inbox: activity missing actor");
        return StatusCode::BAD_REQUEST;
    };

    let activity_type = json
        .get("type")
        .and_then(|v| v.as_str())
        .unwrap_or("Unknown")
        .to_string();

    match verify_request(&state, &path, &headers, &body, &activity_actor).await {
        Ok(true) => {}
        Ok(false) => {
            warn!(sender = %activity_actor, "inbox: signature verification failed");
            return StatusCode::UNAUTHORIZED;
        }
        Err(e) => {
            warn!(sender = %activity_actor, error = %e, "inbox: could not verify signature");
            return StatusCode::UNAUTHORIZED;
        }
    }

    let model = inbox::ActiveModel {
        id: sea_orm::NotSet,
        sender: Set(activity_actor.clone()),
        activity_type: Set(activity_type),
        raw: Set(json),
        received_at: Set(Utc::now().into()),
        attempts: Set(0),
        last_error: Set(None),
        leased_until: Set(None),
        processed_at: Set(None),
    };

    if let Err(e) = state.inbox_repo.enqueue(model).await {
        warn!(sender = %activity_actor, error = %e, "inbox: failed to enqueue");
        return StatusCode::INTERNAL_SERVER_ERROR;
    }

    debug!(sender = %activity_actor, "inbox: activity admitted");
    StatusCode::ACCEPTED
}

async fn verify_request(
    state: &InboxState,
    path: &str,
    headers: &HeaderMap,
    body: &[u8],
    activity_actor: &str,
) -> Result<bool, outpost_common::AppError> {
    let sig_header = headers
        .get("signature")
        .and_then(|v| v.to_str().ok())
        .ok_or(outpost_common::AppError::Unauthorized)?;
    let components = HttpVerifier::parse_signature_header(sig_header)
        .map_err(|e| outpost_common::AppError::Federation(e.to_string()))?;

    if let Some(digest_header) = headers.get("digest").and_then(|v| v.to_str().ok())
        && !verify_digest(body, digest_header)
    {
        return Ok(false);
    }

    let key_actor_id = components
        .key_id
        .split('#')
        .next()
        .unwrap_or(&components.key_id)
        .to_string();
    if key_actor_id != activity_actor {
        warn!(key_id = %components.key_id, actor = %activity_actor, "inbox: keyId does not match activity actor");
        return Ok(false);
    }

    let public_key_pem = resolve_public_key(state, &key_actor_id).await?;

    let mut header_map = HashMap::new();
    for name in &components.headers {
        if name == "(request-target)" {
            continue;
        }
        if let Some(value) = headers.get(name.as_str()).and_then(|v| v.to_str().ok()) {
            header_map.insert(name.clone(), value.to_string());
        }
    }
    HttpVerifier::verify(&public_key_pem, &components, "POST", path, &header_map)
        .map_err(|e| outpost_common::AppError::Federation(e.to_string()))
}

/// Resolves `actor_id`'s public key PEM: DB row, then in-process cache,
/// then a live fetch (cached afterward either way).
async fn resolve_public_key(
    state: &InboxState,
    actor_id: &str,
) -> Result<String, outpost_common::AppError> {
    if let Some(person) = state.person_repo.find_by_id(actor_id).await?
        && let Some(pem) = person.public_key_pem
    {
        return Ok(pem);
    }

    if let Some(cached) = state
        .cache
        .get(actor_id)
        .await
        .map_err(|e| outpost_common::AppError::Federation(e.to_string()))?
    {
        return Ok(cached.public_key_pem);
    }

    let fetched = state
        .client
        .fetch_actor(actor_id)
        .await
        .map_err(|e| outpost_common::AppError::Federation(e.to_string()))?;

    if let Some(cached) = crate::cache::CachedRemoteActor::from_json(&fetched, actor_id) {
        let _ = state.cache.set(&cached).await;
    }

    let parsed = parse_actor_json(&fetched)?;
    parsed
        .public_key_pem
        .ok_or_else(|| outpost_common::AppError::Federation("actor has no public key".to_string()))
}
