//! Resolves a `user@host` handle to a `person` row, per spec.md §6's
//! `dm/{actor}`, `follow/{actor}`, `unfollow/{actor}`, `outbox/{actor}`, and
//! `resolve` commands — these address actors by handle, not by the
//! content-addressed `local_id` that posts use.
//!
//! Local actors resolve straight out of the database. An unknown remote
//! handle is discovered the same way the inbox's `ensure_person` path
//! discovers a stranger: `WebFinger` to find the actor id, then fetch and
//! cache the actor document.

use chrono::Utc;
use outpost_common::{AppError, AppResult};
use outpost_db::entities::person;
use outpost_federation::{client::ApClient, convert::parse_actor_json};
use sea_orm::Set;

use crate::context::TextContext;

/// Splits `user@host` into its parts. A bare `user` (no `@host`) is treated
/// as a local username.
#[must_use]
pub fn parse_handle(handle: &str) -> (String, Option<String>) {
    match handle.split_once('@') {
        Some((user, host)) if !host.is_empty() => (user.to_string(), Some(host.to_string())),
        _ => (handle.to_string(), None),
    }
}

/// Resolves `handle` to a `person` row, fetching and persisting a remote
/// actor on first contact.
pub async fn resolve_handle(ctx: &TextContext, handle: &str) -> AppResult<person::Model> {
    let (username, host) = parse_handle(handle);
    let local_host = local_host(ctx);
    let effective_host = host.filter(|h| h != &local_host);

    if let Some(found) = ctx
        .person_repo
        .find_by_username_and_host(&username, effective_host.as_deref())
        .await?
    {
        return Ok(found);
    }

    let Some(host) = effective_host else {
        return Err(AppError::UserNotFound(handle.to_string()));
    };

    let acct = format!("{username}@{host}");
    let jrd = ctx.ap_client.webfinger(&acct, &host).await.map_err(|e| {
        AppError::Federation(format!("WebFinger lookup for {acct} failed: {e}"))
    })?;
    let actor_id = extract_self_link(&jrd)
        .ok_or_else(|| AppError::Federation(format!("WebFinger response for {acct} has no self link")))?;

    let document = ctx
        .ap_client
        .fetch_actor(&actor_id)
        .await
        .map_err(|e| AppError::Federation(format!("fetching actor {actor_id} failed: {e}")))?;
    let parsed = parse_actor_json(&document)?;

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

fn local_host(ctx: &TextContext) -> String {
    url::Url::parse(&ctx.domain)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .unwrap_or_default()
}

/// Pulls the `rel=self`, `application/activity+json` `href` out of a JRD.
fn extract_self_link(jrd: &serde_json::Value) -> Option<String> {
    jrd.get("links")?.as_array()?.iter().find_map(|link| {
        let rel = link.get("rel")?.as_str()?;
        let link_type = link.get("type").and_then(|t| t.as_str()).unwrap_or("");
        if rel == "self" && (link_type.is_empty() || link_type.contains("activity+json")) {
            link.get("href")?.as_str().map(str::to_string)
        } else {
            None
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parse_handle_splits_user_and_host() {
        assert_eq!(
            parse_handle("alice@remote.example"),
            ("alice".to_string(), Some("remote.example".to_string()))
        );
        assert_eq!(parse_handle("alice"), ("alice".to_string(), None));
    }

    #[test]
    fn extract_self_link_finds_activity_json_href() {
        let jrd = json!({
            "subject": "acct:alice@remote.example",
            "links": [
                {"rel": "http://webfinger.net/rel/profile-page", "href": "https://remote.example/@alice"},
                {"rel": "self", "type": "application/activity+json", "href": "https://remote.example/users/alice"},
            ]
        });
        assert_eq!(
            extract_self_link(&jrd),
            Some("https://remote.example/users/alice".to_string())
        );
    }

    #[test]
    fn extract_self_link_absent_returns_none() {
        let jrd = json!({"links": []});
        assert_eq!(extract_self_link(&jrd), None);
    }
}
