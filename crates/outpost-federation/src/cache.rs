//! Remote actor caching, in-process.
//!
//! Replaces the distributed Redis cache the teacher used: spec.md's
//! single-process model has no second instance to share a cache with, so
//! this is a plain `RwLock<HashMap>` with the same 24-hour TTL and
//! "read-any, write-last" semantics — any reader sees the latest write,
//! writers never block each other's completion. Bounded by simple
//! insertion-order eviction once `max_entries` is exceeded.

#![allow(missing_docs)]

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Default cache TTL: 24 hours.
const DEFAULT_CACHE_TTL_SECS: i64 = 24 * 60 * 60;

/// Short cache TTL for failed lookups: 5 minutes.
const FAILED_LOOKUP_TTL_SECS: i64 = 5 * 60;

/// Default cap on cached entries before insertion-order eviction kicks in.
const DEFAULT_MAX_ENTRIES: usize = 10_000;

/// Cached remote actor data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedRemoteActor {
    pub id: String,
    pub actor_type: String,
    pub preferred_username: String,
    pub name: Option<String>,
    pub summary: Option<String>,
    pub inbox: String,
    pub shared_inbox: Option<String>,
    pub outbox: Option<String>,
    pub followers: Option<String>,
    pub following: Option<String>,
    pub public_key_id: String,
    pub public_key_pem: String,
    pub icon: Option<String>,
    pub image: Option<String>,
    pub host: String,
    pub cached_at: chrono::DateTime<chrono::Utc>,
}

impl CachedRemoteActor {
    /// Create a cached actor from raw `ActivityPub` JSON.
    pub fn from_json(json: &serde_json::Value, host: &str) -> Option<Self> {
        let id = json.get("id")?.as_str()?.to_string();
        let actor_type = json.get("type")?.as_str()?.to_string();
        let preferred_username = json.get("preferredUsername")?.as_str()?.to_string();
        let name = json.get("name").and_then(|v| v.as_str()).map(String::from);
        let summary = json
            .get("summary")
            .and_then(|v| v.as_str())
            .map(String::from);
        let inbox = json.get("inbox")?.as_str()?.to_string();

        let shared_inbox = json
            .get("endpoints")
            .and_then(|e| e.get("sharedInbox"))
            .and_then(|v| v.as_str())
            .map(String::from)
            .or_else(|| {
                json.get("sharedInbox")
                    .and_then(|v| v.as_str())
                    .map(String::from)
            });

        let outbox = json
            .get("outbox")
            .and_then(|v| v.as_str())
            .map(String::from);
        let followers = json
            .get("followers")
            .and_then(|v| v.as_str())
            .map(String::from);
        let following = json
            .get("following")
            .and_then(|v| v.as_str())
            .map(String::from);

        let public_key = json.get("publicKey")?;
        let public_key_id = public_key.get("id")?.as_str()?.to_string();
        let public_key_pem = public_key.get("publicKeyPem")?.as_str()?.to_string();

        let icon = json
            .get("icon")
            .and_then(|i| {
                if i.is_object() {
                    i.get("url").and_then(|v| v.as_str())
                } else {
                    i.as_str()
                }
            })
            .map(String::from);

        let image = json
            .get("image")
            .and_then(|i| {
                if i.is_object() {
                    i.get("url").and_then(|v| v.as_str())
                } else {
                    i.as_str()
                }
            })
            .map(String::from);

        Some(Self {
            id,
            actor_type,
            preferred_username,
            name,
            summary,
            inbox,
            shared_inbox,
            outbox,
            followers,
            following,
            public_key_id,
            public_key_pem,
            icon,
            image,
            host: host.to_string(),
            cached_at: chrono::Utc::now(),
        })
    }

    #[must_use]
    pub fn is_stale(&self, ttl_secs: i64) -> bool {
        let now = chrono::Utc::now();
        let age = now.signed_duration_since(self.cached_at);
        age.num_seconds() > ttl_secs
    }
}

struct Entry {
    actor: CachedRemoteActor,
}

struct FailedEntry {
    marked_at: chrono::DateTime<chrono::Utc>,
}

struct Inner {
    actors: HashMap<String, Entry>,
    failed: HashMap<String, FailedEntry>,
    /// Insertion order, for eviction once `max_entries` is exceeded.
    order: Vec<String>,
}

/// In-process remote actor cache.
#[derive(Clone)]
pub struct RemoteActorCache {
    inner: Arc<RwLock<Inner>>,
    ttl_secs: i64,
    max_entries: usize,
}

impl RemoteActorCache {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(Inner {
                actors: HashMap::new(),
                failed: HashMap::new(),
                order: Vec::new(),
            })),
            ttl_secs: DEFAULT_CACHE_TTL_SECS,
            max_entries: DEFAULT_MAX_ENTRIES,
        }
    }

    #[must_use]
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            ttl_secs: ttl.as_secs() as i64,
            ..Self::new()
        }
    }

    pub async fn get(&self, actor_url: &str) -> Result<Option<CachedRemoteActor>, CacheError> {
        let guard = self.inner.read().await;
        match guard.actors.get(actor_url) {
            Some(entry) if !entry.actor.is_stale(self.ttl_secs) => {
                debug!(actor_url = %actor_url, "Cache hit for remote actor");
                Ok(Some(entry.actor.clone()))
            }
            Some(_) => {
                debug!(actor_url = %actor_url, "Cache entry is stale, will refresh");
                Ok(None)
            }
            None => {
                debug!(actor_url = %actor_url, "Cache miss for remote actor");
                Ok(None)
            }
        }
    }

    pub async fn is_failed_lookup(&self, actor_url: &str) -> Result<bool, CacheError> {
        let guard = self.inner.read().await;
        Ok(guard
            .failed
            .get(actor_url)
            .is_some_and(|e| (chrono::Utc::now() - e.marked_at).num_seconds() < FAILED_LOOKUP_TTL_SECS))
    }

    pub async fn set(&self, actor: &CachedRemoteActor) -> Result<(), CacheError> {
        let mut guard = self.inner.write().await;
        if !guard.actors.contains_key(&actor.id) {
            guard.order.push(actor.id.clone());
        }
        guard.actors.insert(
            actor.id.clone(),
            Entry {
                actor: actor.clone(),
            },
        );
        while guard.order.len() > self.max_entries {
            let oldest = guard.order.remove(0);
            guard.actors.remove(&oldest);
        }
        info!(actor_url = %actor.id, host = %actor.host, "Cached remote actor");
        Ok(())
    }

    pub async fn set_failed(&self, actor_url: &str) -> Result<(), CacheError> {
        let mut guard = self.inner.write().await;
        guard.failed.insert(
            actor_url.to_string(),
            FailedEntry {
                marked_at: chrono::Utc::now(),
            },
        );
        warn!(actor_url = %actor_url, "Marked actor lookup as failed");
        Ok(())
    }

    pub async fn invalidate(&self, actor_url: &str) -> Result<(), CacheError> {
        let mut guard = self.inner.write().await;
        guard.actors.remove(actor_url);
        guard.order.retain(|id| id != actor_url);
        info!(actor_url = %actor_url, "Invalidated cached remote actor");
        Ok(())
    }

    pub async fn clear_failed(&self, actor_url: &str) -> Result<(), CacheError> {
        let mut guard = self.inner.write().await;
        guard.failed.remove(actor_url);
        Ok(())
    }

    pub async fn stats(&self) -> Result<CacheStats, CacheError> {
        let guard = self.inner.read().await;
        Ok(CacheStats {
            cached_actors: guard.actors.len(),
            failed_lookups: guard.failed.len(),
        })
    }
}

impl Default for RemoteActorCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Cache statistics.
#[derive(Debug, Clone)]
pub struct CacheStats {
    pub cached_actors: usize,
    pub failed_lookups: usize,
}

/// Cache error type. Kept as a distinct type (rather than collapsing into
/// `AppError`) even though the in-process cache can't actually fail —
/// callers built against the Redis-backed version already propagate this.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("cache error: {0}")]
    Internal(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_cached_remote_actor_from_json() {
        let json = json!({
            "id": "https://example.com/users/test",
            "type": "Person",
            "preferredUsername": "test",
            "name": "Test User",
            "summary": "A test user",
            "inbox": "https://example.com/users/test/inbox",
            "outbox": "https://example.com/users/test/outbox",
            "followers": "https://example.com/users/test/followers",
            "following": "https://example.com/users/test/following",
            "endpoints": {
                "sharedInbox": "https://example.com/inbox"
            },
            "publicKey": {
                "id": "https://example.com/users/test#main-key",
                "publicKeyPem": "-----BEGIN PUBLIC KEY-----\nMIIB...\n-----END PUBLIC KEY-----"
            }
        });

        let actor = CachedRemoteActor::from_json(&json, "example.com").unwrap();
        assert_eq!(actor.id, "https://example.com/users/test");
        assert_eq!(actor.actor_type, "Person");
        assert_eq!(
            actor.shared_inbox,
            Some("https://example.com/inbox".to_string())
        );
    }

    #[tokio::test]
    async fn set_then_get_round_trips() {
        let cache = RemoteActorCache::new();
        let json = json!({
            "id": "https://example.com/users/alice",
            "type": "Person",
            "preferredUsername": "alice",
            "inbox": "https://example.com/users/alice/inbox",
            "publicKey": {"id": "k", "publicKeyPem": "pem"}
        });
        let actor = CachedRemoteActor::from_json(&json, "example.com").unwrap();
        cache.set(&actor).await.unwrap();
        let fetched = cache.get(&actor.id).await.unwrap();
        assert!(fetched.is_some());
    }

    #[tokio::test]
    async fn invalidate_removes_entry() {
        let cache = RemoteActorCache::new();
        let json = json!({
            "id": "https://example.com/users/bob",
            "type": "Person",
            "preferredUsername": "bob",
            "inbox": "https://example.com/users/bob/inbox",
            "publicKey": {"id": "k", "publicKeyPem": "pem"}
        });
        let actor = CachedRemoteActor::from_json(&json, "example.com").unwrap();
        cache.set(&actor).await.unwrap();
        cache.invalidate(&actor.id).await.unwrap();
        assert!(cache.get(&actor.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn failed_lookup_is_recorded() {
        let cache = RemoteActorCache::new();
        assert!(!cache.is_failed_lookup("https://example.com/users/nobody").await.unwrap());
        cache.set_failed("https://example.com/users/nobody").await.unwrap();
        assert!(cache.is_failed_lookup("https://example.com/users/nobody").await.unwrap());
    }
}
