//! `WebFinger` handler for actor discovery (spec.md §6).

use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use outpost_db::repositories::PersonRepository;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::wire::UrlConfig;

/// `WebFinger` query parameters.
#[derive(Debug, Deserialize)]
pub struct WebfingerQuery {
    pub resource: String,
}

/// `WebFinger` response (RFC 7033 JRD).
#[derive(Debug, Serialize)]
pub struct WebfingerResponse {
    pub subject: String,
    pub aliases: Vec<String>,
    pub links: Vec<WebfingerLink>,
}

/// `WebFinger` link.
#[derive(Debug, Serialize)]
pub struct WebfingerLink {
    pub rel: String,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub link_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub href: Option<String>,
}

/// State required for the `WebFinger` handler.
#[derive(Clone)]
pub struct WebfingerState {
    pub domain: String,
    pub person_repo: PersonRepository,
    pub url_config: UrlConfig,
}

impl WebfingerState {
    /// Create a new `WebFinger` state.
    #[must_use]
    pub fn new(domain: String, person_repo: PersonRepository, base_url: url::Url) -> Self {
        Self {
            domain,
            person_repo,
            url_config: UrlConfig::new(base_url),
        }
    }
}

/// Parses `acct:username@domain` into its parts.
fn parse_acct(resource: &str) -> Option<(String, String)> {
    let rest = resource.strip_prefix("acct:")?;
    let (username, domain) = rest.split_once('@')?;
    Some((username.to_string(), domain.to_string()))
}

/// Handle `GET /.well-known/webfinger?resource=acct:user@example.com`.
///
/// Only local actors resolve here — remote actors are discovered through
/// their own origin's `WebFinger` endpoint.
pub async fn webfinger_handler(
    State(state): State<WebfingerState>,
    Query(query): Query<WebfingerQuery>,
) -> impl IntoResponse {
    info!(resource = %query.resource, "WebFinger lookup");

    let Some((username, domain)) = parse_acct(&query.resource) else {
        return (StatusCode::BAD_REQUEST, "invalid resource format").into_response();
    };

    if domain != state.domain {
        return (StatusCode::NOT_FOUND, "unknown domain").into_response();
    }

    let person = match state.person_repo.find_local_by_username(&username).await {
        Ok(Some(p)) => p,
        Ok(None) => {
            info!(username = %username, "actor not found for WebFinger");
            return (StatusCode::NOT_FOUND, "actor not found").into_response();
        }
        Err(e) => {
            warn!(error = %e, "database error during WebFinger lookup");
            return (StatusCode::INTERNAL_SERVER_ERROR, "database error").into_response();
        }
    };

    let actor_url = state.url_config.user_url(&person.preferred_username);

    let response = WebfingerResponse {
        subject: query.resource.clone(),
        aliases: vec![actor_url.clone()],
        links: vec![WebfingerLink {
            rel: "self".to_string(),
            link_type: Some("application/activity+json".to_string()),
            href: Some(actor_url),
        }],
    };

    (
        StatusCode::OK,
        [("Content-Type", "application/jrd+json")],
        Json(response),
    )
        .into_response()
}
