//! `ActivityPub` actor (`Person`/`Group`/`Application`) endpoint handler.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use outpost_db::repositories::{PersonKeypairRepository, PersonRepository};
use tracing::{error, info};
use url::Url;

use crate::convert::{LocalActor, local_actor_to_json};
use crate::wire::UrlConfig;

/// State required for the actor `ActivityPub` handler.
#[derive(Clone)]
pub struct UserApState {
    pub person_repo: PersonRepository,
    pub keypair_repo: PersonKeypairRepository,
    pub url_config: UrlConfig,
}

impl UserApState {
    /// Create a new actor AP state.
    #[must_use]
    pub fn new(
        person_repo: PersonRepository,
        keypair_repo: PersonKeypairRepository,
        base_url: Url,
    ) -> Self {
        Self {
            person_repo,
            keypair_repo,
            url_config: UrlConfig::new(base_url),
        }
    }
}

/// Handle `GET /users/:username` — the actor document.
///
/// Only local actors are served here; remote actors live at their own
/// origin and are never proxied through this instance.
pub async fn user_handler(
    State(state): State<UserApState>,
    Path(username): Path<String>,
) -> impl IntoResponse {
    info!(username = %username, "ActivityPub actor lookup");

    let person = match state.person_repo.find_local_by_username(&username).await {
        Ok(Some(p)) => p,
        Ok(None) => {
            info!(username = %username, "actor not found");
            return (StatusCode::NOT_FOUND, "actor not found").into_response();
        }
        Err(e) => {
            error!(error = %e, "failed to fetch actor");
            return (StatusCode::INTERNAL_SERVER_ERROR, "database error").into_response();
        }
    };

    let public_key_pem = match state.keypair_repo.find_by_person_id(&person.id).await {
        Ok(Some(keypair)) => keypair.public_key_pem,
        Ok(None) => {
            error!(person_id = %person.id, "keypair not found for local actor");
            return (StatusCode::INTERNAL_SERVER_ERROR, "actor has no keypair").into_response();
        }
        Err(e) => {
            error!(error = %e, "failed to fetch keypair");
            return (StatusCode::INTERNAL_SERVER_ERROR, "database error").into_response();
        }
    };

    let actor = LocalActor {
        username: &person.preferred_username,
        kind: &person.kind,
        bio: person.bio.as_deref(),
        moved_to: person.moved_to.as_deref(),
        also_known_as: &[],
        public_key_pem: &public_key_pem,
    };
    let json = local_actor_to_json(&actor, &state.url_config);

    (
        StatusCode::OK,
        [("Content-Type", "application/activity+json; charset=utf-8")],
        Json(json),
    )
        .into_response()
}
