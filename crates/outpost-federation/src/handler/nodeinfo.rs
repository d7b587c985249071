//! `NodeInfo` handler for instance discovery.

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use outpost_db::repositories::{NoteRepository, PersonRepository};
use serde::Serialize;
use url::Url;

/// `NodeInfo` well-known response.
#[derive(Debug, Serialize)]
pub struct NodeInfoWellKnown {
    pub links: Vec<NodeInfoLink>,
}

/// `NodeInfo` link.
#[derive(Debug, Serialize)]
pub struct NodeInfoLink {
    pub rel: String,
    pub href: String,
}

/// `NodeInfo` 2.1 response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeInfo {
    pub version: String,
    pub software: NodeInfoSoftware,
    pub protocols: Vec<String>,
    pub usage: NodeInfoUsage,
    pub open_registrations: bool,
    pub metadata: NodeInfoMetadata,
}

/// `NodeInfo` software information.
#[derive(Debug, Serialize)]
pub struct NodeInfoSoftware {
    pub name: String,
    pub version: String,
}

/// `NodeInfo` usage statistics.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeInfoUsage {
    pub users: NodeInfoUsers,
    pub local_posts: u64,
}

/// `NodeInfo` user statistics. Active-user tracking is out of scope (spec.md
/// Non-goals) so `active_month`/`active_halfyear` always mirror `total`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeInfoUsers {
    pub total: u64,
    pub active_month: u64,
    pub active_halfyear: u64,
}

/// `NodeInfo` metadata.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeInfoMetadata {
    pub node_name: String,
    pub node_description: String,
}

/// State for `NodeInfo` handlers.
#[derive(Clone)]
pub struct NodeInfoState {
    pub base_url: Url,
    pub instance_name: String,
    pub instance_description: String,
    pub version: String,
    pub person_repo: PersonRepository,
    pub note_repo: NoteRepository,
}

impl NodeInfoState {
    /// Create new `NodeInfo` state.
    #[must_use]
    pub fn new(
        base_url: Url,
        instance_name: String,
        instance_description: String,
        version: String,
        person_repo: PersonRepository,
        note_repo: NoteRepository,
    ) -> Self {
        Self {
            base_url,
            instance_name,
            instance_description,
            version,
            person_repo,
            note_repo,
        }
    }
}

/// Handle `GET /.well-known/nodeinfo`.
pub async fn well_known_nodeinfo(State(state): State<NodeInfoState>) -> impl IntoResponse {
    let nodeinfo_url = format!("{}/nodeinfo/2.1", state.base_url.as_str().trim_end_matches('/'));

    let response = NodeInfoWellKnown {
        links: vec![NodeInfoLink {
            rel: "http://nodeinfo.diaspora.software/ns/schema/2.1".to_string(),
            href: nodeinfo_url,
        }],
    };

    (
        StatusCode::OK,
        [("Content-Type", "application/json")],
        Json(response),
    )
}

/// Handle `GET /nodeinfo/2.1`.
pub async fn nodeinfo_2_1(State(state): State<NodeInfoState>) -> impl IntoResponse {
    let total_users = state.person_repo.count_local().await.unwrap_or(0);
    let local_posts = state.note_repo.count_local().await.unwrap_or(0);

    let response = NodeInfo {
        version: "2.1".to_string(),
        software: NodeInfoSoftware {
            name: "outpost".to_string(),
            version: state.version.clone(),
        },
        protocols: vec!["activitypub".to_string()],
        usage: NodeInfoUsage {
            users: NodeInfoUsers {
                total: total_users,
                active_month: total_users,
                active_halfyear: total_users,
            },
            local_posts,
        },
        open_registrations: false,
        metadata: NodeInfoMetadata {
            node_name: state.instance_name.clone(),
            node_description: state.instance_description,
        },
    };

    (
        StatusCode::OK,
        [(
            "Content-Type",
            "application/json; profile=\"http://nodeinfo.diaspora.software/ns/schema/2.1#\"",
        )],
        Json(response),
    )
}
