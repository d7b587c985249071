//! The text interface's shared state: one struct bundling every service
//! and repository a command needs, mirroring the teacher's `AppState`
//! (`middleware.rs`) but sized to spec.md §6's actual verb set rather than
//! the full Mastodon-compatible surface.

use std::sync::Arc;

use outpost_core::services::{
    AudienceService, FeedService, FollowingService, HashtagService, NoteService, PollService,
    ShareService,
};
use outpost_db::repositories::{NoteRepository, PersonRepository};
use outpost_federation::client::ApClient;

#[derive(Clone)]
pub struct TextContext {
    pub note_service: NoteService,
    pub following_service: FollowingService,
    pub poll_service: PollService,
    pub hashtag_service: HashtagService,
    pub feed_service: FeedService,
    pub audience_service: AudienceService,
    pub share_service: ShareService,
    pub person_repo: PersonRepository,
    pub note_repo: NoteRepository,
    pub ap_client: Arc<ApClient>,
    /// Authority this instance mints local ids under (`https://example.test`).
    pub domain: String,
    pub max_bio_length: usize,
}
