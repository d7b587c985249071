//! Hashtag lookup (spec.md §6 `hashtag/<tag>` and `hashtags` commands).

use outpost_common::AppResult;
use outpost_db::{
    entities::note,
    repositories::{HashtagRepository, NoteRepository},
};

#[derive(Clone)]
pub struct HashtagService {
    hashtag_repo: HashtagRepository,
    note_repo: NoteRepository,
}

impl HashtagService {
    #[must_use]
    pub const fn new(hashtag_repo: HashtagRepository, note_repo: NoteRepository) -> Self {
        Self {
            hashtag_repo,
            note_repo,
        }
    }

    /// Notes tagged with `tag`, most recently tagged first.
    pub async fn notes_for_tag(&self, tag: &str, limit: u64) -> AppResult<Vec<note::Model>> {
        let rows = self
            .hashtag_repo
            .find_notes_for_tag(&tag.to_lowercase(), limit)
            .await?;
        let mut notes = Vec::with_capacity(rows.len());
        for row in rows {
            if let Some(note) = self.note_repo.find_by_id(&row.note_id).await? {
                notes.push(note);
            }
        }
        Ok(notes)
    }

    /// Distinct tags in recency order — backs the `hashtags` command.
    pub async fn known_tags(&self, limit: u64) -> AppResult<Vec<String>> {
        self.hashtag_repo.list_known_tags(limit).await
    }
}
