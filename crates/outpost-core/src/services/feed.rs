//! Personal feed materializer (spec.md §4.6/§2 "Feed materialiser"):
//! builds each local actor's personal feed from followees' outboxes, and
//! purges rows once the underlying follow is undone (spec.md §8 invariant
//! 3: "previously inserted feed rows are purged").

use chrono::Utc;
use outpost_common::AppResult;
use outpost_db::{
    entities::{feed, note},
    repositories::{FeedRepository, FollowingRepository, NoteRepository},
};
use sea_orm::Set;

#[derive(Clone)]
pub struct FeedService {
    feed_repo: FeedRepository,
    following_repo: FollowingRepository,
    note_repo: NoteRepository,
}

impl FeedService {
    #[must_use]
    pub const fn new(
        feed_repo: FeedRepository,
        following_repo: FollowingRepository,
        note_repo: NoteRepository,
    ) -> Self {
        Self {
            feed_repo,
            following_repo,
            note_repo,
        }
    }

    /// Appends `note_id` to the feed of every local follower who can see
    /// it, plus the author's own feed. Called right after a note is
    /// inserted or forwarded.
    pub async fn fan_out(&self, author_id: &str, note_id: &str) -> AppResult<()> {
        self.insert_for_owner(author_id, note_id).await?;

        let followers = self.following_repo.all_followers(author_id).await?;
        for follower in followers {
            if follower.follower_host.is_none() {
                self.insert_for_owner(&follower.follower_id, note_id).await?;
            }
        }
        Ok(())
    }

    async fn insert_for_owner(&self, owner_id: &str, note_id: &str) -> AppResult<()> {
        let model = feed::ActiveModel {
            id: sea_orm::NotSet,
            owner_id: Set(owner_id.to_string()),
            note_id: Set(note_id.to_string()),
            inserted_at: Set(Utc::now().into()),
        };
        self.feed_repo.insert(model).await?;
        Ok(())
    }

    pub async fn timeline(
        &self,
        owner_id: &str,
        limit: u64,
        until_id: Option<i64>,
    ) -> AppResult<Vec<note::Model>> {
        let rows = self.feed_repo.find_for_owner(owner_id, limit, until_id).await?;
        let mut notes = Vec::with_capacity(rows.len());
        for row in rows {
            if let Some(note) = self.note_repo.find_by_id(&row.note_id).await? {
                notes.push(note);
            }
        }
        Ok(notes)
    }

    /// Purges `owner_id`'s feed rows for every note authored by
    /// `unfollowed_author_id` — invoked after `Undo(Follow)`.
    pub async fn purge_for_unfollow(
        &self,
        owner_id: &str,
        unfollowed_author_id: &str,
    ) -> AppResult<()> {
        let rows = self.feed_repo.find_all_for_owner(owner_id).await?;

        for row in rows {
            if let Some(note) = self.note_repo.find_by_id(&row.note_id).await?
                && note.actor_id == unfollowed_author_id
            {
                self.feed_repo.delete(row.id).await?;
            }
        }
        Ok(())
    }
}
