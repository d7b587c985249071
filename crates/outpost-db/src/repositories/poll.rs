//! Poll repository.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use crate::entities::{poll, poll_vote, Poll, PollVote};
use outpost_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, PaginatorTrait,
    QueryFilter,
};

/// Poll repository for database operations.
#[derive(Clone)]
pub struct PollRepository {
    db: Arc<DatabaseConnection>,
}

impl PollRepository {
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    pub async fn find_by_note_id(&self, note_id: &str) -> AppResult<Option<poll::Model>> {
        Poll::find_by_id(note_id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    pub async fn get_by_note_id(&self, note_id: &str) -> AppResult<poll::Model> {
        self.find_by_note_id(note_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Poll not found for note: {note_id}")))
    }

    pub async fn create(&self, model: poll::ActiveModel) -> AppResult<poll::Model> {
        model
            .insert(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Open polls whose `expires_at` has passed — the periodic closer
    /// sweeps these rather than checking expiry only at vote time.
    pub async fn find_expired_open(&self, now: DateTime<Utc>) -> AppResult<Vec<poll::Model>> {
        Poll::find()
            .filter(
                Condition::all()
                    .add(poll::Column::Closed.eq(false))
                    .add(poll::Column::ExpiresAt.is_not_null())
                    .add(poll::Column::ExpiresAt.lt(now)),
            )
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    pub async fn update(&self, model: poll::ActiveModel) -> AppResult<poll::Model> {
        model
            .update(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}

/// Poll vote repository for database operations.
#[derive(Clone)]
pub struct PollVoteRepository {
    db: Arc<DatabaseConnection>,
}

impl PollVoteRepository {
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// An actor may only vote once per poll ("Cannot edit votes").
    pub async fn has_voted(&self, actor_id: &str, note_id: &str) -> AppResult<bool> {
        let count = PollVote::find()
            .filter(poll_vote::Column::ActorId.eq(actor_id))
            .filter(poll_vote::Column::NoteId.eq(note_id))
            .count(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(count > 0)
    }

    pub async fn create(&self, model: poll_vote::ActiveModel) -> AppResult<poll_vote::Model> {
        model
            .insert(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    pub async fn find_by_note(&self, note_id: &str) -> AppResult<Vec<poll_vote::Model>> {
        PollVote::find()
            .filter(poll_vote::Column::NoteId.eq(note_id))
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Recompute per-option tallies and distinct voter count from scratch,
    /// rather than trusting incremental counters — see `poll::Model::tallies`.
    pub async fn recompute_tallies(&self, note_id: &str, option_count: usize) -> AppResult<(Vec<i64>, i32)> {
        let votes = self.find_by_note(note_id).await?;
        let mut tallies = vec![0i64; option_count];
        let mut voters = HashSet::new();
        for vote in votes {
            if let Some(slot) = tallies.get_mut(vote.choice as usize) {
                *slot += 1;
            }
            voters.insert(vote.actor_id);
        }
        Ok((tallies, voters.len() as i32))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use sea_orm::{DatabaseBackend, MockDatabase};

    fn vote(id: &str, note_id: &str, actor_id: &str, choice: i32) -> poll_vote::Model {
        poll_vote::Model {
            id: id.to_string(),
            note_id: note_id.to_string(),
            actor_id: actor_id.to_string(),
            choice,
            created_at: Utc::now().into(),
        }
    }

    #[tokio::test]
    async fn recompute_tallies_counts_per_option() {
        let votes = vec![
            vote("v1", "note1", "alice", 0),
            vote("v2", "note1", "bob", 0),
            vote("v3", "note1", "carol", 1),
        ];
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Sqlite)
                .append_query_results([votes])
                .into_connection(),
        );
        let repo = PollVoteRepository::new(db);
        let (tallies, voters) = repo.recompute_tallies("note1", 2).await.unwrap();
        assert_eq!(tallies, vec![2, 1]);
        assert_eq!(voters, 3);
    }
}
