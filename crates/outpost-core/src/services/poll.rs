//! Poll aggregation service.

use chrono::{DateTime, Utc};
use outpost_common::{AppError, AppResult, IdGenerator};
use outpost_db::{
    entities::{poll, poll_vote},
    repositories::{PollRepository, PollVoteRepository},
};
use sea_orm::Set;
use serde_json::json;
use validator::Validate;

/// Poll service for business logic.
#[derive(Clone)]
pub struct PollService {
    poll_repo: PollRepository,
    vote_repo: PollVoteRepository,
    id_gen: IdGenerator,
}

/// Input for creating a poll. The only source of new polls is remote
/// `Question` ingestion (spec.md has no local poll-creation verb), so
/// this carries the already-resolved tallies/closure state straight
/// from the wire object rather than starting every poll at zero.
#[derive(Debug, Validate)]
pub struct CreatePollInput {
    #[validate(length(min = 2, max = 5))]
    pub options: Vec<String>,
    pub tallies: Vec<i64>,
    pub multiple: bool,
    pub expires_at: Option<DateTime<Utc>>,
    pub closed: bool,
}

/// Poll with vote status.
pub struct PollWithStatus {
    pub poll: poll::Model,
    pub voted_choices: Vec<i32>,
}

impl PollService {
    /// Create a new poll service.
    #[must_use]
    pub const fn new(poll_repo: PollRepository, vote_repo: PollVoteRepository) -> Self {
        Self {
            poll_repo,
            vote_repo,
            id_gen: IdGenerator::new(),
        }
    }

    /// Creates the `poll` row for a note that is already persisted,
    /// seeding tallies from the remote `Question`'s own reported counts
    /// (spec.md §4.5: remotely hosted polls use the server's
    /// `votersCount`/`replies.totalItems`, not a locally recomputed sum).
    pub async fn create_poll(
        &self,
        note_id: &str,
        input: CreatePollInput,
    ) -> AppResult<poll::Model> {
        input
            .validate()
            .map_err(|_| AppError::BadRequest("Polls must have 2 to 5 options".to_string()))?;
        for option in &input.options {
            if option.trim().is_empty() {
                return Err(AppError::BadRequest(
                    "Poll option cannot be empty".to_string(),
                ));
            }
        }

        let voters_count = input.tallies.iter().sum::<i64>().max(0) as i32;

        let model = poll::ActiveModel {
            note_id: Set(note_id.to_string()),
            options: Set(json!(input.options)),
            tallies: Set(json!(input.tallies)),
            multiple: Set(input.multiple),
            expires_at: Set(input.expires_at.map(Into::into)),
            closed: Set(input.closed),
            voters_count: Set(voters_count),
        };

        self.poll_repo.create(model).await
    }

    /// Get a poll by note ID.
    pub async fn get_poll(&self, note_id: &str) -> AppResult<poll::Model> {
        self.poll_repo.get_by_note_id(note_id).await
    }

    /// Get a poll with an actor's own vote status.
    pub async fn get_poll_with_status(
        &self,
        note_id: &str,
        actor_id: &str,
    ) -> AppResult<PollWithStatus> {
        let poll = self.poll_repo.get_by_note_id(note_id).await?;
        let votes = self.vote_repo.find_by_note(note_id).await?;
        let voted_choices = votes
            .into_iter()
            .filter(|v| v.actor_id == actor_id)
            .map(|v| v.choice)
            .collect();

        Ok(PollWithStatus {
            poll,
            voted_choices,
        })
    }

    /// Casts a single-use ballot. A poll closed either explicitly or by
    /// expiry rejects further votes; the option count is re-derived from
    /// the poll row itself rather than trusted from the caller.
    pub async fn vote(
        &self,
        actor_id: &str,
        note_id: &str,
        choice: i32,
    ) -> AppResult<poll::Model> {
        let poll = self.poll_repo.get_by_note_id(note_id).await?;

        let expired = poll
            .expires_at
            .as_ref()
            .is_some_and(|exp| *exp < Utc::now());
        if poll.closed || expired {
            return Err(AppError::BadRequest(
                "Cannot vote in a closed poll".to_string(),
            ));
        }

        let options: Vec<String> = serde_json::from_value(poll.options.clone())
            .map_err(|e| AppError::Internal(format!("invalid poll options: {e}")))?;
        if choice < 0 || choice >= options.len() as i32 {
            return Err(AppError::BadRequest("Invalid choice".to_string()));
        }

        // One vote per actor per poll, full stop — no multiple-choice
        // exception, and no re-voting to change an earlier answer.
        if self.vote_repo.has_voted(actor_id, note_id).await? {
            return Err(AppError::BadRequest("Cannot edit votes".to_string()));
        }

        let vote_model = poll_vote::ActiveModel {
            id: Set(self.id_gen.generate()),
            note_id: Set(note_id.to_string()),
            actor_id: Set(actor_id.to_string()),
            choice: Set(choice),
            created_at: Set(Utc::now().into()),
        };
        self.vote_repo.create(vote_model).await?;

        let (tallies, voters_count) = self
            .vote_repo
            .recompute_tallies(note_id, options.len())
            .await?;

        let mut active: poll::ActiveModel = poll.into();
        active.tallies = Set(json!(tallies));
        active.voters_count = Set(voters_count);

        self.poll_repo.update(active).await
    }

    /// Closes the poll immediately, independent of `expires_at`.
    pub async fn close(&self, note_id: &str) -> AppResult<poll::Model> {
        let poll = self.poll_repo.get_by_note_id(note_id).await?;
        let mut active: poll::ActiveModel = poll.into();
        active.closed = Set(true);
        self.poll_repo.update(active).await
    }

    /// Check if a poll exists for a note.
    pub async fn has_poll(&self, note_id: &str) -> AppResult<bool> {
        Ok(self.poll_repo.find_by_note_id(note_id).await?.is_some())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use outpost_db::repositories::{PollRepository, PollVoteRepository};
    use sea_orm::{DatabaseBackend, MockDatabase};
    use std::sync::Arc;

    fn input(options: Vec<&str>) -> CreatePollInput {
        let tallies = vec![0; options.len()];
        CreatePollInput {
            options: options.into_iter().map(str::to_string).collect(),
            tallies,
            multiple: false,
            expires_at: None,
            closed: false,
        }
    }

    #[test]
    fn single_option_fails_validate() {
        assert!(input(vec!["a"]).validate().is_err());
    }

    #[test]
    fn two_to_five_options_pass_validate() {
        assert!(input(vec!["a", "b"]).validate().is_ok());
        assert!(input(vec!["a", "b", "c", "d", "e"]).validate().is_ok());
    }

    #[test]
    fn six_options_fails_validate() {
        let opts: Vec<String> = (0..6).map(|n| n.to_string()).collect();
        let too_many = CreatePollInput {
            options: opts,
            tallies: vec![0; 6],
            multiple: false,
            expires_at: None,
            closed: false,
        };
        assert!(too_many.validate().is_err());
    }

    #[tokio::test]
    async fn create_poll_rejects_single_option_with_stable_error() {
        let db = Arc::new(MockDatabase::new(DatabaseBackend::Sqlite).into_connection());
        let service = PollService::new(
            PollRepository::new(Arc::clone(&db)),
            PollVoteRepository::new(db),
        );

        let err = service
            .create_poll("note-1", input(vec!["only-one"]))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Polls must have 2 to 5 options");
    }
}
