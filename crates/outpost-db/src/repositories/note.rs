//! Post repository.

use std::sync::Arc;

use crate::entities::{note, Note};
use outpost_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect,
};

/// Post repository for database operations.
#[derive(Clone)]
pub struct NoteRepository {
    db: Arc<DatabaseConnection>,
}

impl NoteRepository {
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<note::Model>> {
        Note::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    pub async fn get_by_id(&self, id: &str) -> AppResult<note::Model> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NoteNotFound(id.to_string()))
    }

    pub async fn find_by_local_id(&self, local_id: &str) -> AppResult<Option<note::Model>> {
        Note::find()
            .filter(note::Column::LocalId.eq(local_id))
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    pub async fn create(&self, model: note::ActiveModel) -> AppResult<note::Model> {
        model
            .insert(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    pub async fn update(&self, model: note::ActiveModel) -> AppResult<note::Model> {
        model
            .update(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Direct replies to `note_id`, oldest first — the shape the reply
    /// forwarding engine walks outward from.
    pub async fn find_replies(&self, note_id: &str) -> AppResult<Vec<note::Model>> {
        Note::find()
            .filter(note::Column::ReplyId.eq(note_id))
            .order_by_asc(note::Column::CreatedAt)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Notes by a given actor, newest first, keyset-paginated on `id`.
    pub async fn find_by_actor(
        &self,
        actor_id: &str,
        limit: u64,
        until_id: Option<&str>,
    ) -> AppResult<Vec<note::Model>> {
        let mut condition = Condition::all()
            .add(note::Column::ActorId.eq(actor_id))
            .add(note::Column::DeletedAt.is_null());

        if let Some(until) = until_id {
            condition = condition.add(note::Column::Id.lt(until));
        }

        Note::find()
            .filter(condition)
            .order_by_desc(note::Column::Id)
            .limit(limit)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Public, local notes only — backs the `local` command.
    pub async fn find_local_public(
        &self,
        limit: u64,
        until_id: Option<&str>,
    ) -> AppResult<Vec<note::Model>> {
        let mut condition = Condition::all()
            .add(note::Column::Visibility.eq(note::Visibility::Public))
            .add(note::Column::IsLocal.eq(true))
            .add(note::Column::DeletedAt.is_null());

        if let Some(until) = until_id {
            condition = condition.add(note::Column::Id.lt(until));
        }

        Note::find()
            .filter(condition)
            .order_by_desc(note::Column::Id)
            .limit(limit)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Public, non-deleted notes by a given actor — backs the outbox
    /// collection summary's `totalItems`.
    pub async fn count_public_by_actor(&self, actor_id: &str) -> AppResult<u64> {
        Note::find()
            .filter(note::Column::ActorId.eq(actor_id))
            .filter(note::Column::Visibility.eq(note::Visibility::Public))
            .filter(note::Column::DeletedAt.is_null())
            .count(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Local, non-deleted notes, regardless of visibility — backs `NodeInfo`'s
    /// `usage.localPosts`.
    pub async fn count_local(&self) -> AppResult<u64> {
        Note::find()
            .filter(note::Column::IsLocal.eq(true))
            .filter(note::Column::DeletedAt.is_null())
            .count(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    pub async fn increment_replies_count(&self, note_id: &str) -> AppResult<()> {
        if let Some(model) = self.find_by_id(note_id).await? {
            let replies_count = model.replies_count + 1;
            let mut active: note::ActiveModel = model.into();
            active.replies_count = sea_orm::Set(replies_count);
            active
                .update(self.db.as_ref())
                .await
                .map_err(|e| AppError::Database(e.to_string()))?;
        }
        Ok(())
    }

    pub async fn increment_shares_count(&self, note_id: &str) -> AppResult<()> {
        if let Some(model) = self.find_by_id(note_id).await? {
            let shares_count = model.shares_count + 1;
            let mut active: note::ActiveModel = model.into();
            active.shares_count = sea_orm::Set(shares_count);
            active
                .update(self.db.as_ref())
                .await
                .map_err(|e| AppError::Database(e.to_string()))?;
        }
        Ok(())
    }

    pub async fn decrement_shares_count(&self, note_id: &str) -> AppResult<()> {
        if let Some(model) = self.find_by_id(note_id).await? {
            let shares_count = (model.shares_count - 1).max(0);
            let mut active: note::ActiveModel = model.into();
            active.shares_count = sea_orm::Set(shares_count);
            active
                .update(self.db.as_ref())
                .await
                .map_err(|e| AppError::Database(e.to_string()))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use sea_orm::{DatabaseBackend, MockDatabase};
    use serde_json::json;

    fn local_note(id: &str, local_id: &str, actor_id: &str) -> note::Model {
        note::Model {
            id: id.to_string(),
            local_id: local_id.to_string(),
            actor_id: actor_id.to_string(),
            actor_host: None,
            text: Some("hello".to_string()),
            cw: None,
            visibility: note::Visibility::Public,
            reply_id: None,
            thread_id: None,
            mentions: json!([]),
            visible_actor_ids: json!([]),
            tags: json!([]),
            replies_count: 0,
            shares_count: 0,
            is_local: true,
            raw: None,
            deleted_at: None,
            created_at: Utc::now().into(),
            edited_at: None,
        }
    }

    #[tokio::test]
    async fn find_by_local_id_found() {
        let note = local_note("https://example.test/notes/1", "abc123", "https://example.test/users/alice");
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Sqlite)
                .append_query_results([[note.clone()]])
                .into_connection(),
        );
        let repo = NoteRepository::new(db);
        let found = repo.find_by_local_id("abc123").await.unwrap();
        assert_eq!(found.unwrap().id, "https://example.test/notes/1");
    }

    #[tokio::test]
    async fn get_by_id_missing_is_not_found_error() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Sqlite)
                .append_query_results([Vec::<note::Model>::new()])
                .into_connection(),
        );
        let repo = NoteRepository::new(db);
        let err = repo.get_by_id("missing").await.unwrap_err();
        assert!(matches!(err, AppError::NoteNotFound(_)));
    }
}
