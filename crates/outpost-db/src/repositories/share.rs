//! Share repository (`Announce`/`Like`, spec.md §4.4).

use std::sync::Arc;

use crate::entities::{share, Share};
use outpost_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, ModelTrait, QueryFilter,
    QueryOrder,
};

#[derive(Clone)]
pub struct ShareRepository {
    db: Arc<DatabaseConnection>,
}

impl ShareRepository {
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    pub async fn find_by_activity_id(&self, activity_id: &str) -> AppResult<Option<share::Model>> {
        Share::find_by_id(activity_id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    pub async fn find_by_actor_and_note(
        &self,
        actor_id: &str,
        note_id: &str,
        kind: share::ShareKind,
    ) -> AppResult<Option<share::Model>> {
        Share::find()
            .filter(share::Column::ActorId.eq(actor_id))
            .filter(share::Column::NoteId.eq(note_id))
            .filter(share::Column::Kind.eq(kind))
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Most recent share/like by `actor_id`, for throttle checks
    /// symmetric with the post-throttle (spec.md §4.6).
    pub async fn find_latest_by_actor(&self, actor_id: &str) -> AppResult<Option<share::Model>> {
        Share::find()
            .filter(share::Column::ActorId.eq(actor_id))
            .order_by_desc(share::Column::CreatedAt)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    pub async fn create(&self, model: share::ActiveModel) -> AppResult<share::Model> {
        model
            .insert(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    pub async fn delete_by_activity_id(&self, activity_id: &str) -> AppResult<Option<share::Model>> {
        let found = self.find_by_activity_id(activity_id).await?;
        if let Some(s) = found.clone() {
            s.delete(self.db.as_ref())
                .await
                .map_err(|e| AppError::Database(e.to_string()))?;
        }
        Ok(found)
    }
}
