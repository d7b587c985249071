//! Materialized feed repository.

use std::sync::Arc;

use crate::entities::{feed, Feed};
use outpost_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect,
};

#[derive(Clone)]
pub struct FeedRepository {
    db: Arc<DatabaseConnection>,
}

impl FeedRepository {
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    pub async fn insert(&self, model: feed::ActiveModel) -> AppResult<feed::Model> {
        model
            .insert(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    pub async fn find_for_owner(
        &self,
        owner_id: &str,
        limit: u64,
        until_id: Option<i64>,
    ) -> AppResult<Vec<feed::Model>> {
        let mut query = Feed::find()
            .filter(feed::Column::OwnerId.eq(owner_id))
            .order_by_desc(feed::Column::Id);
        if let Some(until) = until_id {
            query = query.filter(feed::Column::Id.lt(until));
        }
        query
            .limit(limit)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// All of `owner_id`'s feed rows, unpaginated — used to sweep rows for
    /// a single author out after that author is unfollowed.
    pub async fn find_all_for_owner(&self, owner_id: &str) -> AppResult<Vec<feed::Model>> {
        Feed::find()
            .filter(feed::Column::OwnerId.eq(owner_id))
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    pub async fn delete(&self, id: i64) -> AppResult<()> {
        Feed::delete_by_id(id)
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }
}
