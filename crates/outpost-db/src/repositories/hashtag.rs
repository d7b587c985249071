//! Hashtag repository.

use std::sync::Arc;

use crate::entities::{hashtag, Hashtag};
use outpost_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect,
};

#[derive(Clone)]
pub struct HashtagRepository {
    db: Arc<DatabaseConnection>,
}

impl HashtagRepository {
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    pub async fn record(&self, model: hashtag::ActiveModel) -> AppResult<hashtag::Model> {
        model
            .insert(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    pub async fn find_notes_for_tag(
        &self,
        tag: &str,
        limit: u64,
    ) -> AppResult<Vec<hashtag::Model>> {
        Hashtag::find()
            .filter(hashtag::Column::Tag.eq(tag.to_lowercase()))
            .order_by_desc(hashtag::Column::CreatedAt)
            .limit(limit)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Distinct tags, most recently used first — backs the `hashtags`
    /// command.
    pub async fn list_known_tags(&self, limit: u64) -> AppResult<Vec<String>> {
        let rows = Hashtag::find()
            .order_by_desc(hashtag::Column::CreatedAt)
            .limit(limit * 4)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let mut seen = std::collections::HashSet::new();
        let mut tags = Vec::new();
        for row in rows {
            if seen.insert(row.tag.clone()) {
                tags.push(row.tag);
                if tags.len() as u64 >= limit {
                    break;
                }
            }
        }
        Ok(tags)
    }
}
