//! Following + follow-request repositories (spec.md §4.5 follow state
//! machine: `none` has no row, `pending` lives in `follow_request`,
//! `accepted` lives in `following`).

use std::sync::Arc;

use crate::entities::{follow_request, following, FollowRequest, Following};
use outpost_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, ModelTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect,
};

/// Accepted-follow repository.
#[derive(Clone)]
pub struct FollowingRepository {
    db: Arc<DatabaseConnection>,
}

impl FollowingRepository {
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    pub async fn find_by_pair(
        &self,
        follower_id: &str,
        followee_id: &str,
    ) -> AppResult<Option<following::Model>> {
        Following::find()
            .filter(following::Column::FollowerId.eq(follower_id))
            .filter(following::Column::FolloweeId.eq(followee_id))
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    pub async fn is_following(&self, follower_id: &str, followee_id: &str) -> AppResult<bool> {
        Ok(self.find_by_pair(follower_id, followee_id).await?.is_some())
    }

    pub async fn create(&self, model: following::ActiveModel) -> AppResult<following::Model> {
        model
            .insert(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    pub async fn delete_by_pair(&self, follower_id: &str, followee_id: &str) -> AppResult<()> {
        if let Some(f) = self.find_by_pair(follower_id, followee_id).await? {
            f.delete(self.db.as_ref())
                .await
                .map_err(|e| AppError::Database(e.to_string()))?;
        }
        Ok(())
    }

    pub async fn find_followers(
        &self,
        actor_id: &str,
        limit: u64,
        until_id: Option<&str>,
    ) -> AppResult<Vec<following::Model>> {
        let mut query = Following::find()
            .filter(following::Column::FolloweeId.eq(actor_id))
            .order_by_desc(following::Column::Id);
        if let Some(id) = until_id {
            query = query.filter(following::Column::Id.lt(id));
        }
        query
            .limit(limit)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// All followers, unpaginated — used to fan out delivery.
    pub async fn all_followers(&self, actor_id: &str) -> AppResult<Vec<following::Model>> {
        Following::find()
            .filter(following::Column::FolloweeId.eq(actor_id))
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    pub async fn count_followers(&self, actor_id: &str) -> AppResult<u64> {
        Following::find()
            .filter(following::Column::FolloweeId.eq(actor_id))
            .count(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    pub async fn find_following(
        &self,
        actor_id: &str,
        limit: u64,
        until_id: Option<&str>,
    ) -> AppResult<Vec<following::Model>> {
        let mut query = Following::find()
            .filter(following::Column::FollowerId.eq(actor_id))
            .order_by_desc(following::Column::Id);
        if let Some(id) = until_id {
            query = query.filter(following::Column::Id.lt(id));
        }
        query
            .limit(limit)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    pub async fn count_following(&self, actor_id: &str) -> AppResult<u64> {
        Following::find()
            .filter(following::Column::FollowerId.eq(actor_id))
            .count(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}

/// Pending-follow repository.
#[derive(Clone)]
pub struct FollowRequestRepository {
    db: Arc<DatabaseConnection>,
}

impl FollowRequestRepository {
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    pub async fn find_by_pair(
        &self,
        follower_id: &str,
        followee_id: &str,
    ) -> AppResult<Option<follow_request::Model>> {
        FollowRequest::find()
            .filter(follow_request::Column::FollowerId.eq(follower_id))
            .filter(follow_request::Column::FolloweeId.eq(followee_id))
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    pub async fn create(
        &self,
        model: follow_request::ActiveModel,
    ) -> AppResult<follow_request::Model> {
        model
            .insert(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    pub async fn delete_by_pair(&self, follower_id: &str, followee_id: &str) -> AppResult<()> {
        if let Some(r) = self.find_by_pair(follower_id, followee_id).await? {
            r.delete(self.db.as_ref())
                .await
                .map_err(|e| AppError::Database(e.to_string()))?;
        }
        Ok(())
    }

    pub async fn find_received(
        &self,
        followee_id: &str,
        limit: u64,
        until_id: Option<&str>,
    ) -> AppResult<Vec<follow_request::Model>> {
        let mut query = FollowRequest::find()
            .filter(follow_request::Column::FolloweeId.eq(followee_id))
            .order_by_desc(follow_request::Column::Id);
        if let Some(id) = until_id {
            query = query.filter(follow_request::Column::Id.lt(id));
        }
        query
            .limit(limit)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use sea_orm::{DatabaseBackend, MockDatabase};

    fn edge(id: &str, follower: &str, followee: &str) -> following::Model {
        following::Model {
            id: id.to_string(),
            follower_id: follower.to_string(),
            followee_id: followee.to_string(),
            follower_host: None,
            followee_host: None,
            follower_inbox: None,
            follower_shared_inbox: None,
            followee_inbox: None,
            followee_shared_inbox: None,
            created_at: Utc::now().into(),
        }
    }

    #[tokio::test]
    async fn is_following_true_when_row_exists() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Sqlite)
                .append_query_results([[edge("f1", "alice", "bob")]])
                .into_connection(),
        );
        let repo = FollowingRepository::new(db);
        assert!(repo.is_following("alice", "bob").await.unwrap());
    }

    #[tokio::test]
    async fn is_following_false_when_absent() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Sqlite)
                .append_query_results([Vec::<following::Model>::new()])
                .into_connection(),
        );
        let repo = FollowingRepository::new(db);
        assert!(!repo.is_following("alice", "carol").await.unwrap());
    }
}
