//! Actor repository.

use std::sync::Arc;

use crate::entities::{person, Person};
use outpost_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
};

/// Actor repository for database operations.
#[derive(Clone)]
pub struct PersonRepository {
    db: Arc<DatabaseConnection>,
}

impl PersonRepository {
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<person::Model>> {
        Person::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    pub async fn get_by_id(&self, id: &str) -> AppResult<person::Model> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::UserNotFound(id.to_string()))
    }

    /// Find a local actor by its preferred username (`host` is null).
    pub async fn find_local_by_username(&self, username: &str) -> AppResult<Option<person::Model>> {
        Person::find()
            .filter(person::Column::PreferredUsername.eq(username))
            .filter(person::Column::Host.is_null())
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    pub async fn find_by_username_and_host(
        &self,
        username: &str,
        host: Option<&str>,
    ) -> AppResult<Option<person::Model>> {
        let mut query = Person::find().filter(person::Column::PreferredUsername.eq(username));
        query = match host {
            Some(h) => query.filter(person::Column::Host.eq(h)),
            None => query.filter(person::Column::Host.is_null()),
        };
        query
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    pub async fn find_by_ids(&self, ids: &[String]) -> AppResult<Vec<person::Model>> {
        if ids.is_empty() {
            return Ok(vec![]);
        }
        Person::find()
            .filter(person::Column::Id.is_in(ids.to_vec()))
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    pub async fn create(&self, model: person::ActiveModel) -> AppResult<person::Model> {
        model
            .insert(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    pub async fn update(&self, model: person::ActiveModel) -> AppResult<person::Model> {
        model
            .update(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    pub async fn count_local(&self) -> AppResult<u64> {
        Person::find()
            .filter(person::Column::Host.is_null())
            .count(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::person::ActorKind;
    use chrono::Utc;
    use sea_orm::{DatabaseBackend, MockDatabase};

    fn local_actor(username: &str) -> person::Model {
        person::Model {
            id: format!("https://example.test/users/{username}"),
            kind: ActorKind::Person,
            preferred_username: username.to_string(),
            host: None,
            inbox: format!("https://example.test/users/{username}/inbox"),
            shared_inbox: Some("https://example.test/inbox".to_string()),
            followers: format!("https://example.test/users/{username}/followers"),
            bio: None,
            public_key_pem: None,
            moved_to: None,
            also_known_as: None,
            published: Utc::now().into(),
            last_fetched_at: None,
        }
    }

    #[tokio::test]
    async fn find_local_by_username_found() {
        let actor = local_actor("alice");
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Sqlite)
                .append_query_results([[actor.clone()]])
                .into_connection(),
        );
        let repo = PersonRepository::new(db);
        let found = repo.find_local_by_username("alice").await.unwrap();
        assert_eq!(found.unwrap().preferred_username, "alice");
    }

    #[tokio::test]
    async fn find_by_id_not_found() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Sqlite)
                .append_query_results([Vec::<person::Model>::new()])
                .into_connection(),
        );
        let repo = PersonRepository::new(db);
        assert!(repo.find_by_id("nobody").await.unwrap().is_none());
    }
}
