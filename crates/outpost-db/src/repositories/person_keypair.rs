//! Actor keypair repository.

use std::sync::Arc;

use crate::entities::{person_keypair, PersonKeypair};
use outpost_common::{AppError, AppResult};
use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait};

#[derive(Clone)]
pub struct PersonKeypairRepository {
    db: Arc<DatabaseConnection>,
}

impl PersonKeypairRepository {
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    pub async fn find_by_person_id(
        &self,
        person_id: &str,
    ) -> AppResult<Option<person_keypair::Model>> {
        PersonKeypair::find_by_id(person_id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    pub async fn create(
        &self,
        model: person_keypair::ActiveModel,
    ) -> AppResult<person_keypair::Model> {
        model
            .insert(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}
