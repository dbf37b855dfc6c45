//! Follow repository.

use std::sync::Arc;

use super::{InsertOutcome, classify_insert};
use crate::entities::{Follow, follow};
use plaza_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
};

/// Follow repository for database operations.
#[derive(Clone)]
pub struct FollowRepository {
    db: Arc<DatabaseConnection>,
}

impl FollowRepository {
    /// Create a new follow repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find a follow relationship by follower and followee.
    pub async fn find_by_pair(
        &self,
        from_id: &str,
        to_id: &str,
    ) -> AppResult<Option<follow::Model>> {
        Follow::find()
            .filter(follow::Column::FromId.eq(from_id))
            .filter(follow::Column::ToId.eq(to_id))
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find a follow by ID, only if `from_id` is the follower.
    pub async fn find_owned(
        &self,
        from_id: &str,
        follow_id: &str,
    ) -> AppResult<Option<follow::Model>> {
        Follow::find()
            .filter(follow::Column::Id.eq(follow_id))
            .filter(follow::Column::FromId.eq(from_id))
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Insert a follow. An existing `(from_id, to_id)` pair is reported as
    /// [`InsertOutcome::Duplicate`].
    pub async fn create(
        &self,
        model: follow::ActiveModel,
    ) -> AppResult<InsertOutcome<follow::Model>> {
        classify_insert(model.insert(self.db.as_ref()).await)
    }

    /// Delete a follow created by `from_id`. Returns the number of rows removed.
    pub async fn delete_owned(&self, from_id: &str, follow_id: &str) -> AppResult<u64> {
        Follow::delete_many()
            .filter(follow::Column::Id.eq(follow_id))
            .filter(follow::Column::FromId.eq(from_id))
            .exec(self.db.as_ref())
            .await
            .map(|res| res.rows_affected)
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// All follows created by a user, newest first.
    pub async fn find_following(&self, user_id: &str) -> AppResult<Vec<follow::Model>> {
        Follow::find()
            .filter(follow::Column::FromId.eq(user_id))
            .order_by_desc(follow::Column::Id)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// All follows targeting a user, newest first.
    pub async fn find_followers(&self, user_id: &str) -> AppResult<Vec<follow::Model>> {
        Follow::find()
            .filter(follow::Column::ToId.eq(user_id))
            .order_by_desc(follow::Column::Id)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}
