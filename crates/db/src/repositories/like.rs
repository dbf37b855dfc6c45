//! Like repository.

use std::sync::Arc;

use super::{InsertOutcome, classify_insert};
use crate::entities::{Like, like};
use plaza_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
};

/// Like repository for database operations.
#[derive(Clone)]
pub struct LikeRepository {
    db: Arc<DatabaseConnection>,
}

impl LikeRepository {
    /// Create a new like repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find the like a user left on a post.
    pub async fn find_by_user_and_post(
        &self,
        user_id: &str,
        post_id: &str,
    ) -> AppResult<Option<like::Model>> {
        Like::find()
            .filter(like::Column::UserId.eq(user_id))
            .filter(like::Column::PostId.eq(post_id))
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find a like by ID, only if it belongs to `user_id`.
    pub async fn find_owned(&self, user_id: &str, like_id: &str) -> AppResult<Option<like::Model>> {
        Like::find()
            .filter(like::Column::Id.eq(like_id))
            .filter(like::Column::UserId.eq(user_id))
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Insert a like. A second like for the same `(user_id, post_id)` is
    /// reported as [`InsertOutcome::Duplicate`].
    pub async fn create(&self, model: like::ActiveModel) -> AppResult<InsertOutcome<like::Model>> {
        classify_insert(model.insert(self.db.as_ref()).await)
    }

    /// Delete a like owned by `user_id`. Returns the number of rows removed.
    pub async fn delete_owned(&self, user_id: &str, like_id: &str) -> AppResult<u64> {
        Like::delete_many()
            .filter(like::Column::Id.eq(like_id))
            .filter(like::Column::UserId.eq(user_id))
            .exec(self.db.as_ref())
            .await
            .map(|res| res.rows_affected)
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Count likes on a post.
    pub async fn count_by_post(&self, post_id: &str) -> AppResult<u64> {
        Like::find()
            .filter(like::Column::PostId.eq(post_id))
            .count(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}
