//! Comment service and the cached comment counter.

use crate::services::cache_layer::{CacheLayer, keys};
use chrono::Utc;
use plaza_common::{AppResult, IdGenerator};
use plaza_db::{entities::comment, repositories::CommentRepository};
use sea_orm::Set;
use tracing::info;

/// Cached number of comments per post.
///
/// Adjustments are awaited inline but never fail: each is a single cache
/// command bounded by the cache's command timeout.
#[derive(Clone)]
pub struct CommentCounter {
    comment_repo: CommentRepository,
    cache: CacheLayer,
}

impl CommentCounter {
    /// Create a new comment counter.
    #[must_use]
    pub const fn new(comment_repo: CommentRepository, cache: CacheLayer) -> Self {
        Self {
            comment_repo,
            cache,
        }
    }

    /// Record a new comment on `post_id`.
    pub async fn increment(&self, post_id: &str) {
        self.cache.increment(&keys::comment_count(post_id)).await;
    }

    /// Record a removed comment on `post_id`.
    pub async fn decrement(&self, post_id: &str) {
        self.cache.decrement(&keys::comment_count(post_id)).await;
    }

    /// Number of comments on a post.
    pub async fn count(&self, post_id: &str) -> AppResult<u64> {
        self.cache
            .read_through(&keys::comment_count(post_id), || {
                self.comment_repo.count_by_post(post_id)
            })
            .await
    }
}

/// Comment service for business logic.
#[derive(Clone)]
pub struct CommentService {
    comment_repo: CommentRepository,
    counter: CommentCounter,
    id_gen: IdGenerator,
}

impl CommentService {
    /// Create a new comment service.
    #[must_use]
    pub fn new(comment_repo: CommentRepository, cache: CacheLayer) -> Self {
        Self {
            counter: CommentCounter::new(comment_repo.clone(), cache),
            comment_repo,
            id_gen: IdGenerator::new(),
        }
    }

    /// The counter kept in step with this service's writes.
    #[must_use]
    pub const fn counter(&self) -> &CommentCounter {
        &self.counter
    }

    /// Comment on a post.
    pub async fn create_comment(
        &self,
        user_id: &str,
        post_id: &str,
        content: &str,
    ) -> AppResult<comment::Model> {
        let model = comment::ActiveModel {
            id: Set(self.id_gen.generate()),
            user_id: Set(user_id.to_string()),
            post_id: Set(post_id.to_string()),
            content: Set(content.to_string()),
            created_at: Set(Utc::now().into()),
            updated_at: Set(None),
        };

        let created = self.comment_repo.create(model).await?;
        self.counter.increment(post_id).await;

        info!(user_id = %user_id, post_id = %post_id, comment_id = %created.id, "Created comment");
        Ok(created)
    }

    /// Comments on a post, newest first.
    pub async fn get_post_comments(&self, post_id: &str) -> AppResult<Vec<comment::Model>> {
        self.comment_repo.find_by_post(post_id).await
    }

    /// Number of comments on a post.
    pub async fn count(&self, post_id: &str) -> AppResult<u64> {
        self.counter.count(post_id).await
    }

    /// Edit a comment. Only its author may do so.
    ///
    /// Returns `None` when the author has no comment with that id.
    pub async fn update_comment(
        &self,
        user_id: &str,
        comment_id: &str,
        content: &str,
    ) -> AppResult<Option<comment::Model>> {
        let Some(existing) = self.comment_repo.find_owned(user_id, comment_id).await? else {
            return Ok(None);
        };

        let mut active: comment::ActiveModel = existing.into();
        active.content = Set(content.to_string());
        active.updated_at = Set(Some(Utc::now().into()));

        let updated = self.comment_repo.update(active).await?;
        Ok(Some(updated))
    }

    /// Delete a comment. Only its author may do so.
    ///
    /// Returns `false` when the author has no comment with that id.
    pub async fn delete_comment(&self, user_id: &str, comment_id: &str) -> AppResult<bool> {
        let Some(existing) = self.comment_repo.find_owned(user_id, comment_id).await? else {
            return Ok(false);
        };

        if self.comment_repo.delete_owned(user_id, comment_id).await? == 0 {
            return Ok(false);
        }

        self.counter.decrement(&existing.post_id).await;

        info!(user_id = %user_id, post_id = %existing.post_id, comment_id = %comment_id, "Deleted comment");
        Ok(true)
    }
}
