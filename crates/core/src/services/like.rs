//! Like service.
//!
//! Keeps two cache entries per post in step with the `like` table: the like
//! counter and, per user, whether that user likes the post.

use crate::services::cache_layer::{CacheLayer, Relation, keys};
use crate::services::relationship::{self, CreateOutcome, ToggleOutcome, ToggleTarget};
use async_trait::async_trait;
use chrono::Utc;
use plaza_common::{AppResult, IdGenerator};
use plaza_db::{
    entities::like,
    repositories::{InsertOutcome, LikeRepository},
};
use sea_orm::Set;
use tracing::info;

/// Like service for business logic.
#[derive(Clone)]
pub struct LikeService {
    like_repo: LikeRepository,
    cache: CacheLayer,
    id_gen: IdGenerator,
}

impl LikeService {
    /// Create a new like service without a cache.
    #[must_use]
    pub const fn new(like_repo: LikeRepository) -> Self {
        Self::with_cache(like_repo, CacheLayer::disabled())
    }

    /// Create a new like service backed by a cache.
    #[must_use]
    pub const fn with_cache(like_repo: LikeRepository, cache: CacheLayer) -> Self {
        Self {
            like_repo,
            cache,
            id_gen: IdGenerator::new(),
        }
    }

    /// Set the cache.
    pub fn set_cache(&mut self, cache: CacheLayer) {
        self.cache = cache;
    }

    /// Like a post.
    pub async fn create(
        &self,
        user_id: &str,
        post_id: &str,
    ) -> AppResult<CreateOutcome<like::Model>> {
        if self
            .like_repo
            .find_by_user_and_post(user_id, post_id)
            .await?
            .is_some()
        {
            return Ok(CreateOutcome::AlreadyExists);
        }

        let model = like::ActiveModel {
            id: Set(self.id_gen.generate()),
            user_id: Set(user_id.to_string()),
            post_id: Set(post_id.to_string()),
            created_at: Set(Utc::now().into()),
        };

        let created = match self.like_repo.create(model).await? {
            InsertOutcome::Inserted(created) => created,
            InsertOutcome::Duplicate => return Ok(CreateOutcome::AlreadyExists),
        };

        self.cache.increment(&keys::like_count(post_id)).await;
        self.cache
            .write(
                &keys::user_likes(user_id, post_id),
                &Relation::Present(created.id.clone()),
            )
            .await;

        info!(user_id = %user_id, post_id = %post_id, like_id = %created.id, "Liked post");
        Ok(CreateOutcome::Created(created))
    }

    /// Number of likes on a post.
    pub async fn count(&self, post_id: &str) -> AppResult<u64> {
        self.cache
            .read_through(&keys::like_count(post_id), || {
                self.like_repo.count_by_post(post_id)
            })
            .await
    }

    /// Id of the user's like on a post, if any.
    pub async fn user_likes(&self, user_id: &str, post_id: &str) -> AppResult<Option<String>> {
        let relation: Relation = self
            .cache
            .read_through(&keys::user_likes(user_id, post_id), || async {
                let found = self
                    .like_repo
                    .find_by_user_and_post(user_id, post_id)
                    .await?;
                Ok(Relation::from(found.map(|l| l.id)))
            })
            .await?;

        Ok(relation.into_id())
    }

    /// Delete a like, only if it belongs to `user_id`.
    ///
    /// Returns `false` when no such like exists.
    pub async fn delete(&self, user_id: &str, like_id: &str) -> AppResult<bool> {
        let Some(existing) = self.like_repo.find_owned(user_id, like_id).await? else {
            return Ok(false);
        };

        if self.like_repo.delete_owned(user_id, like_id).await? == 0 {
            return Ok(false);
        }

        self.cache
            .decrement(&keys::like_count(&existing.post_id))
            .await;
        self.cache
            .write(
                &keys::user_likes(user_id, &existing.post_id),
                &Relation::Absent,
            )
            .await;

        info!(user_id = %user_id, post_id = %existing.post_id, like_id = %like_id, "Unliked post");
        Ok(true)
    }

    /// Like the post if the user doesn't, unlike it otherwise.
    pub async fn toggle(&self, user_id: &str, post_id: &str) -> AppResult<ToggleOutcome> {
        relationship::toggle(self, user_id, post_id).await
    }
}

#[async_trait]
impl ToggleTarget for LikeService {
    fn kind(&self) -> &'static str {
        "like"
    }

    async fn lookup(&self, actor_id: &str, subject_id: &str) -> AppResult<Option<String>> {
        self.user_likes(actor_id, subject_id).await
    }

    async fn remove(&self, actor_id: &str, relationship_id: &str) -> AppResult<bool> {
        self.delete(actor_id, relationship_id).await
    }

    async fn insert(&self, actor_id: &str, subject_id: &str) -> AppResult<CreateOutcome<String>> {
        Ok(self.create(actor_id, subject_id).await?.map(|l| l.id))
    }

    async fn forget(&self, actor_id: &str, subject_id: &str) {
        self.cache
            .invalidate(&keys::user_likes(actor_id, subject_id))
            .await;
    }
}
