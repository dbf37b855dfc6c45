//! Following service.

use crate::services::cache_layer::{CacheLayer, Relation, keys};
use crate::services::relationship::{self, CreateOutcome, ToggleOutcome, ToggleTarget};
use async_trait::async_trait;
use chrono::Utc;
use plaza_common::{AppError, AppResult, IdGenerator};
use plaza_db::{
    entities::follow,
    repositories::{FollowRepository, InsertOutcome},
};
use sea_orm::Set;
use tracing::info;

/// Following service for business logic.
#[derive(Clone)]
pub struct FollowingService {
    follow_repo: FollowRepository,
    cache: CacheLayer,
    id_gen: IdGenerator,
}

impl FollowingService {
    /// Create a new following service without a cache.
    #[must_use]
    pub const fn new(follow_repo: FollowRepository) -> Self {
        Self::with_cache(follow_repo, CacheLayer::disabled())
    }

    /// Create a new following service backed by a cache.
    #[must_use]
    pub const fn with_cache(follow_repo: FollowRepository, cache: CacheLayer) -> Self {
        Self {
            follow_repo,
            cache,
            id_gen: IdGenerator::new(),
        }
    }

    /// Set the cache.
    pub fn set_cache(&mut self, cache: CacheLayer) {
        self.cache = cache;
    }

    fn reject_self_follow(from_id: &str, to_id: &str) -> AppResult<()> {
        if from_id == to_id {
            return Err(AppError::BadRequest("Cannot follow yourself".to_string()));
        }
        Ok(())
    }

    /// Follow a user.
    pub async fn create(
        &self,
        from_id: &str,
        to_id: &str,
    ) -> AppResult<CreateOutcome<follow::Model>> {
        Self::reject_self_follow(from_id, to_id)?;

        if self.follow_repo.find_by_pair(from_id, to_id).await?.is_some() {
            return Ok(CreateOutcome::AlreadyExists);
        }

        let model = follow::ActiveModel {
            id: Set(self.id_gen.generate()),
            from_id: Set(from_id.to_string()),
            to_id: Set(to_id.to_string()),
            created_at: Set(Utc::now().into()),
        };

        let created = match self.follow_repo.create(model).await? {
            InsertOutcome::Inserted(created) => created,
            InsertOutcome::Duplicate => return Ok(CreateOutcome::AlreadyExists),
        };

        self.cache
            .write(
                &keys::follows(from_id, to_id),
                &Relation::Present(created.id.clone()),
            )
            .await;

        info!(from_id = %from_id, to_id = %to_id, follow_id = %created.id, "Followed user");
        Ok(CreateOutcome::Created(created))
    }

    /// Id of the follow from `from_id` to `to_id`, if any.
    pub async fn user_follows(&self, from_id: &str, to_id: &str) -> AppResult<Option<String>> {
        if from_id == to_id {
            return Ok(None);
        }

        let relation: Relation = self
            .cache
            .read_through(&keys::follows(from_id, to_id), || async {
                let found = self.follow_repo.find_by_pair(from_id, to_id).await?;
                Ok(Relation::from(found.map(|f| f.id)))
            })
            .await?;

        Ok(relation.into_id())
    }

    /// Delete a follow, only if `from_id` created it.
    ///
    /// Returns `false` when no such follow exists.
    pub async fn delete(&self, from_id: &str, follow_id: &str) -> AppResult<bool> {
        let Some(existing) = self.follow_repo.find_owned(from_id, follow_id).await? else {
            return Ok(false);
        };

        if self.follow_repo.delete_owned(from_id, follow_id).await? == 0 {
            return Ok(false);
        }

        self.cache
            .write(&keys::follows(from_id, &existing.to_id), &Relation::Absent)
            .await;

        info!(from_id = %from_id, to_id = %existing.to_id, follow_id = %follow_id, "Unfollowed user");
        Ok(true)
    }

    /// Follow the user if not yet followed, unfollow otherwise.
    pub async fn toggle(&self, from_id: &str, to_id: &str) -> AppResult<ToggleOutcome> {
        Self::reject_self_follow(from_id, to_id)?;
        relationship::toggle(self, from_id, to_id).await
    }

    /// Follows created by a user, newest first.
    pub async fn get_follows_from(&self, user_id: &str) -> AppResult<Vec<follow::Model>> {
        self.follow_repo.find_following(user_id).await
    }

    /// Follows pointing at a user, newest first.
    pub async fn get_followers_of(&self, user_id: &str) -> AppResult<Vec<follow::Model>> {
        self.follow_repo.find_followers(user_id).await
    }
}

#[async_trait]
impl ToggleTarget for FollowingService {
    fn kind(&self) -> &'static str {
        "follow"
    }

    async fn lookup(&self, actor_id: &str, subject_id: &str) -> AppResult<Option<String>> {
        self.user_follows(actor_id, subject_id).await
    }

    async fn remove(&self, actor_id: &str, relationship_id: &str) -> AppResult<bool> {
        self.delete(actor_id, relationship_id).await
    }

    async fn insert(&self, actor_id: &str, subject_id: &str) -> AppResult<CreateOutcome<String>> {
        Ok(self.create(actor_id, subject_id).await?.map(|f| f.id))
    }

    async fn forget(&self, actor_id: &str, subject_id: &str) {
        self.cache
            .invalidate(&keys::follows(actor_id, subject_id))
            .await;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use plaza_common::{FastCache, MemoryCache};
    use sea_orm::{DatabaseBackend, DbErr, MockDatabase, MockExecResult};
    use std::sync::Arc;

    fn create_test_follow(id: &str, from_id: &str, to_id: &str) -> follow::Model {
        follow::Model {
            id: id.to_string(),
            from_id: from_id.to_string(),
            to_id: to_id.to_string(),
            created_at: Utc::now().into(),
        }
    }

    fn service(db: MockDatabase, cache: &Arc<MemoryCache>) -> FollowingService {
        let repo = FollowRepository::new(Arc::new(db.into_connection()));
        FollowingService::with_cache(repo, CacheLayer::new(cache.clone()))
    }

    #[tokio::test]
    async fn test_self_follow_rejected_without_io() {
        let cache = Arc::new(MemoryCache::new());
        // No results queued: any store access would fail the test.
        let service = service(MockDatabase::new(DatabaseBackend::Postgres), &cache);

        match service.create("a", "a").await {
            Err(AppError::BadRequest(msg)) => assert!(msg.contains("Cannot follow yourself")),
            other => panic!("Expected BadRequest, got {other:?}"),
        }
        assert!(matches!(
            service.toggle("a", "a").await,
            Err(AppError::BadRequest(_))
        ));
        assert_eq!(service.user_follows("a", "a").await.unwrap(), None);
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_follow_then_lookup_is_cached() {
        let cache = Arc::new(MemoryCache::new());
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<follow::Model>::new()])
            .append_query_results([[create_test_follow("f1", "a", "b")]]);
        let service = service(db, &cache);

        let created = service.create("a", "b").await.unwrap().created().unwrap();

        assert_eq!(created.id, "f1");
        assert_eq!(
            service.user_follows("a", "b").await.unwrap().as_deref(),
            Some("f1")
        );
    }

    #[tokio::test]
    async fn test_follow_is_directional() {
        let cache = Arc::new(MemoryCache::new());
        cache.set("follows:a:b", "f1").await.unwrap();

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<follow::Model>::new()]);
        let service = service(db, &cache);

        assert_eq!(service.user_follows("b", "a").await.unwrap(), None);
        assert_eq!(cache.peek("follows:b:a").as_deref(), Some("!absent"));
    }

    #[tokio::test]
    async fn test_insert_failure_is_propagated() {
        let cache = Arc::new(MemoryCache::new());
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<follow::Model>::new()])
            .append_query_errors([DbErr::Custom("connection reset".to_string())]);
        let service = service(db, &cache);

        // A non-constraint failure on insert is a store failure.
        assert!(matches!(
            service.create("a", "b").await,
            Err(AppError::Database(_))
        ));
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_delete_sets_absent() {
        let cache = Arc::new(MemoryCache::new());
        cache.set("follows:a:b", "f1").await.unwrap();

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[create_test_follow("f1", "a", "b")]])
            .append_exec_results([MockExecResult {
                last_insert_id: 0,
                rows_affected: 1,
            }]);
        let service = service(db, &cache);

        assert!(service.delete("a", "f1").await.unwrap());
        assert_eq!(service.user_follows("a", "b").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_delete_by_non_owner_is_noop() {
        let cache = Arc::new(MemoryCache::new());
        cache.set("follows:a:b", "f1").await.unwrap();

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<follow::Model>::new()]);
        let service = service(db, &cache);

        assert!(!service.delete("c", "f1").await.unwrap());
        assert_eq!(cache.peek("follows:a:b").as_deref(), Some("f1"));
    }

    #[tokio::test]
    async fn test_toggle_on_and_off() {
        let cache = Arc::new(MemoryCache::new());
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            // user_follows on a cold cache
            .append_query_results([Vec::<follow::Model>::new()])
            // create
            .append_query_results([Vec::<follow::Model>::new()])
            .append_query_results([[create_test_follow("f1", "a", "b")]])
            // delete
            .append_query_results([[create_test_follow("f1", "a", "b")]])
            .append_exec_results([MockExecResult {
                last_insert_id: 0,
                rows_affected: 1,
            }]);
        let service = service(db, &cache);

        let on = service.toggle("a", "b").await.unwrap();
        assert!(on.active);
        assert_eq!(on.relationship_id.as_deref(), Some("f1"));

        let off = service.toggle("a", "b").await.unwrap();
        assert!(!off.active);
        assert_eq!(cache.peek("follows:a:b").as_deref(), Some("!absent"));
    }

    #[tokio::test]
    async fn test_user_follows_with_failing_cache() {
        let cache = Arc::new(MemoryCache::unavailable());
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[create_test_follow("f1", "a", "b")]]);
        let service = service(db, &cache);

        assert_eq!(
            service.user_follows("a", "b").await.unwrap().as_deref(),
            Some("f1")
        );
    }

    #[tokio::test]
    async fn test_delete_with_failing_cache_still_succeeds() {
        let cache = Arc::new(MemoryCache::unavailable());
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[create_test_follow("f1", "a", "b")]])
            .append_exec_results([MockExecResult {
                last_insert_id: 0,
                rows_affected: 1,
            }]);
        let service = service(db, &cache);

        assert!(service.delete("a", "f1").await.unwrap());
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_toggle_with_failing_cache_uses_store() {
        let cache = Arc::new(MemoryCache::unavailable());
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            // lookup finds the follow in the store
            .append_query_results([[create_test_follow("f1", "a", "b")]])
            // delete
            .append_query_results([[create_test_follow("f1", "a", "b")]])
            .append_exec_results([MockExecResult {
                last_insert_id: 0,
                rows_affected: 1,
            }])
            // lookup, then create
            .append_query_results([Vec::<follow::Model>::new()])
            .append_query_results([Vec::<follow::Model>::new()])
            .append_query_results([[create_test_follow("f2", "a", "b")]]);
        let service = service(db, &cache);

        let off = service.toggle("a", "b").await.unwrap();
        assert!(!off.active);

        let on = service.toggle("a", "b").await.unwrap();
        assert!(on.active);
        assert_eq!(on.relationship_id.as_deref(), Some("f2"));
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_get_follows_from_and_followers_of() {
        let cache = Arc::new(MemoryCache::new());
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[
                create_test_follow("f2", "a", "c"),
                create_test_follow("f1", "a", "b"),
            ]])
            .append_query_results([[create_test_follow("f3", "c", "a")]]);
        let service = service(db, &cache);

        let following = service.get_follows_from("a").await.unwrap();
        assert_eq!(following.len(), 2);
        assert_eq!(following[0].id, "f2");

        let followers = service.get_followers_of("a").await.unwrap();
        assert_eq!(followers.len(), 1);
        assert_eq!(followers[0].from_id, "c");
        assert!(cache.is_empty());
    }
}
