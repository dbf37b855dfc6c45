//! Cache consistency tests against a real database.
//!
//! These tests require a running `PostgreSQL` instance.
//! Run with: `cargo test -p plaza-core --test cache_consistency -- --ignored`
//!
//! Every test works on freshly generated users and posts, so they can share
//! one database and run in parallel.

#![allow(clippy::unwrap_used)]

use futures::future::join_all;
use plaza_common::{AppError, IdGenerator, MemoryCache};
use plaza_core::{CacheLayer, CommentService, CreateOutcome, FollowingService, LikeService};
use plaza_db::repositories::{CommentRepository, FollowRepository, LikeRepository};
use plaza_db::test_utils::TestDatabase;
use std::sync::Arc;

struct Fixture {
    db: TestDatabase,
    cache: Arc<MemoryCache>,
    ids: IdGenerator,
}

impl Fixture {
    async fn new() -> Self {
        Self {
            db: TestDatabase::new().await.expect("Failed to connect"),
            cache: Arc::new(MemoryCache::new()),
            ids: IdGenerator::new(),
        }
    }

    async fn user(&self) -> String {
        let id = self.ids.generate();
        self.db
            .insert_user(&id, &format!("user_{id}"))
            .await
            .unwrap();
        id
    }

    async fn post(&self, author_id: &str) -> String {
        let id = self.ids.generate();
        self.db.insert_post(&id, author_id).await.unwrap();
        id
    }

    fn conn(&self) -> Arc<sea_orm::DatabaseConnection> {
        Arc::new(sea_orm::SqlxPostgresConnector::from_sqlx_postgres_pool(
            self.db.conn.get_postgres_connection_pool().clone(),
        ))
    }

    fn likes(&self) -> LikeService {
        LikeService::with_cache(
            LikeRepository::new(self.conn()),
            CacheLayer::new(self.cache.clone()),
        )
    }

    fn follows(&self) -> FollowingService {
        FollowingService::with_cache(
            FollowRepository::new(self.conn()),
            CacheLayer::new(self.cache.clone()),
        )
    }

    fn comments(&self) -> CommentService {
        CommentService::new(
            CommentRepository::new(self.conn()),
            CacheLayer::new(self.cache.clone()),
        )
    }
}

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_concurrent_creates_leave_one_like() {
    let fx = Fixture::new().await;
    let author = fx.user().await;
    let liker = fx.user().await;
    let post = fx.post(&author).await;
    let likes = fx.likes();

    let outcomes = join_all((0..8).map(|_| likes.create(&liker, &post))).await;

    let created = outcomes
        .into_iter()
        .map(Result::unwrap)
        .filter(|o| matches!(o, CreateOutcome::Created(_)))
        .count();
    assert_eq!(created, 1);

    fx.cache.clear();
    assert_eq!(likes.count(&post).await.unwrap(), 1);
}

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_concurrent_toggles_never_report_phantom_ids() {
    let fx = Fixture::new().await;
    let author = fx.user().await;
    let liker = fx.user().await;
    let post = fx.post(&author).await;
    let likes = fx.likes();

    let results = join_all((0..6).map(|_| likes.toggle(&liker, &post))).await;

    for result in &results {
        match result {
            Ok(outcome) if outcome.active => assert!(outcome.relationship_id.is_some()),
            Ok(outcome) => assert!(outcome.relationship_id.is_none()),
            Err(AppError::ConcurrentModification(_)) => {}
            Err(e) => panic!("unexpected error: {e}"),
        }
    }

    fx.cache.clear();
    let rows = likes.count(&post).await.unwrap();
    assert!(rows <= 1);
    assert_eq!(
        likes.user_likes(&liker, &post).await.unwrap().is_some(),
        rows == 1
    );
}

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_like_counter_survives_cache_clears() {
    let fx = Fixture::new().await;
    let author = fx.user().await;
    let post = fx.post(&author).await;
    let likes = fx.likes();

    let mut users = Vec::new();
    for _ in 0..5 {
        users.push(fx.user().await);
    }

    let mut expected = 0_u64;
    let mut like_ids = Vec::new();
    for (step, user) in users.iter().enumerate() {
        if step == 2 {
            fx.cache.clear();
        }
        let like = likes.create(user, &post).await.unwrap().created().unwrap();
        like_ids.push((user.clone(), like.id));
        expected += 1;
        assert_eq!(likes.count(&post).await.unwrap(), expected);
    }

    for (step, (user, like_id)) in like_ids.iter().enumerate() {
        if step == 3 {
            fx.cache.clear();
        }
        assert!(likes.delete(user, like_id).await.unwrap());
        expected -= 1;
        assert_eq!(likes.count(&post).await.unwrap(), expected);
    }
}

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_like_scenario_with_and_without_cache() {
    for failing in [false, true] {
        let fx = Fixture::new().await;
        fx.cache.set_failing(failing);
        let alice = fx.user().await;
        let bob = fx.user().await;
        let post = fx.post(&bob).await;
        let likes = fx.likes();

        assert_eq!(likes.count(&post).await.unwrap(), 0);

        let alice_like = likes
            .create(&alice, &post)
            .await
            .unwrap()
            .created()
            .unwrap();
        assert_eq!(likes.count(&post).await.unwrap(), 1);

        likes.create(&bob, &post).await.unwrap();
        assert_eq!(likes.count(&post).await.unwrap(), 2);

        assert!(likes.delete(&alice, &alice_like.id).await.unwrap());
        assert_eq!(likes.count(&post).await.unwrap(), 1);
        assert_eq!(likes.user_likes(&alice, &post).await.unwrap(), None);

        assert!(likes.toggle(&alice, &post).await.unwrap().active);
        assert_eq!(likes.count(&post).await.unwrap(), 2);

        assert!(!likes.toggle(&alice, &post).await.unwrap().active);
        assert_eq!(likes.count(&post).await.unwrap(), 1);
    }
}

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_follow_lists_and_toggle() {
    let fx = Fixture::new().await;
    let alice = fx.user().await;
    let bob = fx.user().await;
    let carol = fx.user().await;
    let follows = fx.follows();

    follows.create(&alice, &bob).await.unwrap();
    follows.create(&alice, &carol).await.unwrap();
    follows.create(&carol, &alice).await.unwrap();

    let following = follows.get_follows_from(&alice).await.unwrap();
    assert_eq!(following.len(), 2);
    assert!(following.iter().any(|f| f.to_id == carol));

    let followers = follows.get_followers_of(&alice).await.unwrap();
    assert_eq!(followers.len(), 1);

    assert!(follows.user_follows(&alice, &bob).await.unwrap().is_some());
    assert!(follows.user_follows(&bob, &alice).await.unwrap().is_none());

    assert!(!follows.toggle(&alice, &bob).await.unwrap().active);
    assert!(follows.user_follows(&alice, &bob).await.unwrap().is_none());
    assert!(matches!(
        follows.toggle(&alice, &alice).await,
        Err(AppError::BadRequest(_))
    ));
}

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_comment_count_tracks_writes() {
    let fx = Fixture::new().await;
    let author = fx.user().await;
    let post = fx.post(&author).await;
    let comments = fx.comments();

    assert_eq!(comments.count(&post).await.unwrap(), 0);

    let first = comments
        .create_comment(&author, &post, "one")
        .await
        .unwrap();
    comments
        .create_comment(&author, &post, "two")
        .await
        .unwrap();
    assert_eq!(comments.count(&post).await.unwrap(), 2);

    fx.cache.clear();
    assert!(comments.delete_comment(&author, &first.id).await.unwrap());
    assert_eq!(comments.count(&post).await.unwrap(), 1);

    let listed = comments.get_post_comments(&post).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].content, "two");
}
