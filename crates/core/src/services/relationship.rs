//! Outcomes shared by the like and follow services, and the toggle both use.

use async_trait::async_trait;
use plaza_common::{AppError, AppResult};
use tracing::{info, warn};

/// Result of creating a relationship.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreateOutcome<M> {
    /// A new row was written.
    Created(M),
    /// The pair was already related.
    AlreadyExists,
}

impl<M> CreateOutcome<M> {
    /// Map the created value.
    pub fn map<N>(self, f: impl FnOnce(M) -> N) -> CreateOutcome<N> {
        match self {
            Self::Created(model) => CreateOutcome::Created(f(model)),
            Self::AlreadyExists => CreateOutcome::AlreadyExists,
        }
    }

    /// The created value, if any.
    pub fn created(self) -> Option<M> {
        match self {
            Self::Created(model) => Some(model),
            Self::AlreadyExists => None,
        }
    }
}

/// State after a toggle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToggleOutcome {
    /// Whether the relationship exists now.
    pub active: bool,
    /// Id of the relationship created by this toggle.
    pub relationship_id: Option<String>,
}

impl ToggleOutcome {
    fn activated(id: String) -> Self {
        Self {
            active: true,
            relationship_id: Some(id),
        }
    }

    const fn deactivated() -> Self {
        Self {
            active: false,
            relationship_id: None,
        }
    }
}

/// A relationship between an actor and a subject that can be toggled.
#[async_trait]
pub trait ToggleTarget: Send + Sync {
    /// Name used in logs and errors.
    fn kind(&self) -> &'static str;

    /// Current relationship id, read through the cache.
    async fn lookup(&self, actor_id: &str, subject_id: &str) -> AppResult<Option<String>>;

    /// Delete a relationship owned by `actor_id`. `false` when nothing matched.
    async fn remove(&self, actor_id: &str, relationship_id: &str) -> AppResult<bool>;

    /// Create the relationship.
    async fn insert(&self, actor_id: &str, subject_id: &str) -> AppResult<CreateOutcome<String>>;

    /// Drop the cached existence entry for the pair.
    async fn forget(&self, actor_id: &str, subject_id: &str);
}

/// Flip a relationship: delete it when it exists, create it otherwise.
///
/// A toggle that finds its view of the pair outdated by a concurrent writer
/// fails with [`AppError::ConcurrentModification`] after dropping the cached
/// entry, so a retry starts from the store.
pub async fn toggle<T>(target: &T, actor_id: &str, subject_id: &str) -> AppResult<ToggleOutcome>
where
    T: ToggleTarget + ?Sized,
{
    if let Some(id) = target.lookup(actor_id, subject_id).await? {
        if target.remove(actor_id, &id).await? {
            info!(kind = target.kind(), actor = %actor_id, subject = %subject_id, "Toggled off");
            return Ok(ToggleOutcome::deactivated());
        }

        warn!(kind = target.kind(), actor = %actor_id, subject = %subject_id, id = %id, "Toggle delete found no row");
        target.forget(actor_id, subject_id).await;
        return Err(AppError::ConcurrentModification(format!(
            "{} {actor_id} -> {subject_id} was removed concurrently",
            target.kind()
        )));
    }

    match target.insert(actor_id, subject_id).await? {
        CreateOutcome::Created(id) => {
            info!(kind = target.kind(), actor = %actor_id, subject = %subject_id, "Toggled on");
            Ok(ToggleOutcome::activated(id))
        }
        CreateOutcome::AlreadyExists => {
            warn!(kind = target.kind(), actor = %actor_id, subject = %subject_id, "Toggle lost create race");
            target.forget(actor_id, subject_id).await;
            Err(AppError::ConcurrentModification(format!(
                "{} {actor_id} -> {subject_id} was created concurrently",
                target.kind()
            )))
        }
    }
}
