//! Repositories over the relational store.
//!
//! Every method maps `DbErr` into [`AppError::Database`], except for unique
//! constraint violations on insert which are reported as
//! [`InsertOutcome::Duplicate`] so callers can tell a lost race apart from a
//! failing store.

mod comment;
mod follow;
mod like;

pub use comment::CommentRepository;
pub use follow::FollowRepository;
pub use like::LikeRepository;

use plaza_common::{AppError, AppResult};
use sea_orm::{DbErr, SqlErr};

/// Result of an insert guarded by a unique constraint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertOutcome<M> {
    /// The row was written.
    Inserted(M),
    /// A row with the same unique key already exists.
    Duplicate,
}

/// Whether `err` is a unique constraint violation reported by the database.
#[must_use]
pub fn is_unique_violation(err: &DbErr) -> bool {
    matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
}

fn classify_insert<M>(result: Result<M, DbErr>) -> AppResult<InsertOutcome<M>> {
    match result {
        Ok(model) => Ok(InsertOutcome::Inserted(model)),
        Err(e) if is_unique_violation(&e) => Ok(InsertOutcome::Duplicate),
        Err(e) => Err(AppError::Database(e.to_string())),
    }
}
