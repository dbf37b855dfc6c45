//! Core business logic for plaza.
//!
//! Likes, follows and comment counts, each kept in step with a best-effort
//! [`CacheLayer`] in front of the database.

pub mod services;

pub use services::*;
