//! Common utilities and shared types for plaza.
//!
//! This crate provides foundational components used across all plaza crates:
//!
//! - **Configuration**: Application settings via [`Config`]
//! - **Error handling**: Unified error types via [`AppError`] and [`AppResult`]
//! - **ID Generation**: ULID-based unique identifiers via [`IdGenerator`]
//! - **Cache**: The [`FastCache`] abstraction with Redis and in-memory backends
//!
//! # Example
//!
//! ```no_run
//! use plaza_common::{Config, IdGenerator, AppResult};
//!
//! fn example() -> AppResult<()> {
//!     let config = Config::load()?;
//!     let id_gen = IdGenerator::new();
//!     let id = id_gen.generate();
//!     println!("Generated ID {} for {}", id, config.database.url);
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod config;
pub mod error;
pub mod id;

pub use cache::{CacheError, FastCache, FastCacheService, MemoryCache, RedisFastCache};
pub use config::Config;
pub use error::{AppError, AppResult};
pub use id::IdGenerator;
