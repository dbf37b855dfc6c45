//! Business logic services.

pub mod cache_layer;
pub mod comment;
pub mod following;
pub mod like;
pub mod relationship;

pub use cache_layer::{CacheCodec, CacheLayer, CacheLookup, Relation};
pub use comment::{CommentCounter, CommentService};
pub use following::FollowingService;
pub use like::LikeService;
pub use relationship::{CreateOutcome, ToggleOutcome, ToggleTarget, toggle};
