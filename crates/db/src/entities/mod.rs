//! Database entities.

pub mod comment;
pub mod follow;
pub mod like;
pub mod post;
pub mod user;

pub use comment::Entity as Comment;
pub use follow::Entity as Follow;
pub use like::Entity as Like;
pub use post::Entity as Post;
pub use user::Entity as User;
