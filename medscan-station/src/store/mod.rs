//! Feedback record store
//!
//! Durable persistence of submitted training comments (SQLite row plus an
//! optional filesystem-stored attachment) with per-insert broadcast to
//! every live viewer.

pub mod comments;
pub mod feed;
pub mod objects;

pub use comments::{ensure_schema, CommentStore};
pub use feed::LiveFeed;
pub use objects::ObjectStore;
