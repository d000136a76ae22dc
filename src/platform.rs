use reqwest::StatusCode;
use thiserror::Error;

use crate::model::{CommentTree, Post};

#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: StatusCode },

    #[error("authentication rejected: {0}")]
    Auth(String),

    #[error("unexpected response from {url}: {message}")]
    Decode { url: String, message: String },
}

/// Lazily produced, unbounded feed of posts in platform order.
pub trait PostFeed {
    async fn next_post(&mut self) -> Result<Option<Post>, PlatformError>;
}

/// The discussion platform the export reads from.
pub trait Platform {
    type Feed: PostFeed;

    /// The community's "hot" ordering. No request is made until the first `next_post`.
    fn hot(&self, community: &str) -> Self::Feed;

    /// Comment forest of a post, possibly containing collapsed branches.
    async fn comments(&self, post: &Post) -> Result<CommentTree, PlatformError>;

    /// Replace every collapsed branch in `tree` until none remain.
    async fn expand_all(&self, post: &Post, tree: &mut CommentTree) -> Result<(), PlatformError>;
}
