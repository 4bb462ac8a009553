//! Content source traits describing the headless CMS adapter.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::posts::{Neighbor, NeighborPost, Post, PostPage};

/// Query parameter carrying the CMS credential. Kept out of rendered pages.
pub const ACCESS_TOKEN_PARAM: &str = "access_token";

#[derive(Debug, Error)]
pub enum ContentError {
    #[error("content request failed: {0}")]
    Transport(String),
    #[error("content source responded with status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("content payload could not be decoded: {0}")]
    Decode(String),
    #[error("invalid content request: {0}")]
    InvalidRequest(String),
}

impl ContentError {
    pub fn transport(err: impl std::fmt::Display) -> Self {
        Self::Transport(err.to_string())
    }

    pub fn decode(err: impl std::fmt::Display) -> Self {
        Self::Decode(err.to_string())
    }
}

/// Follows a continuation cursor and returns the page it points at.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch_page(&self, next_page: &str) -> Result<PostPage, ContentError>;
}

/// Read access to the posts stored in the CMS.
///
/// `preview_ref` selects unpublished content; `None` reads the published (master) ref.
#[async_trait]
pub trait ContentSource: PageFetcher {
    /// First page of the post listing, newest first as ordered by the CMS.
    async fn query_posts(
        &self,
        page_size: u32,
        preview_ref: Option<&str>,
    ) -> Result<PostPage, ContentError>;

    async fn post_by_uid(
        &self,
        uid: &str,
        preview_ref: Option<&str>,
    ) -> Result<Option<Post>, ContentError>;

    /// The post adjacent to `document_id` by last publication date.
    async fn neighbor(
        &self,
        document_id: &str,
        direction: Neighbor,
        preview_ref: Option<&str>,
    ) -> Result<Option<NeighborPost>, ContentError>;

    /// Uid of the document a preview session was opened for.
    async fn resolve_document(
        &self,
        document_id: &str,
        preview_ref: &str,
    ) -> Result<Option<String>, ContentError>;

    /// Whether `token` points at this content source.
    fn owns_token(&self, token: &str) -> bool;
}
