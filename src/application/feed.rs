//! Data-fetch functions invoked once per render.
//!
//! Each function reads from the content source and returns immutable props;
//! nothing here holds state between renders.

use std::sync::Arc;

use axum::response::Response;
use datastar::prelude::ElementPatchMode;
use thiserror::Error;
use tracing::{debug, info};

use crate::application::content::{ContentError, ContentSource};
use crate::application::pagination::{PaginationError, Paginator};
use crate::application::stream::StreamBuilder;
use crate::domain::posts::{Neighbor, NeighborPost, Post, PostPage};

pub const DEFAULT_HOME_PAGE_SIZE: u32 = 2;
pub const DEFAULT_STATIC_PATHS_PAGE_SIZE: u32 = 10;
pub const DEFAULT_STATIC_PATHS_LIMIT: usize = 10;

#[derive(Debug, Error)]
pub enum FeedError {
    #[error(transparent)]
    Content(#[from] ContentError),
    #[error(transparent)]
    Pagination(#[from] PaginationError),
}

/// Props for the home page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HomeProps {
    pub posts_pagination: PostPage,
    pub preview: bool,
}

/// Props for a post page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostProps {
    pub post: Post,
    pub prev_post: Option<NeighborPost>,
    pub next_post: Option<NeighborPost>,
    pub preview: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeedLimits {
    pub home_page_size: u32,
    pub static_paths_page_size: u32,
    pub static_paths_limit: usize,
}

impl Default for FeedLimits {
    fn default() -> Self {
        Self {
            home_page_size: DEFAULT_HOME_PAGE_SIZE,
            static_paths_page_size: DEFAULT_STATIC_PATHS_PAGE_SIZE,
            static_paths_limit: DEFAULT_STATIC_PATHS_LIMIT,
        }
    }
}

#[derive(Clone)]
pub struct FeedService {
    source: Arc<dyn ContentSource>,
    limits: FeedLimits,
}

impl FeedService {
    pub fn new(source: Arc<dyn ContentSource>, limits: FeedLimits) -> Self {
        Self { source, limits }
    }

    pub fn limits(&self) -> FeedLimits {
        self.limits
    }

    pub async fn home_props(&self, preview_ref: Option<&str>) -> Result<HomeProps, FeedError> {
        let page = self
            .source
            .query_posts(self.limits.home_page_size, preview_ref)
            .await?;

        Ok(HomeProps {
            posts_pagination: page,
            preview: preview_ref.is_some(),
        })
    }

    /// Post plus its neighbours, or `None` for an unknown uid.
    pub async fn post_props(
        &self,
        uid: &str,
        preview_ref: Option<&str>,
    ) -> Result<Option<PostProps>, FeedError> {
        let Some(post) = self.source.post_by_uid(uid, preview_ref).await? else {
            return Ok(None);
        };

        let (prev_post, next_post) = tokio::try_join!(
            self.source
                .neighbor(&post.id, Neighbor::Previous, preview_ref),
            self.source.neighbor(&post.id, Neighbor::Next, preview_ref),
        )?;

        Ok(Some(PostProps {
            post,
            prev_post,
            next_post,
            preview: preview_ref.is_some(),
        }))
    }

    /// Uids prerendered at startup.
    pub async fn static_paths(&self) -> Result<Vec<String>, FeedError> {
        let page = self
            .collect_posts(
                self.limits.static_paths_page_size,
                Some(self.limits.static_paths_limit),
            )
            .await?;

        Ok(page
            .results
            .into_iter()
            .take(self.limits.static_paths_limit)
            .map(|summary| summary.uid)
            .collect())
    }

    /// Walk the listing until `limit` summaries are held or pages run out.
    pub async fn collect_posts(
        &self,
        page_size: u32,
        limit: Option<usize>,
    ) -> Result<PostPage, FeedError> {
        let seed = self.source.query_posts(page_size, None).await?;
        let paginator = Paginator::new(Some(seed));

        loop {
            let held = paginator.snapshot();
            let reached = limit.is_some_and(|limit| held.results.len() >= limit);
            if reached || !held.has_more() {
                break;
            }
            paginator.load_more(self.source.as_ref()).await?;
        }

        let page = paginator.into_page();
        info!(
            target = "spacetraveling::application::feed",
            posts = page.results.len(),
            exhausted = !page.has_more(),
            "post listing collected"
        );
        Ok(page)
    }

    /// Page behind `token`, as a delta to append after what the client holds.
    pub async fn load_more(&self, token: &str) -> Result<PostPage, FeedError> {
        if !self.source.owns_token(token) {
            return Err(PaginationError::ForeignToken(token.to_string()).into());
        }

        let paginator = Paginator::new(Some(PostPage {
            next_page: Some(token.to_string()),
            results: Vec::new(),
        }));
        let page = paginator.load_more(self.source.as_ref()).await?;

        debug!(
            target = "spacetraveling::application::feed",
            appended = page.results.len(),
            has_more = page.has_more(),
            "load more served"
        );
        Ok(page)
    }

    /// Path of the page a preview session opens on.
    pub async fn preview_location(
        &self,
        document_id: &str,
        preview_ref: &str,
    ) -> Result<String, FeedError> {
        let uid = self
            .source
            .resolve_document(document_id, preview_ref)
            .await?;
        Ok(match uid {
            Some(uid) => format!("/post/{uid}"),
            None => "/".to_string(),
        })
    }
}

/// Rendered pieces of one load-more step.
pub struct AppendPayload {
    pub cards_html: Option<String>,
    pub loader_html: String,
    pub appended: usize,
}

pub const POST_LIST_SELECTOR: &str = "#post-list";
pub const LOADER_SELECTOR: &str = "#load-more-container";

pub fn build_datastar_append_response(payload: AppendPayload) -> Response {
    let AppendPayload {
        cards_html,
        loader_html,
        appended,
    } = payload;

    let mut stream = StreamBuilder::new();
    if let Some(html) = cards_html.filter(|_| appended > 0) {
        stream.push_patch(html, POST_LIST_SELECTOR, ElementPatchMode::Append);
    }
    stream.push_patch(loader_html, LOADER_SELECTOR, ElementPatchMode::Inner);
    stream.push_signals(r#"{"loadingPosts": false}"#);
    stream.into_response()
}

/// Keeps the listing as is and swaps the loader for one carrying `loader_html`.
pub fn build_datastar_error_response(loader_html: String) -> Response {
    let mut stream = StreamBuilder::new();
    stream.push_patch(loader_html, LOADER_SELECTOR, ElementPatchMode::Inner);
    stream.push_signals(r#"{"loadingPosts": false}"#);
    stream.into_response()
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::application::content::PageFetcher;
    use crate::domain::posts::PostSummary;

    fn summary(uid: &str) -> PostSummary {
        PostSummary {
            uid: uid.to_string(),
            first_publication_date: None,
            title: uid.to_uppercase(),
            subtitle: String::new(),
            author: String::new(),
        }
    }

    fn post(uid: &str) -> Post {
        Post {
            id: format!("id-{uid}"),
            uid: uid.to_string(),
            first_publication_date: None,
            last_publication_date: None,
            title: uid.to_uppercase(),
            subtitle: String::new(),
            banner_url: None,
            author: String::new(),
            content: Vec::new(),
        }
    }

    /// Listing split into pages of `page_size`; tokens are `cms://page/<n>`.
    struct StubSource {
        uids: Vec<&'static str>,
        page_size: usize,
        requests: Mutex<Vec<String>>,
    }

    impl StubSource {
        fn new(uids: Vec<&'static str>, page_size: usize) -> Self {
            Self {
                uids,
                page_size,
                requests: Mutex::new(Vec::new()),
            }
        }

        fn page(&self, index: usize) -> PostPage {
            let start = index * self.page_size;
            let end = (start + self.page_size).min(self.uids.len());
            let results = self.uids[start.min(end)..end]
                .iter()
                .map(|uid| summary(uid))
                .collect();
            let next_page = (end < self.uids.len()).then(|| format!("cms://page/{}", index + 1));
            PostPage { next_page, results }
        }

        fn requests(&self) -> Vec<String> {
            self.requests.lock().expect("lock").clone()
        }
    }

    #[async_trait]
    impl PageFetcher for StubSource {
        async fn fetch_page(&self, next_page: &str) -> Result<PostPage, ContentError> {
            self.requests.lock().expect("lock").push(next_page.to_string());
            let index = next_page
                .strip_prefix("cms://page/")
                .and_then(|raw| raw.parse().ok())
                .ok_or_else(|| ContentError::InvalidRequest(next_page.to_string()))?;
            Ok(self.page(index))
        }
    }

    #[async_trait]
    impl ContentSource for StubSource {
        async fn query_posts(
            &self,
            _page_size: u32,
            _preview_ref: Option<&str>,
        ) -> Result<PostPage, ContentError> {
            Ok(self.page(0))
        }

        async fn post_by_uid(
            &self,
            uid: &str,
            _preview_ref: Option<&str>,
        ) -> Result<Option<Post>, ContentError> {
            Ok(self.uids.contains(&uid).then(|| post(uid)))
        }

        async fn neighbor(
            &self,
            document_id: &str,
            direction: Neighbor,
            _preview_ref: Option<&str>,
        ) -> Result<Option<NeighborPost>, ContentError> {
            let neighbours: HashMap<(&str, bool), &str> =
                HashMap::from([(("id-b", true), "a"), (("id-b", false), "c")]);
            let key = (document_id, direction == Neighbor::Previous);
            Ok(neighbours.get(&key).map(|uid| NeighborPost {
                uid: uid.to_string(),
                title: uid.to_uppercase(),
            }))
        }

        async fn resolve_document(
            &self,
            document_id: &str,
            _preview_ref: &str,
        ) -> Result<Option<String>, ContentError> {
            Ok(document_id.strip_prefix("id-").map(str::to_string))
        }

        fn owns_token(&self, token: &str) -> bool {
            token.starts_with("cms://")
        }
    }

    fn service(source: Arc<StubSource>, static_paths_limit: usize) -> FeedService {
        FeedService::new(
            source,
            FeedLimits {
                static_paths_limit,
                ..FeedLimits::default()
            },
        )
    }

    #[tokio::test]
    async fn home_props_carry_first_page() {
        let source = Arc::new(StubSource::new(vec!["a", "b", "c"], 2));
        let props = service(source, 10).home_props(None).await.expect("props");

        assert!(!props.preview);
        assert_eq!(props.posts_pagination.results.len(), 2);
        assert_eq!(
            props.posts_pagination.next_page.as_deref(),
            Some("cms://page/1")
        );
    }

    #[tokio::test]
    async fn preview_ref_marks_props_as_preview() {
        let source = Arc::new(StubSource::new(vec!["a"], 2));
        let props = service(source, 10)
            .home_props(Some("preview-ref"))
            .await
            .expect("props");
        assert!(props.preview);
    }

    #[tokio::test]
    async fn post_props_include_neighbours() {
        let source = Arc::new(StubSource::new(vec!["a", "b", "c"], 2));
        let props = service(source, 10)
            .post_props("b", None)
            .await
            .expect("props")
            .expect("known post");

        assert_eq!(props.post.uid, "b");
        assert_eq!(props.prev_post.map(|post| post.uid).as_deref(), Some("a"));
        assert_eq!(props.next_post.map(|post| post.uid).as_deref(), Some("c"));
    }

    #[tokio::test]
    async fn unknown_uid_yields_none() {
        let source = Arc::new(StubSource::new(vec!["a"], 2));
        let props = service(source, 10).post_props("zzz", None).await.expect("ok");
        assert!(props.is_none());
    }

    #[tokio::test]
    async fn static_paths_walk_pages_until_limit() {
        let source = Arc::new(StubSource::new(vec!["a", "b", "c", "d", "e"], 2));
        let paths = service(Arc::clone(&source), 3)
            .static_paths()
            .await
            .expect("paths");

        assert_eq!(paths, ["a", "b", "c"]);
        assert_eq!(source.requests(), ["cms://page/1"]);
    }

    #[tokio::test]
    async fn collect_posts_without_limit_exhausts_listing() {
        let source = Arc::new(StubSource::new(vec!["a", "b", "c", "d", "e"], 2));
        let page = service(Arc::clone(&source), 10)
            .collect_posts(2, None)
            .await
            .expect("listing");

        assert_eq!(page.results.len(), 5);
        assert!(!page.has_more());
        assert_eq!(source.requests(), ["cms://page/1", "cms://page/2"]);
    }

    #[tokio::test]
    async fn load_more_returns_only_the_next_page() {
        let source = Arc::new(StubSource::new(vec!["a", "b", "c", "d", "e"], 2));
        let page = service(source, 10)
            .load_more("cms://page/1")
            .await
            .expect("page");

        let uids: Vec<_> = page.results.iter().map(|post| post.uid.as_str()).collect();
        assert_eq!(uids, ["c", "d"]);
        assert_eq!(page.next_page.as_deref(), Some("cms://page/2"));
    }

    #[tokio::test]
    async fn load_more_rejects_foreign_tokens() {
        let source = Arc::new(StubSource::new(vec!["a"], 2));
        let err = service(Arc::clone(&source), 10)
            .load_more("https://attacker.example/steal")
            .await
            .expect_err("foreign token");

        assert!(matches!(
            err,
            FeedError::Pagination(PaginationError::ForeignToken(_))
        ));
        assert!(source.requests().is_empty());
    }

    #[tokio::test]
    async fn preview_location_points_at_post_or_home() {
        let source = Arc::new(StubSource::new(vec!["a"], 2));
        let feed = service(source, 10);

        assert_eq!(
            feed.preview_location("id-a", "ref").await.expect("location"),
            "/post/a"
        );
        assert_eq!(
            feed.preview_location("other", "ref").await.expect("location"),
            "/"
        );
    }
}
