//! Page rendering from feed props.

use std::sync::Arc;

use chrono_tz::Tz;
use thiserror::Error;
use url::{Url, form_urlencoded};

use crate::{
    application::{
        comments::CommentsEmbed,
        content::ACCESS_TOKEN_PARAM,
        feed::{AppendPayload, FeedError, FeedService, HomeProps, PostProps},
        reading_time, richtext,
    },
    domain::{
        dates,
        posts::{Post, PostSummary},
    },
    presentation::views::{
        BrandView, CommentsView, ContentBlockView, FeedLoaderTemplate, FeedLoaderView, HomeView, IndexTemplate,
        LayoutChrome, LayoutContext, NeighborLinkView, PageMetaView, PostCard, PostCardsTemplate,
        PostDetailView, PostTemplate, TemplateRenderError, render_fragment,
    },
    util::timezone,
};

pub const LOAD_MORE_PATH: &str = "/posts/more";

#[derive(Debug, Error)]
pub enum RenderError {
    #[error(transparent)]
    Feed(#[from] FeedError),
    #[error(transparent)]
    Template(#[from] TemplateRenderError),
}

/// Site-wide presentation settings.
#[derive(Debug, Clone)]
pub struct SiteChrome {
    pub title: String,
    pub timezone: Tz,
    pub comments: Option<CommentsEmbed>,
}

pub struct SiteRenderer {
    feed: Arc<FeedService>,
    chrome: SiteChrome,
}

impl SiteRenderer {
    pub fn new(feed: Arc<FeedService>, chrome: SiteChrome) -> Self {
        Self { feed, chrome }
    }

    pub fn feed(&self) -> &FeedService {
        &self.feed
    }

    pub fn layout_chrome(&self, preview: bool) -> LayoutChrome {
        LayoutChrome {
            brand: BrandView {
                title: self.chrome.title.clone(),
                href: "/".to_string(),
            },
            meta: PageMetaView {
                title: self.chrome.title.clone(),
            },
            preview,
        }
    }

    pub async fn home_page(&self, preview_ref: Option<&str>) -> Result<String, RenderError> {
        let props = self.feed.home_props(preview_ref).await?;
        Ok(self.render_home(&props)?)
    }

    pub async fn post_page(
        &self,
        uid: &str,
        preview_ref: Option<&str>,
    ) -> Result<Option<String>, RenderError> {
        let Some(props) = self.feed.post_props(uid, preview_ref).await? else {
            return Ok(None);
        };
        Ok(Some(self.render_post(&props)?))
    }

    /// Next listing page rendered as a card fragment plus a fresh loader.
    pub async fn append_payload(&self, token: &str) -> Result<AppendPayload, RenderError> {
        let page = self.feed.load_more(token).await?;
        let appended = page.results.len();
        let cards_html = if appended > 0 {
            Some(self.render_cards(&page.results)?)
        } else {
            None
        };
        let loader_html = self.render_loader(page.next_page.as_deref(), None)?;

        Ok(AppendPayload {
            cards_html,
            loader_html,
            appended,
        })
    }

    pub fn render_home(&self, props: &HomeProps) -> Result<String, TemplateRenderError> {
        let page = &props.posts_pagination;
        let content = HomeView {
            cards_html: self.render_cards(&page.results)?,
            loader_html: self.render_loader(page.next_page.as_deref(), None)?,
        };
        let chrome = self
            .layout_chrome(props.preview)
            .with_title_prefix("Início");

        render_fragment(
            &IndexTemplate {
                view: LayoutContext::new(chrome, content),
            },
            "application::site::render_home",
        )
    }

    pub fn render_post(&self, props: &PostProps) -> Result<String, TemplateRenderError> {
        let chrome = self
            .layout_chrome(props.preview)
            .with_title_prefix(&props.post.title);
        let content = self.post_detail(props);

        render_fragment(
            &PostTemplate {
                view: LayoutContext::new(chrome, content),
            },
            "application::site::render_post",
        )
    }

    pub fn render_cards(&self, posts: &[PostSummary]) -> Result<String, TemplateRenderError> {
        let template = PostCardsTemplate {
            posts: posts.iter().map(|post| self.post_card(post)).collect(),
        };
        render_fragment(&template, "application::site::render_cards")
    }

    /// Loader for the cursor `next_page`, optionally showing `error`.
    pub fn render_loader(
        &self,
        next_page: Option<&str>,
        error: Option<&str>,
    ) -> Result<String, TemplateRenderError> {
        let template = FeedLoaderTemplate {
            view: FeedLoaderView {
                has_more: next_page.is_some(),
                href: next_page.map(load_more_href).unwrap_or_default(),
                error: error.unwrap_or_default().to_string(),
            },
        };
        render_fragment(&template, "application::site::render_loader")
    }

    pub fn post_card(&self, summary: &PostSummary) -> PostCard {
        let (published, iso_date) = self.display_day(summary.first_publication_date);
        PostCard {
            uid: summary.uid.clone(),
            title: summary.title.clone(),
            subtitle: summary.subtitle.clone(),
            author: summary.author.clone(),
            published,
            iso_date,
        }
    }

    fn post_detail(&self, props: &PostProps) -> PostDetailView {
        let post: &Post = &props.post;
        let (published, iso_date) = self.display_day(post.first_publication_date);
        let edited = post
            .last_publication_date
            .map(|value| dates::format_edited(timezone::localized(value, self.chrome.timezone)))
            .unwrap_or_default();

        let blocks = post
            .content
            .iter()
            .map(|block| ContentBlockView {
                heading: block.heading.clone(),
                body_html: richtext::render_html(&block.body),
            })
            .collect();

        let mut neighbors = Vec::with_capacity(2);
        if let Some(prev) = &props.prev_post {
            neighbors.push(NeighborLinkView {
                href: format!("/post/{}", prev.uid),
                title: prev.title.clone(),
                label: "Post anterior",
                class: "previous",
            });
        }
        if let Some(next) = &props.next_post {
            neighbors.push(NeighborLinkView {
                href: format!("/post/{}", next.uid),
                title: next.title.clone(),
                label: "Próximo post",
                class: "next",
            });
        }

        PostDetailView {
            uid: post.uid.clone(),
            title: post.title.clone(),
            banner_url: post.banner_url.clone().unwrap_or_default(),
            author: post.author.clone(),
            published,
            iso_date,
            edited,
            reading_minutes: reading_time::estimate(&post.content),
            blocks,
            neighbors,
            comments: CommentsView::new(self.chrome.comments.clone()),
        }
    }

    fn display_day(&self, value: Option<time::OffsetDateTime>) -> (String, String) {
        match value {
            Some(value) => {
                let local = timezone::localized(value, self.chrome.timezone);
                (dates::format_day(local), dates::iso_datetime(local))
            }
            None => (String::new(), String::new()),
        }
    }
}

/// `/posts/more?page=<token>` with the token form-encoded and its access token removed.
pub fn load_more_href(token: &str) -> String {
    let public = public_token(token);
    let encoded: String = form_urlencoded::byte_serialize(public.as_bytes()).collect();
    format!("{LOAD_MORE_PATH}?page={encoded}")
}

fn public_token(token: &str) -> String {
    let Ok(mut url) = Url::parse(token) else {
        return token.to_string();
    };
    if !url.query_pairs().any(|(key, _)| key == ACCESS_TOKEN_PARAM) {
        return token.to_string();
    }

    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| key != ACCESS_TOKEN_PARAM)
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();
    if kept.is_empty() {
        url.set_query(None);
    } else {
        url.query_pairs_mut().clear().extend_pairs(kept);
    }
    url.into()
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use time::macros::datetime;

    use super::*;
    use crate::application::content::{ContentError, ContentSource, PageFetcher};
    use crate::application::feed::FeedLimits;
    use crate::domain::posts::{
        ContentBlock, Neighbor, NeighborPost, PostPage, RichTextSpan,
    };

    struct EmptySource;

    #[async_trait]
    impl PageFetcher for EmptySource {
        async fn fetch_page(&self, _next_page: &str) -> Result<PostPage, ContentError> {
            Ok(PostPage::empty())
        }
    }

    #[async_trait]
    impl ContentSource for EmptySource {
        async fn query_posts(
            &self,
            _page_size: u32,
            _preview_ref: Option<&str>,
        ) -> Result<PostPage, ContentError> {
            Ok(PostPage::empty())
        }

        async fn post_by_uid(
            &self,
            _uid: &str,
            _preview_ref: Option<&str>,
        ) -> Result<Option<Post>, ContentError> {
            Ok(None)
        }

        async fn neighbor(
            &self,
            _document_id: &str,
            _direction: Neighbor,
            _preview_ref: Option<&str>,
        ) -> Result<Option<NeighborPost>, ContentError> {
            Ok(None)
        }

        async fn resolve_document(
            &self,
            _document_id: &str,
            _preview_ref: &str,
        ) -> Result<Option<String>, ContentError> {
            Ok(None)
        }

        fn owns_token(&self, _token: &str) -> bool {
            true
        }
    }

    fn renderer(comments: Option<CommentsEmbed>) -> SiteRenderer {
        let feed = FeedService::new(Arc::new(EmptySource), FeedLimits::default());
        SiteRenderer::new(
            Arc::new(feed),
            SiteChrome {
                title: "Space Traveling".to_string(),
                timezone: chrono_tz::America::Sao_Paulo,
                comments,
            },
        )
    }

    fn props() -> PostProps {
        PostProps {
            post: Post {
                id: "YFzZgRIAACMAgGfQ".to_string(),
                uid: "como-utilizar-hooks".to_string(),
                first_publication_date: Some(datetime!(2021-03-15 19:25:28 UTC)),
                last_publication_date: Some(datetime!(2021-03-25 22:05:00 UTC)),
                title: "Como utilizar Hooks".to_string(),
                subtitle: "Pensando em sincronização".to_string(),
                banner_url: Some("https://images.prismic.io/banner.png".to_string()),
                author: "Joseph Oliveira".to_string(),
                content: vec![ContentBlock {
                    heading: "Proin et varius".to_string(),
                    body: vec![RichTextSpan::paragraph("Lorem ipsum dolor sit amet")],
                }],
            },
            prev_post: Some(NeighborPost {
                uid: "criando-um-app".to_string(),
                title: "Criando um app".to_string(),
            }),
            next_post: None,
            preview: true,
        }
    }

    #[test]
    fn load_more_href_encodes_token() {
        assert_eq!(
            load_more_href("https://cms.example/api/v2/documents/search?page=2&ref=x"),
            "/posts/more?page=https%3A%2F%2Fcms.example%2Fapi%2Fv2%2Fdocuments%2Fsearch%3Fpage%3D2%26ref%3Dx"
        );
    }

    #[test]
    fn load_more_href_drops_access_token() {
        let href = load_more_href(
            "https://cms.example/api/v2/documents/search?ref=x&access_token=secret&page=2",
        );
        assert!(!href.contains("secret"));
        assert!(!href.contains("access_token"));
        assert_eq!(
            href,
            "/posts/more?page=https%3A%2F%2Fcms.example%2Fapi%2Fv2%2Fdocuments%2Fsearch%3Fref%3Dx%26page%3D2"
        );

        assert_eq!(
            load_more_href("https://cms.example/next?access_token=secret"),
            "/posts/more?page=https%3A%2F%2Fcms.example%2Fnext"
        );
    }

    #[test]
    fn home_shows_loader_only_with_cursor() {
        let renderer = renderer(None);
        let with_more = renderer
            .render_home(&HomeProps {
                posts_pagination: PostPage {
                    next_page: Some("https://cms.example/next".to_string()),
                    results: Vec::new(),
                },
                preview: false,
            })
            .expect("render");
        assert!(with_more.contains("<title>Início | Space Traveling</title>"));
        assert!(with_more.contains("Carregar mais posts"));
        assert!(!with_more.contains("Sair do modo Preview"));

        let exhausted = renderer
            .render_home(&HomeProps {
                posts_pagination: PostPage::empty(),
                preview: true,
            })
            .expect("render");
        assert!(!exhausted.contains("Carregar mais posts"));
        assert!(exhausted.contains("Sair do modo Preview"));
    }

    #[test]
    fn post_page_shows_dates_reading_time_and_links() {
        let html = renderer(None).render_post(&props()).expect("render");

        assert!(html.contains("<title>Como utilizar Hooks | Space Traveling</title>"));
        assert!(html.contains("15 mar 2021"));
        assert!(html.contains("* editado em 25 mar 2021, às 19:05"));
        assert!(html.contains("1 min"));
        assert!(html.contains("<p>Lorem ipsum dolor sit amet</p>"));
        assert!(html.contains("href=\"/post/criando-um-app\""));
        assert!(html.contains("Post anterior"));
        assert!(!html.contains("Próximo post"));
        assert!(!html.contains("utteranc.es"));
    }

    #[test]
    fn post_page_embeds_comments_once() {
        let embed = CommentsEmbed {
            repo: "owner/repo".to_string(),
            issue_term: "pathname".to_string(),
            label: None,
            theme: "github-dark".to_string(),
        };
        let renderer = renderer(Some(embed));
        let html = renderer.render_post(&props()).expect("render");
        assert_eq!(html.matches("https://utteranc.es/client.js").count(), 1);

        let detail = renderer.post_detail(&props());
        assert!(!detail.comments.is_mounted());
        assert!(detail.comments.script().contains("repo=\"owner/repo\""));
        assert!(detail.comments.is_mounted());
        assert!(detail.comments.script().is_empty());
    }
}
