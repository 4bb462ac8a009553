use crate::application::{
    comments::{CommentsEmbed, MountSlot},
    error::{ErrorReport, HttpError},
};
use askama::{Error as AskamaError, Template};
use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use thiserror::Error;

#[derive(Debug, Error)]
#[error("{public_message}")]
pub struct TemplateRenderError {
    pub(crate) source: &'static str,
    pub(crate) public_message: &'static str,
    #[source]
    pub(crate) error: AskamaError,
}

impl TemplateRenderError {
    pub fn new(source: &'static str, public_message: &'static str, error: AskamaError) -> Self {
        Self {
            source,
            public_message,
            error,
        }
    }
}

impl From<TemplateRenderError> for HttpError {
    fn from(err: TemplateRenderError) -> Self {
        let TemplateRenderError {
            source,
            public_message,
            error,
        } = err;

        HttpError::from_error(
            source,
            StatusCode::INTERNAL_SERVER_ERROR,
            public_message,
            &error,
        )
    }
}

/// Render `template` to a string, tagging failures with `source`.
pub fn render_fragment<T: Template>(
    template: &T,
    source: &'static str,
) -> Result<String, TemplateRenderError> {
    template
        .render()
        .map_err(|err| TemplateRenderError::new(source, "Template rendering failed", err))
}

pub fn render_template<T: Template>(template: T) -> Result<Html<String>, HttpError> {
    render_fragment(&template, "presentation::views::render_template")
        .map(Html)
        .map_err(HttpError::from)
}

pub fn render_template_response<T: Template>(template: T, status: StatusCode) -> Response {
    match render_template(template) {
        Ok(html) => (status, html).into_response(),
        Err(err) => err.into_response(),
    }
}

pub fn render_not_found_response(chrome: LayoutChrome) -> Response {
    let content = ErrorPageView::not_found();
    let view = LayoutContext::new(chrome.with_title_prefix(&content.title), content);
    let mut response = render_template_response(ErrorTemplate { view }, StatusCode::NOT_FOUND);
    ErrorReport::from_message(
        "presentation::views::render_not_found_response",
        StatusCode::NOT_FOUND,
        "Resource not found",
    )
    .attach(&mut response);
    response
}

#[derive(Clone)]
pub struct BrandView {
    pub title: String,
    pub href: String,
}

#[derive(Clone)]
pub struct PageMetaView {
    pub title: String,
}

/// Page frame shared by every full-page template.
#[derive(Clone)]
pub struct LayoutChrome {
    pub brand: BrandView,
    pub meta: PageMetaView,
    pub preview: bool,
}

impl LayoutChrome {
    /// `<prefix> | <site title>`
    pub fn with_title_prefix(self, prefix: &str) -> Self {
        let title = format!("{prefix} | {}", self.brand.title);
        Self {
            meta: PageMetaView { title },
            ..self
        }
    }
}

#[derive(Clone)]
pub struct LayoutContext<T> {
    pub brand: BrandView,
    pub meta: PageMetaView,
    pub preview: bool,
    pub content: T,
}

impl<T> LayoutContext<T> {
    pub fn new(chrome: LayoutChrome, content: T) -> Self {
        Self {
            brand: chrome.brand,
            meta: chrome.meta,
            preview: chrome.preview,
            content,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PostCard {
    pub uid: String,
    pub title: String,
    pub subtitle: String,
    pub author: String,
    pub published: String,
    pub iso_date: String,
}

pub struct HomeView {
    pub cards_html: String,
    pub loader_html: String,
}

#[derive(Template)]
#[template(path = "index.html")]
pub struct IndexTemplate {
    pub view: LayoutContext<HomeView>,
}

#[derive(Template)]
#[template(path = "partials/post_cards.html")]
pub struct PostCardsTemplate {
    pub posts: Vec<PostCard>,
}

/// Load-more affordance. Hidden when the listing is exhausted.
pub struct FeedLoaderView {
    pub has_more: bool,
    pub href: String,
    pub error: String,
}

#[derive(Template)]
#[template(path = "partials/feed_loader.html")]
pub struct FeedLoaderTemplate {
    pub view: FeedLoaderView,
}

pub struct ContentBlockView {
    pub heading: String,
    pub body_html: String,
}

pub struct NeighborLinkView {
    pub href: String,
    pub title: String,
    pub label: &'static str,
    pub class: &'static str,
}

pub struct PostDetailView {
    pub uid: String,
    pub title: String,
    pub banner_url: String,
    pub author: String,
    pub published: String,
    pub iso_date: String,
    pub edited: String,
    pub reading_minutes: u32,
    pub blocks: Vec<ContentBlockView>,
    pub neighbors: Vec<NeighborLinkView>,
    pub comments: CommentsView,
}

/// Comments widget mounted at most once per rendered page.
pub struct CommentsView {
    embed: Option<CommentsEmbed>,
    slot: MountSlot,
}

impl CommentsView {
    pub fn new(embed: Option<CommentsEmbed>) -> Self {
        Self {
            embed,
            slot: MountSlot::new(),
        }
    }

    /// Script tag on the first call, empty afterwards or when comments are off.
    pub fn script(&self) -> String {
        self.embed
            .as_ref()
            .and_then(|embed| embed.attach(&self.slot))
            .unwrap_or_default()
    }

    pub fn is_mounted(&self) -> bool {
        self.slot.is_mounted()
    }
}

#[derive(Template)]
#[template(path = "post.html")]
pub struct PostTemplate {
    pub view: LayoutContext<PostDetailView>,
}

pub struct ErrorPageView {
    pub title: String,
    pub message: String,
    pub actions: Vec<ErrorAction>,
}

impl ErrorPageView {
    pub fn not_found() -> Self {
        Self {
            title: "Página não encontrada".to_string(),
            message: "O conteúdo que você procura não existe ou foi removido.".to_string(),
            actions: vec![ErrorAction::home()],
        }
    }
}

pub struct ErrorAction {
    pub href: String,
    pub label: String,
}

impl ErrorAction {
    pub fn home() -> Self {
        Self {
            href: "/".to_string(),
            label: "Voltar para o início".to_string(),
        }
    }
}

#[derive(Template)]
#[template(path = "error.html")]
pub struct ErrorTemplate {
    pub view: LayoutContext<ErrorPageView>,
}
