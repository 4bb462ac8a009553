use std::sync::Arc;

use axum::{
    Router,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode, header::CONTENT_TYPE},
    middleware,
    response::{Html, IntoResponse, Redirect, Response},
    routing::get,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::Deserialize;
use tracing::warn;

use crate::{
    application::{
        error::HttpError,
        feed::{FeedError, build_datastar_append_response, build_datastar_error_response},
        pagination::PaginationError,
        prerender::PrerenderedSite,
        site::{RenderError, SiteRenderer},
    },
    presentation::views::render_not_found_response,
};

use super::{
    DATASTAR_REQUEST_HEADER,
    middleware::{log_responses, set_request_context},
};

pub const PREVIEW_COOKIE: &str = "io.prismic.preview";

#[derive(Clone)]
pub struct HttpState {
    pub renderer: Arc<SiteRenderer>,
    pub site: Arc<PrerenderedSite>,
}

pub fn build_router(state: HttpState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/post/{slug}", get(post_detail))
        .route("/posts/more", get(posts_more))
        .route("/api/preview", get(preview))
        .route("/api/exit-preview", get(exit_preview))
        .route("/_health", get(health))
        .fallback(fallback)
        .with_state(state)
        .layer(middleware::from_fn(log_responses))
        .layer(middleware::from_fn(set_request_context))
}

fn preview_ref(jar: &CookieJar) -> Option<String> {
    jar.get(PREVIEW_COOKIE)
        .map(|cookie| cookie.value().trim().to_string())
        .filter(|value| !value.is_empty())
}

async fn index(State(state): State<HttpState>, jar: CookieJar) -> Response {
    match preview_ref(&jar) {
        Some(reference) => match state.renderer.home_page(Some(&reference)).await {
            Ok(html) => Html(html).into_response(),
            Err(err) => HttpError::from(err).into_response(),
        },
        None => Html(state.site.home().to_string()).into_response(),
    }
}

async fn post_detail(
    State(state): State<HttpState>,
    Path(slug): Path<String>,
    jar: CookieJar,
) -> Response {
    let preview = preview_ref(&jar);
    let rendered = match preview.as_deref() {
        Some(reference) => state.renderer.post_page(&slug, Some(reference)).await,
        None => state.site.post(&slug).await,
    };

    match rendered {
        Ok(Some(html)) => Html(html).into_response(),
        Ok(None) => render_not_found_response(state.renderer.layout_chrome(preview.is_some())),
        Err(err) => HttpError::from(err).into_response(),
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct MoreQuery {
    page: Option<String>,
}

async fn posts_more(
    State(state): State<HttpState>,
    headers: HeaderMap,
    Query(query): Query<MoreQuery>,
) -> Response {
    let is_datastar = headers.contains_key(DATASTAR_REQUEST_HEADER);
    let Some(token) = query.page.filter(|token| !token.trim().is_empty()) else {
        return HttpError::from(FeedError::from(PaginationError::Exhausted)).into_response();
    };

    match state.renderer.append_payload(&token).await {
        Ok(payload) if is_datastar => build_datastar_append_response(payload),
        Ok(payload) => {
            let mut html = payload.cards_html.unwrap_or_default();
            html.push_str(&payload.loader_html);
            (
                StatusCode::OK,
                [(CONTENT_TYPE, "text/html; charset=utf-8")],
                html,
            )
                .into_response()
        }
        Err(err) if is_datastar => load_more_failure_stream(&state.renderer, &token, err),
        Err(err) => HttpError::from(err).into_response(),
    }
}

/// The listing stays as it was; the loader keeps the same cursor for a retry.
fn load_more_failure_stream(renderer: &SiteRenderer, token: &str, err: RenderError) -> Response {
    let http_error = HttpError::from(err);
    let retry_token = match http_error.status() {
        StatusCode::BAD_REQUEST => None,
        _ => Some(token),
    };

    let loader_html = match renderer.render_loader(
        retry_token,
        Some("Não foi possível carregar mais posts. Tente novamente."),
    ) {
        Ok(html) => html,
        Err(err) => return HttpError::from(err).into_response(),
    };

    let report = http_error.into_report();
    warn!(
        target = "spacetraveling::http::response",
        status = report.status.as_u16(),
        source = report.source,
        chain = ?report.messages,
        "load more failed",
    );

    let mut response = build_datastar_error_response(loader_html);
    report.attach(&mut response);
    response
}

#[derive(Debug, Deserialize)]
struct PreviewQuery {
    token: String,
    #[serde(rename = "documentId")]
    document_id: String,
}

async fn preview(
    State(state): State<HttpState>,
    jar: CookieJar,
    Query(query): Query<PreviewQuery>,
) -> Response {
    let location = match state
        .renderer
        .feed()
        .preview_location(&query.document_id, &query.token)
        .await
    {
        Ok(location) => location,
        Err(err) => return HttpError::from(err).into_response(),
    };

    let cookie = Cookie::build((PREVIEW_COOKIE, query.token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax);

    (jar.add(cookie), Redirect::temporary(&location)).into_response()
}

async fn exit_preview(jar: CookieJar) -> Response {
    let cookie = Cookie::build((PREVIEW_COOKIE, "")).path("/");
    (jar.remove(cookie), Redirect::temporary("/")).into_response()
}

async fn health() -> StatusCode {
    StatusCode::NO_CONTENT
}

async fn fallback(State(state): State<HttpState>, jar: CookieJar) -> Response {
    render_not_found_response(state.renderer.layout_chrome(preview_ref(&jar).is_some()))
}
