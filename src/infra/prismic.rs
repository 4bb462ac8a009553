//! Prismic REST API v2 adapter for [`ContentSource`].

use std::time::Instant;

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::{Deserialize, de::DeserializeOwned};
use tracing::{debug, warn};

use crate::{
    application::content::{ACCESS_TOKEN_PARAM, ContentError, ContentSource, PageFetcher},
    domain::{
        dates,
        posts::{
            ContentBlock, InlineKind, InlineSpan, Neighbor, NeighborPost, Post, PostPage,
            PostSummary, RichTextSpan, SpanKind,
        },
    },
};

const POSTS_QUERY: &str = r#"[[at(document.type, "posts")]]"#;
const ORDER_BY_LAST_PUBLICATION_DESC: &str = "[document.last_publication_date desc]";
const ORDER_BY_LAST_PUBLICATION_ASC: &str = "[document.last_publication_date]";

#[derive(Clone, Debug)]
pub struct PrismicClient {
    client: Client,
    endpoint: Url,
    access_token: Option<String>,
}

impl PrismicClient {
    pub fn new(endpoint: Url, access_token: Option<String>) -> Result<Self, ContentError> {
        let client = Client::builder()
            .user_agent(Self::user_agent())
            .build()
            .map_err(ContentError::transport)?;
        Ok(Self {
            client,
            endpoint,
            access_token,
        })
    }

    pub fn user_agent() -> &'static str {
        concat!("spacetraveling/", env!("CARGO_PKG_VERSION"))
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    fn search_url(&self, reference: &str, params: &[(&str, String)]) -> Result<Url, ContentError> {
        let mut url = self.endpoint.clone();
        url.set_query(None);
        url.path_segments_mut()
            .map_err(|()| {
                ContentError::InvalidRequest(format!(
                    "endpoint `{}` cannot carry a path",
                    self.endpoint
                ))
            })?
            .pop_if_empty()
            .push("documents")
            .push("search");

        {
            let mut query = url.query_pairs_mut();
            query.append_pair("ref", reference);
            for (key, value) in params {
                query.append_pair(key, value);
            }
            if let Some(token) = self.access_token.as_deref() {
                query.append_pair(ACCESS_TOKEN_PARAM, token);
            }
        }
        Ok(url)
    }

    async fn master_ref(&self) -> Result<String, ContentError> {
        let mut url = self.endpoint.clone();
        if let Some(token) = self.access_token.as_deref() {
            url.query_pairs_mut().append_pair(ACCESS_TOKEN_PARAM, token);
        }

        let root: ApiRoot = self.get_json(url, "api_root").await?;
        root.refs
            .into_iter()
            .find(|entry| entry.is_master_ref)
            .map(|entry| entry.reference)
            .ok_or_else(|| ContentError::Decode("API root lists no master ref".to_string()))
    }

    async fn resolve_ref(&self, preview_ref: Option<&str>) -> Result<String, ContentError> {
        match preview_ref {
            Some(reference) => Ok(reference.to_string()),
            None => self.master_ref().await,
        }
    }

    async fn search<T: DeserializeOwned>(
        &self,
        preview_ref: Option<&str>,
        params: &[(&str, String)],
        operation: &'static str,
    ) -> Result<SearchResponse<T>, ContentError> {
        let reference = self.resolve_ref(preview_ref).await?;
        let url = self.search_url(&reference, params)?;
        self.get_json(url, operation).await
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: Url,
        operation: &'static str,
    ) -> Result<T, ContentError> {
        metrics::counter!("spacetraveling_content_requests_total", "operation" => operation)
            .increment(1);
        let started = Instant::now();

        let result = self.send(url, operation).await;

        metrics::histogram!("spacetraveling_content_request_ms", "operation" => operation)
            .record(started.elapsed().as_secs_f64() * 1000.0);
        if let Err(err) = &result {
            metrics::counter!("spacetraveling_content_failures_total", "operation" => operation)
                .increment(1);
            warn!(
                target = "spacetraveling::infra::prismic",
                operation,
                error = %err,
                "content request failed"
            );
        }
        result
    }

    async fn send<T: DeserializeOwned>(
        &self,
        url: Url,
        operation: &'static str,
    ) -> Result<T, ContentError> {
        debug!(
            target = "spacetraveling::infra::prismic",
            operation,
            path = url.path(),
            "content request"
        );

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(ContentError::transport)?;
        let status = response.status();
        let bytes = response.bytes().await.map_err(ContentError::transport)?;
        if !status.is_success() {
            return Err(ContentError::Status {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&bytes).into_owned(),
            });
        }
        serde_json::from_slice(&bytes).map_err(ContentError::decode)
    }
}

#[async_trait]
impl PageFetcher for PrismicClient {
    async fn fetch_page(&self, next_page: &str) -> Result<PostPage, ContentError> {
        let mut url = Url::parse(next_page)
            .map_err(|err| ContentError::InvalidRequest(format!("bad page token: {err}")))?;
        // Page links reach the browser without the credential.
        if let Some(token) = self.access_token.as_deref() {
            let has_token = url.query_pairs().any(|(key, _)| key == ACCESS_TOKEN_PARAM);
            if !has_token && url.origin() == self.endpoint.origin() {
                url.query_pairs_mut().append_pair(ACCESS_TOKEN_PARAM, token);
            }
        }
        let response: SearchResponse<SummaryData> = self.get_json(url, "next_page").await?;
        response.into_post_page()
    }
}

#[async_trait]
impl ContentSource for PrismicClient {
    async fn query_posts(
        &self,
        page_size: u32,
        preview_ref: Option<&str>,
    ) -> Result<PostPage, ContentError> {
        let params = [
            ("q", POSTS_QUERY.to_string()),
            ("pageSize", page_size.to_string()),
        ];
        let response: SearchResponse<SummaryData> =
            self.search(preview_ref, &params, "query_posts").await?;
        response.into_post_page()
    }

    async fn post_by_uid(
        &self,
        uid: &str,
        preview_ref: Option<&str>,
    ) -> Result<Option<Post>, ContentError> {
        if !is_valid_uid(uid) {
            return Ok(None);
        }

        let params = [
            ("q", format!(r#"[[at(my.posts.uid, "{uid}")]]"#)),
            ("pageSize", "1".to_string()),
        ];
        let response: SearchResponse<PostData> =
            self.search(preview_ref, &params, "post_by_uid").await?;
        response
            .results
            .into_iter()
            .next()
            .map(Document::into_post)
            .transpose()
    }

    async fn neighbor(
        &self,
        document_id: &str,
        direction: Neighbor,
        preview_ref: Option<&str>,
    ) -> Result<Option<NeighborPost>, ContentError> {
        let orderings = match direction {
            Neighbor::Previous => ORDER_BY_LAST_PUBLICATION_DESC,
            Neighbor::Next => ORDER_BY_LAST_PUBLICATION_ASC,
        };
        let params = [
            ("q", POSTS_QUERY.to_string()),
            ("pageSize", "1".to_string()),
            ("after", document_id.to_string()),
            ("orderings", orderings.to_string()),
        ];
        let response: SearchResponse<SummaryData> =
            self.search(preview_ref, &params, "neighbor").await?;
        Ok(response
            .results
            .into_iter()
            .next()
            .map(|document| NeighborPost {
                uid: document.uid.unwrap_or_default(),
                title: document.data.title.unwrap_or_default(),
            }))
    }

    async fn resolve_document(
        &self,
        document_id: &str,
        preview_ref: &str,
    ) -> Result<Option<String>, ContentError> {
        if !is_valid_uid(document_id) {
            return Ok(None);
        }
        let params = [
            ("q", format!(r#"[[at(document.id, "{document_id}")]]"#)),
            ("pageSize", "1".to_string()),
        ];
        let response: SearchResponse<serde_json::Value> = self
            .search(Some(preview_ref), &params, "resolve_document")
            .await?;
        Ok(response
            .results
            .into_iter()
            .next()
            .and_then(|document| document.uid))
    }

    fn owns_token(&self, token: &str) -> bool {
        Url::parse(token).is_ok_and(|url| url.origin() == self.endpoint.origin())
    }
}

/// Uids and document ids are slugs; anything else would break out of the query string.
fn is_valid_uid(value: &str) -> bool {
    !value.is_empty()
        && value
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || ch == '-' || ch == '_')
}

#[derive(Debug, Deserialize)]
struct ApiRoot {
    #[serde(default)]
    refs: Vec<ApiRef>,
}

#[derive(Debug, Deserialize)]
struct ApiRef {
    #[serde(rename = "ref")]
    reference: String,
    #[serde(rename = "isMasterRef", default)]
    is_master_ref: bool,
}

#[derive(Debug, Deserialize)]
struct SearchResponse<T> {
    next_page: Option<String>,
    results: Vec<Document<T>>,
}

impl SearchResponse<SummaryData> {
    fn into_post_page(self) -> Result<PostPage, ContentError> {
        let results = self
            .results
            .into_iter()
            .map(Document::into_summary)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(PostPage {
            next_page: self.next_page,
            results,
        })
    }
}

#[derive(Debug, Deserialize)]
struct Document<T> {
    id: String,
    uid: Option<String>,
    first_publication_date: Option<String>,
    last_publication_date: Option<String>,
    data: T,
}

#[derive(Debug, Deserialize)]
struct SummaryData {
    title: Option<String>,
    subtitle: Option<String>,
    author: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PostData {
    title: Option<String>,
    subtitle: Option<String>,
    author: Option<String>,
    banner: Option<BannerData>,
    #[serde(default)]
    content: Vec<ContentData>,
}

#[derive(Debug, Deserialize)]
struct BannerData {
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ContentData {
    heading: Option<String>,
    #[serde(default)]
    body: Vec<SpanData>,
}

#[derive(Debug, Deserialize)]
struct SpanData {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    text: String,
    #[serde(default)]
    spans: Vec<InlineData>,
}

#[derive(Debug, Deserialize)]
struct InlineData {
    start: usize,
    end: usize,
    #[serde(rename = "type")]
    kind: String,
    data: Option<LinkData>,
}

#[derive(Debug, Deserialize)]
struct LinkData {
    url: Option<String>,
}

fn parse_date(raw: Option<String>) -> Result<Option<time::OffsetDateTime>, ContentError> {
    raw.filter(|value| !value.trim().is_empty())
        .map(|value| dates::parse_cms_timestamp(&value).map_err(ContentError::decode))
        .transpose()
}

impl Document<SummaryData> {
    fn into_summary(self) -> Result<PostSummary, ContentError> {
        Ok(PostSummary {
            uid: self.uid.unwrap_or(self.id),
            first_publication_date: parse_date(self.first_publication_date)?,
            title: self.data.title.unwrap_or_default(),
            subtitle: self.data.subtitle.unwrap_or_default(),
            author: self.data.author.unwrap_or_default(),
        })
    }
}

impl Document<PostData> {
    fn into_post(self) -> Result<Post, ContentError> {
        let data = self.data;
        Ok(Post {
            uid: self.uid.unwrap_or_else(|| self.id.clone()),
            id: self.id,
            first_publication_date: parse_date(self.first_publication_date)?,
            last_publication_date: parse_date(self.last_publication_date)?,
            title: data.title.unwrap_or_default(),
            subtitle: data.subtitle.unwrap_or_default(),
            banner_url: data.banner.and_then(|banner| banner.url),
            author: data.author.unwrap_or_default(),
            content: data
                .content
                .into_iter()
                .map(|block| ContentBlock {
                    heading: block.heading.unwrap_or_default(),
                    body: block.body.into_iter().map(SpanData::into_span).collect(),
                })
                .collect(),
        })
    }
}

impl SpanData {
    fn into_span(self) -> RichTextSpan {
        RichTextSpan {
            kind: SpanKind::from_label(&self.kind),
            text: self.text,
            spans: self
                .spans
                .into_iter()
                .filter_map(InlineData::into_inline)
                .collect(),
        }
    }
}

impl InlineData {
    /// Unknown inline kinds are dropped; their text still renders.
    fn into_inline(self) -> Option<InlineSpan> {
        let kind = match self.kind.as_str() {
            "strong" => InlineKind::Strong,
            "em" => InlineKind::Em,
            "hyperlink" => InlineKind::Hyperlink {
                url: self.data.and_then(|data| data.url)?,
            },
            _ => return None,
        };
        Some(InlineSpan {
            start: self.start,
            end: self.end,
            kind,
        })
    }
}
