//! Post records as delivered by the content source.

use serde::Serialize;
use time::OffsetDateTime;

/// Lightweight listing record for the home page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PostSummary {
    pub uid: String,
    #[serde(with = "time::serde::rfc3339::option")]
    pub first_publication_date: Option<OffsetDateTime>,
    pub title: String,
    pub subtitle: String,
    pub author: String,
}

/// One page of post summaries plus the continuation cursor.
///
/// `results` keeps the order chosen by the content source. `next_page` is the
/// opaque URL of the following page; `None` means the listing is exhausted.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct PostPage {
    pub next_page: Option<String>,
    pub results: Vec<PostSummary>,
}

impl PostPage {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn has_more(&self) -> bool {
        self.next_page.is_some()
    }
}

/// Block-level kind of a rich-text span.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SpanKind {
    #[default]
    Paragraph,
    Heading1,
    Heading2,
    Heading3,
    Heading4,
    Heading5,
    Heading6,
    Preformatted,
    ListItem,
    OListItem,
}

impl SpanKind {
    /// Maps the CMS label onto a kind. Unknown labels render as paragraphs.
    pub fn from_label(label: &str) -> Self {
        match label {
            "heading1" => Self::Heading1,
            "heading2" => Self::Heading2,
            "heading3" => Self::Heading3,
            "heading4" => Self::Heading4,
            "heading5" => Self::Heading5,
            "heading6" => Self::Heading6,
            "preformatted" => Self::Preformatted,
            "list-item" => Self::ListItem,
            "o-list-item" => Self::OListItem,
            _ => Self::Paragraph,
        }
    }
}

/// Inline formatting applied to a character range of a span.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum InlineKind {
    Strong,
    Em,
    Hyperlink { url: String },
}

/// Inline range expressed in characters, `start` inclusive and `end` exclusive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InlineSpan {
    pub start: usize,
    pub end: usize,
    pub kind: InlineKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct RichTextSpan {
    pub kind: SpanKind,
    pub text: String,
    pub spans: Vec<InlineSpan>,
}

impl RichTextSpan {
    pub fn paragraph(text: impl Into<String>) -> Self {
        Self {
            kind: SpanKind::Paragraph,
            text: text.into(),
            spans: Vec::new(),
        }
    }
}

/// One heading followed by its rich-text body.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct ContentBlock {
    pub heading: String,
    pub body: Vec<RichTextSpan>,
}

/// Full post record used by the detail page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Post {
    pub id: String,
    pub uid: String,
    #[serde(with = "time::serde::rfc3339::option")]
    pub first_publication_date: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_publication_date: Option<OffsetDateTime>,
    pub title: String,
    pub subtitle: String,
    pub banner_url: Option<String>,
    pub author: String,
    pub content: Vec<ContentBlock>,
}

/// Previous or next post link target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NeighborPost {
    pub uid: String,
    pub title: String,
}

/// Ordering direction for neighbour lookups by last publication date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Neighbor {
    Previous,
    Next,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn span_kind_labels_round_to_known_kinds() {
        assert_eq!(SpanKind::from_label("heading3"), SpanKind::Heading3);
        assert_eq!(SpanKind::from_label("o-list-item"), SpanKind::OListItem);
        assert_eq!(SpanKind::from_label("image"), SpanKind::Paragraph);
    }

    #[test]
    fn empty_page_has_no_more_results() {
        let page = PostPage::empty();
        assert!(!page.has_more());
        assert!(page.results.is_empty());
    }
}
