//! Rich-text to HTML conversion for post bodies.

use crate::domain::posts::{InlineKind, InlineSpan, RichTextSpan, SpanKind};

/// Escape text for use in HTML content and quoted attribute values.
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        push_escaped(&mut out, ch);
    }
    out
}

fn push_escaped(out: &mut String, ch: char) {
    match ch {
        '&' => out.push_str("&amp;"),
        '<' => out.push_str("&lt;"),
        '>' => out.push_str("&gt;"),
        '"' => out.push_str("&quot;"),
        '\'' => out.push_str("&#39;"),
        other => out.push(other),
    }
}

/// Render a block body. Consecutive list items share one `<ul>` or `<ol>`.
pub fn render_html(spans: &[RichTextSpan]) -> String {
    let mut out = String::new();
    let mut open_list: Option<&'static str> = None;

    for span in spans {
        let list = match span.kind {
            SpanKind::ListItem => Some("ul"),
            SpanKind::OListItem => Some("ol"),
            _ => None,
        };

        if open_list != list {
            if let Some(tag) = open_list.take() {
                close_tag(&mut out, tag);
            }
            if let Some(tag) = list {
                open_tag(&mut out, tag);
                open_list = Some(tag);
            }
        }

        let tag = block_tag(span.kind);
        open_tag(&mut out, tag);
        out.push_str(&render_inline(
            &span.text,
            &span.spans,
            span.kind == SpanKind::Preformatted,
        ));
        close_tag(&mut out, tag);
    }

    if let Some(tag) = open_list {
        close_tag(&mut out, tag);
    }
    out
}

fn block_tag(kind: SpanKind) -> &'static str {
    match kind {
        SpanKind::Paragraph => "p",
        SpanKind::Heading1 => "h1",
        SpanKind::Heading2 => "h2",
        SpanKind::Heading3 => "h3",
        SpanKind::Heading4 => "h4",
        SpanKind::Heading5 => "h5",
        SpanKind::Heading6 => "h6",
        SpanKind::Preformatted => "pre",
        SpanKind::ListItem | SpanKind::OListItem => "li",
    }
}

fn open_tag(out: &mut String, tag: &str) {
    out.push('<');
    out.push_str(tag);
    out.push('>');
}

fn close_tag(out: &mut String, tag: &str) {
    out.push_str("</");
    out.push_str(tag);
    out.push('>');
}

/// Apply inline ranges over `text`. Offsets count characters, not bytes.
///
/// Ranges are opened in start order, longest first. When a range ends while
/// ranges opened after it are still running, those are closed with it and
/// reopened right after, so every tag pair stays within its own range.
fn render_inline(text: &str, spans: &[InlineSpan], preformatted: bool) -> String {
    let chars: Vec<char> = text.chars().collect();
    let len = chars.len();

    let mut ordered: Vec<&InlineSpan> = spans
        .iter()
        .filter(|span| span.start < span.end && span.start < len)
        .collect();
    ordered.sort_by(|a, b| a.start.cmp(&b.start).then(b.end.cmp(&a.end)));
    let mut pending = ordered.into_iter().peekable();

    let mut out = String::with_capacity(text.len());
    let mut open: Vec<&InlineSpan> = Vec::new();

    for (index, ch) in chars.into_iter().enumerate() {
        if let Some(expired) = open.iter().position(|span| span.end <= index) {
            let closed = open.split_off(expired);
            for span in closed.iter().rev() {
                push_inline_close(&mut out, &span.kind);
            }
            for span in closed.into_iter().filter(|span| span.end > index) {
                push_inline_open(&mut out, &span.kind);
                open.push(span);
            }
        }
        while let Some(span) = pending.next_if(|span| span.start == index) {
            push_inline_open(&mut out, &span.kind);
            open.push(span);
        }
        if ch == '\n' && !preformatted {
            out.push_str("<br />");
        } else {
            push_escaped(&mut out, ch);
        }
    }

    while let Some(span) = open.pop() {
        push_inline_close(&mut out, &span.kind);
    }
    out
}

fn push_inline_open(out: &mut String, kind: &InlineKind) {
    match kind {
        InlineKind::Strong => out.push_str("<strong>"),
        InlineKind::Em => out.push_str("<em>"),
        InlineKind::Hyperlink { url } if is_safe_href(url) => {
            out.push_str("<a href=\"");
            out.push_str(&escape_html(url));
            out.push_str("\">");
        }
        InlineKind::Hyperlink { .. } => out.push_str("<span>"),
    }
}

fn push_inline_close(out: &mut String, kind: &InlineKind) {
    match kind {
        InlineKind::Strong => out.push_str("</strong>"),
        InlineKind::Em => out.push_str("</em>"),
        InlineKind::Hyperlink { url } if is_safe_href(url) => out.push_str("</a>"),
        InlineKind::Hyperlink { .. } => out.push_str("</span>"),
    }
}

fn is_safe_href(url: &str) -> bool {
    let lowered = url.trim().to_ascii_lowercase();
    lowered.starts_with("https://")
        || lowered.starts_with("http://")
        || lowered.starts_with("mailto:")
        || lowered.starts_with('/')
        || lowered.starts_with('#')
}
