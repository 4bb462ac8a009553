use std::error::Error as StdError;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::{
    application::{feed::FeedError, pagination::PaginationError, site::RenderError},
    infra::error::InfraError,
};

#[derive(Debug, Clone)]
pub struct ErrorReport {
    pub source: &'static str,
    pub status: StatusCode,
    pub messages: Vec<String>,
}

impl ErrorReport {
    pub fn from_error(source: &'static str, status: StatusCode, error: &dyn StdError) -> Self {
        let mut messages = Vec::new();
        messages.push(error.to_string());
        let mut current = error.source();
        while let Some(inner) = current {
            messages.push(inner.to_string());
            current = inner.source();
        }
        Self {
            source,
            status,
            messages,
        }
    }

    pub fn from_message(
        source: &'static str,
        status: StatusCode,
        message: impl Into<String>,
    ) -> Self {
        Self {
            source,
            status,
            messages: vec![message.into()],
        }
    }

    pub fn attach(self, response: &mut Response) {
        response.extensions_mut().insert(self);
    }
}

#[derive(Debug)]
pub struct HttpError {
    status: StatusCode,
    public_message: &'static str,
    report: ErrorReport,
}

impl HttpError {
    pub fn new(
        source: &'static str,
        status: StatusCode,
        public_message: &'static str,
        detail: impl Into<String>,
    ) -> Self {
        let report = ErrorReport::from_message(source, status, detail);
        Self {
            status,
            public_message,
            report,
        }
    }

    pub fn from_error(
        source: &'static str,
        status: StatusCode,
        public_message: &'static str,
        error: &dyn StdError,
    ) -> Self {
        let report = ErrorReport::from_error(source, status, error);
        Self {
            status,
            public_message,
            report,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn into_report(self) -> ErrorReport {
        self.report
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let mut response = (self.status, self.public_message).into_response();
        self.report.attach(&mut response);
        response
    }
}

impl From<FeedError> for HttpError {
    fn from(error: FeedError) -> Self {
        const SOURCE: &str = "application::error::feed_error_to_http_error";
        match error {
            FeedError::Pagination(PaginationError::ForeignToken(token)) => HttpError::new(
                SOURCE,
                StatusCode::BAD_REQUEST,
                "Invalid page token",
                format!("Page token `{token}` does not point at the content source"),
            ),
            FeedError::Pagination(PaginationError::Exhausted) => HttpError::new(
                SOURCE,
                StatusCode::BAD_REQUEST,
                "No more posts",
                "Load more requested without a page token",
            ),
            FeedError::Pagination(PaginationError::InFlight) => HttpError::new(
                SOURCE,
                StatusCode::CONFLICT,
                "Posts are already loading",
                "Overlapping page fetch rejected",
            ),
            FeedError::Pagination(err @ PaginationError::Fetch(_)) => HttpError::from_error(
                SOURCE,
                StatusCode::BAD_GATEWAY,
                "Content source unavailable",
                &err,
            ),
            FeedError::Content(err) => HttpError::from_error(
                SOURCE,
                StatusCode::BAD_GATEWAY,
                "Content source unavailable",
                &err,
            ),
        }
    }
}

impl From<RenderError> for HttpError {
    fn from(error: RenderError) -> Self {
        match error {
            RenderError::Feed(err) => HttpError::from(err),
            RenderError::Template(err) => HttpError::from(err),
        }
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Infra(#[from] InfraError),
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error(transparent)]
    Feed(#[from] FeedError),
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl AppError {
    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::content::ContentError;

    #[test]
    fn report_collects_error_chain() {
        let error = PaginationError::Fetch(ContentError::Status {
            status: 503,
            body: "unavailable".to_string(),
        });
        let report = ErrorReport::from_error("test", StatusCode::BAD_GATEWAY, &error);
        assert_eq!(
            report.messages,
            [
                "failed to fetch the next page".to_string(),
                "content source responded with status 503: unavailable".to_string(),
            ]
        );
    }

    #[test]
    fn feed_errors_map_to_statuses() {
        let cases = [
            (
                FeedError::Pagination(PaginationError::ForeignToken("x".to_string())),
                StatusCode::BAD_REQUEST,
            ),
            (
                FeedError::Pagination(PaginationError::InFlight),
                StatusCode::CONFLICT,
            ),
            (
                FeedError::Content(ContentError::Transport("refused".to_string())),
                StatusCode::BAD_GATEWAY,
            ),
        ];

        for (error, status) in cases {
            let response = HttpError::from(error).into_response();
            assert_eq!(response.status(), status);
            let report = response.extensions().get::<ErrorReport>().expect("report");
            assert_eq!(report.status, status);
        }
    }
}
