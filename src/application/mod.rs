//! Application services: pagination, feed props and page rendering.

pub mod comments;
pub mod content;
pub mod error;
pub mod feed;
pub mod pagination;
pub mod prerender;
pub mod reading_time;
pub mod richtext;
pub mod site;
pub mod stream;
