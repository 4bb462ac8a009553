//! Pages rendered ahead of requests.
//!
//! The home page and the static paths are rendered once at startup. Post uids
//! outside that set are rendered on first request and kept from then on.

use std::sync::Arc;

use dashmap::DashMap;
use tracing::{info, warn};

use crate::application::site::{RenderError, SiteRenderer};

pub struct PrerenderedSite {
    renderer: Arc<SiteRenderer>,
    home: String,
    posts: DashMap<String, String>,
}

impl PrerenderedSite {
    /// Fetch and render the startup snapshot. Any fetch failure aborts the build.
    pub async fn build(renderer: Arc<SiteRenderer>) -> Result<Self, RenderError> {
        let home = renderer.home_page(None).await?;
        let posts = DashMap::new();

        let paths = renderer.feed().static_paths().await?;
        for uid in paths {
            match renderer.post_page(&uid, None).await? {
                Some(html) => {
                    posts.insert(uid, html);
                }
                None => warn!(
                    target = "spacetraveling::application::prerender",
                    uid = %uid,
                    "listed post could not be loaded"
                ),
            }
        }

        info!(
            target = "spacetraveling::application::prerender",
            posts = posts.len(),
            "site prerendered"
        );

        Ok(Self {
            renderer,
            home,
            posts,
        })
    }

    pub fn home(&self) -> &str {
        &self.home
    }

    pub fn is_prerendered(&self, uid: &str) -> bool {
        self.posts.contains_key(uid)
    }

    pub fn len(&self) -> usize {
        self.posts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.posts.is_empty()
    }

    /// Stored page for `uid`, rendering and storing it on a miss.
    pub async fn post(&self, uid: &str) -> Result<Option<String>, RenderError> {
        if let Some(html) = self.posts.get(uid) {
            metrics::counter!("spacetraveling_prerender_hits_total").increment(1);
            return Ok(Some(html.value().clone()));
        }

        metrics::counter!("spacetraveling_prerender_misses_total").increment(1);
        let Some(html) = self.renderer.post_page(uid, None).await? else {
            return Ok(None);
        };
        info!(
            target = "spacetraveling::application::prerender",
            uid = %uid,
            "fallback page rendered"
        );
        self.posts.insert(uid.to_string(), html.clone());
        Ok(Some(html))
    }
}
