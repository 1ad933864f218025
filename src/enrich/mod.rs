//! Best-effort improvement of an article's body text.
//!
//! Feed `content` fields are often empty, a copy of the description, or a
//! teaser. The [`Enricher`] discards those and, when nothing usable is
//! left, downloads the article page and runs readability over it. Every
//! failure along the way is logged and the article continues with what it
//! had.

pub mod extractor;
pub mod fetcher;

use crate::models::Article;
use crate::utils::truncate_for_log;
use tracing::{debug, instrument, warn};

pub use extractor::extract_text;
pub use fetcher::{HttpPageFetcher, PageFetcher};

/// Descriptions longer than this are body text, not a summary.
pub const MAX_DESCRIPTION_LEN: usize = 1000;
/// Content shorter than this is a teaser.
pub const MIN_CONTENT_LEN: usize = 300;

/// Apply the cleanup heuristics and report whether the page should be fetched.
fn clean(article: &mut Article) -> bool {
    let provisional_len = if article.content.is_empty() {
        article.description.chars().count()
    } else {
        article.content.chars().count()
    };

    let duplicate =
        !article.content.is_empty() && article.content.trim() == article.description.trim();

    if article.description.chars().count() > MAX_DESCRIPTION_LEN {
        article.description.clear();
    }
    if duplicate || provisional_len < MIN_CONTENT_LEN {
        article.content.clear();
    }

    article.content.is_empty()
}

#[derive(Debug, Clone)]
pub struct Enricher<F> {
    fetcher: F,
    always_fetch: bool,
}

impl<F: PageFetcher> Enricher<F> {
    pub fn new(fetcher: F, always_fetch: bool) -> Self {
        Self { fetcher, always_fetch }
    }

    #[instrument(level = "debug", skip_all, fields(link = %article.link))]
    pub async fn enrich(&self, mut article: Article) -> Article {
        let needs_fetch = clean(&mut article) || self.always_fetch;
        if !needs_fetch {
            return article;
        }

        let html = match self.fetcher.fetch_page(&article.link).await {
            Ok(html) => html,
            Err(e) => {
                warn!(title = %article.title, error = %e, "Failed to fetch article page");
                return article;
            }
        };

        match extract_text(&html, &article.link) {
            Ok(text) => {
                debug!(
                    chars = text.chars().count(),
                    preview = %truncate_for_log(&text, 80),
                    "Extracted article text"
                );
                article.content = text;
                debug!("Enriched article\n{article}");
            }
            Err(e) => warn!(title = %article.title, error = %e, "Failed to enrich article"),
        }
        article
    }
}
