//! Readable-text extraction from article HTML.

use crate::error::{Error, Result};
use readability::extractor;
use std::io::Cursor;
use url::Url;

/// Main body text of `html`, as served from `link`.
///
/// Navigation, ads and other boilerplate are dropped. An empty result is
/// reported as an error so callers can keep the text they already have.
pub fn extract_text(html: &[u8], link: &str) -> Result<String> {
    let url = Url::parse(link)?;
    let mut reader = Cursor::new(html);
    let product = extractor::extract(&mut reader, &url)
        .map_err(|e| Error::Extraction(format!("{e:?}")))?;

    let text = product.text.trim();
    if text.is_empty() {
        return Err(Error::Extraction("zero content".into()));
    }
    Ok(text.to_string())
}
