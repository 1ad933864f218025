//! RSS and Atom parsing with `feed-rs`.

use crate::error::Result;
use chrono::{DateTime, Utc};
use feed_rs::model::Entry;
use feed_rs::parser;

/// Some vendors publish dates such as `Mar 5, 2025 14:30:00-0500`.
const VENDOR_DATE_FORMAT: &str = "%b %d, %Y %H:%M:%S%z";

/// One item of a feed document, before watermark filtering.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedEntry {
    pub title: String,
    pub description: String,
    pub link: String,
    pub content: String,
    pub categories: Vec<String>,
    /// `None` when no supported date format matched.
    pub published: Option<DateTime<Utc>>,
}

/// Parse a vendor-format publish date. Every standard format is left to
/// `feed-rs`.
pub fn parse_vendor_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_str(raw.trim(), VENDOR_DATE_FORMAT)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

fn to_entry(entry: Entry) -> FeedEntry {
    FeedEntry {
        title: entry.title.map(|t| t.content).unwrap_or_default(),
        description: entry.summary.map(|t| t.content).unwrap_or_default(),
        link: entry
            .links
            .into_iter()
            .next()
            .map(|l| l.href)
            .unwrap_or_default(),
        content: entry.content.and_then(|c| c.body).unwrap_or_default(),
        categories: entry
            .categories
            .into_iter()
            .map(|c| c.label.unwrap_or(c.term))
            .collect(),
        published: entry.published.or(entry.updated),
    }
}

/// Parse a feed document into entries, in document order.
///
/// Dates go through `feed-rs`'s lenient parser first. Entries it leaves
/// undated get a second chance with [`parse_vendor_timestamp`].
pub fn parse_feed(bytes: &[u8]) -> Result<Vec<FeedEntry>> {
    let feed = parser::parse(bytes)?;
    let mut entries: Vec<FeedEntry> = feed.entries.into_iter().map(to_entry).collect();

    if entries.iter().any(|e| e.published.is_none()) {
        let vendor = parser::Builder::new()
            .timestamp_parser(parse_vendor_timestamp)
            .build()
            .parse(bytes)?;
        for (entry, dated) in entries.iter_mut().zip(vendor.entries) {
            if entry.published.is_none() {
                entry.published = dated.published.or(dated.updated);
            }
        }
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const RSS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:content="http://purl.org/rss/1.0/modules/content/">
<channel>
  <title>Security Blog</title>
  <link>https://blog.example.com</link>
  <description>Posts</description>
  <item>
    <title>Critical patch released</title>
    <link>https://blog.example.com/patch</link>
    <description>Vendor fixes RCE</description>
    <content:encoded><![CDATA[<p>Full body of the post.</p>]]></content:encoded>
    <category>Vulnerabilities</category>
    <pubDate>Tue, 04 Mar 2025 10:00:00 GMT</pubDate>
  </item>
  <item>
    <title>Threat report</title>
    <link>https://blog.example.com/report</link>
    <description>Quarterly numbers</description>
    <pubDate>Mar 5, 2025 14:30:00-0500</pubDate>
  </item>
  <item>
    <title>Undated post</title>
    <link>https://blog.example.com/undated</link>
    <pubDate>sometime last week</pubDate>
  </item>
</channel>
</rss>"#;

    const ATOM: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>Research</title>
  <id>urn:uuid:60a76c80-d399-11d9-b93C-0003939e0af6</id>
  <updated>2025-03-06T08:00:00Z</updated>
  <entry>
    <title>New botnet</title>
    <link href="https://research.example.com/botnet"/>
    <id>urn:uuid:1225c695-cfb8-4ebb-aaaa-80da344efa6a</id>
    <published>2025-03-06T07:15:00+01:00</published>
    <updated>2025-03-06T08:00:00Z</updated>
    <summary>Botnet targets routers</summary>
  </entry>
  <entry>
    <title>Updated only</title>
    <link href="https://research.example.com/updated"/>
    <id>urn:uuid:1225c695-cfb8-4ebb-bbbb-80da344efa6a</id>
    <updated>2025-03-06T09:00:00Z</updated>
  </entry>
</feed>"#;

    #[test]
    fn test_parse_rss_entries() {
        let entries = parse_feed(RSS.as_bytes()).unwrap();
        assert_eq!(entries.len(), 3);

        let first = &entries[0];
        assert_eq!(first.title, "Critical patch released");
        assert_eq!(first.link, "https://blog.example.com/patch");
        assert_eq!(first.description, "Vendor fixes RCE");
        assert!(first.content.contains("Full body of the post."));
        assert_eq!(first.categories, vec!["Vulnerabilities".to_string()]);
        assert_eq!(
            first.published,
            Some(Utc.with_ymd_and_hms(2025, 3, 4, 10, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_vendor_date_fallback() {
        let entries = parse_feed(RSS.as_bytes()).unwrap();
        assert_eq!(
            entries[1].published,
            Some(Utc.with_ymd_and_hms(2025, 3, 5, 19, 30, 0).unwrap())
        );
        assert!(entries[1].content.is_empty());
    }

    #[test]
    fn test_unparseable_date_is_none() {
        let entries = parse_feed(RSS.as_bytes()).unwrap();
        assert_eq!(entries[2].title, "Undated post");
        assert_eq!(entries[2].published, None);
    }

    #[test]
    fn test_parse_atom_entries() {
        let entries = parse_feed(ATOM.as_bytes()).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].link, "https://research.example.com/botnet");
        assert_eq!(entries[0].description, "Botnet targets routers");
        assert_eq!(
            entries[0].published,
            Some(Utc.with_ymd_and_hms(2025, 3, 6, 6, 15, 0).unwrap())
        );
        assert_eq!(
            entries[1].published,
            Some(Utc.with_ymd_and_hms(2025, 3, 6, 9, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_vendor_timestamp_format() {
        let expected = Utc.with_ymd_and_hms(2025, 1, 2, 3, 4, 5).unwrap();
        assert_eq!(parse_vendor_timestamp("Jan 2, 2025 03:04:05+0000"), Some(expected));
        assert_eq!(parse_vendor_timestamp(" Jan 02, 2025 03:04:05+0000 "), Some(expected));
        assert_eq!(parse_vendor_timestamp("Thu, 02 Jan 2025 03:04:05 +0000"), None);
        assert_eq!(parse_vendor_timestamp("yesterday"), None);
    }

    fn rss_with_dates(dates: &[&str]) -> String {
        let items: String = dates
            .iter()
            .enumerate()
            .map(|(i, d)| {
                format!(
                    "<item><title>Post {i}</title><link>https://blog.example.com/{i}</link>\
                     <pubDate>{d}</pubDate></item>"
                )
            })
            .collect();
        let head = r#"<?xml version="1.0"?><rss version="2.0">"#;
        format!("{head}<channel><title>t</title>{items}</channel></rss>")
    }

    #[test]
    fn test_lenient_dates_are_kept() {
        let doc = rss_with_dates(&[
            "Wed, 25 Aug 2012 03:25:42 GMT",
            "Mon, 01 Jan 2024 00:00:00 UTC",
            "2014-12-29T14:53:35+0200",
            "2 September 2019 20:00:00 +0000",
        ]);
        let entries = parse_feed(doc.as_bytes()).unwrap();
        let published: Vec<_> = entries.iter().map(|e| e.published).collect();

        assert_eq!(
            published,
            vec![
                Some(Utc.with_ymd_and_hms(2012, 8, 25, 3, 25, 42).unwrap()),
                Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()),
                Some(Utc.with_ymd_and_hms(2014, 12, 29, 12, 53, 35).unwrap()),
                Some(Utc.with_ymd_and_hms(2019, 9, 2, 20, 0, 0).unwrap()),
            ]
        );
    }

    #[test]
    fn test_vendor_fallback_only_fills_gaps() {
        let doc = rss_with_dates(&[
            "Tue, 04 Mar 2025 10:00:00 GMT",
            "Mar 5, 2025 14:30:00-0500",
            "soon",
        ]);
        let entries = parse_feed(doc.as_bytes()).unwrap();

        assert_eq!(
            entries[0].published,
            Some(Utc.with_ymd_and_hms(2025, 3, 4, 10, 0, 0).unwrap())
        );
        assert_eq!(
            entries[1].published,
            Some(Utc.with_ymd_and_hms(2025, 3, 5, 19, 30, 0).unwrap())
        );
        assert_eq!(entries[2].published, None);
    }

    #[test]
    fn test_garbage_is_a_parse_error() {
        assert!(parse_feed(b"definitely not xml").is_err());
    }
}
