//! Markdown rendering for terminal output.

use crate::models::Article;
use std::fmt::Write as _;

/// Render a matched article as Markdown.
///
/// With `debug` set, description/content lengths and every matched
/// category with its score and explanation are appended.
pub fn render(article: &Article, debug: bool) -> String {
    let mut out = format!(
        "# {}\n\n{}\n\nRead more [here]({})",
        article.title, article.summary, article.link
    );

    if debug {
        out.push_str("\n\n---\n\n**Debug info:**\n\n");
        let _ = writeln!(out, "**len(Description):** {}", article.description.len());
        let _ = writeln!(out, "**len(Content):** {}\n", article.content.len());
        for cr in &article.category_relevance {
            let _ = write!(
                out,
                "**Category:** {}\n\n**Relevance:** {:.1}\n\n**Explanation**: {}\n\n",
                cr.category,
                cr.relevance,
                cr.explanation.as_deref().unwrap_or("")
            );
        }
        out.push_str("\n\n---\n\n");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CategoryRelevance;
    use chrono::Utc;

    fn article() -> Article {
        let mut a = Article::new(
            "Zero-day in VPN",
            "desc",
            "https://x.example/vpn",
            "body",
            Utc::now(),
        );
        a.summary = "- Actively exploited".into();
        a.category_relevance = vec![CategoryRelevance {
            category: "Vulnerabilities".into(),
            relevance: 9.0,
            explanation: Some("Exploited zero-day".into()),
        }];
        a
    }

    #[test]
    fn test_render_plain() {
        assert_eq!(
            render(&article(), false),
            "# Zero-day in VPN\n\n- Actively exploited\n\nRead more [here](https://x.example/vpn)"
        );
    }

    #[test]
    fn test_render_debug_info() {
        let out = render(&article(), true);
        assert!(out.contains("**len(Description):** 4\n"));
        assert!(out.contains("**len(Content):** 4\n"));
        assert!(out.contains("**Relevance:** 9.0"));
        assert!(out.contains("**Explanation**: Exploited zero-day"));
    }
}
