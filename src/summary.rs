//! Article summaries for the reports.

use crate::error::Result;
use crate::llm::{ChatPrompt, LlmProvider};
use crate::models::Article;
use crate::utils::truncate_chars;
use std::time::Instant;
use tracing::{debug, instrument};

const SUMMARY_TEMPERATURE: f32 = 0.5;
const SUMMARY_MAX_TOKENS: u32 = 500;
const SUMMARY_CONTENT_CHARS: usize = 6000;

const SYSTEM_PROMPT: &str = "\
You summarize security articles for a busy security team. Write a concise, accurate and clear summary of the article you are given.

1. Fidelity: report the key points, techniques, affected products and conclusions as the article presents them. Do not add interpretation.
2. Brevity: keep it short and readable. Prefer plain language over jargon.
3. Structure: use short bullet points covering
   - what happened or what problem is addressed,
   - how it works (attack technique, vulnerability, methodology),
   - impact and affected parties,
   - recommended actions or conclusions.
4. Neutrality: keep an objective tone with no opinions.
5. Uncertainty: if parts of the article are ambiguous or contradictory, say so.";

#[derive(Debug, Clone)]
pub struct Summarizer {
    model: String,
}

impl Summarizer {
    pub fn new(model: impl Into<String>) -> Self {
        Self { model: model.into() }
    }

    fn user_prompt(article: &Article) -> String {
        format!(
            "Title: {}\nContent: {}\nCategories: {:?}",
            article.title,
            truncate_chars(&article.content, SUMMARY_CONTENT_CHARS),
            article.categories
        )
    }

    #[instrument(level = "debug", skip_all, fields(link = %article.link))]
    pub async fn summarize<P: LlmProvider>(
        &self,
        provider: &P,
        article: &Article,
    ) -> Result<String> {
        let t0 = Instant::now();
        let user = Self::user_prompt(article);
        let summary = provider
            .chat_completion(ChatPrompt {
                model: &self.model,
                system: SYSTEM_PROMPT,
                user: &user,
                temperature: SUMMARY_TEMPERATURE,
                max_tokens: SUMMARY_MAX_TOKENS,
                require_json: false,
            })
            .await?;
        debug!(
            chars = summary.len(),
            elapsed_ms = t0.elapsed().as_millis() as u64,
            "Summarized article"
        );
        Ok(summary.trim().to_string())
    }
}
