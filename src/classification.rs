//! Scoring articles against the configured categories.
//!
//! Two strategies exist, chosen once from `llm.classification.engine`:
//!
//! - **LLM**: a single chat completion scores every category at once and
//!   explains each score.
//! - **Embeddings**: category names are embedded once at startup; each
//!   article is embedded and compared by cosine similarity, scaled to 0–10.
//!
//! Either way only categories scoring at or above the threshold are
//! returned. Provider and parse failures fail the whole article.

use crate::config::{Category, ClassificationConfig, ClassificationEngineKind};
use crate::error::{Error, Result};
use crate::llm::embeddings::embed_texts;
use crate::llm::{ChatPrompt, LlmProvider};
use crate::models::{Article, CategoryRelevance};
use crate::utils::{looks_truncated, normalize_text, truncate_chars, truncate_for_log};
use serde_json::Value;
use std::fmt::Write as _;
use tracing::{debug, info, instrument, warn};

const CLASSIFICATION_TEMPERATURE: f32 = 0.0;
const CLASSIFICATION_MAX_TOKENS: u32 = 2000;
/// Content budget for the embedding composite text.
const EMBEDDING_CONTENT_CHARS: usize = 2000;

const SYSTEM_PROMPT_HEADER: &str = "\
You are a security news analyst. You are given a list of categories and one article.
For each category, rate how relevant the article is to it.

Scoring:
- relevance is an integer from 0 to 10, where 0 means no connection and 10 means highly relevant.
- explanation is one short sentence justifying the score.

Answer with valid JSON only, without markdown formatting: an array with one object per category:
{\"category\": \"<category name>\", \"relevance\": <integer from 0 to 10>, \"explanation\": \"<brief explanation>\"}

Categories:
";

/// Cosine similarity of two vectors.
///
/// Vectors of different lengths, empty vectors and zero vectors yield `-1`,
/// which fails any non-negative threshold. The result is clamped to
/// `[-1, 1]`.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return -1.0;
    }
    let (mut dot, mut norm_a, mut norm_b) = (0f32, 0f32, 0f32);
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom == 0.0 || !denom.is_finite() {
        return -1.0;
    }
    (dot / denom).clamp(-1.0, 1.0)
}

/// Keep the scores at or above `threshold`, in their original order.
pub fn filter_by_threshold(
    scores: Vec<CategoryRelevance>,
    threshold: f32,
) -> Vec<CategoryRelevance> {
    scores.into_iter().filter(|s| s.relevance >= threshold).collect()
}

fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string (`json`) on the opening fence line.
    let body = rest.split_once('\n').map_or("", |(_, body)| body);
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

/// Parse a classification answer.
///
/// Accepted shapes: a JSON array of scores, an object wrapping such an
/// array under any key, or a single score object. Markdown code fences are
/// ignored.
pub fn parse_relevance_response(raw: &str) -> Result<Vec<CategoryRelevance>> {
    let body = strip_code_fence(raw);
    let value: Value = serde_json::from_str(body).map_err(|e| {
        warn!(
            truncated = looks_truncated(&e),
            response = %truncate_for_log(body, 200),
            "Classification response is not valid JSON"
        );
        Error::Serialization(e)
    })?;

    match value {
        Value::Array(_) => Ok(serde_json::from_value(value)?),
        Value::Object(map) if map.contains_key("category") => {
            Ok(vec![serde_json::from_value(Value::Object(map))?])
        }
        Value::Object(map) => match map.into_iter().find(|(_, v)| v.is_array()) {
            Some((_, array)) => Ok(serde_json::from_value(array)?),
            None => Err(Error::Provider(
                "classification response object holds no score array".into(),
            )),
        },
        other => Err(Error::Provider(format!(
            "unexpected classification response: {}",
            truncate_for_log(&other.to_string(), 100)
        ))),
    }
}

#[derive(Debug, Clone)]
pub struct LlmClassifier {
    model: String,
    threshold: f32,
    /// Configured names; answers for any other category are dropped.
    category_names: Vec<String>,
    system_prompt: String,
}

impl LlmClassifier {
    pub fn new(model: &str, threshold: f32, categories: &[Category]) -> Self {
        let mut system_prompt = SYSTEM_PROMPT_HEADER.to_string();
        for (i, c) in categories.iter().enumerate() {
            let _ = writeln!(system_prompt, "{}. {}: {}", i + 1, c.name, c.description);
        }
        Self {
            model: model.to_string(),
            threshold,
            category_names: categories.iter().map(|c| c.name.clone()).collect(),
            system_prompt,
        }
    }

    fn user_prompt(article: &Article) -> String {
        format!(
            "Below is the article to evaluate:\n\n\
             Title: {}\nDescription: {}\nLink: {}\nContent: {}\n",
            article.title, article.description, article.link, article.content
        )
    }

    async fn classify<P: LlmProvider>(
        &self,
        provider: &P,
        article: &Article,
    ) -> Result<Vec<CategoryRelevance>> {
        let user = Self::user_prompt(article);
        let answer = provider
            .chat_completion(ChatPrompt {
                model: &self.model,
                system: &self.system_prompt,
                user: &user,
                temperature: CLASSIFICATION_TEMPERATURE,
                max_tokens: CLASSIFICATION_MAX_TOKENS,
                require_json: true,
            })
            .await?;

        let scores = self.known_categories(parse_relevance_response(&answer)?);
        for s in &scores {
            debug!(category = %s.category, relevance = s.relevance, "Category classified");
        }
        Ok(filter_by_threshold(scores, self.threshold))
    }

    /// Keep scores for configured categories only, under their configured
    /// spelling. Names are compared case-insensitively.
    fn known_categories(&self, scores: Vec<CategoryRelevance>) -> Vec<CategoryRelevance> {
        scores
            .into_iter()
            .filter_map(|mut s| {
                let Some(name) = self
                    .category_names
                    .iter()
                    .find(|n| n.trim().eq_ignore_ascii_case(s.category.trim()))
                else {
                    warn!(category = %s.category, "Dropping score for unknown category");
                    return None;
                };
                s.category = name.clone();
                Some(s)
            })
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct EmbeddingsClassifier {
    model: String,
    threshold: f32,
    /// Category name and its embedding, in config order.
    categories: Vec<(String, Vec<f32>)>,
}

impl EmbeddingsClassifier {
    /// Embed every category name (lower-cased) once.
    pub async fn new<P: LlmProvider>(
        model: &str,
        threshold: f32,
        categories: &[Category],
        provider: &P,
    ) -> Result<Self> {
        let names: Vec<String> = categories.iter().map(|c| c.name.to_lowercase()).collect();
        info!(count = names.len(), "Pre-encoding categories");
        let vectors = embed_texts(provider, model, &names).await?;

        Ok(Self {
            model: model.to_string(),
            threshold,
            categories: categories.iter().map(|c| c.name.clone()).zip(vectors).collect(),
        })
    }

    fn composite_text(article: &Article) -> String {
        normalize_text(&format!(
            "{}\n{}\n{}",
            article.title,
            article.description,
            truncate_chars(&article.content, EMBEDDING_CONTENT_CHARS)
        ))
    }

    async fn classify<P: LlmProvider>(
        &self,
        provider: &P,
        article: &Article,
    ) -> Result<Vec<CategoryRelevance>> {
        let text = Self::composite_text(article);
        let article_vec = embed_texts(provider, &self.model, &[text])
            .await?
            .pop()
            .ok_or_else(|| Error::Embedding("no embedding returned for article".into()))?;

        let scores = self
            .categories
            .iter()
            .map(|(name, vec)| {
                let sim = cosine_similarity(&article_vec, vec);
                let relevance = sim * 10.0;
                debug!(category = %name, sim, relevance, "Category classified");
                CategoryRelevance {
                    category: name.clone(),
                    relevance,
                    explanation: None,
                }
            })
            .collect();
        Ok(filter_by_threshold(scores, self.threshold))
    }
}

/// The configured classification strategy.
#[derive(Debug, Clone)]
pub enum ClassificationEngine {
    Llm(LlmClassifier),
    Embeddings(EmbeddingsClassifier),
}

impl ClassificationEngine {
    #[instrument(level = "info", skip_all, fields(engine = ?config.engine, model = %config.model))]
    pub async fn new<P: LlmProvider>(
        config: &ClassificationConfig,
        categories: &[Category],
        provider: &P,
    ) -> Result<Self> {
        Ok(match config.engine {
            ClassificationEngineKind::Llm => {
                Self::Llm(LlmClassifier::new(&config.model, config.threshold, categories))
            }
            ClassificationEngineKind::Embeddings => Self::Embeddings(
                EmbeddingsClassifier::new(&config.model, config.threshold, categories, provider)
                    .await?,
            ),
        })
    }

    /// Categories of `article` at or above the threshold.
    pub async fn classify<P: LlmProvider>(
        &self,
        provider: &P,
        article: &Article,
    ) -> Result<Vec<CategoryRelevance>> {
        match self {
            Self::Llm(c) => c.classify(provider, article).await,
            Self::Embeddings(c) => c.classify(provider, article).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::testing::MockProvider;
    use chrono::Utc;
    use std::collections::HashMap;

    fn categories() -> Vec<Category> {
        vec![
            Category {
                name: "Ransomware".into(),
                description: "Ransomware attacks".into(),
            },
            Category {
                name: "Phishing".into(),
                description: "Phishing campaigns".into(),
            },
        ]
    }

    fn config(engine: ClassificationEngineKind, threshold: f32) -> ClassificationConfig {
        ClassificationConfig {
            engine,
            model: "test-model".into(),
            threshold,
        }
    }

    fn article() -> Article {
        Article::new(
            "LockBit returns",
            "The gang is back",
            "https://news.example.com/lockbit",
            "<p>LockBit affiliates hit a hospital.</p>",
            Utc::now(),
        )
    }

    async fn llm_engine(threshold: f32, provider: &MockProvider) -> ClassificationEngine {
        let cfg = config(ClassificationEngineKind::Llm, threshold);
        ClassificationEngine::new(&cfg, &categories(), provider)
            .await
            .unwrap()
    }

    const ANSWER: &str = r#"[
        {"category": "Ransomware", "relevance": 9, "explanation": "LockBit is a ransomware gang"},
        {"category": "Phishing", "relevance": 2, "explanation": "No phishing mentioned"}
    ]"#;

    #[test]
    fn test_cosine_bounds() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]), 1.0);
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]), -1.0);
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]), 0.0);
        let s = cosine_similarity(&[0.3, 0.7, 0.1], &[0.3, 0.7, 0.1]);
        assert!((-1.0..=1.0).contains(&s));
    }

    #[test]
    fn test_cosine_length_mismatch_is_minus_one() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[1.0]), -1.0);
        assert_eq!(cosine_similarity(&[], &[]), -1.0);
    }

    #[test]
    fn test_cosine_zero_vector_is_minus_one() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), -1.0);
    }

    #[test]
    fn test_threshold_boundary_is_inclusive() {
        let scores = vec![
            CategoryRelevance {
                category: "a".into(),
                relevance: 8.0,
                explanation: None,
            },
            CategoryRelevance {
                category: "b".into(),
                relevance: 7.99,
                explanation: None,
            },
        ];
        let kept = filter_by_threshold(scores, 8.0);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].category, "a");
    }

    #[test]
    fn test_parse_plain_array() {
        let scores = parse_relevance_response(ANSWER).unwrap();
        assert_eq!(scores.len(), 2);
        assert_eq!(scores[0].relevance, 9.0);
    }

    #[test]
    fn test_parse_fenced_and_wrapped_answers() {
        let fenced = format!("```json\n{ANSWER}\n```");
        assert_eq!(parse_relevance_response(&fenced).unwrap().len(), 2);

        let wrapped = format!(r#"{{"categories": {ANSWER}}}"#);
        assert_eq!(parse_relevance_response(&wrapped).unwrap().len(), 2);

        let single = r#"{"category": "Ransomware", "relevance": 7, "explanation": "x"}"#;
        assert_eq!(parse_relevance_response(single).unwrap()[0].category, "Ransomware");
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(matches!(
            parse_relevance_response("I think it's about ransomware"),
            Err(Error::Serialization(_))
        ));
        assert!(parse_relevance_response(r#"{"note": "nothing"}"#).is_err());
        assert!(parse_relevance_response("42").is_err());
    }

    #[test]
    fn test_system_prompt_lists_categories() {
        let c = LlmClassifier::new("m", 8.0, &categories());
        assert!(c.system_prompt.contains("1. Ransomware: Ransomware attacks\n"));
        assert!(c.system_prompt.contains("2. Phishing: Phishing campaigns\n"));
    }

    #[tokio::test]
    async fn test_llm_score_kept_at_threshold_eight() {
        let provider = MockProvider::with_chat(vec![Ok(ANSWER.into())]);
        let engine = llm_engine(8.0, &provider).await;

        let matched = engine.classify(&provider, &article()).await.unwrap();

        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].category, "Ransomware");
        assert_eq!(matched[0].relevance, 9.0);
        let calls = provider.chat_calls.lock().unwrap();
        assert!(calls[0].contains("Link: https://news.example.com/lockbit"));
    }

    #[tokio::test]
    async fn test_llm_score_dropped_at_higher_threshold() {
        let provider = MockProvider::with_chat(vec![Ok(ANSWER.into())]);
        let engine = llm_engine(9.5, &provider).await;

        assert!(engine.classify(&provider, &article()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_llm_unknown_categories_are_dropped() {
        let answer = r#"[
            {"category": "ransomware", "relevance": 9, "explanation": "gang"},
            {"category": "Cryptojacking", "relevance": 10, "explanation": "invented"}
        ]"#;
        let provider = MockProvider::with_chat(vec![Ok(answer.into())]);
        let engine = llm_engine(8.0, &provider).await;

        let matched = engine.classify(&provider, &article()).await.unwrap();

        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].category, "Ransomware");
    }

    #[tokio::test]
    async fn test_llm_malformed_answer_fails_article() {
        let provider = MockProvider::with_chat(vec![Ok("[{\"category\": ".into())]);
        let engine = llm_engine(1.0, &provider).await;
        assert!(engine.classify(&provider, &article()).await.is_err());
    }

    #[tokio::test]
    async fn test_embeddings_identical_vectors_score_ten() {
        let provider = MockProvider {
            embeddings: HashMap::from([
                ("ransomware".to_string(), vec![1.0, 0.0]),
                ("phishing".to_string(), vec![0.0, 1.0]),
            ]),
            default_embedding: Some(vec![1.0, 0.0]),
            ..Default::default()
        };
        let engine = ClassificationEngine::new(
            &config(ClassificationEngineKind::Embeddings, 5.0),
            &categories(),
            &provider,
        )
        .await
        .unwrap();

        let matched = engine.classify(&provider, &article()).await.unwrap();

        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].category, "Ransomware");
        assert_eq!(matched[0].relevance, 10.0);
        assert_eq!(matched[0].explanation, None);

        let calls = provider.embedding_calls.lock().unwrap();
        assert_eq!(calls[0], vec!["ransomware".to_string()]);
        assert_eq!(calls[1], vec!["phishing".to_string()]);
        assert_eq!(
            calls[2],
            vec!["lockbit returns the gang is back lockbit affiliates hit a hospital.".to_string()]
        );
    }

    #[tokio::test]
    async fn test_embeddings_engine_fails_without_provider_support() {
        let provider = MockProvider::default();
        let result = ClassificationEngine::new(
            &config(ClassificationEngineKind::Embeddings, 5.0),
            &categories(),
            &provider,
        )
        .await;
        assert!(result.is_err());
    }
}
