//! Error type shared by every stage of the pipeline.
//!
//! The variants follow how the pipeline reacts to them:
//!
//! | Kind | Variants | Reaction |
//! |------|----------|----------|
//! | Source-level | [`Error::Http`], [`Error::Status`], [`Error::FeedParse`] | source/article skipped for this cycle |
//! | Data quality | [`Error::Extraction`] | article continues with what it has |
//! | Provider | [`Error::Api`], [`Error::Provider`], [`Error::Serialization`], [`Error::Embedding`], [`Error::NotImplemented`] | article skipped, loop continues |
//! | Startup | [`Error::MissingEnv`], [`Error::ModelLoad`], [`Error::Config`], [`Error::Yaml`], [`Error::Io`] | process exits |

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("request to {url} failed with status code {status}")]
    Status { url: String, status: u16 },

    #[error("feed parse error: {0}")]
    FeedParse(#[from] feed_rs::parser::ParseFeedError),

    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("failed to extract text content from html: {0}")]
    Extraction(String),

    #[error("{provider} API returned status {status}: {body}")]
    Api {
        provider: &'static str,
        status: u16,
        body: String,
    },

    #[error("LLM provider error: {0}")]
    Provider(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("embedding error: {0}")]
    Embedding(String),

    #[error("{operation} is not implemented for {provider}")]
    NotImplemented {
        provider: &'static str,
        operation: &'static str,
    },

    #[error("{0} environment variable is not set")]
    MissingEnv(&'static str),

    #[error("failed to load model {model}: {reason}")]
    ModelLoad { model: String, reason: String },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether repeating the same request may succeed.
    ///
    /// Transport failures, rate limiting and server-side errors qualify;
    /// everything that would fail identically a second time does not.
    pub fn is_transient(&self) -> bool {
        match self {
            Error::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            Error::Api { status, .. } | Error::Status { status, .. } => {
                *status == 429 || (500..600).contains(status)
            }
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
