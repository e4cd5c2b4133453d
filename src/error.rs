use thiserror::Error;

/// Outcomes of the segmentation engine that are not a normal post.
///
/// Only [`ExtractError::InputTooShort`] is ever returned to a caller. The other
/// two are recovered from inside the pipeline and reported to the observer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractError {
    #[error("input too short: {chars} non-whitespace characters (need at least {min})")]
    InputTooShort { chars: usize, min: usize },

    #[error("no author handle detected, defaulting to \"Unknown\"")]
    NoAuthorDetected,

    #[error("all {candidates} candidate posts were filtered out")]
    EmptyAfterFiltering { candidates: usize },
}

/// Errors raised by an LLM provider while producing a summary.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("missing API key: {0} is not set")]
    MissingApiKey(&'static str),

    #[error("request failed: {0}")]
    RequestFailed(String),

    #[error("provider responded with {status_code}: {message}")]
    Api { status_code: u16, message: String },

    #[error("rate limit exceeded: {0}")]
    RateLimited(String),

    #[error("failed to parse response: {0}")]
    Parse(String),

    #[error("empty completion")]
    EmptyCompletion,
}

impl From<reqwest::Error> for ProviderError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            ProviderError::Parse(e.to_string())
        } else {
            ProviderError::RequestFailed(e.to_string())
        }
    }
}

/// Failures of the summarizer as a whole, after provider fallback.
#[derive(Debug, Error)]
pub enum SummaryError {
    #[error("No content found to summarize")]
    NoContent,

    #[error("no summary provider could be initialized (tried: {tried})")]
    NoProviders { tried: String },

    #[error("All providers failed. Last error: {last}")]
    AllProvidersFailed { last: String },
}
