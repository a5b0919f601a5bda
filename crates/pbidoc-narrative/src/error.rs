use thiserror::Error;

/// Failures of a single text-generation call.
///
/// These never escape [`crate::Narrator::summarize`]; they are logged and
/// replaced by fallback text there. Only configuration errors
/// (`MissingCredential`, `Config`) reach callers, before any call is made.
#[derive(Debug, Error)]
pub enum NarrativeError {
    #[cfg(any(feature = "gemini", feature = "openai", feature = "anthropic", feature = "ollama"))]
    #[error("failed to reach {provider} at {url}: {source}")]
    Http {
        provider: &'static str,
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{provider} http error {status}: {body}")]
    Status {
        provider: &'static str,
        status: u16,
        body: String,
    },

    #[error("{provider} returned an unexpected response: {reason}")]
    InvalidResponse {
        provider: &'static str,
        reason: String,
    },

    #[error("{provider} backend requires {env} (set it in your environment)")]
    MissingCredential {
        provider: &'static str,
        env: &'static str,
    },

    #[error("invalid narrative configuration: {0}")]
    Config(String),

    #[error("text generator failed: {0}")]
    Generator(String),
}
