//! Text generators behind the narrative port.
//!
//! Gemini, OpenAI, Anthropic and Ollama over blocking HTTP, plus a scripted
//! mock for tests. Request bodies and response parsing are plain functions so
//! they can be checked without a network.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::{NarrativeError, TextGenerator};

const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_MAX_OUTPUT_TOKENS: u32 = 2048;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    #[default]
    Gemini,
    #[serde(rename = "openai")]
    OpenAi,
    Anthropic,
    Ollama,
}

impl ProviderKind {
    pub fn name(self) -> &'static str {
        match self {
            ProviderKind::Gemini => "gemini",
            ProviderKind::OpenAi => "openai",
            ProviderKind::Anthropic => "anthropic",
            ProviderKind::Ollama => "ollama",
        }
    }

    /// Environment variable holding the API key, if the backend needs one.
    pub fn credential_env(self) -> Option<&'static str> {
        match self {
            ProviderKind::Gemini => Some("GOOGLE_API_KEY"),
            ProviderKind::OpenAi => Some("OPENAI_API_KEY"),
            ProviderKind::Anthropic => Some("ANTHROPIC_API_KEY"),
            ProviderKind::Ollama => None,
        }
    }

    pub fn default_model(self) -> &'static str {
        match self {
            ProviderKind::Gemini => "gemini-1.5-flash-latest",
            ProviderKind::OpenAi => "gpt-4o-mini",
            ProviderKind::Anthropic => "claude-3-5-haiku-latest",
            ProviderKind::Ollama => "llama3.1",
        }
    }

    pub fn default_base_url(self) -> &'static str {
        match self {
            ProviderKind::Gemini => "https://generativelanguage.googleapis.com",
            ProviderKind::OpenAi => "https://api.openai.com",
            ProviderKind::Anthropic => "https://api.anthropic.com",
            ProviderKind::Ollama => "http://127.0.0.1:11434",
        }
    }

    /// Whether this backend was compiled in.
    pub fn is_enabled(self) -> bool {
        match self {
            ProviderKind::Gemini => cfg!(feature = "gemini"),
            ProviderKind::OpenAi => cfg!(feature = "openai"),
            ProviderKind::Anthropic => cfg!(feature = "anthropic"),
            ProviderKind::Ollama => cfg!(feature = "ollama"),
        }
    }
}

impl std::str::FromStr for ProviderKind {
    type Err = NarrativeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gemini" | "google" => Ok(ProviderKind::Gemini),
            "openai" => Ok(ProviderKind::OpenAi),
            "anthropic" | "claude" => Ok(ProviderKind::Anthropic),
            "ollama" => Ok(ProviderKind::Ollama),
            other => Err(NarrativeError::Config(format!("unknown provider: {other}"))),
        }
    }
}

/// Resolved settings for one backend.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderConfig {
    pub provider: ProviderKind,
    pub model: String,
    pub base_url: String,
    /// Per-call deadline. `None` waits forever.
    pub timeout: Option<Duration>,
    pub max_output_tokens: Option<u32>,
    pub temperature: Option<f32>,
}

impl ProviderConfig {
    pub fn for_provider(provider: ProviderKind) -> Self {
        Self {
            provider,
            model: provider.default_model().to_string(),
            base_url: provider.default_base_url().to_string(),
            timeout: Some(Duration::from_secs(120)),
            max_output_tokens: None,
            temperature: None,
        }
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self::for_provider(ProviderKind::default())
    }
}

/// Read the provider's key from the environment. Blank counts as missing.
pub fn api_key_from_env(provider: ProviderKind) -> Result<Option<String>, NarrativeError> {
    let Some(env) = provider.credential_env() else {
        return Ok(None);
    };
    let key = std::env::var(env).unwrap_or_default();
    let key = key.trim();
    if key.is_empty() {
        return Err(NarrativeError::MissingCredential {
            provider: provider.name(),
            env,
        });
    }
    Ok(Some(key.to_string()))
}

fn normalize_base_url(base_url: &str, provider: ProviderKind) -> String {
    let mut host = base_url.trim().to_string();
    if host.is_empty() {
        host = provider.default_base_url().to_string();
    }
    if !host.starts_with("http://") && !host.starts_with("https://") {
        let scheme = if provider == ProviderKind::Ollama { "http" } else { "https" };
        host = format!("{scheme}://{host}");
    }
    host.trim_end_matches('/').to_string()
}

/// Endpoint URL for a generation call.
pub fn endpoint_url(config: &ProviderConfig) -> String {
    let base = normalize_base_url(&config.base_url, config.provider);
    match config.provider {
        ProviderKind::Gemini => format!("{base}/v1beta/models/{}:generateContent", config.model),
        ProviderKind::OpenAi => format!("{base}/v1/responses"),
        ProviderKind::Anthropic => format!("{base}/v1/messages"),
        ProviderKind::Ollama => format!("{base}/api/generate"),
    }
}

/// JSON body for a generation call.
pub fn request_body(config: &ProviderConfig, prompt: &str) -> Value {
    match config.provider {
        ProviderKind::Gemini => {
            let mut body = json!({
                "contents": [ { "role": "user", "parts": [ { "text": prompt } ] } ]
            });
            let mut generation = serde_json::Map::new();
            if let Some(max) = config.max_output_tokens {
                generation.insert("maxOutputTokens".into(), json!(max));
            }
            if let Some(t) = config.temperature {
                generation.insert("temperature".into(), json!(t));
            }
            if !generation.is_empty() {
                body["generationConfig"] = Value::Object(generation);
            }
            body
        }
        ProviderKind::OpenAi => {
            let mut body = json!({ "model": config.model, "input": prompt });
            if let Some(max) = config.max_output_tokens {
                body["max_output_tokens"] = json!(max);
            }
            if let Some(t) = config.temperature {
                body["temperature"] = json!(t);
            }
            body
        }
        ProviderKind::Anthropic => {
            // max_tokens is mandatory for the messages API.
            let mut body = json!({
                "model": config.model,
                "max_tokens": config.max_output_tokens.unwrap_or(DEFAULT_MAX_OUTPUT_TOKENS),
                "messages": [ { "role": "user", "content": prompt } ]
            });
            if let Some(t) = config.temperature {
                body["temperature"] = json!(t);
            }
            body
        }
        ProviderKind::Ollama => {
            let mut options = serde_json::Map::new();
            if let Some(max) = config.max_output_tokens {
                options.insert("num_predict".into(), json!(max));
            }
            if let Some(t) = config.temperature {
                options.insert("temperature".into(), json!(t));
            }
            json!({
                "model": config.model,
                "prompt": prompt,
                "stream": false,
                "options": Value::Object(options)
            })
        }
    }
}

/// Pull the generated text out of a response body.
///
/// `None` means the body did not have the expected shape. Text that is present
/// but empty comes back as `Some("")`.
pub fn extract_text(provider: ProviderKind, body: &Value) -> Option<String> {
    match provider {
        ProviderKind::Gemini => {
            let parts = body
                .get("candidates")?
                .as_array()?
                .first()?
                .get("content")?
                .get("parts")?
                .as_array()?;
            Some(join_text(parts.iter().filter_map(|p| p.get("text")?.as_str())))
        }
        ProviderKind::OpenAi => {
            if let Some(text) = body.get("output_text").and_then(Value::as_str) {
                return Some(text.to_string());
            }
            let output = body.get("output")?.as_array()?;
            let texts = output
                .iter()
                .filter(|item| item.get("type").and_then(Value::as_str) == Some("message"))
                .filter_map(|item| item.get("content")?.as_array())
                .flatten()
                .filter(|c| c.get("type").and_then(Value::as_str) == Some("output_text"))
                .filter_map(|c| c.get("text")?.as_str());
            Some(join_text(texts))
        }
        ProviderKind::Anthropic => {
            let content = body.get("content")?.as_array()?;
            Some(join_text(
                content
                    .iter()
                    .filter(|c| c.get("type").and_then(Value::as_str) == Some("text"))
                    .filter_map(|c| c.get("text")?.as_str()),
            ))
        }
        ProviderKind::Ollama => body.get("response")?.as_str().map(str::to_string),
    }
}

fn join_text<'a>(parts: impl Iterator<Item = &'a str>) -> String {
    parts.collect::<Vec<_>>().join("\n")
}

/// A backend reached over blocking HTTP.
#[cfg(any(feature = "gemini", feature = "openai", feature = "anthropic", feature = "ollama"))]
pub struct HttpGenerator {
    config: ProviderConfig,
    api_key: Option<String>,
    url: String,
    client: reqwest::blocking::Client,
}

#[cfg(any(feature = "gemini", feature = "openai", feature = "anthropic", feature = "ollama"))]
impl HttpGenerator {
    pub fn new(config: ProviderConfig, api_key: Option<String>) -> Result<Self, NarrativeError> {
        let mut builder = reqwest::blocking::Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| NarrativeError::Config(format!("failed to build http client: {e}")))?;
        let url = endpoint_url(&config);
        Ok(Self {
            config,
            api_key,
            url,
            client,
        })
    }

    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }
}

#[cfg(any(feature = "gemini", feature = "openai", feature = "anthropic", feature = "ollama"))]
impl TextGenerator for HttpGenerator {
    fn generate(&self, prompt: &str) -> Result<String, NarrativeError> {
        let provider = self.config.provider;
        let body = request_body(&self.config, prompt);
        let key = self.api_key.as_deref().unwrap_or_default();

        let request = self.client.post(&self.url).json(&body);
        let request = match provider {
            ProviderKind::Gemini => request.header("x-goog-api-key", key),
            ProviderKind::OpenAi => request.bearer_auth(key),
            ProviderKind::Anthropic => request
                .header("x-api-key", key)
                .header("anthropic-version", ANTHROPIC_VERSION),
            ProviderKind::Ollama => request,
        };

        tracing::debug!(provider = provider.name(), url = %self.url, prompt_chars = prompt.len(), "sending generation request");
        let resp = request.send().map_err(|source| NarrativeError::Http {
            provider: provider.name(),
            url: self.url.clone(),
            source,
        })?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().unwrap_or_default();
            return Err(NarrativeError::Status {
                provider: provider.name(),
                status,
                body,
            });
        }

        let value: Value = resp.json().map_err(|e| NarrativeError::InvalidResponse {
            provider: provider.name(),
            reason: format!("invalid JSON: {e}"),
        })?;
        extract_text(provider, &value).ok_or_else(|| NarrativeError::InvalidResponse {
            provider: provider.name(),
            reason: "no text in response (unexpected response shape)".to_string(),
        })
    }

    fn label(&self) -> &str {
        self.config.provider.name()
    }
}

/// Build the generator for `config`.
///
/// `api_key` is required for every backend except Ollama.
pub fn create_generator(
    config: &ProviderConfig,
    api_key: Option<String>,
) -> Result<Box<dyn TextGenerator>, NarrativeError> {
    let provider = config.provider;
    if !provider.is_enabled() {
        return Err(NarrativeError::Config(format!(
            "provider {} was not compiled into this build",
            provider.name()
        )));
    }
    if let Some(env) = provider.credential_env() {
        if api_key.as_deref().map_or(true, |k| k.trim().is_empty()) {
            return Err(NarrativeError::MissingCredential {
                provider: provider.name(),
                env,
            });
        }
    }
    build_http(config, api_key)
}

#[cfg(any(feature = "gemini", feature = "openai", feature = "anthropic", feature = "ollama"))]
fn build_http(config: &ProviderConfig, api_key: Option<String>) -> Result<Box<dyn TextGenerator>, NarrativeError> {
    tracing::info!(provider = config.provider.name(), model = %config.model, "using narrative provider");
    Ok(Box::new(HttpGenerator::new(config.clone(), api_key)?))
}

#[cfg(not(any(feature = "gemini", feature = "openai", feature = "anthropic", feature = "ollama")))]
fn build_http(config: &ProviderConfig, _api_key: Option<String>) -> Result<Box<dyn TextGenerator>, NarrativeError> {
    Err(NarrativeError::Config(format!(
        "provider {} was not compiled into this build",
        config.provider.name()
    )))
}

/// One scripted answer of a [`MockGenerator`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockReply {
    Text(String),
    Fail(String),
    Empty,
    Panic,
}

/// Scripted generator: replies cycle through the script, prompts are recorded.
pub struct MockGenerator {
    replies: Vec<MockReply>,
    reply_idx: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

impl MockGenerator {
    pub fn new(replies: Vec<MockReply>) -> Self {
        Self {
            replies,
            reply_idx: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn always(response: &str) -> Self {
        Self::new(vec![MockReply::Text(response.to_string())])
    }

    pub fn failing(reason: &str) -> Self {
        Self::new(vec![MockReply::Fail(reason.to_string())])
    }

    pub fn empty() -> Self {
        Self::new(vec![MockReply::Empty])
    }

    /// Every prompt received so far, in call order.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().clone()
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().len()
    }
}

impl TextGenerator for MockGenerator {
    fn generate(&self, prompt: &str) -> Result<String, NarrativeError> {
        self.prompts.lock().push(prompt.to_string());
        let idx = self.reply_idx.fetch_add(1, Ordering::SeqCst);
        let reply = match self.replies.get(idx % self.replies.len().max(1)) {
            Some(reply) => reply.clone(),
            None => MockReply::Text("Mock response".to_string()),
        };
        match reply {
            MockReply::Text(text) => Ok(text),
            MockReply::Fail(reason) => Err(NarrativeError::Generator(reason)),
            MockReply::Empty => Ok(String::new()),
            MockReply::Panic => panic!("mock generator panic"),
        }
    }

    fn label(&self) -> &str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mock_cycles_through_script() {
        let gen = MockGenerator::new(vec![
            MockReply::Text("a".into()),
            MockReply::Fail("boom".into()),
        ]);
        assert_eq!(gen.generate("1").unwrap(), "a");
        assert!(gen.generate("2").is_err());
        assert_eq!(gen.generate("3").unwrap(), "a");
        assert_eq!(gen.prompts(), vec!["1", "2", "3"]);
    }

    #[test]
    fn provider_names_parse() {
        assert_eq!("OpenAI".parse::<ProviderKind>().unwrap(), ProviderKind::OpenAi);
        assert_eq!("claude".parse::<ProviderKind>().unwrap(), ProviderKind::Anthropic);
        assert!("bard2".parse::<ProviderKind>().is_err());
        let kind: ProviderKind = serde_json::from_str("\"openai\"").unwrap();
        assert_eq!(kind, ProviderKind::OpenAi);
    }

    #[test]
    fn gemini_request_and_response() {
        let mut config = ProviderConfig::for_provider(ProviderKind::Gemini);
        config.temperature = Some(0.2);
        assert_eq!(
            endpoint_url(&config),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-1.5-flash-latest:generateContent"
        );
        let body = request_body(&config, "hello");
        assert_eq!(body["contents"][0]["parts"][0]["text"], "hello");
        assert!(body["generationConfig"].get("maxOutputTokens").is_none());

        let resp = json!({"candidates": [{"content": {"parts": [{"text": "one"}, {"text": "two"}]}}]});
        assert_eq!(extract_text(ProviderKind::Gemini, &resp).as_deref(), Some("one\ntwo"));
        assert_eq!(extract_text(ProviderKind::Gemini, &json!({"candidates": []})), None);
    }

    #[test]
    fn openai_output_items() {
        let resp = json!({
            "output": [
                {"type": "reasoning", "summary": []},
                {"type": "message", "content": [{"type": "output_text", "text": "Summary."}]}
            ]
        });
        assert_eq!(extract_text(ProviderKind::OpenAi, &resp).as_deref(), Some("Summary."));
    }

    #[test]
    fn anthropic_defaults_max_tokens() {
        let config = ProviderConfig::for_provider(ProviderKind::Anthropic);
        let body = request_body(&config, "x");
        assert_eq!(body["max_tokens"], DEFAULT_MAX_OUTPUT_TOKENS);
        let resp = json!({"content": [{"type": "text", "text": "ok"}]});
        assert_eq!(extract_text(ProviderKind::Anthropic, &resp).as_deref(), Some("ok"));
    }

    #[test]
    fn ollama_base_url_gets_http_scheme() {
        let mut config = ProviderConfig::for_provider(ProviderKind::Ollama);
        config.base_url = "localhost:11434/".into();
        assert_eq!(endpoint_url(&config), "http://localhost:11434/api/generate");
        assert_eq!(
            extract_text(ProviderKind::Ollama, &json!({"response": ""})).as_deref(),
            Some("")
        );
    }

    #[test]
    fn missing_key_is_reported_before_any_call() {
        let config = ProviderConfig::for_provider(ProviderKind::OpenAi);
        match create_generator(&config, Some("  ".into())) {
            Err(NarrativeError::MissingCredential { env, .. }) => assert_eq!(env, "OPENAI_API_KEY"),
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("expected a missing credential"),
        }
    }
}
