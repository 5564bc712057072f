use std::time::Duration;

use crate::errors::SequencerError;

/// Sentinel API key that selects a local Ollama server instead of the hosted API.
pub const OLLAMA_SENTINEL_KEY: &str = "ollama";

const HOSTED_BASE_URL: &str = "https://api.openai.com/v1";
const LOCAL_BASE_URL: &str = "http://localhost:11434/v1";
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Which OpenAI-compatible backend the client talks to.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CompletionBackend {
    /// The hosted OpenAI API.
    Hosted,
    /// A local, OpenAI-compatible Ollama server.
    Local,
}

/// Configuration for the OpenAI-compatible chat completions client.
#[derive(Clone, Debug)]
pub struct OpenAiClientConfig {
    /// API key used for bearer auth.
    pub api_key: String,
    /// API root including the version segment (`https://api.openai.com/v1`).
    ///
    /// Useful for proxies or local test servers.
    pub base_url: String,
    /// Limit for establishing the connection.
    pub connect_timeout: Duration,
    /// Longest allowed gap between two reads of the response body.
    ///
    /// Bounds idle time only; a completion may stream for longer than this.
    pub read_timeout: Duration,
    pub backend: CompletionBackend,
}

impl OpenAiClientConfig {
    /// Creates a hosted-API config with the provided key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: HOSTED_BASE_URL.to_string(),
            connect_timeout: CONNECT_TIMEOUT,
            read_timeout: Duration::from_secs(120),
            backend: CompletionBackend::Hosted,
        }
    }

    /// Creates a config for a local Ollama server.
    pub fn local() -> Self {
        Self {
            api_key: OLLAMA_SENTINEL_KEY.to_string(),
            base_url: LOCAL_BASE_URL.to_string(),
            connect_timeout: CONNECT_TIMEOUT,
            read_timeout: Duration::from_secs(300),
            backend: CompletionBackend::Local,
        }
    }

    /// Resolves the backend from an explicit key, falling back to `OPENAI_API_KEY`.
    ///
    /// The key `ollama` (explicit or from the environment) selects the local
    /// backend at `http://localhost:11434/v1`. `OPENAI_BASE_URL` (including
    /// `/v1`, as the OpenAI SDKs expect it) overrides the hosted base URL only.
    pub fn resolve(api_key: Option<String>) -> Result<Self, SequencerError> {
        let env_key = std::env::var("OPENAI_API_KEY").ok();
        let env_base_url = std::env::var("OPENAI_BASE_URL").ok();
        Self::resolve_with(api_key, env_key, env_base_url)
    }

    /// Same as [`resolve`](Self::resolve) with no explicit key.
    pub fn from_env() -> Result<Self, SequencerError> {
        Self::resolve(None)
    }

    pub(crate) fn resolve_with(
        api_key: Option<String>,
        env_key: Option<String>,
        env_base_url: Option<String>,
    ) -> Result<Self, SequencerError> {
        let explicit = api_key.filter(|k| !k.trim().is_empty());
        let env_key = env_key.filter(|k| !k.trim().is_empty());

        let is_sentinel = |key: &Option<String>| key.as_deref() == Some(OLLAMA_SENTINEL_KEY);
        if is_sentinel(&explicit) || is_sentinel(&env_key) {
            return Ok(Self::local());
        }

        let Some(key) = explicit.or(env_key) else {
            return Err(SequencerError::Config(
                "missing OPENAI_API_KEY for the hosted OpenAI backend".into(),
            ));
        };
        let config = Self::new(key);
        Ok(match env_base_url.filter(|u| !u.trim().is_empty()) {
            Some(url) => config.base_url(url.trim()),
            None => config,
        })
    }

    /// Overrides the API base URL (for proxies or test servers).
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Overrides the idle read timeout.
    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    pub(crate) fn chat_completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}
