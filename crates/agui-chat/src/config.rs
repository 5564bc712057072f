use agui_stream::vendors::openai::{CompletionBackend, OpenAiClientConfig};
use anyhow::{Context, Result};

pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";

/// Load `.env` from the crate dir, then from the current dir.
pub fn load_env() {
    if let Ok(canon) = std::path::Path::new(env!("CARGO_MANIFEST_DIR"))
        .join(".env")
        .canonicalize()
    {
        let _ = dotenvy::from_path(canon);
    }
    let _ = dotenvy::dotenv();
}

/// Resolved settings for one chat run.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub model: String,
    pub client: OpenAiClientConfig,
}

impl AppConfig {
    /// Flags win over the environment. Call after [`load_env`].
    pub fn resolve(model: Option<String>, api_key: Option<String>) -> Result<Self> {
        let model = resolve_model(model, std::env::var("OPENAI_MODEL").ok());
        let key_present = api_key.is_some() || std::env::var_os("OPENAI_API_KEY").is_some();
        tracing::info!(
            api_key = if key_present { "set" } else { "unset" },
            "environment loaded"
        );

        let client = OpenAiClientConfig::resolve(api_key)
            .context("resolving completion backend")?;
        match client.backend {
            CompletionBackend::Local => {
                tracing::info!(base_url = %client.base_url, "using local Ollama backend")
            }
            CompletionBackend::Hosted => {
                tracing::info!(base_url = %client.base_url, "using hosted OpenAI backend")
            }
        }

        Ok(Self { model, client })
    }
}

fn resolve_model(flag: Option<String>, env: Option<String>) -> String {
    flag.into_iter()
        .chain(env)
        .map(|m| m.trim().to_string())
        .find(|m| !m.is_empty())
        .unwrap_or_else(|| DEFAULT_MODEL.to_string())
}
