//! OpenAI-compatible chat completions source.
//!
//! Backend selection (hosted API or local Ollama) is resolved here, before a
//! source reaches the sequencer.
mod adapter;
mod config;
pub(crate) mod transport;

pub use adapter::OpenAiSource;
pub use config::{CompletionBackend, OLLAMA_SENTINEL_KEY, OpenAiClientConfig};
