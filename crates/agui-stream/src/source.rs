use std::fmt;

use futures::stream::BoxStream;

use crate::errors::SourceError;
use crate::message::ChatMessage;

/// Stable identifier for a completion source implementation (for example `openai`).
#[derive(Clone, Debug, Eq, PartialEq, Hash, serde::Serialize, serde::Deserialize)]
pub struct SourceId(pub String);

impl SourceId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SourceId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for SourceId {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// Request handed to a completion source.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct CompletionRequest {
    /// Backend-specific model name.
    pub model: String,
    /// Filtered conversation history, oldest first.
    pub messages: Vec<ChatMessage>,
    /// Streaming flag; the sequencer always sets it.
    pub stream: bool,
}

/// One incremental chunk of generated text.
#[derive(Clone, Debug, PartialEq)]
pub struct Fragment {
    pub text: String,
    /// Upstream datum the text was extracted from, if the source keeps it.
    pub raw: Option<serde_json::Value>,
}

impl Fragment {
    /// Creates a fragment with no raw upstream datum attached.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            raw: None,
        }
    }

    pub fn with_raw(mut self, raw: serde_json::Value) -> Self {
        self.raw = Some(raw);
        self
    }
}

impl From<&str> for Fragment {
    fn from(value: &str) -> Self {
        Self::text(value)
    }
}

impl From<String> for Fragment {
    fn from(value: String) -> Self {
        Self::text(value)
    }
}

/// Fragments in arrival order. Dropping the stream is the cancellation hook:
/// sources should release their upstream resources when it is dropped.
pub type FragmentStream = BoxStream<'static, Result<Fragment, SourceError>>;

/// Capability the sequencer depends on: turn a chat history into a stream of
/// text fragments.
#[async_trait::async_trait]
pub trait CompletionSource: Send + Sync {
    /// Returns the source id used in errors and diagnostics.
    fn id(&self) -> SourceId;

    /// Opens a fragment stream for `request`.
    ///
    /// Failing here (connection, auth, rejected request) is reported to the
    /// run as `RunFailure::SourceUnavailable`; errors yielded by the stream
    /// become `RunFailure::StreamInterrupted`.
    async fn stream_completion(
        &self,
        request: CompletionRequest,
    ) -> Result<FragmentStream, SourceError>;
}
