use crate::source::SourceId;

/// Errors returned by a completion source, either while opening the fragment
/// stream or while iterating it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SourceError {
    /// Backend returned an application-level failure (HTTP status, auth, etc.).
    #[error("provider error ({source_id}): {message}")]
    Provider {
        source_id: SourceId,
        message: String,
        status_code: Option<u16>,
    },
    /// Connection or stream I/O failed.
    #[error("transport error ({source_id}): {message}")]
    Transport { source_id: SourceId, message: String },
    /// Backend response shape was invalid.
    #[error("protocol error ({source_id}): {message}")]
    Protocol { source_id: SourceId, message: String },
}

impl SourceError {
    /// Creates a provider-level error.
    pub fn provider(
        source_id: impl Into<SourceId>,
        message: impl Into<String>,
        status_code: Option<u16>,
    ) -> Self {
        Self::Provider {
            source_id: source_id.into(),
            message: message.into(),
            status_code,
        }
    }

    /// Creates a transport-level error.
    pub fn transport(source_id: impl Into<SourceId>, message: impl Into<String>) -> Self {
        Self::Transport {
            source_id: source_id.into(),
            message: message.into(),
        }
    }

    /// Creates a protocol-level error.
    pub fn protocol(source_id: impl Into<SourceId>, message: impl Into<String>) -> Self {
        Self::Protocol {
            source_id: source_id.into(),
            message: message.into(),
        }
    }

    /// Returns the source that produced this error.
    pub fn source_id(&self) -> &SourceId {
        match self {
            Self::Provider { source_id, .. }
            | Self::Transport { source_id, .. }
            | Self::Protocol { source_id, .. } => source_id,
        }
    }

    /// Returns the human-readable message for this error.
    pub fn message(&self) -> &str {
        match self {
            Self::Provider { message, .. }
            | Self::Transport { message, .. }
            | Self::Protocol { message, .. } => message,
        }
    }
}

/// Terminal failure of an event stream.
///
/// Yielded as the last item of an `EventStream`; events emitted before it
/// stand as delivered.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RunFailure {
    /// The backend could not be reached or rejected the request before any
    /// fragment arrived.
    #[error("completion source unavailable: {0}")]
    SourceUnavailable(#[source] SourceError),
    /// The fragment stream failed after producing `fragments` fragments.
    #[error("completion stream interrupted after {fragments} fragment(s): {source}")]
    StreamInterrupted {
        fragments: u64,
        #[source]
        source: SourceError,
    },
}

impl RunFailure {
    /// Returns the originating source error.
    pub fn cause(&self) -> &SourceError {
        match self {
            Self::SourceUnavailable(source) | Self::StreamInterrupted { source, .. } => source,
        }
    }
}

/// Errors raised while building sequencer inputs, before any run starts.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SequencerError {
    /// Invalid backend or client configuration.
    #[error("config error: {0}")]
    Config(String),
    /// Invalid value passed to a constructor or builder.
    #[error("validation error: {0}")]
    Validation(String),
}
