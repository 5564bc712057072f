//! Streams model completions as AG-UI run events.
//!
//! An [`EventSequencer`] wraps any [`CompletionSource`] and, for every run it
//! starts, emits `RUN_STARTED`, `TEXT_MESSAGE_START`, one
//! `TEXT_MESSAGE_CONTENT` per fragment, `TEXT_MESSAGE_END` and `RUN_FINISHED`,
//! or stops with a single [`RunFailure`] when the source fails.
//!
//! Backend-specific sources live under `vendors::*`.
//!
//! # Usage (OpenAI-compatible backend)
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use agui_stream::prelude::*;
//! use agui_stream::vendors::openai::OpenAiSource;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let sequencer = EventSequencer::builder(Arc::new(OpenAiSource::from_env()?))
//!     .model("gpt-3.5-turbo")
//!     .message(Message::user("1", "Say hello"))
//!     .build()?;
//!
//! let mut run = sequencer.start(RunInput::new(RunId::parse("run1")?));
//! while let Some(item) = run.next_event().await {
//!     if let Some(delta) = item?.delta() {
//!         print!("{delta}");
//!     }
//! }
//! # Ok(())
//! # }
//! ```

/// Error types for sources, runs and construction.
pub mod errors;
/// AG-UI event schema and smart constructors.
pub mod event;
/// Validated run, thread and message identifiers.
pub mod ids;
/// Conversation history and its mapping to chat messages.
pub mod message;
/// Common imports for typical usage.
pub mod prelude;
/// Run driver: sequencer, event stream and abort handle.
pub mod sequencer;
/// Completion source capability consumed by the sequencer.
pub mod source;
/// Backend-specific completion sources.
pub mod vendors;

pub use errors::{RunFailure, SequencerError, SourceError};
pub use event::{BaseEvent, Event, EventKind};
pub use ids::{MessageId, RunId, ThreadId};
pub use message::{ChatMessage, Message, Role, to_chat_messages};
pub use sequencer::{AbortHandle, EventSequencer, EventStream, RunInput, SequencerBuilder};
pub use source::{CompletionRequest, CompletionSource, Fragment, FragmentStream, SourceId};
