//! Common imports for typical usage.
//!
//! Re-exports the types needed to build a sequencer, start runs and consume
//! their events.
pub use crate::{
    AbortHandle, CompletionSource, Event, EventKind, EventSequencer, EventStream, Message,
    RunFailure, RunId, RunInput, SequencerError, SourceError, ThreadId,
};
