use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::stream::{self, Abortable, BoxStream};
use futures::{Stream, StreamExt as _};

use crate::errors::{RunFailure, SequencerError};
use crate::event::Event;
use crate::ids::{MessageId, RunId, ThreadId, unix_millis};
use crate::message::{Message, to_chat_messages};
use crate::source::{CompletionRequest, CompletionSource, FragmentStream};

/// Identity of one activation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunInput {
    pub run_id: RunId,
    /// Synthesized from the current time when absent.
    pub thread_id: Option<ThreadId>,
}

impl RunInput {
    pub fn new(run_id: RunId) -> Self {
        Self {
            run_id,
            thread_id: None,
        }
    }

    pub fn thread_id(mut self, thread_id: ThreadId) -> Self {
        self.thread_id = Some(thread_id);
        self
    }
}

/// Handle used to cancel a running event stream.
///
/// After `abort()` the stream yields no further events and ends without a
/// failure item. The fragment stream is dropped at that point, which stops
/// upstream production for sources that tie it to the stream's lifetime.
#[derive(Clone, Debug)]
pub struct AbortHandle {
    inner: stream::AbortHandle,
}

impl AbortHandle {
    pub fn abort(&self) {
        self.inner.abort();
    }
}

/// Turns a completion source into AG-UI run events.
///
/// The sequencer holds a read-only history snapshot and may be started any
/// number of times, concurrently; each activation gets its own thread/message
/// identity and shares nothing mutable with the others.
#[derive(Clone)]
pub struct EventSequencer {
    source: Arc<dyn CompletionSource>,
    model: String,
    messages: Arc<[Message]>,
    timestamps: bool,
}

impl EventSequencer {
    /// Starts a builder around an already-configured completion source.
    pub fn builder(source: Arc<dyn CompletionSource>) -> SequencerBuilder {
        SequencerBuilder {
            source,
            model: String::new(),
            messages: Vec::new(),
            timestamps: true,
        }
    }

    /// Model requested from the source.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// History snapshot used by every activation.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Returns a copy of this sequencer with a different history.
    pub fn with_messages(&self, messages: Vec<Message>) -> Self {
        Self {
            messages: messages.into(),
            ..self.clone()
        }
    }

    /// Creates the event stream for one run.
    ///
    /// Nothing happens until the stream is polled: the thread id, message id
    /// and the source request are all produced on first use.
    pub fn start(&self, input: RunInput) -> EventStream {
        let state = RunState {
            source: self.source.clone(),
            model: self.model.clone(),
            messages: self.messages.clone(),
            timestamps: self.timestamps,
            run_id: input.run_id.clone(),
            phase: Phase::Pending {
                thread_id: input.thread_id,
            },
        };
        let events = stream::unfold(state, |mut state| async move {
            let item = state.step().await?;
            Some((item, state))
        })
        .boxed();
        let (events, handle) = stream::abortable(events);

        EventStream {
            run_id: input.run_id,
            events: Some(events),
            abort_handle: AbortHandle { inner: handle },
        }
    }
}

/// Builder for [`EventSequencer`].
pub struct SequencerBuilder {
    source: Arc<dyn CompletionSource>,
    model: String,
    messages: Vec<Message>,
    timestamps: bool,
}

impl SequencerBuilder {
    /// Sets the model name passed to the source. Required.
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Replaces the conversation history.
    pub fn messages(mut self, messages: Vec<Message>) -> Self {
        self.messages = messages;
        self
    }

    /// Appends one history entry.
    pub fn message(mut self, message: Message) -> Self {
        self.messages.push(message);
        self
    }

    /// Whether emitted events carry a timestamp (on by default).
    pub fn timestamps(mut self, enabled: bool) -> Self {
        self.timestamps = enabled;
        self
    }

    pub fn build(self) -> Result<EventSequencer, SequencerError> {
        if self.model.trim().is_empty() {
            return Err(SequencerError::Validation("model must not be empty".into()));
        }
        Ok(EventSequencer {
            source: self.source,
            model: self.model,
            messages: self.messages.into(),
            timestamps: self.timestamps,
        })
    }
}

type RunEvents = BoxStream<'static, Result<Event, RunFailure>>;

/// Lazy, single-consumer stream of run events.
///
/// Yields `Ok(Event)` items in emission order. A successful run ends after
/// `RunFinished`; a failed run ends after exactly one `Err(RunFailure)`;
/// a cancelled run just ends.
pub struct EventStream {
    run_id: RunId,
    events: Option<Abortable<RunEvents>>,
    abort_handle: AbortHandle,
}

impl EventStream {
    pub fn run_id(&self) -> &RunId {
        &self.run_id
    }

    /// Returns a handle that can cancel the run from anywhere.
    pub fn abort_handle(&self) -> AbortHandle {
        self.abort_handle.clone()
    }

    /// Waits for the next event. `None` once the run has terminated.
    pub async fn next_event(&mut self) -> Option<Result<Event, RunFailure>> {
        self.next().await
    }
}

impl Stream for EventStream {
    type Item = Result<Event, RunFailure>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let Some(events) = self.events.as_mut() else {
            return Poll::Ready(None);
        };
        let polled = events.poll_next_unpin(cx);
        // Release the run (and with it the fragment stream) as soon as it
        // terminates, whether by completion, failure or abort.
        if matches!(polled, Poll::Ready(None) | Poll::Ready(Some(Err(_)))) {
            self.events = None;
        }
        polled
    }
}

struct RunIdentity {
    thread_id: ThreadId,
    message_id: MessageId,
}

enum Phase {
    Pending {
        thread_id: Option<ThreadId>,
    },
    Opening {
        thread_id: ThreadId,
    },
    Connecting(RunIdentity),
    Streaming {
        identity: RunIdentity,
        fragments: FragmentStream,
        received: u64,
    },
    Finishing(RunIdentity),
    Done,
}

struct RunState {
    source: Arc<dyn CompletionSource>,
    model: String,
    messages: Arc<[Message]>,
    timestamps: bool,
    run_id: RunId,
    phase: Phase,
}

impl RunState {
    /// Advances the run to its next item. Suspends only while opening the
    /// fragment stream and while waiting for a fragment.
    async fn step(&mut self) -> Option<Result<Event, RunFailure>> {
        loop {
            match std::mem::replace(&mut self.phase, Phase::Done) {
                Phase::Pending { thread_id } => {
                    let thread_id = thread_id.unwrap_or_else(ThreadId::generate);
                    let event = Event::run_started(&thread_id, &self.run_id);
                    self.phase = Phase::Opening { thread_id };
                    return Some(Ok(self.stamp(event)));
                }
                Phase::Opening { thread_id } => {
                    let message_id = MessageId::generate();
                    let event = Event::message_start(&message_id);
                    self.phase = Phase::Connecting(RunIdentity {
                        thread_id,
                        message_id,
                    });
                    return Some(Ok(self.stamp(event)));
                }
                Phase::Connecting(identity) => {
                    let request = CompletionRequest {
                        model: self.model.clone(),
                        messages: to_chat_messages(&self.messages),
                        stream: true,
                    };
                    match self.source.stream_completion(request).await {
                        Ok(fragments) => {
                            self.phase = Phase::Streaming {
                                identity,
                                fragments,
                                received: 0,
                            };
                        }
                        Err(err) => return Some(Err(RunFailure::SourceUnavailable(err))),
                    }
                }
                Phase::Streaming {
                    identity,
                    mut fragments,
                    received,
                } => match fragments.next().await {
                    Some(Ok(fragment)) => {
                        let event = Event::message_content(&identity.message_id, fragment.text)
                            .with_raw_event(fragment.raw);
                        self.phase = Phase::Streaming {
                            identity,
                            fragments,
                            received: received.saturating_add(1),
                        };
                        return Some(Ok(self.stamp(event)));
                    }
                    Some(Err(err)) => {
                        return Some(Err(RunFailure::StreamInterrupted {
                            fragments: received,
                            source: err,
                        }));
                    }
                    None => {
                        let event = Event::message_end(&identity.message_id);
                        self.phase = Phase::Finishing(identity);
                        return Some(Ok(self.stamp(event)));
                    }
                },
                Phase::Finishing(identity) => {
                    let event = Event::run_finished(&identity.thread_id, &self.run_id);
                    return Some(Ok(self.stamp(event)));
                }
                Phase::Done => return None,
            }
        }
    }

    fn stamp(&self, event: Event) -> Event {
        if self.timestamps {
            event.with_timestamp(unix_millis())
        } else {
            event
        }
    }
}
