//! AG-UI lifecycle events.
//!
//! Wire names and field sets follow the AG-UI event schema
//! (<https://docs.ag-ui.com/concepts/events>): `type` tag in SCREAMING_CASE,
//! camelCase fields, optional `timestamp` and `rawEvent` on every event.

use serde_json::Value;

use crate::ids::{MessageId, RunId, ThreadId};
use crate::message::Role;

/// Fields shared by all events.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct BaseEvent {
    /// Milliseconds since the UNIX epoch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<u64>,
    /// Upstream datum that produced the event. Diagnostic only.
    #[serde(rename = "rawEvent", default, skip_serializing_if = "Option::is_none")]
    pub raw_event: Option<Value>,
}

/// One lifecycle event of a run.
///
/// Build values through the constructors (`Event::run_started`, ...); they
/// take validated ids and fix the assistant role, so every constructed event
/// is well formed.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    /// Run begins. Always the first event.
    #[serde(rename = "RUN_STARTED")]
    RunStarted {
        #[serde(rename = "threadId")]
        thread_id: ThreadId,
        #[serde(rename = "runId")]
        run_id: RunId,
        #[serde(flatten)]
        base: BaseEvent,
    },
    /// A new assistant message begins.
    #[serde(rename = "TEXT_MESSAGE_START")]
    MessageStart {
        #[serde(rename = "messageId")]
        message_id: MessageId,
        role: Role,
        #[serde(flatten)]
        base: BaseEvent,
    },
    /// Incremental text for an open message.
    #[serde(rename = "TEXT_MESSAGE_CONTENT")]
    MessageContent {
        #[serde(rename = "messageId")]
        message_id: MessageId,
        delta: String,
        #[serde(flatten)]
        base: BaseEvent,
    },
    /// No further content follows for this message.
    #[serde(rename = "TEXT_MESSAGE_END")]
    MessageEnd {
        #[serde(rename = "messageId")]
        message_id: MessageId,
        #[serde(flatten)]
        base: BaseEvent,
    },
    /// Run completed successfully. Always the last event.
    #[serde(rename = "RUN_FINISHED")]
    RunFinished {
        #[serde(rename = "threadId")]
        thread_id: ThreadId,
        #[serde(rename = "runId")]
        run_id: RunId,
        #[serde(flatten)]
        base: BaseEvent,
    },
}

/// Payload-free discriminant of [`Event`].
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum EventKind {
    RunStarted,
    MessageStart,
    MessageContent,
    MessageEnd,
    RunFinished,
}

impl EventKind {
    /// Wire name of the event type.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::RunStarted => "RUN_STARTED",
            Self::MessageStart => "TEXT_MESSAGE_START",
            Self::MessageContent => "TEXT_MESSAGE_CONTENT",
            Self::MessageEnd => "TEXT_MESSAGE_END",
            Self::RunFinished => "RUN_FINISHED",
        }
    }
}

impl Event {
    pub fn run_started(thread_id: &ThreadId, run_id: &RunId) -> Self {
        Self::RunStarted {
            thread_id: thread_id.clone(),
            run_id: run_id.clone(),
            base: BaseEvent::default(),
        }
    }

    /// Opens an assistant message.
    pub fn message_start(message_id: &MessageId) -> Self {
        Self::MessageStart {
            message_id: message_id.clone(),
            role: Role::Assistant,
            base: BaseEvent::default(),
        }
    }

    pub fn message_content(message_id: &MessageId, delta: impl Into<String>) -> Self {
        Self::MessageContent {
            message_id: message_id.clone(),
            delta: delta.into(),
            base: BaseEvent::default(),
        }
    }

    pub fn message_end(message_id: &MessageId) -> Self {
        Self::MessageEnd {
            message_id: message_id.clone(),
            base: BaseEvent::default(),
        }
    }

    pub fn run_finished(thread_id: &ThreadId, run_id: &RunId) -> Self {
        Self::RunFinished {
            thread_id: thread_id.clone(),
            run_id: run_id.clone(),
            base: BaseEvent::default(),
        }
    }

    /// Sets the event timestamp (milliseconds since epoch).
    pub fn with_timestamp(mut self, timestamp: u64) -> Self {
        self.base_mut().timestamp = Some(timestamp);
        self
    }

    /// Attaches the upstream datum that produced this event.
    pub fn with_raw_event(mut self, raw: Option<Value>) -> Self {
        self.base_mut().raw_event = raw;
        self
    }

    pub fn kind(&self) -> EventKind {
        match self {
            Self::RunStarted { .. } => EventKind::RunStarted,
            Self::MessageStart { .. } => EventKind::MessageStart,
            Self::MessageContent { .. } => EventKind::MessageContent,
            Self::MessageEnd { .. } => EventKind::MessageEnd,
            Self::RunFinished { .. } => EventKind::RunFinished,
        }
    }

    /// Message id for message-scoped events.
    pub fn message_id(&self) -> Option<&MessageId> {
        match self {
            Self::MessageStart { message_id, .. }
            | Self::MessageContent { message_id, .. }
            | Self::MessageEnd { message_id, .. } => Some(message_id),
            Self::RunStarted { .. } | Self::RunFinished { .. } => None,
        }
    }

    /// `(thread_id, run_id)` for run-scoped events.
    pub fn run_identity(&self) -> Option<(&ThreadId, &RunId)> {
        match self {
            Self::RunStarted {
                thread_id, run_id, ..
            }
            | Self::RunFinished {
                thread_id, run_id, ..
            } => Some((thread_id, run_id)),
            _ => None,
        }
    }

    /// Text delta of a content event.
    pub fn delta(&self) -> Option<&str> {
        match self {
            Self::MessageContent { delta, .. } => Some(delta),
            _ => None,
        }
    }

    pub fn base(&self) -> &BaseEvent {
        match self {
            Self::RunStarted { base, .. }
            | Self::MessageStart { base, .. }
            | Self::MessageContent { base, .. }
            | Self::MessageEnd { base, .. }
            | Self::RunFinished { base, .. } => base,
        }
    }

    /// True for `RunFinished`, after which nothing else is emitted.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::RunFinished { .. })
    }

    fn base_mut(&mut self) -> &mut BaseEvent {
        match self {
            Self::RunStarted { base, .. }
            | Self::MessageStart { base, .. }
            | Self::MessageContent { base, .. }
            | Self::MessageEnd { base, .. }
            | Self::RunFinished { base, .. } => base,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ids() -> (ThreadId, RunId, MessageId) {
        (
            ThreadId::parse("thread1").expect("thread"),
            RunId::parse("run1").expect("run"),
            MessageId::parse("m1").expect("message"),
        )
    }

    #[test]
    fn run_started_uses_wire_names() {
        let (thread, run, _) = ids();
        let value = serde_json::to_value(Event::run_started(&thread, &run)).expect("serialize");
        assert_eq!(
            value,
            json!({"type":"RUN_STARTED","threadId":"thread1","runId":"run1"})
        );
    }

    #[test]
    fn message_start_is_always_assistant() {
        let (_, _, message) = ids();
        let value = serde_json::to_value(Event::message_start(&message)).expect("serialize");
        assert_eq!(
            value,
            json!({"type":"TEXT_MESSAGE_START","messageId":"m1","role":"assistant"})
        );
    }

    #[test]
    fn base_fields_are_flattened_when_present() {
        let (_, _, message) = ids();
        let event = Event::message_content(&message, "He")
            .with_timestamp(1_700_000_000_000)
            .with_raw_event(Some(json!({"id":"chunk-1"})));
        let value = serde_json::to_value(&event).expect("serialize");
        assert_eq!(value["type"], "TEXT_MESSAGE_CONTENT");
        assert_eq!(value["delta"], "He");
        assert_eq!(value["timestamp"], 1_700_000_000_000_u64);
        assert_eq!(value["rawEvent"]["id"], "chunk-1");

        let back: Event = serde_json::from_value(value).expect("deserialize");
        assert_eq!(back, event);
    }

    #[test]
    fn deserializing_blank_message_id_fails() {
        let raw = json!({"type":"TEXT_MESSAGE_END","messageId":" "});
        assert!(serde_json::from_value::<Event>(raw).is_err());
    }

    #[test]
    fn accessors_match_variant() {
        let (thread, run, message) = ids();
        let content = Event::message_content(&message, "x");
        assert_eq!(content.kind(), EventKind::MessageContent);
        assert_eq!(content.delta(), Some("x"));
        assert_eq!(content.message_id(), Some(&message));
        assert!(content.run_identity().is_none());

        let finished = Event::run_finished(&thread, &run);
        assert!(finished.is_terminal());
        assert_eq!(finished.run_identity(), Some((&thread, &run)));
        assert_eq!(finished.kind().as_str(), "RUN_FINISHED");
    }
}
