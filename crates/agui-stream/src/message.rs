use std::fmt;

/// One entry of the conversation history handed to a sequencer.
///
/// The role is kept as free text so histories from other producers (tool
/// results, developer notes, ...) can be carried without loss; only the roles
/// understood by [`Role::parse`] reach the completion source.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Message {
    pub id: String,
    pub role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

impl Message {
    /// Creates a history entry with an arbitrary role.
    pub fn new(id: impl Into<String>, role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            role: role.into(),
            content: Some(content.into()),
        }
    }

    /// Creates a `user` message.
    pub fn user(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self::new(id, "user", content)
    }

    /// Creates a `system` message.
    pub fn system(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self::new(id, "system", content)
    }

    /// Creates an `assistant` message.
    pub fn assistant(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self::new(id, "assistant", content)
    }
}

/// Roles forwarded to a completion source.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    /// Parses a recognized role name; anything else yields `None`.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "system" => Some(Self::System),
            "user" => Some(Self::User),
            "assistant" => Some(Self::Assistant),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Minimal `(role, content)` pair in the shape chat-completion APIs expect.
#[derive(Clone, Debug, Eq, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

/// Maps a history into chat messages.
///
/// Entries whose role is not `user`, `system` or `assistant` are dropped
/// without error, and missing content becomes empty text. Order is preserved.
pub fn to_chat_messages(history: &[Message]) -> Vec<ChatMessage> {
    history
        .iter()
        .filter_map(|msg| {
            Role::parse(&msg.role).map(|role| ChatMessage {
                role,
                content: msg.content.clone().unwrap_or_default(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mixed_history() -> Vec<Message> {
        vec![
            Message::system("1", "be brief"),
            Message::user("2", "hi"),
            Message::new("3", "tool", "{\"ok\":true}"),
            Message::assistant("4", "hello"),
            Message {
                id: "5".into(),
                role: "user".into(),
                content: None,
            },
            Message::new("6", "developer", "ignored"),
        ]
    }

    #[test]
    fn drops_unrecognized_roles_and_keeps_order() {
        let history = mixed_history();
        let mapped = to_chat_messages(&history);
        assert_eq!(mapped.len(), history.len() - 2);
        let roles = mapped.iter().map(|m| m.role).collect::<Vec<_>>();
        assert_eq!(
            roles,
            vec![Role::System, Role::User, Role::Assistant, Role::User]
        );
    }

    #[test]
    fn missing_content_maps_to_empty_text() {
        let mapped = to_chat_messages(&mixed_history());
        assert_eq!(mapped[3].content, "");
    }

    #[test]
    fn mapping_is_pure() {
        let history = mixed_history();
        assert_eq!(to_chat_messages(&history), to_chat_messages(&history));
    }

    #[test]
    fn chat_message_serializes_openai_style() {
        let value = serde_json::to_value(ChatMessage {
            role: Role::Assistant,
            content: "ok".into(),
        })
        .expect("serialize");
        assert_eq!(value, serde_json::json!({"role":"assistant","content":"ok"}));
    }

    #[test]
    fn role_names_are_case_sensitive() {
        assert_eq!(Role::parse("user"), Some(Role::User));
        assert_eq!(Role::parse("User"), None);
    }
}
