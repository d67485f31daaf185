use crate::tools::ToolCall;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    #[serde(default = "generate_id", skip_serializing_if = "String::is_empty")]
    pub id: String,
    pub role: Role,
    #[serde(default)]
    pub content: String,
    /// Tool requests; only set on assistant messages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    /// Originating request id; only set on tool messages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

fn generate_id() -> String {
    Uuid::new_v4().to_string()
}

impl Message {
    fn new(role: Role, content: String) -> Self {
        Self {
            id: generate_id(),
            role,
            content,
            tool_calls: None,
            tool_call_id: None,
            tool_name: None,
            created_at: Utc::now(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content.into())
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content.into())
    }

    pub fn assistant(content: impl Into<String>, tool_calls: Option<Vec<ToolCall>>) -> Self {
        let mut message = Self::new(Role::Assistant, content.into());
        message.tool_calls = tool_calls.filter(|calls| !calls.is_empty());
        message
    }

    pub fn tool_result(
        tool_call_id: impl Into<String>,
        tool_name: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        let mut message = Self::new(Role::Tool, content.into());
        message.tool_call_id = Some(tool_call_id.into());
        message.tool_name = Some(tool_name.into());
        message
    }

    /// Tool requests carried by this message, empty for anything but an
    /// assistant message that asked for tools.
    pub fn tool_requests(&self) -> &[ToolCall] {
        match (&self.role, &self.tool_calls) {
            (Role::Assistant, Some(calls)) => calls,
            _ => &[],
        }
    }

    pub fn has_tool_requests(&self) -> bool {
        !self.tool_requests().is_empty()
    }
}

/// Turn state: the ordered history of one conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub messages: Vec<Message>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    pub fn new(id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            messages: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn add_message(&mut self, message: Message) {
        self.messages.push(message);
        self.updated_at = Utc::now();
    }

    pub fn last_message(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Insert `prompt` as the leading system message unless one is already there.
    pub fn ensure_system_prompt(&mut self, prompt: &str) {
        let has_system = self
            .messages
            .first()
            .is_some_and(|message| message.role == Role::System);

        if !has_system {
            self.messages.insert(0, Message::system(prompt));
        }
    }

    /// Number of tool messages answering the given request id.
    pub fn tool_results_for(&self, tool_call_id: &str) -> usize {
        self.messages
            .iter()
            .filter(|message| {
                message.role == Role::Tool && message.tool_call_id.as_deref() == Some(tool_call_id)
            })
            .count()
    }
}
