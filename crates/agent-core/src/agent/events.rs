use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Externally visible projection of the agent loop.
///
/// A stream of these is always terminated by exactly one [`AgentEvent::Done`]
/// or [`AgentEvent::Error`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentEvent {
    ToolCall {
        id: String,
        name: String,
        arguments: Value,
    },

    ToolResult {
        id: String,
        tool_name: String,
        result: Value,
        success: bool,
    },

    Answer {
        content: String,
    },

    Error {
        message: String,
    },

    Done,
}

impl AgentEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            AgentEvent::ToolCall { .. } => "tool_call",
            AgentEvent::ToolResult { .. } => "tool_result",
            AgentEvent::Answer { .. } => "answer",
            AgentEvent::Error { .. } => "error",
            AgentEvent::Done => "done",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, AgentEvent::Done | AgentEvent::Error { .. })
    }

    /// Event body without the `type` discriminator.
    pub fn payload(&self) -> Value {
        match serde_json::to_value(self) {
            Ok(Value::Object(mut map)) => {
                map.remove("type");
                Value::Object(map)
            }
            _ => Value::Object(Default::default()),
        }
    }

    /// Render as a server-sent event frame.
    pub fn to_sse(&self) -> String {
        format!("event: {}\ndata: {}\n\n", self.event_type(), self.payload())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn payload_strips_discriminator() {
        let event = AgentEvent::ToolCall {
            id: "call_1".to_string(),
            name: "calculate".to_string(),
            arguments: json!({"expression": "2 + 2"}),
        };

        assert_eq!(
            event.payload(),
            json!({"id": "call_1", "name": "calculate", "arguments": {"expression": "2 + 2"}})
        );
    }

    #[test]
    fn done_renders_empty_object() {
        assert_eq!(AgentEvent::Done.to_sse(), "event: done\ndata: {}\n\n");
    }

    #[test]
    fn answer_frame_format() {
        let event = AgentEvent::Answer {
            content: "4".to_string(),
        };
        assert_eq!(event.to_sse(), "event: answer\ndata: {\"content\":\"4\"}\n\n");
        assert!(!event.is_terminal());
        assert!(AgentEvent::Error { message: "x".into() }.is_terminal());
    }
}
