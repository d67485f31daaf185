use agent_core::tools::ToolCall;

/// One increment of a streamed model reply.
#[derive(Debug, Clone, PartialEq)]
pub enum LLMChunk {
    Token(String),
    /// Tool-call fragments; may need merging across chunks.
    ToolCalls(Vec<ToolCall>),
    Done,
}
