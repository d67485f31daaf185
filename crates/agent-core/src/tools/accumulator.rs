use uuid::Uuid;

use crate::tools::ToolCall;

/// A tool call under construction from streamed fragments.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartialToolCall {
    pub id: String,
    pub name: String,
    pub arguments: String,
}

impl PartialToolCall {
    fn absorb(&mut self, fragment: &ToolCall) {
        if self.id.is_empty() && !fragment.id.is_empty() {
            self.id = fragment.id.clone();
        }
        if !fragment.function.name.is_empty() {
            self.name = fragment.function.name.clone();
        }
        self.arguments.push_str(&fragment.function.arguments);
    }
}

/// Merges streamed tool-call fragments into complete calls.
///
/// A fragment with an id joins the part carrying that id (or starts a new
/// one). A fragment with neither id nor name continues the most recent part.
#[derive(Debug, Default, Clone)]
pub struct ToolCallAccumulator {
    parts: Vec<PartialToolCall>,
}

impl ToolCallAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, fragment: ToolCall) {
        let has_id = !fragment.id.is_empty();
        let has_name = !fragment.function.name.is_empty();

        if !has_id && !has_name {
            if fragment.function.arguments.is_empty() {
                return;
            }
            match self.parts.last_mut() {
                Some(last) => last.absorb(&fragment),
                None => self.parts.push(PartialToolCall {
                    arguments: fragment.function.arguments,
                    ..Default::default()
                }),
            }
            return;
        }

        let position = if has_id {
            self.parts.iter().position(|part| part.id == fragment.id)
        } else {
            self.parts
                .iter()
                .position(|part| part.id.is_empty() && (part.name.is_empty() || part.name == fragment.function.name))
        };

        match position {
            Some(index) => self.parts[index].absorb(&fragment),
            None => {
                let mut part = PartialToolCall::default();
                part.absorb(&fragment);
                self.parts.push(part);
            }
        }
    }

    pub fn extend<I>(&mut self, fragments: I)
    where
        I: IntoIterator<Item = ToolCall>,
    {
        for fragment in fragments {
            self.update(fragment);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    pub fn finalize(self) -> Vec<ToolCall> {
        finalize_tool_calls(self.parts)
    }
}

/// Drop nameless parts and assign ids to parts the backend left anonymous.
pub fn finalize_tool_calls(parts: Vec<PartialToolCall>) -> Vec<ToolCall> {
    parts
        .into_iter()
        .filter(|part| !part.name.trim().is_empty())
        .map(|part| {
            let id = if part.id.is_empty() {
                format!("call_{}", Uuid::new_v4().simple())
            } else {
                part.id
            };
            ToolCall::new(id, part.name, part.arguments)
        })
        .collect()
}
