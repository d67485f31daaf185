pub mod compat;
pub mod mock;
pub mod openai;
pub mod provider;
pub mod sse;
pub mod types;

pub use mock::{MockLLMProvider, MockTurn};
pub use openai::OpenAIProvider;
pub use provider::{LLMError, LLMProvider, LLMStream};
pub use types::LLMChunk;
