pub mod sse;
pub mod stdio;
pub mod stream;

pub use sse::SseTransport;
pub use stdio::StdioTransport;
pub use stream::StreamTransport;
