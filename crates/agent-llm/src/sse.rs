//! SSE response -> [`LLMStream`] adapter.

use eventsource_stream::Eventsource;
use futures::StreamExt;
use reqwest::Response;

use crate::provider::{LLMError, LLMStream, Result};
use crate::types::LLMChunk;

/// Convert an SSE HTTP [`Response`] into an [`LLMStream`].
///
/// `handler` sees each event's name and data and returns `Ok(None)` to skip it.
/// Handler errors surface as [`LLMError::Stream`].
pub fn llm_stream_from_sse<H>(response: Response, mut handler: H) -> LLMStream
where
    H: FnMut(&str, &str) -> Result<Option<LLMChunk>> + Send + 'static,
{
    let stream = response
        .bytes_stream()
        .eventsource()
        .filter_map(move |event| {
            let item = match event {
                Ok(event) => match handler(&event.event, &event.data) {
                    Ok(chunk) => chunk.map(Ok),
                    Err(LLMError::Stream(message)) => Some(Err(LLMError::Stream(message))),
                    Err(other) => Some(Err(LLMError::Stream(other.to_string()))),
                },
                Err(error) => Some(Err(LLMError::Stream(error.to_string()))),
            };
            futures::future::ready(item)
        });

    Box::pin(stream)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn serve(body: &'static str) -> (MockServer, Response) {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/sse"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/event-stream")
                    .set_body_string(body),
            )
            .mount(&mock_server)
            .await;

        let response = reqwest::Client::new()
            .get(format!("{}/sse", mock_server.uri()))
            .send()
            .await
            .expect("response");
        (mock_server, response)
    }

    #[tokio::test]
    async fn skips_events_the_handler_ignores() {
        let (_server, response) =
            serve("event: token\ndata: hello\n\nevent: token\ndata: skip\n\n").await;

        let stream = llm_stream_from_sse(response, |event, data| {
            if data == "skip" {
                return Ok(None);
            }
            Ok(Some(LLMChunk::Token(format!("{event}:{data}"))))
        });
        let chunks: Vec<_> = stream.collect().await;

        assert_eq!(chunks.len(), 1);
        assert_eq!(
            chunks[0].as_ref().expect("chunk"),
            &LLMChunk::Token("token:hello".to_string())
        );
    }

    #[tokio::test]
    async fn handler_errors_become_stream_errors() {
        let (_server, response) = serve("data: boom\n\n").await;

        let stream = llm_stream_from_sse(response, |_, _| Err(LLMError::Api("bad".to_string())));
        let chunks: Vec<_> = stream.collect().await;

        assert!(matches!(chunks[0], Err(LLMError::Stream(ref message)) if message == "API error: bad"));
    }
}
