use std::collections::VecDeque;
use std::pin::Pin;

use futures::StreamExt as _;
use futures::stream;
use tracing::debug;

use crate::errors::{SequencerError, SourceError};
use crate::source::{CompletionRequest, CompletionSource, Fragment, FragmentStream, SourceId};

use super::config::{CompletionBackend, OpenAiClientConfig};
use super::transport::{ChunkOutcome, SseDecoder, SseFrame, map_chat_frame};

const OPENAI_SOURCE: &str = "openai";
const OLLAMA_SOURCE: &str = "ollama";

type ByteStream =
    Pin<Box<dyn futures::Stream<Item = Result<bytes::Bytes, reqwest::Error>> + Send + 'static>>;

/// Completion source for OpenAI-compatible chat completions APIs (streaming).
///
/// Works against the hosted OpenAI API and against local Ollama servers; the
/// backend is fixed by the [`OpenAiClientConfig`] it is built from.
pub struct OpenAiSource {
    client: reqwest::Client,
    config: OpenAiClientConfig,
}

impl OpenAiSource {
    /// Creates a source from explicit client configuration.
    pub fn new(config: OpenAiClientConfig) -> Result<Self, SequencerError> {
        if config.api_key.trim().is_empty() {
            return Err(SequencerError::Config(
                "OpenAI client config api_key must not be empty".into(),
            ));
        }
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .read_timeout(config.read_timeout)
            .build()
            .map_err(|e| SequencerError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client, config })
    }

    /// Creates a source using `OPENAI_API_KEY` / `OPENAI_BASE_URL`.
    pub fn from_env() -> Result<Self, SequencerError> {
        Self::new(OpenAiClientConfig::from_env()?)
    }

    pub fn config(&self) -> &OpenAiClientConfig {
        &self.config
    }
}

#[async_trait::async_trait]
impl CompletionSource for OpenAiSource {
    fn id(&self) -> SourceId {
        match self.config.backend {
            CompletionBackend::Hosted => SourceId::new(OPENAI_SOURCE),
            CompletionBackend::Local => SourceId::new(OLLAMA_SOURCE),
        }
    }

    async fn stream_completion(
        &self,
        request: CompletionRequest,
    ) -> Result<FragmentStream, SourceError> {
        let source_id = self.id();
        debug!(
            source = %source_id,
            model = %request.model,
            messages = request.messages.len(),
            "starting chat completions stream"
        );

        let response = self
            .client
            .post(self.config.chat_completions_url())
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                SourceError::transport(source_id.clone(), format!("request failed: {e}"))
            })?;
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(SourceError::provider(
                source_id,
                format!("chat completions request failed with status {status}: {body}"),
                Some(status.as_u16()),
            ));
        }

        let bytes_stream: ByteStream = Box::pin(response.bytes_stream());
        Ok(chat_fragment_stream(source_id, bytes_stream).boxed())
    }
}

fn chat_fragment_stream(
    source_id: SourceId,
    bytes_stream: ByteStream,
) -> impl futures::Stream<Item = Result<Fragment, SourceError>> + Send {
    struct State {
        source_id: SourceId,
        bytes_stream: Option<ByteStream>,
        decoder: SseDecoder,
        pending: VecDeque<Fragment>,
        failure: Option<SourceError>,
    }

    impl State {
        /// Queues the fragments of `frames`. Stops reading the body at `[DONE]`
        /// or at the first bad frame; fragments queued before it are still
        /// delivered ahead of the error.
        fn absorb(&mut self, frames: Vec<SseFrame>) {
            for frame in frames {
                match map_chat_frame(&self.source_id, &frame) {
                    Ok(ChunkOutcome::Fragment(fragment)) => self.pending.push_back(fragment),
                    Ok(ChunkOutcome::Skip) => {}
                    Ok(ChunkOutcome::Done) => {
                        self.bytes_stream = None;
                        return;
                    }
                    Err(err) => {
                        self.failure = Some(err);
                        self.bytes_stream = None;
                        return;
                    }
                }
            }
        }
    }

    stream::try_unfold(
        State {
            source_id,
            bytes_stream: Some(bytes_stream),
            decoder: SseDecoder::default(),
            pending: VecDeque::new(),
            failure: None,
        },
        |mut state| async move {
            loop {
                if let Some(fragment) = state.pending.pop_front() {
                    return Ok(Some((fragment, state)));
                }
                if let Some(err) = state.failure.take() {
                    return Err(err);
                }
                let Some(bytes_stream) = state.bytes_stream.as_mut() else {
                    return Ok(None);
                };

                let next = bytes_stream.next().await;
                match next {
                    Some(Ok(chunk)) => {
                        let frames = state.decoder.push_chunk(&chunk);
                        state.absorb(frames);
                    }
                    Some(Err(e)) => {
                        return Err(SourceError::transport(
                            state.source_id,
                            format!("streaming read failed: {e}"),
                        ));
                    }
                    None => {
                        state.bytes_stream = None;
                        let trailing = state.decoder.finish().into_iter().collect();
                        state.absorb(trailing);
                    }
                }
            }
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{ChatMessage, Role};
    use crate::{EventKind, EventSequencer, Message, RunId, RunInput, RunFailure};
    use std::sync::Arc;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const HELLO_SSE: &str = concat!(
        "data: {\"id\":\"c1\",\"choices\":[{\"index\":0,\"delta\":{\"role\":\"assistant\",\"content\":\"\"}}]}\n\n",
        "data: {\"id\":\"c1\",\"choices\":[{\"index\":0,\"delta\":{\"content\":\"He\"}}]}\n\n",
        "data: {\"id\":\"c1\",\"choices\":[{\"index\":0,\"delta\":{\"content\":\"llo\"}}]}\n\n",
        "data: {\"id\":\"c1\",\"choices\":[{\"index\":0,\"delta\":{},\"finish_reason\":\"stop\"}]}\n\n",
        "data: [DONE]\n\n",
    );

    fn source_for(server: &MockServer) -> OpenAiSource {
        let config = OpenAiClientConfig::new("sk-test").base_url(format!("{}/v1", server.uri()));
        OpenAiSource::new(config).expect("source")
    }

    fn hello_request() -> CompletionRequest {
        CompletionRequest {
            model: "gpt-test".into(),
            messages: vec![ChatMessage {
                role: Role::User,
                content: "hi".into(),
            }],
            stream: true,
        }
    }

    async fn collect_fragments(stream: FragmentStream) -> Vec<Result<Fragment, SourceError>> {
        stream.collect().await
    }

    #[test]
    fn empty_api_key_is_rejected() {
        let result = OpenAiSource::new(OpenAiClientConfig::new("  "));
        assert!(matches!(result, Err(SequencerError::Config(_))));
    }

    #[test]
    fn source_id_follows_backend() {
        let hosted = OpenAiSource::new(OpenAiClientConfig::new("sk")).expect("hosted");
        let local = OpenAiSource::new(OpenAiClientConfig::local()).expect("local");
        assert_eq!(hosted.id().as_str(), "openai");
        assert_eq!(local.id().as_str(), "ollama");
    }

    #[tokio::test]
    async fn streams_content_fragments_in_order() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .and(body_partial_json(serde_json::json!({
                "model": "gpt-test",
                "stream": true,
                "messages": [{"role": "user", "content": "hi"}]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_raw(HELLO_SSE, "text/event-stream"))
            .mount(&server)
            .await;

        let stream = source_for(&server)
            .stream_completion(hello_request())
            .await
            .expect("stream");
        let fragments = collect_fragments(stream).await;

        let texts = fragments
            .iter()
            .map(|f| f.as_ref().expect("fragment").text.as_str())
            .collect::<Vec<_>>();
        assert_eq!(texts, vec!["He", "llo"]);
        let raw = fragments[0].as_ref().expect("fragment").raw.as_ref();
        assert_eq!(raw.and_then(|v| v["id"].as_str()), Some("c1"));
    }

    #[tokio::test]
    async fn non_success_status_is_provider_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(401).set_body_string("invalid api key"))
            .mount(&server)
            .await;

        let err = match source_for(&server).stream_completion(hello_request()).await {
            Ok(_) => panic!("401 should fail"),
            Err(err) => err,
        };
        assert!(matches!(
            err,
            SourceError::Provider { status_code: Some(401), ref message, .. }
                if message.contains("invalid api key")
        ));
    }

    #[tokio::test]
    async fn unreachable_backend_is_transport_error() {
        let source = OpenAiSource::new(
            OpenAiClientConfig::new("sk-test").base_url("http://127.0.0.1:1/v1"),
        )
        .expect("source");
        let err = match source.stream_completion(hello_request()).await {
            Ok(_) => panic!("connection should fail"),
            Err(err) => err,
        };
        assert!(matches!(err, SourceError::Transport { .. }));
    }

    #[tokio::test]
    async fn malformed_chunk_fails_the_stream_after_earlier_fragments() {
        let server = MockServer::start().await;
        let body = concat!(
            "data: {\"choices\":[{\"delta\":{\"content\":\"ok\"}}]}\n\n",
            "data: {broken\n\n",
        );
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
            .mount(&server)
            .await;

        let stream = source_for(&server)
            .stream_completion(hello_request())
            .await
            .expect("stream");
        let fragments = collect_fragments(stream).await;

        assert_eq!(fragments.len(), 2);
        assert_eq!(fragments[0].as_ref().expect("fragment").text, "ok");
        assert!(matches!(fragments[1], Err(SourceError::Protocol { .. })));
    }

    #[tokio::test]
    async fn missing_done_sentinel_still_completes() {
        let server = MockServer::start().await;
        let body = "data: {\"choices\":[{\"delta\":{\"content\":\"tail\"}}]}";
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
            .mount(&server)
            .await;

        let stream = source_for(&server)
            .stream_completion(hello_request())
            .await
            .expect("stream");
        let fragments = collect_fragments(stream).await;

        assert_eq!(fragments.len(), 1);
        assert_eq!(fragments[0].as_ref().expect("fragment").text, "tail");
    }

    #[tokio::test]
    async fn slow_stream_outlasting_read_timeout_is_not_cut_off() {
        use tokio::io::{AsyncReadExt as _, AsyncWriteExt as _};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind");
        let addr = listener.local_addr().expect("addr");
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.expect("accept");
            let mut request = vec![0u8; 16 * 1024];
            let _ = socket.read(&mut request).await;
            socket
                .write_all(
                    b"HTTP/1.1 200 OK\r\ncontent-type: text/event-stream\r\ntransfer-encoding: chunked\r\n\r\n",
                )
                .await
                .expect("headers");
            for data in [
                r#"{"choices":[{"delta":{"content":"He"}}]}"#,
                r#"{"choices":[{"delta":{"content":"llo"}}]}"#,
                r#"{"choices":[{"delta":{"content":"!"}}]}"#,
                "[DONE]",
            ] {
                tokio::time::sleep(std::time::Duration::from_millis(200)).await;
                let frame = format!("data: {data}\n\n");
                let chunk = format!("{:x}\r\n{frame}\r\n", frame.len());
                socket.write_all(chunk.as_bytes()).await.expect("chunk");
            }
            socket.write_all(b"0\r\n\r\n").await.expect("trailer");
        });

        // Total body time (~800ms) exceeds the read timeout; each gap does not.
        let config = OpenAiClientConfig::new("sk-test")
            .base_url(format!("http://{addr}/v1"))
            .read_timeout(std::time::Duration::from_millis(500));
        let stream = OpenAiSource::new(config)
            .expect("source")
            .stream_completion(hello_request())
            .await
            .expect("stream");
        let fragments = collect_fragments(stream).await;

        let text: String = fragments
            .iter()
            .map(|f| f.as_ref().expect("fragment").text.as_str())
            .collect();
        assert_eq!(text, "Hello!");
    }

    #[tokio::test]
    async fn sequencer_over_http_source_emits_hello() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(HELLO_SSE, "text/event-stream"))
            .mount(&server)
            .await;

        let sequencer = EventSequencer::builder(Arc::new(source_for(&server)))
            .model("gpt-test")
            .message(Message::user("1", "hi"))
            .message(Message::new("2", "tool", "dropped"))
            .build()
            .expect("sequencer");
        let mut stream = sequencer.start(RunInput::new(RunId::parse("run1").expect("run id")));

        let mut kinds = Vec::new();
        let mut text = String::new();
        while let Some(item) = stream.next_event().await {
            let event = item.expect("no failure");
            if let Some(delta) = event.delta() {
                text.push_str(delta);
            }
            kinds.push(event.kind());
        }
        assert_eq!(text, "Hello");
        assert_eq!(kinds.first(), Some(&EventKind::RunStarted));
        assert_eq!(kinds.last(), Some(&EventKind::RunFinished));
    }

    #[tokio::test]
    async fn sequencer_surfaces_http_rejection_as_source_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("upstream down"))
            .mount(&server)
            .await;

        let sequencer = EventSequencer::builder(Arc::new(source_for(&server)))
            .model("gpt-test")
            .build()
            .expect("sequencer");
        let mut stream = sequencer.start(RunInput::new(RunId::parse("run1").expect("run id")));

        let mut failure = None;
        let mut count = 0;
        while let Some(item) = stream.next_event().await {
            match item {
                Ok(_) => count += 1,
                Err(err) => failure = Some(err),
            }
        }
        assert_eq!(count, 2);
        assert!(matches!(
            failure,
            Some(RunFailure::SourceUnavailable(SourceError::Provider {
                status_code: Some(500),
                ..
            }))
        ));
    }
}
