use async_trait::async_trait;
use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::api::{ChatRequest, FUNCTION_CALL_PREFIX};
use crate::core::conversation::{Conversation, OpenMessage};
use crate::core::error::TurnError;
use crate::core::message::Message;

/// Raw response body chunks, in arrival order.
pub type ChunkStream = BoxStream<'static, Result<Vec<u8>, TurnError>>;

/// Source of streamed chat completions.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Sends `request` and returns the response body as it arrives.
    /// Dropping the stream aborts the request.
    async fn open_stream(&self, request: ChatRequest) -> Result<ChunkStream, TurnError>;
}

/// Chat endpoint that answers a POST of `{messages, model}` with a chunked
/// plain-text body.
#[derive(Clone, Debug)]
pub struct HttpChatBackend {
    client: reqwest::Client,
    chat_url: String,
}

impl HttpChatBackend {
    pub fn new(client: reqwest::Client, chat_url: impl Into<String>) -> Self {
        Self {
            client,
            chat_url: chat_url.into(),
        }
    }

    pub fn chat_url(&self) -> &str {
        &self.chat_url
    }
}

#[async_trait]
impl ChatBackend for HttpChatBackend {
    async fn open_stream(&self, request: ChatRequest) -> Result<ChunkStream, TurnError> {
        debug!(url = %self.chat_url, model = %request.model, messages = request.messages.len(), "Opening chat stream");
        let response = self
            .client
            .post(&self.chat_url)
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|err| TurnError::transport("chat", err))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(TurnError::status("chat", status, &error_text));
        }

        Ok(response
            .bytes_stream()
            .map(|chunk| {
                chunk
                    .map(|bytes| bytes.to_vec())
                    .map_err(|err| TurnError::transport("chat", err))
            })
            .boxed())
    }
}

/// Incremental UTF-8 decoding that holds back a code point split across
/// chunk boundaries. Invalid sequences become U+FFFD.
#[derive(Debug, Default)]
pub struct Utf8ChunkDecoder {
    pending: Vec<u8>,
}

impl Utf8ChunkDecoder {
    pub fn decode(&mut self, bytes: &[u8]) -> String {
        self.pending.extend_from_slice(bytes);
        let mut out = String::new();
        let mut consumed = 0;
        loop {
            match std::str::from_utf8(&self.pending[consumed..]) {
                Ok(valid) => {
                    out.push_str(valid);
                    consumed = self.pending.len();
                    break;
                }
                Err(err) => {
                    let valid_end = consumed + err.valid_up_to();
                    out.push_str(&String::from_utf8_lossy(&self.pending[consumed..valid_end]));
                    match err.error_len() {
                        Some(len) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            consumed = valid_end + len;
                        }
                        None => {
                            consumed = valid_end;
                            break;
                        }
                    }
                }
            }
        }
        self.pending.drain(..consumed);
        out
    }

    /// Flushes bytes left over at end of stream.
    pub fn finish(&mut self) -> String {
        let tail = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        tail
    }
}

/// Per-stream decoding state. Lives for exactly one decoder run.
#[derive(Debug, Default)]
struct StreamSession {
    cancelled: bool,
    accumulated: String,
    is_function_prefix: bool,
    first_chunk_seen: bool,
    chunks: usize,
}

impl StreamSession {
    fn accept(
        &mut self,
        text: &str,
        conversation: &mut Conversation,
        open: &mut Option<OpenMessage>,
    ) {
        if text.is_empty() {
            return;
        }
        self.accumulated.push_str(text);
        self.chunks += 1;

        if !self.first_chunk_seen {
            // The first chunk decides what this stream is. Never revisited.
            self.first_chunk_seen = true;
            self.is_function_prefix = text.starts_with(FUNCTION_CALL_PREFIX);
            let message = if self.is_function_prefix {
                conversation.set_function_call(true);
                Message::function_call(text)
            } else {
                Message::assistant(text)
            };
            *open = Some(conversation.open_message(message));
        } else if let Some(handle) = open.as_ref() {
            conversation.replace_open(handle, &self.accumulated);
        }
    }
}

/// Result of one decoder run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamOutcome {
    pub text: String,
    /// Whether the first chunk carried the function-call prefix.
    pub function_call: bool,
    pub cancelled: bool,
    pub chunks: usize,
}

impl From<StreamSession> for StreamOutcome {
    fn from(session: StreamSession) -> Self {
        Self {
            text: session.accumulated,
            function_call: session.is_function_prefix,
            cancelled: session.cancelled,
            chunks: session.chunks,
        }
    }
}

/// Requests a completion for the whole conversation and streams it into a
/// new message at the end of the log.
///
/// A cancellation is not an error: the outcome carries whatever arrived
/// before it with `cancelled` set.
pub async fn stream_completion(
    backend: &dyn ChatBackend,
    conversation: &mut Conversation,
    model: &str,
    cancel: &CancellationToken,
) -> Result<StreamOutcome, TurnError> {
    let request = ChatRequest {
        messages: conversation.api_messages(),
        model: model.to_string(),
    };

    let stream = tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            debug!("Chat stream cancelled before the response arrived");
            return Ok(StreamOutcome::from(StreamSession {
                cancelled: true,
                ..StreamSession::default()
            }));
        }
        opened = backend.open_stream(request) => opened?,
    };

    decode_stream(stream, conversation, cancel).await
}

/// Reads `stream` to the end, or until `cancel` fires, materializing the
/// text into the conversation as it goes.
pub async fn decode_stream(
    mut stream: ChunkStream,
    conversation: &mut Conversation,
    cancel: &CancellationToken,
) -> Result<StreamOutcome, TurnError> {
    let mut session = StreamSession::default();
    let mut decoder = Utf8ChunkDecoder::default();
    let mut open: Option<OpenMessage> = None;

    loop {
        if cancel.is_cancelled() {
            session.cancelled = true;
            break;
        }

        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                session.cancelled = true;
                break;
            }
            next = stream.next() => next,
        };

        match next {
            Some(Ok(bytes)) => {
                let text = decoder.decode(&bytes);
                session.accept(&text, conversation, &mut open);
            }
            Some(Err(err)) => {
                if let Some(handle) = open.take() {
                    conversation.close(handle);
                }
                return Err(err);
            }
            None => {
                let tail = decoder.finish();
                session.accept(&tail, conversation, &mut open);
                break;
            }
        }
    }

    // Dropping the body aborts the request if it is still running.
    drop(stream);
    if let Some(handle) = open.take() {
        conversation.close(handle);
    }

    debug!(
        chunks = session.chunks,
        bytes = session.accumulated.len(),
        function_call = session.is_function_prefix,
        cancelled = session.cancelled,
        "Chat stream finished"
    );
    Ok(session.into())
}
