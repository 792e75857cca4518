//! Fixtures shared by unit tests: a scripted chat backend and a tiny HTTP/1.1
//! server that replays canned responses.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::{self, StreamExt};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

use crate::api::ChatRequest;
use crate::core::chat_stream::{ChatBackend, ChunkStream};
use crate::core::error::TurnError;

/// Replays one list of chunks per `open_stream` call and records each
/// request body as JSON.
#[derive(Default)]
pub struct ScriptedBackend {
    scripts: Mutex<VecDeque<Vec<Vec<u8>>>>,
    requests: Mutex<Vec<serde_json::Value>>,
}

impl ScriptedBackend {
    pub fn new<I, S>(scripts: I) -> Self
    where
        I: IntoIterator<Item = Vec<S>>,
        S: Into<String>,
    {
        let scripts = scripts
            .into_iter()
            .map(|chunks| {
                chunks
                    .into_iter()
                    .map(|chunk| chunk.into().into_bytes())
                    .collect()
            })
            .collect();
        Self {
            scripts: Mutex::new(scripts),
            requests: Mutex::default(),
        }
    }

    pub fn from_bytes(scripts: Vec<Vec<Vec<u8>>>) -> Self {
        Self {
            scripts: Mutex::new(scripts.into()),
            requests: Mutex::default(),
        }
    }

    pub fn requests(&self) -> Vec<serde_json::Value> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatBackend for ScriptedBackend {
    async fn open_stream(&self, request: ChatRequest) -> Result<ChunkStream, TurnError> {
        self.requests
            .lock()
            .unwrap()
            .push(serde_json::to_value(&request).unwrap());
        let chunks = self
            .scripts
            .lock()
            .unwrap()
            .pop_front()
            .expect("scripted backend ran out of streams");
        Ok(stream::iter(chunks.into_iter().map(Ok)).boxed())
    }
}

/// HTTP client that ignores proxy settings from the environment.
pub fn test_client() -> reqwest::Client {
    reqwest::Client::builder()
        .no_proxy()
        .build()
        .expect("test client should build")
}

#[derive(Debug, Clone)]
pub struct CapturedRequest {
    pub request_line: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl CapturedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

#[derive(Debug, Clone)]
pub enum MockResponse {
    Json { status: u16, body: String },
    Chunked { chunks: Vec<String>, delay: Duration },
}

impl MockResponse {
    pub fn json(body: serde_json::Value) -> Self {
        MockResponse::Json {
            status: 200,
            body: body.to_string(),
        }
    }

    pub fn status(status: u16, body: &str) -> Self {
        MockResponse::Json {
            status,
            body: body.to_string(),
        }
    }

    pub fn chunked<S: Into<String>>(chunks: impl IntoIterator<Item = S>) -> Self {
        MockResponse::Chunked {
            chunks: chunks.into_iter().map(Into::into).collect(),
            delay: Duration::from_millis(15),
        }
    }
}

/// Serves the queued responses in order, one per connection, and answers
/// 500 once they run out. Every request is captured.
pub struct MockServer {
    pub base_url: String,
    requests: Arc<Mutex<Vec<CapturedRequest>>>,
    task: JoinHandle<()>,
}

impl MockServer {
    pub async fn start(responses: Vec<MockResponse>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("listener should bind");
        let addr = listener.local_addr().expect("local addr should resolve");
        let requests = Arc::new(Mutex::new(Vec::new()));
        let captured = Arc::clone(&requests);
        let mut queue: VecDeque<MockResponse> = responses.into();

        let task = tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else {
                    return;
                };
                let Ok(request) = read_http_request(&mut socket).await else {
                    continue;
                };
                captured.lock().unwrap().push(request);
                let response = queue
                    .pop_front()
                    .unwrap_or_else(|| MockResponse::status(500, "no response queued"));
                let _ = write_response(&mut socket, response).await;
            }
        });

        Self {
            base_url: format!("http://{addr}"),
            requests,
            task,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub fn requests(&self) -> Vec<CapturedRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl Drop for MockServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn write_response(socket: &mut TcpStream, response: MockResponse) -> std::io::Result<()> {
    match response {
        MockResponse::Json { status, body } => {
            let head = format!(
                "HTTP/1.1 {status} Mock\r\ncontent-type: application/json\r\nconnection: close\r\ncontent-length: {}\r\n\r\n",
                body.len()
            );
            socket.write_all(head.as_bytes()).await?;
            socket.write_all(body.as_bytes()).await?;
        }
        MockResponse::Chunked { chunks, delay } => {
            socket
                .write_all(
                    b"HTTP/1.1 200 OK\r\ncontent-type: text/plain; charset=utf-8\r\nconnection: close\r\ntransfer-encoding: chunked\r\n\r\n",
                )
                .await?;
            for chunk in chunks {
                let frame = format!("{:x}\r\n{}\r\n", chunk.len(), chunk);
                socket.write_all(frame.as_bytes()).await?;
                socket.flush().await?;
                tokio::time::sleep(delay).await;
            }
            socket.write_all(b"0\r\n\r\n").await?;
        }
    }
    socket.flush().await?;
    socket.shutdown().await
}

async fn read_http_request(stream: &mut TcpStream) -> Result<CapturedRequest, String> {
    let mut buffer = Vec::new();
    let mut header_end = None;
    while header_end.is_none() {
        let mut chunk = [0_u8; 1024];
        let read = stream.read(&mut chunk).await.map_err(|err| err.to_string())?;
        if read == 0 {
            return Err("Unexpected EOF while reading HTTP headers".to_string());
        }
        buffer.extend_from_slice(&chunk[..read]);
        header_end = buffer
            .windows(4)
            .position(|window| window == b"\r\n\r\n")
            .map(|index| index + 4);
    }

    let header_end = header_end.expect("header end should exist");
    let header_text =
        std::str::from_utf8(&buffer[..header_end]).map_err(|err| err.to_string())?;
    let mut lines = header_text.split("\r\n").filter(|line| !line.is_empty());
    let request_line = lines
        .next()
        .ok_or_else(|| "Missing HTTP request line".to_string())?
        .to_string();

    let mut headers = Vec::new();
    let mut content_length = 0_usize;
    let mut chunked = false;
    for line in lines {
        let mut parts = line.splitn(2, ':');
        let Some(name) = parts.next() else {
            continue;
        };
        let value = parts.next().unwrap_or_default().trim().to_string();
        if name.eq_ignore_ascii_case("content-length") {
            content_length = value.parse::<usize>().map_err(|err| err.to_string())?;
        }
        if name.eq_ignore_ascii_case("transfer-encoding") && value.eq_ignore_ascii_case("chunked")
        {
            chunked = true;
        }
        headers.push((name.to_string(), value));
    }

    let mut body = buffer[header_end..].to_vec();
    if chunked {
        while !body.windows(5).any(|window| window == b"0\r\n\r\n") {
            read_more(stream, &mut body).await?;
        }
        body = decode_chunked_body(&body)?;
    } else {
        while body.len() < content_length {
            read_more(stream, &mut body).await?;
        }
        body.truncate(content_length);
    }

    Ok(CapturedRequest {
        request_line,
        headers,
        body,
    })
}

async fn read_more(stream: &mut TcpStream, body: &mut Vec<u8>) -> Result<(), String> {
    let mut chunk = [0_u8; 4096];
    let read = stream.read(&mut chunk).await.map_err(|err| err.to_string())?;
    if read == 0 {
        return Err("Unexpected EOF while reading HTTP body".to_string());
    }
    body.extend_from_slice(&chunk[..read]);
    Ok(())
}

fn decode_chunked_body(raw: &[u8]) -> Result<Vec<u8>, String> {
    let mut decoded = Vec::new();
    let mut rest = raw;
    loop {
        let line_end = rest
            .windows(2)
            .position(|window| window == b"\r\n")
            .ok_or_else(|| "Malformed chunk header".to_string())?;
        let size_text = std::str::from_utf8(&rest[..line_end]).map_err(|err| err.to_string())?;
        let size = usize::from_str_radix(size_text.split(';').next().unwrap_or("0").trim(), 16)
            .map_err(|err| err.to_string())?;
        rest = &rest[line_end + 2..];
        if size == 0 {
            return Ok(decoded);
        }
        if rest.len() < size + 2 {
            return Err("Truncated chunk".to_string());
        }
        decoded.extend_from_slice(&rest[..size]);
        rest = &rest[size + 2..];
    }
}
