//! In-process stand-in for the decoding service.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

/// One request as received by the stub.
#[derive(Debug, Clone)]
pub struct CapturedRequest {
    pub request_line: String,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl CapturedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Minimal HTTP/1.1 server answering every request with one canned response.
pub struct StubService {
    base_url: String,
    requests: Arc<Mutex<Vec<CapturedRequest>>>,
    handle: JoinHandle<()>,
}

#[derive(Clone, Copy)]
enum Reply {
    Complete(u16, &'static str),
    /// Declares a longer body than it sends, then closes the connection.
    Truncated(u16, &'static str),
    Silent,
}

impl StubService {
    pub async fn start(status: u16, body: &'static str) -> Self {
        Self::spawn(Reply::Complete(status, body)).await
    }

    /// Answers with a body cut short, so reading it fails mid-stream.
    pub async fn truncated(status: u16, body: &'static str) -> Self {
        Self::spawn(Reply::Truncated(status, body)).await
    }

    /// Accepts connections and reads requests but never answers.
    pub async fn silent() -> Self {
        Self::spawn(Reply::Silent).await
    }

    async fn spawn(response: Reply) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());
        let requests = Arc::new(Mutex::new(Vec::new()));
        let captured = Arc::clone(&requests);

        let handle = tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((mut stream, _)) = listener.accept().await {
                let request = read_request(&mut stream).await;
                captured.lock().unwrap().push(request);

                let (status, body, declared) = match response {
                    Reply::Complete(status, body) => (status, body, body.len()),
                    Reply::Truncated(status, body) => (status, body, body.len() + 64),
                    Reply::Silent => {
                        held.push(stream);
                        continue;
                    }
                };
                let reply = format!(
                    "HTTP/1.1 {status} {}\r\ncontent-type: application/json\r\ncontent-length: {declared}\r\nconnection: close\r\n\r\n{body}",
                    reason(status),
                );
                let _ = stream.write_all(reply.as_bytes()).await;
                let _ = stream.shutdown().await;
            }
        });

        Self {
            base_url,
            requests,
            handle,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn requests(&self) -> Vec<CapturedRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl Drop for StubService {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        400 => "Bad Request",
        422 => "Unprocessable Entity",
        500 => "Internal Server Error",
        503 => "Service Unavailable",
        _ => "Status",
    }
}

async fn read_request(stream: &mut TcpStream) -> CapturedRequest {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 8192];

    loop {
        if let Some(header_end) = find_header_end(&buf) {
            let head = String::from_utf8_lossy(&buf[..header_end]).into_owned();
            let content_length = head
                .lines()
                .filter_map(|line| line.split_once(':'))
                .find(|(k, _)| k.trim().eq_ignore_ascii_case("content-length"))
                .and_then(|(_, v)| v.trim().parse::<usize>().ok())
                .unwrap_or(0);
            if buf.len() >= header_end + 4 + content_length {
                let mut lines = head.lines();
                let request_line = lines.next().unwrap_or_default().to_string();
                let headers = lines
                    .filter_map(|line| line.split_once(':'))
                    .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
                    .collect();
                let body_start = header_end + 4;
                let body = String::from_utf8_lossy(&buf[body_start..body_start + content_length])
                    .into_owned();
                return CapturedRequest {
                    request_line,
                    headers,
                    body,
                };
            }
        }

        let n = stream.read(&mut chunk).await.unwrap_or(0);
        if n == 0 {
            return CapturedRequest {
                request_line: String::new(),
                headers: Vec::new(),
                body: String::from_utf8_lossy(&buf).into_owned(),
            };
        }
        buf.extend_from_slice(&chunk[..n]);
    }
}

fn find_header_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n")
}
