// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Minimal HTTP/1.1 request/response framer over `tokio::net::TcpListener`
//! (spec §6 "a local HTTP endpoint"). The teacher depends on no web
//! framework — it hand-rolls a length-prefixed protocol one layer down
//! (`daemon/protocol/wire.rs`); this is the same read-then-dispatch loop
//! shape one layer up: request-line + headers terminated by `\r\n\r\n`,
//! body read via `Content-Length`.

use std::collections::HashMap;

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};

#[derive(Debug, Error)]
pub enum HttpError {
    #[error("connection closed before a complete request was read")]
    Eof,
    #[error("malformed request line")]
    MalformedRequestLine,
    #[error("malformed header")]
    MalformedHeader,
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub struct HttpRequest {
    pub method: String,
    pub path: String,
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
}

pub struct HttpResponse {
    pub status: u16,
    pub reason: &'static str,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn json(status: u16, reason: &'static str, body: &[u8]) -> Self {
        Self { status, reason, body: body.to_vec() }
    }

    pub fn ok_json(body: &[u8]) -> Self {
        Self::json(200, "OK", body)
    }

    pub fn bad_request(message: &str) -> Self {
        Self::json(400, "Bad Request", message.as_bytes())
    }

    pub fn not_found() -> Self {
        Self::json(404, "Not Found", b"not found")
    }

    pub fn internal_error(message: &str) -> Self {
        Self::json(500, "Internal Server Error", message.as_bytes())
    }
}

async fn read_line<R: AsyncRead + Unpin>(reader: &mut BufReader<R>) -> Result<String, HttpError> {
    use tokio::io::AsyncBufReadExt;
    let mut line = String::new();
    let n = reader.read_line(&mut line).await?;
    if n == 0 {
        return Err(HttpError::Eof);
    }
    while line.ends_with('\n') || line.ends_with('\r') {
        line.pop();
    }
    Ok(line)
}

/// Read one HTTP/1.1 request: request-line, headers up to the blank line,
/// then a `Content-Length`-sized body (defaulting to no body if absent).
pub async fn read_request<R: AsyncRead + Unpin>(
    reader: &mut BufReader<R>,
) -> Result<HttpRequest, HttpError> {
    let request_line = read_line(reader).await?;
    let mut parts = request_line.split_whitespace();
    let method = parts.next().ok_or(HttpError::MalformedRequestLine)?.to_string();
    let path = parts.next().ok_or(HttpError::MalformedRequestLine)?.to_string();

    let mut headers = HashMap::new();
    loop {
        let line = read_line(reader).await?;
        if line.is_empty() {
            break;
        }
        let (key, value) = line.split_once(':').ok_or(HttpError::MalformedHeader)?;
        headers.insert(key.trim().to_ascii_lowercase(), value.trim().to_string());
    }

    let content_length: usize =
        headers.get("content-length").and_then(|v| v.parse().ok()).unwrap_or(0);
    let mut body = vec![0u8; content_length];
    if content_length > 0 {
        reader.read_exact(&mut body).await?;
    }

    Ok(HttpRequest { method, path, headers, body })
}

/// Write one HTTP/1.1 response, closing the connection after (the pipeline
/// is one-request-per-connection, matching the CLI adapters' short-lived
/// POST-and-exit usage pattern).
pub async fn write_response<W: AsyncWrite + Unpin>(
    writer: &mut W,
    response: HttpResponse,
) -> Result<(), HttpError> {
    let header = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        response.status,
        response.reason,
        response.body.len()
    );
    writer.write_all(header.as_bytes()).await?;
    writer.write_all(&response.body).await?;
    writer.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::BufReader;

    #[tokio::test]
    async fn reads_request_line_headers_and_body() {
        let raw = b"POST /hook HTTP/1.1\r\nContent-Length: 5\r\nHost: local\r\n\r\nhello";
        let mut reader = BufReader::new(&raw[..]);
        let req = read_request(&mut reader).await.unwrap();
        assert_eq!(req.method, "POST");
        assert_eq!(req.path, "/hook");
        assert_eq!(req.body, b"hello");
        assert_eq!(req.headers.get("host").map(String::as_str), Some("local"));
    }

    #[tokio::test]
    async fn request_with_no_body_is_empty() {
        let raw = b"GET /status HTTP/1.1\r\n\r\n";
        let mut reader = BufReader::new(&raw[..]);
        let req = read_request(&mut reader).await.unwrap();
        assert!(req.body.is_empty());
    }

    #[tokio::test]
    async fn write_response_frames_content_length() {
        let mut buf = Vec::new();
        write_response(&mut buf, HttpResponse::ok_json(b"{}")).await.unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(text.contains("Content-Length: 2"));
        assert!(text.ends_with("{}"));
    }
}
