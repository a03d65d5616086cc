// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! A thin, blocking HTTP/1.1 client speaking the same one-request-per-
//! connection framing as `gobby-daemon`'s `http` module (spec §6 "a local
//! HTTP endpoint"). The adapter binary is a short-lived process invoked once
//! per hook event, so a blocking `std::net::TcpStream` round trip needs no
//! async runtime of its own.

use std::io::{BufRead, BufReader, Read, Write};
use std::net::TcpStream;
use std::time::Duration;

use serde_json::Value;

use crate::error::{AdapterError, AdapterResult};

pub struct DaemonClient {
    addr: String,
    timeout: Duration,
}

impl DaemonClient {
    pub fn new(addr: impl Into<String>) -> Self {
        Self { addr: addr.into(), timeout: Duration::from_secs(10) }
    }

    /// POST a JSON body to `path` and parse the response body as JSON
    /// (spec §6: the daemon's hook response body "encodes a `HookResponse`").
    pub fn post_json(&self, path: &str, body: &Value) -> AdapterResult<Value> {
        let payload = serde_json::to_vec(body).map_err(|e| AdapterError::Malformed(e.to_string()))?;
        self.roundtrip("POST", path, Some(&payload))
    }

    /// GET `path` and parse the response body as JSON. Used by operator
    /// tooling (`gobby-cli`) for status and read-only queries.
    pub fn get_json(&self, path: &str) -> AdapterResult<Value> {
        self.roundtrip("GET", path, None)
    }

    fn roundtrip(&self, method: &str, path: &str, payload: Option<&[u8]>) -> AdapterResult<Value> {
        let mut stream = TcpStream::connect(&self.addr)
            .map_err(|e| AdapterError::Unreachable { addr: self.addr.clone(), source: e })?;
        stream.set_read_timeout(Some(self.timeout)).ok();
        stream.set_write_timeout(Some(self.timeout)).ok();

        let len = payload.map(<[u8]>::len).unwrap_or(0);
        let header = format!(
            "{method} {path} HTTP/1.1\r\nHost: localhost\r\nContent-Type: application/json\r\nContent-Length: {len}\r\nConnection: close\r\n\r\n",
        );
        stream.write_all(header.as_bytes())?;
        if let Some(payload) = payload {
            stream.write_all(payload)?;
        }
        stream.flush()?;

        let mut reader = BufReader::new(stream);
        let mut status_line = String::new();
        reader.read_line(&mut status_line)?;
        let status: u16 = status_line
            .split_whitespace()
            .nth(1)
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| AdapterError::BadResponse("malformed status line".into()))?;

        let mut content_length = 0usize;
        loop {
            let mut line = String::new();
            reader.read_line(&mut line)?;
            let trimmed = line.trim_end_matches(['\r', '\n']);
            if trimmed.is_empty() {
                break;
            }
            if let Some((key, value)) = trimmed.split_once(':') {
                if key.trim().eq_ignore_ascii_case("content-length") {
                    content_length = value.trim().parse().unwrap_or(0);
                }
            }
        }

        let mut body = vec![0u8; content_length];
        reader.read_exact(&mut body)?;

        if !(200..300).contains(&status) {
            return Err(AdapterError::BadResponse(format!(
                "daemon returned status {status}: {}",
                String::from_utf8_lossy(&body)
            )));
        }
        serde_json::from_slice(&body).map_err(|e| AdapterError::BadResponse(e.to_string()))
    }
}
