//! In-process stand-in for the Dify API
//!
//! A plain `std::net::TcpListener` on a background thread that records every
//! request and answers each one the same way: a canned response, or headers
//! followed by a body that never finishes.

use std::io::{BufRead, BufReader, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use reqwest::StatusCode;

/// A request as seen by the mock upstream
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    /// Path plus query string, e.g. `/v1/datasets?keyword=a`
    pub target: String,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl RecordedRequest {
    /// Case-insensitive header lookup
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Path without the query string
    pub fn path(&self) -> &str {
        self.target.split('?').next().unwrap_or_default()
    }

    /// Query string, if any
    pub fn query(&self) -> Option<&str> {
        self.target.split_once('?').map(|(_, q)| q)
    }
}

/// How the mock answers each request
#[derive(Debug, Clone)]
enum Reply {
    /// A complete response
    Full { status: u16, body: String },
    /// `200` headers and part of the body, then silence
    StallBody,
}

/// How long a stalled response keeps its connection open
const STALL_HOLD: Duration = Duration::from_secs(5);

/// Mock upstream bound to a localhost port
pub struct MockUpstream {
    port: u16,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl MockUpstream {
    /// Answer every request with `status` and `body`
    pub fn respond(status: u16, body: impl Into<String>) -> Self {
        Self::respond_on(0, status, body)
    }

    /// Like `respond`, bound to a given port (`0` picks an ephemeral one)
    pub fn respond_on(port: u16, status: u16, body: impl Into<String>) -> Self {
        let reply = Reply::Full {
            status,
            body: body.into(),
        };
        Self::start(port, reply)
    }

    /// Send success headers and a truncated body, then stop talking
    pub fn stall_body() -> Self {
        Self::start(0, Reply::StallBody)
    }

    fn start(port: u16, reply: Reply) -> Self {
        let listener = TcpListener::bind(("127.0.0.1", port)).expect("bind mock upstream");
        let port = listener.local_addr().expect("mock upstream addr").port();
        let requests = Arc::new(Mutex::new(Vec::new()));

        let recorded = Arc::clone(&requests);
        std::thread::Builder::new()
            .name("mock-upstream".into())
            .spawn(move || {
                for stream in listener.incoming() {
                    let Ok(stream) = stream else { break };
                    let reply = reply.clone();
                    let recorded = Arc::clone(&recorded);
                    // Stalled connections must not block the next accept.
                    std::thread::spawn(move || serve_one(stream, &reply, &recorded));
                }
            })
            .expect("spawn mock upstream");

        Self { port, requests }
    }

    /// Base URL in the shape of `DIFY_API_URL`
    pub fn url(&self) -> String {
        format!("http://127.0.0.1:{}/v1", self.port)
    }

    /// Requests received so far
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

/// A base URL nothing is listening on
pub fn refused_url() -> String {
    let listener = TcpListener::bind(("127.0.0.1", 0)).expect("bind ephemeral port");
    let port = listener.local_addr().expect("ephemeral addr").port();
    drop(listener);
    format!("http://127.0.0.1:{port}/v1")
}

fn serve_one(stream: TcpStream, reply: &Reply, recorded: &Mutex<Vec<RecordedRequest>>) -> Option<()> {
    let mut reader = BufReader::new(stream.try_clone().ok()?);

    let mut request_line = String::new();
    reader.read_line(&mut request_line).ok()?;
    let mut parts = request_line.split_whitespace();
    let method = parts.next()?.to_string();
    let target = parts.next()?.to_string();

    let mut headers = Vec::new();
    loop {
        let mut line = String::new();
        reader.read_line(&mut line).ok()?;
        let line = line.trim_end();
        if line.is_empty() {
            break;
        }
        if let Some((name, value)) = line.split_once(':') {
            headers.push((name.trim().to_string(), value.trim().to_string()));
        }
    }

    let content_length = headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case("content-length"))
        .and_then(|(_, v)| v.parse::<usize>().ok())
        .unwrap_or(0);
    let mut raw_body = vec![0; content_length];
    reader.read_exact(&mut raw_body).ok()?;

    // Record before answering so callers see the request once they have the response.
    recorded
        .lock()
        .unwrap_or_else(|e| e.into_inner())
        .push(RecordedRequest {
            method,
            target,
            headers,
            body: String::from_utf8_lossy(&raw_body).into_owned(),
        });

    let mut stream = stream;
    match reply {
        Reply::Full { status, body } => {
            let reason = StatusCode::from_u16(*status)
                .ok()
                .and_then(|s| s.canonical_reason())
                .unwrap_or("Unknown");
            let response = format!(
                "HTTP/1.1 {status} {reason}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            stream.write_all(response.as_bytes()).ok()?;
            stream.flush().ok()
        }
        Reply::StallBody => {
            let partial = "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: 100\r\n\r\n{\"records\":";
            stream.write_all(partial.as_bytes()).ok()?;
            stream.flush().ok()?;
            std::thread::sleep(STALL_HOLD);
            Some(())
        }
    }
}
