//! HTTP server for the dashboard
//! Simple HTTP/1.1 server using tokio and basic request handling.
//!
//! Connections are served one at a time: a submission holds the server until
//! the model call, the query and the chart are done. A connection that does
//! not deliver its request within the read timeout is dropped.

use crate::agent::{InsightsAgent, Submission};
use crate::config::TrackerConfig;
use crate::dashboard::{self, DASHBOARD_HTML, OVERVIEW_SAMPLE_ROWS};
use crate::error::{InsightsError, Result};
use crate::llm::ChatModel;
use crate::ticket::{TicketClient, TicketRequest};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info, warn};

const MAX_HEADER_LINES: usize = 100;
const MAX_BODY_BYTES: usize = 1024 * 1024;

/// How long a connection may take to send its request.
pub const REQUEST_READ_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: String,
    pub path: String,
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    pub content_type: &'static str,
    pub body: String,
}

impl HttpResponse {
    pub fn json<T: Serialize>(status: u16, value: &T) -> Self {
        let body = serde_json::to_string(value)
            .unwrap_or_else(|_| r#"{"error":"Failed to serialize response"}"#.to_string());
        Self {
            status,
            content_type: "application/json",
            body,
        }
    }

    pub fn error(status: u16, message: &str) -> Self {
        Self::json(status, &serde_json::json!({ "error": message }))
    }

    pub fn html(body: &str) -> Self {
        Self {
            status: 200,
            content_type: "text/html; charset=utf-8",
            body: body.to_string(),
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        format!(
            "HTTP/1.1 {} {}\r\n\
             Content-Type: {}\r\n\
             Content-Length: {}\r\n\
             Connection: close\r\n\
             \r\n\
             {}",
            self.status,
            reason_phrase(self.status),
            self.content_type,
            self.body.len(),
            self.body
        )
        .into_bytes()
    }
}

fn reason_phrase(status: u16) -> &'static str {
    match status {
        200 => "OK",
        201 => "Created",
        400 => "Bad Request",
        404 => "Not Found",
        413 => "Payload Too Large",
        500 => "Internal Server Error",
        502 => "Bad Gateway",
        _ => "Unknown",
    }
}

/// Read one request: request line, headers, then `Content-Length` bytes of body.
/// Returns `None` when the peer closed the connection before sending anything.
pub async fn read_request<R>(reader: &mut R) -> Result<Option<HttpRequest>>
where
    R: AsyncBufRead + Unpin,
{
    let mut request_line = String::new();
    if reader.read_line(&mut request_line).await? == 0 {
        return Ok(None);
    }

    let mut parts = request_line.split_whitespace();
    let (method, target) = match (parts.next(), parts.next()) {
        (Some(method), Some(target)) => (method.to_string(), target.to_string()),
        _ => return Err(bad_request("malformed request line")),
    };

    let mut headers = HashMap::new();
    for _ in 0..MAX_HEADER_LINES {
        let mut line = String::new();
        if reader.read_line(&mut line).await? == 0 {
            break;
        }
        let line = line.trim_end();
        if line.is_empty() {
            break;
        }
        if let Some((key, value)) = line.split_once(':') {
            headers.insert(key.trim().to_lowercase(), value.trim().to_string());
        }
    }

    let length = match headers.get("content-length") {
        Some(raw) => raw
            .parse::<usize>()
            .map_err(|_| bad_request("invalid Content-Length"))?,
        None => 0,
    };
    if length > MAX_BODY_BYTES {
        return Err(bad_request("request body too large"));
    }

    let mut body = vec![0; length];
    reader.read_exact(&mut body).await?;

    Ok(Some(HttpRequest {
        method,
        path: normalize_path(&target),
        headers,
        body,
    }))
}

fn bad_request(message: &str) -> InsightsError {
    InsightsError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, message.to_string()))
}

/// Drop the query string and any trailing slash (except for root).
fn normalize_path(target: &str) -> String {
    let path = target.split('?').next().unwrap_or("");
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        trimmed.to_string()
    }
}

#[derive(Debug, Deserialize)]
struct AskBody {
    question: String,
}

pub struct DashboardServer<M: ChatModel> {
    agent: InsightsAgent<M>,
    tracker: TrackerConfig,
    read_timeout: Duration,
}

impl<M: ChatModel> DashboardServer<M> {
    pub fn new(agent: InsightsAgent<M>, tracker: TrackerConfig) -> Self {
        Self {
            agent,
            tracker,
            read_timeout: REQUEST_READ_TIMEOUT,
        }
    }

    pub fn with_read_timeout(mut self, read_timeout: Duration) -> Self {
        self.read_timeout = read_timeout;
        self
    }

    /// Accept and serve connections one after another until the listener fails.
    pub async fn serve(&self, listener: TcpListener) -> Result<()> {
        info!("Dashboard listening on http://{}", listener.local_addr()?);
        loop {
            let (stream, addr) = listener.accept().await?;
            debug!("New connection from: {}", addr);
            self.handle_connection(stream).await;
        }
    }

    async fn handle_connection(&self, stream: TcpStream) {
        let mut reader = BufReader::new(stream);
        let read = tokio::time::timeout(self.read_timeout, read_request(&mut reader)).await;
        let response = match read {
            Ok(Ok(Some(request))) => self.handle_request(&request).await,
            Ok(Ok(None)) => return,
            Ok(Err(e)) => {
                warn!("Failed to read request: {}", e);
                HttpResponse::error(400, &e.to_string())
            }
            Err(_) => {
                warn!("No request within {:?}, dropping connection", self.read_timeout);
                return;
            }
        };

        let mut stream = reader.into_inner();
        if let Err(e) = stream.write_all(&response.to_bytes()).await {
            error!("Failed to write response: {}", e);
        }
        let _ = stream.shutdown().await;
    }

    pub async fn handle_request(&self, request: &HttpRequest) -> HttpResponse {
        debug!("Request: {} {}", request.method, request.path);

        match (request.method.as_str(), request.path.as_str()) {
            ("GET", "/") | ("GET", "/index.html") => HttpResponse::html(DASHBOARD_HTML),
            ("GET", "/api/health") => HttpResponse::json(
                200,
                &serde_json::json!({"status": "ok", "service": "order-insights"}),
            ),
            ("GET", "/api/overview") => {
                let overview = self.agent.store().overview(OVERVIEW_SAMPLE_ROWS);
                HttpResponse::json(200, &dashboard::render_overview(overview))
            }
            ("POST", "/api/ask") => self.ask(&request.body).await,
            ("POST", "/api/tickets") => self.file_ticket(&request.body).await,
            (method, path) => {
                warn!("404: {} {} not found", method, path);
                HttpResponse::error(404, &format!("Endpoint not found: {} {}", method, path))
            }
        }
    }

    async fn ask(&self, body: &[u8]) -> HttpResponse {
        let ask: AskBody = match serde_json::from_slice(body) {
            Ok(ask) => ask,
            Err(e) => return HttpResponse::error(400, &format!("Invalid request body: {}", e)),
        };

        let mut submission = Submission::new();
        let outcome = self.agent.run(&mut submission, &ask.question).await;
        if let Err(e) = &outcome {
            error!("Submission {} failed: {}", submission.id, e);
        }
        let response = dashboard::render_outcome(&mut submission, &ask.question, outcome);
        HttpResponse::json(200, &response)
    }

    async fn file_ticket(&self, body: &[u8]) -> HttpResponse {
        let ticket: TicketRequest = match serde_json::from_slice(body) {
            Ok(ticket) => ticket,
            Err(e) => return HttpResponse::error(400, &format!("Invalid request body: {}", e)),
        };

        let result = match TicketClient::from_config(&self.tracker) {
            Ok(client) => client.create_ticket(&ticket.title, &ticket.body).await,
            Err(e) => Err(e),
        };
        let (status, view) = dashboard::render_ticket(result);
        HttpResponse::json(status, &view)
    }
}
