#![allow(dead_code)]

use async_trait::async_trait;
use order_insights::error::{InsightsError, Result};
use order_insights::llm::{ChatCompletion, ChatMessage, ChatModel, FinishReason, FunctionCall, ToolCall, ToolDefinition};
use order_insights::server::{read_request, HttpRequest, HttpResponse};
use rusqlite::Connection;
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncWriteExt, BufReader};
use tokio::net::TcpListener;

/// Create a populated orders database in the temp directory.
pub fn orders_db(name: &str) -> PathBuf {
    let path = std::env::temp_dir().join(format!(
        "order_insights_{}_{}.db",
        name,
        uuid::Uuid::new_v4()
    ));
    let conn = Connection::open(&path).unwrap();
    conn.execute_batch(
        "CREATE TABLE orders (
            id INTEGER PRIMARY KEY,
            customer_name TEXT,
            item TEXT,
            quantity INTEGER,
            price REAL,
            date TEXT
        );
        INSERT INTO orders VALUES (1, 'Ali', 'Margherita', 2, 10.0, '2024-03-01');
        INSERT INTO orders VALUES (2, 'Malika', 'Pepperoni', 4, 12.5, '2024-03-01');
        INSERT INTO orders VALUES (3, 'Timur', 'Margherita', 3, 10.0, '2024-03-02');
        INSERT INTO orders VALUES (4, 'Nodira', 'Four Cheese', 1, 14.0, '2024-03-02');
        INSERT INTO orders VALUES (5, 'Jasur', 'Pepperoni', 5, 12.5, '2024-03-03');
        INSERT INTO orders VALUES (6, 'Kamola', 'BBQ Chicken', 2, 13.0, '2024-03-04');",
    )
    .unwrap();
    path
}

pub fn tool_call(name: &str, arguments: &str) -> ChatCompletion {
    ChatCompletion {
        finish_reason: FinishReason::ToolCalls,
        content: None,
        tool_calls: vec![ToolCall {
            id: "call_1".to_string(),
            function: FunctionCall {
                name: name.to_string(),
                arguments: arguments.to_string(),
            },
        }],
    }
}

pub fn text_reply(text: &str) -> ChatCompletion {
    ChatCompletion {
        finish_reason: FinishReason::Stop,
        content: Some(text.to_string()),
        tool_calls: Vec::new(),
    }
}

/// Chat model that replays canned completions in order.
#[derive(Default)]
pub struct ScriptedModel {
    replies: Mutex<VecDeque<Result<ChatCompletion>>>,
    calls: AtomicUsize,
    seen: Mutex<Vec<(Vec<ChatMessage>, Vec<ToolDefinition>)>>,
}

impl ScriptedModel {
    pub fn replying(replies: Vec<Result<ChatCompletion>>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            ..Default::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn seen(&self) -> Vec<(Vec<ChatMessage>, Vec<ToolDefinition>)> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatModel for ScriptedModel {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolDefinition],
    ) -> Result<ChatCompletion> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen
            .lock()
            .unwrap()
            .push((messages.to_vec(), tools.to_vec()));
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(InsightsError::Llm("no scripted reply left".to_string())))
    }
}

/// In-process HTTP endpoint that answers every request with the same status and body.
pub struct CannedServer {
    pub base_url: String,
    requests: Arc<Mutex<Vec<HttpRequest>>>,
}

impl CannedServer {
    pub async fn start(status: u16, body: &str) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());
        let requests = Arc::new(Mutex::new(Vec::new()));
        let recorded = requests.clone();
        let response = HttpResponse {
            status,
            content_type: "application/json",
            body: body.to_string(),
        };

        tokio::spawn(async move {
            loop {
                let (stream, _) = match listener.accept().await {
                    Ok(conn) => conn,
                    Err(_) => return,
                };
                let mut reader = BufReader::new(stream);
                if let Ok(Some(request)) = read_request(&mut reader).await {
                    recorded.lock().unwrap().push(request);
                }
                let mut stream = reader.into_inner();
                let _ = stream.write_all(&response.to_bytes()).await;
                let _ = stream.shutdown().await;
            }
        });

        Self { base_url, requests }
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }
}
