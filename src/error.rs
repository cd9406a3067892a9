use thiserror::Error;

#[derive(Error, Debug)]
pub enum InsightsError {
    #[error("Dangerous SQL operation blocked.")]
    BlockedQuery,

    #[error("Database error: {0}")]
    Database(String),

    #[error("Malformed tool call: {0}")]
    MalformedToolCall(String),

    #[error("LLM error: {0}")]
    Llm(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Ticket rejected ({status}): {body}")]
    TicketRejected { status: u16, body: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Polars error: {0}")]
    Polars(String),
}

impl From<rusqlite::Error> for InsightsError {
    fn from(err: rusqlite::Error) -> Self {
        InsightsError::Database(err.to_string())
    }
}

impl From<polars::error::PolarsError> for InsightsError {
    fn from(err: polars::error::PolarsError) -> Self {
        InsightsError::Polars(err.to_string())
    }
}

impl InsightsError {
    /// Errors the user sees as a plain query failure rather than a crash.
    pub fn is_query_failure(&self) -> bool {
        matches!(self, InsightsError::BlockedQuery | InsightsError::Database(_))
    }
}

pub type Result<T> = std::result::Result<T, InsightsError>;
