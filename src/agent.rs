//! Insights Agent
//!
//! Sends one user question to the model with the `query_database` tool and
//! dispatches the reply: either a direct text answer or a guarded query.

use crate::chart::{select_chart, BarChart};
use crate::error::{InsightsError, Result};
use crate::llm::{ChatMessage, ChatModel, FinishReason};
use crate::prompts::{query_database_tool, QUERY_DATABASE_TOOL, SYSTEM_PROMPT};
use crate::store::{OrderStore, QueryResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{info, warn, Instrument};
use uuid::Uuid;

/// Lifecycle of one dashboard submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionState {
    Idle,
    AwaitingModelResponse,
    DirectAnswer,
    ToolInvoked,
    QueryExecuted,
    Rendered,
    Failed,
    TicketFiled,
}

impl SubmissionState {
    pub fn can_transition_to(self, next: SubmissionState) -> bool {
        use SubmissionState::*;
        match (self, next) {
            (Idle, AwaitingModelResponse) => true,
            (AwaitingModelResponse, DirectAnswer | ToolInvoked) => true,
            (ToolInvoked, QueryExecuted | Rendered) => true,
            (QueryExecuted, Rendered) => true,
            // Filing a ticket is a separate, explicit user action.
            (Failed, TicketFiled) => true,
            (Failed | TicketFiled, Failed) => false,
            (_, Failed) => true,
            _ => false,
        }
    }
}

impl fmt::Display for SubmissionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SubmissionState::Idle => "Idle",
            SubmissionState::AwaitingModelResponse => "AwaitingModelResponse",
            SubmissionState::DirectAnswer => "DirectAnswer",
            SubmissionState::ToolInvoked => "ToolInvoked",
            SubmissionState::QueryExecuted => "QueryExecuted",
            SubmissionState::Rendered => "Rendered",
            SubmissionState::Failed => "Failed",
            SubmissionState::TicketFiled => "TicketFiled",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone)]
pub struct Submission {
    pub id: Uuid,
    state: SubmissionState,
}

impl Submission {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            state: SubmissionState::Idle,
        }
    }

    pub fn state(&self) -> SubmissionState {
        self.state
    }

    /// Move to `next` if the transition is legal. Illegal moves are logged and ignored.
    pub fn advance(&mut self, next: SubmissionState) -> bool {
        if self.state.can_transition_to(next) {
            info!(submission = %self.id, "{} -> {}", self.state, next);
            self.state = next;
            true
        } else {
            warn!(submission = %self.id, "Ignoring illegal transition {} -> {}", self.state, next);
            false
        }
    }
}

impl Default for Submission {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AgentOutcome {
    /// Blank input; the model was not called.
    EmptyQuestion,
    DirectAnswer(String),
    QueryExecuted {
        sql: String,
        result: QueryResult,
        chart: Option<BarChart>,
    },
    /// Blocked or failed query. Shown to the user, not treated as a crash.
    QueryFailed { sql: String, message: String },
    UnknownTool { name: String },
}

/// Arguments of `query_database`. Exactly one string field, nothing else.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct QueryDatabaseArgs {
    sql_query: String,
}

/// Decode the model's raw argument text. Anything but `{"sql_query": "<text>"}` is rejected.
pub fn parse_query_args(raw: &str) -> Result<String> {
    serde_json::from_str::<QueryDatabaseArgs>(raw)
        .map(|args| args.sql_query)
        .map_err(|e| InsightsError::MalformedToolCall(format!("{}: {}", QUERY_DATABASE_TOOL, e)))
}

pub struct InsightsAgent<M: ChatModel> {
    model: M,
    store: OrderStore,
}

impl<M: ChatModel> InsightsAgent<M> {
    pub fn new(model: M, store: OrderStore) -> Self {
        Self { model, store }
    }

    pub fn store(&self) -> &OrderStore {
        &self.store
    }

    pub async fn ask(&self, question: &str) -> Result<AgentOutcome> {
        let mut submission = Submission::new();
        self.run(&mut submission, question).await
    }

    /// Answer one question, recording progress on `submission`.
    pub async fn run(&self, submission: &mut Submission, question: &str) -> Result<AgentOutcome> {
        let span = tracing::info_span!("submission", id = %submission.id);
        let outcome = self.dispatch(submission, question).instrument(span).await;
        if outcome.is_err() {
            submission.advance(SubmissionState::Failed);
        }
        outcome
    }

    async fn dispatch(&self, submission: &mut Submission, question: &str) -> Result<AgentOutcome> {
        if question.trim().is_empty() {
            return Ok(AgentOutcome::EmptyQuestion);
        }

        submission.advance(SubmissionState::AwaitingModelResponse);
        let messages = [ChatMessage::system(SYSTEM_PROMPT), ChatMessage::user(question)];
        let completion = self.model.complete(&messages, &[query_database_tool()]).await?;

        if completion.finish_reason != FinishReason::ToolCalls {
            submission.advance(SubmissionState::DirectAnswer);
            return Ok(AgentOutcome::DirectAnswer(completion.content.unwrap_or_default()));
        }

        submission.advance(SubmissionState::ToolInvoked);
        let call = completion.tool_calls.first().ok_or_else(|| {
            InsightsError::MalformedToolCall("finish reason was tool_calls but no call was sent".to_string())
        })?;

        if call.function.name != QUERY_DATABASE_TOOL {
            warn!("Unknown tool requested by LLM: {}", call.function.name);
            return Ok(AgentOutcome::UnknownTool {
                name: call.function.name.clone(),
            });
        }

        let sql = parse_query_args(&call.function.arguments)?;
        match self.store.query(&sql) {
            Ok(result) => {
                submission.advance(SubmissionState::QueryExecuted);
                let chart = select_chart(&result)?;
                Ok(AgentOutcome::QueryExecuted { sql, result, chart })
            }
            Err(e) if e.is_query_failure() => {
                let message = match e {
                    InsightsError::Database(msg) => msg,
                    other => other.to_string(),
                };
                Ok(AgentOutcome::QueryFailed { sql, message })
            }
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_query_args_accepts_expected_shape() {
        assert_eq!(
            parse_query_args(r#"{"sql_query": "SELECT COUNT(*) FROM orders"}"#).unwrap(),
            "SELECT COUNT(*) FROM orders"
        );
    }

    #[test]
    fn test_parse_query_args_rejects_everything_else() {
        for raw in [
            "",
            "SELECT 1",
            "__import__('os').system('ls')",
            r#"["SELECT 1"]"#,
            r#""{\"sql_query\": \"SELECT 1\"}""#,
            r#"{}"#,
            r#"{"sql": "SELECT 1"}"#,
            r#"{"sql_query": 42}"#,
            r#"{"sql_query": null}"#,
            r#"{"sql_query": "SELECT 1", "extra": true}"#,
            r#"{'sql_query': 'SELECT 1'}"#,
        ] {
            assert!(
                matches!(parse_query_args(raw), Err(InsightsError::MalformedToolCall(_))),
                "expected '{}' to be rejected",
                raw
            );
        }
    }

    #[test]
    fn test_state_transitions() {
        use SubmissionState::*;
        assert!(Idle.can_transition_to(AwaitingModelResponse));
        assert!(AwaitingModelResponse.can_transition_to(ToolInvoked));
        assert!(ToolInvoked.can_transition_to(QueryExecuted));
        assert!(QueryExecuted.can_transition_to(Rendered));
        assert!(AwaitingModelResponse.can_transition_to(Failed));
        assert!(Failed.can_transition_to(TicketFiled));

        assert!(!Idle.can_transition_to(QueryExecuted));
        assert!(!DirectAnswer.can_transition_to(ToolInvoked));
        assert!(!Rendered.can_transition_to(TicketFiled));
        assert!(!Failed.can_transition_to(Failed));
    }

    #[test]
    fn test_submission_ignores_illegal_moves() {
        let mut submission = Submission::new();
        assert!(!submission.advance(SubmissionState::Rendered));
        assert_eq!(submission.state(), SubmissionState::Idle);
        assert!(submission.advance(SubmissionState::AwaitingModelResponse));
        assert!(submission.advance(SubmissionState::Failed));
        assert!(submission.advance(SubmissionState::TicketFiled));
        assert_eq!(submission.state(), SubmissionState::TicketFiled);
    }
}
