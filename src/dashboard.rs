//! Dashboard view models
//!
//! Turns agent outcomes, the database overview and ticket results into the
//! JSON the dashboard page renders.

use crate::agent::{AgentOutcome, Submission, SubmissionState};
use crate::chart::{Bar, BarChart};
use crate::error::{InsightsError, Result};
use crate::store::{Cell, DatabaseOverview, QueryResult};
use crate::ticket::{TicketCreated, TicketRequest};
use serde::Serialize;

pub const DASHBOARD_HTML: &str = include_str!("../assets/dashboard.html");

/// Rows shown in the result table.
pub const TABLE_PREVIEW_ROWS: usize = 20;
/// Rows shown in the sidebar sample.
pub const OVERVIEW_SAMPLE_ROWS: usize = 5;

pub const CHART_TITLE: &str = "Top Ordered or Revenue-Generating Items";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusLevel {
    Info,
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusMessage {
    pub level: StatusLevel,
    pub message: String,
}

impl StatusMessage {
    fn new(level: StatusLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TableView {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
    pub total_rows: usize,
}

impl TableView {
    pub fn preview(result: &QueryResult, limit: usize) -> Self {
        let head = result.head(limit);
        Self {
            columns: head.columns,
            rows: head.rows,
            total_rows: result.row_count(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ChartView {
    pub title: String,
    pub y_label: String,
    pub bars: Vec<Bar>,
    pub svg: String,
}

impl From<&BarChart> for ChartView {
    fn from(chart: &BarChart) -> Self {
        Self {
            title: CHART_TITLE.to_string(),
            y_label: chart.y_label.clone(),
            bars: chart.bars.clone(),
            svg: chart.to_svg(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AskResponse {
    pub submission_id: String,
    pub state: SubmissionState,
    pub status: StatusMessage,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sql: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table: Option<TableView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chart: Option<ChartView>,
    /// Offered only after a failure; filing it is up to the user.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ticket: Option<TicketRequest>,
}

impl AskResponse {
    fn new(submission: &Submission, status: StatusMessage) -> Self {
        Self {
            submission_id: submission.id.to_string(),
            state: submission.state(),
            status,
            sql: None,
            table: None,
            chart: None,
            ticket: None,
        }
    }
}

/// Build the response for one submission and mark it rendered where that applies.
pub fn render_outcome(
    submission: &mut Submission,
    question: &str,
    outcome: Result<AgentOutcome>,
) -> AskResponse {
    match outcome {
        Ok(AgentOutcome::EmptyQuestion) => AskResponse::new(
            submission,
            StatusMessage::new(StatusLevel::Warning, "Please enter a question first."),
        ),
        Ok(AgentOutcome::DirectAnswer(answer)) => {
            AskResponse::new(submission, StatusMessage::new(StatusLevel::Info, answer))
        }
        Ok(AgentOutcome::QueryExecuted { sql, result, chart }) => {
            submission.advance(SubmissionState::Rendered);
            let mut response = AskResponse::new(
                submission,
                StatusMessage::new(StatusLevel::Success, "Query executed successfully!"),
            );
            response.sql = Some(sql);
            response.table = Some(TableView::preview(&result, TABLE_PREVIEW_ROWS));
            response.chart = chart.as_ref().map(ChartView::from);
            response
        }
        Ok(AgentOutcome::QueryFailed { sql, message }) => {
            submission.advance(SubmissionState::Rendered);
            let mut response = AskResponse::new(
                submission,
                StatusMessage::new(StatusLevel::Error, format!("Error: {}", message)),
            );
            response.sql = Some(sql);
            response
        }
        Ok(AgentOutcome::UnknownTool { name }) => {
            submission.advance(SubmissionState::Rendered);
            AskResponse::new(
                submission,
                StatusMessage::new(
                    StatusLevel::Warning,
                    format!("Unknown tool requested by LLM: {}", name),
                ),
            )
        }
        Err(e) => {
            if submission.state() != SubmissionState::Failed {
                submission.advance(SubmissionState::Failed);
            }
            let message = e.to_string();
            let mut response = AskResponse::new(
                submission,
                StatusMessage::new(StatusLevel::Error, format!("Exception: {}", message)),
            );
            response.ticket = Some(TicketRequest::for_failure(question, &message));
            response
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum OverviewView {
    Ready {
        total_rows: i64,
        sample: TableView,
    },
    Unavailable {
        error: String,
        detail: String,
    },
}

pub fn render_overview(overview: Result<DatabaseOverview>) -> OverviewView {
    match overview {
        Ok(overview) => OverviewView::Ready {
            total_rows: overview.total_rows,
            sample: TableView::preview(&overview.sample, OVERVIEW_SAMPLE_ROWS),
        },
        Err(e) => OverviewView::Unavailable {
            error: "Database not found or invalid.".to_string(),
            detail: e.to_string(),
        },
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum TicketView {
    Created { message: String, url: String },
    Failed { error: String },
}

/// HTTP status plus body for a ticket filing attempt.
pub fn render_ticket(result: Result<TicketCreated>) -> (u16, TicketView) {
    match result {
        Ok(created) => (
            201,
            TicketView::Created {
                message: "Support ticket created successfully".to_string(),
                url: created.url,
            },
        ),
        Err(InsightsError::TicketRejected { body, .. }) => (502, TicketView::Failed { error: body }),
        Err(e @ InsightsError::Config(_)) => (500, TicketView::Failed { error: e.to_string() }),
        Err(e) => (502, TicketView::Failed { error: e.to_string() }),
    }
}
