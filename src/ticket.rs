//! Support ticket filing against a GitHub-style issues API.
//!
//! One POST per call. Success is exactly `201 Created`; anything else comes
//! back as the raw response text. Nothing is retried, so calling again after
//! a transient failure can open a duplicate issue.

use crate::config::TrackerConfig;
use crate::error::{InsightsError, Result};
use chrono::Utc;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

pub const DEFAULT_TICKET_TITLE: &str = "Data Insights Agent Error";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TicketRequest {
    pub title: String,
    pub body: String,
}

impl TicketRequest {
    /// Ticket describing a failed dashboard submission.
    pub fn for_failure(question: &str, error_message: &str) -> Self {
        Self {
            title: DEFAULT_TICKET_TITLE.to_string(),
            body: format!(
                "**Error:** {}\n\n**Question:** {}\n\n**Reported at:** {}",
                error_message,
                question,
                Utc::now().format("%Y-%m-%d %H:%M:%S UTC")
            ),
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TicketCreated {
    pub url: String,
}

#[derive(Deserialize)]
struct CreatedIssue {
    html_url: Option<String>,
}

pub struct TicketClient {
    http: reqwest::Client,
    api_url: String,
    token: String,
    repo: String,
}

impl TicketClient {
    /// Fails when the token or repository is missing from configuration.
    pub fn from_config(config: &TrackerConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            token: config.token()?.to_string(),
            repo: config.repo()?.to_string(),
        })
    }

    pub fn issues_url(&self) -> String {
        format!("{}/repos/{}/issues", self.api_url, self.repo)
    }

    pub async fn create_ticket(&self, title: &str, body: &str) -> Result<TicketCreated> {
        let payload = TicketRequest {
            title: title.to_string(),
            body: body.to_string(),
        };

        let response = self
            .http
            .post(self.issues_url())
            .header("Authorization", format!("Bearer {}", self.token))
            .header("Accept", "application/vnd.github+json")
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                error!("Ticket request failed: {}", e);
                InsightsError::Http(e)
            })?;

        let status = response.status();
        let text = response.text().await?;

        match status {
            StatusCode::CREATED => {
                let issue: CreatedIssue = serde_json::from_str(&text)?;
                let url = issue.html_url.unwrap_or_default();
                info!("Support ticket created: {}", url);
                Ok(TicketCreated { url })
            }
            other => {
                error!("Ticket creation failed ({}): {}", other, text);
                Err(InsightsError::TicketRejected {
                    status: other.as_u16(),
                    body: text,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracker(token: Option<&str>, repo: Option<&str>) -> TrackerConfig {
        TrackerConfig {
            api_url: "https://tracker.example/".to_string(),
            token: token.map(|t| t.to_string()),
            repo: repo.map(|r| r.to_string()),
        }
    }

    #[test]
    fn test_issues_url() {
        let client = TicketClient::from_config(&tracker(Some("t"), Some("acme/support"))).unwrap();
        assert_eq!(client.issues_url(), "https://tracker.example/repos/acme/support/issues");
    }

    #[test]
    fn test_missing_configuration() {
        assert!(matches!(
            TicketClient::from_config(&tracker(None, Some("acme/support"))),
            Err(InsightsError::Config(_))
        ));
        assert!(matches!(
            TicketClient::from_config(&tracker(Some("t"), None)),
            Err(InsightsError::Config(_))
        ));
    }

    #[test]
    fn test_failure_ticket_body() {
        let ticket = TicketRequest::for_failure("top pizzas?", "LLM API call failed");
        assert_eq!(ticket.title, DEFAULT_TICKET_TITLE);
        assert!(ticket.body.contains("LLM API call failed"));
        assert!(ticket.body.contains("top pizzas?"));
        assert!(ticket.body.contains("UTC"));
    }
}
