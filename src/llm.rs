use crate::config::LlmConfig;
use crate::error::{InsightsError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    pub role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: Some(content.into()),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: Some(content.into()),
        }
    }
}

/// A capability advertised to the model. `parameters` is a JSON schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FunctionCall {
    pub name: String,
    /// Raw argument text exactly as the model produced it.
    pub arguments: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCall {
    #[serde(default)]
    pub id: String,
    pub function: FunctionCall,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FinishReason {
    Stop,
    ToolCalls,
    Length,
    ContentFilter,
    Other(String),
}

impl FinishReason {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "stop" => FinishReason::Stop,
            "tool_calls" => FinishReason::ToolCalls,
            "length" => FinishReason::Length,
            "content_filter" => FinishReason::ContentFilter,
            other => FinishReason::Other(other.to_string()),
        }
    }
}

/// First choice of a chat completion.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatCompletion {
    pub finish_reason: FinishReason,
    pub content: Option<String>,
    pub tool_calls: Vec<ToolCall>,
}

/// Seam between the agent and whatever answers chat requests.
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolDefinition],
    ) -> Result<ChatCompletion>;
}

#[async_trait]
impl<T: ChatModel + ?Sized> ChatModel for &T {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolDefinition],
    ) -> Result<ChatCompletion> {
        (**self).complete(messages, tools).await
    }
}

/// OpenAI-compatible chat completions client.
pub struct LlmClient {
    http: reqwest::Client,
    api_key: Option<String>,
    model: String,
    base_url: String,
}

impl LlmClient {
    pub fn new(config: &LlmConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn request_body(&self, messages: &[ChatMessage], tools: &[ToolDefinition]) -> serde_json::Value {
        let api_tools: Vec<serde_json::Value> = tools
            .iter()
            .map(|t| {
                serde_json::json!({
                    "type": "function",
                    "function": {
                        "name": t.name,
                        "description": t.description,
                        "parameters": t.parameters,
                    }
                })
            })
            .collect();

        let mut body = serde_json::json!({
            "model": self.model,
            "messages": messages,
        });
        if !api_tools.is_empty() {
            body["tools"] = serde_json::json!(api_tools);
        }
        body
    }
}

#[async_trait]
impl ChatModel for LlmClient {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolDefinition],
    ) -> Result<ChatCompletion> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| InsightsError::Config("OPENAI_API_KEY is not set".to_string()))?;

        let body = self.request_body(messages, tools);
        debug!("Calling {} with {} tool(s)", self.model, tools.len());

        let response = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| InsightsError::Llm(format!("LLM API call failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(InsightsError::Llm(format!(
                "LLM API error ({}): {}",
                status, error_text
            )));
        }

        let response_json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| InsightsError::Llm(format!("Failed to parse LLM response: {}", e)))?;

        parse_completion(&response_json)
    }
}

/// Pull the first choice out of a chat completions response body.
pub fn parse_completion(response_json: &serde_json::Value) -> Result<ChatCompletion> {
    if let Some(error) = response_json.get("error") {
        return Err(InsightsError::Llm(format!("LLM API error: {}", error)));
    }

    let choice = response_json
        .get("choices")
        .and_then(|c| c.as_array())
        .and_then(|c| c.first())
        .ok_or_else(|| InsightsError::Llm("No choices in LLM response".to_string()))?;

    let finish_reason = choice
        .get("finish_reason")
        .and_then(|r| r.as_str())
        .map(FinishReason::parse)
        .unwrap_or_else(|| FinishReason::Other(String::new()));

    if finish_reason == FinishReason::Length {
        warn!("LLM response was truncated due to length limit");
    }

    let message = &choice["message"];
    let content = message
        .get("content")
        .and_then(|c| c.as_str())
        .map(|c| c.to_string());

    let tool_calls = match message.get("tool_calls") {
        Some(calls) if !calls.is_null() => serde_json::from_value::<Vec<ToolCall>>(calls.clone())
            .map_err(|e| InsightsError::Llm(format!("Unreadable tool_calls in LLM response: {}", e)))?,
        _ => Vec::new(),
    };

    Ok(ChatCompletion {
        finish_reason,
        content,
        tool_calls,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tool_call_completion() {
        let raw = serde_json::json!({
            "choices": [{
                "finish_reason": "tool_calls",
                "message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [{
                        "id": "call_1",
                        "type": "function",
                        "function": {
                            "name": "query_database",
                            "arguments": "{\"sql_query\": \"SELECT 1\"}"
                        }
                    }]
                }
            }]
        });

        let completion = parse_completion(&raw).unwrap();
        assert_eq!(completion.finish_reason, FinishReason::ToolCalls);
        assert_eq!(completion.content, None);
        assert_eq!(completion.tool_calls.len(), 1);
        assert_eq!(completion.tool_calls[0].function.name, "query_database");
        assert_eq!(
            completion.tool_calls[0].function.arguments,
            r#"{"sql_query": "SELECT 1"}"#
        );
    }

    #[test]
    fn test_parse_text_completion() {
        let raw = serde_json::json!({
            "choices": [{
                "finish_reason": "stop",
                "message": {"role": "assistant", "content": "Pizza is great."}
            }]
        });

        let completion = parse_completion(&raw).unwrap();
        assert_eq!(completion.finish_reason, FinishReason::Stop);
        assert_eq!(completion.content.as_deref(), Some("Pizza is great."));
        assert!(completion.tool_calls.is_empty());
    }

    #[test]
    fn test_parse_error_body() {
        let raw = serde_json::json!({"error": {"message": "bad key"}});
        assert!(matches!(parse_completion(&raw), Err(InsightsError::Llm(_))));

        let empty = serde_json::json!({"choices": []});
        assert!(matches!(parse_completion(&empty), Err(InsightsError::Llm(_))));
    }

    #[test]
    fn test_request_body_wraps_tools() {
        let client = LlmClient::new(&LlmConfig {
            api_key: Some("k".to_string()),
            model: "gpt-4o-mini".to_string(),
            base_url: "http://localhost/v1/".to_string(),
        });
        let tool = ToolDefinition {
            name: "query_database".to_string(),
            description: "d".to_string(),
            parameters: serde_json::json!({"type": "object"}),
        };
        let body = client.request_body(&[ChatMessage::user("hi")], &[tool]);

        assert_eq!(body["model"], "gpt-4o-mini");
        assert_eq!(body["messages"][0]["role"], "user");
        assert_eq!(body["tools"][0]["type"], "function");
        assert_eq!(body["tools"][0]["function"]["name"], "query_database");
        assert_eq!(client.base_url, "http://localhost/v1");
    }
}
