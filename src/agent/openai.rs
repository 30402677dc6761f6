// src/agent/openai.rs — OpenAI Assistants API (threads, messages, runs)

use async_trait::async_trait;
use std::time::Duration;

use super::{AgentService, AssistantInfo, Run, RunStatus};
use crate::core::{Role, Turn};
use crate::infra::errors::ParleyError;

const PAGE_LIMIT: u32 = 100;
const DEFAULT_RETRY_AFTER_MS: u64 = 5_000;

pub struct OpenAIAssistants {
    api_key: String,
    client: reqwest::Client,
    base_url: String,
}

impl OpenAIAssistants {
    pub fn with_base_url(
        api_key: String,
        base_url: String,
        request_timeout: Duration,
    ) -> Result<Self, ParleyError> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| ParleyError::Config(format!("HTTP client: {e}")))?;
        Ok(Self {
            api_key,
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn get(&self, path: &str) -> reqwest::RequestBuilder {
        self.authorized(self.client.get(format!("{}{}", self.base_url, path)))
    }

    fn post(&self, path: &str) -> reqwest::RequestBuilder {
        self.authorized(self.client.post(format!("{}{}", self.base_url, path)))
    }

    fn authorized(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        builder
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("OpenAI-Beta", "assistants=v2")
    }

    /// Send a request and decode the JSON body, mapping failures onto
    /// retriable / non-retriable errors.
    async fn send(
        &self,
        operation: &str,
        request: reqwest::RequestBuilder,
    ) -> Result<serde_json::Value, ParleyError> {
        let response = request.send().await.map_err(|e| ParleyError::Submission {
            operation: operation.into(),
            message: e.to_string(),
            retriable: e.is_timeout() || e.is_connect(),
        })?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after_ms = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(parse_retry_after_ms)
                .unwrap_or(DEFAULT_RETRY_AFTER_MS);
            return Err(ParleyError::RateLimited { retry_after_ms });
        }

        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(ParleyError::Submission {
                operation: operation.into(),
                message: format!("HTTP {}: {}", status, error_body),
                retriable: status.is_server_error(),
            });
        }

        response.json().await.map_err(|e| ParleyError::Submission {
            operation: operation.into(),
            message: format!("Failed to parse response: {}", e),
            retriable: false,
        })
    }
}

#[async_trait]
impl AgentService for OpenAIAssistants {
    fn id(&self) -> &str {
        "openai"
    }

    async fn retrieve_assistant(&self, assistant_id: &str) -> Result<AssistantInfo, ParleyError> {
        let resp = self
            .send(
                "retrieve_assistant",
                self.get(&format!("/assistants/{assistant_id}")),
            )
            .await?;
        Ok(AssistantInfo {
            id: resp["id"].as_str().unwrap_or(assistant_id).to_string(),
            name: resp["name"].as_str().map(|s| s.to_string()),
        })
    }

    async fn create_thread(&self) -> Result<String, ParleyError> {
        let resp = self
            .send(
                "create_thread",
                self.post("/threads").json(&serde_json::json!({})),
            )
            .await?;
        required_str(&resp, "id", "create_thread")
    }

    async fn add_message(&self, thread_id: &str, content: &str) -> Result<(), ParleyError> {
        let body = serde_json::json!({
            "role": "user",
            "content": content,
        });
        self.send(
            "add_message",
            self.post(&format!("/threads/{thread_id}/messages")).json(&body),
        )
        .await?;
        Ok(())
    }

    async fn create_run(&self, thread_id: &str, assistant_id: &str) -> Result<Run, ParleyError> {
        let body = serde_json::json!({ "assistant_id": assistant_id });
        let resp = self
            .send(
                "create_run",
                self.post(&format!("/threads/{thread_id}/runs")).json(&body),
            )
            .await?;
        parse_run(&resp, "create_run")
    }

    async fn get_run(&self, thread_id: &str, run_id: &str) -> Result<Run, ParleyError> {
        let resp = self
            .send(
                "get_run",
                self.get(&format!("/threads/{thread_id}/runs/{run_id}")),
            )
            .await?;
        parse_run(&resp, "get_run")
    }

    async fn cancel_run(&self, thread_id: &str, run_id: &str) -> Result<Run, ParleyError> {
        let resp = self
            .send(
                "cancel_run",
                self.post(&format!("/threads/{thread_id}/runs/{run_id}/cancel")),
            )
            .await?;
        parse_run(&resp, "cancel_run")
    }

    async fn list_messages(&self, thread_id: &str) -> Result<Vec<Turn>, ParleyError> {
        let mut turns = Vec::new();
        let mut after: Option<String> = None;

        loop {
            let mut query = vec![
                ("order", "asc".to_string()),
                ("limit", PAGE_LIMIT.to_string()),
            ];
            if let Some(cursor) = &after {
                query.push(("after", cursor.clone()));
            }
            let page = self
                .send(
                    "list_messages",
                    self.get(&format!("/threads/{thread_id}/messages"))
                        .query(&query),
                )
                .await?;

            let data = page["data"].as_array().cloned().unwrap_or_default();
            turns.extend(data.iter().filter_map(parse_message));

            let has_more = page["has_more"].as_bool().unwrap_or(false);
            match page["last_id"].as_str() {
                Some(last) if has_more => after = Some(last.to_string()),
                _ => break,
            }
        }

        tracing::debug!(thread_id, turns = turns.len(), "Fetched thread history");
        Ok(turns)
    }
}

fn required_str(value: &serde_json::Value, field: &str, operation: &str) -> Result<String, ParleyError> {
    value[field]
        .as_str()
        .map(|s| s.to_string())
        .ok_or_else(|| ParleyError::Submission {
            operation: operation.into(),
            message: format!("response is missing '{field}'"),
            retriable: false,
        })
}

/// Decode a run object.
fn parse_run(value: &serde_json::Value, operation: &str) -> Result<Run, ParleyError> {
    let id = required_str(value, "id", operation)?;
    let raw_status = required_str(value, "status", operation)?;
    let status = RunStatus::parse(&raw_status).ok_or_else(|| ParleyError::Submission {
        operation: operation.into(),
        message: format!("unknown run status '{raw_status}'"),
        retriable: false,
    })?;

    let last_error = value["last_error"]["message"]
        .as_str()
        .or_else(|| value["incomplete_details"]["reason"].as_str())
        .map(|s| s.to_string());

    Ok(Run {
        id,
        status,
        last_error,
    })
}

/// Decode a thread message into a turn. Messages without text parts are skipped.
fn parse_message(value: &serde_json::Value) -> Option<Turn> {
    let role = match value["role"].as_str()? {
        "user" => Role::User,
        "assistant" => Role::Agent,
        _ => return None,
    };
    let parts: Vec<&str> = value["content"]
        .as_array()?
        .iter()
        .filter(|part| part["type"] == "text")
        .filter_map(|part| part["text"]["value"].as_str())
        .collect();
    if parts.is_empty() {
        return None;
    }
    Some(Turn::new(role, parts.join("\n")))
}

/// `Retry-After` is given in whole seconds.
fn parse_retry_after_ms(raw: &str) -> Option<u64> {
    raw.trim().parse::<u64>().ok().map(|secs| secs * 1000)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_run_completed() {
        let run = parse_run(
            &json!({"id": "run_abc", "object": "thread.run", "status": "completed", "last_error": null}),
            "get_run",
        )
        .unwrap();
        assert_eq!(run.id, "run_abc");
        assert_eq!(run.status, RunStatus::Completed);
        assert!(run.last_error.is_none());
    }

    #[test]
    fn test_parse_run_failed_carries_reason() {
        let run = parse_run(
            &json!({
                "id": "run_abc",
                "status": "failed",
                "last_error": {"code": "server_error", "message": "Sorry, something went wrong."}
            }),
            "get_run",
        )
        .unwrap();
        assert_eq!(run.status, RunStatus::Failed);
        assert_eq!(run.last_error.as_deref(), Some("Sorry, something went wrong."));
    }

    #[test]
    fn test_parse_run_incomplete_reason() {
        let run = parse_run(
            &json!({
                "id": "run_1",
                "status": "incomplete",
                "incomplete_details": {"reason": "max_completion_tokens"}
            }),
            "get_run",
        )
        .unwrap();
        assert_eq!(run.last_error.as_deref(), Some("max_completion_tokens"));
    }

    #[test]
    fn test_parse_run_unknown_status_is_error() {
        let err = parse_run(&json!({"id": "run_1", "status": "sleeping"}), "get_run").unwrap_err();
        assert!(!err.is_retriable());
        assert!(err.to_string().contains("sleeping"));
    }

    #[test]
    fn test_parse_message_text_parts() {
        let msg = json!({
            "id": "msg_1",
            "role": "assistant",
            "content": [
                {"type": "text", "text": {"value": "Welcome to the shop!", "annotations": []}},
                {"type": "image_file", "image_file": {"file_id": "file_1"}},
                {"type": "text", "text": {"value": "What can I get you?", "annotations": []}}
            ]
        });
        assert_eq!(
            parse_message(&msg),
            Some(Turn::agent("Welcome to the shop!\nWhat can I get you?"))
        );
    }

    #[test]
    fn test_parse_message_user_role() {
        let msg = json!({
            "role": "user",
            "content": [{"type": "text", "text": {"value": "Hello"}}]
        });
        assert_eq!(parse_message(&msg), Some(Turn::user("Hello")));
    }

    #[test]
    fn test_parse_message_without_text_is_skipped() {
        let msg = json!({
            "role": "assistant",
            "content": [{"type": "image_file", "image_file": {"file_id": "file_1"}}]
        });
        assert!(parse_message(&msg).is_none());
    }

    #[test]
    fn test_parse_retry_after() {
        assert_eq!(parse_retry_after_ms("3"), Some(3000));
        assert_eq!(parse_retry_after_ms(" 10 "), Some(10_000));
        assert_eq!(parse_retry_after_ms("Wed, 21 Oct 2015 07:28:00 GMT"), None);
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let svc = OpenAIAssistants::with_base_url(
            "sk".into(),
            "http://localhost:9/v1/".into(),
            Duration::from_secs(1),
        )
        .unwrap();
        assert_eq!(svc.base_url, "http://localhost:9/v1");
    }
}
