//! The `OpenAIClient` struct implements `ClientWrapper` for any endpoint
//! speaking the OpenAI Chat Completions protocol.
//!
//! # Key Features
//!
//! - **Strict JSON mode**: `CompletionOptions::json()` maps to
//!   `response_format: {"type": "json_object"}`.
//! - **Tool calling**: tool schemas from a
//!   [`ToolTable`](crate::tool_protocol::ToolTable) are sent as function tools
//!   and returned calls land in [`Message::tool_calls`].
//! - **Cancellation**: the HTTP exchange races the cancellation token; a fired
//!   token returns [`OracleError::Cancelled`] immediately.
//!
//! # Example
//!
//! ```rust,no_run
//! use teamledger::client_wrapper::{ClientWrapper, CompletionOptions, Message};
//! use teamledger::clients::openai::OpenAIClient;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() {
//!     let client = OpenAIClient::from_env().expect("OPENAI_API_KEY not set");
//!     let reply = client
//!         .send_message(
//!             &[Message::system("You are terse."), Message::user("Say hi")],
//!             &CompletionOptions::text(),
//!             &CancellationToken::new(),
//!         )
//!         .await
//!         .unwrap();
//!     println!("{}", reply.content);
//! }
//! ```
//!
//! # Note
//!
//! `from_env` reads `OPENAI_API_KEY`, and optionally `OPENAI_BASE_URL` and
//! `OPENAI_MODEL` (default `gpt-4o`).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value as JsonValue};
use tokio_util::sync::CancellationToken;

use crate::teamledger::client_wrapper::{
    ClientWrapper, CompletionOptions, Message, OracleError, Role, ToolCall,
};
use crate::teamledger::clients::common::{get_shared_http_client, sanitize_participant_name};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-4o";

pub struct OpenAIClient {
    api_key: String,
    model: String,
    base_url: String,
    http: reqwest::Client,
}

#[derive(Serialize)]
struct WireMessage<'a> {
    role: Role,
    content: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<WireToolCall>,
}

#[derive(Deserialize)]
struct WireToolCall {
    id: String,
    function: WireFunction,
}

#[derive(Deserialize)]
struct WireFunction {
    name: String,
    arguments: String,
}

impl OpenAIClient {
    pub fn new_with_model_string(api_key: &str, model: &str) -> Self {
        Self {
            api_key: api_key.to_string(),
            model: model.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            http: get_shared_http_client(DEFAULT_BASE_URL),
        }
    }

    /// Point the client at another OpenAI-compatible endpoint.
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self.http = get_shared_http_client(&self.base_url);
        self
    }

    pub fn from_env() -> Result<Self, OracleError> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| OracleError::Transport("OPENAI_API_KEY is not set".to_string()))?;
        let model = std::env::var("OPENAI_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());
        let client = Self::new_with_model_string(&api_key, &model);
        Ok(match std::env::var("OPENAI_BASE_URL") {
            Ok(url) => client.with_base_url(&url),
            Err(_) => client,
        })
    }

    fn build_body(&self, messages: &[Message], options: &CompletionOptions) -> JsonValue {
        let wire: Vec<WireMessage<'_>> = messages
            .iter()
            .map(|m| WireMessage {
                role: m.role,
                content: &m.content,
                name: m.source.as_deref().map(sanitize_participant_name),
            })
            .collect();

        let mut body = json!({
            "model": self.model,
            "messages": wire,
        });
        if !options.tools.is_empty() {
            body["tools"] = JsonValue::Array(
                options
                    .tools
                    .iter()
                    .map(|tool| tool.to_function_schema())
                    .collect(),
            );
        }
        if options.json_output {
            body["response_format"] = json!({ "type": "json_object" });
        }
        body
    }

    async fn post(&self, body: &JsonValue) -> Result<String, OracleError> {
        let url = format!("{}/chat/completions", self.base_url);
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| OracleError::Transport(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| OracleError::Transport(e.to_string()))?;
        if !status.is_success() {
            log::error!("{} returned HTTP {}: {}", url, status, text);
            return Err(OracleError::Transport(format!("HTTP {}: {}", status, text)));
        }
        Ok(text)
    }
}

fn decode_response(text: &str) -> Result<Message, OracleError> {
    let parsed: ChatResponse = serde_json::from_str(text).map_err(|e| {
        log::error!("Undecodable chat completion: {}", e);
        OracleError::Transport(format!("undecodable response: {}", e))
    })?;
    let message = parsed
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| OracleError::Transport("response contained no choices".to_string()))?
        .message;

    let tool_calls = message
        .tool_calls
        .into_iter()
        .map(|call| ToolCall {
            id: call.id,
            name: call.function.name,
            arguments: call.function.arguments,
        })
        .collect();
    Ok(Message::assistant(message.content.unwrap_or_default()).with_tool_calls(tool_calls))
}

#[async_trait]
impl ClientWrapper for OpenAIClient {
    async fn send_message(
        &self,
        messages: &[Message],
        options: &CompletionOptions,
        cancel: &CancellationToken,
    ) -> Result<Message, OracleError> {
        let body = self.build_body(messages, options);
        log::debug!(
            "{}: sending {} messages (json_output={}, tools={})",
            self.model,
            messages.len(),
            options.json_output,
            options.tools.len()
        );

        let text = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(OracleError::Cancelled),
            text = self.post(&body) => text?,
        };
        decode_response(&text)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::teamledger::tool_protocol::{ToolMetadata, ToolParameter, ToolParameterType};

    fn client() -> OpenAIClient {
        OpenAIClient::new_with_model_string("test-key", "gpt-test")
    }

    #[test]
    fn test_body_json_mode_and_names() {
        let messages = vec![
            Message::system("be strict"),
            Message::user("hi").with_source("Mail Worker"),
        ];
        let body = client().build_body(&messages, &CompletionOptions::json());

        assert_eq!(body["model"], "gpt-test");
        assert_eq!(body["response_format"]["type"], "json_object");
        assert_eq!(body["messages"][0]["role"], "system");
        assert!(body["messages"][0].get("name").is_none());
        assert_eq!(body["messages"][1]["name"], "Mail_Worker");
        assert!(body.get("tools").is_none());
    }

    #[test]
    fn test_body_with_tools() {
        let tool = ToolMetadata::new("list_events", "List calendar events")
            .with_parameter(ToolParameter::new("day", ToolParameterType::String).required());
        let options = CompletionOptions::text().with_tools(vec![tool]);
        let body = client().build_body(&[Message::user("today?")], &options);

        assert_eq!(body["tools"][0]["function"]["name"], "list_events");
        assert!(body.get("response_format").is_none());
    }

    #[test]
    fn test_decode_text_and_tool_calls() {
        let text = r#"{"choices":[{"message":{"role":"assistant","content":null,
            "tool_calls":[{"id":"c1","type":"function","function":{"name":"send_mail","arguments":"{\"to\":\"a@b.c\"}"}}]}}]}"#;
        let message = decode_response(text).unwrap();
        assert_eq!(&*message.content, "");
        assert_eq!(message.tool_calls.len(), 1);
        assert_eq!(message.tool_calls[0].name, "send_mail");
        assert_eq!(message.tool_calls[0].arguments, r#"{"to":"a@b.c"}"#);

        let plain = decode_response(r#"{"choices":[{"message":{"content":"hello"}}]}"#).unwrap();
        assert_eq!(&*plain.content, "hello");
        assert!(plain.tool_calls.is_empty());
    }

    #[test]
    fn test_decode_rejects_empty_choices() {
        assert!(matches!(
            decode_response(r#"{"choices":[]}"#),
            Err(OracleError::Transport(_))
        ));
    }

    #[tokio::test]
    async fn test_cancelled_token_short_circuits() {
        let client = client().with_base_url("http://127.0.0.1:9");
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = client
            .send_message(&[Message::user("hi")], &CompletionOptions::text(), &cancel)
            .await;
        assert_eq!(result.unwrap_err(), OracleError::Cancelled);
    }
}
