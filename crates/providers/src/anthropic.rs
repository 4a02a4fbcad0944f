//! Anthropic Messages API adapter.
//!
//! Implements the wire format documented for `POST /v1/messages`: a
//! top-level `system` string (rather than a `system` role message), content
//! blocks instead of plain strings, and `tool_use`/`tool_result` blocks for
//! function calling. Anthropic has no embeddings endpoint, so
//! [`AnthropicProvider::embeddings`] always returns an error — callers
//! needing the `Embedder` role must route to an OpenAI-compatible provider.

use crate::auth::AuthRotator;
use crate::traits::{
    ChatRequest, ChatResponse, EmbeddingsRequest, EmbeddingsResponse, LlmProvider,
};
use crate::util::from_reqwest;
use sa_domain::capability::LlmCapabilities;
use sa_domain::config::ProviderConfig;
use sa_domain::error::{Error, Result};
use sa_domain::stream::{BoxStream, StreamEvent, Usage};
use sa_domain::tool::{ContentPart, Message, MessageContent, Role, ToolCall, ToolDefinition};
use serde_json::Value;
use std::sync::Arc;

const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_MAX_TOKENS: u32 = 4096;

pub struct AnthropicProvider {
    id: String,
    base_url: String,
    auth: Arc<AuthRotator>,
    default_model: String,
    capabilities: LlmCapabilities,
    client: reqwest::Client,
}

impl AnthropicProvider {
    pub fn from_config(cfg: &ProviderConfig) -> Result<Self> {
        let auth = Arc::new(AuthRotator::from_auth_config(&cfg.auth)?);

        let default_model = cfg
            .default_model
            .clone()
            .unwrap_or_else(|| "claude-3-5-sonnet-20241022".into());

        let capabilities = LlmCapabilities {
            supports_tools: sa_domain::capability::ToolSupport::StrictJson,
            supports_streaming: true,
            supports_json_mode: false,
            supports_vision: true,
            context_window_tokens: Some(200_000),
            max_output_tokens: Some(8_192),
        };

        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .build()
            .map_err(from_reqwest)?;

        Ok(Self {
            id: cfg.id.clone(),
            base_url: cfg
                .base_url
                .trim_end_matches('/')
                .to_string(),
            auth,
            default_model,
            capabilities,
            client,
        })
    }

    fn authed_post(&self, url: &str) -> reqwest::RequestBuilder {
        let entry = self.auth.next_key();
        self.client
            .post(url)
            .header("x-api-key", &entry.key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("Content-Type", "application/json")
    }

    fn effective_model(&self, req: &ChatRequest) -> String {
        req.model
            .clone()
            .unwrap_or_else(|| self.default_model.clone())
    }

    /// Split system-role messages out (Anthropic takes `system` as a
    /// top-level string, not as a message in the transcript) and convert
    /// the rest to Anthropic's content-block format.
    fn build_chat_body(&self, req: &ChatRequest, stream: bool) -> Value {
        let mut system_parts: Vec<String> = Vec::new();
        let mut messages: Vec<Value> = Vec::new();

        for msg in &req.messages {
            if msg.role == Role::System {
                system_parts.push(msg.content.extract_all_text());
            } else {
                messages.push(msg_to_anthropic(msg));
            }
        }

        let mut body = serde_json::json!({
            "model": self.effective_model(req),
            "messages": messages,
            "max_tokens": req.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            "stream": stream,
        });

        if !system_parts.is_empty() {
            body["system"] = Value::String(system_parts.join("\n\n"));
        }
        if !req.tools.is_empty() {
            let tools: Vec<Value> = req.tools.iter().map(tool_to_anthropic).collect();
            body["tools"] = Value::Array(tools);
        }
        if let Some(temp) = req.temperature {
            body["temperature"] = serde_json::json!(temp);
        }
        body
    }
}

fn msg_to_anthropic(msg: &Message) -> Value {
    let role = match msg.role {
        Role::User | Role::Tool => "user",
        Role::Assistant => "assistant",
        Role::System => unreachable!("system messages are extracted before this point"),
    };

    let content = match &msg.content {
        MessageContent::Text(t) => Value::String(t.clone()),
        MessageContent::Parts(parts) => {
            let blocks: Vec<Value> = parts.iter().map(part_to_anthropic).collect();
            Value::Array(blocks)
        }
    };

    serde_json::json!({"role": role, "content": content})
}

fn part_to_anthropic(part: &ContentPart) -> Value {
    match part {
        ContentPart::Text { text } => serde_json::json!({"type": "text", "text": text}),
        ContentPart::ToolUse { id, name, input } => serde_json::json!({
            "type": "tool_use",
            "id": id,
            "name": name,
            "input": input,
        }),
        ContentPart::ToolResult {
            tool_use_id,
            content,
            is_error,
        } => serde_json::json!({
            "type": "tool_result",
            "tool_use_id": tool_use_id,
            "content": content,
            "is_error": is_error,
        }),
        ContentPart::Image { url, media_type } => serde_json::json!({
            "type": "image",
            "source": {
                "type": "url",
                "url": url,
                "media_type": media_type,
            }
        }),
    }
}

fn tool_to_anthropic(tool: &ToolDefinition) -> Value {
    serde_json::json!({
        "name": tool.name,
        "description": tool.description,
        "input_schema": tool.parameters,
    })
}

fn parse_chat_response(body: &Value) -> Result<ChatResponse> {
    let content_blocks = body
        .get("content")
        .and_then(|c| c.as_array())
        .ok_or_else(|| Error::ProviderPermanent {
            provider: "anthropic".into(),
            message: "no content blocks in response".into(),
        })?;

    let mut text = String::new();
    let mut tool_calls = Vec::new();

    for block in content_blocks {
        match block.get("type").and_then(|t| t.as_str()) {
            Some("text") => {
                if let Some(t) = block.get("text").and_then(|v| v.as_str()) {
                    text.push_str(t);
                }
            }
            Some("tool_use") => {
                if let (Some(id), Some(name)) = (
                    block.get("id").and_then(|v| v.as_str()),
                    block.get("name").and_then(|v| v.as_str()),
                ) {
                    let arguments = block.get("input").cloned().unwrap_or(Value::Null);
                    tool_calls.push(ToolCall {
                        call_id: id.to_string(),
                        tool_name: name.to_string(),
                        arguments,
                    });
                }
            }
            _ => {}
        }
    }

    let finish_reason = body
        .get("stop_reason")
        .and_then(|v| v.as_str())
        .map(String::from);

    let model = body
        .get("model")
        .and_then(|v| v.as_str())
        .unwrap_or("unknown")
        .to_string();

    let usage = body.get("usage").and_then(parse_anthropic_usage);

    Ok(ChatResponse {
        content: text,
        tool_calls,
        usage,
        model,
        finish_reason,
    })
}

fn parse_anthropic_usage(v: &Value) -> Option<Usage> {
    let prompt_tokens = v.get("input_tokens")?.as_u64()? as u32;
    let completion_tokens = v.get("output_tokens")?.as_u64()? as u32;
    Some(Usage {
        prompt_tokens,
        completion_tokens,
        total_tokens: prompt_tokens + completion_tokens,
    })
}

/// Parse one Anthropic SSE event. Anthropic sends a typed `event:` line
/// followed by a `data:` line; the shared [`crate::sse`] machinery only
/// surfaces the data payload, so the event kind is read back out of the
/// JSON body's own `type` field.
fn parse_sse_data(data: &str) -> Vec<Result<StreamEvent>> {
    let v: Value = match serde_json::from_str(data) {
        Ok(v) => v,
        Err(e) => return vec![Err(Error::Json(e))],
    };

    match v.get("type").and_then(|t| t.as_str()) {
        Some("content_block_delta") => {
            let delta = v.get("delta").unwrap_or(&Value::Null);
            match delta.get("type").and_then(|t| t.as_str()) {
                Some("text_delta") => {
                    let text = delta
                        .get("text")
                        .and_then(|v| v.as_str())
                        .unwrap_or("")
                        .to_string();
                    vec![Ok(StreamEvent::Token { text })]
                }
                Some("thinking_delta") => {
                    let text = delta
                        .get("thinking")
                        .and_then(|v| v.as_str())
                        .unwrap_or("")
                        .to_string();
                    vec![Ok(StreamEvent::Thinking { text })]
                }
                Some("input_json_delta") => {
                    let partial = delta
                        .get("partial_json")
                        .and_then(|v| v.as_str())
                        .unwrap_or("")
                        .to_string();
                    vec![Ok(StreamEvent::ToolCallDelta {
                        call_id: v
                            .get("index")
                            .and_then(|i| i.as_u64())
                            .unwrap_or(0)
                            .to_string(),
                        delta: partial,
                    })]
                }
                _ => Vec::new(),
            }
        }
        Some("content_block_start") => {
            let block = v.get("content_block").unwrap_or(&Value::Null);
            if block.get("type").and_then(|t| t.as_str()) == Some("tool_use") {
                let call_id = block
                    .get("id")
                    .and_then(|v| v.as_str())
                    .unwrap_or("")
                    .to_string();
                let tool_name = block
                    .get("name")
                    .and_then(|v| v.as_str())
                    .unwrap_or("")
                    .to_string();
                vec![Ok(StreamEvent::ToolCallStarted {
                    call_id,
                    tool_name,
                })]
            } else {
                Vec::new()
            }
        }
        Some("message_delta") => {
            let finish_reason = v
                .get("delta")
                .and_then(|d| d.get("stop_reason"))
                .and_then(|v| v.as_str())
                .map(String::from);
            let usage = v.get("usage").and_then(parse_anthropic_usage);
            vec![Ok(StreamEvent::Done {
                usage,
                finish_reason,
            })]
        }
        Some("message_stop") => vec![Ok(StreamEvent::Done {
            usage: None,
            finish_reason: None,
        })],
        _ => Vec::new(),
    }
}

#[async_trait::async_trait]
impl LlmProvider for AnthropicProvider {
    async fn chat(&self, req: &ChatRequest) -> Result<ChatResponse> {
        let url = format!("{}/v1/messages", self.base_url);
        let body = self.build_chat_body(req, false);

        tracing::debug!(provider = %self.id, "anthropic chat request");

        let resp = self
            .authed_post(&url)
            .json(&body)
            .send()
            .await
            .map_err(from_reqwest)?;

        let status = resp.status();
        let resp_text = resp.text().await.map_err(from_reqwest)?;

        if !status.is_success() {
            return Err(Error::provider_from_status(
                self.id.clone(),
                status.as_u16(),
                format!("HTTP {} - {}", status.as_u16(), resp_text),
            ));
        }

        let resp_json: Value = serde_json::from_str(&resp_text)?;
        parse_chat_response(&resp_json)
    }

    async fn chat_stream(
        &self,
        req: &ChatRequest,
    ) -> Result<BoxStream<'static, Result<StreamEvent>>> {
        let url = format!("{}/v1/messages", self.base_url);
        let body = self.build_chat_body(req, true);
        let provider_id = self.id.clone();

        let resp = self
            .authed_post(&url)
            .json(&body)
            .send()
            .await
            .map_err(from_reqwest)?;

        let status = resp.status();
        if !status.is_success() {
            let err_text = resp.text().await.map_err(from_reqwest)?;
            return Err(Error::provider_from_status(
                provider_id,
                status.as_u16(),
                format!("HTTP {} - {}", status.as_u16(), err_text),
            ));
        }

        Ok(crate::sse::sse_response_stream(resp, parse_sse_data))
    }

    async fn embeddings(&self, _req: EmbeddingsRequest) -> Result<EmbeddingsResponse> {
        Err(Error::ProviderPermanent {
            provider: self.id.clone(),
            message: "Anthropic has no embeddings endpoint; route the Embedder role to an \
                      OpenAI-compatible provider"
                .into(),
        })
    }

    fn capabilities(&self) -> &LlmCapabilities {
        &self.capabilities
    }

    fn provider_id(&self) -> &str {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_chat_response_extracts_text_and_tool_calls() {
        let body = serde_json::json!({
            "model": "claude-3-5-sonnet-20241022",
            "stop_reason": "tool_use",
            "content": [
                {"type": "text", "text": "Looking that up..."},
                {"type": "tool_use", "id": "toolu_1", "name": "lookup", "input": {"q": "x"}}
            ],
            "usage": {"input_tokens": 50, "output_tokens": 12}
        });
        let resp = parse_chat_response(&body).unwrap();
        assert_eq!(resp.content, "Looking that up...");
        assert_eq!(resp.tool_calls.len(), 1);
        assert_eq!(resp.tool_calls[0].tool_name, "lookup");
        assert_eq!(resp.usage.unwrap().total_tokens, 62);
        assert_eq!(resp.finish_reason.as_deref(), Some("tool_use"));
    }

    #[test]
    fn parse_chat_response_missing_content_errors() {
        let body = serde_json::json!({"model": "claude-3-5-sonnet-20241022"});
        assert!(parse_chat_response(&body).is_err());
    }

    #[test]
    fn parse_sse_data_text_delta() {
        let data = r#"{"type":"content_block_delta","delta":{"type":"text_delta","text":"hi"}}"#;
        let events = parse_sse_data(data);
        assert_eq!(events.len(), 1);
        match &events[0] {
            Ok(StreamEvent::Token { text }) => assert_eq!(text, "hi"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn parse_sse_data_message_stop() {
        let events = parse_sse_data(r#"{"type":"message_stop"}"#);
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], Ok(StreamEvent::Done { .. })));
    }
}
