//! Minimal OpenAI-compatible chat.completions client.
//!
//! Transcripts are mapped onto the wire format here: `data` messages go out as
//! `system`, and assistant messages with tool parts become `tool_calls` followed
//! by one `tool` message per result.
//! Calls log model names, latencies and token usage, never message contents.
//!
//! NOTE: We never log the API key.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument};

use crate::error::{Result, TutorError};
use crate::model::{ChatModel, CompletionRequest, ModelTurn, ToolCall, ToolChoice, ToolDeclaration};
use crate::transcript::{Message, MessagePart, Role};

#[derive(Clone)]
pub struct OpenAI {
  pub client: reqwest::Client,
  pub api_key: String,
  pub base_url: String,
  pub model: String,
}

impl OpenAI {
  /// Construct the client if we find OPENAI_API_KEY; otherwise return None.
  pub fn from_env() -> Option<Self> {
    let api_key = std::env::var("OPENAI_API_KEY").ok()?;
    let base_url = std::env::var("OPENAI_BASE_URL").unwrap_or_else(|_| "https://api.openai.com/v1".into());
    let model = std::env::var("OPENAI_MODEL").unwrap_or_else(|_| "gpt-4o-mini".into());
    let timeout = std::env::var("OPENAI_TIMEOUT_SECS")
      .ok()
      .and_then(|s| s.parse::<u64>().ok())
      .unwrap_or(60);

    match Self::new(api_key, base_url, model, Duration::from_secs(timeout)) {
      Ok(oa) => Some(oa),
      Err(e) => {
        error!(target: "tutor_backend", error = %e, "Failed to build HTTP client for OpenAI");
        None
      }
    }
  }

  pub fn new(api_key: String, base_url: String, model: String, timeout: Duration) -> Result<Self> {
    let client = reqwest::Client::builder().timeout(timeout).build()?;
    Ok(Self { client, api_key, base_url: base_url.trim_end_matches('/').to_string(), model })
  }
}

#[async_trait]
impl ChatModel for OpenAI {
  #[instrument(level = "info", skip(self, request), fields(model = %request.model, messages = request.messages.len(), tools = request.tools.len()))]
  async fn complete(&self, request: CompletionRequest<'_>) -> Result<ModelTurn> {
    let url = format!("{}/chat/completions", self.base_url);
    let has_tools = !request.tools.is_empty();
    let req = ChatCompletionRequest {
      model: request.model,
      messages: to_wire(request.messages),
      temperature: request.temperature,
      tools: request.tools.iter().map(WireTool::from).collect(),
      tool_choice: if has_tools { Some(request.tool_choice.as_str()) } else { None },
      parallel_tool_calls: if has_tools && request.tool_choice != ToolChoice::None { Some(false) } else { None },
    };

    let start = Instant::now();
    let res = self
      .client
      .post(&url)
      .header(USER_AGENT, "tutor-backend/0.1")
      .header(CONTENT_TYPE, "application/json")
      .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
      .json(&req)
      .send()
      .await?;

    if !res.status().is_success() {
      let status = res.status();
      let body = res.text().await.unwrap_or_default();
      let msg = extract_openai_error(&body).unwrap_or(body);
      error!(elapsed = ?start.elapsed(), %status, "OpenAI call failed");
      return Err(TutorError::ModelUnavailable(format!("OpenAI HTTP {}: {}", status, msg)));
    }

    let body: ChatCompletionResponse = res
      .json()
      .await
      .map_err(|e| TutorError::ModelUnavailable(format!("unparseable completion: {e}")))?;
    if let Some(usage) = &body.usage {
      info!(elapsed = ?start.elapsed(), prompt_tokens = ?usage.prompt_tokens, completion_tokens = ?usage.completion_tokens, total_tokens = ?usage.total_tokens, "OpenAI usage");
    }

    let message = body
      .choices
      .into_iter()
      .next()
      .map(|c| c.message)
      .ok_or_else(|| TutorError::ModelUnavailable("completion had no choices".into()))?;

    let tool_calls = message
      .tool_calls
      .unwrap_or_default()
      .into_iter()
      .map(|c| ToolCall {
        id: c.id,
        // models occasionally emit arguments that are not JSON; keep the raw text so the tool can reject it
        arguments: serde_json::from_str(&c.function.arguments)
          .unwrap_or(serde_json::Value::String(c.function.arguments)),
        name: c.function.name,
      })
      .collect();

    Ok(ModelTurn { text: message.content.map(|t| t.trim().to_string()), tool_calls })
  }
}

/// Flatten a transcript into OpenAI chat messages.
fn to_wire(messages: &[Message]) -> Vec<WireMessage> {
  let mut out = Vec::with_capacity(messages.len());
  for m in messages {
    let role = match m.role {
      Role::System | Role::Data => "system",
      Role::User => "user",
      Role::Assistant => "assistant",
    };

    let parts = m.parts();
    if m.role != Role::Assistant || parts.is_empty() {
      out.push(WireMessage::text(role, m.plain_text()));
      continue;
    }

    let text = m.plain_text();
    let tool_calls: Vec<WireToolCall> = parts
      .iter()
      .filter_map(|p| match p {
        MessagePart::ToolInvocation { tool_call_id, tool_name, args } => Some(WireToolCall {
          id: tool_call_id.clone(),
          kind: "function".into(),
          function: WireFunction { name: tool_name.clone(), arguments: args.to_string() },
        }),
        _ => None,
      })
      .collect();

    out.push(WireMessage {
      role,
      content: if text.is_empty() { None } else { Some(text) },
      tool_calls,
      tool_call_id: None,
    });

    for p in parts {
      if let MessagePart::ToolResult { tool_call_id, result, is_error, .. } = p {
        let content = if *is_error { format!("Error: {result}") } else { result.clone() };
        out.push(WireMessage { role: "tool", content: Some(content), tool_calls: vec![], tool_call_id: Some(tool_call_id.clone()) });
      }
    }
  }
  out
}

// --- Chat DTOs ---

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
  model: &'a str,
  messages: Vec<WireMessage>,
  temperature: f32,
  #[serde(skip_serializing_if = "Vec::is_empty")]
  tools: Vec<WireTool>,
  #[serde(skip_serializing_if = "Option::is_none")]
  tool_choice: Option<&'static str>,
  #[serde(skip_serializing_if = "Option::is_none")]
  parallel_tool_calls: Option<bool>,
}

#[derive(Serialize, Debug)]
struct WireMessage {
  role: &'static str,
  #[serde(skip_serializing_if = "Option::is_none")]
  content: Option<String>,
  #[serde(skip_serializing_if = "Vec::is_empty")]
  tool_calls: Vec<WireToolCall>,
  #[serde(skip_serializing_if = "Option::is_none")]
  tool_call_id: Option<String>,
}

impl WireMessage {
  fn text(role: &'static str, content: String) -> Self {
    Self { role, content: Some(content), tool_calls: vec![], tool_call_id: None }
  }
}

#[derive(Serialize, Deserialize, Debug)]
struct WireToolCall {
  id: String,
  #[serde(rename = "type", default = "function_kind")]
  kind: String,
  function: WireFunction,
}

fn function_kind() -> String {
  "function".into()
}

#[derive(Serialize, Deserialize, Debug)]
struct WireFunction {
  name: String,
  #[serde(default)]
  arguments: String,
}

#[derive(Serialize)]
struct WireTool {
  #[serde(rename = "type")]
  kind: &'static str,
  function: WireFunctionDecl,
}

#[derive(Serialize)]
struct WireFunctionDecl {
  name: String,
  description: String,
  parameters: serde_json::Value,
}

impl From<&ToolDeclaration> for WireTool {
  fn from(d: &ToolDeclaration) -> Self {
    Self {
      kind: "function",
      function: WireFunctionDecl { name: d.name.clone(), description: d.description.clone(), parameters: d.parameters.clone() },
    }
  }
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
  choices: Vec<ChatChoice>,
  #[serde(default)]
  usage: Option<Usage>,
}
#[derive(Deserialize)]
struct ChatChoice {
  message: ChatMessageResp,
}
#[derive(Deserialize)]
struct ChatMessageResp {
  #[serde(default)]
  content: Option<String>,
  #[serde(default)]
  tool_calls: Option<Vec<WireToolCall>>,
}
#[derive(Deserialize)]
struct Usage {
  #[serde(default)]
  prompt_tokens: Option<u32>,
  #[serde(default)]
  completion_tokens: Option<u32>,
  #[serde(default)]
  total_tokens: Option<u32>,
}

/// Try to extract a clean error message from OpenAI error body.
fn extract_openai_error(body: &str) -> Option<String> {
  #[derive(Deserialize)]
  struct EWrap {
    error: EObj,
  }
  #[derive(Deserialize)]
  struct EObj {
    message: String,
  }
  serde_json::from_str::<EWrap>(body).ok().map(|w| w.error.message)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::tools::{AnswerTool, Tool};
  use serde_json::json;
  use wiremock::matchers::{body_partial_json, header, method, path};
  use wiremock::{Mock, MockServer, ResponseTemplate};

  fn client(server: &MockServer) -> OpenAI {
    OpenAI::new("test-key".into(), format!("{}/", server.uri()), "gpt-test".into(), Duration::from_secs(5)).unwrap()
  }

  fn answer_decl() -> Vec<ToolDeclaration> {
    let t = AnswerTool;
    vec![ToolDeclaration { name: t.name().into(), description: t.description().into(), parameters: t.parameters() }]
  }

  #[test]
  fn wire_format_maps_data_and_tool_parts() {
    let msgs = vec![
      Message::text(Role::Data, "policy"),
      Message::text(Role::User, "What is 2+2?"),
      Message::assistant_parts(vec![
        MessagePart::Text { text: "Computing.".into() },
        MessagePart::ToolInvocation { tool_call_id: "c1".into(), tool_name: "calculator".into(), args: json!({"expression": "2+2"}) },
        MessagePart::ToolResult { tool_call_id: "c1".into(), tool_name: "calculator".into(), result: "4".into(), is_error: false },
      ]),
    ];
    let wire = serde_json::to_value(to_wire(&msgs)).unwrap();
    assert_eq!(wire[0], json!({ "role": "system", "content": "policy" }));
    assert_eq!(wire[1], json!({ "role": "user", "content": "What is 2+2?" }));
    assert_eq!(wire[2]["role"], "assistant");
    assert_eq!(wire[2]["content"], "Computing.");
    assert_eq!(wire[2]["tool_calls"][0]["id"], "c1");
    assert_eq!(wire[2]["tool_calls"][0]["type"], "function");
    assert_eq!(wire[2]["tool_calls"][0]["function"]["arguments"], r#"{"expression":"2+2"}"#);
    assert_eq!(wire[3], json!({ "role": "tool", "content": "4", "tool_call_id": "c1" }));
  }

  #[tokio::test]
  async fn parses_tool_calls_and_sends_tool_policy() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
      .and(path("/chat/completions"))
      .and(header("authorization", "Bearer test-key"))
      .and(body_partial_json(json!({
        "model": "gpt-test",
        "tool_choice": "required",
        "parallel_tool_calls": false,
        "tools": [{ "type": "function", "function": { "name": "answer" } }]
      })))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!({
        "choices": [{ "message": {
          "content": null,
          "tool_calls": [{ "id": "call_1", "type": "function", "function": { "name": "answer", "arguments": "{\"answer\":\"4\"}" } }]
        }}],
        "usage": { "prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15 }
      })))
      .expect(1)
      .mount(&server)
      .await;

    let oa = client(&server);
    let msgs = vec![Message::text(Role::User, "What is 2+2?")];
    let tools = answer_decl();
    let turn = oa
      .complete(CompletionRequest { model: "gpt-test", messages: &msgs, tools: &tools, tool_choice: ToolChoice::Required, temperature: 0.0 })
      .await
      .unwrap();

    assert_eq!(turn.text, None);
    assert_eq!(turn.tool_calls, vec![ToolCall { id: "call_1".into(), name: "answer".into(), arguments: json!({ "answer": "4" }) }]);
  }

  #[tokio::test]
  async fn non_json_arguments_are_kept_raw() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!({
        "choices": [{ "message": {
          "tool_calls": [{ "id": "c", "type": "function", "function": { "name": "calculator", "arguments": "2+2" } }]
        }}]
      })))
      .mount(&server)
      .await;

    let msgs = vec![Message::text(Role::User, "q")];
    let turn = client(&server)
      .complete(CompletionRequest { model: "m", messages: &msgs, tools: &[], tool_choice: ToolChoice::None, temperature: 0.0 })
      .await
      .unwrap();
    assert_eq!(turn.tool_calls[0].arguments, json!("2+2"));
  }

  #[tokio::test]
  async fn http_errors_become_model_unavailable() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
      .respond_with(ResponseTemplate::new(429).set_body_json(json!({ "error": { "message": "Rate limit reached" } })))
      .mount(&server)
      .await;

    let msgs = vec![Message::text(Role::User, "q")];
    let err = client(&server)
      .complete(CompletionRequest { model: "m", messages: &msgs, tools: &[], tool_choice: ToolChoice::None, temperature: 0.0 })
      .await
      .unwrap_err();
    match err {
      TutorError::ModelUnavailable(msg) => assert!(msg.contains("Rate limit reached"), "{msg}"),
      other => panic!("unexpected error: {other:?}"),
    }
  }

  #[tokio::test]
  async fn empty_choices_and_garbage_are_model_unavailable() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "choices": [] })))
      .up_to_n_times(1)
      .mount(&server)
      .await;
    Mock::given(method("POST"))
      .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
      .mount(&server)
      .await;

    let oa = client(&server);
    let msgs = vec![Message::text(Role::User, "q")];
    for _ in 0..2 {
      let err = oa
        .complete(CompletionRequest { model: "m", messages: &msgs, tools: &[], tool_choice: ToolChoice::None, temperature: 0.0 })
        .await
        .unwrap_err();
      assert!(matches!(err, TutorError::ModelUnavailable(_)));
    }
  }

  #[tokio::test]
  async fn unreachable_endpoint_is_model_unavailable() {
    let oa = OpenAI::new("k".into(), "http://127.0.0.1:9".into(), "m".into(), Duration::from_secs(2)).unwrap();
    let msgs = vec![Message::text(Role::User, "q")];
    let err = oa
      .complete(CompletionRequest { model: "m", messages: &msgs, tools: &[], tool_choice: ToolChoice::None, temperature: 0.0 })
      .await
      .unwrap_err();
    assert!(matches!(err, TutorError::ModelUnavailable(_)));
  }
}
