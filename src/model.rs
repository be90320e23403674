//! The seam between the tutor core and a hosted chat-completion endpoint.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::transcript::Message;

/// Whether the model may answer in prose or must call a tool.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolChoice {
  Auto,
  #[default]
  Required,
  None,
}

impl ToolChoice {
  pub fn as_str(&self) -> &'static str {
    match self {
      ToolChoice::Auto => "auto",
      ToolChoice::Required => "required",
      ToolChoice::None => "none",
    }
  }
}

/// Tool declaration as advertised to the model.
#[derive(Clone, Debug, PartialEq)]
pub struct ToolDeclaration {
  pub name: String,
  pub description: String,
  pub parameters: serde_json::Value,
}

/// A tool invocation requested by the model.
#[derive(Clone, Debug, PartialEq)]
pub struct ToolCall {
  pub id: String,
  pub name: String,
  pub arguments: serde_json::Value,
}

/// One model response: optional prose plus zero or more tool calls, in order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ModelTurn {
  pub text: Option<String>,
  pub tool_calls: Vec<ToolCall>,
}

pub struct CompletionRequest<'a> {
  pub model: &'a str,
  pub messages: &'a [Message],
  pub tools: &'a [ToolDeclaration],
  pub tool_choice: ToolChoice,
  pub temperature: f32,
}

#[async_trait]
pub trait ChatModel: Send + Sync {
  /// Single round-trip. Any transport or decoding failure is `ModelUnavailable`.
  async fn complete(&self, request: CompletionRequest<'_>) -> Result<ModelTurn>;
}
