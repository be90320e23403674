//! Conversation messages and the append-only transcript.
//!
//! A message carries either plain text or an ordered list of tagged parts.
//! Tool-augmented assistant turns use parts so that "which part is the tool
//! call" is a pattern match, never a positional guess.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
  System,
  User,
  Assistant,
  /// Out-of-band instructions for the model; never shown as a chat bubble.
  Data,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum MessagePart {
  Text {
    text: String,
  },
  #[serde(rename_all = "camelCase")]
  ToolInvocation {
    tool_call_id: String,
    tool_name: String,
    args: serde_json::Value,
  },
  #[serde(rename_all = "camelCase")]
  ToolResult {
    tool_call_id: String,
    tool_name: String,
    result: String,
    #[serde(default)]
    is_error: bool,
  },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
  Text(String),
  Parts(Vec<MessagePart>),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Message {
  pub id: String,
  pub role: Role,
  pub content: MessageContent,
}

impl Message {
  pub fn text(role: Role, content: impl Into<String>) -> Self {
    Self { id: Uuid::new_v4().to_string(), role, content: MessageContent::Text(content.into()) }
  }

  pub fn assistant_parts(parts: Vec<MessagePart>) -> Self {
    Self { id: Uuid::new_v4().to_string(), role: Role::Assistant, content: MessageContent::Parts(parts) }
  }

  /// Concatenated text of the message, ignoring tool parts.
  pub fn plain_text(&self) -> String {
    match &self.content {
      MessageContent::Text(t) => t.clone(),
      MessageContent::Parts(parts) => parts
        .iter()
        .filter_map(|p| match p {
          MessagePart::Text { text } => Some(text.as_str()),
          _ => None,
        })
        .collect::<Vec<_>>()
        .join("\n"),
    }
  }

  pub fn parts(&self) -> &[MessagePart] {
    match &self.content {
      MessageContent::Parts(parts) => parts,
      MessageContent::Text(_) => &[],
    }
  }
}

/// Ordered, append-only message sequence.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Transcript {
  messages: Vec<Message>,
}

impl Transcript {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn push(&mut self, message: Message) {
    self.messages.push(message);
  }

  pub fn len(&self) -> usize {
    self.messages.len()
  }

  #[cfg(test)]
  pub fn is_empty(&self) -> bool {
    self.messages.is_empty()
  }

  pub fn messages(&self) -> &[Message] {
    &self.messages
  }

  pub fn into_messages(self) -> Vec<Message> {
    self.messages
  }
}

impl From<Vec<Message>> for Transcript {
  fn from(messages: Vec<Message>) -> Self {
    Self { messages }
  }
}
