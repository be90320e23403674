//! Public protocol structs for WebSocket and HTTP endpoints (serde ready).
//! Keep this small and stable to evolve backend and frontend independently.

use serde::{Deserialize, Serialize};

use crate::config::ModelEntry;
use crate::domain::{Assignment, Chat, Problem, VoteKind};
use crate::seeder::PromptVariant;
use crate::tools::FinalAnswer;
use crate::transcript::Message;

/// Messages the client can send over WebSocket.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientWsMessage {
  Ping,
  StartSession {
    #[serde(rename = "problemId")]
    problem_id: String,
    #[serde(default)]
    variant: Option<PromptVariant>,
    #[serde(default, rename = "modelId")]
    model_id: Option<String>,
  },
  UserMessage {
    text: String,
  },
  Save {
    title: String,
  },
}

/// Messages the server sends back over WebSocket.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerWsMessage {
  Pong,
  Session {
    session: SessionOut,
  },
  Reply {
    message: Message,
  },
  Saved {
    #[serde(rename = "chatId")]
    chat_id: String,
  },
  Error {
    message: String,
  },
}

//
// HTTP request/response DTOs
//

#[derive(Serialize)]
pub struct HealthOut {
  pub ok: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelsOut {
  pub models: Vec<ModelEntry>,
  pub default_model: String,
}

/// `?id=` on the single-record routes. Optional so a missing id is a 400 from us, not a rejection.
#[derive(Debug, Deserialize)]
pub struct IdQuery {
  pub id: Option<String>,
}

#[derive(Deserialize)]
pub struct AssignmentIn {
  pub title: String,
}

#[derive(Serialize)]
pub struct AssignmentOut {
  pub assignment: Assignment,
  pub problems: Vec<Problem>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProblemIn {
  pub assignment_id: String,
  pub content: serde_json::Value,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionIn {
  pub problem_id: String,
  #[serde(default)]
  pub variant: Option<PromptVariant>,
  #[serde(default)]
  pub model_id: Option<String>,
}

/// Opening state of a tutoring session.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionOut {
  pub chat_id: String,
  /// answered | budget_exhausted | concluded | model_unavailable | skipped
  pub state: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub answer: Option<FinalAnswer>,
  pub round_trips: u32,
  pub messages: Vec<Message>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplyIn {
  #[serde(default)]
  pub messages: Vec<Message>,
  pub text: String,
  #[serde(default)]
  pub model_id: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplyOut {
  pub user_message: Message,
  pub reply: Message,
}

#[derive(Deserialize)]
pub struct ChatIn {
  pub title: String,
  #[serde(default)]
  pub messages: Vec<Message>,
}

#[derive(Serialize)]
pub struct ChatOut {
  pub chat: Chat,
  pub messages: Vec<Message>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteQuery {
  pub chat_id: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteIn {
  pub chat_id: String,
  pub message_id: String,
  #[serde(rename = "type")]
  pub kind: VoteKind,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WsQuery {
  pub user_id: Option<String>,
}
