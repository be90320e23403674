//! Core behaviors shared by both HTTP and WebSocket handlers.
//!
//! This includes:
//!   - Starting a tutoring session (seed, pre-solve, optional reference note)
//!   - Continuing a conversation with the human in the loop
//!   - Owner-checked access to assignments, problems, chats and votes

use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::domain::{Assignment, Chat, Problem, Vote, VoteKind};
use crate::error::{Result, TutorError};
use crate::model::{CompletionRequest, ToolChoice};
use crate::presolve::Presolver;
use crate::protocol::{AssignmentOut, ChatOut, SessionOut};
use crate::seeder::{reference_note, seed, PromptVariant};
use crate::state::AppState;
use crate::transcript::{Message, Role, Transcript};

/// Seed a transcript for `problem_id` and let the model solve it first.
///
/// A failing model never fails the session: the seed transcript is returned
/// with state `model_unavailable` and the student can still start chatting.
#[instrument(level = "info", skip(state), fields(%user_id, %problem_id, ?variant, ?model_id))]
pub async fn start_session(
  state: &AppState,
  user_id: &str,
  problem_id: &str,
  variant: PromptVariant,
  model_id: Option<&str>,
) -> Result<SessionOut> {
  let problem = load_owned_problem(state, user_id, problem_id).await?;
  let mut transcript = seed(&problem, variant, &state.config.prompts)?;

  let policy = &state.config.presolve;
  let model_name = match &policy.model {
    Some(m) => m.clone(),
    None => state.config.resolve_model(model_id),
  };

  let mut session_state = "skipped".to_string();
  let mut answer = None;
  let mut round_trips = 0;

  match &state.model {
    Some(model) if policy.enabled => {
      let presolver = Presolver::new(model.as_ref(), &state.toolbox, policy, &model_name);
      match presolver.run(&transcript).await {
        Ok(run) => {
          session_state = run.state.as_str().to_string();
          answer = run.answer;
          round_trips = run.round_trips;
          transcript = run.transcript;
        }
        Err(TutorError::ModelUnavailable(msg)) => {
          warn!(target: "presolve", %problem_id, error = %msg, "Pre-solve failed; continuing with the seed transcript");
          session_state = "model_unavailable".into();
        }
        Err(e) => return Err(e),
      }
    }
    _ => {}
  }

  if state.config.prompts.reveal_reference {
    if let Some(note) = reference_note(&problem, &state.config.prompts)? {
      transcript.push(note);
    }
  }

  let chat_id = Uuid::new_v4().to_string();
  info!(target: "tutor_backend", %chat_id, %problem_id, state = %session_state, round_trips, messages = transcript.len(), "Session started");
  Ok(SessionOut { chat_id, state: session_state, answer, round_trips, messages: transcript.into_messages() })
}

/// Append the student's message and the model's reply to `transcript`.
/// Both are appended only if the model answers; on error the transcript is unchanged.
#[instrument(level = "info", skip(state, transcript, text), fields(messages = transcript.len(), text_len = text.len(), ?model_id))]
pub async fn continue_chat(
  state: &AppState,
  transcript: &mut Transcript,
  text: &str,
  model_id: Option<&str>,
) -> Result<(Message, Message)> {
  if text.trim().is_empty() {
    return Err(TutorError::BadRequest("text must not be empty".into()));
  }
  let model = state
    .model
    .as_ref()
    .ok_or_else(|| TutorError::ModelUnavailable("no model configured".into()))?;

  let user_message = Message::text(Role::User, text);
  let mut outgoing = transcript.messages().to_vec();
  outgoing.push(user_message.clone());

  let model_name = state.config.resolve_model(model_id);
  let turn = model
    .complete(CompletionRequest {
      model: &model_name,
      messages: &outgoing,
      tools: &[],
      tool_choice: ToolChoice::None,
      temperature: state.config.prompts.reply_temperature,
    })
    .await?;

  let reply_text = turn
    .text
    .filter(|t| !t.trim().is_empty())
    .ok_or_else(|| TutorError::ModelUnavailable("model returned an empty reply".into()))?;
  let reply = Message::text(Role::Assistant, reply_text);

  transcript.push(user_message.clone());
  transcript.push(reply.clone());
  Ok((user_message, reply))
}

// --- assignments & problems ---

async fn load_owned_assignment(state: &AppState, user_id: &str, id: &str) -> Result<Assignment> {
  let a = state
    .store
    .get_assignment_by_id(id)
    .await
    .ok_or_else(|| TutorError::NotFound(format!("assignment {id}")))?;
  if a.user_id != user_id {
    return Err(TutorError::Unauthorized);
  }
  Ok(a)
}

async fn load_owned_problem(state: &AppState, user_id: &str, id: &str) -> Result<Problem> {
  let p = state
    .store
    .get_problem_by_id(id)
    .await
    .ok_or_else(|| TutorError::NotFound(format!("problem {id}")))?;
  load_owned_assignment(state, user_id, &p.assignment_id).await?;
  Ok(p)
}

#[instrument(level = "info", skip(state), fields(%user_id, %id))]
pub async fn get_assignment(state: &AppState, user_id: &str, id: &str) -> Result<AssignmentOut> {
  let assignment = load_owned_assignment(state, user_id, id).await?;
  let problems = state.store.get_problems_by_assignment_id(id).await;
  Ok(AssignmentOut { assignment, problems })
}

#[instrument(level = "info", skip(state, title), fields(%user_id, %id))]
pub async fn save_assignment(state: &AppState, user_id: &str, id: &str, title: &str) -> Result<Assignment> {
  if let Some(existing) = state.store.get_assignment_by_id(id).await {
    if existing.user_id != user_id {
      return Err(TutorError::Unauthorized);
    }
  }
  Ok(state.store.save_assignment(id, user_id, title).await)
}

#[instrument(level = "info", skip(state), fields(%user_id, %id))]
pub async fn delete_assignment(state: &AppState, user_id: &str, id: &str) -> Result<()> {
  load_owned_assignment(state, user_id, id).await?;
  state.store.delete_assignment_by_id(id).await;
  Ok(())
}

#[instrument(level = "info", skip(state), fields(%user_id, %id))]
pub async fn get_problem(state: &AppState, user_id: &str, id: &str) -> Result<Problem> {
  load_owned_problem(state, user_id, id).await
}

#[instrument(level = "info", skip(state, content), fields(%user_id, %id, %assignment_id))]
pub async fn save_problem(
  state: &AppState,
  user_id: &str,
  id: &str,
  assignment_id: &str,
  content: serde_json::Value,
) -> Result<Problem> {
  if !content.is_object() {
    return Err(TutorError::BadRequest("content must be a JSON object".into()));
  }
  load_owned_assignment(state, user_id, assignment_id).await?;
  state.store.save_problem(id, assignment_id, content).await
}

#[instrument(level = "info", skip(state), fields(%user_id, %id))]
pub async fn delete_problem(state: &AppState, user_id: &str, id: &str) -> Result<()> {
  load_owned_problem(state, user_id, id).await?;
  state.store.delete_problem_by_id(id).await;
  Ok(())
}

// --- chats & votes ---

async fn load_owned_chat(state: &AppState, user_id: &str, id: &str) -> Result<Chat> {
  let chat = state
    .store
    .get_chat_by_id(id)
    .await
    .ok_or_else(|| TutorError::NotFound(format!("chat {id}")))?;
  if chat.user_id != user_id {
    return Err(TutorError::Unauthorized);
  }
  Ok(chat)
}

#[instrument(level = "info", skip(state, title, messages), fields(%user_id, %id, messages = messages.len()))]
pub async fn save_chat(state: &AppState, user_id: &str, id: &str, title: &str, messages: Vec<Message>) -> Result<Chat> {
  if let Some(existing) = state.store.get_chat_by_id(id).await {
    if existing.user_id != user_id {
      return Err(TutorError::Unauthorized);
    }
  }
  Ok(state.store.save_chat(id, user_id, title, messages).await)
}

#[instrument(level = "info", skip(state), fields(%user_id, %id))]
pub async fn get_chat(state: &AppState, user_id: &str, id: &str) -> Result<ChatOut> {
  let chat = load_owned_chat(state, user_id, id).await?;
  let messages = state.store.get_messages_by_chat_id(id).await;
  Ok(ChatOut { chat, messages })
}

#[instrument(level = "info", skip(state), fields(%user_id, %id))]
pub async fn delete_chat(state: &AppState, user_id: &str, id: &str) -> Result<()> {
  load_owned_chat(state, user_id, id).await?;
  state.store.delete_chat_by_id(id).await;
  Ok(())
}

#[instrument(level = "info", skip(state), fields(%user_id, %chat_id))]
pub async fn get_votes(state: &AppState, user_id: &str, chat_id: &str) -> Result<Vec<Vote>> {
  load_owned_chat(state, user_id, chat_id).await?;
  Ok(state.store.get_votes_by_chat_id(chat_id).await)
}

#[instrument(level = "info", skip(state), fields(%user_id, %chat_id, %message_id, ?kind))]
pub async fn vote(state: &AppState, user_id: &str, chat_id: &str, message_id: &str, kind: VoteKind) -> Result<Vote> {
  load_owned_chat(state, user_id, chat_id).await?;
  state.store.vote_message(chat_id, message_id, kind).await
}
