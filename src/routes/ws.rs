//! WebSocket upgrade + message loop. Each client message is parsed as JSON and
//! forwarded to core logic. We reply with a single JSON message per request.
//!
//! The connection owns its transcript: `start_session` replaces it, `user_message`
//! appends to it, `save` persists it as a chat.

use std::sync::Arc;
use axum::{
  extract::{
    ws::{Message, WebSocket},
    Query, State, WebSocketUpgrade,
  },
  response::{IntoResponse, Response},
};
use tracing::{debug, error, info, instrument, warn};

use crate::error::TutorError;
use crate::logic::{continue_chat, save_chat, start_session};
use crate::protocol::{ClientWsMessage, ServerWsMessage, WsQuery};
use crate::state::AppState;
use crate::transcript::Transcript;

/// Per-connection conversation.
struct Conversation {
  user_id: String,
  chat_id: Option<String>,
  model_id: Option<String>,
  transcript: Transcript,
  /// Set once the chat is persisted; later exchanges are appended to it.
  /// Cleared when an append fails.
  saved: bool,
}

#[instrument(level = "info", skip(ws, state))]
pub async fn ws_upgrade(
  ws: WebSocketUpgrade,
  State(state): State<Arc<AppState>>,
  Query(q): Query<WsQuery>,
) -> Response {
  let Some(user_id) = q.user_id.filter(|u| !u.trim().is_empty()) else {
    return TutorError::Unauthorized.into_response();
  };
  info!(target: "tutor_backend", %user_id, "WebSocket upgrade requested");
  ws.on_upgrade(move |socket| handle_ws(socket, state, user_id))
}

#[instrument(level = "info", skip(socket, state))]
async fn handle_ws(mut socket: WebSocket, state: Arc<AppState>, user_id: String) {
  info!(target: "tutor_backend", "WebSocket connected");
  let mut conv = Conversation { user_id, chat_id: None, model_id: None, transcript: Transcript::new(), saved: false };

  while let Some(Ok(msg)) = socket.recv().await {
    match msg {
      Message::Text(txt) => {
        // Parse, dispatch, serialize response.
        let reply_msg = match serde_json::from_str::<ClientWsMessage>(&txt) {
          Ok(incoming) => {
            debug!(target: "tutor_backend", "WS received: {:?}", &incoming);
            handle_client_ws(incoming, &state, &mut conv).await
          }
          Err(e) => ServerWsMessage::Error { message: format!("Invalid JSON: {}", e) },
        };

        let out = serde_json::to_string(&reply_msg).unwrap_or_else(|e| {
          serde_json::json!({ "type": "error", "message": format!("Serialization error: {}", e) }).to_string()
        });

        if let Err(e) = socket.send(Message::Text(out)).await {
          error!(target: "tutor_backend", error = %e, "WS send error");
          break;
        }
      }
      Message::Ping(payload) => { let _ = socket.send(Message::Pong(payload)).await; }
      Message::Close(_) => break,
      _ => {}
    }
  }
  info!(target: "tutor_backend", chat_id = ?conv.chat_id, messages = conv.transcript.len(), "WebSocket disconnected");
}

#[instrument(level = "info", skip(state, conv), fields(user = %conv.user_id))]
async fn handle_client_ws(msg: ClientWsMessage, state: &AppState, conv: &mut Conversation) -> ServerWsMessage {
  match msg {
    ClientWsMessage::Ping => ServerWsMessage::Pong,

    ClientWsMessage::StartSession { problem_id, variant, model_id } => {
      match start_session(state, &conv.user_id, &problem_id, variant.unwrap_or_default(), model_id.as_deref()).await {
        Ok(session) => {
          conv.chat_id = Some(session.chat_id.clone());
          conv.model_id = model_id;
          conv.saved = false;
          conv.transcript = Transcript::from(session.messages.clone());
          info!(target: "tutor_backend", chat_id = %session.chat_id, state = %session.state, "WS session started");
          ServerWsMessage::Session { session }
        }
        Err(e) => ServerWsMessage::Error { message: e.to_string() },
      }
    }

    ClientWsMessage::UserMessage { text } => {
      let Some(chat_id) = conv.chat_id.clone() else {
        return ServerWsMessage::Error { message: "No session: send start_session first".into() };
      };
      match continue_chat(state, &mut conv.transcript, &text, conv.model_id.as_deref()).await {
        Ok((user_message, reply)) => {
          if conv.saved {
            if let Err(e) = state.store.save_messages(&chat_id, vec![user_message, reply.clone()]).await {
              // The next save rewrites the whole transcript.
              conv.saved = false;
              warn!(target: "tutor_backend", %chat_id, error = %e, "Failed to persist exchange; chat marked unsaved");
            }
          }
          ServerWsMessage::Reply { message: reply }
        }
        Err(e) => ServerWsMessage::Error { message: e.to_string() },
      }
    }

    ClientWsMessage::Save { title } => {
      let Some(chat_id) = conv.chat_id.clone() else {
        return ServerWsMessage::Error { message: "No session to save".into() };
      };
      let messages = conv.transcript.messages().to_vec();
      match save_chat(state, &conv.user_id, &chat_id, &title, messages).await {
        Ok(chat) => {
          conv.saved = true;
          ServerWsMessage::Saved { chat_id: chat.id }
        }
        Err(e) => ServerWsMessage::Error { message: e.to_string() },
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::config::AgentConfig;
  use crate::model::testing::{text_turn, ScriptedModel};
  use crate::model::ChatModel;
  use crate::samples::{insert_samples, DEMO_PROBLEM_ID, DEMO_USER};
  use crate::seeder::SEED_LEN;

  fn conversation() -> Conversation {
    Conversation { user_id: DEMO_USER.into(), chat_id: None, model_id: None, transcript: Transcript::new(), saved: false }
  }

  #[tokio::test]
  async fn session_reply_and_save_share_one_transcript() {
    let model: Arc<dyn ChatModel> = Arc::new(ScriptedModel::new(vec![
      Ok(text_turn("I think it's 4.")),
      Ok(text_turn("Try adding them one at a time.")),
      Ok(text_turn("Exactly right.")),
    ]));
    let state = AppState::with_model(AgentConfig::default(), Some(model));
    insert_samples(&state.store).await.unwrap();
    let mut conv = conversation();

    let msg = ClientWsMessage::StartSession { problem_id: DEMO_PROBLEM_ID.into(), variant: None, model_id: None };
    let ServerWsMessage::Session { session } = handle_client_ws(msg, &state, &mut conv).await else {
      panic!("expected a session");
    };
    assert_eq!(session.state, "concluded");
    assert_eq!(conv.transcript.len(), SEED_LEN + 1);

    let reply = handle_client_ws(ClientWsMessage::UserMessage { text: "help".into() }, &state, &mut conv).await;
    assert!(matches!(reply, ServerWsMessage::Reply { .. }));
    assert_eq!(conv.transcript.len(), SEED_LEN + 3);

    let saved = handle_client_ws(ClientWsMessage::Save { title: "2+2".into() }, &state, &mut conv).await;
    let ServerWsMessage::Saved { chat_id } = saved else { panic!("expected saved") };
    assert_eq!(state.store.get_messages_by_chat_id(&chat_id).await.len(), SEED_LEN + 3);

    handle_client_ws(ClientWsMessage::UserMessage { text: "got it, 4".into() }, &state, &mut conv).await;
    assert_eq!(state.store.get_messages_by_chat_id(&chat_id).await.len(), SEED_LEN + 5);
  }

  #[tokio::test]
  async fn failed_append_marks_the_chat_unsaved_until_the_next_save() {
    let model: Arc<dyn ChatModel> = Arc::new(ScriptedModel::new(vec![
      Ok(text_turn("I think it's 4.")),
      Ok(text_turn("Try adding them one at a time.")),
      Ok(text_turn("Exactly right.")),
    ]));
    let state = AppState::with_model(AgentConfig::default(), Some(model));
    insert_samples(&state.store).await.unwrap();
    let mut conv = conversation();

    let msg = ClientWsMessage::StartSession { problem_id: DEMO_PROBLEM_ID.into(), variant: None, model_id: None };
    handle_client_ws(msg, &state, &mut conv).await;
    let saved = handle_client_ws(ClientWsMessage::Save { title: "2+2".into() }, &state, &mut conv).await;
    let ServerWsMessage::Saved { chat_id } = saved else { panic!("expected saved") };
    assert!(conv.saved);

    assert!(state.store.delete_chat_by_id(&chat_id).await);
    let reply = handle_client_ws(ClientWsMessage::UserMessage { text: "help".into() }, &state, &mut conv).await;
    assert!(matches!(reply, ServerWsMessage::Reply { .. }));
    assert!(!conv.saved);
    assert!(state.store.get_messages_by_chat_id(&chat_id).await.is_empty());

    let resaved = handle_client_ws(ClientWsMessage::Save { title: "2+2".into() }, &state, &mut conv).await;
    assert!(matches!(resaved, ServerWsMessage::Saved { .. }));
    assert_eq!(state.store.get_messages_by_chat_id(&chat_id).await, conv.transcript.messages().to_vec());
    assert_eq!(conv.transcript.len(), SEED_LEN + 3);

    handle_client_ws(ClientWsMessage::UserMessage { text: "got it, 4".into() }, &state, &mut conv).await;
    assert_eq!(state.store.get_messages_by_chat_id(&chat_id).await.len(), SEED_LEN + 5);
  }

  #[tokio::test]
  async fn messages_before_a_session_are_errors() {
    let state = AppState::with_model(AgentConfig::default(), None);
    let mut conv = conversation();
    assert!(matches!(
      handle_client_ws(ClientWsMessage::UserMessage { text: "hi".into() }, &state, &mut conv).await,
      ServerWsMessage::Error { .. }
    ));
    assert!(matches!(
      handle_client_ws(ClientWsMessage::Save { title: "t".into() }, &state, &mut conv).await,
      ServerWsMessage::Error { .. }
    ));
    assert!(matches!(handle_client_ws(ClientWsMessage::Ping, &state, &mut conv).await, ServerWsMessage::Pong));
  }
}
