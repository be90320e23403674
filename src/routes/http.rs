//! HTTP endpoint handlers. These are thin wrappers that forward to core logic.
//! Each handler is instrumented and logs ids and basic result info.

use std::sync::Arc;
use axum::{
  async_trait,
  extract::{FromRequestParts, Query, State},
  http::request::Parts,
  response::IntoResponse,
  Json,
};
use tracing::{info, instrument};

use crate::error::{Result, TutorError};
use crate::logic::*;
use crate::protocol::*;
use crate::state::AppState;
use crate::transcript::Transcript;

pub const USER_HEADER: &str = "x-user-id";

/// Caller identity, as asserted by the upstream identity provider.
#[derive(Debug, Clone)]
pub struct UserId(pub String);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for UserId {
  type Rejection = TutorError;

  async fn from_request_parts(parts: &mut Parts, _state: &S) -> std::result::Result<Self, Self::Rejection> {
    parts
      .headers
      .get(USER_HEADER)
      .and_then(|v| v.to_str().ok())
      .map(str::trim)
      .filter(|v| !v.is_empty())
      .map(|v| UserId(v.to_string()))
      .ok_or(TutorError::Unauthorized)
  }
}

fn require_id(q: IdQuery) -> Result<String> {
  q.id.filter(|s| !s.is_empty()).ok_or_else(|| TutorError::BadRequest("missing id".into()))
}

#[instrument(level = "info")]
pub async fn http_health() -> impl IntoResponse { Json(HealthOut { ok: true }) }

#[instrument(level = "info", skip(state))]
pub async fn http_get_models(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  Json(ModelsOut { models: state.config.models.clone(), default_model: state.config.default_model.clone() })
}

#[instrument(level = "info", skip(state), fields(user = %user.0))]
pub async fn http_list_assignments(State(state): State<Arc<AppState>>, user: UserId) -> impl IntoResponse {
  Json(state.store.get_assignments_by_user_id(&user.0).await)
}

#[instrument(level = "info", skip(state), fields(user = %user.0, id = ?q.id))]
pub async fn http_get_assignment(
  State(state): State<Arc<AppState>>,
  user: UserId,
  Query(q): Query<IdQuery>,
) -> Result<impl IntoResponse> {
  let id = require_id(q)?;
  Ok(Json(get_assignment(&state, &user.0, &id).await?))
}

#[instrument(level = "info", skip(state, body), fields(user = %user.0, id = ?q.id))]
pub async fn http_post_assignment(
  State(state): State<Arc<AppState>>,
  user: UserId,
  Query(q): Query<IdQuery>,
  Json(body): Json<AssignmentIn>,
) -> Result<impl IntoResponse> {
  let id = require_id(q)?;
  let a = save_assignment(&state, &user.0, &id, &body.title).await?;
  info!(target: "tutor_backend", %id, "HTTP assignment saved");
  Ok(Json(a))
}

#[instrument(level = "info", skip(state), fields(user = %user.0, id = ?q.id))]
pub async fn http_delete_assignment(
  State(state): State<Arc<AppState>>,
  user: UserId,
  Query(q): Query<IdQuery>,
) -> Result<impl IntoResponse> {
  let id = require_id(q)?;
  delete_assignment(&state, &user.0, &id).await?;
  Ok(Json(HealthOut { ok: true }))
}

#[instrument(level = "info", skip(state), fields(user = %user.0, id = ?q.id))]
pub async fn http_get_problem(
  State(state): State<Arc<AppState>>,
  user: UserId,
  Query(q): Query<IdQuery>,
) -> Result<impl IntoResponse> {
  let id = require_id(q)?;
  Ok(Json(get_problem(&state, &user.0, &id).await?))
}

#[instrument(level = "info", skip(state, body), fields(user = %user.0, id = ?q.id, assignment_id = %body.assignment_id))]
pub async fn http_post_problem(
  State(state): State<Arc<AppState>>,
  user: UserId,
  Query(q): Query<IdQuery>,
  Json(body): Json<ProblemIn>,
) -> Result<impl IntoResponse> {
  let id = require_id(q)?;
  let p = save_problem(&state, &user.0, &id, &body.assignment_id, body.content).await?;
  info!(target: "tutor_backend", %id, "HTTP problem saved");
  Ok(Json(p))
}

#[instrument(level = "info", skip(state), fields(user = %user.0, id = ?q.id))]
pub async fn http_delete_problem(
  State(state): State<Arc<AppState>>,
  user: UserId,
  Query(q): Query<IdQuery>,
) -> Result<impl IntoResponse> {
  let id = require_id(q)?;
  delete_problem(&state, &user.0, &id).await?;
  Ok(Json(HealthOut { ok: true }))
}

#[instrument(level = "info", skip(state, body), fields(user = %user.0, problem_id = %body.problem_id))]
pub async fn http_post_session(
  State(state): State<Arc<AppState>>,
  user: UserId,
  Json(body): Json<SessionIn>,
) -> Result<impl IntoResponse> {
  let out = start_session(
    &state,
    &user.0,
    &body.problem_id,
    body.variant.unwrap_or_default(),
    body.model_id.as_deref(),
  )
  .await?;
  info!(target: "tutor_backend", chat_id = %out.chat_id, state = %out.state, "HTTP session started");
  Ok(Json(out))
}

#[instrument(level = "info", skip(state, body), fields(user = %_user.0, messages = body.messages.len(), text_len = body.text.len()))]
pub async fn http_post_chat_reply(
  State(state): State<Arc<AppState>>,
  _user: UserId,
  Json(body): Json<ReplyIn>,
) -> Result<impl IntoResponse> {
  let mut transcript = Transcript::from(body.messages);
  let (user_message, reply) = continue_chat(&state, &mut transcript, &body.text, body.model_id.as_deref()).await?;
  Ok(Json(ReplyOut { user_message, reply }))
}

#[instrument(level = "info", skip(state, body), fields(user = %user.0, id = ?q.id, messages = body.messages.len()))]
pub async fn http_post_chat(
  State(state): State<Arc<AppState>>,
  user: UserId,
  Query(q): Query<IdQuery>,
  Json(body): Json<ChatIn>,
) -> Result<impl IntoResponse> {
  let id = require_id(q)?;
  Ok(Json(save_chat(&state, &user.0, &id, &body.title, body.messages).await?))
}

#[instrument(level = "info", skip(state), fields(user = %user.0, id = ?q.id))]
pub async fn http_get_chat(
  State(state): State<Arc<AppState>>,
  user: UserId,
  Query(q): Query<IdQuery>,
) -> Result<impl IntoResponse> {
  let id = require_id(q)?;
  Ok(Json(get_chat(&state, &user.0, &id).await?))
}

#[instrument(level = "info", skip(state), fields(user = %user.0, id = ?q.id))]
pub async fn http_delete_chat(
  State(state): State<Arc<AppState>>,
  user: UserId,
  Query(q): Query<IdQuery>,
) -> Result<impl IntoResponse> {
  let id = require_id(q)?;
  delete_chat(&state, &user.0, &id).await?;
  Ok(Json(HealthOut { ok: true }))
}

#[instrument(level = "info", skip(state), fields(user = %user.0))]
pub async fn http_list_chats(State(state): State<Arc<AppState>>, user: UserId) -> impl IntoResponse {
  Json(state.store.get_chats_by_user_id(&user.0).await)
}

#[instrument(level = "info", skip(state), fields(user = %user.0, chat_id = ?q.chat_id))]
pub async fn http_get_votes(
  State(state): State<Arc<AppState>>,
  user: UserId,
  Query(q): Query<VoteQuery>,
) -> Result<impl IntoResponse> {
  let chat_id = q.chat_id.filter(|s| !s.is_empty()).ok_or_else(|| TutorError::BadRequest("missing chatId".into()))?;
  Ok(Json(get_votes(&state, &user.0, &chat_id).await?))
}

#[instrument(level = "info", skip(state, body), fields(user = %user.0, chat_id = %body.chat_id, message_id = %body.message_id))]
pub async fn http_post_vote(
  State(state): State<Arc<AppState>>,
  user: UserId,
  Json(body): Json<VoteIn>,
) -> Result<impl IntoResponse> {
  Ok(Json(vote(&state, &user.0, &body.chat_id, &body.message_id, body.kind).await?))
}
