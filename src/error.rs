//! Error taxonomy shared by the seeder, the pre-solve loop, the store and the HTTP layer.

use axum::{
  http::StatusCode,
  response::{IntoResponse, Response},
  Json,
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TutorError {
  /// Problem content is missing or malformed; a session must not start.
  #[error("invalid problem: {0}")]
  InvalidProblem(String),

  /// Completion endpoint unreachable or returned something we could not use.
  #[error("model unavailable: {0}")]
  ModelUnavailable(String),

  /// A tool could not run with the arguments it was given.
  /// Inside the pre-solve loop this is reported back to the model, never raised.
  #[error("tool execution failed: {0}")]
  ToolExecution(String),

  #[error("not found: {0}")]
  NotFound(String),

  #[error("unauthorized")]
  Unauthorized,

  #[error("bad request: {0}")]
  BadRequest(String),
}

impl TutorError {
  pub fn status(&self) -> StatusCode {
    match self {
      TutorError::InvalidProblem(_) | TutorError::ToolExecution(_) => StatusCode::UNPROCESSABLE_ENTITY,
      TutorError::ModelUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
      TutorError::NotFound(_) => StatusCode::NOT_FOUND,
      TutorError::Unauthorized => StatusCode::UNAUTHORIZED,
      TutorError::BadRequest(_) => StatusCode::BAD_REQUEST,
    }
  }
}

impl From<reqwest::Error> for TutorError {
  fn from(e: reqwest::Error) -> Self {
    TutorError::ModelUnavailable(e.to_string())
  }
}

impl IntoResponse for TutorError {
  fn into_response(self) -> Response {
    let status = self.status();
    (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
  }
}

pub type Result<T> = std::result::Result<T, TutorError>;

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn statuses_follow_the_taxonomy() {
    assert_eq!(TutorError::InvalidProblem("x".into()).status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(TutorError::ModelUnavailable("x".into()).status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(TutorError::NotFound("x".into()).status(), StatusCode::NOT_FOUND);
    assert_eq!(TutorError::Unauthorized.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(TutorError::BadRequest("x".into()).status(), StatusCode::BAD_REQUEST);
  }
}
