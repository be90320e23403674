//! Domain records kept by the store: assignments, problems, saved chats and votes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, TutorError};

/// A named collection of problems owned by one user.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Assignment {
  pub id: String,
  pub user_id: String,
  pub title: String,
  pub created_at: DateTime<Utc>,
}

/// A single homework question. `content` is stored as the client sent it and
/// only interpreted when a tutoring session is seeded.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Problem {
  pub id: String,
  pub assignment_id: String,
  pub content: serde_json::Value,
  pub created_at: DateTime<Utc>,
}

/// Parsed view of `Problem::content`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProblemContent {
  pub problem_description: String,
  #[serde(default, deserialize_with = "lenient_text")]
  pub answer: String,
  #[serde(default, deserialize_with = "lenient_text")]
  pub solution_writeup: String,
}

/// `null` reads as empty; numbers and booleans read as their JSON text.
fn lenient_text<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
  D: serde::Deserializer<'de>,
{
  Ok(match serde_json::Value::deserialize(deserializer)? {
    serde_json::Value::Null => String::new(),
    serde_json::Value::String(s) => s,
    other => other.to_string(),
  })
}

impl Problem {
  /// Interpret the stored JSON as description/answer/solution.
  pub fn parsed_content(&self) -> Result<ProblemContent> {
    if !self.content.is_object() {
      return Err(TutorError::InvalidProblem(format!("problem {} content is not an object", self.id)));
    }
    let content: ProblemContent = serde_json::from_value(self.content.clone())
      .map_err(|e| TutorError::InvalidProblem(format!("problem {}: {}", self.id, e)))?;
    if content.problem_description.trim().is_empty() {
      return Err(TutorError::InvalidProblem(format!("problem {} has an empty description", self.id)));
    }
    Ok(content)
  }
}

/// A transcript the user chose to keep.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chat {
  pub id: String,
  pub user_id: String,
  pub title: String,
  pub created_at: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoteKind {
  Up,
  Down,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Vote {
  pub chat_id: String,
  pub message_id: String,
  pub is_upvoted: bool,
}
