//! Built-in demo content so a fresh instance has something to tutor on.

use serde_json::json;
use tracing::info;

use crate::error::Result;
use crate::store::{NewProblem, Store};

pub const DEMO_USER: &str = "demo";
pub const DEMO_ASSIGNMENT_ID: &str = "demo-assignment";
pub const DEMO_PROBLEM_ID: &str = "demo-problem";

/// Insert the demo assignment (owned by `demo`) with a single arithmetic problem.
/// Idempotent: saving again only rewrites the same records.
pub async fn insert_samples(store: &Store) -> Result<()> {
  store.save_assignment(DEMO_ASSIGNMENT_ID, DEMO_USER, "Sample assignment").await;
  store
    .save_problems(vec![NewProblem {
      id: DEMO_PROBLEM_ID.to_string(),
      assignment_id: DEMO_ASSIGNMENT_ID.to_string(),
      content: json!({
        "problemDescription": "What is 2+2?",
        "answer": "4",
        "solutionWriteup": "Add the numbers."
      }),
    }])
    .await?;
  info!(target: "store", user = DEMO_USER, assignment = DEMO_ASSIGNMENT_ID, "Sample data inserted");
  Ok(())
}
