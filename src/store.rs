//! In-memory persistence for assignments, problems, saved chats and votes.
//!
//! Records live in `RwLock`ed maps keyed by id, with secondary indices that keep
//! insertion order (`problems_by_assignment`, `chats_by_user`, ...).
//! Locks are always taken in declaration order: assignments, problems, chats,
//! messages, votes.

use std::{collections::HashMap, sync::Arc};

use chrono::Utc;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument};

use crate::domain::{Assignment, Chat, Problem, Vote, VoteKind};
use crate::error::{Result, TutorError};
use crate::transcript::Message;

/// A problem to insert with [`Store::save_problems`].
#[derive(Debug, Clone)]
pub struct NewProblem {
  pub id: String,
  pub assignment_id: String,
  pub content: serde_json::Value,
}

#[derive(Clone, Default)]
pub struct Store {
  assignments: Arc<RwLock<HashMap<String, Assignment>>>,
  problems: Arc<RwLock<HashMap<String, Problem>>>,
  problems_by_assignment: Arc<RwLock<HashMap<String, Vec<String>>>>,
  chats: Arc<RwLock<HashMap<String, Chat>>>,
  messages_by_chat: Arc<RwLock<HashMap<String, Vec<Message>>>>,
  votes_by_chat: Arc<RwLock<HashMap<String, Vec<Vote>>>>,
}

impl Store {
  pub fn new() -> Self {
    Self::default()
  }

  // --- assignments ---

  #[instrument(level = "debug", skip(self), fields(%id))]
  pub async fn get_assignment_by_id(&self, id: &str) -> Option<Assignment> {
    self.assignments.read().await.get(id).cloned()
  }

  /// Upsert. An existing assignment only has its title updated.
  #[instrument(level = "debug", skip(self, title), fields(%id, %user_id))]
  pub async fn save_assignment(&self, id: &str, user_id: &str, title: &str) -> Assignment {
    let mut assignments = self.assignments.write().await;
    let a = assignments.entry(id.to_string()).or_insert_with(|| Assignment {
      id: id.to_string(),
      user_id: user_id.to_string(),
      title: String::new(),
      created_at: Utc::now(),
    });
    a.title = title.to_string();
    info!(target: "store", %id, "Assignment saved");
    a.clone()
  }

  /// Newest first.
  #[instrument(level = "debug", skip(self), fields(%user_id))]
  pub async fn get_assignments_by_user_id(&self, user_id: &str) -> Vec<Assignment> {
    let mut out: Vec<Assignment> = self
      .assignments
      .read()
      .await
      .values()
      .filter(|a| a.user_id == user_id)
      .cloned()
      .collect();
    out.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
    out
  }

  /// Every user's assignments, newest first.
  #[instrument(level = "debug", skip(self))]
  pub async fn get_all_assignments(&self) -> Vec<Assignment> {
    let mut out: Vec<Assignment> = self.assignments.read().await.values().cloned().collect();
    out.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
    out
  }

  /// Removes the assignment and every problem in it. Returns false if it did not exist.
  #[instrument(level = "debug", skip(self), fields(%id))]
  pub async fn delete_assignment_by_id(&self, id: &str) -> bool {
    let mut assignments = self.assignments.write().await;
    let mut problems = self.problems.write().await;
    let mut by_assignment = self.problems_by_assignment.write().await;

    let existed = assignments.remove(id).is_some();
    let removed = by_assignment.remove(id).unwrap_or_default();
    for pid in &removed {
      problems.remove(pid);
    }
    info!(target: "store", %id, existed, problems_removed = removed.len(), "Assignment deleted");
    existed
  }

  // --- problems ---

  #[instrument(level = "debug", skip(self), fields(%id))]
  pub async fn get_problem_by_id(&self, id: &str) -> Option<Problem> {
    self.problems.read().await.get(id).cloned()
  }

  /// Upsert by id. The assignment must exist; a problem never moves between assignments.
  #[instrument(level = "debug", skip(self, content), fields(%id, %assignment_id))]
  pub async fn save_problem(&self, id: &str, assignment_id: &str, content: serde_json::Value) -> Result<Problem> {
    let draft = NewProblem { id: id.to_string(), assignment_id: assignment_id.to_string(), content };
    let mut saved = self.save_problems(vec![draft]).await?;
    saved.pop().ok_or_else(|| TutorError::NotFound(format!("problem {id}")))
  }

  /// Bulk upsert. Every draft is checked before any is written, so a bad draft
  /// leaves the store untouched.
  #[instrument(level = "debug", skip(self, drafts), fields(count = drafts.len()))]
  pub async fn save_problems(&self, drafts: Vec<NewProblem>) -> Result<Vec<Problem>> {
    let assignments = self.assignments.read().await;
    let mut problems = self.problems.write().await;
    let mut by_assignment = self.problems_by_assignment.write().await;

    for d in &drafts {
      if !assignments.contains_key(&d.assignment_id) {
        return Err(TutorError::NotFound(format!("assignment {}", d.assignment_id)));
      }
      let owner = problems
        .get(&d.id)
        .map(|p| p.assignment_id.as_str())
        .or_else(|| drafts.iter().find(|other| other.id == d.id).map(|other| other.assignment_id.as_str()));
      if owner.is_some_and(|owner| owner != d.assignment_id) {
        return Err(TutorError::BadRequest(format!("problem {} belongs to another assignment", d.id)));
      }
    }

    let mut out = Vec::with_capacity(drafts.len());
    for NewProblem { id, assignment_id, content } in drafts {
      let saved = match problems.get_mut(&id) {
        Some(p) => {
          p.content = content;
          p.clone()
        }
        None => {
          let p = Problem { id: id.clone(), assignment_id: assignment_id.clone(), content, created_at: Utc::now() };
          problems.insert(id.clone(), p.clone());
          by_assignment.entry(assignment_id).or_default().push(id.clone());
          p
        }
      };
      debug!(target: "store", %id, "Problem saved");
      out.push(saved);
    }
    Ok(out)
  }

  /// Insertion order.
  #[instrument(level = "debug", skip(self), fields(%assignment_id))]
  pub async fn get_problems_by_assignment_id(&self, assignment_id: &str) -> Vec<Problem> {
    let problems = self.problems.read().await;
    let by_assignment = self.problems_by_assignment.read().await;
    by_assignment
      .get(assignment_id)
      .map(|ids| ids.iter().filter_map(|id| problems.get(id).cloned()).collect())
      .unwrap_or_default()
  }

  #[instrument(level = "debug", skip(self), fields(%id))]
  pub async fn delete_problem_by_id(&self, id: &str) -> bool {
    let mut problems = self.problems.write().await;
    let mut by_assignment = self.problems_by_assignment.write().await;
    match problems.remove(id) {
      Some(p) => {
        if let Some(ids) = by_assignment.get_mut(&p.assignment_id) {
          ids.retain(|x| x != id);
        }
        true
      }
      None => false,
    }
  }

  // --- chats ---

  /// Upsert the chat row and replace its stored messages.
  #[instrument(level = "debug", skip(self, title, messages), fields(%id, %user_id, messages = messages.len()))]
  pub async fn save_chat(&self, id: &str, user_id: &str, title: &str, messages: Vec<Message>) -> Chat {
    let mut chats = self.chats.write().await;
    let mut by_chat = self.messages_by_chat.write().await;
    let chat = chats.entry(id.to_string()).or_insert_with(|| Chat {
      id: id.to_string(),
      user_id: user_id.to_string(),
      title: String::new(),
      created_at: Utc::now(),
    });
    chat.title = title.to_string();
    by_chat.insert(id.to_string(), messages);
    info!(target: "store", %id, "Chat saved");
    chat.clone()
  }

  #[instrument(level = "debug", skip(self), fields(%id))]
  pub async fn get_chat_by_id(&self, id: &str) -> Option<Chat> {
    self.chats.read().await.get(id).cloned()
  }

  /// Newest first.
  #[instrument(level = "debug", skip(self), fields(%user_id))]
  pub async fn get_chats_by_user_id(&self, user_id: &str) -> Vec<Chat> {
    let mut out: Vec<Chat> = self.chats.read().await.values().filter(|c| c.user_id == user_id).cloned().collect();
    out.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
    out
  }

  /// Removes the chat with its messages and votes.
  #[instrument(level = "debug", skip(self), fields(%id))]
  pub async fn delete_chat_by_id(&self, id: &str) -> bool {
    let mut chats = self.chats.write().await;
    let mut by_chat = self.messages_by_chat.write().await;
    let mut votes = self.votes_by_chat.write().await;
    by_chat.remove(id);
    votes.remove(id);
    chats.remove(id).is_some()
  }

  /// Append messages to a chat's stored transcript.
  #[instrument(level = "debug", skip(self, messages), fields(%chat_id, count = messages.len()))]
  pub async fn save_messages(&self, chat_id: &str, messages: Vec<Message>) -> Result<()> {
    let chats = self.chats.read().await;
    if !chats.contains_key(chat_id) {
      return Err(TutorError::NotFound(format!("chat {chat_id}")));
    }
    self.messages_by_chat.write().await.entry(chat_id.to_string()).or_default().extend(messages);
    Ok(())
  }

  #[instrument(level = "debug", skip(self), fields(%chat_id))]
  pub async fn get_messages_by_chat_id(&self, chat_id: &str) -> Vec<Message> {
    self.messages_by_chat.read().await.get(chat_id).cloned().unwrap_or_default()
  }

  // --- votes ---

  /// One vote per message; voting again overwrites.
  #[instrument(level = "debug", skip(self), fields(%chat_id, %message_id, ?kind))]
  pub async fn vote_message(&self, chat_id: &str, message_id: &str, kind: VoteKind) -> Result<Vote> {
    let chats = self.chats.read().await;
    if !chats.contains_key(chat_id) {
      return Err(TutorError::NotFound(format!("chat {chat_id}")));
    }
    let mut votes = self.votes_by_chat.write().await;
    let list = votes.entry(chat_id.to_string()).or_default();
    let vote = Vote { chat_id: chat_id.to_string(), message_id: message_id.to_string(), is_upvoted: kind == VoteKind::Up };
    match list.iter_mut().find(|v| v.message_id == message_id) {
      Some(existing) => *existing = vote.clone(),
      None => list.push(vote.clone()),
    }
    Ok(vote)
  }

  #[instrument(level = "debug", skip(self), fields(%chat_id))]
  pub async fn get_votes_by_chat_id(&self, chat_id: &str) -> Vec<Vote> {
    self.votes_by_chat.read().await.get(chat_id).cloned().unwrap_or_default()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::transcript::Role;
  use serde_json::json;

  #[tokio::test]
  async fn saving_an_existing_assignment_only_updates_the_title() {
    let store = Store::new();
    let first = store.save_assignment("a1", "alice", "Week 1").await;
    let second = store.save_assignment("a1", "mallory", "Week 1 (revised)").await;
    assert_eq!(second.user_id, "alice");
    assert_eq!(second.title, "Week 1 (revised)");
    assert_eq!(second.created_at, first.created_at);
  }

  #[tokio::test]
  async fn assignments_are_listed_per_user() {
    let store = Store::new();
    store.save_assignment("a1", "alice", "one").await;
    store.save_assignment("a2", "bob", "two").await;
    store.save_assignment("a3", "alice", "three").await;
    let ids: Vec<String> = store.get_assignments_by_user_id("alice").await.into_iter().map(|a| a.id).collect();
    assert_eq!(ids.len(), 2);
    assert!(ids.contains(&"a1".to_string()) && ids.contains(&"a3".to_string()));
    assert!(store.get_assignments_by_user_id("nobody").await.is_empty());
  }

  #[tokio::test]
  async fn problems_upsert_and_keep_insertion_order() {
    let store = Store::new();
    store.save_assignment("a1", "alice", "hw").await;
    store.save_problem("p2", "a1", json!({ "problemDescription": "second" })).await.unwrap();
    store.save_problem("p1", "a1", json!({ "problemDescription": "first" })).await.unwrap();
    store.save_problem("p2", "a1", json!({ "problemDescription": "second, edited" })).await.unwrap();

    let problems = store.get_problems_by_assignment_id("a1").await;
    let ids: Vec<&str> = problems.iter().map(|p| p.id.as_str()).collect();
    assert_eq!(ids, vec!["p2", "p1"]);
    assert_eq!(problems[0].content["problemDescription"], "second, edited");

    assert!(matches!(store.save_problem("p9", "missing", json!({})).await, Err(TutorError::NotFound(_))));
    store.save_assignment("a2", "alice", "other").await;
    assert!(matches!(store.save_problem("p1", "a2", json!({})).await, Err(TutorError::BadRequest(_))));
  }

  fn draft(id: &str, assignment_id: &str, description: &str) -> NewProblem {
    NewProblem { id: id.into(), assignment_id: assignment_id.into(), content: json!({ "problemDescription": description }) }
  }

  #[tokio::test]
  async fn bulk_problem_save_keeps_batch_order() {
    let store = Store::new();
    store.save_assignment("a1", "alice", "hw").await;
    let saved = store
      .save_problems(vec![draft("p1", "a1", "one"), draft("p2", "a1", "two"), draft("p3", "a1", "three")])
      .await
      .unwrap();
    assert_eq!(saved.len(), 3);

    let ids: Vec<String> = store.get_problems_by_assignment_id("a1").await.into_iter().map(|p| p.id).collect();
    assert_eq!(ids, vec!["p1", "p2", "p3"]);
  }

  #[tokio::test]
  async fn a_bad_draft_rejects_the_whole_batch() {
    let store = Store::new();
    store.save_assignment("a1", "alice", "hw").await;
    store.save_assignment("a2", "alice", "other").await;
    store.save_problem("p1", "a1", json!({ "problemDescription": "kept" })).await.unwrap();

    let missing = store.save_problems(vec![draft("p2", "a1", "two"), draft("p3", "missing", "three")]).await;
    assert!(matches!(missing, Err(TutorError::NotFound(_))));
    let moved = store.save_problems(vec![draft("p2", "a1", "two"), draft("p1", "a2", "moved")]).await;
    assert!(matches!(moved, Err(TutorError::BadRequest(_))));
    let split = store.save_problems(vec![draft("p4", "a1", "x"), draft("p4", "a2", "y")]).await;
    assert!(matches!(split, Err(TutorError::BadRequest(_))));

    let problems = store.get_problems_by_assignment_id("a1").await;
    assert_eq!(problems.len(), 1);
    assert_eq!(problems[0].content["problemDescription"], "kept");
    assert!(store.get_problems_by_assignment_id("a2").await.is_empty());
  }

  #[tokio::test]
  async fn all_assignments_span_users_newest_first() {
    let store = Store::new();
    store.save_assignment("a1", "alice", "one").await;
    std::thread::sleep(std::time::Duration::from_millis(5));
    store.save_assignment("a2", "bob", "two").await;
    std::thread::sleep(std::time::Duration::from_millis(5));
    store.save_assignment("a3", "carol", "three").await;

    let ids: Vec<String> = store.get_all_assignments().await.into_iter().map(|a| a.id).collect();
    assert_eq!(ids, vec!["a3", "a2", "a1"]);
    assert!(Store::new().get_all_assignments().await.is_empty());
  }

  #[tokio::test]
  async fn deleting_an_assignment_cascades_to_problems() {
    let store = Store::new();
    store.save_assignment("a1", "alice", "hw").await;
    store.save_problem("p1", "a1", json!({ "problemDescription": "x" })).await.unwrap();
    assert!(store.delete_assignment_by_id("a1").await);
    assert!(store.get_problem_by_id("p1").await.is_none());
    assert!(store.get_problems_by_assignment_id("a1").await.is_empty());
    assert!(!store.delete_assignment_by_id("a1").await);
  }

  #[tokio::test]
  async fn deleting_a_problem_updates_the_index() {
    let store = Store::new();
    store.save_assignment("a1", "alice", "hw").await;
    store.save_problem("p1", "a1", json!({ "problemDescription": "x" })).await.unwrap();
    store.save_problem("p2", "a1", json!({ "problemDescription": "y" })).await.unwrap();
    assert!(store.delete_problem_by_id("p1").await);
    assert!(!store.delete_problem_by_id("p1").await);
    let ids: Vec<String> = store.get_problems_by_assignment_id("a1").await.into_iter().map(|p| p.id).collect();
    assert_eq!(ids, vec!["p2".to_string()]);
  }

  #[tokio::test]
  async fn chats_messages_and_votes() {
    let store = Store::new();
    let hello = Message::text(Role::User, "hello");
    let hello_id = hello.id.clone();
    store.save_chat("c1", "alice", "first chat", vec![hello]).await;
    store.save_messages("c1", vec![Message::text(Role::Assistant, "hi")]).await.unwrap();
    assert_eq!(store.get_messages_by_chat_id("c1").await.len(), 2);
    assert!(matches!(store.save_messages("nope", vec![]).await, Err(TutorError::NotFound(_))));

    store.vote_message("c1", &hello_id, VoteKind::Up).await.unwrap();
    store.vote_message("c1", &hello_id, VoteKind::Down).await.unwrap();
    let votes = store.get_votes_by_chat_id("c1").await;
    assert_eq!(votes.len(), 1);
    assert!(!votes[0].is_upvoted);

    assert_eq!(store.get_chats_by_user_id("alice").await.len(), 1);
    assert!(store.delete_chat_by_id("c1").await);
    assert!(store.get_messages_by_chat_id("c1").await.is_empty());
    assert!(store.get_votes_by_chat_id("c1").await.is_empty());
    assert!(store.get_chat_by_id("c1").await.is_none());
  }
}
