//! Opening transcript for a tutoring session.
//!
//! The seed is always exactly three messages:
//!   0. priming instructions (role `data`) describing the tutoring policy
//!   1. the verbatim problem statement (role `user`)
//!   2. a directive asking the model to solve the problem before greeting the student (role `data`)
//!
//! Later prompting relies on these positions, so the order never changes.

use serde::{Deserialize, Serialize};

use crate::config::Prompts;
use crate::domain::Problem;
use crate::error::Result;
use crate::transcript::{Message, Role, Transcript};
use crate::util::fill_template;

/// Messages in every opening transcript.
#[cfg(test)]
pub const SEED_LEN: usize = 3;

/// Which help modes the tutor offers.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptVariant {
  /// Offer the answer, step-by-step guidance, or feedback on an attempt.
  #[default]
  AnswerGuidanceFeedback,
  /// Only guide; never reveal the answer.
  GuidedOnly,
  /// Minimal priming.
  Bare,
}

impl PromptVariant {
  fn texts<'a>(&self, prompts: &'a Prompts) -> (&'a str, &'a str) {
    match self {
      PromptVariant::AnswerGuidanceFeedback => (
        prompts.answer_guidance_feedback_policy.as_str(),
        prompts.answer_guidance_feedback_directive.as_str(),
      ),
      PromptVariant::GuidedOnly => (prompts.guided_only_policy.as_str(), prompts.guided_only_directive.as_str()),
      PromptVariant::Bare => (prompts.bare_policy.as_str(), prompts.bare_directive.as_str()),
    }
  }
}

/// Build the seed transcript. Fails with `InvalidProblem` if the content has no usable description.
pub fn seed(problem: &Problem, variant: PromptVariant, prompts: &Prompts) -> Result<Transcript> {
  let content = problem.parsed_content()?;
  let (policy, directive) = variant.texts(prompts);

  let mut t = Transcript::new();
  t.push(Message::text(Role::Data, policy));
  t.push(Message::text(Role::User, content.problem_description));
  t.push(Message::text(Role::Data, directive));
  Ok(t)
}

/// Reference answer and writeup for the model, appended after the pre-solve when enabled.
/// `None` when the problem has no answer on file.
pub fn reference_note(problem: &Problem, prompts: &Prompts) -> Result<Option<Message>> {
  let content = problem.parsed_content()?;
  if content.answer.trim().is_empty() {
    return Ok(None);
  }
  let text = fill_template(
    &prompts.reference_note_template,
    &[
      ("answer", content.answer.as_str()),
      ("solution", content.solution_writeup.as_str()),
      ("description", content.problem_description.as_str()),
    ],
  );
  Ok(Some(Message::text(Role::Data, text)))
}
