//! Loading tutor configuration (prompts, pre-solve policy, model catalog) from TOML.
//!
//! Every section is optional; missing values fall back to the defaults below.

use serde::Deserialize;
use tracing::{error, info};

use crate::model::ToolChoice;

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
  pub prompts: Prompts,
  pub presolve: PresolvePolicy,
  pub models: Vec<ModelEntry>,
  pub default_model: String,
  /// Insert the demo assignment at startup.
  pub sample_data: bool,
}

impl Default for AgentConfig {
  fn default() -> Self {
    Self {
      prompts: Prompts::default(),
      presolve: PresolvePolicy::default(),
      models: default_models(),
      default_model: "gpt-4o-mini".into(),
      sample_data: true,
    }
  }
}

impl AgentConfig {
  /// Resolve a requested model id against the catalog; unknown ids fall back to the default.
  pub fn resolve_model(&self, requested: Option<&str>) -> String {
    let pick = requested
      .and_then(|id| self.models.iter().find(|m| m.id == id))
      .or_else(|| self.models.iter().find(|m| m.id == self.default_model));
    match pick {
      Some(m) => m.api_identifier.clone(),
      None => self.default_model.clone(),
    }
  }
}

/// One selectable model.
#[derive(Clone, Debug, Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelEntry {
  pub id: String,
  pub label: String,
  #[serde(alias = "api_identifier")]
  pub api_identifier: String,
  #[serde(default)]
  pub description: String,
}

fn default_models() -> Vec<ModelEntry> {
  vec![
    ModelEntry {
      id: "gpt-4o-mini".into(),
      label: "GPT-4o mini".into(),
      api_identifier: "gpt-4o-mini".into(),
      description: "Fast default tutor model".into(),
    },
    ModelEntry {
      id: "gpt-4o".into(),
      label: "GPT-4o".into(),
      api_identifier: "gpt-4o".into(),
      description: "Stronger model for harder problems".into(),
    },
  ]
}

/// How the model pre-solves a problem before the student arrives.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct PresolvePolicy {
  pub enabled: bool,
  /// Maximum number of model round-trips.
  pub step_budget: u32,
  /// Offer the calculator alongside the answer tool.
  pub calculator: bool,
  pub tool_choice: ToolChoice,
  pub temperature: f32,
  /// Overrides the session model for the pre-solve loop only.
  pub model: Option<String>,
}

impl Default for PresolvePolicy {
  fn default() -> Self {
    Self {
      enabled: true,
      step_budget: 10,
      calculator: true,
      tool_choice: ToolChoice::Required,
      temperature: 0.0,
      model: None,
    }
  }
}

/// Prompt texts used to seed a tutoring session. Override them in TOML to tune tone.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Prompts {
  pub answer_guidance_feedback_policy: String,
  pub answer_guidance_feedback_directive: String,
  pub guided_only_policy: String,
  pub guided_only_directive: String,
  pub bare_policy: String,
  pub bare_directive: String,
  /// Template with `{answer}`, `{solution}`, `{description}`.
  pub reference_note_template: String,
  pub reveal_reference: bool,
  pub reply_temperature: f32,
}

const HELP_MODES: &str = "The answer: if the student chooses this, provide a structured, step-by-step
explanation to solve the problem. Solve the problem symbolically and
exclusively use variables whenever possible until you have an expression that,
if you plug in the numbers assigned to the variables, will return the correct
answer. At that point, tell the user to plug in the values.

Guidance: if the student chooses this, guide the user to perform the same
steps as you would if you were solving it, and point out any mistakes they
make. At no point should you give them the answer.

Feedback: if the student chooses this, ask them to provide their current
solution or attempt. If their answer is correct, affirm it regardless of
whether work exists or not. Otherwise, find their error and let them know
where and how they made a mistake.";

const ACCEPT_CORRECT: &str = "Always be on the lookout for correct answers (even if underspecified) and accept
them at any time, even if you asked some intermediate question to guide them. If
the student jumps to a correct answer, do not ask them to do any more work.";

impl Default for Prompts {
  fn default() -> Self {
    Self {
      answer_guidance_feedback_policy: format!(
        "You are an expert tutor assisting a student with their homework. I will provide the
problem that the student is working on, and when they arrive, ask them if they would
like one of the three following methods of help:

{HELP_MODES}

{ACCEPT_CORRECT}

The student is not here yet. Here is the question that the user is working on:"
      ),
      answer_guidance_feedback_directive: "Please solve the problem yourself now. After that, greet the user and
ask them if they want the answer, guidance, or feedback."
        .into(),
      guided_only_policy: format!(
        "You are an expert tutor assisting a student with their homework. Guide the student
to perform the same steps as you would if you were solving it, and point out any
mistakes they make. At no point should you give them the answer.

{ACCEPT_CORRECT}

The student is not here yet. Here is the question that the user is working on:"
      ),
      guided_only_directive: "Please solve the problem yourself now. After that, greet the user and
offer to guide them through the problem one step at a time."
        .into(),
      bare_policy: "You are a helpful tutor. The student is not here yet. Here is the question that the user is working on:".into(),
      bare_directive: "Please solve the problem yourself now. After that, greet the user.".into(),
      reference_note_template: "The correct answer is ${answer}$. The solution writeup is as follows:

{solution}

---

As a reminder, the problem is \"{description}\" and the answer is ${answer}$.
If there's anything you need to think through more, do so now."
        .into(),
      reveal_reference: false,
      reply_temperature: 0.2,
    }
  }
}

/// Attempt to load `AgentConfig` from TUTOR_CONFIG_PATH. On any parsing/IO error, returns None.
pub fn load_agent_config_from_env() -> Option<AgentConfig> {
  let path = std::env::var("TUTOR_CONFIG_PATH").ok()?;
  match std::fs::read_to_string(&path) {
    Ok(s) => match toml::from_str::<AgentConfig>(&s) {
      Ok(cfg) => {
        info!(target: "tutor_backend", %path, "Loaded tutor config (TOML)");
        Some(cfg)
      }
      Err(e) => {
        error!(target: "tutor_backend", %path, error = %e, "Failed to parse TOML config");
        None
      }
    },
    Err(e) => {
      error!(target: "tutor_backend", %path, error = %e, "Failed to read TOML config file");
      None
    }
  }
}
