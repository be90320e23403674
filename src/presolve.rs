//! Bounded tool-calling loop that lets the model solve a problem before the student joins.
//!
//! Flow per step:
//!   AwaitingModel → (model round-trip) → ToolRequested → ToolExecuted → AwaitingModel ...
//! ending in `Answered` (answer tool called), `Concluded` (model replied in prose)
//! or `BudgetExhausted`. Each step appends exactly one assistant message, so tool
//! results land in the transcript in the order the model asked for them.

use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::config::PresolvePolicy;
use crate::error::{Result, TutorError};
use crate::model::{ChatModel, CompletionRequest, ToolChoice};
use crate::tools::{FinalAnswer, Toolbox};
use crate::transcript::{Message, MessagePart, Role, Transcript};
use crate::util::trunc_for_log;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PresolveState {
  AwaitingModel,
  ToolRequested,
  ToolExecuted,
  Answered,
  BudgetExhausted,
  Concluded,
}

impl PresolveState {
  pub fn is_terminal(&self) -> bool {
    matches!(self, PresolveState::Answered | PresolveState::BudgetExhausted | PresolveState::Concluded)
  }

  pub fn as_str(&self) -> &'static str {
    match self {
      PresolveState::AwaitingModel => "awaiting_model",
      PresolveState::ToolRequested => "tool_requested",
      PresolveState::ToolExecuted => "tool_executed",
      PresolveState::Answered => "answered",
      PresolveState::BudgetExhausted => "budget_exhausted",
      PresolveState::Concluded => "concluded",
    }
  }
}

/// Result of a finished loop; every terminal state is a valid hand-off to the student.
#[derive(Clone, Debug)]
pub struct PresolveRun {
  pub state: PresolveState,
  pub transcript: Transcript,
  pub answer: Option<FinalAnswer>,
  pub round_trips: u32,
}

pub struct Presolver<'a> {
  model: &'a dyn ChatModel,
  toolbox: &'a Toolbox,
  policy: &'a PresolvePolicy,
  model_id: &'a str,
}

impl<'a> Presolver<'a> {
  pub fn new(model: &'a dyn ChatModel, toolbox: &'a Toolbox, policy: &'a PresolvePolicy, model_id: &'a str) -> Self {
    Self { model, toolbox, policy, model_id }
  }

  /// Run the loop on a copy of `seed`. On `ModelUnavailable` the caller still owns the untouched seed.
  #[instrument(level = "info", skip(self, seed), fields(model = %self.model_id, budget = self.policy.step_budget, seed_len = seed.len()))]
  pub async fn run(&self, seed: &Transcript) -> Result<PresolveRun> {
    let mut transcript = seed.clone();
    let declarations = self.toolbox.declarations();
    let tool_choice = if self.toolbox.is_empty() { ToolChoice::None } else { self.policy.tool_choice };

    let mut state = PresolveState::AwaitingModel;
    let mut answer = None;
    let mut round_trips = 0u32;

    while round_trips < self.policy.step_budget {
      transition(&mut state, PresolveState::AwaitingModel, round_trips);
      round_trips += 1;
      let turn = self
        .model
        .complete(CompletionRequest {
          model: self.model_id,
          messages: transcript.messages(),
          tools: &declarations,
          tool_choice,
          temperature: self.policy.temperature,
        })
        .await?;

      let text = turn.text.filter(|t| !t.trim().is_empty());

      if turn.tool_calls.is_empty() {
        let Some(text) = text else {
          return Err(TutorError::ModelUnavailable("model returned neither text nor a tool call".into()));
        };
        debug!(target: "presolve", step = round_trips, text = %trunc_for_log(&text, 120), "Model replied without tools");
        transcript.push(Message::text(Role::Assistant, text));
        transition(&mut state, PresolveState::Concluded, round_trips);
        break;
      }

      transition(&mut state, PresolveState::ToolRequested, round_trips);
      let mut parts = Vec::with_capacity(turn.tool_calls.len() * 2 + 1);
      if let Some(text) = text {
        parts.push(MessagePart::Text { text });
      }

      for call in turn.tool_calls {
        parts.push(MessagePart::ToolInvocation {
          tool_call_id: call.id.clone(),
          tool_name: call.name.clone(),
          args: call.arguments.clone(),
        });

        let Some(tool) = self.toolbox.get(&call.name) else {
          warn!(target: "presolve", step = round_trips, tool = %call.name, "Model called an unknown tool");
          parts.push(MessagePart::ToolResult {
            tool_call_id: call.id,
            tool_name: call.name.clone(),
            result: format!("Unknown tool '{}'", call.name),
            is_error: true,
          });
          continue;
        };

        let (result, is_error) = match tool.execute(&call.arguments) {
          Ok(out) => (out, false),
          Err(e) => {
            warn!(target: "presolve", step = round_trips, tool = %call.name, error = %e, "Tool failed; reporting back to the model");
            (e.to_string(), true)
          }
        };
        debug!(target: "presolve", step = round_trips, tool = %call.name, %is_error, result = %trunc_for_log(&result, 120), "Tool executed");
        parts.push(MessagePart::ToolResult { tool_call_id: call.id, tool_name: call.name, result, is_error });

        if tool.terminal() {
          answer = Some(FinalAnswer::from_args(&call.arguments));
          break;
        }
      }

      transcript.push(Message::assistant_parts(parts));
      transition(&mut state, PresolveState::ToolExecuted, round_trips);

      if answer.is_some() {
        transition(&mut state, PresolveState::Answered, round_trips);
        break;
      }
    }

    if !state.is_terminal() {
      transition(&mut state, PresolveState::BudgetExhausted, round_trips);
    }
    info!(target: "presolve", ?state, round_trips, transcript_len = transcript.len(), answered = answer.is_some(), "Pre-solve finished");
    Ok(PresolveRun { state, transcript, answer, round_trips })
  }
}

fn transition(state: &mut PresolveState, next: PresolveState, step: u32) {
  tracing::trace!(target: "presolve", step, from = ?*state, to = ?next, "state");
  *state = next;
}
