//! Tools the model may call while pre-solving a problem.
//!
//! Every tool implements the same trait. The answer tool is flagged `terminal`:
//! the loop stops as soon as it is invoked.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::calculator;
use crate::config::PresolvePolicy;
use crate::error::{Result, TutorError};
use crate::model::ToolDeclaration;

pub const CALCULATOR: &str = "calculator";
pub const ANSWER: &str = "answer";

pub trait Tool: Send + Sync {
  fn name(&self) -> &str;

  fn description(&self) -> &str;

  /// JSON schema of the arguments object.
  fn parameters(&self) -> Value;

  /// Invoking a terminal tool ends the pre-solve loop.
  fn terminal(&self) -> bool {
    false
  }

  fn execute(&self, args: &Value) -> Result<String>;
}

/// Arithmetic, trigonometry and unit conversion via `calculator::evaluate`.
pub struct CalculatorTool;

impl Tool for CalculatorTool {
  fn name(&self) -> &str {
    CALCULATOR
  }

  fn description(&self) -> &str {
    "Evaluate a mathematical expression. Supports + - * / % ^, parentheses, \
     sin/cos/tan (radians, or append 'deg'), sqrt, log, exp, and unit \
     conversion such as '5 km to m' or '60 km/h in m/s'."
  }

  fn parameters(&self) -> Value {
    json!({
      "type": "object",
      "properties": {
        "expression": { "type": "string", "description": "Expression to evaluate, e.g. '1.2 * (2 + 4.5)'" }
      },
      "required": ["expression"],
      "additionalProperties": false
    })
  }

  fn execute(&self, args: &Value) -> Result<String> {
    let expr = args
      .get("expression")
      .and_then(Value::as_str)
      .ok_or_else(|| TutorError::ToolExecution("arguments must be an object with a string 'expression'".into()))?;
    calculator::evaluate(expr).map_err(|e| TutorError::ToolExecution(format!("could not evaluate '{expr}': {e}")))
  }
}

/// Final structured answer submitted through the `answer` tool.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FinalAnswer {
  pub answer: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub explanation: Option<String>,
}

impl FinalAnswer {
  /// Lenient: scalar answers are stringified, and a call without a usable `answer`
  /// field still counts, keeping the raw arguments.
  pub fn from_args(args: &Value) -> Self {
    let explanation = args.get("explanation").and_then(Value::as_str).map(str::to_string);
    let answer = match args.get("answer") {
      Some(Value::String(s)) => s.clone(),
      Some(v @ (Value::Number(_) | Value::Bool(_))) => v.to_string(),
      _ => return FinalAnswer { answer: args.to_string(), explanation: None },
    };
    FinalAnswer { answer, explanation }
  }
}

/// Terminal tool: carries the model's final answer, nothing to execute.
pub struct AnswerTool;

impl Tool for AnswerTool {
  fn name(&self) -> &str {
    ANSWER
  }

  fn description(&self) -> &str {
    "Submit your final answer to the problem. Call this exactly once, when you are done solving."
  }

  fn parameters(&self) -> Value {
    json!({
      "type": "object",
      "properties": {
        "answer": { "type": "string", "description": "The final answer, as short as possible" },
        "explanation": { "type": "string", "description": "A brief summary of how the answer was obtained" }
      },
      "required": ["answer"],
      "additionalProperties": false
    })
  }

  fn terminal(&self) -> bool {
    true
  }

  fn execute(&self, args: &Value) -> Result<String> {
    Ok(format!("Final answer recorded: {}", FinalAnswer::from_args(args).answer))
  }
}

/// Ordered set of tools offered to the model.
#[derive(Clone, Default)]
pub struct Toolbox {
  tools: Vec<Arc<dyn Tool>>,
}

impl Toolbox {
  pub fn new() -> Self {
    Self::default()
  }

  /// Tools enabled by the pre-solve policy: the calculator (optional) and the answer tool.
  pub fn from_policy(policy: &PresolvePolicy) -> Self {
    let mut tb = Self::new();
    if policy.calculator {
      tb.register(CalculatorTool);
    }
    tb.register(AnswerTool);
    tb
  }

  pub fn register<T: Tool + 'static>(&mut self, tool: T) {
    self.tools.retain(|t| t.name() != tool.name());
    self.tools.push(Arc::new(tool));
  }

  pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
    self.tools.iter().find(|t| t.name() == name).cloned()
  }

  pub fn is_empty(&self) -> bool {
    self.tools.is_empty()
  }

  pub fn declarations(&self) -> Vec<ToolDeclaration> {
    self
      .tools
      .iter()
      .map(|t| ToolDeclaration {
        name: t.name().to_string(),
        description: t.description().to_string(),
        parameters: t.parameters(),
      })
      .collect()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn calculator_tool_evaluates_and_reports_failures() {
    let calc = CalculatorTool;
    assert_eq!(calc.execute(&json!({ "expression": "1.2 * (2 + 4.5)" })).unwrap(), "7.8");
    assert!(matches!(calc.execute(&json!({ "expression": "bogus(" })), Err(TutorError::ToolExecution(_))));
    assert!(matches!(calc.execute(&json!({ "expr": "1" })), Err(TutorError::ToolExecution(_))));
    assert!(matches!(calc.execute(&json!("1 + 1")), Err(TutorError::ToolExecution(_))));
  }

  #[test]
  fn answer_tool_is_terminal_and_lenient() {
    let answer = AnswerTool;
    assert!(answer.terminal());
    assert!(!CalculatorTool.terminal());
    assert_eq!(
      FinalAnswer::from_args(&json!({ "answer": "4", "explanation": "2+2" })),
      FinalAnswer { answer: "4".into(), explanation: Some("2+2".into()) }
    );
    assert_eq!(FinalAnswer::from_args(&json!({ "value": 4 })).answer, r#"{"value":4}"#);
    assert_eq!(
      FinalAnswer::from_args(&json!({ "answer": 4, "explanation": "2+2" })),
      FinalAnswer { answer: "4".into(), explanation: Some("2+2".into()) }
    );
    assert_eq!(FinalAnswer::from_args(&json!({ "answer": 2.5 })).answer, "2.5");
    assert_eq!(answer.execute(&json!({ "answer": "4" })).unwrap(), "Final answer recorded: 4");
  }

  #[test]
  fn toolbox_follows_policy() {
    let mut policy = PresolvePolicy::default();
    let names: Vec<String> = Toolbox::from_policy(&policy).declarations().into_iter().map(|d| d.name).collect();
    assert_eq!(names, vec![CALCULATOR, ANSWER]);

    policy.calculator = false;
    let tb = Toolbox::from_policy(&policy);
    assert!(tb.get(CALCULATOR).is_none());
    assert!(tb.get(ANSWER).is_some());
    assert!(Toolbox::new().is_empty());
  }
}
