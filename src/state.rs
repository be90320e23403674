//! Application state: the store, tutor configuration, tool set, and the optional model client.

use std::sync::Arc;
use tracing::{info, instrument};

use crate::config::{load_agent_config_from_env, AgentConfig};
use crate::model::ChatModel;
use crate::openai::OpenAI;
use crate::store::Store;
use crate::tools::Toolbox;

#[derive(Clone)]
pub struct AppState {
  pub store: Store,
  pub config: AgentConfig,
  pub toolbox: Toolbox,
  /// `None` when no API key is configured; sessions then start without a pre-solve.
  pub model: Option<Arc<dyn ChatModel>>,
}

impl AppState {
  /// Build state from env: load config, init the OpenAI client.
  #[instrument(level = "info", skip_all)]
  pub fn new() -> Self {
    let mut config = load_agent_config_from_env().unwrap_or_default();

    let openai = OpenAI::from_env();
    let model: Option<Arc<dyn ChatModel>> = match openai {
      Some(oa) => {
        if std::env::var("OPENAI_MODEL").is_ok() {
          config.default_model = oa.model.clone();
        }
        info!(target: "tutor_backend", base_url = %oa.base_url, default_model = %config.default_model, "OpenAI enabled.");
        Some(Arc::new(oa))
      }
      None => {
        info!(target: "tutor_backend", "OpenAI disabled (no OPENAI_API_KEY). Sessions start without a pre-solve.");
        None
      }
    };

    Self::with_model(config, model)
  }

  pub fn with_model(config: AgentConfig, model: Option<Arc<dyn ChatModel>>) -> Self {
    let toolbox = Toolbox::from_policy(&config.presolve);
    info!(
      target: "tutor_backend",
      presolve = config.presolve.enabled,
      budget = config.presolve.step_budget,
      tool_choice = config.presolve.tool_choice.as_str(),
      tools = toolbox.declarations().len(),
      "Tutor configuration loaded"
    );
    Self { store: Store::new(), config, toolbox, model }
  }
}
