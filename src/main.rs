//! Homework Tutor Backend
//!
//! - Axum HTTP + WebSocket API over assignments, problems and saved chats
//! - Tutoring sessions: seeded transcript + bounded pre-solve tool loop
//! - Optional OpenAI-compatible model (via environment variables)
//! - Static SPA fallback (./static/index.html)
//!
//! Important env variables:
//!   PORT                : u16 (default 3000)
//!   OPENAI_API_KEY      : enables the model if present
//!   OPENAI_BASE_URL     : default "https://api.openai.com/v1"
//!   OPENAI_MODEL        : overrides the catalog's default model
//!   OPENAI_TIMEOUT_SECS : request timeout (default 60)
//!   TUTOR_CONFIG_PATH   : path to TOML config (prompts, pre-solve policy, model catalog)
//!   LOG_LEVEL           : tracing filter, e.g. "debug" or full directives
//!   LOG_FORMAT          : "pretty" (default) or "json"

mod calculator;
mod config;
mod domain;
mod error;
mod logic;
mod model;
mod openai;
mod presolve;
mod protocol;
mod routes;
mod samples;
mod seeder;
mod state;
mod store;
mod telemetry;
mod tools;
mod transcript;
mod util;

use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tracing::info;

use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
  telemetry::init_tracing();

  // Shared application state (in-memory store, model client, tutor config).
  let state = AppState::new();
  if state.config.sample_data {
    samples::insert_samples(&state.store).await?;
  }
  let assignments = state.store.get_all_assignments().await;
  info!(target: "tutor_backend", assignments = assignments.len(), model = state.model.is_some(), "Startup inventory");
  let state = Arc::new(state);

  let app = build_router(state.clone());

  // Read port from env or default to 3000.
  let addr: SocketAddr = std::env::var("PORT")
    .ok()
    .and_then(|p| p.parse::<u16>().ok())
    .map(|port| SocketAddr::from(([0, 0, 0, 0], port)))
    .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 3000)));

  let listener = TcpListener::bind(addr).await?;
  info!(target: "tutor_backend", %addr, "HTTP server listening");
  axum::serve(listener, app)
    .with_graceful_shutdown(async {
      let _ = tokio::signal::ctrl_c().await;
      info!(target: "tutor_backend", "Shutdown signal received");
    })
    .await?;
  Ok(())
}
