//! Library root for `relay-bot`.
//!
//! Relay-bot answers @-mentions in Slack with an LLM:
//! - Every mention is appended to a per-channel message log
//! - The most recent messages of the channel are rendered into the prompt
//! - The model's answer (or a fixed fallback) is posted back into the thread
//!
//! The bot integrates with Slack for chat, SurrealDB for storage,
//! and Gemini or OpenAI for responses. Each service sits behind a trait
//! so that implementations can be swapped or mocked.

pub mod base;
pub mod interaction;
pub mod runtime;
pub mod service;

use base::{config::Config, types::Void};
use rustls::crypto;
use tracing::{info, warn};

/// Public async entry for the binary crate.
///
/// Sets up necessary services and runs the relay-bot:
/// - Initializes the crypto provider
/// - Creates the runtime context with database, LLM, and chat clients
/// - Serves events until Ctrl-C, then shuts down
pub async fn start(config: Config) -> Void {
    info!("Starting relay-bot ...");

    // Start the crypto provider.
    if crypto::ring::default_provider().install_default().is_err() {
        warn!("A crypto provider was already installed.");
    }

    // Initialize the runtime.
    let runtime = runtime::Runtime::new(config).await?;

    // Run the runtime.
    runtime.run().await?;

    Ok(())
}
