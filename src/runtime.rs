//! Runtime services and shared state for the relay-bot.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{info, instrument};

use crate::{
    base::{
        config::Config,
        types::{Res, Void},
    },
    interaction::relay::RelayController,
    service::{chat::ChatClient, db::DbClient, health::HealthServer, llm::LlmClient},
};

/// Runtime service context that can be shared across the application.
///
/// This struct holds the database client, LLM client, chat client, and configuration.
/// It is designed to be trivially cloneable, allowing it to be passed around
/// without the need for `Arc` or `Mutex`.
#[derive(Clone)]
pub struct Runtime {
    /// The configuration for the application.
    pub config: Config,
    /// The database client instance.
    pub db: DbClient,
    /// The LLM client instance.
    pub llm: LlmClient,
    /// The chat client instance.
    pub chat: ChatClient,
    /// The health probe, while running.
    health: Arc<Mutex<Option<HealthServer>>>,
}

impl Runtime {
    /// Create a new runtime instance.
    #[instrument(skip_all)]
    pub async fn new(config: Config) -> Res<Self> {
        // Initialize the database.
        let db = DbClient::surreal(&config).await?;

        // Initialize the LLM client.
        let llm = LlmClient::from_config(&config)?;

        // Initialize the chat client.
        let chat = ChatClient::slack(&config).await?;

        Ok(Self::from_parts(config, db, llm, chat))
    }

    /// Assemble a runtime from already constructed services.
    pub fn from_parts(config: Config, db: DbClient, llm: LlmClient, chat: ChatClient) -> Self {
        Self {
            config,
            db,
            llm,
            chat,
            health: Arc::new(Mutex::new(None)),
        }
    }

    /// Build the relay that handles mention events.
    pub fn relay(&self) -> RelayController {
        RelayController::new(&self.config, self.db.clone(), self.llm.clone(), self.chat.clone())
    }

    /// Start the health probe and the chat listener.
    pub async fn start(&self) -> Void {
        let mut health = self.health.lock().await;

        if health.is_none() {
            *health = Some(HealthServer::start(&self.config.health_bind).await?);
        }

        self.chat.start(self.relay()).await
    }

    /// Stop the chat listener and the health probe.
    pub async fn stop(&self) -> Void {
        self.chat.stop().await?;

        if let Some(health) = self.health.lock().await.take() {
            health.stop().await?;
        }

        Ok(())
    }

    /// Run until Ctrl-C, then shut down gracefully.
    pub async fn run(&self) -> Void {
        self.start().await?;

        tokio::signal::ctrl_c().await?;
        info!("Shutting down ...");

        self.stop().await
    }
}
