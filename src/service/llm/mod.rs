pub mod gemini;
pub mod openai;

use std::{ops::Deref, sync::Arc};

use async_trait::async_trait;
use tracing::{debug, instrument, warn};

use crate::base::{
    config::{Config, LlmProvider},
    types::{FALLBACK_REPLY, Res},
};

// Errors.

/// Failure modes of a single completion call.
#[derive(Debug, thiserror::Error)]
pub enum CompletionError {
    /// The external service failed: unreachable, non-success status, quota, refusal, or a malformed body.
    #[error("completion service error: {0}")]
    Service(String),
    /// Anything the service itself did not cause (e.g., the request could not be built).
    #[error("unexpected completion error: {0}")]
    Unexpected(anyhow::Error),
}

// Traits.

/// Generic LLM client trait that clients must implement.
///
/// Implementations make exactly one blocking call to the provider per invocation,
/// with the provider's default sampling parameters, and no retry or streaming.
#[async_trait]
pub trait GenericLlmClient: Send + Sync + 'static {
    /// Generate text for the prompt.
    ///
    /// Returns `Ok(None)` when the provider answered without any text.
    async fn generate(&self, prompt: &str) -> Result<Option<String>, CompletionError>;
}

// Structs.

/// LLM client for the application.
///
/// This is trivially cloneable and can be passed around without the need for `Arc` or `Mutex`.
#[derive(Clone)]
pub struct LlmClient {
    inner: Arc<dyn GenericLlmClient>,
    fallback_reply: Arc<str>,
    empty_reply: Option<Arc<str>>,
}

impl Deref for LlmClient {
    type Target = dyn GenericLlmClient;

    fn deref(&self) -> &Self::Target {
        &*self.inner
    }
}

impl LlmClient {
    pub fn new(inner: Arc<dyn GenericLlmClient>) -> Self {
        Self {
            inner,
            fallback_reply: Arc::from(FALLBACK_REPLY),
            empty_reply: None,
        }
    }

    /// Build the client for the provider selected in the configuration.
    pub fn from_config(config: &Config) -> Res<Self> {
        let client = match config.llm_provider {
            LlmProvider::Gemini => Self::gemini(config)?,
            LlmProvider::OpenAi => Self::openai(config),
        };

        let client = client.with_fallback_reply(&config.fallback_reply);

        Ok(match &config.empty_reply {
            Some(reply) => client.with_empty_reply(reply),
            None => client,
        })
    }

    /// Override the reply used when the model fails.
    pub fn with_fallback_reply(mut self, reply: &str) -> Self {
        self.fallback_reply = Arc::from(reply);
        self
    }

    /// Use a distinct reply when the model answers without text.
    pub fn with_empty_reply(mut self, reply: &str) -> Self {
        self.empty_reply = Some(Arc::from(reply));
        self
    }

    pub fn fallback_reply(&self) -> &str {
        &self.fallback_reply
    }

    /// Complete the prompt, falling back to the fallback reply on service failure or empty output.
    ///
    /// Empty output uses the empty-output reply instead, when one is set.
    /// Only `CompletionError::Unexpected` is returned to the caller.
    #[instrument(skip_all)]
    pub async fn complete(&self, prompt: &str) -> Res<String> {
        match self.inner.generate(prompt).await {
            Ok(Some(text)) if !text.trim().is_empty() => {
                debug!("Completion: {}", text);
                Ok(text)
            }
            Ok(_) => {
                warn!("Completion returned no text; using the fallback reply.");
                Ok(self.empty_reply.as_deref().unwrap_or(&*self.fallback_reply).to_string())
            }
            Err(CompletionError::Service(err)) => {
                warn!("Error calling the completion service: {}", err);
                Ok(self.fallback_reply.to_string())
            }
            Err(CompletionError::Unexpected(err)) => Err(err),
        }
    }
}

// Tests.
