//! OpenAI provider for the completion client.
//!
//! Sends the rendered prompt as a single user message to the Chat Completions
//! endpoint and returns the first choice's text.

use std::sync::Arc;

use async_openai::{
    Client,
    config::OpenAIConfig,
    error::OpenAIError,
    types::{ChatCompletionRequestMessage, ChatCompletionRequestUserMessage, ChatCompletionRequestUserMessageContent, CreateChatCompletionRequestArgs},
};
use async_trait::async_trait;
use tracing::{info, instrument};

use crate::base::config::Config;

use super::{CompletionError, GenericLlmClient, LlmClient};

// Extra methods on `LlmClient` applied by the openai implementation.

impl LlmClient {
    pub fn openai(config: &Config) -> Self {
        let client = OpenAiLlmClient::new(config);
        Self::new(Arc::new(client))
    }
}

// Specific implementations.

/// OpenAI LLM client implementation.
#[derive(Clone)]
pub struct OpenAiLlmClient {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAiLlmClient {
    /// Create a new OpenAI LLM client.
    #[instrument(name = "OpenAiLlmClient::new", skip_all)]
    pub fn new(config: &Config) -> Self {
        let cfg = OpenAIConfig::new().with_api_key(config.openai_api_key.clone());

        Self {
            client: Client::with_config(cfg),
            model: config.openai_model.clone(),
        }
    }
}

#[async_trait]
impl GenericLlmClient for OpenAiLlmClient {
    #[instrument(name = "OpenAiLlmClient::generate", skip_all)]
    async fn generate(&self, prompt: &str) -> Result<Option<String>, CompletionError> {
        let messages = vec![ChatCompletionRequestMessage::User(ChatCompletionRequestUserMessage {
            content: ChatCompletionRequestUserMessageContent::Text(prompt.to_string()),
            name: None,
        })];

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .build()
            .map_err(classify_openai_error)?;

        let response = self.client.chat().create(request).await.map_err(classify_openai_error)?;

        let Some(choice) = response.choices.into_iter().next() else {
            info!("OpenAI returned no choices.");
            return Ok(None);
        };

        if let Some(refusal) = choice.message.refusal {
            return Err(CompletionError::Service(format!("Request refused: {refusal}")));
        }

        Ok(choice.message.content)
    }
}

/// Sort an OpenAI error into a service failure or an unexpected condition.
fn classify_openai_error(err: OpenAIError) -> CompletionError {
    match err {
        OpenAIError::Reqwest(_) | OpenAIError::ApiError(_) | OpenAIError::JSONDeserialize(_) | OpenAIError::StreamError(_) => CompletionError::Service(err.to_string()),
        other => CompletionError::Unexpected(other.into()),
    }
}

// Tests.
