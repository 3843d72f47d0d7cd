//! Load configuration via `config` crate with env-override support.

use std::{ops::Deref, sync::Arc};

use serde::Deserialize;

use crate::base::{prompts, types::FALLBACK_REPLY};

use super::types::Res;

/// Default LLM provider.
fn default_llm_provider() -> LlmProvider {
    LlmProvider::Gemini
}

/// Default Gemini model to use.
fn default_gemini_model() -> String {
    "gemini-2.0-flash".to_string()
}

/// Default Gemini REST API base URL.
fn default_gemini_base_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}

/// Default OpenAI model to use.
fn default_openai_model() -> String {
    "gpt-4.1".to_string()
}

/// Default database endpoint (a SurrealKV store in the working directory).
fn default_db_endpoint() -> String {
    "surrealkv://relay-bot.db".to_string()
}

fn default_db_namespace() -> String {
    "relay".to_string()
}

fn default_db_database() -> String {
    "bot".to_string()
}

/// Default number of recent messages given to the model as context.
fn default_history_window() -> usize {
    5
}

/// Default system directive for relayed prompts.
fn default_system_directive() -> String {
    prompts::RELAY_SYSTEM_DIRECTIVE.to_string()
}

/// Default fallback reply.
fn default_fallback_reply() -> String {
    FALLBACK_REPLY.to_string()
}

/// Default bind address for the health probe.
fn default_health_bind() -> String {
    "0.0.0.0:8000".to_string()
}

/// Supported LLM providers.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    #[default]
    Gemini,
    OpenAi,
}

/// Configuration for the relay-bot application.
#[derive(Debug, Clone)]
pub struct Config {
    pub inner: Arc<ConfigInner>,
}

impl Deref for Config {
    type Target = ConfigInner;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl From<ConfigInner> for Config {
    fn from(inner: ConfigInner) -> Self {
        Self { inner: Arc::new(inner) }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct ConfigInner {
    /// Slack app token used for socket mode (`SLACK_APP_TOKEN`).
    pub slack_app_token: String,
    /// Slack bot token used to post replies (`SLACK_BOT_TOKEN`).
    pub slack_bot_token: String,
    /// Which LLM provider answers mentions (`LLM_PROVIDER`): `gemini` or `openai`.
    #[serde(default = "default_llm_provider")]
    pub llm_provider: LlmProvider,
    /// Gemini API key (`GEMINI_API_KEY`).
    #[serde(default)]
    pub gemini_api_key: String,
    /// Gemini model to use (`GEMINI_MODEL`).
    #[serde(default = "default_gemini_model")]
    pub gemini_model: String,
    /// Gemini REST API base URL (`GEMINI_BASE_URL`).
    #[serde(default = "default_gemini_base_url")]
    pub gemini_base_url: String,
    /// OpenAI API key (`OPENAI_API_KEY`).
    #[serde(default)]
    pub openai_api_key: String,
    /// OpenAI model to use (`OPENAI_MODEL`).
    #[serde(default = "default_openai_model")]
    pub openai_model: String,
    /// Database endpoint URL (`DB_ENDPOINT`), e.g. `surrealkv://relay-bot.db`, or `mem://` for a throwaway store.
    #[serde(default = "default_db_endpoint")]
    pub db_endpoint: String,
    /// Database username (`DB_USERNAME`), only used for remote endpoints.
    #[serde(default)]
    pub db_username: Option<String>,
    /// Database password (`DB_PASSWORD`), only used for remote endpoints.
    #[serde(default)]
    pub db_password: Option<String>,
    /// Database namespace (`DB_NAMESPACE`).
    #[serde(default = "default_db_namespace")]
    pub db_namespace: String,
    /// Database name (`DB_DATABASE`).
    #[serde(default = "default_db_database")]
    pub db_database: String,
    /// Number of recent channel messages rendered into each prompt (`HISTORY_WINDOW`).
    #[serde(default = "default_history_window")]
    pub history_window: usize,
    /// Optional custom system directive to override the default (`SYSTEM_DIRECTIVE`).
    #[serde(default = "default_system_directive")]
    pub system_directive: String,
    /// Reply sent when the model fails (`FALLBACK_REPLY`).
    #[serde(default = "default_fallback_reply")]
    pub fallback_reply: String,
    /// Reply sent when the model answers without text (`EMPTY_REPLY`); the fallback reply when unset.
    #[serde(default)]
    pub empty_reply: Option<String>,
    /// Bind address of the health probe (`HEALTH_BIND`).
    #[serde(default = "default_health_bind")]
    pub health_bind: String,
}

impl Config {
    pub fn load(explicit_path: Option<&std::path::Path>) -> Res<Self> {
        let mut cfg = config::Config::builder().add_source(config::Environment::default().prefix("RELAY_BOT"));

        if let Some(p) = explicit_path {
            cfg = cfg.add_source(config::File::from(p.to_path_buf()));
        } else if std::path::Path::new(".hidden/config.toml").exists() {
            cfg = cfg.add_source(config::File::with_name(".hidden/config.toml"));
        }

        let result = Config {
            inner: Arc::new(cfg.build()?.try_deserialize()?),
        };

        result.validate()?;

        Ok(result)
    }

    /// Check the loaded values for consistency.
    pub fn validate(&self) -> Res<()> {
        if self.history_window < 1 || self.history_window > 100 {
            return Err(anyhow::anyhow!("History window must be between 1 and 100."));
        }

        match self.llm_provider {
            LlmProvider::Gemini if self.gemini_api_key.is_empty() => {
                return Err(anyhow::anyhow!("A Gemini API key is required when the provider is `gemini`."));
            }
            LlmProvider::OpenAi if self.openai_api_key.is_empty() => {
                return Err(anyhow::anyhow!("An OpenAI API key is required when the provider is `openai`."));
            }
            _ => {}
        }

        if self.fallback_reply.trim().is_empty() {
            return Err(anyhow::anyhow!("Fallback reply must not be empty."));
        }

        if self.empty_reply.as_deref().is_some_and(|reply| reply.trim().is_empty()) {
            return Err(anyhow::anyhow!("Empty-output reply must not be blank when set."));
        }

        Ok(())
    }
}

// Tests.
