//! Prompt templates for LLM usage.

/// Default instructional preamble for relayed mentions.
pub const RELAY_SYSTEM_DIRECTIVE: &str = "You are an AI assistant in a Slack workspace, helping users by answering their questions and engaging in meaningful conversations.
Respond concisely, accurately, and professionally while maintaining a friendly tone.
Use the given conversation history to understand the context before responding.";

/// Header placed above the rendered conversation window.
pub const CONVERSATION_HISTORY_HEADER: &str = "Conversation history:";

/// Cue that invites the model to continue as the bot.
pub const BOT_CUE: &str = "Bot:";
