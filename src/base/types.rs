use anyhow::anyhow;
use serde::{Deserialize, Serialize};

pub type Err = anyhow::Error;
pub type Res<T> = Result<T, Err>;
pub type Void = Res<()>;

/// Reply sent whenever the model fails or produces no text.
pub const FALLBACK_REPLY: &str = "Sorry, I encountered an error while processing your request.";

/// A persisted chat message.
///
/// The `id` is assigned by the store and is only used for recency ordering; the
/// `timestamp` is the chat platform's event token and is kept for thread correlation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: i64,
    pub channel: String,
    pub user: String,
    pub text: String,
    pub timestamp: String,
}

/// An inbound mention of the bot, normalized from the chat platform's event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MentionEvent {
    pub channel: String,
    pub user: String,
    pub text: String,
    pub ts: String,
    pub thread_ts: Option<String>,
}

impl MentionEvent {
    /// Build a mention event, rejecting events with missing or blank required fields.
    pub fn new(channel: Option<String>, user: Option<String>, text: Option<String>, ts: Option<String>, thread_ts: Option<String>) -> Res<Self> {
        let channel = required("channel", channel)?;
        let user = required("user", user)?;
        let ts = required("ts", ts)?;

        // The body may legitimately be empty, but it must be present.
        let text = text.ok_or_else(|| anyhow!("Mention event is missing `text`."))?;

        let thread_ts = thread_ts.filter(|t| !t.trim().is_empty());

        Ok(Self { channel, user, text, ts, thread_ts })
    }

    /// The thread the reply belongs in: the existing thread, or a new one rooted at this event.
    pub fn reply_thread_ts(&self) -> &str {
        self.thread_ts.as_deref().unwrap_or(&self.ts)
    }
}

fn required(name: &str, value: Option<String>) -> Res<String> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(anyhow!("Mention event is missing `{name}`.")),
    }
}

// Tests.
