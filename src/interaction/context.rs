//! Renders the recent conversation window into a single prompt.

use crate::base::{
    prompts::{BOT_CUE, CONVERSATION_HISTORY_HEADER},
    types::ChatMessage,
};

/// Render the prompt for a new message.
///
/// `window` is the recent history as the store returns it (newest first); it is
/// rendered oldest first, one `user: text` line per message. The output depends
/// only on the inputs.
pub fn render(directive: &str, window: &[ChatMessage], user: &str, text: &str) -> String {
    let conversation = window.iter().rev().map(|m| format!("{}: {}", m.user, m.text)).collect::<Vec<_>>().join("\n");

    format!("{directive}\n\n{CONVERSATION_HISTORY_HEADER}\n{conversation}\n\nUser ({user}) asked: {text}\n{BOT_CUE}")
}

// Tests.
