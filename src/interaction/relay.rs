//! Relays mention events to the LLM and replies in-thread.
//!
//! Per event: persist the message, read the recent window for the channel,
//! render the prompt, complete it, and post the reply to the event's thread.
//! The user always gets a reply; store and model failures degrade instead of
//! aborting the event.

use std::sync::Arc;

use tracing::{Instrument, debug, error, info, instrument, warn};

use crate::{
    base::{
        config::Config,
        types::{MentionEvent, Res},
    },
    interaction::context,
    service::{chat::ChatClient, db::DbClient, llm::LlmClient},
};

/// The mention handler.
///
/// Holds only injected service handles and settings; nothing is carried between events.
/// It is trivially cloneable.
#[derive(Clone)]
pub struct RelayController {
    db: DbClient,
    llm: LlmClient,
    chat: ChatClient,
    directive: Arc<str>,
    history_window: usize,
}

impl RelayController {
    pub fn new(config: &Config, db: DbClient, llm: LlmClient, chat: ChatClient) -> Self {
        Self {
            db,
            llm,
            chat,
            directive: Arc::from(config.system_directive.as_str()),
            history_window: config.history_window,
        }
    }

    /// Handle the event on its own task, logging any failure.
    #[instrument(skip_all)]
    pub fn dispatch(&self, event: MentionEvent) {
        let relay = self.clone();

        tokio::spawn(
            async move {
                // Process the event.
                let result = relay.handle(&event).await;

                // Log any errors.
                if let Err(err) = &result {
                    error!("Error while handling: {:#}", err);
                }
            }
            .in_current_span(),
        );
    }

    /// Handle one mention event to completion and return the reply that was posted.
    #[instrument(skip_all, fields(channel = %event.channel, ts = %event.ts))]
    pub async fn handle(&self, event: &MentionEvent) -> Res<String> {
        // Persist the new message first, so it is part of its own window.

        match self.db.append_message(&event.channel, &event.user, &event.text, &event.ts).await {
            Ok(id) => debug!("Stored message {}.", id),
            Err(err) => warn!("Failed to store message, continuing without it: {:#}", err),
        }

        // Fetch the recent window.

        let window = match self.db.recent_messages(&event.channel, self.history_window).await {
            Ok(window) => window,
            Err(err) => {
                warn!("Failed to read recent messages, continuing with an empty window: {:#}", err);
                Vec::new()
            }
        };

        // Render and complete.

        let prompt = context::render(&self.directive, &window, &event.user, &event.text);

        let reply = match self.llm.complete(&prompt).await {
            Ok(reply) => reply,
            Err(err) => {
                error!("Unexpected completion failure: {:#}", err);
                self.llm.fallback_reply().to_string()
            }
        };

        // Reply in the originating thread.

        let thread_ts = event.reply_thread_ts();
        self.chat.send_message(&event.channel, thread_ts, &reply).await?;

        info!("Replied in thread `{}`.", thread_ts);

        Ok(reply)
    }
}
