//! Slack integration for relay-bot.
//!
//! This module provides the Slack implementation of `GenericChatClient`:
//! - Receiving `app_mention` events over socket mode
//! - Posting replies into the triggering thread

use crate::{
    base::{
        config::Config,
        types::{MentionEvent, Res, Void},
    },
    interaction::relay::RelayController,
};
use async_trait::async_trait;
use hyper_rustls::HttpsConnector;
use hyper_util::client::legacy::connect::HttpConnector;
use slack_morphism::prelude::*;
use tokio::sync::Mutex;
use tracing::{error, info, instrument, warn};

use std::sync::Arc;

use super::{ChatClient, GenericChatClient};

// Type aliases.

type Connector = SlackClientHyperConnector<HttpsConnector<HttpConnector>>;
type FullClient = slack_morphism::SlackClient<Connector>;
type Listener = SlackClientSocketModeListener<Connector>;

// Extra methods on `ChatClient` applied by the slack implementation.

impl ChatClient {
    /// Creates a new Slack chat client.
    pub async fn slack(config: &Config) -> Res<Self> {
        let client = SlackChatClient::new(config).await?;
        Ok(Self { inner: Arc::new(client) })
    }
}

// Structs.

/// User state for the slack socket client.
struct SlackUserState {
    relay: RelayController,
}

/// Slack client implementation.
#[derive(Clone)]
struct SlackChatClient {
    app_token: SlackApiToken,
    bot_token: SlackApiToken,
    client: Arc<FullClient>,
    listener: Arc<Mutex<Option<Arc<Listener>>>>,
}

impl SlackChatClient {
    /// Create a new Slack chat client.
    #[instrument(name = "SlackChatClient::new", skip_all)]
    pub async fn new(config: &Config) -> Res<Self> {
        // Initialize tokens.

        let app_token = SlackApiToken::new(SlackApiTokenValue(config.slack_app_token.clone()));
        let bot_token = SlackApiToken::new(SlackApiTokenValue(config.slack_bot_token.clone()));

        // Initialize the Slack client.

        let https_connector = HttpsConnector::<HttpConnector>::builder().with_native_roots()?.https_only().enable_all_versions().build();
        let connector = SlackClientHyperConnector::with_connector(https_connector);
        let client = Arc::new(slack_morphism::SlackClient::new(connector));

        // Verify the bot token before listening.

        let session = client.open_session(&bot_token);
        let bot_user = session.auth_test().await?;

        info!("Slack bot user ID: {}", bot_user.user_id.0);

        Ok(Self {
            app_token,
            bot_token,
            client,
            listener: Arc::new(Mutex::new(None)),
        })
    }
}

#[async_trait]
impl GenericChatClient for SlackChatClient {
    async fn start(&self, relay: RelayController) -> Void {
        let mut slot = self.listener.lock().await;

        if slot.is_some() {
            warn!("Slack listener is already running.");
            return Ok(());
        }

        // Initialize the socket mode listener.

        let socket_mode_callbacks = SlackSocketModeListenerCallbacks::new().with_push_events(handle_push_event);

        let listener_environment = Arc::new(
            SlackClientEventsListenerEnvironment::new(self.client.clone())
                .with_error_handler(handle_listener_error)
                .with_user_state(SlackUserState { relay }),
        );

        let socket_mode_listener = Arc::new(SlackClientSocketModeListener::new(&SlackClientSocketModeConfig::new(), listener_environment, socket_mode_callbacks));

        // Register an app token to listen for events, then open the WS connections.
        socket_mode_listener.listen_for(&self.app_token).await?;
        socket_mode_listener.start().await;

        info!("Slack socket mode listener started.");

        *slot = Some(socket_mode_listener);

        Ok(())
    }

    async fn stop(&self) -> Void {
        if let Some(listener) = self.listener.lock().await.take() {
            listener.shutdown().await;
            info!("Slack socket mode listener stopped.");
        }

        Ok(())
    }

    #[instrument(skip(self, text))]
    async fn send_message(&self, channel_id: &str, thread_ts: &str, text: &str) -> Void {
        let message = SlackMessageContent::new().with_text(text.to_string());

        let request = SlackApiChatPostMessageRequest::new(SlackChannelId(channel_id.to_string()), message)
            .with_thread_ts(SlackTs(thread_ts.to_string()))
            .with_link_names(true);

        let session = self.client.open_session(&self.bot_token);

        let _ = session.chat_post_message(&request).await.map_err(|e| anyhow::anyhow!("Failed to send message: {}", e))?;

        Ok(())
    }
}

// Socket mode listener callbacks for Slack.

/// Handles push events from Slack.
#[instrument(skip_all)]
async fn handle_push_event(event_callback: SlackPushEventCallback, _client: Arc<SlackHyperClient>, states: SlackClientEventsUserState) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let event = event_callback.event;
    let states = states.read().await;
    let user_state = states.get_user_state::<SlackUserState>().ok_or(anyhow::anyhow!("Failed to get user state"))?;

    match event {
        SlackEventCallbackBody::AppMention(slack_app_mention_event) => {
            info!("Received app mention event ...");

            match mention_from_slack(&slack_app_mention_event) {
                Ok(mention) => user_state.relay.dispatch(mention),
                Err(err) => warn!("Dropping malformed app mention: {}", err),
            }
        }
        _ => {
            warn!("Received unhandled push event.")
        }
    }

    Ok(())
}

/// Logs listener errors and keeps the listener running.
fn handle_listener_error(err: Box<dyn std::error::Error + Send + Sync>, _client: Arc<SlackHyperClient>, _states: SlackClientEventsUserState) -> HttpStatusCode {
    error!("Slack listener error: {:#?}", err);
    HttpStatusCode::OK
}

/// Convert a Slack app mention into a validated mention event.
fn mention_from_slack(event: &SlackAppMentionEvent) -> Res<MentionEvent> {
    MentionEvent::new(
        Some(event.channel.0.clone()),
        Some(event.user.0.clone()),
        event.content.text.clone(),
        Some(event.origin.ts.0.clone()),
        event.origin.thread_ts.as_ref().map(|ts| ts.0.clone()),
    )
}

// Tests.
