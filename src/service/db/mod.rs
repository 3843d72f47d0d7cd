use std::{ops::Deref, sync::Arc};

use async_trait::async_trait;

use crate::base::types::{ChatMessage, Res};

pub mod surreal;

// Traits.

/// Generic database client trait that clients must implement.
///
/// The store is an append-only log of chat messages partitioned by channel.
/// Messages are never updated or deleted. Implementing this trait allows
/// different database backends to be used with the relay-bot.
#[async_trait]
pub trait GenericDbClient: Send + Sync + 'static {
    /// Appends a message to the log and returns its store-assigned id.
    ///
    /// Ids are strictly increasing in insertion order, and the write is atomic:
    /// either the message (with its id) is visible, or nothing is.
    async fn append_message(&self, channel: &str, user: &str, text: &str, timestamp: &str) -> Res<i64>;

    /// Returns at most `limit` messages for the channel, most recent first.
    ///
    /// An unknown channel yields an empty list rather than an error.
    async fn recent_messages(&self, channel: &str, limit: usize) -> Res<Vec<ChatMessage>>;
}

// Structs.

/// Database client for relay-bot.
///
/// This is trivially cloneable and can be passed around without the need for `Arc` or `Mutex`.
#[derive(Clone)]
pub struct DbClient {
    inner: Arc<dyn GenericDbClient>,
}

impl Deref for DbClient {
    type Target = dyn GenericDbClient;

    fn deref(&self) -> &Self::Target {
        self.inner.as_ref()
    }
}

impl DbClient {
    pub fn new(inner: Arc<dyn GenericDbClient>) -> Self {
        Self { inner }
    }
}
