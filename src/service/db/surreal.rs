//! SurrealDB implementation of the message store.

use std::sync::Arc;

use anyhow::anyhow;
use async_trait::async_trait;
use serde::Deserialize;
use surrealdb::{
    Surreal,
    engine::any::{self, Any},
    opt::auth::Root,
};
use tokio::sync::Mutex;
use tracing::{debug, info, instrument};

use crate::base::{
    config::Config,
    types::{ChatMessage, Res, Void},
};

use super::{DbClient, GenericDbClient};

// Extra methods on `DbClient` applied by the surreal implementation.

impl DbClient {
    /// Connects to the SurrealDB endpoint named in the configuration.
    pub async fn surreal(config: &Config) -> Res<Self> {
        let client = SurrealDbClient::new(config).await?;
        Ok(Self { inner: Arc::new(client) })
    }

    /// Creates an in-memory SurrealDB instance (used for tests and local runs).
    pub async fn surreal_memory() -> Res<Self> {
        let client = SurrealDbClient::memory().await?;
        Ok(Self { inner: Arc::new(client) })
    }
}

// Queries.

const DEFINE_SCHEMA: &str = r#"
    DEFINE TABLE IF NOT EXISTS message SCHEMAFULL;
    DEFINE FIELD IF NOT EXISTS seq ON message TYPE int;
    DEFINE FIELD IF NOT EXISTS channel ON message TYPE string;
    DEFINE FIELD IF NOT EXISTS author ON message TYPE string;
    DEFINE FIELD IF NOT EXISTS body ON message TYPE string;
    DEFINE FIELD IF NOT EXISTS event_ts ON message TYPE string;
    DEFINE INDEX IF NOT EXISTS message_channel_seq ON message FIELDS channel, seq;
    DEFINE TABLE IF NOT EXISTS message_sequence SCHEMALESS;
"#;

// The sequence bump and the insert run as one statement, so they commit together.
const APPEND_MESSAGE: &str = r#"
    CREATE ONLY message CONTENT {
        seq: (UPSERT ONLY message_sequence:global SET counter = (counter OR 0) + 1 RETURN VALUE counter),
        channel: $channel,
        author: $author,
        body: $body,
        event_ts: $event_ts
    } RETURN VALUE seq;
"#;

// Structs.

/// A message row as stored in SurrealDB.
#[derive(Debug, Deserialize)]
struct SurrealMessage {
    seq: i64,
    channel: String,
    author: String,
    body: String,
    event_ts: String,
}

impl From<SurrealMessage> for ChatMessage {
    fn from(row: SurrealMessage) -> Self {
        Self {
            id: row.seq,
            channel: row.channel,
            user: row.author,
            text: row.body,
            timestamp: row.event_ts,
        }
    }
}

/// SurrealDB client implementation.
///
/// The underlying connection is shared and safe for concurrent callers. Appends
/// are serialized through `append_lock`: every append bumps the same sequence
/// record, and racing transactions on it fail with a write conflict. Reads never
/// take the lock.
#[derive(Clone)]
pub struct SurrealDbClient {
    db: Surreal<Any>,
    append_lock: Arc<Mutex<()>>,
}

impl SurrealDbClient {
    /// Create a new database client from the configuration.
    #[instrument(name = "SurrealDbClient::new", skip_all)]
    pub async fn new(config: &Config) -> Res<Self> {
        let db = any::connect(config.db_endpoint.as_str()).await?;

        // Authenticate when credentials are provided (remote endpoints).
        if let (Some(username), Some(password)) = (&config.db_username, &config.db_password) {
            db.signin(Root {
                username: username.as_str(),
                password: password.as_str(),
            })
            .await?;
        }

        db.use_ns(config.db_namespace.as_str()).use_db(config.db_database.as_str()).await?;

        let client = Self::with_connection(db);
        client.define_schema().await?;

        info!("Database initialized successfully at `{}`.", config.db_endpoint);

        Ok(client)
    }

    /// Create an in-memory database client.
    #[instrument(name = "SurrealDbClient::memory", skip_all)]
    pub async fn memory() -> Res<Self> {
        let db = any::connect("mem://").await?;
        db.use_ns("relay").use_db("bot").await?;

        let client = Self::with_connection(db);
        client.define_schema().await?;

        Ok(client)
    }

    fn with_connection(db: Surreal<Any>) -> Self {
        Self {
            db,
            append_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Define the tables and indexes; safe to run on every start.
    async fn define_schema(&self) -> Void {
        self.db.query(DEFINE_SCHEMA).await?.check()?;
        Ok(())
    }
}

#[async_trait]
impl GenericDbClient for SurrealDbClient {
    #[instrument(skip(self, text))]
    async fn append_message(&self, channel: &str, user: &str, text: &str, timestamp: &str) -> Res<i64> {
        let _guard = self.append_lock.lock().await;

        let mut response = self
            .db
            .query(APPEND_MESSAGE)
            .bind(("channel", channel.to_string()))
            .bind(("author", user.to_string()))
            .bind(("body", text.to_string()))
            .bind(("event_ts", timestamp.to_string()))
            .await?;

        let id: Option<i64> = response.take(0)?;
        let id = id.ok_or_else(|| anyhow!("Message insert returned no id."))?;

        debug!("Appended message {} to channel `{}`.", id, channel);

        Ok(id)
    }

    #[instrument(skip(self))]
    async fn recent_messages(&self, channel: &str, limit: usize) -> Res<Vec<ChatMessage>> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let query = format!("SELECT seq, channel, author, body, event_ts FROM message WHERE channel = $channel ORDER BY seq DESC LIMIT {limit};");

        let mut response = self.db.query(query).bind(("channel", channel.to_string())).await?;
        let rows: Vec<SurrealMessage> = response.take(0)?;

        Ok(rows.into_iter().map(ChatMessage::from).collect())
    }
}

// Tests.
