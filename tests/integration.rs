#![cfg(test)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use mockall::mock;
use relay_bot::{
    base::{
        config::{Config, ConfigInner, LlmProvider},
        prompts::RELAY_SYSTEM_DIRECTIVE,
        types::{ChatMessage, FALLBACK_REPLY, MentionEvent, Res, Void},
    },
    interaction::relay::RelayController,
    runtime::Runtime,
    service::{
        chat::{ChatClient, GenericChatClient},
        db::{DbClient, GenericDbClient},
        llm::{CompletionError, GenericLlmClient, LlmClient},
    },
};
use tokio::sync::mpsc;

// Mocks.

mock! {
    pub Chat {}

    #[async_trait]
    impl GenericChatClient for Chat {
        async fn start(&self, relay: RelayController) -> Void;
        async fn stop(&self) -> Void;
        async fn send_message(&self, channel_id: &str, thread_ts: &str, text: &str) -> Void;
    }
}

mock! {
    pub Llm {}

    #[async_trait]
    impl GenericLlmClient for Llm {
        async fn generate(&self, prompt: &str) -> Result<Option<String>, CompletionError>;
    }
}

mock! {
    pub Db {}

    #[async_trait]
    impl GenericDbClient for Db {
        async fn append_message(&self, channel: &str, user: &str, text: &str, timestamp: &str) -> Res<i64>;
        async fn recent_messages(&self, channel: &str, limit: usize) -> Res<Vec<ChatMessage>>;
    }
}

// Helpers.

type Sent = Arc<Mutex<Vec<(String, String, String)>>>;
type Prompts = Arc<Mutex<Vec<String>>>;

fn test_config() -> Config {
    Config::from(ConfigInner {
        slack_app_token: "xapp-test".to_string(),
        slack_bot_token: "xoxb-test".to_string(),
        llm_provider: LlmProvider::Gemini,
        gemini_api_key: "test-key".to_string(),
        history_window: 5,
        system_directive: RELAY_SYSTEM_DIRECTIVE.to_string(),
        fallback_reply: FALLBACK_REPLY.to_string(),
        health_bind: "127.0.0.1:0".to_string(),
        ..Default::default()
    })
}

/// A chat client that records every reply it is asked to send.
fn recording_chat() -> (ChatClient, Sent) {
    let sent: Sent = Arc::default();
    let recorder = sent.clone();

    let mut mock = MockChat::new();
    mock.expect_send_message().returning(move |channel, thread_ts, text| {
        recorder.lock().unwrap().push((channel.to_string(), thread_ts.to_string(), text.to_string()));
        Ok(())
    });

    (ChatClient::new(Arc::new(mock)), sent)
}

/// An LLM client that records prompts and answers with the given result.
fn recording_llm(answer: fn() -> Result<Option<String>, CompletionError>) -> (LlmClient, Prompts) {
    let prompts: Prompts = Arc::default();
    let recorder = prompts.clone();

    let mut mock = MockLlm::new();
    mock.expect_generate().times(1).returning(move |prompt| {
        recorder.lock().unwrap().push(prompt.to_string());
        answer()
    });

    (LlmClient::new(Arc::new(mock)), prompts)
}

fn mention(channel: &str, user: &str, text: &str, ts: &str, thread_ts: Option<&str>) -> MentionEvent {
    MentionEvent::new(Some(channel.to_string()), Some(user.to_string()), Some(text.to_string()), Some(ts.to_string()), thread_ts.map(str::to_string)).unwrap()
}

// Scenarios.

#[tokio::test]
async fn test_first_mention_in_empty_channel() {
    let db = DbClient::surreal_memory().await.unwrap();
    let (llm, prompts) = recording_llm(|| Ok(Some("Hi alice!".to_string())));
    let (chat, sent) = recording_chat();

    let relay = RelayController::new(&test_config(), db.clone(), llm, chat);
    let reply = relay.handle(&mention("C1", "alice", "hi", "100", None)).await.unwrap();

    assert_eq!(reply, "Hi alice!");

    // Exactly one message persisted, with the first id.
    let stored = db.recent_messages("C1", 5).await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].id, 1);
    assert_eq!(stored[0].timestamp, "100");

    // The only history is the new message itself.
    let prompt = prompts.lock().unwrap()[0].clone();
    assert!(prompt.contains("Conversation history:\nalice: hi\n\nUser (alice) asked: hi\nBot:"));
    assert!(prompt.ends_with("User (alice) asked: hi\nBot:"));

    assert_eq!(*sent.lock().unwrap(), vec![("C1".to_string(), "100".to_string(), "Hi alice!".to_string())]);
}

#[tokio::test]
async fn test_window_covers_last_five_messages_oldest_first() {
    let db = DbClient::surreal_memory().await.unwrap();
    for i in 1..=6 {
        db.append_message("C1", "bob", &format!("m{i}"), &format!("{i}")).await.unwrap();
    }

    let (llm, prompts) = recording_llm(|| Ok(Some("ok".to_string())));
    let (chat, _sent) = recording_chat();

    let relay = RelayController::new(&test_config(), db.clone(), llm, chat);
    relay.handle(&mention("C1", "alice", "m7", "7", None)).await.unwrap();

    let ids = db.recent_messages("C1", 5).await.unwrap().iter().map(|m| m.id).collect::<Vec<_>>();
    assert_eq!(ids, vec![7, 6, 5, 4, 3]);

    let prompt = prompts.lock().unwrap()[0].clone();
    assert!(prompt.contains("Conversation history:\nbob: m3\nbob: m4\nbob: m5\nbob: m6\nalice: m7\n\n"));
    assert!(!prompt.contains("bob: m2"));
}

#[tokio::test]
async fn test_model_failure_replies_with_fallback_once() {
    let db = DbClient::surreal_memory().await.unwrap();
    let (llm, _prompts) = recording_llm(|| Err(CompletionError::Service("connection refused".to_string())));

    let mut mock = MockChat::new();
    mock.expect_send_message()
        .withf(|channel, thread_ts, text| channel.to_string() == "C1" && thread_ts.to_string() == "100" && text.to_string() == FALLBACK_REPLY)
        .times(1)
        .returning(|_, _, _| Ok(()));
    let chat = ChatClient::new(Arc::new(mock));

    let relay = RelayController::new(&test_config(), db, llm, chat);
    let reply = relay.handle(&mention("C1", "alice", "hi", "100", None)).await.unwrap();

    assert_eq!(reply, FALLBACK_REPLY);
}

#[tokio::test]
async fn test_empty_model_output_replies_with_fallback() {
    let db = DbClient::surreal_memory().await.unwrap();
    let (llm, _prompts) = recording_llm(|| Ok(None));
    let (chat, sent) = recording_chat();

    let relay = RelayController::new(&test_config(), db, llm, chat);
    relay.handle(&mention("C1", "alice", "hi", "100", None)).await.unwrap();

    assert_eq!(sent.lock().unwrap()[0].2, FALLBACK_REPLY);
}

#[tokio::test]
async fn test_unexpected_model_failure_still_replies() {
    let db = DbClient::surreal_memory().await.unwrap();
    let (llm, _prompts) = recording_llm(|| Err(CompletionError::Unexpected(anyhow::anyhow!("request builder failed"))));
    let (chat, sent) = recording_chat();

    let relay = RelayController::new(&test_config(), db, llm, chat);
    let reply = relay.handle(&mention("C1", "alice", "hi", "100", None)).await.unwrap();

    assert_eq!(reply, FALLBACK_REPLY);
    assert_eq!(sent.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_reply_goes_to_existing_thread() {
    let db = DbClient::surreal_memory().await.unwrap();
    let (llm, _prompts) = recording_llm(|| Ok(Some("threaded".to_string())));
    let (chat, sent) = recording_chat();

    let relay = RelayController::new(&test_config(), db.clone(), llm, chat);
    relay.handle(&mention("C1", "alice", "follow up", "105", Some("100"))).await.unwrap();

    assert_eq!(sent.lock().unwrap()[0].1, "100");

    // The stored timestamp is the event's own token, not the thread's.
    assert_eq!(db.recent_messages("C1", 1).await.unwrap()[0].timestamp, "105");
}

#[tokio::test]
async fn test_channels_do_not_share_history() {
    let db = DbClient::surreal_memory().await.unwrap();
    db.append_message("C2", "mallory", "secret", "1").await.unwrap();

    let (llm, prompts) = recording_llm(|| Ok(Some("ok".to_string())));
    let (chat, _sent) = recording_chat();

    let relay = RelayController::new(&test_config(), db, llm, chat);
    relay.handle(&mention("C1", "alice", "hi", "2", None)).await.unwrap();

    assert!(!prompts.lock().unwrap()[0].contains("secret"));
}

// Store failure policies.

#[tokio::test]
async fn test_append_failure_still_replies() {
    let mut db = MockDb::new();
    db.expect_append_message().times(1).returning(|_, _, _, _| Err(anyhow::anyhow!("write rejected")));
    db.expect_recent_messages().times(1).returning(|_, _| Ok(Vec::new()));

    let (llm, prompts) = recording_llm(|| Ok(Some("still here".to_string())));
    let (chat, sent) = recording_chat();

    let relay = RelayController::new(&test_config(), DbClient::new(Arc::new(db)), llm, chat);
    let reply = relay.handle(&mention("C1", "alice", "hi", "100", None)).await.unwrap();

    assert_eq!(reply, "still here");
    assert_eq!(sent.lock().unwrap().len(), 1);

    // Nothing was stored, so the history section is empty.
    assert!(prompts.lock().unwrap()[0].contains("Conversation history:\n\n\nUser (alice) asked: hi\nBot:"));
}

#[tokio::test]
async fn test_recent_failure_degrades_to_empty_window() {
    let mut db = MockDb::new();
    db.expect_append_message().times(1).returning(|_, _, _, _| Ok(1));
    db.expect_recent_messages()
        .withf(|channel, limit| channel.to_string() == "C1" && *limit == 5)
        .times(1)
        .returning(|_, _| Err(anyhow::anyhow!("store unavailable")));

    let (llm, prompts) = recording_llm(|| Ok(Some("ok".to_string())));
    let (chat, sent) = recording_chat();

    let relay = RelayController::new(&test_config(), DbClient::new(Arc::new(db)), llm, chat);
    relay.handle(&mention("C1", "alice", "hi", "100", None)).await.unwrap();

    assert_eq!(sent.lock().unwrap().len(), 1);
    assert!(prompts.lock().unwrap()[0].contains("Conversation history:\n\n\n"));
}

#[tokio::test]
async fn test_send_failure_is_reported() {
    let db = DbClient::surreal_memory().await.unwrap();
    let (llm, _prompts) = recording_llm(|| Ok(Some("ok".to_string())));

    let mut mock = MockChat::new();
    mock.expect_send_message().times(1).returning(|_, _, _| Err(anyhow::anyhow!("channel_not_found")));

    let relay = RelayController::new(&test_config(), db, llm, ChatClient::new(Arc::new(mock)));

    assert!(relay.handle(&mention("C1", "alice", "hi", "100", None)).await.is_err());
}

// Dispatch and lifecycle.

#[tokio::test]
async fn test_dispatch_handles_event_on_its_own_task() {
    let db = DbClient::surreal_memory().await.unwrap();
    let (llm, _prompts) = recording_llm(|| Ok(Some("async hi".to_string())));

    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut mock = MockChat::new();
    mock.expect_send_message().times(1).returning(move |channel, thread_ts, text| {
        let _ = tx.send((channel.to_string(), thread_ts.to_string(), text.to_string()));
        Ok(())
    });

    let relay = RelayController::new(&test_config(), db, llm, ChatClient::new(Arc::new(mock)));
    relay.dispatch(mention("C1", "alice", "hi", "100", None));

    let sent = rx.recv().await.unwrap();
    assert_eq!(sent, ("C1".to_string(), "100".to_string(), "async hi".to_string()));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_dispatches_store_every_mention() {
    let db = DbClient::surreal_memory().await.unwrap();

    let mut llm = MockLlm::new();
    llm.expect_generate().times(20).returning(|_| Ok(Some("ack".to_string())));

    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut chat = MockChat::new();
    chat.expect_send_message().times(20).returning(move |_, thread_ts, _| {
        let _ = tx.send(thread_ts.to_string());
        Ok(())
    });

    let relay = RelayController::new(&test_config(), db.clone(), LlmClient::new(Arc::new(llm)), ChatClient::new(Arc::new(chat)));

    for i in 0..20 {
        relay.dispatch(mention("C1", "alice", &format!("m{i}"), &format!("{i}"), None));
    }

    let mut threads = Vec::new();
    for _ in 0..20 {
        threads.push(rx.recv().await.unwrap());
    }
    assert_eq!(threads.len(), 20);

    let stored = db.recent_messages("C1", 100).await.unwrap();
    assert_eq!(stored.len(), 20);

    let mut ids = stored.iter().map(|m| m.id).collect::<Vec<_>>();
    ids.sort_unstable();
    assert_eq!(ids, (1..=20).collect::<Vec<i64>>());
}

#[tokio::test]
async fn test_runtime_start_and_stop() {
    let db = DbClient::surreal_memory().await.unwrap();
    let llm = LlmClient::new(Arc::new(MockLlm::new()));

    let mut mock = MockChat::new();
    mock.expect_start().times(1).returning(|_| Ok(()));
    mock.expect_stop().times(1).returning(|| Ok(()));

    let runtime = Runtime::from_parts(test_config(), db, llm, ChatClient::new(Arc::new(mock)));

    runtime.start().await.unwrap();
    runtime.stop().await.unwrap();
}
