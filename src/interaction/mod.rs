//! Event handling for relay-bot.
//!
//! This module turns inbound mentions into replies:
//! - Rendering the recent conversation into a prompt
//! - Coordinating the store, the LLM, and the chat reply for each event

pub mod context;
pub mod relay;
