//! Model transport interface.
//!
//! The harness never talks to an LLM provider directly. It drives a
//! [`ModelAdapter`] that keeps a fixed conversation (system instruction plus
//! few-shot examples) and samples several completions for one new message
//! without growing that conversation.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Role in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

/// A message in a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

/// Fixed prefix of every request: system instruction and example turns.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatHistory {
    system: String,
    examples: Vec<ChatMessage>,
}

impl ChatHistory {
    pub fn new(system: impl Into<String>, examples: Vec<ChatMessage>) -> Self {
        Self {
            system: system.into(),
            examples,
        }
    }

    pub fn system(&self) -> &str {
        &self.system
    }

    pub fn examples(&self) -> &[ChatMessage] {
        &self.examples
    }

    /// Full message list for one request, leaving the history untouched.
    pub fn conversation_for(&self, message: &str) -> Vec<ChatMessage> {
        let mut messages = Vec::with_capacity(self.examples.len() + 2);
        messages.push(ChatMessage::system(self.system.clone()));
        messages.extend(self.examples.iter().cloned());
        messages.push(ChatMessage::user(message));
        messages
    }
}

/// Adapter over an LLM transport.
#[async_trait]
pub trait ModelAdapter: Send + Sync {
    /// Install the system instruction and few-shot history used by every
    /// subsequent [`sample`](Self::sample) call.
    fn init_history(&mut self, system: &str, history: &[ChatMessage]);

    /// Send `message` on top of the fixed history and return exactly
    /// `choices` completions. The history is not extended.
    async fn sample(&self, message: &str, choices: usize) -> Result<Vec<String>>;

    /// Name used in logs and errors.
    fn name(&self) -> &str {
        "model"
    }
}
