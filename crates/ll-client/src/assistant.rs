//! Summaries and chat for the reading UI.
//!
//! Neither operation fails from the caller's point of view: backend errors
//! are logged and replaced with a fixed apology.

use std::sync::Arc;

use ll_core::models::ChatTurn;
use ll_core::traits::AssistantBackend;

pub const SUMMARY_FALLBACK: &str =
    "Sorry, I couldn't generate a summary via the backend. Please try again later.";
pub const CHAT_FALLBACK: &str =
    "I'm sorry, but I encountered an error connecting to the server. Please try again.";

#[derive(Clone)]
pub struct Assistant {
    backend: Arc<dyn AssistantBackend>,
}

impl Assistant {
    pub fn new(backend: Arc<dyn AssistantBackend>) -> Self {
        Self { backend }
    }

    pub async fn summarize(&self, text: &str) -> String {
        match self.backend.summarize(text).await {
            Ok(summary) => summary,
            Err(e) => {
                tracing::error!(error = %e, "error summarizing text");
                SUMMARY_FALLBACK.to_string()
            }
        }
    }

    pub async fn reply(&self, history: &[ChatTurn], message: &str) -> String {
        match self.backend.chat(history, message).await {
            Ok(text) => text,
            Err(e) => {
                tracing::error!(error = %e, "error getting chat response");
                CHAT_FALLBACK.to_string()
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageAuthor {
    User,
    Ai,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub author: MessageAuthor,
    pub text: String,
}

/// One conversation with the assistant.
pub struct ChatSession {
    assistant: Assistant,
    messages: Vec<ChatMessage>,
}

impl ChatSession {
    pub fn new(assistant: Assistant) -> Self {
        Self {
            assistant,
            messages: Vec::new(),
        }
    }

    /// Starts the transcript with an assistant greeting. Greetings are shown
    /// but not sent as history.
    pub fn with_greeting(mut self, greeting: impl Into<String>) -> Self {
        self.messages.push(ChatMessage {
            author: MessageAuthor::Ai,
            text: greeting.into(),
        });
        self
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// Gateway history for the transcript so far. It must open with a user
    /// turn, so leading assistant messages are skipped.
    pub fn history(&self) -> Vec<ChatTurn> {
        self.messages
            .iter()
            .skip_while(|m| m.author == MessageAuthor::Ai)
            .map(|m| {
                let role = match m.author {
                    MessageAuthor::User => "user",
                    MessageAuthor::Ai => "model",
                };
                ChatTurn::text(role, m.text.clone())
            })
            .collect()
    }

    /// Sends `message` and appends both it and the reply to the transcript.
    pub async fn send(&mut self, message: &str) -> &ChatMessage {
        let history = self.history();
        self.messages.push(ChatMessage {
            author: MessageAuthor::User,
            text: message.to_string(),
        });
        let text = self.assistant.reply(&history, message).await;
        self.messages.push(ChatMessage {
            author: MessageAuthor::Ai,
            text,
        });
        &self.messages[self.messages.len() - 1]
    }
}
