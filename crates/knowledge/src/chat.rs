//! Conversations and chat sessions over a query engine.
//!
//! A [`Conversation`] is owned by the caller. The engine reads it to condense
//! follow-up questions and appends each completed exchange. Messages are only
//! dropped by an explicit [`WindowPolicy`].

use crate::query::{QueryEngine, QueryStream};
use crate::types::QueryResult;
use async_trait::async_trait;
use docsage_core::AppResult;
use docsage_llm::{CompletionOptions, LlmClient, LlmRequest};
use docsage_prompt::PromptTemplate;
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User => f.write_str("user"),
            Self::Assistant => f.write_str("assistant"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// How much history a conversation retains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WindowPolicy {
    #[default]
    Unbounded,
    /// Keep at most this many of the most recent messages
    LastMessages(usize),
    /// Drop oldest messages until the total content length fits; the newest
    /// message is always kept
    MaxChars(usize),
}

#[derive(Debug, Clone, Default)]
pub struct Conversation {
    messages: Vec<ChatMessage>,
    window: WindowPolicy,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_window(mut self, window: WindowPolicy) -> Self {
        self.window = window;
        self.apply_window();
        self
    }

    /// Start from a preset history, e.g. to prime the assistant with context.
    pub fn with_history(mut self, messages: Vec<ChatMessage>) -> Self {
        self.messages = messages;
        self.apply_window();
        self
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn push(&mut self, message: ChatMessage) {
        self.messages.push(message);
        self.apply_window();
    }

    pub fn record_exchange(&mut self, question: impl Into<String>, answer: impl Into<String>) {
        self.messages.push(ChatMessage::user(question));
        self.messages.push(ChatMessage::assistant(answer));
        self.apply_window();
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }

    /// One `role: content` line per message.
    pub fn format_history(&self) -> String {
        self.messages
            .iter()
            .map(|m| format!("{}: {}", m.role, m.content))
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn apply_window(&mut self) {
        let excess = match self.window {
            WindowPolicy::Unbounded => 0,
            WindowPolicy::LastMessages(n) => self.messages.len().saturating_sub(n),
            WindowPolicy::MaxChars(limit) => {
                let mut total: usize = self.messages.iter().map(|m| m.content.len()).sum();
                let mut drop = 0;
                while total > limit && drop + 1 < self.messages.len() {
                    total -= self.messages[drop].content.len();
                    drop += 1;
                }
                drop
            }
        };

        if excess > 0 {
            tracing::debug!(dropped = excess, window = ?self.window, "Trimming conversation");
            self.messages.drain(..excess);
        }
    }
}

/// Rewrites a follow-up question into a standalone one using the history.
#[async_trait]
pub trait QuestionCondenser: Send + Sync {
    async fn condense(&self, history: &Conversation, question: &str) -> AppResult<String>;
}

/// Condenses through the completion capability and the `chat.condense` template.
pub struct LlmCondenser {
    client: Arc<dyn LlmClient>,
    model: String,
    options: CompletionOptions,
    template: PromptTemplate,
}

impl LlmCondenser {
    pub fn new(
        client: Arc<dyn LlmClient>,
        model: impl Into<String>,
        options: CompletionOptions,
        template: PromptTemplate,
    ) -> Self {
        Self {
            client,
            model: model.into(),
            options,
            template,
        }
    }
}

#[async_trait]
impl QuestionCondenser for LlmCondenser {
    async fn condense(&self, history: &Conversation, question: &str) -> AppResult<String> {
        if history.is_empty() {
            return Ok(question.to_string());
        }

        let history_text = history.format_history();
        let prompt = self
            .template
            .render(&[("chat_history", history_text.as_str()), ("question", question)])?;

        // The condensed question is not shown to the user; no system persona.
        let options = CompletionOptions {
            system_instruction: None,
            ..self.options.clone()
        };
        let request = LlmRequest::new(prompt, &self.model).with_options(&options);
        let response = self.client.complete(&request).await?;

        let condensed = response.content.trim();
        if condensed.is_empty() {
            tracing::warn!("Condenser returned an empty question, using the original");
            return Ok(question.to_string());
        }

        tracing::debug!(original = question, condensed, "Condensed question");
        Ok(condensed.to_string())
    }
}

/// A conversation bound to one query engine.
pub struct ChatSession {
    engine: Arc<QueryEngine>,
    conversation: Conversation,
    top_k: usize,
}

impl ChatSession {
    pub fn new(engine: Arc<QueryEngine>, top_k: usize) -> Self {
        Self {
            engine,
            conversation: Conversation::new(),
            top_k,
        }
    }

    pub fn with_conversation(mut self, conversation: Conversation) -> Self {
        self.conversation = conversation;
        self
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn reset(&mut self) {
        self.conversation.clear();
    }

    pub async fn chat(&mut self, message: &str) -> AppResult<QueryResult> {
        self.engine
            .query(message, self.top_k, Some(&mut self.conversation))
            .await
    }

    /// Stream the answer. The exchange is recorded once the stream finishes;
    /// a stream dropped early or ending in an error records nothing.
    pub async fn stream_chat(&mut self, message: &str) -> AppResult<ChatStream<'_>> {
        let inner = self
            .engine
            .query_stream(message, self.top_k, Some(&self.conversation))
            .await?;

        Ok(ChatStream {
            inner,
            conversation: &mut self.conversation,
            question: message.to_string(),
            answer: String::new(),
            finished: false,
        })
    }
}

pub struct ChatStream<'a> {
    inner: QueryStream,
    conversation: &'a mut Conversation,
    question: String,
    answer: String,
    finished: bool,
}

impl ChatStream<'_> {
    pub fn query_stream(&self) -> &QueryStream {
        &self.inner
    }
}

impl Stream for ChatStream<'_> {
    type Item = AppResult<String>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = &mut *self;
        if this.finished {
            return Poll::Ready(None);
        }

        match this.inner.poll_next_unpin(cx) {
            Poll::Ready(Some(Ok(text))) => {
                this.answer.push_str(&text);
                Poll::Ready(Some(Ok(text)))
            }
            Poll::Ready(Some(Err(e))) => {
                this.finished = true;
                Poll::Ready(Some(Err(e)))
            }
            Poll::Ready(None) => {
                this.finished = true;
                let answer = std::mem::take(&mut this.answer);
                let question = std::mem::take(&mut this.question);
                this.conversation.record_exchange(question, answer);
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_and_format() {
        let mut conversation = Conversation::new();
        conversation.record_exchange("What did the author do growing up?", "He wrote short stories.");
        assert_eq!(conversation.len(), 2);
        assert_eq!(
            conversation.format_history(),
            "user: What did the author do growing up?\nassistant: He wrote short stories."
        );
    }

    #[test]
    fn test_last_messages_window() {
        let mut conversation = Conversation::new().with_window(WindowPolicy::LastMessages(3));
        conversation.record_exchange("q1", "a1");
        conversation.record_exchange("q2", "a2");
        let contents: Vec<&str> = conversation.messages().iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["a1", "q2", "a2"]);
    }

    #[test]
    fn test_max_chars_window_keeps_newest() {
        let mut conversation = Conversation::new().with_window(WindowPolicy::MaxChars(5));
        conversation.push(ChatMessage::user("abc"));
        conversation.push(ChatMessage::assistant("defgh"));
        assert_eq!(conversation.len(), 1);
        assert_eq!(conversation.messages()[0].content, "defgh");

        conversation.push(ChatMessage::user("a much longer message"));
        assert_eq!(conversation.len(), 1);
    }

    #[test]
    fn test_unbounded_never_drops() {
        let mut conversation = Conversation::new();
        for i in 0..50 {
            conversation.record_exchange(format!("q{}", i), format!("a{}", i));
        }
        assert_eq!(conversation.len(), 100);
    }

    #[test]
    fn test_preset_history() {
        let conversation = Conversation::new().with_history(vec![
            ChatMessage::user("Hello assistant, we are having an insightful discussion about Paul Graham today."),
            ChatMessage::assistant("Okay, sounds good."),
        ]);
        assert_eq!(conversation.messages()[1].role, Role::Assistant);
    }

    #[test]
    fn test_role_serialization() {
        let json = serde_json::to_string(&ChatMessage::user("hi")).unwrap();
        assert_eq!(json, r#"{"role":"user","content":"hi"}"#);
    }
}
