use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::capture::step::{RetrieverMetadata, StepMetadata, StepRecord};

/// Message role in an LLM conversation
///
/// Accepts both the OpenAI role names and the `human`/`ai` message types
/// emitted by orchestration frameworks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    #[serde(alias = "human")]
    User,
    #[serde(alias = "ai")]
    Assistant,
    Tool,
    #[serde(alias = "function")]
    Function,
}

/// Message in an LLM conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    #[serde(default = "default_role", alias = "type")]
    pub role: MessageRole,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

fn default_role() -> MessageRole {
    MessageRole::User
}

impl ChatMessage {
    /// Create a user message
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: Some(content.into()),
        }
    }

    /// Create a system message
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: Some(content.into()),
        }
    }

    /// Create an assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: Some(content.into()),
        }
    }

    /// Message content, or an empty string when absent
    pub fn text(&self) -> &str {
        self.content.as_deref().unwrap_or_default()
    }
}

/// Splits a conversation into parallel user and assistant content sequences.
pub(crate) fn split_history(messages: &[ChatMessage]) -> (Vec<String>, Vec<String>) {
    let user = messages
        .iter()
        .filter(|m| m.role == MessageRole::User)
        .map(|m| m.text().to_string())
        .collect();
    let assistant = messages
        .iter()
        .filter(|m| m.role == MessageRole::Assistant)
        .map(|m| m.text().to_string())
        .collect();
    (user, assistant)
}

/// A document source consulted before a model call, reported alongside an
/// OpenAI-style interaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RagSource {
    pub source: String,
    pub input: String,
    pub outputs: Vec<String>,
}

impl RagSource {
    pub fn new(source: impl Into<String>, input: impl Into<String>, outputs: Vec<String>) -> Self {
        Self {
            source: source.into(),
            input: input.into(),
            outputs,
        }
    }

    /// Convert into a completed retriever step
    pub fn to_step(&self) -> StepRecord {
        let mut step = StepRecord::new(
            self.source.clone(),
            StepMetadata::Retriever(RetrieverMetadata {
                source_class: None,
                source_name: Some(self.source.clone()),
                source_tags: Vec::new(),
            }),
        );
        step.query = Some(self.input.clone());
        step.response = Some(self.outputs.clone());
        step
    }
}

/// Kind of end-user feedback action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackActionName {
    ThumbsUp,
    ThumbsDown,
    CopyInput,
    CopyOutput,
    Paste,
    Comment,
    Regenerate,
    Edit,
    Rating,
}

/// A feedback action performed by an end user on an interaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackAction {
    pub slug: FeedbackActionName,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl FeedbackAction {
    pub fn new(slug: FeedbackActionName) -> Self {
        Self { slug, text: None }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }
}

/// Context attached to a feedback action
///
/// `timestamp` defaults to the send time and `anonymize` to `true` when left
/// unset.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeedbackActionMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    pub end_user: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub anonymize: Option<bool>,
}

impl FeedbackActionMetadata {
    pub fn for_user(end_user: impl Into<String>) -> Self {
        Self {
            end_user: end_user.into(),
            ..Default::default()
        }
    }
}
