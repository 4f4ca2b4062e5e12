//! Client for the Nebuly collection endpoints.
//!
//! [`NebulyClient`] sends captured interactions, hand-built traces, and end
//! user feedback. Sending without an API key fails locally without touching
//! the network.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::{error, info};

use crate::capture::assembler::InteractionAssembler;
use crate::capture::step::{ModelMetadata, StepMetadata, StepRecord};
use crate::config::NebulyConfig;
use crate::error::{NebulyError, Result};
use crate::models::{
    ChatMessage, FeedbackAction, FeedbackActionMetadata, MessageRole, RagSource,
};
use crate::payload::{FeedbackPayload, InteractionPayload};
use crate::transport::{HttpTransport, Transport};

/// Entry point for sending data to Nebuly
pub struct NebulyClient {
    config: NebulyConfig,
    transport: Arc<dyn Transport>,
}

impl NebulyClient {
    /// Create a client with the given API key and default endpoints
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Self::with_config(NebulyConfig {
            api_key: Some(api_key.into()),
            ..Default::default()
        })
    }

    /// Create a client configured from `NEBULY_API_KEY` and `NEBULY_API_URL`
    pub fn from_env() -> Result<Self> {
        Self::with_config(NebulyConfig::default())
    }

    /// Create a client with custom configuration
    pub fn with_config(config: NebulyConfig) -> Result<Self> {
        let transport = HttpTransport::new(config.timeout)?;
        Ok(Self::with_transport(config, Arc::new(transport)))
    }

    /// Create a client delivering through a custom transport
    pub fn with_transport(config: NebulyConfig, transport: Arc<dyn Transport>) -> Self {
        Self { config, transport }
    }

    pub fn config(&self) -> &NebulyConfig {
        &self.config
    }

    /// Send an assembled interaction payload
    pub async fn send_interaction(&self, payload: &InteractionPayload) -> Result<Value> {
        info!(
            end_user = %payload.interaction.end_user,
            traces = payload.traces.len(),
            "Sending interaction"
        );
        let body = serde_json::to_value(payload)?;
        self.post(&self.config.interaction_url(), &body).await
    }

    /// Assemble an interaction from explicit parts and send it
    pub async fn send_interaction_with_trace(
        &self,
        interaction: InteractionAssembler,
    ) -> Result<Value> {
        let payload = interaction.assemble();
        self.send_interaction(&payload).await
    }

    /// Send a chat completion made outside of any orchestration framework
    pub async fn send_openai_interaction(&self, interaction: OpenAiInteraction) -> Result<Value> {
        self.send_interaction_with_trace(interaction.into_assembler()).await
    }

    /// Send an end-user feedback action
    ///
    /// Unset metadata defaults to the current time and an anonymized record.
    pub async fn send_feedback_action(
        &self,
        action: FeedbackAction,
        metadata: FeedbackActionMetadata,
    ) -> Result<Value> {
        let metadata = FeedbackActionMetadata {
            timestamp: metadata.timestamp.or_else(|| Some(Utc::now())),
            anonymize: metadata.anonymize.or(Some(true)),
            ..metadata
        };
        info!(action = ?action.slug, end_user = %metadata.end_user, "Sending feedback action");

        let body = serde_json::to_value(FeedbackPayload { action, metadata })?;
        self.post(&self.config.feedback_url(), &body).await
    }

    async fn post(&self, url: &str, body: &Value) -> Result<Value> {
        let Some(api_key) = self.config.api_key.as_deref().filter(|k| !k.is_empty()) else {
            error!("No API key provided, not sending");
            return Err(NebulyError::MissingApiKey);
        };

        match self.transport.post(url, body, api_key).await {
            Ok(response) => {
                info!("Payload accepted");
                Ok(response)
            }
            Err(e) => {
                error!(error = %e, "Failed to send payload");
                Err(e)
            }
        }
    }
}

/// A chat completion to report as a single-step interaction
#[derive(Debug, Clone)]
pub struct OpenAiInteraction {
    pub messages: Vec<ChatMessage>,
    pub model_output: String,
    pub model: String,
    pub time_start: DateTime<Utc>,
    pub time_end: DateTime<Utc>,
    pub end_user: String,
    pub input: Option<String>,
    pub system_prompt: Option<String>,
    pub rag_sources: Vec<RagSource>,
    pub tags: Option<BTreeMap<String, String>>,
    pub anonymize: bool,
}

impl OpenAiInteraction {
    pub fn new(
        messages: Vec<ChatMessage>,
        model_output: impl Into<String>,
        model: impl Into<String>,
        time_start: DateTime<Utc>,
        time_end: DateTime<Utc>,
        end_user: impl Into<String>,
    ) -> Self {
        Self {
            messages,
            model_output: model_output.into(),
            model: model.into(),
            time_start,
            time_end,
            end_user: end_user.into(),
            input: None,
            system_prompt: None,
            rag_sources: Vec::new(),
            tags: None,
            anonymize: false,
        }
    }

    /// Override the user input; defaults to the last message
    pub fn with_input(mut self, input: impl Into<String>) -> Self {
        self.input = Some(input.into());
        self
    }

    /// Override the system prompt; defaults to the first system message
    pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(system_prompt.into());
        self
    }

    pub fn with_rag_sources(mut self, rag_sources: Vec<RagSource>) -> Self {
        self.rag_sources = rag_sources;
        self
    }

    pub fn with_tags(mut self, tags: BTreeMap<String, String>) -> Self {
        self.tags = Some(tags);
        self
    }

    pub fn with_anonymize(mut self, anonymize: bool) -> Self {
        self.anonymize = anonymize;
        self
    }

    /// Build the interaction: retrieval steps first, then one model step.
    pub fn into_assembler(self) -> InteractionAssembler {
        let user_input = self
            .input
            .or_else(|| self.messages.last().map(|m| m.text().to_string()))
            .unwrap_or_default();
        let system_prompt = self.system_prompt.or_else(|| {
            self.messages
                .iter()
                .find(|m| m.role == MessageRole::System)
                .map(|m| m.text().to_string())
        });

        let prior = &self.messages[..self.messages.len().saturating_sub(1)];
        let user_history: Vec<String> = prior
            .iter()
            .filter(|m| m.role == MessageRole::User)
            .map(|m| m.text().to_string())
            .collect();
        let assistant_all: Vec<String> = self
            .messages
            .iter()
            .filter(|m| m.role == MessageRole::Assistant)
            .map(|m| m.text().to_string())
            .collect();
        let skip = assistant_all.len().saturating_sub(user_history.len());
        let assistant_history = assistant_all[skip..].to_vec();

        let mut model_step = StepRecord::new(
            "model",
            StepMetadata::Model(ModelMetadata {
                model: self.model,
                system_prompt,
                ..Default::default()
            }),
        );
        model_step.query = Some(user_input.clone());
        model_step.response = Some(vec![self.model_output.clone()]);
        model_step.started_at = Some(self.time_start);
        model_step.ended_at = Some(self.time_end);

        let mut steps: Vec<StepRecord> = self.rag_sources.iter().map(RagSource::to_step).collect();
        steps.push(model_step);

        InteractionAssembler {
            input: user_input,
            output: self.model_output,
            time_start: Some(self.time_start),
            time_end: Some(self.time_end),
            user_history,
            assistant_history,
            end_user: self.end_user,
            tags: self.tags,
            anonymize: self.anonymize,
            steps,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::step::StepKind;
    use crate::models::FeedbackActionName;
    use crate::payload::TraceEntry;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;

    /// Records every post instead of sending it
    #[derive(Default)]
    struct RecordingTransport {
        posts: Mutex<Vec<(String, Value, String)>>,
    }

    #[async_trait]
    impl Transport for RecordingTransport {
        async fn post(&self, url: &str, body: &Value, api_key: &str) -> Result<Value> {
            self.posts
                .lock()
                .unwrap()
                .push((url.to_string(), body.clone(), api_key.to_string()));
            Ok(json!({"status": "ok"}))
        }
    }

    fn config(api_key: Option<&str>, base_url: &str) -> NebulyConfig {
        NebulyConfig {
            api_key: api_key.map(String::from),
            base_url: base_url.to_string(),
            timeout: None,
        }
    }

    fn conversation() -> Vec<ChatMessage> {
        vec![
            ChatMessage::system("You are helpful."),
            ChatMessage::user("Hi"),
            ChatMessage::assistant("Hello!"),
            ChatMessage::user("What is Rust?"),
        ]
    }

    #[test]
    fn test_openai_interaction_builds_model_step() {
        let now = Utc::now();
        let payload =
            OpenAiInteraction::new(conversation(), "A language", "gpt-4o", now, now, "user-1")
                .into_assembler()
                .assemble();

        assert_eq!(payload.interaction.input, "What is Rust?");
        assert_eq!(payload.interaction.output, "A language");
        assert_eq!(payload.interaction.history, vec![("Hi".to_string(), "Hello!".to_string())]);
        assert_eq!(payload.traces.len(), 1);

        match &payload.traces[0] {
            TraceEntry::Model(entry) => {
                assert_eq!(entry.model, "gpt-4o");
                assert_eq!(entry.system_prompt.as_deref(), Some("You are helpful."));
                assert_eq!(entry.input, "What is Rust?");
                assert_eq!(entry.time_start, Some(now));
                assert!(entry.history.is_empty());
            }
            _ => panic!("Expected model entry"),
        }
    }

    #[test]
    fn test_openai_interaction_overrides() {
        let now = Utc::now();
        let assembler =
            OpenAiInteraction::new(conversation(), "A language", "gpt-4o", now, now, "user-1")
                .with_input("custom input")
                .with_system_prompt("custom prompt")
                .into_assembler();

        assert_eq!(assembler.input, "custom input");
        match &assembler.steps[0].metadata {
            StepMetadata::Model(m) => assert_eq!(m.system_prompt.as_deref(), Some("custom prompt")),
            _ => panic!("Expected model metadata"),
        }
    }

    #[test]
    fn test_openai_interaction_rag_sources_first() {
        let now = Utc::now();
        let assembler = OpenAiInteraction::new(
            vec![ChatMessage::user("Hello")],
            "Hi, how can I help?",
            "gpt-4o",
            now,
            now,
            "user-1",
        )
        .with_rag_sources(vec![RagSource::new(
            "docs_retriever",
            "Hello",
            vec!["greeting doc".to_string()],
        )])
        .into_assembler();

        let kinds: Vec<_> = assembler.steps.iter().map(StepRecord::kind).collect();
        assert_eq!(kinds, vec![StepKind::Retriever, StepKind::Model]);
        assert!(assembler.user_history.is_empty());
        assert!(assembler.assistant_history.is_empty());
    }

    #[test]
    fn test_openai_interaction_keeps_latest_assistant_turns() {
        let now = Utc::now();
        let messages = vec![
            ChatMessage::assistant("Welcome!"),
            ChatMessage::user("Hi"),
            ChatMessage::assistant("Hello!"),
            ChatMessage::user("Bye"),
        ];

        let assembler =
            OpenAiInteraction::new(messages, "Goodbye", "gpt-4o", now, now, "u").into_assembler();

        assert_eq!(assembler.user_history, vec!["Hi"]);
        assert_eq!(assembler.assistant_history, vec!["Hello!"]);
    }

    #[test]
    fn test_openai_interaction_without_messages() {
        let now = Utc::now();
        let assembler =
            OpenAiInteraction::new(vec![], "out", "gpt-4o", now, now, "u").into_assembler();

        assert_eq!(assembler.input, "");
        assert_eq!(assembler.steps.len(), 1);
    }

    #[tokio::test]
    async fn test_missing_api_key_aborts_locally() {
        let transport = Arc::new(RecordingTransport::default());
        let client = NebulyClient::with_transport(config(None, "http://unused"), transport.clone());
        let now = Utc::now();

        let result = client
            .send_openai_interaction(OpenAiInteraction::new(
                conversation(),
                "out",
                "gpt-4o",
                now,
                now,
                "u",
            ))
            .await;

        assert!(matches!(result, Err(NebulyError::MissingApiKey)));
        assert!(transport.posts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_empty_api_key_aborts_locally() {
        let transport = Arc::new(RecordingTransport::default());
        let client =
            NebulyClient::with_transport(config(Some(""), "http://unused"), transport.clone());

        let result = client
            .send_feedback_action(
                FeedbackAction::new(FeedbackActionName::ThumbsUp),
                FeedbackActionMetadata::for_user("u"),
            )
            .await;

        assert!(matches!(result, Err(NebulyError::MissingApiKey)));
        assert!(transport.posts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_send_interaction_posts_to_interaction_endpoint() {
        let transport = Arc::new(RecordingTransport::default());
        let client =
            NebulyClient::with_transport(config(Some("key"), "http://host/api"), transport.clone());
        let now = Utc::now();

        let result = client
            .send_openai_interaction(OpenAiInteraction::new(
                conversation(),
                "out",
                "gpt-4o",
                now,
                now,
                "u",
            ))
            .await;

        assert!(result.is_ok());
        let posts = transport.posts.lock().unwrap();
        assert_eq!(posts.len(), 1);
        let (url, body, key) = &posts[0];
        assert_eq!(url, "http://host/api/v2/events/trace_interaction");
        assert_eq!(key, "key");
        assert_eq!(body["interaction"]["end_user"], "u");
        assert_eq!(body["anonymize"], false);
    }

    #[tokio::test]
    async fn test_feedback_defaults() {
        let transport = Arc::new(RecordingTransport::default());
        let client =
            NebulyClient::with_transport(config(Some("key"), "http://host/api"), transport.clone());

        client
            .send_feedback_action(
                FeedbackAction::new(FeedbackActionName::ThumbsUp),
                FeedbackActionMetadata::for_user("user-1"),
            )
            .await
            .unwrap();

        let posts = transport.posts.lock().unwrap();
        let (url, body, _) = &posts[0];
        assert_eq!(url, "http://host/api/v1/events/feedback");
        assert_eq!(body["action"]["slug"], "thumbs_up");
        assert_eq!(body["metadata"]["end_user"], "user-1");
        assert_eq!(body["metadata"]["anonymize"], true);
        assert!(body["metadata"]["timestamp"].is_string());
    }

    #[tokio::test]
    async fn test_feedback_keeps_explicit_metadata() {
        let transport = Arc::new(RecordingTransport::default());
        let client =
            NebulyClient::with_transport(config(Some("key"), "http://host/api"), transport.clone());

        let metadata = FeedbackActionMetadata {
            input: Some("q".to_string()),
            output: Some("a".to_string()),
            anonymize: Some(false),
            ..FeedbackActionMetadata::for_user("user-1")
        };
        client
            .send_feedback_action(
                FeedbackAction::new(FeedbackActionName::Comment).with_text("nice"),
                metadata,
            )
            .await
            .unwrap();

        let posts = transport.posts.lock().unwrap();
        let body = &posts[0].1;
        assert_eq!(body["action"]["text"], "nice");
        assert_eq!(body["metadata"]["input"], "q");
        assert_eq!(body["metadata"]["anonymize"], false);
    }

    #[tokio::test]
    async fn test_send_over_http() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v2/events/trace_interaction")
            .match_header("authorization", "Bearer test-key")
            .with_status(200)
            .with_body(r#"{"id":"abc"}"#)
            .create_async()
            .await;

        let client = NebulyClient::with_config(config(Some("test-key"), &server.url())).unwrap();
        let now = Utc::now();
        let result = client
            .send_openai_interaction(OpenAiInteraction::new(
                conversation(),
                "out",
                "gpt-4o",
                now,
                now,
                "u",
            ))
            .await;

        mock.assert_async().await;
        assert_eq!(result.unwrap(), json!({"id": "abc"}));
    }

    #[tokio::test]
    async fn test_transport_failure_reported() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/events/feedback")
            .with_status(500)
            .with_body("boom")
            .create_async()
            .await;

        let client = NebulyClient::with_config(config(Some("test-key"), &server.url())).unwrap();
        let result = client
            .send_feedback_action(
                FeedbackAction::new(FeedbackActionName::ThumbsDown),
                FeedbackActionMetadata::for_user("u"),
            )
            .await;

        mock.assert_async().await;
        assert!(matches!(result, Err(NebulyError::ApiError { status: 500, .. })));
    }
}
