//! Orchestration framework notification interface
//!
//! [`LifecycleHandler`] is the seam between an orchestration framework and
//! the capture engine. Framework adapters call its methods as chains,
//! models, retrievers and tools start and finish. The payload types below
//! mirror what such frameworks report, deserializable from their JSON form.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::ChatMessage;

/// Values produced by a chain, keyed by output name
pub type ChainValues = serde_json::Map<String, Value>;

/// Serialized description of a framework component
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SerializedComponent {
    /// Class path of the component, most specific segment last
    #[serde(default)]
    pub id: Vec<String>,
}

impl SerializedComponent {
    pub fn new(id: Vec<String>) -> Self {
        Self { id }
    }

    /// Most specific segment of the class path
    pub fn class_name(&self) -> Option<&str> {
        self.id.last().map(String::as_str)
    }
}

/// Invocation parameters reported when a model starts
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InvocationParams {
    #[serde(default, alias = "model_name", alias = "modelName")]
    pub model: Option<String>,
}

/// Extra parameters passed alongside a model start notification
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtraParams {
    #[serde(default)]
    pub invocation_params: Option<InvocationParams>,
}

impl ExtraParams {
    pub fn for_model(model: impl Into<String>) -> Self {
        Self {
            invocation_params: Some(InvocationParams {
                model: Some(model.into()),
            }),
        }
    }

    /// Model name, or `"unknown"` when not reported
    pub fn model_name(&self) -> String {
        self.invocation_params
            .as_ref()
            .and_then(|p| p.model.clone())
            .unwrap_or_else(|| "unknown".to_string())
    }
}

/// One candidate output of a model call
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Generation {
    #[serde(default)]
    pub text: String,
    /// Function call requested instead of text, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_call: Option<Value>,
}

impl Generation {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            function_call: None,
        }
    }

    /// Output text; falls back to the JSON form of a function call when the
    /// text is empty.
    pub fn output_text(&self) -> String {
        match &self.function_call {
            Some(call) if self.text.is_empty() => call.to_string(),
            _ => self.text.clone(),
        }
    }
}

/// Token accounting reported by a model provider
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    #[serde(default, alias = "promptTokens")]
    pub prompt_tokens: Option<u32>,
    #[serde(default, alias = "completionTokens")]
    pub completion_tokens: Option<u32>,
    #[serde(default, alias = "totalTokens")]
    pub total_tokens: Option<u32>,
}

/// Provider-specific output attached to a model result
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LlmOutput {
    #[serde(default, alias = "tokenUsage")]
    pub token_usage: Option<TokenUsage>,
}

/// Result of a model call
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LlmResult {
    /// One batch of generations per prompt
    #[serde(default)]
    pub generations: Vec<Vec<Generation>>,
    #[serde(default, alias = "llmOutput")]
    pub llm_output: Option<LlmOutput>,
}

impl LlmResult {
    /// Last generation of the first batch
    pub fn final_generation(&self) -> Option<&Generation> {
        self.generations.first().and_then(|batch| batch.last())
    }
}

/// A retrieved document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Document {
    #[serde(alias = "pageContent")]
    pub page_content: String,
    #[serde(default)]
    pub metadata: serde_json::Map<String, Value>,
}

impl Document {
    pub fn new(page_content: impl Into<String>) -> Self {
        Self {
            page_content: page_content.into(),
            metadata: serde_json::Map::new(),
        }
    }
}

/// Tool selected by an agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentAction {
    pub tool: String,
    #[serde(alias = "toolInput")]
    pub tool_input: Value,
    #[serde(default)]
    pub log: String,
}

/// Final output of an agent run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentFinish {
    #[serde(default, alias = "returnValues")]
    pub return_values: ChainValues,
    #[serde(default)]
    pub log: String,
}

/// Receiver of orchestration lifecycle notifications
///
/// Every method defaults to doing nothing, so implementors only override
/// the notifications they care about.
#[allow(unused_variables)]
pub trait LifecycleHandler {
    fn handle_chain_start(&mut self, chain: &SerializedComponent) {}

    fn handle_chain_end(&mut self, outputs: &ChainValues) {}

    #[allow(clippy::too_many_arguments)]
    fn handle_llm_start(
        &mut self,
        llm: &SerializedComponent,
        prompts: &[String],
        run_id: &str,
        parent_run_id: Option<&str>,
        extra_params: Option<&ExtraParams>,
        tags: &[String],
        name: Option<&str>,
    ) {
    }

    #[allow(clippy::too_many_arguments)]
    fn handle_chat_model_start(
        &mut self,
        llm: &SerializedComponent,
        messages: &[Vec<ChatMessage>],
        run_id: &str,
        parent_run_id: Option<&str>,
        extra_params: Option<&ExtraParams>,
        tags: &[String],
        name: Option<&str>,
    ) {
    }

    fn handle_llm_end(&mut self, output: &LlmResult, run_id: &str, parent_run_id: Option<&str>) {}

    fn handle_retriever_start(
        &mut self,
        retriever: &SerializedComponent,
        query: &str,
        run_id: &str,
        parent_run_id: Option<&str>,
        tags: &[String],
        name: Option<&str>,
    ) {
    }

    fn handle_retriever_end(
        &mut self,
        documents: &[Document],
        run_id: &str,
        parent_run_id: Option<&str>,
    ) {
    }

    fn handle_agent_action(&mut self, action: &AgentAction) {}

    fn handle_tool_end(&mut self, output: &str) {}

    fn handle_agent_end(&mut self, finish: &AgentFinish) {}

    fn handle_text(&mut self, text: &str) {}
}
