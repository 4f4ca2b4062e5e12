//! Capture session turning lifecycle notifications into an interaction
//!
//! A [`CaptureSession`] is created by the caller for one top-level
//! interaction and handed to the orchestration framework as its
//! [`LifecycleHandler`]. Start notifications push pending steps onto the
//! [`CorrelationStack`], end notifications move them into the
//! [`TraceBuffer`] in completion order, and chain notifications fill in the
//! top-level input, output and history. Once the run is over the session is
//! consumed by [`CaptureSession::finish`] or [`CaptureSession::send_data`].

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::{debug, warn};
use uuid::Uuid;

use super::assembler::InteractionAssembler;
use super::correlation::{CorrelationKey, CorrelationStack};
use super::gate::SuspensionGate;
use super::handler::{
    AgentAction, AgentFinish, ChainValues, Document, ExtraParams, LifecycleHandler, LlmResult,
    SerializedComponent,
};
use super::step::{
    CompletionMetadata, ModelMetadata, RetrieverMetadata, StepMetadata, StepRecord, ToolMetadata,
};
use super::trace_buffer::{StepCallback, TraceBuffer};
use crate::client::NebulyClient;
use crate::error::Result;
use crate::models::{split_history, ChatMessage, MessageRole};
use crate::payload::InteractionPayload;

/// Capture state for a single interaction
#[derive(Debug)]
pub struct CaptureSession {
    end_user: String,
    tags: Option<BTreeMap<String, String>>,
    anonymize: bool,
    input: String,
    output: String,
    input_explicit: bool,
    output_explicit: bool,
    user_history: Vec<String>,
    assistant_history: Vec<String>,
    time_start: Option<DateTime<Utc>>,
    time_end: Option<DateTime<Utc>>,
    stack: CorrelationStack,
    trace: TraceBuffer,
    gate: SuspensionGate,
}

impl CaptureSession {
    /// Create a new capture session for an end user
    pub fn new(end_user: impl Into<String>) -> Self {
        Self {
            end_user: end_user.into(),
            tags: None,
            anonymize: false,
            input: String::new(),
            output: String::new(),
            input_explicit: false,
            output_explicit: false,
            user_history: Vec::new(),
            assistant_history: Vec::new(),
            time_start: None,
            time_end: None,
            stack: CorrelationStack::new(),
            trace: TraceBuffer::default(),
            gate: SuspensionGate::new(),
        }
    }

    /// Attach tags to the interaction
    pub fn with_tags(mut self, tags: BTreeMap<String, String>) -> Self {
        self.tags = Some(tags);
        self
    }

    /// Ask the collection endpoint to anonymize the interaction
    pub fn with_anonymize(mut self, anonymize: bool) -> Self {
        self.anonymize = anonymize;
        self
    }

    /// Observe each step as it completes
    pub fn with_step_callback(mut self, callback: StepCallback) -> Self {
        self.trace = TraceBuffer::new(Some(callback));
        self
    }

    /// Set the interaction input; chain outputs will no longer override it
    pub fn set_input(&mut self, input: impl Into<String>) {
        self.input = input.into();
        self.input_explicit = true;
    }

    /// Set the interaction output; chain outputs will no longer override it
    pub fn set_output(&mut self, output: impl Into<String>) {
        self.output = output.into();
        self.output_explicit = true;
    }

    /// Set the prior conversation turns as parallel user/assistant sequences
    pub fn set_history(&mut self, user_history: Vec<String>, assistant_history: Vec<String>) {
        self.user_history = user_history;
        self.assistant_history = assistant_history;
    }

    pub fn end_user(&self) -> &str {
        &self.end_user
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn output(&self) -> &str {
        &self.output
    }

    pub fn user_history(&self) -> &[String] {
        &self.user_history
    }

    pub fn assistant_history(&self) -> &[String] {
        &self.assistant_history
    }

    pub fn time_start(&self) -> Option<DateTime<Utc>> {
        self.time_start
    }

    pub fn time_end(&self) -> Option<DateTime<Utc>> {
        self.time_end
    }

    /// Completed steps, in completion order
    pub fn trace(&self) -> &TraceBuffer {
        &self.trace
    }

    /// Number of started steps still awaiting completion
    pub fn pending_len(&self) -> usize {
        self.stack.len()
    }

    /// Check if capture is paused for an agent decision
    pub fn is_suspended(&self) -> bool {
        self.gate.is_engaged()
    }

    /// Mark the start of the interaction; only the first call has an effect
    pub fn on_chain_start(&mut self) {
        if self.time_start.is_none() {
            self.time_start = Some(Utc::now());
        }
    }

    /// Record a started step under the key derived from its run identifiers
    pub fn on_run_start(
        &mut self,
        run_id: &str,
        parent_run_id: Option<&str>,
        query: impl Into<String>,
        metadata: StepMetadata,
    ) {
        let mut step = StepRecord::new(run_id, metadata);
        step.query = Some(query.into());
        self.push_step(CorrelationKey::derive(run_id, parent_run_id), step);
    }

    /// Complete the most recently started step under the derived key
    pub fn on_run_end(
        &mut self,
        run_id: &str,
        parent_run_id: Option<&str>,
        responses: Vec<String>,
        extra: Option<CompletionMetadata>,
    ) {
        self.complete_step(&CorrelationKey::derive(run_id, parent_run_id), responses, extra);
    }

    /// Record the tool chosen by an agent and suspend capture until it ends
    pub fn on_agent_action(&mut self, tool_name: &str, tool_input: &Value) {
        let mut step = StepRecord::new(
            Uuid::new_v4().to_string(),
            StepMetadata::Tool(ToolMetadata {
                tool_name: tool_name.to_string(),
            }),
        );
        step.query = Some(tool_input.to_string());
        self.push_step(CorrelationKey::tool(), step);
        self.gate.engage();
    }

    /// Resume capture and complete the pending tool step
    pub fn on_tool_end(&mut self, output: &str) {
        self.gate.disengage();
        self.complete_step(&CorrelationKey::tool(), vec![output.to_string()], None);
    }

    /// Record the end of a chain and pick up its input, output and history
    pub fn on_chain_end(&mut self, outputs: &ChainValues) {
        self.time_end = Some(Utc::now());

        if self.gate.is_engaged() {
            debug!("Capture suspended, ignoring chain outputs");
            return;
        }

        let input = outputs.get("input").and_then(value_text);
        let answer = outputs
            .get("answer")
            .and_then(value_text)
            .filter(|s| !s.is_empty())
            .or_else(|| outputs.get("output").and_then(value_text));

        let has_input = outputs.contains_key("input");
        let has_answer = outputs.contains_key("answer") || outputs.contains_key("output");

        if has_input && has_answer {
            self.offer_input_output(input, answer);
        } else if has_answer {
            self.offer_input_output(None, answer);
        } else if has_input && self.input.is_empty() {
            self.offer_input_output(input, None);
        }

        if let Some(history) = outputs.get("chat_history") {
            match serde_json::from_value::<Vec<ChatMessage>>(history.clone()) {
                Ok(messages) => {
                    let (user, assistant) = split_history(&messages);
                    self.user_history = user;
                    self.assistant_history = assistant;
                }
                Err(e) => warn!(error = %e, "Unrecognized chat_history in chain outputs"),
            }
        }
    }

    /// Assemble the final payload, dropping steps that never completed
    pub fn finish(self) -> InteractionPayload {
        if !self.stack.is_empty() {
            debug!(pending = self.stack.len(), "Dropping steps that never completed");
        }

        InteractionAssembler {
            input: self.input,
            output: self.output,
            time_start: self.time_start,
            time_end: self.time_end,
            user_history: self.user_history,
            assistant_history: self.assistant_history,
            end_user: self.end_user,
            tags: self.tags,
            anonymize: self.anonymize,
            steps: self.trace.into_steps(),
        }
        .assemble()
    }

    /// Assemble the interaction and send it through `client`
    pub async fn send_data(self, client: &NebulyClient) -> Result<Value> {
        let payload = self.finish();
        client.send_interaction(&payload).await
    }

    fn offer_input_output(&mut self, input: Option<String>, output: Option<String>) {
        if let Some(input) = input.filter(|s| !s.is_empty()) {
            if !self.input_explicit {
                self.input = input;
            }
        }
        if let Some(output) = output.filter(|s| !s.is_empty()) {
            if !self.output_explicit {
                self.output = output;
            }
        }
    }

    fn push_step(&mut self, key: CorrelationKey, mut step: StepRecord) {
        if self.gate.is_engaged() {
            debug!(key = %key, "Capture suspended, ignoring step start");
            return;
        }
        step.started_at = Some(Utc::now());
        self.stack.push(key, step);
    }

    fn complete_step(
        &mut self,
        key: &CorrelationKey,
        responses: Vec<String>,
        extra: Option<CompletionMetadata>,
    ) {
        if self.gate.is_engaged() {
            debug!(key = %key, "Capture suspended, ignoring step end");
            return;
        }

        let Some(mut step) = self.stack.pop(key) else {
            debug!(key = %key, "No pending step for completion, dropping");
            return;
        };

        if let Some(extra) = extra {
            step.metadata.merge(&extra);
        }
        step.response = Some(responses);
        step.ended_at = Some(Utc::now());
        debug!(id = %step.id, kind = ?step.kind(), "Step completed");
        self.trace.append(step);
    }
}

impl LifecycleHandler for CaptureSession {
    fn handle_chain_start(&mut self, chain: &SerializedComponent) {
        debug!(chain = ?chain.class_name(), "Chain started");
        self.on_chain_start();
    }

    fn handle_chain_end(&mut self, outputs: &ChainValues) {
        self.on_chain_end(outputs);
    }

    fn handle_llm_start(
        &mut self,
        _llm: &SerializedComponent,
        prompts: &[String],
        run_id: &str,
        parent_run_id: Option<&str>,
        extra_params: Option<&ExtraParams>,
        _tags: &[String],
        _name: Option<&str>,
    ) {
        let model = extra_params.map(ExtraParams::model_name).unwrap_or_else(|| "unknown".into());
        let query = prompts.last().cloned().unwrap_or_default();
        self.on_run_start(
            run_id,
            parent_run_id,
            query,
            StepMetadata::Model(ModelMetadata {
                model,
                ..Default::default()
            }),
        );
    }

    fn handle_chat_model_start(
        &mut self,
        _llm: &SerializedComponent,
        messages: &[Vec<ChatMessage>],
        run_id: &str,
        parent_run_id: Option<&str>,
        extra_params: Option<&ExtraParams>,
        _tags: &[String],
        _name: Option<&str>,
    ) {
        let batch = messages.first().map(Vec::as_slice).unwrap_or_default();
        let model = extra_params.map(ExtraParams::model_name).unwrap_or_else(|| "unknown".into());
        let query = batch.last().map(|m| m.text().to_string()).unwrap_or_default();
        let system_prompt = batch
            .iter()
            .find(|m| m.role == MessageRole::System)
            .map(|m| m.text().to_string());
        let (user_history, assistant_history) = split_history(batch);

        self.on_run_start(
            run_id,
            parent_run_id,
            query,
            StepMetadata::Model(ModelMetadata {
                model,
                system_prompt,
                user_history,
                assistant_history,
                input_tokens: None,
                output_tokens: None,
            }),
        );
    }

    fn handle_llm_end(&mut self, output: &LlmResult, run_id: &str, parent_run_id: Option<&str>) {
        let text = output.final_generation().map(|g| g.output_text()).unwrap_or_default();
        let extra = output
            .llm_output
            .as_ref()
            .and_then(|o| o.token_usage)
            .map(|usage| CompletionMetadata {
                input_tokens: usage.prompt_tokens,
                output_tokens: usage.completion_tokens,
            });
        self.on_run_end(run_id, parent_run_id, vec![text], extra);
    }

    fn handle_retriever_start(
        &mut self,
        retriever: &SerializedComponent,
        query: &str,
        run_id: &str,
        parent_run_id: Option<&str>,
        tags: &[String],
        name: Option<&str>,
    ) {
        self.on_run_start(
            run_id,
            parent_run_id,
            query,
            StepMetadata::Retriever(RetrieverMetadata {
                source_class: retriever.class_name().map(String::from),
                source_name: name.map(String::from),
                source_tags: tags.to_vec(),
            }),
        );
    }

    fn handle_retriever_end(
        &mut self,
        documents: &[Document],
        run_id: &str,
        parent_run_id: Option<&str>,
    ) {
        let contents = documents.iter().map(|d| d.page_content.clone()).collect();
        self.on_run_end(run_id, parent_run_id, contents, None);
    }

    fn handle_agent_action(&mut self, action: &AgentAction) {
        debug!(tool = %action.tool, "Agent action");
        self.on_agent_action(&action.tool, &action.tool_input);
    }

    fn handle_tool_end(&mut self, output: &str) {
        self.on_tool_end(output);
    }

    fn handle_agent_end(&mut self, finish: &AgentFinish) {
        debug!(log = %finish.log, "Agent finished");
    }

    fn handle_text(&mut self, text: &str) {
        debug!(text = %text, "Text");
    }
}

/// Text form of a chain output value; null counts as absent
fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}
