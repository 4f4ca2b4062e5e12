//! Interaction assembly
//!
//! Merges completed steps with the top-level input, output and history into
//! the payload posted to the collection endpoint.
//!
//! # Fallback heuristic
//!
//! When a single model call runs outside of a chain, the orchestration
//! framework never reports a top-level input or output. In that case the
//! assembler scans the completed model steps, in trace order:
//!
//! - both empty: the first model step's query becomes the input and the last
//!   model step's first response becomes the output;
//! - only the input empty: the first step whose first response equals the
//!   output supplies the input;
//! - only the output empty: the first step whose query equals the input
//!   supplies the output.
//!
//! A step that supplies the input also supplies its conversation history,
//! when it recorded one.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use tracing::debug;

use super::step::{ModelMetadata, StepMetadata, StepRecord};
use crate::payload::{
    HistoryTurn, InteractionPayload, InteractionRecord, ModelTrace, SourceTrace, TraceEntry,
};

/// Everything known about an interaction once capture has ended
#[derive(Debug, Clone, Default)]
pub struct InteractionAssembler {
    pub input: String,
    pub output: String,
    pub time_start: Option<DateTime<Utc>>,
    pub time_end: Option<DateTime<Utc>>,
    pub user_history: Vec<String>,
    pub assistant_history: Vec<String>,
    pub end_user: String,
    pub tags: Option<BTreeMap<String, String>>,
    pub anonymize: bool,
    pub steps: Vec<StepRecord>,
}

impl InteractionAssembler {
    /// Build the final payload. Never fails; missing values take defaults.
    pub fn assemble(mut self) -> InteractionPayload {
        self.reconcile();

        let now = Utc::now();
        let traces = self
            .steps
            .iter()
            .filter(|step| {
                let complete = step.is_complete();
                if !complete {
                    debug!(id = %step.id, "Skipping incomplete step");
                }
                complete
            })
            .map(trace_entry)
            .collect();

        InteractionPayload {
            interaction: InteractionRecord {
                input: self.input,
                output: self.output,
                time_start: self.time_start.unwrap_or(now),
                time_end: self.time_end.unwrap_or(now),
                history: pair_history(&self.user_history, &self.assistant_history),
                end_user: self.end_user,
                tags: self.tags.unwrap_or_default(),
            },
            traces,
            anonymize: self.anonymize,
        }
    }

    /// Fill an empty input or output from the recorded model steps
    fn reconcile(&mut self) {
        if !self.input.is_empty() && !self.output.is_empty() {
            return;
        }

        let models: Vec<(&StepRecord, &ModelMetadata)> = self
            .steps
            .iter()
            .filter(|step| step.is_complete())
            .filter_map(|step| match &step.metadata {
                StepMetadata::Model(meta) => Some((step, meta)),
                _ => None,
            })
            .collect();

        let (Some(&(first, first_meta)), Some(&(last, _))) = (models.first(), models.last())
        else {
            return;
        };

        let mut input = None;
        let mut output = None;
        let mut history_source = None;

        if self.input.is_empty() && self.output.is_empty() {
            input = first.query.clone();
            output = Some(last.first_response().unwrap_or_default().to_string());
            history_source = Some(first_meta);
        } else if self.input.is_empty() {
            if let Some(&(step, meta)) =
                models.iter().find(|(step, _)| step.first_response() == Some(self.output.as_str()))
            {
                input = step.query.clone();
                history_source = Some(meta);
            }
        } else if let Some(&(step, _)) =
            models.iter().find(|(step, _)| step.query.as_deref() == Some(self.input.as_str()))
        {
            output = Some(step.first_response().unwrap_or_default().to_string());
        }

        let history = history_source
            .filter(|meta| !pair_history(&meta.user_history, &meta.assistant_history).is_empty())
            .map(|meta| (meta.user_history.clone(), meta.assistant_history.clone()));

        if let Some(input) = input {
            debug!("Adopting interaction input from model step");
            self.input = input;
        }
        if let Some(output) = output {
            debug!("Adopting interaction output from model step");
            self.output = output;
        }
        if let Some((user, assistant)) = history {
            self.user_history = user;
            self.assistant_history = assistant;
        }
    }
}

/// Pair user and assistant turns, truncated to the shorter sequence
pub fn pair_history(user_history: &[String], assistant_history: &[String]) -> Vec<HistoryTurn> {
    user_history
        .iter()
        .zip(assistant_history)
        .map(|(user, assistant)| (user.clone(), assistant.clone()))
        .collect()
}

/// Convert a completed step into its wire entry
pub fn trace_entry(step: &StepRecord) -> TraceEntry {
    let input = step.query.clone().unwrap_or_default();

    match &step.metadata {
        StepMetadata::Model(meta) => TraceEntry::Model(ModelTrace {
            model: meta.model.clone(),
            system_prompt: meta.system_prompt.clone(),
            history: pair_history(&meta.user_history, &meta.assistant_history),
            input,
            output: step.first_response().unwrap_or_default().to_string(),
            input_tokens: meta.input_tokens,
            output_tokens: meta.output_tokens,
            time_start: step.started_at,
            time_end: step.ended_at,
        }),
        StepMetadata::Retriever(meta) => TraceEntry::Source(SourceTrace {
            source: meta.source().to_string(),
            input,
            outputs: step.response.clone().unwrap_or_default(),
            time_start: step.started_at,
            time_end: step.ended_at,
        }),
        StepMetadata::Tool(meta) => TraceEntry::Source(SourceTrace {
            source: meta.tool_name.clone(),
            input,
            outputs: step.response.clone().unwrap_or_default(),
            time_start: step.started_at,
            time_end: step.ended_at,
        }),
    }
}
