//! Wire shapes sent to the collection endpoint

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{FeedbackAction, FeedbackActionMetadata};

/// One prior conversation turn as `(user, assistant)`
pub type HistoryTurn = (String, String);

/// Top-level record of an interaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractionRecord {
    pub input: String,
    pub output: String,
    pub time_start: DateTime<Utc>,
    pub time_end: DateTime<Utc>,
    pub history: Vec<HistoryTurn>,
    pub end_user: String,
    pub tags: BTreeMap<String, String>,
}

/// Trace entry for a model call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelTrace {
    pub model: String,
    pub system_prompt: Option<String>,
    pub history: Vec<HistoryTurn>,
    pub input: String,
    pub output: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_start: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_end: Option<DateTime<Utc>>,
}

/// Trace entry for a retrieval or tool call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceTrace {
    pub source: String,
    pub input: String,
    pub outputs: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_start: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_end: Option<DateTime<Utc>>,
}

/// A single entry of the `traces` list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TraceEntry {
    Model(ModelTrace),
    Source(SourceTrace),
}

/// Body posted to the interaction endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractionPayload {
    pub interaction: InteractionRecord,
    pub traces: Vec<TraceEntry>,
    pub anonymize: bool,
}

/// Body posted to the feedback endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackPayload {
    pub action: FeedbackAction,
    pub metadata: FeedbackActionMetadata,
}
