//! Step records for units of work within an interaction
//!
//! A [`StepRecord`] represents one model call, document retrieval, or tool
//! invocation. Records are created pending when a start notification arrives
//! and become complete once both their query and response are known.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of recorded step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StepKind {
    #[serde(rename = "LLM")]
    Model,
    Retriever,
    Tool,
}

/// Metadata recorded for a model call
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelMetadata {
    pub model: String,
    pub system_prompt: Option<String>,
    /// User turns visible to the model, including the current query
    pub user_history: Vec<String>,
    /// Assistant turns visible to the model
    pub assistant_history: Vec<String>,
    pub input_tokens: Option<u32>,
    pub output_tokens: Option<u32>,
}

/// Metadata recorded for a document retrieval
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RetrieverMetadata {
    pub source_class: Option<String>,
    pub source_name: Option<String>,
    pub source_tags: Vec<String>,
}

impl RetrieverMetadata {
    /// Display name of the source: explicit name first, then class
    pub fn source(&self) -> &str {
        self.source_name
            .as_deref()
            .or(self.source_class.as_deref())
            .unwrap_or("unknown")
    }
}

/// Metadata recorded for a tool invocation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolMetadata {
    pub tool_name: String,
}

/// Kind-specific metadata carried by a step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StepMetadata {
    Model(ModelMetadata),
    Retriever(RetrieverMetadata),
    Tool(ToolMetadata),
}

impl StepMetadata {
    pub fn kind(&self) -> StepKind {
        match self {
            StepMetadata::Model(_) => StepKind::Model,
            StepMetadata::Retriever(_) => StepKind::Retriever,
            StepMetadata::Tool(_) => StepKind::Tool,
        }
    }

    /// Merge completion-time metadata; present values overwrite earlier ones.
    pub fn merge(&mut self, extra: &CompletionMetadata) {
        if let StepMetadata::Model(model) = self {
            if extra.input_tokens.is_some() {
                model.input_tokens = extra.input_tokens;
            }
            if extra.output_tokens.is_some() {
                model.output_tokens = extra.output_tokens;
            }
        }
    }
}

/// Metadata only known when a step completes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompletionMetadata {
    pub input_tokens: Option<u32>,
    pub output_tokens: Option<u32>,
}

/// One pending or completed unit of work
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepRecord {
    pub id: String,
    pub query: Option<String>,
    pub response: Option<Vec<String>>,
    pub metadata: StepMetadata,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl StepRecord {
    pub fn new(id: impl Into<String>, metadata: StepMetadata) -> Self {
        Self {
            id: id.into(),
            query: None,
            response: None,
            metadata,
            started_at: None,
            ended_at: None,
        }
    }

    pub fn kind(&self) -> StepKind {
        self.metadata.kind()
    }

    /// A step is complete once both its query and response are set
    pub fn is_complete(&self) -> bool {
        self.query.is_some() && self.response.is_some()
    }

    /// First response, if any
    pub fn first_response(&self) -> Option<&str> {
        self.response.as_ref().and_then(|r| r.first()).map(String::as_str)
    }

    /// Get a formatted string summary of the step
    pub fn printable_summary(&self) -> String {
        let mut summary = format!("{:?} step (id: {})", self.kind(), self.id);

        match &self.metadata {
            StepMetadata::Model(m) => summary.push_str(&format!("\n   Model: {}", m.model)),
            StepMetadata::Retriever(r) => {
                summary.push_str(&format!("\n   Source: {}", r.source()))
            }
            StepMetadata::Tool(t) => summary.push_str(&format!("\n   Tool: {}", t.tool_name)),
        }

        if let Some(query) = &self.query {
            summary.push_str(&format!("\n   Query: {}", preview(query)));
        }

        if let Some(response) = &self.response {
            let count = response.len();
            let plural = if count != 1 { "s" } else { "" };
            summary.push_str(&format!("\n   Response: {} output{}", count, plural));
        }

        if let (Some(start), Some(end)) = (self.started_at, self.ended_at) {
            let duration = (end - start).num_milliseconds();
            summary.push_str(&format!("\n   Duration: {}ms", duration));
        }

        summary
    }
}

fn preview(text: &str) -> String {
    if text.chars().count() > 100 {
        format!("{}...", text.chars().take(100).collect::<String>())
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model_step() -> StepRecord {
        StepRecord::new(
            "run-1",
            StepMetadata::Model(ModelMetadata {
                model: "gpt-4o".to_string(),
                ..Default::default()
            }),
        )
    }

    #[test]
    fn test_kind_follows_metadata() {
        assert_eq!(model_step().kind(), StepKind::Model);

        let tool = StepRecord::new(
            "t",
            StepMetadata::Tool(ToolMetadata {
                tool_name: "search".to_string(),
            }),
        );
        assert_eq!(tool.kind(), StepKind::Tool);
    }

    #[test]
    fn test_step_kind_wire_names() {
        assert_eq!(serde_json::to_string(&StepKind::Model).unwrap(), "\"LLM\"");
        assert_eq!(serde_json::to_string(&StepKind::Retriever).unwrap(), "\"Retriever\"");
        assert_eq!(serde_json::to_string(&StepKind::Tool).unwrap(), "\"Tool\"");
    }

    #[test]
    fn test_is_complete_requires_query_and_response() {
        let mut step = model_step();
        assert!(!step.is_complete());

        step.query = Some("hi".to_string());
        assert!(!step.is_complete());

        step.response = Some(vec!["hello".to_string()]);
        assert!(step.is_complete());
    }

    #[test]
    fn test_merge_later_values_win() {
        let mut metadata = StepMetadata::Model(ModelMetadata {
            model: "gpt-4o".to_string(),
            input_tokens: Some(1),
            output_tokens: Some(2),
            ..Default::default()
        });

        metadata.merge(&CompletionMetadata {
            input_tokens: Some(10),
            output_tokens: None,
        });

        match metadata {
            StepMetadata::Model(m) => {
                assert_eq!(m.input_tokens, Some(10));
                assert_eq!(m.output_tokens, Some(2));
            }
            _ => panic!("Expected model metadata"),
        }
    }

    #[test]
    fn test_merge_ignored_for_tools() {
        let mut metadata = StepMetadata::Tool(ToolMetadata {
            tool_name: "calc".to_string(),
        });
        let before = metadata.clone();

        metadata.merge(&CompletionMetadata {
            input_tokens: Some(5),
            output_tokens: Some(5),
        });

        assert_eq!(metadata, before);
    }

    #[test]
    fn test_retriever_source_fallback() {
        let mut meta = RetrieverMetadata::default();
        assert_eq!(meta.source(), "unknown");

        meta.source_class = Some("VectorStoreRetriever".to_string());
        assert_eq!(meta.source(), "VectorStoreRetriever");

        meta.source_name = Some("docs".to_string());
        assert_eq!(meta.source(), "docs");
    }

    #[test]
    fn test_first_response() {
        let mut step = model_step();
        assert_eq!(step.first_response(), None);

        step.response = Some(vec![]);
        assert_eq!(step.first_response(), None);

        step.response = Some(vec!["a".to_string(), "b".to_string()]);
        assert_eq!(step.first_response(), Some("a"));
    }

    #[test]
    fn test_printable_summary() {
        let mut step = model_step();
        step.query = Some("what is X?".to_string());
        step.response = Some(vec!["X is a letter".to_string()]);

        let summary = step.printable_summary();
        assert!(summary.contains("Model step"));
        assert!(summary.contains("run-1"));
        assert!(summary.contains("gpt-4o"));
        assert!(summary.contains("what is X?"));
        assert!(summary.contains("1 output"));
    }
}
