//! Capture of multi-step LLM pipelines into interaction traces
//!
//! The capture engine receives lifecycle notifications from an
//! orchestration framework and rebuilds a linear trace of completed steps
//! plus the top-level input, output and history of the interaction.
//!
//! # Architecture
//!
//! - **StepRecord**: one model call, retrieval, or tool invocation
//! - **CorrelationStack**: pending steps keyed by run identifiers, completed LIFO
//! - **TraceBuffer**: completed steps in completion order
//! - **SuspensionGate**: pauses capture while an agent decides on its next action
//! - **CaptureSession**: the [`LifecycleHandler`] tying the pieces together
//! - **InteractionAssembler**: builds the final payload, filling gaps from model steps
//!
//! # Usage Example
//!
//! ```rust
//! use nebuly::capture::{CaptureSession, ModelMetadata, StepMetadata};
//!
//! let mut session = CaptureSession::new("user-123");
//!
//! session.on_run_start(
//!     "run-1",
//!     None,
//!     "what is X?",
//!     StepMetadata::Model(ModelMetadata {
//!         model: "gpt-4o".to_string(),
//!         ..Default::default()
//!     }),
//! );
//! session.on_run_end("run-1", None, vec!["X is a letter".to_string()], None);
//!
//! let payload = session.finish();
//! assert_eq!(payload.interaction.input, "what is X?");
//! assert_eq!(payload.traces.len(), 1);
//! ```

pub mod assembler;
pub mod correlation;
pub mod gate;
pub mod handler;
pub mod session;
pub mod step;
pub mod trace_buffer;

pub use assembler::{pair_history, trace_entry, InteractionAssembler};
pub use correlation::{CorrelationKey, CorrelationStack, TOOL_KEY};
pub use gate::SuspensionGate;
pub use handler::{
    AgentAction, AgentFinish, ChainValues, Document, ExtraParams, Generation, InvocationParams,
    LifecycleHandler, LlmOutput, LlmResult, SerializedComponent, TokenUsage,
};
pub use session::CaptureSession;
pub use step::{
    CompletionMetadata, ModelMetadata, RetrieverMetadata, StepKind, StepMetadata, StepRecord,
    ToolMetadata,
};
pub use trace_buffer::{StepCallback, TraceBuffer};
