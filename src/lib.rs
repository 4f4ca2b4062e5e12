//! Interaction trace capture for multi-step LLM pipelines.
//!
//! Lifecycle notifications from an orchestration framework are fed into a
//! [`CaptureSession`], which rebuilds the ordered trace of model calls,
//! retrievals and tool invocations. The finished interaction is sent to the
//! Nebuly collection endpoint with a [`NebulyClient`].

pub mod capture;
pub mod client;
pub mod config;
pub mod error;
pub mod models;
pub mod payload;
pub mod transport;

pub use capture::{CaptureSession, LifecycleHandler};
pub use client::{NebulyClient, OpenAiInteraction};
pub use config::NebulyConfig;
pub use error::{NebulyError, Result};

/// Prelude module for common imports
pub mod prelude {
    pub use crate::capture::{
        CaptureSession, InteractionAssembler, LifecycleHandler, StepKind, StepMetadata,
        StepRecord,
    };
    pub use crate::client::{NebulyClient, OpenAiInteraction};
    pub use crate::config::NebulyConfig;
    pub use crate::error::{NebulyError, Result};
    pub use crate::models::{
        ChatMessage, FeedbackAction, FeedbackActionMetadata, FeedbackActionName, MessageRole,
        RagSource,
    };
}
