//! Capture of a retrieval chain answering a single question
//!
//! Simulates the notifications an orchestration framework emits for a
//! retrieval-augmented chain, then sends the captured interaction.
//!
//! # Running the example
//!
//! ```bash
//! NEBULY_API_KEY=... cargo run --example chat_capture
//! ```

use nebuly::capture::{
    CaptureSession, ChainValues, Document, ExtraParams, Generation, LifecycleHandler, LlmResult,
    SerializedComponent,
};
use nebuly::prelude::*;
use serde_json::json;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("nebuly=debug")),
        )
        .init();

    let mut session = CaptureSession::new("demo-user");
    let chain = SerializedComponent::new(vec!["langchain".into(), "RetrievalChain".into()]);
    let retriever = SerializedComponent::new(vec!["langchain".into(), "VectorStoreRetriever".into()]);

    session.handle_chain_start(&chain);
    session.handle_retriever_start(&retriever, "what is LangSmith?", "ret-1", Some("chain-1"), &[], None);
    session.handle_retriever_end(
        &[
            Document::new("LangSmith is a platform for building production-grade LLM applications."),
            Document::new("It lets you debug, test, and monitor chains."),
        ],
        "ret-1",
        Some("chain-1"),
    );
    session.handle_chat_model_start(
        &SerializedComponent::default(),
        &[vec![
            ChatMessage::system("Answer based only on the provided context."),
            ChatMessage::user("what is LangSmith?"),
        ]],
        "llm-1",
        Some("chain-1"),
        Some(&ExtraParams::for_model("gpt-3.5-turbo")),
        &[],
        None,
    );
    session.handle_llm_end(
        &LlmResult {
            generations: vec![vec![Generation::text("LangSmith is a platform for LLM apps.")]],
            llm_output: None,
        },
        "llm-1",
        Some("chain-1"),
    );

    let outputs: ChainValues = json!({
        "input": "what is LangSmith?",
        "answer": "LangSmith is a platform for LLM apps.",
    })
    .as_object()
    .cloned()
    .unwrap_or_default();
    session.handle_chain_end(&outputs);

    println!("Captured {} steps:", session.trace().len());
    for summary in session.trace().summaries() {
        println!("{}", summary);
    }

    let client = NebulyClient::from_env()?;
    match session.send_data(&client).await {
        Ok(response) => println!("\nSent: {}", response),
        Err(e) => println!("\nNot sent: {}", e),
    }

    Ok(())
}
