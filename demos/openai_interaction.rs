//! Reporting a chat completion made without an orchestration framework
//!
//! # Running the example
//!
//! ```bash
//! NEBULY_API_KEY=... cargo run --example openai_interaction
//! ```

use chrono::Utc;
use nebuly::prelude::*;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt::init();

    let client = NebulyClient::from_env()?;
    let started = Utc::now();

    let messages = vec![ChatMessage::user("Hello")];
    let response = "Hello, how can I help you today?";
    let ended = Utc::now();

    let interaction = OpenAiInteraction::new(messages, response, "gpt-4o", started, ended, "user1")
        .with_rag_sources(vec![RagSource::new(
            "docs_retriever",
            "Hello",
            vec![response.to_string()],
        )]);

    let result = client.send_openai_interaction(interaction).await?;
    println!("Interaction sent: {}", result);

    let feedback = client
        .send_feedback_action(
            FeedbackAction::new(FeedbackActionName::ThumbsUp),
            FeedbackActionMetadata {
                input: Some("Hello".to_string()),
                output: Some(response.to_string()),
                ..FeedbackActionMetadata::for_user("user1")
            },
        )
        .await?;
    println!("Feedback sent: {}", feedback);

    Ok(())
}
