//! Capture of an agent run that calls a tool
//!
//! Model calls made while the agent decides on its action are suppressed,
//! so the captured trace holds the outer model calls and the tool call only.
//!
//! # Running the example
//!
//! ```bash
//! cargo run --example agent_capture
//! ```

use nebuly::capture::{
    AgentAction, AgentFinish, CaptureSession, ChainValues, ExtraParams, Generation,
    LifecycleHandler, LlmResult, SerializedComponent,
};
use nebuly::prelude::*;
use serde_json::json;

fn chat_start(session: &mut CaptureSession, run_id: &str, messages: Vec<ChatMessage>) {
    session.handle_chat_model_start(
        &SerializedComponent::default(),
        &[messages],
        run_id,
        Some("agent-1"),
        Some(&ExtraParams::for_model("gpt-3.5-turbo-1106")),
        &[],
        None,
    );
}

fn chat_end(session: &mut CaptureSession, run_id: &str, text: &str) {
    session.handle_llm_end(
        &LlmResult {
            generations: vec![vec![Generation::text(text)]],
            llm_output: None,
        },
        run_id,
        Some("agent-1"),
    );
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt().with_max_level(tracing::Level::INFO).init();

    let history = vec![
        ChatMessage::user("Can LangSmith help test my LLM applications?"),
        ChatMessage::assistant("Yes!"),
    ];
    let mut session = CaptureSession::new("demo-user");

    session.handle_chain_start(&SerializedComponent::new(vec!["AgentExecutor".into()]));

    let mut first_turn = history.clone();
    first_turn.push(ChatMessage::user("Tell me how"));
    chat_start(&mut session, "llm-1", first_turn);
    chat_end(&mut session, "llm-1", "I should search the docs.");

    session.handle_agent_action(&AgentAction {
        tool: "langsmith_search".to_string(),
        tool_input: json!({"query": "LangSmith testing"}),
        log: String::new(),
    });
    // Internal to the tool selection; not recorded
    chat_start(&mut session, "llm-internal", vec![ChatMessage::user("pick a tool")]);
    chat_end(&mut session, "llm-internal", "langsmith_search");
    session.handle_tool_end("LangSmith lets you build datasets and run evaluations.");

    let mut second_turn = history.clone();
    second_turn.push(ChatMessage::user("Tell me how"));
    chat_start(&mut session, "llm-2", second_turn);
    chat_end(&mut session, "llm-2", "Build datasets in LangSmith and run evaluations on them.");

    session.handle_agent_end(&AgentFinish::default());
    let outputs: ChainValues = json!({
        "input": "Tell me how",
        "output": "Build datasets in LangSmith and run evaluations on them.",
        "chat_history": [
            {"type": "human", "content": "Can LangSmith help test my LLM applications?"},
            {"type": "ai", "content": "Yes!"},
        ],
    })
    .as_object()
    .cloned()
    .unwrap_or_default();
    session.handle_chain_end(&outputs);

    let payload = session.finish();
    println!("{}", serde_json::to_string_pretty(&payload)?);

    let client = NebulyClient::from_env()?;
    if let Err(e) = client.send_interaction(&payload).await {
        println!("Not sent: {}", e);
    }

    Ok(())
}
