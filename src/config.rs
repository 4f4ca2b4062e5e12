use std::time::Duration;

/// Default base URL of the collection endpoints
pub const DEFAULT_BASE_URL: &str = "https://backend.nebuly.com/event-ingestion/api";

/// Path of the interaction endpoint, relative to the base URL
pub const INTERACTION_PATH: &str = "/v2/events/trace_interaction";

/// Path of the feedback endpoint, relative to the base URL
pub const FEEDBACK_PATH: &str = "/v1/events/feedback";

/// Configuration for connecting to the collection endpoints.
#[derive(Debug, Clone)]
pub struct NebulyConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub timeout: Option<Duration>,
}

impl Default for NebulyConfig {
    fn default() -> Self {
        Self {
            api_key: std::env::var("NEBULY_API_KEY").ok().filter(|k| !k.is_empty()),
            base_url: std::env::var("NEBULY_API_URL")
                .unwrap_or_else(|_| DEFAULT_BASE_URL.to_string()),
            timeout: None,
        }
    }
}

impl NebulyConfig {
    pub fn interaction_url(&self) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), INTERACTION_PATH)
    }

    pub fn feedback_url(&self) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), FEEDBACK_PATH)
    }
}
