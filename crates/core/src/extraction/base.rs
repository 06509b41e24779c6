//! Base extraction trait and supporting types.

use async_trait::async_trait;
use sas_protocol::ChatMessage;
use std::pin::Pin;
use thiserror::Error;
use tokio_stream::Stream;

/// A single request to the extraction service.
#[derive(Debug, Clone)]
pub struct ExtractionRequest {
    /// Instructions framing the call.
    pub system_prompt: String,

    /// The concrete input for this call.
    pub user_prompt: String,

    /// Prior conversation turns, oldest first.
    pub history: Vec<ChatMessage>,

    /// Working directory for subprocess-backed adapters.
    pub working_dir: String,
}

impl ExtractionRequest {
    /// Create a request with no history.
    ///
    /// Defaults:
    /// - history: empty
    /// - working_dir: current directory
    pub fn new(system_prompt: impl Into<String>, user_prompt: impl Into<String>) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            user_prompt: user_prompt.into(),
            history: Vec::new(),
            working_dir: std::env::current_dir()
                .ok()
                .and_then(|p| p.to_str().map(|s| s.to_string()))
                .unwrap_or_else(|| ".".to_string()),
        }
    }

    /// Attach prior conversation turns.
    pub fn with_history(mut self, history: Vec<ChatMessage>) -> Self {
        self.history = history;
        self
    }

    /// Set the working directory.
    pub fn with_working_dir(mut self, dir: impl Into<String>) -> Self {
        self.working_dir = dir.into();
        self
    }

    /// Render history and the user prompt as one plain-text prompt, for
    /// backends that accept a single prompt string.
    pub fn flattened_prompt(&self) -> String {
        if self.history.is_empty() {
            return self.user_prompt.clone();
        }

        let mut out = String::from("Conversation so far:\n");
        for message in &self.history {
            let who = match message.role {
                sas_protocol::Role::User => "User",
                sas_protocol::Role::Assistant => "Assistant",
            };
            out.push_str(&format!("{who}: {}\n", message.content));
        }
        out.push('\n');
        out.push_str(&self.user_prompt);
        out
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractionEvent {
    Thought(String),
    MessageChunk(String),
    Completed,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExtractionError {
    #[error("Extraction service not available: {0}")]
    NotAvailable(String),
    #[error("API call failed: {0}")]
    ApiError(String),
    #[error("Stream parsing error: {0}")]
    StreamParseError(String),
    #[error("Execution failed: {0}")]
    ExecutionError(String),
    #[error("Extraction service returned no text")]
    EmptyResponse,
    #[error("Structured output violates schema: {message}")]
    SchemaViolation { message: String, raw: String },
}

impl ExtractionError {
    /// Raw upstream payload, when one was received.
    pub fn raw_output(&self) -> Option<&str> {
        match self {
            Self::SchemaViolation { raw, .. } => Some(raw.as_str()),
            _ => None,
        }
    }
}

pub type ExtractionStream =
    Pin<Box<dyn Stream<Item = Result<ExtractionEvent, ExtractionError>> + Send>>;

/// Text-generation capability used by every pipeline stage.
///
/// Adapters only have to produce a stream of events; whole-text and
/// structured completion are layered on top by `ExtractionManager`.
#[async_trait]
pub trait ExtractionService: Send + Sync {
    async fn check_availability(&self) -> bool;
    async fn execute(&self, request: &ExtractionRequest) -> Result<ExtractionStream, ExtractionError>;
}
