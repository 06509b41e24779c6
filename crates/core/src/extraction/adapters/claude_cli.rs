//! Claude extractor implementation using the Claude CLI subprocess.

use crate::extraction::base::{
    ExtractionError, ExtractionEvent, ExtractionRequest, ExtractionService, ExtractionStream,
};
use crate::extraction::cli_executor::CliExecutor;
use async_trait::async_trait;
use serde::Deserialize;
use std::process::Stdio;
use tokio::process::Command;
use tokio_stream::StreamExt;

/// Runs `claude -p` in stream-json mode with the prompt on stdin.
///
/// Tools are disabled: every stage only needs text back.
pub struct ClaudeCliExtractor {
    model: String,
    binary: String,
}

impl ClaudeCliExtractor {
    /// Create a new Claude extractor.
    ///
    /// # Arguments
    ///
    /// * `model` - The Claude model to use (e.g., "claude-sonnet-4.5")
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            binary: "claude".to_string(),
        }
    }

    /// Use a different executable, e.g. an absolute path.
    pub fn with_binary(mut self, binary: impl Into<String>) -> Self {
        self.binary = binary.into();
        self
    }

    fn args(&self, request: &ExtractionRequest) -> Vec<String> {
        vec![
            "-p".to_string(),
            "--output-format".to_string(),
            "stream-json".to_string(),
            "--verbose".to_string(),
            "--model".to_string(),
            self.model.clone(),
            "--append-system-prompt".to_string(),
            request.system_prompt.clone(),
            "--disallowed-tools".to_string(),
            "Bash,Edit,Write,MultiEdit,NotebookEdit,WebFetch,WebSearch".to_string(),
        ]
    }
}

#[async_trait]
impl ExtractionService for ClaudeCliExtractor {
    async fn check_availability(&self) -> bool {
        match Command::new(&self.binary)
            .arg("-h")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
        {
            Ok(status) => status.success(),
            Err(_) => false,
        }
    }

    async fn execute(&self, request: &ExtractionRequest) -> Result<ExtractionStream, ExtractionError> {
        let lines = CliExecutor::execute(
            self.binary.clone(),
            self.args(request),
            request.working_dir.clone(),
            Some(request.flattened_prompt()),
        );

        let events = lines.filter_map(|line| match line {
            Ok(line) if line.trim().is_empty() => None,
            Ok(line) => match serde_json::from_str::<ClaudeMessage>(&line) {
                Ok(message) => convert_claude_message(message),
                Err(e) => Some(Err(ExtractionError::StreamParseError(format!(
                    "Failed to parse JSON: {} (line: {})",
                    e, line
                )))),
            },
            Err(e) => Some(Err(e)),
        });

        Ok(Box::pin(events))
    }
}

/// Claude CLI message types (stream-json output).
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ClaudeMessage {
    System,
    Assistant { message: AssistantMessage },
    User,
    Result {
        #[serde(default)]
        is_error: bool,
        #[serde(default)]
        result: Option<String>,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct AssistantMessage {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock {
    Text { text: String },
    Thinking { thinking: String },
    #[serde(other)]
    Other,
}

fn convert_claude_message(message: ClaudeMessage) -> Option<Result<ExtractionEvent, ExtractionError>> {
    match message {
        ClaudeMessage::System | ClaudeMessage::User | ClaudeMessage::Other => None,
        ClaudeMessage::Assistant { message } => {
            let mut text = String::new();
            let mut thought = None;
            for block in message.content {
                match block {
                    ContentBlock::Text { text: chunk } => text.push_str(&chunk),
                    ContentBlock::Thinking { thinking } => thought = Some(thinking),
                    ContentBlock::Other => {}
                }
            }
            if !text.is_empty() {
                Some(Ok(ExtractionEvent::MessageChunk(text)))
            } else {
                thought.map(|t| Ok(ExtractionEvent::Thought(t)))
            }
        }
        ClaudeMessage::Result { is_error: true, result } => Some(Err(ExtractionError::ApiError(
            result.unwrap_or_else(|| "claude reported an error".to_string()),
        ))),
        ClaudeMessage::Result { .. } => Some(Ok(ExtractionEvent::Completed)),
    }
}
