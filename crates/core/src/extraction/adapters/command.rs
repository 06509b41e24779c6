//! Generic extractor that pipes the prompt through any command.

use crate::extraction::base::{
    ExtractionError, ExtractionEvent, ExtractionRequest, ExtractionService, ExtractionStream,
};
use crate::extraction::cli_executor::CliExecutor;
use async_trait::async_trait;
use tokio_stream::StreamExt;

/// Runs `program args..`, writes the system and user prompt to stdin and
/// treats stdout as the response text.
pub struct CommandExtractor {
    program: String,
    args: Vec<String>,
}

impl CommandExtractor {
    /// Build from a command line such as `["llm", "-m", "gpt-4o"]`.
    pub fn new(command: &[String]) -> Result<Self, ExtractionError> {
        let (program, args) = command.split_first().ok_or_else(|| {
            ExtractionError::NotAvailable("extraction command is empty".to_string())
        })?;
        Ok(Self {
            program: program.clone(),
            args: args.to_vec(),
        })
    }

    fn stdin_payload(request: &ExtractionRequest) -> String {
        format!("{}\n\n{}\n", request.system_prompt, request.flattened_prompt())
    }
}

#[async_trait]
impl ExtractionService for CommandExtractor {
    async fn check_availability(&self) -> bool {
        which::which(&self.program).is_ok()
    }

    async fn execute(&self, request: &ExtractionRequest) -> Result<ExtractionStream, ExtractionError> {
        let lines = CliExecutor::execute(
            self.program.clone(),
            self.args.clone(),
            request.working_dir.clone(),
            Some(Self::stdin_payload(request)),
        );

        let chunks = lines
            .map(|line| line.map(|l| ExtractionEvent::MessageChunk(format!("{l}\n"))))
            .chain(tokio_stream::once(Ok(ExtractionEvent::Completed)));

        Ok(Box::pin(chunks))
    }
}
