//! Extraction service implementations.

mod claude_cli;
mod command;
pub mod mock_extractor;

pub use claude_cli::ClaudeCliExtractor;
pub use command::CommandExtractor;
pub use mock_extractor::MockExtractor;
