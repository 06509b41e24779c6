//! Extractor kind enumeration for determining which adapter to use.

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ExtractorKind {
    ClaudeCli,
    Command,
    Mock,
}

impl ExtractorKind {
    /// Infer the extractor kind from a model name.
    ///
    /// # Arguments
    ///
    /// * `model` - The model name from `[extraction]`
    /// * `has_command` - Whether a custom command is configured
    ///
    /// # Returns
    ///
    /// `Mock` for `mock*`/`test*` names, `ClaudeCli` for Claude models, and
    /// `Command` for anything else when a command is configured. Unknown
    /// models without a command fall back to `Mock`.
    ///
    /// # Examples
    ///
    /// ```
    /// use sas_core::extraction::ExtractorKind;
    ///
    /// assert_eq!(ExtractorKind::from_model_name("claude-sonnet-4.5", false), ExtractorKind::ClaudeCli);
    /// assert_eq!(ExtractorKind::from_model_name("gpt-4o", true), ExtractorKind::Command);
    /// assert_eq!(ExtractorKind::from_model_name("mock", true), ExtractorKind::Mock);
    /// ```
    pub fn from_model_name(model: &str, has_command: bool) -> Self {
        let model_lower = model.to_lowercase();

        if model_lower.starts_with("mock") || model_lower.starts_with("test") {
            Self::Mock
        } else if has_command {
            Self::Command
        } else if model_lower.contains("claude")
            || model_lower.starts_with("sonnet")
            || model_lower.starts_with("opus")
            || model_lower.starts_with("haiku")
        {
            Self::ClaudeCli
        } else {
            Self::Mock
        }
    }

    /// Get a human-readable name for the extractor kind.
    pub fn name(&self) -> &'static str {
        match self {
            Self::ClaudeCli => "Claude CLI",
            Self::Command => "Command",
            Self::Mock => "Mock",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_model_name_claude() {
        assert_eq!(ExtractorKind::from_model_name("claude-sonnet-4.5", false), ExtractorKind::ClaudeCli);
        assert_eq!(ExtractorKind::from_model_name("Claude-Haiku-3.5", false), ExtractorKind::ClaudeCli);
        assert_eq!(ExtractorKind::from_model_name("opus", false), ExtractorKind::ClaudeCli);
    }

    #[test]
    fn test_command_wins_over_model_family() {
        assert_eq!(ExtractorKind::from_model_name("claude-sonnet-4.5", true), ExtractorKind::Command);
        assert_eq!(ExtractorKind::from_model_name("qwen3-coder", true), ExtractorKind::Command);
    }

    #[test]
    fn test_from_model_name_mock() {
        assert_eq!(ExtractorKind::from_model_name("mock", false), ExtractorKind::Mock);
        assert_eq!(ExtractorKind::from_model_name("test-model", true), ExtractorKind::Mock);
        assert_eq!(ExtractorKind::from_model_name("unknown-model", false), ExtractorKind::Mock);
        assert_eq!(ExtractorKind::from_model_name("", false), ExtractorKind::Mock);
    }

    #[test]
    fn test_extractor_kind_name() {
        assert_eq!(ExtractorKind::ClaudeCli.name(), "Claude CLI");
        assert_eq!(ExtractorKind::Command.name(), "Command");
        assert_eq!(ExtractorKind::Mock.name(), "Mock");
    }
}
