//! Scripted extraction backend for tests and offline demos.

use crate::extraction::base::{
    ExtractionError, ExtractionEvent, ExtractionRequest, ExtractionService, ExtractionStream,
};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// One scripted reply: used when the user prompt contains `needle`.
#[derive(Debug, Clone)]
struct Rule {
    needle: String,
    reply: Result<String, ExtractionError>,
}

/// Replies chosen by substring match on the user prompt.
///
/// Rules are checked in insertion order; the first whose needle occurs in the
/// prompt wins, otherwise the default reply is used. Replies are streamed in
/// two chunks so callers exercise chunk accumulation.
#[derive(Clone)]
pub struct MockExtractor {
    available: bool,
    rules: Vec<Rule>,
    default_reply: Result<String, ExtractionError>,
    calls: Arc<AtomicUsize>,
    prompts: Arc<Mutex<Vec<String>>>,
}

impl MockExtractor {
    /// Always reply with `text`.
    pub fn replying(text: impl Into<String>) -> Self {
        Self {
            available: true,
            rules: Vec::new(),
            default_reply: Ok(text.into()),
            calls: Arc::new(AtomicUsize::new(0)),
            prompts: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn unavailable() -> Self {
        Self {
            available: false,
            ..Self::replying("")
        }
    }

    /// Every call fails mid-stream.
    pub fn failing() -> Self {
        Self {
            default_reply: Err(ExtractionError::ExecutionError("Mock failure".to_string())),
            ..Self::replying("")
        }
    }

    /// Reply with `text` when the user prompt contains `needle`.
    pub fn when(mut self, needle: impl Into<String>, text: impl Into<String>) -> Self {
        self.rules.push(Rule {
            needle: needle.into(),
            reply: Ok(text.into()),
        });
        self
    }

    /// Fail when the user prompt contains `needle`.
    pub fn fail_when(mut self, needle: impl Into<String>, message: impl Into<String>) -> Self {
        self.rules.push(Rule {
            needle: needle.into(),
            reply: Err(ExtractionError::ApiError(message.into())),
        });
        self
    }

    /// Number of `execute` calls so far.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// User prompts received so far, in call order.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts
            .lock()
            .map(|prompts| prompts.clone())
            .unwrap_or_default()
    }

    fn reply_for(&self, prompt: &str) -> Result<String, ExtractionError> {
        self.rules
            .iter()
            .find(|rule| prompt.contains(&rule.needle))
            .map(|rule| rule.reply.clone())
            .unwrap_or_else(|| self.default_reply.clone())
    }
}

#[async_trait]
impl ExtractionService for MockExtractor {
    async fn check_availability(&self) -> bool {
        self.available
    }

    async fn execute(&self, request: &ExtractionRequest) -> Result<ExtractionStream, ExtractionError> {
        if !self.available {
            return Err(ExtractionError::NotAvailable(
                "Mock extractor not available".to_string(),
            ));
        }

        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(request.user_prompt.clone());
        }

        let events = match self.reply_for(&request.user_prompt) {
            Ok(text) => {
                let split = text
                    .char_indices()
                    .nth(text.chars().count() / 2)
                    .map(|(i, _)| i)
                    .unwrap_or(0);
                let (head, tail) = text.split_at(split);
                let mut events = vec![Ok(ExtractionEvent::Thought("Mock extractor thinking".to_string()))];
                for part in [head, tail] {
                    if !part.is_empty() {
                        events.push(Ok(ExtractionEvent::MessageChunk(part.to_string())));
                    }
                }
                events.push(Ok(ExtractionEvent::Completed));
                events
            }
            Err(e) => vec![
                Ok(ExtractionEvent::Thought("Starting...".to_string())),
                Err(e),
            ],
        };

        Ok(Box::pin(tokio_stream::iter(events)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_stream::StreamExt;

    async fn collect(extractor: &MockExtractor, prompt: &str) -> Vec<Result<ExtractionEvent, ExtractionError>> {
        let stream = extractor
            .execute(&ExtractionRequest::new("system", prompt))
            .await
            .unwrap();
        stream.collect().await
    }

    #[tokio::test]
    async fn test_mock_replying_splits_into_chunks() {
        let extractor = MockExtractor::replying("abcdef");
        let events = collect(&extractor, "anything").await;

        assert_eq!(events.len(), 4);
        assert_eq!(events[1], Ok(ExtractionEvent::MessageChunk("abc".to_string())));
        assert_eq!(events[2], Ok(ExtractionEvent::MessageChunk("def".to_string())));
        assert_eq!(events[3], Ok(ExtractionEvent::Completed));
    }

    #[tokio::test]
    async fn test_mock_rules_match_in_order() {
        let extractor = MockExtractor::replying("default")
            .when("Grasp", "grasp reply")
            .fail_when("Place", "boom");

        let grasp = collect(&extractor, "Task: Grasp").await;
        assert!(grasp.contains(&Ok(ExtractionEvent::MessageChunk("grasp".to_string()))));

        let place = collect(&extractor, "Task: Place").await;
        assert!(matches!(place.last(), Some(Err(ExtractionError::ApiError(_)))));

        assert_eq!(extractor.call_count(), 2);
        assert_eq!(extractor.prompts(), vec!["Task: Grasp".to_string(), "Task: Place".to_string()]);
    }

    #[tokio::test]
    async fn test_mock_unavailable() {
        let extractor = MockExtractor::unavailable();
        assert!(!extractor.check_availability().await);
        let result = extractor.execute(&ExtractionRequest::new("s", "u")).await;
        assert!(matches!(result, Err(ExtractionError::NotAvailable(_))));
    }

    #[tokio::test]
    async fn test_mock_multibyte_split_is_safe() {
        let extractor = MockExtractor::replying("确认好的");
        let events = collect(&extractor, "x").await;
        let text: String = events
            .into_iter()
            .filter_map(|e| match e {
                Ok(ExtractionEvent::MessageChunk(c)) => Some(c),
                _ => None,
            })
            .collect();
        assert_eq!(text, "确认好的");
    }
}
