//! Extraction manager: backend selection and whole-response helpers.
//!
//! The `ExtractionManager` is responsible for:
//! - Holding the primary extraction backend and an optional fallback
//! - Selecting an available backend per call
//! - Collecting streamed chunks into whole text, forwarding partial text as
//!   progress events
//! - Validating structured output against a JSON schema

use crate::extraction::base::{
    ExtractionError, ExtractionEvent, ExtractionRequest, ExtractionService,
};
use crate::extraction::structured::parse_structured;
use sas_protocol::{Event, StageKind};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::mpsc::Sender;
use tokio_stream::StreamExt;
use uuid::Uuid;

/// Identifies where partial text belongs when forwarded as progress.
#[derive(Debug, Clone, Copy)]
pub struct ProgressTag {
    pub run_id: Uuid,
    pub stage: StageKind,
    pub item: Option<usize>,
}

impl ProgressTag {
    pub fn new(run_id: Uuid, stage: StageKind) -> Self {
        Self {
            run_id,
            stage,
            item: None,
        }
    }

    pub fn item(mut self, index: usize) -> Self {
        self.item = Some(index);
        self
    }
}

/// Owns the extraction backends for one service lifetime.
#[derive(Clone)]
pub struct ExtractionManager {
    primary: Arc<dyn ExtractionService>,
    fallback: Option<Arc<dyn ExtractionService>>,
    events_tx: Option<Sender<Event>>,
}

impl ExtractionManager {
    /// Create a manager around a primary backend.
    pub fn new(primary: Arc<dyn ExtractionService>) -> Self {
        Self {
            primary,
            fallback: None,
            events_tx: None,
        }
    }

    /// Set the backend to use when the primary is unavailable.
    pub fn with_fallback(mut self, fallback: Arc<dyn ExtractionService>) -> Self {
        self.fallback = Some(fallback);
        self
    }

    /// Forward partial text to `events_tx` as `Event::ProgressChunk`.
    pub fn with_events(mut self, events_tx: Sender<Event>) -> Self {
        self.events_tx = Some(events_tx);
        self
    }

    pub fn has_fallback(&self) -> bool {
        self.fallback.is_some()
    }

    /// Pick the first available backend.
    ///
    /// # Behavior
    ///
    /// 1. Use the primary if it reports available
    /// 2. Otherwise use the fallback if one is configured and available
    /// 3. Otherwise fail with `NotAvailable`
    pub async fn select(&self) -> Result<Arc<dyn ExtractionService>, ExtractionError> {
        if self.primary.check_availability().await {
            return Ok(Arc::clone(&self.primary));
        }

        if let Some(fallback) = &self.fallback {
            if fallback.check_availability().await {
                tracing::warn!("primary extraction backend unavailable, using fallback");
                return Ok(Arc::clone(fallback));
            }
        }

        Err(ExtractionError::NotAvailable(
            "no extraction backend is available and no fallback succeeded".to_string(),
        ))
    }

    /// Run `request` and return the complete response text.
    pub async fn complete(
        &self,
        request: &ExtractionRequest,
        tag: ProgressTag,
    ) -> Result<String, ExtractionError> {
        let service = self.select().await?;
        let mut stream = service.execute(request).await?;

        let mut text = String::new();
        while let Some(event) = stream.next().await {
            match event? {
                ExtractionEvent::MessageChunk(chunk) => {
                    self.forward(tag, &chunk);
                    text.push_str(&chunk);
                }
                ExtractionEvent::Thought(thought) => {
                    tracing::trace!(stage = ?tag.stage, item = ?tag.item, "{thought}");
                }
                ExtractionEvent::Completed => break,
            }
        }

        if text.trim().is_empty() {
            return Err(ExtractionError::EmptyResponse);
        }
        Ok(text)
    }

    /// Run `request` and return its output parsed and validated against `schema`.
    pub async fn complete_structured(
        &self,
        request: &ExtractionRequest,
        schema: &Value,
        tag: ProgressTag,
    ) -> Result<Value, ExtractionError> {
        let text = self.complete(request, tag).await?;
        parse_structured(&text, schema)
    }

    fn forward(&self, tag: ProgressTag, chunk: &str) {
        if let Some(tx) = &self.events_tx {
            // Progress is lossy: a full channel never blocks a stage.
            let _ = tx.try_send(Event::ProgressChunk {
                run_id: tag.run_id,
                stage: tag.stage,
                item: tag.item,
                content: chunk.to_string(),
            });
        }
    }
}
