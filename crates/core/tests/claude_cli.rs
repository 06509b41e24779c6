//! Runs against the real `claude` CLI.
//!
//! Enabled with `--features e2e-cli-tests` and run with `--ignored`.

#[cfg(feature = "e2e-cli-tests")]
mod real_cli_tests {
    use sas_core::catalog::Catalog;
    use sas_core::config::AppConfig;
    use sas_core::extraction::{ClaudeCliExtractor, ExtractionManager, ExtractionService};
    use sas_core::PipelineEngine;
    use sas_protocol::{CatalogEntry, DialogState, GlobalConfig, ScopeRole};
    use std::sync::Arc;

    fn entry(operation_type: &str, description: &str) -> CatalogEntry {
        CatalogEntry {
            operation_type: operation_type.to_string(),
            skeleton_xml: format!(r#"<block type="{operation_type}"/>"#),
            description: description.to_string(),
            parameters: Vec::new(),
            scope: ScopeRole::None,
            body_slot: None,
        }
    }

    #[tokio::test]
    #[ignore] // Run explicitly with --ignored flag
    async fn test_claude_decomposes_a_description() {
        let extractor = ClaudeCliExtractor::new("claude-sonnet-4.5");
        if !extractor.check_availability().await {
            eprintln!("Skipping test: Claude CLI not available");
            return;
        }

        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let engine = PipelineEngine::new(
            AppConfig::new(dir.path(), GlobalConfig::default()),
            Catalog::from_entries([
                entry("moveP", "Linear move to a taught point"),
                entry("grip", "Open or close the gripper"),
            ]),
            ExtractionManager::new(Arc::new(extractor)),
        );

        let state = engine.invoke(None, None).await.expect("start").state;
        let outcome = engine
            .invoke(Some(state), Some("Pick up the part at the pick point and close the gripper."))
            .await
            .expect("invoke");

        assert_eq!(
            outcome.state.dialog_state,
            DialogState::AwaitingTaskListReview,
            "last error: {:?}",
            outcome.state.last_error
        );
        assert!(!outcome.state.tasks.is_empty());
    }
}
