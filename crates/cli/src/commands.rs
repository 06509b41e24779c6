//! Subcommand implementations.

use crate::render::{print_event, print_outcome};
use color_eyre::eyre::{eyre, Result, WrapErr};
use colored::Colorize;
use sas_core::catalog::load_catalog;
use sas_core::config::{load_config, AppConfig};
use sas_core::init::{generate_sas_structure, InitOptions};
use sas_core::state::store::STATE_FILE;
use sas_core::state::StateStore;
use sas_core::{InvokeOutcome, PipelineEngine};
use sas_protocol::{PipelineState, ScopeRole};
use std::path::{Path, PathBuf};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

/// Where `invoke` takes the prior state from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StateSource {
    NewRun,
    Latest,
    File(PathBuf),
}

pub async fn init(project: &Path, force: bool, minimal: bool) -> Result<()> {
    generate_sas_structure(InitOptions {
        target_dir: project.to_path_buf(),
        force,
        minimal,
    })
    .await?;
    println!(
        "{} {}",
        "Initialized".green(),
        project.join(".sas").display()
    );
    Ok(())
}

pub async fn catalog(project: &Path) -> Result<()> {
    let config = load_config(project).await?;
    let catalog = load_catalog(&config.catalog_dir())?;
    if catalog.is_empty() {
        println!("No operation types in {}", config.catalog_dir().display());
        return Ok(());
    }

    for entry in catalog.entries() {
        let scope = match entry.scope {
            ScopeRole::None => String::new(),
            ScopeRole::Open => format!(
                " [opens {}]",
                entry.body_slot.as_deref().unwrap_or("DO")
            ),
            ScopeRole::Close => " [closes]".to_string(),
        };
        println!(
            "{}{}  {}",
            entry.operation_type.bold(),
            scope.cyan(),
            entry.description
        );
    }
    Ok(())
}

fn engine(config: AppConfig) -> Result<PipelineEngine> {
    PipelineEngine::from_config(config).map_err(|e| eyre!(e))
}

/// Most recently written `state.json` below `runs_dir`.
pub fn latest_state_file(runs_dir: &Path) -> Option<PathBuf> {
    std::fs::read_dir(runs_dir)
        .ok()?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path().join(STATE_FILE))
        .filter_map(|path| {
            let modified = path.metadata().and_then(|m| m.modified()).ok()?;
            Some((modified, path))
        })
        .max_by_key(|(modified, _)| *modified)
        .map(|(_, path)| path)
}

async fn prior_state(config: &AppConfig, source: &StateSource) -> Result<Option<PipelineState>> {
    let path = match source {
        StateSource::NewRun => return Ok(None),
        StateSource::File(path) => path.clone(),
        StateSource::Latest => latest_state_file(&config.runs_dir())
            .ok_or_else(|| eyre!("no runs found in {}", config.runs_dir().display()))?,
    };
    let state = StateStore::load(&path)
        .await
        .wrap_err_with(|| format!("loading {}", path.display()))?;
    Ok(Some(state))
}

pub async fn invoke(project: &Path, source: StateSource, reply: Option<String>, json: bool) -> Result<()> {
    let config = load_config(project).await?;
    let prior = prior_state(&config, &source).await?;
    let engine = engine(config)?;

    let outcome = engine
        .invoke(prior, reply.as_deref())
        .await
        .map_err(|e| eyre!(e))?;
    let state_file = Path::new(&outcome.state.run_directory).join(STATE_FILE);

    if json {
        let summary = serde_json::json!({
            "runId": outcome.state.run_id,
            "stateFile": state_file,
            "dialogState": outcome.state.dialog_state,
            "message": outcome.assistant_message,
            "paused": outcome.is_paused,
            "done": outcome.is_done,
            "error": outcome.is_error,
        });
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_outcome(&outcome);
        eprintln!("{}", format!("state: {}", state_file.display()).dimmed());
    }
    Ok(())
}

/// Interactive loop over stdin until EOF, `exit` or `quit`.
pub async fn chat(project: &Path) -> Result<()> {
    let config = load_config(project).await?;
    let (tx, mut rx) = mpsc::channel(256);
    let engine = engine(config)?.with_events(tx);

    let printer = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            print_event(&event);
        }
    });

    let mut outcome = engine.invoke(None, None).await.map_err(|e| eyre!(e))?;
    print_outcome(&outcome);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        eprint!("{} ", ">".cyan().bold());
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        if matches!(line, "exit" | "quit") {
            break;
        }

        outcome = step(&engine, outcome, line).await?;
        if outcome.is_done {
            println!("{}", "Reply with a new description to start another run.".dimmed());
        }
    }

    drop(engine);
    let _ = printer.await;
    Ok(())
}

async fn step(engine: &PipelineEngine, previous: InvokeOutcome, line: &str) -> Result<InvokeOutcome> {
    let reply = (!line.is_empty()).then_some(line);
    let outcome = engine
        .invoke(Some(previous.state), reply)
        .await
        .map_err(|e| eyre!(e))?;
    print_outcome(&outcome);
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_latest_state_file_picks_newest() {
        let dir = tempdir().unwrap();
        let old = dir.path().join("a");
        let new = dir.path().join("b");
        std::fs::create_dir_all(&old).unwrap();
        std::fs::create_dir_all(&new).unwrap();
        std::fs::write(old.join(STATE_FILE), "{}").unwrap();
        std::thread::sleep(std::time::Duration::from_millis(20));
        std::fs::write(new.join(STATE_FILE), "{}").unwrap();
        std::fs::create_dir_all(dir.path().join("empty")).unwrap();

        assert_eq!(latest_state_file(dir.path()), Some(new.join(STATE_FILE)));
    }

    #[test]
    fn test_latest_state_file_without_runs() {
        let dir = tempdir().unwrap();
        assert_eq!(latest_state_file(&dir.path().join("missing")), None);
    }
}
