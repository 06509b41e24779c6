//! Terminal rendering of outcomes and progress events.

use colored::Colorize;
use sas_core::InvokeOutcome;
use sas_protocol::{Event, StageKind};

/// One progress line for `event`, or `None` for events not shown.
///
/// Chunks and state changes are too chatty for a terminal.
pub fn describe_event(event: &Event) -> Option<String> {
    match event {
        Event::StageStarted { stage, .. } => Some(format!("{}...", stage.title())),
        Event::StageCompleted {
            stage,
            items,
            failed,
            ..
        } => Some(completion_line(*stage, *items, *failed)),
        Event::RunError { kind, message, .. } => Some(format!("{kind:?}: {message}")),
        Event::RunCompleted { program_path, .. } => Some(format!("Program: {program_path}")),
        _ => None,
    }
}

fn completion_line(stage: StageKind, items: usize, failed: usize) -> String {
    if failed == 0 {
        format!("{} done ({items} items)", stage.title())
    } else {
        format!("{} done ({items} items, {failed} failed)", stage.title())
    }
}

pub fn print_event(event: &Event) {
    let Some(line) = describe_event(event) else {
        return;
    };
    let line = match event {
        Event::RunError { .. } => line.red(),
        Event::RunCompleted { .. } => line.green(),
        Event::StageCompleted { failed, .. } if *failed > 0 => line.yellow(),
        _ => line.dimmed(),
    };
    eprintln!("{line}");
}

/// Print what the user should read after an invoke.
pub fn print_outcome(outcome: &InvokeOutcome) {
    let Some(message) = &outcome.assistant_message else {
        return;
    };
    if outcome.is_error {
        println!("{}", message.red());
    } else if outcome.is_done {
        println!("{}", message.green().bold());
    } else {
        println!("{message}");
    }
}
