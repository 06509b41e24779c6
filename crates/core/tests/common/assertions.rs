//! Custom assertion helpers for pipeline tests.

use sas_core::stages::xml::{parse_fragment, Element};
use sas_protocol::{DialogState, Event};

/// Drain every event currently queued in `rx`.
pub fn drain(rx: &mut tokio::sync::mpsc::Receiver<Event>) -> Vec<Event> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

/// Dialog states entered, in order.
pub fn visited_states(events: &[Event]) -> Vec<DialogState> {
    events
        .iter()
        .filter_map(|event| match event {
            Event::DialogStateChanged { to, .. } => Some(*to),
            _ => None,
        })
        .collect()
}

pub fn has_run_completed(events: &[Event]) -> bool {
    events.iter().any(|e| matches!(e, Event::RunCompleted { .. }))
}

/// First `<block>` of a program document.
pub fn program_root(xml: &str) -> Element {
    parse_fragment(xml).unwrap_or_else(|e| panic!("program is not valid XML: {e}\n{xml}"))
}

/// `id` attributes of a `<next>` chain starting at `first`.
pub fn chain_ids(first: &Element) -> Vec<String> {
    let mut ids = Vec::new();
    let mut cursor = Some(first);
    while let Some(block) = cursor {
        ids.push(block.attr("id").unwrap_or_default().to_string());
        cursor = block
            .elements()
            .find(|child| child.name == "next")
            .and_then(|next| next.elements().next());
    }
    ids
}

/// First block of the statement slot `name` of `block`.
pub fn statement_first<'a>(block: &'a Element, name: &str) -> Option<&'a Element> {
    block
        .elements()
        .find(|child| child.name == "statement" && child.attr("name") == Some(name))
        .and_then(|statement| statement.elements().next())
}
