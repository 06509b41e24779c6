//! The operation catalog: the fixed set of legal block types.

pub mod error;
pub mod loader;

pub use error::{CatalogError, CatalogResult};
pub use loader::load_catalog;

use sas_protocol::{CatalogEntry, ScopeRole};
use std::collections::BTreeMap;

/// Read-only map of operation type to catalog entry.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    entries: BTreeMap<String, CatalogEntry>,
}

impl Catalog {
    pub fn from_entries(entries: impl IntoIterator<Item = CatalogEntry>) -> Self {
        Self {
            entries: entries
                .into_iter()
                .map(|entry| (entry.operation_type.clone(), entry))
                .collect(),
        }
    }

    pub fn get(&self, operation_type: &str) -> Option<&CatalogEntry> {
        self.entries.get(operation_type)
    }

    pub fn contains(&self, operation_type: &str) -> bool {
        self.entries.contains_key(operation_type)
    }

    pub fn types(&self) -> Vec<&str> {
        self.entries.keys().map(String::as_str).collect()
    }

    pub fn entries(&self) -> impl Iterator<Item = &CatalogEntry> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Scope role and body slot for `operation_type`.
    ///
    /// Types missing from the catalog fall back to the name heuristics of
    /// [`default_scope`].
    pub fn scope_of(&self, operation_type: &str) -> (ScopeRole, Option<String>) {
        match self.get(operation_type) {
            Some(entry) => (entry.scope, entry.body_slot.clone()),
            None => {
                let (role, body) = default_scope(operation_type);
                (role, body.map(str::to_string))
            }
        }
    }

    /// One line per type, for prompts: `- type: description (parameters: a, b)`.
    pub fn prompt_listing(&self) -> String {
        self.entries
            .values()
            .map(|entry| {
                let mut line = format!("- {}", entry.operation_type);
                if !entry.description.is_empty() {
                    line.push_str(&format!(": {}", entry.description));
                }
                if !entry.parameters.is_empty() {
                    line.push_str(&format!(" (parameters: {})", entry.parameters.join(", ")));
                }
                line
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Name-based scope heuristics for types without explicit metadata.
///
/// Names are split into words on `_`, `-` and camelCase boundaries. Any
/// `end` word makes a terminator (`loop_end`, `endIf`). Otherwise a leading
/// `loop`/`while`/`repeat`/`for` opens a `DO` body and a leading
/// `if`/`condition` opens a `DO0` branch.
pub fn default_scope(operation_type: &str) -> (ScopeRole, Option<&'static str>) {
    let words = split_words(operation_type);

    if words.iter().any(|w| w == "end") {
        return (ScopeRole::Close, None);
    }

    match words.first().map(String::as_str) {
        Some("loop" | "while" | "repeat" | "for") => (ScopeRole::Open, Some("DO")),
        Some("if" | "condition") => (ScopeRole::Open, Some("DO0")),
        _ => (ScopeRole::None, None),
    }
}

fn split_words(name: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut prev_lower = false;

    for ch in name.chars() {
        if !ch.is_alphanumeric() {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
            prev_lower = false;
            continue;
        }
        if ch.is_uppercase() && prev_lower && !current.is_empty() {
            words.push(std::mem::take(&mut current));
        }
        prev_lower = ch.is_lowercase() || ch.is_ascii_digit();
        current.extend(ch.to_lowercase());
    }
    if !current.is_empty() {
        words.push(current);
    }
    words
}
