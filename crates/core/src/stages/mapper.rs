//! Stage 3: bind logical parameter references to physical store slots.
//!
//! No extraction call is made. References come from explicit tags
//! (`{point: pick}`, `{number: count}`, `{flag: part present}`) and from
//! free-text point phrases such as "move to the pick point".
//!
//! Point names are normalized to a set of tokens: lowercase, punctuation
//! removed, stop-words dropped, synonyms folded onto one canonical word.
//! Two point names refer to the same slot when their token sets are equal or
//! one is a non-empty subset of the other.

use crate::params::ParameterStore;
use regex::Regex;
use sas_protocol::{ParameterKind, ParameterMapping, SlotAssignment, Task, UnresolvedParameter};
use std::collections::BTreeSet;
use std::sync::LazyLock;

static TAG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\{\s*(point|number|flag)\s*:\s*([^{}]+?)\s*\}").expect("static regex")
});

static POINT_PHRASE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:to|at|from|above|over|towards?)\s+(?:the\s+)?([a-z0-9_\-]+(?:\s+[a-z0-9_\-]+){0,2}?)\s+(?:point|position|pose)\b",
    )
    .expect("static regex")
});

const STOP_WORDS: &[&str] = &[
    "the", "a", "an", "of", "to", "at", "from", "above", "over", "toward", "towards", "on", "in",
    "point", "position", "pose", "location", "robot", "arm", "tcp",
];

const SYNONYMS: &[(&str, &[&str])] = &[
    ("home", &["home", "initial", "safe", "default", "origin", "start", "rest"]),
    ("pick", &["pick", "pickup", "grasp", "grab"]),
    ("place", &["place", "drop", "put", "release"]),
];

/// One reference found in step text, in order of appearance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterReference {
    pub kind: ParameterKind,
    /// The name as written.
    pub name: String,
}

impl ParameterReference {
    /// Key under which the reference is reported and deduplicated.
    pub fn key(&self) -> Option<String> {
        match self.kind {
            ParameterKind::Point => {
                let tokens = point_tokens(&self.name);
                (!tokens.is_empty()).then(|| tokens.into_iter().collect::<Vec<_>>().join(" "))
            }
            ParameterKind::Number | ParameterKind::Flag => {
                let key = normalize_variable(&self.name);
                (!key.is_empty()).then_some(key)
            }
        }
    }
}

/// References in `text`, ordered by position.
pub fn references_in(text: &str) -> Vec<ParameterReference> {
    let mut found: Vec<(usize, ParameterReference)> = Vec::new();

    for captures in TAG_RE.captures_iter(text) {
        let kind = match captures[1].to_lowercase().as_str() {
            "point" => ParameterKind::Point,
            "number" => ParameterKind::Number,
            _ => ParameterKind::Flag,
        };
        let start = captures.get(0).map_or(0, |m| m.start());
        found.push((
            start,
            ParameterReference {
                kind,
                name: captures[2].trim().to_string(),
            },
        ));
    }

    for captures in POINT_PHRASE_RE.captures_iter(text) {
        let start = captures.get(0).map_or(0, |m| m.start());
        found.push((
            start,
            ParameterReference {
                kind: ParameterKind::Point,
                name: captures[1].trim().to_string(),
            },
        ));
    }

    found.sort_by_key(|(start, _)| *start);
    found.into_iter().map(|(_, reference)| reference).collect()
}

/// Normalized token set of a point name.
pub fn point_tokens(name: &str) -> BTreeSet<String> {
    name.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|word| !word.is_empty() && !STOP_WORDS.contains(word))
        .map(fold_synonym)
        .collect()
}

fn fold_synonym(word: &str) -> String {
    SYNONYMS
        .iter()
        .find(|(_, variants)| variants.contains(&word))
        .map(|(canonical, _)| canonical.to_string())
        .unwrap_or_else(|| word.to_string())
}

fn normalize_variable(name: &str) -> String {
    name.to_lowercase()
        .split(|c: char| !c.is_alphanumeric() && c != '_')
        .filter(|word| !word.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn points_match(a: &BTreeSet<String>, b: &BTreeSet<String>) -> bool {
    !a.is_empty() && !b.is_empty() && (a == b || a.is_subset(b) || b.is_subset(a))
}

/// Slot of `kind` whose label refers to `key`.
///
/// Points prefer an exact token-set match before a subset match.
fn find_labeled(store: &ParameterStore, kind: ParameterKind, key: &str) -> Option<(String, String)> {
    let slots = store.slots(kind).iter().filter(|slot| !slot.is_free());

    match kind {
        ParameterKind::Point => {
            let wanted = point_tokens(key);
            let labeled: Vec<_> = slots.map(|slot| (slot, point_tokens(&slot.label))).collect();
            labeled
                .iter()
                .find(|(_, tokens)| *tokens == wanted && !wanted.is_empty())
                .or_else(|| labeled.iter().find(|(_, tokens)| points_match(tokens, &wanted)))
                .map(|(slot, _)| (slot.id.clone(), slot.label.clone()))
        }
        ParameterKind::Number | ParameterKind::Flag => slots
            .into_iter()
            .find(|slot| normalize_variable(&slot.label) == key)
            .map(|slot| (slot.id.clone(), slot.label.clone())),
    }
}

/// Run stage 3 over the details of `tasks`, claiming slots in `store`.
///
/// The store is only modified in memory; persisting it is up to the caller.
/// References that cannot be bound are listed in `unresolved`.
pub fn map_parameters(tasks: &[Task], store: &mut ParameterStore) -> ParameterMapping {
    let mut mapping = ParameterMapping::default();

    let references = tasks
        .iter()
        .filter(|task| task.synthesis_error.is_none())
        .flat_map(|task| task.details.iter())
        .flat_map(|detail| references_in(detail));

    for reference in references {
        let Some(key) = reference.key() else {
            continue;
        };
        let kind = reference.kind;

        if mapping.assignments(kind).contains_key(&key)
            || mapping
                .unresolved
                .iter()
                .any(|u| u.kind == kind && u.name == key)
        {
            continue;
        }

        if let Some((slot_id, label)) = find_labeled(store, kind, &key) {
            mapping.assignments_mut(kind).insert(
                key,
                SlotAssignment {
                    slot_id,
                    label,
                    newly_claimed: false,
                },
            );
            continue;
        }

        let free = store.first_free(kind).map(|slot| slot.id.clone());
        match free {
            Some(slot_id) if store.claim(kind, &slot_id, &key).is_ok() => {
                mapping.assignments_mut(kind).insert(
                    key.clone(),
                    SlotAssignment {
                        slot_id,
                        label: key,
                        newly_claimed: true,
                    },
                );
            }
            _ => {
                tracing::warn!(kind = kind.label(), name = %key, "no empty slot left for parameter");
                mapping.unresolved.push(UnresolvedParameter {
                    kind,
                    name: key,
                    reason: format!("no empty {} slot", kind.label()),
                });
            }
        }
    }

    mapping
}

/// Assignments referenced by one step, for the block prompt.
pub fn slots_for_step(text: &str, mapping: &ParameterMapping) -> Vec<(ParameterKind, String, String)> {
    let mut out: Vec<(ParameterKind, String, String)> = Vec::new();
    for reference in references_in(text) {
        let Some(key) = reference.key() else {
            continue;
        };
        if let Some(assignment) = mapping.assignments(reference.kind).get(&key) {
            let entry = (reference.kind, key, assignment.slot_id.clone());
            if !out.contains(&entry) {
                out.push(entry);
            }
        }
    }
    out
}
