//! Parameter slot models used by the parameter mapper.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use ts_rs::TS;

/// The three kinds of addressable slot in the parameter store.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, TS)]
#[serde(rename_all = "camelCase")]
pub enum ParameterKind {
    Point,
    Number,
    Flag,
}

impl ParameterKind {
    /// Prefix used for slot ids (`P1`, `N3`, `F2`).
    pub fn slot_prefix(self) -> &'static str {
        match self {
            Self::Point => "P",
            Self::Number => "N",
            Self::Flag => "F",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Point => "point",
            Self::Number => "number",
            Self::Flag => "flag",
        }
    }
}

/// One addressable store entry. An empty label means the slot is free.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, TS)]
pub struct Slot {
    pub id: String,
    #[serde(default)]
    pub label: String,
}

impl Slot {
    pub fn is_free(&self) -> bool {
        self.label.trim().is_empty()
    }
}

/// A logical reference bound to a physical slot.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, TS)]
#[serde(rename_all = "camelCase")]
pub struct SlotAssignment {
    pub slot_id: String,

    /// The slot's persisted label after mapping.
    pub label: String,

    /// The slot was empty before this run claimed it.
    pub newly_claimed: bool,
}

/// A reference that could not be bound to a slot.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, TS)]
#[serde(rename_all = "camelCase")]
pub struct UnresolvedParameter {
    pub kind: ParameterKind,
    pub name: String,
    pub reason: String,
}

/// Result of the parameter-mapping stage.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq, TS)]
#[serde(rename_all = "camelCase")]
pub struct ParameterMapping {
    pub points: BTreeMap<String, SlotAssignment>,
    pub numbers: BTreeMap<String, SlotAssignment>,
    pub flags: BTreeMap<String, SlotAssignment>,

    #[serde(default)]
    pub unresolved: Vec<UnresolvedParameter>,
}

impl ParameterMapping {
    pub fn assignments(&self, kind: ParameterKind) -> &BTreeMap<String, SlotAssignment> {
        match kind {
            ParameterKind::Point => &self.points,
            ParameterKind::Number => &self.numbers,
            ParameterKind::Flag => &self.flags,
        }
    }

    pub fn assignments_mut(&mut self, kind: ParameterKind) -> &mut BTreeMap<String, SlotAssignment> {
        match kind {
            ParameterKind::Point => &mut self.points,
            ParameterKind::Number => &mut self.numbers,
            ParameterKind::Flag => &mut self.flags,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
            && self.numbers.is_empty()
            && self.flags.is_empty()
            && self.unresolved.is_empty()
    }

    /// Human-readable mapping report.
    pub fn report(&self) -> String {
        let mut lines = Vec::new();
        for kind in [ParameterKind::Point, ParameterKind::Number, ParameterKind::Flag] {
            for (name, assignment) in self.assignments(kind) {
                let marker = if assignment.newly_claimed { " (new)" } else { "" };
                lines.push(format!(
                    "- {} \"{}\" -> {}{}",
                    kind.label(),
                    name,
                    assignment.slot_id,
                    marker
                ));
            }
        }
        for unresolved in &self.unresolved {
            lines.push(format!(
                "- {} \"{}\" UNMAPPED: {}",
                unresolved.kind.label(),
                unresolved.name,
                unresolved.reason
            ));
        }
        if lines.is_empty() {
            "No parameters referenced.".to_string()
        } else {
            format!("Parameter mapping:\n{}", lines.join("\n"))
        }
    }
}
