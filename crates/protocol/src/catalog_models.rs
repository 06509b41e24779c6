//! Operation catalog entries.
//!
//! Each entry is loaded from `<catalog>/<type>.xml` (the skeleton) and an
//! optional `<catalog>/<type>.md` whose YAML front matter carries metadata.
//!
//! # Example
//!
//! ```markdown
//! ---
//! description: Repeat the enclosed operations
//! parameters: [times]
//! scope: open
//! body: DO
//! ---
//!
//! Loops the body a fixed number of times.
//! ```

use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// How an operation type affects nesting in the relation tree.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default, TS)]
#[serde(rename_all = "lowercase")]
pub enum ScopeRole {
    /// An ordinary operation.
    #[default]
    None,
    /// Opens a compound construct (loop body, conditional branch).
    Open,
    /// Terminates the innermost open construct.
    Close,
}

/// Front matter of a catalog `.md` file.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq, TS)]
pub struct CatalogMetadata {
    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub parameters: Vec<String>,

    #[serde(default)]
    pub scope: Option<ScopeRole>,

    /// Body slot name for `scope: open` types.
    #[serde(default)]
    pub body: Option<String>,
}

/// A legal operation type.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, TS)]
#[serde(rename_all = "camelCase")]
pub struct CatalogEntry {
    pub operation_type: String,
    pub skeleton_xml: String,
    pub description: String,
    pub parameters: Vec<String>,
    pub scope: ScopeRole,

    /// Body slot opened by this type; only meaningful for `ScopeRole::Open`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body_slot: Option<String>,
}
