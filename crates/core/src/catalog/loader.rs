//! Loads the operation catalog from a directory of skeletons.
//!
//! Layout:
//! - `<type>.xml`: the block skeleton for operation type `<type>`
//! - `<type>.md` (optional): YAML front matter (`description`, `parameters`,
//!   `scope`, `body`) followed by an extended description

use crate::catalog::error::{CatalogError, CatalogResult};
use crate::catalog::{default_scope, Catalog};
use gray_matter::engine::YAML;
use gray_matter::Matter;
use regex::Regex;
use sas_protocol::{CatalogEntry, CatalogMetadata, ScopeRole};
use std::path::Path;
use std::sync::LazyLock;
use walkdir::WalkDir;

/// Load every `<type>.xml` in `dir`.
///
/// A missing directory is logged and yields an empty catalog; every later
/// step citation then fails as an unknown type.
pub fn load_catalog(dir: &Path) -> CatalogResult<Catalog> {
    if !dir.exists() {
        tracing::warn!(dir = %dir.display(), "operation catalog directory not found, catalog is empty");
        return Ok(Catalog::default());
    }

    let mut entries = Vec::new();

    for entry in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
    {
        let entry = entry.map_err(|source| CatalogError::DirectoryWalk {
            path: dir.to_path_buf(),
            source,
        })?;

        let path = entry.path();
        if path.extension().and_then(|s| s.to_str()) != Some("xml") {
            continue;
        }
        let Some(operation_type) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };

        entries.push(load_entry(dir, operation_type, path)?);
    }

    tracing::debug!(dir = %dir.display(), count = entries.len(), "loaded operation catalog");
    Ok(Catalog::from_entries(entries))
}

fn load_entry(dir: &Path, operation_type: &str, xml_path: &Path) -> CatalogResult<CatalogEntry> {
    let skeleton_xml = std::fs::read_to_string(xml_path)
        .map_err(|source| CatalogError::FileRead {
            path: xml_path.to_path_buf(),
            source,
        })?
        .trim()
        .to_string();

    if !(skeleton_xml.starts_with('<') && skeleton_xml.ends_with('>')) {
        return Err(CatalogError::InvalidSkeleton {
            path: xml_path.to_path_buf(),
            reason: "skeleton must be a single XML element".to_string(),
        });
    }

    let md_path = dir.join(format!("{operation_type}.md"));
    let (metadata, extended) = if md_path.exists() {
        read_metadata(&md_path)?
    } else {
        (CatalogMetadata::default(), String::new())
    };

    let description = if metadata.description.trim().is_empty() {
        extended.trim().to_string()
    } else {
        metadata.description.trim().to_string()
    };

    let parameters = if metadata.parameters.is_empty() {
        skeleton_fields(&skeleton_xml)
    } else {
        metadata.parameters
    };

    let (heuristic_scope, heuristic_body) = default_scope(operation_type);
    let scope = metadata.scope.unwrap_or(heuristic_scope);
    let body_slot = match scope {
        ScopeRole::Open => Some(
            metadata
                .body
                .or_else(|| heuristic_body.map(str::to_string))
                .unwrap_or_else(|| "DO".to_string()),
        ),
        _ => None,
    };

    Ok(CatalogEntry {
        operation_type: operation_type.to_string(),
        skeleton_xml,
        description,
        parameters,
        scope,
        body_slot,
    })
}

fn read_metadata(path: &Path) -> CatalogResult<(CatalogMetadata, String)> {
    let content = std::fs::read_to_string(path).map_err(|source| CatalogError::FileRead {
        path: path.to_path_buf(),
        source,
    })?;

    let matter = Matter::<YAML>::new();
    let result = matter.parse(&content);

    let metadata = match result.data {
        Some(data) => data
            .deserialize::<CatalogMetadata>()
            .map_err(|e| CatalogError::FrontMatter {
                path: path.to_path_buf(),
                reason: format!("Failed to deserialize front matter: {}", e),
            })?,
        None => CatalogMetadata::default(),
    };

    Ok((metadata, result.content))
}

static FIELD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"<field\s+name\s*=\s*"([^"]+)""#).expect("static regex"));

/// `<field name="...">` names in document order, without duplicates.
fn skeleton_fields(xml: &str) -> Vec<String> {
    let mut fields: Vec<String> = Vec::new();
    for capture in FIELD_RE.captures_iter(xml) {
        let name = capture[1].to_string();
        if !fields.contains(&name) {
            fields.push(name);
        }
    }
    fields
}
