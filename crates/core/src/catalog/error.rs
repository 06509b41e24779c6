//! Error types for catalog loading.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Failed to read catalog file at {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to traverse catalog directory {path}: {source}")]
    DirectoryWalk {
        path: PathBuf,
        source: walkdir::Error,
    },

    #[error("Failed to parse front matter in {path}: {reason}")]
    FrontMatter { path: PathBuf, reason: String },

    /// The skeleton file is not an XML element.
    #[error("Invalid block skeleton in {path}: {reason}")]
    InvalidSkeleton { path: PathBuf, reason: String },
}

pub type CatalogResult<T> = Result<T, CatalogError>;
