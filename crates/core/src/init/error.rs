//! Errors raised by `sas init`.

use std::path::PathBuf;
use thiserror::Error;

pub type InitResult<T> = Result<T, InitError>;

#[derive(Debug, Error)]
pub enum InitError {
    /// `.sas/` is present and `force` was not requested.
    #[error("{} already exists; pass --force to overwrite it", .0.display())]
    DirectoryExists(PathBuf),

    /// The embedded template set is missing a file the generator expects.
    #[error("no embedded template named {0}")]
    TemplateNotFound(String),

    #[error("cannot create {}: {source}", path.display())]
    DirectoryCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot write {}: {source}", path.display())]
    FileWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
