//! `sas init`: lays out a `.sas/` project from embedded templates.
//!
//! A fresh project holds `config.toml`, a padded `parameters.yaml`, an empty
//! `runs/` directory and a starter catalog of `<type>.xml` skeletons with
//! their `<type>.md` descriptions.
//!
//! ```no_run
//! use sas_core::init::{generate_sas_structure, InitOptions};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! generate_sas_structure(InitOptions {
//!     minimal: true,
//!     ..InitOptions::default()
//! })
//! .await?;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod generator;
pub mod templates;

pub use error::{InitError, InitResult};
pub use generator::{generate_sas_structure, InitOptions};
pub use templates::{get_template, list_templates};
