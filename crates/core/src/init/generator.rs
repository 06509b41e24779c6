//! Directory structure and file generation for `.sas` initialization.

use super::error::{InitError, InitResult};
use super::templates::{get_template, list_templates};
use std::fs;
use std::path::{Path, PathBuf};

/// Operation types written by `--minimal`.
const MINIMAL_CATALOG: &[&str] = &["moveP", "grip"];

/// Options for initializing a .sas directory.
#[derive(Debug, Clone)]
pub struct InitOptions {
    /// Target directory where .sas will be created.
    pub target_dir: PathBuf,

    /// Overwrite existing .sas directory if it exists.
    pub force: bool,

    /// Create a catalog with only the basic motion and gripper types.
    pub minimal: bool,
}

impl Default for InitOptions {
    fn default() -> Self {
        Self {
            target_dir: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            force: false,
            minimal: false,
        }
    }
}

/// Write the `.sas/` tree below `options.target_dir`.
///
/// ```text
/// .sas/
/// ├── config.toml
/// ├── parameters.yaml
/// ├── runs/
/// └── catalog/
///     ├── moveP.xml, moveP.md
///     ├── grip.xml, grip.md
///     └── loop, loop_end, if, if_end, wait (unless minimal)
/// ```
///
/// An existing `.sas/` is refused unless `force` is set; with `force` the
/// template files are rewritten in place and anything else is left alone.
pub async fn generate_sas_structure(options: InitOptions) -> InitResult<()> {
    let sas_dir = options.target_dir.join(".sas");

    if sas_dir.exists() && !options.force {
        return Err(InitError::DirectoryExists(sas_dir));
    }

    for sub in ["catalog", "runs"] {
        fs::create_dir_all(sas_dir.join(sub)).map_err(|source| InitError::DirectoryCreate {
            path: sas_dir.join(sub),
            source,
        })?;
    }

    write_template_file(&sas_dir, "config.toml")?;
    write_template_file(&sas_dir, "parameters.yaml")?;

    for path in list_templates("catalog/") {
        if options.minimal && !is_minimal_entry(&path) {
            continue;
        }
        write_template_file(&sas_dir, &path)?;
    }

    tracing::info!(dir = %sas_dir.display(), minimal = options.minimal, "initialized .sas directory");
    Ok(())
}

fn is_minimal_entry(path: &str) -> bool {
    Path::new(path)
        .file_stem()
        .and_then(|stem| stem.to_str())
        .is_some_and(|stem| MINIMAL_CATALOG.contains(&stem))
}

/// Write one embedded template below `sas_dir`, creating parent directories.
fn write_template_file(sas_dir: &Path, template_path: &str) -> InitResult<()> {
    let content = get_template(template_path)
        .ok_or_else(|| InitError::TemplateNotFound(template_path.to_string()))?;

    let target_path = sas_dir.join(template_path);

    if let Some(parent) = target_path.parent() {
        fs::create_dir_all(parent).map_err(|source| InitError::DirectoryCreate {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    fs::write(&target_path, content).map_err(|source| InitError::FileWrite {
        path: target_path,
        source,
    })
}
