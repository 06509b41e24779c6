//! YAML-backed parameter store with bounded slot lists.
//!
//! ```yaml
//! points:
//!   - { id: P1, label: home }
//!   - { id: P2, label: "" }
//! numbers:
//!   - { id: N1, label: "" }
//! flags:
//!   - { id: F1, label: "" }
//! ```

use sas_protocol::{ParameterKind, ParameterSettings, Slot};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Failed to read parameter store at {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse parameter store at {path}: {source}")]
    YamlParse {
        path: PathBuf,
        source: serde_yaml::Error,
    },

    #[error("Failed to write parameter store at {path}: {reason}")]
    FileWrite { path: PathBuf, reason: String },

    #[error("No {kind} slot with id {slot_id}")]
    UnknownSlot { kind: &'static str, slot_id: String },
}

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct ParameterStore {
    #[serde(default)]
    pub points: Vec<Slot>,
    #[serde(default)]
    pub numbers: Vec<Slot>,
    #[serde(default)]
    pub flags: Vec<Slot>,
}

impl ParameterStore {
    /// An empty store with `P1..Pn`, `N1..Nm`, `F1..Fk`.
    pub fn with_capacity(points: usize, numbers: usize, flags: usize) -> Self {
        let mut store = Self::default();
        store.ensure_capacity(ParameterKind::Point, points);
        store.ensure_capacity(ParameterKind::Number, numbers);
        store.ensure_capacity(ParameterKind::Flag, flags);
        store
    }

    pub fn from_settings(settings: &ParameterSettings) -> Self {
        Self::with_capacity(settings.point_slots, settings.number_slots, settings.flag_slots)
    }

    /// Load `path`, or build an empty store when the file does not exist.
    ///
    /// Slot lists shorter than the configured capacity are padded with free
    /// slots; longer lists are kept as they are.
    pub fn load_or_default(path: &Path, settings: &ParameterSettings) -> StoreResult<Self> {
        if !path.exists() {
            return Ok(Self::from_settings(settings));
        }

        let content = std::fs::read_to_string(path).map_err(|source| StoreError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;

        let mut store: Self = if content.trim().is_empty() {
            Self::default()
        } else {
            serde_yaml::from_str(&content).map_err(|source| StoreError::YamlParse {
                path: path.to_path_buf(),
                source,
            })?
        };

        store.ensure_capacity(ParameterKind::Point, settings.point_slots);
        store.ensure_capacity(ParameterKind::Number, settings.number_slots);
        store.ensure_capacity(ParameterKind::Flag, settings.flag_slots);
        Ok(store)
    }

    /// Write the store to `path` by replacing it atomically.
    pub fn save(&self, path: &Path) -> StoreResult<()> {
        let write_error = |reason: String| StoreError::FileWrite {
            path: path.to_path_buf(),
            reason,
        };

        let parent = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&parent).map_err(|e| write_error(e.to_string()))?;

        let yaml = serde_yaml::to_string(self).map_err(|e| write_error(e.to_string()))?;

        let mut temp = tempfile::NamedTempFile::new_in(&parent).map_err(|e| write_error(e.to_string()))?;
        temp.write_all(yaml.as_bytes())
            .map_err(|e| write_error(e.to_string()))?;
        temp.flush().map_err(|e| write_error(e.to_string()))?;
        temp.persist(path).map_err(|e| write_error(e.error.to_string()))?;
        Ok(())
    }

    pub fn slots(&self, kind: ParameterKind) -> &[Slot] {
        match kind {
            ParameterKind::Point => &self.points,
            ParameterKind::Number => &self.numbers,
            ParameterKind::Flag => &self.flags,
        }
    }

    fn slots_mut(&mut self, kind: ParameterKind) -> &mut Vec<Slot> {
        match kind {
            ParameterKind::Point => &mut self.points,
            ParameterKind::Number => &mut self.numbers,
            ParameterKind::Flag => &mut self.flags,
        }
    }

    /// First free slot of `kind`, in id order.
    pub fn first_free(&self, kind: ParameterKind) -> Option<&Slot> {
        self.slots(kind).iter().find(|slot| slot.is_free())
    }

    /// Label `slot_id` with `label`.
    pub fn claim(&mut self, kind: ParameterKind, slot_id: &str, label: &str) -> StoreResult<()> {
        let slot = self
            .slots_mut(kind)
            .iter_mut()
            .find(|slot| slot.id == slot_id)
            .ok_or_else(|| StoreError::UnknownSlot {
                kind: kind.label(),
                slot_id: slot_id.to_string(),
            })?;
        slot.label = label.to_string();
        Ok(())
    }

    fn ensure_capacity(&mut self, kind: ParameterKind, capacity: usize) {
        let slots = self.slots_mut(kind);
        let mut next = slots.len() + 1;
        while slots.len() < capacity {
            let id = format!("{}{}", kind.slot_prefix(), next);
            if !slots.iter().any(|slot| slot.id == id) {
                slots.push(Slot {
                    id,
                    label: String::new(),
                });
            }
            next += 1;
        }
    }
}
