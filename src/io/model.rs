//! Model store: fitted models keyed by `(name, region)` inside one directory.
//!
//! `<dir>/<name>.json` for the unpartitioned model, `<dir>/<name>_roi<code>.json`
//! for a region.

use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::StoreError;
use crate::fit::driver::FittedModel;
use crate::fit::region::Region;
use crate::io::atomic::{read_json, write_json_atomic};

#[derive(Debug, Clone)]
pub struct ModelStore {
    dir: PathBuf,
}

impl ModelStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, name: &str, region: Region) -> Result<PathBuf, StoreError> {
        check_model_name(name)?;
        let file = match region {
            Region::Full => format!("{name}.json"),
            other => format!("{name}_roi{}.json", other.code()),
        };
        Ok(self.dir.join(file))
    }

    pub fn save(&self, model: &FittedModel) -> Result<PathBuf, StoreError> {
        let path = self.path_for(&model.name, model.region)?;
        write_json_atomic(&path, model)?;
        info!(path = %path.display(), region = %model.region, "model saved");
        Ok(path)
    }

    pub fn load(&self, name: &str, region: Region) -> Result<FittedModel, StoreError> {
        load_model(&self.path_for(name, region)?)
    }
}

/// A model name must be a single plain file-name component.
pub fn check_model_name(name: &str) -> Result<(), StoreError> {
    let reason = if name.is_empty() {
        Some("empty")
    } else if name.contains(['/', '\\']) {
        Some("contains a path separator")
    } else if name == "." || name.contains("..") {
        Some("contains '..' or is '.'")
    } else if name.chars().any(char::is_control) {
        Some("contains control characters")
    } else {
        None
    };
    match reason {
        Some(reason) => Err(StoreError::InvalidName {
            name: name.to_string(),
            reason,
        }),
        None => Ok(()),
    }
}

/// Load a model file directly, independent of any store layout.
pub fn load_model(path: &Path) -> Result<FittedModel, StoreError> {
    read_json(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_names_follow_the_region_code() {
        let store = ModelStore::new("/models");
        assert_eq!(
            store.path_for("nn", Region::Full).unwrap(),
            PathBuf::from("/models/nn.json")
        );
        assert_eq!(
            store.path_for("nn", Region::LowerLeft).unwrap(),
            PathBuf::from("/models/nn_roi0.json")
        );
        assert_eq!(
            store.path_for("nn", Region::TopHalf).unwrap(),
            PathBuf::from("/models/nn_roi5.json")
        );
    }

    #[test]
    fn names_cannot_escape_the_store() {
        let store = ModelStore::new("/models");
        for name in ["../x", "a/b", "a\\b", "..", ".", ""] {
            assert!(
                matches!(
                    store.path_for(name, Region::Full),
                    Err(StoreError::InvalidName { .. })
                ),
                "{name:?} accepted"
            );
        }
        assert!(check_model_name("meteor-v2_final").is_ok());
    }
}
