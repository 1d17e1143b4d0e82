//! Dataset files: the full `Dataset` (config, metadata, trials) as pretty JSON.

use std::path::Path;

use tracing::info;

use crate::domain::Dataset;
use crate::error::StoreError;
use crate::io::atomic::{read_json, write_json_atomic};

pub fn write_dataset(path: &Path, dataset: &Dataset) -> Result<(), StoreError> {
    write_json_atomic(path, dataset)?;
    info!(path = %path.display(), trials = dataset.len(), "dataset written");
    Ok(())
}

pub fn read_dataset(path: &Path) -> Result<Dataset, StoreError> {
    let dataset: Dataset = read_json(path)?;
    info!(path = %path.display(), trials = dataset.len(), "dataset loaded");
    Ok(dataset)
}
