//! JSON files committed atomically.
//!
//! The document is written to `<path>.partial`, flushed and synced, then
//! renamed over `<path>`. Readers never see a half-written file; a crash
//! leaves at most a stale `.partial` next to the previous version.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::StoreError;

pub fn partial_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".partial");
    PathBuf::from(name)
}

pub fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<(), StoreError> {
    let io_err = |p: &Path| {
        let p = p.to_path_buf();
        move |source| StoreError::Io { path: p, source }
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(io_err(parent))?;
    }

    let tmp = partial_path(path);
    let file = File::create(&tmp).map_err(io_err(&tmp))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, value).map_err(|source| StoreError::Format {
        path: tmp.clone(),
        source,
    })?;
    writer.flush().map_err(io_err(&tmp))?;
    let file = writer
        .into_inner()
        .map_err(|e| StoreError::Io {
            path: tmp.clone(),
            source: e.into_error(),
        })?;
    file.sync_all().map_err(io_err(&tmp))?;
    drop(file);

    fs::rename(&tmp, path).map_err(io_err(path))?;
    Ok(())
}

pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, StoreError> {
    let file = File::open(path).map_err(|source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_reader(BufReader::new(file)).map_err(|source| StoreError::Format {
        path: path.to_path_buf(),
        source,
    })
}
