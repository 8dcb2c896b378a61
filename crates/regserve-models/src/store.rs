//! On-disk persistence: one JSON file per model, `<dir>/<id>.<extension>`.
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::models::Model;

pub const DEFAULT_EXTENSION: &str = "model";
const FORMAT_VERSION: u32 = 1;
const TEMP_EXTENSION: &str = "tmp";

#[derive(Serialize)]
struct EnvelopeRef<'a> {
    format_version: u32,
    id: &'a str,
    model: &'a Model,
}

#[derive(Deserialize)]
struct Envelope {
    format_version: u32,
    id: String,
    model: Model,
}

/// Directory of persisted models.
#[derive(Debug, Clone)]
pub struct ModelStore {
    dir: PathBuf,
    extension: String,
}

impl ModelStore {
    /// Open (creating if needed) a store rooted at `dir`.
    pub fn open(dir: impl Into<PathBuf>, extension: &str) -> Result<Self, StoreError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|source| StoreError::Io {
            path: dir.clone(),
            source,
        })?;
        Ok(ModelStore {
            dir,
            extension: extension.trim_start_matches('.').to_string(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    pub fn path_for(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", id, self.extension))
    }

    fn temp_path_for(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{}.{}.{}", id, self.extension, TEMP_EXTENSION))
    }

    /// Serialise `model` and write it under `id`, replacing any previous file.
    pub fn save(&self, id: &str, model: &Model) -> Result<PathBuf, StoreError> {
        let bytes = self.encode(id, model)?;
        self.write(id, &bytes)
    }

    /// Serialise `model` into the bytes [`ModelStore::write`] expects.
    pub fn encode(&self, id: &str, model: &Model) -> Result<Vec<u8>, StoreError> {
        serde_json::to_vec(&EnvelopeRef {
            format_version: FORMAT_VERSION,
            id,
            model,
        })
        .map_err(|source| StoreError::Codec {
            path: self.path_for(id),
            source,
        })
    }

    /// Write already-encoded model bytes under `id`.
    pub fn write(&self, id: &str, bytes: &[u8]) -> Result<PathBuf, StoreError> {
        let path = self.path_for(id);
        // Written next to the target so the rename stays on one filesystem.
        let tmp = self.temp_path_for(id);
        fs::write(&tmp, bytes).map_err(|source| StoreError::Io {
            path: tmp.clone(),
            source,
        })?;
        fs::rename(&tmp, &path).map_err(|source| StoreError::Io {
            path: path.clone(),
            source,
        })?;

        log::debug!("Wrote {} bytes to {}", bytes.len(), path.display());
        Ok(path)
    }

    /// Read the model stored under `id`; `Ok(None)` when there is no file.
    pub fn load(&self, id: &str) -> Result<Option<Model>, StoreError> {
        let path = self.path_for(id);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(StoreError::Io { path, source }),
        };

        let envelope: Envelope =
            serde_json::from_slice(&bytes).map_err(|source| StoreError::Codec {
                path: path.clone(),
                source,
            })?;
        if envelope.format_version != FORMAT_VERSION {
            return Err(StoreError::Corrupt {
                path,
                reason: format!("unsupported format version {}", envelope.format_version),
            });
        }
        if envelope.id != id {
            return Err(StoreError::Corrupt {
                path,
                reason: format!("file holds model {:?}", envelope.id),
            });
        }
        Ok(Some(envelope.model))
    }

    /// Ids of every model file in the directory, sorted.
    pub fn persisted_ids(&self) -> Result<Vec<String>, StoreError> {
        let mut ids: Vec<String> = self
            .model_files()?
            .iter()
            .filter_map(|p| p.file_stem().and_then(|s| s.to_str()).map(str::to_string))
            .collect();
        ids.sort();
        Ok(ids)
    }

    /// Delete every model file, and any half-written temp file left next to
    /// one. Returns how many model files were removed.
    pub fn remove_all(&self) -> Result<usize, StoreError> {
        let files = self.model_files()?;
        let temps = self.temp_files()?;
        for path in files.iter().chain(&temps) {
            match fs::remove_file(path) {
                Ok(()) => {}
                // Already gone; nothing left to delete.
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(source) => {
                    return Err(StoreError::Io {
                        path: path.clone(),
                        source,
                    })
                }
            }
        }
        if !temps.is_empty() {
            log::debug!("Removed {} stale temp files", temps.len());
        }
        Ok(files.len())
    }

    fn model_files(&self) -> Result<Vec<PathBuf>, StoreError> {
        self.files_where(|path| {
            path.extension().and_then(|e| e.to_str()) == Some(self.extension.as_str())
        })
    }

    /// `<id>.<ext>.tmp` files left behind by an interrupted write.
    fn temp_files(&self) -> Result<Vec<PathBuf>, StoreError> {
        let suffix = format!(".{}.{}", self.extension, TEMP_EXTENSION);
        self.files_where(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .map_or(false, |n| n.ends_with(&suffix))
        })
    }

    fn files_where(&self, keep: impl Fn(&Path) -> bool) -> Result<Vec<PathBuf>, StoreError> {
        let io_err = |source: std::io::Error| StoreError::Io {
            path: self.dir.clone(),
            source,
        };
        let mut files = Vec::new();
        for entry in fs::read_dir(&self.dir).map_err(io_err)? {
            let path = entry.map_err(io_err)?.path();
            if path.is_file() && keep(&path) {
                files.push(path);
            }
        }
        Ok(files)
    }
}
