use std::fs;
use std::io::{ErrorKind, Write};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::error::{StoreError, StoreResult};

/// A JSON document read and written as one whole snapshot.
///
/// There is no optimistic concurrency control: `save` overwrites whatever
/// is on disk. Callers that need read-modify-write atomicity serialize
/// around `load` + `save` themselves.
pub struct JsonSnapshotFile<T> {
    path: PathBuf,
    _marker: PhantomData<fn() -> T>,
}

impl<T> JsonSnapshotFile<T>
where
    T: Serialize + DeserializeOwned + Default,
{
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            _marker: PhantomData,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns `true` if the snapshot file exists.
    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Read the snapshot. A missing file yields `T::default()`.
    pub fn load(&self) -> StoreResult<T> {
        match fs::read(&self.path) {
            Ok(data) => {
                serde_json::from_slice(&data).map_err(|e| StoreError::Serialization(e.to_string()))
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(T::default()),
            Err(e) => Err(e.into()),
        }
    }

    /// Overwrite the snapshot with `value` as pretty-printed JSON.
    pub fn save(&self, value: &T) -> StoreResult<()> {
        let json =
            serde_json::to_vec_pretty(value).map_err(|e| StoreError::Serialization(e.to_string()))?;
        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir)?;
        let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
        tmp.write_all(&json)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| StoreError::Io(e.error))?;
        debug!(path = %self.path.display(), bytes = json.len(), "snapshot saved");
        Ok(())
    }

    /// Load, apply `f`, save. Returns whatever `f` returns.
    pub fn update<R>(&self, f: impl FnOnce(&mut T) -> R) -> StoreResult<R> {
        let mut value = self.load()?;
        let out = f(&mut value);
        self.save(&value)?;
        Ok(out)
    }
}
