use std::collections::HashMap;
use std::sync::RwLock;

use crate::error::{StoreError, StoreResult};
use crate::traits::{validate_name, ContentStore};

/// In-memory content store for tests and embedding.
#[derive(Default)]
pub struct InMemoryContentStore {
    objects: RwLock<HashMap<String, Vec<u8>>>,
}

impl InMemoryContentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.objects.read().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn lock_error() -> StoreError {
    StoreError::Io(std::io::Error::new(
        std::io::ErrorKind::Other,
        "content store lock poisoned",
    ))
}

impl ContentStore for InMemoryContentStore {
    fn read(&self, name: &str) -> StoreResult<Vec<u8>> {
        validate_name(name)?;
        let objects = self.objects.read().map_err(|_| lock_error())?;
        objects
            .get(name)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(name.to_owned()))
    }

    fn write(&self, name: &str, data: &[u8]) -> StoreResult<()> {
        validate_name(name)?;
        let mut objects = self.objects.write().map_err(|_| lock_error())?;
        objects.insert(name.to_owned(), data.to_vec());
        Ok(())
    }

    fn exists(&self, name: &str) -> StoreResult<bool> {
        validate_name(name)?;
        let objects = self.objects.read().map_err(|_| lock_error())?;
        Ok(objects.contains_key(name))
    }
}
