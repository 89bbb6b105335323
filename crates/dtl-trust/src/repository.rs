use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Mutex, RwLock};

use serde::{Deserialize, Serialize};

use dtl_store::JsonSnapshotFile;
use dtl_types::{DocumentId, UserId};

use crate::document::Document;
use crate::error::{TrustError, TrustResult};

/// Persistence of document records.
///
/// `save` inserts or replaces by document id.
pub trait DocumentRepository: Send + Sync {
    fn get(&self, id: &DocumentId) -> TrustResult<Option<Document>>;

    fn save(&self, document: &Document) -> TrustResult<()>;

    /// Documents owned by `owner`, oldest upload first.
    fn list_for_owner(&self, owner: &UserId) -> TrustResult<Vec<Document>>;
}

fn poisoned() -> TrustError {
    TrustError::Internal("document repository lock poisoned".into())
}

fn by_upload_time(mut documents: Vec<Document>) -> Vec<Document> {
    documents.sort_by(|a, b| a.uploaded_at.cmp(&b.uploaded_at));
    documents
}

/// `HashMap`-backed repository for tests and embedding.
#[derive(Default)]
pub struct InMemoryDocumentRepository {
    documents: RwLock<HashMap<DocumentId, Document>>,
}

impl InMemoryDocumentRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DocumentRepository for InMemoryDocumentRepository {
    fn get(&self, id: &DocumentId) -> TrustResult<Option<Document>> {
        let documents = self.documents.read().map_err(|_| poisoned())?;
        Ok(documents.get(id).cloned())
    }

    fn save(&self, document: &Document) -> TrustResult<()> {
        let mut documents = self.documents.write().map_err(|_| poisoned())?;
        documents.insert(document.id.clone(), document.clone());
        Ok(())
    }

    fn list_for_owner(&self, owner: &UserId) -> TrustResult<Vec<Document>> {
        let documents = self.documents.read().map_err(|_| poisoned())?;
        Ok(by_upload_time(
            documents
                .values()
                .filter(|d| d.is_owned_by(owner))
                .cloned()
                .collect(),
        ))
    }
}

/// On-disk shape of the document database.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentDatabase {
    #[serde(default)]
    pub documents: Vec<Document>,
}

/// Repository kept as one JSON snapshot file.
///
/// Every `save` is a whole-file read-modify-overwrite; the internal mutex
/// serializes those within this process.
pub struct JsonDocumentRepository {
    file: JsonSnapshotFile<DocumentDatabase>,
    write_lock: Mutex<()>,
}

impl JsonDocumentRepository {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            file: JsonSnapshotFile::new(path),
            write_lock: Mutex::new(()),
        }
    }
}

impl DocumentRepository for JsonDocumentRepository {
    fn get(&self, id: &DocumentId) -> TrustResult<Option<Document>> {
        let db = self.file.load()?;
        Ok(db.documents.into_iter().find(|d| &d.id == id))
    }

    fn save(&self, document: &Document) -> TrustResult<()> {
        let _guard = self.write_lock.lock().map_err(|_| poisoned())?;
        self.file.update(|db| {
            match db.documents.iter_mut().find(|d| d.id == document.id) {
                Some(existing) => *existing = document.clone(),
                None => db.documents.push(document.clone()),
            }
        })?;
        Ok(())
    }

    fn list_for_owner(&self, owner: &UserId) -> TrustResult<Vec<Document>> {
        let db = self.file.load()?;
        Ok(by_upload_time(
            db.documents
                .into_iter()
                .filter(|d| d.is_owned_by(owner))
                .collect(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exercise(repo: &dyn DocumentRepository) {
        let alice = UserId::new("alice");
        let mut a = Document::new("a.txt", alice.clone(), b"a", false);
        let b = Document::new("b.txt", alice.clone(), b"b", false);
        let c = Document::new("c.txt", UserId::new("bob"), b"c", false);

        assert!(repo.get(&a.id).unwrap().is_none());
        repo.save(&a).unwrap();
        repo.save(&b).unwrap();
        repo.save(&c).unwrap();
        assert_eq!(repo.get(&a.id).unwrap(), Some(a.clone()));

        a.mark_registered(3);
        repo.save(&a).unwrap();
        assert_eq!(repo.get(&a.id).unwrap().unwrap().ledger_block_index, Some(3));

        let owned = repo.list_for_owner(&alice).unwrap();
        assert_eq!(owned.len(), 2);
        assert!(owned.iter().all(|d| d.user_id == alice));
        assert_eq!(repo.list_for_owner(&UserId::new("nobody")).unwrap(), vec![]);
    }

    #[test]
    fn in_memory_repository() {
        exercise(&InMemoryDocumentRepository::new());
    }

    #[test]
    fn json_repository() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("database.json");
        exercise(&JsonDocumentRepository::new(&path));

        let db: DocumentDatabase =
            serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(db.documents.len(), 3);
    }
}
