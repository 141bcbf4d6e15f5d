//! DocumentStore trait abstraction over the host's contents API.
//!
//! Implementations:
//! - `InMemoryStore` - For testing
//! - Host-side adapters (e.g. over a contents REST service) live with the
//!   host integration, not in this crate.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use thiserror::Error;

use crate::notebook::LabNotebook;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Document not found: {0}")]
    NotFound(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("IO error: {0}")]
    Io(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// What `create_untitled` should produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Directory,
    Notebook,
}

/// A document as returned by the store.
#[derive(Debug, Clone)]
pub struct StoredDocument {
    /// Store path; a document has no identity beyond it.
    pub path: String,
    /// Raw document value. The shape varies by host (wrapped or unwrapped),
    /// so inspection goes through [`crate::content`].
    pub content: Value,
    /// Last-modified time in milliseconds since epoch, when the store
    /// tracks one.
    pub last_modified_millis: Option<u64>,
}

/// Host-independent document store abstraction.
///
/// All operations suspend on the host's storage backend. `get`
/// distinguishes absence (`StoreError::NotFound`) from IO failure so that
/// callers can treat absence as a normal case and still propagate real
/// failures.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Fetch the document or directory at a path.
    async fn get(&self, path: &str) -> Result<StoredDocument>;

    /// Create a document at a path with the given notebook content.
    async fn create(&self, path: &str, notebook: &LabNotebook) -> Result<StoredDocument>;

    /// Create a new untitled document of the given kind; the store picks
    /// the initial path.
    async fn create_untitled(&self, kind: DocumentKind) -> Result<StoredDocument>;

    /// Rename a document or directory. Fails if the target is occupied.
    async fn rename(&self, old_path: &str, new_path: &str) -> Result<()>;

    /// Delete a document or directory.
    async fn delete(&self, path: &str) -> Result<()>;
}

// Implement DocumentStore for Arc<T> where T: DocumentStore.
// This lets tests keep a handle on the store they hand to the engine.
#[async_trait]
impl<T: DocumentStore> DocumentStore for Arc<T> {
    async fn get(&self, path: &str) -> Result<StoredDocument> {
        (**self).get(path).await
    }

    async fn create(&self, path: &str, notebook: &LabNotebook) -> Result<StoredDocument> {
        (**self).create(path, notebook).await
    }

    async fn create_untitled(&self, kind: DocumentKind) -> Result<StoredDocument> {
        (**self).create_untitled(kind).await
    }

    async fn rename(&self, old_path: &str, new_path: &str) -> Result<()> {
        (**self).rename(old_path, new_path).await
    }

    async fn delete(&self, path: &str) -> Result<()> {
        (**self).delete(path).await
    }
}

/// In-memory document store for testing.
///
/// Every mutating operation is appended to an ordered log so tests can
/// assert on call counts and ordering. The log can be shared with other
/// doubles (see `ScriptedEditor`) to observe cross-component ordering.
pub struct InMemoryStore {
    docs: RwLock<HashMap<String, Value>>,
    dirs: RwLock<HashSet<String>>,
    /// Tracks document modification times (path -> mtime in ms)
    modified: RwLock<HashMap<String, u64>>,
    untitled_seq: AtomicU64,
    ops: Arc<Mutex<Vec<String>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::with_log(Arc::new(Mutex::new(Vec::new())))
    }

    /// Create a store that appends its operations to a shared log.
    pub fn with_log(ops: Arc<Mutex<Vec<String>>>) -> Self {
        let mut dirs = HashSet::new();
        dirs.insert(String::new()); // Root directory
        Self {
            docs: RwLock::new(HashMap::new()),
            dirs: RwLock::new(dirs),
            modified: RwLock::new(HashMap::new()),
            untitled_seq: AtomicU64::new(0),
            ops,
        }
    }

    /// Seed a document without logging, creating ancestor directories.
    pub fn seed(&self, path: &str, content: Value) {
        let path = Self::normalize_path(path);
        if let Some((dirname, _)) = path.rsplit_once('/') {
            let mut dirs = self.dirs.write().unwrap();
            let mut prefix = String::new();
            for segment in dirname.split('/') {
                prefix = if prefix.is_empty() {
                    segment.to_string()
                } else {
                    format!("{}/{}", prefix, segment)
                };
                dirs.insert(prefix.clone());
            }
        }
        self.docs.write().unwrap().insert(path, content);
    }

    /// Set a specific mtime for freshness scenarios.
    pub fn set_modified(&self, path: &str, millis: u64) {
        let path = Self::normalize_path(path);
        self.modified.write().unwrap().insert(path, millis);
    }

    /// Snapshot of the mutating operations performed so far.
    pub fn ops(&self) -> Vec<String> {
        self.ops.lock().unwrap().clone()
    }

    fn log(&self, op: String) {
        self.ops.lock().unwrap().push(op);
    }

    /// Get current time in milliseconds.
    fn current_time_ms() -> u64 {
        use std::time::{SystemTime, UNIX_EPOCH};
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_millis() as u64
    }

    fn normalize_path(path: &str) -> String {
        path.trim_matches('/')
            .split('/')
            .filter(|segment| !segment.is_empty() && *segment != ".")
            .collect::<Vec<_>>()
            .join("/")
    }

    fn parent_path(path: &str) -> Option<String> {
        if path.is_empty() {
            None
        } else {
            match path.rfind('/') {
                Some(pos) => Some(path[..pos].to_string()),
                None => Some(String::new()),
            }
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentStore for InMemoryStore {
    async fn get(&self, path: &str) -> Result<StoredDocument> {
        let path = Self::normalize_path(path);

        if let Some(content) = self.docs.read().unwrap().get(&path) {
            let last_modified = self.modified.read().unwrap().get(&path).copied();
            return Ok(StoredDocument {
                path,
                content: content.clone(),
                last_modified_millis: last_modified,
            });
        }

        if self.dirs.read().unwrap().contains(&path) {
            return Ok(StoredDocument {
                path,
                content: Value::Null,
                last_modified_millis: None,
            });
        }

        Err(StoreError::NotFound(path))
    }

    async fn create(&self, path: &str, notebook: &LabNotebook) -> Result<StoredDocument> {
        let path = Self::normalize_path(path);

        if self.docs.read().unwrap().contains_key(&path)
            || self.dirs.read().unwrap().contains(&path)
        {
            return Err(StoreError::AlreadyExists(path));
        }

        // The host contents API refuses to create into a missing directory.
        if let Some(parent) = Self::parent_path(&path) {
            if !self.dirs.read().unwrap().contains(&parent) {
                return Err(StoreError::NotFound(parent));
            }
        }

        let content = serde_json::to_value(notebook).map_err(|e| StoreError::Io(e.to_string()))?;
        let now = Self::current_time_ms();
        self.docs
            .write()
            .unwrap()
            .insert(path.clone(), content.clone());
        self.modified.write().unwrap().insert(path.clone(), now);

        self.log(format!("create {}", path));
        Ok(StoredDocument {
            path,
            content,
            last_modified_millis: Some(now),
        })
    }

    async fn create_untitled(&self, kind: DocumentKind) -> Result<StoredDocument> {
        let seq = self.untitled_seq.fetch_add(1, Ordering::SeqCst);

        let (path, content) = match kind {
            DocumentKind::Directory => {
                let path = format!("untitled-folder-{}", seq);
                self.dirs.write().unwrap().insert(path.clone());
                (path, Value::Null)
            }
            DocumentKind::Notebook => {
                let path = format!("untitled-{}.ipynb", seq);
                let content = serde_json::to_value(LabNotebook::new(Vec::new()))
                    .map_err(|e| StoreError::Io(e.to_string()))?;
                self.docs
                    .write()
                    .unwrap()
                    .insert(path.clone(), content.clone());
                (path, content)
            }
        };

        self.log(format!("create_untitled {}", path));
        Ok(StoredDocument {
            path,
            content,
            last_modified_millis: None,
        })
    }

    async fn rename(&self, old_path: &str, new_path: &str) -> Result<()> {
        let old_path = Self::normalize_path(old_path);
        let new_path = Self::normalize_path(new_path);

        if self.docs.read().unwrap().contains_key(&new_path)
            || self.dirs.read().unwrap().contains(&new_path)
        {
            return Err(StoreError::AlreadyExists(new_path));
        }

        {
            let mut docs = self.docs.write().unwrap();
            if let Some(content) = docs.remove(&old_path) {
                docs.insert(new_path.clone(), content);
                drop(docs);

                let mut modified = self.modified.write().unwrap();
                if let Some(mtime) = modified.remove(&old_path) {
                    modified.insert(new_path.clone(), mtime);
                }

                self.log(format!("rename {} -> {}", old_path, new_path));
                return Ok(());
            }
        }

        {
            let mut dirs = self.dirs.write().unwrap();
            if dirs.remove(&old_path) {
                dirs.insert(new_path.clone());
                drop(dirs);

                // Re-root anything living under the renamed directory.
                let prefix = format!("{}/", old_path);
                let mut docs = self.docs.write().unwrap();
                let nested: Vec<String> = docs
                    .keys()
                    .filter(|p| p.starts_with(&prefix))
                    .cloned()
                    .collect();
                for path in nested {
                    let moved = format!("{}/{}", new_path, &path[prefix.len()..]);
                    let content = docs.remove(&path).unwrap();
                    docs.insert(moved, content);
                }
                drop(docs);

                let mut dirs = self.dirs.write().unwrap();
                let nested: Vec<String> = dirs
                    .iter()
                    .filter(|p| p.starts_with(&prefix))
                    .cloned()
                    .collect();
                for path in nested {
                    dirs.remove(&path);
                    dirs.insert(format!("{}/{}", new_path, &path[prefix.len()..]));
                }

                self.log(format!("rename {} -> {}", old_path, new_path));
                return Ok(());
            }
        }

        Err(StoreError::NotFound(old_path))
    }

    async fn delete(&self, path: &str) -> Result<()> {
        let path = Self::normalize_path(path);

        // Try to delete as document first
        {
            let mut docs = self.docs.write().unwrap();
            if docs.remove(&path).is_some() {
                self.modified.write().unwrap().remove(&path);
                self.log(format!("delete {}", path));
                return Ok(());
            }
        }

        // Try to delete as directory
        {
            let mut dirs = self.dirs.write().unwrap();
            if dirs.remove(&path) {
                self.log(format!("delete {}", path));
                return Ok(());
            }
        }

        Err(StoreError::NotFound(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notebook::{Cell, CellType};

    #[tokio::test]
    async fn test_create_and_get() {
        let store = InMemoryStore::new();
        let notebook = LabNotebook::new(vec![Cell::new(CellType::Code, &["x = 1"])]);

        store.create("lab.ipynb", &notebook).await.unwrap();

        let doc = store.get("lab.ipynb").await.unwrap();
        assert_eq!(doc.path, "lab.ipynb");
        assert_eq!(doc.content["cells"][0]["source"][0], "x = 1");
    }

    #[tokio::test]
    async fn test_get_missing_is_not_found() {
        let store = InMemoryStore::new();
        assert!(matches!(
            store.get("missing.ipynb").await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_create_into_missing_directory_fails() {
        let store = InMemoryStore::new();
        let notebook = LabNotebook::new(Vec::new());

        let result = store.create("labs/week1/lab.ipynb", &notebook).await;
        assert!(matches!(result, Err(StoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_rename_refuses_occupied_target() {
        let store = InMemoryStore::new();
        let notebook = LabNotebook::new(Vec::new());
        store.create("a.ipynb", &notebook).await.unwrap();
        store.create("b.ipynb", &notebook).await.unwrap();

        assert!(matches!(
            store.rename("a.ipynb", "b.ipynb").await,
            Err(StoreError::AlreadyExists(_))
        ));
    }

    #[tokio::test]
    async fn test_rename_directory_moves_children() {
        let store = InMemoryStore::new();
        let untitled = store
            .create_untitled(DocumentKind::Directory)
            .await
            .unwrap();
        store.rename(&untitled.path, "labs").await.unwrap();
        store
            .create("labs/lab.ipynb", &LabNotebook::new(Vec::new()))
            .await
            .unwrap();

        store.rename("labs", "archive").await.unwrap();

        assert!(store.get("archive/lab.ipynb").await.is_ok());
        assert!(matches!(
            store.get("labs/lab.ipynb").await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_ops_log_records_mutations_in_order() {
        let store = InMemoryStore::new();
        let notebook = LabNotebook::new(Vec::new());

        store.create("a.ipynb", &notebook).await.unwrap();
        store.rename("a.ipynb", "b.ipynb").await.unwrap();
        store.delete("b.ipynb").await.unwrap();

        assert_eq!(
            store.ops(),
            vec![
                "create a.ipynb".to_string(),
                "rename a.ipynb -> b.ipynb".to_string(),
                "delete b.ipynb".to_string(),
            ]
        );
    }
}
