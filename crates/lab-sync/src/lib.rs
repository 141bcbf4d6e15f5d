//! lab-sync: Synchronization and backup engine for remotely authored labs.
//!
//! This crate provides the core functionality for:
//! - Fingerprinting notebook-style lab content with volatile cell ids excluded
//! - Reading persisted version tags from either metadata nesting shape
//! - Materializing ancestor directories in the document store
//! - Backing up a diverged local copy before adopting the remote version
//! - DocumentStore and HostEditor trait abstractions

pub mod backup;
pub mod content;
pub mod editor;
pub mod engine;
pub mod fingerprint;
pub mod notebook;
pub mod paths;
pub mod store;

pub use backup::{BackupError, demote_to_backup};
pub use content::{LabContent, VERSION_TAG_KEY, is_blank, version_tag};
pub use editor::{EditorError, EditorWidget, HostEditor, ScriptedEditor};
pub use engine::{RemoteLab, SyncEngine, SyncError, SyncFlow, SyncOutcome};
pub use fingerprint::Fingerprint;
pub use notebook::{Cell, CellType, LabNotebook, canonical_cells};
pub use paths::{backup_path_for, ensure_parent_dirs};
pub use store::{DocumentKind, DocumentStore, InMemoryStore, StoreError, StoredDocument};
