//! Reconciliation engine: decide between create, open-existing, and
//! replace-with-backup for one document-open request.
//!
//! The decision sequence per invocation:
//!
//! 1. Validate the remote payload; nothing is mutated for an unusable remote
//! 2. Authoring flows delete a blank local placeholder outright
//! 3. Materialize ancestor directories
//! 4. No local copy: create and finish
//! 5. Equal version tags: keep the local copy, zero mutating calls
//! 6. Diverged tags: defer to local edits when the remote is not newer,
//!    otherwise ask the user and back up before replacing
//!
//! The engine is stateless between invocations and never retries. Callers
//! must serialize invocations per path: fetch, decide, rename, and create
//! are not atomic against the store, and a second in-flight invocation
//! could observe a half-migrated state. Once a rename begins the sequence
//! runs to completion or fails; a completed rename is not rolled back when
//! the subsequent create fails, because the demoted copy survives at the
//! backup path and the rename always precedes the create.

use serde_json::Value;
use thiserror::Error;
use tracing::{debug, error};

use crate::backup::{self, BackupError};
use crate::content::{self, LabContent, VERSION_TAG_KEY};
use crate::editor::{EditorError, EditorWidget, HostEditor};
use crate::fingerprint::Fingerprint;
use crate::notebook::LabNotebook;
use crate::paths;
use crate::store::{DocumentStore, StoreError};

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Remote lab content is not a valid notebook: {0}")]
    InvalidRemote(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Editor error: {0}")]
    Editor(#[from] EditorError),

    #[error("Backup error: {0}")]
    Backup(#[from] BackupError),
}

pub type Result<T> = std::result::Result<T, SyncError>;

/// Which flow is driving the synchronization.
///
/// One engine, one flag: only authoring flows clear an intentionally blank
/// placeholder before reconciling. Learner flows never delete anything
/// without a backup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncFlow {
    Authoring,
    Learner,
}

impl SyncFlow {
    fn deletes_blank_local(self) -> bool {
        matches!(self, SyncFlow::Authoring)
    }
}

/// The remote version of a lab, already fetched and deserialized by the
/// transport layer.
#[derive(Debug, Clone)]
pub struct RemoteLab {
    /// Target path in the document store.
    pub path: String,
    /// Remote document content.
    pub content: LabContent,
    /// Transport-layer last-modified timestamp in milliseconds since
    /// epoch, when the transport supplied one. A tie-breaker only; the
    /// version tags decide whether content diverged.
    pub modified_millis: Option<u64>,
}

/// Terminal outcome of one reconciliation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// No local copy existed; the remote version was created.
    Created,
    /// The local copy was kept and nothing was mutated.
    OpenedExisting,
    /// The local copy was demoted to its backup slot and the remote
    /// version created in its place.
    BackedUpAndReplaced { backup_path: String },
}

/// Reconciles a remote lab with the local copy at its target path.
pub struct SyncEngine<S, E> {
    store: S,
    editor: E,
}

impl<S: DocumentStore, E: HostEditor> SyncEngine<S, E> {
    pub fn new(store: S, editor: E) -> Self {
        Self { store, editor }
    }

    /// Run one reconciliation. See the module docs for the sequence.
    pub async fn sync(&self, remote: &RemoteLab, flow: SyncFlow) -> Result<SyncOutcome> {
        // Resolve the remote payload before touching the store; nothing is
        // created or renamed when the remote is unusable.
        let notebook = parse_remote(&remote.content)?;

        if flow.deletes_blank_local() {
            self.delete_if_blank(&remote.path).await?;
        }

        paths::ensure_parent_dirs(&self.store, &remote.path).await?;

        let local = match self.store.get(&remote.path).await {
            Ok(doc) => doc,
            Err(StoreError::NotFound(_)) => {
                debug!("no local copy of {}, creating", remote.path);
                self.create_with_tag(&remote.path, notebook).await?;
                return Ok(SyncOutcome::Created);
            }
            Err(err) => return Err(err.into()),
        };

        let local_modified = local.last_modified_millis;
        let local_tag = content::version_tag(&LabContent::Model(local.content));
        let remote_tag = remote_version_tag(&remote.content, &notebook);

        if local_tag == remote_tag {
            debug!("version tags match for {}, keeping local copy", remote.path);
            return Ok(SyncOutcome::OpenedExisting);
        }

        // Content diverged. The freshness signal only decides whether to
        // prompt: when the remote is not newer than the local file, the
        // local edits win without a dialog.
        if let Some(remote_millis) = remote.modified_millis {
            if remote_millis <= local_modified.unwrap_or(0) {
                debug!(
                    "local copy of {} is at least as recent as the remote, keeping it",
                    remote.path
                );
                return Ok(SyncOutcome::OpenedExisting);
            }
        }

        let backup_path = paths::backup_path_for(&remote.path);
        let accepted = self
            .editor
            .confirm(
                "Newer version of lab available",
                &format!(
                    "A newer version of \"{}\" is available. Load it? Your current copy will be kept at \"{}\".",
                    remote.path, backup_path
                ),
            )
            .await;
        if !accepted {
            debug!("user declined the newer version of {}", remote.path);
            return Ok(SyncOutcome::OpenedExisting);
        }

        let backup_path = backup::demote_to_backup(&self.store, &self.editor, &remote.path).await?;
        self.create_with_tag(&remote.path, notebook).await?;
        Ok(SyncOutcome::BackedUpAndReplaced { backup_path })
    }

    /// Blank pre-pass: an intentionally empty placeholder carries no user
    /// work, so it is deleted outright instead of backed up.
    async fn delete_if_blank(&self, path: &str) -> Result<()> {
        let local = match self.store.get(path).await {
            Ok(doc) => doc,
            Err(StoreError::NotFound(_)) => return Ok(()),
            Err(err) => return Err(err.into()),
        };

        if !content::is_blank(&LabContent::Model(local.content)) {
            return Ok(());
        }

        if let Some(mut widget) = self.editor.find_widget(path).await {
            widget.close().await?;
        }
        debug!("deleting blank local copy of {}", path);
        self.store.delete(path).await?;
        Ok(())
    }

    /// Stamp the version tag and create the document.
    ///
    /// A remote that already carries a tag keeps it; otherwise the freshly
    /// computed fingerprint is written, so the stored tag always reflects
    /// the content hash at the time of this reconciliation.
    async fn create_with_tag(&self, path: &str, mut notebook: LabNotebook) -> Result<()> {
        let carries_tag = notebook
            .metadata
            .get(VERSION_TAG_KEY)
            .and_then(Value::as_str)
            .is_some_and(|tag| !tag.is_empty());
        if !carries_tag {
            let fingerprint = Fingerprint::of_cells(&notebook);
            notebook.metadata.insert(
                VERSION_TAG_KEY.to_string(),
                Value::String(fingerprint.into_string()),
            );
        }

        if let Err(err) = self.store.create(path, &notebook).await {
            error!("failed to create {}: {}", path, err);
            return Err(err.into());
        }
        Ok(())
    }
}

/// Version tag the remote content carries, or a freshly computed
/// fingerprint when the remote has not been published with one yet.
fn remote_version_tag(remote: &LabContent, notebook: &LabNotebook) -> String {
    let tag = content::version_tag(remote);
    if !tag.is_empty() {
        return tag;
    }
    Fingerprint::of_cells(notebook).into_string()
}

fn parse_remote(remote: &LabContent) -> Result<LabNotebook> {
    let value = match remote {
        LabContent::Model(value) => value.clone(),
        LabContent::Raw(text) => {
            serde_json::from_str(text).map_err(|err| SyncError::InvalidRemote(err.to_string()))?
        }
    };
    serde_json::from_value(value).map_err(|err| SyncError::InvalidRemote(err.to_string()))
}
