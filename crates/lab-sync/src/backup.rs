//! Backup manager: demote the current local copy into the single backup
//! slot before the engine writes the new version.

use thiserror::Error;
use tracing::debug;

use crate::editor::{EditorError, EditorWidget, HostEditor};
use crate::paths::backup_path_for;
use crate::store::{DocumentStore, StoreError};

#[derive(Debug, Error)]
pub enum BackupError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Editor error: {0}")]
    Editor(#[from] EditorError),
}

pub type Result<T> = std::result::Result<T, BackupError>;

/// Demote the document at `path` into its backup slot.
///
/// Whatever occupies the slot is evicted first: one backup per logical
/// document, no history chain. An open widget bound to the path is saved
/// when dirty and then closed, so the host releases its handle before the
/// rename. A save failure aborts before the rename, since renaming content
/// that failed to save would silently lose the edits. Returns the backup
/// path.
pub async fn demote_to_backup<S, E>(store: &S, editor: &E, path: &str) -> Result<String>
where
    S: DocumentStore,
    E: HostEditor,
{
    let backup_path = backup_path_for(path);

    match store.get(&backup_path).await {
        Ok(_) => {
            debug!("evicting previous backup at {}", backup_path);
            store.delete(&backup_path).await?;
        }
        Err(StoreError::NotFound(_)) => {}
        Err(err) => return Err(err.into()),
    }

    if let Some(mut widget) = editor.find_widget(path).await {
        if widget.is_dirty() {
            widget.save().await?;
        }
        widget.close().await?;
    }

    store.rename(path, &backup_path).await?;
    Ok(backup_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::editor::ScriptedEditor;
    use crate::store::InMemoryStore;
    use serde_json::json;
    use std::sync::{Arc, Mutex};

    fn store_and_editor() -> (InMemoryStore, ScriptedEditor) {
        let log = Arc::new(Mutex::new(Vec::new()));
        (
            InMemoryStore::with_log(Arc::clone(&log)),
            ScriptedEditor::with_log(log),
        )
    }

    #[tokio::test]
    async fn test_demote_renames_into_backup_slot() {
        let (store, editor) = store_and_editor();
        store.seed("lab.ipynb", json!({"cells": []}));

        let backup = demote_to_backup(&store, &editor, "lab.ipynb")
            .await
            .unwrap();

        assert_eq!(backup, "lab.backup.ipynb");
        assert!(store.get("lab.backup.ipynb").await.is_ok());
        assert!(store.get("lab.ipynb").await.is_err());
    }

    #[tokio::test]
    async fn test_prior_backup_evicted_before_rename() {
        let (store, editor) = store_and_editor();
        store.seed("lab.ipynb", json!({"cells": []}));
        store.seed("lab.backup.ipynb", json!({"cells": ["old"]}));

        demote_to_backup(&store, &editor, "lab.ipynb").await.unwrap();

        assert_eq!(
            store.ops(),
            vec![
                "delete lab.backup.ipynb".to_string(),
                "rename lab.ipynb -> lab.backup.ipynb".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_dirty_widget_saved_before_close_before_rename() {
        let (store, editor) = store_and_editor();
        store.seed("lab.ipynb", json!({"cells": []}));
        editor.open_widget("lab.ipynb", true);

        demote_to_backup(&store, &editor, "lab.ipynb").await.unwrap();

        assert_eq!(
            store.ops(),
            vec![
                "save lab.ipynb".to_string(),
                "close lab.ipynb".to_string(),
                "rename lab.ipynb -> lab.backup.ipynb".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_clean_widget_closed_without_save() {
        let (store, editor) = store_and_editor();
        store.seed("lab.ipynb", json!({"cells": []}));
        editor.open_widget("lab.ipynb", false);

        demote_to_backup(&store, &editor, "lab.ipynb").await.unwrap();

        assert_eq!(
            store.ops(),
            vec![
                "close lab.ipynb".to_string(),
                "rename lab.ipynb -> lab.backup.ipynb".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_save_failure_aborts_before_rename() {
        let (store, editor) = store_and_editor();
        store.seed("lab.ipynb", json!({"cells": []}));
        editor.open_widget("lab.ipynb", true);
        editor.fail_save("lab.ipynb");

        let result = demote_to_backup(&store, &editor, "lab.ipynb").await;

        assert!(matches!(result, Err(BackupError::Editor(_))));
        // The local copy was not touched.
        assert!(store.get("lab.ipynb").await.is_ok());
        assert!(store.ops().is_empty());
    }
}
