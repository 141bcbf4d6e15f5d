//! Path utilities: ancestor materialization and the backup naming
//! convention.

use tracing::debug;

use crate::store::{DocumentKind, DocumentStore, Result, StoreError};

/// Reserved suffix inserted before the extension of a demoted document.
pub const BACKUP_SUFFIX: &str = "backup";

/// Ordered ancestor directory paths for a target path, root-most first.
///
/// `"a/b/c.ipynb"` yields `["a", "a/b"]`. Leading slashes and `.` segments
/// are ignored.
pub fn ancestor_dirs(path: &str) -> Vec<String> {
    let trimmed = path.trim_matches('/');
    let Some((dirname, _)) = trimmed.rsplit_once('/') else {
        return Vec::new();
    };

    let mut dirs = Vec::new();
    let mut prefix = String::new();
    for segment in dirname
        .split('/')
        .filter(|segment| !segment.is_empty() && *segment != ".")
    {
        prefix = if prefix.is_empty() {
            segment.to_string()
        } else {
            format!("{}/{}", prefix, segment)
        };
        dirs.push(prefix.clone());
    }
    dirs
}

/// Ensure every ancestor directory of `path` exists in the store.
///
/// Missing levels are created one at a time: a new untitled directory is
/// renamed into place at the exact ancestor path. Re-running on an already
/// materialized path performs no mutating store calls.
pub async fn ensure_parent_dirs<S: DocumentStore>(store: &S, path: &str) -> Result<()> {
    for dir in ancestor_dirs(path) {
        match store.get(&dir).await {
            Ok(_) => {}
            Err(StoreError::NotFound(_)) => {
                debug!("creating directory {}", dir);
                let untitled = store.create_untitled(DocumentKind::Directory).await?;
                store.rename(&untitled.path, &dir).await?;
            }
            Err(err) => return Err(err),
        }
    }
    Ok(())
}

/// Backup slot path for a document: the reserved suffix goes before the
/// final extension, the rest of the path is unchanged.
///
/// `name.ext` becomes `name.backup.ext`; an extensionless path gains a
/// bare `.backup` suffix. Single slot, case-sensitive.
pub fn backup_path_for(path: &str) -> String {
    let name_start = path.rfind('/').map_or(0, |pos| pos + 1);
    match path[name_start..].rfind('.') {
        Some(dot) => {
            let dot = name_start + dot;
            format!(
                "{}.{}.{}",
                &path[..dot],
                BACKUP_SUFFIX,
                &path[dot + 1..]
            )
        }
        None => format!("{}.{}", path, BACKUP_SUFFIX),
    }
}
