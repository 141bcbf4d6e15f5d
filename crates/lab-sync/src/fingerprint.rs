//! Content fingerprint for change detection.
//!
//! A fingerprint is the SHA-256 digest of the canonical cell serialization,
//! hex encoded. Two labs with equal fingerprints are content-equivalent for
//! synchronization purposes even when formatting metadata differs. This is
//! change detection, not a security boundary.

use crate::notebook::{LabNotebook, canonical_cells};
use sha2::{Digest, Sha256};

/// A hex-encoded content hash of a lab's cells, ids excluded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Compute the fingerprint of a notebook's canonical cells.
    pub fn of_cells(notebook: &LabNotebook) -> Self {
        let cells = canonical_cells(notebook);
        let bytes = serde_json::to_vec(&cells).expect("cell projection serializes to JSON");
        let mut hasher = Sha256::new();
        hasher.update(&bytes);
        Self(hex::encode(hasher.finalize()))
    }

    /// Get the hex digest string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume into the hex digest string.
    pub fn into_string(self) -> String {
        self.0
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notebook::{Cell, CellType};
    use uuid::Uuid;

    fn sample_notebook() -> LabNotebook {
        LabNotebook::new(vec![
            Cell::new(CellType::Code, &["import math\n", "math.pi"]),
            Cell::new(CellType::Markdown, &["# Lab 1"]),
        ])
    }

    #[test]
    fn test_fingerprint_deterministic() {
        let notebook = sample_notebook();
        assert_eq!(
            Fingerprint::of_cells(&notebook),
            Fingerprint::of_cells(&notebook)
        );
    }

    #[test]
    fn test_fingerprint_ignores_cell_ids() {
        let notebook = sample_notebook();
        let mut regenerated = notebook.clone();
        for cell in &mut regenerated.cells {
            cell.id = Uuid::new_v4().to_string();
        }

        assert_eq!(
            Fingerprint::of_cells(&notebook),
            Fingerprint::of_cells(&regenerated)
        );
    }

    #[test]
    fn test_fingerprint_sensitive_to_source() {
        let notebook = sample_notebook();
        let mut edited = notebook.clone();
        edited.cells[0].source.push("math.e".to_string());

        assert_ne!(
            Fingerprint::of_cells(&notebook),
            Fingerprint::of_cells(&edited)
        );
    }

    #[test]
    fn test_fingerprint_is_hex_sha256() {
        let fingerprint = Fingerprint::of_cells(&sample_notebook());
        assert_eq!(fingerprint.as_str().len(), 64);
        assert!(fingerprint.as_str().chars().all(|c| c.is_ascii_hexdigit()));
    }
}
