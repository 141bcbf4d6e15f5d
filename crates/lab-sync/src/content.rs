//! Shape-tolerant inspection of lab content.
//!
//! Host payloads arrive in two shapes: a full document wrapper with the
//! notebook nested under `content`, or the already unwrapped notebook body.
//! Some callers also hand over raw JSON text. All of that is resolved once
//! at this boundary; nothing downstream sniffs shapes.
//!
//! Both functions here sit on the hot path of opening a document, so they
//! degrade to a safe default instead of failing: an absent version tag and
//! a non-blank classification.

use serde_json::Value;
use std::borrow::Cow;
use tracing::warn;

/// Reserved metadata key holding the fingerprint written at the last
/// successful reconciliation.
pub const VERSION_TAG_KEY: &str = "prev_pub_hash";

/// Ordered key paths at which the version tag may live.
const TAG_PATHS: [&[&str]; 2] = [
    &["metadata", VERSION_TAG_KEY],
    &["content", "metadata", VERSION_TAG_KEY],
];

/// Lab content as handed over by the host: raw JSON text or an already
/// structured value.
#[derive(Debug, Clone)]
pub enum LabContent {
    Raw(String),
    Model(Value),
}

impl LabContent {
    /// Resolve to a structured value, parsing raw text if necessary.
    ///
    /// Returns `None` when raw text is not valid JSON; callers fall back
    /// to their safe default.
    fn resolve(&self) -> Option<Cow<'_, Value>> {
        match self {
            LabContent::Model(value) => Some(Cow::Borrowed(value)),
            LabContent::Raw(text) => match serde_json::from_str(text) {
                Ok(value) => Some(Cow::Owned(value)),
                Err(err) => {
                    warn!("lab content is not valid JSON: {}", err);
                    None
                }
            },
        }
    }
}

/// Read the version tag persisted at the last successful reconciliation.
///
/// Tries the top-level metadata map first, then the nested
/// `content.metadata` shape. Returns an empty string when neither path
/// exists, the input is unrecognized, or raw text fails to parse.
pub fn version_tag(content: &LabContent) -> String {
    let Some(value) = content.resolve() else {
        return String::new();
    };

    let recognized = value.get("metadata").is_some() || value.get("content").is_some();
    if !recognized {
        warn!("lab content has unknown shape, treating version tag as absent");
        return String::new();
    }

    for path in TAG_PATHS {
        if let Some(tag) = lookup(&value, path) {
            return match tag {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
        }
    }
    String::new()
}

/// Classify lab content as blank: zero cells, or exactly one cell whose
/// source is empty.
///
/// Unrecognized shapes are non-blank; nothing that cannot be classified is
/// ever deleted.
pub fn is_blank(content: &LabContent) -> bool {
    let Some(value) = content.resolve() else {
        return false;
    };

    let cells = value
        .get("cells")
        .or_else(|| value.get("content").and_then(|inner| inner.get("cells")));
    let Some(Value::Array(cells)) = cells else {
        warn!("lab content has no cell list, treating as non-blank");
        return false;
    };

    match cells.as_slice() {
        [] => true,
        [only] => only.get("source").map_or(true, source_is_empty),
        _ => false,
    }
}

fn source_is_empty(source: &Value) -> bool {
    match source {
        Value::String(text) => text.is_empty(),
        Value::Array(lines) => lines.is_empty(),
        _ => false,
    }
}

fn lookup<'a>(value: &'a Value, path: &[&str]) -> Option<&'a Value> {
    let mut current = value;
    for key in path {
        current = current.get(key)?;
    }
    Some(current)
}
