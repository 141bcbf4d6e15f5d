//! HostEditor trait abstraction over the host's widget and dialog surface.
//!
//! The engine never renders anything itself; it asks the host to find the
//! widget bound to a path, persist or close it, and to confirm destructive
//! actions through the host's dialog channel.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EditorError {
    #[error("Save failed for {0}: {1}")]
    Save(String, String),

    #[error("Close failed for {0}: {1}")]
    Close(String, String),
}

pub type Result<T> = std::result::Result<T, EditorError>;

/// An open editor widget bound to a document path.
#[async_trait]
pub trait EditorWidget: Send {
    /// Whether the widget holds unsaved edits.
    fn is_dirty(&self) -> bool;

    /// Persist the widget's current model.
    async fn save(&mut self) -> Result<()>;

    /// Close the widget, releasing the host's handle on the path.
    async fn close(&mut self) -> Result<()>;
}

/// Host editor surface consumed by the engine.
#[async_trait]
pub trait HostEditor: Send + Sync {
    type Widget: EditorWidget;

    /// Find an open widget bound to a path.
    async fn find_widget(&self, path: &str) -> Option<Self::Widget>;

    /// Ask the user to confirm a destructive action. Returns true when
    /// the user accepts.
    async fn confirm(&self, title: &str, body: &str) -> bool;
}

// Implement HostEditor for Arc<T> where T: HostEditor, mirroring the
// DocumentStore blanket impl.
#[async_trait]
impl<T: HostEditor> HostEditor for Arc<T> {
    type Widget = T::Widget;

    async fn find_widget(&self, path: &str) -> Option<Self::Widget> {
        (**self).find_widget(path).await
    }

    async fn confirm(&self, title: &str, body: &str) -> bool {
        (**self).confirm(title, body).await
    }
}

#[derive(Debug, Clone, Copy)]
struct WidgetState {
    dirty: bool,
    fail_save: bool,
}

/// Scripted editor double for tests.
///
/// Widgets are seeded per path, confirmation answers are scripted in order
/// (declining once the script runs dry), and widget operations are appended
/// to the shared log so ordering against store operations is observable.
pub struct ScriptedEditor {
    widgets: Mutex<HashMap<String, WidgetState>>,
    answers: Mutex<VecDeque<bool>>,
    prompts: Mutex<Vec<String>>,
    log: Arc<Mutex<Vec<String>>>,
}

impl ScriptedEditor {
    pub fn new() -> Self {
        Self::with_log(Arc::new(Mutex::new(Vec::new())))
    }

    /// Create an editor that appends widget operations to a shared log.
    pub fn with_log(log: Arc<Mutex<Vec<String>>>) -> Self {
        Self {
            widgets: Mutex::new(HashMap::new()),
            answers: Mutex::new(VecDeque::new()),
            prompts: Mutex::new(Vec::new()),
            log,
        }
    }

    /// Seed an open widget bound to a path.
    pub fn open_widget(&self, path: &str, dirty: bool) {
        self.widgets.lock().unwrap().insert(
            path.to_string(),
            WidgetState {
                dirty,
                fail_save: false,
            },
        );
    }

    /// Make the widget at `path` fail its next save.
    pub fn fail_save(&self, path: &str) {
        if let Some(state) = self.widgets.lock().unwrap().get_mut(path) {
            state.fail_save = true;
        }
    }

    /// Script the answer to the next confirmation dialog.
    pub fn answer_next(&self, accept: bool) {
        self.answers.lock().unwrap().push_back(accept);
    }

    /// Titles of the confirmation dialogs shown so far.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

impl Default for ScriptedEditor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HostEditor for ScriptedEditor {
    type Widget = ScriptedWidget;

    async fn find_widget(&self, path: &str) -> Option<ScriptedWidget> {
        let widgets = self.widgets.lock().unwrap();
        widgets.get(path).map(|state| ScriptedWidget {
            path: path.to_string(),
            dirty: state.dirty,
            fail_save: state.fail_save,
            log: Arc::clone(&self.log),
        })
    }

    async fn confirm(&self, title: &str, _body: &str) -> bool {
        self.prompts.lock().unwrap().push(title.to_string());
        self.answers.lock().unwrap().pop_front().unwrap_or(false)
    }
}

/// Widget handle produced by [`ScriptedEditor`].
pub struct ScriptedWidget {
    path: String,
    dirty: bool,
    fail_save: bool,
    log: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl EditorWidget for ScriptedWidget {
    fn is_dirty(&self) -> bool {
        self.dirty
    }

    async fn save(&mut self) -> Result<()> {
        if self.fail_save {
            return Err(EditorError::Save(
                self.path.clone(),
                "scripted failure".to_string(),
            ));
        }
        self.log.lock().unwrap().push(format!("save {}", self.path));
        self.dirty = false;
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.log
            .lock()
            .unwrap()
            .push(format!("close {}", self.path));
        Ok(())
    }
}
