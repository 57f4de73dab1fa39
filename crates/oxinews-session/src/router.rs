//! In-memory router used by the CLI and tests.

use crate::Router;
use parking_lot::Mutex;
use tracing::debug;

#[derive(Debug)]
struct RouterState {
    current: String,
    history: Vec<String>,
}

/// Router that records every navigation.
///
/// `current_path` follows the last pushed path, with any query string kept.
#[derive(Debug)]
pub struct MemoryRouter {
    state: Mutex<RouterState>,
}

impl MemoryRouter {
    pub fn new(initial_path: impl Into<String>) -> Self {
        Self {
            state: Mutex::new(RouterState {
                current: initial_path.into(),
                history: Vec::new(),
            }),
        }
    }

    /// Paths pushed so far, oldest first.
    pub fn history(&self) -> Vec<String> {
        self.state.lock().history.clone()
    }

    /// Number of times `path` was pushed.
    pub fn navigations_to(&self, path: &str) -> usize {
        self.state
            .lock()
            .history
            .iter()
            .filter(|p| p.as_str() == path)
            .count()
    }

    /// Move to `path` without recording a navigation.
    pub fn set_current_path(&self, path: impl Into<String>) {
        self.state.lock().current = path.into();
    }
}

impl Default for MemoryRouter {
    fn default() -> Self {
        Self::new("/")
    }
}

impl Router for MemoryRouter {
    fn navigate(&self, path: &str) {
        let mut state = self.state.lock();
        debug!(from = %state.current, to = %path, "navigate");
        state.current = path.to_string();
        state.history.push(path.to_string());
    }

    fn current_path(&self) -> String {
        self.state.lock().current.clone()
    }
}
