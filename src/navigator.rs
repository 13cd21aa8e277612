//! Redirect seam for forced logouts
//!
//! In the browser a failed session means a hard navigation to a login page.
//! Here that becomes a call on a [`Navigator`], which the embedding shell
//! implements.

use std::sync::Mutex;
use tracing::info;

pub trait Navigator: Send + Sync {
    /// Send the user to `path` (e.g. `/agent-login`).
    fn navigate(&self, path: &str);
}

/// Navigator that only logs the destination
#[derive(Debug, Default)]
pub struct TracingNavigator;

impl Navigator for TracingNavigator {
    fn navigate(&self, path: &str) {
        info!(path = %path, "Navigating");
    }
}

/// Navigator that remembers every destination, for headless shells and tests
#[derive(Debug, Default)]
pub struct RecordingNavigator {
    visited: Mutex<Vec<String>>,
}

impl RecordingNavigator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn visited(&self) -> Vec<String> {
        self.visited
            .lock()
            .map(|v| v.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }

    pub fn last(&self) -> Option<String> {
        self.visited().pop()
    }
}

impl Navigator for RecordingNavigator {
    fn navigate(&self, path: &str) {
        info!(path = %path, "Navigating");
        match self.visited.lock() {
            Ok(mut visited) => visited.push(path.to_string()),
            Err(poisoned) => poisoned.into_inner().push(path.to_string()),
        }
    }
}
