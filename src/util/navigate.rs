//! Navigation seam.
//!
//! SYSTEM CONTEXT
//! ==============
//! Auth operations and the 401 handler ask for a navigation; what that means
//! depends on where the code runs. The server host records the target and
//! turns it into an HTTP redirect once the handler returns.

#[cfg(test)]
#[path = "navigate_test.rs"]
mod navigate_test;

use std::sync::{Mutex, PoisonError};

pub trait Navigator: Send + Sync {
    fn navigate(&self, location: &str);
}

/// Ignores every navigation request.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopNavigator;

impl Navigator for NoopNavigator {
    fn navigate(&self, location: &str) {
        tracing::trace!(%location, "navigation ignored");
    }
}

/// Remembers every requested location; the last one wins.
#[derive(Debug, Default)]
pub struct RecordingNavigator {
    history: Mutex<Vec<String>>,
}

impl RecordingNavigator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn last(&self) -> Option<String> {
        self.lock().last().cloned()
    }

    #[must_use]
    pub fn history(&self) -> Vec<String> {
        self.lock().clone()
    }

    /// Take the last location and forget the history.
    pub fn take(&self) -> Option<String> {
        let mut history = self.lock();
        let last = history.pop();
        history.clear();
        last
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<String>> {
        self.history.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Navigator for RecordingNavigator {
    fn navigate(&self, location: &str) {
        tracing::debug!(%location, "navigation requested");
        self.lock().push(location.to_owned());
    }
}
