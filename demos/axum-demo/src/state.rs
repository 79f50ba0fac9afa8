use std::time::{Duration, Instant};

/// The application state
#[derive(Debug, Clone)]
pub struct AppState {
    started_at: Instant,
}

impl AppState {
    /// Create a state
    pub fn new() -> Self {
        Self {
            started_at: Instant::now(),
        }
    }

    pub(crate) fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}
