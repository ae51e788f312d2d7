use serde::{Deserialize, Serialize};

/// Process-lifetime counters for the single browser session and the tool
/// operations running against it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionMetrics {
    pub sessions_opened: u64,
    pub sessions_closed: u64,
    pub navigations: u64,
    pub clicks: u64,
    pub keystrokes: u64,
    pub screenshots: u64,
    pub snapshots: u64,
    pub retries: u64,
    pub timeouts: u64,
    pub teardowns: u64,
}

impl SessionMetrics {
    pub fn record_session_open(&mut self) {
        self.sessions_opened = self.sessions_opened.saturating_add(1);
    }

    pub fn record_session_close(&mut self) {
        self.sessions_closed = self.sessions_closed.saturating_add(1);
    }

    pub fn record_navigation(&mut self) {
        self.navigations = self.navigations.saturating_add(1);
    }

    pub fn record_click(&mut self) {
        self.clicks = self.clicks.saturating_add(1);
    }

    pub fn record_keystrokes(&mut self, count: u64) {
        self.keystrokes = self.keystrokes.saturating_add(count);
    }

    pub fn record_screenshot(&mut self) {
        self.screenshots = self.screenshots.saturating_add(1);
    }

    pub fn record_snapshot(&mut self) {
        self.snapshots = self.snapshots.saturating_add(1);
    }

    pub fn record_retry(&mut self) {
        self.retries = self.retries.saturating_add(1);
    }

    pub fn record_timeout(&mut self) {
        self.timeouts = self.timeouts.saturating_add(1);
    }

    pub fn record_teardown(&mut self) {
        self.teardowns = self.teardowns.saturating_add(1);
    }
}
