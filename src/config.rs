//! Engine configuration

use std::time::Duration;

/// Configuration for a feed engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// How often to ask the backing store for the new-item count
    pub poll_interval: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
        }
    }
}

impl EngineConfig {
    /// Public posts feed (relaxed polling)
    pub fn for_posts() -> Self {
        Self {
            poll_interval: Duration::from_secs(10),
        }
    }

    /// Direct messages (conversational, poll faster)
    pub fn for_messages() -> Self {
        Self {
            poll_interval: Duration::from_secs(3),
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }
}
