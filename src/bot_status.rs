use chrono::{DateTime, Duration, Utc};
use log::info;
use parking_lot::RwLock;
use std::sync::Arc;

/// Process start time and the moment the gateway last came up.
pub struct BotStatus {
    start_time: DateTime<Utc>,
    connected_since: Option<DateTime<Utc>>,
}

impl Default for BotStatus {
    fn default() -> Self {
        Self {
            start_time: Utc::now(),
            connected_since: None,
        }
    }
}

impl BotStatus {
    pub fn new() -> Arc<RwLock<Self>> {
        Arc::new(RwLock::new(Self::default()))
    }

    pub fn set_online(&mut self, online: bool) {
        let was_online = self.connected_since.is_some();
        self.connected_since = online.then(Utc::now);
        if was_online != online {
            info!("Bot status changed to: {}", if online { "online" } else { "offline" });
        }
    }

    pub fn connected_since(&self) -> Option<DateTime<Utc>> {
        self.connected_since
    }

    /// Time since the process started, independent of the gateway.
    pub fn uptime(&self) -> Duration {
        Utc::now().signed_duration_since(self.start_time)
    }

    pub fn uptime_secs(&self) -> f64 {
        self.uptime().num_milliseconds() as f64 / 1000.0
    }

    pub fn uptime_string(&self) -> String {
        let seconds = self.uptime().num_seconds();
        let (hours, minutes, seconds) = (seconds / 3600, (seconds % 3600) / 60, seconds % 60);
        format!("{}h {}m {}s", hours, minutes, seconds)
    }
}
