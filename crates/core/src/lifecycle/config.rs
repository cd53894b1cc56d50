//! Download lifecycle configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Timing of the download poll loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LifecycleConfig {
    /// Delay between submission and the first status check (milliseconds).
    #[serde(default = "default_initial_delay")]
    pub initial_delay_ms: u64,

    /// Delay between status checks while downloading (milliseconds).
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,

    /// Wait after the agent reports completion before the file list is read
    /// again (milliseconds). The agent may signal completion before the final
    /// file layout is on disk.
    #[serde(default = "default_completion_grace")]
    pub completion_grace_ms: u64,
}

fn default_initial_delay() -> u64 {
    5000 // 5 seconds
}

fn default_poll_interval() -> u64 {
    10000 // 10 seconds
}

fn default_completion_grace() -> u64 {
    5000 // 5 seconds
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: default_initial_delay(),
            poll_interval_ms: default_poll_interval(),
            completion_grace_ms: default_completion_grace(),
        }
    }
}

impl LifecycleConfig {
    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn completion_grace(&self) -> Duration {
        Duration::from_millis(self.completion_grace_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = LifecycleConfig::default();
        assert_eq!(config.initial_delay_ms, 5000);
        assert_eq!(config.poll_interval_ms, 10000);
        assert_eq!(config.completion_grace_ms, 5000);
        assert_eq!(config.poll_interval(), Duration::from_secs(10));
    }

    #[test]
    fn test_deserialize_partial() {
        let toml = r#"
            poll_interval_ms = 2000
        "#;
        let config: LifecycleConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.poll_interval_ms, 2000);
        assert_eq!(config.initial_delay_ms, 5000);
        assert_eq!(config.completion_grace_ms, 5000);
    }
}
