//! Configuration for the time-tick core, loaded from a TOML file at startup.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationMilliSeconds, DurationSeconds};

#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CoreSettings {
    /// Shared prefix for DML channel names.
    pub dml_channel_prefix: String,
    /// Shared prefix for delta channel names.
    pub delta_channel_prefix: String,
    /// Total channels per family.
    pub channel_count: u32,
    /// Expected interval between proxy reports; used for the "too slow" dispatcher warning.
    /// Milvus's own soft-time-tick interval is sub-second, so this needs millisecond granularity.
    #[serde_as(as = "DurationMilliSeconds")]
    pub tick_interval: Duration,
    /// Liveness silence threshold before the watchdog warns.
    #[serde_as(as = "DurationSeconds")]
    pub watchdog_interval: Duration,
    pub watchdog_enabled: bool,
    /// Capacity of the bounded reducer-to-dispatcher queue.
    pub queue_capacity: usize,
}

impl Default for CoreSettings {
    fn default() -> Self {
        Self {
            dml_channel_prefix: "by-dev-rootcoord-dml-".to_string(),
            delta_channel_prefix: "by-dev-rootcoord-delta-".to_string(),
            channel_count: 16,
            tick_interval: Duration::from_millis(200),
            watchdog_interval: Duration::from_secs(120),
            watchdog_enabled: true,
            queue_capacity: 16,
        }
    }
}

impl CoreSettings {
    pub fn load_from_file(path: &Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let settings = toml::from_str(&contents)?;
        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_documented_values() {
        let settings = CoreSettings::default();
        assert_eq!(settings.watchdog_interval, Duration::from_secs(120));
        assert_eq!(settings.queue_capacity, 16);
        assert!(settings.watchdog_enabled);
    }

    #[test]
    fn round_trips_through_toml() {
        let settings = CoreSettings::default();
        let serialized = toml::to_string(&settings).unwrap();
        let parsed: CoreSettings = toml::from_str(&serialized).unwrap();
        assert_eq!(settings, parsed);
    }
}
