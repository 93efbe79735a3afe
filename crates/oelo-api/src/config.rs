use std::net::{IpAddr, Ipv4Addr};
use std::num::NonZeroU32;
use std::time::Duration;

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize, Eq, PartialEq)]
pub struct ControllerConfig {
    /// Network address of the controller: an IP address or a host name.
    pub address: String,
    pub poll_interval_secs: NonZeroU32,
    pub debounce_ms: u64,
    pub timeout_secs: NonZeroU32,
}

#[derive(Clone, Debug, Serialize, Deserialize, Eq, PartialEq)]
pub struct OeloConfig {
    pub state_file: Utf8PathBuf,
}

#[derive(Clone, Debug, Serialize, Deserialize, Eq, PartialEq)]
pub struct ServerConfig {
    pub listen: IpAddr,
    pub port: u16,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AppConfig {
    pub controller: ControllerConfig,
    pub oelo: OeloConfig,
    pub server: ServerConfig,
}

impl ControllerConfig {
    pub const DEFAULT_POLL_INTERVAL_SECS: u32 = 30;
    pub const DEFAULT_DEBOUNCE_MS: u64 = 1000;
    pub const DEFAULT_TIMEOUT_SECS: u32 = 10;

    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(u64::from(self.poll_interval_secs.get()))
    }

    #[must_use]
    pub const fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(u64::from(self.timeout_secs.get()))
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 8080,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::num::NonZeroU32;
    use std::time::Duration;

    use crate::config::ControllerConfig;

    #[test]
    fn controller_durations() {
        let conf = ControllerConfig {
            address: "10.0.0.5".to_string(),
            poll_interval_secs: NonZeroU32::new(30).unwrap(),
            debounce_ms: 1000,
            timeout_secs: NonZeroU32::new(10).unwrap(),
        };

        assert_eq!(conf.poll_interval(), Duration::from_secs(30));
        assert_eq!(conf.debounce(), Duration::from_secs(1));
        assert_eq!(conf.timeout(), Duration::from_secs(10));
    }
}
