//! Control point settings.
//!
//! Settings are read from JSON and never written back; every field has a
//! default, so a partial file (or `{}`) is valid.
//!
//! ```json
//! {
//!   "preferred_renderer": "Living Room",
//!   "volume_delta": 5,
//!   "transport": { "rescan_interval_secs": 60 }
//! }
//! ```

use std::net::IpAddr;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ControlError, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlConfig {
    /// Renderer selected automatically when found, if nothing is selected
    pub preferred_renderer: String,
    /// Server selected automatically when found, if nothing is selected
    pub preferred_server: String,
    /// Step used by volume up/down actions
    pub volume_delta: i32,
    /// Seconds skipped by seek forward/backward actions
    pub seek_delta: i32,
    /// Download device icons into a temporary directory
    pub cache_icons: bool,
    pub transport: TransportConfig,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            preferred_renderer: String::new(),
            preferred_server: String::new(),
            volume_delta: 5,
            seek_delta: 10,
            cache_icons: true,
            transport: TransportConfig::default(),
        }
    }
}

impl ControlConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    pub fn validate(&self) -> Result<()> {
        let (start, end) = self.transport.callback_port_range;
        if start == 0 || start > end {
            return Err(ControlError::Config(format!(
                "invalid callback port range {}..={}",
                start, end
            )));
        }
        if self.transport.subscription_timeout_secs < 60 {
            return Err(ControlError::Config(
                "subscription_timeout_secs must be at least 60".to_string(),
            ));
        }
        Ok(())
    }
}

/// Settings of the network transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// How long each SSDP search listens for answers
    pub search_timeout_secs: u64,
    pub rescan_interval_secs: u64,
    /// Consecutive scans a device may miss before it is reported lost
    pub missed_scans_before_lost: u32,
    /// Act on SSDP alive/byebye announcements between scans
    pub listen_for_announcements: bool,
    /// Ports tried, in order, for the event callback server
    pub callback_port_range: (u16, u16),
    /// Address put in callback URLs; detected from the routing table when unset
    pub advertised_ip: Option<IpAddr>,
    /// Requested GENA subscription lifetime
    pub subscription_timeout_secs: u32,
    /// Preferred icon edge in pixels
    pub icon_size: u32,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            search_timeout_secs: 3,
            rescan_interval_secs: 30,
            missed_scans_before_lost: 2,
            listen_for_announcements: true,
            callback_port_range: (3400, 3500),
            advertised_ip: None,
            subscription_timeout_secs: 1800,
            icon_size: 24,
        }
    }
}

impl TransportConfig {
    pub fn search_timeout(&self) -> Duration {
        Duration::from_secs(self.search_timeout_secs.max(1))
    }

    pub fn rescan_interval(&self) -> Duration {
        Duration::from_secs(self.rescan_interval_secs.max(1))
    }
}
