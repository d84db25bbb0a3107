//! One-shot discovery iterator.
//!
//! Each iterator performs a single search round: an M-SEARCH per requested
//! device kind, then an HTTP fetch of every distinct description location.

use crate::device::Root;
use crate::error::{DiscoveryError, Result};
use crate::ssdp::{SsdpClient, SsdpResponse};
use crate::{Device, DeviceEvent, DeviceKind};
use std::collections::HashSet;
use std::time::Duration;

/// Iterator yielding `DeviceEvent::Found` for every renderer or server that
/// answers a search.
///
/// A location hosting several matching devices yields one event per kind.
/// Descriptions that fail to download or parse are skipped.
///
/// # Examples
///
/// ```no_run
/// use upnp_discovery::{DeviceEvent, DeviceKind, DiscoveryIterator};
/// use std::time::Duration;
///
/// let iter = DiscoveryIterator::new(&[DeviceKind::Renderer], Duration::from_secs(2)).unwrap();
/// for event in iter {
///     if let DeviceEvent::Found(device) = event {
///         println!("{} at {}", device.name, device.location);
///     }
/// }
/// ```
pub struct DiscoveryIterator {
    kinds: Vec<DeviceKind>,
    ssdp_client: Option<SsdpClient>,
    ssdp_buffer: Vec<(DeviceKind, SsdpResponse)>,
    buffer_index: usize,
    seen: HashSet<(DeviceKind, String)>,
    http_client: reqwest::blocking::Client,
}

impl DiscoveryIterator {
    pub fn new(kinds: &[DeviceKind], timeout: Duration) -> Result<Self> {
        let ssdp_client = SsdpClient::new(timeout)?;
        let http_client = http_client(timeout)?;

        Ok(Self {
            kinds: kinds.to_vec(),
            ssdp_client: Some(ssdp_client),
            ssdp_buffer: Vec::new(),
            buffer_index: 0,
            seen: HashSet::new(),
            http_client,
        })
    }

    /// An iterator that yields nothing, used when socket setup fails.
    pub(crate) fn empty() -> Self {
        Self {
            kinds: Vec::new(),
            ssdp_client: None,
            ssdp_buffer: Vec::new(),
            buffer_index: 0,
            seen: HashSet::new(),
            http_client: reqwest::blocking::Client::new(),
        }
    }

    fn fill_buffer(&mut self) {
        let Some(client) = self.ssdp_client.take() else {
            return;
        };

        for kind in &self.kinds {
            match client.search(kind.search_target()) {
                Ok(responses) => {
                    for response in responses {
                        match response {
                            Ok(response) => self.ssdp_buffer.push((*kind, response)),
                            Err(e) => tracing::debug!("SSDP receive failed: {}", e),
                        }
                    }
                }
                Err(e) => tracing::warn!("SSDP search for {} failed: {}", kind.search_target(), e),
            }
        }
    }
}

impl Iterator for DiscoveryIterator {
    type Item = DeviceEvent;

    fn next(&mut self) -> Option<Self::Item> {
        if self.ssdp_client.is_some() {
            self.fill_buffer();
        }

        while self.buffer_index < self.ssdp_buffer.len() {
            let (kind, response) = &self.ssdp_buffer[self.buffer_index];
            self.buffer_index += 1;

            if !self.seen.insert((*kind, response.location.clone())) {
                continue;
            }

            let device = match fetch_device(&self.http_client, &response.location, *kind) {
                Ok(device) => device,
                Err(e) => {
                    tracing::debug!("Skipping {}: {}", response.location, e);
                    continue;
                }
            };

            // Multi-homed devices answer on every interface with different locations
            if !device.udn.is_empty() && !self.seen.insert((*kind, device.udn.clone())) {
                continue;
            }

            return Some(DeviceEvent::Found(device));
        }
        None
    }
}

fn http_client(timeout: Duration) -> Result<reqwest::blocking::Client> {
    reqwest::blocking::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| DiscoveryError::NetworkError(format!("Failed to create HTTP client: {}", e)))
}

fn fetch_device(
    client: &reqwest::blocking::Client,
    location: &str,
    kind: DeviceKind,
) -> Result<Device> {
    let response = client
        .get(location)
        .send()
        .and_then(|response| response.error_for_status())
        .map_err(|e| DiscoveryError::NetworkError(format!("Failed to fetch device description: {}", e)))?;

    let xml = response
        .text()
        .map_err(|e| DiscoveryError::NetworkError(format!("Failed to read response body: {}", e)))?;

    Root::from_xml(&xml)?.to_device(kind, location)
}

/// Download and parse the description at `location` without searching.
///
/// Useful when a device's location is already known, e.g. from a cached
/// configuration or an unsolicited NOTIFY.
pub fn describe(location: &str, kind: DeviceKind, timeout: Duration) -> Result<Device> {
    fetch_device(&http_client(timeout)?, location, kind)
}
