//! Device icons downloaded into a private temporary directory.
//!
//! The directory is created with a random name when the cache is built and
//! removed when the cache is cleared or dropped.

use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use tempfile::TempDir;
use upnp_discovery::Device;

use crate::error::{ControlError, Result};
use crate::transport::DeviceTransport;

const DIR_PREFIX: &str = "mediacp-";

#[derive(Debug)]
pub struct IconCache {
    path: PathBuf,
    dir: Mutex<Option<TempDir>>,
}

impl IconCache {
    /// A cache in a fresh directory under the system temp dir.
    pub fn new() -> Result<Self> {
        let dir = tempfile::Builder::new().prefix(DIR_PREFIX).tempdir()?;
        Ok(Self::from_temp_dir(dir))
    }

    /// A cache in a fresh directory under `parent`.
    pub fn new_in(parent: impl AsRef<Path>) -> Result<Self> {
        let dir = tempfile::Builder::new()
            .prefix(DIR_PREFIX)
            .tempdir_in(parent)?;
        Ok(Self::from_temp_dir(dir))
    }

    fn from_temp_dir(dir: TempDir) -> Self {
        Self {
            path: dir.path().to_path_buf(),
            dir: Mutex::new(Some(dir)),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.path
    }

    /// Where the icon of the device with `udn` is stored.
    pub fn path_for(&self, udn: &str) -> PathBuf {
        self.path.join(file_name(udn))
    }

    /// Download the icon of `device`, returning its local path.
    ///
    /// Failures are logged and yield `None`; a device without icons is not
    /// a failure.
    pub fn fetch(&self, transport: &dyn DeviceTransport, device: &Device) -> Option<PathBuf> {
        let url = transport.icon_url(device)?;
        match self.store(transport, device, &url) {
            Ok(path) => {
                tracing::debug!("Cached icon of {} at {}", device.name, path.display());
                Some(path)
            }
            Err(e) => {
                tracing::warn!("Icon of {} unavailable from {}: {}", device.name, url, e);
                None
            }
        }
    }

    fn store(&self, transport: &dyn DeviceTransport, device: &Device, url: &str) -> Result<PathBuf> {
        let bytes = transport.http_get(url)?;
        let dir = self.dir.lock();
        if dir.is_none() {
            return Err(ControlError::Transport("icon cache cleared".to_string()));
        }
        let path = self.path_for(&device.udn);
        std::fs::write(&path, bytes)?;
        Ok(path)
    }

    /// Delete the directory and every icon in it. Later fetches fail.
    pub fn clear(&self) {
        if let Some(dir) = self.dir.lock().take() {
            if let Err(e) = dir.close() {
                tracing::warn!("Could not remove {}: {}", self.path.display(), e);
            }
        }
    }
}

/// File name for a UDN.
///
/// ASCII alphanumerics and `-` are kept; every other byte, `_` included,
/// becomes `_` followed by two hex digits, so distinct UDNs never share a
/// file and no name can leave the directory.
fn file_name(udn: &str) -> String {
    if udn.is_empty() {
        return "_".to_string();
    }
    let mut name = String::with_capacity(udn.len());
    for byte in udn.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'-' {
            name.push(char::from(byte));
        } else {
            name.push_str(&format!("_{:02X}", byte));
        }
    }
    name
}
