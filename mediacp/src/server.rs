//! Content browsing on a media server.

use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::RwLock;
use upnp_api::{BrowseRequest, BrowseResult, Service, ROOT_OBJECT_ID};
use upnp_discovery::Device;

use crate::device::DeviceProxy;
use crate::error::Result;
use crate::invoker::ActionInvoker;
use crate::transport::DeviceTransport;

pub struct Server {
    device: Device,
    content_directory: ActionInvoker,
    icon: RwLock<Option<PathBuf>>,
}

impl Server {
    pub fn new(transport: Arc<dyn DeviceTransport>, device: Device) -> Arc<Self> {
        Arc::new(Self {
            content_directory: ActionInvoker::new(transport, device.clone(), Service::ContentDirectory),
            device,
            icon: RwLock::new(None),
        })
    }

    /// Id of the top-level container.
    pub fn root_id(&self) -> &'static str {
        ROOT_OBJECT_ID
    }

    pub(crate) fn set_icon(&self, path: PathBuf) {
        *self.icon.write() = Some(path);
    }

    /// One page of the children of `object_id`, starting at `starting_index`.
    ///
    /// Pages are capped at [`upnp_api::MAX_BROWSE`] entries; fetch the next
    /// one by calling again with a larger index. A reply whose entry count
    /// disagrees with `NumberReturned` is logged and returned as parsed.
    pub fn browse(&self, object_id: &str, starting_index: u32) -> Result<BrowseResult> {
        self.run(BrowseRequest::direct_children(object_id, starting_index))
    }

    /// Metadata of `object_id` itself, including its resources.
    pub fn browse_metadata(&self, object_id: &str) -> Result<BrowseResult> {
        self.run(BrowseRequest::metadata(object_id))
    }

    fn run(&self, request: BrowseRequest) -> Result<BrowseResult> {
        let mut out = BrowseResult::out_args();
        self.content_directory
            .send("Browse", request.to_args(), &mut out)?;
        let result = BrowseResult::from_args(&out);

        if !result.count_matches() {
            tracing::warn!(
                "{}: browse of {} reported {} entries but {} parsed",
                self.device.name,
                request.object_id,
                result.number_returned,
                result.containers.len() + result.items.len()
            );
        }
        Ok(result)
    }
}

impl DeviceProxy for Server {
    fn device(&self) -> &Device {
        &self.device
    }

    fn icon(&self) -> Option<PathBuf> {
        self.icon.read().clone()
    }
}

impl std::fmt::Debug for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("udn", &self.device.udn)
            .field("name", &self.device.name)
            .finish()
    }
}
