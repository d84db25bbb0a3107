use crate::args::ActionArgs;
use crate::{ApiError, Result};
use soap_client::{SoapClient, SubscriptionResponse};

/// A client for invoking UPnP AV actions against discovered devices
///
/// This client bridges typed [`ActionArgs`] and the SOAP wire format. It
/// addresses services by the absolute control URL and exact service type a
/// device advertises in its description, so it works against any vendor's
/// renderer or server.
///
/// # Example
/// ```no_run
/// use upnp_api::{ActionArgs, UpnpClient};
///
/// let client = UpnpClient::new();
/// let input = ActionArgs::new().with("InstanceID", 0u32).with("Channel", "Master");
/// let mut output = ActionArgs::new().with("CurrentVolume", 0u32);
///
/// client.send_action(
///     "http://192.168.1.20:49152/upnp/control/rendercontrol1",
///     "urn:schemas-upnp-org:service:RenderingControl:1",
///     "GetVolume",
///     &input,
///     &mut output,
/// )?;
/// println!("volume = {:?}", output.get_uint("CurrentVolume"));
/// # Ok::<(), upnp_api::ApiError>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct UpnpClient {
    soap_client: SoapClient,
}

impl UpnpClient {
    pub fn new() -> Self {
        Self {
            soap_client: SoapClient::new(),
        }
    }

    /// Use a preconfigured SOAP client
    pub fn with_soap_client(soap_client: SoapClient) -> Self {
        Self { soap_client }
    }

    /// Invoke `action` and decode the reply into `output`
    ///
    /// On error `output` may have been partially filled and should not be
    /// read.
    pub fn send_action(
        &self,
        control_url: &str,
        service_type: &str,
        action: &str,
        input: &ActionArgs,
        output: &mut ActionArgs,
    ) -> Result<()> {
        let payload = input.to_payload();
        tracing::debug!("{} -> {} ({} args)", action, control_url, input.len());

        let response = self
            .soap_client
            .call(control_url, service_type, action, &payload)?;

        output.decode_from(&response)
    }

    /// Open a GENA subscription delivering NOTIFY requests to `callback_url`
    pub fn subscribe(
        &self,
        event_url: &str,
        callback_url: &str,
        timeout_seconds: u32,
    ) -> Result<SubscriptionResponse> {
        self.soap_client
            .subscribe(event_url, callback_url, timeout_seconds)
            .map_err(|e| ApiError::SubscriptionError(e.to_string()))
    }

    /// Extend a subscription, returning the granted timeout in seconds
    pub fn renew_subscription(&self, event_url: &str, sid: &str, timeout_seconds: u32) -> Result<u32> {
        self.soap_client
            .renew_subscription(event_url, sid, timeout_seconds)
            .map_err(|e| ApiError::SubscriptionError(e.to_string()))
    }

    pub fn unsubscribe(&self, event_url: &str, sid: &str) -> Result<()> {
        self.soap_client
            .unsubscribe(event_url, sid)
            .map_err(|e| ApiError::SubscriptionError(e.to_string()))
    }

    /// Plain HTTP GET, used for icons
    pub fn get_bytes(&self, url: &str) -> Result<Vec<u8>> {
        Ok(self.soap_client.get_bytes(url)?)
    }
}
