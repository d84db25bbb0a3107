//! Private SOAP client for UPnP device communication
//!
//! This crate provides a minimal blocking SOAP client for talking to UPnP
//! media renderers and media servers. It also speaks the GENA side of UPnP
//! eventing (SUBSCRIBE, renewal and UNSUBSCRIBE) and can fetch plain
//! resources such as device icons.

mod error;

pub use error::SoapError;

use std::io::Read;
use std::time::Duration;
use xmltree::Element;

/// Largest body accepted by [`SoapClient::get_bytes`]
const MAX_DOWNLOAD_BYTES: u64 = 4 * 1024 * 1024;

/// Response from a UPnP subscription request
#[derive(Debug, Clone)]
pub struct SubscriptionResponse {
    /// Subscription ID returned by the device
    pub sid: String,
    /// Actual timeout granted by the device (in seconds)
    pub timeout_seconds: u32,
}

/// A minimal SOAP client for UPnP device communication
#[derive(Debug, Clone)]
pub struct SoapClient {
    agent: ureq::Agent,
}

impl SoapClient {
    /// Create a new SOAP client with default configuration
    pub fn new() -> Self {
        Self {
            agent: ureq::AgentBuilder::new()
                .timeout_connect(Duration::from_secs(5))
                .timeout_read(Duration::from_secs(10))
                .build(),
        }
    }

    /// Send a SOAP request and return the `<action>Response` element
    ///
    /// `control_url` is the absolute control URL taken from the device
    /// description and `service_type` the exact service type the device
    /// advertises (e.g. `urn:schemas-upnp-org:service:AVTransport:1`).
    pub fn call(
        &self,
        control_url: &str,
        service_type: &str,
        action: &str,
        payload: &str,
    ) -> Result<Element, SoapError> {
        let body = format!(
            r#"<?xml version="1.0" encoding="utf-8"?>
<s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/" s:encodingStyle="http://schemas.xmlsoap.org/soap/encoding/">
    <s:Body>
        <u:{action} xmlns:u="{service_type}">{payload}</u:{action}>
    </s:Body>
</s:Envelope>"#
        );
        let soap_action = format!("\"{}#{}\"", service_type, action);

        let result = self
            .agent
            .post(control_url)
            .set("Content-Type", "text/xml; charset=\"utf-8\"")
            .set("SOAPACTION", &soap_action)
            .send_string(&body);

        let (status, response) = match result {
            Ok(response) => (None, response),
            // UPnP faults travel as HTTP 500 with a SOAP body
            Err(ureq::Error::Status(code, response)) => (Some(code), response),
            Err(e) => return Err(SoapError::Network(e.to_string())),
        };

        let xml_text = response
            .into_string()
            .map_err(|e| SoapError::Network(e.to_string()))?;

        let xml = match Element::parse(xml_text.as_bytes()) {
            Ok(xml) => xml,
            Err(e) => {
                return Err(match status {
                    Some(code) => SoapError::Network(format!("HTTP {} from {}", code, control_url)),
                    None => SoapError::Parse(e.to_string()),
                })
            }
        };

        match (status, self.extract_response(&xml, action)) {
            (Some(code), Err(SoapError::Parse(_))) => {
                Err(SoapError::Network(format!("HTTP {} from {}", code, control_url)))
            }
            (_, result) => result,
        }
    }

    /// Subscribe to UPnP events on an event subscription URL
    ///
    /// # Arguments
    /// * `event_url` - Absolute eventSubURL of the service
    /// * `callback_url` - URL where NOTIFY requests should be delivered
    /// * `timeout_seconds` - Requested subscription timeout in seconds
    ///
    /// # Returns
    /// A `SubscriptionResponse` containing the SID and the granted timeout
    pub fn subscribe(
        &self,
        event_url: &str,
        callback_url: &str,
        timeout_seconds: u32,
    ) -> Result<SubscriptionResponse, SoapError> {
        let response = self
            .agent
            .request("SUBSCRIBE", event_url)
            .set("CALLBACK", &format!("<{}>", callback_url))
            .set("NT", "upnp:event")
            .set("TIMEOUT", &format!("Second-{}", timeout_seconds))
            .call()
            .map_err(|e| gena_error("SUBSCRIBE", e))?;

        let sid = response
            .header("SID")
            .ok_or_else(|| SoapError::Parse("Missing SID header in SUBSCRIBE response".to_string()))?
            .to_string();

        let timeout_seconds = parse_timeout_header(response.header("TIMEOUT"), timeout_seconds);

        Ok(SubscriptionResponse {
            sid,
            timeout_seconds,
        })
    }

    /// Renew an existing UPnP subscription
    ///
    /// Returns the timeout granted by the device
    pub fn renew_subscription(
        &self,
        event_url: &str,
        sid: &str,
        timeout_seconds: u32,
    ) -> Result<u32, SoapError> {
        let response = self
            .agent
            .request("SUBSCRIBE", event_url)
            .set("SID", sid)
            .set("TIMEOUT", &format!("Second-{}", timeout_seconds))
            .call()
            .map_err(|e| gena_error("SUBSCRIBE renewal", e))?;

        Ok(parse_timeout_header(response.header("TIMEOUT"), timeout_seconds))
    }

    /// Cancel a UPnP subscription
    pub fn unsubscribe(&self, event_url: &str, sid: &str) -> Result<(), SoapError> {
        self.agent
            .request("UNSUBSCRIBE", event_url)
            .set("SID", sid)
            .call()
            .map_err(|e| gena_error("UNSUBSCRIBE", e))?;

        Ok(())
    }

    /// Fetch a resource over plain HTTP GET
    pub fn get_bytes(&self, url: &str) -> Result<Vec<u8>, SoapError> {
        let response = self
            .agent
            .get(url)
            .call()
            .map_err(|e| SoapError::Network(e.to_string()))?;

        let mut bytes = Vec::new();
        response
            .into_reader()
            .take(MAX_DOWNLOAD_BYTES)
            .read_to_end(&mut bytes)
            .map_err(|e| SoapError::Network(e.to_string()))?;

        Ok(bytes)
    }

    fn extract_response(&self, xml: &Element, action: &str) -> Result<Element, SoapError> {
        let body = xml
            .get_child("Body")
            .ok_or_else(|| SoapError::Parse("Missing SOAP Body".to_string()))?;

        if let Some(fault) = body.get_child("Fault") {
            let upnp_error = fault
                .get_child("detail")
                .and_then(|d| d.get_child("UPnPError").or_else(|| d.get_child("UpnPError")));

            let code = upnp_error
                .and_then(|e| e.get_child("errorCode"))
                .and_then(|c| c.get_text())
                .and_then(|t| t.trim().parse::<u16>().ok())
                .unwrap_or(500);

            let description = upnp_error
                .and_then(|e| e.get_child("errorDescription"))
                .and_then(|d| d.get_text())
                .or_else(|| fault.get_child("faultstring").and_then(|f| f.get_text()))
                .map(|t| t.trim().to_string())
                .unwrap_or_else(|| "unknown fault".to_string());

            return Err(SoapError::Fault { code, description });
        }

        let response_name = format!("{}Response", action);
        body.get_child(response_name.as_str())
            .cloned()
            .ok_or_else(|| SoapError::Parse(format!("Missing {} element", response_name)))
    }
}

impl Default for SoapClient {
    fn default() -> Self {
        Self::new()
    }
}

fn gena_error(method: &str, error: ureq::Error) -> SoapError {
    match error {
        ureq::Error::Status(code, _) => {
            SoapError::Network(format!("{} failed: HTTP {}", method, code))
        }
        other => SoapError::Network(other.to_string()),
    }
}

/// Parse a GENA `TIMEOUT: Second-N` header, falling back to `requested`
fn parse_timeout_header(value: Option<&str>, requested: u32) -> u32 {
    value
        .and_then(|s| {
            let s = s.trim();
            if s.eq_ignore_ascii_case("second-infinite") {
                return Some(requested);
            }
            s.get(..7)
                .filter(|prefix| prefix.eq_ignore_ascii_case("Second-"))
                .and_then(|_| s[7..].parse::<u32>().ok())
        })
        .unwrap_or(requested)
}
