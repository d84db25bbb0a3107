//! Helpers for SOAP-level tests against a mock device

use std::fs;
use std::path::PathBuf;

pub const AVT_TYPE: &str = "urn:schemas-upnp-org:service:AVTransport:1";
pub const CDS_TYPE: &str = "urn:schemas-upnp-org:service:ContentDirectory:1";

pub fn load_fixture(filename: &str) -> String {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests/fixtures");
    path.push(filename);
    fs::read_to_string(&path).unwrap_or_else(|e| panic!("Failed to load fixture {}: {}", filename, e))
}

/// Escape text for embedding in an XML element, as devices do with DIDL-Lite
pub fn xml_escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// A successful SOAP envelope for `action` with the given output arguments
pub fn soap_response(service_type: &str, action: &str, outputs: &[(&str, &str)]) -> String {
    let args: String = outputs
        .iter()
        .map(|(name, value)| format!("<{name}>{value}</{name}>"))
        .collect();
    format!(
        r#"<?xml version="1.0" encoding="utf-8"?>
<s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/" s:encodingStyle="http://schemas.xmlsoap.org/soap/encoding/">
  <s:Body>
    <u:{action}Response xmlns:u="{service_type}">{args}</u:{action}Response>
  </s:Body>
</s:Envelope>"#
    )
}

/// A UPnP fault envelope, sent with HTTP 500
pub fn soap_fault(code: u16, description: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="utf-8"?>
<s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/" s:encodingStyle="http://schemas.xmlsoap.org/soap/encoding/">
  <s:Body>
    <s:Fault>
      <faultcode>s:Client</faultcode>
      <faultstring>UPnPError</faultstring>
      <detail>
        <UPnPError xmlns="urn:schemas-upnp-org:control-1-0">
          <errorCode>{code}</errorCode>
          <errorDescription>{description}</errorDescription>
        </UPnPError>
      </detail>
    </s:Fault>
  </s:Body>
</s:Envelope>"#
    )
}
