//! Error types for the SOAP client

use thiserror::Error;

/// Errors that can occur during SOAP and GENA communication
#[derive(Debug, Error)]
pub enum SoapError {
    /// Network or HTTP communication error
    #[error("Network/HTTP error: {0}")]
    Network(String),

    /// XML parsing error
    #[error("XML parsing error: {0}")]
    Parse(String),

    /// UPnP fault returned by the device
    #[error("SOAP fault {code}: {description}")]
    Fault { code: u16, description: String },
}
