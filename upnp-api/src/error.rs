use soap_client::SoapError;
use thiserror::Error;

/// Errors raised while talking to a UPnP AV service
#[derive(Debug, Error)]
pub enum ApiError {
    /// The device could not be reached or the HTTP exchange failed
    #[error("Network error: {0}")]
    NetworkError(String),

    /// The device answered with something that could not be decoded
    #[error("Parse error: {0}")]
    ParseError(String),

    /// The device rejected the action with a UPnP error
    #[error("SOAP fault {code}: {description}")]
    SoapFault { code: u16, description: String },

    /// An output argument was absent from the response
    #[error("Missing output argument: {0}")]
    MissingArgument(String),

    /// An output argument did not match its declared type
    #[error("Invalid value '{value}' for argument '{name}'")]
    InvalidArgument { name: String, value: String },

    /// GENA subscribe, renew or unsubscribe failed
    #[error("Subscription error: {0}")]
    SubscriptionError(String),
}

pub type Result<T> = std::result::Result<T, ApiError>;

impl From<SoapError> for ApiError {
    fn from(error: SoapError) -> Self {
        match error {
            SoapError::Network(msg) => ApiError::NetworkError(msg),
            SoapError::Parse(msg) => ApiError::ParseError(msg),
            SoapError::Fault { code, description } => ApiError::SoapFault { code, description },
        }
    }
}
