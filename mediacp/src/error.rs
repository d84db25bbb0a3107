use thiserror::Error;
use upnp_api::Service;

#[derive(Error, Debug)]
pub enum ControlError {
    #[error("API error: {0}")]
    Api(#[from] upnp_api::ApiError),

    #[error("Device {device} has no {} service", service.name())]
    MissingService { device: String, service: Service },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Callback server error: {0}")]
    Callback(#[from] callback_server::CallbackError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid configuration file: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ControlError>;
