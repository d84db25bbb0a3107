use thiserror::Error;

#[derive(Debug, Error)]
pub enum CallbackError {
    #[error("no available port in range {start}-{end}")]
    NoAvailablePort { start: u16, end: u16 },

    #[error("failed to detect a local IP address")]
    NoLocalAddress,

    #[error("failed to bind callback server: {0}")]
    Bind(String),
}
