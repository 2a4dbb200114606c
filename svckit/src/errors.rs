use thiserror::Error;

#[derive(Error, Debug)]
pub enum DashError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("HTTP error: endpoint returned status {0}")]
    Http(u16),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid location: {0}")]
    InvalidLocation(String),
}

impl DashError {
    /// True for the failures a payments fetch can end in.
    pub fn is_fetch_failure(&self) -> bool {
        matches!(self, Self::Network(_) | Self::Http(_) | Self::Decode(_))
    }
}

impl From<serde_json::Error> for DashError {
    fn from(err: serde_json::Error) -> Self {
        DashError::Decode(err.to_string())
    }
}

impl From<config::ConfigError> for DashError {
    fn from(err: config::ConfigError) -> Self {
        DashError::Config(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, DashError>;
