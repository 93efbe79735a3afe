use thiserror::Error;

/// Failure talking to the controller.
///
/// None of these are retried by the client. Callers fold them into the
/// availability of the affected zone(s).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeviceError {
    #[error("request timed out")]
    Timeout,

    #[error("connection failed: {0}")]
    Connection(String),

    #[error("controller returned HTTP status {0}")]
    Http(u16),

    #[error("malformed controller response: {0}")]
    Protocol(String),

    #[error("unexpected error: {0}")]
    Unknown(String),
}

impl From<reqwest::Error> for DeviceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if let Some(status) = err.status() {
            Self::Http(status.as_u16())
        } else if err.is_connect() || err.is_request() || err.is_body() {
            Self::Connection(err.to_string())
        } else if err.is_decode() {
            Self::Protocol(err.to_string())
        } else {
            Self::Unknown(err.to_string())
        }
    }
}

/// Reasons a controller address is rejected at configuration time.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AddressError {
    #[error("invalid controller address: {0:?}")]
    InvalidAddress(String),

    #[error("cannot connect to controller: {0}")]
    CannotConnect(#[source] DeviceError),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ZoneError {
    #[error("unknown effect: {0:?}")]
    UnknownEffect(String),

    #[error("zone {0} does not exist")]
    NoSuchZone(u8),
}

#[derive(Error, Debug)]
pub enum ApiError {
    /* mapped errors */
    #[error(transparent)]
    IOError(#[from] std::io::Error),

    #[error(transparent)]
    SerdeYaml(#[from] serde_yml::Error),

    #[error(transparent)]
    ConfigError(#[from] config::ConfigError),

    #[error(transparent)]
    ReqwestError(#[from] reqwest::Error),

    #[error(transparent)]
    SetLoggerError(#[from] log::SetLoggerError),

    #[error(transparent)]
    AxumError(#[from] axum::Error),

    #[error(transparent)]
    JoinError(#[from] tokio::task::JoinError),

    #[error(transparent)]
    BroadcastStreamRecvError(
        #[from] tokio_stream::wrappers::errors::BroadcastStreamRecvError,
    ),

    #[error(transparent)]
    DeviceError(#[from] DeviceError),

    #[error(transparent)]
    AddressError(#[from] AddressError),

    #[error(transparent)]
    ZoneError(#[from] ZoneError),
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use crate::error::{AddressError, DeviceError};

    #[test]
    fn cannot_connect_keeps_source() {
        use std::error::Error;

        let err = AddressError::CannotConnect(DeviceError::Http(404));
        let source = err.source().map(ToString::to_string);

        assert_eq!(source.as_deref(), Some("controller returned HTTP status 404"));
    }
}
