use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::Value;
use url::Url;

use crate::error::{AddressError, DeviceError};
use crate::model::command::ControllerEndpoint;

/// Body the controller answers accepted commands with. Advisory only.
const COMMAND_ACK: &str = "Command Received";

/// One zone entry of a `getController` response
#[derive(Clone, Debug, Deserialize)]
pub struct ZoneReport {
    pub num: u8,
    #[serde(default)]
    pub pattern: Option<Value>,
    #[serde(default)]
    pub colors: Option<Value>,
    #[serde(default)]
    pub enabled: Option<bool>,
    #[serde(default)]
    pub name: Option<String>,
}

impl ZoneReport {
    #[must_use]
    pub fn pattern(&self) -> Option<&str> {
        self.pattern.as_ref().and_then(Value::as_str)
    }

    #[must_use]
    pub fn colors(&self) -> Option<&str> {
        self.colors.as_ref().and_then(Value::as_str)
    }
}

/// Parsed status poll
#[derive(Clone, Debug, Default)]
pub struct ControllerStatus {
    pub zones: Vec<ZoneReport>,
}

impl ControllerStatus {
    /// Parse a status body. Anything but a JSON list fails the whole poll;
    /// entries that cannot be attributed to a zone are skipped.
    pub fn parse(body: &str) -> Result<Self, DeviceError> {
        let value: Value =
            serde_json::from_str(body).map_err(|err| DeviceError::Protocol(err.to_string()))?;

        let Value::Array(entries) = value else {
            return Err(DeviceError::Protocol(
                "status response is not a list".to_string(),
            ));
        };

        let zones = entries
            .into_iter()
            .filter_map(|entry| match serde_json::from_value::<ZoneReport>(entry) {
                Ok(report) => Some(report),
                Err(err) => {
                    log::warn!("Skipping unusable zone entry in status response: {err}");
                    None
                }
            })
            .collect();

        Ok(Self { zones })
    }

    /// Pattern type and color string reported for `zone`.
    ///
    /// A missing entry, or one without a pattern, is a protocol error for
    /// that zone alone.
    pub fn zone(&self, zone: u8) -> Result<(&str, Option<&str>), DeviceError> {
        let report = self
            .zones
            .iter()
            .find(|report| report.num == zone)
            .ok_or_else(|| DeviceError::Protocol(format!("zone {zone} missing from status")))?;

        let pattern = report
            .pattern()
            .ok_or_else(|| DeviceError::Protocol(format!("zone {zone} has no pattern")))?;

        Ok((pattern, report.colors()))
    }
}

/// Transport to one controller
#[async_trait]
pub trait ControllerApi: Send + Sync {
    async fn send_command(&self, url: &Url) -> Result<(), DeviceError>;

    async fn poll_status(&self) -> Result<ControllerStatus, DeviceError>;
}

pub struct OeloClient {
    endpoint: ControllerEndpoint,
    http: reqwest::Client,
    timeout: Duration,
}

impl OeloClient {
    #[must_use]
    pub const fn new(
        endpoint: ControllerEndpoint,
        http: reqwest::Client,
        timeout: Duration,
    ) -> Self {
        Self {
            endpoint,
            http,
            timeout,
        }
    }

    #[must_use]
    pub const fn endpoint(&self) -> &ControllerEndpoint {
        &self.endpoint
    }

    async fn get(&self, url: Url) -> Result<(StatusCode, String), DeviceError> {
        let response = self.http.get(url).timeout(self.timeout).send().await?;
        let status = response.status();
        let body = response.text().await?;
        Ok((status, body))
    }

    /// Query the status endpoint. Only a plain `200 OK` counts as a
    /// controller.
    pub async fn validate(&self) -> Result<(), AddressError> {
        let (status, _) = self
            .get(self.endpoint.status_url())
            .await
            .map_err(AddressError::CannotConnect)?;

        if status != StatusCode::OK {
            return Err(AddressError::CannotConnect(DeviceError::Http(
                status.as_u16(),
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl ControllerApi for OeloClient {
    async fn send_command(&self, url: &Url) -> Result<(), DeviceError> {
        let response = self
            .http
            .get(url.clone())
            .timeout(self.timeout)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(DeviceError::Http(status.as_u16()));
        }

        match response.text().await {
            Ok(body) if body.contains(COMMAND_ACK) => {
                log::debug!("[{}] Command acknowledged", self.endpoint.host());
            }
            Ok(body) => log::debug!(
                "[{}] Command accepted with unexpected body: {body:?}",
                self.endpoint.host()
            ),
            Err(err) => log::debug!(
                "[{}] Command accepted, but body unreadable: {err}",
                self.endpoint.host()
            ),
        }

        Ok(())
    }

    async fn poll_status(&self) -> Result<ControllerStatus, DeviceError> {
        let (status, body) = self.get(self.endpoint.status_url()).await?;
        if !status.is_success() {
            return Err(DeviceError::Http(status.as_u16()));
        }
        ControllerStatus::parse(&body)
    }
}

/// Validate an address entered by a user: first its format, then whether a
/// controller answers there.
pub async fn check_address(
    address: &str,
    http: reqwest::Client,
    timeout: Duration,
) -> Result<ControllerEndpoint, AddressError> {
    let endpoint = ControllerEndpoint::parse(address)?;
    let client = OeloClient::new(endpoint, http, timeout);
    client.validate().await?;
    Ok(client.endpoint)
}
