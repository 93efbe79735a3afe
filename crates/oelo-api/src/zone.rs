use serde::{Deserialize, Serialize};

/// Number of independently addressable outputs on one controller.
pub const ZONE_COUNT: u8 = 6;

/// Observable state of one zone, as reported to clients.
///
/// When `available` is false, every other attribute is `None`: the last known
/// values may no longer reflect what the lights are doing.
#[derive(Clone, Debug, Serialize, Deserialize, Eq, PartialEq)]
pub struct ZoneView {
    pub zone: u8,
    pub name: String,
    pub available: bool,
    pub on: Option<bool>,
    pub brightness: Option<u8>,
    pub rgb: Option<[u8; 3]>,
    pub effect: Option<String>,
}

/// Desired state for one zone.
///
/// `on: false` turns the zone off and ignores every other field.
#[derive(Clone, Debug, Default, Serialize, Deserialize, Eq, PartialEq)]
pub struct LightRequest {
    pub on: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brightness: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rgb: Option<[u8; 3]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effect: Option<String>,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Accepted,
    Failed,
    Superseded,
}

#[derive(Clone, Debug, Serialize, Deserialize, Eq, PartialEq)]
pub struct LightResponse {
    pub outcome: Outcome,
    pub zone: ZoneView,
}

#[derive(Clone, Debug, Serialize, Deserialize, Eq, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ZoneEvent {
    /// Observable attributes of a zone changed.
    Update(ZoneView),
    /// Zone became reachable again after a failure.
    Recovered { zone: u8 },
    /// Zone stopped responding.
    Lost { zone: u8 },
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::zone::{LightRequest, ZoneEvent};

    #[test]
    fn light_request_minimal() {
        let req: LightRequest = serde_json::from_value(json!({"on": true})).unwrap();
        assert_eq!(
            req,
            LightRequest {
                on: true,
                ..LightRequest::default()
            }
        );
    }

    #[test]
    fn zone_event_tagged() {
        let evt = serde_json::to_value(ZoneEvent::Lost { zone: 3 }).unwrap();
        assert_eq!(evt, json!({"type": "lost", "zone": 3}));
    }
}
