use std::collections::BTreeMap;
use std::fs::File;

use camino::{Utf8Path, Utf8PathBuf};
use rgb::RGB8;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::ApiResult;
use crate::model::command::{ControllerEndpoint, WHITE, ZoneCommand, extract_first_color};
use crate::model::zone::ZoneState;

/// Persisted attributes of one zone
#[derive(Clone, Debug, Default, Serialize, Deserialize, Eq, PartialEq)]
pub struct SavedZone {
    #[serde(default)]
    pub on: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brightness: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rgb: Option<[u8; 3]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effect: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_command: Option<Url>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, Eq, PartialEq)]
pub struct StateFile {
    #[serde(default)]
    pub zones: BTreeMap<u8, SavedZone>,
}

#[derive(Debug)]
pub struct StateStore {
    file: Utf8PathBuf,
    data: StateFile,
}

impl SavedZone {
    #[must_use]
    pub fn from_zone(zone: &ZoneState, endpoint: &ControllerEndpoint) -> Self {
        let last_command = zone.last_successful_command.as_ref().map(|pattern| {
            endpoint.command_url(&ZoneCommand {
                zone: zone.zone_id(),
                pattern: pattern.clone(),
            })
        });

        Self {
            on: zone.power,
            brightness: Some(zone.brightness),
            rgb: Some([zone.rgb.r, zone.rgb.g, zone.rgb.b]),
            effect: zone.intended_effect.clone(),
            last_command,
        }
    }

    /// Rebuild zone state from saved attributes. Missing attributes fall
    /// back to defaults (off, white, full brightness).
    #[must_use]
    pub fn restore(&self, zone_id: u8) -> ZoneState {
        let mut zone = ZoneState::new(zone_id);

        let last = self.last_command.as_ref();
        zone.power = self.on;
        zone.brightness = self.brightness.unwrap_or(255);
        zone.intended_effect.clone_from(&self.effect);
        zone.rgb = self
            .rgb
            .map(|[r, g, b]| RGB8::new(r, g, b))
            .or_else(|| last.and_then(extract_first_color))
            .unwrap_or(WHITE);
        zone.last_successful_command = last
            .and_then(ZoneCommand::from_url)
            .map(|cmd| cmd.pattern);

        zone
    }
}

impl StateStore {
    /// Load saved state, if any. A missing or unreadable file is not an
    /// error: every zone just starts from defaults.
    #[must_use]
    pub fn load(file: &Utf8Path) -> Self {
        let data = if file.is_file() {
            match File::open(file)
                .and_then(|fd| serde_yml::from_reader(fd).map_err(std::io::Error::other))
            {
                Ok(data) => {
                    log::debug!("Loaded zone state from {file}");
                    data
                }
                Err(err) => {
                    log::warn!("Failed to parse {file}, using defaults: {err}");
                    StateFile::default()
                }
            }
        } else {
            log::debug!("No state file found at {file}, using defaults");
            StateFile::default()
        };

        Self {
            file: file.to_path_buf(),
            data,
        }
    }

    pub fn save(&self) -> ApiResult<()> {
        let file = File::create(&self.file)?;
        serde_yml::to_writer(file, &self.data)?;
        Ok(())
    }

    #[must_use]
    pub fn restore(&self, zone_id: u8) -> ZoneState {
        self.data
            .zones
            .get(&zone_id)
            .map_or_else(|| ZoneState::new(zone_id), |saved| saved.restore(zone_id))
    }

    /// Record the current state of a zone. Returns true if anything changed.
    pub fn update(&mut self, zone: &ZoneState, endpoint: &ControllerEndpoint) -> bool {
        let saved = SavedZone::from_zone(zone, endpoint);
        if self.data.zones.get(&zone.zone_id()) == Some(&saved) {
            return false;
        }
        self.data.zones.insert(zone.zone_id(), saved);
        true
    }

    #[must_use]
    pub const fn data(&self) -> &StateFile {
        &self.data
    }
}
