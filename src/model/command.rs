use std::fmt::{self, Display};
use std::net::IpAddr;

use itertools::Itertools;
use rgb::RGB8;
use url::{Host, Url};

use crate::error::AddressError;

pub const PATTERN_OFF: &str = "off";
pub const PATTERN_CUSTOM: &str = "custom";

pub const WHITE: RGB8 = RGB8::new(255, 255, 255);
pub const BLACK: RGB8 = RGB8::new(0, 0, 0);

/// One `setPattern` request, independent of the zone it is sent to.
///
/// Movement parameters are carried through verbatim from the template they
/// were parsed from. Brightness is never stored here: a command is either the
/// "base" (unscaled) version, or the result of [`PatternCommand::scaled`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PatternCommand {
    pub pattern_type: String,
    pub num_colors: u32,
    pub colors: Vec<RGB8>,
    pub direction: String,
    pub speed: u32,
    pub gap: u32,
    pub other: u32,
    pub pause: u32,
}

/// A [`PatternCommand`] addressed to a specific zone.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ZoneCommand {
    pub zone: u8,
    pub pattern: PatternCommand,
}

/// Brightness factor for a 0-255 brightness level, clamped to `[0.0, 1.0]`.
#[must_use]
pub fn brightness_factor(brightness: u8) -> f64 {
    (f64::from(brightness) / 255.0).clamp(0.0, 1.0)
}

#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn scale_channel(channel: u8, factor: f64) -> u8 {
    // clamped to the u8 range first, so the cast is exact
    (f64::from(channel) * factor.clamp(0.0, 1.0))
        .round()
        .clamp(0.0, 255.0) as u8
}

#[must_use]
pub fn scale_color(color: RGB8, factor: f64) -> RGB8 {
    RGB8::new(
        scale_channel(color.r, factor),
        scale_channel(color.g, factor),
        scale_channel(color.b, factor),
    )
}

/// Parse a comma-separated list of 0-255 values into whole RGB triplets.
///
/// Parsing stops at the first non-numeric value. Empty items (such as a
/// trailing comma) are skipped, and values outside 0-255 are clamped. Any
/// values that do not form a complete triplet are dropped with a warning.
#[must_use]
pub fn parse_color_list(text: &str) -> Vec<RGB8> {
    let mut values = vec![];
    for item in text.split(',').map(str::trim).filter(|x| !x.is_empty()) {
        let Ok(value) = item.parse::<i64>() else {
            log::warn!("Invalid color value {item:?} in color list {text:?}");
            break;
        };
        values.push(u8::try_from(value.clamp(0, 255)).unwrap_or(u8::MAX));
    }

    if values.len() % 3 != 0 {
        log::warn!(
            "Color list {text:?} has {} values, which is not a multiple of 3",
            values.len()
        );
    }

    values
        .chunks_exact(3)
        .map(|c| RGB8::new(c[0], c[1], c[2]))
        .collect()
}

#[must_use]
pub fn format_color_list(colors: &[RGB8]) -> String {
    colors
        .iter()
        .map(|c| format!("{},{},{}", c.r, c.g, c.b))
        .join(",")
}

/// First color of the `colors` query parameter of a command url
#[must_use]
pub fn extract_first_color(url: &Url) -> Option<RGB8> {
    let (_, colors) = url.query_pairs().find(|(key, _)| key == "colors")?;
    parse_color_list(&colors).first().copied()
}

impl PatternCommand {
    /// Solid color, unscaled
    #[must_use]
    pub fn solid(color: RGB8) -> Self {
        Self {
            pattern_type: PATTERN_CUSTOM.to_string(),
            num_colors: 1,
            colors: vec![color],
            direction: "F".to_string(),
            speed: 0,
            gap: 0,
            other: 0,
            pause: 0,
        }
    }

    #[must_use]
    pub fn off() -> Self {
        Self {
            pattern_type: PATTERN_OFF.to_string(),
            ..Self::solid(BLACK)
        }
    }

    /// Parse a command from url query parameters.
    ///
    /// Accepts both complete command urls and catalog templates (where the
    /// zone is a `{zone}` placeholder). Zone parameters are ignored. Returns
    /// `None` if no pattern type is present.
    #[must_use]
    pub fn from_query(query: &str) -> Option<Self> {
        let mut pattern_type = None;
        let mut res = Self::solid(BLACK);
        res.num_colors = 0;
        res.colors.clear();

        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            let number = || value.trim().parse::<u32>().unwrap_or(0);
            match key.as_ref() {
                "patternType" => pattern_type = Some(value.to_string()),
                "num_colors" => res.num_colors = number(),
                "colors" => res.colors = parse_color_list(&value),
                "direction" => res.direction = value.to_string(),
                "speed" => res.speed = number(),
                "gap" => res.gap = number(),
                "other" => res.other = number(),
                "pause" => res.pause = number(),
                _ => {}
            }
        }

        res.pattern_type = pattern_type?;
        Some(res)
    }

    /// Copy of this command with every color scaled to `brightness`.
    #[must_use]
    pub fn scaled(&self, brightness: u8) -> Self {
        let factor = brightness_factor(brightness);
        Self {
            colors: self.colors.iter().map(|c| scale_color(*c, factor)).collect(),
            ..self.clone()
        }
    }

    #[must_use]
    pub fn first_color(&self) -> Option<RGB8> {
        self.colors.first().copied()
    }

    #[must_use]
    pub fn is_off(&self) -> bool {
        self.pattern_type == PATTERN_OFF
    }

    #[must_use]
    pub fn is_custom(&self) -> bool {
        self.pattern_type == PATTERN_CUSTOM
    }

    fn append_query(&self, zone: u8, url: &mut Url) {
        url.query_pairs_mut()
            .clear()
            .append_pair("patternType", &self.pattern_type)
            .append_pair("num_zones", "1")
            .append_pair("zones", &zone.to_string())
            .append_pair("num_colors", &self.num_colors.to_string())
            .append_pair("colors", &format_color_list(&self.colors))
            .append_pair("direction", &self.direction)
            .append_pair("speed", &self.speed.to_string())
            .append_pair("gap", &self.gap.to_string())
            .append_pair("other", &self.other.to_string())
            .append_pair("pause", &self.pause.to_string());
    }
}

impl ZoneCommand {
    #[must_use]
    pub fn from_url(url: &Url) -> Option<Self> {
        let zone = url
            .query_pairs()
            .find(|(key, _)| key == "zones")
            .and_then(|(_, value)| value.trim().parse().ok())?;
        let pattern = PatternCommand::from_query(url.query()?)?;
        Some(Self { zone, pattern })
    }
}

impl Display for ZoneCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "zone {} {}[{}]",
            self.zone,
            self.pattern.pattern_type,
            format_color_list(&self.pattern.colors)
        )
    }
}

/// Solid color command, scaled to `brightness`.
#[must_use]
pub fn build_color_command(zone: u8, rgb: RGB8, brightness: u8) -> ZoneCommand {
    ZoneCommand {
        zone,
        pattern: PatternCommand::solid(rgb).scaled(brightness),
    }
}

/// Effect command for `zone`, with every color of `template` scaled to
/// `brightness`. Pattern type and movement parameters are kept as-is, even at
/// brightness 0.
#[must_use]
pub fn build_effect_command(zone: u8, template: &PatternCommand, brightness: u8) -> ZoneCommand {
    ZoneCommand {
        zone,
        pattern: template.scaled(brightness),
    }
}

#[must_use]
pub fn build_off_command(zone: u8) -> ZoneCommand {
    ZoneCommand {
        zone,
        pattern: PatternCommand::off(),
    }
}

/// Network location of one controller
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ControllerEndpoint {
    base: Url,
}

impl ControllerEndpoint {
    /// Validate an address (IP address or host name) and build the endpoint
    /// for it.
    pub fn parse(address: &str) -> Result<Self, AddressError> {
        let address = address.trim();
        let invalid = || AddressError::InvalidAddress(address.to_string());

        if address.is_empty() {
            return Err(invalid());
        }

        let host = match address.parse::<IpAddr>() {
            Ok(IpAddr::V4(ip)) => Host::<String>::Ipv4(ip),
            Ok(IpAddr::V6(ip)) => Host::Ipv6(ip),
            Err(_) => match Host::parse(address) {
                Ok(Host::Domain(domain)) => Host::Domain(domain),
                Ok(_) | Err(_) => return Err(invalid()),
            },
        };

        let base = Url::parse(&format!("http://{host}/")).map_err(|_| invalid())?;
        Ok(Self { base })
    }

    /// Endpoint at an explicit base url (which may include a port)
    #[must_use]
    pub const fn with_base(base: Url) -> Self {
        Self { base }
    }

    #[must_use]
    pub fn host(&self) -> String {
        self.base.host_str().unwrap_or_default().to_string()
    }

    #[must_use]
    pub fn status_url(&self) -> Url {
        let mut url = self.base.clone();
        url.set_path("/getController");
        url.set_query(None);
        url
    }

    #[must_use]
    pub fn command_url(&self, cmd: &ZoneCommand) -> Url {
        let mut url = self.base.clone();
        url.set_path("/setPattern");
        cmd.pattern.append_query(cmd.zone, &mut url);
        url
    }
}
